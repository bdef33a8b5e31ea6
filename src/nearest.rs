use crate::error::Error;
use crate::pal::{i_pixel, PalIndex, MAX_COLORS};

/// Vantage-point tree over the cluster centers.
///
/// Answers the same arg-min as the linear scan, ties to the lowest
/// cluster index, in sub-linear time. Worth building only when many
/// colors are in play; see [`Attributes::set_indexed_search`][crate::Attributes::set_indexed_search].
pub(crate) struct Nearest<'pal> {
    root: Node,
    palette: &'pal [i_pixel],
    nearest_other_color_dist: [u64; MAX_COLORS],
}

impl<'pal> Nearest<'pal> {
    #[inline(never)]
    pub fn new(palette: &'pal [i_pixel]) -> Result<Self, Error> {
        if palette.is_empty() || palette.len() > PalIndex::MAX as usize + 1 {
            return Err(Error::Unsupported);
        }
        let mut indexes: Vec<_> = (0..palette.len())
            .map(|idx| MapIndex { idx: idx as _ })
            .collect();
        let mut handle = Nearest {
            root: vp_create_node(&mut indexes, palette),
            palette,
            nearest_other_color_dist: [0; MAX_COLORS],
        };
        for (i, color) in palette.iter().enumerate() {
            let mut best = Visitor {
                idx: 0, distance: u64::MAX,
                exclude: Some(i as PalIndex),
            };
            vp_search_node(&handle.root, color, &mut best);
            handle.nearest_other_color_dist[i] = best.distance / 2;
        }
        Ok(handle)
    }

    #[inline]
    pub fn search(&self, px: &i_pixel, likely_index: PalIndex) -> (PalIndex, u64) {
        // The index may be stale, so it needs to be checked
        let mut best_candidate = if let Some(pal_px) = self.palette.get(likely_index as usize) {
            let guess_diff = px.diff(pal_px);
            if guess_diff < self.nearest_other_color_dist[likely_index as usize] {
                // strictly inside half the distance to the guess's
                // nearest neighbor: no other center can even tie
                return (likely_index, guess_diff);
            }
            Visitor {
                distance: guess_diff,
                idx: likely_index,
                exclude: None,
            }
        } else {
            Visitor { distance: u64::MAX, idx: 0, exclude: None }
        };

        vp_search_node(&self.root, px, &mut best_candidate);
        (best_candidate.idx, best_candidate.distance)
    }
}

struct MapIndex {
    idx: PalIndex,
}

struct Visitor {
    distance: u64,
    idx: PalIndex,
    exclude: Option<PalIndex>,
}

impl Visitor {
    #[inline]
    fn visit(&mut self, distance: u64, idx: PalIndex) {
        if (distance, idx) < (self.distance, self.idx) && self.exclude != Some(idx) {
            self.distance = distance;
            self.idx = idx;
        }
    }
}

struct Node {
    vantage_point: i_pixel,
    inner: NodeInner,
    idx: PalIndex,
}

const LEAF_MAX_SIZE: usize = 8;

enum NodeInner {
    Nodes {
        radius: u64,
        near: Box<Node>,
        far: Box<Node>,
    },
    Leaf {
        len: u8,
        idxs: [PalIndex; LEAF_MAX_SIZE],
        colors: Box<[i_pixel; LEAF_MAX_SIZE]>,
    },
}

#[inline(never)]
fn vp_create_node(indexes: &mut [MapIndex], palette: &[i_pixel]) -> Node {
    debug_assert!(!indexes.is_empty());

    if indexes.len() == 1 {
        return Node {
            vantage_point: palette[usize::from(indexes[0].idx)],
            idx: indexes[0].idx,
            inner: NodeInner::Leaf { len: 0, idxs: [0; LEAF_MAX_SIZE], colors: Box::new([i_pixel::default(); LEAF_MAX_SIZE]) },
        };
    }

    let (ref_, indexes) = indexes.split_first_mut().unwrap();

    let vantage_point = palette[usize::from(ref_.idx)];
    // secondary key keeps the layout deterministic when distances tie
    indexes.sort_unstable_by_key(move |i| (vantage_point.diff(&palette[usize::from(i.idx)]), i.idx));

    let num_indexes = indexes.len();

    let inner = if num_indexes <= LEAF_MAX_SIZE {
        let mut colors = [i_pixel::default(); LEAF_MAX_SIZE];
        let mut idxs = [Default::default(); LEAF_MAX_SIZE];

        indexes.iter().zip(colors.iter_mut().zip(idxs.iter_mut())).for_each(|(i, (color, idx))| {
            *idx = i.idx;
            *color = palette[usize::from(i.idx)];
        });
        NodeInner::Leaf {
            len: num_indexes as _,
            idxs,
            colors: Box::new(colors),
        }
    } else {
        let half_index = num_indexes / 2;
        let (near, far) = indexes.split_at_mut(half_index);
        debug_assert!(!near.is_empty());
        debug_assert!(!far.is_empty());
        let radius = vantage_point.diff(&palette[usize::from(far[0].idx)]);
        NodeInner::Nodes {
            radius,
            near: Box::new(vp_create_node(near, palette)),
            far: Box::new(vp_create_node(far, palette)),
        }
    };

    Node {
        inner,
        vantage_point,
        idx: ref_.idx,
    }
}

#[inline(never)]
fn vp_search_node(mut node: &Node, needle: &i_pixel, best_candidate: &mut Visitor) {
    loop {
        let distance = node.vantage_point.diff(needle);

        best_candidate.visit(distance, node.idx);

        match node.inner {
            NodeInner::Nodes { radius, ref near, ref far } => {
                // Recurse towards most likely candidate first to narrow best candidate's distance as soon as possible
                if distance < radius {
                    vp_search_node(near, needle, best_candidate);
                    // The best node (final answer) may be just outside the radius, but not farther than
                    // the best distance we know so far. The vp_search_node above should have narrowed
                    // best_candidate.distance, so this path is rarely taken.
                    if distance.saturating_add(best_candidate.distance) >= radius {
                        node = far;
                        continue;
                    }
                } else {
                    vp_search_node(far, needle, best_candidate);
                    if distance <= radius.saturating_add(best_candidate.distance) {
                        node = near;
                        continue;
                    }
                }
                break;
            },
            NodeInner::Leaf { len: num, ref idxs, ref colors } => {
                colors.iter().zip(idxs.iter().copied()).take(num as usize).for_each(|(color, idx)| {
                    best_candidate.visit(color.diff(needle), idx);
                });
                break;
            },
        }
    }
}
