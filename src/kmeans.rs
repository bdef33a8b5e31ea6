use crate::error::Error;
use crate::pal::{i_pixel, Centroids, PalIndex, ARGB64};
use crate::rayoff::*;
use crate::remap::Finder;
use rgb::ComponentMap;
use std::cell::RefCell;

/// Pixels per work unit; a trade-off between parallelization and overhead.
/// Kept a multiple of every allowed sample stride's chunking below.
const CHUNK: usize = 4096;

pub(crate) struct Kmeans {
    sums: Vec<ColorSum>,
}

#[derive(Copy, Clone, Default)]
struct ColorSum {
    sum: ARGB64,
    total: i64,
}

/// One Lloyd epoch: ASSIGN adds each sampled pixel's channels into its
/// nearest center's accumulator, UPDATE moves every non-empty center to
/// the truncated mean of what it attracted.
impl Kmeans {
    #[inline]
    pub fn new(pal_len: usize) -> Self {
        Self { sums: vec![ColorSum::default(); pal_len] }
    }

    #[inline]
    pub fn update_color(&mut self, px: i_pixel, matched: PalIndex) {
        let c = &mut self.sums[matched as usize];
        c.sum += px.0;
        c.total += 1;
    }

    /// UPDATE step. Returns the total Manhattan movement of the centers,
    /// the convergence signal for the epoch loop.
    pub fn finalize(self, centroids: &mut Centroids) -> u64 {
        let mut movement = 0;
        for (acc, color) in self.sums.iter().zip(centroids.iter_mut()) {
            if acc.total == 0 {
                // a cluster that attracted nothing keeps its center
                continue;
            }
            let total = acc.total;
            let new = i_pixel(acc.sum.map(move |ch| ch / total));
            movement += color.diff(&new);
            *color = new;
        }
        movement
    }

    /// ASSIGN over `px[phase..]` at the given stride, then UPDATE.
    ///
    /// Workers accumulate into thread-local sums which are merged by
    /// plain addition afterwards, so splitting the buffer never changes
    /// the outcome.
    #[inline(never)]
    pub(crate) fn iteration(px: &[i_pixel], centroids: &mut Centroids, indexed: bool, stride: usize, phase: usize) -> Result<u64, Error> {
        debug_assert!(phase < stride);
        debug_assert!(phase < px.len());

        let finder = Finder::new(centroids.as_slice(), indexed)?;
        let len = centroids.len();

        let tls = ThreadLocal::new();
        px[phase..].par_chunks(CHUNK * stride).for_each(|batch| {
            let kmeans = tls.get_or(move || RefCell::new(Kmeans::new(len)));
            kmeans.borrow_mut().iterate_batch(batch, &finder, stride);
        });

        let movement = tls.into_iter()
            .map(RefCell::into_inner)
            .reduce(Kmeans::merge)
            .map(|kmeans| kmeans.finalize(centroids))
            .unwrap_or(0);
        Ok(movement)
    }

    fn iterate_batch(&mut self, batch: &[i_pixel], finder: &Finder<'_>, stride: usize) {
        let mut last_match = 0;
        for px in batch.iter().step_by(stride) {
            let (matched, _) = finder.search(px, last_match);
            last_match = matched;
            self.update_color(*px, matched);
        }
    }

    #[inline]
    pub fn merge(mut self, new: Kmeans) -> Kmeans {
        self.sums.iter_mut().zip(new.sums).for_each(|(p, n)| {
            p.sum += n.sum;
            p.total += n.total;
        });
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pal::RGB16;
    use crate::plusplus::plusplus;
    use nanorand::{Rng, WyRand};

    fn random_buffer(rng: &mut WyRand, n: usize) -> Vec<i_pixel> {
        (0..n)
            .map(|_| i_pixel::from_rgb16(RGB16::new(rng.generate(), rng.generate(), rng.generate())))
            .collect()
    }

    #[test]
    fn empty_cluster_keeps_center() {
        let px = vec![i_pixel::from_rgb16(RGB16::new(10, 10, 10)); 4];
        let stray = i_pixel::from_rgb16(RGB16::new(60000, 60000, 60000));
        let mut centroids = Centroids::new();
        centroids.push(px[0]);
        centroids.push(stray);

        let movement = Kmeans::iteration(&px, &mut centroids, false, 1, 0).unwrap();
        assert_eq!(0, movement);
        assert_eq!(stray, centroids[1]);
    }

    #[test]
    fn ties_go_to_the_lowest_index() {
        let px = vec![i_pixel::from_rgb16(RGB16::new(5, 5, 5)); 3];
        let mut centroids = Centroids::new();
        // identical centers: all pixels must land in cluster 0
        centroids.push(px[0]);
        centroids.push(px[0]);

        let finder = Finder::new(centroids.as_slice(), false).unwrap();
        let mut kmeans = Kmeans::new(centroids.len());
        kmeans.iterate_batch(&px, &finder, 1);
        assert_eq!(3, kmeans.sums[0].total);
        assert_eq!(0, kmeans.sums[1].total);
    }

    #[test]
    fn movement_trends_down() {
        const EPOCHS: usize = 6;
        let mut per_epoch = [0u64; EPOCHS];
        for seed in 0..20 {
            let mut rng = WyRand::new_seed(seed);
            let px = random_buffer(&mut rng, 512);
            let mut centroids = plusplus(&px, 8, &mut rng).unwrap();
            for slot in per_epoch.iter_mut() {
                *slot += Kmeans::iteration(&px, &mut centroids, false, 1, 0).unwrap();
            }
        }
        // non-increasing in expectation; a little per-step jitter is fine
        for pair in per_epoch.windows(2) {
            assert!(pair[1] <= pair[0].max(8) * 5 / 4, "movement grew: {per_epoch:?}");
        }
        assert!(per_epoch[EPOCHS - 1] < per_epoch[0] / 2, "no overall convergence: {per_epoch:?}");
    }

    #[test]
    fn merge_order_is_irrelevant() {
        let px = {
            let mut rng = WyRand::new_seed(3);
            random_buffer(&mut rng, 64)
        };
        let mut centroids = plusplus(&px, 4, &mut WyRand::new_seed(3)).unwrap();
        let finder = Finder::new(centroids.as_slice(), false).unwrap();

        let mut left = Kmeans::new(4);
        left.iterate_batch(&px[..32], &finder, 1);
        let mut right = Kmeans::new(4);
        right.iterate_batch(&px[32..], &finder, 1);
        let mut whole = Kmeans::new(4);
        whole.iterate_batch(&px, &finder, 1);

        let split = Kmeans::merge(right, left).finalize(&mut centroids);
        let mut again = plusplus(&px, 4, &mut WyRand::new_seed(3)).unwrap();
        let joined = whole.finalize(&mut again);
        assert_eq!(split, joined);
        assert_eq!(centroids.as_slice(), again.as_slice());
    }
}
