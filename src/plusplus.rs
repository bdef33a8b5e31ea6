use crate::error::*;
use crate::pal::{i_pixel, Centroids, PalLen, MAX_COLORS};
use nanorand::{Rng, WyRand};

/// k-means++ seeding: the first center is drawn uniformly from the
/// buffer, every further one with probability proportional to its
/// distance from the centers picked so far. Start positions biased
/// toward far-apart colors converge in far fewer epochs than uniform
/// draws.
///
/// Every center is an actual buffer pixel. When the buffer has fewer
/// distinct colors than requested centers, the leftover slots duplicate
/// the first center; clusters that end up empty simply never move.
pub(crate) fn plusplus(px: &[i_pixel], colors: PalLen, rng: &mut WyRand) -> Result<Centroids, Error> {
    debug_assert!(!px.is_empty());
    debug_assert!((2..=MAX_COLORS as PalLen).contains(&colors));

    let mut centroids = Centroids::new();
    let first = px[rng.generate_range(0..px.len())];
    centroids.push(first);

    // running per-pixel distance to the nearest chosen center; entries
    // only ever decrease, which keeps the whole seeding at O(n·k)
    let mut min_diff = Vec::new();
    min_diff.try_reserve_exact(px.len())?;
    min_diff.extend(px.iter().map(|p| p.diff(&first)));
    let mut total: u64 = min_diff.iter().sum();

    while centroids.len() < colors as usize {
        if total == 0 {
            // every pixel sits on a center already
            centroids.push(first);
            continue;
        }

        let mut x: u64 = rng.generate_range(0..total);
        let mut picked = px.len() - 1;
        for (i, &d) in min_diff.iter().enumerate() {
            if x < d {
                picked = i;
                break;
            }
            x -= d;
        }
        let next = px[picked];
        centroids.push(next);

        if centroids.len() < colors as usize {
            for (d, p) in min_diff.iter_mut().zip(px) {
                let nd = p.diff(&next);
                if nd < *d {
                    total -= *d - nd;
                    *d = nd;
                }
            }
        }
    }
    Ok(centroids)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pal::RGB16;

    fn buffer(colors: &[(u16, u16, u16)]) -> Vec<i_pixel> {
        colors.iter().map(|&(r, g, b)| i_pixel::from_rgb16(RGB16::new(r, g, b))).collect()
    }

    #[test]
    fn deterministic_per_seed() {
        let px = buffer(&[(0, 0, 0), (9, 9, 9), (500, 0, 0), (0, 500, 0), (65535, 65535, 65535)]);
        let a = plusplus(&px, 3, &mut WyRand::new_seed(7)).unwrap();
        let b = plusplus(&px, 3, &mut WyRand::new_seed(7)).unwrap();
        assert_eq!(a.as_slice(), b.as_slice());
    }

    #[test]
    fn centers_are_buffer_pixels() {
        let px = buffer(&[(1, 2, 3), (4, 5, 6), (7, 8, 9), (65535, 0, 0)]);
        let centroids = plusplus(&px, 4, &mut WyRand::new_seed(0)).unwrap();
        assert_eq!(4, centroids.len());
        for c in &centroids {
            assert!(px.contains(c));
        }
    }

    #[test]
    fn tolerates_fewer_distinct_colors_than_centers() {
        let px = buffer(&[(42, 42, 42); 10]);
        let centroids = plusplus(&px, 5, &mut WyRand::new_seed(1)).unwrap();
        assert_eq!(5, centroids.len());
        assert!(centroids.iter().all(|c| *c == px[0]));
    }

    #[test]
    fn distant_color_always_seeded() {
        // two distinct colors, two centers: the weighted draw can only
        // land on pixels of the color not yet chosen
        let px = buffer(&[(0, 0, 0), (0, 0, 0), (65535, 65535, 65535), (0, 0, 0)]);
        for seed in 0..32 {
            let centroids = plusplus(&px, 2, &mut WyRand::new_seed(seed)).unwrap();
            assert_ne!(centroids[0], centroids[1], "seed {seed}");
        }
    }
}
