use crate::error::*;
use crate::nearest::Nearest;
use crate::pal::{i_pixel, PalIndex, RGB16};
use crate::rayoff::*;
use std::mem::MaybeUninit;

/// Pixels recolored per work unit.
const CHUNK: usize = 4096;

/// Nearest-center lookup shared by the epoch loop and the final
/// recoloring: a plain linear scan by default, the vantage-point tree
/// when the caller opted in. Both answer the same arg-min, ties broken
/// by the lowest cluster index.
pub(crate) enum Finder<'pal> {
    Linear(&'pal [i_pixel]),
    Tree(Nearest<'pal>),
}

impl<'pal> Finder<'pal> {
    pub fn new(palette: &'pal [i_pixel], indexed: bool) -> Result<Self, Error> {
        if palette.is_empty() {
            return Err(Unsupported);
        }
        Ok(if indexed {
            Self::Tree(Nearest::new(palette)?)
        } else {
            Self::Linear(palette)
        })
    }

    #[inline]
    pub fn search(&self, px: &i_pixel, likely_index: PalIndex) -> (PalIndex, u64) {
        match self {
            Self::Linear(palette) => {
                let mut best = (0 as PalIndex, palette[0].diff(px));
                for (idx, color) in palette.iter().enumerate().skip(1) {
                    let diff = color.diff(px);
                    if diff < best.1 {
                        best = (idx as PalIndex, diff);
                    }
                }
                best
            },
            Self::Tree(nearest) => nearest.search(px, likely_index),
        }
    }
}

/// Recolor every pixel with its nearest frozen center.
///
/// Read-only with respect to the centers and free of cross-pixel state,
/// so the chunks can go to any number of workers. Every `output` slot is
/// written exactly once.
#[inline(never)]
pub(crate) fn remap_to_palette(px: &[i_pixel], output: &mut [MaybeUninit<RGB16>], palette: &[i_pixel], int_palette: &[RGB16], indexed: bool) -> Result<(), Error> {
    debug_assert_eq!(px.len(), output.len());
    debug_assert_eq!(palette.len(), int_palette.len());

    let finder = Finder::new(palette, indexed)?;

    output.par_chunks_mut(CHUNK).zip(px.par_chunks(CHUNK)).for_each(|(output_chunk, px_chunk)| {
        let mut last_match = 0;
        for (out, px) in output_chunk.iter_mut().zip(px_chunk) {
            let (matched, _) = finder.search(px, last_match);
            last_match = matched;
            out.write(int_palette[matched as usize]);
        }
    });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finder_prefers_lowest_index_on_ties() {
        let a = i_pixel::from_rgb16(RGB16::new(0, 0, 0));
        let b = i_pixel::from_rgb16(RGB16::new(0, 0, 200));
        // a pixel exactly halfway between two centers
        let midway = i_pixel::from_rgb16(RGB16::new(0, 0, 100));

        for indexed in [false, true] {
            let palette = [a, b];
            let finder = Finder::new(&palette, indexed).unwrap();
            let (idx, dist) = finder.search(&midway, 1);
            assert_eq!((0, 100), (idx, dist));
        }
    }

    #[test]
    fn writes_every_slot() {
        let palette = [i_pixel::from_rgb16(RGB16::new(1, 2, 3)), i_pixel::from_rgb16(RGB16::new(9, 9, 9))];
        let int_palette = [RGB16::new(1, 2, 3), RGB16::new(9, 9, 9)];
        let px = vec![i_pixel::from_rgb16(RGB16::new(8, 8, 8)); CHUNK + 17];
        let mut out = vec![MaybeUninit::new(RGB16::new(0xDEAD, 0, 0)); px.len()];

        remap_to_palette(&px, &mut out, &palette, &int_palette, false).unwrap();
        for slot in &out {
            assert_eq!(RGB16::new(9, 9, 9), unsafe { slot.assume_init() });
        }
    }
}
