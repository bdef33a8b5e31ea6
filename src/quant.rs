use crate::attr::Attributes;
use crate::error::*;
use crate::image::Image;
use crate::kmeans::Kmeans;
use crate::pal::{Centroids, RGB16, MAX_COLORS};
use crate::plusplus::plusplus;
use crate::remap::remap_to_palette;
use arrayvec::ArrayVec;
use nanorand::{Rng, WyRand};
use std::fmt;
use std::mem::MaybeUninit;

/// Frozen clustering outcome, computed from [`Attributes::quantize()`]
///
/// The centers no longer move once this exists; remapping may run any
/// number of times against the same result and always writes the same
/// bytes.
pub struct QuantizationResult {
    palette: Centroids,
    int_palette: ArrayVec<RGB16, MAX_COLORS>,
    indexed_search: bool,
    epochs: u16,
}

impl QuantizationResult {
    pub(crate) fn new(attr: &Attributes, image: &Image, seed: u64) -> Result<Self, Error> {
        // All random draws happen here, on the caller's thread, from this
        // one generator. Workers only ever share read-only state.
        let mut rng = WyRand::new_seed(seed);

        let mut palette = plusplus(&image.px, attr.colors, &mut rng)?;

        let stride = attr.sample_stride.min(image.px.len()).max(1);
        let mut epochs = 0;
        let mut converged = false;
        while epochs < attr.max_epochs {
            let phase = if stride > 1 { rng.generate_range(0..stride) } else { 0 };
            let movement = Kmeans::iteration(&image.px, &mut palette, attr.indexed_search, stride, phase)?;
            epochs += 1;
            if movement <= attr.movement_limit {
                attr.verbose_print(format!("  converged after {epochs} epochs (movement {movement})"));
                converged = true;
                break;
            }
        }
        if !converged {
            attr.verbose_print(format!("  epoch cap of {} reached, centers still moving", attr.max_epochs));
        }

        let int_palette = palette.iter().map(|c| c.to_rgb16()).collect();
        Ok(Self {
            palette,
            int_palette,
            indexed_search: attr.indexed_search,
            epochs,
        })
    }

    /// The final palette. Every remapped pixel carries exactly one of
    /// these colors.
    #[inline]
    #[must_use]
    pub fn palette(&self) -> &[RGB16] {
        &self.int_palette
    }

    /// Number of colors in the final palette
    #[inline]
    #[must_use]
    pub fn palette_len(&self) -> usize {
        self.int_palette.len()
    }

    /// Assign/update passes it took until the centers settled, or the
    /// configured cap if they never did
    #[inline]
    #[must_use]
    pub fn epochs(&self) -> u16 {
        self.epochs
    }

    /// Recolor the image with the frozen centers.
    ///
    /// Returns a `width`×`height` buffer in the input's shape and depth.
    pub fn remapped(&self, image: &Image) -> Result<Vec<RGB16>, Error> {
        let mut buf = Vec::new();
        self.remap_into_vec(image, &mut buf)?;
        Ok(buf)
    }

    /// Remap into an existing `Vec`. Use [`remapped()`][Self::remapped] if you don't have a buffer to reuse.
    pub fn remap_into_vec(&self, image: &Image, buf: &mut Vec<RGB16>) -> Result<(), Error> {
        let len = image.width() * image.height();
        // Capacity is essential here, as it creates uninitialized buffer
        unsafe {
            buf.clear();
            buf.try_reserve_exact(len)?;
            self.remap_into(image, &mut buf.spare_capacity_mut()[..len])?;
            buf.set_len(len);
        }
        Ok(())
    }

    /// Remap into pre-allocated storage.
    ///
    /// This is a low-level call for when existing memory has to be
    /// reused; it initializes the first `width`×`height` slots.
    #[inline]
    pub fn remap_into(&self, image: &Image, output_buf: &mut [MaybeUninit<RGB16>]) -> Result<(), Error> {
        let required_size = image.width() * image.height();
        let output_buf = output_buf.get_mut(0..required_size).ok_or(BufferTooSmall)?;

        remap_to_palette(&image.px, output_buf, self.palette.as_slice(), &self.int_palette, self.indexed_search)
    }
}

impl fmt::Debug for QuantizationResult {
    #[cold]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "QuantizationResult(k={}, epochs={})", self.palette_len(), self.epochs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remap_into_checks_output_size() {
        let attr = Attributes::new();
        let px = vec![RGB16::new(0, 0, 0), RGB16::new(65535, 65535, 65535)];
        let image = attr.new_image(&px, 2, 1).unwrap();
        let mut attr2 = Attributes::new();
        attr2.set_colors(2).unwrap();
        let result = attr2.quantize(&image, 0).unwrap();

        let mut too_small = [MaybeUninit::uninit(); 1];
        assert_eq!(Err(BufferTooSmall), result.remap_into(&image, &mut too_small));
        let mut fits = [MaybeUninit::uninit(); 2];
        result.remap_into(&image, &mut fits).unwrap();
    }

    #[test]
    fn reports_convergence_through_log_callback() {
        use std::sync::atomic::{AtomicBool, Ordering};
        use std::sync::Arc;

        let seen = Arc::new(AtomicBool::new(false));
        let flag = seen.clone();
        let mut attr = Attributes::new();
        attr.set_colors(2).unwrap();
        attr.set_log_callback(move |_, msg| {
            if msg.contains("converged") {
                flag.store(true, Ordering::Relaxed);
            }
        });

        let px = vec![RGB16::new(1, 1, 1); 16];
        let image = attr.new_image(&px, 4, 4).unwrap();
        let result = attr.quantize(&image, 7).unwrap();
        assert!(seen.load(Ordering::Relaxed));
        assert_eq!(1, result.epochs());
    }
}
