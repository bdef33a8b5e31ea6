use crate::error::Error;
use crate::image::Image;
use crate::pal::{PalLen, RGB16, MAX_COLORS};
use crate::quant::QuantizationResult;
use std::sync::Arc;

/// Starting point and settings for the quantization process
#[derive(Clone)]
pub struct Attributes {
    pub(crate) colors: PalLen,
    pub(crate) max_epochs: u16,
    pub(crate) movement_limit: u64,
    pub(crate) sample_stride: usize,
    pub(crate) indexed_search: bool,

    log_callback: Option<Arc<dyn Fn(&Attributes, &str) + Send + Sync>>,
    log_flush_callback: Option<Arc<dyn Fn(&Attributes) + Send + Sync>>,
}

impl Attributes {
    /// New handle for library configuration
    ///
    /// See also [`Attributes::new_image()`]
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            colors: 16,
            max_epochs: 100,
            movement_limit: 100,
            sample_stride: 1,
            indexed_search: false,
            log_callback: None,
            log_flush_callback: None,
        }
    }

    /// Number of representative colors to cluster the image into. 2-256.
    #[inline]
    pub fn set_colors(&mut self, colors: u32) -> Result<(), Error> {
        if !(2..=MAX_COLORS as u32).contains(&colors) {
            return Err(Error::ValueOutOfRange);
        }
        self.colors = colors as PalLen;
        Ok(())
    }

    /// Upper bound on assign/update passes. 1-65535, default 100.
    ///
    /// The loop normally stops earlier, when total center movement in one
    /// epoch drops to [`set_movement_limit()`][Self::set_movement_limit].
    #[inline]
    pub fn set_max_epochs(&mut self, epochs: u16) -> Result<(), Error> {
        if epochs == 0 {
            return Err(Error::ValueOutOfRange);
        }
        self.max_epochs = epochs;
        Ok(())
    }

    /// Convergence threshold: total Manhattan movement of all centers in
    /// one epoch at or below which the loop stops. Default 100.
    ///
    /// 0 demands a fully stationary palette and usually just runs into
    /// the epoch cap.
    #[inline(always)]
    pub fn set_movement_limit(&mut self, limit: u64) {
        self.movement_limit = limit;
    }

    /// Cluster on every `stride`-th pixel instead of the whole buffer.
    ///
    /// The stride stays fixed for the run; the starting phase is redrawn
    /// each epoch from the seeded generator, so results remain
    /// reproducible per seed while successive epochs see different
    /// samples. Stride 1 (the default) scans everything. Larger strides
    /// trade accuracy for speed on large images; the final recoloring
    /// pass always visits every pixel.
    #[inline]
    pub fn set_sample_stride(&mut self, stride: usize) -> Result<(), Error> {
        if !(1..=1usize << 16).contains(&stride) {
            return Err(Error::ValueOutOfRange);
        }
        self.sample_stride = stride;
        Ok(())
    }

    /// Answer nearest-center queries from a vantage-point tree over the
    /// centers instead of a linear scan.
    ///
    /// The linear scan wins for typical palette sizes; the tree pays off
    /// once many colors are requested or images get very large. Either
    /// way the result is identical.
    #[inline(always)]
    pub fn set_indexed_search(&mut self, enabled: bool) {
        self.indexed_search = enabled;
    }

    /// Return currently set number of representative colors
    #[inline(always)]
    #[must_use]
    pub fn colors(&self) -> u32 {
        self.colors.into()
    }

    /// Return currently set epoch cap
    #[inline(always)]
    #[must_use]
    pub fn max_epochs(&self) -> u16 {
        self.max_epochs
    }

    /// Return currently set convergence threshold
    #[inline(always)]
    #[must_use]
    pub fn movement_limit(&self) -> u64 {
        self.movement_limit
    }

    /// Return currently set mini-batch stride
    #[inline(always)]
    #[must_use]
    pub fn sample_stride(&self) -> usize {
        self.sample_stride
    }

    /// Describe dimensions of a slice of RGB pixels
    #[inline]
    pub fn new_image(&self, pixels: &[RGB16], width: usize, height: usize) -> Result<Image, Error> {
        Image::new(self, pixels, width, height)
    }

    /// Like [`new_image()`][Self::new_image], but with a row stride in
    /// pixels for regions of larger bitmaps
    #[inline]
    pub fn new_image_stride(&self, pixels: &[RGB16], width: usize, height: usize, stride: usize) -> Result<Image, Error> {
        Image::new_stride(self, pixels, width, height, stride)
    }

    /// Cluster the image's colors. The seed fully determines every random
    /// choice, so identical `(image, settings, seed)` give identical
    /// results.
    ///
    /// The returned [`QuantizationResult`] holds the frozen centers and
    /// recolors any number of buffers against them.
    pub fn quantize(&self, image: &Image, seed: u64) -> Result<QuantizationResult, Error> {
        QuantizationResult::new(self, image, seed)
    }

    /// Set callback function to be called every time the library wants to print a message.
    ///
    /// To share data with the callback, use `Arc` or `Atomic*` types and `move ||` closures.
    #[inline]
    pub fn set_log_callback<F: Fn(&Attributes, &str) + Send + Sync + 'static>(&mut self, callback: F) {
        self.verbose_printf_flush();
        self.log_callback = Some(Arc::new(callback));
    }

    /// Callback for flushing output (if you buffer messages, that's the time to flush those buffers)
    #[inline]
    pub fn set_log_flush_callback<F: Fn(&Attributes) + Send + Sync + 'static>(&mut self, callback: F) {
        self.verbose_printf_flush();
        self.log_flush_callback = Some(Arc::new(callback));
    }

    #[inline(always)]
    pub(crate) fn verbose_print(&self, msg: impl AsRef<str>) {
        fn _print(a: &Attributes, msg: &str) {
            if let Some(f) = &a.log_callback {
                f(a, msg);
            }
        }
        _print(self, msg.as_ref());
    }

    #[inline]
    pub(crate) fn verbose_printf_flush(&self) {
        if let Some(f) = &self.log_flush_callback {
            f(self);
        }
    }
}

impl Drop for Attributes {
    fn drop(&mut self) {
        self.verbose_printf_flush();
    }
}

impl Default for Attributes {
    #[inline(always)]
    fn default() -> Attributes {
        Attributes::new()
    }
}

#[test]
fn getset() {
    let mut a = Attributes::new();
    assert!(a.set_colors(0).is_err());
    assert!(a.set_colors(1).is_err());
    assert!(a.set_colors(257).is_err());
    a.set_colors(2).unwrap();
    a.set_colors(256).unwrap();
    a.set_colors(12).unwrap();
    assert_eq!(12, a.colors());

    assert!(a.set_max_epochs(0).is_err());
    a.set_max_epochs(300).unwrap();
    assert_eq!(300, a.max_epochs());

    assert!(a.set_sample_stride(0).is_err());
    assert!(a.set_sample_stride(1 << 17).is_err());
    a.set_sample_stride(7).unwrap();
    assert_eq!(7, a.sample_stride());

    a.set_movement_limit(0);
    assert_eq!(0, a.movement_limit());
}

#[test]
fn logs_to_callback() {
    use std::sync::atomic::{AtomicUsize, Ordering};

    let messages = Arc::new(AtomicUsize::new(0));
    let counted = messages.clone();
    let mut a = Attributes::new();
    a.set_log_callback(move |_, msg| {
        assert!(!msg.is_empty());
        counted.fetch_add(1, Ordering::Relaxed);
    });

    let px = vec![RGB16::new(0, 0, 0); 4];
    // too small on purpose, the diagnostic goes through the callback
    let _ = a.new_image(&px, 4, 4);
    assert_eq!(1, messages.load(Ordering::Relaxed));
}
