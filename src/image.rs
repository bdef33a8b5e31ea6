use crate::attr::Attributes;
use crate::error::*;
use crate::pal::{i_pixel, RGB16};

/// Pixels prepared for clustering.
///
/// Built once from the caller's bitmap, then read-only: the flat buffer
/// keeps row-major order (index = y·width+x), and the output is produced
/// in the same shape.
pub struct Image {
    pub(crate) px: Box<[i_pixel]>,
    width: usize,
    height: usize,
}

impl Image {
    /// Describe a `width`×`height` slice of RGB pixels.
    ///
    /// See the [`rgb`] crate for making `[RGB16]` slices out of raw channel data.
    #[inline(always)]
    pub fn new(attr: &Attributes, pixels: &[RGB16], width: usize, height: usize) -> Result<Self, Error> {
        Self::new_stride(attr, pixels, width, height, width)
    }

    /// Stride is in pixels. Allows defining regions of larger images or
    /// images with padding without copying the region out first.
    ///
    /// Otherwise the same as [`Image::new`].
    pub fn new_stride(attr: &Attributes, pixels: &[RGB16], width: usize, height: usize, stride: usize) -> Result<Self, Error> {
        if !Self::check_image_size(width, height) || stride < width {
            return Err(ValueOutOfRange);
        }
        if pixels.len() < stride * (height - 1) + width {
            attr.verbose_print(format!("  error: buffer holds {} pixels, which is not enough for {width}×{height} with stride {stride}", pixels.len()));
            return Err(BufferTooSmall);
        }

        let mut px = Vec::new();
        px.try_reserve_exact(width * height)?;
        px.extend(
            pixels.chunks(stride)
                .take(height)
                .flat_map(|row| &row[..width])
                .copied()
                .map(i_pixel::from_rgb16),
        );
        Ok(Self { px: px.into_boxed_slice(), width, height })
    }

    fn check_image_size(width: usize, height: usize) -> bool {
        if width == 0 || height == 0 {
            return false;
        }
        match width.checked_mul(height) {
            Some(px) => px <= isize::MAX as usize / std::mem::size_of::<i_pixel>(),
            None => false,
        }
    }

    /// Width of the image in pixels
    #[must_use]
    #[inline(always)]
    pub fn width(&self) -> usize {
        self.width
    }

    /// Height of the image in pixels
    #[must_use]
    #[inline(always)]
    pub fn height(&self) -> usize {
        self.height
    }
}
