//! Seeded k-means color quantization.
//!
//! Reduces an image to `k` representative colors (2-256) by clustering
//! its pixels, then recolors every pixel with its nearest cluster
//! center. Image decoding/encoding is out of scope; the library consumes
//! and produces flat buffers of 16-bit [`RGB16`] pixels.
//!
//! ```rust
//! let pixels: Vec<posterize::RGB16> = decoded_bitmap();
//!
//! let mut attr = posterize::new();
//! attr.set_colors(8)?;
//! let image = attr.new_image(&pixels, width, height)?;
//!
//! let result = attr.quantize(&image, 0)?;
//! let recolored = result.remapped(&image)?;
//! ```
//!
//! Runs are reproducible: the same pixels, settings and seed always
//! produce the same output, bit for bit, with or without threads.

mod attr;
mod error;
mod image;
mod kmeans;
mod nearest;
mod pal;
mod plusplus;
mod quant;
mod remap;

#[cfg(feature = "threads")]
mod rayoff {
    pub(crate) use rayon::prelude::{IndexedParallelIterator, ParallelIterator, ParallelSlice, ParallelSliceMut};
    pub(crate) use thread_local::ThreadLocal;
}
#[cfg(not(feature = "threads"))]
mod rayoff;

pub use crate::attr::Attributes;
pub use crate::error::Error;
pub use crate::image::Image;
pub use crate::pal::RGB16;
pub use crate::quant::QuantizationResult;

/// [`Attributes`] is the main "handle" for configuring the process
#[inline]
#[must_use]
pub fn new() -> Attributes {
    Attributes::new()
}

/// One-call quantization: reduce `width`×`height` pixels to `colors`
/// representative colors picked by a k-means run seeded with `seed`, and
/// recolor every pixel with its nearest pick.
///
/// On a configuration error nothing is allocated and the input is left
/// unread. See [`Attributes`] for the tunable version of this.
pub fn quantize(pixels: &[RGB16], width: usize, height: usize, colors: u32, seed: u64) -> Result<Vec<RGB16>, Error> {
    let mut attr = Attributes::new();
    attr.set_colors(colors)?;
    let image = attr.new_image(pixels, width, height)?;
    attr.quantize(&image, seed)?.remapped(&image)
}

#[test]
fn poke_it() {
    let width = 10usize;
    let height = 10usize;
    let mut fakebitmap = vec![RGB16::new(65535, 65535, 65535); width * height];

    fakebitmap[0] = RGB16::new(0x5500, 0x6600, 0x7700);

    let result = quantize(&fakebitmap, width, height, 2, 0).unwrap();
    assert_eq!(width * height, result.len());
    // both colors survive: each is the exact mean of its own cluster
    assert_eq!(fakebitmap, result);
}

#[test]
fn rejects_degenerate_cluster_counts() {
    let px = vec![RGB16::new(0, 0, 0); 4];
    assert_eq!(Err(Error::ValueOutOfRange), quantize(&px, 2, 2, 0, 0));
    assert_eq!(Err(Error::ValueOutOfRange), quantize(&px, 2, 2, 1, 0));
    assert_eq!(Err(Error::ValueOutOfRange), quantize(&px, 2, 2, 257, 0));
    assert!(quantize(&px, 2, 2, 2, 0).is_ok());
}

#[test]
fn thread() {
    let attr = new();
    std::thread::spawn(move || {
        let b = vec![RGB16::new(0, 0, 0); 1];
        attr.new_image(&b, 1, 1).unwrap();
    }).join().unwrap();
}
