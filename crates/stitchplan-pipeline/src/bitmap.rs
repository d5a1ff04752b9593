//! Bitmap access and image decoding.
//!
//! The quantizer and planner only need to read pixels, so they are
//! written against the [`Bitmap`] trait. Two implementations ship with
//! the crate: [`image::RgbaImage`] (what the decoder produces) and
//! [`ArgbBitmap`], a plain packed buffer for callers that already hold
//! ARGB pixels.

use image::{DynamicImage, RgbaImage};

use crate::color::Argb;
use crate::types::PipelineError;

/// Read-only pixel access.
pub trait Bitmap {
    /// Width in pixels.
    fn width(&self) -> u32;

    /// Height in pixels.
    fn height(&self) -> u32;

    /// Color at `(x, y)`. Callers stay within `width() x height()`.
    fn pixel(&self, x: u32, y: u32) -> Argb;

    /// Returns `true` if the bitmap holds no pixels.
    fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }
}

impl Bitmap for RgbaImage {
    fn width(&self) -> u32 {
        self.width()
    }

    fn height(&self) -> u32 {
        self.height()
    }

    fn pixel(&self, x: u32, y: u32) -> Argb {
        Argb::from_rgba(*self.get_pixel(x, y))
    }
}

/// A row-major buffer of packed ARGB pixels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArgbBitmap {
    width: u32,
    height: u32,
    pixels: Vec<Argb>,
}

impl ArgbBitmap {
    /// Wrap a row-major pixel buffer.
    ///
    /// Returns `None` if `pixels.len() != width * height`.
    #[must_use]
    pub fn from_pixels(width: u32, height: u32, pixels: Vec<Argb>) -> Option<Self> {
        let expected = u64::from(width) * u64::from(height);
        (pixels.len() as u64 == expected).then_some(Self {
            width,
            height,
            pixels,
        })
    }

    /// A bitmap filled with a single color.
    #[must_use]
    pub fn filled(width: u32, height: u32, color: Argb) -> Self {
        let len = width as usize * height as usize;
        Self {
            width,
            height,
            pixels: vec![color; len],
        }
    }

    /// The row-major pixel buffer.
    #[must_use]
    pub fn pixels(&self) -> &[Argb] {
        &self.pixels
    }

    /// Convert into an RGBA image.
    #[must_use]
    pub fn to_rgba_image(&self) -> RgbaImage {
        RgbaImage::from_fn(self.width, self.height, |x, y| {
            Bitmap::pixel(self, x, y).to_rgba()
        })
    }
}

impl Bitmap for ArgbBitmap {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn pixel(&self, x: u32, y: u32) -> Argb {
        let index = y as usize * self.width as usize + x as usize;
        self.pixels.get(index).copied().unwrap_or(Argb::TRANSPARENT)
    }
}

/// Copy any [`Bitmap`] into an RGBA image.
#[must_use]
pub fn to_rgba_image<B: Bitmap + ?Sized>(bitmap: &B) -> RgbaImage {
    RgbaImage::from_fn(bitmap.width(), bitmap.height(), |x, y| {
        bitmap.pixel(x, y).to_rgba()
    })
}

/// Decode raw image bytes (PNG, JPEG, BMP, WebP).
///
/// # Errors
///
/// Returns [`PipelineError::EmptyInput`] if `bytes` is empty.
/// Returns [`PipelineError::ImageDecode`] if the image format is
/// unrecognized or the data is corrupt.
pub fn decode(bytes: &[u8]) -> Result<DynamicImage, PipelineError> {
    if bytes.is_empty() {
        return Err(PipelineError::EmptyInput);
    }
    Ok(image::load_from_memory(bytes)?)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn encode_png(img: &RgbaImage) -> Vec<u8> {
        let mut buf = Vec::new();
        let encoder = image::codecs::png::PngEncoder::new(&mut buf);
        image::ImageEncoder::write_image(
            encoder,
            img.as_raw(),
            img.width(),
            img.height(),
            image::ExtendedColorType::Rgba8,
        )
        .unwrap();
        buf
    }

    #[test]
    fn empty_input_returns_error() {
        assert!(matches!(decode(&[]), Err(PipelineError::EmptyInput)));
    }

    #[test]
    fn corrupt_bytes_returns_image_decode_error() {
        let result = decode(&[0xFF, 0xFE, 0x00, 0x01]);
        assert!(matches!(result, Err(PipelineError::ImageDecode(_))));
    }

    #[test]
    fn png_decodes_with_alpha_intact() {
        let img = RgbaImage::from_fn(3, 2, |x, _| {
            if x == 0 {
                image::Rgba([0, 0, 0, 0])
            } else {
                image::Rgba([255, 0, 0, 255])
            }
        });
        let decoded = decode(&encode_png(&img)).unwrap().to_rgba8();
        assert_eq!(decoded.dimensions(), (3, 2));
        assert_eq!(Bitmap::pixel(&decoded, 0, 0).alpha(), 0);
        assert_eq!(Bitmap::pixel(&decoded, 1, 1), Argb::rgb(255, 0, 0));
    }

    #[test]
    fn argb_bitmap_rejects_wrong_length() {
        assert!(ArgbBitmap::from_pixels(2, 2, vec![Argb::BLACK; 3]).is_none());
        assert!(ArgbBitmap::from_pixels(2, 2, vec![Argb::BLACK; 4]).is_some());
    }

    #[test]
    fn argb_bitmap_is_row_major() {
        let bmp = ArgbBitmap::from_pixels(
            2,
            2,
            vec![Argb(0xFF00_0001), Argb(0xFF00_0002), Argb(0xFF00_0003), Argb(0xFF00_0004)],
        )
        .unwrap();
        assert_eq!(bmp.pixel(1, 0), Argb(0xFF00_0002));
        assert_eq!(bmp.pixel(0, 1), Argb(0xFF00_0003));
    }

    #[test]
    fn argb_bitmap_converts_to_rgba_image() {
        let bmp = ArgbBitmap::filled(4, 3, Argb::rgb(1, 2, 3));
        let img = bmp.to_rgba_image();
        assert_eq!(img.dimensions(), (4, 3));
        assert_eq!(*img.get_pixel(3, 2), image::Rgba([1, 2, 3, 255]));
    }

    #[test]
    fn zero_area_bitmap_is_empty() {
        assert!(ArgbBitmap::filled(0, 5, Argb::BLACK).is_empty());
        assert!(!ArgbBitmap::filled(1, 1, Argb::BLACK).is_empty());
    }
}
