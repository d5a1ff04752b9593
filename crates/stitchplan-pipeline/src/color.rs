//! Packed ARGB colors and perceptual color distance.
//!
//! Alpha is treated as a binary mask: only fully opaque pixels (alpha
//! 255) carry a thread color. Everything else collapses to
//! [`Argb::TRANSPARENT`].
//!
//! Distances are measured in CIE L\*a\*b\* (D65) via the [`palette`]
//! crate. Plain RGB distance merges saturated hues that look nothing
//! alike, so it is never used for quantization decisions.

use std::fmt;

use palette::white_point::D65;
use palette::{FromColor, Lab, Srgb};
use serde::{Deserialize, Serialize};

/// A 32-bit color packed as `0xAARRGGBB`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Argb(pub u32);

impl Argb {
    /// Fully transparent black. Also the histogram key for all
    /// non-opaque pixels.
    pub const TRANSPARENT: Self = Self(0x0000_0000);

    /// Opaque black, the default satin border color.
    pub const BLACK: Self = Self(0xFF00_0000);

    /// Opaque white.
    pub const WHITE: Self = Self(0xFFFF_FFFF);

    /// Build an opaque color from RGB components.
    #[must_use]
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self::argb(0xFF, r, g, b)
    }

    /// Build a color from all four components.
    #[must_use]
    pub const fn argb(a: u8, r: u8, g: u8, b: u8) -> Self {
        Self(((a as u32) << 24) | ((r as u32) << 16) | ((g as u32) << 8) | (b as u32))
    }

    /// Alpha component.
    #[must_use]
    pub const fn alpha(self) -> u8 {
        (self.0 >> 24) as u8
    }

    /// Red component.
    #[must_use]
    pub const fn red(self) -> u8 {
        (self.0 >> 16) as u8
    }

    /// Green component.
    #[must_use]
    pub const fn green(self) -> u8 {
        (self.0 >> 8) as u8
    }

    /// Blue component.
    #[must_use]
    pub const fn blue(self) -> u8 {
        self.0 as u8
    }

    /// Returns `true` only for alpha 255.
    #[must_use]
    pub const fn is_opaque(self) -> bool {
        self.alpha() == 0xFF
    }

    /// Opaque colors pass through; everything else becomes
    /// [`Argb::TRANSPARENT`].
    #[must_use]
    pub const fn normalized(self) -> Self {
        if self.is_opaque() {
            self
        } else {
            Self::TRANSPARENT
        }
    }

    /// Convert from an `image` RGBA pixel.
    #[must_use]
    pub const fn from_rgba(pixel: image::Rgba<u8>) -> Self {
        let [r, g, b, a] = pixel.0;
        Self::argb(a, r, g, b)
    }

    /// Convert into an `image` RGBA pixel.
    #[must_use]
    pub const fn to_rgba(self) -> image::Rgba<u8> {
        image::Rgba([self.red(), self.green(), self.blue(), self.alpha()])
    }

    /// CIE L\*a\*b\* coordinates of the RGB part (alpha ignored).
    #[must_use]
    pub fn to_lab(self) -> Lab<D65, f32> {
        let srgb: Srgb<f32> = Srgb::new(self.red(), self.green(), self.blue()).into_format();
        Lab::from_color(srgb)
    }

    /// `#RRGGBB` hex string (alpha dropped).
    #[must_use]
    pub fn hex(self) -> String {
        format!("#{:02X}{:02X}{:02X}", self.red(), self.green(), self.blue())
    }
}

impl fmt::Display for Argb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:08X}", self.0)
    }
}

impl From<u32> for Argb {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl From<Argb> for u32 {
    fn from(value: Argb) -> Self {
        value.0
    }
}

/// Euclidean distance between two points in L\*a\*b\* space.
#[must_use]
pub fn lab_distance(a: Lab<D65, f32>, b: Lab<D65, f32>) -> f32 {
    let dl = a.l - b.l;
    let da = a.a - b.a;
    let db = a.b - b.b;
    dl.mul_add(dl, da.mul_add(da, db * db)).sqrt()
}

/// Perceptual distance between two colors.
///
/// Non-opaque colors have distance zero to everything, so transparent
/// pixels never influence a merge decision.
#[must_use]
pub fn perceptual_distance(a: Argb, b: Argb) -> f32 {
    if !a.is_opaque() || !b.is_opaque() {
        return 0.0;
    }
    lab_distance(a.to_lab(), b.to_lab())
}
