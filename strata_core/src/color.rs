// Copyright 2026 the Subduction Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Linear and packed vertex colors.

use core::ops::Mul;
#[cfg(not(feature = "std"))]
use kurbo::common::FloatFuncs as _;

/// A color with linear-light `f32` channels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LinearColor {
    /// Red.
    pub r: f32,
    /// Green.
    pub g: f32,
    /// Blue.
    pub b: f32,
    /// Alpha.
    pub a: f32,
}

impl LinearColor {
    /// Opaque white.
    pub const WHITE: Self = Self::new(1.0, 1.0, 1.0, 1.0);
    /// Opaque black.
    pub const BLACK: Self = Self::new(0.0, 0.0, 0.0, 1.0);
    /// Fully transparent black.
    pub const TRANSPARENT: Self = Self::new(0.0, 0.0, 0.0, 0.0);

    /// Creates a color from linear channels.
    #[inline]
    #[must_use]
    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// Linear interpolation between two colors.
    #[must_use]
    pub fn lerp(self, other: Self, t: f32) -> Self {
        Self {
            r: self.r + (other.r - self.r) * t,
            g: self.g + (other.g - self.g) * t,
            b: self.b + (other.b - self.b) * t,
            a: self.a + (other.a - self.a) * t,
        }
    }

    /// Quantizes to 8 bits per channel.
    ///
    /// When `srgb` is set the color channels are encoded with the sRGB
    /// transfer function; alpha is always linear.
    #[must_use]
    pub fn to_packed(self, srgb: bool) -> PackedColor {
        let encode = |c: f32| {
            let c = c.clamp(0.0, 1.0);
            if srgb {
                if c <= 0.003_130_8 {
                    c * 12.92
                } else {
                    1.055 * c.powf(1.0 / 2.4) - 0.055
                }
            } else {
                c
            }
        };
        PackedColor::new(
            quantize(encode(self.r)),
            quantize(encode(self.g)),
            quantize(encode(self.b)),
            quantize(self.a.clamp(0.0, 1.0)),
        )
    }
}

impl Default for LinearColor {
    fn default() -> Self {
        Self::WHITE
    }
}

impl Mul for LinearColor {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self {
        Self::new(
            self.r * rhs.r,
            self.g * rhs.g,
            self.b * rhs.b,
            self.a * rhs.a,
        )
    }
}

#[expect(
    clippy::cast_possible_truncation,
    reason = "input is clamped to [0, 1] so the scaled value fits in u8"
)]
#[inline]
fn quantize(c: f32) -> u8 {
    (c * 255.0 + 0.5).floor() as u8
}

/// An 8-bit-per-channel RGBA color as stored in vertices.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, bytemuck::Pod, bytemuck::Zeroable)]
pub struct PackedColor {
    /// Red.
    pub r: u8,
    /// Green.
    pub g: u8,
    /// Blue.
    pub b: u8,
    /// Alpha.
    pub a: u8,
}

impl PackedColor {
    /// Fully transparent black, used for feathering skirts.
    pub const TRANSPARENT: Self = Self::new(0, 0, 0, 0);
    /// Opaque white.
    pub const WHITE: Self = Self::new(255, 255, 255, 255);

    /// Creates a packed color from its channels.
    #[inline]
    #[must_use]
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linear_packing_rounds_to_nearest() {
        let c = LinearColor::new(1.0, 0.5, 0.0, 0.25).to_packed(false);
        assert_eq!(c, PackedColor::new(255, 128, 0, 64));
    }

    #[test]
    fn srgb_packing_brightens_midtones_but_not_alpha() {
        let c = LinearColor::new(0.5, 0.0, 1.0, 0.5).to_packed(true);
        assert_eq!(c.r, 188);
        assert_eq!(c.g, 0);
        assert_eq!(c.b, 255);
        assert_eq!(c.a, 128);
    }

    #[test]
    fn out_of_range_channels_are_clamped() {
        let c = LinearColor::new(2.0, -1.0, 0.0, 3.0).to_packed(false);
        assert_eq!(c, PackedColor::new(255, 0, 0, 255));
    }

    #[test]
    fn multiply_is_componentwise() {
        let c = LinearColor::new(0.5, 1.0, 0.25, 1.0) * LinearColor::new(0.5, 0.5, 1.0, 0.5);
        assert_eq!(c, LinearColor::new(0.25, 0.5, 0.25, 0.5));
    }
}
