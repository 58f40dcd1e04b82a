// THEORY (Single-Pixel Heuristics):
// The `Pixel` module is the smallest unit of the color pipeline. It is a "dumb"
// container for one sampled screen pixel plus the handful of 1-dimensional
// heuristics the color selector needs to decide whether that pixel carries real
// color or is just background noise. Nothing here looks at neighbors or history.
//
// Heuristic families:
// - Brightness:  HSV value as the raw max(R, G, B) byte.
// - Color strength: chroma (max - min) and HSV saturation (chroma / value).
// - Bucketing:   quantization of each channel down to a fixed step, so that
//                near-identical shades vote for the same color.
//
// The module also defines `Rgb`, the color that leaves the pipeline and is
// sent to the bulb. It knows how to print itself as a `#rrggbb` preview.
//
// Key principles:
// 1) Integer channels in, integer channels out. Floats only appear in saturation.
// 2) Alpha is dropped at sampling time; screen captures are always opaque.

pub mod pixel {
    use serde::{Deserialize, Serialize};
    use std::fmt;

    pub type Channel = u8;
    pub type ValueHSV = u8;
    pub type Chroma = u8;
    pub type SaturationHSV = f32;

    /// A "dumb" data container representing a single sampled pixel.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Pixel {
        /// The red channel value (0-255).
        pub red: Channel,
        /// The green channel value (0-255).
        pub green: Channel,
        /// The blue channel value (0-255).
        pub blue: Channel,
    }

    impl Pixel {
        pub fn new(red: Channel, green: Channel, blue: Channel) -> Self {
            Pixel { red, green, blue }
        }

        /// =================================Heuristics==================================

        /// HSV Value (V): brightness defined as max(R, G, B) on the byte scale.
        pub fn value(&self) -> ValueHSV {
            self.red.max(self.green.max(self.blue))
        }

        /// Chroma: max(R, G, B) - min(R, G, B).
        pub fn chroma(&self) -> Chroma {
            self.value() - self.red.min(self.green.min(self.blue))
        }

        /// HSV Saturation (S): chroma / value, 0.0 for pure black.
        pub fn saturation(&self) -> SaturationHSV {
            let value = self.value();
            if value == 0 {
                return 0.0;
            }
            self.chroma() as SaturationHSV / value as SaturationHSV
        }

        /// Drops each channel down to the nearest multiple of `step`.
        /// A step of 0 or 1 leaves the pixel untouched.
        pub fn quantized(&self, step: u8) -> Pixel {
            if step <= 1 {
                return *self;
            }
            Pixel {
                red: (self.red / step) * step,
                green: (self.green / step) * step,
                blue: (self.blue / step) * step,
            }
        }

        /// Ordering key used to break ties between equally frequent colors.
        /// Blue first, then green, then red.
        pub fn bgr_key(&self) -> (Channel, Channel, Channel) {
            (self.blue, self.green, self.red)
        }
    }

    impl From<&[u8]> for Pixel {
        /// Reads the first three bytes of an RGBA slice.
        fn from(bytes: &[u8]) -> Self {
            Pixel::new(bytes[0], bytes[1], bytes[2])
        }
    }

    impl From<Pixel> for Rgb {
        fn from(pixel: Pixel) -> Self {
            Rgb::new(pixel.red, pixel.green, pixel.blue)
        }
    }

    /// An output color, as sent to the bulb and shown in previews.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
    pub struct Rgb {
        pub r: Channel,
        pub g: Channel,
        pub b: Channel,
    }

    impl Rgb {
        pub const BLACK: Rgb = Rgb { r: 0, g: 0, b: 0 };

        pub const fn new(r: Channel, g: Channel, b: Channel) -> Self {
            Rgb { r, g, b }
        }

        /// Lowercase `#rrggbb` representation.
        pub fn hex(&self) -> String {
            format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
        }
    }

    impl fmt::Display for Rgb {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str(&self.hex())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::pixel::*;

    #[test]
    fn saturation_of_black_is_zero() {
        assert_eq!(Pixel::new(0, 0, 0).saturation(), 0.0);
    }

    #[test]
    fn saturation_and_value_follow_hsv() {
        let pixel = Pixel::new(200, 100, 50);
        assert_eq!(pixel.value(), 200);
        assert_eq!(pixel.chroma(), 150);
        assert!((pixel.saturation() - 0.75).abs() < 1e-6);
    }

    #[test]
    fn quantization_floors_to_step() {
        let pixel = Pixel::new(255, 7, 8).quantized(8);
        assert_eq!(pixel, Pixel::new(248, 0, 8));
    }

    #[test]
    fn hex_is_lowercase_and_padded() {
        assert_eq!(Rgb::new(10, 171, 255).hex(), "#0aabff");
        assert_eq!(Rgb::BLACK.to_string(), "#000000");
    }
}
