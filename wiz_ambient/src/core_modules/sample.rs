// THEORY:
// The `Sample` module is the spatial pooling step of the color pipeline. A full
// screen capture holds millions of pixels, but a single representative color
// does not need them all. Keeping every Nth row and every Nth column (a strided
// grid, 15 by default) reduces the work by two orders of magnitude while still
// covering the whole region evenly.
//
// Key architectural principles:
// 1.  **Strided Sampling**: No averaging or filtering happens here. Pixels are
//     picked on a regular lattice starting at (0, 0), so a solid-colored region
//     yields exactly that color and small UI details are rarely hit.
// 2.  **Data Container**: Like `Pixel`, a `Sample` is a "dumb" container. It
//     holds a flat `Vec<Pixel>` and knows nothing about color selection.

pub mod sample {
    use crate::core_modules::pixel::pixel::Pixel;
    use crate::error::{AmbientError, Result};
    use image::RgbaImage;

    /// A downsampled set of pixels taken from one captured frame.
    #[derive(Debug, Clone, Default)]
    pub struct Sample {
        /// The number of sampled columns.
        pub width: u32,
        /// The number of sampled rows.
        pub height: u32,
        /// Row-major sampled pixels.
        pub pixels: Vec<Pixel>,
    }

    impl Sample {
        /// Takes every `stride`-th pixel of every `stride`-th row of `frame`.
        pub fn from_frame(frame: &RgbaImage, stride: u32) -> Result<Self> {
            if stride == 0 {
                return Err(AmbientError::invalid_parameter("sample_stride", stride));
            }

            let width = frame.width().div_ceil(stride);
            let height = frame.height().div_ceil(stride);
            let mut pixels = Vec::with_capacity((width * height) as usize);

            for y in (0..frame.height()).step_by(stride as usize) {
                for x in (0..frame.width()).step_by(stride as usize) {
                    pixels.push(Pixel::from(&frame.get_pixel(x, y).0[..]));
                }
            }

            Ok(Self {
                width,
                height,
                pixels,
            })
        }

        pub fn from_pixels(pixels: Vec<Pixel>) -> Self {
            Self {
                width: pixels.len() as u32,
                height: if pixels.is_empty() { 0 } else { 1 },
                pixels,
            }
        }

        pub fn is_empty(&self) -> bool {
            self.pixels.is_empty()
        }

        pub fn len(&self) -> usize {
            self.pixels.len()
        }
    }
}
