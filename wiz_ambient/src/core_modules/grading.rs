// THEORY:
// The `ColorGrader` is the perceptual stage of the pipeline. A color that looks
// right on a monitor looks washed out and dim when it is thrown onto a wall by a
// bulb, so the selected color is re-graded in HSV space before it is sent:
//
// 1.  **Black threshold**: Near-black frames switch the bulb to black with zero
//     brightness, instead of a murky low-value tint.
// 2.  **Saturation boost**: Saturation is multiplied (harder in vibrant mode) and
//     capped at 1.0.
// 3.  **Value normalization**: Any color that is not nearly black is pushed to full
//     value. The bulb's brightness is controlled separately through `dimming`, so
//     the RGB triple only has to carry hue and saturation.
// 4.  **Brightness scaling**: The user's master brightness scales both the value
//     and the brightness command.

use crate::core_modules::pixel::pixel::Rgb;
use crate::pipeline::PipelineConfig;

/// A color ready to be sent to the bulb.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GradedColor {
    /// The re-graded RGB triple.
    pub rgb: Rgb,
    /// The brightness command on a 0-255 scale.
    pub brightness: u8,
}

/// Applies the HSV adjustments described above.
#[derive(Debug, Clone)]
pub struct ColorGrader {
    black_threshold: f64,
    value_boost_threshold: f64,
    saturation_boost: f64,
    vibrant_saturation_boost: f64,
}

impl ColorGrader {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            black_threshold: config.black_threshold,
            value_boost_threshold: config.value_boost_threshold,
            saturation_boost: config.saturation_boost,
            vibrant_saturation_boost: config.vibrant_saturation_boost,
        }
    }

    pub fn grade(&self, color: Rgb, vibrant: bool, brightness_scale: f64) -> GradedColor {
        let scale = brightness_scale.clamp(0.0, 1.0);
        let (hue, saturation, mut value) = rgb_to_hsv(
            color.r as f64 / 255.0,
            color.g as f64 / 255.0,
            color.b as f64 / 255.0,
        );

        // Stage 1: Black threshold
        if value < self.black_threshold {
            return GradedColor {
                rgb: Rgb::BLACK,
                brightness: 0,
            };
        }

        // Stage 2: Saturation boost
        let boost = if vibrant {
            self.vibrant_saturation_boost
        } else {
            self.saturation_boost
        };
        let saturation = (saturation * boost).min(1.0);

        // Stage 3: Value normalization and master brightness
        if value > self.value_boost_threshold {
            value = 1.0;
        }
        value *= scale;

        let (r, g, b) = hsv_to_rgb(hue, saturation, value);
        let to_byte = |c: f64| (c * 255.0) as u8;

        GradedColor {
            rgb: Rgb::new(to_byte(r), to_byte(g), to_byte(b)),
            brightness: (255.0 * scale) as u8,
        }
    }
}

// =====Conversions=====
// Hue is a fraction of a turn in `0.0..1.0`, not degrees. Channel bytes are
// truncated after scaling, so the operation order below must stay that of the
// six-sector formula or some channels drift by one.

/// Channels in `0.0..=1.0` to `(hue, saturation, value)`.
pub fn rgb_to_hsv(r: f64, g: f64, b: f64) -> (f64, f64, f64) {
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    if min == max {
        return (0.0, 0.0, max);
    }
    let range = max - min;
    let saturation = range / max;
    let rc = (max - r) / range;
    let gc = (max - g) / range;
    let bc = (max - b) / range;
    let hue = if r == max {
        bc - gc
    } else if g == max {
        2.0 + rc - bc
    } else {
        4.0 + gc - rc
    };
    ((hue / 6.0).rem_euclid(1.0), saturation, max)
}

/// `(hue, saturation, value)` back to channels in `0.0..=1.0`.
pub fn hsv_to_rgb(hue: f64, saturation: f64, value: f64) -> (f64, f64, f64) {
    if saturation == 0.0 {
        return (value, value, value);
    }
    let sector = (hue * 6.0).trunc();
    let f = hue * 6.0 - sector;
    let p = value * (1.0 - saturation);
    let q = value * (1.0 - saturation * f);
    let t = value * (1.0 - saturation * (1.0 - f));
    match (sector as i64).rem_euclid(6) {
        0 => (value, t, p),
        1 => (q, value, p),
        2 => (p, value, t),
        3 => (p, q, value),
        4 => (t, p, value),
        _ => (value, p, q),
    }
}
