// THEORY:
// The `color_selector` module turns a downsampled `Sample` into one color. It is
// the "classification" stage of the pipeline and offers two heuristics, chosen at
// runtime through `ColorMode`:
//
// 1.  **Dominant**: A vote. Desktop content is mostly gray chrome, dark panels and
//     text, so the raw mode of a frame is almost always a background shade. Pixels
//     are therefore screened first: only those with noticeable saturation and
//     enough brightness may vote. If nothing survives (a fully gray scene), every
//     pixel votes instead. Votes are cast on quantized colors so that gradients
//     and compression noise collapse into shared buckets.
// 2.  **Average**: A root-mean-square mean per channel. RMS leans toward the
//     brighter pixels compared to a plain mean, which keeps small bright areas
//     from being drowned out by dark surroundings.
//
// Both heuristics are pure functions of the sample and the pipeline tunables.

use crate::core_modules::pixel::pixel::{Pixel, Rgb};
use crate::core_modules::sample::sample::Sample;
use crate::error::AmbientError;
use crate::pipeline::PipelineConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Which heuristic reduces a sample to a single color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorMode {
    /// Most frequent saturated color.
    #[default]
    Dominant,
    /// Root-mean-square average of every sampled pixel.
    Average,
}

impl ColorMode {
    pub fn select(&self, sample: &Sample, config: &PipelineConfig) -> Rgb {
        match self {
            ColorMode::Dominant => dominant_color(sample, config),
            ColorMode::Average => average_color(sample),
        }
    }
}

impl fmt::Display for ColorMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColorMode::Dominant => f.write_str("dominant"),
            ColorMode::Average => f.write_str("average"),
        }
    }
}

impl FromStr for ColorMode {
    type Err = AmbientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dominant" => Ok(ColorMode::Dominant),
            "average" => Ok(ColorMode::Average),
            other => Err(AmbientError::invalid_parameter("color_mode", other)),
        }
    }
}

/// True when a pixel is colorful and bright enough to vote in dominant mode.
fn is_vivid(pixel: &Pixel, config: &PipelineConfig) -> bool {
    pixel.saturation() > config.min_saturation && pixel.value() > config.min_value
}

/// Picks the most frequent quantized color among the vivid pixels of `sample`.
///
/// Falls back to every pixel when none are vivid. Ties resolve to the color with
/// the smallest (blue, green, red) tuple.
pub fn dominant_color(sample: &Sample, config: &PipelineConfig) -> Rgb {
    let vivid: Vec<&Pixel> = sample
        .pixels
        .iter()
        .filter(|p| is_vivid(p, config))
        .collect();

    let voters: Vec<&Pixel> = if vivid.is_empty() {
        sample.pixels.iter().collect()
    } else {
        vivid
    };

    let mut votes: HashMap<Pixel, u32> = HashMap::new();
    for pixel in voters {
        *votes.entry(pixel.quantized(config.quantize_step)).or_insert(0) += 1;
    }

    votes
        .into_iter()
        .max_by(|(a, count_a), (b, count_b)| {
            count_a
                .cmp(count_b)
                .then_with(|| b.bgr_key().cmp(&a.bgr_key()))
        })
        .map(|(pixel, _)| Rgb::from(pixel))
        .unwrap_or(Rgb::BLACK)
}

/// Per-channel root-mean-square over every pixel of `sample`, truncated.
pub fn average_color(sample: &Sample) -> Rgb {
    if sample.is_empty() {
        return Rgb::BLACK;
    }

    let (mut sum_r, mut sum_g, mut sum_b) = (0f64, 0f64, 0f64);
    for pixel in &sample.pixels {
        sum_r += (pixel.red as f64).powi(2);
        sum_g += (pixel.green as f64).powi(2);
        sum_b += (pixel.blue as f64).powi(2);
    }

    let count = sample.len() as f64;
    let rms = |sum: f64| (sum / count).sqrt() as u8;
    Rgb::new(rms(sum_r), rms(sum_g), rms(sum_b))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_of(pixels: &[(u8, u8, u8)]) -> Sample {
        Sample::from_pixels(
            pixels
                .iter()
                .map(|&(r, g, b)| Pixel::new(r, g, b))
                .collect(),
        )
    }

    #[test]
    fn dominant_ignores_gray_background() {
        let config = PipelineConfig::default();
        let mut pixels = vec![(128, 128, 128); 50];
        pixels.extend(vec![(200, 30, 30); 5]);
        let color = dominant_color(&sample_of(&pixels), &config);
        assert_eq!(color, Rgb::new(200, 24, 24));
    }

    #[test]
    fn dominant_ignores_dark_saturated_pixels() {
        let config = PipelineConfig::default();
        let mut pixels = vec![(40, 0, 0); 20];
        pixels.extend(vec![(0, 0, 250); 2]);
        let color = dominant_color(&sample_of(&pixels), &config);
        assert_eq!(color, Rgb::new(0, 0, 248));
    }

    #[test]
    fn dominant_falls_back_when_scene_is_gray() {
        let config = PipelineConfig::default();
        let pixels = vec![(10, 10, 10), (100, 100, 100), (100, 100, 100)];
        let color = dominant_color(&sample_of(&pixels), &config);
        assert_eq!(color, Rgb::new(96, 96, 96));
    }

    #[test]
    fn dominant_tie_prefers_smallest_bgr() {
        let config = PipelineConfig::default();
        let pixels = vec![(0, 200, 0), (200, 0, 0), (0, 0, 200)];
        let color = dominant_color(&sample_of(&pixels), &config);
        // (b, g, r) keys: (0,200,0), (0,0,200), (200,0,0); red is smallest.
        assert_eq!(color, Rgb::new(200, 0, 0));
    }

    #[test]
    fn dominant_of_empty_sample_is_black() {
        let config = PipelineConfig::default();
        assert_eq!(dominant_color(&Sample::default(), &config), Rgb::BLACK);
    }

    #[test]
    fn average_uses_root_mean_square() {
        let pixels = vec![(0, 100, 255), (200, 100, 255)];
        let color = average_color(&sample_of(&pixels));
        // sqrt((0 + 40000) / 2) = 141.42
        assert_eq!(color, Rgb::new(141, 100, 255));
    }

    #[test]
    fn average_of_empty_sample_is_black() {
        assert_eq!(average_color(&Sample::default()), Rgb::BLACK);
    }

    #[test]
    fn mode_parses_case_insensitively() {
        assert_eq!("Average".parse::<ColorMode>().unwrap(), ColorMode::Average);
        assert_eq!(" dominant ".parse::<ColorMode>().unwrap(), ColorMode::Dominant);
        assert!("median".parse::<ColorMode>().is_err());
    }
}
