// THEORY:
// The `pipeline` module is the top-level API of the color engine. It takes one
// captured frame at a time and runs it through the full stack:
//
//   capture -> Sample (downsample) -> ColorMode (select) -> TemporalSmoother
//           -> ColorGrader (perceptual) -> FrameColor (bulb-ready command)
//
// The pipeline owns the only piece of state that must survive between frames
// (the smoother's memory). Everything the user can change while the sync is
// running arrives per frame through `FrameSettings`, so a settings change is
// picked up on the very next frame without rebuilding anything.

use crate::core_modules::color_selector::ColorMode;
use crate::core_modules::grading::ColorGrader;
use crate::core_modules::pixel::pixel::Rgb;
use crate::core_modules::sample::sample::Sample;
use crate::core_modules::smoother::TemporalSmoother;
use crate::error::Result;
use image::RgbaImage;
use serde::{Deserialize, Serialize};

/// Tunable constants of the color pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Keep every Nth row and column of the capture.
    pub sample_stride: u32,
    /// Channel bucket size used when voting for the dominant color.
    pub quantize_step: u8,
    /// A pixel must be more saturated than this to vote in dominant mode.
    pub min_saturation: f32,
    /// A pixel's max channel must exceed this to vote in dominant mode.
    pub min_value: u8,
    /// Weight of the newest frame in the moving average.
    pub smoothing_factor: f64,
    /// HSV value below which the bulb is sent black.
    pub black_threshold: f64,
    /// HSV value above which the color is pushed to full value.
    pub value_boost_threshold: f64,
    /// Saturation multiplier in normal mode.
    pub saturation_boost: f64,
    /// Saturation multiplier in vibrant mode.
    pub vibrant_saturation_boost: f64,
    /// Bulb transition time when smoothing is on, in milliseconds.
    pub smooth_speed_ms: u16,
    /// Bulb transition time when smoothing is off, in milliseconds.
    pub sharp_speed_ms: u16,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            sample_stride: 15,
            quantize_step: 8,
            min_saturation: 0.15,
            min_value: 40,
            smoothing_factor: 0.4,
            black_threshold: 0.08,
            value_boost_threshold: 0.15,
            saturation_boost: 1.2,
            vibrant_saturation_boost: 2.0,
            smooth_speed_ms: 150,
            sharp_speed_ms: 120,
        }
    }
}

/// The per-frame knobs a user may turn while the pipeline is running.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameSettings {
    pub mode: ColorMode,
    pub smoothing: bool,
    pub vibrant: bool,
    pub brightness_scale: f64,
}

impl Default for FrameSettings {
    fn default() -> Self {
        Self {
            mode: ColorMode::Dominant,
            smoothing: true,
            vibrant: false,
            brightness_scale: 1.0,
        }
    }
}

/// Everything the pipeline learned about one frame, including the bulb command.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrameColor {
    /// The color chosen by the selector, before smoothing.
    pub selected: Rgb,
    /// The color after temporal smoothing.
    pub smoothed: Rgb,
    /// The color to send to the bulb.
    pub output: Rgb,
    /// Bulb brightness on a 0-255 scale.
    pub brightness: u8,
    /// Bulb transition speed in milliseconds.
    pub speed_ms: u16,
}

impl FrameColor {
    /// `#rrggbb` preview of the output color.
    pub fn hex(&self) -> String {
        self.output.hex()
    }
}

/// The main, top-level struct of the color engine.
pub struct ColorPipeline {
    config: PipelineConfig,
    smoother: TemporalSmoother,
    grader: ColorGrader,
    frames_processed: u64,
}

impl ColorPipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            smoother: TemporalSmoother::new(config.smoothing_factor),
            grader: ColorGrader::new(&config),
            config,
            frames_processed: 0,
        }
    }

    pub fn process_frame(&mut self, frame: &RgbaImage, settings: &FrameSettings) -> Result<FrameColor> {
        // Stage 1: Spatial Downsampling
        let sample = Sample::from_frame(frame, self.config.sample_stride)?;
        Ok(self.process_sample(&sample, settings))
    }

    pub fn process_sample(&mut self, sample: &Sample, settings: &FrameSettings) -> FrameColor {
        // Stage 2: Color Selection
        let selected = settings.mode.select(sample, &self.config);

        // Stage 3: Temporal Smoothing
        let smoothed = self.smoother.apply(selected, settings.smoothing);

        // Stage 4: Perceptual Grading
        let graded = self
            .grader
            .grade(smoothed, settings.vibrant, settings.brightness_scale);

        self.frames_processed += 1;

        FrameColor {
            selected,
            smoothed,
            output: graded.rgb,
            brightness: graded.brightness,
            speed_ms: if settings.smoothing {
                self.config.smooth_speed_ms
            } else {
                self.config.sharp_speed_ms
            },
        }
    }

    /// Forgets the smoothing memory, as if the pipeline had just been created.
    pub fn reset(&mut self) {
        self.smoother.reset();
        self.frames_processed = 0;
    }

    pub fn frames_processed(&self) -> u64 {
        self.frames_processed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn solid(r: u8, g: u8, b: u8) -> RgbaImage {
        RgbaImage::from_pixel(60, 45, Rgba([r, g, b, 255]))
    }

    #[test]
    fn sharp_mode_sends_graded_color_at_fast_speed() {
        let mut pipeline = ColorPipeline::new(PipelineConfig::default());
        let settings = FrameSettings {
            smoothing: false,
            ..FrameSettings::default()
        };

        let color = pipeline.process_frame(&solid(255, 0, 0), &settings).unwrap();
        assert_eq!(color.selected, Rgb::new(248, 0, 0));
        assert_eq!(color.smoothed, color.selected);
        assert_eq!(color.output, Rgb::new(255, 0, 0));
        assert_eq!(color.brightness, 255);
        assert_eq!(color.speed_ms, 120);
        assert_eq!(color.hex(), "#ff0000");
    }

    #[test]
    fn smoothing_fades_in_from_black() {
        let mut pipeline = ColorPipeline::new(PipelineConfig::default());
        let settings = FrameSettings::default();

        let first = pipeline.process_frame(&solid(0, 0, 200), &settings).unwrap();
        assert_eq!(first.selected, Rgb::new(0, 0, 200));
        assert_eq!(first.smoothed, Rgb::new(0, 0, 80));
        assert_eq!(first.speed_ms, 150);

        let second = pipeline.process_frame(&solid(0, 0, 200), &settings).unwrap();
        assert_eq!(second.smoothed, Rgb::new(0, 0, 128));
        assert_eq!(pipeline.frames_processed(), 2);
    }

    #[test]
    fn black_screen_turns_bulb_dark() {
        let mut pipeline = ColorPipeline::new(PipelineConfig::default());
        let color = pipeline
            .process_frame(&solid(0, 0, 0), &FrameSettings::default())
            .unwrap();
        assert_eq!(color.output, Rgb::BLACK);
        assert_eq!(color.brightness, 0);
    }

    #[test]
    fn average_mode_uses_rms() {
        let mut pipeline = ColorPipeline::new(PipelineConfig::default());
        let settings = FrameSettings {
            mode: ColorMode::Average,
            smoothing: false,
            ..FrameSettings::default()
        };
        let color = pipeline.process_frame(&solid(10, 20, 30), &settings).unwrap();
        assert_eq!(color.selected, Rgb::new(10, 20, 30));
    }

    #[test]
    fn reset_clears_smoothing_memory() {
        let mut pipeline = ColorPipeline::new(PipelineConfig::default());
        let settings = FrameSettings::default();
        pipeline.process_frame(&solid(0, 200, 0), &settings).unwrap();
        pipeline.reset();
        let color = pipeline.process_frame(&solid(0, 200, 0), &settings).unwrap();
        assert_eq!(color.smoothed, Rgb::new(0, 80, 0));
    }
}
