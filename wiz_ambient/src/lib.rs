// THEORY:
// This file is the main entry point for the `wiz_ambient` library crate. It
// exposes the engine behind the two command-line tools in this workspace:
//
// - `pipeline`   : the per-frame color engine (`ColorPipeline`, `PipelineConfig`).
// - `sync`       : the fixed-rate capture loop and its controller.
// - `capture`    : screen grabbing behind the `FrameSource` trait.
// - `bulb`       : the minimal WiZ UDP client and network discovery.
// - `config`     : file and environment configuration.
//
// The per-pixel and per-sample analyzers live in `core_modules` and are reached
// through the pipeline. Only the value types a front end needs are re-exported.

pub mod bulb;
pub mod capture;
pub mod config;
pub mod core_modules;
pub mod error;
pub mod pipeline;
pub mod sync;

pub use core_modules::color_selector::ColorMode;
pub use core_modules::pixel::pixel::Rgb;
pub use error::{AmbientError, Result};
