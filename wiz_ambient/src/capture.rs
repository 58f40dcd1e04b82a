// THEORY:
// The `capture` module is the input edge of the engine. It hides the platform
// screen grabber (`xcap`) behind the small `FrameSource` trait so that the sync
// loop only ever sees `RgbaImage`s. Tests drive the loop with synthetic sources.
//
// A `Region` is expressed in virtual-desktop coordinates (the space that spans
// every monitor). When a region is requested, the capturer finds the monitor that
// contains its top-left corner, translates the rectangle into that monitor's
// local coordinates, and clips it to the monitor's bounds.

use crate::error::{AmbientError, Result};
use image::RgbaImage;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use xcap::Monitor;

/// Both sides of a region must be strictly larger than this.
pub const MIN_REGION_SIDE: u32 = 10;

/// A rectangle of the virtual desktop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawRegion")]
pub struct Region {
    pub left: i32,
    pub top: i32,
    pub width: u32,
    pub height: u32,
}

#[derive(Deserialize)]
struct RawRegion {
    left: i32,
    top: i32,
    width: u32,
    height: u32,
}

impl TryFrom<RawRegion> for Region {
    type Error = AmbientError;

    fn try_from(raw: RawRegion) -> Result<Self> {
        Region::new(raw.left, raw.top, raw.width, raw.height)
    }
}

impl Region {
    pub fn new(left: i32, top: i32, width: u32, height: u32) -> Result<Self> {
        if width <= MIN_REGION_SIDE || height <= MIN_REGION_SIDE {
            return Err(AmbientError::InvalidRegion {
                width,
                height,
                minimum: MIN_REGION_SIDE,
            });
        }
        Ok(Self {
            left,
            top,
            width,
            height,
        })
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}x{} at ({},{})",
            self.width, self.height, self.left, self.top
        )
    }
}

impl FromStr for Region {
    type Err = AmbientError;

    /// Parses `LEFT,TOP,WIDTH,HEIGHT`. Whitespace may also separate the fields.
    fn from_str(s: &str) -> Result<Self> {
        let fields: Vec<&str> = s
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|f| !f.is_empty())
            .collect();
        let bad = || AmbientError::invalid_parameter("region", s);
        if fields.len() != 4 {
            return Err(bad());
        }
        let left = fields[0].parse::<i32>().map_err(|_| bad())?;
        let top = fields[1].parse::<i32>().map_err(|_| bad())?;
        let width = fields[2].parse::<u32>().map_err(|_| bad())?;
        let height = fields[3].parse::<u32>().map_err(|_| bad())?;
        Region::new(left, top, width, height)
    }
}

/// Anything that can produce screen frames.
pub trait FrameSource: Send {
    /// Captures `region`, or the whole primary monitor when `None`.
    fn grab(&mut self, region: Option<Region>) -> Result<RgbaImage>;
}

/// Summary of a connected monitor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonitorInfo {
    pub index: usize,
    pub name: String,
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
    pub is_primary: bool,
}

fn describe(index: usize, monitor: &Monitor) -> Result<MonitorInfo> {
    let err = |e| AmbientError::capture("reading monitor properties", e);
    Ok(MonitorInfo {
        index,
        name: monitor.name().map_err(err)?,
        x: monitor.x().map_err(err)?,
        y: monitor.y().map_err(err)?,
        width: monitor.width().map_err(err)?,
        height: monitor.height().map_err(err)?,
        is_primary: monitor.is_primary().map_err(err)?,
    })
}

/// Lists every connected monitor with its desktop geometry.
pub fn list_monitors() -> Result<Vec<MonitorInfo>> {
    let monitors = Monitor::all().map_err(|e| AmbientError::capture("enumerating monitors", e))?;
    monitors
        .iter()
        .enumerate()
        .map(|(index, monitor)| describe(index, monitor))
        .collect()
}

/// Translates `region` into the local coordinates of a monitor placed at
/// (`origin_x`, `origin_y`) with the given size, clipped to its bounds.
pub fn clip_to_monitor(
    region: &Region,
    origin_x: i32,
    origin_y: i32,
    monitor_width: u32,
    monitor_height: u32,
) -> Option<(u32, u32, u32, u32)> {
    let local_x = (region.left - origin_x).max(0) as u32;
    let local_y = (region.top - origin_y).max(0) as u32;
    if local_x >= monitor_width || local_y >= monitor_height {
        return None;
    }
    let width = region.width.min(monitor_width - local_x);
    let height = region.height.min(monitor_height - local_y);
    Some((local_x, local_y, width, height))
}

/// `FrameSource` backed by the operating system's screen grabber.
#[derive(Debug, Default)]
pub struct ScreenCapturer;

impl ScreenCapturer {
    pub fn new() -> Self {
        Self
    }

    fn primary_monitor() -> Result<Monitor> {
        Monitor::all()
            .map_err(|e| AmbientError::capture("enumerating monitors", e))?
            .into_iter()
            .find(|m| m.is_primary().unwrap_or(false))
            .ok_or_else(|| AmbientError::NoMonitor {
                reason: "no primary monitor".into(),
            })
    }

    fn grab_region(region: &Region) -> Result<RgbaImage> {
        let monitor = Monitor::from_point(region.left, region.top).map_err(|_| AmbientError::NoMonitor {
            reason: format!("no monitor contains ({},{})", region.left, region.top),
        })?;
        let info = describe(0, &monitor)?;
        let (x, y, width, height) =
            clip_to_monitor(region, info.x, info.y, info.width, info.height).ok_or_else(|| {
                AmbientError::NoMonitor {
                    reason: format!("region {region} lies outside monitor {}", info.name),
                }
            })?;

        tracing::debug!(monitor = %info.name, x, y, width, height, "Capturing monitor region");
        monitor
            .capture_region(x, y, width, height)
            .map_err(|e| AmbientError::capture(format!("capturing region {region}"), e))
    }
}

impl FrameSource for ScreenCapturer {
    fn grab(&mut self, region: Option<Region>) -> Result<RgbaImage> {
        match region {
            Some(region) => Self::grab_region(&region),
            None => Self::primary_monitor()?
                .capture_image()
                .map_err(|e| AmbientError::capture("capturing primary monitor", e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tiny_regions_are_rejected() {
        assert!(Region::new(0, 0, 10, 200).is_err());
        assert!(Region::new(0, 0, 200, 10).is_err());
        assert!(Region::new(0, 0, 11, 11).is_ok());
    }

    #[test]
    fn display_matches_area_label() {
        let region = Region::new(40, 60, 800, 450).unwrap();
        assert_eq!(region.to_string(), "800x450 at (40,60)");
    }

    #[test]
    fn parses_comma_and_space_separated() {
        let a: Region = "10,20,300,400".parse().unwrap();
        let b: Region = "10 20 300 400".parse().unwrap();
        assert_eq!(a, b);
        assert!("10,20,300".parse::<Region>().is_err());
        assert!("10,20,5,400".parse::<Region>().is_err());
    }

    #[test]
    fn clip_translates_into_second_monitor() {
        let region = Region::new(2000, 100, 400, 300).unwrap();
        let clipped = clip_to_monitor(&region, 1920, 0, 1280, 1024);
        assert_eq!(clipped, Some((80, 100, 400, 300)));
    }

    #[test]
    fn clip_trims_overhanging_region() {
        let region = Region::new(1800, 900, 400, 300).unwrap();
        assert_eq!(
            clip_to_monitor(&region, 0, 0, 1920, 1080),
            Some((1800, 900, 120, 180))
        );
        assert_eq!(clip_to_monitor(&region, 0, 0, 1000, 800), None);
    }

    #[test]
    fn region_deserializes_with_validation() {
        let ok: Region = toml::from_str("left = 0\ntop = 0\nwidth = 100\nheight = 50").unwrap();
        assert_eq!(ok.width, 100);
        assert!(toml::from_str::<Region>("left = 0\ntop = 0\nwidth = 5\nheight = 50").is_err());
    }
}
