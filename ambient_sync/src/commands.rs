// THEORY:
// The interactive console replaces the old control panel. Each line typed on
// stdin is one command that adjusts the running sync; changes are picked up by
// the capture loop on its next frame without restarting the connection.

use anyhow::{Context, Result, anyhow, bail};
use wiz_ambient::ColorMode;
use wiz_ambient::capture::{FrameSource, Region};
use wiz_ambient::sync::{LightConnector, SyncController};

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Mode(ColorMode),
    Brightness(f64),
    Smooth(bool),
    Vibrant(bool),
    Area(Region),
    AreaReset,
    Status,
    Quit,
}

fn parse_switch(value: Option<&str>) -> Result<bool> {
    match value {
        Some("on" | "true" | "1") => Ok(true),
        Some("off" | "false" | "0") => Ok(false),
        other => bail!("expected on|off, got {:?}", other.unwrap_or("")),
    }
}

impl Command {
    /// Parses one console line. Blank lines yield `None`.
    pub fn parse(line: &str) -> Result<Option<Self>> {
        let mut words = line.split_whitespace();
        let Some(head) = words.next() else {
            return Ok(None);
        };
        let command = match head.to_ascii_lowercase().as_str() {
            "mode" => {
                let raw = words.next().ok_or_else(|| anyhow!("usage: mode dominant|average"))?;
                Command::Mode(raw.parse()?)
            }
            "brightness" => {
                let raw = words.next().ok_or_else(|| anyhow!("usage: brightness 0.0-1.0"))?;
                let value: f64 = raw.parse().with_context(|| format!("invalid brightness {raw:?}"))?;
                Command::Brightness(value)
            }
            "smooth" => Command::Smooth(parse_switch(words.next())?),
            "vibrant" => Command::Vibrant(parse_switch(words.next())?),
            "area" => {
                let rest: Vec<&str> = words.collect();
                match rest.as_slice() {
                    ["reset"] | ["full"] => Command::AreaReset,
                    [] => bail!("usage: area LEFT TOP WIDTH HEIGHT | area reset"),
                    fields => Command::Area(fields.join(" ").parse()?),
                }
            }
            "status" => Command::Status,
            "quit" | "exit" | "q" => Command::Quit,
            other => bail!("unknown command {other:?} (mode, brightness, smooth, vibrant, area, status, quit)"),
        };
        Ok(Some(command))
    }

    /// Pushes a settings change into the controller.
    pub fn apply<C, F, S>(self, controller: &SyncController<C, F>)
    where
        C: LightConnector,
        F: Fn() -> S + Send + Sync + 'static,
        S: FrameSource + 'static,
    {
        match self {
            Command::Mode(mode) => controller.set_mode(mode),
            Command::Brightness(value) => controller.set_brightness(value),
            Command::Smooth(on) => controller.set_smoothing(on),
            Command::Vibrant(on) => controller.set_vibrant(on),
            Command::Area(region) => {
                println!("Area: {region}");
                controller.set_region(Some(region));
            }
            Command::AreaReset => {
                println!("Area: Full Screen");
                controller.reset_region();
            }
            Command::Status | Command::Quit => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_lines_are_ignored() {
        assert_eq!(Command::parse("   ").unwrap(), None);
    }

    #[test]
    fn parses_settings() {
        assert_eq!(
            Command::parse("mode Average").unwrap(),
            Some(Command::Mode(ColorMode::Average))
        );
        assert_eq!(
            Command::parse("brightness 0.25").unwrap(),
            Some(Command::Brightness(0.25))
        );
        assert_eq!(Command::parse("smooth off").unwrap(), Some(Command::Smooth(false)));
        assert_eq!(Command::parse("VIBRANT on").unwrap(), Some(Command::Vibrant(true)));
        assert_eq!(Command::parse("q").unwrap(), Some(Command::Quit));
    }

    #[test]
    fn parses_areas() {
        let Some(Command::Area(region)) = Command::parse("area 100 50 640 360").unwrap() else {
            panic!("expected an area");
        };
        assert_eq!(region.to_string(), "640x360 at (100,50)");
        assert_eq!(Command::parse("area reset").unwrap(), Some(Command::AreaReset));
    }

    #[test]
    fn rejects_bad_input() {
        assert!(Command::parse("area 0 0 5 5").is_err());
        assert!(Command::parse("smooth maybe").is_err());
        assert!(Command::parse("brightness lots").is_err());
        assert!(Command::parse("dance").is_err());
    }
}
