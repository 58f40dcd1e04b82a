use anyhow::{Context, Result, bail};
use clap::Parser;
use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use wiz_ambient::capture::{Region, list_monitors};
use wiz_ambient::config::SyncConfig;
use wiz_ambient::sync::SyncController;
use wiz_ambient::ColorMode;

mod commands;

use commands::Command;

/// Mirror the colors on your screen onto a WiZ bulb.
#[derive(Debug, Parser)]
#[command(name = "ambient_sync", version)]
struct Args {
    /// Bulb IP address (overrides the config file and WIZ_BULB_IP)
    #[arg(long)]
    ip: Option<IpAddr>,

    /// TOML configuration file
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Color logic: dominant or average
    #[arg(long)]
    mode: Option<ColorMode>,

    /// Master brightness between 0.0 and 1.0
    #[arg(long)]
    brightness: Option<f64>,

    /// Disable temporal smoothing
    #[arg(long)]
    no_smooth: bool,

    /// Boost saturation harder
    #[arg(long)]
    vibrant: bool,

    /// Capture area as LEFT,TOP,WIDTH,HEIGHT (defaults to the primary monitor)
    #[arg(long)]
    region: Option<Region>,

    /// Pause after each bulb update, in milliseconds
    #[arg(long, value_name = "MS")]
    interval: Option<u64>,

    /// Print connected monitors and exit
    #[arg(long)]
    list_monitors: bool,
}

impl Args {
    /// Applies command-line flags on top of the loaded configuration.
    fn apply(&self, config: &mut SyncConfig) {
        if let Some(ip) = self.ip {
            config.bulb_ip = ip;
        }
        if let Some(mode) = self.mode {
            config.mode = mode;
        }
        if let Some(brightness) = self.brightness {
            config.brightness = brightness;
        }
        if self.no_smooth {
            config.smoothing = false;
        }
        if self.vibrant {
            config.vibrant = true;
        }
        if self.region.is_some() {
            config.region = self.region;
        }
        if let Some(ms) = self.interval {
            config.update_interval = Duration::from_millis(ms);
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // --- 1. Logging ---
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    if args.list_monitors {
        for monitor in list_monitors().context("Failed to enumerate monitors")? {
            println!(
                "Index: {}, Name: {}, Origin: ({},{}), Resolution: {}x{}, Primary: {}",
                monitor.index, monitor.name, monitor.x, monitor.y, monitor.width, monitor.height, monitor.is_primary
            );
        }
        return Ok(());
    }

    // --- 2. Configuration ---
    let mut config = SyncConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    args.apply(&mut config);
    config.validate().context("Invalid configuration")?;

    info!(
        ip = %config.bulb_ip,
        mode = %config.mode,
        interval = ?config.update_interval,
        area = %config.region.map(|r| r.to_string()).unwrap_or_else(|| "Full Screen".into()),
        "Starting screen sync"
    );

    // --- 3. Controller ---
    let mut controller = SyncController::for_screen(&config);
    let mut status = controller.status();
    let mut previews = controller.subscribe_previews();
    controller.start(config.bulb_ip);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    let mut last_preview = String::new();

    // --- 4. Event Loop ---
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, switching the bulb off");
                break;
            }
            changed = status.changed() => {
                if changed.is_err() {
                    break;
                }
                let current = status.borrow_and_update().clone();
                println!("{current}");
                if !current.is_active() && !controller.is_running() {
                    break;
                }
            }
            preview = previews.recv() => match preview {
                Ok(color) => {
                    let hex = color.hex();
                    if hex != last_preview {
                        tracing::debug!(preview = %hex, brightness = color.brightness, "Preview");
                        last_preview = hex;
                    }
                }
                Err(RecvError::Lagged(skipped)) => tracing::debug!(skipped, "Preview bus lagged"),
                Err(RecvError::Closed) => break,
            },
            line = lines.next_line(), if stdin_open => match line {
                Ok(Some(line)) => match Command::parse(&line) {
                    Ok(Some(Command::Quit)) => break,
                    Ok(Some(Command::Status)) => {
                        let settings = controller.settings();
                        println!(
                            "{} | mode={} brightness={:.2} smooth={} vibrant={} area={} preview={}",
                            controller.current_status(),
                            settings.frame.mode,
                            settings.frame.brightness_scale,
                            settings.frame.smoothing,
                            settings.frame.vibrant,
                            settings.region.map(|r| r.to_string()).unwrap_or_else(|| "Full Screen".into()),
                            if last_preview.is_empty() { "-" } else { last_preview.as_str() },
                        );
                    }
                    Ok(Some(command)) => command.apply(&controller),
                    Ok(None) => {}
                    Err(e) => warn!("{e}"),
                },
                Ok(None) => stdin_open = false,
                Err(e) => {
                    warn!(error = %e, "Stdin closed");
                    stdin_open = false;
                }
            },
        }
    }

    // --- 5. Shutdown ---
    controller.shutdown().await;
    if let wiz_ambient::sync::SyncStatus::Failed(message) = controller.current_status() {
        bail!("{message}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn from_file() -> SyncConfig {
        SyncConfig::from_toml_str(
            r#"
            bulb_ip = "10.0.0.7"
            update_interval = "250ms"
            mode = "average"
            brightness = 0.4
            vibrant = false

            [region]
            left = 0
            top = 0
            width = 640
            height = 360
            "#,
        )
        .unwrap()
    }

    #[test]
    fn flags_override_the_file() {
        let args = Args::parse_from([
            "ambient_sync",
            "--ip",
            "192.168.1.50",
            "--mode",
            "dominant",
            "--brightness",
            "0.9",
            "--no-smooth",
            "--vibrant",
            "--region",
            "100,50,800,450",
            "--interval",
            "120",
        ]);
        let mut config = from_file();
        args.apply(&mut config);

        assert_eq!(config.bulb_ip.to_string(), "192.168.1.50");
        assert_eq!(config.mode, ColorMode::Dominant);
        assert_eq!(config.brightness, 0.9);
        assert!(!config.smoothing);
        assert!(config.vibrant);
        assert_eq!(config.region.unwrap().to_string(), "800x450 at (100,50)");
        assert_eq!(config.update_interval, Duration::from_millis(120));
    }

    #[test]
    fn absent_flags_keep_the_file_values() {
        let args = Args::parse_from(["ambient_sync"]);
        let mut config = from_file();
        args.apply(&mut config);
        assert_eq!(config, from_file());
    }

    #[test]
    fn bad_flag_values_are_rejected() {
        assert!(Args::try_parse_from(["ambient_sync", "--mode", "rainbow"]).is_err());
        assert!(Args::try_parse_from(["ambient_sync", "--region", "0,0,5,5"]).is_err());
        assert!(Args::try_parse_from(["ambient_sync", "--ip", "not-an-ip"]).is_err());
    }
}
