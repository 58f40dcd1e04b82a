use anyhow::{Context, Result};
use clap::Parser;
use futures::future::join_all;
use std::net::SocketAddr;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use wiz_ambient::bulb::discovery::BROADCAST_ADDR;
use wiz_ambient::bulb::{DiscoveredBulb, PilotState, WizLight, discover_lights};

/// Lists the WiZ bulbs answering on the local network.
#[derive(Debug, Parser)]
#[command(name = "bulb_finder", version)]
struct Args {
    /// Where to send registration broadcasts
    #[arg(long, default_value_t = BROADCAST_ADDR)]
    broadcast: SocketAddr,

    /// Seconds to keep listening for replies
    #[arg(long, default_value_t = 5)]
    wait: u64,

    /// Also query each bulb for its current state
    #[arg(long)]
    probe: bool,
}

async fn probe(bulb: &DiscoveredBulb) -> wiz_ambient::Result<PilotState> {
    WizLight::connect(bulb.ip).await?.get_pilot().await
}

fn describe(state: &PilotState) -> String {
    let power = match state.state {
        Some(true) => "on",
        Some(false) => "off",
        None => "?",
    };
    let mut line = format!("power={power}");
    if let (Some(r), Some(g), Some(b)) = (state.r, state.g, state.b) {
        line.push_str(&format!(" rgb=({r},{g},{b})"));
    }
    if let Some(dimming) = state.dimming {
        line.push_str(&format!(" dimming={dimming}%"));
    }
    if let Some(rssi) = state.rssi {
        line.push_str(&format!(" rssi={rssi}"));
    }
    line
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    println!("Scanning for WiZ bulbs ({}s)...", args.wait);

    let bulbs = discover_lights(args.broadcast, Duration::from_secs(args.wait))
        .await
        .context("Discovery failed")?;

    if bulbs.is_empty() {
        println!("No bulbs found.");
        return Ok(());
    }

    // Probe every bulb concurrently; a silent bulb only loses its detail line.
    let states: Vec<Option<wiz_ambient::Result<PilotState>>> = if args.probe {
        join_all(bulbs.iter().map(probe)).await.into_iter().map(Some).collect()
    } else {
        bulbs.iter().map(|_| None).collect()
    };

    for (bulb, state) in bulbs.iter().zip(states) {
        match state {
            None => println!("{}  [{}]", bulb.ip, bulb.mac),
            Some(Ok(state)) => println!("{}  [{}]  {}", bulb.ip, bulb.mac, describe(&state)),
            Some(Err(e)) => {
                tracing::warn!(ip = %bulb.ip, error = %e, "Probe failed");
                println!("{}  [{}]  unreachable", bulb.ip, bulb.mac);
            }
        }
    }
    Ok(())
}
