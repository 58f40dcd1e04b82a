use crate::bulb::WIZ_PORT;
use crate::error::{AmbientError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::{Instant, MissedTickBehavior, interval, sleep_until};

/// Default target for discovery broadcasts.
pub const BROADCAST_ADDR: SocketAddr = SocketAddr::new(IpAddr::V4(Ipv4Addr::BROADCAST), WIZ_PORT);

const REGISTRATION: &[u8] = br#"{"method":"registration","params":{"phoneMac":"AAAAAAAAAAAA","register":false,"phoneIp":"1.2.3.4","id":"1"}}"#;
const BROADCAST_EVERY: Duration = Duration::from_secs(1);

/// A bulb that answered a discovery broadcast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiscoveredBulb {
    pub ip: IpAddr,
    pub mac: String,
}

#[derive(Deserialize)]
struct RegistrationResult {
    mac: String,
}

#[derive(Deserialize)]
struct RegistrationResponse {
    result: Option<RegistrationResult>,
}

/// Broadcasts `registration` to `target` once a second for `wait`, and returns
/// every bulb that answered, one entry per MAC, sorted by IP.
pub async fn discover_lights(target: SocketAddr, wait: Duration) -> Result<Vec<DiscoveredBulb>> {
    let bind: SocketAddr = ([0, 0, 0, 0], 0).into();
    let socket = UdpSocket::bind(bind)
        .await
        .map_err(|e| AmbientError::network("binding discovery socket", e))?;
    socket
        .set_broadcast(true)
        .map_err(|e| AmbientError::network("enabling broadcast", e))?;

    tracing::info!(%target, ?wait, "Scanning for WiZ bulbs");

    let deadline = Instant::now() + wait;
    let mut ticker = interval(BROADCAST_EVERY);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut by_mac: BTreeMap<String, IpAddr> = BTreeMap::new();
    let mut buf = [0u8; 1024];

    loop {
        tokio::select! {
            _ = sleep_until(deadline) => break,
            _ = ticker.tick() => {
                socket
                    .send_to(REGISTRATION, target)
                    .await
                    .map_err(|e| AmbientError::network(format!("broadcasting to {target}"), e))?;
            }
            received = socket.recv_from(&mut buf) => {
                let (len, peer) = received
                    .map_err(|e| AmbientError::network("receiving discovery reply", e))?;
                match serde_json::from_slice::<RegistrationResponse>(&buf[..len]) {
                    Ok(RegistrationResponse { result: Some(result) }) => {
                        if !by_mac.contains_key(&result.mac) {
                            tracing::debug!(ip = %peer.ip(), mac = %result.mac, "Found bulb");
                        }
                        by_mac.insert(result.mac, peer.ip());
                    }
                    _ => tracing::debug!(%peer, "Ignoring non-registration reply"),
                }
            }
        }
    }

    let mut bulbs: Vec<DiscoveredBulb> = by_mac
        .into_iter()
        .map(|(mac, ip)| DiscoveredBulb { ip, mac })
        .collect();
    bulbs.sort_by(|a, b| a.ip.cmp(&b.ip).then_with(|| a.mac.cmp(&b.mac)));

    tracing::info!(count = bulbs.len(), "Scan finished");
    Ok(bulbs)
}
