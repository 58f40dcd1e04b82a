use crate::bulb::WIZ_PORT;
use crate::bulb::pilot::Pilot;
use crate::error::{AmbientError, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::{Instant, sleep_until, timeout_at};

const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_millis(750);
const DEFAULT_MAX_ATTEMPTS: u32 = 3;
const MAX_DATAGRAM: usize = 1024;

/// A controllable light. The sync loop depends on this, not on `WizLight`.
#[async_trait]
pub trait Light: Send + Sync {
    async fn turn_on(&self, pilot: &Pilot) -> Result<()>;
    async fn turn_off(&self) -> Result<()>;
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct Response {
    method: Option<String>,
    result: Option<serde_json::Value>,
    error: Option<ErrorBody>,
}

/// State reported by `getPilot`. Fields the bulb omits stay `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PilotState {
    pub mac: Option<String>,
    pub state: Option<bool>,
    pub r: Option<u8>,
    pub g: Option<u8>,
    pub b: Option<u8>,
    pub dimming: Option<u8>,
    #[serde(rename = "sceneId")]
    pub scene_id: Option<u32>,
    pub rssi: Option<i32>,
}

/// Async UDP client for one WiZ bulb.
pub struct WizLight {
    addr: SocketAddr,
    socket: UdpSocket,
    response_timeout: Duration,
    max_attempts: u32,
}

impl WizLight {
    /// Opens a client for the bulb at `ip` on the standard WiZ port.
    pub async fn connect(ip: IpAddr) -> Result<Self> {
        Self::with_options(
            SocketAddr::new(ip, WIZ_PORT),
            DEFAULT_RESPONSE_TIMEOUT,
            DEFAULT_MAX_ATTEMPTS,
        )
        .await
    }

    pub async fn with_options(addr: SocketAddr, response_timeout: Duration, max_attempts: u32) -> Result<Self> {
        let bind: SocketAddr = if addr.is_ipv4() {
            ([0, 0, 0, 0], 0).into()
        } else {
            (std::net::Ipv6Addr::UNSPECIFIED, 0).into()
        };
        let socket = UdpSocket::bind(bind)
            .await
            .map_err(|e| AmbientError::network("binding client socket", e))?;
        socket
            .connect(addr)
            .await
            .map_err(|e| AmbientError::network(format!("connecting to {addr}"), e))?;

        Ok(Self {
            addr,
            socket,
            response_timeout,
            max_attempts: max_attempts.max(1),
        })
    }

    /// Sends `message` and waits for the matching response, resending on silence.
    ///
    /// Each attempt owns a `response_timeout` window. A transient socket error
    /// (an ICMP refusal surfacing on send or recv) waits out the rest of the
    /// window before the next attempt, so retries keep the same pace as silence.
    async fn request(&self, method: &str, message: &[u8]) -> Result<serde_json::Value> {
        let mut buf = [0u8; MAX_DATAGRAM];

        for attempt in 1..=self.max_attempts {
            let deadline = Instant::now() + self.response_timeout;
            let outcome = match self.socket.send(message).await {
                Ok(_) => timeout_at(deadline, self.receive(method, &mut buf)).await.ok(),
                Err(e) => Some(Err(AmbientError::network(
                    format!("sending {method} to {}", self.addr),
                    e,
                ))),
            };

            match outcome {
                Some(Err(e)) if e.is_recoverable() && attempt < self.max_attempts => {
                    tracing::warn!(addr = %self.addr, method, attempt, error = %e, "Bulb unreachable, retrying");
                    sleep_until(deadline).await;
                }
                Some(result) => return result,
                None => {
                    tracing::warn!(addr = %self.addr, method, attempt, "No response from bulb, retrying");
                }
            }
        }

        Err(AmbientError::BulbTimeout {
            addr: self.addr,
            method: method.to_string(),
            attempts: self.max_attempts,
        })
    }

    /// Reads datagrams until one answers `method`. Stale answers to other methods are skipped.
    async fn receive(&self, method: &str, buf: &mut [u8]) -> Result<serde_json::Value> {
        loop {
            let len = self
                .socket
                .recv(buf)
                .await
                .map_err(|e| AmbientError::network(format!("receiving from {}", self.addr), e))?;

            let response: Response = match serde_json::from_slice(&buf[..len]) {
                Ok(response) => response,
                Err(e) => {
                    tracing::debug!(addr = %self.addr, error = %e, "Ignoring malformed datagram");
                    continue;
                }
            };

            if response.method.as_deref().is_some_and(|m| m != method) {
                continue;
            }

            if let Some(error) = response.error {
                return Err(AmbientError::BulbRejected {
                    addr: self.addr,
                    method: method.to_string(),
                    message: format!("{} (code {})", error.message, error.code),
                });
            }

            return Ok(response.result.unwrap_or(serde_json::Value::Null));
        }
    }

    pub async fn get_pilot(&self) -> Result<PilotState> {
        let result = self
            .request("getPilot", &Pilot::get_pilot_message()?)
            .await?;
        Ok(serde_json::from_value(result)?)
    }
}

#[async_trait]
impl Light for WizLight {
    async fn turn_on(&self, pilot: &Pilot) -> Result<()> {
        self.request("setPilot", &pilot.turn_on_message()?).await?;
        Ok(())
    }

    async fn turn_off(&self) -> Result<()> {
        self.request("setPilot", &Pilot::turn_off_message()?).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::pixel::pixel::Rgb;
    use serde_json::{Value, json};
    use tokio::time::timeout;

    /// Binds a fake bulb on localhost that answers each request with `reply(request)`.
    async fn fake_bulb<F>(drop_first: usize, reply: F) -> (SocketAddr, tokio::task::JoinHandle<Vec<Value>>)
    where
        F: Fn(&Value) -> Value + Send + 'static,
    {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = socket.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let mut seen = Vec::new();
            let mut buf = [0u8; MAX_DATAGRAM];
            while let Ok(Ok((len, peer))) =
                timeout(Duration::from_millis(500), socket.recv_from(&mut buf)).await
            {
                let request: Value = serde_json::from_slice(&buf[..len]).unwrap();
                seen.push(request.clone());
                if seen.len() <= drop_first {
                    continue;
                }
                let body = serde_json::to_vec(&reply(&request)).unwrap();
                socket.send_to(&body, peer).await.unwrap();
            }
            seen
        });
        (addr, handle)
    }

    #[tokio::test]
    async fn turn_on_sends_set_pilot() {
        let (addr, bulb) = fake_bulb(0, |_| {
            json!({"method": "setPilot", "env": "pro", "result": {"success": true}})
        })
        .await;
        let light = WizLight::with_options(addr, Duration::from_millis(200), 3).await.unwrap();

        let pilot = Pilot::new().rgb(Rgb::new(1, 2, 3)).brightness(255).speed(150);
        light.turn_on(&pilot).await.unwrap();
        drop(light);

        let seen = bulb.await.unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0]["method"], "setPilot");
        assert_eq!(seen[0]["params"]["state"], true);
        assert_eq!(seen[0]["params"]["b"], 3);
    }

    #[tokio::test]
    async fn silent_bulb_is_retried() {
        let (addr, bulb) = fake_bulb(2, |_| {
            json!({"method": "setPilot", "result": {"success": true}})
        })
        .await;
        let light = WizLight::with_options(addr, Duration::from_millis(50), 3).await.unwrap();

        light.turn_off().await.unwrap();
        assert_eq!(bulb.await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let (addr, _bulb) = fake_bulb(usize::MAX, |_| Value::Null).await;
        let light = WizLight::with_options(addr, Duration::from_millis(30), 2).await.unwrap();

        let err = light.turn_off().await.unwrap_err();
        assert!(matches!(err, AmbientError::BulbTimeout { attempts: 2, .. }));
    }

    #[tokio::test]
    async fn refused_port_is_retried_until_the_bulb_appears() {
        let closed = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = closed.local_addr().unwrap();
        drop(closed);

        let light = WizLight::with_options(addr, Duration::from_millis(300), 3).await.unwrap();
        let late_bulb = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            let socket = UdpSocket::bind(addr).await.unwrap();
            let mut buf = [0u8; MAX_DATAGRAM];
            let (_, peer) = socket.recv_from(&mut buf).await.unwrap();
            let reply = json!({"method": "setPilot", "result": {"success": true}});
            socket.send_to(&serde_json::to_vec(&reply).unwrap(), peer).await.unwrap();
        });

        light.turn_off().await.unwrap();
        late_bulb.await.unwrap();
    }

    #[tokio::test]
    async fn error_object_becomes_rejection() {
        let (addr, _bulb) = fake_bulb(0, |_| {
            json!({"method": "setPilot", "error": {"code": -32600, "message": "Invalid Request"}})
        })
        .await;
        let light = WizLight::with_options(addr, Duration::from_millis(200), 1).await.unwrap();

        let err = light.turn_off().await.unwrap_err();
        assert!(matches!(err, AmbientError::BulbRejected { .. }));
        assert!(err.to_string().contains("Invalid Request"));
    }

    #[tokio::test]
    async fn get_pilot_reads_state() {
        let (addr, _bulb) = fake_bulb(0, |_| {
            json!({"method": "getPilot", "result": {
                "mac": "a8bb5006aabb", "rssi": -61, "state": true, "sceneId": 0,
                "r": 255, "g": 0, "b": 64, "dimming": 75
            }})
        })
        .await;
        let light = WizLight::with_options(addr, Duration::from_millis(200), 1).await.unwrap();

        let state = light.get_pilot().await.unwrap();
        assert_eq!(state.mac.as_deref(), Some("a8bb5006aabb"));
        assert_eq!(state.state, Some(true));
        assert_eq!(state.dimming, Some(75));
        assert_eq!(state.rssi, Some(-61));
    }
}
