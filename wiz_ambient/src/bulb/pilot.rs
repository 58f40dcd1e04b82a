use crate::core_modules::pixel::pixel::Rgb;
use serde::Serialize;

/// The bulb rejects dimming values below this percentage.
pub const MIN_DIMMING: u8 = 10;
pub const MIN_SPEED: u16 = 10;
pub const MAX_SPEED: u16 = 200;

/// Parameters of a `setPilot` request. Unset fields are left out of the JSON.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Pilot {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub r: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub g: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub b: Option<u8>,
    /// Brightness in percent, 10 to 100.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dimming: Option<u8>,
    /// Transition speed, 10 to 200.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speed: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<bool>,
}

#[derive(Serialize)]
struct Request<'a, P: Serialize> {
    method: &'a str,
    params: P,
}

impl Pilot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rgb(mut self, color: Rgb) -> Self {
        self.r = Some(color.r);
        self.g = Some(color.g);
        self.b = Some(color.b);
        self
    }

    /// Sets brightness from a 0-255 value, converted to the bulb's dimming percent.
    pub fn brightness(mut self, value: u8) -> Self {
        let percent = (value as f64 / 255.0 * 100.0).round() as u8;
        self.dimming = Some(percent.max(MIN_DIMMING));
        self
    }

    pub fn speed(mut self, speed: u16) -> Self {
        self.speed = Some(speed.clamp(MIN_SPEED, MAX_SPEED));
        self
    }

    /// The `setPilot` datagram that applies this pilot and switches the bulb on.
    pub fn turn_on_message(&self) -> serde_json::Result<Vec<u8>> {
        let params = Pilot {
            state: Some(true),
            ..self.clone()
        };
        serde_json::to_vec(&Request {
            method: "setPilot",
            params,
        })
    }

    /// The `setPilot` datagram that switches the bulb off.
    pub fn turn_off_message() -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(&Request {
            method: "setPilot",
            params: Pilot {
                state: Some(false),
                ..Pilot::default()
            },
        })
    }

    pub fn get_pilot_message() -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(&Request {
            method: "getPilot",
            params: serde_json::Map::new(),
        })
    }
}
