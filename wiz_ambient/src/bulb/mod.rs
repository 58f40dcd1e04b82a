// THEORY:
// The `bulb` module is the output edge of the engine: a deliberately small WiZ
// client. WiZ bulbs speak JSON over UDP on port 38899, one request datagram and
// one response datagram per call. Only three methods are needed here:
//
// - `setPilot`     : change color, dimming, transition speed and on/off state.
// - `getPilot`     : read the current state back (used for probing).
// - `registration` : a broadcast every bulb on the subnet answers with its MAC,
//                    which is how discovery works.
//
// The sync loop talks to bulbs only through the `Light` trait, so it can be run
// against a recording mock in tests.

pub mod discovery;
pub mod light;
pub mod pilot;

pub use discovery::{DiscoveredBulb, discover_lights};
pub use light::{Light, PilotState, WizLight};
pub use pilot::Pilot;

/// UDP port every WiZ bulb listens on.
pub const WIZ_PORT: u16 = 38899;
