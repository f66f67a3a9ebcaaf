//! Host simulation support.
//!
//! # Components
//!
//! - [`radio`] - Simulated WiFi radio posting driver completions
//! - [`console`] - Console command parsing for `connectivity-sim`

pub mod console;
pub mod radio;

pub use console::{SimCommand, HELP_TEXT};
pub use radio::{SimulatedNetwork, SimulatedRadio};
