//! Envelope construction: speed limits and stops first, then the train capabilities.

pub mod max_effort_envelope;
pub mod max_speed_envelope;

pub use max_speed_envelope::{MaxSpeedProfile, SpeedRange};
