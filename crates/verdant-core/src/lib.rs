//! Verdant Core - Greenhouse types, backend wire format, and actuator control
//!
//! This crate provides the foundational types shared by the Verdant viewer:
//! - Zone and actuator models delivered as full snapshots
//! - Index-based placement slots for zones
//! - Backend REST envelope and conversion into snapshots
//! - Control commands and the sink abstraction that delivers them

pub mod api;
pub mod client;
pub mod control;
pub mod layout;
pub mod zone;

pub use api::{ApiError, GreenhouseDetail};
pub use client::ApiClient;
pub use control::{
    ControlAck, ControlAction, ControlCommand, ControlError, ControlMode, ControlSink,
    DEFAULT_CONTROL_DURATION_SECS,
};
pub use layout::{slot_for_index, Footprint, Placement};
pub use zone::{Actuator, ActuatorKind, GreenhouseSnapshot, Zone, ZoneStatus};
