//! Actuator control commands and the sink that carries them to the backend

use serde::{Deserialize, Serialize};
use std::future::Future;
use thiserror::Error;

use crate::zone::ActuatorKind;

/// Default run time of a manual command, in seconds
pub const DEFAULT_CONTROL_DURATION_SECS: u32 = 300;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ControlError {
    #[error("unknown actuator: {0}")]
    UnknownActuator(String),
    #[error("control duration must be positive")]
    InvalidDuration,
    #[error("backend rejected command (code {code}): {message}")]
    Rejected { code: i64, message: String },
    #[error("transport error: {0}")]
    Transport(String),
}

/// Action requested from an actuator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ControlAction {
    Irrigation,
    Ventilation,
    Lighting,
    Heating,
}

impl ControlAction {
    pub const ALL: [ControlAction; 4] = [
        Self::Irrigation,
        Self::Ventilation,
        Self::Lighting,
        Self::Heating,
    ];

    /// The action an actuator of `kind` performs when switched on manually
    pub fn for_actuator(kind: ActuatorKind) -> Self {
        match kind {
            ActuatorKind::Pump => Self::Irrigation,
            ActuatorKind::Fan => Self::Ventilation,
            ActuatorKind::Light => Self::Lighting,
            ActuatorKind::Heater => Self::Heating,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Irrigation => "Irrigate",
            Self::Ventilation => "Ventilate",
            Self::Lighting => "Light",
            Self::Heating => "Heat",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ControlMode {
    #[default]
    Manual,
    Auto,
}

/// A validated command addressed to one actuator
#[derive(Debug, Clone, PartialEq)]
pub struct ControlCommand {
    pub actuator_id: String,
    pub action: ControlAction,
    pub duration_secs: u32,
    pub mode: ControlMode,
}

impl ControlCommand {
    pub fn new(
        actuator_id: impl Into<String>,
        action: ControlAction,
        duration_secs: u32,
    ) -> Result<Self, ControlError> {
        if duration_secs == 0 {
            return Err(ControlError::InvalidDuration);
        }
        Ok(Self {
            actuator_id: actuator_id.into(),
            action,
            duration_secs,
            mode: ControlMode::Manual,
        })
    }
}

/// Acknowledgement returned by the backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlAck {
    pub actuator_id: String,
    pub message: String,
}

/// Anything that can deliver a control command, usually the HTTP API client.
///
/// Failures are returned to the caller unchanged; sinks do not retry.
pub trait ControlSink {
    fn issue_control(
        &self,
        command: &ControlCommand,
    ) -> impl Future<Output = Result<ControlAck, ControlError>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_duration_rejected() {
        assert_eq!(
            ControlCommand::new("fan-1", ControlAction::Ventilation, 0),
            Err(ControlError::InvalidDuration)
        );
    }

    #[test]
    fn test_each_actuator_kind_has_an_action() {
        assert_eq!(ControlAction::for_actuator(ActuatorKind::Pump), ControlAction::Irrigation);
        assert_eq!(ControlAction::for_actuator(ActuatorKind::Heater), ControlAction::Heating);
    }

    #[test]
    fn test_action_wire_names() {
        let json = serde_json::to_string(&ControlAction::Irrigation).unwrap();
        assert_eq!(json, "\"IRRIGATION\"");
        let mode = serde_json::to_string(&ControlMode::Manual).unwrap();
        assert_eq!(mode, "\"MANUAL\"");
    }
}
