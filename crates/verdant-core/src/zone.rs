//! Zone and actuator types consumed by the digital-twin viewer

use serde::{Deserialize, Serialize};

use crate::layout::Placement;

/// Health status of a zone as shown in the viewer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ZoneStatus {
    #[default]
    Optimal,
    Warning,
    Critical,
}

impl ZoneStatus {
    pub fn is_optimal(&self) -> bool {
        matches!(self, Self::Optimal)
    }

    /// sRGB color of the status strip and pulse marker
    pub fn color_rgb(&self) -> [u8; 3] {
        match self {
            Self::Optimal => [0x22, 0xc5, 0x5e],
            Self::Warning => [0xf5, 0x9e, 0x0b],
            Self::Critical => [0xef, 0x44, 0x44],
        }
    }

    /// Alert text used when the backend does not provide one
    pub fn default_alert(&self) -> Option<&'static str> {
        match self {
            Self::Optimal => None,
            Self::Warning => Some("Needs attention"),
            Self::Critical => Some("Critical alarm"),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Optimal => "optimal",
            Self::Warning => "warning",
            Self::Critical => "critical",
        }
    }
}

impl std::fmt::Display for ZoneStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of actuator installed in a zone
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ActuatorKind {
    Fan,
    Light,
    Pump,
    Heater,
}

impl ActuatorKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Fan => "Fan",
            Self::Light => "Light",
            Self::Pump => "Pump",
            Self::Heater => "Heater",
        }
    }
}

/// A controllable device attached to exactly one zone
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Actuator {
    pub id: String,
    pub name: String,
    pub zone_id: String,
    pub kind: ActuatorKind,
    /// Last value reported by the device (e.g. "ON", "45%")
    pub current_value: String,
    /// `true` when the automation engine drives this actuator
    pub auto_mode: bool,
}

/// A greenhouse sub-area with its own crop, status, and actuators
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Zone {
    pub id: String,
    pub name: String,
    pub crop: String,
    pub status: ZoneStatus,
    /// Soil moisture in percent
    pub moisture: Option<f32>,
    /// Air temperature in degrees Celsius
    pub temperature: Option<f32>,
    pub days_planted: Option<u32>,
    pub alert: Option<String>,
    pub placement: Placement,
    pub actuators: Vec<Actuator>,
}

impl Zone {
    /// Alert text for the floating label, `None` while the zone is optimal
    pub fn alert_text(&self) -> Option<String> {
        if self.status.is_optimal() {
            return None;
        }
        self.alert
            .clone()
            .or_else(|| self.status.default_alert().map(str::to_string))
    }

    pub fn find_actuator(&self, actuator_id: &str) -> Option<&Actuator> {
        self.actuators.iter().find(|a| a.id == actuator_id)
    }
}

/// Full replacement snapshot delivered by the backend
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GreenhouseSnapshot {
    pub greenhouse_id: String,
    pub zones: Vec<Zone>,
}

impl GreenhouseSnapshot {
    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }

    pub fn actuator_count(&self) -> usize {
        self.zones.iter().map(|z| z.actuators.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::slot_for_index;

    fn zone(status: ZoneStatus, alert: Option<&str>) -> Zone {
        Zone {
            id: "z1".to_string(),
            name: "North bed".to_string(),
            crop: "Tomato".to_string(),
            status,
            moisture: None,
            temperature: None,
            days_planted: None,
            alert: alert.map(str::to_string),
            placement: slot_for_index(0),
            actuators: Vec::new(),
        }
    }

    #[test]
    fn test_alert_text() {
        assert_eq!(zone(ZoneStatus::Optimal, Some("ignored")).alert_text(), None);
        assert_eq!(
            zone(ZoneStatus::Warning, None).alert_text().as_deref(),
            Some("Needs attention")
        );
        assert_eq!(
            zone(ZoneStatus::Critical, Some("Pump offline")).alert_text().as_deref(),
            Some("Pump offline")
        );
    }

    #[test]
    fn test_status_serde() {
        let json = serde_json::to_string(&ZoneStatus::Critical).unwrap();
        assert_eq!(json, "\"critical\"");
        let kind: ActuatorKind = serde_json::from_str("\"PUMP\"").unwrap();
        assert_eq!(kind, ActuatorKind::Pump);
    }
}
