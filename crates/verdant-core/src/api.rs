//! Backend REST wire format and conversion into viewer snapshots

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::control::{ControlAction, ControlCommand, ControlMode};
use crate::layout::slot_for_index;
use crate::zone::{Actuator, ActuatorKind, GreenhouseSnapshot, Zone, ZoneStatus};

/// Envelope code the backend uses for success
pub const CODE_OK: i64 = 200;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unauthorized (HTTP 401), sign in again")]
    Unauthorized,
    #[error("HTTP status {status}")]
    Status { status: u16 },
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("backend error (code {code}): {msg}")]
    Backend { code: i64, msg: String },
    #[error("response carried no data")]
    MissingData,
}

/// Unified response envelope `{code, msg, data}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub code: i64,
    #[serde(default)]
    pub msg: String,
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn into_result(self) -> Result<T, ApiError> {
        if self.code != CODE_OK {
            return Err(ApiError::Backend {
                code: self.code,
                msg: self.msg,
            });
        }
        self.data.ok_or(ApiError::MissingData)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum GreenhouseStatus {
    Normal,
    Warning,
    Critical,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ApiZoneStatus {
    Healthy,
    Warning,
    Critical,
    /// Anything the backend adds later is shown as healthy
    #[serde(other)]
    Unknown,
}

impl From<ApiZoneStatus> for ZoneStatus {
    fn from(status: ApiZoneStatus) -> Self {
        match status {
            ApiZoneStatus::Healthy | ApiZoneStatus::Unknown => ZoneStatus::Optimal,
            ApiZoneStatus::Warning => ZoneStatus::Warning,
            ApiZoneStatus::Critical => ZoneStatus::Critical,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Greenhouse {
    pub id: String,
    pub name: String,
    pub crop: String,
    pub status: GreenhouseStatus,
    pub health_score: f32,
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiZone {
    pub id: String,
    pub name: String,
    pub greenhouse_id: Option<String>,
    pub crop_type: Option<String>,
    pub status: Option<ApiZoneStatus>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiActuator {
    pub id: String,
    pub name: String,
    pub zone_id: Option<String>,
    #[serde(rename = "type")]
    pub kind: ActuatorKind,
    pub current_value: String,
    pub auto_mode: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZoneWithDevices {
    pub zone: ApiZone,
    #[serde(default)]
    pub devices: Vec<ApiActuator>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GreenhouseDetail {
    pub info: Greenhouse,
    #[serde(default)]
    pub zones: Vec<ZoneWithDevices>,
}

/// One row of `GET /data/environment`, oldest first
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentSample {
    pub time: String,
    pub temp: f32,
    pub humidity: f32,
    #[serde(default)]
    pub light: Option<f32>,
    #[serde(default)]
    pub co2: Option<f32>,
    #[serde(default)]
    pub voltage: Option<f32>,
}

/// Body of `POST /devices/{id}/control`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<ControlMode>,
    pub action: ControlAction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<u32>,
}

impl From<&ControlCommand> for ControlRequest {
    fn from(command: &ControlCommand) -> Self {
        Self {
            mode: Some(command.mode),
            action: command.action,
            duration: Some(command.duration_secs),
        }
    }
}

impl GreenhouseDetail {
    /// Convert into the snapshot the viewer consumes.
    ///
    /// Zones keep backend order and take their slot from that order. Ambient
    /// readings come from `sensor` when the greenhouse has one.
    pub fn into_snapshot(self, sensor: Option<&EnvironmentSample>) -> GreenhouseSnapshot {
        let greenhouse_id = self.info.id;
        let zones = self
            .zones
            .into_iter()
            .enumerate()
            .map(|(index, entry)| convert_zone(index, entry, sensor))
            .collect();

        GreenhouseSnapshot {
            greenhouse_id,
            zones,
        }
    }
}

fn convert_zone(index: usize, entry: ZoneWithDevices, sensor: Option<&EnvironmentSample>) -> Zone {
    let ZoneWithDevices { zone, devices } = entry;
    let status: ZoneStatus = zone.status.map(Into::into).unwrap_or_default();
    let actuators = devices
        .into_iter()
        .map(|d| Actuator {
            zone_id: d.zone_id.unwrap_or_else(|| zone.id.clone()),
            id: d.id,
            name: d.name,
            kind: d.kind,
            current_value: d.current_value,
            auto_mode: d.auto_mode.unwrap_or(false),
        })
        .collect();

    Zone {
        alert: status.default_alert().map(str::to_string),
        id: zone.id,
        name: zone.name,
        crop: zone.crop_type.unwrap_or_else(|| "Unknown crop".to_string()),
        status,
        moisture: sensor.map(|s| s.humidity),
        temperature: sensor.map(|s| s.temp),
        days_planted: None,
        placement: slot_for_index(index),
        actuators,
    }
}
