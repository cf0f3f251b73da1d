//! Data models.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::errors::FleetTrackerError;
use serde_helpers::*;

/// Tracking backend device identifier
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct DeviceId(i64);

impl From<i64> for DeviceId {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl DeviceId {
    /// Get the raw id value
    pub fn value(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Vehicle category as reported by the backend
///
/// Anything other than `car` or `motorcycle` (including `null`) is `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Car,
    Motorcycle,
    #[default]
    Other,
}

impl From<&str> for Category {
    fn from(value: &str) -> Self {
        match value {
            "car" => Category::Car,
            "motorcycle" => Category::Motorcycle,
            _ => Category::Other,
        }
    }
}

impl<'de> Deserialize<'de> for Category {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Option::<String>::deserialize(deserializer)?;
        Ok(value.as_deref().map(Category::from).unwrap_or_default())
    }
}

/// Connection status reported by the backend for a device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceStatus {
    Online,
    Offline,
    #[default]
    Unknown,
}

impl From<&str> for DeviceStatus {
    fn from(value: &str) -> Self {
        match value {
            "online" => DeviceStatus::Online,
            "offline" => DeviceStatus::Offline,
            _ => DeviceStatus::Unknown,
        }
    }
}

impl<'de> Deserialize<'de> for DeviceStatus {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Option::<String>::deserialize(deserializer)?;
        Ok(value.as_deref().map(DeviceStatus::from).unwrap_or_default())
    }
}

/// Tracked vehicle metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vehicle {
    pub id: DeviceId,
    #[serde(default, deserialize_with = "deserialize_nullable_string")]
    pub name: String,
    #[serde(default)]
    pub category: Category,
    #[serde(default)]
    pub status: DeviceStatus,
    #[serde(default)]
    pub last_update: Option<DateTime<Utc>>,
}

/// Device message from the streaming channel
///
/// Only the fields present in the message are set; absent fields leave the
/// registry entry untouched when merged.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VehicleUpdate {
    pub id: DeviceId,
    #[serde(default, deserialize_with = "deserialize_present_string")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "deserialize_present")]
    pub category: Option<Category>,
    #[serde(default, deserialize_with = "deserialize_present")]
    pub status: Option<DeviceStatus>,
    /// `Some(None)` when the message explicitly carries `null`
    #[serde(default, deserialize_with = "deserialize_present")]
    pub last_update: Option<Option<DateTime<Utc>>>,
}

impl Vehicle {
    /// Merge an update over this vehicle, fields present in the update win
    pub fn merge(&mut self, update: VehicleUpdate) {
        if let Some(name) = update.name {
            self.name = name;
        }
        if let Some(category) = update.category {
            self.category = category;
        }
        if let Some(status) = update.status {
            self.status = status;
        }
        if let Some(last_update) = update.last_update {
            self.last_update = last_update;
        }
    }
}

impl From<VehicleUpdate> for Vehicle {
    fn from(update: VehicleUpdate) -> Self {
        let mut vehicle = Vehicle {
            id: update.id,
            name: String::new(),
            category: Category::default(),
            status: DeviceStatus::default(),
            last_update: None,
        };
        vehicle.merge(update);
        vehicle
    }
}

impl From<Vehicle> for VehicleUpdate {
    fn from(vehicle: Vehicle) -> Self {
        VehicleUpdate {
            id: vehicle.id,
            name: Some(vehicle.name),
            category: Some(vehicle.category),
            status: Some(vehicle.status),
            last_update: Some(vehicle.last_update),
        }
    }
}

/// Telemetry flags attached to a position ping
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PositionAttributes {
    #[serde(default, deserialize_with = "deserialize_flag")]
    pub ignition: bool,
    #[serde(default, deserialize_with = "deserialize_flag")]
    pub motion: bool,
    /// Remaining attributes, passed through untouched
    #[serde(flatten)]
    pub other: BTreeMap<String, serde_json::Value>,
}

/// Latest known location of a device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    pub device_id: DeviceId,
    /// Latitude in WGS84 decimal degrees
    pub latitude: f64,
    /// Longitude in WGS84 decimal degrees
    pub longitude: f64,
    /// Speed in knots
    #[serde(default, alias = "speed")]
    pub speed_knots: f64,
    /// Course in degrees, None if not reported
    #[serde(default)]
    pub course: Option<f64>,
    /// Time of the GPS fix, when the backend sends one
    #[serde(default)]
    pub fix_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub attributes: PositionAttributes,
}

impl Position {
    /// Speed converted to kilometres per hour
    pub fn speed_kmh(&self) -> f64 {
        self.speed_knots * 1.852
    }
}

/// Movement state derived from a vehicle and its latest position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DerivedStatus {
    Moving,
    Idling,
    Parking,
    Offline,
}

impl DerivedStatus {
    pub fn label(&self) -> &'static str {
        match self {
            DerivedStatus::Moving => "moving",
            DerivedStatus::Idling => "idling",
            DerivedStatus::Parking => "parking",
            DerivedStatus::Offline => "offline",
        }
    }
}

impl fmt::Display for DerivedStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Inbound message from the streaming channel
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Positions(Vec<Position>),
    Devices(Vec<VehicleUpdate>),
}

impl Frame {
    /// Parse a text frame
    ///
    /// A frame carrying both fields yields the devices before the positions.
    /// JSON without either field yields nothing.
    pub fn parse(payload: &str) -> Result<Vec<Frame>, FleetTrackerError> {
        let serde_json::Value::Object(mut object) =
            serde_json::from_str::<serde_json::Value>(payload)?
        else {
            return Ok(Vec::new());
        };

        let mut frames = Vec::new();
        if let Some(devices) = object.remove("devices") {
            frames.push(Frame::Devices(serde_json::from_value(devices)?));
        }
        if let Some(positions) = object.remove("positions") {
            frames.push(Frame::Positions(serde_json::from_value(positions)?));
        }
        Ok(frames)
    }
}

/// Custom deserializers
mod serde_helpers {
    use serde::{self, Deserialize, Deserializer};

    /// Distinguish an explicit value (even `null`) from an absent field
    pub fn deserialize_present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
    where
        D: Deserializer<'de>,
        T: Deserialize<'de>,
    {
        T::deserialize(deserializer).map(Some)
    }

    pub fn deserialize_nullable_string<'de, D>(deserializer: D) -> Result<String, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
    }

    pub fn deserialize_present_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserialize_nullable_string(deserializer).map(Some)
    }

    pub fn deserialize_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(Option::<bool>::deserialize(deserializer)?.unwrap_or(false))
    }
}
