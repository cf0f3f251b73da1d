//! Movement status and marker icon derivation
//!
//! [`classify`] and [`select_icon`] look alike but are separate mappings:
//! the classifier falls back on speed when the vehicle is not in motion,
//! the icon does not.

use crate::models::{Category, DerivedStatus, DeviceStatus, Position, Vehicle};

/// Derive the movement state of an online or offline vehicle
pub fn classify(vehicle: &Vehicle, position: &Position) -> DerivedStatus {
    match vehicle.status {
        DeviceStatus::Offline | DeviceStatus::Unknown => DerivedStatus::Offline,
        DeviceStatus::Online => {
            let attributes = &position.attributes;
            if !attributes.ignition {
                DerivedStatus::Parking
            } else if attributes.motion {
                DerivedStatus::Moving
            } else if position.speed_knots == 0.0 {
                DerivedStatus::Idling
            } else {
                DerivedStatus::Parking
            }
        }
    }
}

/// Like [`classify`], a vehicle without a known position is offline
pub fn derived_status(vehicle: &Vehicle, position: Option<&Position>) -> DerivedStatus {
    match position {
        Some(position) => classify(vehicle, position),
        None => DerivedStatus::Offline,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IconSet {
    Car,
    Motorcycle,
}

impl From<Category> for IconSet {
    fn from(category: Category) -> Self {
        match category {
            Category::Motorcycle => IconSet::Motorcycle,
            Category::Car | Category::Other => IconSet::Car,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IconState {
    /// Ignition on and moving
    Online,
    /// Ignition on, standing still
    Ignition,
    /// Ignition off
    Stopped,
    /// Device offline or unknown
    Off,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MarkerIcon {
    pub set: IconSet,
    pub state: IconState,
}

impl MarkerIcon {
    /// Asset name, e.g. `motorcycle-ignition`
    pub fn asset(&self) -> String {
        let set = match self.set {
            IconSet::Car => "car",
            IconSet::Motorcycle => "motorcycle",
        };
        let state = match self.state {
            IconState::Online => "online",
            IconState::Ignition => "ignition",
            IconState::Stopped => "stopped",
            IconState::Off => "off",
        };
        format!("{}-{}", set, state)
    }
}

/// Pick the marker icon for a vehicle at a position
pub fn select_icon(vehicle: &Vehicle, position: &Position) -> MarkerIcon {
    let attributes = &position.attributes;
    let state = match vehicle.status {
        DeviceStatus::Offline | DeviceStatus::Unknown => IconState::Off,
        DeviceStatus::Online => match (attributes.ignition, attributes.motion) {
            (true, true) => IconState::Online,
            (true, false) => IconState::Ignition,
            (false, _) => IconState::Stopped,
        },
    };

    MarkerIcon {
        set: IconSet::from(vehicle.category),
        state,
    }
}
