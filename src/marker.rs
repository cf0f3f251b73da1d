//! Marker lifecycle
//!
//! One [`MarkerController`] per vehicle with a known position. A change to
//! anything shown on the marker removes all of its layers and adds fresh
//! ones; markers are never edited in place.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::{
    config::MapConfig,
    errors::FleetTrackerError,
    map::{LatLng, LayerId, MapSurface, MarkerOptions, PopupOptions},
    models::{DerivedStatus, DeviceId, Position, Vehicle},
    status::{classify, select_icon, MarkerIcon},
};

/// Text shown in a vehicle popup
#[derive(Debug, Clone, PartialEq)]
pub struct PopupContent {
    pub title: String,
    pub status: DerivedStatus,
    pub speed_kmh: f64,
    pub last_update: Option<DateTime<Utc>>,
}

/// Everything that ends up on the map for one vehicle
#[derive(Debug, Clone, PartialEq)]
pub struct MarkerContent {
    pub position: LatLng,
    /// Course in degrees, 0 when not reported
    pub rotation: f64,
    pub icon: MarkerIcon,
    pub popup: PopupContent,
    pub open: bool,
}

impl MarkerContent {
    pub fn new(vehicle: &Vehicle, position: &Position, open: bool) -> Self {
        Self {
            position: LatLng::new(position.latitude, position.longitude),
            rotation: position.course.unwrap_or(0.0),
            icon: select_icon(vehicle, position),
            popup: PopupContent {
                title: vehicle.name.clone(),
                status: classify(vehicle, position),
                speed_kmh: position.speed_kmh(),
                last_update: vehicle.last_update,
            },
            open,
        }
    }
}

/// Where and how fast the camera moves when a popup opens
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraPolicy {
    /// The camera never zooms out below this when focusing a vehicle
    pub focus_zoom: f64,
    pub duration: Duration,
}

impl Default for CameraPolicy {
    fn default() -> Self {
        Self {
            focus_zoom: 14.0,
            duration: Duration::from_millis(1500),
        }
    }
}

impl From<&MapConfig> for CameraPolicy {
    fn from(config: &MapConfig) -> Self {
        Self {
            focus_zoom: config.focus_zoom,
            duration: config.fly_duration,
        }
    }
}

/// Owns the map layers of one vehicle
#[derive(Debug)]
pub struct MarkerController {
    device_id: DeviceId,
    layers: Vec<LayerId>,
    content: Option<MarkerContent>,
    /// Position and open state of the last render, used to fly only once
    focus: Option<(LatLng, bool)>,
}

impl MarkerController {
    pub fn new(device_id: DeviceId) -> Self {
        Self {
            device_id,
            layers: Vec::new(),
            content: None,
            focus: None,
        }
    }

    pub fn device_id(&self) -> DeviceId {
        self.device_id
    }

    pub fn content(&self) -> Option<&MarkerContent> {
        self.content.as_ref()
    }

    pub fn is_open(&self) -> bool {
        self.content.as_ref().is_some_and(|content| content.open)
    }

    /// Bring the map in line with `content`
    ///
    /// Identical content leaves the map alone. Anything else tears down the
    /// current layers and builds new ones.
    pub fn update<M: MapSurface>(
        &mut self,
        map: &mut M,
        content: MarkerContent,
        camera: &CameraPolicy,
    ) {
        if self.content.as_ref() == Some(&content) {
            return;
        }

        self.remove_layers(map);

        let marker = map.add_marker(&MarkerOptions {
            device_id: self.device_id,
            position: content.position,
            rotation: content.rotation,
            icon: content.icon,
        });
        self.layers.push(marker);

        if content.open {
            let popup = map.add_popup(&PopupOptions {
                device_id: self.device_id,
                position: content.position,
                content: content.popup.clone(),
            });
            self.layers.push(popup);
        }

        let focus = (content.position, content.open);
        if self.focus != Some(focus) {
            if content.open {
                let zoom = map.zoom().max(camera.focus_zoom);
                debug!("Focusing device {} at zoom {}", self.device_id, zoom);
                map.fly_to(content.position, zoom, camera.duration);
            }
            self.focus = Some(focus);
        }

        self.content = Some(content);
    }

    /// Remove every layer this controller added
    pub fn destroy<M: MapSurface>(&mut self, map: &mut M) {
        self.remove_layers(map);
        self.content = None;
        self.focus = None;
    }

    fn remove_layers<M: MapSurface>(&mut self, map: &mut M) {
        for layer in self.layers.drain(..) {
            match map.remove_layer(layer) {
                Ok(()) => {}
                Err(FleetTrackerError::LayerRemoval(layer)) => {
                    debug!(
                        "Layer {} of device {} already detached",
                        layer, self.device_id
                    );
                }
                Err(e) => {
                    debug!("Failed to remove layer of device {}: {}", self.device_id, e);
                }
            }
        }
    }
}

/// Markers for the visible set of vehicles
#[derive(Debug, Default)]
pub struct MarkerLayer {
    controllers: HashMap<DeviceId, MarkerController>,
    camera: CameraPolicy,
}

impl MarkerLayer {
    pub fn new(camera: CameraPolicy) -> Self {
        Self {
            controllers: HashMap::new(),
            camera,
        }
    }

    /// Create, update and destroy controllers so that exactly the given
    /// vehicles have a marker
    pub fn sync<M, I>(&mut self, map: &mut M, visible: I)
    where
        M: MapSurface,
        I: IntoIterator<Item = (DeviceId, MarkerContent)>,
    {
        let mut seen = Vec::new();
        for (device_id, content) in visible {
            self.controllers
                .entry(device_id)
                .or_insert_with(|| MarkerController::new(device_id))
                .update(map, content, &self.camera);
            seen.push(device_id);
        }

        self.controllers.retain(|device_id, controller| {
            let keep = seen.contains(device_id);
            if !keep {
                controller.destroy(map);
            }
            keep
        });
    }

    /// Remove all markers, used when the view goes away
    pub fn clear<M: MapSurface>(&mut self, map: &mut M) {
        let count = self.controllers.len();
        for (_, mut controller) in self.controllers.drain() {
            controller.destroy(map);
        }
        info!("Removed {} markers", count);
    }

    pub fn get(&self, device_id: DeviceId) -> Option<&MarkerController> {
        self.controllers.get(&device_id)
    }

    pub fn len(&self) -> usize {
        self.controllers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.controllers.is_empty()
    }
}
