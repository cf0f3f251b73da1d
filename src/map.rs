//! Map surface boundary
//!
//! Markers, popups and the camera live in an external, mutable map object.
//! Everything that touches it goes through [`MapSurface`], so the rest of the
//! crate only deals with plain values.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use tracing::debug;

use crate::{
    config::MapConfig,
    errors::FleetTrackerError,
    marker::PopupContent,
    models::DeviceId,
    status::MarkerIcon,
};

/// Geographic coordinate in WGS84 decimal degrees
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

/// Handle of a layer added to a map surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LayerId(u64);

impl LayerId {
    pub fn new(value: u64) -> Self {
        Self(value)
    }
}

impl fmt::Display for LayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Tile template and attribution for the base layer
#[derive(Debug, Clone, PartialEq)]
pub struct TileSource {
    pub url_template: String,
    pub attribution: String,
}

impl TileSource {
    /// Pick the light or dark template, attribution is passed through as is
    pub fn from_config(config: &MapConfig) -> Self {
        let url_template = match (&config.tile_url_dark, config.dark_mode) {
            (Some(dark), true) => dark.clone(),
            _ => config.tile_url.clone(),
        };
        Self {
            url_template,
            attribution: config.attribution.clone(),
        }
    }
}

/// Everything needed to draw one vehicle marker
#[derive(Debug, Clone, PartialEq)]
pub struct MarkerOptions {
    /// Reported back when the marker is clicked
    pub device_id: DeviceId,
    pub position: LatLng,
    /// Clockwise rotation of the icon in degrees
    pub rotation: f64,
    pub icon: MarkerIcon,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PopupOptions {
    pub device_id: DeviceId,
    pub position: LatLng,
    pub content: PopupContent,
}

/// Imperative operations on a map
pub trait MapSurface {
    fn set_tile_source(&mut self, source: &TileSource);

    fn add_marker(&mut self, marker: &MarkerOptions) -> LayerId;

    fn add_popup(&mut self, popup: &PopupOptions) -> LayerId;

    /// Remove a layer. Fails when the layer is no longer attached.
    fn remove_layer(&mut self, layer: LayerId) -> Result<(), FleetTrackerError>;

    fn zoom(&self) -> f64;

    /// Animate the camera to `center` at `zoom`
    fn fly_to(&mut self, center: LatLng, zoom: f64, duration: Duration);
}

#[derive(Debug, Clone, PartialEq)]
pub enum Layer {
    Marker(MarkerOptions),
    Popup(PopupOptions),
}

/// A recorded camera animation
#[derive(Debug, Clone, PartialEq)]
pub struct Flight {
    pub center: LatLng,
    pub zoom: f64,
    pub duration: Duration,
}

/// Map surface without a display
///
/// Keeps the attached layers and camera in memory and logs every operation.
#[derive(Debug)]
pub struct HeadlessMap {
    next_layer: u64,
    layers: BTreeMap<LayerId, Layer>,
    center: LatLng,
    zoom: f64,
    tile_source: Option<TileSource>,
    flights: Vec<Flight>,
}

impl HeadlessMap {
    pub fn new(center: LatLng, zoom: f64) -> Self {
        Self {
            next_layer: 1,
            layers: BTreeMap::new(),
            center,
            zoom,
            tile_source: None,
            flights: Vec::new(),
        }
    }

    pub fn center(&self) -> LatLng {
        self.center
    }

    pub fn set_zoom(&mut self, zoom: f64) {
        self.zoom = zoom;
    }

    pub fn tile_source(&self) -> Option<&TileSource> {
        self.tile_source.as_ref()
    }

    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    pub fn markers(&self) -> impl Iterator<Item = &MarkerOptions> {
        self.layers.values().filter_map(|layer| match layer {
            Layer::Marker(marker) => Some(marker),
            Layer::Popup(_) => None,
        })
    }

    pub fn popups(&self) -> impl Iterator<Item = &PopupOptions> {
        self.layers.values().filter_map(|layer| match layer {
            Layer::Popup(popup) => Some(popup),
            Layer::Marker(_) => None,
        })
    }

    pub fn marker_for(&self, device_id: DeviceId) -> Option<&MarkerOptions> {
        self.markers().find(|marker| marker.device_id == device_id)
    }

    pub fn flights(&self) -> &[Flight] {
        &self.flights
    }

    /// Drop a layer behind the owner's back, like a map reset would
    pub fn detach(&mut self, layer: LayerId) -> Option<Layer> {
        self.layers.remove(&layer)
    }

    fn insert(&mut self, layer: Layer) -> LayerId {
        let id = LayerId::new(self.next_layer);
        self.next_layer += 1;
        self.layers.insert(id, layer);
        id
    }
}

impl MapSurface for HeadlessMap {
    fn set_tile_source(&mut self, source: &TileSource) {
        debug!("Tile source: {} ({})", source.url_template, source.attribution);
        self.tile_source = Some(source.clone());
    }

    fn add_marker(&mut self, marker: &MarkerOptions) -> LayerId {
        let id = self.insert(Layer::Marker(marker.clone()));
        debug!(
            "Marker {} for device {} at ({}, {}), icon {}, rotation {}",
            id,
            marker.device_id,
            marker.position.lat,
            marker.position.lng,
            marker.icon.asset(),
            marker.rotation
        );
        id
    }

    fn add_popup(&mut self, popup: &PopupOptions) -> LayerId {
        let id = self.insert(Layer::Popup(popup.clone()));
        debug!(
            "Popup {} for device {}: {} ({})",
            id, popup.device_id, popup.content.title, popup.content.status
        );
        id
    }

    fn remove_layer(&mut self, layer: LayerId) -> Result<(), FleetTrackerError> {
        self.layers
            .remove(&layer)
            .map(|_| ())
            .ok_or(FleetTrackerError::LayerRemoval(layer))
    }

    fn zoom(&self) -> f64 {
        self.zoom
    }

    fn fly_to(&mut self, center: LatLng, zoom: f64, duration: Duration) {
        debug!(
            "Flying to ({}, {}) at zoom {} over {:?}",
            center.lat, center.lng, zoom, duration
        );
        self.center = center;
        self.zoom = zoom;
        self.flights.push(Flight {
            center,
            zoom,
            duration,
        });
    }
}
