//! Live tracking view
//!
//! Holds the registry, the position store, the selection and the filter, and
//! re-renders the markers after every change. Derived status is computed on
//! each render and never stored.

use tracing::{debug, info};

use crate::{
    channel::ConnectionState,
    config::{AppConfig, PositionOrdering},
    filter::VehicleFilter,
    map::{MapSurface, TileSource},
    marker::{CameraPolicy, MarkerContent, MarkerLayer},
    models::{DerivedStatus, DeviceId, Frame, Vehicle},
    positions::PositionStore,
    registry::DeviceRegistry,
    status::derived_status,
};

/// The one vehicle whose popup is open, if any
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Selection {
    open: Option<DeviceId>,
}

impl Selection {
    /// Selecting the open vehicle closes it, any other vehicle replaces it
    pub fn toggle(&mut self, id: DeviceId) {
        self.open = if self.open == Some(id) { None } else { Some(id) };
    }

    pub fn close(&mut self) {
        self.open = None;
    }

    pub fn open_vehicle(&self) -> Option<DeviceId> {
        self.open
    }

    pub fn is_open(&self, id: DeviceId) -> bool {
        self.open == Some(id)
    }
}

/// Row of the vehicle list
#[derive(Debug, Clone, PartialEq)]
pub struct VehicleRow {
    pub vehicle: Vehicle,
    pub status: DerivedStatus,
    pub has_position: bool,
}

pub struct TrackingView<M: MapSurface> {
    map: M,
    registry: DeviceRegistry,
    positions: PositionStore,
    selection: Selection,
    filter: VehicleFilter,
    markers: MarkerLayer,
    connection: ConnectionState,
}

impl<M: MapSurface> TrackingView<M> {
    pub fn new(
        mut map: M,
        tiles: &TileSource,
        camera: CameraPolicy,
        ordering: PositionOrdering,
    ) -> Self {
        map.set_tile_source(tiles);
        Self {
            map,
            registry: DeviceRegistry::new(),
            positions: PositionStore::new(ordering),
            selection: Selection::default(),
            filter: VehicleFilter::default(),
            markers: MarkerLayer::new(camera),
            connection: ConnectionState::Disconnected,
        }
    }

    pub fn from_config(map: M, config: &AppConfig) -> Self {
        Self::new(
            map,
            &TileSource::from_config(&config.map),
            CameraPolicy::from(&config.map),
            config.positions.ordering,
        )
    }

    /// Replace the registry with the bulk listing
    pub fn seed_devices(&mut self, devices: Vec<Vehicle>) {
        self.registry.replace(devices);
        self.render();
    }

    pub fn apply_frame(&mut self, frame: Frame) {
        match frame {
            Frame::Devices(devices) => {
                debug!("Received {} device updates", devices.len());
                self.registry.upsert(devices);
            }
            Frame::Positions(positions) => {
                let received = positions.len();
                let applied = self.positions.upsert(positions);
                debug!("Applied {} of {} positions", applied, received);
            }
        }
        self.render();
    }

    /// Select a vehicle from the list, toggling its popup
    pub fn select(&mut self, id: DeviceId) {
        self.selection.toggle(id);
        self.render();
    }

    /// A marker click behaves like selecting the vehicle
    pub fn on_marker_click(&mut self, id: DeviceId) {
        self.select(id);
    }

    pub fn set_filter(&mut self, filter: VehicleFilter) {
        self.filter = filter;
        self.render();
    }

    pub fn set_connection_state(&mut self, state: ConnectionState) {
        if self.connection != state {
            info!("Connection state: {:?}", state);
            self.connection = state;
        }
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.connection
    }

    pub fn open_vehicle(&self) -> Option<DeviceId> {
        self.selection.open_vehicle()
    }

    pub fn filter(&self) -> &VehicleFilter {
        &self.filter
    }

    pub fn registry(&self) -> &DeviceRegistry {
        &self.registry
    }

    pub fn positions(&self) -> &PositionStore {
        &self.positions
    }

    pub fn markers(&self) -> &MarkerLayer {
        &self.markers
    }

    pub fn map(&self) -> &M {
        &self.map
    }

    pub fn map_mut(&mut self) -> &mut M {
        &mut self.map
    }

    /// Current status of one vehicle
    pub fn status_of(&self, id: DeviceId) -> Option<DerivedStatus> {
        self.registry
            .get(id)
            .map(|vehicle| derived_status(vehicle, self.positions.get(id)))
    }

    /// Filtered vehicle list in display order
    pub fn rows(&self) -> Vec<VehicleRow> {
        self.filter
            .apply(&self.registry, &self.positions)
            .map(|vehicle| {
                let position = self.positions.get(vehicle.id);
                VehicleRow {
                    vehicle: vehicle.clone(),
                    status: derived_status(vehicle, position),
                    has_position: position.is_some(),
                }
            })
            .collect()
    }

    /// Sync markers with the filtered vehicles that have a position
    ///
    /// Positions of ids missing from the registry get no marker.
    pub fn render(&mut self) {
        let visible: Vec<(DeviceId, MarkerContent)> = self
            .filter
            .apply(&self.registry, &self.positions)
            .filter_map(|vehicle| {
                let position = self.positions.get(vehicle.id)?;
                let open = self.selection.is_open(vehicle.id);
                Some((vehicle.id, MarkerContent::new(vehicle, position, open)))
            })
            .collect();

        self.markers.sync(&mut self.map, visible);
    }

    /// Remove every marker and hand the map back
    pub fn unmount(mut self) -> M {
        self.markers.clear(&mut self.map);
        self.map
    }
}
