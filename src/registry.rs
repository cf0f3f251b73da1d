//! Device registry
use std::collections::HashMap;
use std::sync::Arc;

use tracing::info;

use crate::models::{Category, DeviceId, Vehicle, VehicleUpdate};

/// In-memory table of vehicles keyed by device id
///
/// Vehicles are kept in display order. Readers take cheap snapshots; a batch
/// update clones the table only while a snapshot is still held.
#[derive(Debug, Default, Clone)]
pub struct DeviceRegistry {
    vehicles: Arc<Vec<Vehicle>>,
    index: HashMap<DeviceId, usize>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole registry with a bulk listing
    ///
    /// Motorcycles come first, then cars, then everything else, each group in
    /// the order received.
    pub fn replace(&mut self, devices: Vec<Vehicle>) {
        let (motorcycles, rest): (Vec<_>, Vec<_>) = devices
            .into_iter()
            .partition(|vehicle| vehicle.category == Category::Motorcycle);
        let (cars, others): (Vec<_>, Vec<_>) = rest
            .into_iter()
            .partition(|vehicle| vehicle.category == Category::Car);

        info!(
            "Loaded {} devices ({} motorcycles, {} cars, {} other)",
            motorcycles.len() + cars.len() + others.len(),
            motorcycles.len(),
            cars.len(),
            others.len()
        );

        self.vehicles = Arc::new(Vec::new());
        self.index.clear();
        self.upsert(
            motorcycles
                .into_iter()
                .chain(cars)
                .chain(others)
                .map(VehicleUpdate::from),
        );
    }

    /// Merge a batch of device updates
    ///
    /// Known ids are merged field by field, new ids are appended. The table is
    /// not re-sorted.
    pub fn upsert<I>(&mut self, devices: I)
    where
        I: IntoIterator<Item = VehicleUpdate>,
    {
        let vehicles = Arc::make_mut(&mut self.vehicles);
        for update in devices {
            match self.index.get(&update.id) {
                Some(&slot) => vehicles[slot].merge(update),
                None => {
                    self.index.insert(update.id, vehicles.len());
                    vehicles.push(Vehicle::from(update));
                }
            }
        }
    }

    pub fn get(&self, id: DeviceId) -> Option<&Vehicle> {
        self.index.get(&id).map(|&slot| &self.vehicles[slot])
    }

    pub fn contains(&self, id: DeviceId) -> bool {
        self.index.contains_key(&id)
    }

    /// Vehicles in display order
    pub fn vehicles(&self) -> &[Vehicle] {
        &self.vehicles
    }

    pub fn snapshot(&self) -> Arc<Vec<Vehicle>> {
        Arc::clone(&self.vehicles)
    }

    pub fn len(&self) -> usize {
        self.vehicles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vehicles.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DeviceStatus;

    fn vehicle(id: i64, category: Category) -> Vehicle {
        Vehicle {
            id: DeviceId::from(id),
            name: format!("unit-{}", id),
            category,
            status: DeviceStatus::Online,
            last_update: None,
        }
    }

    fn ids(registry: &DeviceRegistry) -> Vec<i64> {
        registry.vehicles().iter().map(|v| v.id.value()).collect()
    }

    #[test]
    fn replace_groups_by_category() {
        let mut registry = DeviceRegistry::new();
        registry.replace(vec![
            vehicle(1, Category::Car),
            vehicle(2, Category::Other),
            vehicle(3, Category::Motorcycle),
            vehicle(4, Category::Car),
            vehicle(5, Category::Motorcycle),
            vehicle(6, Category::Other),
        ]);

        assert_eq!(ids(&registry), vec![3, 5, 1, 4, 2, 6]);
    }

    #[test]
    fn replace_discards_previous_entries() {
        let mut registry = DeviceRegistry::new();
        registry.upsert(vec![VehicleUpdate::from(vehicle(9, Category::Car))]);
        registry.replace(vec![vehicle(1, Category::Car)]);

        assert_eq!(ids(&registry), vec![1]);
        assert!(!registry.contains(DeviceId::from(9)));
    }

    #[test]
    fn upsert_appends_without_resorting() {
        let mut registry = DeviceRegistry::new();
        registry.replace(vec![vehicle(1, Category::Car)]);
        registry.upsert(vec![
            VehicleUpdate::from(vehicle(2, Category::Motorcycle)),
            VehicleUpdate::from(vehicle(3, Category::Other)),
        ]);

        assert_eq!(ids(&registry), vec![1, 2, 3]);
    }

    #[test]
    fn upsert_merges_fields() {
        let mut registry = DeviceRegistry::new();
        registry.replace(vec![vehicle(1, Category::Motorcycle)]);
        registry.upsert(vec![VehicleUpdate {
            id: DeviceId::from(1),
            status: Some(DeviceStatus::Offline),
            ..Default::default()
        }]);

        let merged = registry.get(DeviceId::from(1)).unwrap();
        assert_eq!(merged.name, "unit-1");
        assert_eq!(merged.category, Category::Motorcycle);
        assert_eq!(merged.status, DeviceStatus::Offline);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn upsert_is_idempotent() {
        let batch = vec![
            VehicleUpdate::from(vehicle(1, Category::Car)),
            VehicleUpdate {
                id: DeviceId::from(2),
                name: Some("late".to_string()),
                ..Default::default()
            },
        ];

        let mut once = DeviceRegistry::new();
        once.upsert(batch.clone());

        let mut twice = DeviceRegistry::new();
        twice.upsert(batch.clone());
        twice.upsert(batch);

        assert_eq!(once.vehicles(), twice.vehicles());
    }

    #[test]
    fn snapshot_is_unaffected_by_later_updates() {
        let mut registry = DeviceRegistry::new();
        registry.replace(vec![vehicle(1, Category::Car)]);

        let snapshot = registry.snapshot();
        registry.upsert(vec![VehicleUpdate::from(vehicle(2, Category::Car))]);

        assert_eq!(snapshot.len(), 1);
        assert_eq!(registry.len(), 2);
    }
}
