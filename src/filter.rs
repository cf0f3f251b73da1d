//! Vehicle search and filters
use std::str::FromStr;

use crate::{
    errors::FleetTrackerError,
    models::{Category, DerivedStatus, Position, Vehicle},
    positions::PositionStore,
    registry::DeviceRegistry,
    status::derived_status,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CategoryFilter {
    #[default]
    All,
    Only(Category),
}

impl FromStr for CategoryFilter {
    type Err = FleetTrackerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(CategoryFilter::All),
            "car" => Ok(CategoryFilter::Only(Category::Car)),
            "motorcycle" => Ok(CategoryFilter::Only(Category::Motorcycle)),
            "other" => Ok(CategoryFilter::Only(Category::Other)),
            _ => Err(FleetTrackerError::InvalidFilter(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusFilter {
    #[default]
    All,
    Only(DerivedStatus),
}

impl FromStr for StatusFilter {
    type Err = FleetTrackerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(StatusFilter::All),
            "moving" => Ok(StatusFilter::Only(DerivedStatus::Moving)),
            "idling" => Ok(StatusFilter::Only(DerivedStatus::Idling)),
            "parking" => Ok(StatusFilter::Only(DerivedStatus::Parking)),
            "offline" => Ok(StatusFilter::Only(DerivedStatus::Offline)),
            _ => Err(FleetTrackerError::InvalidFilter(s.to_string())),
        }
    }
}

/// Name search, category and status filters; a vehicle must pass all three
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VehicleFilter {
    /// Case-insensitive substring of the vehicle name, empty matches everything
    pub search: String,
    pub category: CategoryFilter,
    pub status: StatusFilter,
}

impl VehicleFilter {
    pub fn matches(&self, vehicle: &Vehicle, position: Option<&Position>) -> bool {
        self.name_contains(vehicle)
            && self.category_matches(vehicle)
            && self.status_matches(vehicle, position)
    }

    /// Vehicles passing the filter, in registry order
    pub fn apply<'a>(
        &'a self,
        registry: &'a DeviceRegistry,
        positions: &'a PositionStore,
    ) -> impl Iterator<Item = &'a Vehicle> + 'a {
        registry
            .vehicles()
            .iter()
            .filter(move |vehicle| self.matches(vehicle, positions.get(vehicle.id)))
    }

    fn name_contains(&self, vehicle: &Vehicle) -> bool {
        let needle = self.search.trim();
        needle.is_empty() || vehicle.name.to_lowercase().contains(&needle.to_lowercase())
    }

    fn category_matches(&self, vehicle: &Vehicle) -> bool {
        match self.category {
            CategoryFilter::All => true,
            CategoryFilter::Only(category) => vehicle.category == category,
        }
    }

    fn status_matches(&self, vehicle: &Vehicle, position: Option<&Position>) -> bool {
        match self.status {
            StatusFilter::All => true,
            StatusFilter::Only(status) => derived_status(vehicle, position) == status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DeviceId, DeviceStatus, PositionAttributes};

    fn vehicle(id: i64, name: &str, category: Category, status: DeviceStatus) -> Vehicle {
        Vehicle {
            id: DeviceId::from(id),
            name: name.to_string(),
            category,
            status,
            last_update: None,
        }
    }

    fn moving(id: i64) -> Position {
        Position {
            device_id: DeviceId::from(id),
            latitude: 60.0,
            longitude: 25.0,
            speed_knots: 20.0,
            course: Some(90.0),
            fix_time: None,
            attributes: PositionAttributes {
                ignition: true,
                motion: true,
                ..Default::default()
            },
        }
    }

    fn fleet() -> (DeviceRegistry, PositionStore) {
        let mut registry = DeviceRegistry::new();
        registry.replace(vec![
            vehicle(1, "car-7", Category::Car, DeviceStatus::Online),
            vehicle(2, "Moto Alpha", Category::Motorcycle, DeviceStatus::Online),
            vehicle(3, "Van", Category::Other, DeviceStatus::Offline),
            vehicle(4, "car-8", Category::Car, DeviceStatus::Online),
        ]);
        let mut positions = PositionStore::default();
        positions.upsert(vec![moving(1), moving(2), moving(3)]);
        (registry, positions)
    }

    fn names(
        filter: &VehicleFilter,
        registry: &DeviceRegistry,
        positions: &PositionStore,
    ) -> Vec<String> {
        filter
            .apply(registry, positions)
            .map(|v| v.name.clone())
            .collect()
    }

    #[test]
    fn default_filter_matches_everything() {
        let (registry, positions) = fleet();
        assert_eq!(
            names(&VehicleFilter::default(), &registry, &positions),
            vec!["Moto Alpha", "car-7", "car-8", "Van"]
        );
    }

    #[test]
    fn search_is_case_insensitive() {
        let (registry, positions) = fleet();
        let filter = VehicleFilter {
            search: "moto".to_string(),
            ..Default::default()
        };
        assert_eq!(names(&filter, &registry, &positions), vec!["Moto Alpha"]);
    }

    #[test]
    fn search_and_category_must_both_hold() {
        let (registry, positions) = fleet();
        let filter = VehicleFilter {
            search: "car-7".to_string(),
            category: CategoryFilter::Only(Category::Motorcycle),
            status: StatusFilter::All,
        };
        assert!(names(&filter, &registry, &positions).is_empty());
    }

    #[test]
    fn status_filter_treats_missing_position_as_offline() {
        let (registry, positions) = fleet();
        let filter = VehicleFilter {
            status: StatusFilter::Only(DerivedStatus::Offline),
            ..Default::default()
        };
        // Van is offline, car-8 has no position
        assert_eq!(names(&filter, &registry, &positions), vec!["car-8", "Van"]);

        let filter = VehicleFilter {
            status: StatusFilter::Only(DerivedStatus::Moving),
            ..Default::default()
        };
        assert_eq!(
            names(&filter, &registry, &positions),
            vec!["Moto Alpha", "car-7"]
        );
    }

    #[test]
    fn clause_order_does_not_matter() {
        let (registry, positions) = fleet();
        let filter = VehicleFilter {
            search: "car".to_string(),
            category: CategoryFilter::Only(Category::Car),
            status: StatusFilter::Only(DerivedStatus::Moving),
        };

        let clauses: [&dyn Fn(&Vehicle) -> bool; 3] = [
            &|v: &Vehicle| filter.name_contains(v),
            &|v: &Vehicle| filter.category_matches(v),
            &|v: &Vehicle| filter.status_matches(v, positions.get(v.id)),
        ];
        let orders = [[0, 1, 2], [0, 2, 1], [1, 0, 2], [1, 2, 0], [2, 0, 1], [2, 1, 0]];

        let expected = names(&filter, &registry, &positions);
        assert_eq!(expected, vec!["car-7"]);
        for order in orders {
            let mut set: Vec<&Vehicle> = registry.vehicles().iter().collect();
            for clause in order {
                set.retain(|v| clauses[clause](*v));
            }
            let result: Vec<String> = set.iter().map(|v| v.name.clone()).collect();
            assert_eq!(result, expected);
        }
    }

    #[test]
    fn parse_filters() {
        assert_eq!("all".parse::<CategoryFilter>().unwrap(), CategoryFilter::All);
        assert_eq!(
            "motorcycle".parse::<CategoryFilter>().unwrap(),
            CategoryFilter::Only(Category::Motorcycle)
        );
        assert_eq!(
            "idling".parse::<StatusFilter>().unwrap(),
            StatusFilter::Only(DerivedStatus::Idling)
        );
        assert!("bus".parse::<CategoryFilter>().is_err());
        assert!("sleeping".parse::<StatusFilter>().is_err());
    }
}
