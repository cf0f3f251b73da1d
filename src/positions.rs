//! Latest position per device
use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::{
    config::PositionOrdering,
    models::{DeviceId, Position},
};

#[derive(Debug, Default, Clone)]
pub struct PositionStore {
    positions: Arc<HashMap<DeviceId, Position>>,
    ordering: PositionOrdering,
}

impl PositionStore {
    pub fn new(ordering: PositionOrdering) -> Self {
        Self {
            positions: Arc::default(),
            ordering,
        }
    }

    /// Store a batch of pings, returns how many were applied
    ///
    /// With [`PositionOrdering::LastWriteWins`] every ping replaces the stored
    /// one, even if it is older.
    pub fn upsert<I>(&mut self, positions: I) -> usize
    where
        I: IntoIterator<Item = Position>,
    {
        let ordering = self.ordering;
        let stored = Arc::make_mut(&mut self.positions);
        let mut applied = 0;

        for position in positions {
            if ordering == PositionOrdering::NewerOnly {
                if let Some(current) = stored.get(&position.device_id) {
                    if is_older(&position, current) {
                        debug!("Dropping stale position for device {}", position.device_id);
                        continue;
                    }
                }
            }
            stored.insert(position.device_id, position);
            applied += 1;
        }

        applied
    }

    pub fn get(&self, id: DeviceId) -> Option<&Position> {
        self.positions.get(&id)
    }

    pub fn snapshot(&self) -> Arc<HashMap<DeviceId, Position>> {
        Arc::clone(&self.positions)
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

fn is_older(incoming: &Position, current: &Position) -> bool {
    match (incoming.fix_time, current.fix_time) {
        (Some(incoming), Some(current)) => incoming < current,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn ping(device: i64, latitude: f64, second: Option<u32>) -> Position {
        Position {
            device_id: DeviceId::from(device),
            latitude,
            longitude: 24.94,
            speed_knots: 0.0,
            course: None,
            fix_time: second.map(|s| Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, s).unwrap()),
            attributes: Default::default(),
        }
    }

    #[test]
    fn last_write_wins() {
        let mut store = PositionStore::default();
        store.upsert(vec![ping(1, 60.0, Some(10))]);
        store.upsert(vec![ping(1, 61.0, Some(5))]);

        assert_eq!(store.get(DeviceId::from(1)), Some(&ping(1, 61.0, Some(5))));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn last_write_wins_within_batch() {
        let mut store = PositionStore::default();
        let applied = store.upsert(vec![ping(1, 60.0, None), ping(1, 62.0, None)]);

        assert_eq!(applied, 2);
        assert_eq!(store.get(DeviceId::from(1)).unwrap().latitude, 62.0);
    }

    #[test]
    fn newer_only_drops_stale_pings() {
        let mut store = PositionStore::new(PositionOrdering::NewerOnly);
        store.upsert(vec![ping(1, 60.0, Some(10))]);

        assert_eq!(store.upsert(vec![ping(1, 61.0, Some(5))]), 0);
        assert_eq!(store.get(DeviceId::from(1)).unwrap().latitude, 60.0);

        assert_eq!(store.upsert(vec![ping(1, 62.0, Some(20))]), 1);
        assert_eq!(store.get(DeviceId::from(1)).unwrap().latitude, 62.0);

        // Without a fix time there is nothing to compare
        assert_eq!(store.upsert(vec![ping(1, 63.0, None)]), 1);
    }

    #[test]
    fn snapshot_is_not_affected_by_later_writes() {
        let mut store = PositionStore::default();
        store.upsert(vec![ping(1, 60.0, None)]);

        let snapshot = store.snapshot();
        store.upsert(vec![ping(1, 61.0, None), ping(2, 59.0, None)]);

        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[&DeviceId::from(1)].latitude, 60.0);
        assert_eq!(store.get(DeviceId::from(1)).unwrap().latitude, 61.0);
    }

    #[test]
    fn unknown_devices_are_kept() {
        let mut store = PositionStore::default();
        store.upsert(vec![ping(42, 60.0, None)]);

        assert!(store.get(DeviceId::from(42)).is_some());
        assert!(store.get(DeviceId::from(1)).is_none());
    }
}
