use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::ReadingStore;
use crate::{latest, Reading, StoreError};

// ---

/// Non-durable store kept in process memory.
///
/// Readings are held in arrival order, so a vector index doubles as the
/// insertion sequence used for tie-breaks.
#[derive(Debug, Default)]
pub struct MemoryReadingStore {
    readings: RwLock<Vec<Reading>>,
}

impl MemoryReadingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Readings of one station in timestamp order, ties in arrival order.
    async fn station_ordered(&self, station_id: &str) -> Vec<Reading> {
        // ---
        let readings = self.readings.read().await;
        let mut matching: Vec<Reading> = readings
            .iter()
            .filter(|r| r.station_id == station_id)
            .cloned()
            .collect();
        // stable: equal timestamps keep arrival order
        matching.sort_by_key(|r| r.timestamp);
        matching
    }
}

#[async_trait]
impl ReadingStore for MemoryReadingStore {
    // ---
    async fn append(&self, reading: &Reading) -> Result<(), StoreError> {
        self.readings.write().await.push(reading.clone());
        Ok(())
    }

    async fn query_range(
        &self,
        station_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Reading>, StoreError> {
        // ---
        let mut matching = self.station_ordered(station_id).await;
        matching.retain(|r| r.timestamp >= start && r.timestamp <= end);
        Ok(matching)
    }

    async fn latest_per_station(&self) -> Result<Vec<Reading>, StoreError> {
        // ---
        let readings = self.readings.read().await;
        let mut latest_by_station: BTreeMap<&str, &Reading> = BTreeMap::new();

        for reading in readings.iter() {
            latest_by_station
                .entry(reading.station_id.as_str())
                .and_modify(|current| {
                    if latest::supersedes(reading, *current) {
                        *current = reading;
                    }
                })
                .or_insert(reading);
        }

        let newest: Vec<Reading> = latest_by_station.into_values().cloned().collect();
        Ok(newest)
    }

    async fn latest_for(&self, station_id: &str) -> Result<Option<Reading>, StoreError> {
        // ---
        let readings = self.readings.read().await;
        let station = readings.iter().filter(|r| r.station_id == station_id);
        let newest = latest::select_latest(station).cloned();
        Ok(newest)
    }

    async fn recent(&self, station_id: &str, limit: u32) -> Result<Vec<Reading>, StoreError> {
        // ---
        let mut matching = self.station_ordered(station_id).await;
        let skip = matching.len().saturating_sub(limit as usize);
        Ok(matching.split_off(skip))
    }
}
