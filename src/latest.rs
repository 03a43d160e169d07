//! Latest-State Resolver: the most recent reading per station.
//!
//! Selection rule: maximum `timestamp`; among readings sharing it, the one
//! stored last. Arrival order only ever breaks ties, it never outranks a
//! newer `timestamp`.

use std::collections::BTreeMap;

use crate::{Reading, ReadingStore, StoreError};

// ---

/// Outcome of a single-station lookup. `NotFound` is a normal answer.
#[derive(Debug, Clone, PartialEq)]
pub enum Latest {
    Found(Reading),
    NotFound,
}

/// Whether `candidate`, which arrived after `current`, replaces it as latest.
pub fn supersedes(candidate: &Reading, current: &Reading) -> bool {
    candidate.timestamp >= current.timestamp
}

/// Pick the latest reading from an iterator yielding readings in arrival order.
pub fn select_latest<'a, I>(readings: I) -> Option<&'a Reading>
where
    I: IntoIterator<Item = &'a Reading>,
{
    readings.into_iter().fold(None, |best, candidate| match best {
        Some(current) if !supersedes(candidate, current) => Some(current),
        _ => Some(candidate),
    })
}

/// Latest reading of every station ever ingested, keyed by station id.
pub async fn latest_all(store: &dyn ReadingStore) -> Result<BTreeMap<String, Reading>, StoreError> {
    // ---
    let readings = store.latest_per_station().await?;
    tracing::debug!("Resolved latest readings for {} stations", readings.len());

    Ok(readings
        .into_iter()
        .map(|r| (r.station_id.clone(), r))
        .collect())
}

/// Latest reading of one station.
pub async fn latest_for(store: &dyn ReadingStore, station_id: &str) -> Result<Latest, StoreError> {
    // ---
    Ok(match store.latest_for(station_id).await? {
        Some(reading) => Latest::Found(reading),
        None => Latest::NotFound,
    })
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::store::MemoryReadingStore;
    use crate::Measurements;
    use chrono::{DateTime, TimeZone, Utc};
    use uuid::Uuid;

    fn reading(station: &str, ts: DateTime<Utc>, temp: f64) -> Reading {
        // ---
        Reading {
            id: Uuid::new_v4(),
            station_id: station.to_string(),
            location: None,
            coordinates: None,
            timestamp: ts,
            received_at: Utc::now(),
            measurements: Measurements {
                temperature: Some(temp),
                ..Default::default()
            },
        }
    }

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 26, hour, 0, 0).unwrap()
    }

    #[test]
    fn test_select_latest_prefers_timestamp_over_arrival() {
        // ---
        let newer = reading("S1", at(10), 1.0);
        let older_but_later_arrival = reading("S1", at(8), 2.0);

        let picked = select_latest([&newer, &older_but_later_arrival]).unwrap();
        assert_eq!(picked.id, newer.id);
    }

    #[test]
    fn test_select_latest_tie_goes_to_last_arrival() {
        // ---
        let first = reading("S1", at(10), 1.0);
        let second = reading("S1", at(10), 2.0);

        let picked = select_latest([&first, &second]).unwrap();
        assert_eq!(picked.id, second.id);

        // repeated calls agree
        let again = select_latest([&first, &second]).unwrap();
        assert_eq!(again.id, picked.id);
    }

    #[test]
    fn test_select_latest_empty() {
        assert!(select_latest(std::iter::empty()).is_none());
    }

    #[tokio::test]
    async fn test_latest_for_after_append() {
        // ---
        let store = MemoryReadingStore::new();
        let early = reading("S1", at(8), 10.0);
        let late = reading("S1", at(14), 20.0);

        store.append(&late).await.unwrap();
        store.append(&early).await.unwrap();

        match latest_for(&store, "S1").await.unwrap() {
            Latest::Found(r) => assert_eq!(r.timestamp, late.timestamp),
            Latest::NotFound => panic!("expected a reading for S1"),
        }
    }

    #[tokio::test]
    async fn test_latest_for_unknown_station_is_not_found() {
        // ---
        let store = MemoryReadingStore::new();
        store.append(&reading("S1", at(8), 10.0)).await.unwrap();

        let outcome = latest_for(&store, "S9").await;
        tokio_test::assert_ok!(&outcome);
        assert_eq!(outcome.unwrap(), Latest::NotFound);
    }

    #[tokio::test]
    async fn test_latest_all_one_entry_per_station() {
        // ---
        let store = MemoryReadingStore::new();
        let s1_old = reading("S1", at(8), 10.0);
        let s2 = reading("S2", at(9), 15.0);
        let s1_new = reading("S1", at(12), 12.0);
        let s1_tie = reading("S1", at(12), 13.0);

        for r in [&s1_old, &s2, &s1_new, &s1_tie] {
            store.append(r).await.unwrap();
        }

        let all = latest_all(&store).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all["S1"].id, s1_tie.id);
        assert_eq!(all["S2"].id, s2.id);
        assert_eq!(all.keys().collect::<Vec<_>>(), vec!["S1", "S2"]);
    }
}
