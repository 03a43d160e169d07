//! Aggregation Engine: per-station summaries over a time window, bucketed
//! at a caller-chosen [`Granularity`].
//!
//! Buckets are computed on demand from a fresh range read and never stored.
//! Bucket keys are cut from the deployment's reference timezone (a fixed UTC
//! offset, see `Config::reporting_offset`), so "hour 08" and "today" mean
//! the same wall clock everywhere in the service.

use std::collections::HashMap;

use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, NaiveTime, Timelike, Utc};
use serde::Serialize;

use crate::{Reading, ReadingStore, StoreError};

// ---

/// Requested time-bucket width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Granularity {
    Hour,
    Day,
    Month,
    Year,
}

impl Granularity {
    /// Parse a query-string value. Absent or unrecognized values mean
    /// [`Granularity::Year`]; matching is exact (`"Hour"` is not `hour`).
    pub fn parse(value: Option<&str>) -> Self {
        // ---
        match value {
            Some("hour") => Granularity::Hour,
            Some("day") => Granularity::Day,
            Some("month") => Granularity::Month,
            _ => Granularity::Year,
        }
    }

    /// Key of the bucket `timestamp` falls into, on the `offset` wall clock.
    pub fn key_for(self, timestamp: DateTime<Utc>, offset: FixedOffset) -> BucketKey {
        // ---
        let local = timestamp.with_timezone(&offset);
        let year = BucketKey {
            year: local.year(),
            month: None,
            day: None,
            hour: None,
        };

        match self {
            Granularity::Year => year,
            Granularity::Month => BucketKey {
                month: Some(local.month()),
                ..year
            },
            Granularity::Day => BucketKey {
                month: Some(local.month()),
                day: Some(local.day()),
                ..year
            },
            Granularity::Hour => BucketKey {
                month: Some(local.month()),
                day: Some(local.day()),
                hour: Some(local.hour()),
                ..year
            },
        }
    }
}

/// Composite `(year, [month], [day], [hour])` bucket identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct BucketKey {
    // ---
    pub year: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub month: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub day: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hour: Option<u32>,
}

/// One aggregation result. Only buckets with at least one reading exist.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Bucket {
    // ---
    pub bucket: BucketKey,

    /// Timestamp of the earliest reading in the bucket, not the bucket start.
    pub bucket_reference_timestamp: DateTime<Utc>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub avg_temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avg_humidity: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avg_pressure: Option<f64>,

    pub total_precipitation: f64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub avg_wind_speed: Option<f64>,

    pub sample_count: u64,
}

/// Running mean over the readings that actually carry a field.
#[derive(Debug, Default, Clone, Copy)]
struct Mean {
    sum: f64,
    n: u64,
}

impl Mean {
    fn add(&mut self, value: Option<f64>) {
        if let Some(v) = value {
            self.sum += v;
            self.n += 1;
        }
    }

    fn value(&self) -> Option<f64> {
        (self.n > 0).then(|| self.sum / self.n as f64)
    }
}

#[derive(Debug)]
struct Accumulator {
    key: BucketKey,
    reference: DateTime<Utc>,
    temperature: Mean,
    humidity: Mean,
    pressure: Mean,
    wind_speed: Mean,
    precipitation: f64,
    count: u64,
}

impl Accumulator {
    fn new(key: BucketKey, first: &Reading) -> Self {
        // ---
        Accumulator {
            key,
            reference: first.timestamp,
            temperature: Mean::default(),
            humidity: Mean::default(),
            pressure: Mean::default(),
            wind_speed: Mean::default(),
            precipitation: 0.0,
            count: 0,
        }
    }

    fn add(&mut self, reading: &Reading) {
        // ---
        let m = &reading.measurements;
        if reading.timestamp < self.reference {
            self.reference = reading.timestamp;
        }
        self.temperature.add(m.temperature);
        self.humidity.add(m.humidity);
        self.pressure.add(m.pressure);
        self.wind_speed.add(m.wind_speed);
        self.precipitation += m.precipitation.unwrap_or(0.0);
        self.count += 1;
    }

    fn finish(self) -> Bucket {
        // ---
        Bucket {
            bucket: self.key,
            bucket_reference_timestamp: self.reference,
            avg_temperature: self.temperature.value(),
            avg_humidity: self.humidity.value(),
            avg_pressure: self.pressure.value(),
            total_precipitation: self.precipitation,
            avg_wind_speed: self.wind_speed.value(),
            sample_count: self.count,
        }
    }
}

/// Group `readings` into buckets, ascending by reference timestamp.
///
/// Readings outside `[start, end]` are ignored even if the caller passed
/// them in.
pub fn bucketize(
    readings: &[Reading],
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    granularity: Granularity,
    offset: FixedOffset,
) -> Vec<Bucket> {
    // ---
    let mut groups: HashMap<BucketKey, Accumulator> = HashMap::new();

    for reading in readings
        .iter()
        .filter(|r| r.timestamp >= start && r.timestamp <= end)
    {
        let key = granularity.key_for(reading.timestamp, offset);
        groups
            .entry(key)
            .or_insert_with(|| Accumulator::new(key, reading))
            .add(reading);
    }

    let mut buckets: Vec<Bucket> = groups.into_values().map(Accumulator::finish).collect();
    buckets.sort_by_key(|b| b.bucket_reference_timestamp);
    buckets
}

/// Collapse every reading in `[start, end]` into a single bucket keyed by
/// the day containing `start`. `None` when nothing falls in range.
pub fn collapse(
    readings: &[Reading],
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    offset: FixedOffset,
) -> Option<Bucket> {
    // ---
    let key = Granularity::Day.key_for(start, offset);
    let mut in_range = readings
        .iter()
        .filter(|r| r.timestamp >= start && r.timestamp <= end);

    let first = in_range.next()?;
    let mut acc = Accumulator::new(key, first);
    acc.add(first);
    in_range.for_each(|r| acc.add(r));
    Some(acc.finish())
}

/// Bucketed history of one station over `[start, end]`.
///
/// An inverted range or an unknown station yields an empty sequence.
pub async fn aggregate(
    store: &dyn ReadingStore,
    station_id: &str,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    granularity: Granularity,
    offset: FixedOffset,
) -> Result<Vec<Bucket>, StoreError> {
    // ---
    if start > end {
        tracing::debug!("Inverted range {} > {}, nothing to aggregate", start, end);
        return Ok(Vec::new());
    }

    let readings = store.query_range(station_id, start, end).await?;
    let buckets = bucketize(&readings, start, end, granularity, offset);

    tracing::debug!(
        "Aggregated {} readings of {} into {} {:?} buckets",
        readings.len(),
        station_id,
        buckets.len(),
        granularity
    );
    Ok(buckets)
}

/// Calendar date of `now` on the reference wall clock.
pub fn local_date(now: DateTime<Utc>, offset: FixedOffset) -> NaiveDate {
    now.with_timezone(&offset).date_naive()
}

/// Local midnight, on the reference wall clock, of the day containing `now`.
pub fn start_of_day(now: DateTime<Utc>, offset: FixedOffset) -> DateTime<Utc> {
    // ---
    let midnight = local_date(now, offset).and_time(NaiveTime::MIN);
    (midnight - Duration::seconds(i64::from(offset.local_minus_utc()))).and_utc()
}

/// Everything a station reported between local midnight and `now`, as one bucket.
pub async fn summary_today(
    store: &dyn ReadingStore,
    station_id: &str,
    now: DateTime<Utc>,
    offset: FixedOffset,
) -> Result<Option<Bucket>, StoreError> {
    // ---
    let start = start_of_day(now, offset);
    let readings = store.query_range(station_id, start, now).await?;
    Ok(collapse(&readings, start, now, offset))
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::store::MemoryReadingStore;
    use crate::Measurements;
    use chrono::TimeZone;
    use uuid::Uuid;

    fn utc() -> FixedOffset {
        FixedOffset::east_opt(0).unwrap()
    }

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 26, h, m, 0).unwrap()
    }

    fn reading(ts: DateTime<Utc>, temp: Option<f64>, precip: Option<f64>) -> Reading {
        // ---
        Reading {
            id: Uuid::new_v4(),
            station_id: "S1".to_string(),
            location: None,
            coordinates: None,
            timestamp: ts,
            received_at: ts,
            measurements: Measurements {
                temperature: temp,
                precipitation: precip,
                ..Default::default()
            },
        }
    }

    /// 08:00 (10°, 1mm), 08:30 (12°, 2mm), 14:00 (20°, 0mm).
    fn sample_day() -> Vec<Reading> {
        vec![
            reading(at(8, 0), Some(10.0), Some(1.0)),
            reading(at(8, 30), Some(12.0), Some(2.0)),
            reading(at(14, 0), Some(20.0), Some(0.0)),
        ]
    }

    async fn seeded_store(readings: &[Reading]) -> MemoryReadingStore {
        // ---
        let store = MemoryReadingStore::new();
        for r in readings {
            store.append(r).await.unwrap();
        }
        store
    }

    #[test]
    fn test_granularity_parse() {
        // ---
        assert_eq!(Granularity::parse(Some("hour")), Granularity::Hour);
        assert_eq!(Granularity::parse(Some("day")), Granularity::Day);
        assert_eq!(Granularity::parse(Some("month")), Granularity::Month);
        assert_eq!(Granularity::parse(Some("year")), Granularity::Year);
        assert_eq!(Granularity::parse(Some("fortnight")), Granularity::Year);
        assert_eq!(Granularity::parse(Some("Hour")), Granularity::Year);
        assert_eq!(Granularity::parse(None), Granularity::Year);
    }

    #[test]
    fn test_key_for_each_granularity() {
        // ---
        let ts = at(8, 30);
        let hour = Granularity::Hour.key_for(ts, utc());
        assert_eq!(
            (hour.year, hour.month, hour.day, hour.hour),
            (2025, Some(3), Some(26), Some(8))
        );

        let month = Granularity::Month.key_for(ts, utc());
        assert_eq!((month.month, month.day, month.hour), (Some(3), None, None));

        let year = Granularity::Year.key_for(ts, utc());
        assert_eq!((year.year, year.month), (2025, None));
    }

    #[test]
    fn test_key_uses_reference_offset() {
        // ---
        // 23:30 UTC is 00:30 the next day at UTC+1
        let plus_one = FixedOffset::east_opt(3600).unwrap();
        let key = Granularity::Hour.key_for(at(23, 30), plus_one);
        assert_eq!((key.day, key.hour), (Some(27), Some(0)));
    }

    #[test]
    fn test_hourly_buckets() {
        // ---
        let buckets = bucketize(&sample_day(), at(0, 0), at(23, 59), Granularity::Hour, utc());

        assert_eq!(buckets.len(), 2);
        assert_eq!(buckets[0].bucket.hour, Some(8));
        assert_eq!(buckets[0].avg_temperature, Some(11.0));
        assert_eq!(buckets[0].total_precipitation, 3.0);
        assert_eq!(buckets[0].sample_count, 2);
        assert_eq!(buckets[0].bucket_reference_timestamp, at(8, 0));

        assert_eq!(buckets[1].bucket.hour, Some(14));
        assert_eq!(buckets[1].avg_temperature, Some(20.0));
        assert_eq!(buckets[1].total_precipitation, 0.0);
        assert_eq!(buckets[1].sample_count, 1);
    }

    #[test]
    fn test_daily_bucket() {
        // ---
        let buckets = bucketize(&sample_day(), at(0, 0), at(23, 59), Granularity::Day, utc());

        assert_eq!(buckets.len(), 1);
        assert_eq!(buckets[0].avg_temperature, Some(14.0));
        assert_eq!(buckets[0].total_precipitation, 3.0);
        assert_eq!(buckets[0].sample_count, 3);
    }

    #[test]
    fn test_unknown_granularity_matches_year() {
        // ---
        let readings = sample_day();
        let fortnight = bucketize(
            &readings,
            at(0, 0),
            at(23, 59),
            Granularity::parse(Some("fortnight")),
            utc(),
        );
        let year = bucketize(&readings, at(0, 0), at(23, 59), Granularity::Year, utc());
        assert_eq!(fortnight, year);
        assert_eq!(year.len(), 1);
    }

    #[test]
    fn test_missing_field_does_not_count() {
        // ---
        let mut with_humidity = reading(at(9, 0), Some(10.0), None);
        with_humidity.measurements.humidity = Some(60.0);
        let without_humidity = reading(at(9, 10), Some(20.0), None);

        let buckets = bucketize(
            &[with_humidity, without_humidity.clone()],
            at(0, 0),
            at(23, 59),
            Granularity::Hour,
            utc(),
        );
        assert_eq!(buckets[0].avg_humidity, Some(60.0));
        assert_eq!(buckets[0].avg_temperature, Some(15.0));
        assert_eq!(buckets[0].total_precipitation, 0.0);

        // sole reading lacks humidity: absent, not zero
        let alone = bucketize(&[without_humidity], at(0, 0), at(23, 59), Granularity::Hour, utc());
        assert_eq!(alone[0].avg_humidity, None);
        let json = serde_json::to_value(&alone[0]).unwrap();
        assert!(json.get("avgHumidity").is_none());
        assert_eq!(json["sampleCount"], 1);
    }

    #[test]
    fn test_reading_before_start_is_excluded() {
        // ---
        let start = at(8, 0);
        let just_before = reading(start - Duration::milliseconds(1), Some(99.0), Some(50.0));
        let inside = reading(start, Some(10.0), Some(1.0));

        let buckets = bucketize(&[just_before, inside], start, at(23, 59), Granularity::Day, utc());
        assert_eq!(buckets.len(), 1);
        assert_eq!(buckets[0].sample_count, 1);
        assert_eq!(buckets[0].avg_temperature, Some(10.0));
        assert_eq!(buckets[0].total_precipitation, 1.0);
    }

    #[test]
    fn test_buckets_ordered_by_reference_timestamp() {
        // ---
        let readings = vec![
            reading(at(14, 5), Some(1.0), None),
            reading(at(3, 15), Some(2.0), None),
            reading(at(9, 45), Some(3.0), None),
            reading(at(3, 0), Some(4.0), None),
        ];
        let buckets = bucketize(&readings, at(0, 0), at(23, 59), Granularity::Hour, utc());

        let refs: Vec<_> = buckets.iter().map(|b| b.bucket_reference_timestamp).collect();
        assert_eq!(refs, vec![at(3, 0), at(9, 45), at(14, 5)]);
    }

    #[tokio::test]
    async fn test_hour_totals_sum_to_day_total() {
        // ---
        let mut readings = sample_day();
        readings.push(reading(at(23, 10), None, Some(4.5)));
        readings.push(reading(at(0, 0), None, Some(0.25)));
        let store = seeded_store(&readings).await;

        let (start, end) = (at(0, 0), at(23, 59));
        let hourly = aggregate(&store, "S1", start, end, Granularity::Hour, utc()).await.unwrap();
        let daily = aggregate(&store, "S1", start, end, Granularity::Day, utc()).await.unwrap();

        let hourly_total: f64 = hourly.iter().map(|b| b.total_precipitation).sum();
        assert_eq!(daily.len(), 1);
        assert_eq!(hourly_total, daily[0].total_precipitation);
        assert_eq!(hourly_total, 7.75);
    }

    #[tokio::test]
    async fn test_aggregate_is_repeatable() {
        // ---
        let store = seeded_store(&sample_day()).await;

        let first = aggregate(&store, "S1", at(0, 0), at(23, 59), Granularity::Hour, utc()).await;
        let second = aggregate(&store, "S1", at(0, 0), at(23, 59), Granularity::Hour, utc()).await;
        assert_eq!(first.unwrap(), second.unwrap());
    }

    #[tokio::test]
    async fn test_empty_outcomes() {
        // ---
        let store = seeded_store(&sample_day()).await;

        let unknown = aggregate(&store, "S9", at(0, 0), at(23, 59), Granularity::Day, utc()).await;
        assert!(tokio_test::assert_ok!(unknown).is_empty());

        let inverted = aggregate(&store, "S1", at(23, 59), at(0, 0), Granularity::Day, utc()).await;
        assert!(tokio_test::assert_ok!(inverted).is_empty());
    }

    #[test]
    fn test_start_of_day() {
        // ---
        assert_eq!(start_of_day(at(18, 45), utc()), at(0, 0));

        // 02:00 UTC on the 26th is 21:00 on the 25th at UTC-5
        let minus_five = FixedOffset::west_opt(5 * 3600).unwrap();
        let expected = Utc.with_ymd_and_hms(2025, 3, 25, 5, 0, 0).unwrap();
        assert_eq!(start_of_day(at(2, 0), minus_five), expected);
        assert_eq!(
            local_date(at(2, 0), minus_five),
            NaiveDate::from_ymd_opt(2025, 3, 25).unwrap()
        );
    }

    #[tokio::test]
    async fn test_summary_today_collapses_to_one_bucket() {
        // ---
        let mut readings = sample_day();
        // yesterday, must not count
        readings.push(reading(at(0, 0) - Duration::minutes(5), Some(-40.0), Some(9.0)));
        let store = seeded_store(&readings).await;

        let summary = summary_today(&store, "S1", at(18, 45), utc())
            .await
            .unwrap()
            .expect("readings exist today");
        assert_eq!(summary.sample_count, 3);
        assert_eq!(summary.avg_temperature, Some(14.0));
        assert_eq!(summary.total_precipitation, 3.0);
        assert_eq!(summary.bucket_reference_timestamp, at(8, 0));
        assert_eq!(summary.bucket.day, Some(26));
    }

    #[tokio::test]
    async fn test_summary_today_ignores_readings_after_now() {
        // ---
        let store = seeded_store(&sample_day()).await;

        let summary = summary_today(&store, "S1", at(8, 15), utc()).await.unwrap().unwrap();
        assert_eq!(summary.sample_count, 1);

        let early = summary_today(&store, "S1", at(7, 0), utc()).await.unwrap();
        assert!(early.is_none());
    }
}
