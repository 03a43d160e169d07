//! Read endpoints over stored readings, all under `/stations`.
//!
//! - `GET /stations/latest`               – latest reading of every station
//! - `GET /stations/{id}/latest`          – latest reading of one station
//! - `GET /stations/{id}/summary/today`   – today's readings as one bucket
//! - `GET /stations/{id}/history`         – bucketed history over a range
//! - `GET /stations/{id}/recent`          – last N raw readings, oldest first

use std::collections::BTreeMap;

use axum::{
    extract::{rejection::QueryRejection, Path, Query, State},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::AppState;
use crate::{
    aggregate::{self, Bucket, Granularity},
    latest::{self, Latest},
    ApiError, Reading, ValidationError,
};

/// Upper bound on `limit` for the recent-readings view.
const MAX_RECENT: u32 = 1000;

// ---

pub fn router() -> Router<AppState> {
    // ---
    Router::new()
        .route("/stations/latest", get(latest_all))
        .route("/stations/{id}/latest", get(latest_for))
        .route("/stations/{id}/summary/today", get(summary_today))
        .route("/stations/{id}/history", get(history))
        .route("/stations/{id}/recent", get(recent))
}

#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
enum LatestResponse {
    Ok {
        reading: Reading,
    },
    NotFound {
        #[serde(rename = "stationId")]
        station_id: String,
    },
}

#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
enum TodayResponse {
    Ok {
        #[serde(rename = "stationId")]
        station_id: String,
        date: NaiveDate,
        summary: Bucket,
    },
    Empty {
        #[serde(rename = "stationId")]
        station_id: String,
        date: NaiveDate,
    },
}

/// Query parameters for `/stations/{id}/history`.
#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    /// Inclusive range start, RFC 3339 (e.g. "2025-03-26T00:00:00Z").
    start: Option<String>,
    /// Inclusive range end, RFC 3339.
    end: Option<String>,
    /// hour | day | month | year; anything else buckets by year.
    granularity: Option<String>,
}

/// Query parameters for `/stations/{id}/recent`.
#[derive(Debug, Deserialize)]
pub struct RecentQuery {
    limit: Option<u32>,
}

async fn latest_all(
    State((store, _config)): State<AppState>,
) -> Result<Json<BTreeMap<String, Reading>>, ApiError> {
    // ---
    info!("GET /stations/latest");
    Ok(Json(latest::latest_all(store.as_ref()).await?))
}

async fn latest_for(
    Path(station_id): Path<String>,
    State((store, _config)): State<AppState>,
) -> Result<Json<LatestResponse>, ApiError> {
    // ---
    info!("GET /stations/{}/latest", station_id);

    let response = match latest::latest_for(store.as_ref(), &station_id).await? {
        Latest::Found(reading) => LatestResponse::Ok { reading },
        Latest::NotFound => {
            debug!("No readings for station {}", station_id);
            LatestResponse::NotFound { station_id }
        }
    };
    Ok(Json(response))
}

async fn summary_today(
    Path(station_id): Path<String>,
    State((store, config)): State<AppState>,
) -> Result<Json<TodayResponse>, ApiError> {
    // ---
    info!("GET /stations/{}/summary/today", station_id);

    let now = Utc::now();
    let offset = config.reporting_offset;
    let date = aggregate::local_date(now, offset);

    let response = match aggregate::summary_today(store.as_ref(), &station_id, now, offset).await? {
        Some(summary) => TodayResponse::Ok {
            station_id,
            date,
            summary,
        },
        None => TodayResponse::Empty { station_id, date },
    };
    Ok(Json(response))
}

async fn history(
    Path(station_id): Path<String>,
    State((store, config)): State<AppState>,
    query: Result<Query<HistoryQuery>, QueryRejection>,
) -> Result<Json<Vec<Bucket>>, ApiError> {
    // ---
    let Query(params) = query.map_err(|e| ValidationError::new(e.body_text()))?;
    info!("GET /stations/{}/history {:?}", station_id, params);

    let offset = config.reporting_offset;
    let start = parse_bound("start", params.start.as_deref(), Edge::Start, offset)?;
    let end = parse_bound("end", params.end.as_deref(), Edge::End, offset)?;
    let granularity = Granularity::parse(params.granularity.as_deref());

    let buckets = aggregate::aggregate(
        store.as_ref(),
        &station_id,
        start,
        end,
        granularity,
        offset,
    )
    .await?;
    Ok(Json(buckets))
}

async fn recent(
    Path(station_id): Path<String>,
    State((store, config)): State<AppState>,
    query: Result<Query<RecentQuery>, QueryRejection>,
) -> Result<Json<Vec<Reading>>, ApiError> {
    // ---
    let Query(params) = query.map_err(|e| ValidationError::new(e.body_text()))?;
    let limit = params
        .limit
        .unwrap_or(config.recent_limit)
        .clamp(1, MAX_RECENT);
    info!("GET /stations/{}/recent limit={}", station_id, limit);

    Ok(Json(store.recent(&station_id, limit).await?))
}

/// Which end of the history range a bound closes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Edge {
    Start,
    End,
}

/// Parse a required ISO 8601 range bound.
///
/// Accepted forms, most specific first:
/// - RFC 3339 with an offset: `2025-03-26T08:00:00Z`, `2025-03-26T10:00:00+02:00`
/// - local date-time without offset: `2025-03-26T08:00:00`, `2025-03-26T08:00`
/// - local date: `2025-03-26` (start: local midnight; end: last microsecond of that day)
///
/// Forms without an offset are read on the `offset` wall clock.
fn parse_bound(
    name: &str,
    value: Option<&str>,
    edge: Edge,
    offset: FixedOffset,
) -> Result<DateTime<Utc>, ValidationError> {
    // ---
    let raw = value
        .map(str::trim)
        .ok_or_else(|| ValidationError::new(format!("{name} is required")))?;

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }

    let local = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .or_else(|| {
            let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()?;
            let midnight = date.and_time(NaiveTime::MIN);
            Some(match edge {
                Edge::Start => midnight,
                Edge::End => midnight + Duration::days(1) - Duration::microseconds(1),
            })
        })
        .ok_or_else(|| {
            ValidationError::new(format!(
                "{name} is not a valid ISO 8601 timestamp (expected e.g. \
                 2025-03-26T08:00:00Z, 2025-03-26T08:00:00 or 2025-03-26)"
            ))
        })?;

    Ok((local - Duration::seconds(i64::from(offset.local_minus_utc()))).and_utc())
}
