use std::collections::HashMap;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use crate::snapshot::parse_points;
use crate::weather::WeatherSample;

const MILLIS_PER_HOUR: i64 = 3_600_000;
const MIN_HOURS: u32 = 1;
const MAX_HOURS: u32 = 24;
// 0.01 degree identity cells: lat/lon each rounded to 2 decimal places.
const IDENTITY_CELLS_PER_DEGREE: f64 = 100.0;

/// One observation from one hourly snapshot, stamped at fetch time.
#[derive(Debug, Clone, PartialEq)]
pub struct Point {
    pub lat: f64,
    pub lon: f64,
    pub alt: Option<f64>,
    pub hour_offset: u32,
    pub timestamp_ms: i64,
}

/// A point carrying its reconstructed track identity. Ids are only stable
/// within one aggregation call.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    pub id: String,
    pub lat: f64,
    pub lon: f64,
    pub alt: Option<f64>,
    pub hour_offset: u32,
    #[serde(rename = "timestamp")]
    pub timestamp_ms: i64,
    pub weather: Option<WeatherSample>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DebugInfo {
    pub hours_fetched: u32,
    pub points_per_hour: Vec<usize>,
    pub total_points: usize,
}

#[derive(Debug, Clone)]
pub struct AggregationResult {
    pub balloons: Vec<Track>,
    pub debug: Option<DebugInfo>,
}

/// Client for the hourly snapshot feed.
pub struct SnapshotFeed {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl SnapshotFeed {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>, timeout: Duration) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            client,
            base_url,
            timeout,
        }
    }

    /// Fetches and decodes one hour's snapshot. Every failure path reduces
    /// to an empty list with a logged warning; the points of one successful
    /// call all share the same offset and timestamp.
    async fn fetch_hour(&self, offset: u32) -> Vec<Point> {
        let url = format!("{}/{:02}.json", self.base_url, offset);

        let response = match self
            .client
            .get(&url)
            .timeout(self.timeout)
            .send()
            .await
        {
            Ok(response) => response,
            Err(error) => {
                warn!("hour {offset:02}: fetch failed: {error}");
                return Vec::new();
            }
        };

        if !response.status().is_success() {
            warn!("hour {offset:02}: HTTP {}", response.status().as_u16());
            return Vec::new();
        }

        // Read the body as text first so a decode failure is
        // distinguishable from a transport failure.
        let body = match response.text().await {
            Ok(body) => body,
            Err(error) => {
                warn!("hour {offset:02}: body read failed: {error}");
                return Vec::new();
            }
        };

        let raw: Value = match serde_json::from_str(&body) {
            Ok(raw) => raw,
            Err(error) => {
                warn!(
                    "hour {offset:02}: JSON decode failed ({error}), len={}",
                    body.len()
                );
                return Vec::new();
            }
        };

        let positions = parse_points(&raw);
        if positions.is_empty() {
            warn!("hour {offset:02}: parsed 0 points");
            return Vec::new();
        }

        let timestamp_ms = Utc::now().timestamp_millis() - i64::from(offset) * MILLIS_PER_HOUR;
        positions
            .into_iter()
            .map(|position| Point {
                lat: position.lat,
                lon: position.lon,
                alt: position.alt,
                hour_offset: offset,
                timestamp_ms,
            })
            .collect()
    }

    /// Fetches the requested hour window and assigns track identities.
    /// Hours are fetched strictly one at a time to keep upstream
    /// concurrency at 1 for the primary feed.
    pub async fn aggregate(&self, hours: u32, debug: bool) -> AggregationResult {
        let clamped = hours.clamp(MIN_HOURS, MAX_HOURS);

        let mut all = Vec::new();
        let mut points_per_hour = Vec::with_capacity(clamped as usize);
        for offset in 0..clamped {
            let points = self.fetch_hour(offset).await;
            points_per_hour.push(points.len());
            all.extend(points);
        }

        let balloons = assign_track_ids(all);
        let debug = debug.then(|| DebugInfo {
            hours_fetched: clamped,
            total_points: balloons.len(),
            points_per_hour,
        });

        AggregationResult { balloons, debug }
    }
}

/// Identity cell for a coordinate pair, lat/lon each rounded to 0.01
/// degrees.
pub fn identity_cell(lat: f64, lon: f64) -> (i64, i64) {
    (
        round_half_up(lat * IDENTITY_CELLS_PER_DEGREE),
        round_half_up(lon * IDENTITY_CELLS_PER_DEGREE),
    )
}

/// Half-cell boundaries round toward positive infinity, so -0.5 bins to 0
/// rather than -1.
pub(crate) fn round_half_up(value: f64) -> i64 {
    (value + 0.5).floor() as i64
}

/// Issues a sequential id per distinct identity cell, in point order. The
/// map and counter are local to the call, so ids are a per-run
/// reconstruction rather than a persistent identity.
fn assign_track_ids(points: Vec<Point>) -> Vec<Track> {
    let mut grid: HashMap<(i64, i64), String> = HashMap::new();
    let mut seq = 0u32;

    points
        .into_iter()
        .map(|point| {
            let cell = identity_cell(point.lat, point.lon);
            let id = grid
                .entry(cell)
                .or_insert_with(|| {
                    seq += 1;
                    format!("b{seq:04}")
                })
                .clone();
            Track {
                id,
                lat: point.lat,
                lon: point.lon,
                alt: point.alt,
                hour_offset: point.hour_offset,
                timestamp_ms: point.timestamp_ms,
                weather: None,
            }
        })
        .collect()
}
