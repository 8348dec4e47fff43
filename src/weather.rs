use std::collections::HashMap;

use futures::future::join_all;
use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use crate::tracks::{round_half_up, Track};

// 0.5 degree weather cells, deliberately coarser than the identity grid so
// one upstream call can cover many nearby tracks.
const WEATHER_CELLS_PER_DEGREE: f64 = 2.0;

/// Best-effort weather for one cell. Each field is independently nullable;
/// absence of one never blocks the others.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeatherSample {
    pub temp_c: Option<f64>,
    pub wind_ms: Option<f64>,
    pub wind_deg: Option<f64>,
    pub conditions: Option<String>,
}

/// Client for the per-cell weather upstream.
pub struct WeatherService {
    client: reqwest::Client,
    endpoint: String,
}

impl WeatherService {
    pub fn new(client: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }

    /// Attaches weather samples to tracks without ever dropping one. At
    /// most `limit` distinct 0.5 degree cells are queried, in first-seen
    /// order; every cell fetch is independent and a failure only leaves
    /// that cell without a sample. Absence of an API key disables the
    /// stage entirely.
    pub async fn enrich(
        &self,
        tracks: Vec<Track>,
        limit: usize,
        api_key: Option<&str>,
    ) -> Vec<Track> {
        if tracks.is_empty() {
            return tracks;
        }
        let Some(api_key) = api_key.map(str::trim).filter(|key| !key.is_empty()) else {
            return tracks;
        };

        // Representative coordinates per cell: the first track seen in it.
        let mut cells: Vec<((i64, i64), (f64, f64))> = Vec::new();
        for track in &tracks {
            if cells.len() >= limit {
                break;
            }
            let cell = weather_cell(track.lat, track.lon);
            if !cells.iter().any(|(seen, _)| *seen == cell) {
                cells.push((cell, (track.lat, track.lon)));
            }
        }

        // Fan out one call per cell and gather each outcome under its own
        // key once every call has settled.
        let fetches = cells.into_iter().map(|(cell, (lat, lon))| async move {
            (cell, self.fetch_cell(lat, lon, api_key).await)
        });
        let samples: HashMap<(i64, i64), WeatherSample> = join_all(fetches)
            .await
            .into_iter()
            .filter_map(|(cell, sample)| Some((cell, sample?)))
            .collect();

        tracks
            .into_iter()
            .map(|mut track| {
                track.weather = samples.get(&weather_cell(track.lat, track.lon)).cloned();
                track
            })
            .collect()
    }

    async fn fetch_cell(&self, lat: f64, lon: f64, api_key: &str) -> Option<WeatherSample> {
        let url = format!(
            "{}?lat={lat}&lon={lon}&appid={api_key}&units=metric",
            self.endpoint
        );

        let response = match self.client.get(&url).send().await {
            Ok(response) => response,
            Err(error) => {
                warn!("weather cell ({lat:.2}, {lon:.2}): fetch failed: {error}");
                return None;
            }
        };

        if !response.status().is_success() {
            warn!(
                "weather cell ({lat:.2}, {lon:.2}): HTTP {}",
                response.status().as_u16()
            );
            return None;
        }

        let body: Value = match response.json().await {
            Ok(body) => body,
            Err(error) => {
                warn!("weather cell ({lat:.2}, {lon:.2}): decode failed: {error}");
                return None;
            }
        };

        Some(WeatherSample {
            temp_c: body.pointer("/main/temp").and_then(Value::as_f64),
            wind_ms: body.pointer("/wind/speed").and_then(Value::as_f64),
            wind_deg: body.pointer("/wind/deg").and_then(Value::as_f64),
            conditions: body
                .pointer("/weather/0/main")
                .and_then(Value::as_str)
                .map(str::to_string),
        })
    }
}

/// Weather cell for a coordinate pair, lat/lon each rounded to the nearest
/// 0.5 degrees.
fn weather_cell(lat: f64, lon: f64) -> (i64, i64) {
    (
        round_half_up(lat * WEATHER_CELLS_PER_DEGREE),
        round_half_up(lon * WEATHER_CELLS_PER_DEGREE),
    )
}
