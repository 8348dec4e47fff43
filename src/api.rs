use std::collections::HashMap;

use axum::extract::{Query, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{SecondsFormat, Utc};
use serde::Serialize;

use crate::tracks::{AggregationResult, DebugInfo, Track};
use crate::AppState;

const DEFAULT_HOURS: i64 = 24;
const MIN_HOURS: i64 = 1;
const MAX_HOURS: i64 = 24;
const DEFAULT_WEATHER_LIMIT: usize = 25;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DashboardPayload {
    fetched_at: String,
    hours: u32,
    count: usize,
    balloons: Vec<Track>,
    #[serde(rename = "_debug", skip_serializing_if = "Option::is_none")]
    debug: Option<DebugInfo>,
}

pub async fn healthz() -> &'static str {
    "ok"
}

/// GET /api/dashboard?hours=24&weather=1&weatherLimit=25&debug=1
pub async fn dashboard(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let hours = parse_hours(params.get("hours"));
    let use_weather = parse_boolish(params.get("weather"));
    let weather_limit = parse_weather_limit(params.get("weatherLimit"));
    let want_debug = parse_debug(params.get("debug"));

    let aggregated = match state.cache.get(hours, want_debug).await {
        Some(hit) => hit,
        None => {
            let result = state.feed.aggregate(hours, want_debug).await;
            state.cache.put(hours, want_debug, &result).await;
            result
        }
    };

    let AggregationResult { balloons, debug } = aggregated;
    let balloons = if use_weather {
        state
            .weather
            .enrich(
                balloons,
                weather_limit,
                state.cfg.openweather_api_key.as_deref(),
            )
            .await
    } else {
        balloons
    };

    let payload = DashboardPayload {
        fetched_at: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        hours,
        count: balloons.len(),
        balloons,
        debug,
    };

    let mut response = (StatusCode::OK, Json(&payload)).into_response();
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("public, max-age=30"),
    );
    response
}

/// `hours` follows the upstream dashboard convention: absent, non-numeric
/// or zero fall back to the default, everything else clamps into [1, 24].
fn parse_hours(value: Option<&String>) -> u32 {
    value
        .and_then(|value| value.trim().parse::<f64>().ok())
        .filter(|parsed| parsed.is_finite())
        .map(|parsed| parsed.floor() as i64)
        .filter(|parsed| *parsed != 0)
        .unwrap_or(DEFAULT_HOURS)
        .clamp(MIN_HOURS, MAX_HOURS) as u32
}

/// Absent is false, a bare `?weather` (empty value) is true, and only the
/// explicit negatives turn it off.
fn parse_boolish(value: Option<&String>) -> bool {
    let Some(value) = value else {
        return false;
    };
    let normalized = value.trim().to_ascii_lowercase();
    if normalized.is_empty() {
        return true;
    }
    !matches!(normalized.as_str(), "0" | "false" | "no" | "off")
}

/// Debug is opt-in only for the explicit positives.
fn parse_debug(value: Option<&String>) -> bool {
    matches!(
        value.map(|value| value.trim().to_ascii_lowercase()).as_deref(),
        Some("1" | "true" | "yes")
    )
}

fn parse_weather_limit(value: Option<&String>) -> usize {
    value
        .and_then(|value| value.trim().parse::<f64>().ok())
        .filter(|parsed| parsed.is_finite() && *parsed >= 0.0)
        .map(|parsed| parsed.floor() as usize)
        .unwrap_or(DEFAULT_WEATHER_LIMIT)
}
