use std::time::Duration;

use chrono::Utc;
use tokio::sync::RwLock;

use crate::tracks::AggregationResult;

struct CacheSlot {
    captured_at_ms: i64,
    hours: u32,
    payload: AggregationResult,
}

/// Single-slot cache for the most recent aggregation, keyed by the
/// requested hour window and valid for a short TTL. A new successful
/// non-debug aggregation overwrites the slot wholesale; concurrent misses
/// may race to recompute, which is acceptable because recomputation is
/// idempotent and the cache is advisory only.
pub struct ResponseCache {
    ttl_ms: i64,
    slot: RwLock<Option<CacheSlot>>,
}

impl ResponseCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl_ms: ttl.as_millis() as i64,
            slot: RwLock::new(None),
        }
    }

    /// A hit requires a fresh entry for the same hour window; debug
    /// requests always bypass the cache.
    pub async fn get(&self, hours: u32, debug: bool) -> Option<AggregationResult> {
        if debug {
            return None;
        }

        let slot = self.slot.read().await;
        let entry = slot.as_ref()?;
        if entry.hours != hours {
            return None;
        }
        if now_ms() - entry.captured_at_ms >= self.ttl_ms {
            return None;
        }
        Some(entry.payload.clone())
    }

    /// No-op for debug results and for results with zero tracks.
    pub async fn put(&self, hours: u32, debug: bool, result: &AggregationResult) {
        if debug || result.balloons.is_empty() {
            return;
        }

        let mut slot = self.slot.write().await;
        *slot = Some(CacheSlot {
            captured_at_ms: now_ms(),
            hours,
            payload: result.clone(),
        });
    }
}

fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}
