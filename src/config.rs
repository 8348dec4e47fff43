use std::time::Duration;

use anyhow::{Context, Result};

const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:8080";
const DEFAULT_FEED_BASE_URL: &str = "https://a.windbornesystems.com/treasure";
const DEFAULT_WEATHER_ENDPOINT: &str = "https://api.openweathermap.org/data/3.0/onecall";
const DEFAULT_FETCH_TIMEOUT_SECONDS: u64 = 10;
const DEFAULT_CACHE_TTL_SECONDS: u64 = 60;

#[derive(Clone)]
pub struct Config {
    pub listen_addr: String,
    pub feed_base_url: String,
    pub weather_endpoint: String,
    pub openweather_api_key: Option<String>,
    pub fetch_timeout: Duration,
    pub cache_ttl: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let listen_addr = env_string("BALLOON_API_LISTEN_ADDR", DEFAULT_LISTEN_ADDR);
        let feed_base_url = env_string("BALLOON_FEED_BASE_URL", DEFAULT_FEED_BASE_URL);
        let weather_endpoint = env_string("OPENWEATHER_ENDPOINT", DEFAULT_WEATHER_ENDPOINT);
        let openweather_api_key = std::env::var("OPENWEATHER_API_KEY")
            .ok()
            .filter(|value| !value.trim().is_empty());
        let fetch_timeout = Duration::from_secs(env_u64(
            "BALLOON_FETCH_TIMEOUT_SECONDS",
            DEFAULT_FETCH_TIMEOUT_SECONDS,
        )?);
        let cache_ttl = Duration::from_secs(env_u64(
            "BALLOON_CACHE_TTL_SECONDS",
            DEFAULT_CACHE_TTL_SECONDS,
        )?);

        Ok(Self {
            listen_addr,
            feed_base_url,
            weather_endpoint,
            openweather_api_key,
            fetch_timeout,
            cache_ttl,
        })
    }
}

fn env_string(name: &str, default: &str) -> String {
    std::env::var(name)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn env_u64(name: &str, default: u64) -> Result<u64> {
    match std::env::var(name) {
        Ok(value) => value
            .parse::<u64>()
            .with_context(|| format!("Failed to parse {}={} as u64", name, value)),
        Err(_) => Ok(default),
    }
}
