use std::str::FromStr;

use anyhow::{Context, Result};

use crate::{
    channels::{Channels, DEFAULT_ACTUATOR_CHANNELS, DEFAULT_SENSOR_CHANNELS},
    levels::{Thresholds, DEFAULT_MOISTURE_OPTIMAL_MAX},
    units::{GasUnit, TemperatureUnit},
};

// ---------------------------------------------------------------------------
// StoreBackend
// ---------------------------------------------------------------------------

/// Which document store the service talks to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreBackend {
    Firestore(FirestoreConfig),
    /// In-process store seeded with empty actuator documents.
    Memory,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirestoreConfig {
    pub project_id: String,
    pub database: String,
    pub base_url: String,
    pub api_key: Option<String>,
    /// Period of the document polls backing each live feed.
    pub poll_interval_ms: u64,
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Config {
    pub store: StoreBackend,
    pub channels: Channels,
    /// Append every observed sensor value to the per-sensor archive collection.
    pub archive_readings: bool,
    pub thresholds: Thresholds,
    pub temperature_unit: TemperatureUnit,
    pub gas_unit: GasUnit,
    pub server_host: String,
    pub server_port: u16,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup so tests need not touch the
    /// process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let env = Env(lookup);

        let store = match env.optional("STORE_BACKEND", "firestore").as_str() {
            "firestore" => StoreBackend::Firestore(FirestoreConfig {
                project_id: env.required("FIRESTORE_PROJECT_ID")?,
                database: env.optional("FIRESTORE_DATABASE", "(default)"),
                base_url: env.optional("FIRESTORE_BASE_URL", "https://firestore.googleapis.com/v1"),
                api_key: env.get("FIRESTORE_API_KEY").filter(|k| !k.is_empty()),
                poll_interval_ms: env.parsed("FEED_POLL_INTERVAL_MS", "2000")?,
            }),
            "memory" => StoreBackend::Memory,
            other => anyhow::bail!("STORE_BACKEND must be 'firestore' or 'memory', got: {other:?}"),
        };

        let thresholds = Thresholds {
            moisture_optimal_max: env
                .parsed("MOISTURE_OPTIMAL_MAX", &DEFAULT_MOISTURE_OPTIMAL_MAX.to_string())?,
            ..Thresholds::default()
        };

        Ok(Self {
            store,
            channels: Channels::parse(
                &env.optional("SENSOR_CHANNELS", DEFAULT_SENSOR_CHANNELS),
                &env.optional("ACTUATOR_CHANNELS", DEFAULT_ACTUATOR_CHANNELS),
            )?,
            archive_readings: env.parsed("ARCHIVE_READINGS", "true")?,
            thresholds,
            temperature_unit: env.parsed("TEMPERATURE_UNIT", "celsius")?,
            gas_unit: env.parsed("GAS_UNIT", "ppm")?,
            server_host: env.optional("SERVER_HOST", "0.0.0.0"),
            server_port: env.parsed("SERVER_PORT", "8080")?,
        })
    }
}

struct Env<F>(F);

impl<F: Fn(&str) -> Option<String>> Env<F> {
    fn get(&self, key: &str) -> Option<String> {
        (self.0)(key)
    }

    fn required(&self, key: &str) -> Result<String> {
        self.get(key)
            .with_context(|| format!("missing required env var: {key}"))
    }

    fn optional(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or_else(|| default.to_owned())
    }

    fn parsed<T>(&self, key: &str, default: &str) -> Result<T>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        let raw = self.optional(key, default);
        raw.trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("{e}"))
            .with_context(|| format!("{key} has an invalid value: {raw:?}"))
    }
}
