//! Three-band qualitative classification of raw sensor values.
//!
//! Thresholds are expressed in each sensor's native unit (°C, %, ppm) and are
//! applied to the unconverted reading. Bands are scanned in ascending order,
//! first match wins, upper bounds inclusive.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::SensorKind;

/// Upper bound of the Optimal moisture band used when none is configured.
pub const DEFAULT_MOISTURE_OPTIMAL_MAX: f64 = 86.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Level {
    // temperature
    Low,
    Normal,
    High,
    // moisture
    Dry,
    Optimal,
    Wet,
    // gas
    Safe,
    Moderate,
    Hazardous,
    /// Absent or non-numeric reading.
    Unknown,
}

/// Inclusive upper bounds of the first two bands per sensor kind.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    pub temperature_low_max: f64,
    pub temperature_normal_max: f64,
    pub moisture_dry_max: f64,
    pub moisture_optimal_max: f64,
    pub gas_safe_max: f64,
    pub gas_moderate_max: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            temperature_low_max: 15.0,
            temperature_normal_max: 25.0,
            moisture_dry_max: 75.0,
            moisture_optimal_max: DEFAULT_MOISTURE_OPTIMAL_MAX,
            gas_safe_max: 800.0,
            gas_moderate_max: 1000.0,
        }
    }
}

impl Thresholds {
    /// Ordered `(upper bound, level)` bands for `kind`, closed by a catch-all.
    fn bands(&self, kind: SensorKind) -> [(f64, Level); 3] {
        match kind {
            SensorKind::Temperature => [
                (self.temperature_low_max, Level::Low),
                (self.temperature_normal_max, Level::Normal),
                (f64::INFINITY, Level::High),
            ],
            SensorKind::Moisture => [
                (self.moisture_dry_max, Level::Dry),
                (self.moisture_optimal_max, Level::Optimal),
                (f64::INFINITY, Level::Wet),
            ],
            SensorKind::Gas => [
                (self.gas_safe_max, Level::Safe),
                (self.gas_moderate_max, Level::Moderate),
                (f64::INFINITY, Level::Hazardous),
            ],
        }
    }

    /// Classify a raw reading. `None` and NaN classify to [`Level::Unknown`].
    pub fn classify(&self, raw: Option<f64>, kind: SensorKind) -> Level {
        let Some(value) = raw.filter(|v| !v.is_nan()) else {
            return Level::Unknown;
        };

        self.bands(kind)
            .into_iter()
            .find(|(max, _)| value <= *max)
            .map(|(_, level)| level)
            .unwrap_or(Level::Unknown)
    }
}

/// Classify with the default threshold table.
pub fn classify(raw: Option<f64>, kind: SensorKind) -> Level {
    Thresholds::default().classify(raw, kind)
}
