//! Display-unit conversion for raw sensor values.
//!
//! Conversions are display transforms only: no clamping, no validation.
//! Negative or out-of-range readings are converted as-is.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::SensorKind;

/// Gas concentration that maps to 1.00 on the percentage scale.
pub const GAS_FULL_SCALE_PPM: f64 = 10_000.0;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TemperatureUnit {
    #[default]
    Celsius,
    Fahrenheit,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum GasUnit {
    #[default]
    Ppm,
    Percentage,
}

/// Moisture has a single display unit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum MoistureUnit {
    #[default]
    RelativeHumidity,
}

impl FromStr for TemperatureUnit {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "celsius" | "c" => Ok(Self::Celsius),
            "fahrenheit" | "f" => Ok(Self::Fahrenheit),
            other => Err(anyhow::anyhow!("unknown temperature unit: {other:?}")),
        }
    }
}

impl FromStr for GasUnit {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "ppm" => Ok(Self::Ppm),
            "percentage" | "percent" => Ok(Self::Percentage),
            other => Err(anyhow::anyhow!("unknown gas unit: {other:?}")),
        }
    }
}

/// The per-kind display unit choice, as held by the user settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UnitPreferences {
    pub temperature: TemperatureUnit,
    pub gas: GasUnit,
    pub moisture: MoistureUnit,
}

/// Convert a raw reading of `kind` into the display unit chosen in `prefs`,
/// rounded to two decimals.
pub fn convert(raw: f64, kind: SensorKind, prefs: &UnitPreferences) -> f64 {
    let value = match kind {
        SensorKind::Temperature => temperature(raw, prefs.temperature),
        SensorKind::Gas => gas(raw, prefs.gas),
        SensorKind::Moisture => raw,
    };
    round2(value)
}

/// Unit symbol shown next to a converted value.
pub fn symbol(kind: SensorKind, prefs: &UnitPreferences) -> &'static str {
    match kind {
        SensorKind::Temperature => match prefs.temperature {
            TemperatureUnit::Celsius => "°C",
            TemperatureUnit::Fahrenheit => "°F",
        },
        SensorKind::Gas => match prefs.gas {
            GasUnit::Ppm => "ppm",
            GasUnit::Percentage => "%",
        },
        SensorKind::Moisture => "%",
    }
}

fn temperature(celsius: f64, unit: TemperatureUnit) -> f64 {
    match unit {
        TemperatureUnit::Celsius => celsius,
        TemperatureUnit::Fahrenheit => celsius * 1.8 + 32.0,
    }
}

fn gas(ppm: f64, unit: GasUnit) -> f64 {
    match unit {
        GasUnit::Ppm => ppm,
        GasUnit::Percentage => ppm / GAS_FULL_SCALE_PPM,
    }
}

/// Values too large to scale are already whole at two decimals.
#[inline]
fn round2(v: f64) -> f64 {
    let scaled = v * 100.0;
    if scaled.is_finite() {
        scaled.round() / 100.0
    } else {
        v
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prefs(temperature: TemperatureUnit, gas: GasUnit) -> UnitPreferences {
        UnitPreferences {
            temperature,
            gas,
            moisture: MoistureUnit::RelativeHumidity,
        }
    }

    #[test]
    fn celsius_is_identity_rounded() {
        let p = prefs(TemperatureUnit::Celsius, GasUnit::Ppm);
        assert_eq!(convert(21.456, SensorKind::Temperature, &p), 21.46);
        assert_eq!(convert(-3.0, SensorKind::Temperature, &p), -3.0);
    }

    #[test]
    fn fahrenheit_conversion() {
        let p = prefs(TemperatureUnit::Fahrenheit, GasUnit::Ppm);
        assert_eq!(convert(0.0, SensorKind::Temperature, &p), 32.0);
        assert_eq!(convert(100.0, SensorKind::Temperature, &p), 212.0);
        assert_eq!(convert(-40.0, SensorKind::Temperature, &p), -40.0);
        assert_eq!(convert(21.5, SensorKind::Temperature, &p), 70.7);
    }

    #[test]
    fn fahrenheit_inverts_within_rounding() {
        let p = prefs(TemperatureUnit::Fahrenheit, GasUnit::Ppm);
        let mut t = -50.0;
        while t <= 80.0 {
            let f = convert(t, SensorKind::Temperature, &p);
            let back = (f - 32.0) * 5.0 / 9.0;
            assert!((back - t).abs() <= 0.01, "t={t} f={f} back={back}");
            t += 0.37;
        }
    }

    #[test]
    fn gas_percentage_uses_full_scale() {
        let p = prefs(TemperatureUnit::Celsius, GasUnit::Percentage);
        assert_eq!(convert(10_000.0, SensorKind::Gas, &p), 1.00);
        assert_eq!(convert(8_000.0, SensorKind::Gas, &p), 0.80);
        assert_eq!(convert(500.0, SensorKind::Gas, &p), 0.05);
    }

    #[test]
    fn gas_ppm_is_identity() {
        let p = prefs(TemperatureUnit::Celsius, GasUnit::Ppm);
        assert_eq!(convert(812.346, SensorKind::Gas, &p), 812.35);
    }

    #[test]
    fn moisture_ignores_other_preferences() {
        let p = prefs(TemperatureUnit::Fahrenheit, GasUnit::Percentage);
        assert_eq!(convert(80.0, SensorKind::Moisture, &p), 80.0);
    }

    #[test]
    fn out_of_range_values_are_not_clamped() {
        let p = prefs(TemperatureUnit::Celsius, GasUnit::Percentage);
        assert_eq!(convert(-500.0, SensorKind::Gas, &p), -0.05);
        assert_eq!(convert(250.0, SensorKind::Moisture, &p), 250.0);
    }

    #[test]
    fn huge_finite_values_stay_finite() {
        let metric = prefs(TemperatureUnit::Celsius, GasUnit::Ppm);
        let other = prefs(TemperatureUnit::Fahrenheit, GasUnit::Percentage);

        assert_eq!(convert(1e307, SensorKind::Moisture, &metric), 1e307);
        assert_eq!(convert(-1e307, SensorKind::Temperature, &metric), -1e307);
        assert_eq!(convert(f64::MAX, SensorKind::Gas, &metric), f64::MAX);
        assert!(convert(1e307, SensorKind::Temperature, &other).is_finite());
        assert!(convert(f64::MAX, SensorKind::Gas, &other).is_finite());
    }

    #[test]
    fn symbols_follow_preferences() {
        let metric = prefs(TemperatureUnit::Celsius, GasUnit::Ppm);
        let other = prefs(TemperatureUnit::Fahrenheit, GasUnit::Percentage);
        assert_eq!(symbol(SensorKind::Temperature, &metric), "°C");
        assert_eq!(symbol(SensorKind::Temperature, &other), "°F");
        assert_eq!(symbol(SensorKind::Gas, &metric), "ppm");
        assert_eq!(symbol(SensorKind::Gas, &other), "%");
        assert_eq!(symbol(SensorKind::Moisture, &metric), "%");
    }

    #[test]
    fn unit_parsing_is_case_insensitive() {
        assert_eq!("Fahrenheit".parse::<TemperatureUnit>().unwrap(), TemperatureUnit::Fahrenheit);
        assert_eq!("PPM".parse::<GasUnit>().unwrap(), GasUnit::Ppm);
        assert_eq!("Percentage".parse::<GasUnit>().unwrap(), GasUnit::Percentage);
        assert!("kelvin".parse::<TemperatureUnit>().is_err());
    }
}
