use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Physical quantity a sensor channel measures.
///
/// Selects the conversion rule and the threshold table. Native units:
/// - Temperature: degrees Celsius
/// - Moisture: relative humidity percentage
/// - Gas: parts per million
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SensorKind {
    Temperature,
    Moisture,
    Gas,
}

impl fmt::Display for SensorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SensorKind::Temperature => "temperature",
            SensorKind::Moisture => "moisture",
            SensorKind::Gas => "gas",
        };
        f.write_str(s)
    }
}

impl FromStr for SensorKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s {
            "temperature" => Ok(Self::Temperature),
            "moisture" => Ok(Self::Moisture),
            "gas" => Ok(Self::Gas),
            other => Err(anyhow::anyhow!("unknown sensor kind: {other:?}")),
        }
    }
}

/// One observed value on one sensor channel, in the sensor's native unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    pub value: f64,
    /// Per-channel logical x-axis coordinate. Never reset, never reused.
    pub sequence_index: u64,
    pub observed_at: DateTime<Utc>,
}

/// Last confirmed state of an actuator as reported by the store.
///
/// `turned_on_at` survives an off transition: it is the last activation
/// time, not "on since".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ActuatorStatus {
    pub is_on: bool,
    pub turned_on_at: Option<DateTime<Utc>>,
}
