use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    channels::SensorChannel,
    levels::{Level, Thresholds},
    models::{ActuatorStatus, SensorKind, SensorReading},
    units::{self, UnitPreferences},
};

/// Latest state of one sensor channel, ready for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct SensorView {
    pub channel: String,
    pub kind: SensorKind,
    /// Value as stored, in canonical units (°C, ppm, %RH). `null` before the
    /// first reading.
    pub raw_value: Option<f64>,
    /// `raw_value` converted to the preferred display unit, two decimals.
    pub value: Option<f64>,
    /// Display unit symbol, e.g. `°F`.
    pub unit: String,
    /// Always computed from `raw_value`, never from the converted value.
    pub level: Level,
    pub observed_at: Option<DateTime<Utc>>,
}

impl SensorView {
    pub fn new(
        channel: &SensorChannel,
        latest: Option<&SensorReading>,
        prefs: &UnitPreferences,
        thresholds: &Thresholds,
    ) -> Self {
        let raw_value = latest.map(|r| r.value);
        Self {
            channel: channel.id.clone(),
            kind: channel.kind,
            raw_value,
            value: raw_value.map(|v| units::convert(v, channel.kind, prefs)),
            unit: units::symbol(channel.kind, prefs).to_owned(),
            level: thresholds.classify(raw_value, channel.kind),
            observed_at: latest.map(|r| r.observed_at),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ReadingDto {
    pub sequence_index: u64,
    /// Converted to the preferred display unit.
    pub value: f64,
    pub observed_at: DateTime<Utc>,
}

impl ReadingDto {
    pub fn new(reading: &SensorReading, kind: SensorKind, prefs: &UnitPreferences) -> Self {
        Self {
            sequence_index: reading.sequence_index,
            value: units::convert(reading.value, kind, prefs),
            observed_at: reading.observed_at,
        }
    }
}

/// One sensor channel with its recent history, oldest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct SensorDetail {
    pub sensor: SensorView,
    pub history: Vec<ReadingDto>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ActuatorDto {
    pub id: String,
    pub is_on: bool,
    /// Time of the last off→on transition, kept after switching off.
    pub turned_on_at: Option<DateTime<Utc>>,
}

impl ActuatorDto {
    pub fn new(id: &str, status: ActuatorStatus) -> Self {
        Self {
            id: id.to_owned(),
            is_on: status.is_on,
            turned_on_at: status.turned_on_at,
        }
    }
}

/// Request body for `PUT /actuators/{id}`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SetActuatorRequest {
    pub is_on: bool,
}

/// Returned once the store has accepted an actuator write. The confirmed
/// state arrives later through the actuator's feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ActuatorRequested {
    pub id: String,
    pub requested_on: bool,
}
