use anyhow::{Context, Result};

use crate::models::SensorKind;

pub const DEFAULT_SENSOR_CHANNELS: &str = "temperature1:temperature,temperature2:temperature,\
moisture1:moisture,moisture2:moisture,moisture3:moisture,moisture4:moisture,gas:gas";

pub const DEFAULT_ACTUATOR_CHANNELS: &str =
    "Efan,Svalve1,Svalve2,Svalve3,Svalve4,Pump,Tpeltier1,Tpeltier2";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SensorChannel {
    pub id: String,
    pub kind: SensorKind,
}

/// A logical channel the dashboard can subscribe to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Channel {
    Sensor(SensorChannel),
    Actuator(String),
}

impl Channel {
    pub fn id(&self) -> &str {
        match self {
            Channel::Sensor(s) => &s.id,
            Channel::Actuator(id) => id,
        }
    }
}

/// The fixed set of sensor and actuator channels this deployment knows about.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Channels {
    pub sensors: Vec<SensorChannel>,
    pub actuators: Vec<String>,
}

impl Channels {
    pub fn parse(sensors: &str, actuators: &str) -> Result<Self> {
        Ok(Self {
            sensors: parse_sensor_channels(sensors)?,
            actuators: parse_actuator_channels(actuators),
        })
    }

    pub fn sensor(&self, id: &str) -> Option<&SensorChannel> {
        self.sensors.iter().find(|s| s.id == id)
    }

    pub fn is_actuator(&self, id: &str) -> bool {
        self.actuators.iter().any(|a| a == id)
    }

    /// Resolve an id to its channel. Sensor ids win on a clash.
    pub fn resolve(&self, id: &str) -> Option<Channel> {
        if let Some(sensor) = self.sensor(id) {
            return Some(Channel::Sensor(sensor.clone()));
        }
        self.is_actuator(id).then(|| Channel::Actuator(id.to_owned()))
    }

    /// Every channel: sensors first, then actuators.
    pub fn all(&self) -> impl Iterator<Item = Channel> + '_ {
        self.sensors
            .iter()
            .cloned()
            .map(Channel::Sensor)
            .chain(self.actuators.iter().cloned().map(Channel::Actuator))
    }
}

/// Parse `"id1:kind1,id2:kind2"` into sensor channels.
fn parse_sensor_channels(raw: &str) -> Result<Vec<SensorChannel>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|entry| {
            let (id, kind) = entry.split_once(':').with_context(|| {
                format!("SENSOR_CHANNELS entry must be 'channel_id:kind', got: {entry:?}")
            })?;
            let kind = kind
                .trim()
                .parse::<SensorKind>()
                .with_context(|| format!("unknown sensor kind in SENSOR_CHANNELS entry {entry:?}"))?;
            Ok(SensorChannel {
                id: id.trim().to_owned(),
                kind,
            })
        })
        .collect()
}

fn parse_actuator_channels(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_cover_every_dashboard_channel() {
        let channels = Channels::parse(DEFAULT_SENSOR_CHANNELS, DEFAULT_ACTUATOR_CHANNELS).unwrap();
        assert_eq!(channels.sensors.len(), 7);
        assert_eq!(channels.actuators.len(), 8);
        assert_eq!(channels.sensor("gas").unwrap().kind, SensorKind::Gas);
        assert_eq!(channels.sensor("moisture4").unwrap().kind, SensorKind::Moisture);
        assert!(channels.is_actuator("Tpeltier2"));
    }

    #[test]
    fn parse_empty() {
        let channels = Channels::parse("", "").unwrap();
        assert!(channels.sensors.is_empty());
        assert!(channels.actuators.is_empty());
    }

    #[test]
    fn parse_unknown_kind_errors() {
        let err = Channels::parse("co2:carbon", "").unwrap_err();
        assert!(format!("{err:#}").contains("unknown sensor kind"));
    }

    #[test]
    fn parse_missing_colon_errors() {
        let err = Channels::parse("gas", "").unwrap_err();
        assert!(err.to_string().contains("channel_id:kind"));
    }

    #[test]
    fn resolve_distinguishes_sensors_and_actuators() {
        let channels = Channels::parse("gas:gas", "Efan").unwrap();
        assert!(matches!(channels.resolve("gas"), Some(Channel::Sensor(_))));
        assert_eq!(channels.resolve("Efan"), Some(Channel::Actuator("Efan".into())));
        assert_eq!(channels.resolve("Pump"), None);
        assert_eq!(channels.all().count(), 2);
    }
}
