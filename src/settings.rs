use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use utoipa::ToSchema;

use crate::units::{GasUnit, MoistureUnit, TemperatureUnit, UnitPreferences};

/// Process-wide user preferences. Not persisted across restarts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Settings {
    pub temperature_unit: TemperatureUnit,
    pub gas_unit: GasUnit,
    pub moisture_unit: MoistureUnit,
    pub dark_mode: bool,
    pub language: String,
    pub notifications_enabled: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            temperature_unit: TemperatureUnit::Celsius,
            gas_unit: GasUnit::Ppm,
            moisture_unit: MoistureUnit::RelativeHumidity,
            dark_mode: false,
            language: "English".to_owned(),
            notifications_enabled: true,
        }
    }
}

impl Settings {
    pub fn units(&self) -> UnitPreferences {
        UnitPreferences {
            temperature: self.temperature_unit,
            gas: self.gas_unit,
            moisture: self.moisture_unit,
        }
    }
}

/// Partial update; `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct SettingsPatch {
    pub temperature_unit: Option<TemperatureUnit>,
    pub gas_unit: Option<GasUnit>,
    pub moisture_unit: Option<MoistureUnit>,
    pub dark_mode: Option<bool>,
    pub language: Option<String>,
    pub notifications_enabled: Option<bool>,
}

impl SettingsPatch {
    fn apply(self, s: &mut Settings) {
        if let Some(v) = self.temperature_unit {
            s.temperature_unit = v;
        }
        if let Some(v) = self.gas_unit {
            s.gas_unit = v;
        }
        if let Some(v) = self.moisture_unit {
            s.moisture_unit = v;
        }
        if let Some(v) = self.dark_mode {
            s.dark_mode = v;
        }
        if let Some(v) = self.language {
            s.language = v;
        }
        if let Some(v) = self.notifications_enabled {
            s.notifications_enabled = v;
        }
    }
}

/// Shared, observable holder of the current [`Settings`].
///
/// Cloning shares the same underlying value.
#[derive(Debug, Clone)]
pub struct SettingsStore {
    tx: Arc<watch::Sender<Settings>>,
}

impl SettingsStore {
    pub fn new(initial: Settings) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx: Arc::new(tx) }
    }

    pub fn get(&self) -> Settings {
        self.tx.borrow().clone()
    }

    /// Apply `patch` and return the resulting settings.
    pub fn update(&self, patch: SettingsPatch) -> Settings {
        self.tx.send_modify(|s| patch.apply(s));
        self.get()
    }

    /// Receiver notified on every change.
    pub fn subscribe(&self) -> watch::Receiver<Settings> {
        self.tx.subscribe()
    }
}

impl Default for SettingsStore {
    fn default() -> Self {
        Self::new(Settings::default())
    }
}
