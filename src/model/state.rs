use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, FixedOffset, NaiveDateTime, ParseError};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::model::device::{ColorMode, HubAttribute, Room};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("attribute {attr} expects {expected}, got {value}")]
pub struct CoercionError {
    pub attr: HubAttribute,
    pub expected: &'static str,
    pub value: String,
}

/// Parse a hub timestamp. Full RFC 3339 is preferred; an offset without a
/// colon is accepted, and a timestamp with no offset at all is taken as UTC.
pub fn parse_iso8601(value: &str) -> Result<DateTime<FixedOffset>, ParseError> {
    let value = value.trim();
    DateTime::parse_from_rfc3339(value).or_else(|err| {
        DateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f%z")
            .or_else(|_| {
                NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
                    .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f"))
                    .map(|naive| naive.and_utc().fixed_offset())
            })
            .map_err(|_| err)
    })
}

/// Energy timestamps are kept raw when the hub sends something that does not
/// parse as ISO-8601.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum HubTimestamp {
    Parsed(DateTime<FixedOffset>),
    Raw(String),
}

impl HubTimestamp {
    #[must_use]
    pub fn parse(value: &str) -> Self {
        parse_iso8601(value).map_or_else(
            |err| {
                log::warn!("Failed to convert {value:?} to date/time: {err}");
                Self::Raw(value.to_string())
            },
            Self::Parsed,
        )
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct DeviceAttributes {
    pub is_on: Option<bool>,
    pub is_detected: Option<bool>,
    pub is_open: Option<bool>,
    pub water_leak_detected: Option<bool>,
    pub light_level: Option<i64>,
    pub color_temperature: Option<i64>,
    pub color_hue: Option<f64>,
    pub color_saturation: Option<f64>,
    pub battery_percentage: Option<i64>,
    pub blinds_current_level: Option<i64>,
    pub illuminance: Option<f64>,
    pub current_amps: Option<f64>,
    pub current_active_power: Option<f64>,
    pub current_voltage: Option<f64>,
    pub total_energy_consumed: Option<f64>,
    pub energy_consumed_at_last_reset: Option<f64>,
    pub time_of_last_energy_reset: Option<HubTimestamp>,
    pub total_energy_consumed_last_updated: Option<HubTimestamp>,
    pub current_temperature: Option<f64>,
    pub current_rh: Option<f64>,
    pub current_pm25: Option<i64>,
    pub current_co2: Option<i64>,
    pub voc_index: Option<i64>,
    pub custom_name: String,
}

fn coerce_bool(attr: HubAttribute, value: &Value) -> Result<Option<bool>, CoercionError> {
    match value {
        Value::Null => Ok(None),
        Value::Bool(b) => Ok(Some(*b)),
        _ => Err(mismatch(attr, "bool", value)),
    }
}

fn coerce_int(attr: HubAttribute, value: &Value) -> Result<Option<i64>, CoercionError> {
    match value {
        Value::Null => Ok(None),
        Value::Number(num) => num
            .as_i64()
            .or_else(|| {
                num.as_f64()
                    .filter(|f| f.fract() == 0.0)
                    .map(|f| f as i64)
            })
            .map(Some)
            .ok_or_else(|| mismatch(attr, "integer", value)),
        _ => Err(mismatch(attr, "integer", value)),
    }
}

fn coerce_float(attr: HubAttribute, value: &Value) -> Result<Option<f64>, CoercionError> {
    match value {
        Value::Null => Ok(None),
        Value::Number(num) => Ok(num.as_f64()),
        _ => Err(mismatch(attr, "number", value)),
    }
}

fn coerce_timestamp(
    attr: HubAttribute,
    value: &Value,
) -> Result<Option<HubTimestamp>, CoercionError> {
    match value {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(HubTimestamp::parse(s))),
        _ => Err(mismatch(attr, "timestamp string", value)),
    }
}

fn mismatch(attr: HubAttribute, expected: &'static str, value: &Value) -> CoercionError {
    CoercionError {
        attr,
        expected,
        value: value.to_string(),
    }
}

impl DeviceAttributes {
    /// Apply a single hub value to the field backing `attr`.
    pub fn set(&mut self, attr: HubAttribute, value: &Value) -> Result<(), CoercionError> {
        use HubAttribute as A;
        match attr {
            A::IsOn => self.is_on = coerce_bool(attr, value)?,
            A::IsDetected => self.is_detected = coerce_bool(attr, value)?,
            A::IsOpen => self.is_open = coerce_bool(attr, value)?,
            A::WaterLeakDetected => self.water_leak_detected = coerce_bool(attr, value)?,
            A::LightLevel => self.light_level = coerce_int(attr, value)?,
            A::ColorTemperature => self.color_temperature = coerce_int(attr, value)?,
            A::ColorHue => self.color_hue = coerce_float(attr, value)?,
            A::ColorSaturation => self.color_saturation = coerce_float(attr, value)?,
            A::BatteryPercentage => self.battery_percentage = coerce_int(attr, value)?,
            A::BlindsCurrentLevel => self.blinds_current_level = coerce_int(attr, value)?,
            A::Illuminance => self.illuminance = coerce_float(attr, value)?,
            A::CurrentAmps => self.current_amps = coerce_float(attr, value)?,
            A::CurrentActivePower => self.current_active_power = coerce_float(attr, value)?,
            A::CurrentVoltage => self.current_voltage = coerce_float(attr, value)?,
            A::TotalEnergyConsumed => self.total_energy_consumed = coerce_float(attr, value)?,
            A::EnergyConsumedAtLastReset => {
                self.energy_consumed_at_last_reset = coerce_float(attr, value)?;
            }
            A::TimeOfLastEnergyReset => {
                self.time_of_last_energy_reset = coerce_timestamp(attr, value)?;
            }
            A::TotalEnergyConsumedLastUpdated => {
                self.total_energy_consumed_last_updated = coerce_timestamp(attr, value)?;
            }
            A::CurrentTemperature => self.current_temperature = coerce_float(attr, value)?,
            A::CurrentRH => self.current_rh = coerce_float(attr, value)?,
            A::CurrentPM25 => self.current_pm25 = coerce_int(attr, value)?,
            A::CurrentCO2 => self.current_co2 = coerce_int(attr, value)?,
            A::VocIndex => self.voc_index = coerce_int(attr, value)?,
            A::CustomName => match value {
                Value::String(name) => self.custom_name.clone_from(name),
                _ => return Err(mismatch(attr, "string", value)),
            },
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct EntityState {
    pub attributes: DeviceAttributes,
    pub room: Option<Room>,
    pub relation_id: Option<String>,
    pub is_reachable: bool,
    pub color_mode: Option<ColorMode>,
}

impl EntityState {
    /// Identifier the host registries know the device by: the relation id
    /// when the hub reported one, else `hub_id`.
    #[must_use]
    pub fn host_identifier(&self, hub_id: &str) -> String {
        self.relation_id
            .clone()
            .unwrap_or_else(|| hub_id.to_string())
    }
}

/// A host entity bound to a hub device, with its cached hub state.
#[derive(Debug)]
pub struct EntityHandle {
    hub_id: String,
    entity_id: String,
    device_id: String,
    tracks_color_mode: bool,
    ignore_next_update: AtomicBool,
    state: Mutex<EntityState>,
}

impl EntityHandle {
    pub fn new(
        hub_id: impl Into<String>,
        entity_id: impl Into<String>,
        device_id: impl Into<String>,
    ) -> Self {
        Self {
            hub_id: hub_id.into(),
            entity_id: entity_id.into(),
            device_id: device_id.into(),
            tracks_color_mode: false,
            ignore_next_update: AtomicBool::new(false),
            state: Mutex::new(EntityState::default()),
        }
    }

    /// Mark this entity as a color light, so color mode is derived from
    /// incoming color attributes.
    #[must_use]
    pub fn with_color_mode(mut self) -> Self {
        self.tracks_color_mode = true;
        self
    }

    #[must_use]
    pub fn with_state(self, state: EntityState) -> Self {
        *self.state() = state;
        self
    }

    #[must_use]
    pub fn hub_id(&self) -> &str {
        &self.hub_id
    }

    #[must_use]
    pub fn entity_id(&self) -> &str {
        &self.entity_id
    }

    #[must_use]
    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    #[must_use]
    pub const fn tracks_color_mode(&self) -> bool {
        self.tracks_color_mode
    }

    pub fn state(&self) -> MutexGuard<'_, EntityState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn snapshot(&self) -> EntityState {
        self.state().clone()
    }

    /// Identifier the host registries know this device by.
    #[must_use]
    pub fn host_identifier(&self) -> String {
        self.state().host_identifier(&self.hub_id)
    }

    /// Arm the one-shot suppression of the next non-power state change, used
    /// after sending a command the hub echoes back as an interim state.
    pub fn set_ignore_next_update(&self) {
        self.ignore_next_update.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn should_ignore_update(&self) -> bool {
        self.ignore_next_update.load(Ordering::SeqCst)
    }

    pub fn reset_ignore_update(&self) {
        self.ignore_next_update.store(false, Ordering::SeqCst);
    }
}
