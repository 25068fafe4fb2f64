use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};

/// Device classes whose state messages are processed. Messages for any other
/// hub device type are dropped unprocessed.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum DeviceType {
    MotionSensor,
    OccupancySensor,
    Outlet,
    Light,
    OpenCloseSensor,
    WaterSensor,
    Blinds,
    LightSensor,
    EnvironmentSensor,
}

/// Every hub attribute the synchronizer knows how to apply.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum HubAttribute {
    IsOn,
    IsDetected,
    IsOpen,
    WaterLeakDetected,
    LightLevel,
    ColorTemperature,
    ColorHue,
    ColorSaturation,
    BatteryPercentage,
    BlindsCurrentLevel,
    Illuminance,
    CurrentAmps,
    CurrentActivePower,
    CurrentVoltage,
    TotalEnergyConsumed,
    EnergyConsumedAtLastReset,
    TimeOfLastEnergyReset,
    TotalEnergyConsumedLastUpdated,
    CurrentTemperature,
    CurrentRH,
    CurrentPM25,
    CurrentCO2,
    VocIndex,
    CustomName,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum ColorMode {
    #[serde(rename = "hs")]
    Hs,
    #[serde(rename = "color_temp")]
    ColorTemp,
}

#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct Room {
    pub id: Option<String>,
    pub name: Option<String>,
    pub color: Option<String>,
    pub icon: Option<String>,
}

impl DeviceType {
    pub const ALL: [Self; 9] = [
        Self::MotionSensor,
        Self::OccupancySensor,
        Self::Outlet,
        Self::Light,
        Self::OpenCloseSensor,
        Self::WaterSensor,
        Self::Blinds,
        Self::LightSensor,
        Self::EnvironmentSensor,
    ];

    #[must_use]
    pub fn from_hub(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|dt| dt.hub_name() == name)
    }

    #[must_use]
    pub const fn hub_name(self) -> &'static str {
        match self {
            Self::MotionSensor => "motionSensor",
            Self::OccupancySensor => "occupancySensor",
            Self::Outlet => "outlet",
            Self::Light => "light",
            Self::OpenCloseSensor => "openCloseSensor",
            Self::WaterSensor => "waterSensor",
            Self::Blinds => "blinds",
            Self::LightSensor => "lightSensor",
            Self::EnvironmentSensor => "environmentSensor",
        }
    }

    /// Attributes accepted from `deviceStateChanged` messages for this type.
    #[must_use]
    pub const fn accepted(self) -> &'static [HubAttribute] {
        use HubAttribute as A;
        match self {
            Self::MotionSensor | Self::OccupancySensor => {
                &[A::IsDetected, A::IsOn, A::BatteryPercentage, A::CustomName]
            }
            Self::Outlet => &[
                A::IsOn,
                A::CurrentAmps,
                A::CurrentActivePower,
                A::CurrentVoltage,
                A::TotalEnergyConsumed,
                A::EnergyConsumedAtLastReset,
                A::TimeOfLastEnergyReset,
                A::TotalEnergyConsumedLastUpdated,
                A::CustomName,
            ],
            Self::Light => &[
                A::IsOn,
                A::LightLevel,
                A::ColorTemperature,
                A::ColorHue,
                A::ColorSaturation,
                A::CustomName,
            ],
            Self::OpenCloseSensor => &[A::IsOpen, A::BatteryPercentage, A::CustomName],
            Self::WaterSensor => &[A::WaterLeakDetected, A::BatteryPercentage, A::CustomName],
            Self::Blinds => &[A::BlindsCurrentLevel, A::BatteryPercentage, A::CustomName],
            Self::LightSensor => &[A::Illuminance, A::BatteryPercentage, A::CustomName],
            Self::EnvironmentSensor => &[
                A::CurrentTemperature,
                A::CurrentRH,
                A::CurrentPM25,
                A::CurrentCO2,
                A::VocIndex,
                A::BatteryPercentage,
                A::CustomName,
            ],
        }
    }

    /// Resolve a hub attribute key against this type's allow-list.
    #[must_use]
    pub fn accepts(self, key: &str) -> Option<HubAttribute> {
        self.accepted()
            .iter()
            .copied()
            .find(|attr| attr.hub_key() == key)
    }
}

impl Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.hub_name())
    }
}

impl HubAttribute {
    /// Subset carried by scene device actions.
    pub const LIGHT: [Self; 5] = [
        Self::IsOn,
        Self::LightLevel,
        Self::ColorTemperature,
        Self::ColorHue,
        Self::ColorSaturation,
    ];

    #[must_use]
    pub fn light(key: &str) -> Option<Self> {
        Self::LIGHT.into_iter().find(|attr| attr.hub_key() == key)
    }

    #[must_use]
    pub const fn hub_key(self) -> &'static str {
        match self {
            Self::IsOn => "isOn",
            Self::IsDetected => "isDetected",
            Self::IsOpen => "isOpen",
            Self::WaterLeakDetected => "waterLeakDetected",
            Self::LightLevel => "lightLevel",
            Self::ColorTemperature => "colorTemperature",
            Self::ColorHue => "colorHue",
            Self::ColorSaturation => "colorSaturation",
            Self::BatteryPercentage => "batteryPercentage",
            Self::BlindsCurrentLevel => "blindsCurrentLevel",
            Self::Illuminance => "illuminance",
            Self::CurrentAmps => "currentAmps",
            Self::CurrentActivePower => "currentActivePower",
            Self::CurrentVoltage => "currentVoltage",
            Self::TotalEnergyConsumed => "totalEnergyConsumed",
            Self::EnergyConsumedAtLastReset => "energyConsumedAtLastReset",
            Self::TimeOfLastEnergyReset => "timeOfLastEnergyReset",
            Self::TotalEnergyConsumedLastUpdated => "totalEnergyConsumedLastUpdated",
            Self::CurrentTemperature => "currentTemperature",
            Self::CurrentRH => "currentRH",
            Self::CurrentPM25 => "currentPM25",
            Self::CurrentCO2 => "currentCO2",
            Self::VocIndex => "vocIndex",
            Self::CustomName => "customName",
        }
    }

    /// Internal (snake case) attribute name.
    #[must_use]
    pub fn name(self) -> String {
        to_snake_case(self.hub_key())
    }

    #[must_use]
    pub const fn is_timestamp(self) -> bool {
        matches!(
            self,
            Self::TimeOfLastEnergyReset | Self::TotalEnergyConsumedLastUpdated
        )
    }
}

impl Display for HubAttribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

impl ColorMode {
    /// Hue/saturation takes precedence over color temperature.
    pub fn detect<'a>(mut keys: impl Iterator<Item = &'a str> + Clone) -> Option<Self> {
        if keys
            .clone()
            .any(|key| key == "colorHue" || key == "colorSaturation")
        {
            Some(Self::Hs)
        } else if keys.any(|key| key == "colorTemperature") {
            Some(Self::ColorTemp)
        } else {
            None
        }
    }
}

/// Convert a camelCase hub key to snake case: every uppercase letter not at
/// the start of the key begins a new word.
#[must_use]
pub fn to_snake_case(name: &str) -> String {
    let mut res = String::with_capacity(name.len() + 4);
    for (idx, ch) in name.chars().enumerate() {
        if ch.is_ascii_uppercase() {
            if idx > 0 {
                res.push('_');
            }
            res.push(ch.to_ascii_lowercase());
        } else {
            res.push(ch);
        }
    }
    res
}
