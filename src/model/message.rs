use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};

use crate::model::device::Room;

/// Frames pushed by the hub on its event stream, discriminated by `type`.
#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
pub enum HubMessage {
    #[serde(rename = "deviceStateChanged")]
    DeviceStateChanged { data: DeviceStateData },
    #[serde(rename = "sceneUpdated")]
    SceneUpdated { data: SceneData },
    #[serde(rename = "remotePressEvent")]
    RemotePressEvent { data: RemotePressData },
    #[serde(rename = "deviceAdded")]
    DeviceAdded { data: DeviceRef },
    #[serde(rename = "deviceRemoved")]
    DeviceRemoved { data: DeviceRef },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceStateData {
    pub id: String,
    pub device_type: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub attributes: Option<Map<String, Value>>,
    /// Absent, explicit null, and a room object are all distinct. Kept raw,
    /// so a malformed room does not cost the rest of the message.
    #[serde(default, deserialize_with = "present")]
    pub room: Option<Value>,
    pub is_reachable: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneData {
    pub id: Option<String>,
    pub triggers: Option<Value>,
    pub last_triggered: Option<Value>,
    pub actions: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub struct SceneTrigger {
    #[serde(rename = "type")]
    pub kind: String,
    pub trigger: Option<TriggerDetails>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerDetails {
    pub controller_type: Option<String>,
    pub click_pattern: Option<String>,
    pub device_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneAction {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub device_id: Option<String>,
    pub attributes: Option<Map<String, Value>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemotePressData {
    pub id: String,
    pub click_pattern: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceRef {
    pub id: Option<String>,
    pub device_type: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

fn present<'de, D>(de: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(de).map(Some)
}

impl DeviceStateData {
    /// The hub reports the device class as `deviceType`, some firmware as `type`.
    #[must_use]
    pub fn device_type(&self) -> Option<&str> {
        self.device_type.as_deref().or(self.kind.as_deref())
    }

    /// The `room` field: `None` when absent, `Some(Ok(None))` for an explicit
    /// null.
    #[must_use]
    pub fn room(&self) -> Option<Result<Option<Room>, serde_json::Error>> {
        self.room.as_ref().map(Option::<Room>::deserialize)
    }

    /// `isReachable`, when present and boolean.
    #[must_use]
    pub fn is_reachable(&self) -> Option<bool> {
        match &self.is_reachable {
            None | Some(Value::Null) => None,
            Some(Value::Bool(reachable)) => Some(*reachable),
            Some(other) => {
                log::warn!("[{}] ignoring non-boolean isReachable: {other}", self.id);
                None
            }
        }
    }
}

impl SceneData {
    #[must_use]
    pub fn triggers(&self) -> Option<&[Value]> {
        self.triggers.as_ref().and_then(Value::as_array).map(Vec::as_slice)
    }

    #[must_use]
    pub fn last_triggered(&self) -> Option<&str> {
        self.last_triggered.as_ref().and_then(Value::as_str)
    }

    /// Device actions; anything other than a list counts as none.
    #[must_use]
    pub fn actions(&self) -> &[Value] {
        match &self.actions {
            Some(Value::Array(actions)) => actions.as_slice(),
            None | Some(Value::Null) => &[],
            Some(other) => {
                log::warn!("Scene {:?}: ignoring non-list actions: {other}", self.id);
                &[]
            }
        }
    }
}

impl DeviceRef {
    #[must_use]
    pub fn device_type(&self) -> Option<&str> {
        self.device_type.as_deref().or(self.kind.as_deref())
    }
}
