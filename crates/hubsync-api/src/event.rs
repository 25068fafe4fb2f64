use serde::{Deserialize, Serialize};

/// Bus event type under which normalized button triggers are published.
pub const TRIGGER_EVENT_TYPE: &str = "hubsync_event";

/// Normalized button trigger, the only artifact published from button and
/// scene-trigger processing.
#[derive(Clone, Debug, Serialize, Deserialize, Eq, PartialEq)]
pub struct TriggerEvent {
    #[serde(rename = "type")]
    pub trigger_type: String,
    pub device_id: String,
    pub entity_id: String,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::event::TriggerEvent;

    #[test]
    fn serializes_with_bus_field_names() {
        let evt = TriggerEvent {
            trigger_type: "button2_single_click".to_string(),
            device_id: "dev-1".to_string(),
            entity_id: "sensor.remote".to_string(),
        };

        assert_eq!(
            serde_json::to_value(&evt).unwrap(),
            json!({
                "type": "button2_single_click",
                "device_id": "dev-1",
                "entity_id": "sensor.remote",
            })
        );
    }
}
