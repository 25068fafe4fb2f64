use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

use hubsync_api::event::TriggerEvent;
use hubsync_api::intent::HubIntent;

use crate::engine::{DropReason, Engine, log_drop};
use crate::model::message::{RemotePressData, SceneData, SceneTrigger};
use crate::model::state::{EntityHandle, parse_iso8601};

/// A controller device id, split into its registry key and button number.
///
/// Multi-button controllers report each button as `<base>_<n>`, while only
/// the first button (`<base>_1`) is registered.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ButtonId {
    pub canonical: String,
    pub index: u32,
}

impl ButtonId {
    #[must_use]
    pub fn decode(device_id: &str) -> Self {
        let multi = device_id.rsplit_once('_').and_then(|(base, suffix)| {
            let base_ok = !base.is_empty()
                && base
                    .bytes()
                    .all(|b| b.is_ascii_digit() || b.is_ascii_lowercase() || b == b'-');
            let suffix_ok = !suffix.is_empty() && suffix.bytes().all(|b| b.is_ascii_digit());
            if !base_ok || !suffix_ok {
                return None;
            }
            Some(Self {
                canonical: format!("{base}_1"),
                index: suffix.parse().ok()?,
            })
        });

        multi.unwrap_or_else(|| Self {
            canonical: device_id.to_string(),
            index: 0,
        })
    }

    /// Trigger type for a hub click pattern on this button, e.g.
    /// `button2_double_click`.
    pub fn trigger_type(&self, click_pattern: &str) -> Result<String, DropReason> {
        let base = match click_pattern {
            "singlePress" => "single_click",
            "longPress" => "long_press",
            "doublePress" => "double_click",
            other => return Err(DropReason::UnknownClickPattern(other.to_string())),
        };

        if self.index == 0 {
            Ok(base.to_string())
        } else {
            Ok(format!("button{}_{base}", self.index))
        }
    }
}

impl Engine {
    fn resolve_button(
        &self,
        device_id: &str,
        click_pattern: &str,
    ) -> Result<(Arc<EntityHandle>, String), DropReason> {
        let button = ButtonId::decode(device_id);
        let trigger_type = button.trigger_type(click_pattern)?;
        if button.index != 0 {
            log::debug!(
                "Multi button controller, device id effective: {} with button: {}",
                button.canonical,
                button.index
            );
        }

        let entry = self
            .registry()
            .lookup(&button.canonical)
            .ok_or(DropReason::UnregisteredDevice(button.canonical))?;

        Ok((entry.entity, trigger_type))
    }

    fn publish_trigger(&self, entity: &EntityHandle, trigger_type: String) {
        let event = TriggerEvent {
            trigger_type,
            device_id: entity.device_id().to_string(),
            entity_id: entity.entity_id().to_string(),
        };
        log::debug!("Firing trigger event: {event:?}");
        self.emit(HubIntent::Trigger(event));
    }

    /// Fire the controller triggers carried by a `sceneUpdated` message.
    /// Returns the number of triggers published.
    pub(crate) fn scene_triggers(
        &self,
        data: &SceneData,
        now: DateTime<Utc>,
    ) -> Result<usize, DropReason> {
        let triggers = data
            .triggers()
            .ok_or(DropReason::MissingField("data.triggers"))?;

        let hub_time = data.last_triggered().and_then(|ts| {
            parse_iso8601(ts).map_or_else(
                |err| {
                    log::warn!("Failed to parse lastTriggered {ts:?}, not debouncing: {err}");
                    None
                },
                |dt| Some(dt.with_timezone(&Utc)),
            )
        });

        let mut fired = 0;
        for raw in triggers {
            match self.scene_trigger(raw, hub_time, now) {
                Ok(()) => fired += 1,
                Err(reason) => log_drop(&reason),
            }
        }
        Ok(fired)
    }

    fn scene_trigger(
        &self,
        raw: &Value,
        hub_time: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<(), DropReason> {
        let trigger = SceneTrigger::deserialize(raw)?;
        if trigger.kind != "controller" {
            return Err(DropReason::UnsupportedTrigger(format!(
                "trigger type {}",
                trigger.kind
            )));
        }

        let details = trigger.trigger.ok_or(DropReason::MissingField("trigger"))?;
        let (Some(controller_type), Some(click_pattern), Some(device_id)) = (
            details.controller_type,
            details.click_pattern,
            details.device_id,
        ) else {
            return Err(DropReason::MissingField(
                "trigger.controllerType/clickPattern/deviceId",
            ));
        };

        if controller_type != "shortcutController" {
            return Err(DropReason::UnsupportedTrigger(format!(
                "controller type {controller_type}"
            )));
        }

        let (entity, trigger_type) = self.resolve_button(&device_id, &click_pattern)?;

        if !self
            .debounce()
            .check_hub_time(entity.device_id(), &trigger_type, hub_time, now)
        {
            return Err(DropReason::Debounced {
                device_id: entity.device_id().to_string(),
                trigger_type,
            });
        }

        self.publish_trigger(&entity, trigger_type);
        Ok(())
    }

    /// Handle a `remotePressEvent`, sent directly by light controller remotes
    /// without any scene configured on the hub.
    pub(crate) fn remote_press(
        &self,
        data: &RemotePressData,
        now: DateTime<Utc>,
    ) -> Result<(), DropReason> {
        let (entity, trigger_type) = self.resolve_button(&data.id, &data.click_pattern)?;

        if !self
            .debounce()
            .check_local_time(entity.device_id(), &trigger_type, now)
        {
            return Err(DropReason::Debounced {
                device_id: entity.device_id().to_string(),
                trigger_type,
            });
        }

        self.publish_trigger(&entity, trigger_type);
        Ok(())
    }
}
