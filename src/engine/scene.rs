use serde::Deserialize;
use serde_json::Value;

use hubsync_api::intent::HubIntent;

use crate::engine::{DropReason, Engine, log_drop};
use crate::model::device::{ColorMode, HubAttribute};
use crate::model::message::{SceneAction, SceneData};

impl Engine {
    /// Merge the light attributes carried by a scene's device actions into
    /// the cached entity state.
    ///
    /// After a scene fires, some bulbs only report their color mode in the
    /// following `deviceStateChanged`, without the color values. The scene
    /// message has the full values, so they are applied from here.
    pub(crate) fn apply_scene_actions(&self, data: &SceneData) -> usize {
        let mut applied = 0;
        for raw in data.actions() {
            match self.apply_scene_action(raw) {
                Ok(true) => applied += 1,
                Ok(false) => {}
                Err(reason) => log_drop(&reason),
            }
        }
        applied
    }

    fn apply_scene_action(&self, raw: &Value) -> Result<bool, DropReason> {
        let action = SceneAction::deserialize(raw)?;
        match action.kind.as_deref() {
            Some("device") => {}
            other => {
                return Err(DropReason::UnsupportedAction(format!(
                    "action type {other:?}"
                )));
            }
        }

        let (Some(device_id), Some(attributes)) = (action.device_id, action.attributes) else {
            return Err(DropReason::MissingField("action.deviceId/attributes"));
        };
        if device_id.is_empty() || attributes.is_empty() {
            return Ok(false);
        }

        let Some(entry) = self.registry().lookup(&device_id) else {
            log::debug!("Scene action device {device_id} not in registry, skipping");
            return Ok(false);
        };

        let entity = &entry.entity;
        let mut state = entity.state();
        let mut updated = false;

        for (key, value) in &attributes {
            let Some(attr) = HubAttribute::light(key) else {
                continue;
            };
            log::debug!("Scene action: setting {attr} to {value} on {device_id}");
            match state.attributes.set(attr, value) {
                Ok(()) => updated = true,
                Err(err) => log::warn!("Scene action: failed to set {key} on {device_id}: {err}"),
            }
        }

        if !updated {
            return Ok(false);
        }

        if entity.tracks_color_mode() {
            if let Some(mode) = ColorMode::detect(attributes.keys().map(String::as_str)) {
                log::debug!("Scene action: set color mode to {mode:?} for {device_id}");
                state.color_mode = Some(mode);
            }
        }
        drop(state);

        self.emit(HubIntent::Refresh {
            entity_id: entity.entity_id().to_string(),
        });
        Ok(true)
    }
}
