//! Message dispatch and state reconciliation for the hub event stream.
//!
//! The [`Engine`] owns the device registry and debounce store. Every inbound
//! frame goes through [`Engine::handle_text`], which parses it, routes it by
//! kind and applies a single log-and-drop policy to anything that fails.
//! Work for the host is never performed here; it is emitted as [`HubIntent`]
//! values on the intent channel.

pub mod attributes;
pub mod button;
pub mod debounce;
pub mod registry;
pub mod scene;

#[cfg(test)]
pub(crate) mod test_support;

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::Level;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::mpsc::UnboundedSender;

use hubsync_api::intent::HubIntent;

use crate::engine::debounce::DebounceStore;
use crate::engine::registry::{DeviceRegistry, RegistryEntry};
use crate::model::device::DeviceType;
use crate::model::message::{DeviceRef, DeviceStateData, HubMessage};
use crate::model::state::EntityHandle;

/// Why a message (or one trigger/action inside it) was not applied.
#[derive(Error, Debug)]
pub enum DropReason {
    #[error("malformed message: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("required key {0:?} not found")]
    MissingField(&'static str),

    #[error("message kind {0:?} is not processed")]
    UnhandledKind(String),

    #[error("device type {0:?} is not processed")]
    UnrecognizedDeviceType(String),

    #[error("device {0} is not registered")]
    UnregisteredDevice(String),

    #[error("click pattern {0:?} is not supported")]
    UnknownClickPattern(String),

    #[error("unsupported trigger: {0}")]
    UnsupportedTrigger(String),

    #[error("unsupported scene action: {0}")]
    UnsupportedAction(String),

    #[error("duplicate {trigger_type} event for {device_id} within debounce window")]
    Debounced {
        device_id: String,
        trigger_type: String,
    },
}

impl DropReason {
    const fn level(&self) -> Level {
        match self {
            Self::MissingField(_) => Level::Warn,
            Self::UnregisteredDevice(_) => Level::Info,
            _ => Level::Debug,
        }
    }
}

pub(crate) fn log_drop(reason: &DropReason) {
    log::log!(reason.level(), "Discarding hub event: {reason}");
}

pub struct Engine {
    registry: DeviceRegistry,
    debounce: DebounceStore,
    intents: UnboundedSender<HubIntent>,
    discovery: bool,
}

impl Engine {
    #[must_use]
    pub fn new(intents: UnboundedSender<HubIntent>) -> Self {
        Self {
            registry: DeviceRegistry::new(),
            debounce: DebounceStore::new(),
            intents,
            discovery: false,
        }
    }

    /// Forward unknown devices to the discovery collaborator.
    #[must_use]
    pub fn with_discovery(mut self, enabled: bool) -> Self {
        self.discovery = enabled;
        self
    }

    #[must_use]
    pub const fn registry(&self) -> &DeviceRegistry {
        &self.registry
    }

    #[must_use]
    pub const fn debounce(&self) -> &DebounceStore {
        &self.debounce
    }

    pub fn register(&self, id: impl Into<String>, entry: RegistryEntry) -> bool {
        self.registry.register(id, entry)
    }

    #[must_use]
    pub fn lookup(&self, id: &str) -> Option<RegistryEntry> {
        self.registry.lookup(id)
    }

    pub fn attach_cascade(&self, id: &str, cascade: Arc<EntityHandle>) -> bool {
        self.registry.attach_cascade(id, cascade)
    }

    pub(crate) fn emit(&self, intent: HubIntent) {
        if let Err(err) = self.intents.send(intent) {
            log::error!("Failed to hand off {:?}: host adapter is gone", err.0);
        }
    }

    pub(crate) fn refresh(&self, entry: &RegistryEntry) {
        self.emit(HubIntent::Refresh {
            entity_id: entry.entity.entity_id().to_string(),
        });
        if let Some(cascade) = &entry.cascade {
            log::debug!("Cascading refresh to {}", cascade.entity_id());
            self.emit(HubIntent::Refresh {
                entity_id: cascade.entity_id().to_string(),
            });
        }
    }

    /// Handle one frame from the event stream. Never fails: anything that
    /// cannot be applied is logged and dropped.
    pub fn handle_text(&self, text: &str) {
        self.handle_text_at(text, Utc::now());
    }

    /// As [`Self::handle_text`], with an explicit local receive time.
    pub fn handle_text_at(&self, text: &str, now: DateTime<Utc>) {
        log::trace!("rcvd message: {text}");
        match panic::catch_unwind(AssertUnwindSafe(|| self.dispatch(text, now))) {
            Ok(Ok(())) => {}
            Ok(Err(reason)) => log_drop(&reason),
            Err(_) => log::error!("Error processing hub event, discarding: {text}"),
        }
    }

    fn dispatch(&self, text: &str, now: DateTime<Utc>) -> Result<(), DropReason> {
        let value: Value = serde_json::from_str(text)?;
        let Some(kind) = value.get("type").and_then(Value::as_str).map(str::to_string) else {
            return Err(DropReason::MissingField("type"));
        };

        match serde_json::from_value(value)? {
            HubMessage::SceneUpdated { data } => {
                log::debug!("Found sceneUpdated message");
                let res = self.scene_triggers(&data, now);
                self.apply_scene_actions(&data);
                res.map(|fired| log::debug!("Scene update fired {fired} trigger(s)"))
            }
            HubMessage::RemotePressEvent { data } => self.remote_press(&data, now),
            HubMessage::DeviceAdded { data } => self.device_added(&data),
            HubMessage::DeviceRemoved { data } => {
                // The entity is left to go unavailable; removal is up to the user.
                if let Some(id) = &data.id {
                    log::info!("Device removed event received: {id}");
                }
                Ok(())
            }
            HubMessage::DeviceStateChanged { data } => self.device_state_changed(&data),
            HubMessage::Other => Err(DropReason::UnhandledKind(kind)),
        }
    }

    fn device_added(&self, data: &DeviceRef) -> Result<(), DropReason> {
        let id = data.id.as_deref().ok_or(DropReason::MissingField("data.id"))?;
        let device_type = data
            .device_type()
            .ok_or(DropReason::MissingField("data.deviceType"))?;

        log::info!("Device added event received: {id} (type: {device_type})");
        self.request_discovery(id, device_type);
        Ok(())
    }

    fn device_state_changed(&self, data: &DeviceStateData) -> Result<(), DropReason> {
        let type_name = data
            .device_type()
            .ok_or(DropReason::MissingField("data.deviceType"))?;

        let Some(device_type) = DeviceType::from_hub(type_name) else {
            return Err(DropReason::UnrecognizedDeviceType(type_name.to_string()));
        };

        let Some(entry) = self.registry.lookup(&data.id) else {
            self.request_discovery(&data.id, type_name);
            return Err(DropReason::UnregisteredDevice(data.id.clone()));
        };

        let outcome = self.sync_attributes(&entry, device_type, data);
        log::trace!("[{}] state sync: {outcome:?}", data.id);
        Ok(())
    }

    fn request_discovery(&self, id: &str, device_type: &str) {
        if !self.discovery {
            log::debug!("No discovery configured, not discovering {id} ({device_type})");
            return;
        }
        log::info!("Unknown device detected: {id} (type: {device_type}), triggering discovery");
        self.emit(HubIntent::Discover {
            device_id: id.to_string(),
            device_type: device_type.to_string(),
        });
    }

    /// Align host areas with every cached room. Meant to run once, after all
    /// entities are registered. Returns the number of devices with a room.
    pub fn sync_all_device_areas(&self) -> usize {
        log::info!("Starting device area sync from hub rooms");
        let mut synced = 0;
        for (_, entry) in self.registry.entries() {
            let room_name = entry.entity.state().room.as_ref().and_then(|room| room.name.clone());
            let Some(room_name) = room_name else {
                continue;
            };
            self.emit(HubIntent::UpdateArea {
                device_id: entry.entity.host_identifier(),
                room_name,
            });
            synced += 1;
        }
        log::info!("Device area sync complete, processed {synced} devices with rooms");
        synced
    }

    /// Forget every registered device. Called once the listener has stopped.
    pub fn clear(&self) {
        self.registry.clear();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use hubsync_api::intent::HubIntent;

    use crate::engine::registry::RegistryEntry;
    use crate::engine::test_support::{drain, engine, light};
    use crate::model::device::Room;
    use crate::model::state::{EntityHandle, EntityState};

    #[test]
    fn garbage_is_dropped() {
        let (eng, mut rx) = engine();
        eng.handle_text("not json at all");
        eng.handle_text("[1, 2, 3]");
        eng.handle_text(r#"{"data": {"id": "x"}}"#);
        eng.handle_text(r#"{"type": "deviceStateChanged"}"#);
        eng.handle_text(r#"{"type": "somethingElse", "data": {}}"#);
        assert!(drain(&mut rx).is_empty());
    }

    #[test]
    fn unregistered_known_type_triggers_discovery_once() {
        let (eng, mut rx) = engine();
        let msg = json!({
            "type": "deviceStateChanged",
            "data": {"id": "new-1", "deviceType": "outlet", "attributes": {"isOn": true}},
        });
        eng.handle_text(&msg.to_string());

        assert_eq!(
            drain(&mut rx),
            vec![HubIntent::Discover {
                device_id: "new-1".to_string(),
                device_type: "outlet".to_string(),
            }]
        );
    }

    #[test]
    fn unregistered_without_discovery_is_dropped() {
        let (eng, mut rx) = engine();
        let eng = eng.with_discovery(false);
        eng.handle_text(
            &json!({
                "type": "deviceStateChanged",
                "data": {"id": "new-1", "deviceType": "outlet"},
            })
            .to_string(),
        );
        assert!(drain(&mut rx).is_empty());
    }

    #[test]
    fn unknown_device_type_is_ignored_entirely() {
        let (eng, mut rx) = engine();
        eng.handle_text(
            &json!({
                "type": "deviceStateChanged",
                "data": {"id": "gw", "deviceType": "gateway", "attributes": {"isOn": true}},
            })
            .to_string(),
        );
        assert!(drain(&mut rx).is_empty());
    }

    #[test]
    fn device_added_requests_discovery() {
        let (eng, mut rx) = engine();
        eng.handle_text(r#"{"type": "deviceAdded", "data": {"id": "n1", "type": "blinds"}}"#);
        eng.handle_text(r#"{"type": "deviceAdded", "data": {"id": "n2"}}"#);

        assert_eq!(
            drain(&mut rx),
            vec![HubIntent::Discover {
                device_id: "n1".to_string(),
                device_type: "blinds".to_string(),
            }]
        );
    }

    #[test]
    fn device_removed_changes_nothing() {
        let (eng, mut rx) = engine();
        let (ent, entry) = light("l1", "light.l1");
        eng.register("l1", entry);
        eng.handle_text(r#"{"type": "deviceRemoved", "data": {"id": "l1"}}"#);

        assert!(drain(&mut rx).is_empty());
        assert!(eng.lookup("l1").is_some());
        assert_eq!(ent.snapshot(), EntityState::default());
    }

    #[test]
    fn area_sync_uses_cached_rooms() {
        let (eng, mut rx) = engine();
        let with_room = EntityHandle::new("a", "light.a", "dev-a").with_state(EntityState {
            room: Some(Room {
                id: Some("r1".to_string()),
                name: Some("Office".to_string()),
                ..Room::default()
            }),
            relation_id: Some("rel-a".to_string()),
            ..EntityState::default()
        });
        eng.register("a", RegistryEntry::new(Arc::new(with_room)));
        eng.register(
            "b",
            RegistryEntry::new(Arc::new(EntityHandle::new("b", "light.b", "dev-b"))),
        );

        assert_eq!(eng.sync_all_device_areas(), 1);
        assert_eq!(
            drain(&mut rx),
            vec![HubIntent::UpdateArea {
                device_id: "rel-a".to_string(),
                room_name: "Office".to_string(),
            }]
        );
    }

    #[test]
    fn clear_then_register_again() {
        let (eng, _rx) = engine();
        let (_, entry) = light("l1", "light.old");
        eng.register("l1", entry);
        eng.clear();
        assert!(eng.lookup("l1").is_none());

        let (_, entry) = light("l1", "light.new");
        assert!(eng.register("l1", entry));
        assert_eq!(eng.lookup("l1").unwrap().entity.entity_id(), "light.new");
    }

    #[test]
    fn closed_intent_channel_does_not_panic() {
        let (eng, rx) = engine();
        drop(rx);
        eng.handle_text(r#"{"type": "deviceAdded", "data": {"id": "n1", "type": "light"}}"#);
    }
}
