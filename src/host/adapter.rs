use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;

use hubsync_api::event::TRIGGER_EVENT_TYPE;
use hubsync_api::intent::HubIntent;

use crate::error::HubResult;
use crate::host::{DiscoveryCoordinator, EntityHost, EventBus, HostRegistry};

/// Performs engine intents against the host, each on its own task. Failures
/// are logged where they happen and never reach the engine.
#[derive(Clone)]
pub struct HostAdapter {
    registry: Arc<dyn HostRegistry>,
    entities: Arc<dyn EntityHost>,
    bus: Arc<dyn EventBus>,
    discovery: Option<Arc<dyn DiscoveryCoordinator>>,
    in_flight: Arc<Mutex<HashSet<String>>>,
}

/// Marks a device as being discovered until dropped.
struct InFlight {
    set: Arc<Mutex<HashSet<String>>>,
    device_id: String,
}

impl InFlight {
    fn claim(set: &Arc<Mutex<HashSet<String>>>, device_id: &str) -> Option<Self> {
        let fresh = set
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(device_id.to_string());

        fresh.then(|| Self {
            set: set.clone(),
            device_id: device_id.to_string(),
        })
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.set
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.device_id);
    }
}

impl HostAdapter {
    pub fn new(
        registry: Arc<dyn HostRegistry>,
        entities: Arc<dyn EntityHost>,
        bus: Arc<dyn EventBus>,
    ) -> Self {
        Self {
            registry,
            entities,
            bus,
            discovery: None,
            in_flight: Arc::default(),
        }
    }

    #[must_use]
    pub fn with_discovery(mut self, discovery: Arc<dyn DiscoveryCoordinator>) -> Self {
        self.discovery = Some(discovery);
        self
    }

    #[must_use]
    pub const fn has_discovery(&self) -> bool {
        self.discovery.is_some()
    }

    /// Consume intents until every sender is gone.
    pub async fn run(self, mut rx: UnboundedReceiver<HubIntent>) {
        while let Some(intent) = rx.recv().await {
            let _job = self.dispatch(intent);
        }
        log::debug!("Intent channel closed, host adapter exiting");
    }

    /// Hand off a single intent. Returns the task performing it, if any.
    pub fn dispatch(&self, intent: HubIntent) -> Option<JoinHandle<()>> {
        if let HubIntent::Discover {
            device_id,
            device_type,
        } = intent
        {
            let Some(discovery) = self.discovery.clone() else {
                log::debug!("No discovery coordinator, ignoring new device {device_id}");
                return None;
            };
            let Some(guard) = InFlight::claim(&self.in_flight, &device_id) else {
                log::debug!("Discovery of {device_id} already in progress, skipping");
                return None;
            };
            return Some(tokio::spawn(async move {
                let _guard = guard;
                if let Err(err) = discovery.discover_device(&device_id, &device_type).await {
                    log::error!("Failed to discover device {device_id} ({device_type}): {err}");
                }
            }));
        }

        let this = self.clone();
        Some(tokio::spawn(async move {
            if let Err(err) = this.handle(&intent).await {
                log::error!("Failed to hand off {intent:?}: {err}");
            }
        }))
    }

    /// Perform an intent in place.
    pub async fn handle(&self, intent: &HubIntent) -> HubResult<()> {
        match intent {
            HubIntent::Refresh { entity_id } => self.entities.schedule_refresh(entity_id).await,
            HubIntent::UpdateArea {
                device_id,
                room_name,
            } => self.update_device_area(device_id, room_name).await,
            HubIntent::RemoveArea { device_id } => self.remove_device_area(device_id).await,
            HubIntent::UpdateName { device_id, name } => {
                self.update_device_name(device_id, name).await
            }
            HubIntent::Discover {
                device_id,
                device_type,
            } => match &self.discovery {
                Some(discovery) => discovery.discover_device(device_id, device_type).await,
                None => Ok(()),
            },
            HubIntent::Trigger(event) => {
                self.bus.fire(TRIGGER_EVENT_TYPE, event).await?;
                log::debug!("Event fired: {event:?}");
                Ok(())
            }
        }
    }

    async fn update_device_area(&self, device_id: &str, room_name: &str) -> HubResult<()> {
        let Some(device) = self.registry.get_device(device_id).await? else {
            log::debug!("Device {device_id} not found in host device registry");
            return Ok(());
        };

        let area = match self.registry.get_area_by_name(room_name).await? {
            Some(area) => area,
            None => {
                log::info!("Creating new area: {room_name}");
                self.registry.create_area(room_name).await?
            }
        };

        if device.area_id.as_deref() == Some(area.id.as_str()) {
            log::debug!("Device {device_id} already in area {room_name}");
            return Ok(());
        }

        log::info!("Updating device {device_id} area to {room_name}");
        self.registry
            .update_device_area(&device.id, Some(&area.id))
            .await
    }

    async fn remove_device_area(&self, device_id: &str) -> HubResult<()> {
        let Some(device) = self.registry.get_device(device_id).await? else {
            log::debug!("Device {device_id} not found in host device registry");
            return Ok(());
        };

        if device.area_id.is_none() {
            return Ok(());
        }

        log::info!("Removing area assignment from device {device_id}");
        self.registry.update_device_area(&device.id, None).await
    }

    async fn update_device_name(&self, device_id: &str, name: &str) -> HubResult<()> {
        let Some(device) = self.registry.get_device(device_id).await? else {
            log::debug!("Device {device_id} not found in host device registry for name update");
            return Ok(());
        };

        if device.name_by_user.is_some() {
            log::debug!("Device {device_id} has user-set name, skipping automatic name update");
            return Ok(());
        }

        log::info!("Updating device {device_id} name to {name}");
        self.registry.update_device_name(&device.id, name).await
    }
}
