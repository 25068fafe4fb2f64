//! Interfaces to the host system the hub is mirrored into.
//!
//! The engine never calls these directly. It emits intents, and the
//! [`adapter::HostAdapter`] performs them against these traits.

pub mod adapter;
pub mod logging;

use async_trait::async_trait;

use hubsync_api::event::TriggerEvent;

use crate::error::HubResult;

/// A device as known by the host's device registry.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct HostDevice {
    pub id: String,
    pub name: Option<String>,
    /// Name chosen by the user; automatic renames never override it.
    pub name_by_user: Option<String>,
    pub area_id: Option<String>,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct HostArea {
    pub id: String,
    pub name: String,
}

/// Host device and area registries.
#[async_trait]
pub trait HostRegistry: Send + Sync {
    /// Look up a device by its hub identifier.
    async fn get_device(&self, identifier: &str) -> HubResult<Option<HostDevice>>;

    async fn update_device_area(&self, device_id: &str, area_id: Option<&str>) -> HubResult<()>;

    async fn update_device_name(&self, device_id: &str, name: &str) -> HubResult<()>;

    async fn get_area_by_name(&self, name: &str) -> HubResult<Option<HostArea>>;

    async fn create_area(&self, name: &str) -> HubResult<HostArea>;
}

/// Builds entities for devices first seen on the event stream.
#[async_trait]
pub trait DiscoveryCoordinator: Send + Sync {
    async fn discover_device(&self, device_id: &str, device_type: &str) -> HubResult<()>;
}

#[async_trait]
pub trait EntityHost: Send + Sync {
    /// Re-render an entity from its cached state.
    async fn schedule_refresh(&self, entity_id: &str) -> HubResult<()>;
}

#[async_trait]
pub trait EventBus: Send + Sync {
    async fn fire(&self, event_type: &str, event: &TriggerEvent) -> HubResult<()>;
}
