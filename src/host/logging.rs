//! A host that only reports what it would do.
//!
//! Used by the standalone binary, where no device registry exists to mirror
//! into. Every hand-off shows up in the log instead.

use async_trait::async_trait;

use hubsync_api::event::TriggerEvent;

use crate::error::HubResult;
use crate::host::{DiscoveryCoordinator, EntityHost, EventBus, HostArea, HostDevice, HostRegistry};

#[derive(Clone, Copy, Debug, Default)]
pub struct LogHost;

#[async_trait]
impl HostRegistry for LogHost {
    async fn get_device(&self, identifier: &str) -> HubResult<Option<HostDevice>> {
        log::trace!("Device lookup for {identifier}");
        Ok(None)
    }

    async fn update_device_area(&self, device_id: &str, area_id: Option<&str>) -> HubResult<()> {
        log::info!("[area] {device_id} -> {area_id:?}");
        Ok(())
    }

    async fn update_device_name(&self, device_id: &str, name: &str) -> HubResult<()> {
        log::info!("[name] {device_id} -> {name:?}");
        Ok(())
    }

    async fn get_area_by_name(&self, _name: &str) -> HubResult<Option<HostArea>> {
        Ok(None)
    }

    async fn create_area(&self, name: &str) -> HubResult<HostArea> {
        log::info!("[area] created {name:?}");
        Ok(HostArea {
            id: name.to_string(),
            name: name.to_string(),
        })
    }
}

#[async_trait]
impl DiscoveryCoordinator for LogHost {
    async fn discover_device(&self, device_id: &str, device_type: &str) -> HubResult<()> {
        log::info!("[discover] {device_type} {device_id}");
        Ok(())
    }
}

#[async_trait]
impl EntityHost for LogHost {
    async fn schedule_refresh(&self, entity_id: &str) -> HubResult<()> {
        log::debug!("[refresh] {entity_id}");
        Ok(())
    }
}

#[async_trait]
impl EventBus for LogHost {
    async fn fire(&self, event_type: &str, event: &TriggerEvent) -> HubResult<()> {
        log::info!("[{event_type}] {}", serde_json::to_string(event)?);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use hubsync_api::event::TriggerEvent;

    use crate::host::logging::LogHost;
    use crate::host::{EventBus, HostRegistry};

    #[tokio::test]
    async fn knows_no_devices() {
        assert_eq!(LogHost.get_device("anything").await.unwrap(), None);
        let area = LogHost.create_area("Den").await.unwrap();
        assert_eq!(area.name, "Den");
    }

    #[tokio::test]
    async fn fire_accepts_events() {
        let event = TriggerEvent {
            trigger_type: "double_click".to_string(),
            device_id: "d".to_string(),
            entity_id: "e".to_string(),
        };
        LogHost.fire("hubsync_event", &event).await.unwrap();
    }
}
