use std::sync::Arc;

use tokio::sync::mpsc::{self, UnboundedReceiver};

use hubsync_api::intent::HubIntent;

use crate::engine::Engine;
use crate::engine::registry::RegistryEntry;
use crate::model::state::EntityHandle;

pub fn engine() -> (Engine, UnboundedReceiver<HubIntent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Engine::new(tx).with_discovery(true), rx)
}

pub fn drain(rx: &mut UnboundedReceiver<HubIntent>) -> Vec<HubIntent> {
    let mut res = vec![];
    while let Ok(intent) = rx.try_recv() {
        res.push(intent);
    }
    res
}

pub fn light(hub_id: &str, entity_id: &str) -> (Arc<EntityHandle>, RegistryEntry) {
    let ent = Arc::new(
        EntityHandle::new(hub_id, entity_id, format!("dev-{hub_id}")).with_color_mode(),
    );
    (ent.clone(), RegistryEntry::new(ent))
}

pub fn plain(hub_id: &str, entity_id: &str) -> (Arc<EntityHandle>, RegistryEntry) {
    let ent = Arc::new(EntityHandle::new(hub_id, entity_id, format!("dev-{hub_id}")));
    (ent.clone(), RegistryEntry::new(ent))
}

pub fn refresh(entity_id: &str) -> HubIntent {
    HubIntent::Refresh {
        entity_id: entity_id.to_string(),
    }
}
