use serde::{Deserialize, Serialize};

use crate::event::TriggerEvent;

/// Work the engine hands over to the host. The engine never waits for these
/// to complete, and a failing intent never affects message processing.
#[derive(Clone, Debug, Serialize, Deserialize, Eq, PartialEq)]
pub enum HubIntent {
    /// Re-render the state of a host entity from its cached state.
    Refresh { entity_id: String },
    /// Place a host device in the named area, creating the area if needed.
    UpdateArea { device_id: String, room_name: String },
    /// Clear the area assignment of a host device.
    RemoveArea { device_id: String },
    /// Rename a host device, unless the user already named it.
    UpdateName { device_id: String, name: String },
    /// Ask the discovery collaborator to build entities for a new device.
    Discover {
        device_id: String,
        device_type: String,
    },
    /// Publish a normalized button trigger on the bus.
    Trigger(TriggerEvent),
}
