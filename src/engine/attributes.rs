use hubsync_api::intent::HubIntent;

use crate::engine::Engine;
use crate::engine::registry::RegistryEntry;
use crate::model::device::{ColorMode, DeviceType, HubAttribute};
use crate::model::message::DeviceStateData;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SyncOutcome {
    /// State changed and a refresh was requested.
    Refreshed,
    /// Light echo swallowed by the ignore-next-update flag.
    Suppressed,
    /// Nothing relevant in the message.
    Unchanged,
}

impl Engine {
    /// Apply a `deviceStateChanged` message to a registered entity.
    pub(crate) fn sync_attributes(
        &self,
        entry: &RegistryEntry,
        device_type: DeviceType,
        data: &DeviceStateData,
    ) -> SyncOutcome {
        let entity = &entry.entity;
        let id = &data.id;
        let mut state = entity.state();

        let host_id = state.host_identifier(entity.hub_id());

        let reachability_changed = data.is_reachable().is_some_and(|reachable| {
            log::debug!("Setting {id} reachable as {reachable}");
            state.is_reachable = reachable;
            true
        });

        let mut room_changed = false;
        match data.room() {
            None => {}
            Some(Err(err)) => log::warn!("Ignoring malformed room for {id}: {err}"),
            Some(Ok(Some(room))) => {
                if state.room.as_ref().is_none_or(|cur| cur.id != room.id) {
                    log::debug!("Setting {id} room to {:?}", room.name);
                    room_changed = true;
                }
                // Reassign even when unchanged, since the host registry may have
                // drifted (e.g. after a host restart with a warm cache).
                match &room.name {
                    Some(room_name) => self.emit(HubIntent::UpdateArea {
                        device_id: host_id.clone(),
                        room_name: room_name.clone(),
                    }),
                    None => log::debug!("Room for {id} has no name, not updating area"),
                }
                if room_changed {
                    state.room = Some(room);
                }
            }
            Some(Ok(None)) => {
                if state.room.take().is_some() {
                    log::debug!("Removing room from {id}");
                    room_changed = true;
                    self.emit(HubIntent::RemoveArea {
                        device_id: host_id.clone(),
                    });
                }
            }
        }

        if let Some(attributes) = &data.attributes {
            let mut toggled_power = false;
            let mut new_name = None;

            for (key, value) in attributes {
                let Some(attr) = device_type.accepts(key) else {
                    log::debug!(
                        "attribute {key} with value {value} not in list of device type {device_type}, ignoring update"
                    );
                    continue;
                };

                if attr == HubAttribute::IsOn {
                    toggled_power = true;
                }

                let renamed = attr == HubAttribute::CustomName
                    && value
                        .as_str()
                        .is_some_and(|name| name != state.attributes.custom_name);

                log::debug!("[{id}] setting {attr} to {value}");
                match state.attributes.set(attr, value) {
                    Ok(()) if renamed => new_name = Some(state.attributes.custom_name.clone()),
                    Ok(()) => {}
                    Err(err) => log::warn!("Failed to set attribute on device {id}: {err}"),
                }
            }

            if device_type == DeviceType::Light && entity.tracks_color_mode() {
                if let Some(mode) = ColorMode::detect(attributes.keys().map(String::as_str)) {
                    state.color_mode = Some(mode);
                }
            }

            // Lights echo an interim state after a command; the flag set by
            // the command swallows that echo, unless this is a power toggle.
            if device_type == DeviceType::Light && entity.should_ignore_update() && !toggled_power {
                entity.reset_ignore_update();
                log::debug!("Ignoring state refresh for {id}, ignore-next-update was set");
                return SyncOutcome::Suppressed;
            }

            if let Some(name) = new_name {
                self.emit(HubIntent::UpdateName {
                    device_id: host_id,
                    name,
                });
            }
        }
        drop(state);

        if data.attributes.is_some() || reachability_changed || room_changed {
            self.refresh(entry);
            SyncOutcome::Refreshed
        } else {
            SyncOutcome::Unchanged
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::{Value, json};

    use hubsync_api::intent::HubIntent;

    use crate::engine::test_support::{drain, engine, light, plain, refresh};
    use crate::model::device::{ColorMode, Room};
    use crate::model::state::{EntityHandle, HubTimestamp};

    fn state_changed(id: &str, device_type: &str, data: Value) -> String {
        let mut body = json!({"id": id, "deviceType": device_type});
        if let (Some(obj), Value::Object(extra)) = (body.as_object_mut(), data) {
            obj.extend(extra);
        }
        json!({"type": "deviceStateChanged", "data": body}).to_string()
    }

    #[test]
    fn allow_list_filters_unknown_keys() {
        let (eng, mut rx) = engine();
        let (ent, entry) = light("l1", "light.l1");
        eng.register("l1", entry);

        eng.handle_text(&state_changed(
            "l1",
            "light",
            json!({"attributes": {"foo": 1, "lightLevel": 55, "isOn": true, "batteryPercentage": 3}}),
        ));

        let state = ent.snapshot();
        assert_eq!(state.attributes.light_level, Some(55));
        assert_eq!(state.attributes.is_on, Some(true));
        // not a light attribute
        assert_eq!(state.attributes.battery_percentage, None);
        assert_eq!(drain(&mut rx), vec![refresh("light.l1")]);
    }

    #[test]
    fn color_mode_precedence() {
        let (eng, _rx) = engine();
        let (ent, entry) = light("l1", "light.l1");
        eng.register("l1", entry);

        eng.handle_text(&state_changed(
            "l1",
            "light",
            json!({"attributes": {"colorTemperature": 3000, "colorHue": 20, "colorSaturation": 0.5}}),
        ));
        assert_eq!(ent.snapshot().color_mode, Some(ColorMode::Hs));

        eng.handle_text(&state_changed(
            "l1",
            "light",
            json!({"attributes": {"colorTemperature": 2700}}),
        ));
        let state = ent.snapshot();
        assert_eq!(state.color_mode, Some(ColorMode::ColorTemp));
        assert_eq!(state.attributes.color_temperature, Some(2700));
    }

    #[test]
    fn light_suppression_swallows_echo() {
        let (eng, mut rx) = engine();
        let (ent, entry) = light("l1", "light.l1");
        eng.register("l1", entry);
        ent.set_ignore_next_update();

        eng.handle_text(&state_changed(
            "l1",
            "light",
            json!({"attributes": {"lightLevel": 10}}),
        ));

        assert!(!ent.should_ignore_update());
        assert!(drain(&mut rx).is_empty());
        // the value itself is still cached
        assert_eq!(ent.snapshot().attributes.light_level, Some(10));

        eng.handle_text(&state_changed(
            "l1",
            "light",
            json!({"attributes": {"lightLevel": 20}}),
        ));
        assert_eq!(drain(&mut rx), vec![refresh("light.l1")]);
    }

    #[test]
    fn light_suppression_lets_power_toggle_through() {
        let (eng, mut rx) = engine();
        let (ent, entry) = light("l1", "light.l1");
        eng.register("l1", entry);
        ent.set_ignore_next_update();

        eng.handle_text(&state_changed(
            "l1",
            "light",
            json!({"attributes": {"isOn": false}}),
        ));

        assert_eq!(drain(&mut rx), vec![refresh("light.l1")]);
        assert!(ent.should_ignore_update());
    }

    #[test]
    fn suppression_only_applies_to_lights() {
        let (eng, mut rx) = engine();
        let (ent, entry) = plain("o1", "switch.o1");
        eng.register("o1", entry);
        ent.set_ignore_next_update();

        eng.handle_text(&state_changed(
            "o1",
            "outlet",
            json!({"attributes": {"currentAmps": 0.4}}),
        ));
        assert_eq!(drain(&mut rx), vec![refresh("switch.o1")]);
    }

    #[test]
    fn refresh_cascades() {
        let (eng, mut rx) = engine();
        let (_, entry) = plain("o1", "switch.o1");
        let cascade = Arc::new(EntityHandle::new("o1", "sensor.o1_power", "dev-o1"));
        eng.register("o1", entry.with_cascade(cascade));

        eng.handle_text(&state_changed(
            "o1",
            "outlet",
            json!({"attributes": {"currentActivePower": 12.5}}),
        ));
        assert_eq!(
            drain(&mut rx),
            vec![refresh("switch.o1"), refresh("sensor.o1_power")]
        );
    }

    #[test]
    fn energy_timestamps() {
        let (eng, _rx) = engine();
        let (ent, entry) = plain("o1", "switch.o1");
        eng.register("o1", entry);

        eng.handle_text(&state_changed(
            "o1",
            "outlet",
            json!({"attributes": {
                "timeOfLastEnergyReset": "2024-01-02T03:04:05.000Z",
                "totalEnergyConsumedLastUpdated": "not a date",
                "totalEnergyConsumed": 1.25,
            }}),
        ));

        let attrs = ent.snapshot().attributes;
        assert!(matches!(
            attrs.time_of_last_energy_reset,
            Some(HubTimestamp::Parsed(_))
        ));
        assert_eq!(
            attrs.total_energy_consumed_last_updated,
            Some(HubTimestamp::Raw("not a date".to_string()))
        );
        assert_eq!(attrs.total_energy_consumed, Some(1.25));
    }

    #[test]
    fn bad_value_does_not_stop_other_keys() {
        let (eng, mut rx) = engine();
        let (ent, entry) = plain("s1", "binary_sensor.s1");
        eng.register("s1", entry);

        eng.handle_text(&state_changed(
            "s1",
            "motionSensor",
            json!({"attributes": {"isDetected": "maybe", "batteryPercentage": 80}}),
        ));

        let attrs = ent.snapshot().attributes;
        assert_eq!(attrs.is_detected, None);
        assert_eq!(attrs.battery_percentage, Some(80));
        assert_eq!(drain(&mut rx), vec![refresh("binary_sensor.s1")]);
    }

    #[test]
    fn custom_name_change_queues_rename() {
        let (eng, mut rx) = engine();
        let (ent, entry) = plain("s1", "sensor.s1");
        eng.register("s1", entry);
        ent.state().relation_id = Some("rel-1".to_string());

        let msg = state_changed(
            "s1",
            "lightSensor",
            json!({"attributes": {"customName": "Hallway"}}),
        );
        eng.handle_text(&msg);
        assert_eq!(
            drain(&mut rx),
            vec![
                HubIntent::UpdateName {
                    device_id: "rel-1".to_string(),
                    name: "Hallway".to_string(),
                },
                refresh("sensor.s1"),
            ]
        );

        // same name again: no rename
        eng.handle_text(&msg);
        assert_eq!(drain(&mut rx), vec![refresh("sensor.s1")]);
    }

    #[test]
    fn room_tristate() {
        let (eng, mut rx) = engine();
        let (ent, entry) = plain("b1", "cover.b1");
        eng.register("b1", entry);

        let kitchen = json!({"room": {"id": "r1", "name": "Kitchen"}});
        let area = HubIntent::UpdateArea {
            device_id: "b1".to_string(),
            room_name: "Kitchen".to_string(),
        };

        eng.handle_text(&state_changed("b1", "blinds", kitchen.clone()));
        assert_eq!(drain(&mut rx), vec![area.clone(), refresh("cover.b1")]);
        assert_eq!(
            ent.snapshot().room,
            Some(Room {
                id: Some("r1".to_string()),
                name: Some("Kitchen".to_string()),
                ..Room::default()
            })
        );

        // same room: area re-asserted, but nothing to refresh
        eng.handle_text(&state_changed("b1", "blinds", kitchen));
        assert_eq!(drain(&mut rx), vec![area]);

        eng.handle_text(&state_changed("b1", "blinds", json!({"room": null})));
        assert_eq!(
            drain(&mut rx),
            vec![
                HubIntent::RemoveArea {
                    device_id: "b1".to_string(),
                },
                refresh("cover.b1"),
            ]
        );
        assert_eq!(ent.snapshot().room, None);

        // null again: nothing cached, nothing to do
        eng.handle_text(&state_changed("b1", "blinds", json!({"room": null})));
        assert!(drain(&mut rx).is_empty());
    }

    #[test]
    fn reachability_passthrough() {
        let (eng, mut rx) = engine();
        let (ent, entry) = plain("w1", "binary_sensor.w1");
        eng.register("w1", entry);

        eng.handle_text(&state_changed("w1", "waterSensor", json!({"isReachable": true})));
        assert!(ent.snapshot().is_reachable);
        assert_eq!(drain(&mut rx), vec![refresh("binary_sensor.w1")]);

        eng.handle_text(&state_changed("w1", "waterSensor", json!({})));
        assert!(drain(&mut rx).is_empty());
    }

    #[test]
    fn malformed_room_keeps_the_rest() {
        let (eng, mut rx) = engine();
        let (ent, entry) = plain("o1", "switch.o1");
        eng.register("o1", entry);

        eng.handle_text(&state_changed(
            "o1",
            "outlet",
            json!({
                "room": {"id": 5, "name": "Garage"},
                "isReachable": "sometimes",
                "attributes": {"isOn": true},
            }),
        ));

        let state = ent.snapshot();
        assert_eq!(state.attributes.is_on, Some(true));
        assert_eq!(state.room, None);
        assert!(!state.is_reachable);
        assert_eq!(drain(&mut rx), vec![refresh("switch.o1")]);
    }
}
