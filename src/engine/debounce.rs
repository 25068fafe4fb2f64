use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, TimeDelta, Utc};

/// Last-fired time per (device id, trigger type).
///
/// Some controller firmware reports every press twice in quick succession;
/// anything within [`DebounceStore::WINDOW`] of the previous event for the
/// same key is collapsed. Entries are never evicted.
#[derive(Debug, Default)]
pub struct DebounceStore {
    last: Mutex<HashMap<(String, String), DateTime<Utc>>>,
}

impl DebounceStore {
    pub const WINDOW: TimeDelta = TimeDelta::seconds(1);

    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Scene-trigger path. The hub's `lastTriggered` time is compared with
    /// the stored time for the key. The stored time is always replaced: with
    /// the hub time if known, otherwise with `now`.
    ///
    /// Returns `true` if the event should fire.
    pub fn check_hub_time(
        &self,
        device_id: &str,
        trigger_type: &str,
        hub_time: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> bool {
        let key = (device_id.to_string(), trigger_type.to_string());
        let mut lock = self.last.lock().unwrap_or_else(PoisonError::into_inner);
        let previous = lock.insert(key, hub_time.unwrap_or(now));

        match (previous, hub_time) {
            (Some(prev), Some(current)) => current - prev >= Self::WINDOW,
            _ => true,
        }
    }

    /// Remote-press path. No hub time exists, so local receive time is used;
    /// a suppressed event does not move the stored time.
    ///
    /// Returns `true` if the event should fire.
    pub fn check_local_time(&self, device_id: &str, trigger_type: &str, now: DateTime<Utc>) -> bool {
        let key = (device_id.to_string(), trigger_type.to_string());
        let mut lock = self.last.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(prev) = lock.get(&key) {
            if now - *prev < Self::WINDOW {
                return false;
            }
        }
        lock.insert(key, now);
        true
    }

    #[must_use]
    pub fn last_fired(&self, device_id: &str, trigger_type: &str) -> Option<DateTime<Utc>> {
        self.last
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(device_id.to_string(), trigger_type.to_string()))
            .copied()
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, TimeDelta, Utc};

    use crate::engine::debounce::DebounceStore;

    fn t0() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-05-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn hub_time_within_window_is_suppressed() {
        let store = DebounceStore::new();
        let now = t0();
        assert!(store.check_hub_time("dev", "single_click", Some(t0()), now));
        let second = t0() + TimeDelta::milliseconds(500);
        assert!(!store.check_hub_time("dev", "single_click", Some(second), now));
        // stored time follows the hub even when suppressed
        assert_eq!(store.last_fired("dev", "single_click"), Some(second));
    }

    #[test]
    fn hub_time_outside_window_fires() {
        let store = DebounceStore::new();
        assert!(store.check_hub_time("dev", "single_click", Some(t0()), t0()));
        let second = t0() + TimeDelta::milliseconds(1500);
        assert!(store.check_hub_time("dev", "single_click", Some(second), t0()));
    }

    #[test]
    fn missing_hub_time_fires_and_records_now() {
        let store = DebounceStore::new();
        assert!(store.check_hub_time("dev", "long_press", None, t0()));
        assert!(store.check_hub_time("dev", "long_press", None, t0()));
        assert_eq!(store.last_fired("dev", "long_press"), Some(t0()));
    }

    #[test]
    fn keys_are_independent() {
        let store = DebounceStore::new();
        assert!(store.check_local_time("dev", "single_click", t0()));
        assert!(store.check_local_time("dev", "double_click", t0()));
        assert!(store.check_local_time("other", "single_click", t0()));
    }

    #[test]
    fn local_time_debounce() {
        let store = DebounceStore::new();
        assert!(store.check_local_time("dev", "single_click", t0()));
        assert!(!store.check_local_time(
            "dev",
            "single_click",
            t0() + TimeDelta::milliseconds(200)
        ));
        assert_eq!(store.last_fired("dev", "single_click"), Some(t0()));
        assert!(store.check_local_time(
            "dev",
            "single_click",
            t0() + TimeDelta::milliseconds(1200)
        ));
    }
}
