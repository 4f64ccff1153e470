//! Cooldown gate over the persisted alert state.

use crate::state::{AlertStateStore, StateBackend, StateError};
use chrono::{DateTime, TimeDelta, Utc};
use volume_core::AlertKey;

/// Default cooldown between two sends of the same key: four hours.
pub fn default_cooldown() -> TimeDelta {
    TimeDelta::hours(4)
}

/// Where a key currently sits in its cooldown cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyState {
    /// Never sent.
    Unseen,
    /// Sent less than one cooldown ago.
    Cooling,
    /// Sent at least one cooldown ago.
    Eligible,
}

/// Decides send/suppress per [`AlertKey`] and persists the decision state.
///
/// The store itself is passed in and out explicitly; this type only holds
/// the cooldown policy and the durable backend.
pub struct AlertDeduplicationStore {
    backend: Box<dyn StateBackend>,
    cooldown: TimeDelta,
}

impl AlertDeduplicationStore {
    pub fn new(backend: impl StateBackend + 'static, cooldown: TimeDelta) -> Self {
        Self {
            backend: Box::new(backend),
            cooldown,
        }
    }

    pub fn cooldown(&self) -> TimeDelta {
        self.cooldown
    }

    /// Read persisted state. Missing storage is an empty store, unparseable
    /// storage is [`StateError::Corrupt`]; recovering from the latter is the
    /// caller's decision.
    pub fn load(&self) -> Result<AlertStateStore, StateError> {
        self.backend.load()
    }

    /// True iff `key` was sent less than one cooldown before `now`.
    pub fn is_suppressed(
        &self,
        store: &AlertStateStore,
        key: &AlertKey,
        now: DateTime<Utc>,
    ) -> bool {
        self.key_state(store, key, now) == KeyState::Cooling
    }

    pub fn key_state(
        &self,
        store: &AlertStateStore,
        key: &AlertKey,
        now: DateTime<Utc>,
    ) -> KeyState {
        match store.get(key) {
            None => KeyState::Unseen,
            // a timestamp in the future yields a negative delta and keeps cooling
            Some(record) if now - record.last_sent_at < self.cooldown => KeyState::Cooling,
            Some(_) => KeyState::Eligible,
        }
    }

    /// Mark `key` as sent at `now`. Call only after delivery succeeded.
    pub fn record_sent(&self, store: &mut AlertStateStore, key: AlertKey, now: DateTime<Utc>) {
        store.upsert(key, now);
    }

    /// Persist the whole store.
    pub fn save(&self, store: &AlertStateStore) -> Result<(), StateError> {
        self.backend.save(store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::MemoryState;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 17, 0, 0, 0).unwrap()
    }

    fn dedup() -> AlertDeduplicationStore {
        AlertDeduplicationStore::new(MemoryState::new(), default_cooldown())
    }

    #[test]
    fn test_unseen_key_is_eligible() {
        let dedup = dedup();
        let store = AlertStateStore::new();
        let key = AlertKey::new("BTCUSDC", "L1");

        assert_eq!(dedup.key_state(&store, &key, t0()), KeyState::Unseen);
        assert!(!dedup.is_suppressed(&store, &key, t0()));
    }

    #[test]
    fn test_suppressed_inside_cooldown() {
        let dedup = dedup();
        let mut store = AlertStateStore::new();
        let key = AlertKey::new("BTCUSDC", "L1");
        dedup.record_sent(&mut store, key.clone(), t0());

        assert!(dedup.is_suppressed(&store, &key, t0()));
        assert!(dedup.is_suppressed(&store, &key, t0() + TimeDelta::hours(1)));
        assert!(dedup.is_suppressed(
            &store,
            &key,
            t0() + TimeDelta::hours(4) - TimeDelta::seconds(1)
        ));
    }

    #[test]
    fn test_released_exactly_at_cooldown() {
        let dedup = dedup();
        let mut store = AlertStateStore::new();
        let key = AlertKey::new("BTCUSDC", "L1");
        dedup.record_sent(&mut store, key.clone(), t0());

        let boundary = t0() + dedup.cooldown();
        assert!(!dedup.is_suppressed(&store, &key, boundary));
        assert_eq!(dedup.key_state(&store, &key, boundary), KeyState::Eligible);
    }

    #[test]
    fn test_record_while_cooling_restarts_window() {
        let dedup = dedup();
        let mut store = AlertStateStore::new();
        let key = AlertKey::new("BTCUSDC", "L1");
        dedup.record_sent(&mut store, key.clone(), t0());
        dedup.record_sent(&mut store, key.clone(), t0() + TimeDelta::hours(2));

        assert!(dedup.is_suppressed(&store, &key, t0() + TimeDelta::hours(5)));
        assert!(!dedup.is_suppressed(&store, &key, t0() + TimeDelta::hours(6)));
    }

    #[test]
    fn test_levels_cool_independently() {
        let dedup = dedup();
        let mut store = AlertStateStore::new();
        dedup.record_sent(&mut store, AlertKey::new("SYM", "L1"), t0());

        assert!(dedup.is_suppressed(&store, &AlertKey::new("SYM", "L1"), t0()));
        assert!(!dedup.is_suppressed(&store, &AlertKey::new("SYM", "L2"), t0()));
        assert!(!dedup.is_suppressed(&store, &AlertKey::new("OTHER", "L1"), t0()));
    }

    #[test]
    fn test_future_timestamp_keeps_suppressing() {
        let dedup = dedup();
        let mut store = AlertStateStore::new();
        let key = AlertKey::new("BTCUSDC", "L1");
        dedup.record_sent(&mut store, key.clone(), t0() + TimeDelta::hours(1));

        assert!(dedup.is_suppressed(&store, &key, t0()));
    }

    #[test]
    fn test_save_and_reload_survives_restart() {
        let backend = MemoryState::new();
        let dedup = AlertDeduplicationStore::new(backend.clone(), default_cooldown());
        let mut store = dedup.load().unwrap();
        let key = AlertKey::new("BTCUSDC", "L1");
        dedup.record_sent(&mut store, key.clone(), t0());
        dedup.save(&store).unwrap();

        let restarted = AlertDeduplicationStore::new(backend, default_cooldown());
        let reloaded = restarted.load().unwrap();
        assert!(restarted.is_suppressed(&reloaded, &key, t0() + TimeDelta::hours(1)));
    }

    #[test]
    fn test_load_surfaces_corruption() {
        let dedup =
            AlertDeduplicationStore::new(MemoryState::with_contents("garbage"), default_cooldown());
        assert!(dedup.load().unwrap_err().is_corrupt());
    }
}
