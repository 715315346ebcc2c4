// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Session configuration: timing windows and retention caps.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use weft_app::config::{ConfigService, ConfigStore};

/// Tunable capture behavior, persisted as one config blob.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Debounce window after the last edit before an automatic capture.
    pub debounce_ms: u64,
    /// Guard delay after a restore's load settles, absorbing echo edits.
    pub restore_guard_ms: u64,
    /// Retention cap for the interactive pool.
    pub interactive_cap: usize,
    /// Retention cap for the programmatic (trigger node) pool.
    pub programmatic_cap: usize,
    /// Whether edit events schedule automatic captures at all.
    pub auto_capture: bool,
    /// Label for the synthetic capture taken before the first swap.
    pub bookmark_label: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 800,
            restore_guard_ms: 900,
            interactive_cap: 25,
            programmatic_cap: 10,
            auto_capture: true,
            bookmark_label: "Current".into(),
        }
    }
}

impl SessionConfig {
    /// Config-store key for the session blob.
    pub const CONFIG_KEY: &'static str = "session";

    /// Debounce window as a duration.
    #[must_use]
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// Restore guard as a duration.
    #[must_use]
    pub fn restore_guard(&self) -> Duration {
        Duration::from_millis(self.restore_guard_ms)
    }

    /// Clamps nonsensical values: retention caps of zero would delete a
    /// capture the moment it lands, so both caps floor at 1.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        self.interactive_cap = self.interactive_cap.max(1);
        self.programmatic_cap = self.programmatic_cap.max(1);
        self
    }

    /// Loads the persisted config (normalized), falling back to defaults
    /// when the blob is missing or unreadable.
    pub fn load_from<S: ConfigStore>(configs: &ConfigService<S>) -> Self {
        match configs.load_or_default::<Self>(Self::CONFIG_KEY) {
            Ok(config) => config.normalized(),
            Err(err) => {
                tracing::warn!(error = %err, "session config unreadable, using defaults");
                Self::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::BTreeMap;
    use weft_app::config::ConfigError;

    #[derive(Default)]
    struct MapStore {
        blobs: RefCell<BTreeMap<String, Vec<u8>>>,
    }

    impl ConfigStore for MapStore {
        fn load_raw(&self, key: &str) -> Result<Vec<u8>, ConfigError> {
            self.blobs
                .borrow()
                .get(key)
                .cloned()
                .ok_or(ConfigError::NotFound)
        }

        fn save_raw(&self, key: &str, data: &[u8]) -> Result<(), ConfigError> {
            self.blobs.borrow_mut().insert(key.into(), data.to_vec());
            Ok(())
        }
    }

    #[test]
    fn load_from_falls_back_to_defaults() {
        let configs = ConfigService::new(MapStore::default());
        assert_eq!(SessionConfig::load_from(&configs), SessionConfig::default());
    }

    #[test]
    fn load_from_round_trips_and_normalizes() {
        let configs = ConfigService::new(MapStore::default());
        let saved = SessionConfig {
            debounce_ms: 250,
            interactive_cap: 0,
            ..SessionConfig::default()
        };
        configs
            .save(SessionConfig::CONFIG_KEY, &saved)
            .expect("save");
        let loaded = SessionConfig::load_from(&configs);
        assert_eq!(loaded.debounce_ms, 250);
        // Zero caps are clamped on the way in.
        assert_eq!(loaded.interactive_cap, 1);
    }

    #[test]
    fn defaults_are_sane() {
        let config = SessionConfig::default();
        assert!(config.auto_capture);
        assert!(config.debounce() < config.restore_guard());
    }

    #[test]
    fn normalized_floors_caps() {
        let config = SessionConfig {
            interactive_cap: 0,
            programmatic_cap: 0,
            ..SessionConfig::default()
        }
        .normalized();
        assert_eq!(config.interactive_cap, 1);
        assert_eq!(config.programmatic_cap, 1);
    }
}
