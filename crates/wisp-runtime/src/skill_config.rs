//! Named skill configuration records with compare-and-swap updates.

use parking_lot::Mutex;
use std::collections::BTreeMap;
use tracing::trace;
use wisp_types::SkillConfig;

/// Shared store of [`SkillConfig`] records.
///
/// Scripts can only change a record with [`cas`](Self::cas), which gives
/// them an optimistic update loop: read, compute, swap, retry on `false`.
#[derive(Debug, Default)]
pub struct SkillConfigStore {
    configs: Mutex<BTreeMap<String, SkillConfig>>,
}

impl SkillConfigStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<SkillConfig> {
        self.configs.lock().get(name).cloned()
    }

    /// Stores `new` iff the current value equals `expected`, where `None`
    /// means the record must not exist yet.
    pub fn cas(&self, name: &str, expected: Option<&SkillConfig>, new: SkillConfig) -> bool {
        let mut configs = self.configs.lock();
        if configs.get(name) != expected {
            trace!(skill = name, "skill config swap lost");
            return false;
        }
        configs.insert(name.to_string(), new);
        true
    }

    /// Unconditional write, for administrators.
    pub fn set(&self, name: &str, config: SkillConfig) {
        self.configs.lock().insert(name.to_string(), config);
    }

    #[must_use]
    pub fn all(&self) -> BTreeMap<String, SkillConfig> {
        self.configs.lock().clone()
    }

    pub fn restore(&self, configs: BTreeMap<String, SkillConfig>) {
        *self.configs.lock() = configs;
    }
}
