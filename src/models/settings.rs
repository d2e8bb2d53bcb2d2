use serde::{Deserialize, Serialize};

use super::enums::{PersonalizationLevel, Tier};

/// Per-account AI behavior settings, fetched fresh on every pipeline
/// invocation and passed in explicitly so tests can inject arbitrary
/// values without mocking ambient state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiSettings {
    pub memory_enabled: bool,
    pub personalization_level: PersonalizationLevel,
}

impl Default for AiSettings {
    fn default() -> Self {
        Self {
            memory_enabled: false,
            personalization_level: PersonalizationLevel::Medium,
        }
    }
}

/// Account-level state read at the start of each chat turn. The tier is
/// billing-owned; the local row only mirrors it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountSettings {
    pub tier: Tier,
    pub ai: AiSettings,
}

impl Default for AccountSettings {
    fn default() -> Self {
        Self {
            tier: Tier::Free,
            ai: AiSettings::default(),
        }
    }
}
