use serde::{Deserialize, Serialize};

/// Whether `add_part` trusts the caller to have checked placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AddPolicy {
    /// Insert without re-checking slots or occlusion.
    #[default]
    Trust,
    /// Re-run the placement check and reject conflicting parts.
    Validate,
}

/// Engine-wide behavior switches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MultipartConfig {
    pub add_policy: AddPolicy,
    /// Send the whole part table to mirrors when a representation migrates
    /// while a part is being added.
    pub broadcast_full_resync_on_migration: bool,
}

impl Default for MultipartConfig {
    fn default() -> Self {
        Self {
            add_policy: AddPolicy::Trust,
            broadcast_full_resync_on_migration: true,
        }
    }
}
