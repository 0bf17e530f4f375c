use std::time::Duration;

use serde::{Deserialize, Serialize};

/// OAuth scope: per-file access to files this app created
pub const DRIVE_SCOPE: &str = "https://www.googleapis.com/auth/drive.file";

pub const DEFAULT_FOLDER_NAME: &str = "Cornell Notes";
pub const DEFAULT_FILE_NAME: &str = "app-data.cornell";

/// Sync tuning, stored under `[sync]` in `config.toml`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SyncSettings {
    /// Remote folder holding the data document
    pub folder_name: String,
    /// Name of the data document
    pub file_name: String,
    /// How long "Saved" stays visible before reverting to idle
    pub saved_display_ms: u64,
    /// How long saves stay suppressed after a sync finished
    pub sync_grace_ms: u64,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            folder_name: DEFAULT_FOLDER_NAME.to_string(),
            file_name: DEFAULT_FILE_NAME.to_string(),
            saved_display_ms: 2000,
            sync_grace_ms: 100,
        }
    }
}

impl SyncSettings {
    pub fn saved_display(&self) -> Duration {
        Duration::from_millis(self.saved_display_ms)
    }

    pub fn sync_grace(&self) -> Duration {
        Duration::from_millis(self.sync_grace_ms)
    }
}

/// Save indicator state
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SavingStatus {
    #[default]
    Idle,
    Saving,
    Saved,
    Error,
}

/// Snapshot of the save/sync state
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SaveStatus {
    pub status: SavingStatus,
    pub has_unsaved_changes: bool,
    pub is_syncing: bool,
    pub signed_in: bool,
    /// Message of the last failed save, cleared by the next attempt
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SaveStatus {
    /// Indicator text, or `None` when idle with nothing pending
    pub fn indicator(&self) -> Option<&'static str> {
        match self.status {
            SavingStatus::Idle if self.has_unsaved_changes => Some("Unsaved changes"),
            SavingStatus::Idle => None,
            SavingStatus::Saving => Some("Saving..."),
            SavingStatus::Saved => Some("Saved"),
            SavingStatus::Error => Some("Error saving"),
        }
    }
}
