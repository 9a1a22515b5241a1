use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Operator preferences persisted between sessions.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Settings {
    pub last_workflow: Option<PathBuf>,
}

impl Settings {
    pub fn load(path: &Path) -> Self {
        std::fs::read_to_string(path)
            .ok()
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_default()
    }

    pub fn save(&self, path: &Path) {
        if let Ok(json) = serde_json::to_string_pretty(self) {
            let _ = std::fs::write(path, json);
        }
    }
}
