use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Where producer state is persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    #[serde(default = "d_state_path")]
    pub state_path: PathBuf,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            state_path: d_state_path(),
        }
    }
}

fn d_state_path() -> PathBuf {
    PathBuf::from("./state")
}
