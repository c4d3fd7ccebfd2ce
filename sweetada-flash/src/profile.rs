// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! Target profiles for OpenOCD downloads.  A profile is a JSON file holding
//! the target specific parts of a download, for example halting every core
//! of a multi-core part before loading:
//!
//! ```json
//! {
//!     "description": "Dual core Cortex-M, halt both cores before loading",
//!     "pre_load": ["targets 1", "halt", "targets 0", "halt"],
//!     "settle_ms": 500,
//!     "thumb": true
//! }
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;
use sweetada_link::openocd::Download;

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Profile {
    #[serde(default)]
    pub description: Option<String>,

    /// Commands run after the command file and command list, before loading
    #[serde(default)]
    pub pre_load: Vec<String>,

    /// Pause after the pre-load commands, in milliseconds
    #[serde(default)]
    pub settle_ms: Option<u64>,

    /// Commands run after the kernel has been started
    #[serde(default)]
    pub post_load: Vec<String>,

    /// Start addresses are ARM Thumb symbols
    #[serde(default)]
    pub thumb: bool,
}

impl Profile {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read profile {}", path.display()))?;
        let profile: Profile = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse JSON in: {}", path.display()))?;
        if let Some(description) = &profile.description {
            log::info!("Profile {}: {}", path.display(), description);
        }
        Ok(profile)
    }

    pub fn apply(&self, download: &mut Download) {
        download.pre_load.extend(self.pre_load.iter().cloned());
        download.settle = self.settle_ms.map(Duration::from_millis);
        download.post_load.extend(self.post_load.iter().cloned());
    }
}
