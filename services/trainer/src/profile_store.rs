//! Durable storage for the clinic profile.
//!
//! The profile is written once by the `profile` subcommand (standing in for
//! a configuration screen) and read at session start. The session receives
//! the store as a dependency; nothing else reaches into the filesystem.

use anyhow::{Context, Result};
use intake_core::ClinicProfile;
use std::fs;
use std::path::PathBuf;

pub const PROFILE_FILE: &str = "clinic_profile.json";

pub trait ProfileStore {
    /// Returns the stored profile, or `None` when the clinic has not been
    /// configured yet.
    fn load(&self) -> Result<Option<ClinicProfile>>;

    fn save(&self, profile: &ClinicProfile) -> Result<()>;
}

pub struct JsonProfileStore {
    path: PathBuf,
}

impl JsonProfileStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// The fixed per-user location: `<config dir>/intake-trainer/clinic_profile.json`.
    pub fn default_location() -> Result<Self> {
        let dir = dirs::config_dir()
            .context("No user configuration directory available")?
            .join("intake-trainer");
        Ok(Self::new(dir.join(PROFILE_FILE)))
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }
}

impl ProfileStore for JsonProfileStore {
    fn load(&self) -> Result<Option<ClinicProfile>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let raw = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read {}", self.path.display()))?;
        let profile = serde_json::from_str(&raw)
            .with_context(|| format!("{} is not a valid clinic profile", self.path.display()))?;
        Ok(Some(profile))
    }

    fn save(&self, profile: &ClinicProfile) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let raw = serde_json::to_string_pretty(profile)?;
        fs::write(&self.path, raw)
            .with_context(|| format!("Failed to write {}", self.path.display()))?;
        Ok(())
    }
}
