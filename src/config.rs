use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Deserialize;

pub const DEFAULT_REGION: &str = "us-east-2";

/// `config.yaml`: the profile and region lists to fan out over, plus an
/// optional cache directory override.
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub profiles: Vec<String>,
    #[serde(default)]
    pub regions: Vec<String>,
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, anyhow::Error> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        serde_yaml::from_str(&raw).with_context(|| format!("parsing config file {}", path.display()))
    }

    /// A `--profile` flag replaces the configured list with a singleton.
    pub fn resolve_profiles(&self, flag: Option<&str>) -> Vec<String> {
        match flag {
            Some(profile) => vec![profile.to_owned()],
            None => self.profiles.clone(),
        }
    }

    /// A `--region` flag replaces the configured list; with neither, fall back
    /// to the default region.
    pub fn resolve_regions(&self, flag: Option<&str>) -> Vec<String> {
        match flag {
            Some(region) => vec![region.to_owned()],
            None if self.regions.is_empty() => vec![DEFAULT_REGION.to_owned()],
            None => self.regions.clone(),
        }
    }
}
