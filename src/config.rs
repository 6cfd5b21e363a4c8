// ⚙️ Job Configuration - defaults, optional TOML file, then environment
//
// Environment keys use the `LINKEDIN_ETL_` prefix and `__` for nesting,
// e.g. `LINKEDIN_ETL_MERGE__CONFLICT_POLICY=prefer_existing`.

use crate::error::{EtlError, Result};
use crate::merge::ConflictPolicy;
use crate::repair::RepairConfig;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_FILE: &str = "linkedin_etl.toml";
pub const ENV_PREFIX: &str = "LINKEDIN_ETL";

/// How a job treats series already on disk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobMode {
    /// Clear every exported series once, then reprocess all folders
    #[default]
    Rebuild,
    /// Keep existing series and merge new folders into them
    Append,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeSettings {
    pub conflict_policy: ConflictPolicy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EtlConfig {
    pub raw_dir: PathBuf,
    pub output_dir: PathBuf,
    pub mode: JobMode,
    pub merge: MergeSettings,
    pub repair: RepairConfig,
}

impl Default for EtlConfig {
    fn default() -> Self {
        EtlConfig {
            raw_dir: PathBuf::from("linkedin/data/raw/365d"),
            output_dir: PathBuf::from("linkedin/data/processed/365d"),
            mode: JobMode::default(),
            merge: MergeSettings::default(),
            repair: RepairConfig::default(),
        }
    }
}

impl EtlConfig {
    /// Layer defaults, the config file and the environment.
    ///
    /// An explicit `path` must exist; otherwise `linkedin_etl.toml` in the
    /// working directory is used when present.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let defaults = Config::try_from(&EtlConfig::default())?;

        let file = match path {
            Some(p) => File::from(p).required(true),
            None => File::from(Path::new(DEFAULT_CONFIG_FILE)).required(false),
        };

        let config: EtlConfig = Config::builder()
            .add_source(defaults)
            .add_source(file)
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.repair.window == 0 {
            return Err(EtlError::InvalidConfig {
                key: "repair.window".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================
