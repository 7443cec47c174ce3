//! Submitter configuration and release environment.
//!
//! Site constants live in an optional JSON file so a campaign can be re-run
//! elsewhere without code changes; every field has a default.
use crate::error::PreconditionError;
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const CONFIG_DIR_NAME: &str = "condval";
pub const CONFIG_FILE_NAME: &str = "config.json";

/// Site and submission constants shared by every campaign.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubmitterConfig {
    pub scram_arch: String,
    pub group: String,
    pub priority: u32,
    pub multicore: u32,
    /// Events per driver configuration (`-n`).
    pub events: u32,
    pub dqm_upload_url: String,
    pub dbs_url: String,
    /// Shell used to run recorded commands, split with shell-words.
    pub shell: String,
    pub script_name: String,
}

impl Default for SubmitterConfig {
    fn default() -> Self {
        Self {
            scram_arch: "slc7_amd64_gcc900".to_string(),
            group: "ppd".to_string(),
            priority: 900_000,
            multicore: 4,
            events: 100,
            dqm_upload_url: "https://cmsweb.cern.ch/dqm/relval".to_string(),
            dbs_url: "https://cmsweb.cern.ch/dbs/prod/global/DBSReader".to_string(),
            shell: "/bin/bash -c".to_string(),
            script_name: "cmsDrivers.sh".to_string(),
        }
    }
}

/// Default location: `<config_dir>/condval/config.json`.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
}

/// Load from `explicit`, else the default location if present, else defaults.
pub fn load_config(explicit: Option<&Path>) -> Result<SubmitterConfig> {
    let path = match explicit {
        Some(path) => Some(path.to_path_buf()),
        None => default_config_path().filter(|path| path.is_file()),
    };
    let config = match path {
        Some(path) => {
            let bytes = fs::read(&path).with_context(|| format!("read config {}", path.display()))?;
            tracing::debug!(path = %path.display(), "loaded submitter config");
            serde_json::from_slice(&bytes)
                .with_context(|| format!("parse config JSON {}", path.display()))?
        }
        None => SubmitterConfig::default(),
    };
    validate_config(&config)?;
    Ok(config)
}

pub fn validate_config(config: &SubmitterConfig) -> Result<()> {
    if config.priority == 0 {
        return Err(anyhow!("priority must be positive"));
    }
    if config.multicore == 0 {
        return Err(anyhow!("multicore must be positive"));
    }
    if config.events == 0 {
        return Err(anyhow!("events must be positive"));
    }
    if shell_words::split(&config.shell)
        .context("parse shell command")?
        .is_empty()
    {
        return Err(anyhow!("shell must be non-empty"));
    }
    if config.script_name.trim().is_empty() {
        return Err(anyhow!("script_name must be non-empty"));
    }
    Ok(())
}

/// Release area facts read from the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Environment {
    /// `CMSSW_VERSION`
    pub release: String,
    /// `CMSSW_BASE`
    pub release_base: Option<PathBuf>,
    /// `USER`
    pub user: String,
}

impl Environment {
    pub fn from_process() -> Result<Self, PreconditionError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, PreconditionError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let release = lookup("CMSSW_VERSION")
            .filter(|value| !value.trim().is_empty())
            .ok_or(PreconditionError::MissingEnv("CMSSW_VERSION"))?;
        Ok(Self {
            release,
            release_base: lookup("CMSSW_BASE")
                .filter(|value| !value.is_empty())
                .map(PathBuf::from),
            user: lookup("USER").unwrap_or_else(|| "unknown".to_string()),
        })
    }
}
