use crate::host::HostEnv;
use crate::label_store::DEFAULT_CAPACITY;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const ENV_LOG_JSON: &str = "PY_PROVENANCE_LOG_JSON";
pub const ENV_SOURCE: &str = "PY_PROVENANCE_SOURCE";
pub const ENV_CONFIG: &str = "PY_PROVENANCE_CONFIG";

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Label store slots, rounded up to a power of two.
    pub table_capacity: usize,
    /// JSON log destination. Unset means standard error.
    pub log_path: Option<PathBuf>,
    /// Fixed source label instead of the argv-derived one.
    pub source: Option<String>,
    /// How many emitted events are remembered for duplicate suppression.
    pub dedup_window: usize,
    pub report_stats_on_drop: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            table_capacity: DEFAULT_CAPACITY,
            log_path: None,
            source: None,
            dedup_window: 1,
            report_stats_on_drop: true,
        }
    }
}

impl RuntimeConfig {
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        let config: RuntimeConfig = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {path}"))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_file(&self, path: &str) -> anyhow::Result<()> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {path}"))?;
        Ok(())
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.table_capacity == 0 {
            anyhow::bail!("table_capacity must be greater than zero");
        }
        if self.dedup_window == 0 {
            anyhow::bail!("dedup_window must be at least 1");
        }
        if let Some(source) = &self.source {
            if source.trim().is_empty() {
                anyhow::bail!("source must not be blank when set");
            }
        }
        Ok(())
    }

    /// Build the configuration the host environment asks for.
    ///
    /// An optional YAML file named by `PY_PROVENANCE_CONFIG` is read first;
    /// the log and source variables then fill whatever the file left unset.
    /// A broken file is reported and ignored.
    pub fn from_env(host: &dyn HostEnv) -> Self {
        let mut config = match non_empty_var(host, ENV_CONFIG) {
            Some(path) => match Self::from_file(&path) {
                Ok(config) => config,
                Err(e) => {
                    log::warn!("Ignoring provenance config: {e:#}");
                    Self::default()
                }
            },
            None => Self::default(),
        };

        if config.log_path.is_none() {
            config.log_path = non_empty_var(host, ENV_LOG_JSON).map(PathBuf::from);
        }
        if config.source.is_none() {
            config.source = non_empty_var(host, ENV_SOURCE);
        }
        config
    }
}

fn non_empty_var(host: &dyn HostEnv, name: &str) -> Option<String> {
    host.env_var(name).filter(|v| !v.is_empty())
}
