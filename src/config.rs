//! `hugo-manager.toml`: per-project settings for the web UI and the Hugo
//! server it supervises.
//!
//! ```toml
//! [server]
//! port = 8080
//!
//! [hugo]
//! port = 1313
//! disable_fast_render = true
//! additional_args = ["--bind", "0.0.0.0"]
//! grace_period = "2s"
//! ```

use crate::Result;
use crate::error::{ConfigError, FileError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_FILE_NAME: &str = "hugo-manager.toml";

/// Older installs kept their settings here. It is detected but never parsed.
pub const LEGACY_CONFIG_FILE_NAME: &str = "hugo-manager.yaml";

const HEADER: &str = "# hugo-manager configuration\n\
# Durations accept humantime values such as \"500ms\", \"2s\" or \"1m\".\n\n";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerToml {
    pub server: ServerConfig,
    pub hugo: HugoConfig,
    #[serde(skip)]
    pub path: Option<PathBuf>,
}

/// The web interface served by hugo-manager itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
    pub bind: String,
    /// Allowed CORS origins; `"*"` allows any.
    pub cors_origins: Vec<String>,
    /// Number of recent log lines sent to a viewer when it connects.
    pub log_lines: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            bind: "127.0.0.1".to_string(),
            cors_origins: vec!["*".to_string()],
            log_lines: 100,
        }
    }
}

/// The supervised `hugo server` process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HugoConfig {
    pub binary: String,
    pub port: u16,
    pub auto_start: bool,
    pub disable_fast_render: bool,
    /// Passed through verbatim after the generated flags.
    pub additional_args: Vec<String>,
    pub log_capacity: usize,
    pub subscriber_capacity: usize,
    /// Fallback delay before a starting server is considered running.
    pub grace_period: String,
    /// Pause between stopping and starting during a restart.
    pub restart_delay: String,
}

impl Default for HugoConfig {
    fn default() -> Self {
        Self {
            binary: "hugo".to_string(),
            port: 1313,
            auto_start: true,
            disable_fast_render: true,
            additional_args: vec!["--bind".to_string(), "0.0.0.0".to_string()],
            log_capacity: crate::log_buffer::DEFAULT_CAPACITY,
            subscriber_capacity: crate::log_buffer::DEFAULT_SUBSCRIBER_CAPACITY,
            grace_period: "2s".to_string(),
            restart_delay: "500ms".to_string(),
        }
    }
}

impl HugoConfig {
    pub fn grace_period(&self) -> Duration {
        parse_duration(&self.grace_period).unwrap_or(Duration::from_secs(2))
    }

    pub fn restart_delay(&self) -> Duration {
        parse_duration(&self.restart_delay).unwrap_or(Duration::from_millis(500))
    }

    fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.binary.trim().is_empty() {
            return Err(ConfigError::invalid("hugo.binary", "cannot be empty"));
        }
        if self.port == 0 {
            return Err(ConfigError::invalid("hugo.port", "must be greater than 0"));
        }
        if self.log_capacity == 0 {
            return Err(ConfigError::invalid(
                "hugo.log_capacity",
                "must be greater than 0",
            ));
        }
        if self.subscriber_capacity == 0 {
            return Err(ConfigError::invalid(
                "hugo.subscriber_capacity",
                "must be greater than 0",
            ));
        }
        for (field, value) in [
            ("hugo.grace_period", &self.grace_period),
            ("hugo.restart_delay", &self.restart_delay),
        ] {
            if parse_duration(value).is_none() {
                return Err(ConfigError::invalid(
                    field,
                    format!("'{value}' is not a duration (try \"2s\" or \"500ms\")"),
                ));
            }
        }
        Ok(())
    }
}

fn parse_duration(s: &str) -> Option<Duration> {
    humantime::parse_duration(s.trim()).ok()
}

impl ManagerToml {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path: Some(path),
            ..Default::default()
        }
    }

    pub fn path_for(project_dir: &Path) -> PathBuf {
        project_dir.join(CONFIG_FILE_NAME)
    }

    /// Load the config from a project directory, falling back to defaults
    /// when no file exists.
    pub fn load(project_dir: &Path) -> Result<Self> {
        if let Some(legacy) = Self::ignored_legacy_config(project_dir) {
            warn!(
                "{} is not read; move its settings to {CONFIG_FILE_NAME}",
                legacy.display()
            );
        }
        Self::read(Self::path_for(project_dir))
    }

    /// The legacy YAML config, if the project still has one lying around.
    pub fn ignored_legacy_config(project_dir: &Path) -> Option<PathBuf> {
        let path = project_dir.join(LEGACY_CONFIG_FILE_NAME);
        path.is_file().then_some(path)
    }

    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            debug!("no config at {}, using defaults", path.display());
            return Ok(Self::new(path.to_path_buf()));
        }
        let raw = std::fs::read_to_string(path).map_err(|e| FileError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::parse_str(&raw, path)
    }

    pub fn parse_str(content: &str, path: &Path) -> Result<Self> {
        let mut config: Self = toml::from_str(content)
            .map_err(|e| ConfigError::from_toml_error(path, content.to_string(), e))?;
        config.validate()?;
        config.path = Some(path.to_path_buf());
        Ok(config)
    }

    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::invalid("server.port", "must be greater than 0"));
        }
        if self.server.bind.trim().is_empty() {
            return Err(ConfigError::invalid("server.bind", "cannot be empty"));
        }
        self.hugo.validate()
    }

    pub fn write(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Err(miette::miette!("no config path set"));
        };
        let raw = toml::to_string(self).map_err(|e| FileError::WriteError {
            path: path.clone(),
            details: Some(format!("serialization failed: {e}")),
        })?;
        xx::file::write(path, format!("{HEADER}{raw}")).map_err(|e| FileError::WriteError {
            path: path.clone(),
            details: Some(e.to_string()),
        })?;
        info!("wrote {}", path.display());
        Ok(())
    }
}
