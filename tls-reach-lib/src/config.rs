//! Configuration file parsing and management.
//!
//! This module handles loading configuration from TOML files and `TR_*`
//! environment variables, and merging them with proper precedence rules.

use crate::error::ReachError;
use crate::types::{CheckConfig, MAX_PARALLELISM};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

/// Configuration loaded from TOML files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct FileConfig {
    /// Default values for CLI options
    #[serde(skip_serializing_if = "Option::is_none")]
    pub defaults: Option<DefaultsConfig>,
}

/// Default configuration values that map to CLI options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct DefaultsConfig {
    /// Per-address timeout (e.g. "250ms", "2s", or bare milliseconds)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<String>,

    /// Number of concurrent workers
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parallel: Option<usize>,

    /// Port to probe
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,

    /// Allow-list file
    #[serde(skip_serializing_if = "Option::is_none")]
    pub networks: Option<PathBuf>,
}

impl FileConfig {
    /// Overlay the values set in this file onto `config`.
    pub fn apply_to(&self, mut config: CheckConfig) -> CheckConfig {
        let Some(defaults) = &self.defaults else {
            return config;
        };

        if let Some(timeout) = defaults.timeout.as_deref().and_then(parse_timeout) {
            config.timeout = timeout;
        }
        if let Some(parallel) = defaults.parallel {
            config = config.with_parallelism(parallel);
        }
        if let Some(port) = defaults.port {
            config.port = port;
        }
        if let Some(networks) = &defaults.networks {
            config.networks_file = Some(networks.clone());
        }

        config
    }
}

/// Configuration discovery and loading functionality.
pub struct ConfigManager {
    /// Whether to report which config files were used
    pub verbose: bool,
}

impl ConfigManager {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }

    /// Load configuration from a specific file.
    ///
    /// A relative `networks` path is taken relative to the directory of the
    /// config file, not the working directory.
    pub fn load_file<P: AsRef<Path>>(&self, path: P) -> Result<FileConfig, ReachError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ReachError::file_error(
                path.to_string_lossy(),
                "Configuration file not found",
            ));
        }

        let content = fs::read_to_string(path).map_err(|e| {
            ReachError::file_error(
                path.to_string_lossy(),
                format!("Failed to read configuration file: {}", e),
            )
        })?;

        let mut config: FileConfig = toml::from_str(&content).map_err(|e| {
            ReachError::config(format!("Failed to parse TOML configuration: {}", e))
        })?;

        self.validate_config(&config)?;

        if let Some(defaults) = config.defaults.as_mut() {
            if let (Some(networks), Some(dir)) = (defaults.networks.as_mut(), path.parent()) {
                if networks.is_relative() {
                    *networks = dir.join(&*networks);
                }
            }
        }

        debug!("loaded config file {}", path.display());
        Ok(config)
    }

    /// Discover and load configuration files in precedence order.
    ///
    /// XDG config is the lowest, then the home directory, then the current
    /// directory. Files that fail to load are skipped with a warning.
    pub fn discover_and_load(&self) -> Result<FileConfig, ReachError> {
        let mut merged_config = FileConfig::default();
        let mut loaded_files = Vec::new();

        let candidates = [
            self.get_xdg_config_path(),
            self.get_global_config_path(),
            self.get_local_config_path(),
        ];

        for path in candidates.into_iter().flatten() {
            match self.load_file(&path) {
                Ok(config) => {
                    merged_config = self.merge_configs(merged_config, config);
                    loaded_files.push(path);
                }
                Err(e) => warn!("ignoring config file {}: {}", path.display(), e),
            }
        }

        if self.verbose && loaded_files.len() > 1 {
            let listed: Vec<String> = loaded_files
                .iter()
                .map(|path| path.display().to_string())
                .collect();
            debug!(
                "multiple config files found, later ones win: {}",
                listed.join(", ")
            );
        }

        Ok(merged_config)
    }

    fn get_local_config_path(&self) -> Option<PathBuf> {
        ["./tls-reach.toml", "./.tls-reach.toml"]
            .iter()
            .map(PathBuf::from)
            .find(|path| path.exists())
    }

    fn get_global_config_path(&self) -> Option<PathBuf> {
        let path = Path::new(&env::var_os("HOME")?).join(".tls-reach.toml");
        path.exists().then_some(path)
    }

    /// `$XDG_CONFIG_HOME/tls-reach/config.toml`, falling back to `~/.config`.
    fn get_xdg_config_path(&self) -> Option<PathBuf> {
        let config_dir = env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| env::var_os("HOME").map(|home| Path::new(&home).join(".config")))?;

        let path = config_dir.join("tls-reach").join("config.toml");
        path.exists().then_some(path)
    }

    /// Merge two configurations. Values from `higher` take precedence.
    pub fn merge_configs(&self, lower: FileConfig, higher: FileConfig) -> FileConfig {
        let defaults = match (lower.defaults, higher.defaults) {
            (Some(lower), Some(higher)) => Some(DefaultsConfig {
                timeout: higher.timeout.or(lower.timeout),
                parallel: higher.parallel.or(lower.parallel),
                port: higher.port.or(lower.port),
                networks: higher.networks.or(lower.networks),
            }),
            (lower, higher) => higher.or(lower),
        };

        FileConfig { defaults }
    }

    fn validate_config(&self, config: &FileConfig) -> Result<(), ReachError> {
        let Some(defaults) = &config.defaults else {
            return Ok(());
        };

        if let Some(parallel) = defaults.parallel {
            if parallel == 0 || parallel > MAX_PARALLELISM {
                return Err(ReachError::config(format!(
                    "parallel must be between 1 and {}",
                    MAX_PARALLELISM
                )));
            }
        }

        if let Some(timeout) = &defaults.timeout {
            if parse_timeout(timeout).is_none() {
                return Err(ReachError::config(format!(
                    "Invalid timeout format '{}'. Use format like '500ms', '2s', '1m'",
                    timeout
                )));
            }
        }

        if defaults.port == Some(0) {
            return Err(ReachError::config("port must not be 0"));
        }

        Ok(())
    }
}

/// Settings read from `TR_*` environment variables.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnvConfig {
    pub timeout: Option<Duration>,
    pub parallel: Option<usize>,
    pub port: Option<u16>,
    pub networks: Option<PathBuf>,
    pub config: Option<PathBuf>,
}

impl EnvConfig {
    /// Overlay the values set in the environment onto `config`.
    pub fn apply_to(&self, mut config: CheckConfig) -> CheckConfig {
        if let Some(timeout) = self.timeout {
            config.timeout = timeout;
        }
        if let Some(parallel) = self.parallel {
            config = config.with_parallelism(parallel);
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(networks) = &self.networks {
            config.networks_file = Some(networks.clone());
        }
        config
    }
}

/// Load configuration from the process environment.
///
/// Invalid values are ignored, and reported when `verbose` is set.
pub fn load_env_config(verbose: bool) -> EnvConfig {
    env_config_from(|key| env::var(key).ok(), verbose)
}

/// Build an [`EnvConfig`] from an arbitrary variable lookup.
pub fn env_config_from<F>(lookup: F, verbose: bool) -> EnvConfig
where
    F: Fn(&str) -> Option<String>,
{
    let mut env_config = EnvConfig::default();
    let reject = |key: &str, val: &str, expected: &str| {
        if verbose {
            warn!("Invalid {}='{}', {}", key, val, expected);
        }
    };

    if let Some(val) = lookup("TR_TIMEOUT") {
        match parse_timeout(&val) {
            Some(timeout) => {
                debug!("using TR_TIMEOUT={}", val);
                env_config.timeout = Some(timeout);
            }
            None => reject("TR_TIMEOUT", &val, "use format like '500ms', '2s', '1m'"),
        }
    }

    if let Some(val) = lookup("TR_PARALLEL") {
        match val.trim().parse::<usize>() {
            Ok(parallel) if (1..=MAX_PARALLELISM).contains(&parallel) => {
                debug!("using TR_PARALLEL={}", parallel);
                env_config.parallel = Some(parallel);
            }
            _ => reject("TR_PARALLEL", &val, "must be 1-1000"),
        }
    }

    if let Some(val) = lookup("TR_PORT") {
        match val.trim().parse::<u16>() {
            Ok(port) if port > 0 => {
                debug!("using TR_PORT={}", port);
                env_config.port = Some(port);
            }
            _ => reject("TR_PORT", &val, "must be 1-65535"),
        }
    }

    if let Some(val) = lookup("TR_NETWORKS") {
        if !val.trim().is_empty() {
            debug!("using TR_NETWORKS={}", val);
            env_config.networks = Some(PathBuf::from(val.trim()));
        }
    }

    if let Some(val) = lookup("TR_CONFIG") {
        if !val.trim().is_empty() {
            debug!("using TR_CONFIG={}", val);
            env_config.config = Some(PathBuf::from(val.trim()));
        }
    }

    env_config
}

/// Parse a timeout like "250ms", "2s", "1m" or bare milliseconds.
///
/// Zero is rejected.
pub fn parse_timeout(timeout_str: &str) -> Option<Duration> {
    let timeout_str = timeout_str.trim().to_lowercase();

    let timeout = if let Some(ms) = timeout_str.strip_suffix("ms") {
        Duration::from_millis(ms.trim().parse().ok()?)
    } else if let Some(secs) = timeout_str.strip_suffix('s') {
        Duration::from_secs(secs.trim().parse().ok()?)
    } else if let Some(mins) = timeout_str.strip_suffix('m') {
        Duration::from_secs(mins.trim().parse::<u64>().ok()?.checked_mul(60)?)
    } else {
        Duration::from_millis(timeout_str.parse().ok()?)
    };

    (!timeout.is_zero()).then_some(timeout)
}
