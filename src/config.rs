//! Engine configuration loading, covering deadlines and the idle sweep age.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};

/// Default location on disk where the engine looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/engine.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "KABADDI_ENGINE_CONFIG_PATH";

/// Immutable runtime configuration shared across the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// Deadline for each per-participant number solicitation.
    pub response_deadline: Duration,
    /// Deadline for the raiding captain to pick the round's raider.
    pub selection_deadline: Duration,
    /// Deadline for each of the two toss steps.
    pub toss_deadline: Duration,
    /// Age after which an unstarted lobby is discarded by the sweep.
    pub idle_timeout: Duration,
    /// Pause between consecutive rounds.
    pub inter_round_delay: Duration,
}

impl EngineConfig {
    /// Load the engine configuration from disk, falling back to defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let config: Self = raw.into();
                    info!(path = %path.display(), ?config, "loaded engine config");
                    config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            response_deadline: Duration::from_secs(15),
            selection_deadline: Duration::from_secs(10),
            toss_deadline: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(300),
            inter_round_delay: Duration::from_secs(2),
        }
    }
}

/// JSON representation of the configuration file, all values in seconds.
#[derive(Debug, Deserialize)]
struct RawConfig {
    response_deadline_secs: Option<u64>,
    selection_deadline_secs: Option<u64>,
    toss_deadline_secs: Option<u64>,
    idle_timeout_secs: Option<u64>,
    inter_round_delay_secs: Option<u64>,
}

impl From<RawConfig> for EngineConfig {
    fn from(raw: RawConfig) -> Self {
        let defaults = EngineConfig::default();
        let or_default = |secs: Option<u64>, fallback: Duration| {
            secs.map(Duration::from_secs).unwrap_or(fallback)
        };
        Self {
            response_deadline: or_default(raw.response_deadline_secs, defaults.response_deadline),
            selection_deadline: or_default(
                raw.selection_deadline_secs,
                defaults.selection_deadline,
            ),
            toss_deadline: or_default(raw.toss_deadline_secs, defaults.toss_deadline),
            idle_timeout: or_default(raw.idle_timeout_secs, defaults.idle_timeout),
            inter_round_delay: or_default(
                raw.inter_round_delay_secs,
                defaults.inter_round_delay,
            ),
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}
