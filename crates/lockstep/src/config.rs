//! Engine configuration loaded from a JSON file.
//!
//! Every field has a default, so a partial file (or none at all) is fine.
//! The engine only ever reads the values, and rooms get them by value
//! through [`EngineConfig::race_config`] and friends.

use std::path::{Path, PathBuf};
use std::time::Duration;
use std::{env, fs, io};

use lockstep_match::MatchRoomConfig;
use lockstep_race::{IdlePolicy, RaceConfig};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Default location on disk of the engine configuration.
const DEFAULT_CONFIG_PATH: &str = "config/lockstep.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "LOCKSTEP_CONFIG_PATH";

/// Errors from [`EngineConfig::from_path`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Timing and policy knobs for races and matches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub countdown_secs: u64,
    pub unpause_countdown_secs: u64,
    /// The last this-many seconds of a countdown are announced one by one.
    pub incremental_countdown_start: u32,
    /// Correction window between a race completing and being recorded.
    pub finalize_secs: u64,
    pub no_entrants_warning_secs: u64,
    pub no_entrants_cleanup_secs: u64,
    pub require_at_least_two: bool,
    pub match_first_warning_mins: u64,
    pub match_final_warning_mins: u64,
    /// Announce the final match warning outside the match room too.
    pub public_match_alerts: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            countdown_secs: 10,
            unpause_countdown_secs: 3,
            incremental_countdown_start: 3,
            finalize_secs: 30,
            no_entrants_warning_secs: 90,
            no_entrants_cleanup_secs: 180,
            require_at_least_two: true,
            match_first_warning_mins: 15,
            match_final_warning_mins: 5,
            public_match_alerts: true,
        }
    }
}

impl EngineConfig {
    /// Load the configuration from disk, falling back to the built-in
    /// defaults when the file is missing or unusable.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match Self::from_path(&path) {
            Ok(config) => {
                info!(path = %path.display(), "loaded engine config");
                config
            }
            Err(ConfigError::Read { source, .. }) if source.kind() == io::ErrorKind::NotFound => {
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
                    "failed to load config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// Strict variant of [`EngineConfig::load`] for a specific file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    fn from_json(contents: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(contents)
    }

    /// Race timings for standalone race rooms.
    pub fn race_config(&self) -> RaceConfig {
        RaceConfig {
            countdown: Duration::from_secs(self.countdown_secs),
            unpause_countdown: Duration::from_secs(self.unpause_countdown_secs),
            incremental_countdown_start: self.incremental_countdown_start,
            finalize_delay: Duration::from_secs(self.finalize_secs),
            auto_forfeit_last_racer: false,
            require_at_least_two: self.require_at_least_two,
        }
    }

    /// Match room settings. The match room applies the match race policy
    /// on top of [`EngineConfig::race_config`] itself.
    pub fn match_room_config(&self) -> MatchRoomConfig {
        MatchRoomConfig {
            race: self.race_config(),
            first_warning: Duration::from_secs(self.match_first_warning_mins.saturating_mul(60)),
            final_warning: Duration::from_secs(self.match_final_warning_mins.saturating_mul(60)),
            public_alerts: self.public_match_alerts,
        }
    }

    pub fn idle_policy(&self) -> IdlePolicy {
        IdlePolicy {
            warn_after: Duration::from_secs(self.no_entrants_warning_secs),
            close_after: Duration::from_secs(self.no_entrants_cleanup_secs),
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
