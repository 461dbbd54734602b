//! Settings file, overrides, and the immutable per-generation [`PollConfig`].
//!
//! Resolution order, lowest to highest priority:
//!
//! 1. built-in defaults
//! 2. `<config_dir>/gh-notify/config.toml`
//! 3. the `GITHUB_TOKEN` environment variable (token only)
//! 4. command-line flags
//!
//! A running poller never sees these settings change.  When the token is
//! edited the caller builds a new [`PollConfig`] and restarts the poller.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const DEFAULT_API_BASE: &str = "https://api.github.com";
pub const DEFAULT_LOOKBACK_DAYS: u64 = 10;
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_PERIOD_SECS: u64 = 30;
pub const MAX_LOOKBACK_DAYS: u64 = 365;

const SECS_PER_DAY: u64 = 24 * 60 * 60;

/// Environment variable whose token replaces the one in the file.
/// Only a `--token` flag takes precedence over it.
pub const TOKEN_ENV: &str = "GITHUB_TOKEN";

/// On-disk settings (`config.toml`).
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub token: String,
    pub lookback_days: u64,
    pub timeout_secs: u64,
    pub period_secs: u64,
    pub api_base: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            token: String::new(),
            lookback_days: DEFAULT_LOOKBACK_DAYS,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            period_secs: DEFAULT_PERIOD_SECS,
            api_base: DEFAULT_API_BASE.to_string(),
        }
    }
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("token", &redact(&self.token))
            .field("lookback_days", &self.lookback_days)
            .field("timeout_secs", &self.timeout_secs)
            .field("period_secs", &self.period_secs)
            .field("api_base", &self.api_base)
            .finish()
    }
}

/// Command-line values that take precedence over the file.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub token: Option<String>,
    pub lookback_days: Option<u64>,
    pub timeout_secs: Option<u64>,
    pub period_secs: Option<u64>,
}

impl Settings {
    /// Default location of the settings file.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("gh-notify")
            .join("config.toml")
    }

    /// Load settings from `path`, falling back to defaults when the file
    /// does not exist yet.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no settings file, using defaults");
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let settings = toml::from_str(&text)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        Ok(settings)
    }

    /// Write settings to `path`, creating parent directories as needed.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let text = toml::to_string_pretty(self).context("failed to serialize settings")?;
        std::fs::write(path, text).with_context(|| format!("failed to write {}", path.display()))?;
        tracing::info!(path = %path.display(), "settings saved");
        Ok(())
    }

    /// Replace the file token with a non-blank environment token.
    pub fn apply_env_token(&mut self, env_token: Option<String>) {
        if let Some(token) = env_token.filter(|t| !t.trim().is_empty()) {
            self.token = token;
        }
    }

    pub fn apply_overrides(&mut self, overrides: &Overrides) {
        if let Some(token) = &overrides.token {
            self.token = token.clone();
        }
        if let Some(days) = overrides.lookback_days {
            self.lookback_days = days;
        }
        if let Some(secs) = overrides.timeout_secs {
            self.timeout_secs = secs;
        }
        if let Some(secs) = overrides.period_secs {
            self.period_secs = secs;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.token.trim().is_empty() {
            return Err(ConfigError::MissingToken);
        }
        if self.lookback_days < 1 {
            return Err(ConfigError::TooSmall {
                field: "lookback_days",
                min: 1,
            });
        }
        if self.lookback_days > MAX_LOOKBACK_DAYS {
            return Err(ConfigError::TooLarge {
                field: "lookback_days",
                max: MAX_LOOKBACK_DAYS,
            });
        }
        if self.timeout_secs < 1 {
            return Err(ConfigError::TooSmall {
                field: "timeout_secs",
                min: 1,
            });
        }
        if self.period_secs < 1 {
            return Err(ConfigError::TooSmall {
                field: "period_secs",
                min: 1,
            });
        }
        if self.timeout_secs > self.period_secs {
            return Err(ConfigError::TimeoutExceedsPeriod {
                timeout_secs: self.timeout_secs,
                period_secs: self.period_secs,
            });
        }
        Ok(())
    }

    /// Validate and freeze into the configuration a generation runs with.
    pub fn to_poll_config(&self) -> Result<PollConfig, ConfigError> {
        self.validate()?;
        Ok(PollConfig {
            token: self.token.trim().to_string(),
            lookback: Duration::from_secs(self.lookback_days.saturating_mul(SECS_PER_DAY)),
            timeout: Duration::from_secs(self.timeout_secs),
            period: Duration::from_secs(self.period_secs),
            api_base: self.api_base.trim_end_matches('/').to_string(),
        })
    }
}

/// Configuration of one poller generation.  Never mutated once built.
#[derive(Clone, PartialEq, Eq)]
pub struct PollConfig {
    pub token: String,
    /// How far back the source is asked to look.
    pub lookback: Duration,
    /// Upper bound for a single fetch.
    pub timeout: Duration,
    /// Pause between the end of one cycle and the start of the next.
    pub period: Duration,
    pub api_base: String,
}

impl PollConfig {
    /// Lower bound passed to the source as `since`.  Clamps to the earliest
    /// representable instant instead of overflowing.
    pub fn since(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        chrono::Duration::from_std(self.lookback)
            .ok()
            .and_then(|lookback| now.checked_sub_signed(lookback))
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }
}

impl fmt::Debug for PollConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PollConfig")
            .field("token", &redact(&self.token))
            .field("lookback", &self.lookback)
            .field("timeout", &self.timeout)
            .field("period", &self.period)
            .field("api_base", &self.api_base)
            .finish()
    }
}

fn redact(token: &str) -> &'static str {
    if token.is_empty() {
        "<unset>"
    } else {
        "<redacted>"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn with_token() -> Settings {
        Settings {
            token: "ghp_example".into(),
            ..Settings::default()
        }
    }

    #[test]
    fn defaults_match_documented_values() {
        let s = Settings::default();
        assert_eq!(s.lookback_days, 10);
        assert_eq!(s.timeout_secs, 10);
        assert_eq!(s.period_secs, 30);
        assert_eq!(s.api_base, "https://api.github.com");
        assert!(s.token.is_empty());
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let s: Settings = toml::from_str("token = \"abc\"\nperiod_secs = 60\n").unwrap();
        assert_eq!(s.token, "abc");
        assert_eq!(s.period_secs, 60);
        assert_eq!(s.timeout_secs, DEFAULT_TIMEOUT_SECS);
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let s = Settings::load(&dir.path().join("nope.toml")).unwrap();
        assert_eq!(s, Settings::default());
    }

    #[test]
    fn save_then_load_preserves_settings() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut s = with_token();
        s.period_secs = 45;
        s.save(&path).unwrap();

        assert_eq!(Settings::load(&path).unwrap(), s);
    }

    #[test]
    fn env_token_beats_file_token() {
        let mut s: Settings = toml::from_str("token = \"from-file\"\n").unwrap();
        s.apply_env_token(Some("from-env".into()));
        assert_eq!(s.token, "from-env");

        let mut s = Settings::default();
        s.apply_env_token(Some("from-env".into()));
        assert_eq!(s.token, "from-env");

        let mut s = with_token();
        s.apply_env_token(Some("   ".into()));
        assert_eq!(s.token, "ghp_example", "blank env value is ignored");

        let mut s = with_token();
        s.apply_env_token(None);
        assert_eq!(s.token, "ghp_example");
    }

    #[test]
    fn cli_token_beats_env_token() {
        let mut s = with_token();
        s.apply_env_token(Some("from-env".into()));
        s.apply_overrides(&Overrides {
            token: Some("from-cli".into()),
            ..Overrides::default()
        });
        assert_eq!(s.token, "from-cli");
    }

    #[test]
    fn overrides_win_over_file_values() {
        let mut s = with_token();
        s.apply_overrides(&Overrides {
            token: Some("cli".into()),
            period_secs: Some(120),
            ..Overrides::default()
        });
        assert_eq!(s.token, "cli");
        assert_eq!(s.period_secs, 120);
        assert_eq!(s.timeout_secs, DEFAULT_TIMEOUT_SECS);
    }

    #[test]
    fn validation_rejects_bad_values() {
        assert_eq!(
            Settings::default().validate(),
            Err(ConfigError::MissingToken)
        );

        let mut s = with_token();
        s.period_secs = 0;
        assert_eq!(
            s.validate(),
            Err(ConfigError::TooSmall {
                field: "period_secs",
                min: 1
            })
        );

        let mut s = with_token();
        s.timeout_secs = 60;
        s.period_secs = 30;
        assert_eq!(
            s.validate(),
            Err(ConfigError::TimeoutExceedsPeriod {
                timeout_secs: 60,
                period_secs: 30
            })
        );
    }

    #[test]
    fn lookback_is_bounded() {
        let mut s = with_token();
        s.lookback_days = MAX_LOOKBACK_DAYS;
        assert!(s.to_poll_config().is_ok());

        s.lookback_days = 100_000_000;
        assert_eq!(
            s.to_poll_config(),
            Err(ConfigError::TooLarge {
                field: "lookback_days",
                max: MAX_LOOKBACK_DAYS
            })
        );
    }

    #[test]
    fn since_clamps_instead_of_overflowing() {
        let mut cfg = with_token().to_poll_config().unwrap();
        cfg.lookback = Duration::from_secs(100_000_000 * SECS_PER_DAY);
        assert_eq!(cfg.since(Utc::now()), DateTime::<Utc>::MIN_UTC);
    }

    #[test]
    fn poll_config_converts_units() {
        let mut s = with_token();
        s.api_base = "http://localhost:8080/".into();
        let cfg = s.to_poll_config().unwrap();

        assert_eq!(cfg.timeout, Duration::from_secs(10));
        assert_eq!(cfg.period, Duration::from_secs(30));
        assert_eq!(cfg.lookback, Duration::from_secs(10 * 86_400));
        assert_eq!(cfg.api_base, "http://localhost:8080");

        let now = Utc.with_ymd_and_hms(2025, 3, 11, 0, 0, 0).unwrap();
        assert_eq!(
            cfg.since(now),
            Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn debug_output_hides_token() {
        let s = with_token();
        let cfg = s.to_poll_config().unwrap();
        assert!(!format!("{s:?}").contains("ghp_example"));
        assert!(!format!("{cfg:?}").contains("ghp_example"));
    }
}
