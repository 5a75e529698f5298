use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Largest deck the board will index
pub const MAX_DECK_SIZE: usize = 1 << 16;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub game: GameConfig,
    pub players: PlayersConfig,
    pub timing: TimingConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GameConfig {
    /// Board rows
    pub rows: usize,
    /// Board columns
    pub columns: usize,
    /// Values per feature; also the number of items in a set
    pub feature_size: usize,
    /// Features per item
    pub feature_count: usize,
    /// Seed for shuffles and autonomous play (entropy when unset)
    #[serde(default)]
    pub seed: Option<u64>,
    /// Publish every set on the board each tick
    #[serde(default)]
    pub hints: bool,
}

impl GameConfig {
    pub fn table_size(&self) -> usize {
        self.rows.saturating_mul(self.columns)
    }

    /// `feature_size ^ feature_count`, saturating at `usize::MAX`
    pub fn deck_size(&self) -> usize {
        u32::try_from(self.feature_count)
            .ok()
            .and_then(|count| self.feature_size.checked_pow(count))
            .unwrap_or(usize::MAX)
    }

    /// Items per claimed set
    pub fn set_size(&self) -> usize {
        self.feature_size
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlayersConfig {
    /// Agents driven by an external input source
    pub human: usize,
    /// Agents driven by a random companion generator
    pub autonomous: usize,
}

impl PlayersConfig {
    pub fn total(&self) -> usize {
        self.human + self.autonomous
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TimingConfig {
    /// Round length; a legal claim restarts it
    pub turn_timeout_ms: u64,
    /// Countdown is flagged as a warning below this
    pub turn_timeout_warning_ms: u64,
    /// Orchestrator tick; bounds claim validation latency
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,
    /// Freeze after a legal claim
    #[serde(default = "default_point_freeze_ms")]
    pub point_freeze_ms: u64,
    /// Freeze after an illegal claim
    #[serde(default = "default_penalty_freeze_ms")]
    pub penalty_freeze_ms: u64,
    /// Delay per card placed or removed
    #[serde(default)]
    pub table_delay_ms: u64,
    /// Pause between autonomous key presses
    #[serde(default = "default_autonomous_think_ms")]
    pub autonomous_think_ms: u64,
}

fn default_tick_ms() -> u64 {
    50
}

fn default_point_freeze_ms() -> u64 {
    1000
}

fn default_penalty_freeze_ms() -> u64 {
    3000
}

fn default_autonomous_think_ms() -> u64 {
    5
}

impl TimingConfig {
    pub fn turn_timeout(&self) -> Duration {
        Duration::from_millis(self.turn_timeout_ms)
    }

    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            turn_timeout_ms: 60_000,
            turn_timeout_warning_ms: 5_000,
            tick_ms: default_tick_ms(),
            point_freeze_ms: default_point_freeze_ms(),
            penalty_freeze_ms: default_penalty_freeze_ms(),
            table_delay_ms: 0,
            autonomous_think_ms: default_autonomous_think_ms(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Enable JSON formatted logs
    #[serde(default)]
    pub json: bool,
    /// Directory for daily rolling log files (disabled when unset)
    #[serde(default)]
    pub dir: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl AppConfig {
    /// Load configuration from files and environment
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from("config")
    }

    /// Load configuration from a specific directory
    pub fn load_from<P: AsRef<Path>>(config_dir: P) -> Result<Self, ConfigError> {
        let config_dir = config_dir.as_ref();
        let defaults = Self::default_config();

        let builder = Config::builder()
            // Start with default values
            .set_default("game.rows", defaults.game.rows as u64)?
            .set_default("game.columns", defaults.game.columns as u64)?
            .set_default("game.feature_size", defaults.game.feature_size as u64)?
            .set_default("game.feature_count", defaults.game.feature_count as u64)?
            .set_default("game.hints", false)?
            .set_default("players.human", defaults.players.human as u64)?
            .set_default("players.autonomous", defaults.players.autonomous as u64)?
            .set_default("timing.turn_timeout_ms", defaults.timing.turn_timeout_ms)?
            .set_default(
                "timing.turn_timeout_warning_ms",
                defaults.timing.turn_timeout_warning_ms,
            )?
            .set_default("logging.level", "info")?
            .set_default("logging.json", false)?
            // Load default config file
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            // Load environment-specific config (e.g., config/tournament.toml)
            .add_source(
                File::from(config_dir.join(
                    std::env::var("SETRACE_ENV").unwrap_or_else(|_| "development".to_string()),
                ))
                .required(false),
            )
            // Override with environment variables (SETRACE_TIMING__TICK_MS, etc.)
            .add_source(
                Environment::with_prefix("SETRACE")
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }

    /// Classic 3x4 table, 81-card deck, two autonomous players
    pub fn default_config() -> Self {
        Self {
            game: GameConfig {
                rows: 3,
                columns: 4,
                feature_size: 3,
                feature_count: 4,
                seed: None,
                hints: false,
            },
            players: PlayersConfig {
                human: 0,
                autonomous: 2,
            },
            timing: TimingConfig::default(),
            logging: LoggingConfig {
                level: default_log_level(),
                json: false,
                dir: None,
            },
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.game.feature_size < 2 {
            errors.push("feature_size must be at least 2".to_string());
        }

        if self.game.feature_count == 0 {
            errors.push("feature_count must be positive".to_string());
        }

        if self.game.deck_size() > MAX_DECK_SIZE {
            errors.push(format!(
                "deck of {}^{} items exceeds the maximum of {}",
                self.game.feature_size,
                self.game.feature_count,
                MAX_DECK_SIZE
            ));
        }

        if self.game.table_size() > MAX_DECK_SIZE {
            errors.push(format!(
                "table of {}x{} positions exceeds the maximum of {}",
                self.game.rows,
                self.game.columns,
                MAX_DECK_SIZE
            ));
        }

        if self.game.table_size() < self.game.set_size() {
            errors.push(format!(
                "table of {} positions cannot hold a set of {}",
                self.game.table_size(),
                self.game.set_size()
            ));
        }

        if self.players.total() == 0 {
            errors.push("at least one player is required".to_string());
        }

        if self.timing.tick_ms == 0 {
            errors.push("tick_ms must be positive".to_string());
        }

        if self.timing.turn_timeout_ms < self.timing.tick_ms {
            errors.push("turn_timeout_ms must be at least one tick".to_string());
        }

        if self.timing.turn_timeout_warning_ms >= self.timing.turn_timeout_ms {
            errors.push(
                "turn_timeout_warning_ms should be less than turn_timeout_ms".to_string(),
            );
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derived_sizes() {
        let config = AppConfig::default_config();
        assert_eq!(config.game.table_size(), 12);
        assert_eq!(config.game.deck_size(), 81);
        assert_eq!(config.game.set_size(), 3);
        assert_eq!(config.players.total(), 2);
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(AppConfig::default_config().validate().is_ok());
    }

    #[test]
    fn test_validate_collects_every_error() {
        let mut config = AppConfig::default_config();
        config.game.rows = 1;
        config.game.columns = 2;
        config.players.autonomous = 0;
        config.timing.turn_timeout_warning_ms = config.timing.turn_timeout_ms;

        let errors = config.validate().unwrap_err();
        assert_eq!(errors.len(), 3);
        assert!(errors.iter().any(|e| e.contains("cannot hold a set")));
        assert!(errors.iter().any(|e| e.contains("at least one player")));
        assert!(errors.iter().any(|e| e.contains("turn_timeout_warning_ms")));
    }

    #[test]
    fn test_validate_rejects_oversized_deck() {
        let mut config = AppConfig::default_config();
        config.game.feature_count = 41;
        assert_eq!(config.game.deck_size(), usize::MAX);

        let errors = config.validate().unwrap_err();
        assert!(errors.iter().any(|e| e.contains("exceeds the maximum")));

        config.game.feature_count = 20;
        assert!(config.validate().is_err());

        config.game.feature_count = 10;
        assert_eq!(config.game.deck_size(), 59_049);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_missing_dir_uses_defaults() {
        let config = AppConfig::load_from("/nonexistent/setrace-config").unwrap();
        assert_eq!(config.game.rows, 3);
        assert_eq!(config.timing.tick_ms, 50);
        assert_eq!(config.logging.level, "info");
    }
}
