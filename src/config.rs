use crate::error::{NavError, Result};
use crate::grid::{self, GridSpec};
use crate::mission::{MissionSettings, SpeedLevel};
use crate::planner::{OrderingMode, RankingProvider};
use crate::provider::HttpRankingProvider;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

/// Where a lenient load got its configuration from
#[derive(Debug)]
pub enum ConfigSource {
    /// No file, built-in defaults
    Defaults,
    File,
    /// The file failed to load; defaults were used instead
    Rejected(NavError),
}

impl ConfigSource {
    pub fn log(&self, path: &str) {
        match self {
            ConfigSource::Defaults => info!("No {} found, using default configuration", path),
            ConfigSource::File => info!("Loaded configuration from {}", path),
            ConfigSource::Rejected(e) => warn!("Failed to load {}: {}. Using default configuration", path, e),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub grid: GridConfig,
    #[serde(default)]
    pub planner: PlannerConfig,
    #[serde(default)]
    pub run: RunConfig,
    #[serde(default)]
    pub visual: VisualConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GridConfig {
    #[serde(default = "default_rows")]
    pub rows: i32,
    #[serde(default = "default_cols")]
    pub cols: i32,
    #[serde(default = "default_obstacle_count")]
    pub obstacle_count: usize,
    #[serde(default = "default_waypoint_count")]
    pub waypoint_count: usize,
    #[serde(default = "default_seed")]
    pub seed: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlannerConfig {
    #[serde(default)]
    pub mode: OrderingMode,
    /// Endpoint of the external ranking provider
    #[serde(default)]
    pub provider_url: Option<String>,
    /// Environment variable holding the provider's bearer key
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RunConfig {
    #[serde(default)]
    pub speed: SpeedLevel,
    #[serde(default)]
    pub auto_run: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VisualConfig {
    #[serde(default = "default_window_title")]
    pub window_title: String,
    #[serde(default = "default_cell_size")]
    pub cell_size: f32,
    #[serde(default = "default_margin")]
    pub margin: f32,
    #[serde(default = "default_header_height")]
    pub header_height: f32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Default tracing directive, overridden by RUST_LOG
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

// Default values
fn default_rows() -> i32 { 12 }
fn default_cols() -> i32 { 16 }
fn default_obstacle_count() -> usize { 15 }
fn default_waypoint_count() -> usize { 3 }
fn default_seed() -> u64 { 42 }
fn default_timeout_ms() -> u64 { 5000 }
fn default_window_title() -> String { "Waypoint Navigator".to_string() }
fn default_cell_size() -> f32 { 40.0 }
fn default_margin() -> f32 { 2.0 }
fn default_header_height() -> f32 { 80.0 }
fn default_log_filter() -> String { "waypoint_nav=info".to_string() }

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            rows: default_rows(),
            cols: default_cols(),
            obstacle_count: default_obstacle_count(),
            waypoint_count: default_waypoint_count(),
            seed: default_seed(),
        }
    }
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            mode: OrderingMode::default(),
            provider_url: None,
            api_key_env: None,
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl Default for VisualConfig {
    fn default() -> Self {
        Self {
            window_title: default_window_title(),
            cell_size: default_cell_size(),
            margin: default_margin(),
            header_height: default_header_height(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
        }
    }
}

impl Config {
    /// Load `config.toml` from the working directory, or use defaults if it is missing or malformed
    pub fn load() -> Self {
        let (config, source) = Self::locate(DEFAULT_CONFIG_PATH);
        source.log(DEFAULT_CONFIG_PATH);
        config
    }

    /// Like `load` but without logging, so the caller can report `source` once a
    /// subscriber is installed
    pub fn locate(path: impl AsRef<Path>) -> (Self, ConfigSource) {
        let path = path.as_ref();
        if !path.exists() {
            return (Config::default(), ConfigSource::Defaults);
        }
        match Self::load_from(path) {
            Ok(config) => (config, ConfigSource::File),
            Err(e) => (Config::default(), ConfigSource::Rejected(e)),
        }
    }

    /// Load a configuration file, failing on any read or parse error
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        if grid::cell_count(config.grid.rows, config.grid.cols).is_err() {
            return Err(NavError::Config(format!(
                "grid must have positive dimensions and at most {} cells, got {}x{}",
                grid::MAX_CELLS,
                config.grid.rows,
                config.grid.cols
            )));
        }
        Ok(config)
    }

    pub fn grid_spec(&self) -> GridSpec {
        GridSpec {
            rows: self.grid.rows,
            cols: self.grid.cols,
            obstacle_count: self.grid.obstacle_count,
            waypoint_count: self.grid.waypoint_count,
            seed: self.grid.seed,
        }
    }

    pub fn mission_settings(&self) -> MissionSettings {
        MissionSettings {
            grid: self.grid_spec(),
            mode: self.planner.mode,
            speed: self.run.speed,
            auto_run: self.run.auto_run,
        }
    }

    /// Build the ranking provider, if one is configured and usable.
    ///
    /// Failures are logged and leave the planner on its heuristic.
    pub fn build_provider(&self) -> Option<Box<dyn RankingProvider>> {
        if self.planner.mode == OrderingMode::Heuristic {
            return None;
        }
        let url = self.planner.provider_url.as_deref()?;
        let timeout = Duration::from_millis(self.planner.timeout_ms);
        let provider = match self.planner.api_key_env.as_deref() {
            Some(key_env) => HttpRankingProvider::from_env(url, timeout, key_env),
            None => HttpRankingProvider::new(url, timeout, None),
        };
        match provider {
            Ok(provider) => Some(Box::new(provider)),
            Err(e) => {
                warn!("Ranking provider unavailable: {}", e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config.grid.rows, 12);
        assert_eq!(config.grid.cols, 16);
        assert_eq!(config.grid.obstacle_count, 15);
        assert_eq!(config.grid.waypoint_count, 3);
        assert_eq!(config.grid.seed, 42);
        assert_eq!(config.planner.mode, OrderingMode::Heuristic);
        assert_eq!(config.run.speed, SpeedLevel::Medium);
        assert!(!config.run.auto_run);
        assert_eq!(config.logging.filter, "waypoint_nav=info");
    }

    #[test]
    fn test_partial_config() {
        let config = Config::from_toml(
            r#"
            [grid]
            rows = 5
            cols = 5
            seed = 7

            [planner]
            mode = "external"
            provider_url = "http://localhost:8080/rank"

            [run]
            speed = "fast"
            auto_run = true
            "#,
        )
        .unwrap();

        let settings = config.mission_settings();
        assert_eq!(settings.grid.rows, 5);
        assert_eq!(settings.grid.seed, 7);
        assert_eq!(settings.grid.obstacle_count, 15);
        assert_eq!(settings.mode, OrderingMode::External);
        assert_eq!(settings.speed, SpeedLevel::Fast);
        assert!(settings.auto_run);
        assert_eq!(config.planner.provider_url.as_deref(), Some("http://localhost:8080/rank"));
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        assert!(matches!(Config::from_toml("[grid]\nrows = 0"), Err(NavError::Config(_))));
        assert!(matches!(
            Config::from_toml("[grid]\nrows = 70000\ncols = 70000"),
            Err(NavError::Config(_))
        ));
        assert!(matches!(Config::from_toml("[planner]\nmode = \"psychic\""), Err(NavError::Config(_))));
    }

    #[test]
    fn test_locate_reports_source() {
        let dir = std::env::temp_dir().join(format!("waypoint_nav_config_{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();

        let (config, source) = Config::locate(dir.join("missing.toml"));
        assert!(matches!(source, ConfigSource::Defaults));
        assert_eq!(config.grid.rows, 12);

        let good = dir.join("good.toml");
        fs::write(&good, "[grid]\nrows = 6\ncols = 7").unwrap();
        let (config, source) = Config::locate(&good);
        assert!(matches!(source, ConfigSource::File));
        assert_eq!((config.grid.rows, config.grid.cols), (6, 7));

        let bad = dir.join("bad.toml");
        fs::write(&bad, "[grid]\nrows = -1").unwrap();
        let (config, source) = Config::locate(&bad);
        assert!(matches!(source, ConfigSource::Rejected(NavError::Config(_))));
        assert_eq!(config.grid.rows, 12);

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_load_without_file_uses_defaults() {
        // Tests run from the package root, which ships no config.toml
        let config = Config::load();
        assert_eq!((config.grid.rows, config.grid.cols), (12, 16));
    }

    #[test]
    fn test_heuristic_mode_builds_no_provider() {
        let mut config = Config::default();
        config.planner.provider_url = Some("http://localhost:8080/rank".to_string());
        assert!(config.build_provider().is_none());

        config.planner.mode = OrderingMode::External;
        config.planner.api_key_env = Some("WAYPOINT_NAV_TEST_KEY_THAT_IS_NOT_SET".to_string());
        assert!(config.build_provider().is_none());
    }
}
