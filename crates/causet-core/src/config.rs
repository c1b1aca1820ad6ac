//! Configuration loading and typed config structures for a causet run.
//!
//! The canonical configuration lives in `causet-config.yaml` at the project
//! root. Every section is optional; missing sections and fields fall back to
//! the defaults defined here.

use std::path::{Path, PathBuf};

use causet_types::MAX_DIMENSIONS;
use serde::Deserialize;

/// Largest accepted stream brick edge.
pub const MAX_BRICK_SIZE: u32 = 64;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// A value parsed but is out of its allowed range.
    #[error("invalid configuration: {reason}")]
    Invalid {
        /// What is wrong.
        reason: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SimulationConfig {
    /// Substrate geometry.
    #[serde(default)]
    pub substrate: SubstrateConfig,

    /// Tick scheduling, limits, and collapse policy.
    #[serde(default)]
    pub schedule: ScheduleConfig,

    /// Optional birth rule.
    #[serde(default)]
    pub birth: BirthConfig,

    /// Initial population.
    #[serde(default)]
    pub seed: SeedConfig,

    /// Snapshot sampling and buffering.
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Durable snapshot storage.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Live brick streaming.
    #[serde(default)]
    pub stream: StreamConfig,

    /// Logging output.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl SimulationConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// Environment variables override file values:
    /// - `CAUSET_STORAGE_DIR` overrides `storage.dir`
    /// - `CAUSET_STREAM_PORT` overrides `stream.port`
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string and validate it.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let mut config: Self = if yaml.trim().is_empty() {
            Self::default()
        } else {
            serde_yml::from_str(yaml)?
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Apply environment variable overrides.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("CAUSET_STORAGE_DIR") {
            self.storage.dir = PathBuf::from(val);
        }
        if let Ok(val) = std::env::var("CAUSET_STREAM_PORT") {
            match val.parse::<u16>() {
                Ok(port) => self.stream.port = port,
                Err(e) => tracing::warn!(value = %val, error = %e, "ignoring invalid CAUSET_STREAM_PORT"),
            }
        }
    }

    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let dims = self.substrate.dimensions;
        if dims == 0 || dims > MAX_DIMENSIONS {
            return Err(ConfigError::Invalid {
                reason: format!("substrate.dimensions must be in 1..={MAX_DIMENSIONS}, got {dims}"),
            });
        }
        if self.pipeline.buffer_capacity == 0 {
            return Err(ConfigError::Invalid {
                reason: "pipeline.buffer_capacity must be at least 1".to_owned(),
            });
        }
        if self.pipeline.sample_interval == 0 {
            return Err(ConfigError::Invalid {
                reason: "pipeline.sample_interval must be at least 1".to_owned(),
            });
        }
        let brick_size = self.stream.brick_size;
        if brick_size == 0 || brick_size > MAX_BRICK_SIZE {
            return Err(ConfigError::Invalid {
                reason: format!("stream.brick_size must be in 1..={MAX_BRICK_SIZE}, got {brick_size}"),
            });
        }
        let horizon = self.stream.horizon;
        if !horizon.is_finite() || horizon < 0.0 {
            return Err(ConfigError::Invalid {
                reason: format!("stream.horizon must be finite and non-negative, got {horizon}"),
            });
        }
        let energy_max = self.stream.energy_max;
        if !energy_max.is_finite() || energy_max <= 0.0 {
            return Err(ConfigError::Invalid {
                reason: format!("stream.energy_max must be finite and positive, got {energy_max}"),
            });
        }
        if self.substrate.growth_step == 0 {
            return Err(ConfigError::Invalid {
                reason: "substrate.growth_step must be at least 1".to_owned(),
            });
        }
        Ok(())
    }
}

/// Substrate geometry.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SubstrateConfig {
    /// Number of spatial dimensions (1..=64).
    #[serde(default = "default_dimensions")]
    pub dimensions: u32,

    /// Initial half-width of the bounded region on every axis.
    #[serde(default = "default_initial_extent")]
    pub initial_extent: u64,

    /// Distance from the boundary at which the region grows.
    #[serde(default = "default_growth_margin")]
    pub growth_margin: u64,

    /// Amount added to the extent per growth step.
    #[serde(default = "default_growth_step")]
    pub growth_step: u64,
}

impl Default for SubstrateConfig {
    fn default() -> Self {
        Self {
            dimensions: default_dimensions(),
            initial_extent: default_initial_extent(),
            growth_margin: default_growth_margin(),
            growth_step: default_growth_step(),
        }
    }
}

/// Tick scheduling and collapse policy.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ScheduleConfig {
    /// Stop after this many ticks (0 = unlimited).
    #[serde(default)]
    pub max_ticks: u64,

    /// Stop after this many wall-clock seconds (0 = unlimited).
    #[serde(default)]
    pub max_real_time_seconds: u64,

    /// Real-time milliseconds to sleep between ticks (0 = run flat out).
    #[serde(default)]
    pub tick_interval_ms: u64,

    /// Collapse the causal graph every this many ticks (0 = never).
    #[serde(default = "default_collapse_period")]
    pub collapse_period: u64,

    /// Relations retained by a collapse.
    #[serde(default = "default_max_relations")]
    pub max_relations: usize,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            max_ticks: 0,
            max_real_time_seconds: 0,
            tick_interval_ms: 0,
            collapse_period: default_collapse_period(),
            max_relations: default_max_relations(),
        }
    }
}

/// Optional birth rule evaluated in the grow phase.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct BirthConfig {
    /// Entities spawn a child every `period` ticks of age (0 = disabled).
    #[serde(default)]
    pub period: u64,

    /// No births once the registry holds this many entities.
    #[serde(default)]
    pub max_population: usize,
}

/// Initial population placed at tick 0.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SeedConfig {
    /// RNG seed for reproducible placement.
    #[serde(default = "default_rng_seed")]
    pub rng_seed: u64,

    /// Number of simple entities.
    #[serde(default = "default_simple_count")]
    pub simple_count: u32,

    /// Number of colliding entities.
    #[serde(default = "default_colliding_count")]
    pub colliding_count: u32,

    /// Seeded coordinates lie in `-spread..=spread`.
    #[serde(default = "default_spread")]
    pub spread: i64,

    /// Generation weight of seeded entities.
    #[serde(default = "default_generation")]
    pub generation: u64,

    /// Momentum components lie in `-max_speed..=max_speed`.
    #[serde(default = "default_max_speed")]
    pub max_speed: i64,

    /// Energy cost attached to each seeded momentum.
    #[serde(default)]
    pub momentum_cost: u64,
}

impl Default for SeedConfig {
    fn default() -> Self {
        Self {
            rng_seed: default_rng_seed(),
            simple_count: default_simple_count(),
            colliding_count: default_colliding_count(),
            spread: default_spread(),
            generation: default_generation(),
            max_speed: default_max_speed(),
            momentum_cost: 0,
        }
    }
}

/// What the producer does when a snapshot buffer is full.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Evict the oldest entry; the producer never waits.
    #[default]
    DropOldest,
    /// Wait until a consumer frees a slot.
    Block,
}

/// Snapshot sampling and hand-off.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PipelineConfig {
    /// Assemble a snapshot every this many ticks.
    #[serde(default = "default_sample_interval")]
    pub sample_interval: u64,

    /// Entries held by each consumer lane.
    #[serde(default = "default_buffer_capacity")]
    pub buffer_capacity: usize,

    /// Full-buffer behaviour.
    #[serde(default)]
    pub overflow_policy: OverflowPolicy,

    /// Consumer wake-up interval used to notice stop signals.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Whether consumers finish queued snapshots on shutdown.
    #[serde(default = "default_true")]
    pub drain_on_shutdown: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            sample_interval: default_sample_interval(),
            buffer_capacity: default_buffer_capacity(),
            overflow_policy: OverflowPolicy::default(),
            poll_interval_ms: default_poll_interval_ms(),
            drain_on_shutdown: true,
        }
    }
}

/// Durable snapshot storage.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StorageConfig {
    /// Whether the persistence consumer runs.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Directory that receives `.tksn` files.
    #[serde(default = "default_storage_dir")]
    pub dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: default_storage_dir(),
        }
    }
}

/// Live brick streaming.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StreamConfig {
    /// Whether the stream server and consumer run.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Bind host.
    #[serde(default = "default_host")]
    pub host: String,

    /// Bind port.
    #[serde(default = "default_stream_port")]
    pub port: u16,

    /// Brick edge length in cells.
    #[serde(default = "default_brick_size")]
    pub brick_size: u32,

    /// Visibility horizon around the camera, in cells.
    #[serde(default = "default_horizon")]
    pub horizon: f32,

    /// Energy mapped to the top of the 8-bit range.
    #[serde(default = "default_energy_max")]
    pub energy_max: f64,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: default_host(),
            port: default_stream_port(),
            brick_size: default_brick_size(),
            horizon: default_horizon(),
            energy_max: default_energy_max(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

const fn default_true() -> bool {
    true
}
const fn default_dimensions() -> u32 {
    3
}
const fn default_initial_extent() -> u64 {
    64
}
const fn default_growth_margin() -> u64 {
    4
}
const fn default_growth_step() -> u64 {
    16
}
const fn default_collapse_period() -> u64 {
    10
}
const fn default_max_relations() -> usize {
    4096
}
const fn default_rng_seed() -> u64 {
    42
}
const fn default_simple_count() -> u32 {
    64
}
const fn default_colliding_count() -> u32 {
    16
}
const fn default_spread() -> i64 {
    32
}
const fn default_generation() -> u64 {
    1
}
const fn default_max_speed() -> i64 {
    1
}
const fn default_sample_interval() -> u64 {
    100
}
const fn default_buffer_capacity() -> usize {
    200
}
const fn default_poll_interval_ms() -> u64 {
    50
}
fn default_storage_dir() -> PathBuf {
    PathBuf::from("snapshots")
}
fn default_host() -> String {
    String::from("0.0.0.0")
}
const fn default_stream_port() -> u16 {
    8090
}
const fn default_brick_size() -> u32 {
    8
}
const fn default_horizon() -> f32 {
    96.0
}
const fn default_energy_max() -> f64 {
    1024.0
}
fn default_log_level() -> String {
    String::from("info")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = SimulationConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.substrate.dimensions, 3);
        assert_eq!(config.schedule.collapse_period, 10);
        assert_eq!(config.pipeline.sample_interval, 100);
        assert_eq!(config.pipeline.buffer_capacity, 200);
        assert_eq!(config.pipeline.overflow_policy, OverflowPolicy::DropOldest);
    }

    #[test]
    fn parse_full_yaml() {
        let yaml = r"
substrate:
  dimensions: 4
  initial_extent: 10
  growth_margin: 2
  growth_step: 5
schedule:
  max_ticks: 500
  collapse_period: 20
  max_relations: 128
birth:
  period: 50
  max_population: 1000
seed:
  rng_seed: 7
  simple_count: 3
  colliding_count: 2
pipeline:
  sample_interval: 25
  buffer_capacity: 8
  overflow_policy: block
stream:
  port: 9999
  brick_size: 4
logging:
  level: debug
  json: true
";
        let config = SimulationConfig::parse(yaml).unwrap();
        assert_eq!(config.substrate.dimensions, 4);
        assert_eq!(config.schedule.max_ticks, 500);
        assert_eq!(config.schedule.max_relations, 128);
        assert_eq!(config.birth.period, 50);
        assert_eq!(config.seed.colliding_count, 2);
        assert_eq!(config.pipeline.overflow_policy, OverflowPolicy::Block);
        assert_eq!(config.stream.brick_size, 4);
        assert!(config.logging.json);
    }

    #[test]
    fn parse_minimal_yaml() {
        let config = SimulationConfig::parse("seed:\n  rng_seed: 9\n").unwrap();
        assert_eq!(config.seed.rng_seed, 9);
        assert_eq!(config.substrate.dimensions, 3);
    }

    #[test]
    fn parse_empty_yaml() {
        assert!(SimulationConfig::parse("").is_ok());
    }

    #[test]
    fn zero_dimensions_rejected() {
        let result = SimulationConfig::parse("substrate:\n  dimensions: 0\n");
        assert!(matches!(result, Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn too_many_dimensions_rejected() {
        let result = SimulationConfig::parse("substrate:\n  dimensions: 65\n");
        assert!(matches!(result, Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn zero_buffer_capacity_rejected() {
        let result = SimulationConfig::parse("pipeline:\n  buffer_capacity: 0\n");
        assert!(matches!(result, Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn stream_brick_size_bounded() {
        for yaml in ["stream:\n  brick_size: 0\n", "stream:\n  brick_size: 65\n"] {
            let result = SimulationConfig::parse(yaml);
            assert!(matches!(result, Err(ConfigError::Invalid { .. })), "{yaml}");
        }
        assert!(SimulationConfig::parse("stream:\n  brick_size: 64\n").is_ok());
    }

    #[test]
    fn stream_horizon_must_be_finite() {
        for yaml in ["stream:\n  horizon: -1.0\n", "stream:\n  horizon: .inf\n", "stream:\n  horizon: .nan\n"] {
            let result = SimulationConfig::parse(yaml);
            assert!(matches!(result, Err(ConfigError::Invalid { .. })), "{yaml}");
        }
    }

    #[test]
    fn stream_energy_max_must_be_positive() {
        for yaml in ["stream:\n  energy_max: 0.0\n", "stream:\n  energy_max: -3.0\n", "stream:\n  energy_max: .inf\n"] {
            let result = SimulationConfig::parse(yaml);
            assert!(matches!(result, Err(ConfigError::Invalid { .. })), "{yaml}");
        }
    }

    #[test]
    fn load_project_config_file() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("..")
            .join("..")
            .join("causet-config.yaml");
        if path.exists() {
            let config = SimulationConfig::from_file(&path);
            assert!(config.is_ok(), "Failed to load project config: {config:?}");
        }
    }
}
