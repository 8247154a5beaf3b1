//! # Configuration
//!
//! Settings for the task manager and the bundled demo run, loadable from JSON.
//! Every field has a default so an empty object (`{}`) is a valid configuration.
//!
//! ```json
//! {
//!     "tasks": {
//!         "worker_count": 4,
//!         "shutdown_timeout_ms": 5000,
//!         "thread_name_prefix": "chunk-worker"
//!     },
//!     "generator": { "seed": 1234 },
//!     "area_radius": 6
//! }
//! ```

use std::{fs, io, num::NonZeroUsize, path::Path, thread, time::Duration};

use serde::Deserialize;
use thiserror::Error;

use crate::engine_state::voxels::generator::GeneratorSettings;

/// Default prefix for worker thread names.
pub const DEFAULT_THREAD_NAME_PREFIX: &str = "chunk-worker";

/// Default time `deactivate` waits for workers to exit.
pub const DEFAULT_SHUTDOWN_TIMEOUT_MS: u64 = 5_000;

/// Errors raised while loading a configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read config file: {0}")]
    Io(#[from] io::Error),
    /// The JSON was malformed or had the wrong shape.
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    /// The values parsed but do not make sense.
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Configuration of a [`TaskManager`](crate::engine_state::task_management::TaskManager).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TaskManagerConfig {
    /// Number of worker threads. `0` means "use the host's available parallelism".
    pub worker_count: usize,
    /// How long `deactivate` waits for workers before giving up, in milliseconds.
    pub shutdown_timeout_ms: u64,
    /// Worker threads are named `<prefix>-1`, `<prefix>-2`, ...
    pub thread_name_prefix: String,
}

impl Default for TaskManagerConfig {
    fn default() -> Self {
        Self {
            worker_count: 0,
            shutdown_timeout_ms: DEFAULT_SHUTDOWN_TIMEOUT_MS,
            thread_name_prefix: DEFAULT_THREAD_NAME_PREFIX.to_string(),
        }
    }
}

impl TaskManagerConfig {
    /// Parses and validates a JSON configuration.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a JSON configuration file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    /// Checks values that deserialize fine but cannot be used.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.thread_name_prefix.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "thread_name_prefix must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Same configuration with an explicit worker count.
    pub fn with_worker_count(mut self, worker_count: usize) -> Self {
        self.worker_count = worker_count;
        self
    }

    /// Same configuration with an explicit shutdown timeout.
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Same configuration with a different thread name prefix.
    pub fn with_thread_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.thread_name_prefix = prefix.into();
        self
    }

    /// The worker count to actually spawn.
    ///
    /// Falls back to the host's available parallelism, and to a single worker if
    /// even that cannot be determined.
    pub fn resolved_worker_count(&self) -> usize {
        if self.worker_count > 0 {
            return self.worker_count;
        }
        thread::available_parallelism()
            .map(NonZeroUsize::get)
            .unwrap_or(1)
    }

    /// The shutdown timeout as a [`Duration`].
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }
}

/// Configuration of the `voxel-chunk-tasks` binary.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunConfig {
    /// Task manager settings.
    pub tasks: TaskManagerConfig,
    /// Terrain generator settings.
    pub generator: GeneratorSettings,
    /// Chunks within this distance of the origin are generated.
    pub area_radius: u32,
    /// Length of one simulated tick, in milliseconds.
    pub tick_interval_ms: u64,
    /// The run gives up after this many ticks even if chunks are still pending.
    pub max_ticks: u64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            tasks: TaskManagerConfig::default(),
            generator: GeneratorSettings::default(),
            area_radius: 4,
            tick_interval_ms: 50,
            max_ticks: 1_200,
        }
    }
}

impl RunConfig {
    /// Parses and validates a JSON configuration.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.tasks.validate()?;
        if config.tick_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "tick_interval_ms must be positive".to_string(),
            ));
        }
        Ok(config)
    }

    /// Reads, parses and validates a JSON configuration file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    /// The tick length as a [`Duration`].
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}
