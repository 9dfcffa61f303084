//! Configuration for the island evolver and its solution cache.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::{BreedingConfig, SelectionConfig};

/// A complete run: evolver settings plus one pipeline per island.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub evolver: EvolverConfig,
    #[serde(default)]
    pub islands: Vec<IslandConfig>,
}

/// Breeding and selection for one island.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IslandConfig {
    #[serde(default)]
    pub breeding: BreedingConfig,
    #[serde(default)]
    pub selection: SelectionConfig,
}

impl EngineConfig {
    /// Validate the evolver and every island.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.evolver.validate()?;
        for island in &self.islands {
            island.breeding.validate()?;
            island.selection.validate()?;
        }
        Ok(())
    }
}

/// Top-level configuration for an island evolver.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvolverConfig {
    /// Capacity of the shared influx channel (migrated program batches).
    #[serde(default = "default_influx_capacity")]
    pub influx_capacity: usize,
    /// Capacity of the report channel shared by all islands.
    #[serde(default = "default_report_capacity")]
    pub report_capacity: usize,
    /// Delay between harvesting a round and publishing its champion.
    #[serde(default = "default_migration_delay_ms")]
    pub migration_delay_ms: u64,
    /// Sleep while fewer than two islands exist.
    #[serde(default = "default_idle_interval_ms")]
    pub idle_interval_ms: u64,
    /// Where to write the best program of each round. `None` disables export.
    #[serde(default = "default_champion_path")]
    pub champion_path: Option<PathBuf>,
    /// Solution cache settings.
    #[serde(default)]
    pub cache: CacheConfig,
}

impl Default for EvolverConfig {
    fn default() -> Self {
        Self {
            influx_capacity: default_influx_capacity(),
            report_capacity: default_report_capacity(),
            migration_delay_ms: default_migration_delay_ms(),
            idle_interval_ms: default_idle_interval_ms(),
            champion_path: default_champion_path(),
            cache: CacheConfig::default(),
        }
    }
}

fn default_influx_capacity() -> usize {
    100
}
fn default_report_capacity() -> usize {
    100
}
fn default_migration_delay_ms() -> u64 {
    1000
}
fn default_idle_interval_ms() -> u64 {
    1000
}
fn default_champion_path() -> Option<PathBuf> {
    Some(PathBuf::from("bestProgram.vm"))
}

impl EvolverConfig {
    /// Migration delay as a duration.
    pub fn migration_delay(&self) -> Duration {
        Duration::from_millis(self.migration_delay_ms)
    }

    /// Idle interval as a duration.
    pub fn idle_interval(&self) -> Duration {
        Duration::from_millis(self.idle_interval_ms)
    }

    /// Validate configuration parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.influx_capacity == 0 {
            return Err(ConfigError::ZeroCapacity("influx"));
        }
        if self.report_capacity == 0 {
            return Err(ConfigError::ZeroCapacity("report"));
        }
        if self.idle_interval_ms == 0 {
            return Err(ConfigError::ZeroInterval("idle"));
        }
        self.cache.validate()
    }
}

/// Solution cache configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Snapshot file. `None` keeps the cache in memory only.
    #[serde(default = "default_snapshot_path")]
    pub snapshot_path: Option<PathBuf>,
    /// Seconds between periodic snapshots.
    #[serde(default = "default_snapshot_interval_secs")]
    pub snapshot_interval_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            snapshot_path: default_snapshot_path(),
            snapshot_interval_secs: default_snapshot_interval_secs(),
        }
    }
}

fn default_snapshot_path() -> Option<PathBuf> {
    Some(PathBuf::from("solution_cache.json"))
}
fn default_snapshot_interval_secs() -> u64 {
    60
}

impl CacheConfig {
    /// In-memory cache without persistence.
    pub fn in_memory() -> Self {
        Self {
            snapshot_path: None,
            ..Default::default()
        }
    }

    /// Snapshot interval as a duration.
    pub fn snapshot_interval(&self) -> Duration {
        Duration::from_secs(self.snapshot_interval_secs)
    }

    /// Validate configuration parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.snapshot_path.is_some() && self.snapshot_interval_secs == 0 {
            return Err(ConfigError::ZeroInterval("snapshot"));
        }
        Ok(())
    }
}

/// Configuration validation errors.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} channel capacity must be non-zero")]
    ZeroCapacity(&'static str),
    #[error("{0} interval must be non-zero")]
    ZeroInterval(&'static str),
    #[error("Population size must be non-zero for {0} breeder")]
    ZeroPopulation(&'static str),
    #[error("Program length must be non-zero")]
    ZeroProgramLength,
    #[error("Mutation chance must be within [0, 1], got {0}")]
    InvalidMutationChance(f64),
    #[error("Breeding pipeline produces no programs")]
    EmptyPipeline,
    #[error("Selector must keep at least one solution")]
    ZeroKeep,
    #[error("Composite selector has no members")]
    EmptyComposite,
}
