// Service configuration.
//
// All tunable parameters live in `NavConfig`, loadable from JSON at
// startup. The core never uses magic numbers for anything a caller might
// reasonably tune — lattice resolution, the walkable height band, the
// desirability clamp band, worker-pool size, the search iteration ceiling,
// and the desire-path wear/regrowth rates are all here.
//
// See also: `graph.rs` which reads the lattice/height/desirability values,
// `pathfinding.rs` for the iteration ceiling, `scheduler.rs` for the
// worker count.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Every tunable of the navigation service. `Default` gives a sane baseline
/// for a one-unit lattice; load overrides from JSON with `from_json_str`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NavConfig {
    /// Lattice resolution: cells per world unit. Node spacing is the
    /// reciprocal.
    pub cells_per_unit: f32,
    /// Terrain below this height is not walkable (e.g. under water).
    pub walkable_height_min: f32,
    /// Terrain above this height is not walkable (e.g. cliff tops).
    pub walkable_height_max: f32,
    /// Lower clamp for node desirability. Lower values make a fully worn
    /// trail proportionally cheaper to traverse.
    pub min_desirability: f32,
    /// Upper clamp for node desirability; also the value new nodes start
    /// at (unworn ground).
    pub max_desirability: f32,
    /// Number of pathfinding worker threads.
    pub worker_count: usize,
    /// Hard ceiling on nodes expanded per search before giving up.
    pub max_search_iterations: u32,
    /// Wall-clock seconds between desirability regrowth passes.
    pub regrowth_interval_secs: f32,
    /// Desirability restored per regrowth pass.
    pub regrowth_amount: f32,
    /// Desirability removed from each node of a successfully found path.
    pub wear_amount: f32,
}

impl Default for NavConfig {
    fn default() -> Self {
        Self {
            cells_per_unit: 1.0,
            walkable_height_min: 0.0,
            walkable_height_max: 100.0,
            min_desirability: 0.25,
            max_desirability: 1.0,
            worker_count: 2,
            max_search_iterations: 10_000,
            regrowth_interval_secs: 5.0,
            regrowth_amount: 0.01,
            wear_amount: 0.05,
        }
    }
}

impl NavConfig {
    /// Parse a config from JSON and validate it. Missing fields take their
    /// defaults, so a partial override file is enough.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: NavConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check the parameter ranges this service depends on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.cells_per_unit.is_finite() || self.cells_per_unit <= 0.0 {
            return Err(ConfigError::NonPositiveResolution(self.cells_per_unit));
        }
        if self.walkable_height_min >= self.walkable_height_max {
            return Err(ConfigError::EmptyHeightBand {
                min: self.walkable_height_min,
                max: self.walkable_height_max,
            });
        }
        if self.min_desirability <= 0.0 || self.min_desirability > self.max_desirability {
            return Err(ConfigError::InvalidDesirabilityBand {
                min: self.min_desirability,
                max: self.max_desirability,
            });
        }
        if self.worker_count == 0 {
            return Err(ConfigError::NoWorkers);
        }
        if self.max_search_iterations == 0 {
            return Err(ConfigError::NoIterationBudget);
        }
        Ok(())
    }
}

/// Why a config failed to load.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid config JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("cells_per_unit must be positive, got {0}")]
    NonPositiveResolution(f32),
    #[error("walkable height band is empty: min {min} >= max {max}")]
    EmptyHeightBand { min: f32, max: f32 },
    #[error("desirability band must satisfy 0 < min <= max, got min {min}, max {max}")]
    InvalidDesirabilityBand { min: f32, max: f32 },
    #[error("worker_count must be at least 1")]
    NoWorkers,
    #[error("max_search_iterations must be at least 1")]
    NoIterationBudget,
}
