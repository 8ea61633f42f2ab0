//! Rainfall episode orchestration.
//!
//! An episode brackets a run of simulation ticks: seed water, iterate the
//! four-stage pipeline, then terminate the rainfall so no sediment stays
//! suspended. Callers that need spatially varying factors or their own
//! pacing drive [`Simulation`] directly instead.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::rainfall;
use crate::sim::{ErosionFactors, ParamError, Simulation};
use crate::terrain::TerrainModel;

/// Water seeding at the start of an episode.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RainConfig {
    /// Smallest depth added to a cell, in meters.
    pub min_depth: f32,
    /// Largest depth added to a cell, in meters.
    pub max_depth: f32,
    /// Seed for the per-cell depth draw.
    pub seed: u64,
}

impl Default for RainConfig {
    fn default() -> Self {
        Self {
            min_depth: 0.1,
            max_depth: 0.2,
            seed: 42,
        }
    }
}

/// One rainfall episode: seeding, tick count, and the uniform factors
/// applied every tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EpisodeConfig {
    /// Number of simulation ticks.
    pub iterations: u32,
    /// Uniform stage factors applied every tick.
    pub factors: ErosionFactors,
    /// Water seeding; `None` keeps whatever water the caller already placed.
    pub rain: Option<RainConfig>,
}

impl Default for EpisodeConfig {
    fn default() -> Self {
        Self {
            iterations: 1024,
            factors: ErosionFactors::default(),
            rain: Some(RainConfig::default()),
        }
    }
}

/// Errors that can stop an episode before it starts.
#[derive(Error, Debug)]
pub enum EpisodeError {
    #[error(transparent)]
    Param(#[from] ParamError),
    #[error("terrain is {terrain_width}x{terrain_height} but the simulation grid is {sim_width}x{sim_height}")]
    GridMismatch {
        terrain_width: usize,
        terrain_height: usize,
        sim_width: usize,
        sim_height: usize,
    },
    #[error("rain depth range [{min}, {max}] is not a valid interval")]
    RainRange { min: f32, max: f32 },
}

/// Runs one rainfall episode over `terrain`.
///
/// `on_progress` is called after every tick with `(done, total)`, mirroring
/// how long-running pipeline stages report progress elsewhere; pass
/// `|_, _| {}` to ignore it.
pub fn run_episode<T, F>(
    sim: &mut Simulation,
    terrain: &mut T,
    config: &EpisodeConfig,
    mut on_progress: F,
) -> Result<(), EpisodeError>
where
    T: TerrainModel + Sync,
    F: FnMut(u32, u32),
{
    sim.params().validate()?;
    config.factors.validate()?;

    if terrain.width() != sim.width() || terrain.height() != sim.height() {
        return Err(EpisodeError::GridMismatch {
            terrain_width: terrain.width(),
            terrain_height: terrain.height(),
            sim_width: sim.width(),
            sim_height: sim.height(),
        });
    }

    if let Some(rain) = config.rain {
        let valid = rain.min_depth >= 0.0
            && rain.max_depth >= rain.min_depth
            && rain.max_depth.is_finite();
        if !valid {
            return Err(EpisodeError::RainRange {
                min: rain.min_depth,
                max: rain.max_depth,
            });
        }
        let mut rng = ChaCha8Rng::seed_from_u64(rain.seed);
        rainfall::rain_random(terrain, &mut rng, rain.min_depth, rain.max_depth);
    }

    for done in 1..=config.iterations {
        sim.tick_uniform(terrain, &config.factors);
        on_progress(done, config.iterations);
    }

    sim.terminate_rainfall(|x, y, dh| terrain.add_height(x, y, dh));
    Ok(())
}
