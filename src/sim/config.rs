//! Simulation configuration.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Physical parameters of the virtual-pipe model.
///
/// All of these may be changed between ticks; the grid dimensions may not.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimulationParams {
    /// Integrator time step in seconds.
    pub time_step: f32,
    /// Horizontal cell size along x, in meters.
    pub meters_per_x: f32,
    /// Horizontal cell size along y, in meters.
    pub meters_per_y: f32,
    /// Effective cross-sectional area of a virtual pipe, in square meters.
    pub pipe_cross_section: f32,
    /// Gravitational acceleration, in m/s².
    pub gravity: f32,
    /// Floor on the sine of the surface inclination, keeping the sediment
    /// carry capacity nonzero on flat ground.
    pub min_tilt: f32,
}

impl Default for SimulationParams {
    fn default() -> Self {
        Self {
            time_step: 0.1,
            meters_per_x: 1.0,
            meters_per_y: 1.0,
            pipe_cross_section: 1.0,
            gravity: 9.81,
            min_tilt: 0.001,
        }
    }
}

impl SimulationParams {
    /// Checks that every parameter is finite and in its usable range.
    ///
    /// The per-operation engine surface does not validate; this is for
    /// callers (notably [`run_episode`](crate::episode::run_episode)) that
    /// want a hard failure instead of non-finite fields propagating.
    pub fn validate(&self) -> Result<(), ParamError> {
        if !(self.time_step > 0.0 && self.time_step.is_finite()) {
            return Err(ParamError::TimeStep(self.time_step));
        }
        if !(self.meters_per_x > 0.0 && self.meters_per_x.is_finite())
            || !(self.meters_per_y > 0.0 && self.meters_per_y.is_finite())
        {
            return Err(ParamError::CellSize(self.meters_per_x, self.meters_per_y));
        }
        if !(self.pipe_cross_section > 0.0 && self.pipe_cross_section.is_finite()) {
            return Err(ParamError::PipeCrossSection(self.pipe_cross_section));
        }
        if !(self.gravity > 0.0 && self.gravity.is_finite()) {
            return Err(ParamError::Gravity(self.gravity));
        }
        if !(self.min_tilt > 0.0 && self.min_tilt <= 1.0) {
            return Err(ParamError::MinTilt(self.min_tilt));
        }
        Ok(())
    }
}

/// Uniform per-cell factors for the sediment and evaporation stages.
///
/// These are the spatially constant counterparts of the per-cell factor
/// closures the sediment and evaporation operations accept; hardness masks
/// and similar spatially varying geology go through the closures instead.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ErosionFactors {
    /// Sediment carry-capacity multiplier (Kc).
    pub carry_capacity: f32,
    /// Fraction of excess sediment deposited per step (Kd), in [0, 1].
    pub deposition: f32,
    /// Fraction of the capacity shortfall eroded per step (Ke), in [0, 1].
    pub erosion: f32,
    /// Fraction of the water column evaporated per second (Kevap), in [0, 1].
    pub evaporation: f32,
}

impl Default for ErosionFactors {
    fn default() -> Self {
        Self {
            carry_capacity: 0.01,
            deposition: 0.1,
            erosion: 0.1,
            evaporation: 0.01,
        }
    }
}

impl ErosionFactors {
    pub fn validate(&self) -> Result<(), ParamError> {
        if !(self.carry_capacity >= 0.0 && self.carry_capacity.is_finite()) {
            return Err(ParamError::CarryCapacity(self.carry_capacity));
        }
        for (name, value) in [
            ("deposition", self.deposition),
            ("erosion", self.erosion),
            ("evaporation", self.evaporation),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ParamError::Fraction(name, value));
            }
        }
        Ok(())
    }
}

/// A parameter failed validation.
#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum ParamError {
    #[error("time step must be positive and finite, got {0}")]
    TimeStep(f32),
    #[error("cell sizes must be positive and finite, got {0} x {1}")]
    CellSize(f32, f32),
    #[error("pipe cross-section must be positive and finite, got {0}")]
    PipeCrossSection(f32),
    #[error("gravity must be positive and finite, got {0}")]
    Gravity(f32),
    #[error("minimum tilt must be in (0, 1], got {0}")]
    MinTilt(f32),
    #[error("carry capacity must be non-negative and finite, got {0}")]
    CarryCapacity(f32),
    #[error("{0} factor must be in [0, 1], got {1}")]
    Fraction(&'static str, f32),
}
