//! Virtual-pipe hydraulic erosion over caller-owned height fields.
//!
//! This crate simulates how water deposited on a terrain surface flows,
//! carries sediment, and reshapes the height field over many time steps.
//! Water exchange between neighboring cells runs through four virtual pipes
//! per cell whose flow rates follow the water-surface head differences;
//! sediment is exchanged with the bed against a tilt- and velocity-driven
//! carry capacity and advected semi-Lagrangian along the flow.
//!
//! The engine does not own the height or water grids: every operation
//! reaches them through accessor closures (or a [`TerrainModel`]), so
//! callers keep whatever storage layout their renderer or file format
//! prefers. Height-map generation, image encoding, and rendering are left
//! to those callers.

pub mod episode;
pub mod grid;
pub mod rainfall;
pub mod sim;
pub mod terrain;

pub use episode::{run_episode, EpisodeConfig, EpisodeError, RainConfig};
pub use glam::Vec2;
pub use grid::Grid;
pub use sim::{ErosionFactors, ParamError, Simulation, SimulationParams};
pub use terrain::{FlatTerrain, TerrainModel};
