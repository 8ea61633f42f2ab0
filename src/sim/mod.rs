//! The virtual-pipe erosion engine.
//!
//! A tick runs four ordered stages over the grid: pipe-flux and tilt update,
//! water transport, sediment transport, evaporation. [`Simulation`] owns the
//! per-cell internal state; the height and water grids live with the caller
//! and are reached through accessor closures or a
//! [`TerrainModel`](crate::terrain::TerrainModel).

mod config;
mod evaporate;
mod flow;
mod sediment;
mod water;

pub use config::{ErosionFactors, ParamError, SimulationParams};

use glam::Vec2;

use crate::grid::Grid;
use crate::terrain::TerrainModel;

/// Outflow order of a cell's four virtual pipes: up (y-1), left (x-1),
/// right (x+1), down (y+1). The pipe opposite direction `i` is `3 - i`.
pub(crate) const DIR_X: [i32; 4] = [0, -1, 1, 0];
pub(crate) const DIR_Y: [i32; 4] = [-1, 0, 0, 1];

/// Outflow volumes per unit time through a cell's four pipes, in
/// `DIR_X`/`DIR_Y` order. Pipes that would cross the grid boundary are
/// pinned to zero.
pub(crate) type PipeFlux = [f32; 4];

/// Mean water columns at or below this depth count as dry; their velocity is
/// written as zero instead of divided through.
pub(crate) const DRY_EPS: f32 = 1e-6;

/// Sums a cell's four outflows. Paired by axis so that mirrored grids reduce
/// to bitwise-mirrored results.
pub(crate) fn pipe_sum(flux: &PipeFlux) -> f32 {
    (flux[0] + flux[3]) + (flux[1] + flux[2])
}

/// Hydraulic erosion state for a fixed `width x height` grid.
///
/// The engine owns only its internal per-cell fields; everything it knows
/// about the terrain arrives through the accessor closures passed to each
/// operation. All buffers are allocated once at construction and reused
/// across ticks.
pub struct Simulation {
    grid: Grid,
    params: SimulationParams,
    /// Outflow through the four virtual pipes of each cell.
    flux: Vec<PipeFlux>,
    /// Horizontal water velocity derived from the net pipe flow, m/s.
    velocity: Vec<Vec2>,
    /// Suspended sediment per cell, in meters of equivalent solid.
    sediment: Vec<f32>,
    /// Spare buffer the advection step writes into before swapping.
    sediment_next: Vec<f32>,
    /// Sine of the local surface inclination, floored at `min_tilt`.
    tilt: Vec<f32>,
    /// Last known water level per cell, refreshed by the flow stage and kept
    /// current through the water-mutating stages.
    water_level: Vec<f32>,
    /// Per-stage scratch: water-depth deltas, then mean columns, then height
    /// deltas. Meaningful only within a single operation.
    delta: Vec<f32>,
}

impl Simulation {
    /// Creates an engine for a `width x height` grid with default parameters.
    /// Both dimensions must be at least 2.
    pub fn new(width: usize, height: usize) -> Self {
        Self::with_params(width, height, SimulationParams::default())
    }

    pub fn with_params(width: usize, height: usize, params: SimulationParams) -> Self {
        let grid = Grid::new(width, height);
        let cells = grid.len();
        Self {
            grid,
            params,
            flux: vec![[0.0; 4]; cells],
            velocity: vec![Vec2::ZERO; cells],
            sediment: vec![0.0; cells],
            sediment_next: vec![0.0; cells],
            tilt: vec![0.0; cells],
            water_level: vec![0.0; cells],
            delta: vec![0.0; cells],
        }
    }

    pub fn grid(&self) -> Grid {
        self.grid
    }

    pub fn width(&self) -> usize {
        self.grid.width()
    }

    pub fn height(&self) -> usize {
        self.grid.height()
    }

    pub fn params(&self) -> &SimulationParams {
        &self.params
    }

    /// Replaces all physical parameters. Grid dimensions are fixed for the
    /// lifetime of the engine.
    pub fn set_params(&mut self, params: SimulationParams) {
        self.params = params;
    }

    pub fn set_time_step(&mut self, seconds: f32) {
        self.params.time_step = seconds;
    }

    pub fn set_meters_per_x(&mut self, meters: f32) {
        self.params.meters_per_x = meters;
    }

    pub fn set_meters_per_y(&mut self, meters: f32) {
        self.params.meters_per_y = meters;
    }

    pub fn set_pipe_cross_section(&mut self, square_meters: f32) {
        self.params.pipe_cross_section = square_meters;
    }

    pub fn set_gravity(&mut self, meters_per_s2: f32) {
        self.params.gravity = meters_per_s2;
    }

    pub fn set_min_tilt(&mut self, sine: f32) {
        self.params.min_tilt = sine;
    }

    /// Suspended sediment per cell, row-major. Mostly useful for inspection
    /// and tests.
    pub fn sediment(&self) -> &[f32] {
        &self.sediment
    }

    /// Water velocity per cell, row-major.
    pub fn velocity(&self) -> &[Vec2] {
        &self.velocity
    }

    /// Sine of the surface inclination per cell, as of the last flow stage.
    pub fn tilt(&self) -> &[f32] {
        &self.tilt
    }

    /// Runs one full tick over a [`TerrainModel`]: flow and tilt, water
    /// transport, sediment transport, evaporation, in that order.
    ///
    /// The factor closures are sampled per cell each stage, so spatially
    /// varying geology (hardness masks, wetlands) costs nothing extra. For
    /// uniform factors see [`tick_uniform`](Self::tick_uniform).
    pub fn tick<T, C, D, E, K>(
        &mut self,
        terrain: &mut T,
        carry_capacity: C,
        deposition: D,
        erosion: E,
        evaporation: K,
    ) where
        T: TerrainModel + Sync,
        C: Fn(usize, usize) -> f32 + Sync,
        D: Fn(usize, usize) -> f32 + Sync,
        E: Fn(usize, usize) -> f32 + Sync,
        K: Fn(usize, usize) -> f32,
    {
        {
            let t = &*terrain;
            self.compute_flow_and_tilt(|x, y| t.height_at(x, y), |x, y| t.water_at(x, y));
        }
        self.transport_water(|x, y, dw| terrain.add_water(x, y, dw));
        self.transport_sediment(&carry_capacity, &deposition, &erosion, |x, y, dh| {
            terrain.add_height(x, y, dh)
        });
        self.evaporate(|x, y, dw| terrain.add_water(x, y, dw), &evaporation);
    }

    /// [`tick`](Self::tick) with spatially uniform factors.
    pub fn tick_uniform<T>(&mut self, terrain: &mut T, factors: &ErosionFactors)
    where
        T: TerrainModel + Sync,
    {
        self.tick(
            terrain,
            |_, _| factors.carry_capacity,
            |_, _| factors.deposition,
            |_, _| factors.erosion,
            |_, _| factors.evaporation,
        );
    }

    /// Ends a rainfall episode: settles all suspended sediment back onto the
    /// terrain in place and resets pipe fluxes and velocities, so the next
    /// rainfall starts from a quiescent state.
    ///
    /// The engine stays usable; callers may add water and resume ticking.
    pub fn terminate_rainfall<A>(&mut self, mut add_height: A)
    where
        A: FnMut(usize, usize, f32),
    {
        for i in 0..self.grid.len() {
            let (x, y) = self.grid.coords(i);
            add_height(x, y, self.sediment[i]);
            self.sediment[i] = 0.0;
        }
        self.flux.fill([0.0; 4]);
        self.velocity.fill(Vec2::ZERO);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terrain::{FlatTerrain, TerrainModel};

    fn inert_factors() -> ErosionFactors {
        ErosionFactors {
            carry_capacity: 0.0,
            deposition: 0.0,
            erosion: 0.0,
            evaporation: 0.0,
        }
    }

    fn sum64(values: &[f32]) -> f64 {
        values.iter().map(|&v| v as f64).sum()
    }

    #[test]
    fn still_water_on_flat_terrain_is_inert() {
        let mut sim = Simulation::new(8, 8);
        let mut terrain = FlatTerrain::from_fn(8, 8, |_, _| 10.0);
        terrain.water_mut().fill(1.0);

        for _ in 0..100 {
            sim.tick_uniform(&mut terrain, &inert_factors());
        }

        assert!(terrain.heights().iter().all(|&h| h == 10.0), "height changed");
        assert!(terrain.water().iter().all(|&w| w == 1.0), "water changed");
        assert!(sim.sediment.iter().all(|&s| s == 0.0), "sediment appeared");
        assert!(
            sim.flux.iter().flatten().all(|&f| f == 0.0),
            "flux appeared on a level surface"
        );
    }

    #[test]
    fn water_drains_toward_the_low_edge() {
        let (w, h) = (16, 16);
        let mut sim = Simulation::new(w, h);
        let mut terrain = FlatTerrain::from_fn(w, h, |_, y| 10.0 - 0.1 * y as f32);
        terrain.water_mut().fill(0.2);

        let total_before = sum64(terrain.water());
        let bottom_row =
            |t: &FlatTerrain| (0..w).map(|x| t.water_at(x, h - 1) as f64).sum::<f64>();

        let mut prev = bottom_row(&terrain);
        for tick in 0..200 {
            sim.tick_uniform(&mut terrain, &inert_factors());
            let now = bottom_row(&terrain);
            // Strictly filling until the pond surface catches the slope and
            // the pipes start pushing back.
            if tick < 5 {
                assert!(
                    now >= prev - 1e-6,
                    "bottom row lost water on early tick {}: {} -> {}",
                    tick,
                    prev,
                    now
                );
            }
            prev = now;
        }

        assert!(
            bottom_row(&terrain) > 0.2 * w as f64 + 0.1,
            "water should have accumulated in the bottom row, got {}",
            bottom_row(&terrain)
        );
        let total_after = sum64(terrain.water());
        assert!(
            (total_after - total_before).abs() < total_before * 1e-3,
            "flow alone should conserve water: {} -> {}",
            total_before,
            total_after
        );
    }

    #[test]
    fn evaporation_decays_water_linearly_per_step() {
        let mut sim = Simulation::new(8, 8);
        sim.set_time_step(1.0);
        let mut terrain = FlatTerrain::new(8, 8);
        terrain.water_mut().fill(1.0);
        let factors = ErosionFactors {
            evaporation: 0.01,
            ..inert_factors()
        };

        for _ in 0..100 {
            sim.tick_uniform(&mut terrain, &factors);
        }

        let expected = 0.99f32.powi(100);
        for &w in terrain.water() {
            assert!(
                (w - expected).abs() < 1e-3,
                "water {} should be within 1e-3 of {}",
                w,
                expected
            );
        }
    }

    #[test]
    fn slope_erodes_high_ground_and_moves_material_downhill() {
        let (w, h) = (16, 16);
        let mut sim = Simulation::new(w, h);
        let mut terrain =
            FlatTerrain::from_fn(w, h, |_, y| 50.0 * (1.0 - y as f32 / (h - 1) as f32));
        terrain.water_mut().fill(0.15);
        let factors = ErosionFactors {
            carry_capacity: 0.01,
            deposition: 0.1,
            erosion: 0.1,
            evaporation: 0.01,
        };

        let before: Vec<f32> = terrain.heights().to_vec();
        let total_before = sum64(terrain.heights());

        for _ in 0..1024 {
            sim.tick_uniform(&mut terrain, &factors);
        }

        assert!(terrain.water().iter().all(|&v| v >= 0.0));
        assert!(sim.sediment.iter().all(|&s| s >= 0.0));

        let total_after = sum64(terrain.heights());
        assert!(
            total_after < total_before,
            "suspended sediment should leave the bed lighter: {} -> {}",
            total_before,
            total_after
        );

        let mean_delta = |rows: std::ops::Range<usize>| {
            let mut sum = 0.0f64;
            let mut count = 0;
            for y in rows {
                for x in 0..w {
                    sum += (terrain.height_at(x, y) - before[y * w + x]) as f64;
                    count += 1;
                }
            }
            sum / count as f64
        };
        let upslope = mean_delta(0..h / 4);
        let downslope = mean_delta(h - h / 4..h);
        assert!(upslope < 0.0, "upper slope should erode, mean delta {}", upslope);
        assert!(
            downslope > upslope,
            "material should move downhill: upslope {}, downslope {}",
            upslope,
            downslope
        );
    }

    #[test]
    fn terminating_a_rainfall_settles_all_suspended_sediment() {
        let (w, h) = (16, 16);
        let mut sim = Simulation::new(w, h);
        let mut terrain =
            FlatTerrain::from_fn(w, h, |_, y| 50.0 * (1.0 - y as f32 / (h - 1) as f32));
        terrain.water_mut().fill(0.15);
        let factors = ErosionFactors {
            carry_capacity: 0.01,
            deposition: 0.1,
            erosion: 0.1,
            evaporation: 0.0,
        };

        for _ in 0..200 {
            sim.tick_uniform(&mut terrain, &factors);
        }

        let suspended = sum64(&sim.sediment);
        assert!(suspended > 0.0, "slope flow should keep sediment suspended");

        let height_before = sum64(terrain.heights());
        sim.terminate_rainfall(|x, y, dh| terrain.add_height(x, y, dh));

        assert!(sim.sediment.iter().all(|&s| s == 0.0), "sediment left behind");
        assert!(sim.flux.iter().flatten().all(|&f| f == 0.0), "flux not reset");
        assert!(sim.velocity.iter().all(|&v| v == Vec2::ZERO), "velocity not reset");

        let gained = sum64(terrain.heights()) - height_before;
        assert!(
            (gained - suspended).abs() < 1e-2,
            "settled mass {} should equal suspended mass {}",
            gained,
            suspended
        );
    }

    #[test]
    fn symmetric_cone_erodes_symmetrically() {
        let n = 33;
        let mut sim = Simulation::new(n, n);
        let mut terrain = FlatTerrain::from_fn(n, n, |x, y| {
            let dx = x as f32 - 16.0;
            let dy = y as f32 - 16.0;
            (10.0 - 0.5 * (dx * dx + dy * dy).sqrt()).max(0.0)
        });
        terrain.water_mut().fill(0.1);
        let factors = ErosionFactors {
            carry_capacity: 0.01,
            deposition: 0.1,
            erosion: 0.1,
            evaporation: 0.01,
        };

        for _ in 0..200 {
            sim.tick_uniform(&mut terrain, &factors);
        }

        for y in 0..n {
            for x in 0..n {
                let here = terrain.height_at(x, y);
                let x_mirror = terrain.height_at(n - 1 - x, y);
                let y_mirror = terrain.height_at(x, n - 1 - y);
                assert!(
                    (here - x_mirror).abs() < 1e-5,
                    "x mirror broken at ({}, {}): {} vs {}",
                    x,
                    y,
                    here,
                    x_mirror
                );
                assert!(
                    (here - y_mirror).abs() < 1e-5,
                    "y mirror broken at ({}, {}): {} vs {}",
                    x,
                    y,
                    here,
                    y_mirror
                );
            }
        }
    }

    #[test]
    fn boundary_water_never_leaves_the_grid() {
        let n = 12;
        let mut sim = Simulation::new(n, n);
        let mut terrain = FlatTerrain::new(n, n);
        for y in 0..n {
            for x in 0..n {
                if x == 0 || y == 0 || x == n - 1 || y == n - 1 {
                    terrain.add_water(x, y, 0.5);
                }
            }
        }

        let total_before = sum64(terrain.water());
        for _ in 0..50 {
            sim.tick_uniform(&mut terrain, &inert_factors());
        }
        let total_after = sum64(terrain.water());

        assert!(
            (total_after - total_before).abs() < total_before * 1e-4,
            "water crossed the boundary: {} -> {}",
            total_before,
            total_after
        );
    }

    #[test]
    fn parameters_can_change_between_ticks() {
        let mut sim = Simulation::new(4, 4);
        let mut terrain = FlatTerrain::new(4, 4);
        terrain.water_mut().fill(0.3);

        sim.tick_uniform(&mut terrain, &inert_factors());
        sim.set_time_step(0.05);
        sim.set_meters_per_x(2.0);
        sim.set_meters_per_y(2.0);
        sim.set_gravity(3.7);
        sim.set_pipe_cross_section(0.5);
        sim.set_min_tilt(0.01);
        sim.tick_uniform(&mut terrain, &inert_factors());

        assert_eq!(sim.params().time_step, 0.05);
        assert_eq!(sim.params().gravity, 3.7);
        assert!(terrain.water().iter().all(|&w| w >= 0.0));
    }
}
