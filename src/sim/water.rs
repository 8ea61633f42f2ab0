//! Water transport, the second stage of a tick.

use glam::Vec2;
use rayon::prelude::*;

use super::{pipe_sum, PipeFlux, Simulation, DIR_X, DIR_Y, DRY_EPS};
use crate::grid::Grid;

/// Outflow of the neighbor in direction `dir` back toward `(x, y)`, or zero
/// when that neighbor is off the grid.
fn inflow(grid: Grid, flux: &[PipeFlux], x: usize, y: usize, dir: usize) -> f32 {
    let nx = x as i32 + DIR_X[dir];
    let ny = y as i32 + DIR_Y[dir];
    if grid.contains(nx, ny) {
        flux[grid.index(nx as usize, ny as usize)][3 - dir]
    } else {
        0.0
    }
}

impl Simulation {
    /// Applies the net pipe flow to the water grid and derives the per-cell
    /// water velocity.
    ///
    /// Each cell's depth change is the inflow from its neighbors' pipes
    /// minus its own outflow, integrated over the time step and spread over
    /// the cell area. The preceding flux scaling guarantees the delta cannot
    /// drive a column negative; the accessor's clamp is a backstop only.
    pub fn transport_water<A>(&mut self, mut add_water: A)
    where
        A: FnMut(usize, usize, f32) -> f32,
    {
        let grid = self.grid;
        let p = self.params;
        let dt = p.time_step;
        let cell_area = p.meters_per_x * p.meters_per_y;

        // Depth deltas from the flux divergence, pure reads of the flux grid.
        let flux = &self.flux;
        self.delta.par_iter_mut().enumerate().for_each(|(i, d)| {
            let (x, y) = grid.coords(i);
            let inflow_sum = (inflow(grid, flux, x, y, 0) + inflow(grid, flux, x, y, 3))
                + (inflow(grid, flux, x, y, 1) + inflow(grid, flux, x, y, 2));
            *d = (inflow_sum - pipe_sum(&flux[i])) * dt / cell_area;
        });

        // Push the deltas out through the accessor; remember the mean column
        // over the step for the velocity pass.
        for i in 0..grid.len() {
            let (x, y) = grid.coords(i);
            let dw = self.delta[i];
            let prev = self.water_level[i];
            self.water_level[i] = add_water(x, y, dw);
            self.delta[i] = prev + 0.5 * dw;
        }

        // Velocity from the pipe flow through the cell. Dry cells get an
        // explicit zero instead of a division.
        let mean_column = &self.delta;
        self.velocity.par_iter_mut().enumerate().for_each(|(i, v)| {
            let wbar = mean_column[i];
            if wbar <= DRY_EPS {
                *v = Vec2::ZERO;
                return;
            }
            let (x, y) = grid.coords(i);
            let f = flux[i];
            let flow_x = 0.5
                * ((inflow(grid, flux, x, y, 1) - f[1]) + (f[2] - inflow(grid, flux, x, y, 2)));
            let flow_y = 0.5
                * ((inflow(grid, flux, x, y, 0) - f[0]) + (f[3] - inflow(grid, flux, x, y, 3)));
            *v = Vec2::new(
                flow_x / (p.meters_per_y * wbar),
                flow_y / (p.meters_per_x * wbar),
            );
        });
    }
}
