//! Pipe-flux and tilt update, the first stage of a tick.

use rayon::prelude::*;

use super::{pipe_sum, Simulation, DIR_X, DIR_Y};

impl Simulation {
    /// Updates the four outflow pipes of every cell from the water-surface
    /// head differences, then computes the per-cell surface tilt.
    ///
    /// Outflows accumulate across ticks (the pipes carry momentum) and are
    /// scaled down whenever a cell would otherwise drain more than its
    /// column holds in one time step. That scaling is what keeps the water
    /// transport stage from driving any column negative.
    ///
    /// No error surface: non-finite heights or water levels propagate.
    pub fn compute_flow_and_tilt<H, W>(&mut self, height: H, water: W)
    where
        H: Fn(usize, usize) -> f32 + Sync,
        W: Fn(usize, usize) -> f32 + Sync,
    {
        let grid = self.grid;
        let p = self.params;
        let dt = p.time_step;

        // Snapshot the water levels once. The scaling pass and the later
        // stages (velocity averaging, evaporation) read from this.
        self.water_level
            .par_iter_mut()
            .enumerate()
            .for_each(|(i, level)| {
                let (x, y) = grid.coords(i);
                *level = water(x, y);
            });

        let water_level = &self.water_level;

        // Tentative outflows against each in-grid neighbor; boundary pipes
        // stay pinned to zero.
        self.flux.par_iter_mut().enumerate().for_each(|(i, flux)| {
            let (x, y) = grid.coords(i);
            let surface = height(x, y) + water_level[i];
            for dir in 0..4 {
                let nx = x as i32 + DIR_X[dir];
                let ny = y as i32 + DIR_Y[dir];
                if !grid.contains(nx, ny) {
                    flux[dir] = 0.0;
                    continue;
                }
                let (nx, ny) = (nx as usize, ny as usize);
                let head = surface - (height(nx, ny) + water_level[grid.index(nx, ny)]);
                let length = if DIR_X[dir] != 0 {
                    p.meters_per_x
                } else {
                    p.meters_per_y
                };
                let gain = dt * p.pipe_cross_section * p.gravity * head / length;
                flux[dir] = (flux[dir] + gain).max(0.0);
            }
        });

        // Scale outflows so a cell cannot push out more volume over dt than
        // its column holds.
        let cell_area = p.meters_per_x * p.meters_per_y;
        self.flux.par_iter_mut().enumerate().for_each(|(i, flux)| {
            let volume = pipe_sum(flux) * dt;
            if volume <= 0.0 {
                return;
            }
            let scale = (water_level[i] * cell_area / volume).clamp(0.0, 1.0);
            if scale < 1.0 {
                for f in flux.iter_mut() {
                    *f *= scale;
                }
            }
        });

        // Tilt: sine of the inclination from the height gradient, central
        // differences inside, one-sided at the boundary.
        self.tilt.par_iter_mut().enumerate().for_each(|(i, tilt)| {
            let (x, y) = grid.coords(i);
            let h = height(x, y);
            let gx = if x == 0 {
                (height(x + 1, y) - h) / p.meters_per_x
            } else if x == grid.width() - 1 {
                (h - height(x - 1, y)) / p.meters_per_x
            } else {
                (height(x + 1, y) - height(x - 1, y)) / (2.0 * p.meters_per_x)
            };
            let gy = if y == 0 {
                (height(x, y + 1) - h) / p.meters_per_y
            } else if y == grid.height() - 1 {
                (h - height(x, y - 1)) / p.meters_per_y
            } else {
                (height(x, y + 1) - height(x, y - 1)) / (2.0 * p.meters_per_y)
            };
            let g2 = gx * gx + gy * gy;
            *tilt = (g2.sqrt() / (1.0 + g2).sqrt()).max(p.min_tilt);
        });

        debug_assert!(
            self.flux.iter().flatten().all(|&f| !(f < 0.0)),
            "negative pipe flux"
        );
    }
}
