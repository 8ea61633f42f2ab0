//! Sediment transport: bed exchange, then advection. Third stage of a tick.

use rayon::prelude::*;

use super::Simulation;
use crate::grid::Grid;

impl Simulation {
    /// Erodes or deposits material depending on how the local carry capacity
    /// `kC * tilt * |velocity|` compares to the suspended load, then advects
    /// the sediment field along the velocity.
    ///
    /// Height deltas are staged in the scratch buffer and flushed through
    /// `add_height` after the per-cell loop, so every cell works from
    /// start-of-step heights regardless of traversal order. Advection writes
    /// into the spare sediment buffer and swaps; sampling outside the grid
    /// clamps to the nearest edge, which makes boundaries absorb their own
    /// sediment rather than invent or lose any.
    pub fn transport_sediment<C, D, E, A>(
        &mut self,
        carry_capacity: C,
        deposition: D,
        erosion: E,
        mut add_height: A,
    ) where
        C: Fn(usize, usize) -> f32 + Sync,
        D: Fn(usize, usize) -> f32 + Sync,
        E: Fn(usize, usize) -> f32 + Sync,
        A: FnMut(usize, usize, f32),
    {
        let grid = self.grid;
        let p = self.params;
        let dt = p.time_step;

        let (tilt, velocity) = (&self.tilt, &self.velocity);
        self.sediment
            .par_iter_mut()
            .zip(self.delta.par_iter_mut())
            .enumerate()
            .for_each(|(i, (sediment, delta))| {
                let (x, y) = grid.coords(i);
                let capacity = carry_capacity(x, y) * tilt[i] * velocity[i].length();
                if capacity > *sediment {
                    let eroded = erosion(x, y) * (capacity - *sediment);
                    *sediment += eroded;
                    *delta = -eroded;
                } else if capacity < *sediment {
                    let settled = deposition(x, y) * (*sediment - capacity);
                    *sediment -= settled;
                    *delta = settled;
                } else {
                    *delta = 0.0;
                }
            });

        for i in 0..grid.len() {
            let (x, y) = grid.coords(i);
            add_height(x, y, self.delta[i]);
        }

        // Semi-Lagrangian advection: trace the velocity backwards one step
        // and sample the pre-advection field at the traced position.
        let sediment = &self.sediment;
        self.sediment_next
            .par_iter_mut()
            .enumerate()
            .for_each(|(i, out)| {
                let (x, y) = grid.coords(i);
                let v = velocity[i];
                let px = x as f32 - v.x * dt / p.meters_per_x;
                let py = y as f32 - v.y * dt / p.meters_per_y;
                *out = sample_bilinear(sediment, grid, px, py);
            });
        std::mem::swap(&mut self.sediment, &mut self.sediment_next);

        debug_assert!(
            self.sediment.iter().all(|&s| !(s < 0.0)),
            "negative sediment"
        );
    }
}

/// Bilinear sample at a fractional cell coordinate; out-of-range positions
/// clamp to the nearest edge. The weighted form keeps mirrored inputs
/// bitwise-mirrored.
fn sample_bilinear(field: &[f32], grid: Grid, px: f32, py: f32) -> f32 {
    let x0 = px.floor();
    let y0 = py.floor();
    let u = px - x0;
    let v = py - y0;
    let (x0, y0) = (x0 as i32, y0 as i32);
    let at = |x: i32, y: i32| {
        let (cx, cy) = grid.clamp(x, y);
        field[grid.index(cx, cy)]
    };
    let near = (1.0 - u) * at(x0, y0) + u * at(x0 + 1, y0);
    let far = (1.0 - u) * at(x0, y0 + 1) + u * at(x0 + 1, y0 + 1);
    (1.0 - v) * near + v * far
}
