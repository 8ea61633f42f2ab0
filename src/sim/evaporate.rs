//! Evaporation, the last stage of a tick.

use super::Simulation;

impl Simulation {
    /// Removes `kEvap(x, y) * W * dt` from every water column.
    ///
    /// `W` is the engine's cached water level, current as of the transport
    /// stage; the accessor's clamp keeps the stored column at zero or above.
    pub fn evaporate<A, K>(&mut self, mut add_water: A, evaporation: K)
    where
        A: FnMut(usize, usize, f32) -> f32,
        K: Fn(usize, usize) -> f32,
    {
        let dt = self.params.time_step;
        for i in 0..self.grid.len() {
            let (x, y) = self.grid.coords(i);
            let level = self.water_level[i];
            self.water_level[i] = add_water(x, y, -evaporation(x, y) * level * dt);
        }
    }
}
