//! Water seeding for rainfall episodes.

use rand::Rng;

use crate::terrain::TerrainModel;

/// Adds a uniform depth of water to every cell.
pub fn rain_uniform<T: TerrainModel>(terrain: &mut T, depth: f32) {
    for y in 0..terrain.height() {
        for x in 0..terrain.width() {
            terrain.add_water(x, y, depth);
        }
    }
}

/// Adds an independently drawn depth in `[min_depth, max_depth)` to every
/// cell. Pass a seeded RNG for reproducible rainfalls.
pub fn rain_random<T, R>(terrain: &mut T, rng: &mut R, min_depth: f32, max_depth: f32)
where
    T: TerrainModel,
    R: Rng,
{
    let span = max_depth - min_depth;
    for y in 0..terrain.height() {
        for x in 0..terrain.width() {
            terrain.add_water(x, y, min_depth + rng.random::<f32>() * span);
        }
    }
}
