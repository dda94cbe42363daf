// The terrain collaborator seam.
//
// The navigation core never generates or stores terrain. Everything it
// needs from the outside world is behind `TerrainSampler`: whether a ground
// coordinate is walkable, and the terrain height there. Graph build samples
// both per lattice cell; the simplifier samples height to project shortcut
// waypoints back onto the ground.
//
// Implementations must be `Send + Sync` — samples are taken concurrently
// from pathfinding workers and the simulation thread.

/// Read access to the terrain this graph covers.
pub trait TerrainSampler: Send + Sync {
    /// Whether the ground at `(x, z)` can be walked on at all. The graph
    /// additionally restricts walkability to the configured height band.
    fn sample_walkable(&self, x: f32, z: f32) -> bool;

    /// Terrain height at `(x, z)`. Only meaningful where walkable.
    fn sample_height(&self, x: f32, z: f32) -> f32;
}

/// Endless flat terrain at a fixed height. Useful for tests and for worlds
/// whose walkability is driven entirely by obstructions.
#[derive(Clone, Copy, Debug, Default)]
pub struct FlatTerrain {
    pub height: f32,
}

impl FlatTerrain {
    pub fn new(height: f32) -> Self {
        Self { height }
    }
}

impl TerrainSampler for FlatTerrain {
    fn sample_walkable(&self, _x: f32, _z: f32) -> bool {
        true
    }

    fn sample_height(&self, _x: f32, _z: f32) -> f32 {
        self.height
    }
}
