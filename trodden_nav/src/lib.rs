// trodden_nav — concurrent pathfinding over a desire-path lattice.
//
// This crate is the navigation core for agent simulations: many mobile
// agents request routes across a dynamically obstructed, weighted lattice
// graph and receive simplified, walkable polylines — without the
// simulation's update loop ever blocking on a search. Obstacles come and go
// at runtime as polygon footprints; foot traffic wears desire paths into
// the ground (cheaper to traverse, regrowing over time); finished paths
// arrive pre-reduced to a handful of waypoints ready for straight-line
// interpolation.
//
// Module overview:
// - `types.rs`:       NodeId, WorldPos, connector tags.
// - `config.rs`:      NavConfig — every tunable, JSON-loadable.
// - `terrain.rs`:     TerrainSampler — the terrain collaborator seam.
// - `graph.rs`:       NavNode/NavGraph — lattice build, obstructions,
//                     desire-path wear/regrowth, dynamic connectors.
// - `pathfinding.rs`: weighted A* with node and predicate goals.
// - `simplify.rs`:    greedy shortcutting over raw grid paths.
// - `scheduler.rs`:   request lifecycle + fixed worker-thread pool.
// - `path.rs`:        finished paths and the movement cursor.
//
// The ground-plane geometry (cell addressing, supercover traversal,
// polygon rasterization) lives in the companion crate `trodden_grid`,
// re-exported here as `grid`.
//
// **Critical constraint: the simulation thread never blocks.** Searches run
// on dedicated workers against the shared graph while the simulation
// mutates obstructions, desirability, and connectors. Graph state is
// layered for that exact concurrency (atomics per node, per-node edge
// locks, one structural lock); see `graph.rs` before changing any of it.

pub mod config;
pub mod graph;
pub mod path;
pub mod pathfinding;
pub mod scheduler;
pub mod simplify;
pub mod terrain;
pub mod types;

pub use trodden_grid as grid;
