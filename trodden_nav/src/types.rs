// Core types shared across the navigation service.
//
// Defines the node identifier, the 3D world position carried by every node
// and waypoint, and the connector tag for off-lattice nodes attached by
// buildings and work sites. All data types derive `Serialize`/`Deserialize`
// so callers can persist requests and finished paths.
//
// See also: `graph.rs` for the nodes these types identify, `path.rs` for
// the waypoints that carry `WorldPos`.

use serde::{Deserialize, Serialize};
use std::fmt;
use trodden_grid::GroundPos;

/// Identifies one navigation node. Ids are assigned from a single counter at
/// graph build / connector attach time and are never reused within one graph
/// instance.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct NodeId(pub u32);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// A position in 3D world space. The ground plane is X/Z; Y is height,
/// sampled from the terrain collaborator.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct WorldPos {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl WorldPos {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Euclidean distance to another position.
    pub fn distance(self, other: Self) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }

    /// Linear interpolation toward `other` by `t` (unclamped).
    pub fn lerp(self, other: Self, t: f32) -> Self {
        Self {
            x: self.x + (other.x - self.x) * t,
            y: self.y + (other.y - self.y) * t,
            z: self.z + (other.z - self.z) * t,
        }
    }

    /// The ground-plane projection of this position.
    pub fn ground(self) -> GroundPos {
        GroundPos::new(self.x, self.z)
    }
}

impl fmt::Display for WorldPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.3}, {:.3}, {:.3})", self.x, self.y, self.z)
    }
}

/// What an off-lattice connector node is attached to. Goal predicates
/// dispatch on this tag (e.g. "nearest unclaimed work site"); the search
/// engine itself only uses the common neighbor/cost/accessibility contract.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectorKind {
    /// A building entrance or exit.
    Entrance,
    /// A work point (construction site, workstation).
    WorkSite,
    /// A storage access point.
    Storage,
}

/// The role of a node within the graph.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeKind {
    /// A regular lattice node created at graph build time.
    Lattice,
    /// An off-lattice node attached by a dynamic connector.
    Connector(ConnectorKind),
    /// A temporary node synthesized for one search's off-grid start or
    /// goal. Never stored in the graph; discarded with the request.
    Transient,
}
