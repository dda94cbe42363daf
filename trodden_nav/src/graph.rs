// The navigation graph: a node lattice over walkable terrain.
//
// Nodes sit at lattice cell centers, projected onto the terrain. Each node
// carries a neighbor edge list with precomputed Euclidean distances, a
// desirability value (lower = more worn = cheaper to traverse at positive
// trail blend), and a reference-counted obstruction counter. The graph owns
// every node and provides O(1) cell lookup, polygon obstruction stamping,
// desire-path wear and regrowth, and dynamic connector attach/detach for
// building entrances and work sites.
//
// See also: `pathfinding.rs` which searches this graph, `simplify.rs` which
// re-validates shortcuts against it, `config.rs` for the lattice and
// desirability parameters, `terrain.rs` for the sampling seam.
//
// **Critical constraint: concurrent reads during mutation.** Searches run
// on worker threads while the simulation thread stamps obstructions, wears
// and regrows desirability, and attaches/detaches connectors. Desirability
// and obstruction counters are lock-free atomics (monotonic visibility is
// all searches need); neighbor lists sit behind per-node `RwLock`s so a
// reader never observes a torn edge list; the node/cell index takes its
// `RwLock` exclusively only for rare structural changes. Lock order is
// always index before edge list, never the reverse.

use crate::config::NavConfig;
use crate::terrain::TerrainSampler;
use crate::types::{ConnectorKind, NodeId, NodeKind, WorldPos};
use log::{debug, info, warn};
use rayon::prelude::*;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use std::sync::atomic::{AtomicI32, AtomicU32, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;
use trodden_grid::{CellCoord, GroundPos, GroundRect, Lattice, Polygon};

// ---------------------------------------------------------------------------
// Nodes and edges
// ---------------------------------------------------------------------------

/// A weighted connection to a neighboring node. Edges are symmetric: if A
/// carries `Edge { to: B, distance: d }` then B carries the mirror edge.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Edge {
    pub to: NodeId,
    pub distance: f32,
}

/// One navigation node. Structure (id, cell, position, kind) is immutable
/// after creation; desirability, obstruction count, and the neighbor list
/// mutate for the life of the graph.
#[derive(Debug)]
pub struct NavNode {
    id: NodeId,
    cell: CellCoord,
    kind: NodeKind,
    position: WorldPos,
    edges: RwLock<SmallVec<[Edge; 8]>>,
    desirability_bits: AtomicU32,
    obstruction: AtomicI32,
}

impl NavNode {
    pub(crate) fn new(
        id: NodeId,
        cell: CellCoord,
        kind: NodeKind,
        position: WorldPos,
        desirability: f32,
    ) -> Self {
        Self {
            id,
            cell,
            kind,
            position,
            edges: RwLock::new(SmallVec::new()),
            desirability_bits: AtomicU32::new(desirability.to_bits()),
            obstruction: AtomicI32::new(0),
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn cell(&self) -> CellCoord {
        self.cell
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn position(&self) -> WorldPos {
        self.position
    }

    /// Current desirability, within the configured clamp band.
    pub fn desirability(&self) -> f32 {
        f32::from_bits(self.desirability_bits.load(Ordering::Relaxed))
    }

    /// Number of obstructions currently covering this node.
    pub fn obstruction_count(&self) -> i32 {
        self.obstruction.load(Ordering::Relaxed)
    }

    /// A node can be traversed only while no obstruction covers it.
    pub fn is_accessible(&self) -> bool {
        self.obstruction_count() <= 0
    }

    /// Snapshot of the neighbor list. Cloning under the read lock means
    /// callers iterate without holding the lock and never see a torn list.
    pub fn edges(&self) -> SmallVec<[Edge; 8]> {
        self.edges.read().expect("node edge list poisoned").clone()
    }

    pub(crate) fn shift_desirability(&self, delta: f32, min: f32, max: f32) {
        // fetch_update loops on contention; lost precision is acceptable,
        // lost updates are not.
        let _ = self
            .desirability_bits
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |bits| {
                let value = (f32::from_bits(bits) + delta).clamp(min, max);
                Some(value.to_bits())
            });
    }

    pub(crate) fn shift_obstruction(&self, delta: i32) {
        self.obstruction.fetch_add(delta, Ordering::Relaxed);
    }

    pub(crate) fn push_edge(&self, edge: Edge) {
        self.edges
            .write()
            .expect("node edge list poisoned")
            .push(edge);
    }

    pub(crate) fn remove_edges_to(&self, target: NodeId) {
        self.edges
            .write()
            .expect("node edge list poisoned")
            .retain(|e| e.to != target);
    }
}

// ---------------------------------------------------------------------------
// Graph
// ---------------------------------------------------------------------------

/// Node and edge counts, mainly for build logging and sanity checks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GraphStats {
    pub nodes: usize,
    pub edges: usize,
    pub connectors: usize,
}

struct GraphIndex {
    nodes: FxHashMap<NodeId, Arc<NavNode>>,
    by_cell: FxHashMap<CellCoord, NodeId>,
}

/// The navigation graph. One instance per world; built from terrain
/// sampling, rebuilt wholesale on terrain regeneration, and shared behind
/// an `Arc` between the simulation thread and the pathfinding workers.
pub struct NavGraph {
    lattice: Lattice,
    terrain: Arc<dyn TerrainSampler>,
    config: NavConfig,
    index: RwLock<GraphIndex>,
    next_id: AtomicU32,
}

/// The four 8-neighborhood directions that are later in scan order. Wiring
/// only these from each node creates every symmetric edge pair exactly once.
const LATER_NEIGHBORS: [(i32, i32); 4] = [(1, 0), (-1, 1), (0, 1), (1, 1)];

impl NavGraph {
    /// Create an empty graph over `terrain`. Call `build` to populate it.
    pub fn new(terrain: Arc<dyn TerrainSampler>, config: &NavConfig) -> Self {
        Self {
            lattice: Lattice::new(config.cells_per_unit),
            terrain,
            config: config.clone(),
            index: RwLock::new(GraphIndex {
                nodes: FxHashMap::default(),
                by_cell: FxHashMap::default(),
            }),
            next_id: AtomicU32::new(0),
        }
    }

    pub fn lattice(&self) -> Lattice {
        self.lattice
    }

    pub fn config(&self) -> &NavConfig {
        &self.config
    }

    pub fn terrain(&self) -> &Arc<dyn TerrainSampler> {
        &self.terrain
    }

    fn read_index(&self) -> RwLockReadGuard<'_, GraphIndex> {
        self.index.read().expect("graph index poisoned")
    }

    fn write_index(&self) -> RwLockWriteGuard<'_, GraphIndex> {
        self.index.write().expect("graph index poisoned")
    }

    /// Populate the lattice: one node per cell within `bounds` whose terrain
    /// sample is walkable and whose height falls inside the configured band,
    /// then wire lattice neighbors with Euclidean-distance edges. Replaces
    /// any previous contents (wholesale rebuild on terrain regeneration).
    pub fn build(&self, bounds: GroundRect) {
        let mut index = self.write_index();
        index.nodes.clear();
        index.by_cell.clear();

        let min_cell = self.lattice.cell_at(bounds.min);
        let max_cell = self.lattice.cell_at(bounds.max);

        for z in min_cell.z..=max_cell.z {
            for x in min_cell.x..=max_cell.x {
                let cell = CellCoord::new(x, z);
                let center = self.lattice.cell_center(cell);
                if !self.terrain.sample_walkable(center.x, center.z) {
                    continue;
                }
                let height = self.terrain.sample_height(center.x, center.z);
                if height < self.config.walkable_height_min
                    || height > self.config.walkable_height_max
                {
                    continue;
                }
                let id = NodeId(self.next_id.fetch_add(1, Ordering::Relaxed));
                let node = NavNode::new(
                    id,
                    cell,
                    NodeKind::Lattice,
                    WorldPos::new(center.x, height, center.z),
                    self.config.max_desirability,
                );
                index.by_cell.insert(cell, id);
                index.nodes.insert(id, Arc::new(node));
            }
        }

        // Second pass: wire each node to its scan-order-later neighbors.
        let placed: Vec<(CellCoord, NodeId)> =
            index.by_cell.iter().map(|(c, id)| (*c, *id)).collect();
        let mut edge_pairs = 0usize;
        for (cell, id) in placed {
            for (dx, dz) in LATER_NEIGHBORS {
                let neighbor_cell = CellCoord::new(cell.x + dx, cell.z + dz);
                if let Some(&neighbor_id) = index.by_cell.get(&neighbor_cell) {
                    let a = &index.nodes[&id];
                    let b = &index.nodes[&neighbor_id];
                    let distance = a.position().distance(b.position());
                    a.push_edge(Edge {
                        to: neighbor_id,
                        distance,
                    });
                    b.push_edge(Edge { to: id, distance });
                    edge_pairs += 1;
                }
            }
        }

        info!(
            "built navigation graph: {} nodes, {} edges over cells {}..{}",
            index.nodes.len(),
            edge_pairs,
            min_cell,
            max_cell,
        );
    }

    /// Drop every node. The graph behaves as before `build`.
    pub fn clear(&self) {
        let mut index = self.write_index();
        index.nodes.clear();
        index.by_cell.clear();
    }

    /// Allocate an id for a node that will not be stored in the graph
    /// (synthetic search endpoints).
    pub(crate) fn allocate_transient_id(&self) -> NodeId {
        NodeId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Look up a node by id.
    pub fn node(&self, id: NodeId) -> Option<Arc<NavNode>> {
        self.read_index().nodes.get(&id).cloned()
    }

    /// The node occupying the lattice cell containing `pos`, if any. Exact
    /// scaled-and-rounded lookup, O(1).
    pub fn node_at(&self, pos: GroundPos) -> Option<Arc<NavNode>> {
        self.node_at_cell(self.lattice.cell_at(pos))
    }

    /// The node occupying `cell`, if any.
    pub fn node_at_cell(&self, cell: CellCoord) -> Option<Arc<NavNode>> {
        let index = self.read_index();
        index
            .by_cell
            .get(&cell)
            .map(|id| index.nodes[id].clone())
    }

    /// The up-to-four lattice nodes whose cells surround `pos` (floor/ceil
    /// of both scaled axes). Used to splice an off-grid point into the
    /// graph without mutating it permanently.
    pub fn corner_nodes(&self, pos: GroundPos, accessible_only: bool) -> Vec<Arc<NavNode>> {
        let index = self.read_index();
        let mut out = Vec::with_capacity(4);
        for cell in self.lattice.corner_cells(pos) {
            if let Some(id) = index.by_cell.get(&cell) {
                let node = index.nodes[id].clone();
                if !accessible_only || node.is_accessible() {
                    out.push(node);
                }
            }
        }
        out
    }

    /// Raise the obstruction counter of every node covered by `footprint`.
    pub fn apply_obstruction(&self, footprint: &Polygon) {
        self.stamp_obstruction(footprint, 1);
    }

    /// Exactly undo a previous `apply_obstruction` with the same footprint.
    /// Counters, not booleans: overlapping obstructions compose and removal
    /// restores the prior counts.
    pub fn remove_obstruction(&self, footprint: &Polygon) {
        self.stamp_obstruction(footprint, -1);
    }

    fn stamp_obstruction(&self, footprint: &Polygon, delta: i32) {
        let index = self.read_index();
        let mut covered = 0usize;
        for cell in footprint.covered_cells(self.lattice) {
            if let Some(id) = index.by_cell.get(&cell) {
                index.nodes[id].shift_obstruction(delta);
                covered += 1;
            }
        }
        debug!("obstruction {delta:+} stamped on {covered} nodes");
    }

    /// Move every node's desirability toward its maximum by `amount` —
    /// vegetation regrowing over worn trails. Called on a fixed wall-clock
    /// interval by the owning simulation (see `RegrowthClock`).
    pub fn regrow(&self, amount: f32) {
        let index = self.read_index();
        let min = self.config.min_desirability;
        let max = self.config.max_desirability;
        index
            .nodes
            .par_iter()
            .for_each(|(_, node)| node.shift_desirability(amount, min, max));
    }

    /// Lower desirability along a freshly found path — foot traffic wearing
    /// the trail in. Ids that no longer resolve (a connector detached
    /// mid-flight) are skipped.
    pub fn wear_trail(&self, nodes: &[NodeId], amount: f32) {
        let index = self.read_index();
        let min = self.config.min_desirability;
        let max = self.config.max_desirability;
        for id in nodes {
            if let Some(node) = index.nodes.get(id) {
                node.shift_desirability(-amount, min, max);
            }
        }
    }

    /// Attach an off-lattice connector node (building entrance, work site)
    /// at `pos`, wired to the 1–4 surrounding lattice nodes with true
    /// Euclidean distances. Returns `None` when no surrounding lattice node
    /// exists (off the walkable map).
    pub fn attach_connector(&self, pos: GroundPos, kind: ConnectorKind) -> Option<NodeId> {
        let mut index = self.write_index();

        let mut anchors: Vec<Arc<NavNode>> = Vec::with_capacity(4);
        for cell in self.lattice.corner_cells(pos) {
            if let Some(id) = index.by_cell.get(&cell) {
                anchors.push(index.nodes[id].clone());
            }
        }
        if anchors.is_empty() {
            warn!("connector at {pos} has no surrounding lattice nodes; not attached");
            return None;
        }

        let id = NodeId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let height = self.terrain.sample_height(pos.x, pos.z);
        let node = Arc::new(NavNode::new(
            id,
            self.lattice.cell_at(pos),
            NodeKind::Connector(kind),
            WorldPos::new(pos.x, height, pos.z),
            self.config.max_desirability,
        ));
        for anchor in &anchors {
            let distance = node.position().distance(anchor.position());
            node.push_edge(Edge {
                to: anchor.id(),
                distance,
            });
            anchor.push_edge(Edge { to: id, distance });
        }
        index.nodes.insert(id, node);
        debug!("attached {kind:?} connector {id} at {pos} ({} anchors)", anchors.len());
        Some(id)
    }

    /// Detach a connector and remove every reverse edge referencing it.
    /// Returns false when `id` is not a connector node. Leaving a reverse
    /// edge behind would dangle once the node is gone; the symmetry tests
    /// cover this.
    pub fn detach_connector(&self, id: NodeId) -> bool {
        let mut index = self.write_index();
        let Some(node) = index.nodes.remove(&id) else {
            return false;
        };
        if !matches!(node.kind(), NodeKind::Connector(_)) {
            index.nodes.insert(id, node);
            return false;
        }
        for edge in node.edges() {
            if let Some(neighbor) = index.nodes.get(&edge.to) {
                neighbor.remove_edges_to(id);
            }
        }
        debug!("detached connector {id}");
        true
    }

    /// Current node/edge/connector counts.
    pub fn stats(&self) -> GraphStats {
        let index = self.read_index();
        let mut edge_ends = 0usize;
        let mut connectors = 0usize;
        for node in index.nodes.values() {
            edge_ends += node.edges().len();
            if matches!(node.kind(), NodeKind::Connector(_)) {
                connectors += 1;
            }
        }
        GraphStats {
            nodes: index.nodes.len(),
            edges: edge_ends / 2,
            connectors,
        }
    }

    /// Snapshot of every node id, in unspecified order.
    pub fn node_ids(&self) -> Vec<NodeId> {
        self.read_index().nodes.keys().copied().collect()
    }
}

// ---------------------------------------------------------------------------
// Regrowth clock
// ---------------------------------------------------------------------------

/// Accumulates simulation wall-clock time and fires a regrowth pass each
/// time the configured interval elapses. The owning simulation feeds it
/// frame deltas; it owns no thread of its own.
#[derive(Debug)]
pub struct RegrowthClock {
    interval: Duration,
    amount: f32,
    accumulated: Duration,
}

impl RegrowthClock {
    pub fn new(config: &NavConfig) -> Self {
        Self {
            interval: Duration::from_secs_f32(config.regrowth_interval_secs.max(f32::EPSILON)),
            amount: config.regrowth_amount,
            accumulated: Duration::ZERO,
        }
    }

    /// Advance by `dt`, applying one regrowth pass per elapsed interval.
    /// Returns how many passes fired.
    pub fn advance(&mut self, dt: Duration, graph: &NavGraph) -> u32 {
        self.accumulated += dt;
        let mut fired = 0;
        while self.accumulated >= self.interval {
            self.accumulated -= self.interval;
            graph.regrow(self.amount);
            fired += 1;
        }
        fired
    }
}
