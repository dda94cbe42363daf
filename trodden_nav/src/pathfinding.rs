// A* search over the navigation graph.
//
// Implements weighted A* using a `BinaryHeap` (min-heap via reversed
// ordering) over per-search frontier entries: node, parent index (-1 for
// the start), accumulated cost, heuristic, and an open/closed flag. The
// frontier lives in a `SearchScratch` that workers reuse across requests —
// it is fully reset at search start and never leaks state between requests.
//
// Two goal modes share the one algorithm: a fixed target node, or a
// caller-supplied predicate over nodes ("is an unclaimed work site") with
// an optional directional hint. Edge cost blends raw distance with the
// endpoints' desirability by the request's trail blend factor, so callers
// choose per request how strongly worn trails attract the search.
//
// Off-grid endpoints are handled by synthesizing a temporary node at the
// exact position and wiring it to the surrounding lattice corners; the
// goal-side reverse edges are removed by a drop guard when the search ends,
// however it ends.
//
// Tie-break: among equal f-scores the heap's internal order wins, which is
// not stable across container implementations. Total cost is deterministic;
// the exact node sequence between equal-cost alternatives is not promised.
//
// See also: `graph.rs` for the graph being searched, `scheduler.rs` for the
// workers that call this, `simplify.rs` for the post-pass on raw paths.

use crate::graph::{Edge, NavGraph, NavNode};
use crate::path::{Path, Waypoint};
use crate::types::{NodeId, NodeKind, WorldPos};
use log::{debug, trace};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::fmt;
use std::sync::Arc;
use trodden_grid::GroundPos;

// ---------------------------------------------------------------------------
// Requests and outcomes
// ---------------------------------------------------------------------------

/// Terminal result of one search. Every request ends in exactly one of
/// these; none of them cross the scheduler boundary as a panic.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SearchOutcome {
    /// A path to the goal was found.
    Success,
    /// The start already satisfies the goal; the path is a single waypoint.
    AtDestination,
    /// The open set emptied without reaching the goal.
    NoPath,
    /// The iteration ceiling was hit (guards against pathological graphs).
    TooManyTries,
    /// The cheapest remaining candidate exceeded the request's cost budget.
    TooFar,
    /// The start anchor is obstructed or has no accessible surroundings.
    /// Retrying with the same arguments will fail identically.
    StartObstructed,
    /// The goal anchor is obstructed and the request does not allow that.
    /// Retrying with the same arguments will fail identically.
    EndObstructed,
}

impl SearchOutcome {
    /// Whether this outcome carries a usable path.
    pub fn found_path(self) -> bool {
        matches!(self, SearchOutcome::Success | SearchOutcome::AtDestination)
    }
}

/// Caller-supplied goal test for predicate searches. Runs on a worker
/// thread, possibly many times per search; keep it cheap and pure.
pub type GoalPredicate = Arc<dyn Fn(&NavNode) -> bool + Send + Sync>;

/// What a request is searching for.
#[derive(Clone)]
pub enum PathGoal {
    /// An exact ground position (spliced into the graph if off-grid).
    Position(GroundPos),
    /// A specific node, e.g. a connector handed out by `attach_connector`.
    Node(NodeId),
    /// The nearest node matching `accept`. With no `toward` hint the search
    /// is plain Dijkstra; with one, Euclidean distance toward the hint
    /// biases expansion.
    Predicate {
        accept: GoalPredicate,
        toward: Option<GroundPos>,
    },
}

impl fmt::Debug for PathGoal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathGoal::Position(pos) => f.debug_tuple("Position").field(pos).finish(),
            PathGoal::Node(id) => f.debug_tuple("Node").field(id).finish(),
            PathGoal::Predicate { toward, .. } => f
                .debug_struct("Predicate")
                .field("toward", toward)
                .finish_non_exhaustive(),
        }
    }
}

/// Immutable parameters of one pathfinding request.
#[derive(Clone, Debug)]
pub struct PathRequest {
    pub start: GroundPos,
    /// Explicit start node (e.g. the connector an agent stands on). When
    /// set, `start` is only informational.
    pub start_node: Option<NodeId>,
    pub goal: PathGoal,
    /// Abandon the search once the cheapest remaining candidate costs more
    /// than this.
    pub max_cost: f32,
    /// 0 = ignore desire paths entirely, 1 = fully prefer worn trails.
    pub trail_blend: f32,
    /// Permit ending on an obstructed node — agents may path into their own
    /// future workplace while it is still blocked.
    pub allow_obstructed_goal: bool,
}

impl PathRequest {
    pub fn to_position(start: GroundPos, end: GroundPos) -> Self {
        Self {
            start,
            start_node: None,
            goal: PathGoal::Position(end),
            max_cost: f32::INFINITY,
            trail_blend: 0.0,
            allow_obstructed_goal: false,
        }
    }

    pub fn to_node(start: GroundPos, end: NodeId) -> Self {
        Self {
            goal: PathGoal::Node(end),
            ..Self::to_position(start, start)
        }
    }

    pub fn to_predicate(start: GroundPos, accept: GoalPredicate) -> Self {
        Self {
            goal: PathGoal::Predicate {
                accept,
                toward: None,
            },
            ..Self::to_position(start, start)
        }
    }

    pub fn with_max_cost(mut self, max_cost: f32) -> Self {
        self.max_cost = max_cost;
        self
    }

    pub fn with_trail_blend(mut self, blend: f32) -> Self {
        self.trail_blend = blend;
        self
    }

    pub fn allowing_obstructed_goal(mut self) -> Self {
        self.allow_obstructed_goal = true;
        self
    }

    /// Directional hint for predicate goals; ignored for the other modes.
    pub fn toward(mut self, hint: GroundPos) -> Self {
        if let PathGoal::Predicate { toward, .. } = &mut self.goal {
            *toward = Some(hint);
        }
        self
    }
}

// ---------------------------------------------------------------------------
// Cost model
// ---------------------------------------------------------------------------

/// `lerp(1, desirability, blend)`: the traversal cost multiplier for ground
/// of the given desirability at the given trail blend.
pub(crate) fn blend_multiplier(desirability: f32, blend: f32) -> f32 {
    1.0 + (desirability - 1.0) * blend
}

/// Edge multiplier: blend over the average of the two endpoint
/// desirabilities.
fn edge_multiplier(a: f32, b: f32, blend: f32) -> f32 {
    blend_multiplier(0.5 * (a + b), blend)
}

// ---------------------------------------------------------------------------
// Frontier scratch state
// ---------------------------------------------------------------------------

struct FrontierEntry {
    node: NodeId,
    position: WorldPos,
    transient: bool,
    /// Index of the predecessor entry, -1 for the start.
    parent: i32,
    g: f32,
    h: f32,
    closed: bool,
}

/// Open-set handle into the entries vec. Reversed ordering turns the std
/// max-heap into a min-heap on f; ties fall back to entry index so the
/// ordering is total.
struct OpenSlot {
    entry: u32,
    f: f32,
}

impl PartialEq for OpenSlot {
    fn eq(&self, other: &Self) -> bool {
        self.f.total_cmp(&other.f) == Ordering::Equal && self.entry == other.entry
    }
}

impl Eq for OpenSlot {}

impl PartialOrd for OpenSlot {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OpenSlot {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .f
            .total_cmp(&self.f)
            .then_with(|| other.entry.cmp(&self.entry))
    }
}

/// Reusable per-search state. Each scheduler worker owns one and resets it
/// between requests, avoiding reallocation pressure under load.
#[derive(Default)]
pub struct SearchScratch {
    entries: Vec<FrontierEntry>,
    index: FxHashMap<NodeId, u32>,
    open: BinaryHeap<OpenSlot>,
}

impl SearchScratch {
    pub fn new() -> Self {
        Self::default()
    }

    fn reset(&mut self) {
        self.entries.clear();
        self.index.clear();
        self.open.clear();
    }

    /// Existing entry for `node`, or a fresh one at infinite cost.
    fn entry_for(&mut self, node: &NavNode, h: f32) -> u32 {
        if let Some(&idx) = self.index.get(&node.id()) {
            return idx;
        }
        let idx = self.entries.len() as u32;
        self.entries.push(FrontierEntry {
            node: node.id(),
            position: node.position(),
            transient: matches!(node.kind(), NodeKind::Transient),
            parent: -1,
            g: f32::INFINITY,
            h,
            closed: false,
        });
        self.index.insert(node.id(), idx);
        idx
    }
}

// ---------------------------------------------------------------------------
// Temporary goal wiring
// ---------------------------------------------------------------------------

/// Removes the reverse edges wired into real corner nodes for a synthetic
/// goal. Drop-based so no exit path — success, failure, or panic — can leak
/// the wiring into the shared graph.
struct TempWiring {
    anchors: SmallVec<[Arc<NavNode>; 4]>,
    synthetic: NodeId,
}

impl Drop for TempWiring {
    fn drop(&mut self) {
        for anchor in &self.anchors {
            anchor.remove_edges_to(self.synthetic);
        }
    }
}

// ---------------------------------------------------------------------------
// Search
// ---------------------------------------------------------------------------

fn node_exactly_at(graph: &NavGraph, pos: GroundPos) -> Option<Arc<NavNode>> {
    let node = graph.node_at(pos)?;
    let epsilon = graph.lattice().spacing() * 1e-3;
    (node.position().ground().distance(pos) <= epsilon).then_some(node)
}

fn make_transient(graph: &NavGraph, pos: GroundPos) -> Arc<NavNode> {
    let height = graph.terrain().sample_height(pos.x, pos.z);
    Arc::new(NavNode::new(
        graph.allocate_transient_id(),
        graph.lattice().cell_at(pos),
        NodeKind::Transient,
        WorldPos::new(pos.x, height, pos.z),
        graph.config().max_desirability,
    ))
}

fn waypoint_node(node: &NavNode) -> Option<NodeId> {
    (!matches!(node.kind(), NodeKind::Transient)).then_some(node.id())
}

/// Run one search. `scratch` is reset on entry and may be reused for the
/// next request afterwards.
pub fn search(
    graph: &NavGraph,
    request: &PathRequest,
    scratch: &mut SearchScratch,
) -> (SearchOutcome, Option<Path>) {
    scratch.reset();
    let config = graph.config();
    let blend = request.trail_blend.clamp(0.0, 1.0);
    // Scaled by the cheapest possible cost multiplier so the heuristic
    // stays admissible when worn trails undercut raw distance.
    let cheapest = blend_multiplier(config.min_desirability, blend);

    let mut transients: SmallVec<[Arc<NavNode>; 2]> = SmallVec::new();

    // Resolve the start anchor.
    let start_node: Arc<NavNode> = if let Some(id) = request.start_node {
        match graph.node(id) {
            Some(node) => node,
            None => {
                debug!("search failed: explicit start node {id} does not exist");
                return (SearchOutcome::NoPath, None);
            }
        }
    } else if let Some(node) = node_exactly_at(graph, request.start) {
        node
    } else {
        let anchors = graph.corner_nodes(request.start, true);
        if anchors.is_empty() {
            debug!(
                "search failed: start {} has no accessible surrounding nodes",
                request.start
            );
            return (SearchOutcome::StartObstructed, None);
        }
        let node = make_transient(graph, request.start);
        for anchor in &anchors {
            node.push_edge(Edge {
                to: anchor.id(),
                distance: node.position().distance(anchor.position()),
            });
        }
        transients.push(node.clone());
        node
    };
    if !start_node.is_accessible() {
        debug!("search failed: start node {} is obstructed", start_node.id());
        return (SearchOutcome::StartObstructed, None);
    }

    // Resolve the goal.
    let mut goal_node: Option<Arc<NavNode>> = None;
    let mut predicate: Option<&GoalPredicate> = None;
    let heuristic_target: Option<WorldPos>;
    // Nodes that may be entered even while obstructed: the goal itself and,
    // for an allowed-obstructed synthetic goal, its corner anchors.
    let mut goal_exempt: SmallVec<[NodeId; 5]> = SmallVec::new();
    let mut _wiring: Option<TempWiring> = None;

    match &request.goal {
        PathGoal::Node(id) => {
            let Some(node) = graph.node(*id) else {
                debug!("search failed: goal node {id} does not exist");
                return (SearchOutcome::NoPath, None);
            };
            if !node.is_accessible() && !request.allow_obstructed_goal {
                debug!("search failed: goal node {id} is obstructed");
                return (SearchOutcome::EndObstructed, None);
            }
            goal_exempt.push(node.id());
            heuristic_target = Some(node.position());
            goal_node = Some(node);
        }
        PathGoal::Position(pos) => {
            if let Some(node) = node_exactly_at(graph, *pos) {
                if !node.is_accessible() && !request.allow_obstructed_goal {
                    debug!("search failed: goal position {pos} is obstructed");
                    return (SearchOutcome::EndObstructed, None);
                }
                goal_exempt.push(node.id());
                heuristic_target = Some(node.position());
                goal_node = Some(node);
            } else {
                let anchors: SmallVec<[Arc<NavNode>; 4]> = graph
                    .corner_nodes(*pos, !request.allow_obstructed_goal)
                    .into_iter()
                    .collect();
                if anchors.is_empty() {
                    debug!("search failed: goal {pos} has no usable surrounding nodes");
                    return (SearchOutcome::EndObstructed, None);
                }
                let node = make_transient(graph, *pos);
                for anchor in &anchors {
                    anchor.push_edge(Edge {
                        to: node.id(),
                        distance: node.position().distance(anchor.position()),
                    });
                    if request.allow_obstructed_goal {
                        goal_exempt.push(anchor.id());
                    }
                }
                goal_exempt.push(node.id());
                _wiring = Some(TempWiring {
                    anchors: anchors.clone(),
                    synthetic: node.id(),
                });
                heuristic_target = Some(node.position());
                transients.push(node.clone());
                goal_node = Some(node);
            }
        }
        PathGoal::Predicate { accept, toward } => {
            predicate = Some(accept);
            heuristic_target = toward.map(|hint| {
                WorldPos::new(
                    hint.x,
                    graph.terrain().sample_height(hint.x, hint.z),
                    hint.z,
                )
            });
        }
    }

    trace!(
        "search from {} ({:?}), blend {blend}, budget {}",
        request.start, request.goal, request.max_cost
    );

    let resolve = |id: NodeId| -> Option<Arc<NavNode>> {
        transients
            .iter()
            .find(|n| n.id() == id)
            .cloned()
            .or_else(|| graph.node(id))
    };
    let h_of = |pos: WorldPos| -> f32 {
        heuristic_target.map_or(0.0, |target| pos.distance(target) * cheapest)
    };
    let reaches_goal = |id: NodeId, node: &Arc<NavNode>| -> bool {
        match (&goal_node, predicate) {
            (Some(goal), _) => id == goal.id(),
            (None, Some(accept)) => accept(node),
            _ => false,
        }
    };

    // Already there?
    if reaches_goal(start_node.id(), &start_node) {
        let path = Path::new(vec![Waypoint {
            position: start_node.position(),
            node: waypoint_node(&start_node),
            cost_from_start: 0.0,
        }]);
        return (SearchOutcome::AtDestination, Some(path));
    }

    let start_idx = scratch.entry_for(&start_node, h_of(start_node.position()));
    scratch.entries[start_idx as usize].g = 0.0;
    scratch.open.push(OpenSlot {
        entry: start_idx,
        f: scratch.entries[start_idx as usize].h,
    });

    let mut iterations: u32 = 0;
    let mut goal_entry: Option<usize> = None;

    let outcome = loop {
        let Some(slot) = scratch.open.pop() else {
            debug!("search failed: no path from {}", request.start);
            break SearchOutcome::NoPath;
        };
        let idx = slot.entry as usize;
        if scratch.entries[idx].closed {
            continue;
        }
        scratch.entries[idx].closed = true;

        iterations += 1;
        if iterations > config.max_search_iterations {
            debug!(
                "search failed: exceeded {} iterations",
                config.max_search_iterations
            );
            break SearchOutcome::TooManyTries;
        }
        let current_g = scratch.entries[idx].g;
        if current_g > request.max_cost {
            debug!(
                "search failed: cost {current_g:.3} exceeds budget {:.3}",
                request.max_cost
            );
            break SearchOutcome::TooFar;
        }

        let current_id = scratch.entries[idx].node;
        // A connector can detach mid-search; its queued entry just goes dead.
        let Some(current) = resolve(current_id) else {
            continue;
        };

        if reaches_goal(current_id, &current) {
            goal_entry = Some(idx);
            break SearchOutcome::Success;
        }

        for edge in current.edges() {
            let Some(neighbor) = resolve(edge.to) else {
                continue;
            };
            if !neighbor.is_accessible() && !goal_exempt.contains(&edge.to) {
                continue;
            }
            let h = h_of(neighbor.position());
            let n_idx = scratch.entry_for(&neighbor, h) as usize;
            if scratch.entries[n_idx].closed {
                continue;
            }
            let multiplier =
                edge_multiplier(current.desirability(), neighbor.desirability(), blend);
            let tentative = current_g + edge.distance * multiplier;
            if tentative < scratch.entries[n_idx].g {
                let entry = &mut scratch.entries[n_idx];
                entry.g = tentative;
                entry.parent = idx as i32;
                let f = tentative + entry.h;
                scratch.open.push(OpenSlot {
                    entry: n_idx as u32,
                    f,
                });
            }
        }
    };

    let path = goal_entry.map(|idx| {
        let mut waypoints = Vec::new();
        let mut cursor = idx as i32;
        while cursor >= 0 {
            let entry = &scratch.entries[cursor as usize];
            waypoints.push(Waypoint {
                position: entry.position,
                node: (!entry.transient).then_some(entry.node),
                cost_from_start: entry.g,
            });
            cursor = entry.parent;
        }
        waypoints.reverse();
        Path::new(waypoints)
    });

    if let Some(p) = &path {
        trace!(
            "path found: {} waypoints, cost {:.3}, {iterations} iterations",
            p.len(),
            p.total_cost()
        );
    }
    (outcome, path)
}

/// One-off search with its own scratch state. The scheduler's workers reuse
/// scratch across requests; this is for tests and synchronous callers.
pub fn find_path(graph: &NavGraph, request: &PathRequest) -> (SearchOutcome, Option<Path>) {
    let mut scratch = SearchScratch::new();
    search(graph, request, &mut scratch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NavConfig;
    use crate::terrain::FlatTerrain;
    use crate::types::ConnectorKind;
    use trodden_grid::{CellCoord, GroundRect, Polygon};

    const SQRT_2: f32 = std::f32::consts::SQRT_2;

    fn flat_graph(extent: f32, config: &NavConfig) -> NavGraph {
        let graph = NavGraph::new(Arc::new(FlatTerrain::default()), config);
        graph.build(GroundRect::new(
            GroundPos::new(0.0, 0.0),
            GroundPos::new(extent, extent),
        ));
        graph
    }

    fn cell_square(x: f32, z: f32) -> Polygon {
        Polygon::new(vec![
            GroundPos::new(x - 0.4, z - 0.4),
            GroundPos::new(x + 0.4, z - 0.4),
            GroundPos::new(x + 0.4, z + 0.4),
            GroundPos::new(x - 0.4, z + 0.4),
        ])
    }

    /// Blend-0 ground truth: O(n^2) Dijkstra over raw edge distances.
    fn dijkstra_cost(graph: &NavGraph, start: NodeId, goal: NodeId) -> Option<f32> {
        let ids = graph.node_ids();
        let mut dist: FxHashMap<NodeId, f32> =
            ids.iter().map(|&id| (id, f32::INFINITY)).collect();
        let mut done: FxHashMap<NodeId, bool> = ids.iter().map(|&id| (id, false)).collect();
        dist.insert(start, 0.0);
        loop {
            let mut best: Option<(NodeId, f32)> = None;
            for &id in &ids {
                if !done[&id]
                    && dist[&id].is_finite()
                    && best.is_none_or(|(_, d)| dist[&id] < d)
                {
                    best = Some((id, dist[&id]));
                }
            }
            let Some((id, d)) = best else { break };
            if id == goal {
                return Some(d);
            }
            done.insert(id, true);
            for edge in graph.node(id).unwrap().edges() {
                let neighbor = graph.node(edge.to).unwrap();
                if !neighbor.is_accessible() {
                    continue;
                }
                let candidate = d + edge.distance;
                if candidate < dist[&edge.to] {
                    dist.insert(edge.to, candidate);
                }
            }
        }
        None
    }

    #[test]
    fn open_lattice_goes_diagonally() {
        let graph = flat_graph(2.0, &NavConfig::default());
        let request = PathRequest::to_position(GroundPos::new(0.0, 0.0), GroundPos::new(2.0, 2.0));
        let (outcome, path) = find_path(&graph, &request);
        assert_eq!(outcome, SearchOutcome::Success);
        let path = path.unwrap();
        assert!((path.total_cost() - 2.0 * SQRT_2).abs() < 1e-4);
        assert!(path.len() <= 9);
    }

    #[test]
    fn routes_around_an_obstructed_cell() {
        let graph = flat_graph(2.0, &NavConfig::default());
        graph.apply_obstruction(&cell_square(1.0, 1.0));
        let blocked = graph.node_at_cell(CellCoord::new(1, 1)).unwrap().id();

        let request = PathRequest::to_position(GroundPos::new(0.0, 0.0), GroundPos::new(2.0, 2.0));
        let (outcome, path) = find_path(&graph, &request);
        assert_eq!(outcome, SearchOutcome::Success);
        let path = path.unwrap();
        assert!(path.node_ids().all(|id| id != blocked));
        assert!(path.total_cost() > 2.0 * SQRT_2 + 1e-3);
    }

    #[test]
    fn budget_below_true_cost_is_too_far() {
        let graph = flat_graph(2.0, &NavConfig::default());
        let request = PathRequest::to_position(GroundPos::new(0.0, 0.0), GroundPos::new(2.0, 2.0))
            .with_max_cost(2.0);
        let (outcome, path) = find_path(&graph, &request);
        assert_eq!(outcome, SearchOutcome::TooFar);
        assert!(path.is_none());
    }

    #[test]
    fn iteration_ceiling_is_too_many_tries() {
        let config = NavConfig {
            max_search_iterations: 2,
            ..NavConfig::default()
        };
        let graph = flat_graph(4.0, &config);
        let request = PathRequest::to_position(GroundPos::new(0.0, 0.0), GroundPos::new(4.0, 4.0));
        let (outcome, _) = find_path(&graph, &request);
        assert_eq!(outcome, SearchOutcome::TooManyTries);
    }

    #[test]
    fn obstructed_start_fails_fast() {
        let graph = flat_graph(2.0, &NavConfig::default());
        graph.apply_obstruction(&cell_square(0.0, 0.0));
        let request = PathRequest::to_position(GroundPos::new(0.0, 0.0), GroundPos::new(2.0, 2.0));
        let (outcome, _) = find_path(&graph, &request);
        assert_eq!(outcome, SearchOutcome::StartObstructed);
    }

    #[test]
    fn obstructed_goal_fails_unless_allowed() {
        let graph = flat_graph(2.0, &NavConfig::default());
        graph.apply_obstruction(&cell_square(2.0, 2.0));
        let blocked = graph.node_at_cell(CellCoord::new(2, 2)).unwrap().id();

        let request = PathRequest::to_position(GroundPos::new(0.0, 0.0), GroundPos::new(2.0, 2.0));
        let (outcome, _) = find_path(&graph, &request);
        assert_eq!(outcome, SearchOutcome::EndObstructed);

        let request = request.allowing_obstructed_goal();
        let (outcome, path) = find_path(&graph, &request);
        assert_eq!(outcome, SearchOutcome::Success);
        assert_eq!(path.unwrap().node_ids().last(), Some(blocked));
    }

    #[test]
    fn start_equal_to_goal_is_at_destination() {
        let graph = flat_graph(2.0, &NavConfig::default());
        let request = PathRequest::to_position(GroundPos::new(1.0, 1.0), GroundPos::new(1.0, 1.0));
        let (outcome, path) = find_path(&graph, &request);
        assert_eq!(outcome, SearchOutcome::AtDestination);
        let path = path.unwrap();
        assert_eq!(path.len(), 1);
        assert_eq!(path.total_cost(), 0.0);
    }

    #[test]
    fn explicit_node_endpoints() {
        let graph = flat_graph(2.0, &NavConfig::default());
        let start = graph.node_at_cell(CellCoord::new(0, 2)).unwrap().id();
        let end = graph.node_at_cell(CellCoord::new(2, 0)).unwrap().id();
        let mut request = PathRequest::to_node(GroundPos::new(0.0, 2.0), end);
        request.start_node = Some(start);
        let (outcome, path) = find_path(&graph, &request);
        assert_eq!(outcome, SearchOutcome::Success);
        let path = path.unwrap();
        assert_eq!(path.node_ids().next(), Some(start));
        assert_eq!(path.node_ids().last(), Some(end));
    }

    #[test]
    fn off_grid_endpoints_synthesize_and_clean_up() {
        let graph = flat_graph(3.0, &NavConfig::default());
        let request =
            PathRequest::to_position(GroundPos::new(0.4, 0.6), GroundPos::new(2.6, 2.4));
        let (outcome, path) = find_path(&graph, &request);
        assert_eq!(outcome, SearchOutcome::Success);
        let path = path.unwrap();
        let first = &path.waypoints()[0];
        let last = path.waypoints().last().unwrap();
        assert_eq!(first.node, None);
        assert_eq!(last.node, None);
        assert!((first.position.x - 0.4).abs() < 1e-6);
        assert!((last.position.z - 2.4).abs() < 1e-6);

        // No temporary wiring may survive the search.
        for id in graph.node_ids() {
            for edge in graph.node(id).unwrap().edges() {
                assert!(
                    graph.node(edge.to).is_some(),
                    "{id} still wired to transient {}",
                    edge.to
                );
            }
        }
    }

    #[test]
    fn worn_trail_attracts_only_at_positive_blend() {
        let graph = flat_graph(2.0, &NavConfig::default());
        let worn = graph.node_at_cell(CellCoord::new(1, 1)).unwrap();
        graph.wear_trail(&[worn.id()], 0.75);
        assert!((worn.desirability() - 0.25).abs() < 1e-6);

        let straight =
            PathRequest::to_position(GroundPos::new(0.0, 0.0), GroundPos::new(2.0, 0.0));
        let (_, path) = find_path(&graph, &straight);
        let baseline = path.unwrap();
        assert!((baseline.total_cost() - 2.0).abs() < 1e-4);
        assert!(baseline.node_ids().any(|id| id
            == graph.node_at_cell(CellCoord::new(1, 0)).unwrap().id()));

        let blended = straight.clone().with_trail_blend(1.0);
        let (_, path) = find_path(&graph, &blended);
        let detour = path.unwrap();
        // Cutting through the worn cell beats the straight row:
        // 2 * sqrt(2) * lerp(1, (1 + 0.25) / 2, 1) = 2 * sqrt(2) * 0.625.
        assert!(detour.node_ids().any(|id| id == worn.id()));
        assert!((detour.total_cost() - 2.0 * SQRT_2 * 0.625).abs() < 1e-3);
    }

    #[test]
    fn optimal_cost_matches_dijkstra_ground_truth() {
        let graph = flat_graph(4.0, &NavConfig::default());
        graph.apply_obstruction(&cell_square(2.0, 1.0));
        graph.apply_obstruction(&cell_square(2.0, 2.0));
        graph.apply_obstruction(&cell_square(1.0, 3.0));

        let start = graph.node_at_cell(CellCoord::new(0, 0)).unwrap().id();
        let goal = graph.node_at_cell(CellCoord::new(4, 4)).unwrap().id();
        let truth = dijkstra_cost(&graph, start, goal).unwrap();

        let mut request = PathRequest::to_node(GroundPos::new(0.0, 0.0), goal);
        request.start_node = Some(start);
        let (outcome, first) = find_path(&graph, &request);
        assert_eq!(outcome, SearchOutcome::Success);
        let (_, second) = find_path(&graph, &request);
        let first = first.unwrap();
        let second = second.unwrap();
        assert!((first.total_cost() - truth).abs() < 1e-3);
        assert!((second.total_cost() - truth).abs() < 1e-3);
    }

    #[test]
    fn predicate_finds_nearest_matching_connector() {
        let graph = flat_graph(3.0, &NavConfig::default());
        let near = graph
            .attach_connector(GroundPos::new(0.5, 0.5), ConnectorKind::WorkSite)
            .unwrap();
        let _far = graph
            .attach_connector(GroundPos::new(2.5, 2.5), ConnectorKind::WorkSite)
            .unwrap();
        let _decoy = graph
            .attach_connector(GroundPos::new(0.5, 1.5), ConnectorKind::Storage)
            .unwrap();

        let accept: GoalPredicate = Arc::new(|node: &NavNode| {
            matches!(node.kind(), NodeKind::Connector(ConnectorKind::WorkSite))
        });
        let request = PathRequest::to_predicate(GroundPos::new(0.0, 0.0), accept);
        let (outcome, path) = find_path(&graph, &request);
        assert_eq!(outcome, SearchOutcome::Success);
        assert_eq!(path.unwrap().node_ids().last(), Some(near));
    }

    #[test]
    fn predicate_with_no_match_is_no_path() {
        let graph = flat_graph(2.0, &NavConfig::default());
        let accept: GoalPredicate =
            Arc::new(|node: &NavNode| matches!(node.kind(), NodeKind::Connector(_)));
        let request = PathRequest::to_predicate(GroundPos::new(0.0, 0.0), accept);
        let (outcome, path) = find_path(&graph, &request);
        assert_eq!(outcome, SearchOutcome::NoPath);
        assert!(path.is_none());
    }

    #[test]
    fn predicate_on_start_is_at_destination() {
        let graph = flat_graph(2.0, &NavConfig::default());
        let accept: GoalPredicate = Arc::new(|_: &NavNode| true);
        let request = PathRequest::to_predicate(GroundPos::new(0.0, 0.0), accept);
        let (outcome, path) = find_path(&graph, &request);
        assert_eq!(outcome, SearchOutcome::AtDestination);
        assert_eq!(path.unwrap().len(), 1);
    }

    #[test]
    fn path_cost_is_monotone() {
        let graph = flat_graph(3.0, &NavConfig::default());
        let request =
            PathRequest::to_position(GroundPos::new(0.0, 0.0), GroundPos::new(3.0, 1.0));
        let (_, path) = find_path(&graph, &request);
        let path = path.unwrap();
        for pair in path.waypoints().windows(2) {
            assert!(pair[0].cost_from_start <= pair[1].cost_from_start);
        }
    }
}
