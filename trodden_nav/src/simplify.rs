// Shortcutting pass over raw grid paths.
//
// A raw A* path hugs the lattice. This pass straightens it greedily: from a
// moving start index, candidate end indices are scanned from the far end of
// the path backward, and the first candidate whose straight line is fully
// walkable and no more expensive than the original sub-path replaces every
// waypoint between them. The straight-line cost is accumulated with the
// same desirability blend the search used, over the exact supercover spans
// of the line, so the pass can never increase the blended cost of a path.
//
// Replacement points along an accepted shortcut are sampled at lattice
// spacing and projected onto the terrain; points that end up collinear are
// dropped, so flat ground collapses to bare segment endpoints while uneven
// ground keeps its height-following points.
//
// This is a greedy, path-cost-preserving pass, not true shortest-path
// geometry.
//
// See also: `pathfinding.rs` for the cost blend, `graph.rs` for the
// accessibility checks, `path.rs` for the waypoint model.

use crate::graph::NavGraph;
use crate::path::{Path, Waypoint};
use crate::pathfinding::blend_multiplier;
use crate::types::WorldPos;
use log::trace;

/// Slack for "no more expensive than the original": float accumulation
/// along different decompositions of the same line.
const COST_EPSILON: f32 = 1e-3;

/// Collinearity tolerance for dropping replacement points, in world units.
const FLATNESS_EPSILON: f32 = 1e-3;

/// Straighten `path` where geometry and cost allow. Endpoints are
/// preserved; the result's blended cost never exceeds the input's.
pub fn simplify(graph: &NavGraph, path: &Path, trail_blend: f32) -> Path {
    let waypoints = path.waypoints();
    if waypoints.len() < 3 {
        return path.clone();
    }
    let blend = trail_blend.clamp(0.0, 1.0);

    let mut out: Vec<Waypoint> = vec![waypoints[0].clone()];
    let mut i = 0usize;

    while i + 1 < waypoints.len() {
        let out_cost = out.last().unwrap().cost_from_start;

        let mut taken = None;
        for j in ((i + 2)..waypoints.len()).rev() {
            let original = waypoints[j].cost_from_start - waypoints[i].cost_from_start;
            if let Some(cost) = shortcut_cost(graph, &waypoints[i], &waypoints[j], blend) {
                if cost <= original + COST_EPSILON {
                    taken = Some((j, cost));
                    break;
                }
            }
        }

        match taken {
            Some((j, cost)) => {
                trace!("shortcut {i}..{j} at cost {cost:.3}");
                let from = waypoints[i].position;
                let to = waypoints[j].position;
                for (position, t) in replacement_points(graph, from, to) {
                    out.push(Waypoint {
                        position,
                        node: None,
                        cost_from_start: out_cost + cost * t,
                    });
                }
                out.push(Waypoint {
                    position: to,
                    node: waypoints[j].node,
                    cost_from_start: out_cost + cost,
                });
                i = j;
            }
            None => {
                let step =
                    waypoints[i + 1].cost_from_start - waypoints[i].cost_from_start;
                let mut next = waypoints[i + 1].clone();
                next.cost_from_start = out_cost + step;
                out.push(next);
                i += 1;
            }
        }
    }

    Path::new(out)
}

/// Blended cost of walking the straight line between two waypoints, or
/// `None` when any traversed cell has no node or is obstructed.
fn shortcut_cost(graph: &NavGraph, from: &Waypoint, to: &Waypoint, blend: f32) -> Option<f32> {
    let mut cost = 0.0f32;
    for (cell, span) in graph
        .lattice()
        .line_spans(from.position.ground(), to.position.ground())
    {
        let node = graph.node_at_cell(cell)?;
        if !node.is_accessible() {
            return None;
        }
        cost += span * blend_multiplier(node.desirability(), blend);
    }
    Some(cost)
}

/// Terrain-projected interior points along the straight line, paired with
/// their fraction of the line, collinear points dropped.
fn replacement_points(graph: &NavGraph, from: WorldPos, to: WorldPos) -> Vec<(WorldPos, f32)> {
    let ground_from = from.ground();
    let ground_to = to.ground();
    let steps = (ground_from.distance(ground_to) / graph.lattice().spacing()).ceil() as usize;

    let mut kept: Vec<(WorldPos, f32)> = Vec::new();
    let mut anchor = from;
    for step in 1..steps {
        let t = step as f32 / steps as f32;
        let ground = ground_from.lerp(ground_to, t);
        let height = graph.terrain().sample_height(ground.x, ground.z);
        let sample = WorldPos::new(ground.x, height, ground.z);
        if point_segment_distance(sample, anchor, to) > FLATNESS_EPSILON {
            kept.push((sample, t));
            anchor = sample;
        }
    }
    kept
}

fn point_segment_distance(point: WorldPos, a: WorldPos, b: WorldPos) -> f32 {
    let ab = (b.x - a.x, b.y - a.y, b.z - a.z);
    let len_sq = ab.0 * ab.0 + ab.1 * ab.1 + ab.2 * ab.2;
    if len_sq < 1e-12 {
        return point.distance(a);
    }
    let ap = (point.x - a.x, point.y - a.y, point.z - a.z);
    let t = ((ap.0 * ab.0 + ap.1 * ab.1 + ap.2 * ab.2) / len_sq).clamp(0.0, 1.0);
    let projected = WorldPos::new(a.x + ab.0 * t, a.y + ab.1 * t, a.z + ab.2 * t);
    point.distance(projected)
}
