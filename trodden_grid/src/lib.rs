// Ground-plane lattice geometry.
//
// This crate is the single source of truth for how world-space ground
// coordinates map onto the navigation lattice: cell addressing, the
// floor/ceil corner lookup used to splice off-grid points into the graph,
// segment traversal across cells (supercover, with per-cell span lengths),
// and polygon rasterization (scan-line interior plus traversed outline).
//
// It is deliberately dependency-light so both the navigation core and any
// future collaborator (obstacle placement, editor tooling) can share the
// exact same rasterization without pulling in the whole nav stack. The
// navigation crate `trodden_nav` builds its node lattice, obstruction
// stamping, and shortcut validation on top of these primitives.
//
// **Critical constraint: exact reversibility.** Obstruction bookkeeping in
// the graph relies on `Polygon::covered_cells` returning the identical cell
// set for the identical polygon every time — apply followed by remove must
// cancel exactly. Everything here is a pure function of its inputs; keep it
// that way.

use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Coordinates
// ---------------------------------------------------------------------------

/// A point on the ground plane, in world units. The vertical axis is
/// deliberately absent — height comes from the terrain collaborator.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GroundPos {
    pub x: f32,
    pub z: f32,
}

impl GroundPos {
    pub const fn new(x: f32, z: f32) -> Self {
        Self { x, z }
    }

    /// Euclidean distance to another ground point.
    pub fn distance(self, other: Self) -> f32 {
        let dx = self.x - other.x;
        let dz = self.z - other.z;
        (dx * dx + dz * dz).sqrt()
    }

    /// Linear interpolation toward `other` by `t` (unclamped).
    pub fn lerp(self, other: Self, t: f32) -> Self {
        Self {
            x: self.x + (other.x - self.x) * t,
            z: self.z + (other.z - self.z) * t,
        }
    }
}

impl fmt::Display for GroundPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.3}, {:.3})", self.x, self.z)
    }
}

/// A lattice cell address. One walkable cell holds at most one nav node.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct CellCoord {
    pub x: i32,
    pub z: i32,
}

impl CellCoord {
    pub const fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }
}

impl fmt::Display for CellCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.x, self.z)
    }
}

/// An axis-aligned ground-plane rectangle, used for map bounds.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GroundRect {
    pub min: GroundPos,
    pub max: GroundPos,
}

impl GroundRect {
    pub const fn new(min: GroundPos, max: GroundPos) -> Self {
        Self { min, max }
    }
}

// ---------------------------------------------------------------------------
// Lattice — world <-> cell mapping
// ---------------------------------------------------------------------------

/// The fixed-resolution mapping between world coordinates and lattice cells.
///
/// A cell's address is the world position scaled by `cells_per_unit` and
/// rounded, so cell `[i, k]` is centered at world `(i, k) / cells_per_unit`
/// and covers the half-open square `[i - 0.5, i + 0.5) x [k - 0.5, k + 0.5)`
/// in scaled coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Lattice {
    cells_per_unit: f32,
}

impl Lattice {
    pub fn new(cells_per_unit: f32) -> Self {
        assert!(cells_per_unit > 0.0, "lattice resolution must be positive");
        Self { cells_per_unit }
    }

    pub fn cells_per_unit(self) -> f32 {
        self.cells_per_unit
    }

    /// World-space distance between adjacent cell centers.
    pub fn spacing(self) -> f32 {
        1.0 / self.cells_per_unit
    }

    /// The cell containing `pos` (nearest cell center).
    pub fn cell_at(self, pos: GroundPos) -> CellCoord {
        CellCoord {
            x: (pos.x * self.cells_per_unit).round() as i32,
            z: (pos.z * self.cells_per_unit).round() as i32,
        }
    }

    /// The world-space center of a cell.
    pub fn cell_center(self, cell: CellCoord) -> GroundPos {
        GroundPos {
            x: cell.x as f32 / self.cells_per_unit,
            z: cell.z as f32 / self.cells_per_unit,
        }
    }

    /// The up-to-four cells whose centers surround `pos`: floor/ceil of both
    /// scaled axes, deduplicated. A point sitting exactly on a cell center
    /// returns that single cell; a point on a lattice line returns two.
    pub fn corner_cells(self, pos: GroundPos) -> Vec<CellCoord> {
        let sx = pos.x * self.cells_per_unit;
        let sz = pos.z * self.cells_per_unit;
        let xs = [sx.floor() as i32, sx.ceil() as i32];
        let zs = [sz.floor() as i32, sz.ceil() as i32];
        let mut out = Vec::with_capacity(4);
        for &x in &xs {
            for &z in &zs {
                let cell = CellCoord::new(x, z);
                if !out.contains(&cell) {
                    out.push(cell);
                }
            }
        }
        out
    }

    /// Every cell a straight segment from `a` to `b` passes through, paired
    /// with the world-space length of the segment portion inside that cell.
    ///
    /// This is a supercover traversal: when the segment crosses a lattice
    /// corner exactly, both orthogonal neighbors are reported with a zero
    /// span so callers validating accessibility never cut the corner. Span
    /// lengths sum to the full segment length.
    pub fn line_spans(self, a: GroundPos, b: GroundPos) -> Vec<(CellCoord, f32)> {
        let total_len = a.distance(b);
        let mut cell = self.cell_at(a);
        let end = self.cell_at(b);
        if cell == end {
            return vec![(cell, total_len)];
        }

        let ax = a.x * self.cells_per_unit;
        let az = a.z * self.cells_per_unit;
        let dx = b.x * self.cells_per_unit - ax;
        let dz = b.z * self.cells_per_unit - az;

        let step_x: i32 = if dx > 0.0 { 1 } else { -1 };
        let step_z: i32 = if dz > 0.0 { 1 } else { -1 };

        // Parametric t of the next boundary crossing on each axis. Cell
        // boundaries sit at half-integers in scaled space.
        let mut t_max_x = if dx != 0.0 {
            ((cell.x as f32 + 0.5 * step_x as f32) - ax) / dx
        } else {
            f32::INFINITY
        };
        let mut t_max_z = if dz != 0.0 {
            ((cell.z as f32 + 0.5 * step_z as f32) - az) / dz
        } else {
            f32::INFINITY
        };
        let t_delta_x = if dx != 0.0 { 1.0 / dx.abs() } else { f32::INFINITY };
        let t_delta_z = if dz != 0.0 { 1.0 / dz.abs() } else { f32::INFINITY };

        let mut out = Vec::new();
        let mut t_prev = 0.0f32;
        // Step budget: the traversal visits at most one cell per axis step
        // plus corner-touch extras; the bound guards against float edge cases.
        let max_steps =
            ((end.x - cell.x).unsigned_abs() + (end.z - cell.z).unsigned_abs()) as usize * 2 + 4;

        for _ in 0..max_steps {
            let t_next = t_max_x.min(t_max_z).min(1.0);
            out.push((cell, (t_next - t_prev).max(0.0) * total_len));
            if cell == end || t_next >= 1.0 {
                break;
            }
            t_prev = t_next;

            if t_max_x < t_max_z {
                cell.x += step_x;
                t_max_x += t_delta_x;
            } else if t_max_z < t_max_x {
                cell.z += step_z;
                t_max_z += t_delta_z;
            } else {
                // Exact corner crossing: report both orthogonal neighbors
                // with zero span, then step diagonally.
                out.push((CellCoord::new(cell.x + step_x, cell.z), 0.0));
                out.push((CellCoord::new(cell.x, cell.z + step_z), 0.0));
                cell.x += step_x;
                cell.z += step_z;
                t_max_x += t_delta_x;
                t_max_z += t_delta_z;
            }
        }
        out
    }

    /// The cells of `line_spans` without the span lengths.
    pub fn line_cells(self, a: GroundPos, b: GroundPos) -> Vec<CellCoord> {
        self.line_spans(a, b).into_iter().map(|(c, _)| c).collect()
    }
}

// ---------------------------------------------------------------------------
// Polygon rasterization
// ---------------------------------------------------------------------------

/// A simple polygon on the ground plane: an ordered vertex list, implicitly
/// closed. Convexity is not required; self-intersection is not supported.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Polygon {
    vertices: Vec<GroundPos>,
}

impl Polygon {
    pub fn new(vertices: Vec<GroundPos>) -> Self {
        Self { vertices }
    }

    pub fn vertices(&self) -> &[GroundPos] {
        &self.vertices
    }

    /// Every lattice cell covered by the polygon: cells whose centers lie in
    /// the filled interior (even-odd scan-line fill) plus every cell the
    /// outline passes through. The result is sorted and deduplicated, so the
    /// same polygon always yields the same cell set.
    pub fn covered_cells(&self, lattice: Lattice) -> Vec<CellCoord> {
        let mut cells: Vec<CellCoord> = Vec::new();

        if self.vertices.len() < 2 {
            if let Some(&v) = self.vertices.first() {
                cells.push(lattice.cell_at(v));
            }
            return cells;
        }

        // Outline: supercover along every edge, including the closing edge.
        let n = self.vertices.len();
        for i in 0..n {
            let a = self.vertices[i];
            let b = self.vertices[(i + 1) % n];
            cells.extend(lattice.line_cells(a, b));
        }

        // Interior: even-odd scan-line fill over cell-center rows. Work in
        // scaled coordinates where cell centers sit at integers.
        if n >= 3 {
            let cpu = lattice.cells_per_unit();
            let scaled: Vec<(f32, f32)> = self
                .vertices
                .iter()
                .map(|v| (v.x * cpu, v.z * cpu))
                .collect();
            let z_min = scaled.iter().map(|v| v.1).fold(f32::INFINITY, f32::min);
            let z_max = scaled.iter().map(|v| v.1).fold(f32::NEG_INFINITY, f32::max);

            let mut crossings: Vec<f32> = Vec::new();
            for k in (z_min.ceil() as i32)..=(z_max.floor() as i32) {
                let row = k as f32;
                crossings.clear();
                for i in 0..n {
                    let (x1, z1) = scaled[i];
                    let (x2, z2) = scaled[(i + 1) % n];
                    // Half-open vertex rule so a scan line through a vertex
                    // counts the crossing exactly once.
                    if (z1 <= row && row < z2) || (z2 <= row && row < z1) {
                        crossings.push(x1 + (row - z1) * (x2 - x1) / (z2 - z1));
                    }
                }
                crossings.sort_by(f32::total_cmp);
                for pair in crossings.chunks_exact(2) {
                    for i in (pair[0].ceil() as i32)..=(pair[1].floor() as i32) {
                        cells.push(CellCoord::new(i, k));
                    }
                }
            }
        }

        cells.sort_unstable();
        cells.dedup();
        cells
    }
}
