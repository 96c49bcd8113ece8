//! Per-cell case selection: configuration, face tests and interior test

use super::interior::InteriorConnectivity;
use super::tables::{CaseTable, Template, TunnelCandidate, CORNER_OFFSETS, FACE_CORNERS};
use voxie_core::{Grid, Scalar};

/// The eight corner values of one cell, relative to the isovalue
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellCorners {
    pub values: [f32; 8],
}

impl CellCorners {
    pub fn new(values: [f32; 8]) -> Self {
        Self { values }
    }

    /// Read the corners of cell `(x, y, z)`
    #[inline]
    pub fn gather<T: Scalar>(grid: &Grid<'_, T>, x: usize, y: usize, z: usize, isovalue: f32) -> Self {
        let values = CORNER_OFFSETS.map(|[dx, dy, dz]| grid.value_f32(x + dx, y + dy, z + dz) - isovalue);
        Self { values }
    }

    /// Bit `c` is set iff corner `c` is at or above the isovalue
    #[inline]
    pub fn configuration(&self) -> u8 {
        self.values
            .iter()
            .enumerate()
            .fold(0u8, |config, (c, &v)| config | ((v >= 0.0) as u8) << c)
    }

    /// Asymptotic decider for an ambiguous face: true if the two positive
    /// corners are connected across the face.
    ///
    /// The products are exact in `f64`, so the two cells sharing the face
    /// always reach the same decision. A saddle exactly on the isovalue joins
    /// the positive corners, matching the `>=` tie-break of the corners.
    pub fn face_joined(&self, face: usize) -> bool {
        let [a, b, c, d] = FACE_CORNERS[face].map(|k| self.values[k as usize] as f64);
        let (diagonal, other) = if a >= 0.0 { (a * c, b * d) } else { (b * d, a * c) };
        diagonal - other >= 0.0
    }
}

/// Outcome of classifying one cell
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub config: u8,
    /// Classic base case 0..=14
    pub case: u8,
    /// Bit `f` set iff ambiguous face `f` joins its positive corners
    pub face_mask: u8,
    /// Pair of loops to connect by a tube, if the interior requires one
    pub tunnel: Option<TunnelCandidate>,
}

impl Classification {
    pub fn is_empty(&self) -> bool {
        self.config == 0 || self.config == 255
    }

    pub fn template(&self) -> &'static Template {
        CaseTable::get().template(self.config, self.face_mask)
    }
}

/// Classify the cell at `(x, y, z)` for the given isovalue
pub fn classify<T: Scalar>(grid: &Grid<'_, T>, x: usize, y: usize, z: usize, isovalue: f32) -> Classification {
    classify_corners(&CellCorners::gather(grid, x, y, z, isovalue))
}

pub fn classify_corners(corners: &CellCorners) -> Classification {
    let config = corners.configuration();
    let table = CaseTable::get();
    let entry = table.entry(config);
    let face_mask = (0..6)
        .filter(|&f| entry.ambiguous_faces >> f & 1 == 1 && corners.face_joined(f))
        .fold(0u8, |mask, f| mask | 1 << f);
    let tunnel = if entry.interior_test {
        resolve_tunnel(table.template(config, face_mask), corners)
    } else {
        None
    };
    Classification {
        config,
        case: entry.case,
        face_mask,
        tunnel,
    }
}

/// First tunnel candidate whose two regions the interior connects
fn resolve_tunnel(template: &Template, corners: &CellCorners) -> Option<TunnelCandidate> {
    if template.tunnels.is_empty() {
        return None;
    }
    let values = corners.values.map(f64::from);
    let mut positive: Option<InteriorConnectivity> = None;
    let mut negative: Option<InteriorConnectivity> = None;
    for candidate in &template.tunnels {
        let sweep = if candidate.positive {
            positive.get_or_insert_with(|| InteriorConnectivity::new(&values, true))
        } else {
            negative.get_or_insert_with(|| InteriorConnectivity::new(&values, false))
        };
        if sweep.connected(candidate.corners.0, candidate.corners.1) {
            return Some(*candidate);
        }
    }
    None
}
