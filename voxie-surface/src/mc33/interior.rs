//! Connectivity of same-sign corners through the interior of a cell
//!
//! The trilinear interpolant restricted to a plane `z = t` is bilinear in
//! `(x, y)`, with corner values `A(t)..D(t)` linear in `t`. The topology of
//! such a slice only changes where a corner value crosses zero or where the
//! saddle polynomial `A·C - B·D` changes sign, so sampling the slices at
//! those heights and between them captures every connection the trilinear
//! field makes between the corners of the cube.

use super::DisjointSet;

/// Components of `{f > 0}` (or `{f < 0}`) of one cell, keyed by cube corner
#[derive(Debug, Clone)]
pub struct InteriorConnectivity {
    sets: DisjointSet,
    slices: usize,
}

impl InteriorConnectivity {
    /// Sweep the cell with corner values `values` (already relative to the
    /// isovalue). With `positive == false` the negative set is analyzed.
    pub fn new(values: &[f64; 8], positive: bool) -> Self {
        let sign = if positive { 1.0 } else { -1.0 };
        let bottom = [0, 1, 2, 3].map(|k| values[k] * sign);
        let top = [4, 5, 6, 7].map(|k| values[k] * sign);

        let heights = sample_heights(&bottom, &top);
        let mut sets = DisjointSet::new(heights.len() * 4);
        let mut previous: Option<[f64; 4]> = None;

        for (s, &t) in heights.iter().enumerate() {
            let v = if t == 0.0 {
                bottom
            } else if t == 1.0 {
                top
            } else {
                [0, 1, 2, 3].map(|k| bottom[k] + t * (top[k] - bottom[k]))
            };
            let node = |k: usize| s * 4 + k;

            // Strict here, unlike the `>=` of corners and face saddles: a
            // value exactly on the isovalue never opens a tunnel
            for k in 0..4 {
                let k1 = (k + 1) % 4;
                if v[k] > 0.0 && v[k1] > 0.0 {
                    sets.union(node(k), node(k1));
                }
            }
            // Diagonal corners joined through the saddle of the slice
            let saddle = v[0] * v[2] - v[1] * v[3];
            if v[0] > 0.0 && v[2] > 0.0 && v[1] <= 0.0 && v[3] <= 0.0 && saddle > 0.0 {
                sets.union(node(0), node(2));
            }
            if v[1] > 0.0 && v[3] > 0.0 && v[0] <= 0.0 && v[2] <= 0.0 && saddle < 0.0 {
                sets.union(node(1), node(3));
            }

            if let Some(prev) = previous {
                for k in 0..4 {
                    if prev[k] > 0.0 && v[k] > 0.0 {
                        sets.union(node(k) - 4, node(k));
                    }
                }
            }
            previous = Some(v);
        }

        Self {
            sets,
            slices: heights.len(),
        }
    }

    fn node(&self, corner: u8) -> usize {
        let corner = corner as usize;
        if corner < 4 {
            corner
        } else {
            (self.slices - 1) * 4 + corner - 4
        }
    }

    /// True if the two cube corners lie in the same component
    pub fn connected(&mut self, a: u8, b: u8) -> bool {
        let (na, nb) = (self.node(a), self.node(b));
        self.sets.connected(na, nb)
    }
}

/// Slice heights: 0, 1, every critical height in between and the midpoints
/// of the resulting intervals
fn sample_heights(bottom: &[f64; 4], top: &[f64; 4]) -> Vec<f64> {
    let mut events = vec![0.0, 1.0];
    let mut push = |t: f64| {
        if t > 0.0 && t < 1.0 {
            events.push(t);
        }
    };

    for k in 0..4 {
        let denominator = bottom[k] - top[k];
        if denominator != 0.0 {
            push(bottom[k] / denominator);
        }
    }

    // A(t)·C(t) - B(t)·D(t) = qa·t² + qb·t + qc
    let d = [0, 1, 2, 3].map(|k| top[k] - bottom[k]);
    let [a, b, c, e] = *bottom;
    let qa = d[0] * d[2] - d[1] * d[3];
    let qb = a * d[2] + c * d[0] - b * d[3] - e * d[1];
    let qc = a * c - b * e;
    let scale = qa.abs().max(qb.abs()).max(qc.abs());
    if scale > 0.0 {
        if qa.abs() <= scale * 1e-12 {
            if qb != 0.0 {
                push(-qc / qb);
            }
        } else {
            let discriminant = qb * qb - 4.0 * qa * qc;
            if discriminant >= 0.0 {
                let root = discriminant.sqrt();
                push((-qb - root) / (2.0 * qa));
                push((-qb + root) / (2.0 * qa));
            }
        }
    }

    events.sort_by(f64::total_cmp);
    events.dedup();

    let mut heights = Vec::with_capacity(events.len() * 2);
    for pair in events.windows(2) {
        heights.push(pair[0]);
        heights.push(0.5 * (pair[0] + pair[1]));
    }
    heights.push(1.0);
    heights
}
