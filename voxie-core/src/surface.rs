//! Indexed triangle surfaces produced by the extractors

use crate::{Error, Point3f, Result, Vector3f};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// An indexed triangle mesh extracted at a given isovalue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Surface {
    pub isovalue: f32,
    pub vertices: Vec<Point3f>,
    pub triangles: Vec<[u32; 3]>,
    pub normals: Option<Vec<Vector3f>>,
}

impl Surface {
    /// Create a new empty surface
    pub fn new(isovalue: f32) -> Self {
        Self {
            isovalue,
            vertices: Vec::new(),
            triangles: Vec::new(),
            normals: None,
        }
    }

    pub fn number_of_vertices(&self) -> usize {
        self.vertices.len()
    }

    pub fn number_of_triangles(&self) -> usize {
        self.triangles.len()
    }

    /// Position of vertex `n`
    pub fn vertex(&self, n: usize) -> Option<&Point3f> {
        self.vertices.get(n)
    }

    /// Vertex indices of triangle `n`
    pub fn triangle(&self, n: usize) -> Option<&[u32; 3]> {
        self.triangles.get(n)
    }

    /// Check if the surface has no triangles
    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }

    fn corners(&self, t: &[u32; 3]) -> [Point3f; 3] {
        t.map(|i| self.vertices[i as usize])
    }

    /// Unit normal of every triangle, following its winding
    pub fn compute_face_normals(&self) -> Vec<Vector3f> {
        self.triangles
            .iter()
            .map(|t| {
                let [a, b, c] = self.corners(t);
                (b - a)
                    .cross(&(c - a))
                    .try_normalize(f32::EPSILON)
                    .unwrap_or_else(Vector3f::zeros)
            })
            .collect()
    }

    /// Replace the vertex normals with the area-weighted average of the
    /// normals of the incident triangles
    pub fn compute_vertex_normals(&mut self) {
        let mut normals = vec![Vector3f::zeros(); self.vertices.len()];
        for t in &self.triangles {
            let [a, b, c] = self.corners(t);
            // Unnormalized cross product: its length is twice the area
            let n = (b - a).cross(&(c - a));
            for &i in t {
                normals[i as usize] += n;
            }
        }
        for n in &mut normals {
            *n = n.try_normalize(f32::EPSILON).unwrap_or_else(Vector3f::zeros);
        }
        self.normals = Some(normals);
    }

    /// Total area of all triangles
    pub fn area(&self) -> f32 {
        self.triangles
            .iter()
            .map(|t| {
                let [a, b, c] = self.corners(t);
                0.5 * (b - a).cross(&(c - a)).norm()
            })
            .sum()
    }

    /// Number of triangles using each undirected edge, keyed `(min, max)`
    pub fn edge_use_counts(&self) -> HashMap<(u32, u32), usize> {
        let mut counts = HashMap::with_capacity(self.triangles.len() * 3 / 2);
        for t in &self.triangles {
            for e in 0..3 {
                let (a, b) = (t[e], t[(e + 1) % 3]);
                *counts.entry((a.min(b), a.max(b))).or_insert(0) += 1;
            }
        }
        counts
    }

    /// Edges used by exactly one triangle
    pub fn boundary_edges(&self) -> Vec<(u32, u32)> {
        let mut edges: Vec<_> = self
            .edge_use_counts()
            .into_iter()
            .filter(|&(_, n)| n == 1)
            .map(|(e, _)| e)
            .collect();
        edges.sort_unstable();
        edges
    }

    /// True if no edge is shared by more than two triangles
    pub fn is_edge_manifold(&self) -> bool {
        self.edge_use_counts().values().all(|&n| n <= 2)
    }

    /// True if every edge is shared by exactly two triangles
    pub fn is_watertight(&self) -> bool {
        self.edge_use_counts().values().all(|&n| n == 2)
    }

    /// True if no directed edge appears twice, i.e. the two triangles sharing
    /// an edge traverse it in opposite directions
    pub fn has_consistent_winding(&self) -> bool {
        let mut directed = HashMap::with_capacity(self.triangles.len() * 3);
        for t in &self.triangles {
            for e in 0..3 {
                let count = directed.entry((t[e], t[(e + 1) % 3])).or_insert(0u8);
                *count += 1;
                if *count > 1 {
                    return false;
                }
            }
        }
        true
    }

    /// Check the structural invariants of the mesh
    pub fn validate(&self) -> Result<()> {
        let n = self.vertices.len();
        for (i, t) in self.triangles.iter().enumerate() {
            if t.iter().any(|&v| v as usize >= n) {
                return Err(Error::InvalidData(format!(
                    "Triangle {} {:?} references a vertex outside 0..{}",
                    i, t, n
                )));
            }
            if t[0] == t[1] || t[1] == t[2] || t[0] == t[2] {
                return Err(Error::InvalidData(format!(
                    "Triangle {} {:?} repeats a vertex",
                    i, t
                )));
            }
        }
        if let Some(normals) = &self.normals {
            if normals.len() != n {
                return Err(Error::InvalidData(format!(
                    "{} normals for {} vertices",
                    normals.len(),
                    n
                )));
            }
        }
        Ok(())
    }
}

impl Default for Surface {
    fn default() -> Self {
        Self::new(0.0)
    }
}

/// Incrementally grows the vertex and triangle arrays of a [`Surface`].
///
/// Growth goes through `try_reserve`, so running out of memory is reported as
/// [`Error::Allocation`] instead of aborting the process.
#[derive(Debug, Default)]
pub struct SurfaceBuilder {
    vertices: Vec<Point3f>,
    triangles: Vec<[u32; 3]>,
    normals: Vec<Vector3f>,
}

impl SurfaceBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a vertex and return its index
    pub fn add_vertex(&mut self, p: Point3f) -> Result<u32> {
        let index = u32::try_from(self.vertices.len())
            .ok()
            .filter(|&i| i != u32::MAX)
            .ok_or_else(|| Error::Allocation("Vertex index space exhausted".to_string()))?;
        self.vertices.try_reserve(1)?;
        self.vertices.push(p);
        Ok(index)
    }

    /// Append a vertex together with its normal
    pub fn add_vertex_with_normal(&mut self, p: Point3f, n: Vector3f) -> Result<u32> {
        let index = self.add_vertex(p)?;
        self.normals.try_reserve(1)?;
        self.normals.push(n);
        Ok(index)
    }

    pub fn add_triangle(&mut self, a: u32, b: u32, c: u32) -> Result<()> {
        debug_assert!(
            a != b && b != c && a != c,
            "Degenerate triangle ({}, {}, {})",
            a,
            b,
            c
        );
        self.triangles.try_reserve(1)?;
        self.triangles.push([a, b, c]);
        Ok(())
    }

    /// Position of a vertex added earlier
    pub fn vertex(&self, index: u32) -> Option<&Point3f> {
        self.vertices.get(index as usize)
    }

    /// Normal of a vertex added with [`SurfaceBuilder::add_vertex_with_normal`]
    pub fn normal(&self, index: u32) -> Option<&Vector3f> {
        self.normals.get(index as usize)
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    /// Freeze the accumulated arrays into a [`Surface`].
    ///
    /// Normals are kept only if one was supplied for every vertex.
    pub fn finish(self, isovalue: f32) -> Surface {
        let normals = (!self.normals.is_empty() && self.normals.len() == self.vertices.len())
            .then_some(self.normals);
        Surface {
            isovalue,
            vertices: self.vertices,
            triangles: self.triangles,
            normals,
        }
    }
}
