//! Extraction loop: scans the grid cell by cell and assembles the surface

use super::classifier::{classify_corners, CellCorners, Classification};
use super::tables::{CaseTable, EdgeLoop, CORNER_OFFSETS, EDGE_AXIS, EDGE_CORNERS, FACE_EDGES};
use super::vertex_cache::EdgeCache;
use crate::parallel;
use log::{debug, trace};
use serde::{Deserialize, Serialize};
use voxie_core::{
    Error, Grid, Operation, Point3f, Result, Scalar, Surface, SurfaceBuilder, Vector3d, Vector3f,
};

/// How vertex normals are produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum NormalMode {
    /// No normals
    #[default]
    None,
    /// Negated field gradient, interpolated along the edge
    Gradient,
    /// Area-weighted average of the incident triangle normals
    FaceAverage,
}

/// Configuration for Marching Cubes 33
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Mc33Config {
    pub compute_normals: NormalMode,
}

impl Mc33Config {
    pub fn with_normals(mut self, mode: NormalMode) -> Self {
        self.compute_normals = mode;
        self
    }
}

/// Counters collected during one extraction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractionStats {
    pub cells: usize,
    pub active_cells: usize,
    pub tunnels: usize,
    pub center_vertices: usize,
}

/// Marching Cubes 33 extractor.
///
/// Bind a grid with [`Mc33::set_grid`], then call
/// [`Mc33::calculate_isosurface`] once per isovalue. Every call is
/// independent and returns a fresh [`Surface`].
///
/// Triangles are wound so that their normals point towards lower field
/// values.
#[derive(Debug, Clone)]
pub struct Mc33<'a, T: Scalar> {
    config: Mc33Config,
    grid: Option<Grid<'a, T>>,
}

impl<'a, T: Scalar> Mc33<'a, T> {
    pub fn new(config: Mc33Config) -> Self {
        Self { config, grid: None }
    }

    /// Bind (or rebind) the grid to extract from
    pub fn set_grid(&mut self, grid: Grid<'a, T>) -> Result<()> {
        grid.validate()?;
        self.grid = Some(grid);
        Ok(())
    }

    pub fn grid(&self) -> Option<&Grid<'a, T>> {
        self.grid.as_ref()
    }

    pub fn config(&self) -> &Mc33Config {
        &self.config
    }

    /// Extract the isosurface at `isovalue`
    pub fn calculate_isosurface(&self, isovalue: f32) -> Result<Surface> {
        self.calculate_isosurface_with(isovalue, &Operation::new())
    }

    /// Extract the isosurface at `isovalue`, reporting progress to `operation`
    /// and stopping with [`Error::Cancelled`] when it is cancelled
    pub fn calculate_isosurface_with(&self, isovalue: f32, operation: &Operation) -> Result<Surface> {
        let grid = self
            .grid
            .as_ref()
            .ok_or_else(|| Error::InvalidGrid("No grid bound to the extractor".to_string()))?;
        extract(grid, isovalue, &self.config, operation).map(|(surface, _)| surface)
    }

    /// Like [`Mc33::calculate_isosurface`], also returning extraction counters
    pub fn calculate_isosurface_with_stats(&self, isovalue: f32) -> Result<(Surface, ExtractionStats)> {
        let grid = self
            .grid
            .as_ref()
            .ok_or_else(|| Error::InvalidGrid("No grid bound to the extractor".to_string()))?;
        extract(grid, isovalue, &self.config, &Operation::new())
    }
}

/// Convenience function for Marching Cubes 33 with the default configuration
pub fn marching_cubes_33<T: Scalar>(grid: &Grid<'_, T>, isovalue: f32) -> Result<Surface> {
    grid.validate()?;
    extract(grid, isovalue, &Mc33Config::default(), &Operation::new()).map(|(surface, _)| surface)
}

/// Extract several isosurfaces of the same grid concurrently.
///
/// Each isovalue gets its own cache and builder; results are returned in the
/// order of `isovalues`.
pub fn calculate_isosurfaces<T: Scalar>(
    grid: &Grid<'_, T>,
    isovalues: &[f32],
    config: &Mc33Config,
) -> Result<Vec<Surface>> {
    grid.validate()?;
    parallel::parallel_map(isovalues, |&isovalue| {
        extract(grid, isovalue, config, &Operation::new()).map(|(surface, _)| surface)
    })
    .into_iter()
    .collect()
}

fn extract<T: Scalar>(
    grid: &Grid<'_, T>,
    isovalue: f32,
    config: &Mc33Config,
    operation: &Operation,
) -> Result<(Surface, ExtractionStats)> {
    if !isovalue.is_finite() {
        return Err(Error::InvalidData(format!("Isovalue must be finite, got {}", isovalue)));
    }
    let [nx, ny, nz] = grid.dimensions();
    if nx < 2 || ny < 2 || nz < 2 {
        operation.update_progress(1.0);
        return Ok((Surface::new(isovalue), ExtractionStats::default()));
    }

    let mut extraction = Extraction {
        grid,
        isovalue,
        normals: config.compute_normals,
        cache: EdgeCache::new(nx, ny)?,
        builder: SurfaceBuilder::new(),
        stats: ExtractionStats::default(),
    };
    let layers = nz - 1;
    for z in 0..layers {
        if let Err(e) = operation.check_cancelled() {
            trace!("MC33 cancelled before layer {} of {}", z, layers);
            return Err(e);
        }
        for y in 0..ny - 1 {
            for x in 0..nx - 1 {
                extraction.process_cell(x, y, z)?;
            }
        }
        extraction.cache.next_layer();
        operation.update_progress((z + 1) as f32 / layers as f32);
    }

    let stats = extraction.stats;
    let mut surface = extraction.builder.finish(isovalue);
    if config.compute_normals == NormalMode::FaceAverage {
        surface.compute_vertex_normals();
    }
    debug!(
        "MC33 at isovalue {}: {} of {} cells active, {} tunnels, {} center vertices, {} vertices, {} triangles",
        isovalue,
        stats.active_cells,
        stats.cells,
        stats.tunnels,
        stats.center_vertices,
        surface.number_of_vertices(),
        surface.number_of_triangles()
    );
    Ok((surface, stats))
}

struct Extraction<'g, 'a, T: Scalar> {
    grid: &'g Grid<'a, T>,
    isovalue: f32,
    normals: NormalMode,
    cache: EdgeCache,
    builder: SurfaceBuilder,
    stats: ExtractionStats,
}

impl<T: Scalar> Extraction<'_, '_, T> {
    fn process_cell(&mut self, x: usize, y: usize, z: usize) -> Result<()> {
        self.stats.cells += 1;
        let corners = CellCorners::gather(self.grid, x, y, z, self.isovalue);
        let config = corners.configuration();
        if config == 0 || config == 255 {
            return Ok(());
        }
        self.stats.active_cells += 1;
        let classification = classify_corners(&corners);
        self.emit_cell(x, y, z, &classification)
    }

    fn emit_cell(&mut self, x: usize, y: usize, z: usize, classification: &Classification) -> Result<()> {
        let entry = CaseTable::get().entry(classification.config);
        let mut vertices = [u32::MAX; 12];
        for edge in 0..12u8 {
            if entry.edge_mask >> edge & 1 == 1 {
                vertices[edge as usize] = self.edge_vertex(x, y, z, edge)?;
            }
        }

        let template = classification.template();
        let mut tube = None;
        if let Some(tunnel) = classification.tunnel {
            let (i, j) = tunnel.loops;
            if self.emit_tube(&template.loops[i], &template.loops[j], &vertices)? {
                self.stats.tunnels += 1;
                tube = Some((i, j));
            } else {
                trace!("No tube fits cell ({}, {}, {}), keeping separate sheets", x, y, z);
            }
        }
        for (n, edge_loop) in template.loops.iter().enumerate() {
            if tube.is_some_and(|(i, j)| n == i || n == j) {
                continue;
            }
            self.emit_disk(edge_loop, &vertices)?;
        }
        Ok(())
    }

    /// Vertex on `edge` of cell `(x, y, z)`, shared with the neighbors through the cache
    fn edge_vertex(&mut self, x: usize, y: usize, z: usize, edge: u8) -> Result<u32> {
        let Self {
            grid,
            isovalue,
            normals,
            cache,
            builder,
            ..
        } = self;
        cache.get_or_insert_with(x, y, edge, || {
            let (a, b) = EDGE_CORNERS[edge as usize];
            let [ax, ay, az] = offset(x, y, z, a);
            let [bx, by, bz] = offset(x, y, z, b);
            let va = grid.value_f32(ax, ay, az) as f64;
            let vb = grid.value_f32(bx, by, bz) as f64;
            let t = (*isovalue as f64 - va) / (vb - va);

            let mut g = Vector3d::new(ax as f64, ay as f64, az as f64);
            g[EDGE_AXIS[edge as usize]] += t;
            let position = grid.world_position(&g);

            if *normals == NormalMode::Gradient {
                let ga = grid.world_gradient(ax, ay, az);
                let gb = grid.world_gradient(bx, by, bz);
                let n = -(ga + (gb - ga) * t);
                let n = Vector3f::new(n.x as f32, n.y as f32, n.z as f32)
                    .try_normalize(f32::EPSILON)
                    .unwrap_or_else(Vector3f::zeros);
                builder.add_vertex_with_normal(position, n)
            } else {
                builder.add_vertex(position)
            }
        })
    }

    fn emit_disk(&mut self, edge_loop: &EdgeLoop, vertices: &[u32; 12]) -> Result<()> {
        let ids: Vec<u32> = edge_loop.edges.iter().map(|&e| vertices[e as usize]).collect();
        let n = ids.len();
        // Loops run counter-clockwise around the positive side; emit them
        // reversed so normals face the negative side
        if edge_loop.needs_center {
            let center = self.center_vertex(&ids)?;
            self.stats.center_vertices += 1;
            for i in 0..n {
                self.builder.add_triangle(center, ids[(i + 1) % n], ids[i])?;
            }
        } else {
            for i in 1..n - 1 {
                self.builder.add_triangle(ids[0], ids[i + 1], ids[i])?;
            }
        }
        Ok(())
    }

    /// Uncached vertex at the centroid of a loop
    fn center_vertex(&mut self, ids: &[u32]) -> Result<u32> {
        let mut sum = Vector3f::zeros();
        let mut normal = Vector3f::zeros();
        for &i in ids {
            if let Some(p) = self.builder.vertex(i) {
                sum += p.coords;
            }
            if let Some(n) = self.builder.normal(i) {
                normal += n;
            }
        }
        let position = Point3f::from(sum / ids.len() as f32);
        if self.normals == NormalMode::Gradient {
            let normal = normal.try_normalize(f32::EPSILON).unwrap_or_else(Vector3f::zeros);
            self.builder.add_vertex_with_normal(position, normal)
        } else {
            self.builder.add_vertex(position)
        }
    }

    /// Connect two loops by a band of triangles. Returns `false` without
    /// emitting anything if no band fits, either because every band would
    /// need a chord across a cube face (such a chord could also be produced
    /// by the neighboring cell) or because a band would reuse a chord.
    fn emit_tube(&mut self, first: &EdgeLoop, second: &EdgeLoop, vertices: &[u32; 12]) -> Result<bool> {
        let a: Vec<u8> = first.edges.clone();
        // The second loop is walked backwards so both boundaries keep their
        // orientation on the band
        let c: Vec<u8> = second.edges.iter().rev().copied().collect();
        let position = |e: u8| self.builder.vertex(vertices[e as usize]).copied();
        let pa: Vec<Point3f> = a.iter().filter_map(|&e| position(e)).collect();
        let pc: Vec<Point3f> = c.iter().filter_map(|&e| position(e)).collect();
        if pa.len() != a.len() || pc.len() != c.len() {
            return Err(Error::Algorithm("Tube loop vertex missing".to_string()));
        }
        let (n, m) = (a.len(), c.len());
        let chord = |p: usize, q: usize| (!edges_share_face(a[p], c[q])).then(|| (pa[p] - pc[q]).norm());

        // Cheapest band over every allowed start chord
        let mut best: Option<(f32, usize, usize, Vec<bool>)> = None;
        for (i0, j0) in itertools::iproduct!(0..n, 0..m) {
            if chord(i0, j0).is_none() {
                continue;
            }
            let plan = cheapest_band(n, m, |i, j| chord((i0 + i) % n, (j0 + j) % m));
            if let Some((cost, steps)) = plan {
                if best.as_ref().map_or(true, |b| cost < b.0) {
                    best = Some((cost, i0, j0, steps));
                }
            }
        }
        let Some((_, i0, j0, steps)) = best else {
            return Ok(false);
        };

        let ai = |i: usize| (i0 + i) % n;
        let cj = |j: usize| (j0 + j) % m;
        let mut band = Vec::with_capacity(n + m);
        let (mut i, mut j) = (0, 0);
        for along_first in steps {
            if along_first {
                band.push([a[ai(i)], a[ai(i + 1)], c[cj(j)]]);
                i += 1;
            } else {
                band.push([a[ai(i)], c[cj(j + 1)], c[cj(j)]]);
                j += 1;
            }
        }
        if !band_is_manifold(&band) {
            return Ok(false);
        }

        for [p, q, r] in band {
            let (p, q, r) = (vertices[p as usize], vertices[q as usize], vertices[r as usize]);
            self.builder.add_triangle(p, r, q)?;
        }
        Ok(true)
    }
}

/// Cheapest monotone lattice path from `(0, 0)` to `(n, m)`, where state
/// `(i, j)` is the chord between position `i` of the first loop and position
/// `j` of the second. `chord` returns the cost of a state, or `None` if the
/// chord is not allowed. Each step is `true` when it advances along the first
/// loop.
///
/// Position `n` is position `0` again (likewise `m`), so a path that takes all
/// steps along one loop in a single run meets its own start chord in the
/// middle of the band. Paths must therefore turn at least three times.
fn cheapest_band(n: usize, m: usize, chord: impl Fn(usize, usize) -> Option<f32>) -> Option<(f32, Vec<bool>)> {
    const TURNS: usize = 4;
    let state = |i: usize, j: usize, along_first: bool, turns: usize| {
        ((i * (m + 1) + j) * 2 + usize::from(along_first)) * TURNS + turns
    };
    let size = (n + 1) * (m + 1) * 2 * TURNS;
    let mut cost = vec![f32::INFINITY; size];
    let mut previous: Vec<Option<usize>> = vec![None; size];

    if n > 0 {
        if let Some(w) = chord(1, 0) {
            cost[state(1, 0, true, 0)] = w;
        }
    }
    if m > 0 {
        if let Some(w) = chord(0, 1) {
            cost[state(0, 1, false, 0)] = w;
        }
    }

    for (i, j) in itertools::iproduct!(0..=n, 0..=m) {
        for (along_first, turns) in itertools::iproduct!([true, false], 0..TURNS) {
            let here = state(i, j, along_first, turns);
            if !cost[here].is_finite() {
                continue;
            }
            let moves = [(true, i + 1, j), (false, i, j + 1)];
            for (step, ni, nj) in moves {
                if ni > n || nj > m {
                    continue;
                }
                let Some(w) = chord(ni, nj) else {
                    continue;
                };
                let turned = if step == along_first { turns } else { (turns + 1).min(TURNS - 1) };
                let next = state(ni, nj, step, turned);
                if cost[here] + w < cost[next] {
                    cost[next] = cost[here] + w;
                    previous[next] = Some(here);
                }
            }
        }
    }

    let end = [true, false]
        .into_iter()
        .map(|along_first| state(n, m, along_first, TURNS - 1))
        .filter(|&s| cost[s].is_finite())
        .min_by(|&s, &t| cost[s].total_cmp(&cost[t]))?;

    let mut steps = Vec::with_capacity(n + m);
    let mut current = Some(end);
    while let Some(s) = current {
        steps.push((s / TURNS) % 2 == 1);
        current = previous[s];
    }
    steps.reverse();
    Some((cost[end], steps))
}

/// True if no edge of the band is shared by more than two of its triangles
fn band_is_manifold(band: &[[u8; 3]]) -> bool {
    let mut uses = std::collections::HashMap::new();
    for &[p, q, r] in band {
        for (u, v) in [(p, q), (q, r), (r, p)] {
            *uses.entry((u.min(v), u.max(v))).or_insert(0usize) += 1;
        }
    }
    uses.values().all(|&k| k <= 2)
}

#[inline]
fn offset(x: usize, y: usize, z: usize, corner: u8) -> [usize; 3] {
    let [dx, dy, dz] = CORNER_OFFSETS[corner as usize];
    [x + dx, y + dy, z + dz]
}

/// True if two cube edges lie on a common face
fn edges_share_face(e1: u8, e2: u8) -> bool {
    FACE_EDGES
        .iter()
        .any(|face| face.contains(&e1) && face.contains(&e2))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn cell(values: [f32; 8]) -> Vec<f32> {
        // Reorder from corner numbering to x-fastest storage
        let mut data = vec![0.0; 8];
        for (c, &[dx, dy, dz]) in CORNER_OFFSETS.iter().enumerate() {
            data[dx + 2 * dy + 4 * dz] = values[c];
        }
        data
    }

    #[test]
    fn test_unbound_extractor_fails() {
        let mc: Mc33<'_, f32> = Mc33::new(Mc33Config::default());
        assert!(matches!(mc.calculate_isosurface(0.0), Err(Error::InvalidGrid(_))));
    }

    #[test]
    fn test_single_corner() {
        let data = cell([1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
        let grid = Grid::from_slice(&data, [2, 2, 2]).unwrap();
        let surface = marching_cubes_33(&grid, 0.5).unwrap();
        assert_eq!(surface.number_of_vertices(), 3);
        assert_eq!(surface.number_of_triangles(), 1);
        // Normal points away from the high corner
        let n = surface.compute_face_normals()[0];
        assert!(n.x > 0.0 && n.y > 0.0 && n.z > 0.0);
    }

    #[test]
    fn test_tube_for_connected_body_diagonal() {
        let data = cell([1.0, -0.1, -0.1, -0.1, -0.1, -0.1, 1.0, -0.1]);
        let grid = Grid::from_slice(&data, [2, 2, 2]).unwrap();
        let mut mc = Mc33::new(Mc33Config::default());
        mc.set_grid(grid).unwrap();
        let (surface, stats) = mc.calculate_isosurface_with_stats(0.0).unwrap();
        assert_eq!(stats.tunnels, 1);
        assert_eq!(surface.number_of_vertices(), 6);
        // A band between two triangles has 6 triangles
        assert_eq!(surface.number_of_triangles(), 6);
        assert!(surface.is_edge_manifold());
        assert!(surface.has_consistent_winding());
        assert_eq!(surface.boundary_edges().len(), 6);
    }

    #[test]
    fn test_separate_caps_for_weak_body_diagonal() {
        let data = cell([0.1, -1.0, -1.0, -1.0, -1.0, -1.0, 0.1, -1.0]);
        let grid = Grid::from_slice(&data, [2, 2, 2]).unwrap();
        let surface = marching_cubes_33(&grid, 0.0).unwrap();
        assert_eq!(surface.number_of_triangles(), 2);
    }

    #[test]
    fn test_joined_face_diagonal_uses_center() {
        // Corners 0 and 2 high enough for the saddle of face -z to be positive
        let data = cell([2.0, -1.0, 2.0, -1.0, -1.0, -1.0, -1.0, -1.0]);
        let grid = Grid::from_slice(&data, [2, 2, 2]).unwrap();
        let mut mc = Mc33::new(Mc33Config::default());
        mc.set_grid(grid).unwrap();
        let (surface, stats) = mc.calculate_isosurface_with_stats(0.0).unwrap();
        assert_eq!(stats.center_vertices, 1);
        assert_eq!(surface.number_of_vertices(), 7);
        assert_eq!(surface.number_of_triangles(), 6);
        assert!(surface.validate().is_ok());
    }

    #[test]
    fn test_gradient_normals() {
        let data = cell([0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0]);
        let grid = Grid::from_slice(&data, [2, 2, 2]).unwrap();
        let mut mc = Mc33::new(Mc33Config::default().with_normals(NormalMode::Gradient));
        mc.set_grid(grid).unwrap();
        let surface = mc.calculate_isosurface(0.5).unwrap();
        let normals = surface.normals.as_ref().unwrap();
        assert_eq!(normals.len(), 4);
        for n in normals {
            assert_relative_eq!(*n, Vector3f::new(0.0, 0.0, -1.0), epsilon = 1e-6);
        }
        for n in surface.compute_face_normals() {
            assert_relative_eq!(n, Vector3f::new(0.0, 0.0, -1.0), epsilon = 1e-6);
        }
    }

    #[test]
    fn test_rejects_nan_isovalue() {
        let data = vec![0.0f32; 8];
        let grid = Grid::from_slice(&data, [2, 2, 2]).unwrap();
        assert!(matches!(marching_cubes_33(&grid, f32::NAN), Err(Error::InvalidData(_))));
    }

    #[test]
    fn test_flat_grid_has_no_cells() {
        let data = vec![0.0f32, 1.0, 0.0, 1.0];
        let grid = Grid::from_slice(&data, [2, 2, 1]).unwrap();
        assert!(marching_cubes_33(&grid, 0.5).unwrap().is_empty());
    }

    #[test]
    fn test_tube_band_stays_manifold() {
        // Corner values from a cell whose band once ran all the way around
        // one loop and met its start chord again
        for inner in [
            [0.828f32, 0.102, -0.0145, -0.336, -0.846, -0.431, -0.261, 0.864],
            [-1.0, 0.0, 1.0, 0.0, 1.0, 0.0, -1.0, -1.0],
        ] {
            let mut data = vec![-1.0f32; 64];
            for z in 0..2 {
                for y in 0..2 {
                    for x in 0..2 {
                        data[((z + 1) * 4 + y + 1) * 4 + x + 1] = inner[(z * 2 + y) * 2 + x];
                    }
                }
            }
            let grid = Grid::from_slice(&data, [4, 4, 4]).unwrap();
            let surface = marching_cubes_33(&grid, 0.0).unwrap();
            assert!(surface.is_edge_manifold());
            assert!(surface.is_watertight());
            assert!(surface.has_consistent_winding());
        }
    }

    fn band(n: usize, m: usize, steps: &[bool]) -> Vec<[u8; 3]> {
        let (mut i, mut j) = (0, 0);
        let a = |i: usize| (i % n) as u8;
        let c = |j: usize| 20 + (j % m) as u8;
        let mut triangles = Vec::new();
        for &along_first in steps {
            if along_first {
                triangles.push([a(i), a(i + 1), c(j)]);
                i += 1;
            } else {
                triangles.push([a(i), c(j + 1), c(j)]);
                j += 1;
            }
        }
        triangles
    }

    #[test]
    fn test_cheapest_band_never_reuses_a_chord() {
        // Chords on the start row are free, so the cheapest unrestricted path
        // would take every step along the first loop before the second
        for (n, m) in itertools::iproduct!(3..=7, 3..=7) {
            let (_, steps) = cheapest_band(n, m, |_, j| Some(if j == 0 { 0.0 } else { 1.0 })).unwrap();
            assert_eq!(steps.len(), n + m);
            assert_eq!(steps.iter().filter(|&&s| s).count(), n);
            assert!(band_is_manifold(&band(n, m, &steps)));

            let (_, steps) = cheapest_band(n, m, |i, _| Some(if i == 0 { 0.0 } else { 1.0 })).unwrap();
            assert!(band_is_manifold(&band(n, m, &steps)));
        }
    }

    #[test]
    fn test_single_run_band_is_rejected() {
        let steps = [true, true, true, false, false, false];
        assert!(!band_is_manifold(&band(3, 3, &steps)));
        let steps = [true, false, true, true, false, false];
        assert!(band_is_manifold(&band(3, 3, &steps)));
    }

    #[test]
    fn test_cheapest_band_respects_forbidden_chords() {
        assert!(cheapest_band(3, 3, |_, _| None).is_none());
        // Only the start chord and its neighbors allowed: no path turns enough
        assert!(cheapest_band(3, 3, |i, j| (i == 0 || j == 0 || i == 3 || j == 3).then_some(1.0)).is_none());
    }

    #[test]
    fn test_edges_share_face() {
        assert!(edges_share_face(0, 2));
        assert!(edges_share_face(0, 8));
        assert!(!edges_share_face(0, 6));
        assert!(!edges_share_face(3, 10));
    }
}
