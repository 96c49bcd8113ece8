//! Cuberille surfaces: the exposed faces of the voxels above a threshold
//!
//! Every voxel is treated as a unit box. A face is emitted when the voxel is
//! inside and its neighbor across the face is outside, so the result is a
//! closed, blocky surface that follows the voxel boundaries exactly.

use log::{debug, trace};
use serde::{Deserialize, Serialize};
use voxie_core::{Error, Grid, Operation, Result, Scalar, Surface, SurfaceBuilder, Vector3d};

/// Face bits of a voxel
pub const FACE_POS_Z: u8 = 1;
pub const FACE_NEG_Z: u8 = 2;
pub const FACE_POS_X: u8 = 4;
pub const FACE_NEG_X: u8 = 8;
pub const FACE_POS_Y: u8 = 16;
pub const FACE_NEG_Y: u8 = 32;

/// Quad corners of each face as `(dx, dy, dz)`, counter-clockwise seen from
/// outside the voxel
const FACE_QUADS: [(u8, [[usize; 3]; 4]); 6] = [
    (FACE_POS_Z, [[0, 0, 1], [1, 0, 1], [1, 1, 1], [0, 1, 1]]),
    (FACE_NEG_Z, [[0, 0, 0], [0, 1, 0], [1, 1, 0], [1, 0, 0]]),
    (FACE_POS_X, [[1, 0, 0], [1, 1, 0], [1, 1, 1], [1, 0, 1]]),
    (FACE_NEG_X, [[0, 0, 0], [0, 0, 1], [0, 1, 1], [0, 1, 0]]),
    (FACE_POS_Y, [[0, 1, 0], [0, 1, 1], [1, 1, 1], [1, 1, 0]]),
    (FACE_NEG_Y, [[0, 0, 0], [1, 0, 0], [1, 0, 1], [0, 0, 1]]),
];

/// Configuration for cuberille extraction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CuberilleConfig {
    /// Voxels with a value at or above the threshold are inside
    pub threshold: f32,
    /// Swap inside and outside
    pub invert: bool,
    /// Treat everything beyond the grid as outside, closing the surface at
    /// the grid border
    pub close_boundary: bool,
}

impl Default for CuberilleConfig {
    fn default() -> Self {
        Self {
            threshold: 0.5,
            invert: false,
            close_boundary: true,
        }
    }
}

impl CuberilleConfig {
    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_invert(mut self, invert: bool) -> Self {
        self.invert = invert;
        self
    }

    pub fn with_close_boundary(mut self, close_boundary: bool) -> Self {
        self.close_boundary = close_boundary;
        self
    }
}

/// Voxel corner vertices of the current and the next z layer
struct CornerCache {
    stride: usize,
    lower: Vec<u32>,
    upper: Vec<u32>,
}

impl CornerCache {
    fn new(nx: usize, ny: usize) -> Result<Self> {
        let len = (nx + 1) * (ny + 1);
        let mut lower = Vec::new();
        lower.try_reserve_exact(len)?;
        lower.resize(len, u32::MAX);
        let upper = lower.clone();
        Ok(Self {
            stride: nx + 1,
            lower,
            upper,
        })
    }

    fn get_or_insert_with<F>(&mut self, x: usize, y: usize, dz: usize, create: F) -> Result<u32>
    where
        F: FnOnce() -> Result<u32>,
    {
        let plane = if dz == 0 { &mut self.lower } else { &mut self.upper };
        let slot = &mut plane[y * self.stride + x];
        if *slot == u32::MAX {
            *slot = create()?;
        }
        Ok(*slot)
    }

    fn next_layer(&mut self) {
        std::mem::swap(&mut self.lower, &mut self.upper);
        self.upper.fill(u32::MAX);
    }
}

/// Extract the cuberille surface of `grid`
pub fn cuberille<T: Scalar>(grid: &Grid<'_, T>, config: &CuberilleConfig) -> Result<Surface> {
    cuberille_with(grid, config, &Operation::new())
}

/// Extract the cuberille surface of `grid`, reporting progress to `operation`
pub fn cuberille_with<T: Scalar>(
    grid: &Grid<'_, T>,
    config: &CuberilleConfig,
    operation: &Operation,
) -> Result<Surface> {
    grid.validate()?;
    if config.threshold.is_nan() {
        return Err(Error::InvalidData("Cuberille threshold is NaN".to_string()));
    }

    let [nx, ny, nz] = grid.dimensions();
    let inside = |x: usize, y: usize, z: usize| (grid.value_f32(x, y, z) >= config.threshold) ^ config.invert;
    // Neighbor at offset `d` along `axis` is outside (or beyond a closed border)
    let exposed = |x: usize, y: usize, z: usize, axis: usize, up: bool| {
        let mut p = [x, y, z];
        let beyond = if up {
            p[axis] + 1 >= [nx, ny, nz][axis]
        } else {
            p[axis] == 0
        };
        if beyond {
            return config.close_boundary;
        }
        if up {
            p[axis] += 1;
        } else {
            p[axis] -= 1;
        }
        !inside(p[0], p[1], p[2])
    };

    let mut builder = SurfaceBuilder::new();
    let mut corners = CornerCache::new(nx, ny)?;
    let mut voxels = 0usize;

    for z in 0..nz {
        if let Err(e) = operation.check_cancelled() {
            trace!("Cuberille cancelled before layer {} of {}", z, nz);
            return Err(e);
        }
        for y in 0..ny {
            for x in 0..nx {
                if !inside(x, y, z) {
                    continue;
                }
                let mut mask = 0u8;
                for (bit, axis, up) in [
                    (FACE_POS_Z, 2, true),
                    (FACE_NEG_Z, 2, false),
                    (FACE_POS_X, 0, true),
                    (FACE_NEG_X, 0, false),
                    (FACE_POS_Y, 1, true),
                    (FACE_NEG_Y, 1, false),
                ] {
                    if exposed(x, y, z, axis, up) {
                        mask |= bit;
                    }
                }
                if mask == 0 {
                    continue;
                }
                voxels += 1;

                for (bit, quad) in &FACE_QUADS {
                    if mask & bit == 0 {
                        continue;
                    }
                    let mut ids = [0u32; 4];
                    for (id, &[dx, dy, dz]) in ids.iter_mut().zip(quad) {
                        *id = corners.get_or_insert_with(x + dx, y + dy, dz, || {
                            let corner = Vector3d::new((x + dx) as f64, (y + dy) as f64, (z + dz) as f64);
                            builder.add_vertex(grid.world_position(&corner))
                        })?;
                    }
                    let [a, b, c, d] = ids;
                    builder.add_triangle(a, b, c)?;
                    builder.add_triangle(a, c, d)?;
                }
            }
        }
        corners.next_layer();
        operation.update_progress((z + 1) as f32 / nz as f32);
    }

    let surface = builder.finish(config.threshold);
    debug!(
        "Cuberille at threshold {}: {} boundary voxels, {} vertices, {} triangles",
        config.threshold,
        voxels,
        surface.number_of_vertices(),
        surface.number_of_triangles()
    );
    Ok(surface)
}
