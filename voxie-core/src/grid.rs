//! Read-only view over a regularly spaced 3D scalar field

use crate::{Error, GridTransform, Point3d, Point3f, Result, Vector3d};
use ndarray::ArrayView3;

/// Sample types a [`Grid`] can hold.
///
/// Classification and interpolation always happen in `f32`, so integer
/// volumes (8/16/32 bit CT data) and floating point volumes go through the
/// same code path.
pub trait Scalar: Copy + Send + Sync + 'static {
    fn to_f32(self) -> f32;
}

macro_rules! impl_scalar {
    ($($t:ty),*) => {
        $(
            impl Scalar for $t {
                #[inline]
                fn to_f32(self) -> f32 {
                    self as f32
                }
            }
        )*
    };
}

impl_scalar!(u8, u16, u32, i16, i32, f32, f64);

/// A dense scalar field sampled on a regular grid.
///
/// The grid does not own its samples: it borrows a buffer laid out with x
/// varying fastest, then y, then z, and keeps copies of the geometric
/// metadata. Point `(i, j, k)` sits at
/// `origin + transform · (spacing ⊙ (i, j, k))` in world space.
#[derive(Debug, Clone)]
pub struct Grid<'a, T: Scalar> {
    data: ArrayView3<'a, T>,
    dimensions: [usize; 3],
    spacing: [f64; 3],
    origin: Point3d,
    transform: GridTransform,
}

impl<'a, T: Scalar> Grid<'a, T> {
    /// Wrap a flat buffer of `nx * ny * nz` samples
    pub fn from_slice(data: &'a [T], dimensions: [usize; 3]) -> Result<Self> {
        let [nx, ny, nz] = dimensions;
        if nx == 0 || ny == 0 || nz == 0 {
            return Err(Error::InvalidGrid(format!(
                "Grid dimensions must be positive, got {:?}",
                dimensions
            )));
        }
        let expected = nx
            .checked_mul(ny)
            .and_then(|n| n.checked_mul(nz))
            .ok_or_else(|| {
                Error::InvalidGrid(format!("Grid dimensions {:?} overflow", dimensions))
            })?;
        if data.len() != expected {
            return Err(Error::InvalidGrid(format!(
                "Buffer holds {} samples but dimensions {:?} need {}",
                data.len(),
                dimensions,
                expected
            )));
        }
        let view = ArrayView3::from_shape((nz, ny, nx), data)?;
        Ok(Self::from_view(view))
    }

    /// Wrap an existing array view with shape `(nz, ny, nx)`
    pub fn from_view(data: ArrayView3<'a, T>) -> Self {
        let (nz, ny, nx) = data.dim();
        Self {
            data,
            dimensions: [nx, ny, nz],
            spacing: [1.0; 3],
            origin: Point3d::origin(),
            transform: GridTransform::identity(),
        }
    }

    /// Set the distance between adjacent grid points along each axis
    pub fn with_spacing(mut self, spacing: [f64; 3]) -> Self {
        self.spacing = spacing;
        self
    }

    /// Set the world position of grid point (0, 0, 0)
    pub fn with_origin(mut self, origin: Point3d) -> Self {
        self.origin = origin;
        self
    }

    /// Set the grid-to-world transformation for inclined grids
    pub fn with_transform(mut self, transform: GridTransform) -> Self {
        self.transform = transform;
        self
    }

    /// Check the geometric metadata before running an algorithm on the grid
    pub fn validate(&self) -> Result<()> {
        for (axis, &d) in self.spacing.iter().enumerate() {
            if !d.is_finite() || d == 0.0 {
                return Err(Error::InvalidGrid(format!(
                    "Spacing along axis {} must be finite and nonzero, got {}",
                    axis, d
                )));
            }
        }
        if self.origin.iter().any(|c| !c.is_finite()) {
            return Err(Error::InvalidGrid(format!(
                "Grid origin must be finite, got {:?}",
                self.origin
            )));
        }
        Ok(())
    }

    /// Number of grid points per axis `[nx, ny, nz]`
    pub fn dimensions(&self) -> [usize; 3] {
        self.dimensions
    }

    pub fn spacing(&self) -> [f64; 3] {
        self.spacing
    }

    pub fn origin(&self) -> Point3d {
        self.origin
    }

    pub fn transform(&self) -> &GridTransform {
        &self.transform
    }

    /// Number of cells (cubes between 8 neighboring points)
    pub fn cell_count(&self) -> usize {
        self.dimensions
            .iter()
            .map(|n| n.saturating_sub(1))
            .product()
    }

    /// The underlying samples, indexed `[z, y, x]`
    pub fn view(&self) -> &ArrayView3<'a, T> {
        &self.data
    }

    /// Sample at grid point `(i, j, k)`
    #[inline]
    pub fn value(&self, i: usize, j: usize, k: usize) -> T {
        debug_assert!(
            i < self.dimensions[0] && j < self.dimensions[1] && k < self.dimensions[2],
            "Grid index ({}, {}, {}) out of bounds for dimensions {:?}",
            i,
            j,
            k,
            self.dimensions
        );
        self.data[[k, j, i]]
    }

    /// Sample at grid point `(i, j, k)` as `f32`
    #[inline]
    pub fn value_f32(&self, i: usize, j: usize, k: usize) -> f32 {
        self.value(i, j, k).to_f32()
    }

    /// Sample at grid point `(i, j, k)` with bounds checking
    pub fn get(&self, i: usize, j: usize, k: usize) -> Option<T> {
        self.data.get([k, j, i]).copied()
    }

    /// Convert (possibly fractional) grid coordinates to world coordinates
    pub fn world_position(&self, g: &Vector3d) -> Point3f {
        let scaled = Vector3d::new(
            g.x * self.spacing[0],
            g.y * self.spacing[1],
            g.z * self.spacing[2],
        );
        let p = self.origin + self.transform.apply(&scaled);
        Point3f::new(p.x as f32, p.y as f32, p.z as f32)
    }

    /// Gradient at grid point `(i, j, k)` in index space.
    ///
    /// Central differences inside the grid, one-sided differences on the
    /// border and zero along axes with a single sample.
    pub fn gradient(&self, i: usize, j: usize, k: usize) -> Vector3d {
        let idx = [i, j, k];
        let mut g = Vector3d::zeros();
        for axis in 0..3 {
            let n = self.dimensions[axis];
            if n < 2 {
                continue;
            }
            let lo = idx[axis].saturating_sub(1);
            let hi = (idx[axis] + 1).min(n - 1);
            let mut a = idx;
            let mut b = idx;
            a[axis] = lo;
            b[axis] = hi;
            let va = self.value_f32(a[0], a[1], a[2]) as f64;
            let vb = self.value_f32(b[0], b[1], b[2]) as f64;
            g[axis] = (vb - va) / (hi - lo) as f64;
        }
        g
    }

    /// Gradient at grid point `(i, j, k)` in world space
    pub fn world_gradient(&self, i: usize, j: usize, k: usize) -> Vector3d {
        let g = self.gradient(i, j, k);
        let scaled = Vector3d::new(
            g.x / self.spacing[0],
            g.y / self.spacing[1],
            g.z / self.spacing[2],
        );
        self.transform.apply_normal(&scaled)
    }
}
