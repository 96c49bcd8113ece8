//! Grid-to-world transformation for inclined (non-orthogonal) grids

use crate::{Error, Result};
use nalgebra::{Matrix3, Vector3};
use serde::{Deserialize, Serialize};

/// Linear map from grid axes to world axes.
///
/// For an orthogonal grid this is the identity. For an inclined grid the
/// columns of `matrix` are the unit directions of the grid axes in world
/// space; `inverse` maps back from world to grid axes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridTransform {
    pub matrix: Matrix3<f64>,
    pub inverse: Matrix3<f64>,
    orthogonal: bool,
}

impl GridTransform {
    /// Create an identity transformation
    pub fn identity() -> Self {
        Self {
            matrix: Matrix3::identity(),
            inverse: Matrix3::identity(),
            orthogonal: true,
        }
    }

    /// Create a transformation from an arbitrary invertible matrix
    pub fn from_matrix(matrix: Matrix3<f64>) -> Result<Self> {
        if matrix.iter().any(|v| !v.is_finite()) {
            return Err(Error::InvalidGrid(
                "Grid transform contains non-finite entries".to_string(),
            ));
        }
        let inverse = matrix.try_inverse().ok_or_else(|| {
            Error::InvalidGrid("Grid transform matrix is singular".to_string())
        })?;
        let orthogonal = (matrix - Matrix3::identity()).norm() < 1e-12;
        Ok(Self {
            matrix,
            inverse,
            orthogonal,
        })
    }

    /// Create the transformation of a grid whose axes enclose the given angles
    /// (in degrees): `alpha` between y and z, `beta` between z and x, `gamma`
    /// between x and y.
    ///
    /// The x axis stays aligned with world x and the y axis stays in the world
    /// xy plane, which makes the matrix upper triangular.
    pub fn from_angles(alpha: f64, beta: f64, gamma: f64) -> Result<Self> {
        let (ca, cb) = (alpha.to_radians().cos(), beta.to_radians().cos());
        let (sg, cg) = gamma.to_radians().sin_cos();
        if sg.abs() < 1e-12 {
            return Err(Error::InvalidGrid(format!(
                "Degenerate grid angle gamma = {}",
                gamma
            )));
        }
        let cy = (ca - cb * cg) / sg;
        let cz2 = 1.0 - cb * cb - cy * cy;
        if cz2 <= 1e-12 {
            return Err(Error::InvalidGrid(format!(
                "Grid angles ({}, {}, {}) do not describe a valid cell",
                alpha, beta, gamma
            )));
        }
        #[rustfmt::skip]
        let matrix = Matrix3::new(
            1.0, cg,  cb,
            0.0, sg,  cy,
            0.0, 0.0, cz2.sqrt(),
        );
        Self::from_matrix(matrix)
    }

    /// True if the transformation is the identity
    pub fn is_orthogonal(&self) -> bool {
        self.orthogonal
    }

    /// Map a grid-space vector to world space
    pub fn apply(&self, v: &Vector3<f64>) -> Vector3<f64> {
        if self.orthogonal {
            *v
        } else {
            self.matrix * v
        }
    }

    /// Map a grid-space gradient to a world-space normal direction
    pub fn apply_normal(&self, n: &Vector3<f64>) -> Vector3<f64> {
        if self.orthogonal {
            *n
        } else {
            self.inverse.transpose() * n
        }
    }
}

impl Default for GridTransform {
    fn default() -> Self {
        Self::identity()
    }
}
