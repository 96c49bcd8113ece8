//! # Voxie Surface
//!
//! Isosurface extraction from scalar volumes.
//!
//! This crate provides Marching Cubes 33, which produces watertight
//! surfaces with the topology of the trilinear interpolant, and cuberille
//! extraction for blocky voxel-boundary surfaces.

pub mod cuberille;
pub mod mc33;
pub mod parallel;

// Re-export commonly used items
pub use cuberille::{cuberille, cuberille_with, CuberilleConfig};
pub use mc33::{
    calculate_isosurfaces, marching_cubes_33, ExtractionStats, Mc33, Mc33Config, NormalMode,
};
