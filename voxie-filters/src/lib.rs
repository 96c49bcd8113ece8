//! # Voxie Filters
//!
//! Voxel-to-voxel filters that prepare volumes for surface extraction.
//!
//! Filters read a [`voxie_core::Grid`] and return a new `ndarray` volume with
//! the same `(nz, ny, nx)` layout, so their output can be wrapped in a grid
//! again and handed to the extractors.

pub mod local_thickness;

// Re-export commonly used items
pub use local_thickness::*;
