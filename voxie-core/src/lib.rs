//! Core data structures and traits for voxie
//!
//! This crate provides the fundamental types shared by the volume filters and
//! the surface extraction pipeline: scalar grids, grid transforms, indexed
//! triangle surfaces, cooperative operations and the common error type.

pub mod point;
pub mod grid;
pub mod transform;
pub mod surface;
pub mod operation;
pub mod traits;
pub mod error;

pub use point::*;
pub use grid::*;
pub use transform::*;
pub use surface::*;
pub use operation::*;
pub use traits::*;
pub use error::*;

/// Re-export commonly used types from nalgebra
pub use nalgebra::{Matrix3, Point3, Vector3};
