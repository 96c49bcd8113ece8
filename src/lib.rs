//! # Voxie
//!
//! Volumetric data processing and isosurface extraction for Rust.
//!
//! This is the umbrella crate that provides convenient access to all voxie
//! functionality. You can use this crate to get everything in one place, or
//! use individual crates for more granular control over dependencies.
//!
//! ## Features
//!
//! - **Core**: Scalar grids, grid transforms, triangle surfaces, operations
//! - **Surface**: Marching Cubes 33 and cuberille surface extraction
//! - **Filters**: Voxel-to-voxel filters such as local thickness
//!
//! ## Quick Start
//!
//! ```rust
//! use voxie::prelude::*;
//!
//! // A 2x2x2 grid whose top layer is above the isovalue
//! let data = [0.0f32, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0];
//! let grid = Grid::from_slice(&data, [2, 2, 2]).unwrap();
//!
//! let surface = marching_cubes_33(&grid, 0.5).unwrap();
//! assert_eq!(surface.number_of_triangles(), 2);
//! ```
//!
//! ## Feature Flags
//!
//! - `default`: Enables surface and filters
//! - `surface`: Isosurface extraction
//! - `filters`: Volume filters
//! - `all`: Enables all features

// Re-export core functionality
pub use voxie_core::*;

// Re-export sub-crates
#[cfg(feature = "surface")]
pub use voxie_surface as surface_extraction;

#[cfg(feature = "filters")]
pub use voxie_filters as filters;

/// Convenient imports for common use cases
pub mod prelude {
    pub use voxie_core::*;

    #[cfg(feature = "surface")]
    pub use voxie_surface::*;

    #[cfg(feature = "filters")]
    pub use voxie_filters::*;
}
