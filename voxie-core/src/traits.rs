//! Core traits for voxie

use crate::{grid::*, surface::Surface, Point3f, Vector3d};

/// Objects occupying a finite region of world space
pub trait Bounded {
    /// Axis-aligned bounding box `(min, max)`, or `None` if the object is empty
    fn bounding_box(&self) -> Option<(Point3f, Point3f)>;

    /// Center of the bounding box
    fn center(&self) -> Option<Point3f> {
        self.bounding_box()
            .map(|(min, max)| Point3f::from((min.coords + max.coords) * 0.5))
    }
}

fn bounds_of<'p>(points: impl IntoIterator<Item = &'p Point3f>) -> Option<(Point3f, Point3f)> {
    let mut points = points.into_iter();
    let first = *points.next()?;
    Some(points.fold((first, first), |(min, max), p| {
        (min.inf(p), max.sup(p))
    }))
}

impl Bounded for Surface {
    fn bounding_box(&self) -> Option<(Point3f, Point3f)> {
        bounds_of(&self.vertices)
    }
}

impl<T: Scalar> Bounded for Grid<'_, T> {
    /// World-space box enclosing all grid points, including inclined grids
    fn bounding_box(&self) -> Option<(Point3f, Point3f)> {
        let [nx, ny, nz] = self.dimensions().map(|n| (n - 1) as f64);
        let corners: Vec<Point3f> = (0..8)
            .map(|c| {
                self.world_position(&Vector3d::new(
                    if c & 1 != 0 { nx } else { 0.0 },
                    if c & 2 != 0 { ny } else { 0.0 },
                    if c & 4 != 0 { nz } else { 0.0 },
                ))
            })
            .collect();
        bounds_of(&corners)
    }
}
