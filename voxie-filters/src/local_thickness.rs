//! Local thickness of a structure from its distance map
//!
//! The local thickness of a voxel is the radius of the largest sphere that
//! fits inside the structure and covers the voxel. Given a distance map
//! (distance of every foreground voxel to the background), each voxel with a
//! positive distance is the center of an inscribed sphere of that radius; the
//! local thickness is the maximum over all spheres covering a voxel.

use log::{debug, trace};
use ndarray::Array3;
use voxie_core::{Grid, Operation, Result, Scalar};

/// Local thickness filter
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalThickness;

/// Voxel bounds of a sphere around a center, clamped to the grid
struct SphereBounds {
    lo: [usize; 3],
    hi: [usize; 3],
}

impl SphereBounds {
    fn new(center: [usize; 3], dist: f32, dims: [usize; 3]) -> Self {
        let extent = dims.iter().copied().max().unwrap_or(0);
        let radius = ((dist.ceil() - 1.0).max(0.0) as usize).min(extent);
        let lo = [0, 1, 2].map(|a| center[a].saturating_sub(radius));
        let hi = [0, 1, 2].map(|a| (center[a] + radius).min(dims[a] - 1));
        Self { lo, hi }
    }

    /// Every voxel in the box together with its distance to `center`
    fn for_each(&self, center: [usize; 3], mut f: impl FnMut([usize; 3], f32)) {
        for x in self.lo[0]..=self.hi[0] {
            let dx = x.abs_diff(center[0]).pow(2);
            for y in self.lo[1]..=self.hi[1] {
                let dy = y.abs_diff(center[1]).pow(2);
                for z in self.lo[2]..=self.hi[2] {
                    let dz = z.abs_diff(center[2]).pow(2);
                    f([x, y, z], ((dx + dy + dz) as f32).sqrt());
                }
            }
        }
    }
}

#[inline]
fn index([x, y, z]: [usize; 3]) -> [usize; 3] {
    [z, y, x]
}

impl LocalThickness {
    pub fn new() -> Self {
        Self
    }

    /// Paint the inscribed sphere of every voxel.
    ///
    /// # Arguments
    /// * `input` - Distance map; voxels with a value `<= 0` are background
    /// * `operation` - Receives progress once per x slab and can cancel the run
    ///
    /// # Returns
    /// * `Result<Array3<f32>>` - Local thickness with shape `(nz, ny, nx)`
    pub fn compute_naive<T: Scalar>(&self, input: &Grid<'_, T>, operation: &Operation) -> Result<Array3<f32>> {
        let dims = input.dimensions();
        let [nx, ny, nz] = dims;
        let mut output = Array3::<f32>::zeros((nz, ny, nx));

        for x in 0..nx {
            operation.check_cancelled()?;
            operation.update_progress(x as f32 / nx as f32);
            for y in 0..ny {
                for z in 0..nz {
                    let dist = input.value_f32(x, y, z);
                    if dist <= 0.0 {
                        continue;
                    }
                    let center = [x, y, z];
                    SphereBounds::new(center, dist, dims).for_each(center, |p, r| {
                        if r <= dist {
                            let out = &mut output[index(p)];
                            *out = out.max(dist);
                        }
                    });
                }
            }
        }

        operation.update_progress(1.0);
        Ok(output)
    }

    /// Paint only the spheres of local maxima of the distance map.
    ///
    /// Starting from each foreground voxel that is not covered yet, the
    /// filter climbs to the next unprocessed local maximum and paints its
    /// sphere. Voxels whose own sphere lies inside the painted one are marked
    /// processed and never painted themselves. This visits far fewer spheres
    /// than [`LocalThickness::compute_naive`]; the result never exceeds it.
    ///
    /// # Arguments
    /// * `input` - Distance map; voxels with a value `<= 0` are background
    /// * `operation` - Receives progress once per x slab and can cancel the run
    ///
    /// # Returns
    /// * `Result<Array3<f32>>` - Local thickness with shape `(nz, ny, nx)`
    pub fn compute<T: Scalar>(&self, input: &Grid<'_, T>, operation: &Operation) -> Result<Array3<f32>> {
        let dims = input.dimensions();
        let [nx, ny, nz] = dims;
        let mut output = Array3::<f32>::zeros((nz, ny, nx));
        let mut processed = Array3::<bool>::from_elem((nz, ny, nx), false);
        let value = |[x, y, z]: [usize; 3]| input.value_f32(x, y, z);
        let mut spheres = 0usize;

        for x in 0..nx {
            operation.check_cancelled()?;
            operation.update_progress(x as f32 / nx as f32);
            for y in 0..ny {
                for z in 0..nz {
                    let start = [x, y, z];
                    if value(start) <= 0.0 {
                        continue;
                    }
                    while !processed[index(start)] {
                        let peak = climb(start, dims, &value, &processed);
                        let dist = value(peak);
                        SphereBounds::new(peak, dist, dims).for_each(peak, |p, r| {
                            if r <= dist {
                                let out = &mut output[index(p)];
                                *out = out.max(dist);
                                if (dist - r).ceil() >= value(p).ceil() {
                                    processed[index(p)] = true;
                                }
                            }
                        });
                        spheres += 1;
                    }
                }
            }
            trace!("Local thickness: slab {} done, {} spheres so far", x, spheres);
        }

        debug!(
            "Local thickness on {}x{}x{} voxels painted {} spheres",
            nx, ny, nz, spheres
        );
        operation.update_progress(1.0);
        Ok(output)
    }
}

/// Walk from `start` to a neighbor with a larger value until none is left,
/// skipping processed voxels. Neighbors are tried in the order -x, +x, -y,
/// +y, -z, +z.
fn climb(
    start: [usize; 3],
    dims: [usize; 3],
    value: &impl Fn([usize; 3]) -> f32,
    processed: &Array3<bool>,
) -> [usize; 3] {
    let mut p = start;
    'walk: loop {
        let here = value(p);
        for axis in 0..3 {
            let down = p[axis].saturating_sub(1);
            let up = (p[axis] + 1).min(dims[axis] - 1);
            for n in [down, up] {
                let mut q = p;
                q[axis] = n;
                if here < value(q) && !processed[index(q)] {
                    p = q;
                    continue 'walk;
                }
            }
        }
        return p;
    }
}

/// Local thickness with the local-maximum algorithm
pub fn local_thickness<T: Scalar>(input: &Grid<'_, T>) -> Result<Array3<f32>> {
    LocalThickness::new().compute(input, &Operation::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::sync::{Arc, Mutex};
    use voxie_core::Error;

    /// Distance map of a ball: `radius - |p - center|`, clamped at zero
    fn ball(n: usize, radius: f32) -> Vec<f32> {
        let c = (n - 1) as f32 / 2.0;
        let mut data = Vec::with_capacity(n * n * n);
        for z in 0..n {
            for y in 0..n {
                for x in 0..n {
                    let d = ((x as f32 - c).powi(2) + (y as f32 - c).powi(2) + (z as f32 - c).powi(2)).sqrt();
                    data.push((radius - d).max(0.0));
                }
            }
        }
        data
    }

    #[test]
    fn test_single_voxel() {
        let mut data = vec![0.0f32; 27];
        data[13] = 1.0;
        let grid = Grid::from_slice(&data, [3, 3, 3]).unwrap();
        for output in [
            LocalThickness::new().compute_naive(&grid, &Operation::new()).unwrap(),
            local_thickness(&grid).unwrap(),
        ] {
            assert_eq!(output[[1, 1, 1]], 1.0);
            assert_eq!(output.iter().filter(|&&v| v > 0.0).count(), 1);
        }
    }

    #[test]
    fn test_sphere_footprint() {
        let n = 7;
        let mut data = vec![0.0f32; n * n * n];
        data[(3 * n + 3) * n + 3] = 2.5;
        let grid = Grid::from_slice(&data, [n, n, n]).unwrap();
        let output = LocalThickness::new().compute_naive(&grid, &Operation::new()).unwrap();
        // Box radius ceil(2.5) - 1 = 2, Euclidean cut at 2.5
        assert_eq!(output[[3, 3, 3]], 2.5);
        assert_eq!(output[[3, 3, 5]], 2.5);
        assert_eq!(output[[3, 4, 5]], 2.5);
        assert_eq!(output[[3, 5, 5]], 0.0);
        assert_eq!(output[[3, 3, 6]], 0.0);
    }

    #[test]
    fn test_larger_spheres_win() {
        let n = 5;
        let mut data = vec![0.0f32; n * n * n];
        data[(2 * n + 2) * n + 1] = 1.0;
        data[(2 * n + 2) * n + 2] = 2.0;
        let grid = Grid::from_slice(&data, [n, n, n]).unwrap();
        let output = LocalThickness::new().compute_naive(&grid, &Operation::new()).unwrap();
        assert_eq!(output[[2, 2, 1]], 2.0);
        assert_eq!(output[[2, 2, 3]], 2.0);
    }

    #[test]
    fn test_fast_is_bounded_by_naive() {
        let n = 11;
        let data = ball(n, 4.3);
        let grid = Grid::from_slice(&data, [n, n, n]).unwrap();
        let filter = LocalThickness::new();
        let naive = filter.compute_naive(&grid, &Operation::new()).unwrap();
        let fast = filter.compute(&grid, &Operation::new()).unwrap();
        for ((f, s), &d) in fast.iter().zip(naive.iter()).zip(&data) {
            assert!(f <= s);
            if d > 0.0 {
                assert!(*f >= d);
            }
        }
        // The ball is covered by the sphere of its center
        let center = data.iter().cloned().fold(0.0f32, f32::max);
        assert_relative_eq!(fast[[5, 5, 5]], center);
        assert_relative_eq!(naive[[5, 5, 6]], center);
    }

    #[test]
    fn test_unbounded_distance_covers_grid() {
        let mut data = vec![0.0f32; 27];
        data[0] = f32::INFINITY;
        data[13] = f32::MAX;
        let grid = Grid::from_slice(&data, [3, 3, 3]).unwrap();
        let filter = LocalThickness::new();
        for output in [
            filter.compute_naive(&grid, &Operation::new()).unwrap(),
            filter.compute(&grid, &Operation::new()).unwrap(),
        ] {
            assert_eq!(output[[2, 2, 2]], f32::INFINITY);
            assert!(output.iter().all(|&v| v >= f32::MAX));
        }
    }

    #[test]
    fn test_background_stays_zero() {
        let data = vec![0.0f32; 64];
        let grid = Grid::from_slice(&data, [4, 4, 4]).unwrap();
        let output = local_thickness(&grid).unwrap();
        assert!(output.iter().all(|&v| v == 0.0));
        assert_eq!(output.dim(), (4, 4, 4));
    }

    #[test]
    fn test_cancelled() {
        let data = ball(5, 2.0);
        let grid = Grid::from_slice(&data, [5, 5, 5]).unwrap();
        let operation = Operation::new();
        operation.cancel();
        let filter = LocalThickness::new();
        assert!(matches!(filter.compute(&grid, &operation), Err(Error::Cancelled)));
        assert!(matches!(filter.compute_naive(&grid, &operation), Err(Error::Cancelled)));
    }

    #[test]
    fn test_progress_per_slab() {
        let data = ball(6, 2.0);
        let grid = Grid::from_slice(&data, [6, 6, 6]).unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let operation = Operation::with_progress_callback(move |p| {
            if let Ok(mut seen) = sink.lock() {
                seen.push(p);
            }
        });
        LocalThickness::new().compute(&grid, &operation).unwrap();
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 7);
        assert_eq!(seen.last(), Some(&1.0));
        assert!(seen.windows(2).all(|w| w[0] <= w[1]));
    }
}
