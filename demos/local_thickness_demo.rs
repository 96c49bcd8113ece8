//! Local thickness of a synthetic structure, followed by surface extraction
//! of the regions thicker than a limit

use anyhow::{bail, Result};
use clap::Parser;
use std::time::Instant;
use voxie_core::{Grid, Operation};
use voxie_filters::LocalThickness;
use voxie_surface::marching_cubes_33;

#[derive(Parser, Debug)]
#[command(name = "local_thickness_demo")]
#[command(about = "Compute local thickness of two joined rods", long_about = None)]
struct Args {
    /// Grid points per axis
    #[arg(long, default_value = "40")]
    size: usize,

    /// Run the every-voxel variant as well and compare
    #[arg(long)]
    naive: bool,

    /// Extract the surface of voxels with at least this thickness
    #[arg(long, default_value = "3.0")]
    limit: f32,
}

/// Distance map of a thick rod along x joined by a thin rod along y
fn rods(n: usize) -> Vec<f32> {
    let c = n as f32 / 2.0;
    let (thick, thin) = (n as f32 / 6.0, n as f32 / 14.0);
    let mut data = Vec::with_capacity(n * n * n);
    for z in 0..n {
        for y in 0..n {
            for x in 0..n {
                let (px, py, pz) = (x as f32 - c, y as f32 - c, z as f32 - c);
                let along_x = thick - (py * py + pz * pz).sqrt();
                let along_y = thin - (px * px + pz * pz).sqrt();
                data.push(along_x.max(along_y).max(0.0));
            }
        }
    }
    data
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    if args.size < 4 {
        bail!("--size must be at least 4");
    }

    let n = args.size;
    let distance = rods(n);
    let grid = Grid::from_slice(&distance, [n, n, n])?;
    let filter = LocalThickness::new();
    let operation = Operation::with_progress_callback(|p| log::debug!("progress {:.0}%", p * 100.0));

    let start = Instant::now();
    let thickness = filter.compute(&grid, &operation)?;
    println!("local maxima: {:.2?}", start.elapsed());

    if args.naive {
        let start = Instant::now();
        let reference = filter.compute_naive(&grid, &operation)?;
        let max_gap = reference
            .iter()
            .zip(thickness.iter())
            .map(|(r, t)| r - t)
            .fold(0.0f32, f32::max);
        println!("every voxel:  {:.2?}, largest difference {:.3}", start.elapsed(), max_gap);
    }

    let max = thickness.iter().cloned().fold(0.0f32, f32::max);
    let covered = thickness.iter().filter(|&&t| t > 0.0).count();
    println!("{} foreground voxels, maximum thickness {:.2}", covered, max);

    let thickness_grid = Grid::from_view(thickness.view());
    let surface = marching_cubes_33(&thickness_grid, args.limit)?;
    println!(
        "regions thicker than {}: {} vertices, {} triangles, area {:.1}",
        args.limit,
        surface.number_of_vertices(),
        surface.number_of_triangles(),
        surface.area()
    );
    Ok(())
}
