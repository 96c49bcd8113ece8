//! Benchmarks for Marching Cubes 33 and cuberille extraction

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use voxie_core::Grid;
use voxie_surface::{
    calculate_isosurfaces, cuberille, CuberilleConfig, Mc33, Mc33Config, NormalMode,
};

/// Gyroid-like field: lots of saddles and tunnels per cell
fn generate_gyroid(size: usize) -> Vec<f32> {
    let scale = 4.0 * std::f32::consts::PI / size as f32;
    let mut data = Vec::with_capacity(size * size * size);
    for z in 0..size {
        for y in 0..size {
            for x in 0..size {
                let (fx, fy, fz) = (x as f32 * scale, y as f32 * scale, z as f32 * scale);
                data.push(fx.sin() * fy.cos() + fy.sin() * fz.cos() + fz.sin() * fx.cos());
            }
        }
    }
    data
}

fn generate_sphere(size: usize) -> Vec<f32> {
    let c = size as f32 / 2.0 - 0.3;
    let radius = size as f32 / 3.0;
    let mut data = Vec::with_capacity(size * size * size);
    for z in 0..size {
        for y in 0..size {
            for x in 0..size {
                let d = ((x as f32 - c).powi(2) + (y as f32 - c).powi(2) + (z as f32 - c).powi(2)).sqrt();
                data.push(radius - d);
            }
        }
    }
    data
}

fn bench_mc33(c: &mut Criterion) {
    let sizes = [32, 64, 96];
    let mut group = c.benchmark_group("mc33");
    group.sample_size(20);

    for &size in &sizes {
        for (name, data) in [("sphere", generate_sphere(size)), ("gyroid", generate_gyroid(size))] {
            let grid = Grid::from_slice(&data, [size, size, size]).unwrap();
            for mode in [NormalMode::None, NormalMode::Gradient] {
                let mut mc = Mc33::new(Mc33Config::default().with_normals(mode));
                mc.set_grid(grid.clone()).unwrap();
                group.bench_with_input(
                    BenchmarkId::new(format!("{}_{:?}", name, mode), size),
                    &mc,
                    |b, mc| {
                        b.iter(|| {
                            let surface = mc.calculate_isosurface(black_box(0.0)).unwrap();
                            black_box(surface);
                        });
                    },
                );
            }
        }
    }

    group.finish();
}

fn bench_multiple_isovalues(c: &mut Criterion) {
    let size = 64;
    let data = generate_sphere(size);
    let grid = Grid::from_slice(&data, [size, size, size]).unwrap();
    let isovalues: Vec<f32> = (0..8).map(|i| i as f32 * 1.5 - 4.0).collect();

    c.bench_function("mc33_eight_isovalues", |b| {
        b.iter(|| {
            let surfaces =
                calculate_isosurfaces(&grid, black_box(&isovalues), &Mc33Config::default()).unwrap();
            black_box(surfaces);
        });
    });
}

fn bench_cuberille(c: &mut Criterion) {
    let mut group = c.benchmark_group("cuberille");
    for &size in &[32, 64] {
        let data = generate_gyroid(size);
        let grid = Grid::from_slice(&data, [size, size, size]).unwrap();
        let config = CuberilleConfig::default().with_threshold(0.0);
        group.bench_with_input(BenchmarkId::from_parameter(size), &grid, |b, grid| {
            b.iter(|| {
                let surface = cuberille(black_box(grid), &config).unwrap();
                black_box(surface);
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_mc33, bench_multiple_isovalues, bench_cuberille);
criterion_main!(benches);
