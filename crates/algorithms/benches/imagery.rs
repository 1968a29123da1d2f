//! Per-scene costs of the two-date workflow: index, change, classes, LST.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use urbanlens_algorithms::imagery::{
    class_fractions, decode_lst, raster_difference, RasterDiffParams, SpectralIndex,
    ThermalDecode, ZeroGuard,
};
use urbanlens_core::{GeoTransform, Raster};

const SIZES: [usize; 3] = [256, 1024, 2048];

/// Deterministic band with values in `[low, low + 400)`, NaN in one corner.
fn band(size: usize, low: f64, seed: usize) -> Raster<f64> {
    let data = (0..size * size)
        .map(|i| {
            let (row, col) = (i / size, i % size);
            if row < size / 16 && col < size / 16 {
                f64::NAN
            } else {
                low + ((row * 31 + col * 17 + seed) % 400) as f64
            }
        })
        .collect();
    let mut r = Raster::from_vec(data, size, size).unwrap();
    r.set_transform(GeoTransform::new(716_000.0, 3_152_000.0, 10.0, -10.0));
    r
}

fn bench_indices(c: &mut Criterion) {
    let mut group = c.benchmark_group("index");
    for size in SIZES {
        let (b1, b2) = (band(size, 900.0, 0), band(size, 2600.0, 7));
        group.throughput(Throughput::Elements((size * size) as u64));
        for index in SpectralIndex::ALL {
            group.bench_with_input(BenchmarkId::new(index.name(), size), &index, |b, index| {
                b.iter(|| index.compute(black_box(&b1), black_box(&b2), ZeroGuard::Nodata))
            });
        }
    }
    group.finish();
}

fn bench_change(c: &mut Criterion) {
    let mut group = c.benchmark_group("change");
    for size in SIZES {
        let before = SpectralIndex::Ndvi
            .compute(&band(size, 900.0, 0), &band(size, 2600.0, 7), ZeroGuard::Nodata)
            .unwrap();
        let after = SpectralIndex::Ndvi
            .compute(&band(size, 1100.0, 3), &band(size, 2300.0, 11), ZeroGuard::Nodata)
            .unwrap();
        group.throughput(Throughput::Elements((size * size) as u64));
        group.bench_function(BenchmarkId::new("difference", size), |b| {
            b.iter(|| raster_difference(&before, &after, RasterDiffParams::symmetric(0.1)))
        });
        group.bench_function(BenchmarkId::new("class_fractions", size), |b| {
            b.iter(|| class_fractions(black_box(&after), SpectralIndex::Ndvi))
        });
    }
    group.finish();
}

fn bench_lst(c: &mut Criterion) {
    let decode = ThermalDecode::default();
    let mut group = c.benchmark_group("lst");
    for size in SIZES {
        let raw = band(size, 250.0, 5);
        group.throughput(Throughput::Elements((size * size) as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &raw, |b, raw| {
            b.iter(|| decode_lst(black_box(raw), &decode))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_indices, bench_change, bench_lst);
criterion_main!(benches);
