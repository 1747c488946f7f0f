// Run with:  cargo bench --bench set_pixel

use criterion::{criterion_group, criterion_main, Criterion, Throughput};
use embedded_graphics::pixelcolor::RgbColor;
use hub75_gpio_matrix::{Color, Geometry, RenderOptions};
use std::hint::black_box;

mod common;
use common::{HEIGHT, WIDTH};

fn set_pixel(c: &mut Criterion) {
    let mut group = c.benchmark_group("set_pixel");
    group.throughput(Throughput::Elements((WIDTH * HEIGHT) as u64));

    group.bench_function("single_panel", |b| {
        let matrix = common::matrix(RenderOptions::default());
        let canvas = matrix.back();
        b.iter(|| {
            for y in 0..HEIGHT as i32 {
                for x in 0..WIDTH as i32 {
                    black_box(&canvas).set_pixel(black_box(x), black_box(y), black_box(Color::RED));
                }
            }
        });
    });

    group.bench_function("chained_two_rows", |b| {
        // same pixel count, but every other band goes through the reversal
        let geometry = Geometry::chained(WIDTH, HEIGHT, 2, 1).expect("valid geometry");
        let buffer = hub75_gpio_matrix::FrameBuffer::new(geometry);
        b.iter(|| {
            for y in 0..HEIGHT as i32 {
                for x in 0..WIDTH as i32 {
                    black_box(&buffer).set_pixel(
                        black_box(x),
                        black_box(y),
                        black_box(Color::CYAN),
                    );
                }
            }
        });
    });

    group.finish();
}

criterion_group!(benches, set_pixel);
criterion_main!(benches);
