// Run with: cargo bench --bench render_text

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use embedded_graphics::{mono_font::ascii::FONT_6X10, pixelcolor::RgbColor};
use hub75_gpio_matrix::{Color, RenderOptions};
use std::{hint::black_box, time::Duration};

mod common;

// Three representative strings of different lengths
const TEST_STRINGS: &[(&str, &str)] = &[
    ("short", "HELLO"),
    ("medium", "THE QUICK BROWN"),
    ("long", "ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789"),
];

fn configure_criterion() -> Criterion {
    Criterion::default()
        .sample_size(100)
        .measurement_time(Duration::from_secs(10))
        .warm_up_time(Duration::from_secs(3))
}

fn render_text_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("render_text");
    let matrix = common::matrix(RenderOptions::default());

    for (case, text) in TEST_STRINGS {
        // every glyph cell is painted, foreground or background
        let pixel_count = u64::from(
            text.len() as u32 * FONT_6X10.character_size.width * FONT_6X10.character_size.height,
        );
        group.throughput(Throughput::Elements(pixel_count));

        group.bench_with_input(BenchmarkId::new("draw_text", case), text, |b, text| {
            let canvas = matrix.back();
            b.iter(|| {
                black_box(canvas.draw_text(
                    black_box(0),
                    black_box(0),
                    black_box(text),
                    &FONT_6X10,
                    Color::WHITE,
                    Color::BLACK,
                ))
            });
        });
    }

    group.finish();
}

criterion_group!(name = benches; config = configure_criterion(); targets = render_text_benchmark);
criterion_main!(benches);
