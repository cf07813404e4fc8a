use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use image::{ImageBuffer, RgbaImage};
use shortform_studio::{
    compositor::{encode_png, layout_block, render_overlay},
    models::{FontWeight, Overlay},
};

fn create_test_image(width: u32, height: u32) -> RgbaImage {
    ImageBuffer::from_fn(width, height, |x, y| {
        image::Rgba([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8, 255])
    })
}

fn overlay(font_size: u32, weight: FontWeight) -> Overlay {
    let mut overlay = Overlay::for_phrase("the quiet hour before the city wakes up and the coffee kicks in");
    overlay.style.font_size = font_size;
    overlay.style.font_weight = weight;
    overlay
}

fn bench_layout(c: &mut Criterion) {
    let text = "the quiet hour before the city wakes up and the coffee kicks in";
    c.bench_function("layout_block_1080x1920", |b| {
        b.iter(|| layout_block(black_box(text), black_box(48), (1080, 1920), (50.0, 50.0)))
    });
}

fn bench_render(c: &mut Criterion) {
    let mut group = c.benchmark_group("render_overlay");
    let base = create_test_image(1080, 1920);

    for (name, weight) in [("normal", FontWeight::Normal), ("bold", FontWeight::Bold)] {
        for font_size in [32, 64, 96] {
            let overlay = overlay(font_size, weight);
            group.bench_with_input(BenchmarkId::new(name, font_size), &overlay, |b, overlay| {
                b.iter(|| render_overlay(black_box(base.clone()), black_box(overlay)))
            });
        }
    }

    let mut longest = overlay(256, FontWeight::Bold);
    longest.text = "shortform ".repeat(50).trim().to_string();
    group.bench_function("bold_256_long_text", |b| {
        b.iter(|| render_overlay(black_box(base.clone()), black_box(&longest)))
    });

    group.finish();
}

fn bench_encode(c: &mut Criterion) {
    let base = create_test_image(1080, 1920);
    c.bench_function("encode_png_1080x1920", |b| b.iter(|| encode_png(black_box(base.clone()))));
}

criterion_group!(benches, bench_layout, bench_render, bench_encode);
criterion_main!(benches);
