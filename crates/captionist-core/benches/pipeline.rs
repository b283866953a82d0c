//! Benchmarks for the model-free parts of the Captionist pipeline.
//!
//! Run with: cargo bench -p captionist-core

use captionist_core::caption::preprocess::{preprocess, PreprocessOptions};
use captionist_core::config::LimitsConfig;
use captionist_core::hashtags::candidate_phrases;
use captionist_core::pipeline::{Hasher, ImageDecoder};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use image::DynamicImage;
use std::path::Path;

fn png_fixture(width: u32, height: u32) -> Vec<u8> {
    let mut buf = Vec::new();
    DynamicImage::new_rgb8(width, height)
        .write_to(&mut std::io::Cursor::new(&mut buf), image::ImageFormat::Png)
        .unwrap();
    buf
}

fn benchmark_content_hash(c: &mut Criterion) {
    let bytes = png_fixture(1024, 768);

    c.bench_function("content_hash_blake3", |b| {
        b.iter(|| Hasher::content_hash_from_bytes(black_box(&bytes)))
    });
}

fn benchmark_decode(c: &mut Criterion) {
    let bytes = png_fixture(640, 480);
    let decoder = ImageDecoder::new(LimitsConfig::default());
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("decode_png_640x480", |b| {
        b.iter(|| {
            let _ = rt.block_on(decoder.decode_from_bytes(black_box(bytes.clone()), Path::new("bench.png")));
        })
    });
}

fn benchmark_preprocess(c: &mut Criterion) {
    let img = DynamicImage::new_rgb8(1920, 1080);
    let options = PreprocessOptions {
        image_size: 224,
        mean: [0.5, 0.5, 0.5],
        std: [0.5, 0.5, 0.5],
    };

    c.bench_function("preprocess_224", |b| {
        b.iter(|| preprocess(black_box(&img), &options))
    });
}

fn benchmark_candidates(c: &mut Criterion) {
    let caption = "a group of people standing on top of a snow covered mountain next to a red flag";

    c.bench_function("candidate_phrases_bigram", |b| {
        b.iter(|| candidate_phrases(black_box(caption), 2))
    });
}

criterion_group!(
    benches,
    benchmark_content_hash,
    benchmark_decode,
    benchmark_preprocess,
    benchmark_candidates,
);
criterion_main!(benches);
