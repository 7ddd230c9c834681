// Filebridge - Unified File Storage
// Copyright (C) 2025 Filebridge Contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published
// by the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.

//! Upload pipeline benchmarks

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use filebridge_storage::{mock::MemoryPlatform, FileStorageService};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use std::hint::black_box;
use std::io::Cursor;
use std::sync::Arc;

fn memory_service() -> Arc<FileStorageService> {
    Arc::new(
        FileStorageService::builder()
            .platform(Arc::new(MemoryPlatform::new("memory-1")))
            .default_platform("memory-1")
            .build(),
    )
}

fn bench_upload_bytes(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    let mut group = c.benchmark_group("upload_bytes");

    for size in [1024usize, 64 * 1024, 1024 * 1024].iter() {
        group.throughput(Throughput::Bytes(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            let service = memory_service();
            let payload = bytes::Bytes::from(vec![0u8; size]);

            b.to_async(&rt).iter(|| {
                let service = Arc::clone(&service);
                let payload = payload.clone();
                async move {
                    let info = service
                        .of_bytes(black_box(payload))
                        .name("bench.bin")
                        .upload()
                        .await
                        .unwrap();
                    service.delete(&info).await.unwrap();
                }
            });
        });
    }

    group.finish();
}

fn bench_upload_reader(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let service = memory_service();
    let payload = vec![7u8; 256 * 1024];

    c.bench_function("upload_reader_256k", |b| {
        b.to_async(&rt).iter(|| {
            let service = Arc::clone(&service);
            let payload = payload.clone();
            async move {
                let info = service
                    .of_reader(Cursor::new(payload))
                    .name("bench.bin")
                    .upload()
                    .await
                    .unwrap();
                service.delete(&info).await.unwrap();
            }
        });
    });
}

fn bench_upload_with_thumbnail(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let service = memory_service();

    let img = RgbImage::from_pixel(1024, 768, Rgb([90, 60, 30]));
    let mut png = Vec::new();
    DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
        .unwrap();
    let png = bytes::Bytes::from(png);

    c.bench_function("upload_with_thumbnail_1024x768", |b| {
        b.to_async(&rt).iter(|| {
            let service = Arc::clone(&service);
            let png = png.clone();
            async move {
                let info = service
                    .of_bytes(png)
                    .name("photo.png")
                    .thumbnail()
                    .upload()
                    .await
                    .unwrap();
                service.delete(&info).await.unwrap();
            }
        });
    });
}

criterion_group!(
    benches,
    bench_upload_bytes,
    bench_upload_reader,
    bench_upload_with_thumbnail
);
criterion_main!(benches);
