//! Benchmarks for archive creation performance.
//!
//! Measures creation throughput across compression levels, directory
//! structures, encryption and the in-memory variant.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::cast_possible_truncation)]

use criterion::BenchmarkId;
use criterion::Criterion;
use criterion::Throughput;
use criterion::criterion_group;
use criterion::criterion_main;
use std::fs;
use std::hint::black_box;
use std::path::Path;
use std::path::PathBuf;
use tempfile::TempDir;
use zipbuild_core::DestinationSpec;
use zipbuild_core::FileExistAction;
use zipbuild_core::MemoryFile;
use zipbuild_core::MemoryOptions;
use zipbuild_core::MemorySource;
use zipbuild_core::Options;
use zipbuild_core::SourceSpec;
use zipbuild_core::create_archive;
use zipbuild_core::create_archive_in_memory;

/// Creates a directory with `file_count` files of 1 KB each.
fn create_test_directory(temp: &TempDir, file_count: usize) -> PathBuf {
    let dir = temp.path().join("bench_data");
    fs::create_dir_all(&dir).unwrap();
    let content = "x".repeat(1024);
    for i in 0..file_count {
        fs::write(dir.join(format!("file_{i:05}.txt")), &content).unwrap();
    }
    dir
}

/// Creates a chain of nested directories with `files` files per level.
fn create_nested_directory(temp: &TempDir, depth: usize, files: usize) -> PathBuf {
    let root = temp.path().join("nested");
    let mut level = root.clone();
    for d in 0..depth {
        fs::create_dir_all(&level).unwrap();
        for i in 0..files {
            fs::write(level.join(format!("file_{i}.txt")), "content\n").unwrap();
        }
        level = level.join(format!("level_{}", d + 1));
    }
    root
}

fn overwrite_into(output: &Path) -> (DestinationSpec, Options) {
    let destination = DestinationSpec::new(output, "bench.zip");
    let options = Options::default().with_on_destination_exists(FileExistAction::Overwrite);
    (destination, options)
}

fn bench_file_count(c: &mut Criterion) {
    let mut group = c.benchmark_group("create_file_count");
    for count in [10usize, 100, 1000] {
        let temp = TempDir::new().unwrap();
        let input = create_test_directory(&temp, count);
        let output = temp.path().join("out");
        fs::create_dir_all(&output).unwrap();
        let source = SourceSpec::path_and_mask(&input, "*.txt");
        let (destination, options) = overwrite_into(&output);

        group.throughput(Throughput::Bytes((count * 1024) as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, _| {
            b.iter(|| black_box(create_archive(&source, &destination, &options).unwrap()));
        });
    }
    group.finish();
}

fn bench_compression_levels(c: &mut Criterion) {
    let mut group = c.benchmark_group("create_compression_level");
    let temp = TempDir::new().unwrap();
    let input = create_test_directory(&temp, 200);
    let output = temp.path().join("out");
    fs::create_dir_all(&output).unwrap();
    let source = SourceSpec::path_and_mask(&input, "*");

    for level in [0u8, 1, 6, 9] {
        let (destination, options) = overwrite_into(&output);
        let options = options.with_compression_level(level);
        group.bench_with_input(BenchmarkId::from_parameter(level), &level, |b, _| {
            b.iter(|| black_box(create_archive(&source, &destination, &options).unwrap()));
        });
    }
    group.finish();
}

fn bench_nested_flatten(c: &mut Criterion) {
    let mut group = c.benchmark_group("create_nested");
    let temp = TempDir::new().unwrap();
    let input = create_nested_directory(&temp, 10, 20);
    let output = temp.path().join("out");
    fs::create_dir_all(&output).unwrap();

    for flatten in [false, true] {
        let source = SourceSpec::path_and_mask(&input, "*.txt")
            .with_include_subfolders(true)
            .with_flatten_folders(flatten);
        let (destination, options) = overwrite_into(&output);
        group.bench_with_input(BenchmarkId::new("flatten", flatten), &flatten, |b, _| {
            b.iter(|| black_box(create_archive(&source, &destination, &options).unwrap()));
        });
    }
    group.finish();
}

fn bench_encryption(c: &mut Criterion) {
    let mut group = c.benchmark_group("create_encrypted");
    let temp = TempDir::new().unwrap();
    let input = create_test_directory(&temp, 100);
    let output = temp.path().join("out");
    fs::create_dir_all(&output).unwrap();
    let source = SourceSpec::path_and_mask(&input, "*");
    let (destination, options) = overwrite_into(&output);
    let destination = destination.with_password("bench-password");

    group.throughput(Throughput::Bytes(100 * 1024));
    group.bench_function("aes256", |b| {
        b.iter(|| black_box(create_archive(&source, &destination, &options).unwrap()));
    });
    group.finish();
}

fn bench_in_memory(c: &mut Criterion) {
    let mut group = c.benchmark_group("create_in_memory");
    for size in [1024usize, 64 * 1024, 1024 * 1024] {
        let source = MemorySource::new((0..8).map(|i| MemoryFile::new(format!("f{i}.bin"), vec![0xAB; size])));
        let options = MemoryOptions::default();
        group.throughput(Throughput::Bytes((8 * size) as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| black_box(create_archive_in_memory(&source, &options).unwrap()));
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_file_count,
    bench_compression_levels,
    bench_nested_flatten,
    bench_encryption,
    bench_in_memory
);
criterion_main!(benches);
