use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;
use xmpfiles::files::LIMITED_SCAN_WINDOW;
use xmpfiles::{ns, PacketScanner, XmpMeta};

fn sample_packet() -> Vec<u8> {
    let mut meta = XmpMeta::new();
    meta.set_property(ns::XMP, "CreatorTool", "Benchmark Test")
        .unwrap();
    meta.set_property(ns::DC, "format", "application/octet-stream")
        .unwrap();
    meta.serialize_packet().unwrap().into_bytes()
}

/// `lead` bytes of binary noise followed by a packet
fn container(lead: usize) -> Vec<u8> {
    let mut data: Vec<u8> = (0..lead).map(|i| (i % 251) as u8).collect();
    data.extend(sample_packet());
    data.extend_from_slice(&[0u8; 4096]);
    data
}

fn bench_find_packet(c: &mut Criterion) {
    let scanner = PacketScanner::new();
    let near = container(1024);
    let far = container(8 * 1024 * 1024);

    c.bench_function("find_packet_near_start", |b| {
        b.iter(|| scanner.find_packet(black_box(&near)));
    });
    c.bench_function("find_packet_8mib", |b| {
        b.iter(|| scanner.find_packet(black_box(&far)));
    });
}

fn bench_limited_scan_miss(c: &mut Criterion) {
    let scanner = PacketScanner::new().with_window(Some(LIMITED_SCAN_WINDOW));
    let far = container(8 * 1024 * 1024);

    c.bench_function("limited_scan_miss", |b| {
        b.iter(|| scanner.find_packet(black_box(&far)));
    });
}

fn bench_padded_write(c: &mut Criterion) {
    let scanner = PacketScanner::new();
    let data = container(64 * 1024);
    let location = scanner.find_packet(&data);
    let packet = sample_packet();

    c.bench_function("padded_write", |b| {
        b.iter(|| {
            scanner
                .write(black_box(&data), location.as_ref(), black_box(&packet))
                .unwrap()
        });
    });
}

criterion_group!(
    benches,
    bench_find_packet,
    bench_limited_scan_miss,
    bench_padded_write
);
criterion_main!(benches);
