use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use pcie_bar_tlp::{BarController, BarControllerConfig, BarHit, BarImplementation, MemRead, MemWrite};

fn criterion_config() -> Criterion {
    match std::env::var("PCIE_BAR_BENCH_PROFILE").as_deref() {
        Ok("ci") => Criterion::default()
            // Keep CI runtime low.
            .warm_up_time(Duration::from_millis(150))
            .measurement_time(Duration::from_millis(400))
            .sample_size(20)
            .noise_threshold(0.05),
        _ => Criterion::default()
            .warm_up_time(Duration::from_secs(1))
            .measurement_time(Duration::from_secs(2))
            .sample_size(50)
            .noise_threshold(0.03),
    }
}

struct Loopback;

impl BarImplementation for Loopback {
    fn read(&mut self, addr: u32, _byte_enable: u8) -> u32 {
        addr
    }

    fn write(&mut self, _addr: u32, _byte_enable: u8, _data: u32) {}
}

fn controller() -> BarController {
    let mut ctrl = BarController::new(BarControllerConfig::default()).expect("default config");
    ctrl.attach(0, Loopback).expect("slot 0");
    ctrl
}

fn bench_read_4k(c: &mut Criterion) {
    let read = MemRead::new(0x1000, 1024)
        .encode(BarHit::BAR0)
        .expect("valid read");
    let mut ctrl = controller();

    let mut group = c.benchmark_group("read_engine");
    group.throughput(Throughput::Bytes(4096));
    group.bench_function("read_4k_loopback", |b| {
        b.iter(|| {
            ctrl.tick(Some(black_box(&read)), true);
            let mut beats = 0usize;
            while !ctrl.is_idle() {
                beats += usize::from(ctrl.tick(None, true).completion.is_some());
            }
            black_box(beats)
        })
    });
    group.finish();
}

fn bench_write_burst(c: &mut Criterion) {
    let beats = MemWrite::new(0x2000, (0..64).collect())
        .encode(BarHit::BAR0)
        .expect("valid write");
    let mut ctrl = controller();

    let mut group = c.benchmark_group("write_engine");
    group.throughput(Throughput::Bytes(256));
    group.bench_function("write_64dw", |b| {
        b.iter(|| {
            let mut writes = 0usize;
            for beat in &beats {
                writes += usize::from(ctrl.tick(Some(black_box(beat)), true).write.is_some());
            }
            while !ctrl.is_idle() {
                writes += usize::from(ctrl.tick(None, true).write.is_some());
            }
            black_box(writes)
        })
    });
    group.finish();
}

criterion_group! {
    name = benches;
    config = criterion_config();
    targets = bench_read_4k, bench_write_burst
}
criterion_main!(benches);
