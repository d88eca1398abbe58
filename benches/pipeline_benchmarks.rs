//! Benchmarks for full frame processing

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use gaze_estimation::{
    cps::CpsMeter,
    config::Config,
    frame::{DepthFrame, Region},
    frame_gate::FrameGate,
    pipeline::{GazePipeline, PipelineState},
    segmentation::FixedRegions,
};
use std::time::{Duration, SystemTime};

/// Sloped depth so every window is non-degenerate
fn sloped_frame(offset: u16) -> DepthFrame {
    let mut frame = DepthFrame::filled(640, 480, 0);
    for ((row, col), value) in frame.samples_mut().indexed_iter_mut() {
        *value = 800 + offset + (col / 4) as u16 + (row / 8) as u16;
    }
    frame
}

fn benchmark_process_frame(c: &mut Criterion) {
    let mut group = c.benchmark_group("process_frame");
    let frames = [sloped_frame(0), sloped_frame(1)];

    for region_count in [1, 3, 6] {
        let regions: Vec<Region> = (0..region_count)
            .map(|i| Region::new(40 + 100 * i, 180, 110 + 100 * i, 260))
            .collect();
        let config = Config::default();
        let mut state = PipelineState::new(&config);
        let mut pipeline = GazePipeline::new(config, Box::new(FixedRegions::new(regions)))
            .expect("Failed to create pipeline");

        group.bench_with_input(BenchmarkId::new("regions", region_count), &region_count, |b, _| {
            let mut i = 0;
            b.iter(|| {
                // Alternate frames so the gate never rejects
                i += 1;
                let output = pipeline
                    .process_frame(&mut state, &frames[i % 2], SystemTime::now())
                    .expect("Frame processing failed");
                black_box(output);
            });
        });
    }

    group.finish();
}

fn benchmark_frame_gate(c: &mut Criterion) {
    let frame = sloped_frame(0);
    let mut gate = FrameGate::new();
    gate.accept(&frame);

    c.bench_function("frame_gate_reject_640x480", |b| {
        b.iter(|| black_box(gate.accept(black_box(&frame))));
    });
}

fn benchmark_cps(c: &mut Criterion) {
    let mut meter = CpsMeter::new(20);
    c.bench_function("cps_record", |b| {
        b.iter(|| black_box(meter.record(black_box(Duration::from_millis(33)))));
    });
}

criterion_group!(benches, benchmark_process_frame, benchmark_frame_gate, benchmark_cps);
criterion_main!(benches);
