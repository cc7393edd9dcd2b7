//! Pipeline and streaming throughput.

use std::io::Cursor;

use criterion::{BatchSize, Criterion, Throughput, black_box, criterion_group, criterion_main};
use rust_data_janitor::context::RunContext;
use rust_data_janitor::frame::Frame;
use rust_data_janitor::io::{CsvSource, SourceOptions, drain};
use rust_data_janitor::pipeline::Pipeline;
use rust_data_janitor::stream::{FrameSource, MemorySink, StreamEngine};
use rust_data_janitor::transform::{ImputeMean, Lower, Trim};

const ROWS: usize = 10_000;

fn csv_text() -> String {
    let mut out = String::from("id,city,price\n");
    for i in 0..ROWS {
        let price = if i % 7 == 0 { String::new() } else { format!("{}.5", i % 100) };
        out.push_str(&format!("{i}, City{} ,{price}\n", i % 13));
    }
    out
}

fn frame(text: &str) -> Frame {
    let mut source = CsvSource::new(Cursor::new(text.as_bytes()), &SourceOptions::default())
        .expect("bench input parses");
    drain(&mut source).expect("bench input drains")
}

fn pipeline() -> Pipeline {
    Pipeline::new()
        .add(Trim::new("city"))
        .add(Lower::new("city"))
        .add(ImputeMean::new("price"))
}

fn bench_csv_read(c: &mut Criterion) {
    let text = csv_text();
    let mut group = c.benchmark_group("csv");
    group.throughput(Throughput::Elements(ROWS as u64));
    group.bench_function("infer_and_read", |b| b.iter(|| black_box(frame(&text))));
    group.finish();
}

fn bench_pipeline(c: &mut Criterion) {
    let base = frame(&csv_text());
    let mut group = c.benchmark_group("pipeline");
    group.throughput(Throughput::Elements(ROWS as u64));

    group.bench_function("batch", |b| {
        b.iter_batched(
            || base.clone(),
            |mut f| {
                pipeline().run(&RunContext::new(), &mut f).expect("pipeline runs");
                black_box(f)
            },
            BatchSize::LargeInput,
        )
    });

    for chunk in [256usize, 4_096] {
        group.bench_function(format!("stream_chunk_{chunk}"), |b| {
            b.iter_batched(
                || base.clone(),
                |f| {
                    let mut p = pipeline();
                    p.fit(&RunContext::new(), || Ok(FrameSource::new(f.clone(), chunk)))
                        .expect("fit runs");
                    let mut sink = MemorySink::default();
                    StreamEngine::new()
                        .run(&RunContext::new(), &mut p, &mut FrameSource::new(f, chunk), &mut sink)
                        .expect("stream runs");
                    black_box(sink.rows())
                },
                BatchSize::LargeInput,
            )
        });
    }
    group.finish();
}

criterion_group!(benches, bench_csv_read, bench_pipeline);
criterion_main!(benches);
