//! Benchmarks for a full two-phase run.

use backtest_config::{ComponentSpec, RunConfig};
use backtest_core::types::{Candle, PrefetchedOhlcv};
use backtest_engine::Sandbox;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use serde_json::json;

const DAY: i64 = 86_400_000;

fn generate_series(len: usize, phase: f64) -> Vec<Candle> {
    (0..len)
        .map(|i| {
            let x = i as f64 * 0.07 + phase;
            let close = 100.0 + x.sin() * 10.0 + (x * 0.31).cos() * 4.0;
            let open = close - (x * 1.7).sin();
            Candle::new(
                i as i64 * DAY,
                open,
                open.max(close) + 0.8,
                open.min(close) - 0.8,
                close,
                1000.0,
            )
        })
        .collect()
}

fn setup(symbols: usize, bars: usize) -> (RunConfig, PrefetchedOhlcv) {
    let names: Vec<String> = (0..symbols).map(|i| format!("SYM{}USDT", i)).collect();
    let data = names
        .iter()
        .enumerate()
        .fold(PrefetchedOhlcv::new(), |data, (i, name)| {
            data.with_series(name.clone(), generate_series(bars, i as f64))
        });

    let mut config = RunConfig::new(names);
    config.strategy = Some(ComponentSpec::Builtin {
        builtin: "ma_crossover".into(),
        params: json!({"fast_period": 5, "slow_period": 20}),
    });
    config.num_iterations = bars;
    (config, data)
}

fn benchmark_full_run(c: &mut Criterion) {
    let mut group = c.benchmark_group("FullRun");
    group.sample_size(20);
    let sandbox = Sandbox::new();

    for symbols in [1, 8, 32].iter() {
        let (config, data) = setup(*symbols, 1000);
        group.bench_with_input(BenchmarkId::new("ma_crossover", symbols), &data, |b, data| {
            b.iter(|| sandbox.run(black_box(&config), black_box(data)))
        });
    }

    group.finish();
}

fn benchmark_workers(c: &mut Criterion) {
    let mut group = c.benchmark_group("Workers");
    group.sample_size(20);
    let sandbox = Sandbox::new();
    let (base, data) = setup(16, 1000);

    for workers in [1, 2, 4].iter() {
        let mut config = base.clone();
        config.execution.workers = Some(*workers);
        group.bench_with_input(BenchmarkId::new("generate_and_replay", workers), &data, |b, data| {
            b.iter(|| sandbox.run(black_box(&config), black_box(data)))
        });
    }

    group.finish();
}

criterion_group!(benches, benchmark_full_run, benchmark_workers);
criterion_main!(benches);
