// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use qjsbridge_core::{AsyncOutcome, Bridge, BridgeConfig, CompiledUnit, PrintTarget};
use serde_json::json;

const SCRIPT: &str = r#"
    function fib(n) {
        var a = 0, b = 1;
        for (var i = 0; i < n; i++) { var c = a + b; a = b; b = c; }
        return a;
    }
    var sum = 0;
    for (var i = 0; i < 100; i++) sum += fib(30);
    sum;
"#;

fn bridge() -> Bridge {
    Bridge::new(BridgeConfig {
        print: PrintTarget::Discard,
        ..BridgeConfig::default()
    })
    .unwrap()
}

fn bench_compile(c: &mut Criterion) {
    let bridge = bridge();
    c.bench_function("compile + serialize", |b| {
        b.iter(|| {
            let unit = bridge.compile("bench.js", black_box(SCRIPT), false).unwrap();
            black_box(unit.serialize())
        })
    });
}

fn bench_deserialize(c: &mut Criterion) {
    let bridge = bridge();
    let blob = bridge.compile("bench.js", SCRIPT, false).unwrap().serialize();
    c.bench_function("deserialize", |b| {
        b.iter(|| black_box(CompiledUnit::deserialize(black_box(&blob)).unwrap()))
    });
}

fn bench_eval(c: &mut Criterion) {
    let mut bridge = bridge();
    let blob = bridge.compile("bench.js", SCRIPT, false).unwrap().serialize();

    c.bench_function("eval source", |b| {
        b.iter(|| {
            let handle = bridge.eval(black_box(SCRIPT)).unwrap();
            bridge.release(handle).unwrap();
        })
    });

    c.bench_function("eval bytecode", |b| {
        b.iter(|| {
            let handle = bridge.eval_bytecode(black_box(&blob)).unwrap();
            bridge.release(handle).unwrap();
        })
    });
}

fn bench_async_round_trip(c: &mut Criterion) {
    let mut bridge = bridge();
    c.bench_function("async call round trip", |b| {
        b.iter(|| {
            let promise = bridge
                .eval("env.callHostAsync({ function_name: 'echo' })")
                .unwrap();
            for request in bridge.take_async_requests() {
                bridge
                    .complete_async_call(request.call_id, AsyncOutcome::ResolveJson(json!(1)))
                    .unwrap();
            }
            bridge.release(promise).unwrap();
        })
    });
}

criterion_group!(
    benches,
    bench_compile,
    bench_deserialize,
    bench_eval,
    bench_async_round_trip
);
criterion_main!(benches);
