// Copyright (c) 2026 - present testlens contributors
// SPDX-License-Identifier: MIT

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use testlens_core::parser::parse_output;
use testlens_core::tokenizer::tokenize;

/// Build a verbose transcript with `packages` packages of `tests` tests each
fn generate_transcript(packages: usize, tests: usize) -> String {
    let mut out = String::from("go: downloading github.com/stretchr/testify v1.9.0\n");
    for p in 0..packages {
        for t in 0..tests {
            out.push_str(&format!("=== RUN   TestCase{t}\n"));
            out.push_str(&format!("=== RUN   TestCase{t}/sub\n"));
            out.push_str(&format!("    case_test.go:{t}: checking value {t}\n"));
            let verdict = if t % 17 == 0 { "FAIL" } else { "PASS" };
            out.push_str(&format!("--- {verdict}: TestCase{t} (0.01s)\n"));
            out.push_str(&format!("    --- {verdict}: TestCase{t}/sub (0.00s)\n"));
        }
        out.push_str("FAIL\n");
        out.push_str(&format!("FAIL\texample.com/bench/pkg{p}\t0.250s\n"));
    }
    out
}

fn generate_json_transcript(tests: usize) -> String {
    let mut out = String::new();
    for t in 0..tests {
        out.push_str(&format!(
            "{{\"Action\":\"run\",\"Package\":\"example.com/json\",\"Test\":\"TestJ{t}\"}}\n"
        ));
        out.push_str(&format!(
            "{{\"Action\":\"output\",\"Package\":\"example.com/json\",\"Test\":\"TestJ{t}\",\"Output\":\"=== RUN   TestJ{t}\\n\"}}\n"
        ));
        out.push_str(&format!(
            "{{\"Action\":\"output\",\"Package\":\"example.com/json\",\"Test\":\"TestJ{t}\",\"Output\":\"--- PASS: TestJ{t} (0.00s)\\n\"}}\n"
        ));
        out.push_str(&format!(
            "{{\"Action\":\"pass\",\"Package\":\"example.com/json\",\"Test\":\"TestJ{t}\",\"Elapsed\":0}}\n"
        ));
    }
    out.push_str("{\"Action\":\"pass\",\"Package\":\"example.com/json\",\"Elapsed\":0.5}\n");
    out
}

fn tokenizer_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("tokenize");
    for tests in [10, 100, 1000] {
        let input = generate_transcript(1, tests);
        group.throughput(Throughput::Bytes(input.len() as u64));
        group.bench_with_input(BenchmarkId::new("plain", tests), &input, |b, input| {
            b.iter(|| tokenize(black_box(input)).expect("tokenize failed"))
        });
    }

    let input = generate_json_transcript(100);
    group.throughput(Throughput::Bytes(input.len() as u64));
    group.bench_function("json_100", |b| {
        b.iter(|| tokenize(black_box(&input)).expect("tokenize failed"))
    });
    group.finish();
}

fn parser_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse_output");
    for packages in [1, 10, 50] {
        let input = generate_transcript(packages, 50);
        group.throughput(Throughput::Bytes(input.len() as u64));
        group.bench_with_input(BenchmarkId::new("packages", packages), &input, |b, input| {
            b.iter(|| parse_output(black_box(input)).expect("parse failed"))
        });
    }
    group.finish();
}

criterion_group!(benches, tokenizer_benchmarks, parser_benchmarks);
criterion_main!(benches);
