//! Benchmarks for environment resolution and placeholder expansion.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use restflow::environment::{parse_environment_document, Environment, EnvironmentFile};
use restflow::parser::parse_file;
use restflow::variables::{
    expand_request, expand_string, resolve_with, NoSystemVariables, ResolveOptions,
    ResolvedEnvironment,
};
use serde_json::Value;
use std::path::Path;

/// An environment with `num_vars` plain variables plus a few composed ones.
fn flat_environment(num_vars: usize) -> EnvironmentFile {
    let mut env = Environment::new("bench");
    for i in 0..num_vars {
        env.set(format!("var_{}", i), format!("value_{}", i));
    }
    env.set("host", "api.example.com");
    env.set("baseUrl", "https://{{host}}/v1");
    env.set("authToken", "bearer_token_12345");
    env.set("userId", 123);

    let mut file = EnvironmentFile::new();
    file.add_environment(env);
    file
}

/// An environment where each variable references the previous one.
fn chained_environment(depth: usize) -> EnvironmentFile {
    let mut env = Environment::new("bench");
    env.set("v0", "root");
    for i in 1..depth {
        env.set(format!("v{}", i), format!("{{{{v{}}}}}/{}", i - 1, i));
    }

    let mut file = EnvironmentFile::new();
    file.add_environment(env);
    file
}

fn resolved(file: &EnvironmentFile) -> ResolvedEnvironment {
    match resolve_with(
        file,
        &EnvironmentFile::new(),
        "bench",
        &ResolveOptions::default(),
        &NoSystemVariables,
    ) {
        Ok(resolved) => resolved,
        Err(e) => panic!("benchmark environment does not resolve: {e}"),
    }
}

fn bench_resolve_flat(c: &mut Criterion) {
    let mut group = c.benchmark_group("resolve_flat");
    for size in [10, 100, 1000] {
        let file = flat_environment(size);
        let private = EnvironmentFile::new();
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &file, |b, file| {
            b.iter(|| {
                resolve_with(
                    black_box(file),
                    &private,
                    "bench",
                    &ResolveOptions::default(),
                    &NoSystemVariables,
                )
            })
        });
    }
    group.finish();
}

fn bench_resolve_chained(c: &mut Criterion) {
    let mut group = c.benchmark_group("resolve_chained");
    for depth in [2, 5, 10] {
        let file = chained_environment(depth);
        let private = EnvironmentFile::new();
        group.bench_with_input(BenchmarkId::from_parameter(depth), &file, |b, file| {
            b.iter(|| {
                resolve_with(
                    black_box(file),
                    &private,
                    "bench",
                    &ResolveOptions::default(),
                    &NoSystemVariables,
                )
            })
        });
    }
    group.finish();
}

fn bench_resolve_circular(c: &mut Criterion) {
    let mut env = Environment::new("bench");
    env.set("a", "{{b}}");
    env.set("b", "{{c}}");
    env.set("c", "{{a}}");
    let mut file = EnvironmentFile::new();
    file.add_environment(env);
    let private = EnvironmentFile::new();

    c.bench_function("resolve_circular_detection", |b| {
        b.iter(|| {
            resolve_with(
                black_box(&file),
                &private,
                "bench",
                &ResolveOptions::default(),
                &NoSystemVariables,
            )
        })
    });
}

fn bench_expand_string(c: &mut Criterion) {
    let env = resolved(&flat_environment(100));

    let mut group = c.benchmark_group("expand_string");
    group.bench_function("simple", |b| {
        b.iter(|| expand_string(black_box("{{baseUrl}}/users/{{userId}}"), &env))
    });
    group.bench_function("no_placeholders", |b| {
        b.iter(|| expand_string(black_box("https://api.example.com/users/123?page=2"), &env))
    });
    group.bench_function("missing", |b| {
        b.iter(|| expand_string(black_box("{{missing_a}}/{{missing_b}}"), &env))
    });

    let mut body = String::from("{\n");
    for i in 0..1000 {
        body.push_str(&format!("  \"field_{i}\": \"{{{{var_{}}}}}\",\n", i % 100));
    }
    body.push_str("  \"end\": true\n}");
    group.throughput(Throughput::Bytes(body.len() as u64));
    group.bench_function("large_body", |b| {
        b.iter(|| expand_string(black_box(&body), &env))
    });
    group.finish();
}

fn bench_expand_request(c: &mut Criterion) {
    let env = resolved(&flat_environment(100));
    let mut text = String::from("POST {{baseUrl}}/users/{{userId}}\nAuthorization: Bearer {{authToken}}\n");
    for i in 0..20 {
        text.push_str(&format!("X-Custom-{i}: {{{{var_{i}}}}}\n"));
    }
    text.push_str("\n{\"owner\": \"{{userId}}\"}\n");
    let file = match parse_file("bench.http", &text) {
        Ok(file) => file,
        Err(e) => panic!("benchmark request does not parse: {e}"),
    };

    c.bench_function("expand_request_20_headers", |b| {
        b.iter(|| expand_request(black_box(&file.requests[0]), &env))
    });
}

fn bench_load_document(c: &mut Criterion) {
    let mut content = String::from("{\n  // shared values\n  \"$shared\": { \"apiVersion\": \"v2\" }");
    for e in 0..20 {
        content.push_str(&format!(",\n  /* environment {e} */\n  \"env{e}\": {{\n"));
        for v in 0..50 {
            let value = Value::from(format!("https://host{e}.example.com/{v}"));
            content.push_str(&format!("    \"var_{v}\": {value}, // note\n"));
        }
        content.push_str("    \"last\": null\n  }");
    }
    content.push_str("\n}\n");

    c.bench_function("parse_environment_document_20x50", |b| {
        b.iter(|| parse_environment_document(black_box(&content), Path::new("bench.env.json")))
    });
}

criterion_group!(
    benches,
    bench_resolve_flat,
    bench_resolve_chained,
    bench_resolve_circular,
    bench_expand_string,
    bench_expand_request,
    bench_load_document
);

criterion_main!(benches);
