// Accessor read benchmarks.
//
// Measures expansion, conversion and snapshot reads over an in-memory
// source, with no file I/O in the measured loop.

use std::hint::black_box;

use criterion::{Criterion, criterion_group, criterion_main};
use strata_config::prelude::*;
use strata_config::resolve::VariableExpander;
use strata_config::{MemoryLoader, convert::convert};

fn properties() -> Properties {
    (0..200)
        .map(|i| (format!("key.{i}"), format!("value-{i}")))
        .chain([
            ("host".to_string(), "db.internal".to_string()),
            ("port".to_string(), "5432".to_string()),
            (
                "url".to_string(),
                "jdbc://${host}:${port}/${name}".to_string(),
            ),
            ("name".to_string(), "app-${key.7}".to_string()),
            ("list".to_string(), "1, 2, 3, 4, 5, 6, 7, 8".to_string()),
        ])
        .collect()
}

fn expansion(c: &mut Criterion) {
    let props = properties();
    let expander = VariableExpander::new().layer(&props);

    c.bench_function("expand_nested_placeholders", |b| {
        b.iter(|| black_box(expander.expand(black_box("${url}?user=${missing}"))));
    });

    c.bench_function("expand_plain_value", |b| {
        b.iter(|| black_box(expander.expand(black_box("no placeholders here"))));
    });
}

fn conversion(c: &mut Criterion) {
    c.bench_function("convert_int_list", |b| {
        b.iter(|| black_box(convert::<Vec<u32>>("list", black_box("1, 2, 3, 4, 5, 6, 7, 8"))));
    });
}

fn accessor_reads(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().expect("failed to build runtime");

    let memory = MemoryLoader::new();
    memory.insert("bench", properties());
    let declaration = Declaration::builder("Bench")
        .source("mem:bench")
        .property(PropertyDef::new("url"))
        .property(PropertyDef::new("list"))
        .property(PropertyDef::new("missing").default_value("42"))
        .build()
        .expect("valid declaration");
    let config = rt
        .block_on(
            Config::builder(declaration)
                .without_default_loaders()
                .with_loader(memory)
                .environment(Environment::empty())
                .build(),
        )
        .expect("config builds");

    c.bench_function("view_get_expanded_string", |b| {
        let view = config.view();
        b.iter(|| black_box(view.get::<String>("url").unwrap()));
    });

    c.bench_function("view_get_list", |b| {
        let view = config.view();
        b.iter(|| black_box(view.get::<Vec<u8>>("list").unwrap()));
    });

    c.bench_function("async_get_default", |b| {
        b.to_async(&rt)
            .iter(|| async { black_box(config.get::<u16>("missing").await.unwrap()) });
    });
}

criterion_group!(benches, expansion, conversion, accessor_reads);
criterion_main!(benches);
