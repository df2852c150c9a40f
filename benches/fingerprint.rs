use criterion::{black_box, criterion_group, criterion_main, Criterion};

use repohealth::parser::{normalize_statement, parse_source, SourceLanguage};

fn synthetic_module(functions: usize) -> String {
    let mut src = String::new();
    for i in 0..functions {
        src.push_str(&format!(
            "def handler_{i}(payload):\n    data = payload.copy()\n    if data.get('kind') == {i}:\n        data['seen'] = True\n    total = sum(data.values())\n    return total\n\n"
        ));
    }
    src
}

fn bench_normalize(c: &mut Criterion) {
    let line = "    total  =\tsum( data.values() )   # trailing";
    c.bench_function("normalize_statement", |b| {
        b.iter(|| normalize_statement(black_box(line)))
    });
}

fn bench_parse_python(c: &mut Criterion) {
    let small = synthetic_module(10);
    let large = synthetic_module(200);

    c.bench_function("parse_python_10_functions", |b| {
        b.iter(|| parse_source("bench", SourceLanguage::Python, black_box(&small)).unwrap())
    });
    c.bench_function("parse_python_200_functions", |b| {
        b.iter(|| parse_source("bench", SourceLanguage::Python, black_box(&large)).unwrap())
    });
}

criterion_group!(benches, bench_normalize, bench_parse_python);
criterion_main!(benches);
