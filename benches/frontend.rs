mod common;

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use l25::{ir, lexer, parser, pcode, tac};

fn bench_frontend(c: &mut Criterion) {
    for workload in common::workloads() {
        let label = &workload.label;
        let source = &workload.source;
        let tokens = lexer::tokenize(source).expect("tokenize");
        let program = common::load_program(&workload);

        c.bench_function(&format!("frontend_tokenize_{label}"), |b| {
            b.iter(|| {
                let out = lexer::tokenize(black_box(source)).expect("tokenize");
                black_box(out);
            })
        });

        c.bench_function(&format!("frontend_parse_only_{label}"), |b| {
            b.iter(|| {
                let out = parser::parse_tokens(black_box(tokens.clone())).expect("parse");
                black_box(out);
            })
        });

        c.bench_function(&format!("frontend_tokenize_parse_{label}"), |b| {
            b.iter(|| {
                let out = parser::parse(black_box(source)).expect("parse");
                black_box(out);
            })
        });

        c.bench_function(&format!("codegen_listings_{label}"), |b| {
            b.iter(|| {
                let program = black_box(&program);
                black_box(ir::generate(program));
                black_box(tac::generate(program));
                black_box(pcode::generate(program).expect("p-code"));
            })
        });
    }
}

criterion_group!(benches, bench_frontend);
criterion_main!(benches);
