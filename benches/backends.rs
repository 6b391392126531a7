mod common;

use criterion::{Criterion, black_box, criterion_group, criterion_main};

use l25::backend::backends;
use l25::runtime::InputSource;

fn bench_backends(c: &mut Criterion) {
    for workload in common::workloads() {
        let program = common::load_program(&workload);

        for backend in backends() {
            let name = backend.name();
            c.bench_function(&format!("backend_{name}_total_{}", workload.label), |b| {
                b.iter(|| {
                    let input = InputSource::from_text(&workload.input);
                    let output = backend.run(black_box(&program), input).expect("run");
                    black_box(output);
                })
            });

            c.bench_function(
                &format!("backend_{name}_execute_prepared_{}", workload.label),
                |b| {
                    let prepared = backend.prepare(&program).expect("prepare");
                    b.iter(|| {
                        let input = InputSource::from_text(&workload.input);
                        let output = prepared.run(input).expect("run");
                        black_box(output);
                    })
                },
            );
        }
    }
}

criterion_group!(benches, bench_backends);
criterion_main!(benches);
