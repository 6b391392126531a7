#![allow(dead_code)]
use std::path::Path;

use l25::ast::Program;
use l25::parser;
use test_support::load_cases;

pub struct Workload {
    pub label: String,
    pub source: String,
    pub input: String,
}

/// Golden cases that opt into benchmarking via `bench.enabled`.
pub fn workloads() -> Vec<Workload> {
    let cases = load_cases(Path::new("tests/programs")).expect("load cases");
    cases
        .into_iter()
        .filter(|case| case.spec.bench.enabled)
        .map(|case| Workload {
            source: case.read_source().expect("read source"),
            input: case.read_input().expect("read input"),
            label: case.name,
        })
        .collect()
}

pub fn load_program(workload: &Workload) -> Program {
    parser::parse(&workload.source)
        .unwrap_or_else(|err| panic!("parse {}: {err}", workload.label))
}
