use anyhow::{Context, Result, ensure};
use std::path::Path;

use l25::backend::Backend;
use l25::interpreter::Interpreter;
use l25::runtime::InputSource;
use l25::vm::VM;
use l25::{lexer, parser};
use test_support::{
    Case, CaseClass, is_backend_unsupported, load_cases, normalize_output,
    validate_unsupported_backends,
};

const KNOWN_BACKENDS: [&str; 2] = ["interpreter", "vm"];

fn frontend_error(source: &str) -> Option<String> {
    match lexer::tokenize(source) {
        Err(error) => Some(error.to_string()),
        Ok(tokens) => parser::parse_tokens(tokens).err().map(|error| error.to_string()),
    }
}

fn run_case(backend: &dyn Backend, case: &Case) -> Result<Result<String>> {
    let source = case.read_source()?;
    let program = parser::parse(&source).with_context(|| format!("Parsing {}", case.name))?;
    let input = InputSource::from_text(&case.read_input()?);
    Ok(backend.run(&program, input))
}

fn run_programs_for_backend(backend: &dyn Backend) -> Result<()> {
    let cases = load_cases(Path::new("tests/programs"))?;

    for case in cases {
        validate_unsupported_backends(&case, &KNOWN_BACKENDS)?;
        if is_backend_unsupported(&case, backend.name()) {
            continue;
        }
        if case.spec.bench.enabled {
            ensure!(
                !case.spec.bench.tags.is_empty(),
                "Case {} has bench enabled but no tags",
                case.name
            );
        }
        match case.spec.class {
            CaseClass::RuntimeSuccess => {
                ensure!(
                    case.spec.expected.exit_code == 0,
                    "Case {} expected exit code must be 0 for runtime_success",
                    case.name
                );
                let expected = case.expected_stdout()?;
                let output = run_case(backend, &case)?.with_context(|| {
                    format!("Backend {} failed for {}", backend.name(), case.name)
                })?;
                assert_eq!(
                    normalize_output(&output),
                    normalize_output(&expected),
                    "Backend {} mismatch for {}",
                    backend.name(),
                    case.name
                );
            }
            CaseClass::FrontendError => {
                ensure!(
                    case.spec.expected.exit_code == 1,
                    "Case {} expected exit code must be 1 for frontend_error",
                    case.name
                );
                let expected_error = case.expected_error()?;
                let actual = frontend_error(&case.read_source()?).with_context(|| {
                    format!("Expected frontend error in {}, but parsing succeeded", case.name)
                })?;
                ensure!(
                    actual.contains(&expected_error),
                    "Expected frontend error containing '{expected_error}' in {}, got '{actual}'",
                    case.name
                );
            }
            CaseClass::BackendRuntimeError => {
                ensure!(
                    case.spec.expected.exit_code == 1,
                    "Case {} expected exit code must be 1 for backend_runtime_error",
                    case.name
                );
                let expected_error = case.expected_error()?;
                let Err(error) = run_case(backend, &case)? else {
                    anyhow::bail!(
                        "Expected backend runtime error for backend {} in {}",
                        backend.name(),
                        case.name
                    );
                };
                let actual = error.to_string();
                ensure!(
                    actual.contains(&expected_error),
                    "Expected backend runtime error containing '{expected_error}' in {}, got '{actual}'",
                    case.name
                );
            }
        }
    }

    Ok(())
}

#[test]
fn runs_programs_interpreter_backend() -> Result<()> {
    run_programs_for_backend(&Interpreter::new())
}

#[test]
fn runs_programs_vm_backend() -> Result<()> {
    run_programs_for_backend(&VM::new())
}

#[test]
fn backends_print_identical_output() -> Result<()> {
    let cases = load_cases(Path::new("tests/programs"))?;
    let interpreter = Interpreter::new();
    let vm = VM::new();

    for case in cases {
        if case.spec.class != CaseClass::RuntimeSuccess
            || !case.spec.parity
            || !case.spec.unsupported_backends.is_empty()
        {
            continue;
        }
        let from_interpreter = run_case(&interpreter, &case)??;
        let from_vm = run_case(&vm, &case)??;
        assert_eq!(
            from_interpreter, from_vm,
            "Backends disagree byte-for-byte on {}",
            case.name
        );
    }

    Ok(())
}
