//! Library entry point tying the stages together.
//!
//! A caller picks which listings it wants through [`Options`] and gets back a
//! [`Report`] holding the text of every requested stage plus, unless
//! execution is suppressed, the program's printed output.

use anyhow::{Context, Result};
use log::debug;

use crate::backend::find_backend;
use crate::runtime::InputSource;
use crate::{dump, ir, lexer, parser, pcode, tac};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    pub tokens: bool,
    pub ast: bool,
    pub ir: bool,
    pub tac: bool,
    pub pcode: bool,
    pub no_run: bool,
    pub backend: String,
    /// Line-oriented text consumed by `input` statements.
    pub input: Option<String>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            tokens: false,
            ast: false,
            ir: false,
            tac: false,
            pcode: false,
            no_run: false,
            backend: "interpreter".to_string(),
            input: None,
        }
    }
}

/// Per-stage outputs. A stage that was not requested stays `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Report {
    pub tokens: Option<Vec<String>>,
    pub ast: Option<Vec<String>>,
    pub ir: Option<Vec<String>>,
    pub tac: Option<Vec<String>>,
    pub pcode: Option<Vec<String>>,
    pub output: Option<String>,
}

impl Report {
    /// Stage listings in pipeline order, labelled for display.
    pub fn sections(&self) -> Vec<(&'static str, &[String])> {
        [
            ("tokens", &self.tokens),
            ("ast", &self.ast),
            ("ir", &self.ir),
            ("tac", &self.tac),
            ("pcode", &self.pcode),
        ]
        .into_iter()
        .filter_map(|(name, lines)| lines.as_deref().map(|lines| (name, lines)))
        .collect()
    }
}

/// Runs the pipeline over `source` using the input text from `options`.
pub fn run(source: &str, options: &Options) -> Result<Report> {
    let input = match &options.input {
        Some(text) => InputSource::from_text(text),
        None => InputSource::new(),
    };
    run_with_input(source, options, input)
}

/// Like [`run`], but with a caller-built input source, e.g. one that falls
/// back to prompting on stdin.
pub fn run_with_input(source: &str, options: &Options, input: InputSource) -> Result<Report> {
    let mut report = Report::default();

    let tokens = lexer::tokenize(source).context("Lexing failed")?;
    if options.tokens {
        report.tokens = Some(tokens.iter().map(ToString::to_string).collect());
    }

    let program = parser::parse_tokens(tokens).context("Parsing failed")?;

    if options.ast {
        report.ast = Some(dump::dump_program(&program));
    }
    if options.ir {
        report.ir = Some(ir::generate(&program));
    }
    if options.tac {
        report.tac = Some(tac::generate(&program));
    }
    if options.pcode {
        let listing = pcode::generate(&program).context("P-code generation failed")?;
        report.pcode = Some(listing.lines());
    }

    if options.no_run {
        debug!("execution suppressed");
        return Ok(report);
    }

    let backend = find_backend(&options.backend)?;
    let output = backend
        .run(&program, input)
        .with_context(|| format!("Execution failed on backend '{}'", options.backend))?;
    report.output = Some(output);
    Ok(report)
}
