use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use log::LevelFilter;
use simple_logger::SimpleLogger;

use l25::runtime::InputSource;
use l25::toolchain::{self, Options};

/// Compile and run L25 programs.
#[derive(Debug, Parser)]
#[command(name = "l25", version)]
struct Cli {
    /// Source file; reads stdin when absent or `-`.
    source: Option<PathBuf>,

    /// Print the token stream.
    #[arg(long)]
    tokens: bool,

    /// Print the AST dump.
    #[arg(long)]
    ast: bool,

    /// Print the IR listing.
    #[arg(long)]
    ir: bool,

    /// Print three-address code.
    #[arg(long)]
    tac: bool,

    /// Print the p-code listing.
    #[arg(long)]
    pcode: bool,

    /// Stop after the requested listings.
    #[arg(long)]
    no_run: bool,

    #[arg(long, short, default_value = "interpreter", value_parser = ["interpreter", "vm"])]
    backend: String,

    /// File with one integer per line for `input` statements.
    #[arg(long)]
    input: Option<PathBuf>,

    /// Raise log verbosity (-v debug, -vv trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    SimpleLogger::new()
        .with_level(level)
        .init()
        .context("Installing logger")?;

    let from_stdin = cli
        .source
        .as_ref()
        .is_none_or(|path| path.as_os_str() == "-");
    let source = match &cli.source {
        Some(path) if !from_stdin => fs::read_to_string(path)
            .with_context(|| format!("Reading {}", path.display()))?,
        _ => {
            let mut buffer = String::new();
            io::stdin()
                .read_to_string(&mut buffer)
                .context("Reading stdin")?;
            buffer
        }
    };

    let input_text = match &cli.input {
        Some(path) => Some(
            fs::read_to_string(path).with_context(|| format!("Reading {}", path.display()))?,
        ),
        None => None,
    };
    let mut input = match &input_text {
        Some(text) => InputSource::from_text(text),
        None => InputSource::new(),
    };
    // Stdin is already drained when it carried the program text.
    if !from_stdin {
        input = input.with_fallback(Box::new(io::BufReader::new(io::stdin())));
    }

    let options = Options {
        tokens: cli.tokens,
        ast: cli.ast,
        ir: cli.ir,
        tac: cli.tac,
        pcode: cli.pcode,
        no_run: cli.no_run,
        backend: cli.backend,
        input: input_text,
    };
    let report = toolchain::run_with_input(&source, &options, input)?;

    for (name, lines) in report.sections() {
        println!("== {name} ==");
        for line in lines {
            println!("{line}");
        }
    }
    if let Some(output) = report.output
        && !output.is_empty()
    {
        println!("{output}");
    }
    Ok(())
}
