use std::fs;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::rc::Rc;

use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use ast::SourceUnit;
use cli::Opts;
use diagnostics::{DiagnosticsBag, DiagnosticsBagRef, FlowError, FlowResult};
use text::SourceText;
use utils::OutputPaths;

mod ast;
mod cli;
mod diagnostics;
mod flowchart;
mod text;
mod utils;

#[cfg(test)]
mod tests;

/// Ask for the input file on stdin.
fn prompt_for_file() -> FlowResult<PathBuf> {
    let stdin_err = |source| FlowError::Read {
        path: PathBuf::from("<stdin>"),
        source,
    };

    print!("Enter the path to the C# file: ");
    io::stdout().flush().map_err(stdin_err)?;

    let mut line = String::new();
    io::stdin().lock().read_line(&mut line).map_err(stdin_err)?;
    Ok(PathBuf::from(line.trim().trim_matches('"')))
}

fn write_file(path: &Path, contents: &str) -> FlowResult<()> {
    let write_err = |source| FlowError::Write {
        path: path.to_path_buf(),
        source,
    };
    if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        fs::create_dir_all(dir).map_err(write_err)?;
    }
    fs::write(path, contents).map_err(write_err)
}

pub fn analyze(opts: &Opts) -> FlowResult<()> {
    let path = match &opts.file {
        Some(path) => path.clone(),
        None => prompt_for_file()?,
    };
    analyze_path(&path, opts)
}

/// Analyze the C# file at `path` and write the flowchart next to it, or to `opts.output`.
pub fn analyze_path(path: &Path, opts: &Opts) -> FlowResult<()> {
    if !path.exists() {
        return Err(FlowError::InputNotFound(path.to_path_buf()));
    }

    info!("Parsing {}", path.display());
    let text = SourceText::from_file(path).map_err(|source| FlowError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let diagnostics_bag: DiagnosticsBagRef = DiagnosticsBag::new_ref();
    let unit = SourceUnit::from_source(Rc::new(text), diagnostics_bag.clone());

    if diagnostics_bag.borrow().has_errored() {
        warn!(
            errors = diagnostics_bag.borrow().error_count(),
            "Syntax errors found, continuing with what could be parsed"
        );
        diagnostics_bag.borrow().print();
    }

    if opts.verbose {
        cli::print_label("AST");
        unit.print();
    }

    let flowchart = flowchart::synthesize(&unit);
    if flowchart.document.is_empty() {
        warn!("No methods found in {}", path.display());
    }

    if opts.verbose {
        cli::print_label("Flowchart");
        flowchart.print();
    }

    info!("Generating flowchart");
    let dot = flowchart.dot_repr();
    if opts.dot {
        println!("{dot}");
    }

    let paths = OutputPaths::new(path, opts.output.as_deref(), opts.format);
    write_file(&paths.dot, &dot)?;
    info!("Wrote {}", paths.dot.display());

    if opts.no_render {
        return Ok(());
    }

    match flowchart.visualize(&paths.image, opts.format) {
        Ok(()) => info!("Flowchart saved to {}", paths.image.display()),
        Err(e) => warn!("Could not render the flowchart: {e}"),
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let default_level = match verbose {
        true => "debug",
        false => "info",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    let opts = Opts::parse();
    init_tracing(opts.verbose);

    if let Err(e) = analyze(&opts) {
        eprintln!("Error: {e}");
    }
}
