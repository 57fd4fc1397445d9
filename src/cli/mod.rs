//! The csflow cli.

use std::path::PathBuf;

use clap::Parser;
use termion::terminal_size;

use crate::utils::ImageFormat;

/// Draw a flowchart of the methods in a C# source file.
#[derive(Debug, Parser)]
#[command(version)]
pub struct Opts {
    /// C# source file to analyze. Asked for on stdin if left out.
    pub(crate) file: Option<PathBuf>,

    /// Print the flowchart in 'dot' format to stdout.
    #[arg(short, long)]
    pub(crate) dot: bool,

    /// Only write the dot file, do not call graphviz.
    #[arg(short('n'), long)]
    pub(crate) no_render: bool,

    /// Image format of the rendered flowchart.
    #[arg(short, long, default_value = "png")]
    pub(crate) format: ImageFormat,

    /// Directory to write the output files to. Defaults to the directory of the input file.
    #[arg(short, long)]
    pub(crate) output: Option<PathBuf>,

    /// Be verbose
    #[arg(short, long)]
    pub(crate) verbose: bool,
}

/// Get the size of the current terminal that csflow is running in.
fn get_term_width() -> Option<usize> {
    if let Ok((w, _)) = terminal_size() {
        Some(w as usize)
    } else {
        None
    }
}

/// Print a centered string in the terminal padded by '='.
pub(crate) fn print_label(label: &'static str) {
    match get_term_width() {
        Some(width) if width > label.len() + 4 => {
            let mut padding = width / 2 - 1 - label.len() / 2;
            let mut odd = (width % 2) == 1;
            if (label.len() % 2) == 1 {
                padding -= 1;
                odd = !odd;
            }
            println!(
                "\n{} {} {}",
                "=".repeat(padding),
                label,
                "=".repeat(padding + odd as usize),
            )
        }
        _ => {
            println!("\n{}:", label)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use pretty_assertions::assert_eq;

    #[test]
    fn verify_cli() {
        Opts::command().debug_assert();
    }

    #[test]
    fn parse_options() {
        let opts = Opts::parse_from(["csflow", "Program.cs", "--format", "svg", "-n", "-o", "out"]);
        assert_eq!(opts.file, Some(PathBuf::from("Program.cs")));
        assert_eq!(opts.format, ImageFormat::Svg);
        assert!(opts.no_render);
        assert!(!opts.dot);
        assert_eq!(opts.output, Some(PathBuf::from("out")));
    }

    #[test]
    fn defaults() {
        let opts = Opts::parse_from(["csflow"]);
        assert_eq!(opts.file, None);
        assert_eq!(opts.format, ImageFormat::Png);
        assert!(!opts.verbose);
    }
}
