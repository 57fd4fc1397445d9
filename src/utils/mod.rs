//! Utilities for csflow.

use std::fmt::Display;
use std::io;
use std::path::{Path, PathBuf};

use graphviz_rust::{
    self,
    cmd::{CommandArg, Format},
    printer::PrinterContext,
};

#[derive(Debug, thiserror::Error)]
pub enum VisualizerError {
    #[error("could not run graphviz, is it installed? ({0})")]
    GraphvizIoError(io::Error),
    #[error("graphviz could not parse the graph: {0}")]
    GraphvizError(String),
}

/// Image formats the flowchart can be rendered to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum ImageFormat {
    #[default]
    Png,
    Svg,
    Pdf,
}

impl ImageFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ImageFormat::Png => "png",
            ImageFormat::Svg => "svg",
            ImageFormat::Pdf => "pdf",
        }
    }
}

impl Display for ImageFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.extension())
    }
}

impl From<ImageFormat> for Format {
    fn from(format: ImageFormat) -> Self {
        match format {
            ImageFormat::Png => Format::Png,
            ImageFormat::Svg => Format::Svg,
            ImageFormat::Pdf => Format::Pdf,
        }
    }
}

/// Render dot source to an image file with Graphviz.
pub fn render_dot(dot: &str, output_path: &Path, format: ImageFormat) -> Result<(), VisualizerError> {
    let dot_graph = match graphviz_rust::parse(dot) {
        Ok(g) => g,
        Err(e) => return Err(VisualizerError::GraphvizError(e)),
    };

    match graphviz_rust::exec(
        dot_graph,
        &mut PrinterContext::default(),
        vec![
            Format::from(format).into(),
            CommandArg::Output(output_path.display().to_string()),
        ],
    ) {
        Ok(_) => Ok(()),
        Err(e) => Err(VisualizerError::GraphvizIoError(e)),
    }
}

/// Where the artifacts of a run are written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPaths {
    pub dot: PathBuf,
    pub image: PathBuf,
}

impl OutputPaths {
    /// `<dir>/<stem>.dot` and `<dir>/<stem>.<format>`, where `<dir>` is `output_dir` or the
    /// directory of `input`.
    pub fn new(input: &Path, output_dir: Option<&Path>, format: ImageFormat) -> Self {
        let dir = match output_dir {
            Some(dir) => dir.to_path_buf(),
            None => input.parent().map(Path::to_path_buf).unwrap_or_default(),
        };
        let stem = input
            .file_stem()
            .map(|s| s.to_os_string())
            .unwrap_or_else(|| "flowchart".into());

        let with_extension = |extension: &str| {
            let mut name = stem.clone();
            name.push(".");
            name.push(extension);
            dir.join(name)
        };

        Self {
            dot: with_extension("dot"),
            image: with_extension(format.extension()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn paths_next_to_input() {
        let paths = OutputPaths::new(Path::new("samples/Program.cs"), None, ImageFormat::Png);
        assert_eq!(paths.dot, PathBuf::from("samples/Program.dot"));
        assert_eq!(paths.image, PathBuf::from("samples/Program.png"));
    }

    #[test]
    fn paths_in_output_dir() {
        let paths = OutputPaths::new(
            Path::new("/src/Program.cs"),
            Some(Path::new("out")),
            ImageFormat::Svg,
        );
        assert_eq!(paths.dot, PathBuf::from("out/Program.dot"));
        assert_eq!(paths.image, PathBuf::from("out/Program.svg"));
    }

    #[test]
    fn dotted_stem_is_kept() {
        let paths = OutputPaths::new(Path::new("Program.test.cs"), None, ImageFormat::Png);
        assert_eq!(paths.dot, PathBuf::from("Program.test.dot"));
    }

    #[test]
    fn bare_file_name() {
        let paths = OutputPaths::new(Path::new("Program.cs"), None, ImageFormat::Pdf);
        assert_eq!(paths.dot, PathBuf::from("Program.dot"));
        assert_eq!(paths.image, PathBuf::from("Program.pdf"));
    }
}
