use std::fmt::Write;

use termion::color::{self, Bg, Fg};

use crate::diagnostics::Diagnostic;
use crate::text::TextSpan;

const PREFIX_LEN: usize = 16;
const MAX_CODE_LEN: usize = 20;
const SUFIX_LEN: usize = 20;

/// Struct for printing diagnostics
pub struct DiagnosticsPrinter<'a> {
    diagnostics: &'a [Diagnostic],
}

impl<'a> DiagnosticsPrinter<'a> {
    /// Instantiate a new [DiagnosticsPrinter].
    pub fn new(diagnostics: &'a [Diagnostic]) -> Self {
        Self { diagnostics }
    }

    /// Print all the stored diagnostics.
    pub fn print(&self) {
        for diagnostic in self.diagnostics {
            eprintln!("{}", Self::stringify_diagnostic(diagnostic));
        }
    }

    /// Turn a diagnostic into a printable message with the following format:
    /// ```text
    /// \[W\] file:ll:cc     Foo(a b)     -> Error message
    /// ```
    fn stringify_diagnostic(d: &Diagnostic) -> String {
        match d {
            Diagnostic::General { message } => format!(
                "{}[W]{} {}{}{}",
                Fg(color::Yellow),
                Fg(color::Reset),
                Fg(color::Blue),
                message,
                Fg(color::Reset)
            ),
            Diagnostic::Localized { message, span } => {
                let location = Self::location(span);
                let code = Self::code_excerpt(span);
                let message = format!("{}{}{}", Fg(color::Blue), message, Fg(color::Reset));
                format!("{} {} \t-> {}", location, code, message)
            }
        }
    }

    fn location(span: &TextSpan) -> String {
        let (line_nr, line_pos) = span.text.get_line_nr_and_position(span.start);
        let mut location = format!("{}[W]{} ", Fg(color::Yellow), Fg(color::Reset));
        if let Some(file) = span.text.file() {
            let _ = write!(location, "{file}:");
        }
        let _ = write!(location, "{}:{}\t", line_nr + 1, line_pos + 1);
        location
    }

    /// The offending code in red, with a little of its line on either side.
    fn code_excerpt(span: &TextSpan) -> String {
        let (line_nr, line_pos) = span.text.get_line_nr_and_position(span.start);
        let line = span.text.get_line(line_nr).unwrap_or_default();

        let before: String = {
            let s = &line[..line_pos.min(line.len())];
            let skip = s.chars().count().saturating_sub(PREFIX_LEN);
            s.chars().skip(skip).collect()
        };
        let leading_ws = before.len() - before.trim_start().len();
        let prefix = format!(
            "{}{}{}{}",
            Bg(color::White),
            &before[..leading_ws],
            Bg(color::Reset),
            &before[leading_ws..],
        );

        let code: String = span.text().chars().take(MAX_CODE_LEN).collect();

        let sufix: String = {
            let start = (line_pos + span.text_len()).min(line.len());
            match line.get(start..) {
                Some(rest) => rest.trim_end().chars().take(SUFIX_LEN).collect(),
                None => String::new(),
            }
        };

        format!(
            "{}{}{}{}{}",
            prefix,
            Fg(color::Red),
            code,
            Fg(color::Reset),
            sufix,
        )
        .chars()
        .filter(|c| c != &'\n')
        .collect()
    }
}
