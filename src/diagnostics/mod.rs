//! Diagnostics reporting and printing

mod printer;

use crate::ast::lexer::{Token, TokenKind};
use crate::diagnostics::printer::DiagnosticsPrinter;
use crate::text::TextSpan;

use std::cell::RefCell;
use std::io;
use std::path::PathBuf;
use std::rc::Rc;

/// Errors that stop an analysis run.
#[derive(Debug, thiserror::Error)]
pub enum FlowError {
    #[error("The file '{}' does not exist.", .0.display())]
    InputNotFound(PathBuf),
    #[error("could not read `{}`: {source}", .path.display())]
    Read { path: PathBuf, source: io::Error },
    #[error("could not write `{}`: {source}", .path.display())]
    Write { path: PathBuf, source: io::Error },
}

pub type FlowResult<T> = Result<T, FlowError>;

/// A syntax error found by the front-end.
#[derive(Debug, Clone)]
pub struct CompilationError {
    pub description: String,
    pub span: Option<TextSpan>,
}

impl CompilationError {
    pub fn new_localized<S>(description: S, span: TextSpan) -> Self
    where
        S: ToString,
    {
        Self {
            description: description.to_string(),
            span: Some(span),
        }
    }

    pub fn new_generic<S>(description: S) -> Self
    where
        S: ToString,
    {
        Self {
            description: description.to_string(),
            span: None,
        }
    }

    pub fn new_unexpected_token(token: Token, expected: TokenKind) -> Self {
        let description = format!("Expected `{}` but found `{}`.", expected, token.kind);
        Self::new_localized(description, token.span)
    }
}

pub type CompilationResult<T> = Result<T, CompilationError>;

/// Reference to the [DiagnosticsBag] allowing interior mutability.
pub type DiagnosticsBagRef = Rc<RefCell<DiagnosticsBag>>;

/// A csflow diagnostic
#[derive(Debug, Clone)]
pub enum Diagnostic {
    General { message: String },
    Localized { message: String, span: TextSpan },
}

impl Diagnostic {
    fn from_compilation_error(e: CompilationError) -> Self {
        match e.span {
            Some(span) => Self::Localized {
                message: e.description,
                span,
            },
            None => Self::General {
                message: e.description,
            },
        }
    }
}

/// A bag holding all the diagnostics reported by the front-end.
#[derive(Debug, Default)]
pub struct DiagnosticsBag {
    diagnostics: Vec<Diagnostic>,
}

impl DiagnosticsBag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_ref() -> DiagnosticsBagRef {
        Rc::new(RefCell::new(Self::new()))
    }

    pub fn error_count(&self) -> usize {
        self.diagnostics.len()
    }

    /// Checks whether any errors have been reported.
    pub fn has_errored(&self) -> bool {
        !self.diagnostics.is_empty()
    }

    /// Report bad token error.
    pub fn report_bad_token(&mut self, token: &Token) {
        self.diagnostics.push(Diagnostic::Localized {
            message: "Bad token.".to_string(),
            span: token.span.clone(),
        })
    }

    pub fn report_compilation_error(&mut self, error: CompilationError) {
        self.diagnostics
            .push(Diagnostic::from_compilation_error(error))
    }

    /// Print the accumulated diagnostics.
    pub fn print(&self) {
        DiagnosticsPrinter::new(&self.diagnostics).print();
    }
}

#[cfg(test)]
impl DiagnosticsBag {
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.diagnostics.clone()
    }
}
