//! Module for parsing a token stream into a [SourceUnit].
//!
//! The parser understands enough C# to find every method declaration and classify the
//! statements of its body. Members and statements the flowchart never draws are still parsed
//! structurally (or skipped as balanced token groups) so that the parser stays in sync.

use std::cmp::{max, min};
use std::rc::Rc;

use crate::diagnostics::{CompilationError, CompilationResult, DiagnosticsBag, DiagnosticsBagRef};
use crate::text::{SourceText, TextSpan};

use super::lexer::{Lexer, Token, TokenKind};
use super::{
    Argument, AssignmentExpression, AssignmentOperator, BinaryExpression, BinaryOperator,
    CastExpression, ConditionalExpression, Declarator, ElementAccessExpression, Expression,
    ExpressionKind, IfStatement, InvocationExpression, LambdaBody, LambdaExpression,
    MemberAccessExpression, MethodDeclaration, ObjectCreationExpression, SourceUnit, Statement,
    StatementKind, UnaryExpression, UnaryOperator, VariableDeclaration,
};

/// Member modifiers.
const MODIFIERS: &[&str] = &[
    "public",
    "private",
    "protected",
    "internal",
    "static",
    "abstract",
    "virtual",
    "override",
    "sealed",
    "async",
    "extern",
    "unsafe",
    "new",
    "readonly",
    "partial",
    "volatile",
    "const",
    "required",
    "file",
    "ref",
];

/// Modifiers allowed in front of local declarations and local functions.
const LOCAL_MODIFIERS: &[&str] = &["const", "scoped", "static", "async", "unsafe", "extern"];

/// Words that start a statement when found outside of a type.
const STATEMENT_KEYWORDS: &[&str] = &[
    "if", "else", "for", "foreach", "while", "do", "switch", "try", "return", "throw", "var",
    "await", "lock", "yield", "break", "continue", "goto", "checked", "unchecked", "fixed",
];

/// Keywords that can never start a type.
const NON_TYPE_KEYWORDS: &[&str] = &[
    "await",
    "new",
    "this",
    "base",
    "typeof",
    "sizeof",
    "default",
    "throw",
    "true",
    "false",
    "null",
    "checked",
    "unchecked",
    "is",
    "as",
    "stackalloc",
    "return",
    "out",
    "in",
    "ref",
    "if",
    "else",
    "switch",
    "with",
];

/// Built-in type keywords. A parenthesized one is always a cast.
const PREDEFINED_TYPES: &[&str] = &[
    "bool", "byte", "sbyte", "char", "decimal", "double", "float", "int", "uint", "long",
    "ulong", "short", "ushort", "object", "string", "nint", "nuint",
];

/// The parser.
pub struct Parser {
    tokens: Vec<Token>,
    cursor: usize,
    methods: Vec<MethodDeclaration>,
    diagnostics_bag: DiagnosticsBagRef,
}

impl Parser {
    /// Parse a token stream into a [SourceUnit]. The stream must end with a
    /// [TokenKind::End] token, as produced by the [Lexer].
    pub fn parse(tokens: Vec<Token>, diagnostics_bag: DiagnosticsBagRef) -> SourceUnit {
        let mut parser = Self::new(tokens, diagnostics_bag);

        while !parser.current().is_end() {
            let before = parser.cursor;
            if let Err(e) = parser.parse_namespace_member() {
                parser.report(e);
                parser.recover(false);
            }
            parser.ensure_progress(before);
        }

        SourceUnit {
            methods: parser.methods,
        }
    }

    /// Parse a single expression from text. Used to evaluate conditions after variable
    /// substitution.
    pub fn parse_expression_text(text: &str) -> CompilationResult<Expression> {
        let source = Rc::new(SourceText::from_str(text));
        let tokens: Vec<Token> = Lexer::from_source(source).collect();

        if let Some(bad) = tokens.iter().find(|t| t.kind == TokenKind::Bad) {
            return Err(CompilationError::new_localized(
                "Bad token.",
                bad.span.clone(),
            ));
        }

        if tokens.iter().all(|t| matches!(t.kind, TokenKind::Whitespace | TokenKind::End)) {
            return Err(CompilationError::new_generic("Empty expression."));
        }

        let mut parser = Self::new(tokens, DiagnosticsBag::new_ref());
        let expression = parser.parse_expression()?;
        let rest = parser.current();
        if !rest.is_end() {
            return Err(CompilationError::new_localized(
                format!("Unexpected `{}` after expression.", rest.kind),
                rest.span.clone(),
            ));
        }
        Ok(expression)
    }

    /// Create a new [Parser]. Whitespace is dropped, bad tokens are reported and dropped.
    fn new(tokens: Vec<Token>, diagnostics_bag: DiagnosticsBagRef) -> Self {
        let tokens = tokens
            .into_iter()
            .filter(|token| match token.kind {
                TokenKind::Whitespace => false,
                TokenKind::Bad => {
                    diagnostics_bag.borrow_mut().report_bad_token(token);
                    false
                }
                _ => true,
            })
            .collect();

        Self {
            tokens,
            cursor: 0,
            methods: vec![],
            diagnostics_bag,
        }
    }

    fn report(&self, error: CompilationError) {
        self.diagnostics_bag
            .borrow_mut()
            .report_compilation_error(error);
    }

    /// Peak at a token around the current cursor position with an offset.
    fn peak(&self, mut offset: isize) -> &Token {
        if self.cursor as isize + offset < 0 {
            offset = 0;
        }
        &self.tokens[min(
            (self.cursor as isize + offset) as usize,
            self.tokens.len() - 1,
        )]
    }

    /// Get the current token.
    fn current(&self) -> &Token {
        self.peak(0)
    }

    /// Return the current token and move to the next token.
    fn consume(&mut self) -> &Token {
        if !self.current().is_end() {
            self.cursor += 1;
        }
        self.peak(-1)
    }

    /// Consume a token and expect it to be a word. Return the word.
    fn consume_word(&mut self) -> CompilationResult<String> {
        let token = self.current().clone();
        if let TokenKind::Word(word) = token.kind {
            self.consume();
            Ok(word)
        } else {
            Err(CompilationError::new_localized(
                format!("Expected 'word' but found '{}'.", token.kind),
                token.span,
            ))
        }
    }

    /// Consume only if the token is of a certain kind.
    fn consume_if(&mut self, token_kind: TokenKind) -> bool {
        if self.current().kind == token_kind {
            self.consume();
            true
        } else {
            false
        }
    }

    /// Consume only if the token is a certain word.
    fn consume_if_word(&mut self, word: &str) -> bool {
        if self.current().kind.is_word(word) {
            self.consume();
            true
        } else {
            false
        }
    }

    /// Consume and error if the token is not what was expected.
    fn consume_and_expect(&mut self, expected: TokenKind) -> CompilationResult<Token> {
        let token = self.current().clone();
        if token.kind != expected {
            return Err(CompilationError::new_unexpected_token(token, expected));
        }
        self.consume();
        Ok(token)
    }

    fn current_is_word_in(&self, words: &[&str]) -> bool {
        matches!(&self.current().kind, TokenKind::Word(w) if words.contains(&w.as_str()))
    }

    /// Span from `start_span` to the end of the last consumed token.
    fn get_span_from(&self, start_span: &TextSpan) -> TextSpan {
        let end = max(start_span.start, self.peak(-1).span.end);
        TextSpan::new(start_span.start, end, start_span.text.clone())
    }

    fn ensure_progress(&mut self, before: usize) {
        if self.cursor == before {
            self.consume();
        }
    }

    /// Index of the token closing the group opened at `open`.
    fn find_matching_close(&self, open: usize) -> Option<usize> {
        let mut depth = 0usize;
        for (i, token) in self.tokens.iter().enumerate().skip(open) {
            match token.kind {
                TokenKind::LeftParen | TokenKind::LeftSquare | TokenKind::LeftCurly => depth += 1,
                TokenKind::RightParen | TokenKind::RightSquare | TokenKind::RightCurly => {
                    depth = depth.checked_sub(1)?;
                    if depth == 0 {
                        return Some(i);
                    }
                }
                TokenKind::End => return None,
                _ => {}
            }
        }
        None
    }

    /// Consume a balanced `()`, `[]` or `{}` group. The opening token must be current.
    fn skip_balanced(&mut self) -> CompilationResult<()> {
        let open = self.current().clone();
        match self.find_matching_close(self.cursor) {
            Some(close) => {
                self.cursor = close + 1;
                Ok(())
            }
            None => Err(CompilationError::new_localized(
                format!("Unclosed `{}`.", open.kind),
                open.span,
            )),
        }
    }

    /// Consume tokens up to and including the next `;` outside of any bracket. Stops before a
    /// `}` that closes the surrounding block.
    fn skip_past_semicolon(&mut self) -> CompilationResult<()> {
        loop {
            match self.current().kind {
                TokenKind::Semicolon => {
                    self.consume();
                    return Ok(());
                }
                TokenKind::LeftParen | TokenKind::LeftSquare | TokenKind::LeftCurly => {
                    self.skip_balanced()?
                }
                TokenKind::RightCurly => return Ok(()),
                TokenKind::End => {
                    return Err(CompilationError::new_unexpected_token(
                        self.current().clone(),
                        TokenKind::Semicolon,
                    ))
                }
                _ => {
                    self.consume();
                }
            }
        }
    }

    /// Skip to a point where parsing can resume after an error.
    ///
    /// When `in_block` is set a `}` at the outer level is left for the enclosing block to
    /// consume.
    fn recover(&mut self, in_block: bool) {
        let mut depth = 0usize;
        loop {
            match self.current().kind {
                TokenKind::End => break,
                TokenKind::Semicolon if depth == 0 => {
                    self.consume();
                    break;
                }
                TokenKind::LeftParen | TokenKind::LeftSquare | TokenKind::LeftCurly => {
                    depth += 1;
                }
                TokenKind::RightCurly if depth == 0 => {
                    if !in_block {
                        self.consume();
                    }
                    break;
                }
                TokenKind::RightCurly if depth == 1 => {
                    self.consume();
                    break;
                }
                TokenKind::RightParen | TokenKind::RightSquare | TokenKind::RightCurly => {
                    depth = depth.saturating_sub(1);
                }
                _ => {}
            }
            self.consume();
        }
    }

    /// Skip `[...]` attribute sections.
    fn skip_attributes(&mut self) -> CompilationResult<()> {
        while self.current().kind == TokenKind::LeftSquare {
            self.skip_balanced()?;
        }
        Ok(())
    }

    /// Parse something that may appear directly in a namespace or at the top of the file.
    fn parse_namespace_member(&mut self) -> CompilationResult<()> {
        let kind = self.current().kind.clone();
        match kind {
            TokenKind::Semicolon => {
                self.consume();
                Ok(())
            }
            TokenKind::Word(w) if w == "using" && self.peak(1).kind != TokenKind::LeftParen => {
                self.skip_past_semicolon()
            }
            TokenKind::Word(w) if w == "global" && self.peak(1).kind.is_word("using") => {
                self.skip_past_semicolon()
            }
            TokenKind::Word(w) if w == "extern" && self.peak(1).kind.is_word("alias") => {
                self.skip_past_semicolon()
            }
            TokenKind::Word(w) if w == "namespace" => self.parse_namespace(),
            TokenKind::Word(w) if STATEMENT_KEYWORDS.contains(&w.as_str()) => {
                self.parse_statement().map(|_| ())
            }
            _ => {
                // Top-level statements are not members. Retry as a statement if the member
                // parser cannot make sense of it.
                let start = self.cursor;
                match self.parse_member() {
                    Ok(()) => Ok(()),
                    Err(e) => {
                        self.cursor = start;
                        self.parse_statement().map(|_| ()).map_err(|_| e)
                    }
                }
            }
        }
    }

    /// Parse a block or file scoped namespace.
    fn parse_namespace(&mut self) -> CompilationResult<()> {
        self.consume(); // Consume "namespace"
        self.consume_word()?;
        while self.consume_if(TokenKind::Period) {
            self.consume_word()?;
        }

        if self.consume_if(TokenKind::Semicolon) {
            return Ok(());
        }

        self.consume_and_expect(TokenKind::LeftCurly)?;
        while !matches!(self.current().kind, TokenKind::RightCurly | TokenKind::End) {
            let before = self.cursor;
            if let Err(e) = self.parse_namespace_member() {
                self.report(e);
                self.recover(true);
            }
            self.ensure_progress(before);
        }
        self.consume_and_expect(TokenKind::RightCurly)?;
        Ok(())
    }

    /// Parse a type or a member of a type. Method declarations are collected, everything else
    /// is skipped.
    fn parse_member(&mut self) -> CompilationResult<()> {
        self.skip_attributes()?;
        let start_span = self.current().span.clone();

        while self.current_is_word_in(MODIFIERS) {
            // `partial` and friends can also prefix a type declaration.
            self.consume();
        }

        let kind = self.current().kind.clone();
        match &kind {
            TokenKind::Word(w) if matches!(w.as_str(), "class" | "struct" | "interface") => {
                return self.parse_type_declaration();
            }
            TokenKind::Word(w) if w == "record" && matches!(self.peak(1).kind, TokenKind::Word(_)) => {
                return self.parse_type_declaration();
            }
            TokenKind::Word(w) if matches!(w.as_str(), "enum" | "delegate" | "event") => {
                return self.skip_declaration();
            }
            TokenKind::Word(w) if w == "namespace" => return self.parse_namespace(),
            _ => {}
        }

        // Destructor
        self.consume_if(TokenKind::Tilde);

        if self.try_parse_declared_type().is_none() {
            let token = self.current().clone();
            return Err(CompilationError::new_localized(
                format!("Expected member declaration but found `{}`.", token.kind),
                token.span,
            ));
        }

        let kind = self.current().kind.clone();
        match kind {
            // Constructor, destructor or something called at the top level.
            TokenKind::LeftParen => {
                self.skip_balanced()?;
                self.skip_member_body()
            }
            TokenKind::Word(w) if w == "operator" || w == "implicit" || w == "explicit" => {
                while !matches!(self.current().kind, TokenKind::LeftParen | TokenKind::End) {
                    self.consume();
                }
                self.skip_balanced()?;
                self.skip_member_body()
            }
            // Indexer
            TokenKind::Word(w) if w == "this" => self.skip_declaration(),
            TokenKind::Word(_) => {
                let mut name = self.consume_word()?;
                // Explicit interface implementation
                while self.consume_if(TokenKind::Period) {
                    name = self.consume_word()?;
                }
                if self.current().kind == TokenKind::LessThan {
                    self.try_skip_type_arguments();
                }

                match self.current().kind {
                    TokenKind::LeftParen => self.parse_method(name, start_span),
                    TokenKind::LeftCurly
                    | TokenKind::FatArrow
                    | TokenKind::Equals
                    | TokenKind::Semicolon
                    | TokenKind::Comma => self.skip_declaration(),
                    _ => {
                        let token = self.current().clone();
                        Err(CompilationError::new_localized(
                            format!("Unexpected `{}` in member declaration.", token.kind),
                            token.span,
                        ))
                    }
                }
            }
            _ => {
                let token = self.current().clone();
                Err(CompilationError::new_localized(
                    format!("Unexpected `{}` in member declaration.", token.kind),
                    token.span,
                ))
            }
        }
    }

    /// Parse a class, struct, interface or record and the members inside it.
    fn parse_type_declaration(&mut self) -> CompilationResult<()> {
        if self.consume_if_word("record") {
            let _ = self.consume_if_word("class") || self.consume_if_word("struct");
        } else {
            self.consume();
        }
        self.consume_word()?;

        // Type parameters, primary constructor, base list and constraints
        loop {
            match self.current().kind {
                TokenKind::LeftCurly => break,
                TokenKind::Semicolon => {
                    self.consume();
                    return Ok(());
                }
                TokenKind::LeftParen => self.skip_balanced()?,
                TokenKind::End => {
                    return Err(CompilationError::new_unexpected_token(
                        self.current().clone(),
                        TokenKind::LeftCurly,
                    ))
                }
                _ => {
                    self.consume();
                }
            }
        }

        self.consume_and_expect(TokenKind::LeftCurly)?;
        while !matches!(self.current().kind, TokenKind::RightCurly | TokenKind::End) {
            let before = self.cursor;
            if let Err(e) = self.parse_member() {
                self.report(e);
                self.recover(true);
            }
            self.ensure_progress(before);
        }
        self.consume_and_expect(TokenKind::RightCurly)?;
        self.consume_if(TokenKind::Semicolon);
        Ok(())
    }

    /// Skip a declaration that ends either in `;` or in a `{}` group (enums, properties,
    /// events, fields, delegates).
    fn skip_declaration(&mut self) -> CompilationResult<()> {
        loop {
            match self.current().kind {
                TokenKind::Semicolon => {
                    self.consume();
                    return Ok(());
                }
                TokenKind::LeftCurly => {
                    self.skip_balanced()?;
                    // Property initializers and expression bodies continue after the accessors
                    if !matches!(self.current().kind, TokenKind::Equals | TokenKind::FatArrow) {
                        return Ok(());
                    }
                }
                TokenKind::LeftParen | TokenKind::LeftSquare => self.skip_balanced()?,
                TokenKind::RightCurly => return Ok(()),
                TokenKind::End => {
                    return Err(CompilationError::new_unexpected_token(
                        self.current().clone(),
                        TokenKind::Semicolon,
                    ))
                }
                _ => {
                    self.consume();
                }
            }
        }
    }

    /// Skip an optional constructor initializer, constraints and a body.
    fn skip_member_body(&mut self) -> CompilationResult<()> {
        if self.consume_if(TokenKind::Colon) {
            self.consume_word()?; // base or this
            if self.current().kind == TokenKind::LeftParen {
                self.skip_balanced()?;
            }
        }
        self.skip_constraints();

        match self.current().kind {
            TokenKind::LeftCurly => self.skip_balanced(),
            TokenKind::FatArrow => self.skip_past_semicolon(),
            TokenKind::Semicolon => {
                self.consume();
                Ok(())
            }
            _ => {
                let token = self.current().clone();
                Err(CompilationError::new_localized(
                    format!("Expected member body but found `{}`.", token.kind),
                    token.span,
                ))
            }
        }
    }

    /// Skip generic `where` constraints.
    fn skip_constraints(&mut self) {
        if !self.current().kind.is_word("where") {
            return;
        }
        while !matches!(
            self.current().kind,
            TokenKind::LeftCurly | TokenKind::FatArrow | TokenKind::Semicolon | TokenKind::End
        ) {
            self.consume();
        }
    }

    /// Parse a method once its name has been consumed. The parameter list is current.
    fn parse_method(&mut self, name: String, start_span: TextSpan) -> CompilationResult<()> {
        let parameters = self.parse_parameter_list()?;
        self.skip_constraints();

        let body = match self.current().kind {
            TokenKind::LeftCurly => self.parse_block()?,
            TokenKind::FatArrow => {
                self.consume();
                self.parse_expression()?;
                self.consume_and_expect(TokenKind::Semicolon)?;
                vec![]
            }
            TokenKind::Semicolon => {
                self.consume();
                vec![]
            }
            _ => {
                let token = self.current().clone();
                return Err(CompilationError::new_localized(
                    format!("Expected method body but found `{}`.", token.kind),
                    token.span,
                ));
            }
        };

        let span = self.get_span_from(&start_span);
        self.methods.push(MethodDeclaration {
            name,
            parameters,
            body,
            span,
        });
        Ok(())
    }

    /// Parse a parameter list and return the parameter names.
    fn parse_parameter_list(&mut self) -> CompilationResult<Vec<String>> {
        self.consume_and_expect(TokenKind::LeftParen)?;

        let mut names = vec![];
        let mut last_word: Option<String> = None;
        let mut in_default = false;
        let mut depth = 0usize;

        loop {
            let token = self.current().clone();
            match &token.kind {
                TokenKind::RightParen if depth == 0 => break,
                TokenKind::End => {
                    return Err(CompilationError::new_unexpected_token(
                        token,
                        TokenKind::RightParen,
                    ))
                }
                TokenKind::LeftSquare if depth == 0 && last_word.is_none() => {
                    self.skip_attributes()?;
                    continue;
                }
                TokenKind::Comma if depth == 0 => {
                    names.extend(last_word.take());
                    in_default = false;
                }
                TokenKind::Equals if depth == 0 => in_default = true,
                TokenKind::LeftParen | TokenKind::LeftSquare | TokenKind::LeftCurly => {
                    depth += 1
                }
                TokenKind::LessThan if !in_default => depth += 1,
                TokenKind::RightParen | TokenKind::RightSquare | TokenKind::RightCurly => {
                    depth = depth.saturating_sub(1)
                }
                TokenKind::LargerThan if !in_default => depth = depth.saturating_sub(1),
                TokenKind::Word(w) if depth == 0 && !in_default => last_word = Some(w.clone()),
                _ => {}
            }
            self.consume();
        }

        names.extend(last_word.take());
        self.consume_and_expect(TokenKind::RightParen)?;
        Ok(names)
    }

    /// Parse a `{}` block and return its statements.
    fn parse_block(&mut self) -> CompilationResult<Vec<Statement>> {
        self.consume_and_expect(TokenKind::LeftCurly)?;

        let mut statements = vec![];
        while !matches!(self.current().kind, TokenKind::RightCurly | TokenKind::End) {
            let before = self.cursor;
            match self.parse_statement() {
                Ok(statement) => statements.push(statement),
                Err(e) => {
                    self.report(e);
                    self.recover(true);
                }
            }
            self.ensure_progress(before);
        }

        self.consume_and_expect(TokenKind::RightCurly)?;
        Ok(statements)
    }

    /// Parse the body of an `if`, `else` or loop. A block is flattened into its statements.
    fn parse_embedded_statement(&mut self) -> CompilationResult<Vec<Statement>> {
        if self.current().kind == TokenKind::LeftCurly {
            self.parse_block()
        } else {
            Ok(vec![self.parse_statement()?])
        }
    }

    /// Parse a statement.
    fn parse_statement(&mut self) -> CompilationResult<Statement> {
        let start_token = self.current().clone();

        let kind = match &start_token.kind {
            TokenKind::LeftCurly => {
                self.parse_block()?;
                StatementKind::Other
            }
            TokenKind::Semicolon => {
                self.consume();
                StatementKind::Other
            }
            TokenKind::Word(word) => match word.as_str() {
                "if" => StatementKind::If(self.parse_if_statement()?),
                "else" => {
                    return Err(CompilationError::new_localized(
                        "`else` without `if`.",
                        start_token.span,
                    ))
                }
                "while" | "for" | "foreach" | "lock" | "fixed"
                    if self.peak(1).kind == TokenKind::LeftParen =>
                {
                    self.consume();
                    self.skip_balanced()?;
                    self.parse_embedded_statement()?;
                    StatementKind::Other
                }
                "using" if self.peak(1).kind == TokenKind::LeftParen => {
                    self.consume();
                    self.skip_balanced()?;
                    self.parse_embedded_statement()?;
                    StatementKind::Other
                }
                "using" => {
                    self.skip_past_semicolon()?;
                    StatementKind::Other
                }
                "await"
                    if self.peak(1).kind.is_word("foreach")
                        || self.peak(1).kind.is_word("using") =>
                {
                    self.consume();
                    self.parse_statement()?;
                    StatementKind::Other
                }
                "do" => {
                    self.consume();
                    self.parse_embedded_statement()?;
                    if !self.consume_if_word("while") {
                        let token = self.current().clone();
                        return Err(CompilationError::new_localized(
                            format!("Expected `while` but found `{}`.", token.kind),
                            token.span,
                        ));
                    }
                    self.skip_balanced()?;
                    self.consume_and_expect(TokenKind::Semicolon)?;
                    StatementKind::Other
                }
                "switch" if self.peak(1).kind == TokenKind::LeftParen => {
                    self.consume();
                    self.skip_balanced()?;
                    if self.current().kind != TokenKind::LeftCurly {
                        return Err(CompilationError::new_unexpected_token(
                            self.current().clone(),
                            TokenKind::LeftCurly,
                        ));
                    }
                    self.skip_balanced()?;
                    StatementKind::Other
                }
                "try" => {
                    self.consume();
                    self.parse_block()?;
                    while self.consume_if_word("catch") {
                        if self.current().kind == TokenKind::LeftParen {
                            self.skip_balanced()?;
                        }
                        if self.consume_if_word("when") {
                            self.skip_balanced()?;
                        }
                        self.parse_block()?;
                    }
                    if self.consume_if_word("finally") {
                        self.parse_block()?;
                    }
                    StatementKind::Other
                }
                "return" | "throw" | "break" | "continue" | "goto" | "yield" => {
                    self.skip_past_semicolon()?;
                    StatementKind::Other
                }
                "checked" | "unchecked" | "unsafe"
                    if self.peak(1).kind == TokenKind::LeftCurly =>
                {
                    self.consume();
                    self.parse_block()?;
                    StatementKind::Other
                }
                // Labeled statement
                _ if self.peak(1).kind == TokenKind::Colon => {
                    self.consume();
                    self.consume();
                    StatementKind::Other
                }
                _ => self.parse_declaration_or_expression_statement()?,
            },
            _ => self.parse_declaration_or_expression_statement()?,
        };

        Ok(Statement::new(kind, self.get_span_from(&start_token.span)))
    }

    fn parse_if_statement(&mut self) -> CompilationResult<IfStatement> {
        self.consume(); // Consume "if"
        self.consume_and_expect(TokenKind::LeftParen)?;
        let condition = self.parse_expression()?;
        self.consume_and_expect(TokenKind::RightParen)?;

        let then_branch = self.parse_embedded_statement()?;
        let else_branch = match self.consume_if_word("else") {
            true => Some(self.parse_embedded_statement()?),
            false => None,
        };

        Ok(IfStatement {
            condition,
            then_branch,
            else_branch,
        })
    }

    fn parse_declaration_or_expression_statement(&mut self) -> CompilationResult<StatementKind> {
        if let Some(kind) = self.try_parse_local_declaration()? {
            return Ok(kind);
        }

        let expression = self.parse_expression()?;
        self.consume_and_expect(TokenKind::Semicolon)?;

        Ok(match expression.kind {
            ExpressionKind::Invocation(call) => StatementKind::Call(call),
            _ => StatementKind::Other,
        })
    }

    /// Try to parse a local variable declaration or a local function. Restores the cursor and
    /// returns `None` if the tokens do not form one.
    fn try_parse_local_declaration(&mut self) -> CompilationResult<Option<StatementKind>> {
        let start = self.cursor;

        while self.current_is_word_in(LOCAL_MODIFIERS)
            && matches!(self.peak(1).kind, TokenKind::Word(_))
        {
            self.consume();
        }
        // `ref int x = ref y;`
        if self.current().kind.is_word("ref") && matches!(self.peak(1).kind, TokenKind::Word(_)) {
            self.consume();
        }

        let type_span = match self.try_parse_declared_type() {
            Some(span) => span,
            None => {
                self.cursor = start;
                return Ok(None);
            }
        };

        match (&self.current().kind, &self.peak(1).kind) {
            (
                TokenKind::Word(_),
                TokenKind::Equals | TokenKind::Semicolon | TokenKind::Comma,
            ) => {}
            (TokenKind::Word(_), TokenKind::LeftParen | TokenKind::LessThan) => {
                // Local function. These are not methods and never show up in the flowchart.
                self.consume();
                if self.current().kind == TokenKind::LessThan {
                    self.try_skip_type_arguments();
                }
                if self.current().kind != TokenKind::LeftParen {
                    self.cursor = start;
                    return Ok(None);
                }
                self.skip_balanced()?;
                self.skip_member_body()?;
                return Ok(Some(StatementKind::Other));
            }
            _ => {
                self.cursor = start;
                return Ok(None);
            }
        }

        let mut declarators = vec![];
        loop {
            let name_token = self.current().clone();
            let name = self.consume_word()?;
            let initializer = match self.consume_if(TokenKind::Equals) {
                true => Some(self.parse_variable_initializer()?),
                false => None,
            };
            declarators.push(Declarator {
                name,
                initializer,
                span: self.get_span_from(&name_token.span),
            });
            if !self.consume_if(TokenKind::Comma) {
                break;
            }
        }
        self.consume_and_expect(TokenKind::Semicolon)?;

        Ok(Some(StatementKind::VariableDeclaration(VariableDeclaration {
            type_name: type_span.text().to_string(),
            declarators,
        })))
    }

    fn parse_variable_initializer(&mut self) -> CompilationResult<Expression> {
        let start_token = self.current().clone();
        if start_token.kind == TokenKind::LeftCurly {
            // Array initializer
            self.skip_balanced()?;
            return Ok(Expression::new(
                ExpressionKind::Other,
                self.get_span_from(&start_token.span),
            ));
        }
        self.consume_if_word("ref");
        self.parse_expression()
    }

    /// Try to parse a type. Restores nothing on failure, callers backtrack.
    /// Like [Parser::try_parse_type], but also accepts a tuple type such as `(int, string)` when
    /// a name follows it.
    fn try_parse_declared_type(&mut self) -> Option<TextSpan> {
        if self.current().kind != TokenKind::LeftParen {
            return self.try_parse_type();
        }
        let start_token = self.current().clone();
        let close = self.find_matching_close(self.cursor)?;
        match self.tokens.get(close + 1).map(|token| &token.kind) {
            Some(TokenKind::Word(_)) => {
                self.cursor = close + 1;
                Some(self.get_span_from(&start_token.span))
            }
            _ => None,
        }
    }

    fn try_parse_type(&mut self) -> Option<TextSpan> {
        let start_token = self.current().clone();
        match &start_token.kind {
            TokenKind::Word(w) if !NON_TYPE_KEYWORDS.contains(&w.as_str()) => {
                self.consume();
            }
            _ => return None,
        }

        // `global::System.String`
        if self.consume_if(TokenKind::DoubleColon) {
            self.consume_word().ok()?;
        }

        loop {
            if self.current().kind == TokenKind::LessThan && !self.try_skip_type_arguments() {
                break;
            }
            if self.current().kind == TokenKind::Period
                && matches!(self.peak(1).kind, TokenKind::Word(_))
            {
                self.consume();
                self.consume();
                continue;
            }
            break;
        }

        // Nullable
        if self.current().kind == TokenKind::QuestionMark
            && matches!(
                self.peak(1).kind,
                TokenKind::Word(_) | TokenKind::LeftSquare | TokenKind::RightParen
            )
        {
            self.consume();
        }

        // Arrays and pointers
        loop {
            match (&self.current().kind, &self.peak(1).kind) {
                (TokenKind::LeftSquare, TokenKind::RightSquare | TokenKind::Comma) => {
                    while !matches!(self.current().kind, TokenKind::RightSquare | TokenKind::End) {
                        self.consume();
                    }
                    self.consume();
                }
                (TokenKind::Asterisk, TokenKind::Word(_)) => {
                    self.consume();
                }
                _ => break,
            }
        }

        Some(self.get_span_from(&start_token.span))
    }

    /// Skip a `<...>` type argument list if the tokens form one. The `<` must be current.
    fn try_skip_type_arguments(&mut self) -> bool {
        let start = self.cursor;
        let mut depth = 0usize;
        loop {
            match self.current().kind {
                TokenKind::LessThan => depth += 1,
                TokenKind::LargerThan => {
                    depth -= 1;
                    if depth == 0 {
                        self.consume();
                        return true;
                    }
                }
                TokenKind::Word(_)
                | TokenKind::Comma
                | TokenKind::Period
                | TokenKind::QuestionMark
                | TokenKind::LeftSquare
                | TokenKind::RightSquare
                | TokenKind::LeftParen
                | TokenKind::RightParen
                | TokenKind::DoubleColon
                | TokenKind::Asterisk => {}
                _ => {
                    self.cursor = start;
                    return false;
                }
            }
            self.consume();
        }
    }

    /// Parse an expression.
    pub(crate) fn parse_expression(&mut self) -> CompilationResult<Expression> {
        if let Some(lambda) = self.try_parse_lambda()? {
            return Ok(lambda);
        }

        let left = self.parse_conditional_expression()?;

        if let Some(operator) = self.get_assignment_operator() {
            for _ in 0..operator.token_count() {
                self.consume();
            }
            let value = self.parse_expression()?;
            let span = TextSpan::from_spans(&left.span, &value.span);
            return Ok(Expression::new(
                ExpressionKind::Assignment(AssignmentExpression {
                    target: Box::new(left),
                    operator,
                    value: Box::new(value),
                }),
                span,
            ));
        }

        Ok(left)
    }

    /// Whether the current token ends where the next one starts.
    fn joined_with_next(&self) -> bool {
        self.current().span.end == self.peak(1).span.start
    }

    fn get_assignment_operator(&self) -> Option<AssignmentOperator> {
        match (&self.current().kind, &self.peak(1).kind) {
            (TokenKind::LessThan, TokenKind::LessThanEquals) if self.joined_with_next() => {
                return Some(AssignmentOperator::ShiftLeft)
            }
            (TokenKind::LargerThan, TokenKind::LargerThanEquals) if self.joined_with_next() => {
                return Some(AssignmentOperator::ShiftRight)
            }
            _ => {}
        }
        match self.current().kind {
            TokenKind::Equals => Some(AssignmentOperator::Assign),
            TokenKind::PlusEquals => Some(AssignmentOperator::Add),
            TokenKind::MinusEquals => Some(AssignmentOperator::Subtract),
            TokenKind::AsteriskEquals => Some(AssignmentOperator::Multiply),
            TokenKind::SlashEquals => Some(AssignmentOperator::Divide),
            TokenKind::PercentEquals => Some(AssignmentOperator::Modulo),
            TokenKind::AmpersandEquals => Some(AssignmentOperator::And),
            TokenKind::BarEquals => Some(AssignmentOperator::Or),
            TokenKind::CaretEquals => Some(AssignmentOperator::Xor),
            TokenKind::DoubleQuestionMarkEquals => Some(AssignmentOperator::Coalesce),
            _ => None,
        }
    }

    /// Parse a lambda if one starts at the cursor.
    fn try_parse_lambda(&mut self) -> CompilationResult<Option<Expression>> {
        let start = self.cursor;
        let start_token = self.current().clone();

        if self.current().kind.is_word("async")
            && matches!(self.peak(1).kind, TokenKind::Word(_) | TokenKind::LeftParen)
        {
            self.consume();
        }

        let parameters = match (&self.current().kind, &self.peak(1).kind) {
            (TokenKind::Word(w), TokenKind::FatArrow) => {
                let parameters = vec![w.clone()];
                self.consume();
                parameters
            }
            (TokenKind::LeftParen, _) => {
                let close = self.find_matching_close(self.cursor);
                let is_lambda = close.is_some_and(|close| {
                    self.tokens
                        .get(close + 1)
                        .is_some_and(|t| t.kind == TokenKind::FatArrow)
                });
                match (close, is_lambda) {
                    (Some(close), true) => {
                        let mut parameters = vec![];
                        for i in self.cursor + 1..close {
                            if let TokenKind::Word(w) = &self.tokens[i].kind {
                                if matches!(
                                    self.tokens[i + 1].kind,
                                    TokenKind::Comma | TokenKind::RightParen
                                ) {
                                    parameters.push(w.clone());
                                }
                            }
                        }
                        self.cursor = close + 1;
                        parameters
                    }
                    _ => {
                        self.cursor = start;
                        return Ok(None);
                    }
                }
            }
            _ => {
                self.cursor = start;
                return Ok(None);
            }
        };

        self.consume_and_expect(TokenKind::FatArrow)?;
        let body = match self.current().kind {
            TokenKind::LeftCurly => LambdaBody::Block(self.parse_block()?),
            _ => LambdaBody::Expression(Box::new(self.parse_expression()?)),
        };

        Ok(Some(Expression::new(
            ExpressionKind::Lambda(LambdaExpression { parameters, body }),
            self.get_span_from(&start_token.span),
        )))
    }

    fn parse_conditional_expression(&mut self) -> CompilationResult<Expression> {
        let condition = self.parse_binary_expression(None, 0)?;
        if self.current().kind != TokenKind::QuestionMark {
            return Ok(condition);
        }

        self.consume(); // Consume "?"
        let when_true = self.parse_expression()?;
        self.consume_and_expect(TokenKind::Colon)?;
        let when_false = self.parse_expression()?;

        let span = TextSpan::from_spans(&condition.span, &when_false.span);
        Ok(Expression::new(
            ExpressionKind::Conditional(ConditionalExpression {
                condition: Box::new(condition),
                when_true: Box::new(when_true),
                when_false: Box::new(when_false),
            }),
            span,
        ))
    }

    fn get_binary_operator(&self) -> Option<BinaryOperator> {
        match (&self.current().kind, &self.peak(1).kind) {
            (TokenKind::LessThan, TokenKind::LessThan) if self.joined_with_next() => {
                return Some(BinaryOperator::ShiftLeft)
            }
            (TokenKind::LargerThan, TokenKind::LargerThan) if self.joined_with_next() => {
                return Some(BinaryOperator::ShiftRight)
            }
            // Compound shift assignment
            (TokenKind::LessThan, TokenKind::LessThanEquals)
            | (TokenKind::LargerThan, TokenKind::LargerThanEquals)
                if self.joined_with_next() =>
            {
                return None
            }
            _ => {}
        }
        match &self.current().kind {
            TokenKind::DoubleQuestionMark => Some(BinaryOperator::Coalesce),
            TokenKind::DoubleBar => Some(BinaryOperator::Or),
            TokenKind::DoubleAmpersand => Some(BinaryOperator::And),
            TokenKind::Bar => Some(BinaryOperator::BitOr),
            TokenKind::Caret => Some(BinaryOperator::BitXor),
            TokenKind::Ampersand => Some(BinaryOperator::BitAnd),
            TokenKind::DoubleEquals => Some(BinaryOperator::Equals),
            TokenKind::BangEquals => Some(BinaryOperator::NotEquals),
            TokenKind::LessThan => Some(BinaryOperator::LessThan),
            TokenKind::LessThanEquals => Some(BinaryOperator::LessThanOrEqual),
            TokenKind::LargerThan => Some(BinaryOperator::LargerThan),
            TokenKind::LargerThanEquals => Some(BinaryOperator::LargerThanOrEqual),
            TokenKind::Word(w) if w == "is" => Some(BinaryOperator::Is),
            TokenKind::Word(w) if w == "as" => Some(BinaryOperator::As),
            TokenKind::Plus => Some(BinaryOperator::Add),
            TokenKind::Minus => Some(BinaryOperator::Subtract),
            TokenKind::Asterisk => Some(BinaryOperator::Multiply),
            TokenKind::Slash => Some(BinaryOperator::Divide),
            TokenKind::Percent => Some(BinaryOperator::Modulo),
            _ => None,
        }
    }

    /// Parse a binary expression.
    /// https://en.wikipedia.org/wiki/Operator-precedence_parser
    fn parse_binary_expression(
        &mut self,
        left: Option<Expression>,
        min_precedence: u8,
    ) -> CompilationResult<Expression> {
        let mut left = match left {
            Some(e) => e,
            None => self.parse_unary_expression()?,
        };

        while let Some(op) = self.get_binary_operator() {
            if op.precedence() < min_precedence {
                break;
            }

            for _ in 0..op.token_count() {
                self.consume();
            }
            let mut right = match op.takes_type() {
                true => self.parse_type_pattern()?,
                false => self.parse_unary_expression()?,
            };

            while let Some(right_op) = self.get_binary_operator() {
                let binds_tighter = right_op.precedence() > op.precedence()
                    || (right_op == op && op.is_right_associative());
                if !binds_tighter {
                    break;
                }
                right = self.parse_binary_expression(Some(right), right_op.precedence())?;
            }

            let span = TextSpan::from_spans(&left.span, &right.span);
            left = Expression::new(
                ExpressionKind::Binary(BinaryExpression {
                    left: Box::new(left),
                    right: Box::new(right),
                    operator: op,
                }),
                span,
            );
        }

        Ok(left)
    }

    /// Parse the right side of `is` and `as`.
    fn parse_type_pattern(&mut self) -> CompilationResult<Expression> {
        let start_token = self.current().clone();
        self.consume_if_word("not");

        let kind = self.current().kind.clone();
        match &kind {
            TokenKind::Number(_)
            | TokenKind::StringLiteral(_)
            | TokenKind::CharLiteral(_)
            | TokenKind::Minus => return self.parse_unary_expression(),
            TokenKind::Word(w) if matches!(w.as_str(), "null" | "true" | "false") => {
                return self.parse_unary_expression()
            }
            TokenKind::LeftCurly => {
                // Property pattern
                self.skip_balanced()?;
                return Ok(Expression::new(
                    ExpressionKind::Other,
                    self.get_span_from(&start_token.span),
                ));
            }
            _ => {}
        }

        let type_span = match self.try_parse_type() {
            Some(span) => span,
            None => {
                let token = self.current().clone();
                return Err(CompilationError::new_localized(
                    format!("Expected type but found `{}`.", token.kind),
                    token.span,
                ));
            }
        };

        // Designation, like `x is Foo foo`
        if matches!(&self.current().kind, TokenKind::Word(w) if !matches!(w.as_str(), "and" | "or" | "when" | "is" | "as"))
        {
            self.consume();
        }

        Ok(Expression::new(
            ExpressionKind::Identifier(type_span.text().to_string()),
            self.get_span_from(&start_token.span),
        ))
    }

    fn parse_unary_expression(&mut self) -> CompilationResult<Expression> {
        let start_token = self.current().clone();

        let operator = match &start_token.kind {
            TokenKind::Bang => Some(UnaryOperator::Not),
            TokenKind::Minus => Some(UnaryOperator::Negative),
            TokenKind::Plus => Some(UnaryOperator::Plus),
            TokenKind::Tilde => Some(UnaryOperator::Complement),
            TokenKind::PlusPlus => Some(UnaryOperator::PreIncrement),
            TokenKind::MinusMinus => Some(UnaryOperator::PreDecrement),
            TokenKind::Word(w) if w == "await" => Some(UnaryOperator::Await),
            _ => None,
        };

        if let Some(operator) = operator {
            self.consume();
            let operand = self.parse_unary_expression()?;
            return Ok(Expression::new(
                ExpressionKind::Unary(UnaryExpression {
                    operator,
                    operand: Box::new(operand),
                }),
                self.get_span_from(&start_token.span),
            ));
        }

        if self.is_at_cast() {
            self.consume(); // Consume "("
            let type_name = match self.try_parse_type() {
                Some(span) => span.text().to_string(),
                None => String::new(),
            };
            self.consume_and_expect(TokenKind::RightParen)?;
            let expression = self.parse_unary_expression()?;
            return Ok(Expression::new(
                ExpressionKind::Cast(CastExpression {
                    type_name,
                    expression: Box::new(expression),
                }),
                self.get_span_from(&start_token.span),
            ));
        }

        let primary = self.parse_primary_expression()?;
        self.parse_postfix_expression(primary)
    }

    /// Check whether the cursor is at a cast like `(int)x` or `(Foo)bar`.
    fn is_at_cast(&self) -> bool {
        if self.current().kind != TokenKind::LeftParen {
            return false;
        }
        let TokenKind::Word(w) = &self.peak(1).kind else {
            return false;
        };
        let mut close = 2;
        if self.peak(close).kind == TokenKind::QuestionMark {
            close += 1;
        }
        if self.peak(close).kind != TokenKind::RightParen {
            return false;
        }
        let next = &self.peak(close + 1).kind;
        if PREDEFINED_TYPES.contains(&w.as_str()) {
            return !matches!(
                next,
                TokenKind::RightParen | TokenKind::Semicolon | TokenKind::Comma | TokenKind::End
            );
        }
        matches!(
            next,
            TokenKind::Word(_)
                | TokenKind::Number(_)
                | TokenKind::StringLiteral(_)
                | TokenKind::CharLiteral(_)
        ) && !next.is_word("is")
            && !next.is_word("as")
    }

    /// Parse a primary expression.
    fn parse_primary_expression(&mut self) -> CompilationResult<Expression> {
        let start_token = self.current().clone();

        let kind = match &start_token.kind {
            TokenKind::Number(n) => {
                self.consume();
                ExpressionKind::Number(n.clone())
            }
            TokenKind::StringLiteral(s) => {
                self.consume();
                ExpressionKind::Str(s.clone())
            }
            TokenKind::CharLiteral(c) => {
                self.consume();
                ExpressionKind::Char(c.clone())
            }
            TokenKind::Word(word) => match word.as_str() {
                "true" => {
                    self.consume();
                    ExpressionKind::Bool(true)
                }
                "false" => {
                    self.consume();
                    ExpressionKind::Bool(false)
                }
                "null" => {
                    self.consume();
                    ExpressionKind::Null
                }
                "new" => self.parse_object_creation()?,
                "typeof" | "default" | "sizeof" | "checked" | "unchecked" => {
                    self.consume();
                    if self.current().kind == TokenKind::LeftParen {
                        self.skip_balanced()?;
                    }
                    ExpressionKind::Other
                }
                "stackalloc" => {
                    self.consume();
                    self.try_parse_type();
                    if self.current().kind == TokenKind::LeftSquare {
                        self.skip_balanced()?;
                    }
                    if self.current().kind == TokenKind::LeftCurly {
                        self.skip_balanced()?;
                    }
                    ExpressionKind::Other
                }
                _ => {
                    self.consume();
                    // Generic method name, like `Parse<int>(s)`
                    if self.current().kind == TokenKind::LessThan {
                        let before = self.cursor;
                        if !(self.try_skip_type_arguments()
                            && matches!(
                                self.current().kind,
                                TokenKind::LeftParen | TokenKind::Period
                            ))
                        {
                            self.cursor = before;
                        }
                    }
                    ExpressionKind::Identifier(self.get_span_from(&start_token.span).text().to_string())
                }
            },
            TokenKind::LeftParen => {
                self.consume();
                let inner = self.parse_expression()?;
                let mut is_tuple = false;
                while self.consume_if(TokenKind::Comma) {
                    is_tuple = true;
                    self.parse_expression()?;
                }
                self.consume_and_expect(TokenKind::RightParen)?;
                match is_tuple {
                    true => ExpressionKind::Other,
                    false => ExpressionKind::Parenthesized(Box::new(inner)),
                }
            }
            TokenKind::LeftSquare => {
                // Collection expression
                self.skip_balanced()?;
                ExpressionKind::Other
            }
            _ => {
                return Err(CompilationError::new_localized(
                    format!("Expected expression but found `{}`.", start_token.kind),
                    start_token.span,
                ))
            }
        };

        Ok(Expression::new(kind, self.get_span_from(&start_token.span)))
    }

    fn parse_object_creation(&mut self) -> CompilationResult<ExpressionKind> {
        self.consume(); // Consume "new"

        let type_name = match self.current().kind {
            TokenKind::LeftParen | TokenKind::LeftCurly => None,
            TokenKind::LeftSquare => {
                self.skip_balanced()?;
                None
            }
            _ => match self.try_parse_type() {
                Some(span) => Some(span.text().to_string()),
                None => {
                    let token = self.current().clone();
                    return Err(CompilationError::new_localized(
                        format!("Expected type after `new` but found `{}`.", token.kind),
                        token.span,
                    ));
                }
            },
        };

        // Array size, like `new int[5]`
        while self.current().kind == TokenKind::LeftSquare {
            self.skip_balanced()?;
        }

        let arguments = match self.current().kind {
            TokenKind::LeftParen => self.parse_arguments(TokenKind::RightParen)?,
            _ => vec![],
        };

        // Object or collection initializer
        if self.current().kind == TokenKind::LeftCurly {
            self.skip_balanced()?;
        }

        Ok(ExpressionKind::ObjectCreation(ObjectCreationExpression {
            type_name,
            arguments,
        }))
    }

    fn parse_postfix_expression(&mut self, primary: Expression) -> CompilationResult<Expression> {
        let mut expr = primary;
        loop {
            let start_span = expr.span.clone();
            let kind = match self.current().kind {
                TokenKind::Period | TokenKind::QuestionMarkPeriod => {
                    let conditional = self.current().kind == TokenKind::QuestionMarkPeriod;
                    self.consume();
                    let member = self.consume_word()?;
                    if self.current().kind == TokenKind::LessThan {
                        let before = self.cursor;
                        if !(self.try_skip_type_arguments()
                            && self.current().kind == TokenKind::LeftParen)
                        {
                            self.cursor = before;
                        }
                    }
                    ExpressionKind::MemberAccess(MemberAccessExpression {
                        target: Box::new(expr),
                        member,
                        conditional,
                    })
                }
                TokenKind::LeftParen => {
                    let arguments = self.parse_arguments(TokenKind::RightParen)?;
                    ExpressionKind::Invocation(InvocationExpression {
                        callee: Box::new(expr),
                        arguments,
                        span: self.get_span_from(&start_span),
                    })
                }
                TokenKind::LeftSquare => {
                    let arguments = self.parse_arguments(TokenKind::RightSquare)?;
                    ExpressionKind::ElementAccess(ElementAccessExpression {
                        target: Box::new(expr),
                        arguments,
                    })
                }
                TokenKind::PlusPlus | TokenKind::MinusMinus => {
                    let operator = match self.consume().kind {
                        TokenKind::PlusPlus => UnaryOperator::PostIncrement,
                        _ => UnaryOperator::PostDecrement,
                    };
                    ExpressionKind::Unary(UnaryExpression {
                        operator,
                        operand: Box::new(expr),
                    })
                }
                // Null forgiving operator
                TokenKind::Bang => {
                    self.consume();
                    expr.span = self.get_span_from(&start_span);
                    continue;
                }
                _ if (self.current().kind.is_word("switch")
                    || self.current().kind.is_word("with"))
                    && self.peak(1).kind == TokenKind::LeftCurly =>
                {
                    self.consume();
                    self.skip_balanced()?;
                    ExpressionKind::Other
                }
                _ => break,
            };
            expr = Expression::new(kind, self.get_span_from(&start_span));
        }
        Ok(expr)
    }

    /// Parse an argument list. The opening token must be current.
    fn parse_arguments(&mut self, close: TokenKind) -> CompilationResult<Vec<Argument>> {
        self.consume(); // Consume opening token

        let mut arguments = vec![];
        if self.consume_if(close.clone()) {
            return Ok(arguments);
        }

        loop {
            let name = match (&self.current().kind, &self.peak(1).kind) {
                (TokenKind::Word(w), TokenKind::Colon) => {
                    let name = w.clone();
                    self.consume();
                    self.consume();
                    Some(name)
                }
                _ => None,
            };

            let modifier = match &self.current().kind {
                TokenKind::Word(w) if matches!(w.as_str(), "ref" | "out" | "in") => {
                    let modifier = w.clone();
                    self.consume();
                    Some(modifier)
                }
                _ => None,
            };

            let expression = match (&self.current().kind, &self.peak(1).kind) {
                // Declaration expression, like `out var x` or `out int x`
                (TokenKind::Word(_), TokenKind::Word(_)) if modifier.as_deref() == Some("out") => {
                    let start_token = self.current().clone();
                    self.consume();
                    self.consume();
                    Expression::new(ExpressionKind::Other, self.get_span_from(&start_token.span))
                }
                _ => self.parse_expression()?,
            };

            arguments.push(Argument {
                name,
                modifier,
                expression,
            });

            if !self.consume_if(TokenKind::Comma) {
                break;
            }
        }

        self.consume_and_expect(close)?;
        Ok(arguments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse(code: &str) -> (SourceUnit, usize) {
        let (unit, bag) = SourceUnit::from_str(code);
        bag.borrow().print();
        let errors = bag.borrow().error_count();
        (unit, errors)
    }

    fn kinds(statements: &[Statement]) -> Vec<&'static str> {
        statements
            .iter()
            .map(|s| match s.kind {
                StatementKind::VariableDeclaration(_) => "decl",
                StatementKind::Call(_) => "call",
                StatementKind::If(_) => "if",
                StatementKind::Other => "other",
            })
            .collect()
    }

    #[test]
    fn parse_methods_in_document_order() {
        let (unit, errors) = parse(
            "
            using System;
            using System.Collections.Generic;

            namespace Demo
            {
                public class Program
                {
                    private static int counter = 0;
                    public string Name { get; set; } = \"x\";

                    public Program() { counter++; }

                    public static void Main(string[] args)
                    {
                        Test(5);
                    }

                    class Nested
                    {
                        internal void Inner<T>(T value, int count = 3) where T : class { }
                    }

                    static void Test(int x) => Console.WriteLine(x);
                }
            }
            ",
        );
        assert_eq!(errors, 0);
        let names: Vec<&str> = unit.methods.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["Main", "Inner", "Test"]);
        assert_eq!(unit.methods[0].parameters, vec!["args".to_string()]);
        assert_eq!(
            unit.methods[1].parameters,
            vec!["value".to_string(), "count".to_string()]
        );
        assert!(unit.methods[2].body.is_empty());
    }

    #[test]
    fn classify_statements() {
        let (unit, errors) = parse(
            "
            class A {
                void Main() {
                    int x = 4 + 3;
                    var list = new List<int> { 1, 2 };
                    Console.WriteLine($\"x is {x}\");
                    x = 5;
                    x++;
                    for (int i = 0; i < 3; i++) { Foo(i); }
                    if (x > 5) { A(); } else B();
                    return;
                }
            }
            ",
        );
        assert_eq!(errors, 0);
        assert_eq!(
            kinds(&unit.methods[0].body),
            vec!["decl", "decl", "call", "other", "other", "other", "if", "other"]
        );
    }

    #[test]
    fn parse_declaration_parts() {
        let (unit, errors) = parse(
            "class A { void M() { string message = \"vlakas\"; int a, b = 2; object o; } }",
        );
        assert_eq!(errors, 0);
        let body = &unit.methods[0].body;

        let StatementKind::VariableDeclaration(decl) = &body[0].kind else {
            panic!("expected declaration");
        };
        assert_eq!(decl.type_name, "string");
        assert_eq!(decl.declarators[0].name, "message");
        assert_eq!(
            decl.declarators[0].initializer.as_ref().map(|e| e.text()),
            Some("\"vlakas\"")
        );

        let StatementKind::VariableDeclaration(decl) = &body[1].kind else {
            panic!("expected declaration");
        };
        let names: Vec<&str> = decl.declarators.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);

        let StatementKind::VariableDeclaration(decl) = &body[2].kind else {
            panic!("expected declaration");
        };
        assert!(decl.declarators[0].initializer.is_none());
    }

    #[test]
    fn parse_call_parts() {
        let (unit, errors) = parse("class A { void M() { Console.WriteLine(x, \"a\", ref y); } }");
        assert_eq!(errors, 0);
        let StatementKind::Call(call) = &unit.methods[0].body[0].kind else {
            panic!("expected call");
        };
        assert_eq!(call.text(), "Console.WriteLine(x, \"a\", ref y)");
        assert_eq!(call.arguments.len(), 3);
        assert_eq!(call.arguments[0].expression.as_identifier(), Some("x"));
        assert_eq!(call.arguments[2].modifier.as_deref(), Some("ref"));
    }

    #[test]
    fn parse_if_else_chain() {
        let (unit, errors) = parse(
            "class A { void M() { if (x > 5 && y) A(); else if (x < 0) { B(); C(); } else { } } }",
        );
        assert_eq!(errors, 0);
        let StatementKind::If(if_statement) = &unit.methods[0].body[0].kind else {
            panic!("expected if");
        };
        assert_eq!(if_statement.condition.text(), "x > 5 && y");
        assert_eq!(kinds(&if_statement.then_branch), vec!["call"]);

        let else_branch = if_statement.else_branch.as_ref().expect("else branch");
        let StatementKind::If(nested) = &else_branch[0].kind else {
            panic!("expected else if");
        };
        assert_eq!(kinds(&nested.then_branch), vec!["call", "call"]);
        assert_eq!(nested.else_branch.as_ref().map(|b| b.len()), Some(0));
    }

    #[test]
    fn binary_precedence() {
        let expr = Parser::parse_expression_text("1 + 2 * 3 == 7 || false").unwrap();
        let ExpressionKind::Binary(or) = &expr.kind else {
            panic!("expected binary");
        };
        assert_eq!(or.operator, BinaryOperator::Or);
        let ExpressionKind::Binary(eq) = &or.left.kind else {
            panic!("expected binary");
        };
        assert_eq!(eq.operator, BinaryOperator::Equals);
        assert_eq!(eq.left.text(), "1 + 2 * 3");
    }

    #[test]
    fn shift_operators() {
        let (unit, errors) = parse(
            "class A { void M() { int s = 1 << 2; int t = s >> 1; x <<= 1; y >>= 2; Done(); } }",
        );
        assert_eq!(errors, 0);
        assert_eq!(
            kinds(&unit.methods[0].body),
            vec!["decl", "decl", "other", "other", "call"]
        );

        let expr = Parser::parse_expression_text("1 + 2 << 3 < 4").unwrap();
        let ExpressionKind::Binary(less) = &expr.kind else {
            panic!("expected binary");
        };
        assert_eq!(less.operator, BinaryOperator::LessThan);
        let ExpressionKind::Binary(shift) = &less.left.kind else {
            panic!("expected binary");
        };
        assert_eq!(shift.operator, BinaryOperator::ShiftLeft);
        assert_eq!(shift.left.text(), "1 + 2");

        let expr = Parser::parse_expression_text("x >>= 1").unwrap();
        let ExpressionKind::Assignment(assignment) = &expr.kind else {
            panic!("expected assignment");
        };
        assert_eq!(assignment.operator, AssignmentOperator::ShiftRight);

        // Separated angle brackets are not a shift.
        assert!(Parser::parse_expression_text("1 < < 2").is_err());
    }

    #[test]
    fn trailing_tokens_are_an_error() {
        assert!(Parser::parse_expression_text("1 2").is_err());
        assert!(Parser::parse_expression_text("(1 + 2").is_err());
        assert!(Parser::parse_expression_text("").is_err());
    }

    #[test]
    fn lambdas_generics_and_casts() {
        let (unit, errors) = parse(
            "
            class A {
                async Task M() {
                    items.ForEach(x => Console.WriteLine(x));
                    var n = (int)Math.Round(2.5);
                    var parsed = Parse<int>(text);
                    await Task.Delay(10);
                    Func<int, int> f = (a) => { return a * 2; };
                    if (o is string s && s.Length > 0) { Log(s); }
                }
            }
            ",
        );
        assert_eq!(errors, 0);
        assert_eq!(
            kinds(&unit.methods[0].body),
            vec!["call", "decl", "decl", "other", "decl", "if"]
        );
    }

    #[test]
    fn tuple_types() {
        let (unit, errors) = parse(
            "class A { (int, string) Pair() { (int, string) p = Make(); Use(p); } void N() { } }",
        );
        assert_eq!(errors, 0);
        let names: Vec<&str> = unit.methods.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["Pair", "N"]);
        assert_eq!(kinds(&unit.methods[0].body), vec!["decl", "call"]);
    }

    #[test]
    fn recover_from_bad_statement() {
        let (unit, errors) = parse("class A { void M() { int = ; Foo(); } void N() { } }");
        assert!(errors > 0);
        let names: Vec<&str> = unit.methods.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["M", "N"]);
        assert_eq!(kinds(&unit.methods[0].body), vec!["call"]);
    }

    #[test]
    fn top_level_statements_are_not_methods() {
        let (unit, errors) = parse(
            "
            using System;
            Console.WriteLine(\"hi\");
            if (true) { Run(); }
            class Program { static void Run() { Go(); } }
            ",
        );
        assert_eq!(errors, 0);
        let names: Vec<&str> = unit.methods.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["Run"]);
    }
}
