//! Module for lexing and parsing C# source code into a syntax tree the flowchart engine can walk.

use std::fmt::Display;
use std::rc::Rc;

use crate::ast::visitors::Visitor;
use crate::diagnostics::DiagnosticsBagRef;
use crate::text::{SourceText, TextSpan};

use self::lexer::{Lexer, Token};
use self::parser::Parser;

pub mod lexer;
pub mod parser;
pub mod visitors;

const INDENTATON: usize = 2;

/// A parsed source file. Only method declarations are kept, in the order they appear in the
/// document (methods of nested types included).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SourceUnit {
    pub methods: Vec<MethodDeclaration>,
}

impl SourceUnit {
    /// Lex and parse a [SourceText]. Syntax errors are reported to the diagnostics bag and
    /// whatever could be parsed is returned.
    pub fn from_source(text: Rc<SourceText>, diagnostics_bag: DiagnosticsBagRef) -> Self {
        let lexer = Lexer::from_source(text);
        let tokens: Vec<Token> = lexer.collect();
        Parser::parse(tokens, diagnostics_bag)
    }

    /// Print the [SourceUnit] to stout.
    pub fn print(&self) {
        let mut printer = Printer::new();
        for method in &self.methods {
            printer.visit_method(method);
        }
    }
}

/// A method declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodDeclaration {
    pub name: String,
    pub parameters: Vec<String>,
    /// Body statements. Empty for abstract, interface and expression-bodied methods.
    pub body: Vec<Statement>,
    pub span: TextSpan,
}

/// A parsed statement.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub kind: StatementKind,
    pub span: TextSpan,
}

impl Statement {
    /// Instantiate a new [Statement].
    fn new(kind: StatementKind, span: TextSpan) -> Self {
        Statement { kind, span }
    }
}

/// Kinds of statement. Everything the flowchart does not draw is [StatementKind::Other].
#[derive(Debug, Clone, PartialEq)]
pub enum StatementKind {
    VariableDeclaration(VariableDeclaration),
    Call(InvocationExpression),
    If(IfStatement),
    Other,
}

/// A local variable declaration, like `int a = 1, b;`.
#[derive(Debug, Clone, PartialEq)]
pub struct VariableDeclaration {
    pub type_name: String,
    pub declarators: Vec<Declarator>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Declarator {
    pub name: String,
    pub initializer: Option<Expression>,
    pub span: TextSpan,
}

/// An `if` statement. A block branch is flattened into its statements.
#[derive(Debug, Clone, PartialEq)]
pub struct IfStatement {
    pub condition: Expression,
    pub then_branch: Vec<Statement>,
    pub else_branch: Option<Vec<Statement>>,
}

/// An expression.
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    pub kind: ExpressionKind,
    pub span: TextSpan,
}

impl Expression {
    fn new(kind: ExpressionKind, span: TextSpan) -> Self {
        Self { kind, span }
    }

    /// The expression as written in the source.
    pub fn text(&self) -> &str {
        self.span.text()
    }

    /// Name of the identifier if this is a bare identifier.
    pub fn as_identifier(&self) -> Option<&str> {
        match &self.kind {
            ExpressionKind::Identifier(name) => Some(name),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExpressionKind {
    /// Numeric literal as written.
    Number(String),
    /// String literal as written, quotes included.
    Str(String),
    /// Char literal as written, quotes included.
    Char(String),
    Bool(bool),
    Null,
    Identifier(String),
    Binary(BinaryExpression),
    Unary(UnaryExpression),
    Parenthesized(Box<Expression>),
    Invocation(InvocationExpression),
    MemberAccess(MemberAccessExpression),
    ElementAccess(ElementAccessExpression),
    Assignment(AssignmentExpression),
    Conditional(ConditionalExpression),
    Cast(CastExpression),
    ObjectCreation(ObjectCreationExpression),
    Lambda(LambdaExpression),
    /// Anything parsed structurally but not modelled (`default`, `typeof(..)`, collection
    /// initializers, switch expressions...).
    Other,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BinaryExpression {
    pub left: Box<Expression>,
    pub right: Box<Expression>,
    pub operator: BinaryOperator,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnaryExpression {
    pub operator: UnaryOperator,
    pub operand: Box<Expression>,
}

/// A call, like `Console.WriteLine(x)`.
#[derive(Debug, Clone, PartialEq)]
pub struct InvocationExpression {
    pub callee: Box<Expression>,
    pub arguments: Vec<Argument>,
    pub span: TextSpan,
}

impl InvocationExpression {
    /// The call as written in the source.
    pub fn text(&self) -> &str {
        self.span.text()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Argument {
    pub name: Option<String>,
    /// `ref`, `out` or `in`.
    pub modifier: Option<String>,
    pub expression: Expression,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MemberAccessExpression {
    pub target: Box<Expression>,
    pub member: String,
    /// Set for `?.`
    pub conditional: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ElementAccessExpression {
    pub target: Box<Expression>,
    pub arguments: Vec<Argument>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AssignmentExpression {
    pub target: Box<Expression>,
    pub operator: AssignmentOperator,
    pub value: Box<Expression>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConditionalExpression {
    pub condition: Box<Expression>,
    pub when_true: Box<Expression>,
    pub when_false: Box<Expression>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CastExpression {
    pub type_name: String,
    pub expression: Box<Expression>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ObjectCreationExpression {
    /// `None` for target-typed `new()`.
    pub type_name: Option<String>,
    pub arguments: Vec<Argument>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LambdaExpression {
    pub parameters: Vec<String>,
    pub body: LambdaBody,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LambdaBody {
    Expression(Box<Expression>),
    Block(Vec<Statement>),
}

/// Binary operators, by precedence from loosest to tightest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    Coalesce,
    Or,
    And,
    BitOr,
    BitXor,
    BitAnd,
    Equals,
    NotEquals,
    LessThan,
    LessThanOrEqual,
    LargerThan,
    LargerThanOrEqual,
    Is,
    As,
    ShiftLeft,
    ShiftRight,
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
}

impl BinaryOperator {
    fn precedence(&self) -> u8 {
        match self {
            Self::Coalesce => 1,
            Self::Or => 2,
            Self::And => 3,
            Self::BitOr => 4,
            Self::BitXor => 5,
            Self::BitAnd => 6,
            Self::Equals | Self::NotEquals => 7,
            Self::LessThan
            | Self::LessThanOrEqual
            | Self::LargerThan
            | Self::LargerThanOrEqual
            | Self::Is
            | Self::As => 8,
            Self::ShiftLeft | Self::ShiftRight => 9,
            Self::Add | Self::Subtract => 10,
            Self::Multiply | Self::Divide | Self::Modulo => 11,
        }
    }

    /// Shifts are lexed as two adjacent `<` or `>` tokens.
    fn token_count(&self) -> usize {
        match self {
            Self::ShiftLeft | Self::ShiftRight => 2,
            _ => 1,
        }
    }

    /// `??` is the only right associative binary operator.
    fn is_right_associative(&self) -> bool {
        matches!(self, Self::Coalesce)
    }

    /// Whether the right operand is a type rather than an expression.
    fn takes_type(&self) -> bool {
        matches!(self, Self::Is | Self::As)
    }
}

impl Display for BinaryOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Coalesce => "??",
            Self::Or => "||",
            Self::And => "&&",
            Self::BitOr => "|",
            Self::BitXor => "^",
            Self::BitAnd => "&",
            Self::Equals => "==",
            Self::NotEquals => "!=",
            Self::LessThan => "<",
            Self::LessThanOrEqual => "<=",
            Self::LargerThan => ">",
            Self::LargerThanOrEqual => ">=",
            Self::Is => "is",
            Self::As => "as",
            Self::ShiftLeft => "<<",
            Self::ShiftRight => ">>",
            Self::Add => "+",
            Self::Subtract => "-",
            Self::Multiply => "*",
            Self::Divide => "/",
            Self::Modulo => "%",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    Not,
    Negative,
    Plus,
    Complement,
    PreIncrement,
    PreDecrement,
    PostIncrement,
    PostDecrement,
    Await,
}

impl Display for UnaryOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Not => "!",
            Self::Negative => "-",
            Self::Plus => "+",
            Self::Complement => "~",
            Self::PreIncrement => "++x",
            Self::PreDecrement => "--x",
            Self::PostIncrement => "x++",
            Self::PostDecrement => "x--",
            Self::Await => "await",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignmentOperator {
    Assign,
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    And,
    Or,
    Xor,
    Coalesce,
    ShiftLeft,
    ShiftRight,
}

impl AssignmentOperator {
    /// `<<=` and `>>=` are lexed as `<` or `>` followed by `<=` or `>=`.
    fn token_count(&self) -> usize {
        match self {
            Self::ShiftLeft | Self::ShiftRight => 2,
            _ => 1,
        }
    }
}

/// Struct for printing the syntax tree.
struct Printer {
    current_intent: usize,
}

impl Printer {
    /// Instantiate a new printer.
    fn new() -> Self {
        Self { current_intent: 0 }
    }

    /// Print a string at the current indentation.
    fn print(&self, text: &str) {
        println!("{}{}", " ".repeat(self.current_intent), text);
    }

    /// Add one indentation level.
    fn indent(&mut self) {
        self.current_intent += INDENTATON;
    }

    /// Remove one indentation level.
    fn unindent(&mut self) {
        self.current_intent -= INDENTATON;
    }
}

impl Visitor for Printer {
    fn visit_method(&mut self, method: &MethodDeclaration) {
        self.print(&format!(
            "Method: \"{}\" ({})",
            method.name,
            method.parameters.join(", ")
        ));
        self.indent();
        self.do_visit_method(method);
        self.unindent();
    }

    fn visit_statement(&mut self, statement: &Statement) {
        if let StatementKind::Other = statement.kind {
            self.print(&format!("Other: `{}`", statement.span.text().trim()));
            return;
        }
        self.do_visit_statement(statement);
    }

    fn visit_variable_declaration(&mut self, declaration: &VariableDeclaration) {
        self.print(&format!("Declaration: {}", declaration.type_name));
        self.indent();
        for declarator in &declaration.declarators {
            self.print(&format!("Variable: \"{}\"", declarator.name));
            if let Some(init) = &declarator.initializer {
                self.indent();
                self.visit_expression(init);
                self.unindent();
            }
        }
        self.unindent();
    }

    fn visit_call(&mut self, call: &InvocationExpression) {
        self.print(&format!("Call: `{}`", call.text()));
        self.indent();
        self.do_visit_invocation(call);
        self.unindent();
    }

    fn visit_if_statement(&mut self, if_statement: &IfStatement) {
        self.print("If:");
        self.indent();
        self.print("Condition:");
        self.indent();
        self.visit_expression(&if_statement.condition);
        self.unindent();
        self.print("Then:");
        self.indent();
        for statement in &if_statement.then_branch {
            self.visit_statement(statement);
        }
        self.unindent();
        if let Some(else_branch) = &if_statement.else_branch {
            self.print("Else:");
            self.indent();
            for statement in else_branch {
                self.visit_statement(statement);
            }
            self.unindent();
        }
        self.unindent();
    }

    fn visit_expression(&mut self, expression: &Expression) {
        match &expression.kind {
            ExpressionKind::Binary(binary) => {
                self.print(&format!("Binary: {}", binary.operator));
                self.indent();
                self.do_visit_expression(expression);
                self.unindent();
            }
            ExpressionKind::Unary(unary) => {
                self.print(&format!("Unary: {}", unary.operator));
                self.indent();
                self.do_visit_expression(expression);
                self.unindent();
            }
            ExpressionKind::Invocation(call) => {
                self.print(&format!("Invocation: `{}`", call.text()));
                self.indent();
                self.do_visit_expression(expression);
                self.unindent();
            }
            _ => self.print(&format!("Expression: `{}`", expression.text())),
        }
    }
}

#[cfg(test)]
impl SourceUnit {
    /// This function is only for testing
    pub fn from_str(code: &str) -> (Self, DiagnosticsBagRef) {
        let source = Rc::new(SourceText::from_str(code));
        let bag = crate::diagnostics::DiagnosticsBag::new_ref();
        (SourceUnit::from_source(source, bag.clone()), bag)
    }
}
