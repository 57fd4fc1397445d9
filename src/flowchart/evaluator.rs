//! Static evaluation of arithmetic and conditions.

use std::cmp::Ordering;
use std::fmt::Display;

use tracing::warn;

use crate::ast::parser::Parser;
use crate::ast::{BinaryExpression, BinaryOperator, Expression, ExpressionKind, UnaryOperator};
use crate::diagnostics::CompilationError;

/// Evaluate a binary expression whose operands are integer literals.
///
/// Operands that are not integer literals evaluate the whole expression to 0, as do
/// division and modulo by zero and any operator that is not arithmetic.
pub fn evaluate_binary(expr: &BinaryExpression) -> i32 {
    let (Some(left), Some(right)) = (parse_operand(&expr.left), parse_operand(&expr.right))
    else {
        return 0;
    };

    match expr.operator {
        BinaryOperator::Add => left.wrapping_add(right),
        BinaryOperator::Subtract => left.wrapping_sub(right),
        BinaryOperator::Multiply => left.wrapping_mul(right),
        BinaryOperator::Divide if right != 0 => left.wrapping_div(right),
        BinaryOperator::Modulo if right != 0 => left.wrapping_rem(right),
        _ => 0,
    }
}

fn parse_operand(operand: &Expression) -> Option<i32> {
    operand.text().trim().parse().ok()
}

/// Evaluate a condition whose variables have already been substituted.
///
/// Never fails: anything that cannot be evaluated is logged and counts as `false`.
pub fn evaluate_condition(condition: &str) -> bool {
    let result = Parser::parse_expression_text(condition)
        .map_err(EvalError::from)
        .and_then(|expression| eval(&expression))
        .and_then(|value| value.to_bool());

    match result {
        Ok(value) => value,
        Err(e) => {
            warn!(condition, "Could not evaluate condition: {e}");
            false
        }
    }
}

#[derive(Debug, thiserror::Error)]
enum EvalError {
    #[error("syntax error: {0}")]
    Syntax(String),
    #[error("unknown identifier `{0}`")]
    UnknownIdentifier(String),
    #[error("unsupported expression `{0}`")]
    Unsupported(String),
    #[error("invalid literal `{0}`")]
    InvalidLiteral(String),
    #[error("cannot apply `{operator}` to {left} and {right}")]
    TypeMismatch {
        operator: String,
        left: &'static str,
        right: &'static str,
    },
    #[error("division by zero")]
    DivisionByZero,
    #[error("arithmetic overflow")]
    Overflow,
    #[error("{0} is not a boolean")]
    NotABoolean(String),
}

impl From<CompilationError> for EvalError {
    fn from(e: CompilationError) -> Self {
        Self::Syntax(e.description)
    }
}

type EvalResult<T> = Result<T, EvalError>;

#[derive(Debug, Clone, PartialEq)]
enum Value {
    Int(i64),
    Real(f64),
    Str(String),
    Char(char),
    Bool(bool),
    Null,
}

impl Value {
    fn type_name(&self) -> &'static str {
        match self {
            Value::Int(_) => "int",
            Value::Real(_) => "real",
            Value::Str(_) => "string",
            Value::Char(_) => "char",
            Value::Bool(_) => "bool",
            Value::Null => "null",
        }
    }

    fn to_bool(&self) -> EvalResult<bool> {
        match self {
            Value::Bool(b) => Ok(*b),
            Value::Int(i) => Ok(*i != 0),
            Value::Real(r) => Ok(*r != 0.0),
            Value::Str(s) if s.eq_ignore_ascii_case("true") => Ok(true),
            Value::Str(s) if s.eq_ignore_ascii_case("false") => Ok(false),
            _ => Err(EvalError::NotABoolean(self.to_string())),
        }
    }

    /// Numeric view of the value. Chars promote to their code point.
    fn as_number(&self) -> Option<Number> {
        match self {
            Value::Int(i) => Some(Number::Int(*i)),
            Value::Real(r) => Some(Number::Real(*r)),
            Value::Char(c) => Some(Number::Int(*c as i64)),
            _ => None,
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Int(i) => write!(f, "{i}"),
            Value::Real(r) => write!(f, "{r}"),
            Value::Str(s) => write!(f, "{s}"),
            Value::Char(c) => write!(f, "{c}"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Null => write!(f, "null"),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Number {
    Int(i64),
    Real(f64),
}

impl Number {
    fn as_real(self) -> f64 {
        match self {
            Number::Int(i) => i as f64,
            Number::Real(r) => r,
        }
    }
}

fn eval(expression: &Expression) -> EvalResult<Value> {
    match &expression.kind {
        ExpressionKind::Number(n) => parse_number(n),
        ExpressionKind::Str(s) => parse_string(s).map(Value::Str),
        ExpressionKind::Char(c) => parse_char(c).map(Value::Char),
        ExpressionKind::Bool(b) => Ok(Value::Bool(*b)),
        ExpressionKind::Null => Ok(Value::Null),
        ExpressionKind::Identifier(name) => Err(EvalError::UnknownIdentifier(name.clone())),
        ExpressionKind::Parenthesized(inner) => eval(inner),
        ExpressionKind::Unary(unary) => {
            let operand = eval(&unary.operand)?;
            match (unary.operator, operand) {
                (UnaryOperator::Not, Value::Bool(b)) => Ok(Value::Bool(!b)),
                (UnaryOperator::Plus, value) if value.as_number().is_some() => Ok(value),
                (UnaryOperator::Negative, value) => match value.as_number() {
                    Some(Number::Int(i)) => i.checked_neg().map(Value::Int).ok_or(EvalError::Overflow),
                    Some(Number::Real(r)) => Ok(Value::Real(-r)),
                    None => Err(EvalError::TypeMismatch {
                        operator: unary.operator.to_string(),
                        left: value.type_name(),
                        right: "nothing",
                    }),
                },
                (operator, value) => Err(EvalError::TypeMismatch {
                    operator: operator.to_string(),
                    left: value.type_name(),
                    right: "nothing",
                }),
            }
        }
        ExpressionKind::Binary(binary) => eval_binary(binary),
        _ => Err(EvalError::Unsupported(expression.text().to_string())),
    }
}

fn eval_binary(binary: &BinaryExpression) -> EvalResult<Value> {
    let operator = binary.operator;

    // Logical operators short circuit.
    if matches!(operator, BinaryOperator::And | BinaryOperator::Or) {
        let left = eval(&binary.left)?;
        let Value::Bool(left) = left else {
            return Err(EvalError::NotABoolean(left.to_string()));
        };
        if (operator == BinaryOperator::And) != left {
            return Ok(Value::Bool(left));
        }
        let right = eval(&binary.right)?;
        return match right {
            Value::Bool(right) => Ok(Value::Bool(right)),
            _ => Err(EvalError::NotABoolean(right.to_string())),
        };
    }

    let left = eval(&binary.left)?;
    let right = eval(&binary.right)?;

    let mismatch = |left: &Value, right: &Value| EvalError::TypeMismatch {
        operator: operator.to_string(),
        left: left.type_name(),
        right: right.type_name(),
    };

    match operator {
        BinaryOperator::Add
        | BinaryOperator::Subtract
        | BinaryOperator::Multiply
        | BinaryOperator::Divide
        | BinaryOperator::Modulo => {
            if operator == BinaryOperator::Add {
                if let (Value::Str(l), r) | (r, Value::Str(l)) = (&left, &right) {
                    // Keep operand order when concatenating.
                    return Ok(Value::Str(match left {
                        Value::Str(_) => format!("{l}{r}"),
                        _ => format!("{r}{l}"),
                    }));
                }
            }
            match (left.as_number(), right.as_number()) {
                (Some(l), Some(r)) => arithmetic(operator, l, r),
                _ => Err(mismatch(&left, &right)),
            }
        }
        BinaryOperator::LessThan
        | BinaryOperator::LessThanOrEqual
        | BinaryOperator::LargerThan
        | BinaryOperator::LargerThanOrEqual => {
            let ordering = compare(&left, &right).ok_or_else(|| mismatch(&left, &right))?;
            let result = match operator {
                BinaryOperator::LessThan => ordering == Ordering::Less,
                BinaryOperator::LessThanOrEqual => ordering != Ordering::Greater,
                BinaryOperator::LargerThan => ordering == Ordering::Greater,
                _ => ordering != Ordering::Less,
            };
            Ok(Value::Bool(result))
        }
        BinaryOperator::Equals | BinaryOperator::NotEquals => {
            let equal = match (&left, &right) {
                (Value::Null, Value::Null) => true,
                (Value::Null, _) | (_, Value::Null) => false,
                (Value::Bool(l), Value::Bool(r)) => l == r,
                _ => compare(&left, &right).ok_or_else(|| mismatch(&left, &right))?
                    == Ordering::Equal,
            };
            Ok(Value::Bool(equal == (operator == BinaryOperator::Equals)))
        }
        _ => Err(EvalError::Unsupported(operator.to_string())),
    }
}

fn arithmetic(operator: BinaryOperator, left: Number, right: Number) -> EvalResult<Value> {
    if let (Number::Int(l), Number::Int(r)) = (left, right) {
        let result = match operator {
            BinaryOperator::Add => l.checked_add(r),
            BinaryOperator::Subtract => l.checked_sub(r),
            BinaryOperator::Multiply => l.checked_mul(r),
            BinaryOperator::Divide | BinaryOperator::Modulo if r == 0 => {
                return Err(EvalError::DivisionByZero)
            }
            BinaryOperator::Divide => l.checked_div(r),
            _ => l.checked_rem(r),
        };
        return result.map(Value::Int).ok_or(EvalError::Overflow);
    }

    let (l, r) = (left.as_real(), right.as_real());
    let result = match operator {
        BinaryOperator::Add => l + r,
        BinaryOperator::Subtract => l - r,
        BinaryOperator::Multiply => l * r,
        _ if r == 0.0 => return Err(EvalError::DivisionByZero),
        BinaryOperator::Divide => l / r,
        _ => l % r,
    };
    Ok(Value::Real(result))
}

fn compare(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Str(l), Value::Str(r)) => Some(l.cmp(r)),
        _ => match (left.as_number()?, right.as_number()?) {
            (Number::Int(l), Number::Int(r)) => Some(l.cmp(&r)),
            (l, r) => l.as_real().partial_cmp(&r.as_real()),
        },
    }
}

/// Parse a numeric literal, like `5`, `0x1F`, `1_000L` or `2.5f`.
fn parse_number(literal: &str) -> EvalResult<Value> {
    let invalid = || EvalError::InvalidLiteral(literal.to_string());
    let text = literal.replace('_', "").to_ascii_lowercase();

    if let Some(hex) = text.strip_prefix("0x") {
        let digits = hex.trim_end_matches(['u', 'l']);
        return i64::from_str_radix(digits, 16)
            .map(Value::Int)
            .map_err(|_| invalid());
    }
    if let Some(bin) = text.strip_prefix("0b") {
        let digits = bin.trim_end_matches(['u', 'l']);
        return i64::from_str_radix(digits, 2)
            .map(Value::Int)
            .map_err(|_| invalid());
    }

    let is_real = text.contains(['.', 'e']) || text.ends_with(['f', 'd', 'm']);
    if is_real {
        let digits = text.trim_end_matches(['f', 'd', 'm']);
        return digits.parse().map(Value::Real).map_err(|_| invalid());
    }

    let digits = text.trim_end_matches(['u', 'l']);
    digits.parse().map(Value::Int).map_err(|_| invalid())
}

/// Decode a string literal. Interpolation holes are kept as written.
fn parse_string(literal: &str) -> EvalResult<String> {
    let invalid = || EvalError::InvalidLiteral(literal.to_string());
    let prefix_len = literal.find('"').ok_or_else(invalid)?;
    let prefix = &literal[..prefix_len];
    let body = literal[prefix_len..]
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .ok_or_else(invalid)?;

    if prefix.contains('@') {
        return Ok(body.replace("\"\"", "\""));
    }
    if body.starts_with('"') {
        // Raw string literal
        return Ok(body.trim_matches('"').to_string());
    }
    unescape(body).ok_or_else(invalid)
}

fn parse_char(literal: &str) -> EvalResult<char> {
    let invalid = || EvalError::InvalidLiteral(literal.to_string());
    let body = literal
        .strip_prefix('\'')
        .and_then(|s| s.strip_suffix('\''))
        .ok_or_else(invalid)?;
    let decoded = unescape(body).ok_or_else(invalid)?;
    let mut chars = decoded.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Ok(c),
        _ => Err(invalid()),
    }
}

fn unescape(body: &str) -> Option<String> {
    let mut result = String::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            result.push(c);
            continue;
        }
        let escaped = match chars.next()? {
            'n' => '\n',
            't' => '\t',
            'r' => '\r',
            '0' => '\0',
            'a' => '\u{07}',
            'b' => '\u{08}',
            'f' => '\u{0C}',
            'v' => '\u{0B}',
            'u' => {
                let code: String = chars.by_ref().take(4).collect();
                char::from_u32(u32::from_str_radix(&code, 16).ok()?)?
            }
            other => other,
        };
        result.push(escaped);
    }
    Some(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn binary(text: &str) -> i32 {
        let expression = Parser::parse_expression_text(text).unwrap();
        let ExpressionKind::Binary(binary) = &expression.kind else {
            panic!("`{text}` is not a binary expression");
        };
        evaluate_binary(binary)
    }

    #[test]
    fn binary_arithmetic() {
        assert_eq!(binary("4 + 3"), 7);
        assert_eq!(binary("4 - 10"), -6);
        assert_eq!(binary("6 * 7"), 42);
        assert_eq!(binary("7 / 2"), 3);
        assert_eq!(binary("7 % 4"), 3);
        assert_eq!(binary("-3 * 2"), -6);
    }

    #[test]
    fn binary_division_by_zero() {
        assert_eq!(binary("5 / 0"), 0);
        assert_eq!(binary("5 % 0"), 0);
    }

    #[test]
    fn binary_non_literal_operands() {
        assert_eq!(binary("x + 3"), 0);
        assert_eq!(binary("2.5 + 1"), 0);
        assert_eq!(binary("(1 + 2) * 3"), 0);
        assert_eq!(binary("\"a\" + 1"), 0);
    }

    #[test]
    fn binary_other_operators() {
        assert_eq!(binary("1 < 2"), 0);
        assert_eq!(binary("1 == 1"), 0);
        assert_eq!(binary("1 << 2"), 0);
        assert_eq!(binary("8 >> 1"), 0);
    }

    #[test]
    fn binary_wraps_on_overflow() {
        assert_eq!(binary("2147483647 + 1"), i32::MIN);
    }

    #[test]
    fn conditions() {
        assert!(evaluate_condition("7 > 5"));
        assert!(!evaluate_condition("3 > 5"));
        assert!(evaluate_condition("(1 + 2) * 3 == 9"));
        assert!(evaluate_condition("7 > 5 && !(2 >= 3)"));
        assert!(evaluate_condition("false || 1 != 2"));
        assert!(evaluate_condition("\"abc\" == \"abc\""));
        assert!(evaluate_condition("\"a\" < \"b\""));
        assert!(evaluate_condition("'a' == 'a'"));
        assert!(evaluate_condition("2.5 > 2"));
        assert!(evaluate_condition("10 / 4 == 2"));
        assert!(evaluate_condition("\"a\" + 1 == \"a1\""));
        assert!(evaluate_condition("null == null"));
        assert!(evaluate_condition("1"));
        assert!(!evaluate_condition("0"));
        assert!(evaluate_condition("\"True\""));
    }

    #[test]
    fn short_circuit_skips_errors() {
        assert!(!evaluate_condition("false && unknown"));
        assert!(evaluate_condition("true || 1 / 0 == 1"));
    }

    #[test]
    fn malformed_conditions_are_false() {
        assert!(!evaluate_condition(""));
        assert!(!evaluate_condition("x > 5"));
        assert!(!evaluate_condition("7 >"));
        assert!(!evaluate_condition("1 / 0 == 1"));
        assert!(!evaluate_condition("\"a\" > 1"));
        assert!(!evaluate_condition("Foo(1)"));
        assert!(!evaluate_condition("\"maybe\""));
        assert!(!evaluate_condition("7 > 5)"));
        assert!(!evaluate_condition("\"unterminated"));
        assert!(!evaluate_condition("1 << 2 == 4"));
    }

    #[test]
    fn literals() {
        assert_eq!(parse_number("0x1F").unwrap(), Value::Int(31));
        assert_eq!(parse_number("1_000L").unwrap(), Value::Int(1000));
        assert_eq!(parse_number("2.5f").unwrap(), Value::Real(2.5));
        assert_eq!(parse_string("\"a\\tb\"").unwrap(), "a\tb");
        assert_eq!(parse_string("@\"c:\\x\"\"\"").unwrap(), "c:\\x\"");
        assert_eq!(parse_char("'\\n'").unwrap(), '\n');
    }
}
