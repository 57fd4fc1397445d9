//! The lexer module converts the raw text into tokens.

use std::fmt::Display;
use std::rc::Rc;

use crate::text::{SourceText, TextSpan};

/// Kinds of lexer tokens.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    /// Numeric literal, as written (`42`, `0xFF`, `1.5f`).
    Number(String),
    Word(String),
    /// String literal including its quotes and any `$`/`@` prefix.
    StringLiteral(String),
    /// Character literal including its quotes.
    CharLiteral(String),
    Plus,
    PlusPlus,
    PlusEquals,
    Minus,
    MinusMinus,
    MinusEquals,
    Asterisk,
    AsteriskEquals,
    Slash,
    SlashEquals,
    Percent,
    PercentEquals,
    LeftParen,
    RightParen,
    LeftSquare,
    RightSquare,
    LeftCurly,
    RightCurly,
    Equals,
    DoubleEquals,
    FatArrow,
    Bang,
    BangEquals,
    LargerThan,
    LargerThanEquals,
    LessThan,
    LessThanEquals,
    Ampersand,
    DoubleAmpersand,
    AmpersandEquals,
    Bar,
    DoubleBar,
    BarEquals,
    Caret,
    CaretEquals,
    Tilde,
    QuestionMark,
    DoubleQuestionMark,
    DoubleQuestionMarkEquals,
    QuestionMarkPeriod,
    Comma,
    Period,
    Colon,
    DoubleColon,
    Semicolon,
    RightArrow,
    Whitespace,
    Bad,
    End,
}

impl TokenKind {
    /// Check if the token is a word equal to `word`.
    pub fn is_word(&self, word: &str) -> bool {
        matches!(self, TokenKind::Word(w) if w == word)
    }
}

impl Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let string_rep = match self {
            TokenKind::Number(_) => "number",
            TokenKind::Word(_) => "word",
            TokenKind::StringLiteral(_) => "string literal",
            TokenKind::CharLiteral(_) => "char literal",
            TokenKind::Plus => "+",
            TokenKind::PlusPlus => "++",
            TokenKind::PlusEquals => "+=",
            TokenKind::Minus => "-",
            TokenKind::MinusMinus => "--",
            TokenKind::MinusEquals => "-=",
            TokenKind::Asterisk => "*",
            TokenKind::AsteriskEquals => "*=",
            TokenKind::Slash => "/",
            TokenKind::SlashEquals => "/=",
            TokenKind::Percent => "%",
            TokenKind::PercentEquals => "%=",
            TokenKind::LeftParen => "(",
            TokenKind::RightParen => ")",
            TokenKind::LeftSquare => "[",
            TokenKind::RightSquare => "]",
            TokenKind::LeftCurly => "{",
            TokenKind::RightCurly => "}",
            TokenKind::Equals => "=",
            TokenKind::DoubleEquals => "==",
            TokenKind::FatArrow => "=>",
            TokenKind::Bang => "!",
            TokenKind::BangEquals => "!=",
            TokenKind::LargerThan => ">",
            TokenKind::LargerThanEquals => ">=",
            TokenKind::LessThan => "<",
            TokenKind::LessThanEquals => "<=",
            TokenKind::Ampersand => "&",
            TokenKind::DoubleAmpersand => "&&",
            TokenKind::AmpersandEquals => "&=",
            TokenKind::Bar => "|",
            TokenKind::DoubleBar => "||",
            TokenKind::BarEquals => "|=",
            TokenKind::Caret => "^",
            TokenKind::CaretEquals => "^=",
            TokenKind::Tilde => "~",
            TokenKind::QuestionMark => "?",
            TokenKind::DoubleQuestionMark => "??",
            TokenKind::DoubleQuestionMarkEquals => "??=",
            TokenKind::QuestionMarkPeriod => "?.",
            TokenKind::Comma => ",",
            TokenKind::Period => ".",
            TokenKind::Colon => ":",
            TokenKind::DoubleColon => "::",
            TokenKind::Semicolon => ";",
            TokenKind::RightArrow => "->",
            TokenKind::Whitespace => "whitespace",
            TokenKind::Bad => "bad-token",
            TokenKind::End => "end-of-file",
        };
        write!(f, "{}", string_rep)
    }
}

/// A lexer token.
#[derive(Debug, Clone)]
pub struct Token {
    pub kind: TokenKind,
    pub span: TextSpan,
}

impl Token {
    fn new(kind: TokenKind, span: TextSpan) -> Self {
        Self { kind, span }
    }

    pub fn is_end(&self) -> bool {
        self.kind == TokenKind::End
    }
}

/// The lexer. Tokens can be extracting by iterating over it.
/// ```ignore
/// let lexer = Lexer::from_source(text);
/// for token in lexer {
///     /* do something */
/// }
/// ```
pub struct Lexer {
    source: Rc<SourceText>,
    chars: Vec<(usize, char)>,
    cursor: usize,
    placed_end_token: bool,
}

impl Lexer {
    /// Instantiate a [Lexer] over a [SourceText].
    pub fn from_source(source: Rc<SourceText>) -> Self {
        let chars = source.text().char_indices().collect();
        Lexer {
            source,
            chars,
            cursor: 0,
            placed_end_token: false,
        }
    }

    fn peak(&self, offset: usize) -> Option<char> {
        self.chars.get(self.cursor + offset).map(|(_, c)| *c)
    }

    fn current(&self) -> Option<char> {
        self.peak(0)
    }

    fn consume(&mut self) -> Option<char> {
        let c = self.current();
        self.cursor += 1;
        c
    }

    fn consume_if(&mut self, c: char) -> bool {
        if self.current() == Some(c) {
            self.cursor += 1;
            true
        } else {
            false
        }
    }

    /// Byte offset of the char at `index`.
    fn byte_offset(&self, index: usize) -> usize {
        match self.chars.get(index) {
            Some((offset, _)) => *offset,
            None => self.source.text().len(),
        }
    }

    fn text_from(&self, start: usize) -> String {
        let start = self.byte_offset(start);
        let end = self.byte_offset(self.cursor);
        self.source.text()[start..end].to_string()
    }

    fn is_word_start(c: char) -> bool {
        c.is_alphabetic() || c == '_'
    }

    fn is_word_char(c: char) -> bool {
        c.is_alphanumeric() || c == '_'
    }

    fn consume_while<F>(&mut self, pred: F)
    where
        F: Fn(char) -> bool,
    {
        while let Some(c) = self.current() {
            if !pred(c) {
                break;
            }
            self.cursor += 1;
        }
    }

    fn consume_number(&mut self) {
        if self.current() == Some('0') && matches!(self.peak(1), Some('x' | 'X' | 'b' | 'B')) {
            self.cursor += 2;
            self.consume_while(|c| c.is_ascii_hexdigit() || c == '_');
        } else {
            self.consume_while(|c| c.is_ascii_digit() || c == '_');
            if self.current() == Some('.') && self.peak(1).is_some_and(|c| c.is_ascii_digit()) {
                self.cursor += 1;
                self.consume_while(|c| c.is_ascii_digit() || c == '_');
            }
            if matches!(self.current(), Some('e' | 'E')) {
                let sign = usize::from(matches!(self.peak(1), Some('+' | '-')));
                if self.peak(1 + sign).is_some_and(|c| c.is_ascii_digit()) {
                    self.cursor += 1 + sign;
                    self.consume_while(|c| c.is_ascii_digit());
                }
            }
        }
        // Type suffixes
        self.consume_while(|c| matches!(c, 'u' | 'U' | 'l' | 'L' | 'f' | 'F' | 'd' | 'D' | 'm' | 'M'));
    }

    fn consume_comment(&mut self) {
        while let Some(c) = self.consume() {
            if c == '\n' {
                break;
            }
        }
    }

    /// Consume a `/* */` comment. The opening `/*` is already consumed.
    fn consume_block_comment(&mut self) {
        while let Some(c) = self.consume() {
            if c == '*' && self.consume_if('/') {
                break;
            }
        }
    }

    /// Consume the body of a string literal. The opening quote is already consumed. Returns
    /// `false` if the literal is never closed.
    fn consume_string_body(&mut self, verbatim: bool, interpolated: bool) -> bool {
        loop {
            match self.current() {
                None => return false,
                Some('"') => {
                    self.cursor += 1;
                    if verbatim && self.consume_if('"') {
                        continue;
                    }
                    return true;
                }
                Some('\\') if !verbatim => self.cursor += 2,
                Some('\n') if !verbatim => return false,
                Some('{') if interpolated => {
                    self.cursor += 1;
                    if !self.consume_if('{') && !self.consume_interpolation_hole() {
                        return false;
                    }
                }
                Some(_) => self.cursor += 1,
            }
        }
    }

    /// Consume an interpolation hole up to and including its closing `}`.
    fn consume_interpolation_hole(&mut self) -> bool {
        let mut depth = 1;
        while depth > 0 {
            match self.consume() {
                None => return false,
                Some('{') => depth += 1,
                Some('}') => depth -= 1,
                Some('"') => {
                    if !self.consume_string_body(false, false) {
                        return false;
                    }
                }
                Some('$') if self.current() == Some('"') => {
                    self.cursor += 1;
                    if !self.consume_string_body(false, true) {
                        return false;
                    }
                }
                Some(_) => {}
            }
        }
        true
    }

    /// Consume a raw string literal (`"""..."""`). The first quote is current.
    fn consume_raw_string(&mut self, interpolated: bool) -> bool {
        let mut quotes = 0;
        while self.consume_if('"') {
            quotes += 1;
        }
        loop {
            match self.current() {
                None => return false,
                Some('"') => {
                    let mut closing = 0;
                    while closing < quotes && self.consume_if('"') {
                        closing += 1;
                    }
                    if closing == quotes {
                        return true;
                    }
                }
                Some('{') if interpolated => {
                    self.cursor += 1;
                    if !self.consume_if('{') && !self.consume_interpolation_hole() {
                        return false;
                    }
                }
                Some(_) => self.cursor += 1,
            }
        }
    }

    /// Lex a string literal starting at the current char, including `$` and `@` prefixes.
    fn consume_string(&mut self) -> bool {
        let mut verbatim = false;
        let mut interpolated = false;
        loop {
            match self.current() {
                Some('@') => verbatim = true,
                Some('$') => interpolated = true,
                _ => break,
            }
            self.cursor += 1;
        }
        if self.current() == Some('"') && self.peak(1) == Some('"') && self.peak(2) == Some('"') {
            return self.consume_raw_string(interpolated);
        }
        self.cursor += 1; // Consume opening quote
        self.consume_string_body(verbatim, interpolated)
    }

    fn consume_char_literal(&mut self) -> bool {
        self.cursor += 1; // Consume opening quote
        loop {
            match self.consume() {
                None | Some('\n') => return false,
                Some('\\') => self.cursor += 1,
                Some('\'') => return true,
                Some(_) => {}
            }
        }
    }

    fn is_string_start(&self) -> bool {
        match (self.current(), self.peak(1), self.peak(2)) {
            (Some('"'), _, _) => true,
            (Some('@' | '$'), Some('"'), _) => true,
            (Some('@'), Some('$'), Some('"')) | (Some('$'), Some('@'), Some('"')) => true,
            (Some('$'), Some('$'), _) => true,
            _ => false,
        }
    }

    // Lexes punktuation. Returns `None` if the punktuation is a comment.
    fn consume_punctuation(&mut self) -> Option<TokenKind> {
        let kind = match self.consume() {
            Some('+') => match self.current() {
                Some('=') => {
                    self.consume();
                    TokenKind::PlusEquals
                }
                Some('+') => {
                    self.consume();
                    TokenKind::PlusPlus
                }
                _ => TokenKind::Plus,
            },
            Some('-') => match self.current() {
                Some('=') => {
                    self.consume();
                    TokenKind::MinusEquals
                }
                Some('-') => {
                    self.consume();
                    TokenKind::MinusMinus
                }
                Some('>') => {
                    self.consume();
                    TokenKind::RightArrow
                }
                _ => TokenKind::Minus,
            },
            Some('*') => match self.consume_if('=') {
                true => TokenKind::AsteriskEquals,
                false => TokenKind::Asterisk,
            },
            Some('/') => match self.current() {
                Some('=') => {
                    self.consume();
                    TokenKind::SlashEquals
                }
                Some('/') => {
                    self.consume_comment();
                    return None;
                }
                Some('*') => {
                    self.consume();
                    self.consume_block_comment();
                    return None;
                }
                _ => TokenKind::Slash,
            },
            Some('%') => match self.consume_if('=') {
                true => TokenKind::PercentEquals,
                false => TokenKind::Percent,
            },
            Some('(') => TokenKind::LeftParen,
            Some(')') => TokenKind::RightParen,
            Some('[') => TokenKind::LeftSquare,
            Some(']') => TokenKind::RightSquare,
            Some('{') => TokenKind::LeftCurly,
            Some('}') => TokenKind::RightCurly,
            Some('=') => match self.current() {
                Some('=') => {
                    self.consume();
                    TokenKind::DoubleEquals
                }
                Some('>') => {
                    self.consume();
                    TokenKind::FatArrow
                }
                _ => TokenKind::Equals,
            },
            Some('!') => match self.consume_if('=') {
                true => TokenKind::BangEquals,
                false => TokenKind::Bang,
            },
            // `>>` is never merged, so nested generic arguments close correctly.
            Some('>') => match self.consume_if('=') {
                true => TokenKind::LargerThanEquals,
                false => TokenKind::LargerThan,
            },
            Some('<') => match self.consume_if('=') {
                true => TokenKind::LessThanEquals,
                false => TokenKind::LessThan,
            },
            Some('&') => match self.current() {
                Some('&') => {
                    self.consume();
                    TokenKind::DoubleAmpersand
                }
                Some('=') => {
                    self.consume();
                    TokenKind::AmpersandEquals
                }
                _ => TokenKind::Ampersand,
            },
            Some('|') => match self.current() {
                Some('|') => {
                    self.consume();
                    TokenKind::DoubleBar
                }
                Some('=') => {
                    self.consume();
                    TokenKind::BarEquals
                }
                _ => TokenKind::Bar,
            },
            Some('^') => match self.consume_if('=') {
                true => TokenKind::CaretEquals,
                false => TokenKind::Caret,
            },
            Some('~') => TokenKind::Tilde,
            Some('?') => match self.current() {
                Some('?') => {
                    self.consume();
                    match self.consume_if('=') {
                        true => TokenKind::DoubleQuestionMarkEquals,
                        false => TokenKind::DoubleQuestionMark,
                    }
                }
                Some('.') if !self.peak(1).is_some_and(|c| c.is_ascii_digit()) => {
                    self.consume();
                    TokenKind::QuestionMarkPeriod
                }
                _ => TokenKind::QuestionMark,
            },
            Some(',') => TokenKind::Comma,
            Some('.') => TokenKind::Period,
            Some(':') => match self.consume_if(':') {
                true => TokenKind::DoubleColon,
                false => TokenKind::Colon,
            },
            Some(';') => TokenKind::Semicolon,
            _ => TokenKind::Bad,
        };
        Some(kind)
    }

    /// Check whether the cursor sits on the first non-whitespace char of a line.
    fn at_line_start(&self) -> bool {
        let mut i = self.cursor;
        while i > 0 {
            i -= 1;
            match self.chars[i].1 {
                '\n' => return true,
                c if c.is_whitespace() => {}
                _ => return false,
            }
        }
        true
    }
}

impl Iterator for Lexer {
    type Item = Token;
    fn next(&mut self) -> Option<Self::Item> {
        let start = self.cursor;

        let current_char = if let Some(c) = self.current() {
            c
        } else if !self.placed_end_token {
            self.placed_end_token = true;
            let pos = self.source.text().len();
            return Some(Token::new(
                TokenKind::End,
                TextSpan::new(pos, pos, self.source.clone()),
            ));
        } else {
            return None;
        };

        let kind = if current_char.is_ascii_digit() {
            self.consume_number();
            TokenKind::Number(self.text_from(start))
        } else if current_char.is_whitespace() {
            self.consume_while(char::is_whitespace);
            TokenKind::Whitespace
        } else if self.is_string_start() {
            match self.consume_string() {
                true => TokenKind::StringLiteral(self.text_from(start)),
                false => TokenKind::Bad,
            }
        } else if current_char == '\'' {
            match self.consume_char_literal() {
                true => TokenKind::CharLiteral(self.text_from(start)),
                false => TokenKind::Bad,
            }
        } else if current_char == '#' && self.at_line_start() {
            // Preprocessor directives are ignored
            self.consume_comment();
            return self.next();
        } else if Self::is_word_start(current_char)
            || (current_char == '@' && self.peak(1).is_some_and(Self::is_word_start))
        {
            self.consume_if('@');
            let word_start = self.cursor;
            self.consume_while(Self::is_word_char);
            TokenKind::Word(self.text_from(word_start))
        } else {
            match self.consume_punctuation() {
                Some(kind) => kind,
                None => return self.next(), // Ignore and get next if punktuation was a comment
            }
        };

        let span = TextSpan::new(
            self.byte_offset(start),
            self.byte_offset(self.cursor),
            self.source.clone(),
        );
        Some(Token::new(kind, span))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn lex(code: &str) -> Vec<TokenKind> {
        let text = Rc::new(SourceText::from_str(code));
        Lexer::from_source(text)
            .map(|t| t.kind)
            .filter(|k| k != &TokenKind::Whitespace)
            .collect()
    }

    fn word(w: &str) -> TokenKind {
        TokenKind::Word(w.to_string())
    }

    #[test]
    fn lex_declaration() {
        let expected_tokens = vec![
            word("int"),
            word("x"),
            TokenKind::Equals,
            TokenKind::Number("4".to_string()),
            TokenKind::Plus,
            TokenKind::Number("3".to_string()),
            TokenKind::Semicolon,
            TokenKind::End,
        ];
        assert_eq!(lex("int x = 4 + 3;"), expected_tokens);
    }

    #[test]
    fn lex_2_char_operators() {
        let expected_tokens = vec![
            TokenKind::DoubleEquals,
            TokenKind::FatArrow,
            TokenKind::RightArrow,
            TokenKind::PlusEquals,
            TokenKind::MinusEquals,
            TokenKind::AsteriskEquals,
            TokenKind::SlashEquals,
            TokenKind::DoubleAmpersand,
            TokenKind::DoubleBar,
            TokenKind::BangEquals,
            TokenKind::LessThanEquals,
            TokenKind::PlusPlus,
            TokenKind::End,
        ];
        assert_eq!(lex("===>->+=-=*=/=&&||!=<=++"), expected_tokens);
    }

    #[test]
    fn lex_string_literals() {
        let tokens = lex(r#"Hix($"Hello {message}!", @"C:\tmp", "a\"b")"#);
        assert_eq!(
            tokens,
            vec![
                word("Hix"),
                TokenKind::LeftParen,
                TokenKind::StringLiteral(r#"$"Hello {message}!""#.to_string()),
                TokenKind::Comma,
                TokenKind::StringLiteral(r#"@"C:\tmp""#.to_string()),
                TokenKind::Comma,
                TokenKind::StringLiteral(r#""a\"b""#.to_string()),
                TokenKind::RightParen,
                TokenKind::End,
            ]
        );
    }

    #[test]
    fn lex_interpolation_with_nested_string() {
        let tokens = lex(r#"$"{(ok ? "yes" : "no")} done""#);
        assert_eq!(
            tokens,
            vec![
                TokenKind::StringLiteral(r#"$"{(ok ? "yes" : "no")} done""#.to_string()),
                TokenKind::End,
            ]
        );
    }

    #[test]
    fn skip_comments_and_directives() {
        let code = "#region Setup\n// line comment\nFoo(); /* block\n comment */ Bar();\n#endregion";
        assert_eq!(
            lex(code),
            vec![
                word("Foo"),
                TokenKind::LeftParen,
                TokenKind::RightParen,
                TokenKind::Semicolon,
                word("Bar"),
                TokenKind::LeftParen,
                TokenKind::RightParen,
                TokenKind::Semicolon,
                TokenKind::End,
            ]
        );
    }

    #[test]
    fn lex_numbers_and_chars() {
        assert_eq!(
            lex("1.5f 0xFF 10L 'a' '\\n' 1.ToString"),
            vec![
                TokenKind::Number("1.5f".to_string()),
                TokenKind::Number("0xFF".to_string()),
                TokenKind::Number("10L".to_string()),
                TokenKind::CharLiteral("'a'".to_string()),
                TokenKind::CharLiteral("'\\n'".to_string()),
                TokenKind::Number("1".to_string()),
                TokenKind::Period,
                word("ToString"),
                TokenKind::End,
            ]
        );
    }

    #[test]
    fn unterminated_string_is_bad() {
        assert_eq!(lex("\"open\nx"), vec![TokenKind::Bad, word("x"), TokenKind::End]);
    }

    #[test]
    fn spans_are_byte_offsets() {
        let text = Rc::new(SourceText::from_str("ø = \"æ\";"));
        let tokens: Vec<Token> = Lexer::from_source(text).collect();
        assert_eq!(tokens[0].span.text(), "ø");
        assert_eq!(tokens[4].span.text(), "\"æ\"");
    }
}
