//! Lexer: tokenizes rule conditions.
//!
//! Natural-language conditions usually fail here already (apostrophes open
//! unterminated strings, punctuation is rejected), which routes them to the
//! oracle without ever reaching the interpreter.

use super::EvalError;

/// A token produced by the lexer
#[derive(Clone, Debug, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    /// Byte offset into the condition
    pub pos: usize,
}

/// Token types
#[derive(Clone, Debug, PartialEq)]
pub enum TokenKind {
    // Literals and names
    Number(f64),
    Str(String),
    Ident(String),
    True,
    False,
    Null,

    // Keywords
    And,
    Or,
    Not,
    In,

    // Structural
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Dot,

    // Operators
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,

    Eof,
}

impl std::fmt::Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Number(n) => write!(f, "number {}", n),
            Self::Str(s) => write!(f, "string '{}'", s),
            Self::Ident(name) => write!(f, "identifier '{}'", name),
            Self::True => write!(f, "True"),
            Self::False => write!(f, "False"),
            Self::Null => write!(f, "None"),
            Self::And => write!(f, "and"),
            Self::Or => write!(f, "or"),
            Self::Not => write!(f, "not"),
            Self::In => write!(f, "in"),
            Self::LParen => write!(f, "("),
            Self::RParen => write!(f, ")"),
            Self::LBracket => write!(f, "["),
            Self::RBracket => write!(f, "]"),
            Self::Comma => write!(f, ","),
            Self::Dot => write!(f, "."),
            Self::Plus => write!(f, "+"),
            Self::Minus => write!(f, "-"),
            Self::Star => write!(f, "*"),
            Self::Slash => write!(f, "/"),
            Self::Percent => write!(f, "%"),
            Self::Eq => write!(f, "=="),
            Self::Ne => write!(f, "!="),
            Self::Lt => write!(f, "<"),
            Self::Le => write!(f, "<="),
            Self::Gt => write!(f, ">"),
            Self::Ge => write!(f, ">="),
            Self::Eof => write!(f, "end of input"),
        }
    }
}

/// Lexer for rule conditions
pub struct Lexer<'a> {
    input: &'a str,
    chars: Vec<(usize, char)>,
    pos: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            chars: input.char_indices().collect(),
            pos: 0,
        }
    }

    /// Tokenize the entire input
    pub fn tokenize(mut self) -> Result<Vec<Token>, EvalError> {
        let mut tokens = Vec::new();

        loop {
            self.skip_whitespace();

            if self.pos >= self.chars.len() {
                tokens.push(Token {
                    kind: TokenKind::Eof,
                    pos: self.input.len(),
                });
                break;
            }

            tokens.push(self.next_token()?);
        }

        Ok(tokens)
    }

    fn next_token(&mut self) -> Result<Token, EvalError> {
        let (offset, ch) = self.chars[self.pos];
        let simple = |kind: TokenKind, width: usize, lexer: &mut Self| -> Result<Token, EvalError> {
            lexer.pos += width;
            Ok(Token { kind, pos: offset })
        };

        match ch {
            '(' => simple(TokenKind::LParen, 1, self),
            ')' => simple(TokenKind::RParen, 1, self),
            '[' => simple(TokenKind::LBracket, 1, self),
            ']' => simple(TokenKind::RBracket, 1, self),
            ',' => simple(TokenKind::Comma, 1, self),
            '+' => simple(TokenKind::Plus, 1, self),
            '-' => simple(TokenKind::Minus, 1, self),
            '*' => simple(TokenKind::Star, 1, self),
            '/' => simple(TokenKind::Slash, 1, self),
            '%' => simple(TokenKind::Percent, 1, self),
            '=' if self.peek_at(1) == Some('=') => simple(TokenKind::Eq, 2, self),
            '!' if self.peek_at(1) == Some('=') => simple(TokenKind::Ne, 2, self),
            '!' => simple(TokenKind::Not, 1, self),
            '<' if self.peek_at(1) == Some('=') => simple(TokenKind::Le, 2, self),
            '<' => simple(TokenKind::Lt, 1, self),
            '>' if self.peek_at(1) == Some('=') => simple(TokenKind::Ge, 2, self),
            '>' => simple(TokenKind::Gt, 1, self),
            '&' if self.peek_at(1) == Some('&') => simple(TokenKind::And, 2, self),
            '|' if self.peek_at(1) == Some('|') => simple(TokenKind::Or, 2, self),
            '.' if self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) => self.read_number(),
            '.' => simple(TokenKind::Dot, 1, self),
            '"' | '\'' => self.read_string(ch),
            c if c.is_ascii_digit() => self.read_number(),
            c if c.is_alphabetic() || c == '_' => Ok(self.read_identifier_or_keyword()),
            _ => Err(EvalError::Syntax {
                pos: offset,
                message: format!("unexpected character '{}'", ch),
            }),
        }
    }

    fn read_string(&mut self, quote: char) -> Result<Token, EvalError> {
        let start = self.offset();
        self.pos += 1; // opening quote

        let mut text = String::new();
        while let Some(ch) = self.peek_at(0) {
            self.pos += 1;
            match ch {
                c if c == quote => {
                    return Ok(Token {
                        kind: TokenKind::Str(text),
                        pos: start,
                    });
                }
                '\\' => {
                    let escaped = self.peek_at(0).ok_or_else(|| EvalError::Syntax {
                        pos: start,
                        message: "unterminated string literal".into(),
                    })?;
                    self.pos += 1;
                    text.push(match escaped {
                        'n' => '\n',
                        't' => '\t',
                        'r' => '\r',
                        other => other,
                    });
                }
                c => text.push(c),
            }
        }

        Err(EvalError::Syntax {
            pos: start,
            message: "unterminated string literal".into(),
        })
    }

    fn read_number(&mut self) -> Result<Token, EvalError> {
        let start = self.offset();
        let mut text = String::new();
        let mut seen_dot = false;
        let mut seen_exp = false;

        while let Some(ch) = self.peek_at(0) {
            match ch {
                '0'..='9' => text.push(ch),
                '_' => {}
                '.' if !seen_dot && !seen_exp => {
                    seen_dot = true;
                    text.push(ch);
                }
                'e' | 'E' if !seen_exp => {
                    seen_exp = true;
                    text.push(ch);
                    if let Some(sign @ ('+' | '-')) = self.peek_at(1) {
                        self.pos += 1;
                        text.push(sign);
                    }
                }
                _ => break,
            }
            self.pos += 1;
        }

        let value = text.parse::<f64>().map_err(|_| EvalError::Syntax {
            pos: start,
            message: format!("invalid number '{}'", text),
        })?;

        Ok(Token {
            kind: TokenKind::Number(value),
            pos: start,
        })
    }

    fn read_identifier_or_keyword(&mut self) -> Token {
        let start = self.offset();
        let mut text = String::new();

        while let Some(ch) = self.peek_at(0) {
            if ch.is_alphanumeric() || ch == '_' {
                text.push(ch);
                self.pos += 1;
            } else {
                break;
            }
        }

        let kind = match text.as_str() {
            "and" => TokenKind::And,
            "or" => TokenKind::Or,
            "not" => TokenKind::Not,
            "in" => TokenKind::In,
            "True" | "true" => TokenKind::True,
            "False" | "false" => TokenKind::False,
            "None" | "null" => TokenKind::Null,
            _ => TokenKind::Ident(text),
        };

        Token { kind, pos: start }
    }

    fn skip_whitespace(&mut self) {
        while self.peek_at(0).is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
    }

    fn peek_at(&self, ahead: usize) -> Option<char> {
        self.chars.get(self.pos + ahead).map(|(_, c)| *c)
    }

    fn offset(&self) -> usize {
        self.chars
            .get(self.pos)
            .map(|(offset, _)| *offset)
            .unwrap_or(self.input.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<TokenKind> {
        Lexer::new(input)
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn test_subscript_comparison() {
        assert_eq!(
            kinds("transaction['amount'] >= 1_000.5"),
            vec![
                TokenKind::Ident("transaction".into()),
                TokenKind::LBracket,
                TokenKind::Str("amount".into()),
                TokenKind::RBracket,
                TokenKind::Ge,
                TokenKind::Number(1000.5),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_symbolic_boolean_operators() {
        assert_eq!(
            kinds("!a && b || c != d"),
            vec![
                TokenKind::Not,
                TokenKind::Ident("a".into()),
                TokenKind::And,
                TokenKind::Ident("b".into()),
                TokenKind::Or,
                TokenKind::Ident("c".into()),
                TokenKind::Ne,
                TokenKind::Ident("d".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_string_escapes() {
        assert_eq!(
            kinds(r#""say \"hi\"" 'it\'s'"#),
            vec![
                TokenKind::Str("say \"hi\"".into()),
                TokenKind::Str("it's".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_exponent_numbers() {
        assert_eq!(kinds("1e3 2.5E-1"), vec![
            TokenKind::Number(1000.0),
            TokenKind::Number(0.25),
            TokenKind::Eof,
        ]);
    }

    #[test]
    fn test_apostrophe_in_prose_fails() {
        let result = Lexer::new("the customer's first purchase").tokenize();
        assert!(matches!(result, Err(EvalError::Syntax { .. })));
    }

    #[test]
    fn test_single_equals_is_rejected() {
        let result = Lexer::new("a = 1").tokenize();
        assert!(matches!(result, Err(EvalError::Syntax { pos: 2, .. })));
    }
}
