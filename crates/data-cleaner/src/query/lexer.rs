//! Tokenizer for the query dialect.

use crate::error::{CleanerError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    Select,
    From,
    Where,
    And,
    Or,
    Not,
    Is,
    Null,
    Between,
    In,
    Like,
    True,
    False,
}

impl Keyword {
    fn lookup(word: &str) -> Option<Self> {
        Some(match word.to_ascii_uppercase().as_str() {
            "SELECT" => Self::Select,
            "FROM" => Self::From,
            "WHERE" => Self::Where,
            "AND" => Self::And,
            "OR" => Self::Or,
            "NOT" => Self::Not,
            "IS" => Self::Is,
            "NULL" => Self::Null,
            "BETWEEN" => Self::Between,
            "IN" => Self::In,
            "LIKE" => Self::Like,
            "TRUE" => Self::True,
            "FALSE" => Self::False,
            _ => return None,
        })
    }
}

/// Comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
}

impl CompareOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Gt => ">",
            Self::Le => "<=",
            Self::Ge => ">=",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Keyword(Keyword),
    /// Bare identifier.
    Ident(String),
    /// Backticked identifier.
    QuotedIdent(String),
    /// Single- or double-quoted string.
    Str(String),
    Number(f64),
    Op(CompareOp),
    LParen,
    RParen,
    Comma,
    Star,
    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    /// Byte offset of the token in the query text.
    pub position: usize,
}

fn syntax_error(position: usize, message: impl Into<String>) -> CleanerError {
    CleanerError::QuerySyntax {
        position,
        message: message.into(),
    }
}

/// Split query text into tokens, ending with [`TokenKind::Eof`].
pub fn tokenize(input: &str) -> Result<Vec<Token>> {
    let chars: Vec<(usize, char)> = input.char_indices().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let (position, c) = chars[i];
        let next = chars.get(i + 1).map(|(_, c)| *c);

        if c.is_whitespace() {
            i += 1;
            continue;
        }

        let kind = match c {
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            ',' => TokenKind::Comma,
            '*' => TokenKind::Star,
            '=' if next == Some('=') => {
                i += 1;
                TokenKind::Op(CompareOp::Eq)
            }
            '=' => TokenKind::Op(CompareOp::Eq),
            '!' if next == Some('=') => {
                i += 1;
                TokenKind::Op(CompareOp::Ne)
            }
            '<' if next == Some('>') => {
                i += 1;
                TokenKind::Op(CompareOp::Ne)
            }
            '<' if next == Some('=') => {
                i += 1;
                TokenKind::Op(CompareOp::Le)
            }
            '<' => TokenKind::Op(CompareOp::Lt),
            '>' if next == Some('=') => {
                i += 1;
                TokenKind::Op(CompareOp::Ge)
            }
            '>' => TokenKind::Op(CompareOp::Gt),
            '\'' | '"' | '`' => {
                let (text, end) = read_quoted(&chars, i, c)?;
                i = end;
                if c == '`' {
                    TokenKind::QuotedIdent(text)
                } else {
                    TokenKind::Str(text)
                }
            }
            c if c.is_ascii_digit()
                || ((c == '-' || c == '.') && next.is_some_and(|n| n.is_ascii_digit())) =>
            {
                i += 1;
                while i < chars.len() && (chars[i].1.is_ascii_digit() || chars[i].1 == '.') {
                    i += 1;
                }
                let end = chars.get(i).map_or(input.len(), |(p, _)| *p);
                let text = &input[position..end];
                let value = text
                    .parse::<f64>()
                    .map_err(|_| syntax_error(position, format!("invalid number '{}'", text)))?;
                i -= 1;
                TokenKind::Number(value)
            }
            c if c.is_alphabetic() || c == '_' => {
                while i < chars.len() && (chars[i].1.is_alphanumeric() || chars[i].1 == '_') {
                    i += 1;
                }
                let end = chars.get(i).map_or(input.len(), |(p, _)| *p);
                let word = &input[position..end];
                i -= 1;
                match Keyword::lookup(word) {
                    Some(keyword) => TokenKind::Keyword(keyword),
                    None => TokenKind::Ident(word.to_string()),
                }
            }
            other => {
                return Err(syntax_error(
                    position,
                    format!("unexpected character '{}'", other),
                ));
            }
        };

        tokens.push(Token { kind, position });
        i += 1;
    }

    tokens.push(Token {
        kind: TokenKind::Eof,
        position: input.len(),
    });
    Ok(tokens)
}

/// Read a quoted run starting at `start`. Returns the text and the index of
/// the closing quote. A doubled quote or a backslash escapes the quote.
fn read_quoted(chars: &[(usize, char)], start: usize, quote: char) -> Result<(String, usize)> {
    let mut text = String::new();
    let mut i = start + 1;
    while i < chars.len() {
        let c = chars[i].1;
        if c == '\\' && i + 1 < chars.len() {
            text.push(chars[i + 1].1);
            i += 2;
            continue;
        }
        if c == quote {
            if chars.get(i + 1).map(|(_, c)| *c) == Some(quote) {
                text.push(quote);
                i += 2;
                continue;
            }
            return Ok((text, i));
        }
        text.push(c);
        i += 1;
    }
    Err(syntax_error(chars[start].0, "unterminated quoted text"))
}
