//! Recursive-descent parser producing the query AST.
//!
//! ```text
//! query     := SELECT columns FROM ident [WHERE expr]
//! columns   := '*' | column (',' column)*
//! expr      := and (OR and)*
//! and       := not (AND not)*
//! not       := NOT not | '(' expr ')' | predicate
//! predicate := operand ( op operand
//!                      | IS [NOT] (NULL | literal)
//!                      | [NOT] BETWEEN operand AND operand
//!                      | [NOT] IN '(' literal (',' literal)* [','] ')'
//!                      | [NOT] LIKE string )
//! ```

use super::lexer::{CompareOp, Keyword, Token, TokenKind, tokenize};
use crate::cleaner::parse_datetime;
use crate::error::{CleanerError, Result};
use std::fmt;

/// A literal value in a query.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryValue {
    Null,
    Bool(bool),
    Number(f64),
    Str(String),
    /// `date("...")`, as epoch milliseconds.
    Date(i64),
}

impl fmt::Display for QueryValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("None"),
            Self::Bool(true) => f.write_str("True"),
            Self::Bool(false) => f.write_str("False"),
            Self::Number(n) => write!(f, "{}", n),
            Self::Str(s) => write!(f, "'{}'", s.replace('\'', "\\'")),
            Self::Date(ms) => {
                let text = crate::utils::millis_to_naive(*ms)
                    .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
                    .unwrap_or_default();
                write!(f, "Timestamp('{}')", text)
            }
        }
    }
}

/// Column reference or literal.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Column { name: String, quoted: bool },
    Literal(QueryValue),
}

impl Operand {
    fn column(name: impl Into<String>, quoted: bool) -> Self {
        Self::Column {
            name: name.into(),
            quoted,
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Column { name, quoted: true } => write!(f, "`{}`", name),
            Self::Column { name, .. } => f.write_str(name),
            Self::Literal(value) => write!(f, "{}", value),
        }
    }
}

/// Boolean filter expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    And(Box<Condition>, Box<Condition>),
    Or(Box<Condition>, Box<Condition>),
    Not(Box<Condition>),
    Compare {
        left: Operand,
        op: CompareOp,
        right: Operand,
    },
    Null {
        operand: Operand,
        negated: bool,
    },
    Between {
        operand: Operand,
        low: Operand,
        high: Operand,
        negated: bool,
    },
    In {
        operand: Operand,
        values: Vec<QueryValue>,
        negated: bool,
    },
    Like {
        operand: Operand,
        pattern: String,
        negated: bool,
    },
}

/// Translate a LIKE pattern into an anchored regex body.
pub fn like_to_regex(pattern: &str) -> String {
    let mut regex = String::new();
    for c in pattern.chars() {
        match c {
            '%' => regex.push_str(".*"),
            '_' => regex.push('.'),
            other => regex.push_str(&regex::escape(&other.to_string())),
        }
    }
    regex
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::And(a, b) => write!(f, "({}) and ({})", a, b),
            Self::Or(a, b) => write!(f, "({}) or ({})", a, b),
            Self::Not(inner) => write!(f, "not ({})", inner),
            Self::Compare { left, op, right } => write!(f, "{} {} {}", left, op.symbol(), right),
            Self::Null {
                operand,
                negated: false,
            } => write!(f, "{}.isna()", operand),
            Self::Null { operand, .. } => write!(f, "{}.notna()", operand),
            Self::Between {
                operand,
                low,
                high,
                negated,
            } => {
                let range = format!("{} <= {} <= {}", low, operand, high);
                if *negated {
                    write!(f, "not ({})", range)
                } else {
                    f.write_str(&range)
                }
            }
            Self::In {
                operand,
                values,
                negated,
            } => {
                let items: Vec<String> = values.iter().map(ToString::to_string).collect();
                let op = if *negated { "not in" } else { "in" };
                write!(f, "{} {} [{}]", operand, op, items.join(", "))
            }
            Self::Like {
                operand,
                pattern,
                negated,
            } => {
                let prefix = if *negated { "~" } else { "" };
                write!(
                    f,
                    "{}{}.str.fullmatch('{}')",
                    prefix,
                    operand,
                    like_to_regex(pattern).replace('\'', "\\'")
                )
            }
        }
    }
}

/// One selected column.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectedColumn {
    pub name: String,
    pub quoted: bool,
}

/// Parsed `SELECT` statement. An empty selection means `*`.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub selection: Vec<SelectedColumn>,
    pub filter: Option<Condition>,
}

pub(crate) struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    pub(crate) fn new(input: &str) -> Result<Self> {
        Ok(Self {
            tokens: tokenize(input)?,
            pos: 0,
        })
    }

    fn peek(&self) -> &TokenKind {
        &self.tokens[self.pos].kind
    }

    fn peek_at(&self, offset: usize) -> &TokenKind {
        let index = (self.pos + offset).min(self.tokens.len() - 1);
        &self.tokens[index].kind
    }

    fn position(&self) -> usize {
        self.tokens[self.pos].position
    }

    fn advance(&mut self) -> TokenKind {
        let kind = self.tokens[self.pos].kind.clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        kind
    }

    fn error<T>(&self, message: impl Into<String>) -> Result<T> {
        Err(CleanerError::QuerySyntax {
            position: self.position(),
            message: message.into(),
        })
    }

    fn eat_keyword(&mut self, keyword: Keyword) -> bool {
        if self.peek() == &TokenKind::Keyword(keyword) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect_keyword(&mut self, keyword: Keyword) -> Result<()> {
        if self.eat_keyword(keyword) {
            Ok(())
        } else {
            self.error(format!("expected {}", format!("{:?}", keyword).to_uppercase()))
        }
    }

    fn expect(&mut self, kind: TokenKind, what: &str) -> Result<()> {
        if self.peek() == &kind {
            self.advance();
            Ok(())
        } else {
            self.error(format!("expected {}", what))
        }
    }

    fn expect_end(&mut self) -> Result<()> {
        match self.peek() {
            TokenKind::Eof => Ok(()),
            other => self.error(format!("unexpected token {:?}", other)),
        }
    }

    pub(crate) fn parse_query(&mut self) -> Result<Query> {
        self.expect_keyword(Keyword::Select)?;
        let selection = self.parse_selection()?;
        self.expect_keyword(Keyword::From)?;
        match self.advance() {
            TokenKind::Ident(_) | TokenKind::QuotedIdent(_) => {}
            _ => return self.error("expected table name"),
        }
        let filter = if self.eat_keyword(Keyword::Where) {
            Some(self.parse_expr()?)
        } else {
            None
        };
        self.expect_end()?;
        Ok(Query { selection, filter })
    }

    pub(crate) fn parse_filter(&mut self) -> Result<Condition> {
        self.eat_keyword(Keyword::Where);
        let condition = self.parse_expr()?;
        self.expect_end()?;
        Ok(condition)
    }

    fn parse_selection(&mut self) -> Result<Vec<SelectedColumn>> {
        if self.peek() == &TokenKind::Star {
            self.advance();
            return Ok(Vec::new());
        }
        let mut columns = Vec::new();
        loop {
            let column = match self.advance() {
                TokenKind::Ident(name) => SelectedColumn {
                    name,
                    quoted: false,
                },
                TokenKind::QuotedIdent(name) | TokenKind::Str(name) => SelectedColumn {
                    name,
                    quoted: true,
                },
                _ => return self.error("expected column name"),
            };
            columns.push(column);
            if self.peek() != &TokenKind::Comma {
                return Ok(columns);
            }
            self.advance();
        }
    }

    fn parse_expr(&mut self) -> Result<Condition> {
        let mut left = self.parse_and()?;
        while self.eat_keyword(Keyword::Or) {
            let right = self.parse_and()?;
            left = Condition::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Condition> {
        let mut left = self.parse_not()?;
        while self.eat_keyword(Keyword::And) {
            let right = self.parse_not()?;
            left = Condition::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_not(&mut self) -> Result<Condition> {
        if self.eat_keyword(Keyword::Not) {
            return Ok(Condition::Not(Box::new(self.parse_not()?)));
        }
        if self.peek() == &TokenKind::LParen {
            self.advance();
            let inner = self.parse_expr()?;
            self.expect(TokenKind::RParen, "')'")?;
            return Ok(inner);
        }
        self.parse_predicate()
    }

    fn parse_predicate(&mut self) -> Result<Condition> {
        let operand = self.parse_left_operand()?;

        if let TokenKind::Op(op) = *self.peek() {
            self.advance();
            let right = self.parse_right_operand()?;
            return Ok(Condition::Compare {
                left: operand,
                op,
                right,
            });
        }

        if self.eat_keyword(Keyword::Is) {
            let negated = self.eat_keyword(Keyword::Not);
            if self.eat_keyword(Keyword::Null) {
                return Ok(Condition::Null { operand, negated });
            }
            let value = self.parse_literal()?;
            let op = if negated { CompareOp::Ne } else { CompareOp::Eq };
            return Ok(Condition::Compare {
                left: operand,
                op,
                right: Operand::Literal(value),
            });
        }

        let negated = self.eat_keyword(Keyword::Not);
        if self.eat_keyword(Keyword::Between) {
            let low = self.parse_right_operand()?;
            self.expect_keyword(Keyword::And)?;
            let high = self.parse_right_operand()?;
            return Ok(Condition::Between {
                operand,
                low,
                high,
                negated,
            });
        }
        if self.eat_keyword(Keyword::In) {
            self.expect(TokenKind::LParen, "'('")?;
            let mut values = Vec::new();
            while self.peek() != &TokenKind::RParen {
                values.push(self.parse_literal()?);
                if self.peek() == &TokenKind::Comma {
                    self.advance();
                } else {
                    break;
                }
            }
            self.expect(TokenKind::RParen, "')'")?;
            return Ok(Condition::In {
                operand,
                values,
                negated,
            });
        }
        if self.eat_keyword(Keyword::Like) {
            return match self.advance() {
                TokenKind::Str(pattern) => Ok(Condition::Like {
                    operand,
                    pattern,
                    negated,
                }),
                _ => self.error("expected LIKE pattern string"),
            };
        }

        self.error("expected comparison, IS, BETWEEN, IN or LIKE")
    }

    /// Operand in column position: quoted strings name columns.
    fn parse_left_operand(&mut self) -> Result<Operand> {
        match self.peek().clone() {
            TokenKind::Ident(name) if !self.is_date_call() => {
                self.advance();
                Ok(Operand::column(name, false))
            }
            TokenKind::QuotedIdent(name) | TokenKind::Str(name) => {
                self.advance();
                Ok(Operand::column(name, true))
            }
            _ => Ok(Operand::Literal(self.parse_literal()?)),
        }
    }

    /// Operand in value position: quoted strings are literals.
    fn parse_right_operand(&mut self) -> Result<Operand> {
        match self.peek().clone() {
            TokenKind::Ident(name) if !self.is_date_call() => {
                self.advance();
                Ok(Operand::column(name, false))
            }
            TokenKind::QuotedIdent(name) => {
                self.advance();
                Ok(Operand::column(name, true))
            }
            _ => Ok(Operand::Literal(self.parse_literal()?)),
        }
    }

    fn is_date_call(&self) -> bool {
        matches!(self.peek(), TokenKind::Ident(name) if name.eq_ignore_ascii_case("date"))
            && self.peek_at(1) == &TokenKind::LParen
    }

    fn parse_literal(&mut self) -> Result<QueryValue> {
        if self.is_date_call() {
            self.advance();
            self.advance();
            let position = self.position();
            let text = match self.advance() {
                TokenKind::Str(text) => text,
                _ => return self.error("expected date string"),
            };
            self.expect(TokenKind::RParen, "')'")?;
            let Some(date) = parse_datetime(&text) else {
                return Err(CleanerError::QuerySyntax {
                    position,
                    message: format!("invalid date '{}'", text),
                });
            };
            return Ok(QueryValue::Date(date.and_utc().timestamp_millis()));
        }

        match self.peek().clone() {
            TokenKind::Number(n) => {
                self.advance();
                Ok(QueryValue::Number(n))
            }
            TokenKind::Str(s) => {
                self.advance();
                Ok(QueryValue::Str(s))
            }
            TokenKind::Keyword(Keyword::True) => {
                self.advance();
                Ok(QueryValue::Bool(true))
            }
            TokenKind::Keyword(Keyword::False) => {
                self.advance();
                Ok(QueryValue::Bool(false))
            }
            TokenKind::Keyword(Keyword::Null) => {
                self.advance();
                Ok(QueryValue::Null)
            }
            _ => self.error("expected literal value"),
        }
    }
}
