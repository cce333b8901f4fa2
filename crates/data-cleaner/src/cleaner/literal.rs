//! Immutable list/dict cell values and a literal parser for them.
//!
//! List cells arrive as strings such as `"[1, 'a', None]"` or `"(1.5, nan)"`.
//! They are parsed by a small recursive-descent parser that understands
//! numbers, quoted strings, `True`/`False`/`None`, `nan`/`np.nan` and nested
//! lists, tuples, sets and dicts. Nothing is evaluated; an element that is
//! not a literal becomes [`Literal::Missing`].
//!
//! Parsed values are wrapped in [`FrozenList`] and [`FrozenDict`], which are
//! cheap to clone, hashable and expose no way to mutate their contents.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// A parsed scalar or container literal.
#[derive(Debug, Clone)]
pub enum Literal {
    None,
    /// `nan`, `np.nan` or an element that failed to parse.
    Missing,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(FrozenList),
    Dict(FrozenDict),
}

impl Literal {
    /// `None` or the missing sentinel.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::None | Self::Missing)
    }

    /// Numeric view of ints, floats and bools.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(v) => Some(*v as f64),
            Self::Float(v) => Some(*v),
            Self::Bool(v) => Some(if *v { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    fn repr(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(s) => write!(f, "'{}'", s.replace('\\', "\\\\").replace('\'', "\\'")),
            other => write!(f, "{}", other),
        }
    }
}

impl PartialEq for Literal {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::None, Self::None) | (Self::Missing, Self::Missing) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a.to_bits() == b.to_bits(),
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::List(a), Self::List(b)) => a == b,
            (Self::Dict(a), Self::Dict(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Literal {}

impl Hash for Literal {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Self::None | Self::Missing => {}
            Self::Bool(v) => v.hash(state),
            Self::Int(v) => v.hash(state),
            Self::Float(v) => v.to_bits().hash(state),
            Self::Str(v) => v.hash(state),
            Self::List(v) => v.hash(state),
            Self::Dict(v) => v.hash(state),
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("None"),
            Self::Missing => f.write_str("nan"),
            Self::Bool(true) => f.write_str("True"),
            Self::Bool(false) => f.write_str("False"),
            Self::Int(v) => write!(f, "{}", v),
            Self::Float(v) if v.is_nan() => f.write_str("nan"),
            Self::Float(v) if v.fract() == 0.0 && v.is_finite() => write!(f, "{:.1}", v),
            Self::Float(v) => write!(f, "{}", v),
            Self::Str(s) => f.write_str(s),
            Self::List(l) => write!(f, "{}", l),
            Self::Dict(d) => write!(f, "{}", d),
        }
    }
}

impl From<FrozenList> for Literal {
    fn from(list: FrozenList) -> Self {
        Self::List(list)
    }
}

/// Immutable, hashable list of literals.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FrozenList(Arc<[Literal]>);

impl FrozenList {
    pub fn new(items: Vec<Literal>) -> Self {
        Self(items.into())
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    pub fn singleton(item: Literal) -> Self {
        Self::new(vec![item])
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Literal> {
        self.0.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Literal> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[Literal] {
        &self.0
    }
}

impl fmt::Display for FrozenList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, item) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            item.repr(f)?;
        }
        f.write_str("]")
    }
}

impl<'a> IntoIterator for &'a FrozenList {
    type Item = &'a Literal;
    type IntoIter = std::slice::Iter<'a, Literal>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Immutable, hashable mapping of literals, in insertion order.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FrozenDict(Arc<[(Literal, Literal)]>);

impl FrozenDict {
    /// Build from pairs; a repeated key keeps its last value.
    pub fn new(pairs: Vec<(Literal, Literal)>) -> Self {
        let mut unique: Vec<(Literal, Literal)> = Vec::with_capacity(pairs.len());
        for (key, value) in pairs {
            match unique.iter_mut().find(|(k, _)| *k == key) {
                Some(entry) => entry.1 = value,
                None => unique.push((key, value)),
            }
        }
        Self(unique.into())
    }

    pub fn get(&self, key: &Literal) -> Option<&Literal> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Literal, &Literal)> {
        self.0.iter().map(|(k, v)| (k, v))
    }
}

impl fmt::Display for FrozenDict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, (key, value)) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            key.repr(f)?;
            f.write_str(": ")?;
            value.repr(f)?;
        }
        f.write_str("}")
    }
}

// =============================================================================
// parse_list
// =============================================================================

/// Normalize a cell into a list value.
///
/// Lists pass through, nulls pass through, bracketed strings are parsed,
/// and any other value becomes a one-element list. Applying it twice gives
/// the same result as applying it once.
pub fn parse_list(value: &Literal) -> Literal {
    match value {
        Literal::List(_) | Literal::None | Literal::Missing => value.clone(),
        Literal::Str(s) => Literal::List(parse_list_str(s)),
        other => Literal::List(FrozenList::singleton(other.clone())),
    }
}

/// Parse a string cell into a list.
///
/// Strings not wrapped in `[...]` or `(...)` become a one-element list.
pub fn parse_list_str(value: &str) -> FrozenList {
    let trimmed = value.trim();
    if !crate::patterns::is_list_shaped(trimmed) {
        return FrozenList::singleton(Literal::Str(value.to_string()));
    }

    let inner = trimmed[1..trimmed.len() - 1].trim();
    if inner.is_empty() {
        return FrozenList::empty();
    }

    let mut parts = split_top_level(inner);
    if parts.len() > 1 && parts.last().is_some_and(|p| p.is_empty()) {
        parts.pop();
    }

    FrozenList::new(
        parts
            .into_iter()
            .map(|part| parse_literal(part).unwrap_or(Literal::Missing))
            .collect(),
    )
}

/// Split on commas that are not nested in brackets or quotes.
fn split_top_level(input: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut start = 0;

    for (i, c) in input.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '\'' | '"' => quote = Some(c),
            '[' | '(' | '{' => depth += 1,
            ']' | ')' | '}' => depth -= 1,
            ',' if depth == 0 => {
                parts.push(input[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(input[start..].trim());
    parts
}

// =============================================================================
// Literal Parser
// =============================================================================

/// Parse a complete literal. Returns `None` when the text is not a literal.
pub fn parse_literal(text: &str) -> Option<Literal> {
    let mut parser = LiteralParser {
        chars: text.chars().collect(),
        pos: 0,
    };
    let value = parser.value()?;
    parser.skip_whitespace();
    if parser.pos == parser.chars.len() {
        Some(value)
    } else {
        None
    }
}

struct LiteralParser {
    chars: Vec<char>,
    pos: usize,
}

impl LiteralParser {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
    }

    fn eat(&mut self, expected: char) -> bool {
        self.skip_whitespace();
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn value(&mut self) -> Option<Literal> {
        self.skip_whitespace();
        match self.peek()? {
            '[' => {
                self.pos += 1;
                let (items, _) = self.sequence(']')?;
                Some(Literal::List(FrozenList::new(items)))
            }
            '(' => {
                self.pos += 1;
                let (mut items, trailing_comma) = self.sequence(')')?;
                if items.len() == 1 && !trailing_comma {
                    items.pop()
                } else {
                    Some(Literal::List(FrozenList::new(items)))
                }
            }
            '{' => {
                self.pos += 1;
                self.dict_or_set()
            }
            '\'' | '"' => self.string(),
            c if c.is_ascii_digit() || c == '-' || c == '+' || c == '.' => self.number(),
            _ => self.word(),
        }
    }

    /// Comma-separated values up to `close`; reports a trailing comma.
    fn sequence(&mut self, close: char) -> Option<(Vec<Literal>, bool)> {
        let mut items = Vec::new();
        let mut trailing_comma = false;
        if self.eat(close) {
            return Some((items, false));
        }
        loop {
            items.push(self.value()?);
            if self.eat(',') {
                if self.eat(close) {
                    trailing_comma = true;
                    break;
                }
            } else if self.eat(close) {
                break;
            } else {
                return None;
            }
        }
        Some((items, trailing_comma))
    }

    fn dict_or_set(&mut self) -> Option<Literal> {
        if self.eat('}') {
            return Some(Literal::Dict(FrozenDict::new(Vec::new())));
        }
        let first = self.value()?;
        if self.eat(':') {
            let mut pairs = vec![(first, self.value()?)];
            loop {
                if self.eat('}') {
                    break;
                }
                if !self.eat(',') {
                    return None;
                }
                if self.eat('}') {
                    break;
                }
                let key = self.value()?;
                if !self.eat(':') {
                    return None;
                }
                pairs.push((key, self.value()?));
            }
            Some(Literal::Dict(FrozenDict::new(pairs)))
        } else {
            let mut items = vec![first];
            loop {
                if self.eat('}') {
                    break;
                }
                if !self.eat(',') {
                    return None;
                }
                if self.eat('}') {
                    break;
                }
                items.push(self.value()?);
            }
            Some(Literal::List(FrozenList::new(items)))
        }
    }

    fn string(&mut self) -> Option<Literal> {
        let quote = self.peek()?;
        self.pos += 1;
        let mut out = String::new();
        loop {
            let c = self.peek()?;
            self.pos += 1;
            match c {
                '\\' => {
                    let escaped = self.peek()?;
                    self.pos += 1;
                    out.push(match escaped {
                        'n' => '\n',
                        't' => '\t',
                        'r' => '\r',
                        other => other,
                    });
                }
                c if c == quote => return Some(Literal::Str(out)),
                c => out.push(c),
            }
        }
    }

    fn number(&mut self) -> Option<Literal> {
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '+' | '.' | '_'))
        {
            self.pos += 1;
        }
        let raw: String = self.chars[start..self.pos]
            .iter()
            .filter(|c| **c != '_')
            .collect();

        if let Ok(v) = raw.parse::<i64>() {
            return Some(Literal::Int(v));
        }
        match raw.trim_start_matches(['-', '+']) {
            "inf" | "nan" => return None,
            _ => {}
        }
        raw.parse::<f64>().ok().map(Literal::Float)
    }

    fn word(&mut self) -> Option<Literal> {
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
        {
            self.pos += 1;
        }
        let word: String = self.chars[start..self.pos].iter().collect();
        match word.as_str() {
            "True" => Some(Literal::Bool(true)),
            "False" => Some(Literal::Bool(false)),
            "None" => Some(Literal::None),
            "nan" | "np.nan" | "NaN" => Some(Literal::Missing),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn list(items: Vec<Literal>) -> Literal {
        Literal::List(FrozenList::new(items))
    }

    #[test]
    fn test_parse_flat_list() {
        let parsed = parse_list(&Literal::Str("[1, 2.5, 'a', True, None]".to_string()));
        assert_eq!(
            parsed,
            list(vec![
                Literal::Int(1),
                Literal::Float(2.5),
                Literal::Str("a".to_string()),
                Literal::Bool(true),
                Literal::None,
            ])
        );
    }

    #[test]
    fn test_parse_tuple_and_nested() {
        let parsed = parse_list_str("(1, [2, (3,)], {'k': \"v, w\"})");
        assert_eq!(parsed.len(), 3);
        assert_eq!(
            parsed.get(1),
            Some(&list(vec![Literal::Int(2), list(vec![Literal::Int(3)])]))
        );
        match parsed.get(2) {
            Some(Literal::Dict(d)) => assert_eq!(
                d.get(&Literal::Str("k".to_string())),
                Some(&Literal::Str("v, w".to_string()))
            ),
            other => panic!("expected dict, got {:?}", other),
        }
    }

    #[test]
    fn test_nan_and_malformed_elements() {
        let parsed = parse_list_str("[nan, np.nan, oops, 3]");
        assert_eq!(
            parsed.as_slice(),
            &[
                Literal::Missing,
                Literal::Missing,
                Literal::Missing,
                Literal::Int(3)
            ]
        );
    }

    #[test]
    fn test_empty_and_singletons() {
        assert_eq!(parse_list_str("[ ]"), FrozenList::empty());
        assert_eq!(parse_list_str("()"), FrozenList::empty());
        assert_eq!(
            parse_list_str("plain"),
            FrozenList::singleton(Literal::Str("plain".to_string()))
        );
        assert_eq!(
            parse_list(&Literal::Int(4)),
            list(vec![Literal::Int(4)])
        );
        assert_eq!(parse_list(&Literal::None), Literal::None);
    }

    #[test]
    fn test_parse_list_is_idempotent_and_whitespace_insensitive() {
        let a = parse_list(&Literal::Str("[1,2,  'x' ,[3]]".to_string()));
        let b = parse_list(&Literal::Str("  [ 1 , 2 , 'x', [ 3 ] ]  ".to_string()));
        assert_eq!(a, b);
        assert_eq!(parse_list(&a), a);
    }

    #[test]
    fn test_display_round_trips_through_parser() {
        let parsed = parse_list_str("[1, 'it\\'s', [2.0, None], {'a': False}]");
        let rendered = parsed.to_string();
        assert_eq!(parse_list_str(&rendered), parsed);
    }

    #[test]
    fn test_frozen_values_hash_consistently() {
        use std::collections::HashSet;
        let mut set = HashSet::new();
        set.insert(parse_list_str("[1, 2]"));
        set.insert(parse_list_str("[1,2]"));
        set.insert(parse_list_str("[2, 1]"));
        assert_eq!(set.len(), 2);
    }
}
