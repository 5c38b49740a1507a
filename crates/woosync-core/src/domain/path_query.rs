//! Path-query expressions over JSON-like documents
//!
//! A small, typed subset of JSONPath used by user-configured field mappings.
//! The grammar is:
//!
//! ```text
//! query    := '$' segment*
//! segment  := '.' name | '.*' | '[' index ']' | '[*]' | '[' quoted ']'
//!           | '[?(' filter ')]'
//! filter   := '@' relpath ( op literal )?
//! relpath  := ( '.' name | '[' quoted ']' )*
//! op       := '==' | '!=' | '<' | '<=' | '>' | '>='
//! literal  := quoted | number | 'true' | 'false' | 'null'
//! ```
//!
//! Negative indices count from the end of an array. A filter without an
//! operator keeps elements where the relative path exists.

use std::fmt;
use std::str::FromStr;

use serde_json::{Map, Value};
use thiserror::Error;

/// Syntax error in a path-query expression
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} at position {position} in '{expression}'")]
pub struct PathQueryError {
    /// The offending expression
    pub expression: String,
    /// Byte offset into `expression` where parsing failed
    pub position: usize,
    /// What went wrong
    pub message: String,
}

/// A parsed path-query expression
#[derive(Debug, Clone, PartialEq)]
pub struct PathQuery {
    source: String,
    segments: Vec<Segment>,
}

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Field(String),
    Index(i64),
    Wildcard,
    Filter(Filter),
}

#[derive(Debug, Clone, PartialEq)]
struct Filter {
    path: Vec<String>,
    comparison: Option<(CmpOp, Literal)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone, PartialEq)]
enum Literal {
    Str(String),
    Num(f64),
    Bool(bool),
    Null,
}

impl PathQuery {
    /// Parse an expression
    ///
    /// ```
    /// use woosync_core::domain::PathQuery;
    /// use serde_json::json;
    ///
    /// let q = PathQuery::parse("$.meta_data[?(@.key=='color')].value").unwrap();
    /// let doc = json!({"meta_data": [{"key": "color", "value": "red"}]});
    /// assert_eq!(q.select_first(&doc), Some(&json!("red")));
    /// ```
    pub fn parse(expression: &str) -> Result<Self, PathQueryError> {
        let segments = Parser::new(expression).parse()?;
        Ok(Self {
            source: expression.to_string(),
            segments,
        })
    }

    /// The expression text this query was parsed from
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// All matches, in document order
    pub fn select<'a>(&self, root: &'a Value) -> Vec<&'a Value> {
        let mut current = vec![root];
        for segment in &self.segments {
            let mut next = Vec::new();
            for value in current {
                match segment {
                    Segment::Field(name) => {
                        if let Some(child) = value.as_object().and_then(|o| o.get(name)) {
                            next.push(child);
                        }
                    }
                    Segment::Index(index) => {
                        if let Some(arr) = value.as_array() {
                            if let Some(child) = resolve_index(*index, arr.len()).map(|i| &arr[i]) {
                                next.push(child);
                            }
                        }
                    }
                    Segment::Wildcard => match value {
                        Value::Array(arr) => next.extend(arr.iter()),
                        Value::Object(obj) => next.extend(obj.values()),
                        _ => {}
                    },
                    Segment::Filter(filter) => match value {
                        Value::Array(arr) => next.extend(arr.iter().filter(|e| filter.matches(e))),
                        Value::Object(obj) => {
                            next.extend(obj.values().filter(|e| filter.matches(e)))
                        }
                        _ => {}
                    },
                }
            }
            if next.is_empty() {
                return next;
            }
            current = next;
        }
        current
    }

    /// The first match, if any
    pub fn select_first<'a>(&self, root: &'a Value) -> Option<&'a Value> {
        self.select(root).into_iter().next()
    }

    /// Write `new` at the location this query addresses
    ///
    /// Missing object members are created. An equality filter with no
    /// matching element appends a new element carrying the filter's key and
    /// literal, so `$.meta_data[?(@.key=='x')].value` upserts a metadata entry.
    /// Returns `false` when the query cannot address a single location
    /// (wildcards, non-equality filters without a match, out-of-range indices,
    /// or a type mismatch along the way).
    pub fn assign(&self, root: &mut Value, new: Value) -> bool {
        assign_at(root, &self.segments, new)
    }

    /// Whether any segment or filter path names the given member
    pub fn references_field(&self, name: &str) -> bool {
        self.segments.iter().any(|segment| match segment {
            Segment::Field(field) => field == name,
            Segment::Filter(filter) => filter.path.iter().any(|p| p == name),
            _ => false,
        })
    }
}

impl fmt::Display for PathQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.source)
    }
}

impl FromStr for PathQuery {
    type Err = PathQueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

fn resolve_index(index: i64, len: usize) -> Option<usize> {
    let len = i64::try_from(len).ok()?;
    let resolved = if index < 0 { len + index } else { index };
    if (0..len).contains(&resolved) {
        usize::try_from(resolved).ok()
    } else {
        None
    }
}

fn assign_at(value: &mut Value, segments: &[Segment], new: Value) -> bool {
    let Some((segment, rest)) = segments.split_first() else {
        *value = new;
        return true;
    };

    match segment {
        Segment::Field(name) => {
            if value.is_null() {
                *value = Value::Object(Map::new());
            }
            let Some(obj) = value.as_object_mut() else {
                return false;
            };
            let child = obj.entry(name.clone()).or_insert(Value::Null);
            assign_at(child, rest, new)
        }
        Segment::Index(index) => {
            let Some(arr) = value.as_array_mut() else {
                return false;
            };
            match resolve_index(*index, arr.len()) {
                Some(i) => assign_at(&mut arr[i], rest, new),
                None => false,
            }
        }
        Segment::Filter(filter) => {
            if value.is_null() {
                *value = Value::Array(Vec::new());
            }
            let Some(arr) = value.as_array_mut() else {
                return false;
            };
            if let Some(pos) = arr.iter().position(|e| filter.matches(e)) {
                return assign_at(&mut arr[pos], rest, new);
            }
            let Some(seed) = filter.seed() else {
                return false;
            };
            arr.push(seed);
            let last = arr.len() - 1;
            assign_at(&mut arr[last], rest, new)
        }
        Segment::Wildcard => false,
    }
}

impl Filter {
    fn resolve<'a>(&self, element: &'a Value) -> Option<&'a Value> {
        self.path
            .iter()
            .try_fold(element, |current, name| current.as_object()?.get(name))
    }

    fn matches(&self, element: &Value) -> bool {
        let Some(found) = self.resolve(element) else {
            return false;
        };
        let Some((op, literal)) = &self.comparison else {
            return true;
        };
        match op {
            CmpOp::Eq => literal.equals(found),
            CmpOp::Ne => !literal.equals(found),
            CmpOp::Lt => literal.order(found).is_some_and(|o| o.is_gt()),
            CmpOp::Le => literal.order(found).is_some_and(|o| o.is_ge()),
            CmpOp::Gt => literal.order(found).is_some_and(|o| o.is_lt()),
            CmpOp::Ge => literal.order(found).is_some_and(|o| o.is_le()),
        }
    }

    /// A fresh element that satisfies this filter, for equality filters only
    fn seed(&self) -> Option<Value> {
        let (CmpOp::Eq, literal) = self.comparison.as_ref()? else {
            return None;
        };
        let mut seed = literal.to_value();
        for name in self.path.iter().rev() {
            let mut obj = Map::new();
            obj.insert(name.clone(), seed);
            seed = Value::Object(obj);
        }
        Some(seed)
    }
}

impl Literal {
    fn equals(&self, value: &Value) -> bool {
        match (self, value) {
            (Literal::Str(s), Value::String(v)) => s == v,
            (Literal::Num(n), Value::Number(v)) => v.as_f64() == Some(*n),
            (Literal::Bool(b), Value::Bool(v)) => b == v,
            (Literal::Null, Value::Null) => true,
            _ => false,
        }
    }

    /// Ordering of the literal relative to `value` (literal.cmp(value))
    fn order(&self, value: &Value) -> Option<std::cmp::Ordering> {
        match (self, value) {
            (Literal::Num(n), Value::Number(v)) => n.partial_cmp(&v.as_f64()?),
            (Literal::Str(s), Value::String(v)) => Some(s.as_str().cmp(v.as_str())),
            _ => None,
        }
    }

    fn to_value(&self) -> Value {
        match self {
            Literal::Str(s) => Value::String(s.clone()),
            Literal::Num(n) => serde_json::Number::from_f64(*n)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            Literal::Bool(b) => Value::Bool(*b),
            Literal::Null => Value::Null,
        }
    }
}

// ============================================================================
// Parser
// ============================================================================

struct Parser<'a> {
    source: &'a str,
    chars: Vec<char>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            source,
            chars: source.chars().collect(),
            pos: 0,
        }
    }

    fn error(&self, message: impl Into<String>) -> PathQueryError {
        PathQueryError {
            expression: self.source.to_string(),
            position: self.chars[..self.pos].iter().map(|c| c.len_utf8()).sum(),
            message: message.into(),
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek();
        if c.is_some() {
            self.pos += 1;
        }
        c
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: char) -> Result<(), PathQueryError> {
        if self.eat(expected) {
            Ok(())
        } else {
            match self.peek() {
                Some(found) => Err(self.error(format!("expected '{expected}', found '{found}'"))),
                None => Err(self.error(format!("expected '{expected}', found end of input"))),
            }
        }
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
    }

    fn parse(mut self) -> Result<Vec<Segment>, PathQueryError> {
        if self.chars.is_empty() {
            return Err(self.error("expression is empty"));
        }
        self.expect('$')?;

        let mut segments = Vec::new();
        while let Some(c) = self.peek() {
            match c {
                '.' => {
                    self.pos += 1;
                    if self.eat('*') {
                        segments.push(Segment::Wildcard);
                    } else if self.peek() == Some('.') {
                        return Err(self.error("recursive descent is not supported"));
                    } else {
                        segments.push(Segment::Field(self.name()?));
                    }
                }
                '[' => {
                    self.pos += 1;
                    segments.push(self.bracket()?);
                }
                other => return Err(self.error(format!("unexpected character '{other}'"))),
            }
        }
        Ok(segments)
    }

    fn name(&mut self) -> Result<String, PathQueryError> {
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|c| c.is_alphanumeric() || c == '_' || c == '-')
        {
            self.pos += 1;
        }
        if self.pos == start {
            return Err(self.error("expected a member name"));
        }
        Ok(self.chars[start..self.pos].iter().collect())
    }

    fn quoted(&mut self) -> Result<String, PathQueryError> {
        let quote = match self.bump() {
            Some(q @ ('\'' | '"')) => q,
            _ => return Err(self.error("expected a quoted string")),
        };
        let mut out = String::new();
        loop {
            match self.bump() {
                Some('\\') => match self.bump() {
                    Some(escaped) => out.push(escaped),
                    None => return Err(self.error("unterminated escape")),
                },
                Some(c) if c == quote => return Ok(out),
                Some(c) => out.push(c),
                None => return Err(self.error("unterminated string")),
            }
        }
    }

    fn integer(&mut self) -> Result<i64, PathQueryError> {
        let start = self.pos;
        self.eat('-');
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.pos += 1;
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        text.parse::<i64>()
            .map_err(|_| self.error(format!("invalid index '{text}'")))
    }

    fn bracket(&mut self) -> Result<Segment, PathQueryError> {
        self.skip_ws();
        let segment = match self.peek() {
            Some('*') => {
                self.pos += 1;
                Segment::Wildcard
            }
            Some('\'' | '"') => Segment::Field(self.quoted()?),
            Some('?') => {
                self.pos += 1;
                self.expect('(')?;
                let filter = self.filter()?;
                self.expect(')')?;
                Segment::Filter(filter)
            }
            Some(c) if c == '-' || c.is_ascii_digit() => Segment::Index(self.integer()?),
            Some(other) => return Err(self.error(format!("unexpected character '{other}'"))),
            None => return Err(self.error("unterminated bracket")),
        };
        self.skip_ws();
        self.expect(']')?;
        Ok(segment)
    }

    fn filter(&mut self) -> Result<Filter, PathQueryError> {
        self.skip_ws();
        self.expect('@')?;

        let mut path = Vec::new();
        loop {
            match self.peek() {
                Some('.') => {
                    self.pos += 1;
                    path.push(self.name()?);
                }
                Some('[') => {
                    self.pos += 1;
                    self.skip_ws();
                    path.push(self.quoted()?);
                    self.skip_ws();
                    self.expect(']')?;
                }
                _ => break,
            }
        }

        self.skip_ws();
        if self.peek() == Some(')') {
            return Ok(Filter {
                path,
                comparison: None,
            });
        }

        let op = self.operator()?;
        self.skip_ws();
        let literal = self.literal()?;
        self.skip_ws();
        Ok(Filter {
            path,
            comparison: Some((op, literal)),
        })
    }

    fn operator(&mut self) -> Result<CmpOp, PathQueryError> {
        let op = match (self.peek(), self.chars.get(self.pos + 1).copied()) {
            (Some('='), Some('=')) => CmpOp::Eq,
            (Some('!'), Some('=')) => CmpOp::Ne,
            (Some('<'), Some('=')) => CmpOp::Le,
            (Some('>'), Some('=')) => CmpOp::Ge,
            (Some('<'), _) => CmpOp::Lt,
            (Some('>'), _) => CmpOp::Gt,
            _ => return Err(self.error("expected a comparison operator")),
        };
        self.pos += match op {
            CmpOp::Lt | CmpOp::Gt => 1,
            _ => 2,
        };
        Ok(op)
    }

    fn literal(&mut self) -> Result<Literal, PathQueryError> {
        match self.peek() {
            Some('\'' | '"') => Ok(Literal::Str(self.quoted()?)),
            Some(c) if c == '-' || c.is_ascii_digit() => {
                let start = self.pos;
                self.pos += 1;
                while self
                    .peek()
                    .is_some_and(|c| c.is_ascii_digit() || c == '.')
                {
                    self.pos += 1;
                }
                let text: String = self.chars[start..self.pos].iter().collect();
                text.parse::<f64>()
                    .map(Literal::Num)
                    .map_err(|_| self.error(format!("invalid number '{text}'")))
            }
            Some(c) if c.is_ascii_alphabetic() => {
                let word = self.name()?;
                match word.as_str() {
                    "true" => Ok(Literal::Bool(true)),
                    "false" => Ok(Literal::Bool(false)),
                    "null" => Ok(Literal::Null),
                    _ => Err(self.error(format!("unknown literal '{word}'"))),
                }
            }
            _ => Err(self.error("expected a literal")),
        }
    }
}
