//! Predicate evaluation for Filter and Join
//!
//! Supports: =, !=, >, <, >=, <=, LIKE. Both sides of a comparison must have
//! the same type; LIKE applies to text only (% any chars, _ single char).

use crate::core::{DatabaseError, Result, Row, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareOp {
    Equals,
    NotEquals,
    GreaterThan,
    LessThan,
    GreaterThanOrEq,
    LessThanOrEq,
    Like,
}

impl CompareOp {
    /// Evaluate `left <op> right`
    pub fn compare(self, left: &Value, right: &Value) -> Result<bool> {
        if left.data_type() != right.data_type() {
            return Err(DatabaseError::SchemaMismatch(format!(
                "cannot compare {} with {}",
                left.data_type(),
                right.data_type()
            )));
        }

        match self {
            Self::Equals => Ok(left == right),
            Self::NotEquals => Ok(left != right),
            Self::GreaterThan => Ok(left > right),
            Self::LessThan => Ok(left < right),
            Self::GreaterThanOrEq => Ok(left >= right),
            Self::LessThanOrEq => Ok(left <= right),
            Self::Like => match (left, right) {
                (Value::Text(text), Value::Text(pattern)) => Ok(like_pattern_match(text, pattern)),
                _ => Err(DatabaseError::InvalidArgument(format!(
                    "LIKE needs TEXT operands, got {}",
                    left.data_type()
                ))),
            },
        }
    }
}

impl std::fmt::Display for CompareOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let symbol = match self {
            Self::Equals => "=",
            Self::NotEquals => "<>",
            Self::GreaterThan => ">",
            Self::LessThan => "<",
            Self::GreaterThanOrEq => ">=",
            Self::LessThanOrEq => "<=",
            Self::Like => "LIKE",
        };
        write!(f, "{symbol}")
    }
}

/// Compares one field of a row against a constant
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Predicate {
    pub field: usize,
    pub op: CompareOp,
    pub operand: Value,
}

impl Predicate {
    #[must_use]
    pub const fn new(field: usize, op: CompareOp, operand: Value) -> Self {
        Self { field, op, operand }
    }

    pub fn filter(&self, row: &Row) -> Result<bool> {
        self.op.compare(row.get(self.field)?, &self.operand)
    }
}

impl std::fmt::Display for Predicate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "${} {} {}", self.field, self.op, self.operand)
    }
}

/// Compares a field of a left row with a field of a right row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoinPredicate {
    pub field1: usize,
    pub op: CompareOp,
    pub field2: usize,
}

impl JoinPredicate {
    #[must_use]
    pub const fn new(field1: usize, op: CompareOp, field2: usize) -> Self {
        Self { field1, op, field2 }
    }

    pub fn filter(&self, left: &Row, right: &Row) -> Result<bool> {
        self.op.compare(left.get(self.field1)?, right.get(self.field2)?)
    }
}

impl std::fmt::Display for JoinPredicate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "left.${} {} right.${}", self.field1, self.op, self.field2)
    }
}

/// Wildcard match that backtracks only to the most recent `%`
fn like_pattern_match(text: &str, pattern: &str) -> bool {
    let text: Vec<char> = text.chars().collect();
    let pattern: Vec<char> = pattern.chars().collect();

    let (mut t, mut p) = (0, 0);
    // Pattern index after the last `%`, and the text index it was tried at
    let mut retry: Option<(usize, usize)> = None;

    while t < text.len() {
        match pattern.get(p) {
            Some('%') => {
                p += 1;
                retry = Some((p, t));
            }
            Some('_') => {
                p += 1;
                t += 1;
            }
            Some(c) if *c == text[t] => {
                p += 1;
                t += 1;
            }
            _ => match retry {
                // Let the last `%` swallow one more char
                Some((star_p, star_t)) => {
                    p = star_p;
                    t = star_t + 1;
                    retry = Some((star_p, star_t + 1));
                }
                None => return false,
            },
        }
    }

    pattern[p..].iter().all(|c| *c == '%')
}
