//! Value types supported by the optimizer's predicate and statistics math.
//!
//! The ordering of [`ValueType`] variants reflects implicit-cast precedence:
//! when a comparison combines two types, the lower-precedence side is cast up
//! (Boolean -> Integer -> Float). Varchar never coerces to a numeric type.

use serde::{Deserialize, Serialize};

/// Column/literal type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    Float,
    Integer,
    Boolean,
    Varchar,
}

impl ValueType {
    /// Check if a value of this type can be implicitly cast to `other`.
    pub fn implicitly_casts_to(self, other: ValueType) -> bool {
        if self == other {
            return true;
        }
        matches!(
            (self, other),
            (ValueType::Boolean, ValueType::Integer)
                | (ValueType::Boolean, ValueType::Float)
                | (ValueType::Integer, ValueType::Float)
        )
    }

    /// Check if values of the two types can appear on either side of a
    /// comparison (after an implicit cast in one direction or the other).
    pub fn comparable_with(self, other: ValueType) -> bool {
        self.implicitly_casts_to(other) || other.implicitly_casts_to(self)
    }
}

impl std::fmt::Display for ValueType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ValueType::Float => "FLOAT",
            ValueType::Integer => "INTEGER",
            ValueType::Boolean => "BOOLEAN",
            ValueType::Varchar => "VARCHAR",
        };
        write!(f, "{}", name)
    }
}

/// A literal value as seen by the optimizer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Value {
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
}

impl Value {
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::Int(_) => ValueType::Integer,
            Value::Float(_) => ValueType::Float,
            Value::Bool(_) => ValueType::Boolean,
            Value::Str(_) => ValueType::Varchar,
        }
    }

    /// Numeric view of the value, with booleans coerced to 0/1.
    /// Strings have no numeric view.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Value::Str(_) => None,
        }
    }

    /// Canonical key for distinct-value counting: numeric values that compare
    /// equal map to the same key regardless of their concrete type.
    pub fn distinct_key(&self) -> DistinctKey {
        match self.as_f64() {
            Some(f) => DistinctKey::Num(f.to_bits()),
            None => match self {
                Value::Str(s) => DistinctKey::Str(s.clone()),
                // unreachable: every non-string value has a numeric view
                _ => DistinctKey::Num(0),
            },
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::Bool(b) => write!(f, "{}", if *b { "TRUE" } else { "FALSE" }),
            Value::Str(s) => write!(f, "'{}'", s),
        }
    }
}

/// Hashable identity of a value for ANALYZE's distinct counts.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DistinctKey {
    Num(u64),
    Str(String),
}
