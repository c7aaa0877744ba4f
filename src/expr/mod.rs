//! Predicate expression AST and the manipulation helpers the planner needs.
//!
//! Expressions arrive from the query layer already resolved: every column
//! reference is qualified with a table alias. The planner only decomposes,
//! classifies, and folds them; it never evaluates them against rows.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::types::Value;

/// Alias-qualified column reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ColumnRef {
    pub table: String,
    pub column: String,
}

impl ColumnRef {
    pub fn new(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            column: column.into(),
        }
    }
}

impl std::fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.table, self.column)
    }
}

/// Binary operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BinaryOp {
    Eq,
    Ne,
    Lt,
    Lte,
    Gt,
    Gte,
    And,
    Or,
    Add,
    Sub,
    Mul,
    Div,
}

impl BinaryOp {
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Lt | BinaryOp::Lte | BinaryOp::Gt | BinaryOp::Gte
        )
    }

    /// The comparison that holds when the operands are swapped.
    pub fn reversed(self) -> Self {
        match self {
            BinaryOp::Lt => BinaryOp::Gt,
            BinaryOp::Lte => BinaryOp::Gte,
            BinaryOp::Gt => BinaryOp::Lt,
            BinaryOp::Gte => BinaryOp::Lte,
            other => other,
        }
    }
}

/// Logical expression AST.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    /// Qualified column reference
    Column(ColumnRef),

    /// Literal value
    Literal(Value),

    /// Binary operation
    BinaryOp {
        left: Box<Expr>,
        op: BinaryOp,
        right: Box<Expr>,
    },
}

impl Expr {
    /// Create a qualified column reference.
    pub fn column(table: impl Into<String>, column: impl Into<String>) -> Self {
        Expr::Column(ColumnRef::new(table, column))
    }

    /// Create an integer literal.
    pub fn int(value: i64) -> Self {
        Expr::Literal(Value::Int(value))
    }

    /// Create a float literal.
    pub fn float(value: f64) -> Self {
        Expr::Literal(Value::Float(value))
    }

    /// Create a boolean literal.
    pub fn bool(value: bool) -> Self {
        Expr::Literal(Value::Bool(value))
    }

    /// Create a string literal.
    pub fn string(value: impl Into<String>) -> Self {
        Expr::Literal(Value::Str(value.into()))
    }

    /// Create a binary operation.
    pub fn binary(left: Expr, op: BinaryOp, right: Expr) -> Self {
        Expr::BinaryOp {
            left: Box::new(left),
            op,
            right: Box::new(right),
        }
    }

    /// Create an AND of two expressions.
    pub fn and(left: Expr, right: Expr) -> Self {
        Expr::binary(left, BinaryOp::And, right)
    }

    /// Decompose this expression into its conjunctive parts.
    ///
    /// Stops at any node that is not an AND; no normal-form conversion.
    pub fn conjunctive_parts(&self) -> Vec<&Expr> {
        let mut parts = Vec::new();
        self.collect_conjuncts(&mut parts);
        parts
    }

    fn collect_conjuncts<'a>(&'a self, parts: &mut Vec<&'a Expr>) {
        match self {
            Expr::BinaryOp {
                left,
                op: BinaryOp::And,
                right,
            } => {
                left.collect_conjuncts(parts);
                right.collect_conjuncts(parts);
            }
            other => parts.push(other),
        }
    }

    /// All table aliases referenced anywhere in this expression.
    pub fn referenced_tables(&self) -> BTreeSet<String> {
        let mut tables = BTreeSet::new();
        self.collect_tables(&mut tables);
        tables
    }

    fn collect_tables(&self, tables: &mut BTreeSet<String>) {
        match self {
            Expr::Column(col) => {
                tables.insert(col.table.clone());
            }
            Expr::Literal(_) => {}
            Expr::BinaryOp { left, right, .. } => {
                left.collect_tables(tables);
                right.collect_tables(tables);
            }
        }
    }

    /// Check if every column reference in this expression belongs to one of
    /// the given table aliases.
    pub fn in_scope(&self, aliases: &[&str]) -> bool {
        match self {
            Expr::Column(col) => aliases.contains(&col.table.as_str()),
            Expr::Literal(_) => true,
            Expr::BinaryOp { left, right, .. } => left.in_scope(aliases) && right.in_scope(aliases),
        }
    }

    /// Evaluate a column-free expression at plan time.
    ///
    /// Returns `None` if the expression references a column, mixes strings
    /// into arithmetic, or uses a logical operator.
    pub fn fold_literal(&self) -> Option<Value> {
        match self {
            Expr::Literal(v) => Some(v.clone()),
            Expr::Column(_) => None,
            Expr::BinaryOp { left, op, right } => {
                let l = left.fold_literal()?.as_f64()?;
                let r = right.fold_literal()?.as_f64()?;
                let result = match op {
                    BinaryOp::Add => l + r,
                    BinaryOp::Sub => l - r,
                    BinaryOp::Mul => l * r,
                    BinaryOp::Div => {
                        if r == 0.0 {
                            return None;
                        }
                        l / r
                    }
                    _ => return None,
                };
                // keep integer-valued arithmetic integral
                if result.fract() == 0.0 && result.abs() < i64::MAX as f64 {
                    Some(Value::Int(result as i64))
                } else {
                    Some(Value::Float(result))
                }
            }
        }
    }

    /// Check if this is "column compares with column-free expression" and
    /// return (column, comparison, folded value), flipping the comparison so
    /// the column is on the left.
    pub fn column_literal_bound(&self) -> Option<(&ColumnRef, BinaryOp, Value)> {
        let Expr::BinaryOp { left, op, right } = self else {
            return None;
        };
        if !op.is_comparison() {
            return None;
        }
        if let (Expr::Column(col), Some(value)) = (left.as_ref(), right.fold_literal()) {
            return Some((col, *op, value));
        }
        if let (Expr::Column(col), Some(value)) = (right.as_ref(), left.fold_literal()) {
            return Some((col, op.reversed(), value));
        }
        None
    }

    /// Check if this is "column from one table compares with column from
    /// another" and return (left column, comparison, right column).
    pub fn columns_joining(&self) -> Option<(&ColumnRef, BinaryOp, &ColumnRef)> {
        let Expr::BinaryOp { left, op, right } = self else {
            return None;
        };
        if !op.is_comparison() {
            return None;
        }
        if let (Expr::Column(l), Expr::Column(r)) = (left.as_ref(), right.as_ref()) {
            if l.table != r.table {
                return Some((l, *op, r));
            }
        }
        None
    }
}

impl std::fmt::Display for Expr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Expr::Column(col) => write!(f, "{}", col),
            Expr::Literal(v) => write!(f, "{}", v),
            Expr::BinaryOp { left, op, right } => {
                let symbol = match op {
                    BinaryOp::Eq => "=",
                    BinaryOp::Ne => "<>",
                    BinaryOp::Lt => "<",
                    BinaryOp::Lte => "<=",
                    BinaryOp::Gt => ">",
                    BinaryOp::Gte => ">=",
                    BinaryOp::And => "AND",
                    BinaryOp::Or => "OR",
                    BinaryOp::Add => "+",
                    BinaryOp::Sub => "-",
                    BinaryOp::Mul => "*",
                    BinaryOp::Div => "/",
                };
                write!(f, "({} {} {})", left, symbol, right)
            }
        }
    }
}

/// Construct a conjunction of the given conditions; `None` if empty.
pub fn make_conjunction(mut conds: Vec<Expr>) -> Option<Expr> {
    let first = if conds.is_empty() {
        return None;
    } else {
        conds.remove(0)
    };
    Some(conds.into_iter().fold(first, Expr::and))
}

/// Split `cond` into the parts evaluable over `aliases` and the remainder.
pub fn push_down(cond: &Expr, aliases: &[&str]) -> (Option<Expr>, Option<Expr>) {
    let mut pushed = Vec::new();
    let mut remaining = Vec::new();
    for part in cond.conjunctive_parts() {
        if part.in_scope(aliases) {
            pushed.push(part.clone());
        } else {
            remaining.push(part.clone());
        }
    }
    (make_conjunction(pushed), make_conjunction(remaining))
}
