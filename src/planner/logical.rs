//! Logical query input and predicate classification.
//!
//! The query layer hands the optimizer a resolved [`LogicalQuery`]; this
//! module typechecks its predicates against the catalog schemas and splits
//! them into per-table filters, two-table join predicates, and residuals.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::catalog::TableSchema;
use crate::expr::{BinaryOp, ColumnRef, Expr};
use crate::planner::{PlanError, PlanResult};
use crate::types::ValueType;

/// A table reference with its alias.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableRef {
    pub name: String,
    pub alias: String,
}

impl TableRef {
    pub fn new(name: impl Into<String>, alias: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            alias: alias.into(),
        }
    }

    /// A table referenced without an explicit alias.
    pub fn bare(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            alias: name.clone(),
            name,
        }
    }
}

/// Immutable optimizer input: tables in declaration order, the WHERE
/// conjunction, and the projected expressions (empty means all columns).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogicalQuery {
    pub tables: Vec<TableRef>,
    #[serde(default)]
    pub predicates: Vec<Expr>,
    #[serde(default)]
    pub projections: Vec<Expr>,
}

impl LogicalQuery {
    pub fn new(tables: Vec<TableRef>) -> Self {
        Self {
            tables,
            predicates: Vec::new(),
            projections: Vec::new(),
        }
    }

    pub fn filter(mut self, predicate: Expr) -> Self {
        self.predicates.push(predicate);
        self
    }

    pub fn project(mut self, expr: Expr) -> Self {
        self.projections.push(expr);
        self
    }

    pub fn aliases(&self) -> Vec<&str> {
        self.tables.iter().map(|t| t.alias.as_str()).collect()
    }
}

/// A predicate relating exactly two tables.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinPredicate {
    pub expr: Expr,
    pub left_table: String,
    pub right_table: String,
    /// Populated when the predicate is `column = column`.
    pub equi: Option<(ColumnRef, ColumnRef)>,
}

impl JoinPredicate {
    pub fn is_equi(&self) -> bool {
        self.equi.is_some()
    }

    /// The equi-join key on the side of `alias`, if any.
    pub fn key_for(&self, alias: &str) -> Option<&ColumnRef> {
        let (l, r) = self.equi.as_ref()?;
        if l.table == alias {
            Some(l)
        } else if r.table == alias {
            Some(r)
        } else {
            None
        }
    }

    /// The equi-join key on the other side of `alias`, if any.
    pub fn key_opposite(&self, alias: &str) -> Option<&ColumnRef> {
        let (l, r) = self.equi.as_ref()?;
        if l.table == alias {
            Some(r)
        } else if r.table == alias {
            Some(l)
        } else {
            None
        }
    }
}

/// The query's predicates split by the tables they touch.
#[derive(Debug, Default)]
pub struct ClassifiedPredicates {
    /// Single-table conjuncts, keyed by alias.
    pub local: HashMap<String, Vec<Expr>>,
    /// Two-table conjuncts, in appearance order.
    pub joins: Vec<JoinPredicate>,
    /// Conjuncts touching three or more tables; applied at the first join
    /// whose inputs cover them.
    pub residual: Vec<Expr>,
}

impl ClassifiedPredicates {
    pub fn local_for(&self, alias: &str) -> &[Expr] {
        self.local.get(alias).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Split each predicate's conjuncts by referenced-table count.
pub fn classify(query: &LogicalQuery) -> ClassifiedPredicates {
    let mut out = ClassifiedPredicates::default();
    for pred in &query.predicates {
        for part in pred.conjunctive_parts() {
            let tables = part.referenced_tables();
            match tables.len() {
                0 | 1 => {
                    // constant predicates attach to the first table
                    let alias = tables
                        .iter()
                        .next()
                        .cloned()
                        .or_else(|| query.tables.first().map(|t| t.alias.clone()));
                    if let Some(alias) = alias {
                        out.local.entry(alias).or_default().push(part.clone());
                    }
                }
                2 => {
                    let mut iter = tables.iter();
                    let (a, b) = (iter.next().cloned(), iter.next().cloned());
                    let equi = part.columns_joining().and_then(|(l, op, r)| {
                        (op == BinaryOp::Eq).then(|| (l.clone(), r.clone()))
                    });
                    out.joins.push(JoinPredicate {
                        expr: part.clone(),
                        left_table: a.unwrap_or_default(),
                        right_table: b.unwrap_or_default(),
                        equi,
                    });
                }
                _ => out.residual.push(part.clone()),
            }
        }
    }
    out
}

/// Infer the type of an expression, checking coercibility as we go.
pub fn expr_type(expr: &Expr, schemas: &HashMap<String, TableSchema>) -> PlanResult<ValueType> {
    match expr {
        Expr::Column(col) => {
            let schema = schemas
                .get(&col.table)
                .ok_or_else(|| PlanError::TableNotFound(col.table.clone()))?;
            schema
                .column_type(&col.column)
                .ok_or_else(|| PlanError::ColumnNotFound(col.to_string()))
        }
        Expr::Literal(v) => Ok(v.value_type()),
        Expr::BinaryOp { left, op, right } => {
            let lt = expr_type(left, schemas)?;
            let rt = expr_type(right, schemas)?;
            match op {
                BinaryOp::And | BinaryOp::Or => {
                    if lt == ValueType::Boolean && rt == ValueType::Boolean {
                        Ok(ValueType::Boolean)
                    } else {
                        Err(type_mismatch(lt, rt, expr))
                    }
                }
                op if op.is_comparison() => {
                    if lt.comparable_with(rt) {
                        Ok(ValueType::Boolean)
                    } else {
                        Err(type_mismatch(lt, rt, expr))
                    }
                }
                // arithmetic: both sides must coerce to a numeric type
                _ => {
                    if lt.implicitly_casts_to(ValueType::Float)
                        && rt.implicitly_casts_to(ValueType::Float)
                    {
                        if lt == ValueType::Float || rt == ValueType::Float {
                            Ok(ValueType::Float)
                        } else {
                            Ok(ValueType::Integer)
                        }
                    } else {
                        Err(type_mismatch(lt, rt, expr))
                    }
                }
            }
        }
    }
}

fn type_mismatch(left: ValueType, right: ValueType, expr: &Expr) -> PlanError {
    PlanError::TypeMismatch {
        left,
        right,
        expr: expr.to_string(),
    }
}

/// Validate every predicate before optimization starts; a predicate is never
/// silently dropped.
pub fn typecheck(query: &LogicalQuery, schemas: &HashMap<String, TableSchema>) -> PlanResult<()> {
    for pred in &query.predicates {
        let t = expr_type(pred, schemas)?;
        if t != ValueType::Boolean {
            return Err(PlanError::TypeMismatch {
                left: t,
                right: ValueType::Boolean,
                expr: pred.to_string(),
            });
        }
    }
    for proj in &query.projections {
        expr_type(proj, schemas)?;
    }
    Ok(())
}
