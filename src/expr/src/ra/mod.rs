// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! The relational-algebra IR.
//!
//! A [`Program`] owns a relation table and a root [`Statement`], typically a
//! sequence of [`Query`] roots. Each query owns a single [`Operation`] tree:
//! searches introduce loop variables identified by their nesting depth,
//! filters guard their inner operation, and projections terminate the nest.
//!
//! Relations are referenced by [`RelId`] handles into the program-owned
//! table; nodes never own or point back at relations, so rewrites move plain
//! values with no aliasing.

mod expr;

use std::fmt;

use itertools::Itertools;
use serde::{Deserialize, Serialize};

pub use expr::{Condition, Expression, Level};

/// A handle to a relation in the program's relation table.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct RelId(pub usize);

/// A relation declaration.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Relation {
    /// The relation's name.
    pub name: String,
    /// Number of columns.
    pub arity: usize,
}

/// A relational-algebra program.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Program {
    /// The relation table; [`RelId`]s index into it.
    pub relations: Vec<Relation>,
    /// The root statement.
    pub main: Statement,
}

impl Program {
    /// Creates a program over an empty relation table.
    pub fn new(main: Statement) -> Program {
        Program {
            relations: Vec::new(),
            main,
        }
    }

    /// Adds a relation to the table and returns its handle.
    pub fn declare(&mut self, name: impl Into<String>, arity: usize) -> RelId {
        self.relations.push(Relation {
            name: name.into(),
            arity,
        });
        RelId(self.relations.len() - 1)
    }

    /// Looks up a relation by handle.
    pub fn relation(&self, id: RelId) -> &Relation {
        self.relations
            .get(id.0)
            .expect("relation handle references a relation missing from the program")
    }
}

/// A statement of the program body.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Statement {
    /// Sub-statements executed in order.
    Sequence(Vec<Statement>),
    /// A single query.
    Query(Query),
}

impl Statement {
    /// Applies `f` to every query under this statement.
    pub fn for_each_query(&self, f: &mut impl FnMut(&Query)) {
        match self {
            Statement::Sequence(statements) => {
                for statement in statements {
                    statement.for_each_query(f);
                }
            }
            Statement::Query(query) => f(query),
        }
    }

    /// Applies `f` to every query under this statement, mutably.
    pub fn for_each_query_mut(&mut self, f: &mut impl FnMut(&mut Query)) {
        match self {
            Statement::Sequence(statements) => {
                for statement in statements {
                    statement.for_each_query_mut(f);
                }
            }
            Statement::Query(query) => f(query),
        }
    }
}

/// One query: an operation nest deriving tuples into some relation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Query {
    /// The root operation.
    pub operation: Operation,
}

/// An operation of a query nest.
///
/// Scan, index scan, and unpack are the *searches*: each binds a tuple under
/// a loop identifier equal to its nesting depth (0 outermost). Identifiers
/// are unique along any root-to-leaf path. Project and return terminate the
/// nest.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operation {
    /// Iterates over all tuples of a relation.
    Scan {
        /// The scanned relation.
        rel: RelId,
        /// Loop identifier bound by this search.
        identifier: usize,
        /// The operation executed per tuple.
        inner: Box<Operation>,
        /// Profiling label carried from the source rule, if any.
        profile_text: Option<String>,
    },
    /// Iterates over the tuples of a relation matching a query pattern; a
    /// `Some(expr)` entry constrains that column to equal the expression.
    /// The pattern length equals the relation's arity.
    IndexScan {
        /// The scanned relation.
        rel: RelId,
        /// Loop identifier bound by this search.
        identifier: usize,
        /// Per-column equality pattern.
        pattern: Vec<Option<Expression>>,
        /// The operation executed per matching tuple.
        inner: Box<Operation>,
        /// Profiling label carried from the source rule, if any.
        profile_text: Option<String>,
    },
    /// Unpacks a record value into a tuple bound under a fresh identifier.
    UnpackRecord {
        /// The record to unpack.
        expr: Expression,
        /// Loop identifier bound by this search.
        identifier: usize,
        /// Number of record fields.
        arity: usize,
        /// The operation executed on the unpacked tuple.
        inner: Box<Operation>,
    },
    /// Executes the inner operation only when the condition holds.
    Filter {
        /// The guarding condition.
        condition: Condition,
        /// The guarded operation.
        inner: Box<Operation>,
        /// Profiling label carried from the source rule, if any.
        profile_text: Option<String>,
    },
    /// Emits a tuple of values into a relation.
    Project {
        /// The target relation.
        rel: RelId,
        /// The projected values.
        values: Vec<Expression>,
    },
    /// Returns a tuple of values to the caller of a subroutine query.
    Return {
        /// The returned values.
        values: Vec<Expression>,
    },
}

impl Operation {
    /// Shorthand for a [`Operation::Scan`] without profiling text.
    pub fn scan(rel: RelId, identifier: usize, inner: Operation) -> Operation {
        Operation::Scan {
            rel,
            identifier,
            inner: Box::new(inner),
            profile_text: None,
        }
    }

    /// Shorthand for a [`Operation::Filter`] without profiling text.
    pub fn filter(condition: Condition, inner: Operation) -> Operation {
        Operation::Filter {
            condition,
            inner: Box::new(inner),
            profile_text: None,
        }
    }

    /// Shorthand for a [`Operation::Project`].
    pub fn project(rel: RelId, values: Vec<Expression>) -> Operation {
        Operation::Project { rel, values }
    }

    /// The loop identifier bound by this operation, for searches.
    pub fn identifier(&self) -> Option<usize> {
        match self {
            Operation::Scan { identifier, .. }
            | Operation::IndexScan { identifier, .. }
            | Operation::UnpackRecord { identifier, .. } => Some(*identifier),
            _ => None,
        }
    }

    /// True for searches over a relation (scan and index scan).
    pub fn is_relation_search(&self) -> bool {
        matches!(
            self,
            Operation::Scan { .. } | Operation::IndexScan { .. }
        )
    }

    /// The operation nested inside this one, if it has one.
    pub fn inner(&self) -> Option<&Operation> {
        match self {
            Operation::Scan { inner, .. }
            | Operation::IndexScan { inner, .. }
            | Operation::UnpackRecord { inner, .. }
            | Operation::Filter { inner, .. } => Some(inner),
            Operation::Project { .. } | Operation::Return { .. } => None,
        }
    }

    /// Takes ownership of this operation, leaving an empty return in its
    /// place. The caller is responsible for replacing the remnant with
    /// something meaningful.
    pub fn take_dangerous(&mut self) -> Operation {
        std::mem::replace(self, Operation::Return { values: Vec::new() })
    }

    /// Visits this operation and all nested operations, pre-order.
    pub fn visit<F>(&self, f: &mut F)
    where
        F: FnMut(&Operation),
    {
        f(self);
        if let Some(inner) = self.inner() {
            inner.visit(f);
        }
    }

    /// Visits every expression in this operation nest: index patterns,
    /// filter conditions (including existence-check patterns), unpack
    /// sources, and projected values.
    pub fn visit_expressions<F>(&self, f: &mut F)
    where
        F: FnMut(&Expression),
    {
        self.visit(&mut |operation| match operation {
            Operation::Scan { .. } => {}
            Operation::IndexScan { pattern, .. } => {
                for expr in pattern.iter().flatten() {
                    f(expr);
                }
            }
            Operation::UnpackRecord { expr, .. } => f(expr),
            Operation::Filter { condition, .. } => condition.visit_expressions(f),
            Operation::Project { values, .. } | Operation::Return { values } => {
                for expr in values {
                    f(expr);
                }
            }
        });
    }

    /// Maps the operation nest through `f`, transferring ownership.
    ///
    /// Each node is offered to `f` *before* descent; the children of the
    /// node `f` returns are then mapped recursively, so parents see their
    /// children's rewritten form and every node of the result has been
    /// offered exactly once. The `bool` results are or-ed upward.
    pub fn map<F>(self, f: &mut F) -> (Operation, bool)
    where
        F: FnMut(Operation) -> (Operation, bool),
    {
        let (operation, mut changed) = f(self);
        let operation = match operation {
            Operation::Scan {
                rel,
                identifier,
                inner,
                profile_text,
            } => {
                let (inner, inner_changed) = inner.map(f);
                changed |= inner_changed;
                Operation::Scan {
                    rel,
                    identifier,
                    inner: Box::new(inner),
                    profile_text,
                }
            }
            Operation::IndexScan {
                rel,
                identifier,
                pattern,
                inner,
                profile_text,
            } => {
                let (inner, inner_changed) = inner.map(f);
                changed |= inner_changed;
                Operation::IndexScan {
                    rel,
                    identifier,
                    pattern,
                    inner: Box::new(inner),
                    profile_text,
                }
            }
            Operation::UnpackRecord {
                expr,
                identifier,
                arity,
                inner,
            } => {
                let (inner, inner_changed) = inner.map(f);
                changed |= inner_changed;
                Operation::UnpackRecord {
                    expr,
                    identifier,
                    arity,
                    inner: Box::new(inner),
                }
            }
            Operation::Filter {
                condition,
                inner,
                profile_text,
            } => {
                let (inner, inner_changed) = inner.map(f);
                changed |= inner_changed;
                Operation::Filter {
                    condition,
                    inner: Box::new(inner),
                    profile_text,
                }
            }
            leaf @ (Operation::Project { .. } | Operation::Return { .. }) => leaf,
        };
        (operation, changed)
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.fmt_statement(&self.main, f, 0)
    }
}

impl Program {
    fn fmt_statement(
        &self,
        statement: &Statement,
        f: &mut fmt::Formatter,
        indent: usize,
    ) -> fmt::Result {
        match statement {
            Statement::Sequence(statements) => {
                for statement in statements {
                    self.fmt_statement(statement, f, indent)?;
                }
                Ok(())
            }
            Statement::Query(query) => {
                writeln!(f, "{:indent$}QUERY", "", indent = indent)?;
                self.fmt_operation(&query.operation, f, indent + 2)
            }
        }
    }

    fn fmt_operation(
        &self,
        operation: &Operation,
        f: &mut fmt::Formatter,
        indent: usize,
    ) -> fmt::Result {
        write!(f, "{:indent$}", "", indent = indent)?;
        match operation {
            Operation::Scan {
                rel, identifier, ..
            } => writeln!(f, "FOR t{} IN {}", identifier, self.relation(*rel).name)?,
            Operation::IndexScan {
                rel,
                identifier,
                pattern,
                ..
            } => writeln!(
                f,
                "FOR t{} IN {} ON INDEX ({})",
                identifier,
                self.relation(*rel).name,
                self.fmt_pattern(pattern),
            )?,
            Operation::UnpackRecord {
                expr, identifier, ..
            } => writeln!(f, "UNPACK t{} FROM {}", identifier, expr)?,
            Operation::Filter { condition, .. } => {
                writeln!(f, "IF {}", self.fmt_condition(condition))?
            }
            Operation::Project { rel, values } => writeln!(
                f,
                "PROJECT ({}) INTO {}",
                values.iter().join(", "),
                self.relation(*rel).name,
            )?,
            Operation::Return { values } => {
                writeln!(f, "RETURN ({})", values.iter().join(", "))?
            }
        }
        if let Some(inner) = operation.inner() {
            self.fmt_operation(inner, f, indent + 2)?;
        }
        Ok(())
    }

    fn fmt_condition(&self, condition: &Condition) -> String {
        match condition {
            Condition::Conjunction(lhs, rhs) => format!(
                "{} AND {}",
                self.fmt_condition(lhs),
                self.fmt_condition(rhs)
            ),
            Condition::Negation(inner) => format!("NOT {}", self.fmt_condition(inner)),
            Condition::Constraint { op, lhs, rhs } => format!("({} {} {})", lhs, op, rhs),
            Condition::EmptinessCheck(rel) => {
                format!("({} = EMPTY)", self.relation(*rel).name)
            }
            Condition::ExistenceCheck(rel, pattern) => format!(
                "({}) IN {}",
                self.fmt_pattern(pattern),
                self.relation(*rel).name
            ),
        }
    }

    fn fmt_pattern(&self, pattern: &[Option<Expression>]) -> String {
        pattern
            .iter()
            .map(|entry| match entry {
                Some(expr) => expr.to_string(),
                None => "_".to_string(),
            })
            .join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_program() -> Program {
        let mut program = Program::new(Statement::Sequence(Vec::new()));
        let edge = program.declare("edge", 2);
        let reach = program.declare("reach", 1);
        program.main = Statement::Sequence(vec![Statement::Query(Query {
            operation: Operation::scan(
                edge,
                0,
                Operation::filter(
                    Condition::eq(Expression::access(0, 0), Expression::Number(1)),
                    Operation::project(reach, vec![Expression::access(0, 1)]),
                ),
            ),
        })]);
        program
    }

    #[test]
    fn mapper_offers_every_node_exactly_once() {
        let mut program = sample_program();
        let mut offered = 0;
        program.main.for_each_query_mut(&mut |query| {
            let (op, changed) = query.operation.take_dangerous().map(&mut |op| {
                offered += 1;
                (op, false)
            });
            assert!(!changed);
            query.operation = op;
        });
        // Scan, Filter, Project.
        assert_eq!(offered, 3);
    }

    #[test]
    fn mapper_threads_changed_upward() {
        let mut program = sample_program();
        program.main.for_each_query_mut(&mut |query| {
            let (op, changed) = query.operation.take_dangerous().map(&mut |op| match op {
                Operation::Filter { inner, .. } => (*inner, true),
                other => (other, false),
            });
            assert!(changed);
            query.operation = op;
        });
        let expected = {
            let mut program = Program::new(Statement::Sequence(Vec::new()));
            let edge = program.declare("edge", 2);
            let reach = program.declare("reach", 1);
            program.main = Statement::Sequence(vec![Statement::Query(Query {
                operation: Operation::scan(
                    edge,
                    0,
                    Operation::project(reach, vec![Expression::access(0, 1)]),
                ),
            })]);
            program
        };
        assert_eq!(program, expected);
    }

    #[test]
    fn deep_clone_is_structural() {
        let program = sample_program();
        let clone = program.clone();
        assert_eq!(program, clone);
    }

    #[test]
    fn visit_expressions_reaches_patterns_and_conditions() {
        let mut program = Program::new(Statement::Sequence(Vec::new()));
        let edge = program.declare("edge", 2);
        let reach = program.declare("reach", 1);
        let operation = Operation::IndexScan {
            rel: edge,
            identifier: 0,
            pattern: vec![Some(Expression::Number(3)), None],
            inner: Box::new(Operation::filter(
                Condition::ExistenceCheck(edge, vec![Some(Expression::access(0, 1)), None]),
                Operation::project(reach, vec![Expression::access(0, 0)]),
            )),
            profile_text: None,
        };
        let mut seen = Vec::new();
        operation.visit_expressions(&mut |expr| seen.push(expr.clone()));
        assert_eq!(
            seen,
            vec![
                Expression::Number(3),
                Expression::access(0, 1),
                Expression::access(0, 0),
            ],
        );
    }
}
