// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! The rule IR.
//!
//! A [`Program`] holds a name-keyed relation table and a list of
//! [`Clause`]s. Clause bodies are ordered lists of [`Literal`]s: atoms,
//! negated atoms, and binary constraints. Arguments may be variables,
//! constants, records, functors, or aggregates.
//!
//! Generated names embed an `'@'`, which the surface syntax reserves, so
//! compiler-introduced relations and variables can never collide with user
//! names.

use std::collections::BTreeMap;
use std::fmt;

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::{AggregateOp, BinaryConstraintOp, IntrinsicOp};

/// A dot-qualified relation name.
#[derive(
    Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct QualifiedName {
    qualifiers: Vec<String>,
}

impl QualifiedName {
    /// Creates a name from its qualifier segments.
    pub fn new(qualifiers: Vec<String>) -> QualifiedName {
        assert!(!qualifiers.is_empty(), "qualified names have at least one segment");
        QualifiedName { qualifiers }
    }

    /// The qualifier segments.
    pub fn qualifiers(&self) -> &[String] {
        &self.qualifiers
    }

    /// The last (unqualified) segment.
    pub fn last(&self) -> &str {
        self.qualifiers.last().expect("names are non-empty")
    }

    /// A copy of this name with `suffix` appended to the last segment.
    pub fn with_suffix(&self, suffix: &str) -> QualifiedName {
        let mut name = self.clone();
        name.qualifiers
            .last_mut()
            .expect("names are non-empty")
            .push_str(suffix);
        name
    }

    /// A copy of this name with an extra leading qualifier.
    pub fn with_leading(&self, qualifier: &str) -> QualifiedName {
        let mut qualifiers = vec![qualifier.to_string()];
        qualifiers.extend(self.qualifiers.iter().cloned());
        QualifiedName { qualifiers }
    }
}

impl From<&str> for QualifiedName {
    fn from(name: &str) -> QualifiedName {
        QualifiedName::new(name.split('.').map(|part| part.to_string()).collect())
    }
}

impl From<String> for QualifiedName {
    fn from(name: String) -> QualifiedName {
        QualifiedName::from(name.as_str())
    }
}

impl fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.qualifiers.iter().join("."))
    }
}

/// A constant value.
#[derive(
    Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum Constant {
    /// A number.
    Number(i64),
    /// A string.
    Text(String),
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Constant::Number(n) => write!(f, "{}", n),
            Constant::Text(s) => write!(f, "{:?}", s),
        }
    }
}

/// A relation declaration.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Relation {
    /// The relation's name.
    pub name: QualifiedName,
    /// Number of arguments.
    pub arity: usize,
    /// True iff facts are read from the environment.
    pub is_input: bool,
    /// True iff derived tuples are reported to the environment.
    pub is_output: bool,
}

impl Relation {
    /// Creates an intermediate relation (neither input nor output).
    pub fn new(name: impl Into<QualifiedName>, arity: usize) -> Relation {
        Relation {
            name: name.into(),
            arity,
            is_input: false,
            is_output: false,
        }
    }

    /// Marks the relation as input.
    pub fn input(mut self) -> Relation {
        self.is_input = true;
        self
    }

    /// Marks the relation as output.
    pub fn output(mut self) -> Relation {
        self.is_output = true;
        self
    }
}

/// A rule-IR program.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Program {
    /// Relations by name.
    pub relations: BTreeMap<QualifiedName, Relation>,
    /// The program's clauses.
    pub clauses: Vec<Clause>,
}

impl Program {
    /// Creates an empty program.
    pub fn new() -> Program {
        Program::default()
    }

    /// Adds a relation declaration.
    pub fn add_relation(&mut self, relation: Relation) {
        self.relations.insert(relation.name.clone(), relation);
    }

    /// Looks up a relation by name.
    pub fn relation(&self, name: &QualifiedName) -> Option<&Relation> {
        self.relations.get(name)
    }

    /// The clauses whose head is the named relation.
    pub fn clauses_for<'a>(
        &'a self,
        name: &'a QualifiedName,
    ) -> impl Iterator<Item = &'a Clause> {
        self.clauses.iter().filter(move |clause| clause.head.name == *name)
    }

    /// True iff the named relation is the head of at least one clause.
    pub fn has_clauses(&self, name: &QualifiedName) -> bool {
        self.clauses_for(name).next().is_some()
    }
}

/// A clause: a head atom derived from a body of literals. A fact is a clause
/// with an empty body.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Clause {
    /// The derived atom.
    pub head: Atom,
    /// The literals that must hold for the head to be derived.
    pub body: Vec<Literal>,
}

impl Clause {
    /// Creates a clause.
    pub fn new(head: Atom, body: Vec<Literal>) -> Clause {
        Clause { head, body }
    }

    /// Creates a fact.
    pub fn fact(head: Atom) -> Clause {
        Clause {
            head,
            body: Vec::new(),
        }
    }

    /// The positive body atoms, in body order.
    pub fn positive_atoms(&self) -> impl Iterator<Item = &Atom> {
        self.body.iter().filter_map(|literal| match literal {
            Literal::Atom(atom) => Some(atom),
            _ => None,
        })
    }

    /// Visits every atom of the clause (head first), descending into
    /// negations and aggregate bodies.
    pub fn visit_atoms<F>(&self, f: &mut F)
    where
        F: FnMut(&Atom),
    {
        self.head.visit_atoms(f);
        for literal in &self.body {
            literal.visit_atoms(f);
        }
    }

    /// Mutable variant of [`Clause::visit_atoms`].
    pub fn visit_atoms_mut<F>(&mut self, f: &mut F)
    where
        F: FnMut(&mut Atom),
    {
        self.head.visit_atoms_mut(f);
        for literal in &mut self.body {
            literal.visit_atoms_mut(f);
        }
    }

    /// Visits every variable occurrence in the clause, including those
    /// inside aggregates.
    pub fn visit_variables<F>(&self, f: &mut F)
    where
        F: FnMut(&str),
    {
        for argument in &self.head.args {
            argument.visit_variables(f);
        }
        for literal in &self.body {
            literal.visit_variables(f);
        }
    }

    /// Visits every binary constraint in the clause, including those inside
    /// aggregate bodies.
    pub fn visit_constraints<F>(&self, f: &mut F)
    where
        F: FnMut(&BinaryConstraint),
    {
        for literal in &self.body {
            literal.visit_constraints(f);
        }
    }

    /// Visits every aggregate in the clause mutably, innermost first.
    pub fn visit_aggregates_post_mut<F>(&mut self, f: &mut F)
    where
        F: FnMut(&mut Aggregator),
    {
        for argument in &mut self.head.args {
            argument.visit_aggregates_post_mut(f);
        }
        for literal in &mut self.body {
            literal.visit_aggregates_post_mut(f);
        }
    }
}

impl fmt::Display for Clause {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.body.is_empty() {
            write!(f, "{}.", self.head)
        } else {
            write!(f, "{} :- {}.", self.head, self.body.iter().join(", "))
        }
    }
}

/// One literal of a clause body.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Literal {
    /// A positive atom.
    Atom(Atom),
    /// A negated atom.
    Negation(Atom),
    /// A binary constraint.
    Constraint(BinaryConstraint),
}

impl Literal {
    /// Visits every atom of the literal, descending into aggregate bodies.
    pub fn visit_atoms<F>(&self, f: &mut F)
    where
        F: FnMut(&Atom),
    {
        match self {
            Literal::Atom(atom) | Literal::Negation(atom) => atom.visit_atoms(f),
            Literal::Constraint(constraint) => {
                constraint.lhs.visit_atoms(f);
                constraint.rhs.visit_atoms(f);
            }
        }
    }

    /// Mutable variant of [`Literal::visit_atoms`].
    pub fn visit_atoms_mut<F>(&mut self, f: &mut F)
    where
        F: FnMut(&mut Atom),
    {
        match self {
            Literal::Atom(atom) | Literal::Negation(atom) => atom.visit_atoms_mut(f),
            Literal::Constraint(constraint) => {
                constraint.lhs.visit_atoms_mut(f);
                constraint.rhs.visit_atoms_mut(f);
            }
        }
    }

    /// Visits every variable occurrence in the literal.
    pub fn visit_variables<F>(&self, f: &mut F)
    where
        F: FnMut(&str),
    {
        match self {
            Literal::Atom(atom) | Literal::Negation(atom) => atom.visit_variables(f),
            Literal::Constraint(constraint) => {
                constraint.lhs.visit_variables(f);
                constraint.rhs.visit_variables(f);
            }
        }
    }

    /// Mutable variant of [`Literal::visit_variables`].
    pub fn visit_variables_mut<F>(&mut self, f: &mut F)
    where
        F: FnMut(&mut String),
    {
        match self {
            Literal::Atom(atom) | Literal::Negation(atom) => atom.visit_variables_mut(f),
            Literal::Constraint(constraint) => {
                constraint.lhs.visit_variables_mut(f);
                constraint.rhs.visit_variables_mut(f);
            }
        }
    }

    fn visit_constraints<F>(&self, f: &mut F)
    where
        F: FnMut(&BinaryConstraint),
    {
        match self {
            Literal::Atom(atom) | Literal::Negation(atom) => {
                for argument in &atom.args {
                    argument.visit_constraints(f);
                }
            }
            Literal::Constraint(constraint) => {
                f(constraint);
                constraint.lhs.visit_constraints(f);
                constraint.rhs.visit_constraints(f);
            }
        }
    }

    fn visit_aggregates_post_mut<F>(&mut self, f: &mut F)
    where
        F: FnMut(&mut Aggregator),
    {
        match self {
            Literal::Atom(atom) | Literal::Negation(atom) => {
                for argument in &mut atom.args {
                    argument.visit_aggregates_post_mut(f);
                }
            }
            Literal::Constraint(constraint) => {
                constraint.lhs.visit_aggregates_post_mut(f);
                constraint.rhs.visit_aggregates_post_mut(f);
            }
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Literal::Atom(atom) => write!(f, "{}", atom),
            Literal::Negation(atom) => write!(f, "!{}", atom),
            Literal::Constraint(constraint) => write!(f, "{}", constraint),
        }
    }
}

/// An atom: a relation applied to arguments.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Atom {
    /// The referenced relation.
    pub name: QualifiedName,
    /// The arguments.
    pub args: Vec<Argument>,
}

impl Atom {
    /// Creates an atom.
    pub fn new(name: impl Into<QualifiedName>, args: Vec<Argument>) -> Atom {
        Atom {
            name: name.into(),
            args,
        }
    }

    fn visit_atoms<F>(&self, f: &mut F)
    where
        F: FnMut(&Atom),
    {
        f(self);
        for argument in &self.args {
            argument.visit_atoms(f);
        }
    }

    fn visit_atoms_mut<F>(&mut self, f: &mut F)
    where
        F: FnMut(&mut Atom),
    {
        f(self);
        for argument in &mut self.args {
            argument.visit_atoms_mut(f);
        }
    }

    /// Visits every variable occurrence in the atom's arguments.
    pub fn visit_variables<F>(&self, f: &mut F)
    where
        F: FnMut(&str),
    {
        for argument in &self.args {
            argument.visit_variables(f);
        }
    }

    /// Mutable variant of [`Atom::visit_variables`].
    pub fn visit_variables_mut<F>(&mut self, f: &mut F)
    where
        F: FnMut(&mut String),
    {
        for argument in &mut self.args {
            argument.visit_variables_mut(f);
        }
    }
}

impl fmt::Display for Atom {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}({})", self.name, self.args.iter().join(", "))
    }
}

/// A binary constraint between two arguments.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BinaryConstraint {
    /// The comparison operator.
    pub op: BinaryConstraintOp,
    /// Left operand.
    pub lhs: Argument,
    /// Right operand.
    pub rhs: Argument,
}

impl BinaryConstraint {
    /// Shorthand for an equality constraint.
    pub fn eq(lhs: Argument, rhs: Argument) -> BinaryConstraint {
        BinaryConstraint {
            op: BinaryConstraintOp::Eq,
            lhs,
            rhs,
        }
    }

    /// True iff an aggregate occurs anywhere in the constraint.
    pub fn contains_aggregate(&self) -> bool {
        let mut found = false;
        for argument in [&self.lhs, &self.rhs] {
            argument.visit(&mut |arg| {
                if matches!(arg, Argument::Aggregate(_)) {
                    found = true;
                }
            });
        }
        found
    }
}

impl fmt::Display for BinaryConstraint {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} {} {}", self.lhs, self.op, self.rhs)
    }
}

/// An argument of an atom or constraint.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Argument {
    /// A named variable.
    Variable(String),
    /// A constant value.
    Constant(Constant),
    /// A record initialiser.
    Record(Vec<Argument>),
    /// A built-in functor applied to arguments.
    Functor {
        /// The functor.
        op: IntrinsicOp,
        /// The arguments.
        args: Vec<Argument>,
    },
    /// An aggregate producing a bound value.
    Aggregate(Box<Aggregator>),
}

impl Argument {
    /// Shorthand for a variable argument.
    pub fn var(name: impl Into<String>) -> Argument {
        Argument::Variable(name.into())
    }

    /// Shorthand for a numeric constant argument.
    pub fn number(value: i64) -> Argument {
        Argument::Constant(Constant::Number(value))
    }

    /// The variable name, if this argument is a variable.
    pub fn as_variable(&self) -> Option<&str> {
        match self {
            Argument::Variable(name) => Some(name),
            _ => None,
        }
    }

    /// Visits this argument and all sub-arguments, pre-order, descending
    /// into aggregate targets and bodies.
    pub fn visit<F>(&self, f: &mut F)
    where
        F: FnMut(&Argument),
    {
        f(self);
        match self {
            Argument::Variable(_) | Argument::Constant(_) => {}
            Argument::Record(args) | Argument::Functor { args, .. } => {
                for argument in args {
                    argument.visit(f);
                }
            }
            Argument::Aggregate(aggregate) => {
                if let Some(target) = &aggregate.target {
                    target.visit(f);
                }
                for literal in &aggregate.body {
                    match literal {
                        Literal::Atom(atom) | Literal::Negation(atom) => {
                            for argument in &atom.args {
                                argument.visit(f);
                            }
                        }
                        Literal::Constraint(constraint) => {
                            constraint.lhs.visit(f);
                            constraint.rhs.visit(f);
                        }
                    }
                }
            }
        }
    }

    /// Visits every variable occurrence in the argument.
    pub fn visit_variables<F>(&self, f: &mut F)
    where
        F: FnMut(&str),
    {
        self.visit(&mut |argument| {
            if let Argument::Variable(name) = argument {
                f(name);
            }
        });
    }

    /// Mutable variant of [`Argument::visit_variables`].
    pub fn visit_variables_mut<F>(&mut self, f: &mut F)
    where
        F: FnMut(&mut String),
    {
        match self {
            Argument::Variable(name) => f(name),
            Argument::Constant(_) => {}
            Argument::Record(args) | Argument::Functor { args, .. } => {
                for argument in args {
                    argument.visit_variables_mut(f);
                }
            }
            Argument::Aggregate(aggregate) => aggregate.visit_variables_mut(f),
        }
    }

    fn visit_atoms<F>(&self, f: &mut F)
    where
        F: FnMut(&Atom),
    {
        match self {
            Argument::Variable(_) | Argument::Constant(_) => {}
            Argument::Record(args) | Argument::Functor { args, .. } => {
                for argument in args {
                    argument.visit_atoms(f);
                }
            }
            Argument::Aggregate(aggregate) => {
                for literal in &aggregate.body {
                    literal.visit_atoms(f);
                }
            }
        }
    }

    fn visit_atoms_mut<F>(&mut self, f: &mut F)
    where
        F: FnMut(&mut Atom),
    {
        match self {
            Argument::Variable(_) | Argument::Constant(_) => {}
            Argument::Record(args) | Argument::Functor { args, .. } => {
                for argument in args {
                    argument.visit_atoms_mut(f);
                }
            }
            Argument::Aggregate(aggregate) => {
                for literal in &mut aggregate.body {
                    literal.visit_atoms_mut(f);
                }
            }
        }
    }

    fn visit_constraints<F>(&self, f: &mut F)
    where
        F: FnMut(&BinaryConstraint),
    {
        match self {
            Argument::Variable(_) | Argument::Constant(_) => {}
            Argument::Record(args) | Argument::Functor { args, .. } => {
                for argument in args {
                    argument.visit_constraints(f);
                }
            }
            Argument::Aggregate(aggregate) => {
                for literal in &aggregate.body {
                    literal.visit_constraints(f);
                }
            }
        }
    }

    fn visit_aggregates_post_mut<F>(&mut self, f: &mut F)
    where
        F: FnMut(&mut Aggregator),
    {
        match self {
            Argument::Variable(_) | Argument::Constant(_) => {}
            Argument::Record(args) | Argument::Functor { args, .. } => {
                for argument in args {
                    argument.visit_aggregates_post_mut(f);
                }
            }
            Argument::Aggregate(aggregate) => {
                if let Some(target) = &mut aggregate.target {
                    target.visit_aggregates_post_mut(f);
                }
                for literal in &mut aggregate.body {
                    literal.visit_aggregates_post_mut(f);
                }
                f(aggregate);
            }
        }
    }
}

impl fmt::Display for Argument {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Argument::Variable(name) => write!(f, "{}", name),
            Argument::Constant(constant) => write!(f, "{}", constant),
            Argument::Record(args) => write!(f, "[{}]", args.iter().join(", ")),
            Argument::Functor { op, args } => match args.as_slice() {
                [lhs, rhs] => write!(f, "({} {} {})", lhs, op, rhs),
                args => write!(f, "{}({})", op, args.iter().join(", ")),
            },
            Argument::Aggregate(aggregate) => write!(f, "{}", aggregate),
        }
    }
}

/// An aggregate over a sub-body, optionally reducing a target expression.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Aggregator {
    /// The aggregation operator.
    pub op: AggregateOp,
    /// The aggregated expression; `None` for plain counts.
    pub target: Option<Box<Argument>>,
    /// The literals the aggregate ranges over.
    pub body: Vec<Literal>,
}

impl Aggregator {
    /// Visits every variable occurrence in the aggregate (target and body),
    /// mutably.
    pub fn visit_variables_mut<F>(&mut self, f: &mut F)
    where
        F: FnMut(&mut String),
    {
        if let Some(target) = &mut self.target {
            target.visit_variables_mut(f);
        }
        for literal in &mut self.body {
            literal.visit_variables_mut(f);
        }
    }

    /// Read-only variant of [`Aggregator::visit_variables_mut`].
    pub fn visit_variables<F>(&self, f: &mut F)
    where
        F: FnMut(&str),
    {
        if let Some(target) = &self.target {
            target.visit_variables(f);
        }
        for literal in &self.body {
            literal.visit_variables(f);
        }
    }
}

impl fmt::Display for Aggregator {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.target {
            Some(target) => write!(f, "{} {}", self.op, target)?,
            None => write!(f, "{}", self.op)?,
        }
        write!(f, " : {{ {} }}", self.body.iter().join(", "))
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for relation in self.relations.values() {
            write!(f, ".decl {}/{}", relation.name, relation.arity)?;
            if relation.is_input {
                write!(f, " input")?;
            }
            if relation.is_output {
                write!(f, " output")?;
            }
            writeln!(f)?;
        }
        for clause in &self.clauses {
            writeln!(f, "{}", clause)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn qualified_name_algebra() {
        let name = QualifiedName::from("pkg.rel");
        assert_eq!(name.to_string(), "pkg.rel");
        assert_eq!(name.last(), "rel");
        assert_eq!(name.with_suffix("@neg").to_string(), "pkg.rel@neg");
        assert_eq!(name.with_leading("@magic").to_string(), "@magic.pkg.rel");
    }

    #[test]
    fn variable_renaming_reaches_aggregate_interiors() {
        let mut clause = Clause::new(
            Atom::new("total", vec![Argument::var("S")]),
            vec![Literal::Constraint(BinaryConstraint::eq(
                Argument::var("S"),
                Argument::Aggregate(Box::new(Aggregator {
                    op: AggregateOp::Sum,
                    target: Some(Box::new(Argument::var("X"))),
                    body: vec![Literal::Atom(Atom::new(
                        "r",
                        vec![Argument::var("X"), Argument::var("Y")],
                    ))],
                })),
            ))],
        );
        let mut renamed = 0;
        clause.visit_aggregates_post_mut(&mut |aggregate| {
            aggregate.visit_variables_mut(&mut |name| {
                if name == "X" {
                    *name = "Z".to_string();
                    renamed += 1;
                }
            });
        });
        assert_eq!(renamed, 2);
        let mut seen = Vec::new();
        clause.visit_variables(&mut |name| seen.push(name.to_string()));
        assert_eq!(seen, vec!["S", "S", "Z", "Z", "Y"]);
    }

    #[test]
    fn nested_aggregates_visit_innermost_first() {
        let inner = Aggregator {
            op: AggregateOp::Count,
            target: None,
            body: vec![Literal::Atom(Atom::new("r", vec![Argument::var("X")]))],
        };
        let outer = Aggregator {
            op: AggregateOp::Max,
            target: Some(Box::new(Argument::var("C"))),
            body: vec![Literal::Constraint(BinaryConstraint::eq(
                Argument::var("C"),
                Argument::Aggregate(Box::new(inner)),
            ))],
        };
        let mut clause = Clause::new(
            Atom::new("m", vec![Argument::var("M")]),
            vec![Literal::Constraint(BinaryConstraint::eq(
                Argument::var("M"),
                Argument::Aggregate(Box::new(outer)),
            ))],
        );
        let mut ops = Vec::new();
        clause.visit_aggregates_post_mut(&mut |aggregate| ops.push(aggregate.op));
        assert_eq!(ops, vec![AggregateOp::Count, AggregateOp::Max]);
    }

    #[test]
    fn constraint_aggregate_detection() {
        let plain = BinaryConstraint::eq(Argument::var("X"), Argument::number(1));
        assert!(!plain.contains_aggregate());
        let with_aggregate = BinaryConstraint::eq(
            Argument::var("X"),
            Argument::Aggregate(Box::new(Aggregator {
                op: AggregateOp::Count,
                target: None,
                body: Vec::new(),
            })),
        );
        assert!(with_aggregate.contains_aggregate());
    }

    #[test]
    fn clause_display() {
        let clause = Clause::new(
            Atom::new("path", vec![Argument::var("X"), Argument::var("Z")]),
            vec![
                Literal::Atom(Atom::new("path", vec![Argument::var("X"), Argument::var("Y")])),
                Literal::Atom(Atom::new("edge", vec![Argument::var("Y"), Argument::var("Z")])),
                Literal::Negation(Atom::new("blocked", vec![Argument::var("Z")])),
                Literal::Constraint(BinaryConstraint::eq(Argument::var("X"), Argument::number(1))),
            ],
        );
        assert_eq!(
            clause.to_string(),
            "path(X, Z) :- path(X, Y), edge(Y, Z), !blocked(Z), X = 1.",
        );
    }
}
