// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Value expressions and filter conditions of the relational-algebra IR.

use std::fmt;

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::ra::RelId;
use crate::{BinaryConstraintOp, IntrinsicOp};

/// The level of an expression or condition: the identifier of the deepest
/// search the node depends on, or `None` when it depends on no search at all
/// and is safe to evaluate before any loop.
///
/// `Option`'s ordering puts `None` below every `Some(i)`, so
/// `level < Some(identifier)` tests "computable outside the search
/// `identifier`" directly.
pub type Level = Option<usize>;

/// A value expression evaluated inside a query.
#[derive(
    Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum Expression {
    /// Reads one column of the tuple bound by the search with the given
    /// identifier.
    ElementAccess {
        /// Identifier of the search binding the tuple.
        identifier: usize,
        /// Column within the tuple.
        element: usize,
    },
    /// A numeric constant.
    Number(i64),
    /// A string constant.
    Text(String),
    /// A built-in operator applied to argument expressions.
    Intrinsic {
        /// The operator.
        op: IntrinsicOp,
        /// Argument expressions.
        args: Vec<Expression>,
    },
    /// A user-defined operator applied to argument expressions.
    UserDefined {
        /// Name of the operator.
        name: String,
        /// Argument expressions.
        args: Vec<Expression>,
    },
    /// Packs the argument expressions into a record value.
    PackRecord(Vec<Expression>),
}

impl Expression {
    /// Shorthand for an [`Expression::ElementAccess`].
    pub fn access(identifier: usize, element: usize) -> Expression {
        Expression::ElementAccess {
            identifier,
            element,
        }
    }

    /// The deepest search this expression depends on.
    pub fn level(&self) -> Level {
        match self {
            Expression::ElementAccess { identifier, .. } => Some(*identifier),
            Expression::Number(_) | Expression::Text(_) => None,
            Expression::Intrinsic { args, .. }
            | Expression::UserDefined { args, .. }
            | Expression::PackRecord(args) => {
                args.iter().filter_map(|arg| arg.level()).max()
            }
        }
    }

    /// True iff the expression contains no element access and therefore
    /// evaluates to the same value in every loop iteration.
    pub fn is_constant(&self) -> bool {
        self.level().is_none()
    }

    /// True iff some element access of the given search occurs in this
    /// expression, however deeply nested.
    pub fn depends_on(&self, identifier: usize) -> bool {
        let mut found = false;
        self.visit(&mut |expr| {
            if let Expression::ElementAccess { identifier: id, .. } = expr {
                if *id == identifier {
                    found = true;
                }
            }
        });
        found
    }

    /// Visits this expression and all sub-expressions, pre-order.
    pub fn visit<F>(&self, f: &mut F)
    where
        F: FnMut(&Expression),
    {
        f(self);
        match self {
            Expression::ElementAccess { .. }
            | Expression::Number(_)
            | Expression::Text(_) => {}
            Expression::Intrinsic { args, .. }
            | Expression::UserDefined { args, .. }
            | Expression::PackRecord(args) => {
                for arg in args {
                    arg.visit(f);
                }
            }
        }
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Expression::ElementAccess {
                identifier,
                element,
            } => write!(f, "t{}.{}", identifier, element),
            Expression::Number(n) => write!(f, "{}", n),
            Expression::Text(s) => write!(f, "{:?}", s),
            Expression::Intrinsic { op, args } => match args.as_slice() {
                [lhs, rhs] => write!(f, "({} {} {})", lhs, op, rhs),
                args => write!(f, "{}({})", op, args.iter().join(", ")),
            },
            Expression::UserDefined { name, args } => {
                write!(f, "{}({})", name, args.iter().join(", "))
            }
            Expression::PackRecord(args) => {
                write!(f, "[{}]", args.iter().join(", "))
            }
        }
    }
}

/// A filter condition.
///
/// Conjunctions are stored *verbose*: [`Condition::conjoin`] only ever grows
/// a chain along the left spine, and [`Condition::conjuncts`] enumerates that
/// chain back in left-to-right order. Passes rely on this convention; a
/// splitter pass must be interposed if an upstream transformer ever emits
/// balanced conjunction trees.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Condition {
    /// Both sub-conditions hold.
    Conjunction(Box<Condition>, Box<Condition>),
    /// The sub-condition does not hold.
    Negation(Box<Condition>),
    /// A binary comparison between two expressions.
    Constraint {
        /// The comparison operator.
        op: BinaryConstraintOp,
        /// Left operand.
        lhs: Expression,
        /// Right operand.
        rhs: Expression,
    },
    /// True iff the relation holds no tuples.
    EmptinessCheck(RelId),
    /// True iff the relation holds a tuple matching the pattern; unbound
    /// positions match any value.
    ExistenceCheck(RelId, Vec<Option<Expression>>),
}

impl Condition {
    /// Shorthand for an equality constraint.
    pub fn eq(lhs: Expression, rhs: Expression) -> Condition {
        Condition::Constraint {
            op: BinaryConstraintOp::Eq,
            lhs,
            rhs,
        }
    }

    /// Extends an accumulated condition with one more conjunct, growing the
    /// chain along the left spine.
    pub fn conjoin(accumulated: Option<Condition>, conjunct: Condition) -> Condition {
        match accumulated {
            None => conjunct,
            Some(condition) => {
                Condition::Conjunction(Box::new(condition), Box::new(conjunct))
            }
        }
    }

    /// Enumerates the conjuncts of a verbose conjunction chain, leftmost
    /// first.
    pub fn conjuncts(&self) -> Vec<&Condition> {
        let mut conjuncts = Vec::new();
        let mut condition = self;
        while let Condition::Conjunction(lhs, rhs) = condition {
            conjuncts.push(&**rhs);
            condition = lhs;
        }
        conjuncts.push(condition);
        conjuncts.reverse();
        conjuncts
    }

    /// Owned variant of [`Condition::conjuncts`].
    pub fn into_conjuncts(self) -> Vec<Condition> {
        let mut conjuncts = Vec::new();
        let mut condition = self;
        while let Condition::Conjunction(lhs, rhs) = condition {
            conjuncts.push(*rhs);
            condition = *lhs;
        }
        conjuncts.push(condition);
        conjuncts.reverse();
        conjuncts
    }

    /// The deepest search this condition depends on.
    pub fn level(&self) -> Level {
        match self {
            Condition::Conjunction(lhs, rhs) => lhs.level().max(rhs.level()),
            Condition::Negation(inner) => inner.level(),
            Condition::Constraint { lhs, rhs, .. } => lhs.level().max(rhs.level()),
            Condition::EmptinessCheck(_) => None,
            Condition::ExistenceCheck(_, pattern) => pattern
                .iter()
                .flatten()
                .filter_map(|expr| expr.level())
                .max(),
        }
    }

    /// True iff some element access of the given search occurs anywhere in
    /// this condition.
    pub fn depends_on(&self, identifier: usize) -> bool {
        let mut found = false;
        self.visit_expressions(&mut |expr| {
            if expr.depends_on(identifier) {
                found = true;
            }
        });
        found
    }

    /// Visits every expression held by this condition, including pattern
    /// entries of existence checks.
    pub fn visit_expressions<F>(&self, f: &mut F)
    where
        F: FnMut(&Expression),
    {
        match self {
            Condition::Conjunction(lhs, rhs) => {
                lhs.visit_expressions(f);
                rhs.visit_expressions(f);
            }
            Condition::Negation(inner) => inner.visit_expressions(f),
            Condition::Constraint { lhs, rhs, .. } => {
                f(lhs);
                f(rhs);
            }
            Condition::EmptinessCheck(_) => {}
            Condition::ExistenceCheck(_, pattern) => {
                for expr in pattern.iter().flatten() {
                    f(expr);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn access(identifier: usize, element: usize) -> Expression {
        Expression::access(identifier, element)
    }

    #[test]
    fn element_access_levels() {
        assert_eq!(access(2, 0).level(), Some(2));
        assert_eq!(Expression::Number(7).level(), None);
        let compound = Expression::Intrinsic {
            op: IntrinsicOp::Add,
            args: vec![access(0, 1), access(3, 0), Expression::Number(1)],
        };
        assert_eq!(compound.level(), Some(3));
        assert!(!compound.is_constant());
        assert!(Expression::PackRecord(vec![Expression::Number(1)]).is_constant());
    }

    #[test]
    fn levels_order_below_any_search() {
        // The OUTER sentinel must compare below every identifier.
        assert!(Expression::Number(7).level() < Some(0));
        assert!(access(1, 0).level() < Some(2));
        assert!(!(access(2, 0).level() < Some(2)));
    }

    #[test]
    fn condition_levels() {
        let outer = Condition::eq(Expression::Number(3), Expression::Number(3));
        assert_eq!(outer.level(), None);
        let bound = Condition::eq(access(1, 0), Expression::Number(3));
        assert_eq!(bound.level(), Some(1));
        let conj = Condition::conjoin(Some(outer), bound);
        assert_eq!(conj.level(), Some(1));
        assert_eq!(
            Condition::Negation(Box::new(Condition::EmptinessCheck(RelId(0)))).level(),
            None,
        );
        let exists = Condition::ExistenceCheck(RelId(0), vec![Some(access(0, 1)), None]);
        assert_eq!(exists.level(), Some(0));
    }

    #[test]
    fn conjuncts_enumerate_left_to_right() {
        let a = Condition::eq(access(0, 0), Expression::Number(1));
        let b = Condition::eq(access(0, 1), Expression::Number(2));
        let c = Condition::eq(access(0, 2), Expression::Number(3));
        let mut chain = None;
        for conjunct in [a.clone(), b.clone(), c.clone()] {
            chain = Some(Condition::conjoin(chain, conjunct));
        }
        let chain = chain.unwrap();
        assert_eq!(chain.conjuncts(), vec![&a, &b, &c]);
        assert_eq!(chain.clone().into_conjuncts(), vec![a, b, c]);
    }

    #[test]
    fn depends_on_reaches_nested_accesses() {
        let expr = Expression::UserDefined {
            name: "hash".into(),
            args: vec![Expression::PackRecord(vec![access(4, 0)])],
        };
        assert!(expr.depends_on(4));
        assert!(!expr.depends_on(3));
        let cond = Condition::ExistenceCheck(RelId(1), vec![None, Some(expr)]);
        assert!(cond.depends_on(4));
        assert!(!cond.depends_on(0));
    }
}
