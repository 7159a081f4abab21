// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Rewrites full scans into indexed lookups.
//!
//! A scan whose immediate child is a filter is inspected conjunct by
//! conjunct. An equality that pins one column of the scanned tuple to a
//! value computable outside the scan (a constant, or an expression of a
//! strictly lower level) moves into the query pattern of an index scan.
//! Conjuncts that bind no column, or that bind a column the pattern already
//! holds, stay behind in a residual filter: a duplicate equality is a
//! correctness check, not a redundant one, since its value may differ from
//! the first binding.

use dl_expr::ra::{Condition, Expression, Operation, Program, Relation};
use dl_expr::BinaryConstraintOp;

use crate::{TransformArgs, TransformError};

/// Replaces scans over filtered relations by index scans wherever equality
/// conjuncts bind columns of the scanned tuple.
#[derive(Debug)]
pub struct CreateIndices;

impl crate::Transform<Program> for CreateIndices {
    #[tracing::instrument(
        target = "optimizer",
        level = "trace",
        skip_all,
        fields(path.segment = "create_indices")
    )]
    fn transform(
        &self,
        program: &mut Program,
        _args: TransformArgs,
    ) -> Result<bool, TransformError> {
        let Program { relations, main } = program;
        let mut changed = false;
        main.for_each_query_mut(&mut |query| {
            let operation = query.operation.take_dangerous();
            query.operation = Self::apply_operation(operation, relations, &mut changed);
        });
        Ok(changed)
    }
}

impl CreateIndices {
    /// Rewrites scans bottom-up: children first, then the operation itself.
    fn apply_operation(
        operation: Operation,
        relations: &[Relation],
        changed: &mut bool,
    ) -> Operation {
        let operation = match operation {
            Operation::Scan {
                rel,
                identifier,
                inner,
                profile_text,
            } => Operation::Scan {
                rel,
                identifier,
                inner: Box::new(Self::apply_operation(*inner, relations, changed)),
                profile_text,
            },
            Operation::IndexScan {
                rel,
                identifier,
                pattern,
                inner,
                profile_text,
            } => Operation::IndexScan {
                rel,
                identifier,
                pattern,
                inner: Box::new(Self::apply_operation(*inner, relations, changed)),
                profile_text,
            },
            Operation::UnpackRecord {
                expr,
                identifier,
                arity,
                inner,
            } => Operation::UnpackRecord {
                expr,
                identifier,
                arity,
                inner: Box::new(Self::apply_operation(*inner, relations, changed)),
            },
            Operation::Filter {
                condition,
                inner,
                profile_text,
            } => Operation::Filter {
                condition,
                inner: Box::new(Self::apply_operation(*inner, relations, changed)),
                profile_text,
            },
            leaf @ (Operation::Project { .. } | Operation::Return { .. }) => leaf,
        };
        let (operation, rewritten) = Self::rewrite_scan(operation, relations);
        *changed |= rewritten;
        operation
    }

    /// Rewrites a `Scan` whose child is a `Filter` into an `IndexScan` when
    /// at least one conjunct binds a column; otherwise returns the operation
    /// untouched.
    fn rewrite_scan(operation: Operation, relations: &[Relation]) -> (Operation, bool) {
        // Only a scan over a filter is indexable, and only when some
        // conjunct actually binds a column.
        let indexable = match &operation {
            Operation::Scan {
                identifier, inner, ..
            } => match &**inner {
                Operation::Filter { condition, .. } => condition
                    .conjuncts()
                    .into_iter()
                    .any(|conjunct| Self::index_element(conjunct, *identifier).is_some()),
                _ => false,
            },
            _ => false,
        };
        if !indexable {
            return (operation, false);
        }

        let Operation::Scan {
            rel,
            identifier,
            inner,
            profile_text,
        } = operation
        else {
            unreachable!("indexability is only established for scans");
        };
        let Operation::Filter {
            condition,
            inner: body,
            profile_text: filter_profile_text,
        } = *inner
        else {
            unreachable!("indexability is only established over filters");
        };

        let arity = relations[rel.0].arity;
        let mut pattern: Vec<Option<Expression>> = vec![None; arity];
        let mut residual: Option<Condition> = None;
        for conjunct in condition.into_conjuncts() {
            match Self::index_element(&conjunct, identifier) {
                Some((element, value)) if pattern[element].is_none() => {
                    pattern[element] = Some(value);
                }
                // Not indexable, or the column is already bound; the first
                // binding stays and the duplicate remains a check.
                _ => residual = Some(Condition::conjoin(residual.take(), conjunct)),
            }
        }

        let inner = match residual {
            Some(condition) => Operation::Filter {
                condition,
                inner: body,
                profile_text: filter_profile_text,
            },
            None => *body,
        };
        (
            Operation::IndexScan {
                rel,
                identifier,
                pattern,
                inner: Box::new(inner),
                profile_text,
            },
            true,
        )
    }

    /// If the conjunct is an equality pinning one column of the search
    /// `identifier` to a value computable outside it, returns the column and
    /// that value.
    ///
    /// An equality between two accesses of the current search fails both
    /// arms and stays residual.
    fn index_element(condition: &Condition, identifier: usize) -> Option<(usize, Expression)> {
        let Condition::Constraint {
            op: BinaryConstraintOp::Eq,
            lhs,
            rhs,
        } = condition
        else {
            return None;
        };
        if let Expression::ElementAccess {
            identifier: id,
            element,
        } = lhs
        {
            if *id == identifier && (rhs.is_constant() || rhs.level() < Some(identifier)) {
                return Some((*element, rhs.clone()));
            }
        }
        if let Expression::ElementAccess {
            identifier: id,
            element,
        } = rhs
        {
            if *id == identifier && (lhs.is_constant() || lhs.level() < Some(identifier)) {
                return Some((*element, lhs.clone()));
            }
        }
        None
    }
}
