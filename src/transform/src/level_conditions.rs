// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Hoists filter conditions to the earliest scope where they are decidable.
//!
//! A condition whose level is the OUTER sentinel depends on no search and
//! moves to the root of its query; a condition at level `i` moves directly
//! under the search with identifier `i`. Filtering commutes with any loop
//! that does not bind it, so both moves preserve semantics while evaluating
//! each condition as rarely as possible.
//!
//! The pass assumes conjunctions are stored verbose: the translator emits
//!
//! ```text
//! QUERY
//!   IF C1
//!     IF C2
//! ```
//!
//! rather than a single filter over `C1 AND C2`, so each conjunct levels
//! independently. If an upstream transformer ever introduces conjunctions, a
//! splitter must be interposed before this pass; the conditions this pass
//! itself accumulates sit at a single level by construction.

use dl_expr::ra::{Condition, Operation, Program, Query};

use crate::{TransformArgs, TransformError};

/// Hoists filter conditions out of the deepest loops that cannot decide
/// them.
#[derive(Debug)]
pub struct LevelConditions;

impl crate::Transform<Program> for LevelConditions {
    #[tracing::instrument(
        target = "optimizer",
        level = "trace",
        skip_all,
        fields(path.segment = "level_conditions")
    )]
    fn transform(
        &self,
        program: &mut Program,
        _args: TransformArgs,
    ) -> Result<bool, TransformError> {
        let mut changed = false;
        program
            .main
            .for_each_query_mut(&mut |query| changed |= Self::level_query(query));
        Ok(changed)
    }
}

impl LevelConditions {
    /// Runs both hoisting sweeps over one query, reporting whether the
    /// operation tree actually moved.
    fn level_query(query: &mut Query) -> bool {
        let original = query.operation.clone();

        // Hoist conditions that are independent of any search to the
        // outermost level of the query.
        let mut hoisted = None;
        let operation =
            Self::strip_filters(query.operation.take_dangerous(), &mut hoisted, &|condition| {
                condition.level().is_none()
            });
        query.operation = match hoisted {
            Some(condition) => Operation::filter(condition, operation),
            None => operation,
        };

        // Hoist conditions for each search operation.
        let (operation, _) = query
            .operation
            .take_dangerous()
            .map(&mut |operation| (Self::level_search(operation), false));
        query.operation = operation;

        query.operation != original
    }

    /// If the operation is a search, moves every filter in its subtree whose
    /// condition sits exactly at the search's level to directly under the
    /// search.
    fn level_search(operation: Operation) -> Operation {
        let Some(identifier) = operation.identifier() else {
            return operation;
        };
        let mut hoisted = None;
        let operation = match operation {
            Operation::Scan {
                rel,
                identifier,
                inner,
                profile_text,
            } => {
                let inner = Self::strip_filters(*inner, &mut hoisted, &|condition| {
                    condition.level() == Some(identifier)
                });
                Operation::Scan {
                    rel,
                    identifier,
                    inner: Box::new(Self::insert_filter(inner, hoisted)),
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
                let inner = Self::strip_filters(*inner, &mut hoisted, &|condition| {
                    condition.level() == Some(identifier)
                });
                Operation::IndexScan {
                    rel,
                    identifier,
                    pattern,
                    inner: Box::new(Self::insert_filter(inner, hoisted)),
                    profile_text,
                }
            }
            Operation::UnpackRecord {
                expr,
                identifier,
                arity,
                inner,
            } => {
                let inner = Self::strip_filters(*inner, &mut hoisted, &|condition| {
                    condition.level() == Some(identifier)
                });
                Operation::UnpackRecord {
                    expr,
                    identifier,
                    arity,
                    inner: Box::new(Self::insert_filter(inner, hoisted)),
                }
            }
            other => other,
        };
        debug_assert!(Some(identifier) == operation.identifier());
        operation
    }

    /// Removes every filter in the subtree whose condition satisfies
    /// `matches`, splicing its inner operation into place and accumulating
    /// the removed conditions in discovery order.
    fn strip_filters(
        operation: Operation,
        hoisted: &mut Option<Condition>,
        matches: &impl Fn(&Condition) -> bool,
    ) -> Operation {
        match operation {
            Operation::Filter {
                condition, inner, ..
            } if matches(&condition) => {
                *hoisted = Some(Condition::conjoin(hoisted.take(), condition));
                Self::strip_filters(*inner, hoisted, matches)
            }
            Operation::Scan {
                rel,
                identifier,
                inner,
                profile_text,
            } => Operation::Scan {
                rel,
                identifier,
                inner: Box::new(Self::strip_filters(*inner, hoisted, matches)),
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
                inner: Box::new(Self::strip_filters(*inner, hoisted, matches)),
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
                inner: Box::new(Self::strip_filters(*inner, hoisted, matches)),
            },
            Operation::Filter {
                condition,
                inner,
                profile_text,
            } => Operation::Filter {
                condition,
                inner: Box::new(Self::strip_filters(*inner, hoisted, matches)),
                profile_text,
            },
            leaf @ (Operation::Project { .. } | Operation::Return { .. }) => leaf,
        }
    }

    /// Wraps the operation in a filter for the accumulated condition, if
    /// any.
    fn insert_filter(operation: Operation, hoisted: Option<Condition>) -> Operation {
        match hoisted {
            Some(condition) => Operation::filter(condition, operation),
            None => operation,
        }
    }
}
