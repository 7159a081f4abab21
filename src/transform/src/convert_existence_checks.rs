// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Collapses searches that only witness non-emptiness into existence tests.
//!
//! A relation search whose body never consumes the tuple it binds (no
//! projected value, condition, unpack source, or index pattern below it
//! mentions the search's identifier) iterates only to learn whether a
//! matching tuple exists at all. A plain scan of
//! that shape becomes a filter on the negated emptiness of the relation; an
//! index scan becomes a filter on an existence check carrying the scan's
//! query pattern.
//!
//! Runs after index creation, so equalities on the scanned tuple have
//! already moved into patterns and do not block the conversion.
//!
//! User-defined operators are assumed pure here; an implementation with
//! side-effecting operators must refuse the rewrite for bodies containing
//! them.

use dl_expr::ra::{Condition, Operation, Program};

use crate::{TransformArgs, TransformError};

/// Converts searches whose only purpose is witnessing non-emptiness into
/// single existence tests.
#[derive(Debug)]
pub struct ConvertExistenceChecks;

impl crate::Transform<Program> for ConvertExistenceChecks {
    #[tracing::instrument(
        target = "optimizer",
        level = "trace",
        skip_all,
        fields(path.segment = "convert_existence_checks")
    )]
    fn transform(
        &self,
        program: &mut Program,
        _args: TransformArgs,
    ) -> Result<bool, TransformError> {
        let mut changed = false;
        program.main.for_each_query_mut(&mut |query| {
            let (operation, query_changed) = query
                .operation
                .take_dangerous()
                .map(&mut |operation| Self::convert(operation));
            query.operation = operation;
            changed |= query_changed;
        });
        Ok(changed)
    }
}

impl ConvertExistenceChecks {
    /// Rewrites a relation search whose body ignores the bound tuple.
    fn convert(operation: Operation) -> (Operation, bool) {
        if !operation.is_relation_search() {
            return (operation, false);
        }
        let identifier = operation
            .identifier()
            .expect("relation searches bind an identifier");
        let body = operation
            .inner()
            .expect("relation searches have an inner operation");
        if Self::consumes_tuple(body, identifier) {
            return (operation, false);
        }
        match operation {
            Operation::Scan {
                rel,
                inner,
                profile_text,
                ..
            } => (
                Operation::Filter {
                    condition: Condition::Negation(Box::new(Condition::EmptinessCheck(rel))),
                    inner,
                    profile_text,
                },
                true,
            ),
            Operation::IndexScan {
                rel,
                pattern,
                inner,
                profile_text,
                ..
            } => (
                Operation::Filter {
                    condition: Condition::ExistenceCheck(rel, pattern),
                    inner,
                    profile_text,
                },
                true,
            ),
            _ => unreachable!("only relation searches reach this point"),
        }
    }

    /// True iff any expression in the body depends on the search's tuple.
    ///
    /// The expression sweep reaches projected values, filter conditions
    /// (existence-check patterns included), unpack sources, and the index
    /// patterns of nested scans, so a single check covers every way the
    /// tuple could be consumed.
    fn consumes_tuple(body: &Operation, identifier: usize) -> bool {
        let mut consumed = false;
        body.visit_expressions(&mut |expr| {
            if expr.depends_on(identifier) {
                consumed = true;
            }
        });
        consumed
    }
}
