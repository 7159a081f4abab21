// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Renames aggregate-local variables so they cannot alias the surrounding
//! clause.
//!
//! Every variable named in an aggregate's target expression is renamed,
//! throughout that aggregate, to a fresh name built from a leading space
//! (a prefix the surface syntax cannot produce) and a per-program counter.
//! Aggregates already carrying renamed targets are left alone.

use dl_expr::rule::Program;

use crate::{TransformArgs, TransformError};

/// Renames variables inside aggregates with target expressions.
#[derive(Debug)]
pub struct UniqueAggregationVariables;

impl crate::Transform<Program> for UniqueAggregationVariables {
    #[tracing::instrument(
        target = "optimizer",
        level = "trace",
        skip_all,
        fields(path.segment = "unique_aggregation_variables")
    )]
    fn transform(
        &self,
        program: &mut Program,
        _args: TransformArgs,
    ) -> Result<bool, TransformError> {
        let mut changed = false;
        let mut aggregate_number = 0;
        for clause in &mut program.clauses {
            clause.visit_aggregates_post_mut(&mut |aggregate| {
                // Only applicable for aggregates with a target expression.
                let Some(target) = &aggregate.target else {
                    return;
                };

                let mut names = std::collections::BTreeSet::new();
                target.visit_variables(&mut |name| {
                    names.insert(name.to_string());
                });
                // Already renamed: every target variable carries the
                // reserved prefix.
                if !names.is_empty() && names.iter().all(|name| name.starts_with(' ')) {
                    return;
                }

                let number = aggregate_number;
                aggregate_number += 1;
                aggregate.visit_variables_mut(&mut |name| {
                    if names.contains(name.as_str()) {
                        *name = format!(" {}{}", name, number);
                        changed = true;
                    }
                });
            });
        }
        Ok(changed)
    }
}

#[cfg(test)]
mod tests {
    use dl_expr::rule::{
        Aggregator, Argument, Atom, BinaryConstraint, Clause, Literal, Relation,
    };
    use dl_expr::{AggregateOp, IdGen};

    use super::*;
    use crate::Transform;

    fn sum_clause() -> Clause {
        Clause::new(
            Atom::new("total", vec![Argument::var("S"), Argument::var("X")]),
            vec![
                Literal::Atom(Atom::new("keys", vec![Argument::var("X")])),
                Literal::Constraint(BinaryConstraint::eq(
                    Argument::var("S"),
                    Argument::Aggregate(Box::new(Aggregator {
                        op: AggregateOp::Sum,
                        target: Some(Box::new(Argument::var("X"))),
                        body: vec![Literal::Atom(Atom::new(
                            "r",
                            vec![Argument::var("X"), Argument::var("Y")],
                        ))],
                    })),
                )),
            ],
        )
    }

    #[test]
    fn target_variables_are_renamed_with_reserved_prefix() {
        let mut program = Program::new();
        program.add_relation(Relation::new("keys", 1).input());
        program.add_relation(Relation::new("r", 2).input());
        program.add_relation(Relation::new("total", 2).output());
        program.clauses.push(sum_clause());

        let pass = UniqueAggregationVariables;
        let mut id_gen = IdGen::default();
        let changed = pass
            .transform(&mut program, crate::TransformArgs { id_gen: &mut id_gen })
            .unwrap();
        assert!(changed);

        let rendered = program.clauses[0].to_string();
        // The aggregate-local X is now " X0"; the clause-level X is intact.
        assert_eq!(
            rendered,
            "total(S, X) :- keys(X), S = sum  X0 : { r( X0, Y) }.",
        );

        // Idempotent: renamed aggregates are skipped.
        let changed = pass
            .transform(&mut program, crate::TransformArgs { id_gen: &mut id_gen })
            .unwrap();
        assert!(!changed);
    }
}
