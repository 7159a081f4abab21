// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Outlines complex aggregate bodies into dedicated relations.
//!
//! An aggregate whose body the evaluator can scan directly, a single
//! positive atom, stays inline. Any other body is extracted into a fresh
//! relation whose columns are the body variables visible outside the
//! aggregate (in the surrounding clause or in the target expression), and
//! the aggregate is rewritten to scan that relation instead.

use std::collections::BTreeSet;

use dl_expr::rule::{
    Aggregator, Argument, Atom, Clause, Literal, Program, QualifiedName, Relation,
};

use crate::{TransformArgs, TransformError};

/// Creates relations for aggregate bodies consisting of more than a single
/// atom.
#[derive(Debug)]
pub struct MaterializeAggregationQueries;

impl crate::Transform<Program> for MaterializeAggregationQueries {
    #[tracing::instrument(
        target = "optimizer",
        level = "trace",
        skip_all,
        fields(path.segment = "materialize_aggregations")
    )]
    fn transform(
        &self,
        program: &mut Program,
        args: TransformArgs,
    ) -> Result<bool, TransformError> {
        let mut changed = false;
        let mut new_clauses = Vec::new();
        let mut new_relations = Vec::new();
        for clause in &mut program.clauses {
            let outer_variables = Self::variables_outside_aggregates(clause);
            clause.visit_aggregates_post_mut(&mut |aggregate| {
                if !Self::needs_materialized_relation(aggregate) {
                    return;
                }
                let name = QualifiedName::from(format!(
                    "@agg_body_{}",
                    args.id_gen.allocate_id()
                ));

                let mut visible = outer_variables.clone();
                if let Some(target) = &aggregate.target {
                    target.visit_variables(&mut |variable| {
                        visible.insert(variable.to_string());
                    });
                }
                let mut body_variables = BTreeSet::new();
                for literal in &aggregate.body {
                    literal.visit_variables(&mut |variable| {
                        body_variables.insert(variable.to_string());
                    });
                }
                let witnesses: Vec<String> =
                    body_variables.intersection(&visible).cloned().collect();

                let head = Atom::new(
                    name.clone(),
                    witnesses.iter().map(|witness| Argument::var(witness.clone())).collect(),
                );
                let body = std::mem::replace(
                    &mut aggregate.body,
                    vec![Literal::Atom(head.clone())],
                );
                new_relations.push(Relation::new(name, witnesses.len()));
                new_clauses.push(Clause::new(head, body));
                changed = true;
            });
        }
        for relation in new_relations {
            program.add_relation(relation);
        }
        program.clauses.extend(new_clauses);
        Ok(changed)
    }
}

impl MaterializeAggregationQueries {
    /// A test determining whether the body of a given aggregate needs to be
    /// outlined into an independent relation or can be kept inline.
    fn needs_materialized_relation(aggregate: &Aggregator) -> bool {
        !matches!(aggregate.body.as_slice(), [Literal::Atom(_)])
    }

    /// The variables of the clause occurring outside every aggregate.
    fn variables_outside_aggregates(clause: &Clause) -> BTreeSet<String> {
        let mut variables = BTreeSet::new();
        let mut collect = |argument: &Argument| {
            collect_shallow(argument, &mut variables);
        };
        for argument in &clause.head.args {
            collect(argument);
        }
        for literal in &clause.body {
            match literal {
                Literal::Atom(atom) | Literal::Negation(atom) => {
                    for argument in &atom.args {
                        collect(argument);
                    }
                }
                Literal::Constraint(constraint) => {
                    collect(&constraint.lhs);
                    collect(&constraint.rhs);
                }
            }
        }
        variables
    }
}

/// Collects variable names from an argument without descending into
/// aggregates.
fn collect_shallow(argument: &Argument, variables: &mut BTreeSet<String>) {
    match argument {
        Argument::Variable(name) => {
            variables.insert(name.clone());
        }
        Argument::Constant(_) | Argument::Aggregate(_) => {}
        Argument::Record(args) | Argument::Functor { args, .. } => {
            for argument in args {
                collect_shallow(argument, variables);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use dl_expr::rule::BinaryConstraint;
    use dl_expr::{AggregateOp, IdGen};

    use super::*;
    use crate::Transform;

    #[test]
    fn multi_atom_bodies_are_outlined() {
        let mut program = Program::new();
        program.add_relation(Relation::new("r", 2).input());
        program.add_relation(Relation::new("t", 1).input());
        program.add_relation(Relation::new("total", 1).output());
        program.clauses.push(Clause::new(
            Atom::new("total", vec![Argument::var("S")]),
            vec![Literal::Constraint(BinaryConstraint::eq(
                Argument::var("S"),
                Argument::Aggregate(Box::new(Aggregator {
                    op: AggregateOp::Sum,
                    target: Some(Box::new(Argument::var("X"))),
                    body: vec![
                        Literal::Atom(Atom::new(
                            "r",
                            vec![Argument::var("X"), Argument::var("Y")],
                        )),
                        Literal::Atom(Atom::new("t", vec![Argument::var("Y")])),
                    ],
                })),
            ))],
        ));

        let pass = MaterializeAggregationQueries;
        let mut id_gen = IdGen::default();
        let changed = pass
            .transform(&mut program, crate::TransformArgs { id_gen: &mut id_gen })
            .unwrap();
        assert!(changed);

        let name = QualifiedName::from("@agg_body_0");
        let relation = program.relation(&name).expect("materialized relation exists");
        assert_eq!(relation.arity, 1);
        assert_eq!(
            program.clauses[0].to_string(),
            "total(S) :- S = sum X : { @agg_body_0(X) }.",
        );
        assert_eq!(
            program.clauses[1].to_string(),
            "@agg_body_0(X) :- r(X, Y), t(Y).",
        );

        // The single-atom rewritten body stays inline on a second run.
        let changed = pass
            .transform(&mut program, crate::TransformArgs { id_gen: &mut id_gen })
            .unwrap();
        assert!(!changed);
    }
}
