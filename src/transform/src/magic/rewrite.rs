// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! The magic-set rewrite proper.
//!
//! Requires [`super::NormaliseDatabase`], [`super::LabelDatabase`], and
//! [`super::AdornDatabase`] to have run, in that order.
//!
//! For every adorned clause `h :- a1, …, ak`:
//!
//! - the clause itself is guarded by the magic atom of its head (carrying
//!   exactly the bound head arguments), so the rule only fires under demand;
//! - every adorned body atom with at least one bound position gets a magic
//!   rule deriving its demand from the head's magic atom, the positive atom
//!   prefix evaluated before it, and the clause constraints those bindings
//!   ground.
//!
//! Seeds need no separate mechanism: for a ground query the demand of the
//! first body atom is grounded entirely by constraints, so its magic rule
//! degenerates to a fact-like rule `@magic.rel@b…(v…) :- v… = c….`
//! Clauses headed by magic relations, and clauses already guarded, are
//! carried through untouched, so a second application changes nothing.

use std::collections::BTreeMap;

use dl_expr::rule::{Atom, Clause, Literal, Program, Relation};
use itertools::Itertools;

use super::{adornment_marker, is_magic, magic_name};
use crate::analysis::BindingStore;
use crate::{TransformArgs, TransformError};

/// Restricts adorned rules to demanded tuples via magic relations.
#[derive(Debug)]
pub struct MagicSet;

impl crate::Transform<Program> for MagicSet {
    #[tracing::instrument(
        target = "optimizer",
        level = "trace",
        skip_all,
        fields(path.segment = "magic_set")
    )]
    fn transform(
        &self,
        program: &mut Program,
        _args: TransformArgs,
    ) -> Result<bool, TransformError> {
        let original = program.clone();
        let mut clauses = Vec::new();
        let mut magic_relations: BTreeMap<_, Relation> = BTreeMap::new();

        for clause in &original.clauses {
            if is_magic(&clause.head.name) {
                clauses.push(clause.clone());
                continue;
            }

            let guard = adornment_marker(&clause.head.name)
                .filter(|marker| marker.contains('b'))
                .map(|marker| Self::magic_atom(&clause.head, &marker));
            if let Some(guard_atom) = &guard {
                // Already transformed; literal reordering may have moved the
                // guard, so look for it anywhere in the body.
                let guarded = clause
                    .body
                    .iter()
                    .any(|literal| *literal == Literal::Atom(guard_atom.clone()));
                if guarded {
                    clauses.push(clause.clone());
                    continue;
                }
            }

            // Walk the body, deriving demand for each adorned atom from the
            // bindings available just before it is evaluated.
            let mut store = BindingStore::new(clause);
            if let Some(guard_atom) = &guard {
                guard_atom.visit_variables(&mut |variable| store.bind_variable(variable));
            }
            let mut prefix: Vec<Literal> = Vec::new();
            let mut magic_rules = Vec::new();
            for literal in &clause.body {
                let Literal::Atom(atom) = literal else {
                    continue;
                };
                if let Some(marker) = adornment_marker(&atom.name) {
                    if marker.contains('b') && !is_magic(&atom.name) {
                        let magic_head = Self::magic_atom(atom, &marker);
                        magic_relations
                            .entry(magic_head.name.clone())
                            .or_insert_with(|| {
                                Relation::new(magic_head.name.clone(), magic_head.args.len())
                            });

                        let mut body = Vec::new();
                        if let Some(guard_atom) = &guard {
                            body.push(Literal::Atom(guard_atom.clone()));
                        }
                        body.extend(prefix.iter().cloned());
                        body.extend(Self::grounded_constraints(clause, &store));
                        let self_implication = body.len() == 1
                            && body[0] == Literal::Atom(magic_head.clone());
                        if !self_implication {
                            magic_rules.push(Clause::new(magic_head, body));
                        }
                    }
                }
                atom.visit_variables(&mut |variable| store.bind_variable(variable));
                prefix.push(literal.clone());
            }

            let mut modified = clause.clone();
            if let Some(guard_atom) = guard {
                magic_relations
                    .entry(guard_atom.name.clone())
                    .or_insert_with(|| {
                        Relation::new(guard_atom.name.clone(), guard_atom.args.len())
                    });
                modified.body.insert(0, Literal::Atom(guard_atom));
            }
            clauses.push(modified);
            clauses.extend(magic_rules);
        }

        // Regenerated demand rules duplicate existing ones; keep one copy
        // and a deterministic order.
        program.clauses = clauses
            .into_iter()
            .unique()
            .sorted_by_cached_key(|clause| clause.to_string())
            .collect();
        for (name, relation) in magic_relations {
            if program.relation(&name).is_none() {
                program.add_relation(relation);
            }
        }
        Ok(*program != original)
    }
}

impl MagicSet {
    /// The magic atom of an adorned atom: the magic relation applied to the
    /// arguments at bound positions.
    fn magic_atom(atom: &Atom, marker: &str) -> Atom {
        assert_eq!(
            marker.len(),
            atom.args.len(),
            "adornment marker length matches the atom arity",
        );
        let args = atom
            .args
            .iter()
            .zip(marker.chars())
            .filter(|(_, flag)| *flag == 'b')
            .map(|(argument, _)| argument.clone())
            .collect();
        Atom {
            name: magic_name(&atom.name),
            args,
        }
    }

    /// The clause constraints whose variables the store has bound; these
    /// keep magic rules grounded, and for ground queries they carry the
    /// query constants into the seed.
    fn grounded_constraints(clause: &Clause, store: &BindingStore) -> Vec<Literal> {
        clause
            .body
            .iter()
            .filter(|literal| {
                let Literal::Constraint(constraint) = literal else {
                    return false;
                };
                let mut grounded = true;
                for argument in [&constraint.lhs, &constraint.rhs] {
                    argument.visit_variables(&mut |variable| {
                        if !store.is_bound(variable) {
                            grounded = false;
                        }
                    });
                }
                grounded
            })
            .cloned()
            .collect()
    }
}
