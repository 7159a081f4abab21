// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Adorns the database with binding patterns reachable from the query
//! relations.
//!
//! A worklist of `(relation, pattern)` pairs starts at every output
//! relation with the all-free pattern; ground queries need no special seed,
//! since the clause-level [`BindingStore`] already binds head variables that
//! constraints equate to constants, and bound body adornments follow from
//! that. Each pop adorns the relation's clauses: head variables at bound
//! pattern positions seed the store, positive body atoms are walked in SIPS
//! order, each atom's own pattern is read off the store and queued, and the
//! atom's variables become bound once visited.
//!
//! Derived relations are renamed to their adorned names (`rel@bf` style; the
//! all-free pattern keeps the original name). Input and magic relations are
//! neither renamed nor queued. Constraints and negated atoms are not adorned
//! or reordered, but their bindings feed the store. Originals whose every
//! use was adorned away are removed.

use std::collections::{BTreeSet, VecDeque};

use dl_expr::rule::{Atom, Clause, Literal, Program, QualifiedName, Relation};

use super::{adorned_name, is_magic};
use crate::analysis::BindingStore;
use crate::sips::{self, SipsContext};
use crate::{TransformArgs, TransformError};

/// Adorns the rules of a program with binding information.
#[derive(Debug)]
pub struct AdornDatabase {
    sips: String,
}

impl AdornDatabase {
    /// Creates the pass with the given SIPS name.
    pub fn new(sips: impl Into<String>) -> AdornDatabase {
        AdornDatabase { sips: sips.into() }
    }
}

impl Default for AdornDatabase {
    fn default() -> AdornDatabase {
        AdornDatabase::new(sips::DEFAULT_SIPS)
    }
}

impl crate::Transform<Program> for AdornDatabase {
    #[tracing::instrument(
        target = "optimizer",
        level = "trace",
        skip_all,
        fields(path.segment = "adorn_database")
    )]
    fn transform(
        &self,
        program: &mut Program,
        _args: TransformArgs,
    ) -> Result<bool, TransformError> {
        let original = program.clone();
        let sips = sips::get_sips(&self.sips);

        let mut seen = BTreeSet::new();
        let mut todo = VecDeque::new();
        for relation in original.relations.values().filter(|relation| relation.is_output) {
            queue_adornment(
                &mut seen,
                &mut todo,
                relation.name.clone(),
                "f".repeat(relation.arity),
            );
        }

        let mut adorned_clauses = Vec::new();
        let mut processed = BTreeSet::new();
        let mut kept_original_names = BTreeSet::new();
        let mut new_relations: Vec<Relation> = Vec::new();
        while let Some((name, marker)) = todo.pop_front() {
            let adorned_id = adorned_name(&name, &marker);
            processed.insert(name.clone());
            if adorned_id == name {
                kept_original_names.insert(name.clone());
            } else if original.relation(&adorned_id).is_none()
                && !new_relations.iter().any(|relation| relation.name == adorned_id)
            {
                let arity = original.relations[&name].arity;
                new_relations.push(Relation::new(adorned_id.clone(), arity));
            }
            for clause in original.clauses_for(&name) {
                adorned_clauses.push(Self::adorn_clause(
                    clause,
                    &marker,
                    &adorned_id,
                    &original,
                    sips,
                    &mut seen,
                    &mut todo,
                ));
            }
        }

        // Clauses of unprocessed relations are carried through unchanged.
        let mut clauses: Vec<Clause> = original
            .clauses
            .iter()
            .filter(|clause| !processed.contains(&clause.head.name))
            .cloned()
            .collect();
        clauses.extend(adorned_clauses);

        // Originals that every use was adorned away from are redundant.
        let mut used = BTreeSet::new();
        for clause in &clauses {
            clause.visit_atoms(&mut |atom| {
                used.insert(atom.name.clone());
            });
        }
        let redundant: BTreeSet<QualifiedName> = processed
            .iter()
            .filter(|name| {
                !kept_original_names.contains(*name)
                    && !used.contains(*name)
                    && !original.relations[*name].is_output
            })
            .cloned()
            .collect();

        clauses.sort_by_cached_key(|clause| clause.to_string());
        program.clauses = clauses;
        program.relations.retain(|name, _| !redundant.contains(name));
        for relation in new_relations {
            program.add_relation(relation);
        }
        Ok(*program != original)
    }
}

impl AdornDatabase {
    /// Returns the adorned version of a clause for a head binding pattern.
    fn adorn_clause(
        clause: &Clause,
        marker: &str,
        adorned_head: &QualifiedName,
        program: &Program,
        sips: sips::Sips,
        seen: &mut BTreeSet<QualifiedName>,
        todo: &mut VecDeque<(QualifiedName, String)>,
    ) -> Clause {
        assert_eq!(
            marker.len(),
            clause.head.args.len(),
            "adornment marker length matches the head arity",
        );
        let mut store = BindingStore::new(clause);
        for (argument, flag) in clause.head.args.iter().zip(marker.chars()) {
            if flag == 'b' {
                let variable = argument
                    .as_variable()
                    .expect("head arguments are variables after normalisation");
                store.bind_head_variable(variable);
            }
        }

        let atoms: Vec<&Atom> = clause.positive_atoms().collect();
        let mut candidates: Vec<Option<&Atom>> = atoms.iter().copied().map(Some).collect();
        let mut body = Vec::with_capacity(clause.body.len());
        for _ in 0..atoms.len() {
            let context = SipsContext {
                program,
                head: &clause.head.name,
            };
            let chosen = sips(&candidates, &store, &context);
            let atom = candidates[chosen]
                .take()
                .expect("strategy chose an exhausted atom");

            let mut adorned_atom = atom.clone();
            if Self::adornable(program, &atom.name) {
                let mut atom_marker = String::with_capacity(atom.args.len());
                for argument in &atom.args {
                    let variable = argument
                        .as_variable()
                        .expect("atom arguments are variables after normalisation");
                    atom_marker.push(if store.is_bound(variable) { 'b' } else { 'f' });
                }
                queue_adornment(seen, todo, atom.name.clone(), atom_marker.clone());
                adorned_atom.name = adorned_name(&atom.name, &atom_marker);
            }
            body.push(Literal::Atom(adorned_atom));

            // Once evaluated, the atom's variables are available.
            atom.visit_variables(&mut |variable| store.bind_variable(variable));
        }

        // Negated atoms and constraints are not adorned, but still feed
        // their bindings into the store.
        for literal in &clause.body {
            if let Literal::Negation(atom) = literal {
                atom.visit_variables(&mut |variable| store.bind_variable(variable));
                body.push(literal.clone());
            }
        }
        for literal in &clause.body {
            if matches!(literal, Literal::Constraint(_)) {
                body.push(literal.clone());
            }
        }

        Clause::new(
            Atom::new(adorned_head.clone(), clause.head.args.clone()),
            body,
        )
    }

    /// Derived, non-magic relations are subject to adornment; input and
    /// magic relations keep their names and are never queued.
    fn adornable(program: &Program, name: &QualifiedName) -> bool {
        !is_magic(name)
            && program
                .relation(name)
                .map(|relation| !relation.is_input)
                .unwrap_or(false)
    }
}

/// Queues an adornment unless its id was processed before.
fn queue_adornment(
    seen: &mut BTreeSet<QualifiedName>,
    todo: &mut VecDeque<(QualifiedName, String)>,
    name: QualifiedName,
    marker: String,
) {
    let adornment_id = adorned_name(&name, &marker);
    if seen.insert(adornment_id) {
        todo.push_back((name, marker));
    }
}
