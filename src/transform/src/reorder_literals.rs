// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Reorders clause body atoms with a sideways-information-passing strategy.
//!
//! The chosen strategy is driven greedily: starting from the bindings the
//! clause's constraints establish, repeatedly select the best remaining atom
//! and bind its variables. Positive atoms are permuted among the positions
//! they already occupy; negations and constraints stay where they are.

use dl_expr::rule::{Clause, Literal, Program};

use crate::analysis::BindingStore;
use crate::sips::{self, SipsContext};
use crate::{TransformArgs, TransformError};

/// Reorders body literals per a named SIPS.
#[derive(Debug)]
pub struct ReorderLiterals {
    sips: String,
}

impl ReorderLiterals {
    /// Creates the pass with the given strategy name.
    pub fn new(sips: impl Into<String>) -> ReorderLiterals {
        ReorderLiterals { sips: sips.into() }
    }
}

impl Default for ReorderLiterals {
    fn default() -> ReorderLiterals {
        ReorderLiterals::new(sips::DEFAULT_SIPS)
    }
}

impl crate::Transform<Program> for ReorderLiterals {
    #[tracing::instrument(
        target = "optimizer",
        level = "trace",
        skip_all,
        fields(path.segment = "reorder_literals")
    )]
    fn transform(
        &self,
        program: &mut Program,
        _args: TransformArgs,
    ) -> Result<bool, TransformError> {
        let sips = sips::get_sips(&self.sips);
        let mut replacements = Vec::new();
        for (index, clause) in program.clauses.iter().enumerate() {
            if let Some(reordered) = Self::reorder_clause(sips, clause, program) {
                replacements.push((index, reordered));
            }
        }
        let changed = !replacements.is_empty();
        for (index, clause) in replacements {
            program.clauses[index] = clause;
        }
        Ok(changed)
    }
}

impl ReorderLiterals {
    /// Determines the atom ordering the strategy yields for a clause:
    /// `order[i] = j` iff the clause's `j`-th atom is scheduled `i`-th.
    fn ordering_after_sips(sips: sips::Sips, clause: &Clause, program: &Program) -> Vec<usize> {
        let atoms: Vec<_> = clause.positive_atoms().collect();
        let mut candidates: Vec<_> = atoms.iter().copied().map(Some).collect();
        let mut store = BindingStore::new(clause);
        let mut order = Vec::with_capacity(atoms.len());
        for _ in 0..atoms.len() {
            let context = SipsContext {
                program,
                head: &clause.head.name,
            };
            let chosen = sips(&candidates, &store, &context);
            let atom = candidates[chosen]
                .take()
                .expect("strategy chose an exhausted atom");
            atom.visit_variables(&mut |name| store.bind_variable(name));
            order.push(chosen);
        }
        order
    }

    /// Reorders a clause per the strategy; `None` if the ordering is already
    /// the one the strategy would pick.
    fn reorder_clause(sips: sips::Sips, clause: &Clause, program: &Program) -> Option<Clause> {
        let order = Self::ordering_after_sips(sips, clause, program);
        if order.iter().enumerate().all(|(slot, &source)| slot == source) {
            return None;
        }
        let atom_positions: Vec<usize> = clause
            .body
            .iter()
            .enumerate()
            .filter_map(|(position, literal)| match literal {
                Literal::Atom(_) => Some(position),
                _ => None,
            })
            .collect();
        let mut reordered = clause.clone();
        for (slot, &source) in order.iter().enumerate() {
            reordered.body[atom_positions[slot]] = clause.body[atom_positions[source]].clone();
        }
        Some(reordered)
    }
}

#[cfg(test)]
mod tests {
    use dl_expr::rule::{Argument, Atom, BinaryConstraint, Relation};
    use dl_expr::IdGen;

    use super::*;
    use crate::Transform;

    #[test]
    fn bound_atom_moves_first_and_settles() {
        let mut program = Program::new();
        program.add_relation(Relation::new("a", 2).input());
        program.add_relation(Relation::new("b", 1).input());
        program.add_relation(Relation::new("q", 1).output());
        program.clauses.push(Clause::new(
            Atom::new("q", vec![Argument::var("Y")]),
            vec![
                Literal::Atom(Atom::new("a", vec![Argument::var("Y"), Argument::var("Z")])),
                Literal::Atom(Atom::new("b", vec![Argument::var("X")])),
                Literal::Constraint(BinaryConstraint::eq(
                    Argument::var("X"),
                    Argument::number(1),
                )),
            ],
        ));

        let pass = ReorderLiterals::default();
        let mut id_gen = IdGen::default();
        let changed = pass
            .transform(&mut program, crate::TransformArgs { id_gen: &mut id_gen })
            .unwrap();
        assert!(changed);
        let body: Vec<String> = program.clauses[0]
            .body
            .iter()
            .map(|literal| literal.to_string())
            .collect();
        assert_eq!(body, vec!["b(X)", "a(Y, Z)", "X = 1"]);

        // A second application leaves the settled ordering alone.
        let changed = pass
            .transform(&mut program, crate::TransformArgs { id_gen: &mut id_gen })
            .unwrap();
        assert!(!changed);
    }
}
