// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Sideways-information-passing strategies.
//!
//! A SIPS chooses, among the body atoms not yet scheduled, the next atom to
//! evaluate given the variables currently bound. Adornment and literal
//! reordering both drive a strategy greedily: select an atom, bind its
//! variables, repeat. Strategies are pure functions addressable by name;
//! unknown names resolve to the default strategy.

use dl_expr::rule::{Atom, Program, QualifiedName};

use crate::analysis::BindingStore;

/// Context a strategy may consult besides the candidate atoms themselves.
#[derive(Debug)]
pub struct SipsContext<'a> {
    /// The program being transformed.
    pub program: &'a Program,
    /// The head relation of the clause being scheduled.
    pub head: &'a QualifiedName,
}

/// A strategy: given candidate atoms (`None` marks already-scheduled slots)
/// and the current bindings, returns the index of the atom to schedule next.
/// At least one candidate is always present.
pub type Sips = fn(&[Option<&Atom>], &BindingStore, &SipsContext) -> usize;

/// The name of the default strategy.
pub const DEFAULT_SIPS: &str = "max-bound";

/// Resolves a strategy name; unknown names fall back to the default.
pub fn get_sips(name: &str) -> Sips {
    match name {
        "naive" => naive,
        "max-bound" => max_bound,
        "input" => input,
        "delta" => delta,
        _ => max_bound,
    }
}

/// Chooses the leftmost remaining atom.
fn naive(atoms: &[Option<&Atom>], _: &BindingStore, _: &SipsContext) -> usize {
    atoms
        .iter()
        .position(|atom| atom.is_some())
        .expect("at least one candidate atom remains")
}

/// Chooses the atom with the most bound arguments, ties to the leftmost.
fn max_bound(atoms: &[Option<&Atom>], store: &BindingStore, _: &SipsContext) -> usize {
    choose_max_bound(atoms, store, |_| true)
}

/// Prefers input (EDB) atoms, then falls back to `max-bound`.
fn input(atoms: &[Option<&Atom>], store: &BindingStore, ctx: &SipsContext) -> usize {
    let is_input = |atom: &Atom| {
        ctx.program
            .relation(&atom.name)
            .map(|relation| relation.is_input)
            .unwrap_or(false)
    };
    if atoms.iter().copied().flatten().any(is_input) {
        choose_max_bound(atoms, store, is_input)
    } else {
        choose_max_bound(atoms, store, |_| true)
    }
}

/// Defers atoms over the clause's own head relation, scheduling the
/// recursive dependencies last, and falls back to `max-bound` otherwise.
fn delta(atoms: &[Option<&Atom>], store: &BindingStore, ctx: &SipsContext) -> usize {
    let not_recursive = |atom: &Atom| atom.name != *ctx.head;
    if atoms.iter().copied().flatten().any(not_recursive) {
        choose_max_bound(atoms, store, not_recursive)
    } else {
        choose_max_bound(atoms, store, |_| true)
    }
}

/// The shared greedy core: among remaining candidates satisfying `eligible`,
/// picks the one with the most bound arguments; earlier atoms win ties.
fn choose_max_bound(
    atoms: &[Option<&Atom>],
    store: &BindingStore,
    eligible: impl Fn(&Atom) -> bool,
) -> usize {
    let mut best: Option<(usize, usize)> = None;
    for (index, atom) in atoms.iter().enumerate() {
        let Some(atom) = *atom else { continue };
        if !eligible(atom) {
            continue;
        }
        let bound = bound_arguments(atom, store);
        if best.map(|(_, best_bound)| bound > best_bound).unwrap_or(true) {
            best = Some((index, bound));
        }
    }
    best.map(|(index, _)| index)
        .or_else(|| atoms.iter().position(|atom| atom.is_some()))
        .expect("at least one candidate atom remains")
}

/// Number of arguments of the atom that are fully bound: no unbound
/// variable occurs in them and they contain no aggregate.
fn bound_arguments(atom: &Atom, store: &BindingStore) -> usize {
    atom.args
        .iter()
        .filter(|arg| {
            let mut bound = true;
            arg.visit(&mut |sub| {
                if matches!(sub, dl_expr::rule::Argument::Aggregate(_)) {
                    bound = false;
                }
            });
            arg.visit_variables(&mut |name| {
                if !store.is_bound(name) {
                    bound = false;
                }
            });
            bound
        })
        .count()
}

#[cfg(test)]
mod tests {
    use dl_expr::rule::{Argument, BinaryConstraint, Clause, Literal, Relation};

    use super::*;

    fn setup() -> (Program, Clause) {
        let mut program = Program::new();
        program.add_relation(Relation::new("e", 2).input());
        program.add_relation(Relation::new("p", 2));
        let clause = Clause::new(
            Atom::new("q", vec![Argument::var("X")]),
            vec![
                Literal::Atom(Atom::new("p", vec![Argument::var("Y"), Argument::var("Z")])),
                Literal::Atom(Atom::new("e", vec![Argument::var("X"), Argument::var("Y")])),
                Literal::Constraint(BinaryConstraint::eq(
                    Argument::var("X"),
                    Argument::number(1),
                )),
            ],
        );
        (program, clause)
    }

    #[test]
    fn max_bound_prefers_bound_atoms() {
        let (program, clause) = setup();
        let store = BindingStore::new(&clause);
        let head = clause.head.name.clone();
        let ctx = SipsContext {
            program: &program,
            head: &head,
        };
        let atoms: Vec<&Atom> = clause.positive_atoms().collect();
        let candidates: Vec<Option<&Atom>> = atoms.iter().copied().map(Some).collect();
        // X is bound through the constraint, so `e` wins over `p`.
        assert_eq!(get_sips("max-bound")(&candidates, &store, &ctx), 1);
        assert_eq!(get_sips("naive")(&candidates, &store, &ctx), 0);
        assert_eq!(get_sips("input")(&candidates, &store, &ctx), 1);
    }

    #[test]
    fn delta_defers_recursive_atoms() {
        let mut program = Program::new();
        program.add_relation(Relation::new("p", 2));
        program.add_relation(Relation::new("e", 2).input());
        let clause = Clause::new(
            Atom::new("p", vec![Argument::var("X"), Argument::var("Z")]),
            vec![
                Literal::Atom(Atom::new("p", vec![Argument::var("X"), Argument::var("Y")])),
                Literal::Atom(Atom::new("e", vec![Argument::var("Y"), Argument::var("Z")])),
            ],
        );
        let store = BindingStore::new(&clause);
        let head = clause.head.name.clone();
        let ctx = SipsContext {
            program: &program,
            head: &head,
        };
        let atoms: Vec<&Atom> = clause.positive_atoms().collect();
        let candidates: Vec<Option<&Atom>> = atoms.iter().copied().map(Some).collect();
        assert_eq!(get_sips("delta")(&candidates, &store, &ctx), 1);
    }
}
