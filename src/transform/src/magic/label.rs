// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Relation labelling for negation-safe magic rewriting.
//!
//! Adding magic edges to the dependency graph can merge strata that
//! negation requires to stay apart. Labelling pre-empts this in two phases:
//!
//! - *Negative labelling* gives every relation that is consumed through a
//!   negation a `@neg` copy, cloning its clauses, and redirects negated
//!   atoms at the copies. Relations reachable from a labelled clause only
//!   through further negations are labelled transitively.
//! - *Positive labelling* then gives each negatively labelled relation its
//!   own `@poscopy_k` lineage of the derived relations it depends on
//!   positively, so demand flowing into one negative context cannot reach
//!   another stratum's dependents.
//!
//! Input relations are never labelled; their facts are shared by every
//! context.

use std::collections::BTreeSet;

use dl_expr::rule::{Atom, Argument, Literal, Program, QualifiedName, Relation};

use super::{is_labelled, is_negatively_labelled, negative_label, positive_label};
use crate::{TransformArgs, TransformError};

/// Separates negatively reachable relations from the main dependency graph.
#[derive(Debug)]
pub struct LabelDatabase;

impl crate::Transform<Program> for LabelDatabase {
    #[tracing::instrument(
        target = "optimizer",
        level = "trace",
        skip_all,
        fields(path.segment = "label_database")
    )]
    fn transform(
        &self,
        program: &mut Program,
        _args: TransformArgs,
    ) -> Result<bool, TransformError> {
        let mut changed = false;
        changed |= Self::run_negative_labelling(program);
        changed |= Self::run_positive_labelling(program);
        Ok(changed)
    }
}

impl LabelDatabase {
    /// Labels every relation consumed through a negation, transitively
    /// through negations inside labelled clauses.
    fn run_negative_labelling(program: &mut Program) -> bool {
        let eligible = |program: &Program, name: &QualifiedName| {
            program
                .relation(name)
                .map(|relation| !relation.is_input)
                .unwrap_or(false)
                && !is_negatively_labelled(name)
        };

        // Seed with directly negated relations, then close over negations
        // inside the clauses of labelled relations.
        let mut to_label = BTreeSet::new();
        for clause in &program.clauses {
            for_each_negated_atom(&clause.body, &mut |atom| {
                if eligible(program, &atom.name) {
                    to_label.insert(atom.name.clone());
                }
            });
        }
        loop {
            let mut discovered = Vec::new();
            for name in &to_label {
                for clause in program.clauses_for(name) {
                    for_each_negated_atom(&clause.body, &mut |atom| {
                        if eligible(program, &atom.name) && !to_label.contains(&atom.name) {
                            discovered.push(atom.name.clone());
                        }
                    });
                }
            }
            if discovered.is_empty() {
                break;
            }
            to_label.extend(discovered);
        }
        if to_label.is_empty() {
            return false;
        }

        // Clone the labelled variants.
        for name in &to_label {
            let label = negative_label(name);
            let arity = program.relations[name].arity;
            program.add_relation(Relation::new(label.clone(), arity));
            let mut copies: Vec<_> = program
                .clauses_for(name)
                .cloned()
                .collect();
            for copy in &mut copies {
                copy.head.name = label.clone();
                for_each_negated_atom_mut(&mut copy.body, &mut |atom| {
                    if to_label.contains(&atom.name) {
                        atom.name = negative_label(&atom.name);
                    }
                });
            }
            program.clauses.extend(copies);
        }

        // Redirect every negated occurrence at the labelled copies.
        for clause in &mut program.clauses {
            for_each_negated_atom_mut(&mut clause.body, &mut |atom| {
                if to_label.contains(&atom.name) {
                    atom.name = negative_label(&atom.name);
                }
            });
        }
        true
    }

    /// Gives the `k`-th negatively labelled relation its own copies of the
    /// unlabelled derived relations it reaches positively.
    fn run_positive_labelling(program: &mut Program) -> bool {
        let negatives: Vec<QualifiedName> = program
            .relations
            .keys()
            .filter(|name| is_negatively_labelled(name))
            .cloned()
            .collect();
        let mut changed = false;
        for (index, negative) in negatives.iter().enumerate() {
            let count = index + 1;
            let lineage = Self::positive_dependencies(program, negative);
            if lineage.is_empty() {
                continue;
            }
            for name in &lineage {
                let label = positive_label(name, count);
                let arity = program.relations[name].arity;
                program.add_relation(Relation::new(label.clone(), arity));
                let mut copies: Vec<_> = program.clauses_for(name).cloned().collect();
                for copy in &mut copies {
                    copy.head.name = label.clone();
                    relabel_positive_atoms(copy, &lineage, count);
                }
                program.clauses.extend(copies);
            }
            // Point the negative context at its own lineage.
            let negative = negative.clone();
            for clause in &mut program.clauses {
                if clause.head.name == negative {
                    relabel_positive_atoms(clause, &lineage, count);
                }
            }
            changed = true;
        }
        changed
    }

    /// The unlabelled, derived relations reachable from the clauses of
    /// `negative` through non-negated atoms.
    fn positive_dependencies(
        program: &Program,
        negative: &QualifiedName,
    ) -> BTreeSet<QualifiedName> {
        let eligible = |name: &QualifiedName| {
            program
                .relation(name)
                .map(|relation| !relation.is_input)
                .unwrap_or(false)
                && !is_labelled(name)
        };
        let mut lineage = BTreeSet::new();
        let mut frontier = vec![negative.clone()];
        while let Some(name) = frontier.pop() {
            for clause in program.clauses_for(&name) {
                for literal in &clause.body {
                    if matches!(literal, Literal::Negation(_)) {
                        continue;
                    }
                    literal.visit_atoms(&mut |atom| {
                        if eligible(&atom.name) && lineage.insert(atom.name.clone()) {
                            frontier.push(atom.name.clone());
                        }
                    });
                }
            }
        }
        lineage
    }
}

/// Renames the non-negated atoms of a clause body that fall in the lineage.
fn relabel_positive_atoms(
    clause: &mut dl_expr::rule::Clause,
    lineage: &BTreeSet<QualifiedName>,
    count: usize,
) {
    for literal in &mut clause.body {
        if matches!(literal, Literal::Negation(_)) {
            continue;
        }
        literal.visit_atoms_mut(&mut |atom| {
            if lineage.contains(&atom.name) {
                atom.name = positive_label(&atom.name, count);
            }
        });
    }
}

/// Applies `f` to every negated atom in a literal list, descending into
/// aggregate bodies.
fn for_each_negated_atom(literals: &[Literal], f: &mut impl FnMut(&Atom)) {
    for literal in literals {
        match literal {
            Literal::Negation(atom) => f(atom),
            Literal::Atom(atom) => {
                for argument in &atom.args {
                    for_each_negated_atom_in_argument(argument, f);
                }
            }
            Literal::Constraint(constraint) => {
                for_each_negated_atom_in_argument(&constraint.lhs, f);
                for_each_negated_atom_in_argument(&constraint.rhs, f);
            }
        }
    }
}

fn for_each_negated_atom_in_argument(argument: &Argument, f: &mut impl FnMut(&Atom)) {
    match argument {
        Argument::Variable(_) | Argument::Constant(_) => {}
        Argument::Record(args) | Argument::Functor { args, .. } => {
            for argument in args {
                for_each_negated_atom_in_argument(argument, f);
            }
        }
        Argument::Aggregate(aggregate) => for_each_negated_atom(&aggregate.body, f),
    }
}

/// Mutable variant of [`for_each_negated_atom`].
fn for_each_negated_atom_mut(literals: &mut [Literal], f: &mut impl FnMut(&mut Atom)) {
    for literal in literals {
        match literal {
            Literal::Negation(atom) => f(atom),
            Literal::Atom(atom) => {
                for argument in &mut atom.args {
                    for_each_negated_atom_in_argument_mut(argument, f);
                }
            }
            Literal::Constraint(constraint) => {
                for_each_negated_atom_in_argument_mut(&mut constraint.lhs, f);
                for_each_negated_atom_in_argument_mut(&mut constraint.rhs, f);
            }
        }
    }
}

fn for_each_negated_atom_in_argument_mut(argument: &mut Argument, f: &mut impl FnMut(&mut Atom)) {
    match argument {
        Argument::Variable(_) | Argument::Constant(_) => {}
        Argument::Record(args) | Argument::Functor { args, .. } => {
            for argument in args {
                for_each_negated_atom_in_argument_mut(argument, f);
            }
        }
        Argument::Aggregate(aggregate) => for_each_negated_atom_mut(&mut aggregate.body, f),
    }
}
