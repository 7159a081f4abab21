// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Database normalisation for the magic-set pipeline.
//!
//! Four sub-steps, each idempotent on its own postcondition; all must run:
//!
//! 1. *Partition I/O*: no relation is both input and output afterwards.
//! 2. *Extract IDB*: no input relation is the head of a clause afterwards.
//! 3. *Querify outputs*: every output relation is defined by exactly one
//!    rule `out(xs) :- orig(xs)` and appears in no other rule afterwards.
//! 4. *Normalise arguments*: every atom argument is a variable, or a fresh
//!    variable equated to the original argument by a constraint in the same
//!    body, with record fields lifted recursively.

use dl_expr::rule::{
    Argument, Atom, BinaryConstraint, Clause, Literal, Program, QualifiedName, Relation,
};
use dl_expr::IdGen;

use crate::{TransformArgs, TransformError};

/// Normalises a program into the form the adornment and magic stages
/// assume.
#[derive(Debug)]
pub struct NormaliseDatabase;

impl crate::Transform<Program> for NormaliseDatabase {
    #[tracing::instrument(
        target = "optimizer",
        level = "trace",
        skip_all,
        fields(path.segment = "normalise_database")
    )]
    fn transform(
        &self,
        program: &mut Program,
        args: TransformArgs,
    ) -> Result<bool, TransformError> {
        let mut changed = false;
        changed |= Self::partition_io(program);
        changed |= Self::extract_idb(program);
        changed |= Self::querify_outputs(program);
        changed |= Self::normalise_arguments(program, args.id_gen);
        Ok(changed)
    }
}

impl NormaliseDatabase {
    /// Splits relations that are both input and output: the original keeps
    /// the input role, a fresh `@output` copy fed by a bridge rule takes the
    /// output role.
    fn partition_io(program: &mut Program) -> bool {
        let both: Vec<QualifiedName> = program
            .relations
            .values()
            .filter(|relation| relation.is_input && relation.is_output)
            .map(|relation| relation.name.clone())
            .collect();
        for name in &both {
            let arity = program.relations[name].arity;
            let copy = name.with_suffix("@output");
            program
                .relations
                .get_mut(name)
                .expect("relation listed above")
                .is_output = false;
            program.add_relation(Relation::new(copy.clone(), arity).output());
            let args = bridge_args(arity);
            program.clauses.push(Clause::new(
                Atom::new(copy, args.clone()),
                vec![Literal::Atom(Atom::new(name.clone(), args))],
            ));
        }
        !both.is_empty()
    }

    /// Separates the IDB from the EDB: clauses deriving into an input
    /// relation derive into a fresh `@idb` copy instead, which also absorbs
    /// the input's facts through a bridge rule.
    fn extract_idb(program: &mut Program) -> bool {
        let to_extract: Vec<QualifiedName> = program
            .relations
            .values()
            .filter(|relation| relation.is_input && program.has_clauses(&relation.name))
            .map(|relation| relation.name.clone())
            .collect();
        for name in &to_extract {
            let arity = program.relations[name].arity;
            let idb = name.with_suffix("@idb");
            program.add_relation(Relation::new(idb.clone(), arity));
            for clause in &mut program.clauses {
                clause.visit_atoms_mut(&mut |atom| {
                    if atom.name == *name {
                        atom.name = idb.clone();
                    }
                });
            }
            let args = bridge_args(arity);
            program.clauses.push(Clause::new(
                Atom::new(idb.clone(), args.clone()),
                vec![Literal::Atom(Atom::new(name.clone(), args))],
            ));
        }
        !to_extract.is_empty()
    }

    /// Funnels each output relation through a single bridge rule over a
    /// fresh `@interm` internal relation, so outputs are defined by exactly
    /// one rule and feed nothing else.
    fn querify_outputs(program: &mut Program) -> bool {
        let outputs: Vec<QualifiedName> = program
            .relations
            .values()
            .filter(|relation| relation.is_output)
            .map(|relation| relation.name.clone())
            .collect();
        let mut changed = false;
        for name in &outputs {
            if Self::is_querified(program, name) {
                continue;
            }
            let arity = program.relations[name].arity;
            let interm = name.with_suffix("@interm");
            program.add_relation(Relation::new(interm.clone(), arity));
            for clause in &mut program.clauses {
                clause.visit_atoms_mut(&mut |atom| {
                    if atom.name == *name {
                        atom.name = interm.clone();
                    }
                });
            }
            let args = bridge_args(arity);
            program.clauses.push(Clause::new(
                Atom::new(name.clone(), args.clone()),
                vec![Literal::Atom(Atom::new(interm, args))],
            ));
            changed = true;
        }
        changed
    }

    /// True iff the output already has the querified shape: one defining
    /// rule copying a single atom over distinct variables, and no other use.
    fn is_querified(program: &Program, name: &QualifiedName) -> bool {
        let mut defining = program.clauses_for(name);
        let Some(clause) = defining.next() else {
            return false;
        };
        if defining.next().is_some() {
            return false;
        }
        let [Literal::Atom(atom)] = clause.body.as_slice() else {
            return false;
        };
        let head_vars: Option<Vec<&str>> =
            clause.head.args.iter().map(Argument::as_variable).collect();
        let body_vars: Option<Vec<&str>> =
            atom.args.iter().map(Argument::as_variable).collect();
        let (Some(head_vars), Some(body_vars)) = (head_vars, body_vars) else {
            return false;
        };
        if head_vars != body_vars {
            return false;
        }
        let distinct: std::collections::BTreeSet<&str> = head_vars.iter().copied().collect();
        if distinct.len() != head_vars.len() {
            return false;
        }
        for other in &program.clauses {
            for literal in &other.body {
                let mut used = false;
                literal.visit_atoms(&mut |atom| {
                    if atom.name == *name {
                        used = true;
                    }
                });
                if used {
                    return false;
                }
            }
        }
        true
    }

    /// Replaces every non-variable atom argument by a fresh variable equated
    /// to it, recursing through record fields and aggregate bodies.
    fn normalise_arguments(program: &mut Program, id_gen: &mut IdGen) -> bool {
        let mut changed = false;
        for clause in &mut program.clauses {
            let mut head_constraints = Vec::new();
            for argument in &mut clause.head.args {
                lift_argument(argument, &mut head_constraints, id_gen, &mut changed);
            }
            clause.body.extend(head_constraints);
            changed |= normalise_literals(&mut clause.body, id_gen);
        }
        changed
    }
}

/// Fresh clause-local variables for a bridge rule.
fn bridge_args(arity: usize) -> Vec<Argument> {
    (0..arity)
        .map(|index| Argument::var(format!("@io{}", index)))
        .collect()
}

/// Normalises the atom arguments of one literal list, appending the lifted
/// equalities, then normalises aggregate bodies reachable from the
/// constraints.
fn normalise_literals(literals: &mut Vec<Literal>, id_gen: &mut IdGen) -> bool {
    let mut changed = false;
    let mut new_constraints = Vec::new();
    for literal in literals.iter_mut() {
        match literal {
            Literal::Atom(atom) | Literal::Negation(atom) => {
                for argument in &mut atom.args {
                    lift_argument(argument, &mut new_constraints, id_gen, &mut changed);
                }
            }
            Literal::Constraint(_) => {}
        }
    }
    literals.extend(new_constraints);
    for literal in literals.iter_mut() {
        if let Literal::Constraint(constraint) = literal {
            normalise_nested_aggregates(&mut constraint.lhs, id_gen, &mut changed);
            normalise_nested_aggregates(&mut constraint.rhs, id_gen, &mut changed);
        }
    }
    changed
}

/// Replaces a non-variable argument by a fresh `@norm` variable and records
/// the defining equality. Record fields are lifted first, so records in
/// constraints always hold plain variables.
fn lift_argument(
    argument: &mut Argument,
    constraints: &mut Vec<Literal>,
    id_gen: &mut IdGen,
    changed: &mut bool,
) {
    if matches!(argument, Argument::Variable(_)) {
        return;
    }
    if let Argument::Record(elements) = argument {
        for element in elements {
            lift_argument(element, constraints, id_gen, changed);
        }
    }
    let fresh = format!("@norm{}", id_gen.allocate_id());
    let original = std::mem::replace(argument, Argument::var(fresh.clone()));
    constraints.push(Literal::Constraint(BinaryConstraint::eq(
        Argument::var(fresh),
        original,
    )));
    *changed = true;
}

/// Normalises aggregate bodies nested anywhere inside an argument.
fn normalise_nested_aggregates(argument: &mut Argument, id_gen: &mut IdGen, changed: &mut bool) {
    match argument {
        Argument::Variable(_) | Argument::Constant(_) => {}
        Argument::Record(args) | Argument::Functor { args, .. } => {
            for argument in args {
                normalise_nested_aggregates(argument, id_gen, changed);
            }
        }
        Argument::Aggregate(aggregate) => {
            *changed |= normalise_literals(&mut aggregate.body, id_gen);
        }
    }
}
