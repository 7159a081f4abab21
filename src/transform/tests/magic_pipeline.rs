// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Scenario tests for the rule-IR magic-set pipeline.

use dl_expr::rule::{
    Argument, Atom, BinaryConstraint, Clause, Constant, Literal, Program, QualifiedName,
    Relation,
};
use dl_expr::IdGen;
use dl_transform::magic::{
    is_negatively_labelled, AdornDatabase, LabelDatabase, MagicSet, NormaliseDatabase,
};
use dl_transform::{Optimizer, Transform, TransformArgs};

fn apply<T: Transform<Program>>(pass: &T, program: &mut Program, id_gen: &mut IdGen) -> bool {
    pass.transform(program, TransformArgs { id_gen }).unwrap()
}

fn atom(name: &str, vars: &[&str]) -> Atom {
    Atom::new(name, vars.iter().map(|var| Argument::var(*var)).collect())
}

fn rendered_clauses(program: &Program) -> Vec<String> {
    program.clauses.iter().map(|clause| clause.to_string()).collect()
}

#[test]
fn normalisation_establishes_all_postconditions() {
    let mut program = Program::new();
    program.add_relation(Relation::new("io", 1).input().output());
    program.add_relation(Relation::new("f", 1).input());
    program.add_relation(Relation::new("out", 1).output());
    // An input relation used as a head, and a head argument that needs
    // normalising.
    program.clauses.push(Clause::new(
        atom("f", &["X"]),
        vec![Literal::Atom(atom("io", &["X"]))],
    ));
    program.clauses.push(Clause::new(
        Atom::new(
            "out",
            vec![Argument::Record(vec![
                Argument::var("X"),
                Argument::Constant(Constant::Number(7)),
            ])],
        ),
        vec![Literal::Atom(atom("f", &["X"]))],
    ));

    let pass = NormaliseDatabase;
    let mut id_gen = IdGen::default();
    assert!(apply(&pass, &mut program, &mut id_gen));

    // Partitioned: no relation is both input and output.
    assert!(!program
        .relations
        .values()
        .any(|relation| relation.is_input && relation.is_output));

    // Extracted: no input relation is a clause head.
    for clause in &program.clauses {
        let head = program.relations[&clause.head.name].clone();
        assert!(!head.is_input, "input relation heads a clause: {}", clause);
    }

    // Querified: every output has exactly one defining rule over a single
    // atom and appears in no body.
    for relation in program.relations.values().filter(|relation| relation.is_output) {
        let defining: Vec<_> = program.clauses_for(&relation.name).collect();
        assert_eq!(defining.len(), 1, "output {} has one rule", relation.name);
        assert!(matches!(defining[0].body.as_slice(), [Literal::Atom(_)]));
        for clause in &program.clauses {
            for literal in &clause.body {
                literal.visit_atoms(&mut |atom| assert_ne!(atom.name, relation.name));
            }
        }
    }

    // Normalised: every atom argument is a bare variable.
    for clause in &program.clauses {
        clause.visit_atoms(&mut |atom| {
            for argument in &atom.args {
                assert!(
                    argument.as_variable().is_some(),
                    "non-variable atom argument in {}",
                    clause,
                );
            }
        });
    }

    // Idempotent on its own postconditions.
    assert!(!apply(&pass, &mut program, &mut id_gen));
}

#[test]
fn labelling_separates_negative_contexts() {
    let mut program = Program::new();
    program.add_relation(Relation::new("d", 1).input());
    program.add_relation(Relation::new("e2", 1));
    program.add_relation(Relation::new("c", 1));
    program.add_relation(Relation::new("a", 1).output());
    program.clauses.push(Clause::new(
        atom("a", &["X"]),
        vec![
            Literal::Atom(atom("e2", &["X"])),
            Literal::Negation(atom("c", &["X"])),
        ],
    ));
    program.clauses.push(Clause::new(
        atom("c", &["X"]),
        vec![Literal::Atom(atom("e2", &["X"]))],
    ));
    program.clauses.push(Clause::new(
        atom("e2", &["X"]),
        vec![Literal::Atom(atom("d", &["X"]))],
    ));

    let pass = LabelDatabase;
    let mut id_gen = IdGen::default();
    assert!(apply(&pass, &mut program, &mut id_gen));

    let c_neg = QualifiedName::from("c@neg");
    let e2_pos = QualifiedName::from("e2@poscopy_1");
    assert!(is_negatively_labelled(&c_neg));
    assert!(!is_negatively_labelled(&QualifiedName::from("c")));
    assert!(program.relation(&c_neg).is_some());
    assert!(program.relation(&e2_pos).is_some());

    let rendered = rendered_clauses(&program);
    // The negation now consumes the labelled copy.
    assert!(rendered.contains(&"a(X) :- e2(X), !c@neg(X).".to_string()));
    // The copy owns its own positive lineage.
    assert!(rendered.contains(&"c@neg(X) :- e2@poscopy_1(X).".to_string()));
    assert!(rendered.contains(&"e2@poscopy_1(X) :- d(X).".to_string()));
    // The unlabelled originals survive for positive consumers.
    assert!(rendered.contains(&"c(X) :- e2(X).".to_string()));
    assert!(rendered.contains(&"e2(X) :- d(X).".to_string()));

    assert!(!apply(&pass, &mut program, &mut id_gen));
}

#[test]
fn adornment_terminates_after_two_patterns() {
    let mut program = Program::new();
    program.add_relation(Relation::new("e", 2).input());
    program.add_relation(Relation::new("p", 2));
    program.add_relation(Relation::new("q", 1).output());
    program.clauses.push(Clause::new(
        atom("p", &["X", "Y"]),
        vec![Literal::Atom(atom("e", &["X", "Y"]))],
    ));
    program.clauses.push(Clause::new(
        atom("q", &["X"]),
        vec![
            Literal::Atom(atom("p", &["X", "Y"])),
            Literal::Atom(atom("p", &["Y", "X"])),
            Literal::Constraint(BinaryConstraint::eq(
                Argument::var("X"),
                Argument::number(42),
            )),
        ],
    ));

    let pass = AdornDatabase::default();
    let mut id_gen = IdGen::default();
    assert!(apply(&pass, &mut program, &mut id_gen));

    // The ground query binds X, so exactly two adornments of `p` close the
    // worklist.
    let adorned: Vec<String> = program
        .relations
        .keys()
        .filter(|name| name.last().contains('@'))
        .map(|name| name.to_string())
        .collect();
    assert_eq!(adorned, vec!["p@bb", "p@bf"]);
    // The original `p` was adorned away entirely.
    assert!(program.relation(&QualifiedName::from("p")).is_none());

    let rendered = rendered_clauses(&program);
    assert!(rendered.contains(&"q(X) :- p@bf(X, Y), p@bb(Y, X), X = 42.".to_string()));
    assert!(rendered.contains(&"p@bf(X, Y) :- e(X, Y).".to_string()));
    assert!(rendered.contains(&"p@bb(X, Y) :- e(X, Y).".to_string()));

    assert!(!apply(&pass, &mut program, &mut id_gen));
}

fn transitive_closure_query() -> Program {
    let mut program = Program::new();
    program.add_relation(Relation::new("edge", 2).input());
    program.add_relation(Relation::new("path", 2));
    program.add_relation(Relation::new("q", 1).output());
    program.clauses.push(Clause::new(
        atom("path", &["X", "Y"]),
        vec![Literal::Atom(atom("edge", &["X", "Y"]))],
    ));
    program.clauses.push(Clause::new(
        atom("path", &["X", "Z"]),
        vec![
            Literal::Atom(atom("path", &["X", "Y"])),
            Literal::Atom(atom("edge", &["Y", "Z"])),
        ],
    ));
    program.clauses.push(Clause::new(
        atom("q", &["Y"]),
        vec![
            Literal::Atom(atom("path", &["A", "Y"])),
            Literal::Constraint(BinaryConstraint::eq(
                Argument::var("A"),
                Argument::number(7),
            )),
        ],
    ));
    program
}

#[test]
fn magic_set_restricts_the_closure_to_the_query() {
    let mut program = transitive_closure_query();
    let optimizer = Optimizer::<Program>::logical();
    let mut id_gen = IdGen::default();
    assert!(optimizer.optimize(&mut program, &mut id_gen).unwrap());

    // Demand is tracked by a unary magic relation over the bound column.
    let magic = QualifiedName::from("@magic.path@bf");
    let relation = program.relation(&magic).expect("magic relation exists");
    assert_eq!(relation.arity, 1);

    let rendered = rendered_clauses(&program);
    // The query constant seeds the demand.
    assert!(rendered.contains(&"@magic.path@bf(A) :- A = 7.".to_string()));
    // Both closure rules fire only under demand.
    assert!(rendered.contains(&"path@bf(X, Y) :- @magic.path@bf(X), edge(X, Y).".to_string()));
    assert!(rendered.contains(
        &"path@bf(X, Z) :- @magic.path@bf(X), path@bf(X, Y), edge(Y, Z).".to_string()
    ));
    // The output is funnelled through the adorned internal relation.
    assert!(rendered.contains(&"q@interm(Y) :- path@bf(A, Y), A = 7.".to_string()));
    assert!(rendered.contains(&"q(@io0) :- q@interm(@io0).".to_string()));
    // The unrestricted closure is gone.
    assert!(program.relation(&QualifiedName::from("path")).is_none());

    // The whole pipeline is a fixed point of itself.
    assert!(!optimizer.optimize(&mut program, &mut id_gen).unwrap());
}

#[test]
fn magic_set_alone_guards_adorned_clauses() {
    let mut program = transitive_closure_query();
    let mut id_gen = IdGen::default();
    apply(&NormaliseDatabase, &mut program, &mut id_gen);
    apply(&LabelDatabase, &mut program, &mut id_gen);
    apply(&AdornDatabase::default(), &mut program, &mut id_gen);

    let pass = MagicSet;
    assert!(apply(&pass, &mut program, &mut id_gen));
    // Guarded clauses and derived magic rules are left alone on a rerun.
    assert!(!apply(&pass, &mut program, &mut id_gen));
}
