// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Clause-local analyses shared by the rule-IR passes.

use std::collections::{BTreeMap, BTreeSet};

use dl_expr::rule::{Argument, Clause};
use dl_expr::BinaryConstraintOp;

/// Tracks which variables of one clause are transitively bound.
///
/// Besides the set of bound variables, the store keeps a dependency map in
/// disjunctive normal form: each variable maps to a set of alternatives, and
/// the variable becomes bound as soon as every variable of any one
/// alternative is bound. Dependencies are seeded from the clause's equality
/// constraints (ignoring any that contain aggregates) and reduced to a fixed
/// point after construction and after every bind.
///
/// Head variables bound by an adornment pattern are tracked separately: they
/// count as bound for queries, but do not trigger dependency reduction,
/// since they represent demand rather than produced values.
#[derive(Debug)]
pub struct BindingStore {
    bound_variables: BTreeSet<String>,
    bound_head_variables: BTreeSet<String>,
    binding_dependencies: BTreeMap<String, BTreeSet<BTreeSet<String>>>,
}

impl BindingStore {
    /// Creates a store for one clause, seeded from its equality constraints.
    pub fn new(clause: &Clause) -> BindingStore {
        let mut store = BindingStore {
            bound_variables: BTreeSet::new(),
            bound_head_variables: BTreeSet::new(),
            binding_dependencies: BTreeMap::new(),
        };
        store.generate_binding_dependencies(clause);
        store.reduce_dependencies();
        store
    }

    /// Marks a variable as bound and reduces dependencies to a fixed point.
    pub fn bind_variable(&mut self, name: &str) {
        self.bound_variables.insert(name.to_string());
        self.reduce_dependencies();
    }

    /// Marks a head variable as bound by the adornment pattern.
    pub fn bind_head_variable(&mut self, name: &str) {
        self.bound_head_variables.insert(name.to_string());
    }

    /// True iff the variable is bound, directly or through the head pattern.
    pub fn is_bound(&self, name: &str) -> bool {
        self.bound_variables.contains(name) || self.bound_head_variables.contains(name)
    }

    /// The set of directly bound variables.
    pub fn bound_variables(&self) -> &BTreeSet<String> {
        &self.bound_variables
    }

    /// The remaining dependency map.
    pub fn dependencies(&self) -> &BTreeMap<String, BTreeSet<BTreeSet<String>>> {
        &self.binding_dependencies
    }

    fn add_binding_dependency(&mut self, variable: String, dependency: BTreeSet<String>) {
        self.binding_dependencies
            .entry(variable)
            .or_default()
            .insert(dependency);
    }

    fn process_equality_bindings(&mut self, lhs: &Argument, rhs: &Argument) {
        let Argument::Variable(variable) = lhs else {
            return;
        };
        let variable = variable.clone();
        let mut sub_vars = BTreeSet::new();
        rhs.visit_variables(&mut |name| {
            sub_vars.insert(name.to_string());
        });
        self.add_binding_dependency(variable.clone(), sub_vars);
        // A record is bound iff all its fields are, and vice versa.
        if let Argument::Record(elements) = rhs {
            for element in elements {
                let Argument::Variable(sub_var) = element else {
                    panic!("record fields must be variables after normalisation");
                };
                self.add_binding_dependency(
                    sub_var.clone(),
                    BTreeSet::from([variable.clone()]),
                );
            }
        }
    }

    fn generate_binding_dependencies(&mut self, clause: &Clause) {
        let mut constraints = Vec::new();
        clause.visit_constraints(&mut |constraint| {
            if constraint.op == BinaryConstraintOp::Eq && !constraint.contains_aggregate() {
                constraints.push(constraint.clone());
            }
        });
        for constraint in &constraints {
            self.process_equality_bindings(&constraint.lhs, &constraint.rhs);
            self.process_equality_bindings(&constraint.rhs, &constraint.lhs);
        }
    }

    /// Reduces the dependency map until nothing changes: bound keys leave
    /// the map, bound variables leave every alternative, and a variable with
    /// an empty alternative becomes bound itself. Returns true iff anything
    /// was reduced. A second call directly after a first is a no-op.
    fn reduce_dependencies(&mut self) -> bool {
        let mut reduced_at_all = false;
        loop {
            let mut changed = false;
            let mut new_dependencies = BTreeMap::new();
            let mut variables_to_bind = BTreeSet::new();

            for (variable, alternatives) in &self.binding_dependencies {
                if self.bound_variables.contains(variable) {
                    // No need to keep dependencies of already-bound variables.
                    changed = true;
                    continue;
                }
                assert!(
                    !alternatives.is_empty(),
                    "a variable is only tracked if it appears in at least one equality",
                );

                let mut now_bound = false;
                let mut new_alternatives = BTreeSet::new();
                for alternative in alternatives {
                    if alternative.is_empty() {
                        now_bound = true;
                        break;
                    }
                    let remaining: BTreeSet<String> = alternative
                        .iter()
                        .filter(|name| !self.bound_variables.contains(*name))
                        .cloned()
                        .collect();
                    if remaining.len() != alternative.len() {
                        changed = true;
                    }
                    new_alternatives.insert(remaining);
                }

                if now_bound {
                    variables_to_bind.insert(variable.clone());
                    changed = true;
                } else {
                    new_dependencies.insert(variable.clone(), new_alternatives);
                }
            }

            self.bound_variables.extend(variables_to_bind);
            if !changed {
                return reduced_at_all;
            }
            self.binding_dependencies = new_dependencies;
            reduced_at_all = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use dl_expr::rule::{Atom, BinaryConstraint, Literal};
    use dl_expr::IntrinsicOp;

    use super::*;

    fn functor(args: Vec<Argument>) -> Argument {
        Argument::Functor {
            op: IntrinsicOp::Add,
            args,
        }
    }

    /// `x = f(y, z)`, `y = g(w)`, starting from bound `w`.
    fn sample_clause() -> Clause {
        Clause::new(
            Atom::new("a", vec![Argument::var("x")]),
            vec![
                Literal::Constraint(BinaryConstraint::eq(
                    Argument::var("x"),
                    functor(vec![Argument::var("y"), Argument::var("z")]),
                )),
                Literal::Constraint(BinaryConstraint::eq(
                    Argument::var("y"),
                    functor(vec![Argument::var("w")]),
                )),
            ],
        )
    }

    #[test]
    fn transitive_binding_fixed_point() {
        let mut store = BindingStore::new(&sample_clause());
        store.bind_variable("w");
        assert_eq!(
            store.bound_variables().iter().collect::<Vec<_>>(),
            vec!["w", "y"],
        );
        let x_deps = &store.dependencies()["x"];
        assert_eq!(x_deps.len(), 1);
        assert_eq!(
            x_deps.iter().next().unwrap().iter().collect::<Vec<_>>(),
            vec!["z"],
        );

        store.bind_variable("z");
        assert_eq!(
            store.bound_variables().iter().collect::<Vec<_>>(),
            vec!["w", "x", "y", "z"],
        );
        assert!(store.dependencies().is_empty());
    }

    #[test]
    fn reduction_is_stable() {
        let mut store = BindingStore::new(&sample_clause());
        store.bind_variable("w");
        let before = store.dependencies().clone();
        assert!(!store.reduce_dependencies());
        assert_eq!(&before, store.dependencies());
    }

    #[test]
    fn constants_bind_immediately() {
        let clause = Clause::new(
            Atom::new("a", vec![Argument::var("x")]),
            vec![Literal::Constraint(BinaryConstraint::eq(
                Argument::var("x"),
                Argument::number(42),
            ))],
        );
        let store = BindingStore::new(&clause);
        assert!(store.is_bound("x"));
    }

    #[test]
    fn record_fields_bind_from_the_record() {
        let clause = Clause::new(
            Atom::new("a", vec![Argument::var("r")]),
            vec![Literal::Constraint(BinaryConstraint::eq(
                Argument::var("r"),
                Argument::Record(vec![Argument::var("a"), Argument::var("b")]),
            ))],
        );
        let mut store = BindingStore::new(&clause);
        store.bind_variable("r");
        assert!(store.is_bound("a"));
        assert!(store.is_bound("b"));
    }

    #[test]
    fn head_bindings_do_not_reduce() {
        let mut store = BindingStore::new(&sample_clause());
        store.bind_head_variable("w");
        assert!(store.is_bound("w"));
        // Demand on `w` does not produce `y`.
        assert!(!store.is_bound("y"));
    }
}
