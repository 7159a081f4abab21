// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Transformations for Datalog programs.
//!
//! This crate contains traits, types, and methods suitable for transforming
//! rule-IR and relational-algebra-IR programs in ways that preserve
//! semantics and reduce evaluation cost. The core trait is [`Transform`];
//! implementors can be boxed and iterated over, and common iteration
//! patterns ([`Fixpoint`], [`Optimizer`]) are `Transform`-shaped themselves.
//!
//! Every pass is a total function on well-formed input: it takes the program
//! by mutable reference, performs a complete traversal, and reports whether
//! any node was replaced. Structural invariant violations indicate upstream
//! bugs and fail fast; there are no recoverable errors at this layer.

#![forbid(missing_docs)]
#![deny(missing_debug_implementations)]

use std::error::Error;
use std::fmt;

use dl_expr::IdGen;

pub mod analysis;
pub mod convert_existence_checks;
pub mod create_indices;
pub mod level_conditions;
pub mod magic;
pub mod materialize_aggregations;
pub mod reorder_literals;
pub mod sips;
pub mod unique_aggregation_variables;

/// Arguments that get threaded through all transforms.
#[derive(Debug)]
pub struct TransformArgs<'a> {
    /// The translation unit's fresh-id generator, used wherever a pass
    /// invents relations or variables.
    pub id_gen: &'a mut IdGen,
}

/// Types capable of transforming programs of IR type `Ir`.
pub trait Transform<Ir>: fmt::Debug {
    /// Transforms the program into a semantically equivalent program,
    /// returning true iff any node was replaced.
    ///
    /// A second application directly after a first must report no further
    /// change.
    fn transform(&self, program: &mut Ir, args: TransformArgs)
        -> Result<bool, TransformError>;

    /// A string describing the transform.
    ///
    /// This is useful mainly when iterating through many `Box<Transform>`
    /// and one wants to judge progress before some defect occurs.
    fn debug(&self) -> String {
        format!("{:?}", self)
    }

    /// Applies the transform and reports the outcome to the trace log.
    fn apply(&self, program: &mut Ir, args: TransformArgs) -> Result<bool, TransformError> {
        let changed = self.transform(program, args)?;
        tracing::debug!(transform = %self.debug(), changed, "pass applied");
        Ok(changed)
    }
}

/// Errors that can occur during a transformation.
#[derive(Debug, Clone)]
pub enum TransformError {
    /// An unstructured error.
    Internal(String),
}

impl fmt::Display for TransformError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TransformError::Internal(msg) => write!(f, "internal transform error: {}", msg),
        }
    }
}

impl Error for TransformError {}

/// A sequence of transformations iterated until no pass reports a change.
#[derive(Debug)]
pub struct Fixpoint<Ir> {
    /// The transforms to iterate.
    pub transforms: Vec<Box<dyn Transform<Ir> + Send>>,
    /// Upper bound on iterations before the fixpoint is declared divergent.
    pub limit: usize,
}

impl<Ir> Transform<Ir> for Fixpoint<Ir>
where
    Ir: fmt::Debug + fmt::Display,
{
    fn transform(&self, program: &mut Ir, args: TransformArgs) -> Result<bool, TransformError> {
        let mut changed_at_all = false;
        for _ in 0..self.limit {
            let mut changed = false;
            for transform in self.transforms.iter() {
                changed |= transform.apply(
                    program,
                    TransformArgs {
                        id_gen: &mut *args.id_gen,
                    },
                )?;
            }
            if !changed {
                return Ok(changed_at_all);
            }
            changed_at_all = true;
        }
        Err(TransformError::Internal(format!(
            "fixpoint looped too many times {:#?}\n{}",
            self, program,
        )))
    }
}

/// An optimizer for one IR level: a sequence of transforms applied in order.
///
/// The two canonical pipelines are [`Optimizer::logical`] for the rule IR and
/// [`Optimizer::physical`] for the relational-algebra IR. The driver is free
/// to assemble its own sequence instead.
#[derive(Debug)]
pub struct Optimizer<Ir> {
    /// The list of transforms to apply to an input program.
    pub transforms: Vec<Box<dyn Transform<Ir> + Send>>,
}

impl<Ir> Optimizer<Ir> {
    /// Optimizes the supplied program, returning true iff any pass changed
    /// it.
    pub fn optimize(&self, program: &mut Ir, id_gen: &mut IdGen) -> Result<bool, TransformError> {
        let mut changed = false;
        for transform in self.transforms.iter() {
            changed |= transform.apply(
                program,
                TransformArgs {
                    id_gen: &mut *id_gen,
                },
            )?;
        }
        Ok(changed)
    }
}

impl Optimizer<dl_expr::rule::Program> {
    /// The canonical rule-IR pipeline: aggregation cleanups, then the
    /// demand-driven magic-set stages in their required order, then literal
    /// reordering.
    pub fn logical() -> Self {
        let transforms: Vec<Box<dyn Transform<dl_expr::rule::Program> + Send>> = vec![
            Box::new(unique_aggregation_variables::UniqueAggregationVariables),
            Box::new(materialize_aggregations::MaterializeAggregationQueries),
            Box::new(magic::NormaliseDatabase),
            Box::new(magic::LabelDatabase),
            Box::new(magic::AdornDatabase::default()),
            Box::new(magic::MagicSet),
            Box::new(reorder_literals::ReorderLiterals::default()),
        ];
        Self { transforms }
    }
}

impl Optimizer<dl_expr::ra::Program> {
    /// The canonical relational-algebra pipeline, iterated to a fixed point:
    /// condition leveling, index creation, existence-check conversion.
    pub fn physical() -> Self {
        let transforms: Vec<Box<dyn Transform<dl_expr::ra::Program> + Send>> =
            vec![Box::new(Fixpoint {
                limit: 100,
                transforms: vec![
                    Box::new(level_conditions::LevelConditions),
                    Box::new(create_indices::CreateIndices),
                    Box::new(convert_existence_checks::ConvertExistenceChecks),
                ],
            })];
        Self { transforms }
    }
}
