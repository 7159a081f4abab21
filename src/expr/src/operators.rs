// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Operator vocabularies shared by both IR levels.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Binary comparison operators usable in constraints.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum BinaryConstraintOp {
    /// Equality.
    Eq,
    /// Inequality.
    Ne,
    /// Strictly less than.
    Lt,
    /// Less than or equal.
    Le,
    /// Strictly greater than.
    Gt,
    /// Greater than or equal.
    Ge,
}

impl fmt::Display for BinaryConstraintOp {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let symbol = match self {
            BinaryConstraintOp::Eq => "=",
            BinaryConstraintOp::Ne => "!=",
            BinaryConstraintOp::Lt => "<",
            BinaryConstraintOp::Le => "<=",
            BinaryConstraintOp::Gt => ">",
            BinaryConstraintOp::Ge => ">=",
        };
        f.write_str(symbol)
    }
}

/// Built-in value operators.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum IntrinsicOp {
    /// Addition.
    Add,
    /// Subtraction.
    Sub,
    /// Multiplication.
    Mul,
    /// Division.
    Div,
    /// Remainder.
    Mod,
    /// Unary negation.
    Neg,
    /// String concatenation.
    Cat,
}

impl fmt::Display for IntrinsicOp {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let symbol = match self {
            IntrinsicOp::Add => "+",
            IntrinsicOp::Sub => "-",
            IntrinsicOp::Mul => "*",
            IntrinsicOp::Div => "/",
            IntrinsicOp::Mod => "%",
            IntrinsicOp::Neg => "-",
            IntrinsicOp::Cat => "cat",
        };
        f.write_str(symbol)
    }
}

/// Aggregation operators.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum AggregateOp {
    /// Number of tuples.
    Count,
    /// Sum of the target expression.
    Sum,
    /// Minimum of the target expression.
    Min,
    /// Maximum of the target expression.
    Max,
}

impl fmt::Display for AggregateOp {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            AggregateOp::Count => "count",
            AggregateOp::Sum => "sum",
            AggregateOp::Min => "min",
            AggregateOp::Max => "max",
        };
        f.write_str(name)
    }
}
