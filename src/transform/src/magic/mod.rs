// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! The demand-driven magic-set pipeline.
//!
//! Four stages, to be run in order:
//!
//! 1. [`NormaliseDatabase`] partitions input/output relations, separates the
//!    IDB from the EDB, querifies outputs, and normalises atom arguments.
//! 2. [`LabelDatabase`] separates negatively reachable relations from the
//!    main dependency graph so added magic edges cannot merge strata that
//!    negation keeps apart.
//! 3. [`AdornDatabase`] computes binding patterns reachable from the query
//!    relations and emits adorned clauses.
//! 4. [`MagicSet`] restricts every adorned rule to the tuples actually
//!    demanded, deriving demand through magic relations.
//!
//! All generated names funnel through this module, so every stage agrees on
//! the markers. Markers embed `'@'`, which user names cannot contain.

mod adorn;
mod label;
mod normalize;
mod rewrite;

pub use adorn::AdornDatabase;
pub use label::LabelDatabase;
pub use normalize::NormaliseDatabase;
pub use rewrite::MagicSet;

use dl_expr::rule::QualifiedName;

/// The name of a relation's negatively labelled copy.
pub fn negative_label(name: &QualifiedName) -> QualifiedName {
    name.with_suffix("@neg")
}

/// The name of the `count`-th positively labelled copy of a relation.
pub fn positive_label(name: &QualifiedName, count: usize) -> QualifiedName {
    name.with_suffix(&format!("@poscopy_{}", count))
}

/// True iff the relation is a negatively labelled copy.
pub fn is_negatively_labelled(name: &QualifiedName) -> bool {
    name.last().contains("@neg")
}

/// True iff the relation carries any label.
pub fn is_labelled(name: &QualifiedName) -> bool {
    is_negatively_labelled(name) || name.last().contains("@poscopy_")
}

/// The name of a relation's copy adorned with the given binding marker.
///
/// The all-free adornment keeps the original name, and a name already
/// carrying the marker is returned unchanged, so re-adornment cannot stack
/// markers.
pub fn adorned_name(name: &QualifiedName, marker: &str) -> QualifiedName {
    if !marker.contains('b') {
        return name.clone();
    }
    let suffix = format!("@{}", marker);
    if name.last().ends_with(&suffix) {
        return name.clone();
    }
    name.with_suffix(&suffix)
}

/// The binding marker embedded in an adorned name, if any.
pub fn adornment_marker(name: &QualifiedName) -> Option<String> {
    let last = name.last();
    let at = last.rfind('@')?;
    let marker = &last[at + 1..];
    if !marker.is_empty() && marker.chars().all(|c| c == 'b' || c == 'f') {
        Some(marker.to_string())
    } else {
        None
    }
}

/// The name of the magic (demand) relation for an adorned relation.
pub fn magic_name(name: &QualifiedName) -> QualifiedName {
    name.with_leading("@magic")
}

/// True iff the relation is a magic (demand) relation.
pub fn is_magic(name: &QualifiedName) -> bool {
    name.qualifiers().first().map(String::as_str) == Some("@magic")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_algebra() {
        let name = QualifiedName::from("rel");
        assert_eq!(negative_label(&name).to_string(), "rel@neg");
        assert!(is_negatively_labelled(&negative_label(&name)));
        assert!(!is_negatively_labelled(&name));
        assert_eq!(positive_label(&name, 2).to_string(), "rel@poscopy_2");
        assert!(is_labelled(&positive_label(&name, 2)));
        assert!(!is_labelled(&name));
    }

    #[test]
    fn adornment_algebra() {
        let name = QualifiedName::from("path");
        assert_eq!(adorned_name(&name, "ff"), name);
        let adorned = adorned_name(&name, "bf");
        assert_eq!(adorned.to_string(), "path@bf");
        assert_eq!(adornment_marker(&adorned), Some("bf".to_string()));
        assert_eq!(adornment_marker(&name), None);
        // Re-adorning with the same marker does not stack.
        assert_eq!(adorned_name(&adorned, "bf"), adorned);
    }

    #[test]
    fn magic_algebra() {
        let adorned = QualifiedName::from("path@bf");
        let magic = magic_name(&adorned);
        assert_eq!(magic.to_string(), "@magic.path@bf");
        assert!(is_magic(&magic));
        assert!(!is_magic(&adorned));
        // Labels never read as adornment markers.
        assert_eq!(adornment_marker(&QualifiedName::from("rel@neg")), None);
        assert_eq!(adornment_marker(&QualifiedName::from("@agg_body_0")), None);
    }
}
