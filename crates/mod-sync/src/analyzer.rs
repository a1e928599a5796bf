use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::package::PackageId;

/// Two or more synced packages that should not be installed together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conflict {
    pub packages: Vec<PackageId>,
    pub reason: String,
}

/// Errors an analyzer may raise. During a sync these abort the whole call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AnalysisError {
    #[error("invalid conflict rule: {0}")]
    InvalidRule(String),

    #[error("{0}")]
    Other(String),
}

/// Post-pass over the synced package set.
///
/// Implementations must be deterministic for a given input and must not
/// perform I/O. An empty input yields an empty result.
pub trait ConflictAnalyzer: Send + Sync {
    fn analyze(&self, synced: &BTreeSet<PackageId>) -> Result<Vec<Conflict>, AnalysisError>;
}

/// Reference analyzer: never reports a conflict.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoConflicts;

impl ConflictAnalyzer for NoConflicts {
    fn analyze(&self, _synced: &BTreeSet<PackageId>) -> Result<Vec<Conflict>, AnalysisError> {
        Ok(Vec::new())
    }
}

/// A user-declared set of packages known not to work together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictRule {
    pub packages: Vec<PackageId>,
    pub reason: String,
}

/// Applies user-declared [`ConflictRule`]s to the synced set.
///
/// A rule fires when at least two of its packages were synced; the conflict
/// lists just those packages, in rule order.
#[derive(Debug, Default, Clone)]
pub struct DeclaredConflicts {
    rules: Vec<ConflictRule>,
}

impl DeclaredConflicts {
    /// Build the analyzer, rejecting rules that name fewer than two
    /// distinct packages.
    pub fn new(rules: Vec<ConflictRule>) -> Result<Self, AnalysisError> {
        for rule in &rules {
            let distinct: BTreeSet<&PackageId> = rule.packages.iter().collect();
            if distinct.len() < 2 {
                return Err(AnalysisError::InvalidRule(format!(
                    "rule \"{}\" must name at least two distinct packages",
                    rule.reason
                )));
            }
        }
        Ok(Self { rules })
    }

    pub fn rules(&self) -> &[ConflictRule] {
        &self.rules
    }
}

impl ConflictAnalyzer for DeclaredConflicts {
    fn analyze(&self, synced: &BTreeSet<PackageId>) -> Result<Vec<Conflict>, AnalysisError> {
        let mut conflicts = Vec::new();

        for rule in &self.rules {
            let mut hit: Vec<PackageId> = Vec::new();
            for package in &rule.packages {
                if synced.contains(package) && !hit.contains(package) {
                    hit.push(package.clone());
                }
            }

            if hit.len() >= 2 {
                conflicts.push(Conflict {
                    packages: hit,
                    reason: rule.reason.clone(),
                });
            }
        }

        Ok(conflicts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(ids: &[&str]) -> BTreeSet<PackageId> {
        ids.iter().map(|id| PackageId::new(*id)).collect()
    }

    fn rule(ids: &[&str], reason: &str) -> ConflictRule {
        ConflictRule {
            packages: ids.iter().map(|id| PackageId::new(*id)).collect(),
            reason: reason.to_owned(),
        }
    }

    #[test]
    fn no_conflicts_is_always_empty() {
        assert!(NoConflicts.analyze(&set(&[])).unwrap().is_empty());
        assert!(NoConflicts.analyze(&set(&["a", "b"])).unwrap().is_empty());
    }

    #[test]
    fn declared_rule_fires_when_two_members_synced() {
        let analyzer = DeclaredConflicts::new(vec![rule(&["optifine", "sodium"], "renderer")]).unwrap();
        let conflicts = analyzer.analyze(&set(&["sodium", "optifine", "jei"])).unwrap();

        assert_eq!(conflicts.len(), 1);
        assert_eq!(
            conflicts[0].packages,
            vec![PackageId::new("optifine"), PackageId::new("sodium")]
        );
        assert_eq!(conflicts[0].reason, "renderer");
    }

    #[test]
    fn declared_rule_ignored_with_single_member() {
        let analyzer = DeclaredConflicts::new(vec![rule(&["optifine", "sodium"], "renderer")]).unwrap();
        assert!(analyzer.analyze(&set(&["sodium"])).unwrap().is_empty());
    }

    #[test]
    fn partial_match_of_larger_rule_lists_only_synced_members() {
        let analyzer = DeclaredConflicts::new(vec![rule(&["a", "b", "c"], "triad")]).unwrap();
        let conflicts = analyzer.analyze(&set(&["c", "a"])).unwrap();
        assert_eq!(
            conflicts[0].packages,
            vec![PackageId::new("a"), PackageId::new("c")]
        );
    }

    #[test]
    fn declared_rules_tolerate_empty_input() {
        let analyzer = DeclaredConflicts::new(vec![rule(&["a", "b"], "x")]).unwrap();
        assert!(analyzer.analyze(&set(&[])).unwrap().is_empty());
    }

    #[test]
    fn degenerate_rule_is_rejected() {
        let result = DeclaredConflicts::new(vec![rule(&["a", "a"], "self")]);
        assert!(matches!(result, Err(AnalysisError::InvalidRule(_))));
    }

    #[test]
    fn analysis_is_deterministic() {
        let analyzer = DeclaredConflicts::new(vec![
            rule(&["a", "b"], "first"),
            rule(&["b", "c"], "second"),
        ])
        .unwrap();
        let input = set(&["a", "b", "c"]);
        assert_eq!(analyzer.analyze(&input).unwrap(), analyzer.analyze(&input).unwrap());
    }
}
