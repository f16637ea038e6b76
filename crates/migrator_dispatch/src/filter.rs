//! Eligibility filter for workspace entries.
//!
//! Applied identically to the backlog scan and to live events. Rejected
//! names are skipped silently and never recorded as processed.

use crate::config::MigratorConfig;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;

/// `{anything}-v{digits}`: our own output roots.
static VERSIONED_OUTPUT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"-v\d+$").expect("versioned output pattern is valid"));

/// Why an entry is not a candidate project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    Hidden,
    ExcludedName(String),
    OutputPrefix(String),
    VersionedOutput,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hidden => f.write_str("hidden entry"),
            Self::ExcludedName(name) => write!(f, "excluded name '{name}'"),
            Self::OutputPrefix(prefix) => write!(f, "output prefix '{prefix}'"),
            Self::VersionedOutput => f.write_str("versioned output directory"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct EligibilityFilter {
    excluded_names: Vec<String>,
    excluded_prefixes: Vec<String>,
}

impl EligibilityFilter {
    pub fn new(excluded_names: Vec<String>, excluded_prefixes: Vec<String>) -> Self {
        Self {
            excluded_names: excluded_names.into_iter().map(|n| n.to_lowercase()).collect(),
            excluded_prefixes: excluded_prefixes.into_iter().map(|p| p.to_lowercase()).collect(),
        }
    }

    pub fn from_config(config: &MigratorConfig) -> Self {
        Self::new(config.excluded_names.clone(), config.excluded_prefixes.clone())
    }

    /// `Ok(())` if `name` may be a project, otherwise the first matching reason.
    pub fn check(&self, name: &str) -> Result<(), SkipReason> {
        if name.starts_with('.') {
            return Err(SkipReason::Hidden);
        }
        let lower = name.to_lowercase();
        if self.excluded_names.iter().any(|n| *n == lower) {
            return Err(SkipReason::ExcludedName(name.to_string()));
        }
        if let Some(prefix) = self.excluded_prefixes.iter().find(|p| lower.starts_with(p.as_str())) {
            return Err(SkipReason::OutputPrefix(prefix.clone()));
        }
        if VERSIONED_OUTPUT.is_match(&lower) {
            return Err(SkipReason::VersionedOutput);
        }
        Ok(())
    }

    pub fn is_eligible(&self, name: &str) -> bool {
        self.check(name).is_ok()
    }
}

impl Default for EligibilityFilter {
    fn default() -> Self {
        Self::from_config(&MigratorConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_plain_projects() {
        let filter = EligibilityFilter::default();
        for name in ["MyApp", "Biblioteca", "legacy-vb", "app-v2-src", "v1", "app-v"] {
            assert!(filter.is_eligible(name), "{name} should be eligible");
        }
    }

    #[test]
    fn test_rejects_hidden() {
        let filter = EligibilityFilter::default();
        assert_eq!(filter.check(".git"), Err(SkipReason::Hidden));
        assert_eq!(filter.check(".agent"), Err(SkipReason::Hidden));
    }

    #[test]
    fn test_rejects_node_modules_any_case() {
        let filter = EligibilityFilter::default();
        assert!(matches!(filter.check("node_modules"), Err(SkipReason::ExcludedName(_))));
        assert!(matches!(filter.check("Node_Modules"), Err(SkipReason::ExcludedName(_))));
    }

    #[test]
    fn test_rejects_output_prefix() {
        let filter = EligibilityFilter::default();
        assert_eq!(
            filter.check("biblioteca-vnext"),
            Err(SkipReason::OutputPrefix("biblioteca-v".to_string()))
        );
    }

    #[test]
    fn test_output_names_match_any_case() {
        let filter = EligibilityFilter::new(Vec::new(), vec!["Biblioteca-V".to_string()]);
        assert_eq!(
            filter.check("BIBLIOTECA-vnext"),
            Err(SkipReason::OutputPrefix("biblioteca-v".to_string()))
        );

        let filter = EligibilityFilter::new(Vec::new(), Vec::new());
        for name in ["Biblioteca-V1", "BIBLIOTECA-v2", "Shop-Java-V3"] {
            assert_eq!(filter.check(name), Err(SkipReason::VersionedOutput), "{name}");
        }
    }

    #[test]
    fn test_rejects_versioned_outputs() {
        let filter = EligibilityFilter::new(Vec::new(), Vec::new());
        for name in ["biblioteca-v1", "biblioteca-v2", "shop-java-v12", "X-v0"] {
            assert_eq!(filter.check(name), Err(SkipReason::VersionedOutput), "{name}");
        }
    }

    #[test]
    fn test_custom_lists() {
        let filter = EligibilityFilter::new(vec!["Vendor".to_string()], vec!["tmp-".to_string()]);
        assert!(!filter.is_eligible("vendor"));
        assert!(!filter.is_eligible("tmp-copy"));
        assert!(filter.is_eligible("node_modules"));
    }
}
