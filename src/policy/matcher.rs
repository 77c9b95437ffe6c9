//! Include/exclude matching for package admission

use crate::policy::specifier::PackageSpecifier;
use serde::{Deserialize, Serialize};

/// Check whether any specifier selects the given package
///
/// Returns `false` for an empty list.
pub fn is_matched(name: &str, version: &str, specifiers: &[PackageSpecifier]) -> bool {
    specifiers.iter().any(|spec| spec.matches(name, version))
}

/// Admission policy built from optional include and exclude lists
///
/// A package must match the include list (when one is configured) and
/// must not match the exclude list. An empty include list counts as not
/// configured.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AdmissionPolicy {
    /// Which packages to include. If not provided, all packages are included
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include: Option<Vec<PackageSpecifier>>,

    /// Which packages to exclude. Filters included packages
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclude: Option<Vec<PackageSpecifier>>,
}

impl AdmissionPolicy {
    /// Create a policy from include and exclude lists
    pub fn new(
        include: Option<Vec<PackageSpecifier>>,
        exclude: Option<Vec<PackageSpecifier>>,
    ) -> Self {
        Self { include, exclude }
    }

    /// A policy that admits every package
    pub fn allow_all() -> Self {
        Self::default()
    }

    /// Determine whether a package may be loaded
    pub fn is_allowed(&self, name: &str, version: &str) -> bool {
        if let Some(include) = self.include.as_deref().filter(|list| !list.is_empty()) {
            if !is_matched(name, version, include) {
                return false;
            }
        }

        if let Some(exclude) = self.exclude.as_deref() {
            if is_matched(name, version, exclude) {
                return false;
            }
        }

        true
    }

    /// Whether the policy restricts anything at all
    pub fn is_unrestricted(&self) -> bool {
        self.include.as_ref().map_or(true, |l| l.is_empty())
            && self.exclude.as_ref().map_or(true, |l| l.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::specifier::Pattern;

    #[test]
    fn test_empty_list_never_matches() {
        assert!(!is_matched("foo", "1.0.0", &[]));
    }

    #[test]
    fn test_any_specifier_matches() {
        let specs = vec![
            PackageSpecifier::name("bar"),
            PackageSpecifier::new("foo", "1.0.0"),
        ];

        assert!(is_matched("bar", "0.1.0", &specs));
        assert!(is_matched("foo", "1.0.0", &specs));
        assert!(!is_matched("foo", "1.0.1", &specs));
    }

    #[test]
    fn test_unrestricted_policy() {
        let policy = AdmissionPolicy::allow_all();
        assert!(policy.is_unrestricted());
        assert!(policy.is_allowed("anything", "0.0.0"));

        let policy = AdmissionPolicy::new(Some(vec![]), Some(vec![]));
        assert!(policy.is_unrestricted());
        assert!(policy.is_allowed("anything", "0.0.0"));
    }

    #[test]
    fn test_include_gate() {
        let policy = AdmissionPolicy::new(Some(vec![PackageSpecifier::name("foo")]), None);
        assert!(policy.is_allowed("foo", "1.0.0"));
        assert!(policy.is_allowed("foo", "2.0.0"));
        assert!(!policy.is_allowed("bar", "1.0.0"));
    }

    #[test]
    fn test_exclude_gate() {
        let policy = AdmissionPolicy::new(None, Some(vec![PackageSpecifier::name("foo")]));
        assert!(!policy.is_allowed("foo", "1.0.0"));
        assert!(policy.is_allowed("bar", "1.0.0"));
    }

    #[test]
    fn test_exclude_filters_included() {
        let policy = AdmissionPolicy::new(
            Some(vec![PackageSpecifier::name(Pattern::regex("foo").unwrap())]),
            Some(vec![PackageSpecifier::name("foobar")]),
        );

        assert!(policy.is_allowed("foo", "1.0.0"));
        assert!(!policy.is_allowed("foobar", "1.0.0"));
        assert!(!policy.is_allowed("baz", "1.0.0"));
    }

    #[test]
    fn test_version_exclusion() {
        let policy = AdmissionPolicy::new(
            None,
            Some(vec![PackageSpecifier::new("lodash", Pattern::regex(r"^3\.").unwrap())]),
        );

        assert!(!policy.is_allowed("lodash", "3.10.1"));
        assert!(policy.is_allowed("lodash", "4.17.21"));
        assert!(policy.is_allowed("underscore", "3.0.0"));
    }

    #[test]
    fn test_policy_deserialization() {
        let policy: AdmissionPolicy = serde_json::from_str(
            r#"{"include": [{"name": {"regex": "^@scope/"}}], "exclude": [{"version": "0.0.0"}]}"#,
        )
        .unwrap();

        assert!(policy.is_allowed("@scope/ui", "1.0.0"));
        assert!(!policy.is_allowed("@scope/ui", "0.0.0"));
        assert!(!policy.is_allowed("other", "1.0.0"));
    }
}
