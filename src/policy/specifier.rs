//! Type definitions for package specifiers

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single name or version rule
///
/// Exact patterns compare with string equality. Regex patterns are tested
/// against the whole value without implicit anchoring, so `foo` also
/// matches `foobar`; anchor the expression to require a full match.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "PatternRepr", into = "PatternRepr")]
pub enum Pattern {
    /// Exact string match
    Exact(String),
    /// Regular expression match
    Regex(Regex),
}

/// Wire form of a pattern: a bare string or `{ "regex": "..." }`
#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum PatternRepr {
    Exact(String),
    Regex { regex: String },
}

impl Pattern {
    /// Create an exact-match pattern
    pub fn exact(value: impl Into<String>) -> Self {
        Pattern::Exact(value.into())
    }

    /// Compile a regex pattern
    pub fn regex(expr: &str) -> Result<Self, regex::Error> {
        Ok(Pattern::Regex(Regex::new(expr)?))
    }

    /// Test a value against this pattern
    pub fn is_match(&self, value: &str) -> bool {
        match self {
            Pattern::Exact(expected) => expected == value,
            Pattern::Regex(re) => re.is_match(value),
        }
    }
}

impl From<&str> for Pattern {
    fn from(value: &str) -> Self {
        Pattern::exact(value)
    }
}

impl From<String> for Pattern {
    fn from(value: String) -> Self {
        Pattern::Exact(value)
    }
}

impl From<Regex> for Pattern {
    fn from(re: Regex) -> Self {
        Pattern::Regex(re)
    }
}

impl TryFrom<PatternRepr> for Pattern {
    type Error = regex::Error;

    fn try_from(repr: PatternRepr) -> Result<Self, Self::Error> {
        match repr {
            PatternRepr::Exact(value) => Ok(Pattern::Exact(value)),
            PatternRepr::Regex { regex } => Pattern::regex(&regex),
        }
    }
}

impl From<Pattern> for PatternRepr {
    fn from(pattern: Pattern) -> Self {
        match pattern {
            Pattern::Exact(value) => PatternRepr::Exact(value),
            Pattern::Regex(re) => PatternRepr::Regex {
                regex: re.as_str().to_string(),
            },
        }
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pattern::Exact(value) => write!(f, "{}", value),
            Pattern::Regex(re) => write!(f, "/{}/", re.as_str()),
        }
    }
}

/// Package rule used to build include and exclude lists
///
/// Either field may be omitted. A rule with only a name applies to every
/// version of that name, a rule with only a version applies to every
/// package at that version, and a rule with neither matches everything.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PackageSpecifier {
    /// Package name rule
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<Pattern>,

    /// Package version rule
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<Pattern>,
}

impl PackageSpecifier {
    /// Create a specifier with both fields
    pub fn new(name: impl Into<Pattern>, version: impl Into<Pattern>) -> Self {
        Self {
            name: Some(name.into()),
            version: Some(version.into()),
        }
    }

    /// Create a specifier matching on name only
    pub fn name(name: impl Into<Pattern>) -> Self {
        Self {
            name: Some(name.into()),
            version: None,
        }
    }

    /// Create a specifier matching on version only
    pub fn version(version: impl Into<Pattern>) -> Self {
        Self {
            name: None,
            version: Some(version.into()),
        }
    }

    /// Check whether this specifier selects the given package
    pub fn matches(&self, name: &str, version: &str) -> bool {
        let name_matched = self.name.as_ref().map(|p| p.is_match(name));
        let version_matched = self.version.as_ref().map(|p| p.is_match(version));

        match (name_matched, version_matched) {
            (Some(n), Some(v)) => n && v,
            (Some(n), None) => n,
            (None, Some(v)) => v,
            (None, None) => true,
        }
    }
}

impl fmt::Display for PackageSpecifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.name, &self.version) {
            (Some(n), Some(v)) => write!(f, "{}@{}", n, v),
            (Some(n), None) => write!(f, "{}@*", n),
            (None, Some(v)) => write!(f, "*@{}", v),
            (None, None) => write!(f, "*@*"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_pattern() {
        let pattern = Pattern::exact("react");
        assert!(pattern.is_match("react"));
        assert!(!pattern.is_match("react-dom"));
        assert!(!pattern.is_match("React"));
    }

    #[test]
    fn test_regex_pattern_is_unanchored() {
        let pattern = Pattern::regex("foo").unwrap();
        assert!(pattern.is_match("foo"));
        assert!(pattern.is_match("foobar"));
        assert!(pattern.is_match("barfoo"));

        let anchored = Pattern::regex("^foo$").unwrap();
        assert!(!anchored.is_match("foobar"));
    }

    #[test]
    fn test_invalid_regex() {
        assert!(Pattern::regex("(unclosed").is_err());
    }

    #[test]
    fn test_specifier_field_combinations() {
        let both = PackageSpecifier::new("foo", "1.0.0");
        assert!(both.matches("foo", "1.0.0"));
        assert!(!both.matches("foo", "2.0.0"));
        assert!(!both.matches("bar", "1.0.0"));

        let name_only = PackageSpecifier::name("foo");
        assert!(name_only.matches("foo", "9.9.9"));
        assert!(!name_only.matches("bar", "9.9.9"));

        let version_only = PackageSpecifier::version(Pattern::regex(r"^1\.").unwrap());
        assert!(version_only.matches("anything", "1.2.3"));
        assert!(!version_only.matches("anything", "2.0.0"));

        let empty = PackageSpecifier::default();
        assert!(empty.matches("anything", "0.0.0"));
    }

    #[test]
    fn test_specifier_deserialization() {
        let spec: PackageSpecifier =
            serde_json::from_str(r#"{"name": "foo", "version": {"regex": "^1\\."}}"#).unwrap();

        assert!(matches!(spec.name, Some(Pattern::Exact(ref n)) if n == "foo"));
        assert!(matches!(spec.version, Some(Pattern::Regex(_))));
        assert!(spec.matches("foo", "1.4.0"));

        let bad = serde_json::from_str::<PackageSpecifier>(r#"{"name": {"regex": "("}}"#);
        assert!(bad.is_err());
    }

    #[test]
    fn test_specifier_serialization() {
        let spec = PackageSpecifier::new("foo", Pattern::regex("^2").unwrap());
        let json = serde_json::to_string(&spec).unwrap();
        assert_eq!(json, r#"{"name":"foo","version":{"regex":"^2"}}"#);

        let spec = PackageSpecifier::name("bar");
        let json = serde_json::to_string(&spec).unwrap();
        assert_eq!(json, r#"{"name":"bar"}"#);
    }

    #[test]
    fn test_specifier_display() {
        assert_eq!(PackageSpecifier::new("foo", "1.0.0").to_string(), "foo@1.0.0");
        assert_eq!(PackageSpecifier::name("foo").to_string(), "foo@*");
        assert_eq!(
            PackageSpecifier::version(Pattern::regex("^1").unwrap()).to_string(),
            "*@/^1/"
        );
    }
}
