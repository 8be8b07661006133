//! Selection of records by tag, for the `match` property of outputs.

use std::{fmt::Display, str::FromStr};

/// A pattern that matches record tags.
///
/// The wildcard `*` is allowed at the start and/or at the end of the pattern:
/// - `*` matches every tag
/// - `app.*` matches the tags that start with `app.`
/// - `*.err` matches the tags that end with `.err`
/// - `*kernel*` matches the tags that contain `kernel`
/// - anything else must match exactly
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagPattern {
    Exact(String),
    StartWith(String),
    EndWith(String),
    Contains(String),
    Any,
}

#[derive(Debug, PartialEq, Eq)]
pub struct PatternParseError(String);

impl Display for PatternParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "the wildcard '*' is only allowed at the start or at the end: '{}'", self.0)
    }
}

impl std::error::Error for PatternParseError {}

impl TagPattern {
    pub fn matches(&self, tag: &str) -> bool {
        match self {
            TagPattern::Exact(s) => tag == s,
            TagPattern::StartWith(prefix) => tag.starts_with(prefix),
            TagPattern::EndWith(suffix) => tag.ends_with(suffix),
            TagPattern::Contains(s) => tag.contains(s.as_str()),
            TagPattern::Any => true,
        }
    }
}

impl FromStr for TagPattern {
    type Err = PatternParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let starts = s.starts_with('*');
        let ends = s.ends_with('*') && s.len() > 1;
        let inner = s.trim_start_matches('*').trim_end_matches('*');
        if inner.contains('*') {
            return Err(PatternParseError(s.to_owned()));
        }
        let pat = match (inner.is_empty(), starts, ends) {
            (true, true, _) => TagPattern::Any,
            (_, true, true) => TagPattern::Contains(inner.to_owned()),
            (_, true, false) => TagPattern::EndWith(inner.to_owned()),
            (_, false, true) => TagPattern::StartWith(inner.to_owned()),
            (_, false, false) => TagPattern::Exact(inner.to_owned()),
        };
        Ok(pat)
    }
}

#[cfg(test)]
mod tests {
    use super::TagPattern;

    fn pat(s: &str) -> TagPattern {
        s.parse().unwrap()
    }

    #[test]
    fn parsing() {
        assert_eq!(pat("*"), TagPattern::Any);
        assert_eq!(pat("**"), TagPattern::Any);
        assert_eq!(pat("app.*"), TagPattern::StartWith(String::from("app.")));
        assert_eq!(pat("*.err"), TagPattern::EndWith(String::from(".err")));
        assert_eq!(pat("*kern*"), TagPattern::Contains(String::from("kern")));
        assert_eq!(pat("dummy.0"), TagPattern::Exact(String::from("dummy.0")));
        assert!("a*b".parse::<TagPattern>().is_err());
    }

    #[test]
    fn matching() {
        assert!(pat("*").matches("anything"));
        assert!(pat("app.*").matches("app.web"));
        assert!(!pat("app.*").matches("sys.app"));
        assert!(pat("*.err").matches("app.err"));
        assert!(pat("*kern*").matches("sys.kernel.log"));
        assert!(pat("dummy.0").matches("dummy.0"));
        assert!(!pat("dummy.0").matches("dummy.1"));
    }
}
