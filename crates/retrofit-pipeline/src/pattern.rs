//! Compiled regular expressions that remember their source text.

use std::fmt;

use regex::Regex;

use retrofit_types::{Result, RetrofitError};

/// A compiled regex plus the pattern it was built from.
#[derive(Debug, Clone)]
pub struct Pattern {
    source: String,
    regex: Regex,
}

impl Pattern {
    /// Compile a pattern that may match anywhere in the input.
    pub fn new(source: &str) -> Result<Self> {
        Self::compile(source, source)
    }

    /// Compile a pattern that must match the whole input.
    pub fn whole(source: &str) -> Result<Self> {
        Self::compile(source, &format!("^(?:{source})$"))
    }

    fn compile(source: &str, expression: &str) -> Result<Self> {
        let regex = Regex::new(expression).map_err(|e| RetrofitError::InvalidPattern {
            pattern: source.to_string(),
            message: e.to_string(),
        })?;
        Ok(Self {
            source: source.to_string(),
            regex,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }

    /// Replace every match, expanding `$1`/`${name}` group references.
    pub fn replace_all(&self, text: &str, replacement: &str) -> String {
        self.regex.replace_all(text, replacement).into_owned()
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source && self.regex.as_str() == other.regex.as_str()
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whole_pattern_is_anchored() {
        let p = Pattern::whole("/content/site/.*").unwrap();
        assert!(p.is_match("/content/site/a"));
        assert!(!p.is_match("/other/content/site/a"));

        let name = Pattern::whole("item|teaser").unwrap();
        assert!(name.is_match("item"));
        assert!(!name.is_match("item2"));
    }

    #[test]
    fn free_pattern_matches_anywhere() {
        let p = Pattern::new("old").unwrap();
        assert!(p.is_match("an old value"));
        assert_eq!(p.replace_all("old, older", "new"), "new, newer");
    }

    #[test]
    fn replacement_expands_groups() {
        let p = Pattern::whole("/content/(\\w+)/(.*)").unwrap();
        assert_eq!(
            p.replace_all("/content/site/page", "/archive/$1"),
            "/archive/site"
        );
    }

    #[test]
    fn invalid_pattern_reports_source() {
        let err = Pattern::whole("([").unwrap_err();
        match err {
            RetrofitError::InvalidPattern { pattern, .. } => assert_eq!(pattern, "(["),
            other => panic!("unexpected error: {other}"),
        }
    }
}
