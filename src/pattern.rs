//! Invalidation Patterns
//!
//! Selects cache keys for bulk invalidation by exact key, glob or regular
//! expression.

use regex::Regex;

use crate::error::Result;

// == Invalidation Pattern ==
/// Describes which keys an invalidation targets.
///
/// Plain strings convert by inference: text containing `*` becomes a
/// [`InvalidationPattern::Glob`], anything else a
/// [`InvalidationPattern::Literal`].
#[derive(Debug, Clone)]
pub enum InvalidationPattern {
    /// Exactly this key
    Literal(String),
    /// Whole-key match where `*` stands for any run of characters
    Glob(String),
    /// Keys for which the expression finds a match
    Regex(Regex),
}

impl InvalidationPattern {
    /// Builds a regex pattern from source text.
    pub fn regex(source: &str) -> Result<Self> {
        Ok(InvalidationPattern::Regex(Regex::new(source)?))
    }

    /// Infers a literal or glob pattern from `text`.
    pub fn infer(text: impl Into<String>) -> Self {
        let text = text.into();
        if text.contains('*') {
            InvalidationPattern::Glob(text)
        } else {
            InvalidationPattern::Literal(text)
        }
    }

    // == Compile ==
    /// Resolves the pattern into a matcher that can be tested against keys.
    pub fn compile(&self) -> Result<KeyMatcher<'_>> {
        match self {
            InvalidationPattern::Literal(key) => Ok(KeyMatcher::Exact(key)),
            InvalidationPattern::Glob(glob) => Ok(KeyMatcher::Regex(glob_to_regex(glob)?)),
            InvalidationPattern::Regex(re) => Ok(KeyMatcher::Regex(re.clone())),
        }
    }
}

impl From<&str> for InvalidationPattern {
    fn from(text: &str) -> Self {
        Self::infer(text)
    }
}

impl From<String> for InvalidationPattern {
    fn from(text: String) -> Self {
        Self::infer(text)
    }
}

impl From<Regex> for InvalidationPattern {
    fn from(re: Regex) -> Self {
        InvalidationPattern::Regex(re)
    }
}

impl From<&Regex> for InvalidationPattern {
    fn from(re: &Regex) -> Self {
        InvalidationPattern::Regex(re.clone())
    }
}

// == Key Matcher ==
/// A compiled pattern.
#[derive(Debug)]
pub enum KeyMatcher<'a> {
    Exact(&'a str),
    Regex(Regex),
}

impl KeyMatcher<'_> {
    pub fn is_match(&self, key: &str) -> bool {
        match self {
            KeyMatcher::Exact(target) => *target == key,
            KeyMatcher::Regex(re) => re.is_match(key),
        }
    }
}

// == Glob Translation ==
/// Converts a `*` glob into an anchored regular expression.
///
/// Everything other than `*` is matched literally, including regex
/// metacharacters such as `.` or `?`.
pub fn glob_to_regex(glob: &str) -> Result<Regex> {
    let mut expr = String::with_capacity(glob.len() + 8);
    expr.push_str("(?s)^");
    for (i, part) in glob.split('*').enumerate() {
        if i > 0 {
            expr.push_str(".*");
        }
        expr.push_str(&regex::escape(part));
    }
    expr.push('$');
    Ok(Regex::new(&expr)?)
}
