//! Route patterns used to dispatch inbound requests

use regex::Regex;
use std::fmt;

use crate::error::{RemotingError, Result};

/// Matcher over a request path.
///
/// Two patterns are equal when their raw forms are equal.
#[derive(Clone)]
pub enum RoutePattern {
    /// Matches one path exactly
    Exact(String),
    /// Matches any path the expression finds a match in
    Regex(Regex),
}

impl RoutePattern {
    pub fn exact(path: impl Into<String>) -> Self {
        RoutePattern::Exact(path.into())
    }

    pub fn regex(expr: &str) -> Result<Self> {
        Regex::new(expr)
            .map(RoutePattern::Regex)
            .map_err(|e| RemotingError::InvalidArgument(format!("invalid route pattern: {}", e)))
    }

    /// The raw form: the exact path or the expression source
    pub fn raw(&self) -> &str {
        match self {
            RoutePattern::Exact(path) => path,
            RoutePattern::Regex(regex) => regex.as_str(),
        }
    }

    pub fn matches(&self, path: &str) -> bool {
        match self {
            RoutePattern::Exact(exact) => exact == path,
            RoutePattern::Regex(regex) => regex.is_match(path),
        }
    }
}

impl PartialEq for RoutePattern {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (RoutePattern::Exact(a), RoutePattern::Exact(b)) => a == b,
            (RoutePattern::Regex(a), RoutePattern::Regex(b)) => a.as_str() == b.as_str(),
            _ => false,
        }
    }
}

impl Eq for RoutePattern {}

impl fmt::Debug for RoutePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoutePattern::Exact(path) => write!(f, "Exact({:?})", path),
            RoutePattern::Regex(regex) => write!(f, "Regex(/{}/)", regex.as_str()),
        }
    }
}

impl fmt::Display for RoutePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.raw())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_match() {
        let pattern = RoutePattern::exact("/module-manager");
        assert!(pattern.matches("/module-manager"));
        assert!(!pattern.matches("/module-manager/object-proxy"));
    }

    #[test]
    fn test_regex_match() {
        let pattern = RoutePattern::regex("^/objects/[0-9]+$").unwrap();
        assert!(pattern.matches("/objects/12"));
        assert!(!pattern.matches("/objects/x"));
        assert!(RoutePattern::regex("(").is_err());
    }

    #[test]
    fn test_equality_by_raw_form() {
        assert_eq!(RoutePattern::exact("/a"), RoutePattern::exact("/a"));
        assert_ne!(RoutePattern::exact("/a"), RoutePattern::exact("/b"));
        assert_eq!(
            RoutePattern::regex("^/a$").unwrap(),
            RoutePattern::regex("^/a$").unwrap()
        );
        assert_ne!(RoutePattern::exact("/a"), RoutePattern::regex("/a").unwrap());
    }
}
