//! Request matchers: pure predicates over `(path, method)` deciding whether a hook applies.

use std::fmt;
use std::sync::Arc;

type Predicate = Arc<dyn Fn(&str, &str) -> bool + Send + Sync>;

#[derive(Clone)]
enum Rule {
    All,
    Path(String),
    Method(String),
    PathAndMethod { path: String, method: String },
    PathPrefix(String),
    Custom(Predicate),
}

/// Decides whether a hook applies to a request.
///
/// Built-in matchers compare by exact string equality (methods are
/// case-sensitive). `custom` predicates must be pure: the registry may call
/// them any number of times and expects identical answers for identical
/// input.
#[derive(Clone)]
pub struct Matcher {
    rule: Rule,
}

impl Matcher {
    /// Matches every request.
    pub fn all() -> Self {
        Self { rule: Rule::All }
    }

    /// Matches requests whose path equals `path` exactly.
    pub fn path(path: impl Into<String>) -> Self {
        Self {
            rule: Rule::Path(path.into()),
        }
    }

    /// Matches requests whose method equals `method` exactly.
    pub fn method(method: impl Into<String>) -> Self {
        Self {
            rule: Rule::Method(method.into()),
        }
    }

    /// Matches requests whose path and method both match exactly.
    pub fn path_and_method(path: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            rule: Rule::PathAndMethod {
                path: path.into(),
                method: method.into(),
            },
        }
    }

    /// Matches `prefix` itself and any path below it, on segment boundaries.
    ///
    /// `Matcher::path_prefix("/admin")` accepts `/admin` and `/admin/users`
    /// but not `/administrator`.
    pub fn path_prefix(prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        let prefix = prefix.trim_end_matches('/').to_string();
        Self {
            rule: Rule::PathPrefix(prefix),
        }
    }

    /// Matches with a caller-supplied predicate.
    pub fn custom<F>(predicate: F) -> Self
    where
        F: Fn(&str, &str) -> bool + Send + Sync + 'static,
    {
        Self {
            rule: Rule::Custom(Arc::new(predicate)),
        }
    }

    /// Evaluates the matcher against a request.
    pub fn matches(&self, path: &str, method: &str) -> bool {
        match &self.rule {
            Rule::All => true,
            Rule::Path(expected) => path == expected,
            Rule::Method(expected) => method == expected,
            Rule::PathAndMethod {
                path: expected_path,
                method: expected_method,
            } => path == expected_path && method == expected_method,
            Rule::PathPrefix(prefix) => {
                prefix.is_empty()
                    || path
                        .strip_prefix(prefix.as_str())
                        .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
            }
            Rule::Custom(predicate) => predicate(path, method),
        }
    }
}

impl Default for Matcher {
    fn default() -> Self {
        Self::all()
    }
}

impl fmt::Debug for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.rule {
            Rule::All => f.write_str("Matcher::All"),
            Rule::Path(path) => f.debug_tuple("Matcher::Path").field(path).finish(),
            Rule::Method(method) => f.debug_tuple("Matcher::Method").field(method).finish(),
            Rule::PathAndMethod { path, method } => f
                .debug_struct("Matcher::PathAndMethod")
                .field("path", path)
                .field("method", method)
                .finish(),
            Rule::PathPrefix(prefix) => f.debug_tuple("Matcher::PathPrefix").field(prefix).finish(),
            Rule::Custom(_) => f.write_str("Matcher::Custom(<fn>)"),
        }
    }
}
