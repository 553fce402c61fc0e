// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Path parsing and normalisation
//!
//! Paths are slash separated, optionally qualified with a scheme
//! (`file:///a/b`). Two spellings of the same location (`/a//b/`, `/a/./b`)
//! normalise to the same canonical string, which is what the namespace
//! lookups key on.

use std::fmt;
use std::str::FromStr;

use crate::error::{FsError, FsResult};

pub const SEPARATOR: char = '/';

/// A normalised filesystem path
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FsPath {
    scheme: Option<String>,
    /// Canonical form: "/" for the root, "/a/b" for absolute paths, "a/b"
    /// for relative ones and "" for the empty relative path.
    path: String,
}

impl FsPath {
    /// The root directory path
    pub fn root() -> Self {
        Self {
            scheme: None,
            path: SEPARATOR.to_string(),
        }
    }

    /// Parse a plain path or a scheme-qualified one (`file:///a`, `file:/a`).
    ///
    /// Everything after the scheme is taken literally, so `%`, `#` and `?`
    /// are ordinary name characters. A host part (`file://host/a`) is rejected.
    pub fn parse(raw: &str) -> FsResult<Self> {
        if raw.is_empty() {
            return Err(FsError::invalid_argument("path must not be empty"));
        }

        let Some((scheme, rest)) = split_scheme(raw) else {
            return Ok(Self {
                scheme: None,
                path: Self::normalize(raw),
            });
        };

        let rest = match rest.strip_prefix("//") {
            Some(after) => {
                let end = after.find(SEPARATOR).unwrap_or(after.len());
                let (authority, path) = after.split_at(end);
                if !authority.is_empty() {
                    return Err(FsError::invalid_argument(format!(
                        "unsupported authority '{authority}' in path '{raw}'"
                    )));
                }
                path
            }
            None => rest,
        };
        let mut path = Self::normalize(rest);
        if !path.starts_with(SEPARATOR) {
            path.insert(0, SEPARATOR);
        }
        Ok(Self {
            scheme: Some(scheme.to_ascii_lowercase()),
            path,
        })
    }

    fn normalize(raw: &str) -> String {
        let absolute = raw.starts_with(SEPARATOR);
        let mut parts: Vec<&str> = Vec::new();
        for part in raw.split(SEPARATOR) {
            match part {
                "" | "." => {}
                ".." => match parts.last() {
                    Some(last) if *last != ".." => {
                        parts.pop();
                    }
                    _ if absolute => {}
                    _ => parts.push(".."),
                },
                other => parts.push(other),
            }
        }

        let joined = parts.join("/");
        if absolute {
            format!("/{joined}")
        } else {
            joined
        }
    }

    pub fn scheme(&self) -> Option<&str> {
        self.scheme.as_deref()
    }

    pub fn as_str(&self) -> &str {
        &self.path
    }

    pub fn is_absolute(&self) -> bool {
        self.path.starts_with(SEPARATOR)
    }

    pub fn is_root(&self) -> bool {
        self.path == "/"
    }

    /// Path components, root excluded
    pub fn components(&self) -> impl Iterator<Item = &str> {
        self.path.split(SEPARATOR).filter(|c| !c.is_empty())
    }

    /// Last component, empty for the root
    pub fn name(&self) -> &str {
        self.components().last().unwrap_or("")
    }

    /// Parent path, `None` for the root and for single-component relative paths
    pub fn parent(&self) -> Option<FsPath> {
        if self.is_root() || self.path.is_empty() {
            return None;
        }
        let idx = self.path.rfind(SEPARATOR)?;
        let parent = if idx == 0 {
            "/".to_string()
        } else {
            self.path[..idx].to_string()
        };
        Some(FsPath {
            scheme: self.scheme.clone(),
            path: parent,
        })
    }

    /// Append a single entry name
    pub fn child(&self, name: &str) -> FsPath {
        let path = if self.path.is_empty() {
            name.to_string()
        } else if self.is_root() {
            format!("/{name}")
        } else {
            format!("{}/{name}", self.path)
        };
        FsPath {
            scheme: self.scheme.clone(),
            path: Self::normalize(&path),
        }
    }

    /// Resolve `relative` against `self`; absolute arguments are returned unchanged
    pub fn resolve(&self, relative: &FsPath) -> FsPath {
        if relative.is_absolute() {
            return relative.clone();
        }
        let joined = format!("{}/{}", self.path, relative.path);
        FsPath {
            scheme: self.scheme.clone(),
            path: Self::normalize(&joined),
        }
    }

    /// Whether `self` equals `ancestor` or lies beneath it
    pub fn starts_with(&self, ancestor: &FsPath) -> bool {
        if ancestor.is_root() {
            return self.is_absolute();
        }
        self.path == ancestor.path
            || self
                .path
                .strip_prefix(&ancestor.path)
                .is_some_and(|rest| rest.starts_with(SEPARATOR))
    }

    /// The same location with the scheme dropped
    pub fn without_scheme(&self) -> FsPath {
        FsPath {
            scheme: None,
            path: self.path.clone(),
        }
    }
}

/// `scheme:` prefix followed by an absolute path, per RFC 3986 scheme syntax
fn split_scheme(raw: &str) -> Option<(&str, &str)> {
    let (scheme, rest) = raw.split_once(':')?;
    let mut chars = scheme.chars();
    let valid = chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
    (valid && rest.starts_with(SEPARATOR)).then_some((scheme, rest))
}

impl fmt::Display for FsPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.scheme {
            Some(scheme) => write!(f, "{scheme}://{}", self.path),
            None => f.write_str(&self.path),
        }
    }
}

impl FromStr for FsPath {
    type Err = FsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl AsRef<str> for FsPath {
    fn as_ref(&self) -> &str {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(s: &str) -> FsPath {
        FsPath::parse(s).unwrap()
    }

    #[test]
    fn normalises_equivalent_spellings() {
        assert_eq!(p("/a//b/"), p("/a/b"));
        assert_eq!(p("/a/./b"), p("/a/b"));
        assert_eq!(p("/a/c/../b"), p("/a/b"));
        assert_eq!(p("/../a").as_str(), "/a");
        assert_eq!(p("a/../../b").as_str(), "../b");
    }

    #[test]
    fn parses_scheme_qualified_paths() {
        let path = p("file:///tmp/x");
        assert_eq!(path.scheme(), Some("file"));
        assert_eq!(path.as_str(), "/tmp/x");
        assert!(path.is_absolute());
        assert_eq!(path.to_string(), "file:///tmp/x");
        assert_eq!(path.without_scheme(), p("/tmp/x"));
    }

    #[test]
    fn qualified_names_are_taken_literally() {
        let plain = p("/a b/f%20x#1?q");
        let qualified = p("file:///a b/f%20x#1?q");
        assert_eq!(qualified.as_str(), "/a b/f%20x#1?q");
        assert_eq!(qualified.without_scheme(), plain);
        assert_eq!(qualified.name(), "f%20x#1?q");
        assert_eq!(p("file:///data#1").as_str(), "/data#1");
    }

    #[test]
    fn single_slash_scheme_form() {
        let path = p("file:/x/y");
        assert_eq!(path.scheme(), Some("file"));
        assert_eq!(path.as_str(), "/x/y");
        assert_eq!(p("FILE:///x").scheme(), Some("file"));
        assert_eq!(p("file://").as_str(), "/");
    }

    #[test]
    fn colon_without_scheme_syntax_is_a_plain_name() {
        assert_eq!(p("a:b").scheme(), None);
        assert_eq!(p("a:b").as_str(), "a:b");
        assert_eq!(p("dir/x:/y").scheme(), None);
        assert_eq!(p("1x:/y").scheme(), None);
    }

    #[test]
    fn rejects_host_component() {
        assert!(matches!(FsPath::parse("file://host/x"), Err(FsError::InvalidArgument(_))));
    }

    #[test]
    fn rejects_empty_path() {
        assert!(matches!(FsPath::parse(""), Err(FsError::InvalidArgument(_))));
    }

    #[test]
    fn parent_and_name() {
        let path = p("/a/b/c.txt");
        assert_eq!(path.name(), "c.txt");
        assert_eq!(path.parent(), Some(p("/a/b")));
        assert_eq!(p("/a").parent(), Some(FsPath::root()));
        assert_eq!(FsPath::root().parent(), None);
        assert_eq!(FsPath::root().name(), "");
    }

    #[test]
    fn resolve_relative_against_base() {
        let base = p("/work");
        assert_eq!(base.resolve(&p("x/y")), p("/work/x/y"));
        assert_eq!(base.resolve(&p("/abs")), p("/abs"));
        assert_eq!(base.resolve(&p("../up")), p("/up"));
        assert_eq!(FsPath::root().child("a").child("b"), p("/a/b"));
    }

    #[test]
    fn starts_with_respects_component_boundaries() {
        assert!(p("/a/b").starts_with(&p("/a")));
        assert!(p("/a").starts_with(&p("/a")));
        assert!(!p("/ab").starts_with(&p("/a")));
        assert!(p("/anything").starts_with(&FsPath::root()));
    }
}
