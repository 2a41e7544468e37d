//! Exclude-pattern matching shared by directory expansion.

use crate::backup::result_error::result::Result;

use derive_more::{Display, From};
use getset::Getters;
use globset::{Glob, GlobBuilder, GlobSet, GlobSetBuilder};
use serde::de::Visitor;
use serde::{Deserialize, Deserializer, Serialize};

use std::fmt::{Debug, Formatter};
use std::path::Path;
use std::result;

/// A glob used for exclude rules and retention scans.
///
/// Built with literal separator mode, so `*` never crosses a `/`. Use `**` to
/// span directories.
#[derive(Clone, Debug, From, Display, Serialize, PartialEq, Eq, Getters)]
#[serde(transparent)]
#[getset(get = "pub")]
pub struct GlobPattern {
    glob: Glob,
}

impl GlobPattern {
    pub fn new<S: AsRef<str>>(pattern: S) -> Result<Self> {
        Ok(GlobBuilder::new(pattern.as_ref())
            .literal_separator(true)
            .build()?
            .into())
    }
}

struct GlobPatternVisitor;

impl Visitor<'_> for GlobPatternVisitor {
    type Value = GlobPattern;

    fn expecting(&self, formatter: &mut Formatter) -> std::fmt::Result {
        formatter.write_str("a glob pattern")
    }

    fn visit_str<E>(self, v: &str) -> result::Result<Self::Value, E>
    where
        E: serde::de::Error,
    {
        GlobBuilder::new(v)
            .literal_separator(true)
            .build()
            .map(GlobPattern::from)
            .map_err(serde::de::Error::custom)
    }
}

impl<'de> Deserialize<'de> for GlobPattern {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> result::Result<Self, D::Error> {
        deserializer.deserialize_str(GlobPatternVisitor)
    }
}

/// Compiled exclude set.
///
/// A path is excluded when any pattern matches the whole path or its last
/// component. An empty set excludes nothing.
#[derive(Clone)]
pub struct PathFilter {
    globset: GlobSet,
    patterns: Vec<GlobPattern>,
}

impl Debug for PathFilter {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.patterns.iter().map(ToString::to_string))
            .finish()
    }
}

impl PathFilter {
    pub fn new<I: IntoIterator<Item = GlobPattern>>(patterns: I) -> Result<Self> {
        let patterns: Vec<_> = patterns.into_iter().collect();
        let mut builder = GlobSetBuilder::new();
        patterns.iter().for_each(|p| {
            builder.add(p.glob.clone());
        });
        let globset = builder.build()?;
        tracing::debug!("Compiled {} exclude patterns", patterns.len());
        Ok(Self { globset, patterns })
    }

    /// Compiles raw pattern strings, failing on the first malformed one.
    pub fn from_strs<I, S>(patterns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns = patterns
            .into_iter()
            .map(GlobPattern::new)
            .collect::<Result<Vec<_>>>()?;
        Self::new(patterns)
    }

    pub fn empty() -> Self {
        Self {
            globset: GlobSet::empty(),
            patterns: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.globset.is_empty()
    }

    pub fn is_excluded<P: AsRef<Path>>(&self, path: P) -> bool {
        if self.globset.is_empty() {
            return false;
        }
        let path = path.as_ref();
        self.globset.is_match(path)
            || path
                .file_name()
                .is_some_and(|name| self.globset.is_match(name))
    }
}
