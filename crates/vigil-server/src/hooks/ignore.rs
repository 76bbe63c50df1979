//! Route-ignore policy.
//!
//! A route is ignored when it exactly matches one of the configured paths, or
//! when the optional pattern matches anywhere in it.

use std::collections::HashSet;

use regex::Regex;
use vigil_core::error::{Result, VigilError};

use crate::config::MetricsSection;

pub const DEFAULT_IGNORE_PATHS: [&str; 6] = [
    "/favicon.ico",
    "/alivez",
    "/versionz",
    "/metrics",
    "/health",
    "/healthz",
];

#[derive(Debug, Clone)]
pub struct IgnorePolicy {
    paths: HashSet<String>,
    pattern: Option<Regex>,
}

impl Default for IgnorePolicy {
    fn default() -> Self {
        Self {
            paths: DEFAULT_IGNORE_PATHS.iter().map(|p| p.to_string()).collect(),
            pattern: None,
        }
    }
}

impl IgnorePolicy {
    pub fn new<I, S>(paths: I, pattern: Option<&str>) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let pattern = pattern
            .map(|p| {
                Regex::new(p)
                    .map_err(|e| VigilError::Config(format!("invalid ignore pattern: {e}")))
            })
            .transpose()?;
        Ok(Self {
            paths: paths.into_iter().map(Into::into).collect(),
            pattern,
        })
    }

    pub fn from_config(m: &MetricsSection) -> Result<Self> {
        Self::new(m.ignore_paths.iter().cloned(), m.ignore_route_regex.as_deref())
    }

    pub fn is_ignored(&self, route: &str) -> bool {
        if self.paths.contains(route) {
            return true;
        }
        self.pattern.as_ref().is_some_and(|re| re.is_match(route))
    }
}
