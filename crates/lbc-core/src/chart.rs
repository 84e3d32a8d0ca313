//! Chart references

use std::path::{Path, PathBuf};

/// Where the chart to install comes from
///
/// A local chart archive carries its own version, so only repository charts
/// can be pinned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChartReference {
    /// A chart archive or directory on disk
    Local(PathBuf),

    /// A chart resolved from a helm repository
    Repository {
        /// Name the repository is registered under (`helm repo add <alias> <url>`)
        alias: String,
        url: String,
        chart: String,
        version: Option<String>,
    },
}

impl ChartReference {
    pub fn local(path: impl Into<PathBuf>) -> Self {
        ChartReference::Local(path.into())
    }

    pub fn repository(
        alias: impl Into<String>,
        url: impl Into<String>,
        chart: impl Into<String>,
        version: Option<String>,
    ) -> Self {
        ChartReference::Repository {
            alias: alias.into(),
            url: url.into(),
            chart: chart.into(),
            version,
        }
    }

    /// Build from CLI flags: a local path wins over repository coordinates
    pub fn from_flags(
        local: Option<&Path>,
        alias: &str,
        url: &str,
        chart: &str,
        version: Option<&str>,
    ) -> Self {
        match local {
            Some(path) => Self::local(path),
            None => Self::repository(alias, url, chart, version.map(str::to_string)),
        }
    }

    pub fn is_local(&self) -> bool {
        matches!(self, ChartReference::Local(_))
    }

    /// The chart argument handed to `helm install` / `helm upgrade`
    pub fn install_ref(&self) -> String {
        match self {
            ChartReference::Local(path) => path.display().to_string(),
            ChartReference::Repository { alias, chart, .. } => format!("{}/{}", alias, chart),
        }
    }

    /// Pinned version; always `None` for local charts
    pub fn version(&self) -> Option<&str> {
        match self {
            ChartReference::Local(_) => None,
            ChartReference::Repository { version, .. } => version.as_deref(),
        }
    }

    /// File name prefix of a fetched archive (`<chart>-<version>.tgz`)
    pub fn archive_prefix(&self) -> Option<String> {
        match self {
            ChartReference::Local(_) => None,
            ChartReference::Repository { chart, .. } => Some(format!("{}-", chart)),
        }
    }
}
