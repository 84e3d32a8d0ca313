//! helm command dialects
//!
//! helm 2 and helm 3 disagree on argument order, on how a release's namespace
//! is passed and on what `status` prints. The installed helm is probed once
//! and every helm command is built through the resulting [`HelmDialect`].

use lbc_core::ToolVersion;
use std::path::Path;

use crate::error::Result;
use crate::report::Reporter;
use crate::runner::{CommandRunner, DEFAULT_TIMEOUT, Invocation, RunOptions};
use crate::status::{HELM2_STATUS, HELM3_STATUS, TextStatusParser};

/// First helm 3 release whose `repo add` refuses to overwrite without `--force-update`
const FORCE_UPDATE_SINCE: semver::Version = semver::Version::new(3, 3, 2);

/// Command syntax of one helm major version
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HelmDialect {
    V2,
    V3 { force_update: bool },
}

impl HelmDialect {
    /// `helm version --client --short`
    pub fn version_probe() -> Invocation {
        Invocation::new("helm").args(["version", "--client", "--short"])
    }

    /// Select the dialect for a detected version
    pub fn from_version(version: &ToolVersion) -> Self {
        if version.major() <= 2 {
            HelmDialect::V2
        } else {
            HelmDialect::V3 {
                force_update: version.as_semver() >= &FORCE_UPDATE_SINCE,
            }
        }
    }

    /// Probe the installed helm
    ///
    /// A helm that cannot be started is an error. Output without a version
    /// falls back to helm 3 with a warning.
    pub async fn detect<R>(runner: &R, reporter: &Reporter) -> Result<Self>
    where
        R: CommandRunner + ?Sized,
    {
        let output = runner
            .run(
                &Self::version_probe(),
                &RunOptions::new().with_timeout(DEFAULT_TIMEOUT),
            )
            .await?;

        let version = output
            .success()
            .then(|| ToolVersion::find(&output.stdout))
            .flatten();

        match version {
            Some(version) => {
                let dialect = Self::from_version(&version);
                tracing::debug!(%version, ?dialect, "detected helm");
                Ok(dialect)
            }
            None => {
                reporter.warn("unable to determine helm version, assuming helm 3");
                Ok(HelmDialect::V3 {
                    force_update: true,
                })
            }
        }
    }

    pub fn is_v2(&self) -> bool {
        matches!(self, HelmDialect::V2)
    }

    /// Strategy for classifying `helm status` output
    pub fn status_parser(&self) -> &'static dyn TextStatusParser {
        match self {
            HelmDialect::V2 => &HELM2_STATUS,
            HelmDialect::V3 { .. } => &HELM3_STATUS,
        }
    }

    pub fn status(&self, release: &str, namespace: Option<&str>) -> Invocation {
        match self {
            HelmDialect::V2 => Invocation::new("helm").args(["status", release]),
            HelmDialect::V3 { .. } => Invocation::new("helm")
                .arg("status")
                .opt("--namespace", namespace)
                .arg(release),
        }
    }

    /// Values the deployed release was computed with
    pub fn get_values(&self, release: &str, namespace: Option<&str>) -> Invocation {
        match self {
            HelmDialect::V2 => Invocation::new("helm").args(["get", release]),
            HelmDialect::V3 { .. } => Invocation::new("helm")
                .args(["get", "values", release, "--all"])
                .opt("--namespace", namespace),
        }
    }

    /// Start of an install command; the caller appends the remaining arguments
    pub fn install(&self, release: &str, chart: &str, namespace: Option<&str>) -> Invocation {
        match self {
            HelmDialect::V2 => Invocation::new("helm")
                .args(["install", chart, "--name", release])
                .opt("--namespace", namespace),
            HelmDialect::V3 { .. } => Invocation::new("helm")
                .args(["install", release, chart])
                .opt("--namespace", namespace),
        }
    }

    /// Start of an upgrade command
    ///
    /// helm 2 keeps a release in the namespace it was installed to, so it
    /// never receives one here.
    pub fn upgrade(&self, release: &str, chart: &str, namespace: Option<&str>) -> Invocation {
        match self {
            HelmDialect::V2 => Invocation::new("helm").args(["upgrade", release, chart]),
            HelmDialect::V3 { .. } => Invocation::new("helm")
                .args(["upgrade", release])
                .opt("--namespace", namespace)
                .arg(chart),
        }
    }

    pub fn delete(&self, release: &str, namespace: Option<&str>) -> Invocation {
        match self {
            HelmDialect::V2 => Invocation::new("helm").args(["delete", "--purge", release]),
            HelmDialect::V3 { .. } => Invocation::new("helm")
                .arg("delete")
                .opt("--namespace", namespace)
                .arg(release),
        }
    }

    /// Start of a render command; the caller appends value arguments and the chart
    pub fn template(
        &self,
        release: &str,
        namespace: Option<&str>,
        only: Option<&str>,
    ) -> Invocation {
        match self {
            HelmDialect::V2 => Invocation::new("helm")
                .args(["template", "--name", release])
                .opt("--namespace", namespace)
                .opt("--execute", only),
            HelmDialect::V3 { .. } => Invocation::new("helm")
                .args(["template", release])
                .opt("--namespace", namespace)
                .opt("--show-only", only),
        }
    }

    pub fn repo_add(&self, alias: &str, url: &str) -> Invocation {
        let base = Invocation::new("helm").args(["repo", "add"]);
        let base = match self {
            HelmDialect::V3 { force_update: true } => base.arg("--force-update"),
            _ => base,
        };
        base.args([alias, url])
    }

    pub fn repo_update(&self) -> Invocation {
        Invocation::new("helm").args(["repo", "update"])
    }

    pub fn fetch(&self, destination: &Path, version: Option<&str>, chart: &str) -> Invocation {
        Invocation::new("helm")
            .arg("fetch")
            .arg("--destination")
            .arg(destination.display().to_string())
            .opt("--version", version)
            .arg(chart)
    }
}
