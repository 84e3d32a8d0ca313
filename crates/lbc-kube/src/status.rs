//! Release status resolution
//!
//! helm has no machine-readable status in the versions the installer
//! supports, so the text printed by `helm status` is classified by a
//! [`TextStatusParser`] chosen per helm major version.

use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

use crate::error::Result;
use crate::helm::HelmDialect;
use crate::runner::{CommandOutput, CommandRunner, DEFAULT_TIMEOUT, RunOptions};

static NAMESPACE_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^NAMESPACE: ([\w-]+)").expect("valid regex"));

/// Lifecycle state of a release as reported by helm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReleaseStatus {
    NotFound,
    Deployed,
    Failed,
    Pending,
    Deleting,
    Unknown,
}

impl ReleaseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReleaseStatus::NotFound => "notfound",
            ReleaseStatus::Deployed => "deployed",
            ReleaseStatus::Failed => "failed",
            ReleaseStatus::Pending => "pending",
            ReleaseStatus::Deleting => "deleting",
            ReleaseStatus::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ReleaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classifies free-text `helm status` output
pub trait TextStatusParser: Send + Sync {
    /// Status named in successful output; `Unknown` when none matches
    fn parse_status(&self, stdout: &str) -> ReleaseStatus;

    /// Namespace from a `NAMESPACE: <value>` line
    fn parse_namespace(&self, stdout: &str) -> Option<String> {
        NAMESPACE_LINE
            .captures(stdout)
            .map(|caps| caps[1].to_string())
    }
}

/// Matches `STATUS: <word>` substrings, first hit wins
#[derive(Debug)]
pub struct KeywordStatusParser {
    keywords: &'static [(&'static str, ReleaseStatus)],
}

impl TextStatusParser for KeywordStatusParser {
    fn parse_status(&self, stdout: &str) -> ReleaseStatus {
        self.keywords
            .iter()
            .find(|(keyword, _)| stdout.contains(keyword))
            .map(|(_, status)| *status)
            .unwrap_or(ReleaseStatus::Unknown)
    }
}

/// helm 2 prints upper-case status words
pub static HELM2_STATUS: KeywordStatusParser = KeywordStatusParser {
    keywords: &[
        ("STATUS: DEPLOYED", ReleaseStatus::Deployed),
        ("STATUS: FAILED", ReleaseStatus::Failed),
        ("STATUS: PENDING_INSTALL", ReleaseStatus::Pending),
        ("STATUS: PENDING_UPGRADE", ReleaseStatus::Pending),
        ("STATUS: PENDING_ROLLBACK", ReleaseStatus::Pending),
        ("STATUS: DELETING", ReleaseStatus::Deleting),
    ],
};

/// helm 3 prints lower-case status words, hyphenated since 3.0 final
pub static HELM3_STATUS: KeywordStatusParser = KeywordStatusParser {
    keywords: &[
        ("STATUS: deployed", ReleaseStatus::Deployed),
        ("STATUS: failed", ReleaseStatus::Failed),
        ("STATUS: pending_install", ReleaseStatus::Pending),
        ("STATUS: pending_upgrade", ReleaseStatus::Pending),
        ("STATUS: pending-install", ReleaseStatus::Pending),
        ("STATUS: pending-upgrade", ReleaseStatus::Pending),
        ("STATUS: pending-rollback", ReleaseStatus::Pending),
        ("STATUS: deleting", ReleaseStatus::Deleting),
        ("STATUS: uninstalling", ReleaseStatus::Deleting),
    ],
};

/// Status of a release and the namespace helm reports it in
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedStatus {
    pub status: ReleaseStatus,
    pub namespace: Option<String>,
}

impl ResolvedStatus {
    /// Classify a finished status query
    ///
    /// Any non-zero exit, including a timeout, reads as `NotFound`: an
    /// unreachable cluster is indistinguishable from a missing release here.
    /// Empty output with exit 0 is what old helm versions print for a
    /// deployed release.
    pub fn classify(parser: &dyn TextStatusParser, output: &CommandOutput) -> Self {
        if !output.success() {
            return Self {
                status: ReleaseStatus::NotFound,
                namespace: None,
            };
        }

        let status = if output.stdout.is_empty() {
            ReleaseStatus::Deployed
        } else {
            parser.parse_status(&output.stdout)
        };

        Self {
            status,
            namespace: parser.parse_namespace(&output.stdout),
        }
    }
}

/// Query and classify the status of `release`
///
/// Always asks helm; the result is never cached across operations.
pub async fn resolve_status<R>(
    runner: &R,
    dialect: HelmDialect,
    release: &str,
    namespace: Option<&str>,
) -> Result<ResolvedStatus>
where
    R: CommandRunner + ?Sized,
{
    let output = runner
        .run(
            &dialect.status(release, namespace),
            &RunOptions::new().with_timeout(DEFAULT_TIMEOUT),
        )
        .await?;

    let resolved = ResolvedStatus::classify(dialect.status_parser(), &output);
    tracing::debug!(
        release,
        code = output.code,
        status = %resolved.status,
        namespace = ?resolved.namespace,
        "resolved release status"
    );
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::KubeError;
    use crate::mock::MockRunner;

    fn ok(stdout: &str) -> CommandOutput {
        CommandOutput::new(0, stdout, "")
    }

    #[test]
    fn test_nonzero_exit_is_not_found() {
        for code in [1, -9] {
            let resolved = ResolvedStatus::classify(
                &HELM2_STATUS,
                &CommandOutput::new(code, "STATUS: DEPLOYED", ""),
            );
            assert_eq!(resolved.status, ReleaseStatus::NotFound);
            assert_eq!(resolved.namespace, None);
        }
    }

    #[test]
    fn test_empty_output_is_deployed() {
        assert_eq!(
            ResolvedStatus::classify(&HELM2_STATUS, &ok("")).status,
            ReleaseStatus::Deployed
        );
        assert_eq!(
            ResolvedStatus::classify(&HELM3_STATUS, &ok("")).status,
            ReleaseStatus::Deployed
        );
    }

    #[test]
    fn test_helm2_statuses() {
        let cases = [
            ("STATUS: DEPLOYED", ReleaseStatus::Deployed),
            ("STATUS: FAILED", ReleaseStatus::Failed),
            ("STATUS: PENDING_INSTALL", ReleaseStatus::Pending),
            ("STATUS: PENDING_UPGRADE", ReleaseStatus::Pending),
            ("STATUS: DELETING", ReleaseStatus::Deleting),
            ("STATUS: SUPERSEDED", ReleaseStatus::Unknown),
        ];
        for (text, expected) in cases {
            let stdout = format!("LAST DEPLOYED: Mon Oct  1 12:00:00 2018\n{}\n", text);
            assert_eq!(HELM2_STATUS.parse_status(&stdout), expected, "{}", text);
        }
    }

    #[test]
    fn test_status_match_is_case_sensitive() {
        assert_eq!(
            HELM2_STATUS.parse_status("STATUS: deployed"),
            ReleaseStatus::Unknown
        );
        assert_eq!(
            HELM3_STATUS.parse_status("STATUS: DEPLOYED"),
            ReleaseStatus::Unknown
        );
    }

    #[test]
    fn test_helm3_statuses() {
        assert_eq!(
            HELM3_STATUS.parse_status("STATUS: deployed"),
            ReleaseStatus::Deployed
        );
        assert_eq!(
            HELM3_STATUS.parse_status("STATUS: pending-upgrade"),
            ReleaseStatus::Pending
        );
        assert_eq!(
            HELM3_STATUS.parse_status("STATUS: uninstalling"),
            ReleaseStatus::Deleting
        );
    }

    #[test]
    fn test_namespace_is_extracted() {
        let stdout = "LAST DEPLOYED: Mon Oct  1 12:00:00 2018\nNAMESPACE: lightbend-test\nSTATUS: DEPLOYED\n";
        let resolved = ResolvedStatus::classify(&HELM2_STATUS, &ok(stdout));
        assert_eq!(resolved.status, ReleaseStatus::Deployed);
        assert_eq!(resolved.namespace.as_deref(), Some("lightbend-test"));
    }

    #[tokio::test]
    async fn test_resolve_uses_dialect_command() {
        let runner = MockRunner::new().expect(
            "helm status --namespace lightbend enterprise-suite",
            0,
            "NAME: enterprise-suite\nNAMESPACE: lightbend\nSTATUS: failed\n",
        );
        let resolved = resolve_status(
            &runner,
            HelmDialect::V3 {
                force_update: true,
            },
            "enterprise-suite",
            Some("lightbend"),
        )
        .await
        .unwrap();
        assert_eq!(resolved.status, ReleaseStatus::Failed);
        assert_eq!(resolved.namespace.as_deref(), Some("lightbend"));
    }

    #[tokio::test]
    async fn test_resolve_missing_helm_is_an_error() {
        let runner = MockRunner::new().expect_missing("helm status enterprise-suite");
        let err = resolve_status(&runner, HelmDialect::V2, "enterprise-suite", None)
            .await
            .unwrap_err();
        assert!(matches!(err, KubeError::ToolMissing { .. }));
    }
}
