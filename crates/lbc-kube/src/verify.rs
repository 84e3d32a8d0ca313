//! Deployment verification
//!
//! Console is healthy when each of its deployments has at least one desired
//! replica and all desired replicas are available. Older chart versions used
//! different deployment names; those are checked only when the cluster shows
//! no sign of the current naming scheme.

use serde::Deserialize;

use crate::error::{KubeError, Result};
use crate::report::Reporter;
use crate::runner::{CommandRunner, DEFAULT_TIMEOUT, Invocation, RunOptions};

/// Deployment names Console is expected to run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workloads {
    pub primary: Vec<String>,
    /// Names used by older chart versions
    pub legacy: Vec<String>,
    /// Checked unless an external alertmanager is used
    pub optional: Vec<String>,
}

impl Workloads {
    pub fn console() -> Self {
        let names = |list: &[&str]| list.iter().map(|s| s.to_string()).collect();
        Self {
            primary: names(&[
                "console-backend",
                "console-frontend",
                "grafana",
                "prometheus-kube-state-metrics",
            ]),
            legacy: names(&[
                "es-console",
                "grafana-server",
                "prometheus-server",
                "prometheus-kube-state-metrics",
            ]),
            optional: names(&["prometheus-alertmanager"]),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct Deployment {
    #[serde(default)]
    spec: DeploymentSpec,
    #[serde(default)]
    status: DeploymentStatus,
}

#[derive(Debug, Default, Deserialize)]
struct DeploymentSpec {
    replicas: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeploymentStatus {
    available_replicas: Option<i64>,
}

/// Replica counts of one deployment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Replicas {
    pub desired: i64,
    pub available: i64,
}

impl Replicas {
    pub fn is_healthy(&self) -> bool {
        self.desired > 0 && self.available >= self.desired
    }

    /// Parse `kubectl get deploy -o json` output
    pub fn from_json(json: &str) -> Result<Self> {
        let deployment: Deployment = serde_json::from_str(json)?;
        Ok(Self {
            desired: deployment.spec.replicas.unwrap_or(1),
            available: deployment.status.available_replicas.unwrap_or(0),
        })
    }
}

/// State of one checked deployment
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkloadHealth {
    Healthy,
    Unhealthy(Replicas),
    /// Not found, or the query failed
    Unqueryable,
}

/// Outcome of a verification sweep
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerifyReport {
    pub checked: Vec<(String, WorkloadHealth)>,
    /// Whether the legacy names were checked instead of the primary ones
    pub used_legacy: bool,
}

impl VerifyReport {
    pub fn is_healthy(&self) -> bool {
        self.checked
            .iter()
            .all(|(_, health)| *health == WorkloadHealth::Healthy)
    }

    pub fn unhealthy(&self) -> Vec<String> {
        self.checked
            .iter()
            .filter(|(_, health)| *health != WorkloadHealth::Healthy)
            .map(|(name, _)| name.clone())
            .collect()
    }

    pub fn into_result(self) -> Result<Self> {
        if self.is_healthy() {
            Ok(self)
        } else {
            Err(KubeError::VerificationFailed {
                unhealthy: self.unhealthy(),
            })
        }
    }
}

/// Checks Console deployments in a namespace
pub struct DeploymentVerifier<'a, R: CommandRunner + ?Sized> {
    runner: &'a R,
    reporter: &'a Reporter,
    namespace: String,
}

impl<'a, R: CommandRunner + ?Sized> DeploymentVerifier<'a, R> {
    pub fn new(runner: &'a R, reporter: &'a Reporter, namespace: impl Into<String>) -> Self {
        Self {
            runner,
            reporter,
            namespace: namespace.into(),
        }
    }

    /// Check every expected workload
    ///
    /// Fails with [`KubeError::VerificationFailed`] listing the unhealthy names.
    pub async fn verify(&self, workloads: &Workloads, include_optional: bool) -> Result<VerifyReport> {
        let primary = self
            .sweep(&workloads.primary, &workloads.optional, include_optional)
            .await?;
        if primary.is_healthy() {
            self.reporter
                .success("Your Lightbend Console seems to be running fine!");
            return Ok(primary);
        }

        // One queryable primary name rules out an older install.
        let any_current = workloads.primary.iter().any(|name| {
            primary
                .checked
                .iter()
                .any(|(checked, health)| checked == name && *health != WorkloadHealth::Unqueryable)
        });
        if any_current {
            return primary.into_result();
        }

        self.reporter.message(
            "It appears you might be running older version of console, checking old deployment names...",
        );
        let mut legacy = self
            .sweep(&workloads.legacy, &workloads.optional, include_optional)
            .await?;
        legacy.used_legacy = true;
        if legacy.is_healthy() {
            self.reporter
                .success("Your Lightbend Console seems to be running fine!");
        }
        legacy.into_result()
    }

    async fn sweep(
        &self,
        names: &[String],
        optional: &[String],
        include_optional: bool,
    ) -> Result<VerifyReport> {
        let optional = optional.iter().filter(|_| include_optional);
        let mut report = VerifyReport::default();
        for name in names.iter().chain(optional) {
            let health = self.check(name).await?;
            report.checked.push((name.clone(), health));
        }
        Ok(report)
    }

    /// Check one deployment and print its line
    pub async fn check(&self, name: &str) -> Result<WorkloadHealth> {
        let query = Invocation::new("kubectl")
            .args(["--namespace", &self.namespace, "get"])
            .arg(format!("deploy/{}", name))
            .args(["-o", "json"]);
        let output = self
            .runner
            .run(&query, &RunOptions::new().with_timeout(DEFAULT_TIMEOUT))
            .await?;

        let replicas = if output.success() {
            Replicas::from_json(&output.stdout)
                .inspect_err(|e| tracing::debug!(deployment = name, error = %e, "unreadable deployment"))
                .ok()
        } else {
            None
        };

        let health = match replicas {
            Some(r) if r.is_healthy() => WorkloadHealth::Healthy,
            Some(r) => WorkloadHealth::Unhealthy(r),
            None => WorkloadHealth::Unqueryable,
        };

        self.reporter.check(name, health == WorkloadHealth::Healthy);
        match health {
            WorkloadHealth::Unhealthy(r) if r.desired <= 0 => self.reporter.message(&format!(
                "Deployment {} status check: expected to see 1 or more desired replicas, found {}",
                name, r.desired
            )),
            WorkloadHealth::Unhealthy(r) => self.reporter.message(&format!(
                "Deployment {} status check: available replica number ({}) is less than desired ({})",
                name, r.available, r.desired
            )),
            WorkloadHealth::Unqueryable => self
                .reporter
                .message(&format!("Unable to check deployment {} status", name)),
            WorkloadHealth::Healthy => {}
        }
        Ok(health)
    }
}
