//! Environment checks run before touching the cluster
//!
//! Each check either passes, prints a warning, or fails with an error that
//! names the missing piece. `--skip-checks` bypasses all of them.

use lbc_core::{Credentials, ToolVersion};

use crate::error::{KubeError, Result};
use crate::helm::HelmDialect;
use crate::report::Reporter;
use crate::runner::{
    CommandOutput, CommandRunner, DEFAULT_TIMEOUT, Invocation, RunOptions, VERSION_PROBE_TIMEOUT,
};

pub const MIN_HELM: &str = "2.10";
pub const MIN_KUBECTL: &str = "1.10";
pub const MIN_MINIKUBE: &str = "0.29";
pub const MIN_MINISHIFT: &str = "1.20";
pub const MIN_OC: &str = "3.9";

/// Registry endpoint used to validate credentials
pub const REGISTRY_TAGS_URL: &str =
    "https://lightbend-docker-commercial-registry.bintray.io/v2/enterprise-suite/console-api/tags/list";

/// Single-node development cluster the current context points at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalCluster {
    Minikube,
    Minishift,
}

impl LocalCluster {
    fn program(&self) -> &'static str {
        match self {
            LocalCluster::Minikube => "minikube",
            LocalCluster::Minishift => "minishift",
        }
    }
}

/// Runs preflight checks against the local tools and the cluster
pub struct Preflight<'a, R: CommandRunner + ?Sized> {
    runner: &'a R,
    reporter: &'a Reporter,
}

impl<'a, R: CommandRunner + ?Sized> Preflight<'a, R> {
    pub fn new(runner: &'a R, reporter: &'a Reporter) -> Self {
        Self { runner, reporter }
    }

    async fn probe(&self, invocation: &Invocation, timeout: std::time::Duration) -> Result<CommandOutput> {
        self.runner
            .run(invocation, &RunOptions::new().with_timeout(timeout))
            .await
    }

    /// Like `probe`, treating a missing program as a failed run
    async fn probe_optional(&self, invocation: &Invocation) -> Result<Option<CommandOutput>> {
        match self.probe(invocation, DEFAULT_TIMEOUT).await {
            Ok(output) => Ok(Some(output)),
            Err(KubeError::ToolMissing { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Check that the program behind `invocation` reports at least `minimum`
    ///
    /// A version that cannot be determined only warns.
    pub async fn require_version(&self, invocation: &Invocation, minimum: &str) -> Result<()> {
        let required: ToolVersion = minimum.parse()?;
        let program = invocation.program().to_string();
        let output = self.probe(invocation, VERSION_PROBE_TIMEOUT).await?;

        let found = output
            .success()
            .then(|| ToolVersion::find(&output.stdout))
            .flatten();

        match found {
            Some(found) if found.satisfies(&required) => {
                tracing::debug!(program, %found, "version ok");
                Ok(())
            }
            Some(found) => Err(KubeError::VersionTooOld {
                program,
                found: found.to_string(),
                required: required.to_string(),
            }),
            None => {
                self.reporter.warn(&format!(
                    "unable to determine installed version of '{}'",
                    program
                ));
                Ok(())
            }
        }
    }

    pub async fn check_helm(&self) -> Result<()> {
        self.require_version(&HelmDialect::version_probe(), MIN_HELM)
            .await
    }

    /// Client version, then that the cluster answers
    pub async fn check_kubectl(&self, local: Option<LocalCluster>) -> Result<()> {
        self.require_version(
            &Invocation::new("kubectl").args(["version", "--client=true", "--short=true"]),
            MIN_KUBECTL,
        )
        .await?;

        let output = self
            .probe(&Invocation::new("kubectl").arg("version"), DEFAULT_TIMEOUT)
            .await?;
        if !output.success() {
            let mut message = format!(
                "Cannot reach cluster with kubectl: `kubectl version` either timed out or failed to connect (exit code {})",
                output.code
            );
            if local == Some(LocalCluster::Minishift) {
                message.push_str(". Did you do 'eval $(minishift oc-env)'?");
            }
            return Err(KubeError::Preflight { message });
        }
        Ok(())
    }

    /// Which local cluster, if any, is running and selected in kubectl
    pub async fn detect_local_cluster(&self) -> Result<Option<LocalCluster>> {
        for cluster in [LocalCluster::Minikube, LocalCluster::Minishift] {
            if self.is_running(cluster).await? {
                tracing::info!(?cluster, "local cluster detected");
                return Ok(Some(cluster));
            }
        }
        Ok(None)
    }

    async fn is_running(&self, cluster: LocalCluster) -> Result<bool> {
        let name = cluster.program();
        let Some(status) = self
            .probe_optional(&Invocation::new(name).arg("status"))
            .await?
        else {
            return Ok(false);
        };
        if !status.success()
            || !status.stdout.contains(&format!("{}: Running", name))
            || !status.stdout.contains("cluster: Running")
        {
            return Ok(false);
        }

        let context = self
            .probe(
                &Invocation::new("kubectl").args(["config", "current-context"]),
                DEFAULT_TIMEOUT,
            )
            .await?;
        Ok(context.success() && context.stdout.trim() == name)
    }

    pub async fn check_local_cluster(&self, cluster: LocalCluster) -> Result<()> {
        match cluster {
            LocalCluster::Minikube => {
                self.require_version(&Invocation::new("minikube").arg("version"), MIN_MINIKUBE)
                    .await
            }
            LocalCluster::Minishift => {
                self.require_version(&Invocation::new("minishift").arg("version"), MIN_MINISHIFT)
                    .await?;
                self.require_version(&Invocation::new("oc").arg("version"), MIN_OC)
                    .await
            }
        }
    }

    /// helm 2 needs Tiller in the cluster; helm 3 must not find a release
    /// Tiller still owns
    pub async fn check_tiller(&self, dialect: HelmDialect, release: &str) -> Result<()> {
        if dialect.is_v2() {
            let output = self
                .probe(&Invocation::new("helm").arg("version"), DEFAULT_TIMEOUT)
                .await?;
            if !output.success() {
                return Err(KubeError::Preflight {
                    message: "Cannot get helm status. Did you set up helm inside your cluster?"
                        .to_string(),
                });
            }
            return Ok(());
        }

        let query = Invocation::new("kubectl")
            .args(["get", "configmap", "--namespace", "kube-system", "--selector"])
            .arg(format!("OWNER=TILLER,NAME={}", release))
            .arg("--ignore-not-found=true");
        let output = self.probe(&query, DEFAULT_TIMEOUT).await?;
        if !output.success() {
            return Err(KubeError::Preflight {
                message: format!(
                    "unable to check for helm 2 releases named {} (exit code {})",
                    release, output.code
                ),
            });
        }
        if !output.stdout.trim().is_empty() {
            return Err(KubeError::Preflight {
                message: format!(
                    "found a helm 2 release named {} managed by Tiller. Migrate it to helm 3 \
                     (see the helm-2to3 plugin) or use helm 2 to manage it.",
                    release
                ),
            });
        }
        Ok(())
    }

    /// Make an authenticated request to the registry
    ///
    /// Returns `false` when curl is missing or the request is refused. The
    /// credentials are handed to curl on stdin, never on its command line.
    pub async fn check_credentials(&self, credentials: &Credentials) -> Result<bool> {
        let Some(version) = self
            .probe_optional(&Invocation::new("curl").arg("--version"))
            .await?
        else {
            return Ok(false);
        };
        if !version.success() {
            return Ok(false);
        }

        let request = Invocation::new("curl")
            .args(["-s", "-o", "/dev/null", "-w", "%{http_code}", "-K", "-"])
            .arg(REGISTRY_TAGS_URL);
        let config = format!(
            "user = \"{}:{}\"\n",
            curl_escape(&credentials.username),
            curl_escape(&credentials.password)
        );
        let output = self
            .runner
            .run(
                &request,
                &RunOptions::new()
                    .with_timeout(DEFAULT_TIMEOUT)
                    .with_stdin(config),
            )
            .await?;
        Ok(output.stdout.trim() == "200")
    }

    /// Everything an install needs
    pub async fn install_checks(
        &self,
        dialect: HelmDialect,
        release: &str,
        credentials: &Credentials,
    ) -> Result<()> {
        let local = self.detect_local_cluster().await?;
        self.check_helm().await?;
        self.check_kubectl(local).await?;
        if let Some(cluster) = local {
            self.check_local_cluster(cluster).await?;
        }
        self.check_tiller(dialect, release).await?;

        if !self.check_credentials(credentials).await? {
            self.reporter.warn(
                "Your credentials might not be correct - unable to make authenticated request to \
                 lightbend docker registry; proceeding with the installation anyway",
            );
        }
        Ok(())
    }
}

/// Quote for a double-quoted curl config value
fn curl_escape(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
