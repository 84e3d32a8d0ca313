//! Install / upgrade / uninstall orchestration
//!
//! The orchestrator sequences helm calls:
//!
//! 1. resolve the chart (local archive, or repository add + fetch)
//! 2. render the computed values of the new configuration
//! 3. read the current release status and decide what to do
//! 4. check that persistent data survives the transition
//! 5. run the final helm command
//!
//! Render-only mode (`--export-yaml`) stops after step 1 and prints the
//! rendered manifests instead.

use lbc_core::{ChartReference, Credentials};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;

use crate::actions::{ExportYaml, InstallOptions, UninstallOptions};
use crate::error::{KubeError, Result};
use crate::exec::{Echo, Executor, Step};
use crate::helm::HelmDialect;
use crate::pv::{PvCheck, PvSafetyChecker};
use crate::report::Reporter;
use crate::runner::{CommandRunner, DEFAULT_TIMEOUT, Invocation, RunOptions};
use crate::status::{ReleaseStatus, ResolvedStatus, resolve_status};
use crate::values::compute_values;

/// Time given to helm to tear down resources before reinstalling
pub const REINSTALL_GRACE: Duration = Duration::from_secs(5);

pub const CREDENTIALS_TEMPLATE: &str = "templates/commercial-credentials.yaml";

/// What to do with a release, given its current status
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanAction {
    Install,
    Upgrade,
    DeleteThenInstall,
    Abort(String),
}

impl PlanAction {
    /// The install state machine
    ///
    /// A failed release is upgraded in place, or reinstalled when forced.
    pub fn decide(status: ReleaseStatus, force_install: bool) -> Self {
        match status {
            ReleaseStatus::NotFound => PlanAction::Install,
            ReleaseStatus::Deployed | ReleaseStatus::Failed if force_install => {
                PlanAction::DeleteThenInstall
            }
            ReleaseStatus::Deployed | ReleaseStatus::Failed => PlanAction::Upgrade,
            ReleaseStatus::Pending => PlanAction::Abort("an operation is already in progress".into()),
            ReleaseStatus::Deleting => PlanAction::Abort("it is already being deleted".into()),
            ReleaseStatus::Unknown => PlanAction::Abort("its state is not recognized".into()),
        }
    }
}

/// Decision plus the final helm command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallPlan {
    pub action: PlanAction,
    pub status: ReleaseStatus,
    /// `None` when aborting
    pub command: Option<Invocation>,
}

/// Result of a completed install
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallOutcome {
    /// `None` for render-only runs
    pub action: Option<PlanAction>,
    pub namespace: String,
}

/// Drives helm for one operation at a time
pub struct Orchestrator<R: CommandRunner> {
    runner: R,
    reporter: Reporter,
    dialect: HelmDialect,
    reinstall_grace: Duration,
}

impl<R: CommandRunner> Orchestrator<R> {
    pub fn new(runner: R, reporter: Reporter, dialect: HelmDialect) -> Self {
        Self {
            runner,
            reporter,
            dialect,
            reinstall_grace: REINSTALL_GRACE,
        }
    }

    /// Override the wait between delete and reinstall
    pub fn with_reinstall_grace(mut self, grace: Duration) -> Self {
        self.reinstall_grace = grace;
        self
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    pub fn reporter(&self) -> &Reporter {
        &self.reporter
    }

    pub fn dialect(&self) -> HelmDialect {
        self.dialect
    }

    // ========== Install ==========

    /// Install, upgrade or render Console
    pub async fn install(
        &self,
        options: &InstallOptions,
        credentials: &Credentials,
    ) -> Result<InstallOutcome> {
        // Both are removed when dropped, on every return path.
        let creds_file = credentials.write_values_file()?;
        let creds_path = helm_path(creds_file.path());
        let fetch_dir = TempDir::new()?;

        let exec = Executor::new(&self.runner, &self.reporter, options.dry_run);

        if options.chart.version().is_none() && !options.chart.is_local() {
            self.reporter.warn(
                "--version has not been set, helm will use the latest available version. \
                 It is recommended to use an explicit version.",
            );
        }

        let chart_file = self.resolve_chart(&exec, &options.chart, fetch_dir.path()).await?;

        if let Some(export) = options.export_yaml {
            self.export(&exec, options, export, &chart_file, &creds_path)
                .await?;
            return Ok(InstallOutcome {
                action: None,
                namespace: options.namespace.name.clone(),
            });
        }

        let values = compute_values(
            &self.runner,
            &self.reporter,
            self.dialect,
            &options.release,
            &chart_file,
            &options.value_args(),
        )
        .await?;

        let current = resolve_status(
            &self.runner,
            self.dialect,
            &options.release,
            Some(&options.namespace.name),
        )
        .await?;

        let plan = self.plan(options, &current, &creds_path);
        tracing::info!(release = %options.release, status = %plan.status, action = ?plan.action, "install plan");

        let command = match (&plan.action, plan.command) {
            (PlanAction::Abort(reason), _) => {
                return Err(KubeError::StateConflict {
                    release: options.release.clone(),
                    status: plan.status.to_string(),
                    message: format!("unable to install/upgrade console, {}", reason),
                });
            }
            (_, Some(command)) => command,
            (_, None) => {
                return Err(KubeError::StateConflict {
                    release: options.release.clone(),
                    status: plan.status.to_string(),
                    message: "no command planned".to_string(),
                });
            }
        };

        if plan.status == ReleaseStatus::Failed {
            self.reporter.info(&format!(
                "found a failed installation under name {}, will attempt to {}",
                options.release,
                if plan.action == PlanAction::Upgrade {
                    "upgrade"
                } else {
                    "reinstall"
                }
            ));
            if plan.action == PlanAction::Upgrade {
                self.reporter.info(
                    "if this fails, pass `--force-install` to delete the prior installation first",
                );
            }
        }

        if plan.action == PlanAction::DeleteThenInstall {
            self.delete_release(
                &exec,
                &options.release,
                &options.namespace.name,
                &current,
                DeleteArgs::default(),
                options.delete_pvcs,
            )
            .await?;
            self.reporter.info("Waiting for prior resources to be removed");
            if !exec.is_dry_run() {
                tokio::time::sleep(self.reinstall_grace).await;
            }
        }

        match values.as_ref().and_then(|v| v.uses_persistent_volumes()) {
            Some(desired) => {
                let check = PvSafetyChecker::new(&self.runner, self.dialect)
                    .check(
                        &options.release,
                        &options.namespace.name,
                        Some(desired),
                        false,
                    )
                    .await?;
                self.apply_pv_check(check, options.delete_pvcs)?;
            }
            None => self.reporter.warn(
                "can't determine the value of usePersistentVolumes, skipping persistent volume check",
            ),
        }

        exec.execute(&command, Step::Required, Echo::Stderr).await?;

        Ok(InstallOutcome {
            action: Some(plan.action),
            namespace: options.namespace.name.clone(),
        })
    }

    /// Decide and assemble the final helm command for `current`
    pub fn plan(
        &self,
        options: &InstallOptions,
        current: &ResolvedStatus,
        creds_path: &str,
    ) -> InstallPlan {
        let action = PlanAction::decide(current.status, options.force_install);
        let chart = options.chart.install_ref();

        let base = match action {
            PlanAction::Abort(_) => None,
            PlanAction::Upgrade => Some(self.dialect.upgrade(
                &options.release,
                &chart,
                options.namespace_arg(),
            )),
            PlanAction::Install | PlanAction::DeleteThenInstall => Some(self.dialect.install(
                &options.release,
                &chart,
                options.namespace_arg(),
            )),
        };

        let command = base.map(|base| {
            let command = base
                .opt("--version", options.chart.version())
                .args(["--values", creds_path])
                .args(options.helm_args());
            if options.wait {
                command.arg("--wait")
            } else {
                command
            }
        });

        InstallPlan {
            action,
            status: current.status,
            command,
        }
    }

    /// Local path, or repository add + update + fetch into `fetch_dir`
    async fn resolve_chart(
        &self,
        exec: &Executor<'_, R>,
        chart: &ChartReference,
        fetch_dir: &Path,
    ) -> Result<String> {
        let (ChartReference::Repository {
            alias,
            url,
            version,
            ..
        }, Some(prefix)) = (chart, chart.archive_prefix())
        else {
            return Ok(chart.install_ref());
        };

        exec.execute(&self.dialect.repo_add(alias, url), Step::Required, Echo::Stderr)
            .await?;
        exec.execute(&self.dialect.repo_update(), Step::MayFail, Echo::Stderr)
            .await?;

        let fetch = self
            .dialect
            .fetch(fetch_dir, version.as_deref(), &chart.install_ref());
        let output = self
            .runner
            .run(&fetch, &RunOptions::new().with_timeout(DEFAULT_TIMEOUT))
            .await?;
        if !output.success() {
            return Err(KubeError::CommandFailed {
                command: fetch.command_line(),
                code: output.code,
                output: format!("unable to reach helm repo\n{}", output.combined()),
            });
        }

        let archive = find_archive(fetch_dir, &prefix)?;
        Ok(helm_path(&archive))
    }

    /// Render manifests to stdout without touching the cluster
    async fn export(
        &self,
        exec: &Executor<'_, R>,
        options: &InstallOptions,
        export: ExportYaml,
        chart_file: &str,
        creds_path: &str,
    ) -> Result<()> {
        let only = match export {
            ExportYaml::Creds => {
                self.reporter.warn(
                    "credentials in yaml are not encrypted, only base64 encoded. Handle appropriately.",
                );
                Some(CREDENTIALS_TEMPLATE)
            }
            ExportYaml::Console => None,
        };

        let mut render = self
            .dialect
            .template(&options.release, options.namespace_arg(), only)
            .args(options.helm_args());
        if export == ExportYaml::Creds {
            render = render.args(["--values", creds_path]);
        }
        let render = render.arg(chart_file);

        exec.execute(&render, Step::Required, Echo::Stdout).await?;
        Ok(())
    }

    // ========== Uninstall ==========

    /// Delete the release
    pub async fn uninstall(&self, options: &UninstallOptions) -> Result<()> {
        let exec = Executor::new(&self.runner, &self.reporter, options.dry_run);
        let current = resolve_status(
            &self.runner,
            self.dialect,
            &options.release,
            Some(&options.namespace.name),
        )
        .await?;

        let extra = DeleteArgs {
            args: options.passthrough.args(),
            namespace_passed: options.namespace.via_passthrough,
        };
        self.delete_release(
            &exec,
            &options.release,
            &options.namespace.name,
            &current,
            extra,
            options.delete_pvcs,
        )
        .await
    }

    async fn delete_release(
        &self,
        exec: &Executor<'_, R>,
        release: &str,
        namespace: &str,
        current: &ResolvedStatus,
        extra: DeleteArgs<'_>,
        delete_pvcs: bool,
    ) -> Result<()> {
        match current.status {
            ReleaseStatus::NotFound => {
                return Err(KubeError::ReleaseNotFound {
                    name: release.to_string(),
                });
            }
            ReleaseStatus::Deleting => {
                return Err(KubeError::StateConflict {
                    release: release.to_string(),
                    status: current.status.to_string(),
                    message: "unable to delete console installation, it is already being deleted"
                        .to_string(),
                });
            }
            _ => {}
        }

        let namespace = current.namespace.as_deref().unwrap_or(namespace);

        let check = PvSafetyChecker::new(&self.runner, self.dialect)
            .check(release, namespace, None, true)
            .await?;
        self.apply_pv_check(check, delete_pvcs)?;

        self.reporter.info(&format!(
            "Deleting console installation {} with status '{}'",
            release, current.status
        ));
        let delete = self
            .dialect
            .delete(release, (!extra.namespace_passed).then_some(namespace))
            .args(extra.args.iter().cloned());
        exec.execute(&delete, Step::Required, Echo::Stderr).await?;
        self.reporter.warn(
            "helm delete does not wait for resources to be fully removed. If a subsequent install \
             fails, please re-run it after waiting for all resources to be removed.",
        );
        Ok(())
    }

    /// Print findings; a failure aborts unless overridden
    fn apply_pv_check(&self, check: PvCheck, delete_pvcs: bool) -> Result<()> {
        match check {
            PvCheck::Ok => Ok(()),
            PvCheck::Warn(messages) => {
                for message in &messages {
                    self.reporter.warn(message);
                }
                Ok(())
            }
            PvCheck::Fail(reason) if delete_pvcs => {
                self.reporter.warn(&reason);
                self.reporter
                    .warn("proceeding anyway because --delete-pvcs was given");
                Ok(())
            }
            PvCheck::Fail(reason) => {
                self.reporter.error(&reason);
                Err(KubeError::DataLossRisk { reason })
            }
        }
    }
}

/// Pass-through arguments for `helm delete`
#[derive(Debug, Clone, Copy, Default)]
struct DeleteArgs<'a> {
    args: &'a [String],
    /// `args` already carry the namespace
    namespace_passed: bool,
}

/// First `<prefix>*.tgz` in `dir`
fn find_archive(dir: &Path, prefix: &str) -> Result<PathBuf> {
    let mut archives: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.starts_with(prefix) && name.ends_with(".tgz"))
        })
        .collect();
    archives.sort();
    archives.into_iter().next().ok_or_else(|| {
        KubeError::Chart(format!(
            "no {}*.tgz archive found in {} after fetching",
            prefix,
            dir.display()
        ))
    })
}

/// helm un-escapes backslashes in file arguments on Windows
fn helm_path(path: &Path) -> String {
    let path = path.display().to_string();
    if cfg!(windows) {
        path.replace('\\', "\\\\")
    } else {
        path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockRunner;
    use crate::runner::CommandOutput;
    use lbc_core::{Passthrough, ResolvedNamespace, SetOverride};

    const STATUS: &str = "helm status enterprise-suite";
    const GET: &str = "helm get enterprise-suite";
    const DUMP: &str =
        "helm template --name enterprise-suite --execute templates/dump-values.yaml chart.tgz";
    const PV_LIST: &str = "kubectl get pv --no-headers -o custom-columns=NAME:.metadata.name,RECLAIM:.spec.persistentVolumeReclaimPolicy,NAMESPACE:.spec.claimRef.namespace,CLAIM:.spec.claimRef.name,STATUS:.status.phase";
    const NOT_FOUND: &str = "Error: release: \"enterprise-suite\" not found";

    fn creds() -> Credentials {
        Credentials::new("user", "pass")
    }

    fn namespace(name: &str) -> ResolvedNamespace {
        ResolvedNamespace {
            name: name.to_string(),
            via_passthrough: false,
        }
    }

    fn local_options() -> InstallOptions {
        InstallOptions::new(
            "enterprise-suite",
            namespace("lightbend"),
            ChartReference::local("chart.tgz"),
        )
    }

    fn orchestrator(runner: MockRunner) -> Orchestrator<MockRunner> {
        Orchestrator::new(runner, Reporter::buffered(), HelmDialect::V2)
            .with_reinstall_grace(Duration::ZERO)
    }

    fn dump_values(uses_pv: bool) -> String {
        format!("# {{\"usePersistentVolumes\":{}}}", uses_pv)
    }

    #[test]
    fn test_decide() {
        use PlanAction::*;
        assert_eq!(PlanAction::decide(ReleaseStatus::NotFound, false), Install);
        assert_eq!(PlanAction::decide(ReleaseStatus::NotFound, true), Install);
        assert_eq!(PlanAction::decide(ReleaseStatus::Deployed, false), Upgrade);
        assert_eq!(
            PlanAction::decide(ReleaseStatus::Deployed, true),
            DeleteThenInstall
        );
        assert_eq!(PlanAction::decide(ReleaseStatus::Failed, false), Upgrade);
        assert_eq!(
            PlanAction::decide(ReleaseStatus::Failed, true),
            DeleteThenInstall
        );
        for status in [
            ReleaseStatus::Pending,
            ReleaseStatus::Deleting,
            ReleaseStatus::Unknown,
        ] {
            assert!(matches!(PlanAction::decide(status, true), Abort(_)));
            assert!(matches!(PlanAction::decide(status, false), Abort(_)));
        }
    }

    #[test]
    fn test_plan_command_assembly() {
        let orch = Orchestrator::new(
            MockRunner::new(),
            Reporter::buffered(),
            HelmDialect::V3 {
                force_update: true,
            },
        );
        let options = InstallOptions::new(
            "es",
            namespace("monitoring"),
            ChartReference::repository("es-repo", "https://x", "enterprise-suite", Some("1.2.0".into())),
        )
        .with_passthrough(Passthrough::parse(["--timeout", "600"]).unwrap())
        .with_overrides(vec![SetOverride::parse("alertmanagers=a1,a2").unwrap()])
        .with_wait();

        let fresh = ResolvedStatus {
            status: ReleaseStatus::NotFound,
            namespace: None,
        };
        let plan = orch.plan(&options, &fresh, "/tmp/creds.yaml");
        assert_eq!(plan.action, PlanAction::Install);
        insta::assert_snapshot!(
            plan.command.unwrap().words(),
            @r"helm install es es-repo/enterprise-suite --namespace monitoring --version 1.2.0 --values /tmp/creds.yaml --timeout 600 --set alertmanagers=a1\,a2 --wait"
        );

        let deployed = ResolvedStatus {
            status: ReleaseStatus::Deployed,
            namespace: Some("monitoring".into()),
        };
        let plan = orch.plan(&options, &deployed, "/tmp/creds.yaml");
        assert_eq!(plan.action, PlanAction::Upgrade);
        insta::assert_snapshot!(
            plan.command.unwrap().words(),
            @r"helm upgrade es --namespace monitoring es-repo/enterprise-suite --version 1.2.0 --values /tmp/creds.yaml --timeout 600 --set alertmanagers=a1\,a2 --wait"
        );
    }

    #[test]
    fn test_plan_local_chart_omits_version_and_passed_namespace() {
        let orch = orchestrator(MockRunner::new());
        let options = InstallOptions::new(
            "enterprise-suite",
            ResolvedNamespace {
                name: "foobar".into(),
                via_passthrough: true,
            },
            ChartReference::local("chart.tgz"),
        )
        .with_passthrough(Passthrough::parse(["--namespace=foobar"]).unwrap());

        let plan = orch.plan(
            &options,
            &ResolvedStatus {
                status: ReleaseStatus::NotFound,
                namespace: None,
            },
            "/tmp/creds.yaml",
        );
        assert_eq!(
            plan.command.unwrap().words(),
            "helm install chart.tgz --name enterprise-suite --values /tmp/creds.yaml --namespace=foobar"
        );
    }

    #[test]
    fn test_plan_abort_has_no_command() {
        let orch = orchestrator(MockRunner::new());
        let plan = orch.plan(
            &local_options(),
            &ResolvedStatus {
                status: ReleaseStatus::Pending,
                namespace: None,
            },
            "/tmp/creds.yaml",
        );
        assert!(matches!(plan.action, PlanAction::Abort(_)));
        assert!(plan.command.is_none());
    }

    #[tokio::test]
    async fn test_fresh_install() {
        let runner = MockRunner::new()
            .expect(DUMP, 0, &dump_values(true))
            .expect(STATUS, 1, "")
            .expect_output(GET, CommandOutput::new(1, "", NOT_FOUND))
            .expect(PV_LIST, 0, "")
            .expect_matching(
                r"helm install chart\.tgz --name enterprise-suite --namespace lightbend --values \S+",
                0,
                "",
            );
        let orch = orchestrator(runner);

        let outcome = orch.install(&local_options(), &creds()).await.unwrap();
        assert_eq!(outcome.action, Some(PlanAction::Install));
        assert_eq!(orch.runner().remaining(), 0);
        assert!(
            orch.runner()
                .calls()
                .iter()
                .all(|c| !c.starts_with("helm upgrade") && !c.starts_with("helm delete"))
        );
    }

    #[tokio::test]
    async fn test_upgrade_of_failed_release_suggests_force() {
        let runner = MockRunner::new()
            .expect(DUMP, 0, &dump_values(false))
            .expect(STATUS, 0, "STATUS: FAILED\n")
            .expect(GET, 0, "usePersistentVolumes: false\n")
            .expect_matching(
                r"helm upgrade enterprise-suite chart\.tgz --values \S+",
                0,
                "",
            );
        let orch = orchestrator(runner);

        let outcome = orch.install(&local_options(), &creds()).await.unwrap();
        assert_eq!(outcome.action, Some(PlanAction::Upgrade));
        assert!(orch.reporter().transcript().stderr.contains("--force-install"));
    }

    #[tokio::test]
    async fn test_force_install_deletes_then_installs() {
        let runner = MockRunner::new()
            .expect(DUMP, 0, &dump_values(false))
            .expect(STATUS, 0, "NAMESPACE: lightbend\nSTATUS: DEPLOYED\n")
            .expect(GET, 0, "usePersistentVolumes: false\n")
            .expect("helm delete --purge enterprise-suite", 0, "")
            .expect_output(GET, CommandOutput::new(1, "", NOT_FOUND))
            .expect(PV_LIST, 0, "")
            .expect_matching(
                r"helm install chart\.tgz --name enterprise-suite --namespace lightbend --values \S+",
                0,
                "",
            );
        let orch = orchestrator(runner);

        let outcome = orch
            .install(&local_options().force_install(), &creds())
            .await
            .unwrap();
        assert_eq!(outcome.action, Some(PlanAction::DeleteThenInstall));
        assert_eq!(orch.runner().remaining(), 0);

        let calls = orch.runner().calls();
        let delete = calls.iter().position(|c| c.starts_with("helm delete")).unwrap();
        let install = calls.iter().position(|c| c.starts_with("helm install")).unwrap();
        assert!(delete < install);
        assert!(
            orch.reporter()
                .transcript()
                .stderr
                .contains("Waiting for prior resources to be removed")
        );
    }

    #[tokio::test]
    async fn test_pending_release_aborts_without_mutation() {
        let runner = MockRunner::new()
            .expect(DUMP, 0, &dump_values(true))
            .expect(STATUS, 0, "STATUS: PENDING_INSTALL\n");
        let orch = orchestrator(runner);

        let err = orch.install(&local_options(), &creds()).await.unwrap_err();
        assert!(matches!(err, KubeError::StateConflict { .. }));
        assert!(err.is_state_conflict());
        assert!(orch.runner().calls().iter().all(|c| {
            !c.starts_with("helm install")
                && !c.starts_with("helm upgrade")
                && !c.starts_with("helm delete")
        }));
    }

    #[tokio::test]
    async fn test_disabling_pvs_aborts_without_override() {
        let runner = MockRunner::new()
            .expect(DUMP, 0, &dump_values(false))
            .expect(STATUS, 0, "STATUS: DEPLOYED\n")
            .expect(GET, 0, "usePersistentVolumes: true\n")
            .expect(PV_LIST, 0, "pvc-1 Delete lightbend prometheus-storage Bound\n");
        let orch = orchestrator(runner);

        let err = orch.install(&local_options(), &creds()).await.unwrap_err();
        assert!(matches!(err, KubeError::DataLossRisk { .. }));
        assert!(
            orch.runner()
                .calls()
                .iter()
                .all(|c| !c.starts_with("helm upgrade"))
        );
    }

    #[tokio::test]
    async fn test_disabling_pvs_proceeds_with_override() {
        let runner = MockRunner::new()
            .expect(DUMP, 0, &dump_values(false))
            .expect(STATUS, 0, "STATUS: DEPLOYED\n")
            .expect(GET, 0, "usePersistentVolumes: true\n")
            .expect(PV_LIST, 0, "pvc-1 Delete lightbend prometheus-storage Bound\n")
            .expect_matching(r"helm upgrade enterprise-suite chart\.tgz --values \S+", 0, "");
        let orch = orchestrator(runner);

        orch.install(&local_options().delete_pvcs(), &creds())
            .await
            .unwrap();
        assert_eq!(orch.runner().remaining(), 0);
        assert!(orch.reporter().transcript().stderr.contains("pvc-1"));
    }

    #[tokio::test]
    async fn test_unknown_values_skip_pv_check() {
        let runner = MockRunner::new()
            .expect(DUMP, 1, "")
            .expect(STATUS, 0, "STATUS: DEPLOYED\n")
            .expect_matching(r"helm upgrade enterprise-suite chart\.tgz --values \S+", 0, "");
        let orch = orchestrator(runner);

        orch.install(&local_options(), &creds()).await.unwrap();
        assert!(
            orch.reporter()
                .transcript()
                .stderr
                .contains("skipping persistent volume check")
        );
    }

    #[tokio::test]
    async fn test_dry_run_runs_no_mutation() {
        let runner = MockRunner::new()
            .expect(DUMP, 0, &dump_values(true))
            .expect(STATUS, 1, "")
            .expect_output(GET, CommandOutput::new(1, "", NOT_FOUND))
            .expect(PV_LIST, 0, "");
        let orch = orchestrator(runner);

        orch.install(&local_options().dry_run(), &creds())
            .await
            .unwrap();
        assert_eq!(orch.runner().remaining(), 0);
        assert!(
            orch.reporter()
                .transcript()
                .stderr
                .contains("helm install chart.tgz --name enterprise-suite")
        );
    }

    #[tokio::test]
    async fn test_repository_chart_is_fetched() {
        let runner = MockRunner::new()
            .expect(
                "helm repo add es-repo https://repo.lightbend.com/helm-charts",
                0,
                "",
            )
            .expect("helm repo update", 0, "")
            .expect_matching_with(
                r"helm fetch --destination \S+ --version 1\.2\.0 es-repo/enterprise-suite",
                0,
                "",
                |inv| {
                    let dest = &inv.arguments()[2];
                    std::fs::write(Path::new(dest).join("enterprise-suite-1.2.0.tgz"), b"")
                        .unwrap();
                },
            )
            .expect_matching(
                r"helm template --name enterprise-suite --execute templates/dump-values\.yaml \S+enterprise-suite-1\.2\.0\.tgz",
                0,
                &dump_values(true),
            )
            .expect(STATUS, 1, "")
            .expect_output(GET, CommandOutput::new(1, "", NOT_FOUND))
            .expect(PV_LIST, 0, "")
            .expect_matching(
                r"helm install es-repo/enterprise-suite --name enterprise-suite --namespace lightbend --version 1\.2\.0 --values \S+",
                0,
                "",
            );
        let orch = orchestrator(runner);

        let options = InstallOptions::new(
            "enterprise-suite",
            namespace("lightbend"),
            ChartReference::repository(
                "es-repo",
                "https://repo.lightbend.com/helm-charts",
                "enterprise-suite",
                Some("1.2.0".into()),
            ),
        );
        orch.install(&options, &creds()).await.unwrap();
        assert_eq!(orch.runner().remaining(), 0);
    }

    #[tokio::test]
    async fn test_export_creds_renders_only() {
        let runner = MockRunner::new().expect_matching(
            r"helm template --name enterprise-suite --namespace lightbend --execute templates/commercial-credentials\.yaml --values \S+ chart\.tgz",
            0,
            "kind: Secret\n",
        );
        let orch = orchestrator(runner);

        let outcome = orch
            .install(&local_options().export_yaml(ExportYaml::Creds), &creds())
            .await
            .unwrap();
        assert_eq!(outcome.action, None);

        let transcript = orch.reporter().transcript();
        assert_eq!(transcript.stdout, "kind: Secret\n");
        assert!(transcript.stderr.contains("only base64 encoded"));
    }

    #[tokio::test]
    async fn test_uninstall_not_found() {
        let runner = MockRunner::new().expect(STATUS, 1, "");
        let orch = orchestrator(runner);
        let err = orch
            .uninstall(&UninstallOptions::new("enterprise-suite", namespace("lightbend")))
            .await
            .unwrap_err();
        assert!(matches!(err, KubeError::ReleaseNotFound { .. }));
    }

    #[tokio::test]
    async fn test_uninstall_deleting_aborts() {
        let runner = MockRunner::new().expect(STATUS, 0, "STATUS: DELETING\n");
        let orch = orchestrator(runner);
        let err = orch
            .uninstall(&UninstallOptions::new("enterprise-suite", namespace("lightbend")))
            .await
            .unwrap_err();
        assert!(matches!(err, KubeError::StateConflict { .. }));
        assert_eq!(orch.runner().calls().len(), 1);
    }

    #[tokio::test]
    async fn test_uninstall_with_deletable_volumes_needs_override() {
        let script = || {
            MockRunner::new()
                .expect(STATUS, 0, "NAMESPACE: lightbend\nSTATUS: DEPLOYED\n")
                .expect(GET, 0, "usePersistentVolumes: true\n")
                .expect(PV_LIST, 0, "pvc-1 Delete lightbend prometheus-storage Bound\n")
        };

        let orch = orchestrator(script());
        let err = orch
            .uninstall(&UninstallOptions::new("enterprise-suite", namespace("lightbend")))
            .await
            .unwrap_err();
        assert!(matches!(err, KubeError::DataLossRisk { .. }));

        let orch = orchestrator(script().expect("helm delete --purge enterprise-suite", 0, ""));
        orch.uninstall(
            &UninstallOptions::new("enterprise-suite", namespace("lightbend")).delete_pvcs(),
        )
        .await
        .unwrap();
        assert_eq!(orch.runner().remaining(), 0);
    }

    #[test]
    fn test_find_archive() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("index.yaml"), b"").unwrap();
        std::fs::write(dir.path().join("enterprise-suite-1.0.0.tgz"), b"").unwrap();

        let found = find_archive(dir.path(), "enterprise-suite-").unwrap();
        assert!(found.ends_with("enterprise-suite-1.0.0.tgz"));
        assert!(find_archive(dir.path(), "other-").is_err());
    }
}
