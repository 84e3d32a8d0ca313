//! lbc-kube - Cluster integration for the Lightbend Console installer
//!
//! This crate provides:
//! - **Command Runner**: spawn helm/kubectl/curl with timeouts, or answer from a script in tests
//! - **Helm Dialects**: one command syntax per helm major version
//! - **Release Status**: classify `helm status` output into a small state set
//! - **Orchestrator**: the install / upgrade / reinstall / uninstall state machine
//! - **PV Safety**: refuse transitions that would delete persistent Console data
//! - **Verification**: replica availability of the Console deployments
//! - **Preflight**: tool versions, cluster reachability and credentials
//! - **Diagnostics**: resource listings and logs for support tickets

pub mod actions;
pub mod dump;
pub mod error;
pub mod exec;
pub mod helm;
pub mod mock;
pub mod orchestrator;
pub mod preflight;
pub mod pv;
pub mod report;
pub mod runner;
pub mod status;
pub mod values;
pub mod verify;

pub use actions::{
    DEFAULT_CHART, DEFAULT_NAMESPACE, DEFAULT_RELEASE, DEFAULT_REPO, DEFAULT_REPO_ALIAS,
    ExportYaml, InstallOptions, UninstallOptions,
};
pub use dump::{DiagnosticsDump, DumpFile};
pub use error::{KubeError, Result};
pub use exec::{Echo, Executor, Step};
pub use helm::HelmDialect;
pub use mock::MockRunner;
pub use orchestrator::{InstallOutcome, InstallPlan, Orchestrator, PlanAction};
pub use preflight::{LocalCluster, Preflight};
pub use pv::{PvCheck, PvRecord, PvSafetyChecker};
pub use report::{Reporter, Transcript};
pub use runner::{CommandOutput, CommandRunner, Invocation, ProcessRunner, RunOptions};
pub use status::{ReleaseStatus, ResolvedStatus, resolve_status};
pub use values::{ComputedValues, compute_values};
pub use verify::{DeploymentVerifier, VerifyReport, Workloads};
