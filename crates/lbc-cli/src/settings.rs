//! Subcommand flags and the settings they fold into
//!
//! clap parses the flags once; each subcommand then turns them into the
//! immutable option structs of `lbc-kube`. Everything that can be rejected
//! without running a program (`--set` syntax, pass-through arguments,
//! namespace conflicts) is rejected here.

use clap::{Args, ValueEnum};
use lbc_core::{
    CREDENTIALS_FILE_ENV, ChartReference, DEFAULT_CREDENTIALS_FILE, Passthrough,
    ResolvedNamespace, SetOverride,
};
use lbc_kube::{
    DEFAULT_CHART, DEFAULT_NAMESPACE, DEFAULT_RELEASE, DEFAULT_REPO, DEFAULT_REPO_ALIAS,
    ExportYaml, InstallOptions, UninstallOptions,
};
use std::path::PathBuf;

use crate::error::Result;

/// What `--export-yaml` renders
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExportKind {
    /// The registry credentials secret only
    Creds,
    /// All Console resources
    Console,
}

impl From<ExportKind> for ExportYaml {
    fn from(kind: ExportKind) -> Self {
        match kind {
            ExportKind::Creds => ExportYaml::Creds,
            ExportKind::Console => ExportYaml::Console,
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct InstallArgs {
    /// Namespace to install Console into
    #[arg(long)]
    pub namespace: Option<String>,

    /// Helm release name
    #[arg(long, default_value = DEFAULT_RELEASE)]
    pub helm_name: String,

    /// Delete an existing install first, instead of upgrading
    #[arg(long)]
    pub force_install: bool,

    /// Print resource yaml to stdout instead of installing
    #[arg(long, value_enum)]
    pub export_yaml: Option<ExportKind>,

    /// Location of a local chart tarball
    #[arg(long)]
    pub local_chart: Option<PathBuf>,

    /// Chart name to install from the repository
    #[arg(long, default_value = DEFAULT_CHART)]
    pub chart: String,

    /// Helm chart repository
    #[arg(long, default_value = DEFAULT_REPO)]
    pub repo: String,

    /// Name to register the chart repository under
    #[arg(long, default_value = DEFAULT_REPO_ALIAS)]
    pub repo_name: String,

    /// Credentials file
    #[arg(long, env = CREDENTIALS_FILE_ENV, default_value = DEFAULT_CREDENTIALS_FILE)]
    pub creds: PathBuf,

    /// Console version to install
    #[arg(long)]
    pub version: Option<String>,

    /// Wait for the install to finish, then verify it
    #[arg(long)]
    pub wait: bool,

    /// Set a helm chart value (key=value[,key=value]); can be repeated
    #[arg(long = "set", value_name = "VALUES")]
    pub set: Vec<String>,

    #[command(flatten)]
    pub common: MutatingArgs,

    /// Skip environment checks
    #[arg(long)]
    pub skip_checks: bool,

    /// Additional arguments after `--`, passed to helm unchanged
    #[arg(last = true, value_name = "HELM_ARGS")]
    pub rest: Vec<String>,
}

/// Flags shared by install and uninstall
#[derive(Args, Debug, Clone, Default)]
pub struct MutatingArgs {
    /// Ignore warnings about persistent volumes and proceed anyway. CAUTION!
    #[arg(long)]
    pub delete_pvcs: bool,

    /// Only print the commands that would change the cluster
    #[arg(long)]
    pub dry_run: bool,
}

impl InstallArgs {
    pub fn overrides(&self) -> Result<Vec<SetOverride>> {
        self.set
            .iter()
            .map(|s| SetOverride::parse(s).map_err(Into::into))
            .collect()
    }

    pub fn chart_reference(&self) -> ChartReference {
        ChartReference::from_flags(
            self.local_chart.as_deref(),
            &self.repo_name,
            &self.repo,
            &self.chart,
            self.version.as_deref(),
        )
    }

    /// Fold the flags into install options
    pub fn to_options(&self) -> Result<InstallOptions> {
        let overrides = self.overrides()?;
        let passthrough = Passthrough::parse(&self.rest)?;
        let namespace = resolve_namespace(&passthrough, self.namespace.as_deref())?;

        let mut options = InstallOptions::new(&self.helm_name, namespace, self.chart_reference())
            .with_overrides(overrides)
            .with_passthrough(passthrough);
        if self.force_install {
            options = options.force_install();
        }
        if self.common.delete_pvcs {
            options = options.delete_pvcs();
        }
        if self.wait {
            options = options.with_wait();
        }
        if self.common.dry_run {
            options = options.dry_run();
        }
        if let Some(kind) = self.export_yaml {
            options = options.export_yaml(kind.into());
        }
        Ok(options)
    }
}

#[derive(Args, Debug, Clone)]
pub struct UninstallArgs {
    /// Namespace Console is installed in
    #[arg(long)]
    pub namespace: Option<String>,

    /// Helm release name
    #[arg(long, default_value = DEFAULT_RELEASE)]
    pub helm_name: String,

    #[command(flatten)]
    pub common: MutatingArgs,

    /// Skip environment checks
    #[arg(long)]
    pub skip_checks: bool,

    /// Additional arguments after `--`, passed to helm unchanged
    #[arg(last = true, value_name = "HELM_ARGS")]
    pub rest: Vec<String>,
}

impl UninstallArgs {
    pub fn to_options(&self) -> Result<UninstallOptions> {
        let passthrough = Passthrough::parse(&self.rest)?;
        let namespace = resolve_namespace(&passthrough, self.namespace.as_deref())?;

        let mut options =
            UninstallOptions::new(&self.helm_name, namespace).with_passthrough(passthrough);
        if self.common.delete_pvcs {
            options = options.delete_pvcs();
        }
        if self.common.dry_run {
            options = options.dry_run();
        }
        Ok(options)
    }
}

#[derive(Args, Debug, Clone)]
pub struct VerifyArgs {
    /// Namespace Console is installed in
    #[arg(long, default_value = DEFAULT_NAMESPACE)]
    pub namespace: String,

    /// Skip the alertmanager check (for use with existing alertmanagers)
    #[arg(long)]
    pub external_alertmanager: bool,

    /// Skip environment checks
    #[arg(long)]
    pub skip_checks: bool,
}

#[derive(Args, Debug, Clone)]
pub struct DebugDumpArgs {
    /// Namespace Console is installed in
    #[arg(long, default_value = DEFAULT_NAMESPACE)]
    pub namespace: String,

    /// Print the output instead of writing it to an archive
    #[arg(long)]
    pub print: bool,

    /// Skip environment checks
    #[arg(long)]
    pub skip_checks: bool,
}

fn resolve_namespace(passthrough: &Passthrough, direct: Option<&str>) -> Result<ResolvedNamespace> {
    Ok(passthrough.resolve_namespace(direct, DEFAULT_NAMESPACE)?)
}
