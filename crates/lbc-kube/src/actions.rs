//! Options for install, uninstall, verify and debug-dump

use lbc_core::{ChartReference, Passthrough, ResolvedNamespace, SetOverride};

/// Namespace Console is installed into unless told otherwise
pub const DEFAULT_NAMESPACE: &str = "lightbend";

/// Default helm release name
pub const DEFAULT_RELEASE: &str = "enterprise-suite";

pub const DEFAULT_CHART: &str = "enterprise-suite";
pub const DEFAULT_REPO: &str = "https://repo.lightbend.com/helm-charts";
pub const DEFAULT_REPO_ALIAS: &str = "es-repo";

/// Render-only output selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportYaml {
    /// Only the registry credentials secret
    Creds,
    /// All Console resources
    Console,
}

/// Options for install operation
#[derive(Debug, Clone)]
pub struct InstallOptions {
    /// Release name
    pub release: String,

    /// Target namespace, already reconciled with the pass-through arguments
    pub namespace: ResolvedNamespace,

    pub chart: ChartReference,

    /// Parsed `--set` arguments, in order
    pub overrides: Vec<SetOverride>,

    /// Arguments after `--`, forwarded to helm
    pub passthrough: Passthrough,

    /// Delete an existing release first instead of upgrading it
    pub force_install: bool,

    /// Proceed even if persistent data could be lost
    pub delete_pvcs: bool,

    /// Pass `--wait` to helm
    pub wait: bool,

    /// Print mutating commands instead of running them
    pub dry_run: bool,

    /// Render manifests instead of installing
    pub export_yaml: Option<ExportYaml>,
}

impl InstallOptions {
    pub fn new(
        release: impl Into<String>,
        namespace: ResolvedNamespace,
        chart: ChartReference,
    ) -> Self {
        Self {
            release: release.into(),
            namespace,
            chart,
            overrides: Vec::new(),
            passthrough: Passthrough::default(),
            force_install: false,
            delete_pvcs: false,
            wait: false,
            dry_run: false,
            export_yaml: None,
        }
    }

    pub fn with_overrides(mut self, overrides: Vec<SetOverride>) -> Self {
        self.overrides = overrides;
        self
    }

    pub fn with_passthrough(mut self, passthrough: Passthrough) -> Self {
        self.passthrough = passthrough;
        self
    }

    pub fn force_install(mut self) -> Self {
        self.force_install = true;
        self
    }

    pub fn delete_pvcs(mut self) -> Self {
        self.delete_pvcs = true;
        self
    }

    pub fn with_wait(mut self) -> Self {
        self.wait = true;
        self
    }

    pub fn dry_run(mut self) -> Self {
        self.dry_run = true;
        self
    }

    pub fn export_yaml(mut self, export: ExportYaml) -> Self {
        self.export_yaml = Some(export);
        self
    }

    /// Namespace to put on the helm command line; `None` when the
    /// pass-through arguments already carry it
    pub fn namespace_arg(&self) -> Option<&str> {
        (!self.namespace.via_passthrough).then_some(self.namespace.name.as_str())
    }

    /// Pass-through arguments followed by the re-escaped `--set` overrides
    pub fn helm_args(&self) -> Vec<String> {
        self.passthrough
            .args()
            .iter()
            .cloned()
            .chain(self.overrides.iter().flat_map(SetOverride::to_helm_args))
            .collect()
    }

    /// Only the arguments that change computed values
    pub fn value_args(&self) -> Vec<String> {
        self.passthrough
            .value_args()
            .iter()
            .cloned()
            .chain(self.overrides.iter().flat_map(SetOverride::to_helm_args))
            .collect()
    }
}

/// Options for uninstall operation
#[derive(Debug, Clone)]
pub struct UninstallOptions {
    pub release: String,
    pub namespace: ResolvedNamespace,
    pub passthrough: Passthrough,
    pub delete_pvcs: bool,
    pub dry_run: bool,
}

impl UninstallOptions {
    pub fn new(release: impl Into<String>, namespace: ResolvedNamespace) -> Self {
        Self {
            release: release.into(),
            namespace,
            passthrough: Passthrough::default(),
            delete_pvcs: false,
            dry_run: false,
        }
    }

    pub fn with_passthrough(mut self, passthrough: Passthrough) -> Self {
        self.passthrough = passthrough;
        self
    }

    pub fn delete_pvcs(mut self) -> Self {
        self.delete_pvcs = true;
        self
    }

    pub fn dry_run(mut self) -> Self {
        self.dry_run = true;
        self
    }
}
