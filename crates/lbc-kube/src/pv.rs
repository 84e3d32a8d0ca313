//! Persistent volume safety check
//!
//! Deleting a release, or upgrading it with `usePersistentVolumes=false`,
//! deletes its claims. Whether the backing volumes survive depends on their
//! reclaim policy. This module finds the volumes that belong to the product
//! and decides whether the transition is safe.

use crate::error::Result;
use crate::helm::HelmDialect;
use crate::runner::{CommandRunner, DEFAULT_TIMEOUT, Invocation, RunOptions};

/// Claim names the chart creates; stateful sets add `-<ordinal>` suffixes
pub const CONSOLE_PVCS: &[&str] = &[
    "alertmanager-storage",
    "es-grafana-storage",
    "prometheus-storage",
];

/// Marker in `helm get` output of a release that provisions volumes
const PV_ENABLED: &str = "usePersistentVolumes: true";

const PV_COLUMNS: &str = "custom-columns=NAME:.metadata.name,RECLAIM:.spec.persistentVolumeReclaimPolicy,NAMESPACE:.spec.claimRef.namespace,CLAIM:.spec.claimRef.name,STATUS:.status.phase";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReclaimPolicy {
    Retain,
    Other(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VolumePhase {
    Bound,
    Available,
    Released,
    Failed,
    Unknown,
}

impl VolumePhase {
    fn parse(s: &str) -> Self {
        match s {
            "Bound" => VolumePhase::Bound,
            "Available" => VolumePhase::Available,
            "Released" => VolumePhase::Released,
            "Failed" => VolumePhase::Failed,
            _ => VolumePhase::Unknown,
        }
    }
}

/// One persistent volume, as listed by kubectl
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PvRecord {
    pub volume_name: String,
    pub reclaim_policy: ReclaimPolicy,
    pub claim_namespace: Option<String>,
    pub claim_name: Option<String>,
    pub phase: VolumePhase,
}

impl PvRecord {
    /// Parse one `custom-columns` line; `None` for malformed lines
    pub fn parse_line(line: &str) -> Option<Self> {
        let cols: Vec<&str> = line.split_whitespace().collect();
        let [name, reclaim, namespace, claim, phase] = cols[..] else {
            return None;
        };
        let present = |s: &str| (s != "<none>").then(|| s.to_string());

        Some(Self {
            volume_name: name.to_string(),
            reclaim_policy: match reclaim {
                "Retain" => ReclaimPolicy::Retain,
                other => ReclaimPolicy::Other(other.to_string()),
            },
            claim_namespace: present(namespace),
            claim_name: present(claim),
            phase: VolumePhase::parse(phase),
        })
    }

    /// Parse full `kubectl get pv --no-headers` output
    pub fn parse_list(output: &str) -> Vec<Self> {
        output.lines().filter_map(Self::parse_line).collect()
    }

    /// Whether the volume backs one of the product's claims in `namespace`
    pub fn belongs_to(&self, namespace: &str) -> bool {
        let (Some(claim_ns), Some(claim)) = (&self.claim_namespace, &self.claim_name) else {
            return false;
        };
        claim_ns == namespace
            && CONSOLE_PVCS.iter().any(|known| {
                claim == known
                    || claim
                        .strip_prefix(known)
                        .is_some_and(|rest| rest.starts_with('-'))
            })
    }

    pub fn is_retained(&self) -> bool {
        self.reclaim_policy == ReclaimPolicy::Retain
    }
}

/// Outcome of the safety check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PvCheck {
    Ok,
    /// Proceed, but tell the operator
    Warn(Vec<String>),
    /// Data would be lost
    Fail(String),
}

/// Release state as seen by `helm get`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CurrentRelease {
    Missing,
    WithoutVolumes,
    WithVolumes,
    Unreadable,
}

/// Compares current and desired volume usage of a release
pub struct PvSafetyChecker<'a, R: CommandRunner + ?Sized> {
    runner: &'a R,
    dialect: HelmDialect,
}

impl<'a, R: CommandRunner + ?Sized> PvSafetyChecker<'a, R> {
    pub fn new(runner: &'a R, dialect: HelmDialect) -> Self {
        Self { runner, dialect }
    }

    /// Check a transition of `release` in `namespace`
    ///
    /// `desired_uses_pv` is the computed value for the new configuration, if
    /// known. When uninstalling it is irrelevant.
    pub async fn check(
        &self,
        release: &str,
        namespace: &str,
        desired_uses_pv: Option<bool>,
        uninstalling: bool,
    ) -> Result<PvCheck> {
        match self.current_release(release, namespace).await? {
            CurrentRelease::Missing => self.check_orphans(namespace).await,
            CurrentRelease::Unreadable => Ok(PvCheck::Warn(vec![
                "unable to retrieve release information. Proceed with caution.".to_string(),
            ])),
            CurrentRelease::WithoutVolumes => Ok(PvCheck::Ok),
            CurrentRelease::WithVolumes => {
                let reason = if uninstalling {
                    "Existing deployment has usePersistentVolumes=true. Uninstall may result in the \
                     loss of Console data as associated PVCs will be removed."
                } else if desired_uses_pv == Some(false) {
                    "Existing deployment has usePersistentVolumes=true, but upgrade has specified \
                     usePersistentVolumes=false. Upgrade may result in the loss of Console data as \
                     associated PVCs will be removed."
                } else {
                    return Ok(PvCheck::Ok);
                };
                self.classify(namespace, reason).await
            }
        }
    }

    async fn current_release(&self, release: &str, namespace: &str) -> Result<CurrentRelease> {
        let output = self
            .runner
            .run(
                &self.dialect.get_values(release, Some(namespace)),
                &RunOptions::new().with_timeout(DEFAULT_TIMEOUT),
            )
            .await?;

        let state = if output.success() {
            if output.stdout.contains(PV_ENABLED) {
                CurrentRelease::WithVolumes
            } else {
                CurrentRelease::WithoutVolumes
            }
        } else if output.stderr.contains("not found") || output.stdout.contains("not found") {
            CurrentRelease::Missing
        } else {
            CurrentRelease::Unreadable
        };
        tracing::debug!(release, ?state, "current release volume usage");
        Ok(state)
    }

    async fn list_volumes(&self, namespace: &str) -> Result<Option<Vec<PvRecord>>> {
        let output = self
            .runner
            .run(
                &Invocation::new("kubectl").args(["get", "pv", "--no-headers", "-o", PV_COLUMNS]),
                &RunOptions::new().with_timeout(DEFAULT_TIMEOUT),
            )
            .await?;
        if !output.success() {
            return Ok(None);
        }
        Ok(Some(
            PvRecord::parse_list(&output.stdout)
                .into_iter()
                .filter(|pv| pv.belongs_to(namespace))
                .collect(),
        ))
    }

    /// Fresh install: retained volumes left behind by an earlier release
    async fn check_orphans(&self, namespace: &str) -> Result<PvCheck> {
        let Some(volumes) = self.list_volumes(namespace).await? else {
            return Ok(PvCheck::Warn(vec![
                "unable to list persistent volumes, skipping orphaned volume check".to_string(),
            ]));
        };

        let orphans: Vec<String> = volumes
            .iter()
            .filter(|pv| pv.is_retained() && pv.phase != VolumePhase::Available)
            .map(|pv| pv.volume_name.clone())
            .collect();

        if orphans.is_empty() {
            Ok(PvCheck::Ok)
        } else {
            Ok(PvCheck::Warn(vec![format!(
                "found retained persistent volumes from a previous installation in namespace {}: {}. \
                 They will not be reused automatically and need to be reclaimed manually.",
                namespace,
                orphans.join(", ")
            )]))
        }
    }

    /// Release with volumes is about to drop them
    async fn classify(&self, namespace: &str, reason: &str) -> Result<PvCheck> {
        let Some(volumes) = self.list_volumes(namespace).await? else {
            return Ok(PvCheck::Fail(format!(
                "{} Unable to list persistent volumes to check their reclaim policy.",
                reason
            )));
        };

        let (retained, deleted): (Vec<&PvRecord>, Vec<&PvRecord>) =
            volumes.iter().partition(|pv| pv.is_retained());

        if !deleted.is_empty() {
            let names: Vec<&str> = deleted.iter().map(|pv| pv.volume_name.as_str()).collect();
            return Ok(PvCheck::Fail(format!(
                "{} Volumes without a Retain reclaim policy: {}",
                reason,
                names.join(", ")
            )));
        }

        if retained.is_empty() {
            return Ok(PvCheck::Warn(vec![
                "existing deployment has usePersistentVolumes=true but no matching persistent volumes were found"
                    .to_string(),
            ]));
        }

        let names: Vec<&str> = retained.iter().map(|pv| pv.volume_name.as_str()).collect();
        Ok(PvCheck::Warn(vec![format!(
            "persistent volumes {} have a Retain reclaim policy and will be orphaned; reclaim them manually",
            names.join(", ")
        )]))
    }
}
