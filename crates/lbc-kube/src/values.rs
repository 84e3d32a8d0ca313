//! Computed chart values
//!
//! The chart ships a `templates/dump-values.yaml` template that prints the
//! fully merged values as one JSON object on a comment line. Rendering it with
//! the operator's value arguments tells the installer what the release is
//! about to be configured with, before anything is applied.

use serde_json::{Map, Value};

use crate::error::Result;
use crate::helm::HelmDialect;
use crate::report::Reporter;
use crate::runner::{CommandRunner, Invocation, RunOptions};

pub const DUMP_VALUES_TEMPLATE: &str = "templates/dump-values.yaml";

/// Merged chart values, as rendered by helm
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ComputedValues {
    values: Map<String, Value>,
}

impl ComputedValues {
    /// Extract the JSON object from rendered dump-values output
    ///
    /// The last line that holds a JSON object, with an optional leading `#`,
    /// is taken.
    pub fn from_rendered(output: &str) -> Option<Self> {
        output.lines().rev().find_map(|line| {
            let line = line.trim().trim_start_matches('#').trim_start();
            if !line.starts_with('{') {
                return None;
            }
            match serde_json::from_str::<Value>(line) {
                Ok(Value::Object(values)) => Some(Self { values }),
                _ => None,
            }
        })
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Whether the chart will provision persistent volumes
    ///
    /// `None` when the chart does not say; anything but `true` means no.
    pub fn uses_persistent_volumes(&self) -> Option<bool> {
        self.get("usePersistentVolumes")
            .map(|value| value == &Value::Bool(true))
    }

    /// Pretty-printed with sorted keys
    pub fn to_pretty_json(&self) -> Result<String> {
        let sorted: std::collections::BTreeMap<_, _> = self.values.iter().collect();
        Ok(serde_json::to_string_pretty(&sorted)?)
    }
}

/// Render the dump-values template for `chart` with `value_args`
///
/// Returns `None` with a warning when the values cannot be determined.
pub async fn compute_values<R>(
    runner: &R,
    reporter: &Reporter,
    dialect: HelmDialect,
    release: &str,
    chart: &str,
    value_args: &[String],
) -> Result<Option<ComputedValues>>
where
    R: CommandRunner + ?Sized,
{
    let render: Invocation = dialect
        .template(release, None, Some(DUMP_VALUES_TEMPLATE))
        .args(value_args.iter().cloned())
        .arg(chart);

    let output = runner.run(&render, &RunOptions::new()).await?;
    if !output.success() {
        tracing::debug!(stderr = %output.stderr, "dump-values render failed");
        reporter.warn(
            "unable to determine computed helm values - this may lead to incorrect warnings",
        );
        return Ok(None);
    }

    match ComputedValues::from_rendered(&output.stdout) {
        Some(values) => {
            reporter.output(&format!("Computed chart values:\n{}", values.to_pretty_json()?));
            Ok(Some(values))
        }
        None => {
            reporter.warn("unable to parse helm values - this may lead to incorrect warnings");
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockRunner;

    const RENDERED: &str = "---\n# Source: enterprise-suite/templates/dump-values.yaml\n# {\"usePersistentVolumes\":true,\"minikube\":false}\n\n";

    #[test]
    fn test_from_rendered() {
        let values = ComputedValues::from_rendered(RENDERED).unwrap();
        assert_eq!(values.uses_persistent_volumes(), Some(true));
        assert_eq!(values.get("minikube"), Some(&Value::Bool(false)));
    }

    #[test]
    fn test_from_rendered_garbage() {
        assert!(ComputedValues::from_rendered("Error: no template").is_none());
        assert!(ComputedValues::from_rendered("# {not json").is_none());
        assert!(ComputedValues::from_rendered("# [1, 2]").is_none());
    }

    #[test]
    fn test_non_boolean_pv_flag_means_no() {
        let values = ComputedValues::from_rendered("# {\"usePersistentVolumes\":\"true\"}").unwrap();
        assert_eq!(values.uses_persistent_volumes(), Some(false));

        let values = ComputedValues::from_rendered("# {}").unwrap();
        assert_eq!(values.uses_persistent_volumes(), None);
    }

    #[tokio::test]
    async fn test_compute_values_passes_value_args() {
        let reporter = Reporter::buffered();
        let runner = MockRunner::new().expect(
            "helm template es --show-only templates/dump-values.yaml --set usePersistentVolumes=false -f my.yaml chart.tgz",
            0,
            "# {\"usePersistentVolumes\":false}",
        );
        let args: Vec<String> = ["--set", "usePersistentVolumes=false", "-f", "my.yaml"]
            .iter()
            .map(|s| s.to_string())
            .collect();

        let values = compute_values(
            &runner,
            &reporter,
            HelmDialect::V3 {
                force_update: true,
            },
            "es",
            "chart.tgz",
            &args,
        )
        .await
        .unwrap()
        .unwrap();
        assert_eq!(values.uses_persistent_volumes(), Some(false));
        assert_eq!(
            reporter.transcript().stdout,
            "Computed chart values:\n{\n  \"usePersistentVolumes\": false\n}\n"
        );
    }

    #[tokio::test]
    async fn test_compute_values_failure_warns() {
        let reporter = Reporter::buffered();
        let runner = MockRunner::new().expect(
            "helm template --name es --execute templates/dump-values.yaml chart.tgz",
            1,
            "",
        );
        let values = compute_values(&runner, &reporter, HelmDialect::V2, "es", "chart.tgz", &[])
            .await
            .unwrap();
        assert!(values.is_none());
        assert!(reporter.transcript().stderr.contains("unable to determine"));
    }
}
