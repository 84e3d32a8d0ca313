//! Diagnostic data collection (`debug-dump`)
//!
//! Resource listings and container logs from the Console namespace, either
//! packed into a timestamped `.tar.gz` for a support ticket or printed.

use chrono::{DateTime, Local};
use flate2::Compression;
use flate2::write::GzEncoder;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use tar::{Builder, Header};

use crate::error::{KubeError, Result};
use crate::report::Reporter;
use crate::runner::{CommandRunner, Invocation, RunOptions};

/// Lines of log kept per container
pub const LOG_TAIL: u32 = 250;

const FAILURE_PREFIX: &str = "Failed to get diagnostic data (this is likely harmless): ";

/// One file of the dump
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DumpFile {
    pub name: String,
    pub content: String,
}

/// Collects diagnostic files from one namespace
pub struct DiagnosticsDump<'a, R: CommandRunner + ?Sized> {
    runner: &'a R,
    reporter: &'a Reporter,
    namespace: String,
}

impl<'a, R: CommandRunner + ?Sized> DiagnosticsDump<'a, R> {
    pub fn new(runner: &'a R, reporter: &'a Reporter, namespace: impl Into<String>) -> Self {
        Self {
            runner,
            reporter,
            namespace: namespace.into(),
        }
    }

    fn kubectl<I, S>(&self, args: I) -> Invocation
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Invocation::new("kubectl")
            .args(["--namespace", self.namespace.as_str()])
            .args(args)
    }

    /// Run a listing that the dump cannot do without
    async fn required(&self, invocation: Invocation, what: &str) -> Result<String> {
        let output = self.runner.run(&invocation, &RunOptions::new()).await?;
        if !output.success() {
            tracing::debug!(command = %invocation, stderr = %output.stderr, "listing failed");
            return Err(KubeError::Diagnostics(format!(
                "unable to {} in {} namespace",
                what, self.namespace
            )));
        }
        Ok(output.stdout)
    }

    /// Gather every file of the dump
    pub async fn collect(&self) -> Result<Vec<DumpFile>> {
        self.reporter
            .message("Capturing debug information, this can take a few minutes");
        let mut files = Vec::new();

        self.reporter.message("Listing Console resources");
        files.push(DumpFile {
            name: "kubectl-get-all.txt".to_string(),
            content: self
                .required(self.kubectl(["get", "all"]), "list k8s resources")
                .await?,
        });

        self.reporter.message("Describing Console resources");
        files.push(DumpFile {
            name: "kubectl-describe-all.txt".to_string(),
            content: self
                .required(self.kubectl(["describe", "all"]), "describe k8s resources")
                .await?,
        });

        self.reporter.message("Describing Console PVCs");
        files.push(DumpFile {
            name: "kubectl-get-pvc.txt".to_string(),
            content: self
                .required(self.kubectl(["get", "pvc"]), "list persistent volume claims")
                .await?,
        });

        self.reporter.message("Retrieving Console logs");
        let pods = self
            .required(self.kubectl(["get", "pods", "--no-headers"]), "list pods")
            .await?;
        for pod in pods.lines().filter_map(|line| line.split_whitespace().next()) {
            let containers = self
                .required(
                    self.kubectl(["get", "pods", pod, "-o", "jsonpath={.spec.containers[*].name}"]),
                    &format!("get containers of pod {}", pod),
                )
                .await?;
            for container in containers.split_whitespace() {
                self.collect_logs(pod, container, &mut files).await?;
            }
        }

        Ok(files)
    }

    async fn collect_logs(&self, pod: &str, container: &str, files: &mut Vec<DumpFile>) -> Result<()> {
        let tail = format!("--tail={}", LOG_TAIL);
        let current = self.kubectl(["logs", pod, "-c", container, tail.as_str()]);
        let output = self.runner.run(&current, &RunOptions::new()).await?;
        if output.success() {
            files.push(DumpFile {
                name: format!("{}+{}.log", pod, container),
                content: output.stdout,
            });
        } else {
            self.reporter.warn(&format!(
                "{}unable to get logs for container {} in a pod {}",
                FAILURE_PREFIX, container, pod
            ));
        }

        // Only exists when the container has restarted
        let previous = self.kubectl(["logs", pod, "-c", container, "-p", tail.as_str()]);
        let output = self.runner.run(&previous, &RunOptions::new()).await?;
        if output.success() {
            files.push(DumpFile {
                name: format!("{}+{}+prev.log", pod, container),
                content: output.stdout,
            });
        }
        Ok(())
    }
}

/// `console-diagnostics-<timestamp>.tar.gz`
pub fn archive_name(now: DateTime<Local>) -> String {
    format!("console-diagnostics-{}.tar.gz", now.format("%Y-%m-%d-%H-%M-%S"))
}

/// Write `files` to a new timestamped archive in `dir`
pub fn archive_in(files: &[DumpFile], dir: &Path) -> Result<PathBuf> {
    let now = Local::now();
    let mtime = u64::try_from(now.timestamp()).unwrap_or(0);
    write_archive(files, &dir.join(archive_name(now)), mtime)
}

/// Write `files` into a gzipped tarball at `output`
pub fn write_archive(files: &[DumpFile], output: &Path, mtime: u64) -> Result<PathBuf> {
    let file = File::create(output)?;
    let encoder = GzEncoder::new(file, Compression::default());
    let mut builder = Builder::new(encoder);

    for file in files {
        add_bytes_to_archive(&mut builder, &file.name, file.content.as_bytes(), mtime)?;
    }

    builder.into_inner()?.finish()?;
    Ok(output.to_path_buf())
}

fn add_bytes_to_archive<W: Write>(
    builder: &mut Builder<W>,
    archive_path: &str,
    content: &[u8],
    mtime: u64,
) -> Result<()> {
    let mut header = Header::new_gnu();
    header.set_size(content.len() as u64);
    header.set_mode(0o644);
    header.set_mtime(mtime);
    header.set_cksum();

    builder.append_data(&mut header, archive_path, content)?;
    Ok(())
}

/// Print every file under a `=== File: <name> ===` header
pub fn print_files(files: &[DumpFile], reporter: &Reporter) {
    for file in files {
        reporter.output(&format!("=== File: {} ===", file.name));
        reporter.output(&file.content);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockRunner;
    use flate2::read::GzDecoder;
    use std::io::Read;
    use tempfile::TempDir;

    fn scripted() -> MockRunner {
        MockRunner::new()
            .expect("kubectl --namespace lightbend get all", 0, "pod/es-console-1 1/1 Running\n")
            .expect("kubectl --namespace lightbend describe all", 0, "Name: es-console-1\n")
            .expect("kubectl --namespace lightbend get pvc", 0, "")
            .expect(
                "kubectl --namespace lightbend get pods --no-headers",
                0,
                "console-backend-1   2/2   Running   0   1d\n",
            )
            .expect(
                "kubectl --namespace lightbend get pods console-backend-1 -o jsonpath={.spec.containers[*].name}",
                0,
                "es-console config-reloader",
            )
            .expect(
                "kubectl --namespace lightbend logs console-backend-1 -c es-console --tail=250",
                0,
                "started\n",
            )
            .expect(
                "kubectl --namespace lightbend logs console-backend-1 -c es-console -p --tail=250",
                0,
                "crashed\n",
            )
            .expect(
                "kubectl --namespace lightbend logs console-backend-1 -c config-reloader --tail=250",
                1,
                "",
            )
            .expect(
                "kubectl --namespace lightbend logs console-backend-1 -c config-reloader -p --tail=250",
                1,
                "",
            )
    }

    #[tokio::test]
    async fn test_collect() {
        let runner = scripted();
        let reporter = Reporter::buffered();
        let files = DiagnosticsDump::new(&runner, &reporter, "lightbend")
            .collect()
            .await
            .unwrap();

        let names: Vec<&str> = files.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "kubectl-get-all.txt",
                "kubectl-describe-all.txt",
                "kubectl-get-pvc.txt",
                "console-backend-1+es-console.log",
                "console-backend-1+es-console+prev.log",
            ]
        );
        assert_eq!(runner.remaining(), 0);
        assert!(
            reporter
                .transcript()
                .stderr
                .contains("unable to get logs for container config-reloader")
        );
    }

    #[tokio::test]
    async fn test_listing_failure_aborts() {
        let runner = MockRunner::new().expect("kubectl --namespace lightbend get all", 1, "");
        let reporter = Reporter::buffered();
        let err = DiagnosticsDump::new(&runner, &reporter, "lightbend")
            .collect()
            .await
            .unwrap_err();
        assert!(matches!(err, KubeError::Diagnostics(_)));
    }

    #[test]
    fn test_write_archive() {
        let dir = TempDir::new().unwrap();
        let files = vec![
            DumpFile {
                name: "kubectl-get-all.txt".to_string(),
                content: "pod/a\n".to_string(),
            },
            DumpFile {
                name: "a+b.log".to_string(),
                content: "hello\n".to_string(),
            },
        ];
        let path = write_archive(&files, &dir.path().join("dump.tar.gz"), 0).unwrap();

        let mut archive = tar::Archive::new(GzDecoder::new(File::open(path).unwrap()));
        let mut found = Vec::new();
        for entry in archive.entries().unwrap() {
            let mut entry = entry.unwrap();
            let mut content = String::new();
            entry.read_to_string(&mut content).unwrap();
            found.push((entry.path().unwrap().display().to_string(), content));
        }
        assert_eq!(
            found,
            vec![
                ("kubectl-get-all.txt".to_string(), "pod/a\n".to_string()),
                ("a+b.log".to_string(), "hello\n".to_string()),
            ]
        );
    }

    #[test]
    fn test_archive_in() {
        let dir = TempDir::new().unwrap();
        let path = archive_in(&[], dir.path()).unwrap();
        let name = path.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("console-diagnostics-"));
        assert!(name.ends_with(".tar.gz"));
        assert!(path.exists());
    }

    #[test]
    fn test_archive_name() {
        let now = chrono::TimeZone::with_ymd_and_hms(&Local, 2024, 3, 9, 14, 5, 7).unwrap();
        assert_eq!(archive_name(now), "console-diagnostics-2024-03-09-14-05-07.tar.gz");
    }

    #[test]
    fn test_print_files() {
        let reporter = Reporter::buffered();
        print_files(
            &[DumpFile {
                name: "kubectl-get-pvc.txt".to_string(),
                content: "No resources found.\n".to_string(),
            }],
            &reporter,
        );
        insta::assert_snapshot!(reporter.transcript().stdout, @r"
        === File: kubectl-get-pvc.txt ===
        No resources found.
        ");
    }
}
