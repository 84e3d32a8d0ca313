//! Debug-dump command - collect diagnostic data for a support ticket

use lbc_kube::dump::{archive_in, print_files};
use lbc_kube::{CommandRunner, DiagnosticsDump, Preflight, Reporter};
use std::path::Path;

use crate::error::Result;
use crate::settings::DebugDumpArgs;

/// Run the debug-dump command
pub async fn run<R>(args: &DebugDumpArgs, runner: R, reporter: &Reporter) -> Result<()>
where
    R: CommandRunner,
{
    if !args.skip_checks {
        Preflight::new(&runner, reporter).check_kubectl(None).await?;
    }

    let files = DiagnosticsDump::new(&runner, reporter, args.namespace.as_str())
        .collect()
        .await?;

    if args.print {
        print_files(&files, reporter);
        return Ok(());
    }

    let archive = archive_in(&files, Path::new("."))?;
    reporter.success(&format!(
        "Lightbend Console diagnostic data written to {}",
        archive.display()
    ));
    reporter.message("Please attach this archive to a support ticket");
    Ok(())
}
