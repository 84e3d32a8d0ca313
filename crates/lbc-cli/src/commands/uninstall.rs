//! Uninstall command - remove the Console release

use lbc_kube::{CommandRunner, HelmDialect, Orchestrator, Preflight, Reporter};

use crate::error::Result;
use crate::settings::UninstallArgs;

/// Run the uninstall command
pub async fn run<R>(args: &UninstallArgs, runner: R, reporter: &Reporter) -> Result<()>
where
    R: CommandRunner,
{
    let options = args.to_options()?;

    if !args.skip_checks {
        Preflight::new(&runner, reporter).check_helm().await?;
    }
    let dialect = HelmDialect::detect(&runner, reporter).await?;

    Orchestrator::new(runner, reporter.clone(), dialect)
        .uninstall(&options)
        .await?;
    Ok(())
}
