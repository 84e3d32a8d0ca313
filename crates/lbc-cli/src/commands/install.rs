//! Install command - install, upgrade or render Lightbend Console

use lbc_core::Credentials;
use lbc_kube::{
    CommandRunner, DeploymentVerifier, HelmDialect, Orchestrator, Preflight, Reporter, Workloads,
};

use crate::error::Result;
use crate::settings::InstallArgs;

/// Run the install command
pub async fn run<R>(args: &InstallArgs, runner: R, reporter: &Reporter) -> Result<()>
where
    R: CommandRunner + Clone,
{
    let options = args.to_options()?;
    let credentials = Credentials::resolve(&args.creds)?;

    let preflight = Preflight::new(&runner, reporter);
    if !args.skip_checks && options.export_yaml.is_some() {
        preflight.check_helm().await?;
    }

    let dialect = HelmDialect::detect(&runner, reporter).await?;

    if !args.skip_checks && options.export_yaml.is_none() {
        preflight
            .install_checks(dialect, &options.release, &credentials)
            .await?;
    }

    let orchestrator = Orchestrator::new(runner.clone(), reporter.clone(), dialect);
    let outcome = orchestrator.install(&options, &credentials).await?;

    if outcome.action.is_none() || options.dry_run {
        return Ok(());
    }

    if options.wait {
        DeploymentVerifier::new(&runner, reporter, outcome.namespace.as_str())
            .verify(&Workloads::console(), true)
            .await?;
    }
    Ok(())
}
