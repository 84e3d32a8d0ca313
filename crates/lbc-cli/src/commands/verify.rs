//! Verify command - check that Console deployments are available

use lbc_kube::{CommandRunner, DeploymentVerifier, Preflight, Reporter, Workloads};

use crate::error::Result;
use crate::settings::VerifyArgs;

/// Run the verify command
pub async fn run<R>(args: &VerifyArgs, runner: R, reporter: &Reporter) -> Result<()>
where
    R: CommandRunner,
{
    if !args.skip_checks {
        Preflight::new(&runner, reporter).check_kubectl(None).await?;
    }

    DeploymentVerifier::new(&runner, reporter, args.namespace.as_str())
        .verify(&Workloads::console(), !args.external_alertmanager)
        .await?;
    Ok(())
}
