//! lbc - installer and lifecycle CLI for Lightbend Console

use clap::{Parser, Subcommand};
use lbc_kube::{ProcessRunner, Reporter};
use std::process::ExitCode;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod error;
mod exit_codes;
mod settings;

use error::CliError;
use settings::{DebugDumpArgs, InstallArgs, UninstallArgs, VerifyArgs};

#[derive(Parser)]
#[command(name = "lbc")]
#[command(version)]
#[command(about = "Install, upgrade, verify and diagnose Lightbend Console", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug output
    #[arg(long, global = true)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Install or upgrade Lightbend Console
    Install(InstallArgs),

    /// Uninstall Lightbend Console
    Uninstall(UninstallArgs),

    /// Verify a Console installation
    Verify(VerifyArgs),

    /// Make an archive with cluster status info for debugging
    DebugDump(DebugDumpArgs),
}

fn init_tracing(debug: bool) {
    let filter = if debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    miette::set_panic_hook();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let printed = e.print();
            return exit_code(parse_failure_code(&e, printed));
        }
    };

    init_tracing(cli.debug);

    let reporter = Reporter::new();
    let runner = ProcessRunner::new();

    let result = match &cli.command {
        Commands::Install(args) => commands::install::run(args, runner, &reporter).await,
        Commands::Uninstall(args) => commands::uninstall::run(args, runner, &reporter).await,
        Commands::Verify(args) => commands::verify::run(args, runner, &reporter).await,
        Commands::DebugDump(args) => commands::debug_dump::run(args, runner, &reporter).await,
    };

    match result {
        Ok(()) => exit_code(exit_codes::SUCCESS),
        Err(err) => report(err),
    }
}

fn report(err: CliError) -> ExitCode {
    let code = err.exit_code();
    tracing::debug!(code, "exiting with error");
    eprintln!("{:?}", miette::Report::new(err));
    exit_code(code)
}

/// Exit code after clap stopped parsing, given whether its message was written
///
/// `--help` and `--version` also end up here and succeed.
fn parse_failure_code(err: &clap::Error, printed: std::io::Result<()>) -> i32 {
    match printed {
        Err(_) => exit_codes::IO_ERROR,
        Ok(()) if err.use_stderr() => exit_codes::USAGE_ERROR,
        Ok(()) => exit_codes::SUCCESS,
    }
}

fn exit_code(code: i32) -> ExitCode {
    ExitCode::from(u8::try_from(code).unwrap_or(1))
}
