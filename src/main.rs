mod cli;
mod command;
mod transport;

use anyhow::{Context, Result};
use cli::Invocation;
use devctl_core::limits::EXIT_FAILURE;
use devctl_core::{Cancellation, ConnectionBroker, ConsoleRelay, Dispatcher};
use std::process::ExitCode;
use std::sync::Arc;
use transport::PortConnector;

use tracing::{debug, error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> ExitCode {
    let invocation = Invocation::parse();
    init_tracing(invocation.flags.verbose);

    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    if let Err(e) = init(&invocation) {
        error!("Initialization failed: {:#}", e);
        eprintln!("Error: {:#}", e);
        return ExitCode::from(EXIT_FAILURE);
    }

    let registry = match command::build_registry() {
        Ok(registry) => Arc::new(registry),
        Err(e) => {
            error!("Invalid command table: {}", e);
            eprintln!("Error: {}", e);
            return ExitCode::from(EXIT_FAILURE);
        }
    };

    let relay = ConsoleRelay::new();
    let cancellation = Arc::new(Cancellation::new());

    // Propagate Ctrl-C to the running handler
    let cancel_clone = cancellation.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            debug!("Interrupt received");
            cancel_clone.cancel();
        }
    });

    let dispatcher = Dispatcher::new(
        command::handlers::PROGRAM,
        registry,
        command::default_command(),
        ConnectionBroker::new(Arc::new(PortConnector::new())),
        relay,
        &cancellation,
    );

    let args = invocation.positional();
    dispatcher.run(&args, Arc::new(invocation.flag_set)).await
}

/// Logs go to stderr so command output on stdout stays clean
fn init_tracing(verbose: bool) {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env().add_directive(level.into()))
        .init();
}

/// Process setup that must succeed before any command runs
fn init(invocation: &Invocation) -> Result<()> {
    if let Some(dir) = &invocation.flags.chdir {
        std::env::set_current_dir(dir)
            .with_context(|| format!("Failed to change directory to {}", dir.display()))?;
        debug!("Working directory: {}", dir.display());
    }
    Ok(())
}
