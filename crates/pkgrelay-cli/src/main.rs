//! CLI entry point - the composition root.
//!
//! This is the ONLY place where infrastructure is wired together via bootstrap.
//! Command dispatch routes to handlers which delegate to the dispatcher.

use clap::{CommandFactory, Parser};
use tracing_subscriber::EnvFilter;

use pkgrelay_cli::{Cli, CliConfig, CliError, Commands, bootstrap, handlers};

/// Install the fmt subscriber. `RUST_LOG` wins over `-v`.
fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = CliConfig::from_cli(&cli);

    // Dispatch to appropriate handler
    let Some(command) = cli.command else {
        // No command provided - show help
        Cli::command().print_help()?;
        return Ok(());
    };

    if matches!(command, Commands::Paths) {
        return handlers::paths::execute(config.data_dir.as_deref(), config.packages_dir.as_deref());
    }

    // Bootstrap the relay context (composition root)
    let ctx = bootstrap(config).await?;

    match command {
        Commands::Enqueue { asset } => handlers::enqueue::execute(&ctx, asset).await?,
        Commands::Run { once } => handlers::run::execute(&ctx, once).await?,
        Commands::Status { job_id, json } => handlers::status::execute(&ctx, &job_id, json).await?,
        Commands::List { json } => handlers::list::execute(&ctx, json).await?,
        Commands::Cancel { job_id, .. } => handlers::cancel::execute(&ctx, job_id.as_ref()).await?,
        Commands::Clear {
            job_id,
            older_than_days,
        } => handlers::clear::execute(&ctx, job_id.as_ref(), older_than_days).await?,
        Commands::RequestRemote { asset } => handlers::request_remote::execute(&ctx, asset).await?,
        // Handled before bootstrap
        Commands::Paths => {}
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    // Load .env before parsing so env fallbacks see it
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(err) = run(cli).await {
        eprintln!("Error: {err:#}");
        let code = err.downcast_ref::<CliError>().map_or(1, CliError::exit_code);
        std::process::exit(code);
    }
}
