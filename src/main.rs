//! Cadence CLI entry point.

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use cadence::cli::{commands, handle_error, load_config, Cli, Commands};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(err) => handle_error(err, cli.json),
    };

    // `serve` installs the configured logger; one-shot commands log to stderr.
    if !matches!(cli.command, Commands::Serve(_)) {
        tracing_subscriber::registry()
            .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }

    let result = match cli.command {
        Commands::Serve(args) => commands::serve::execute(args, config).await,
        Commands::Parse(args) => commands::parse::execute(&args, cli.json),
        Commands::Health => commands::health::execute(&config, cli.json).await,
        Commands::Config => commands::config::execute(config, cli.json),
    };

    if let Err(err) = result {
        handle_error(err, cli.json);
    }
}
