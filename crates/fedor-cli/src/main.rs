mod cmd;
mod output;

use clap::{Parser, Subcommand};
use cmd::config::ConfigSubcommand;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "fedor",
    about = "Webhook-driven pull request reviews by a supervised agent",
    version,
    propagate_version = true
)]
struct Cli {
    /// YAML config file; environment variables override its values
    #[arg(long, global = true, env = "FEDOR_CONFIG")]
    config: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the webhook server
    Serve {
        /// Port to listen on (overrides PORT and the config file)
        #[arg(long, short)]
        port: Option<u16>,
    },

    /// Review one pull request right away, bypassing the debounce
    Run {
        /// Repository as owner/name
        repo: String,
        /// Pull request number
        pr: u64,
        /// Trigger reason shown to the agent
        #[arg(long, default_value = "manual run")]
        reason: String,
    },

    /// Feed a captured stream-json log through the parser
    Replay {
        /// File with one stream-json event per line
        file: PathBuf,
    },

    /// Inspect configuration
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = match &cli.command {
        Commands::Serve { .. } | Commands::Run { .. } => tracing::Level::INFO,
        _ => tracing::Level::WARN,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .init();

    let config = cli.config.as_deref();

    let result = match cli.command {
        Commands::Serve { port } => cmd::serve::run(config, port),
        Commands::Run { repo, pr, reason } => cmd::run::run(config, &repo, pr, &reason, cli.json),
        Commands::Replay { file } => cmd::replay::run(&file, cli.json),
        Commands::Config { subcommand } => cmd::config::run(config, subcommand, cli.json),
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
