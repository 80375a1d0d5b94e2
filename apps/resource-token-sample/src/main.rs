use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use resource_token_sample::logging::init_logging;
use resource_token_sample::{CliOverrides, SampleConfig};
use secrecy::SecretString;

/// Create a partition-scoped resource token and use it for item operations
#[derive(Parser)]
#[command(name = "resource-token-sample")]
#[command(version)]
struct Cli {
    /// Path to a YAML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Account endpoint URL
    #[arg(long, env = "ACCOUNT_URI")]
    endpoint: Option<String>,

    /// Account master key
    #[arg(long, env = "ACCOUNT_KEY", hide_env_values = true)]
    key: Option<String>,

    /// Run against the in-process emulator instead of an account
    #[arg(long)]
    emulator: bool,

    /// Print effective configuration (YAML) and exit
    #[arg(long)]
    print_config: bool,

    /// Log verbosity level (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Set up the token and run the scoped operations
    Run,
    /// Validate configuration and exit
    Check,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Some(path) = &cli.config
        && !path.is_file()
    {
        anyhow::bail!("config file does not exist: {}", path.display());
    }

    // 1) defaults -> 2) YAML (if provided) -> 3) env (DOCDB_SAMPLE__*) -> 4) CLI overrides
    let mut config = SampleConfig::load(cli.config.as_deref())?;
    config.apply_cli_overrides(&CliOverrides {
        endpoint: cli.endpoint,
        key: cli.key.map(SecretString::from),
        emulator: cli.emulator,
        verbose: cli.verbose,
    });

    init_logging(&config.logging)?;

    if cli.print_config {
        println!("Effective configuration:\n{}", config.to_yaml()?);
        return Ok(());
    }

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run(&config).await,
        Commands::Check => check(&config),
    }
}

fn check(config: &SampleConfig) -> Result<()> {
    tracing::info!("checking configuration");
    config.validate()?;
    println!("Configuration is valid");
    println!("{}", config.to_yaml()?);
    Ok(())
}

async fn run(config: &SampleConfig) -> Result<()> {
    let (connector, master) = config.connect_target()?;
    let report = resource_token_sample::run(connector.as_ref(), master, &config.sample).await?;
    print!("{report}");
    Ok(())
}
