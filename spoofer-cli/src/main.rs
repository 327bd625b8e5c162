use clap::Parser;
use colored::Colorize;
use spoofer_core::{CliErrorDisplay, Collector, CollectorConfig, SpooferError};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod console;

use console::ConsoleObserver;

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(name = "spoofer-collect")]
#[command(version = VERSION)]
#[command(about = "Collect IPv4 spoofing-capable clients from the CAIDA Spoofer API")]
#[command(long_about = r#"
Walks the CAIDA Spoofer API session feed from a start date to the present and
writes every IPv4 client that could spoof routed or private source addresses
into two text files.

Settings are read from spoofer.toml, ~/.spoofer/config.toml, .env files and
SPOOFER_* environment variables; the flags below take precedence.
"#)]
struct Cli {
    #[arg(long, value_name = "PATH", help = "File for clients that spoofed routed addresses")]
    routed_output: Option<PathBuf>,

    #[arg(long, value_name = "PATH", help = "File for clients that spoofed private addresses")]
    private_output: Option<PathBuf>,

    #[arg(short, long, value_name = "N", help = "Collect sessions from the last N days")]
    days: Option<u32>,

    #[arg(long, value_name = "URL", help = "Base URL of the Spoofer API")]
    api_base: Option<String>,

    #[arg(short, long, value_name = "PATH", help = "Additional TOML configuration file")]
    config: Option<PathBuf>,

    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn apply_overrides(&self, config: &mut CollectorConfig) {
        if let Some(path) = &self.routed_output {
            config.output.routed_path = path.clone();
        }
        if let Some(path) = &self.private_output {
            config.output.private_path = path.clone();
        }
        if let Some(days) = self.days {
            config.collection.lookback_days = days;
        }
        if let Some(url) = &self.api_base {
            config.api.base_url = url.clone();
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = CollectorConfig::load(cli.config.as_deref());
    let level = match &config {
        Ok(config) => config.logging.level.as_str(),
        Err(_) => "warn",
    };
    init_logging(cli.verbose, level);

    let result = match config {
        Ok(config) => run(&cli, config).await,
        Err(e) => Err(e.into()),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            match e.downcast_ref::<SpooferError>() {
                Some(err) => eprint!("{}: {}", "Error".red().bold(), CliErrorDisplay::new(err)),
                None => eprintln!("{}: {}", "Error".red().bold(), e),
            }
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: bool, level: &str) {
    let filter = if verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(filter)
        .init();
}

async fn run(cli: &Cli, mut config: CollectorConfig) -> anyhow::Result<()> {
    cli.apply_overrides(&mut config);
    config.validate()?;
    debug!(
        api_base = %config.api.base_url,
        lookback_days = config.collection.lookback_days,
        max_attempts = config.retry.max_attempts,
        "Configuration loaded"
    );

    let collector = Collector::from_config(&config)?;
    let observer = ConsoleObserver::new();

    // A fetch failure still ends in a summary and a zero exit status.
    collector.run(&observer).await?;
    Ok(())
}
