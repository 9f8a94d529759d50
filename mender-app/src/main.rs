use anyhow::Result;
use clap::{Args, Parser, Subcommand, ValueEnum};
use mender_common::observability::{LogConfig, init_logging};
use mender_common::{ExecutionStrategy, MenderConfig};
use mender_config::{MenderConfigLoader, render_yaml};
use mender_core::{to_engine_format, to_native_format};
use std::path::PathBuf;
use wiring::{CacheAction, LocateJob, run_cache, run_locate};
mod wiring;

#[derive(Parser, Debug)]
#[command(name = "mender", version, about = "Self-healing UI element locator")]
struct Cli {
    /// Config file. Without it the user config dir and ./mender.yaml are tried.
    #[arg(long, short, global = true, env = "MENDER_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Open a page and resolve one element, healing the selector if needed.
    Locate(LocateArgs),
    /// Convert between native locator expressions and engine selectors.
    Translate {
        #[arg(long, value_enum, default_value_t = Direction::Engine)]
        to: Direction,
        expression: String,
    },
    /// Inspect or maintain the selector cache.
    Cache {
        #[command(subcommand)]
        action: CacheCommand,
    },
    /// Print the effective configuration with secrets masked.
    Config,
}

#[derive(Args, Debug)]
struct LocateArgs {
    #[arg(long)]
    url: String,
    /// Native expression or raw CSS/XPath selector.
    #[arg(long)]
    selector: String,
    /// What the element is, e.g. "Username input field".
    #[arg(long)]
    description: String,
    #[arg(long, value_enum)]
    strategy: Option<StrategyArg>,
    /// Fail instead of picking among several matches.
    #[arg(long)]
    strict: bool,
    #[arg(long)]
    no_cache: bool,
    #[arg(long)]
    timeout_ms: Option<u64>,
}

#[derive(Subcommand, Debug)]
enum CacheCommand {
    Stats,
    Clear,
    /// Drop entries older than the configured TTL.
    Evict,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Direction {
    Engine,
    Native,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum StrategyArg {
    DomOnly,
    VisualFirst,
    SmartSequential,
    Sequential,
    Parallel,
}

impl From<StrategyArg> for ExecutionStrategy {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::DomOnly => Self::DomOnly,
            StrategyArg::VisualFirst => Self::VisualFirst,
            StrategyArg::SmartSequential => Self::SmartSequential,
            StrategyArg::Sequential => Self::Sequential,
            StrategyArg::Parallel => Self::Parallel,
        }
    }
}

fn load_config(path: Option<&PathBuf>) -> Result<MenderConfig> {
    let loader = match path {
        Some(path) => MenderConfigLoader::new().with_file(path),
        None => MenderConfigLoader::discover(),
    };
    Ok(loader.load()?)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Translation needs neither config nor logging.
    if let Command::Translate { to, expression } = &cli.command {
        let out = match to {
            Direction::Engine => to_engine_format(expression),
            Direction::Native => to_native_format(expression),
        };
        println!("{out}");
        return Ok(());
    }

    // 1) Load config (env wins)
    let mut cfg = load_config(cli.config.as_ref())?;
    let log_path = init_logging(LogConfig::from_settings("mender", &cfg.logging))?;
    tracing::debug!(log = %log_path.display(), "mender.start");

    match cli.command {
        Command::Locate(args) => {
            if let Some(strategy) = args.strategy {
                cfg.strategy = strategy.into();
            }
            let mut options = cfg.locator.clone();
            options.strict_mode |= args.strict;
            if args.no_cache {
                options.enable_caching = false;
            }
            if let Some(timeout_ms) = args.timeout_ms {
                options.timeout_ms = timeout_ms;
            }
            let job = LocateJob {
                url: args.url,
                selector: args.selector,
                description: args.description,
                options,
            };
            let report = run_locate(&cfg, job).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Cache { action } => {
            let action = match action {
                CacheCommand::Stats => CacheAction::Stats,
                CacheCommand::Clear => CacheAction::Clear,
                CacheCommand::Evict => CacheAction::Evict,
            };
            let metrics = run_cache(&cfg, action).await?;
            println!("{}", serde_json::to_string_pretty(&metrics)?);
        }
        Command::Config => print!("{}", render_yaml(&cfg)?),
        Command::Translate { .. } => {}
    }
    Ok(())
}
