use anyhow::{Context, Result};
use clap::Parser;
use reelvault_simulator::{run_simulation, Config, ValidatedConfig};
use reelvault_types::Catalog;
use std::path::PathBuf;
use tracing::{info, Level};

#[derive(Parser, Debug)]
#[command(author, version, about = "Drive simulated players against the reelvault engine")]
struct Args {
    /// YAML simulator config (defaults apply when omitted).
    #[arg(long)]
    config: Option<PathBuf>,

    /// YAML catalog; overrides `catalog_path` from the config.
    #[arg(long)]
    catalog: Option<PathBuf>,

    #[arg(long)]
    players: Option<usize>,

    #[arg(long)]
    rounds: Option<usize>,

    #[arg(long)]
    seed: Option<u64>,

    /// Validate the config and catalog, then exit.
    #[arg(long, default_value_t = false)]
    dry_run: bool,
}

fn init_tracing(level: Level, json: bool) {
    let builder = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn build_config(args: &Args) -> Result<ValidatedConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Could not read config file {}", path.display()))?;
            serde_yaml::from_str::<Config>(&contents).context("Could not parse config file")?
        }
        None => Config::default(),
    };
    if let Some(players) = args.players {
        config.players = players;
    }
    if let Some(rounds) = args.rounds {
        config.rounds = rounds;
    }
    if let Some(seed) = args.seed {
        config.seed = seed;
    }

    let catalog_path = args
        .catalog
        .clone()
        .or_else(|| config.catalog_path.as_ref().map(PathBuf::from));
    let catalog = match catalog_path {
        Some(path) => {
            let contents = std::fs::read_to_string(&path)
                .with_context(|| format!("Could not read catalog file {}", path.display()))?;
            Catalog::from_yaml(&contents).context("Invalid catalog")?
        }
        None => Catalog::standard(),
    };
    Ok(config.validate(catalog)?)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = build_config(&args)?;
    init_tracing(config.log_level, config.json_logs);

    if args.dry_run {
        info!(
            players = config.players,
            rounds = config.rounds,
            machine_types = config.catalog.machine_types.len(),
            assets = config.prices.len(),
            "config ok"
        );
        return Ok(());
    }

    let report = run_simulation(&config).await?;
    println!(
        "{}",
        serde_json::to_string_pretty(&report).context("Could not encode report")?
    );
    if report.violations > 0 {
        anyhow::bail!("{} account(s) failed the conservation check", report.violations);
    }
    Ok(())
}
