use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use tokio::sync::broadcast;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use tempus_completion::calculate::aggregate_map_result_stats;
use tempus_completion::config::AppConfig;
use tempus_completion::fetch::Fetcher;
use tempus_completion::models::{filter_top_times, Class, PlayerId, ZoneKind};
use tempus_completion::parse_duration;
use tempus_completion::storage::{JsonlStore, MemoryStore, ResultFilter, Store};
use tempus_completion::sync::records::{RecordsClient, RecordsSource};
use tempus_completion::sync::Scheduler;

#[derive(Parser)]
#[command(name = "completion-fetcher")]
#[command(about = "Tracks Tempus zone completion and derives tiered progress statistics")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(long, default_value = "./completion.toml")]
    config: PathBuf,

    /// Data directory path (overrides the config file)
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(long)]
    log_level: Option<String>,

    /// Output logs as JSON
    #[arg(long)]
    json_logs: bool,

    /// Keep all tables in memory and write nothing to disk
    #[arg(long)]
    ephemeral: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the refresh loop until interrupted
    Run {
        /// Idle interval override (e.g., "60s", "5m")
        #[arg(long)]
        interval: Option<String>,
    },

    /// Run a single refresh iteration and exit
    Once,

    /// Refresh the map catalog and zone universe
    UpdateMaps,

    /// Fetch one player's state on every zone of a map
    RefreshPlayerMap {
        #[arg(long)]
        player_id: PlayerId,

        #[arg(long)]
        map_id: u64,
    },

    /// Print a player's completion report as JSON
    Report {
        /// Tempus player ID
        #[arg(long, conflicts_with = "steam_id", required_unless_present = "steam_id")]
        player_id: Option<PlayerId>,

        /// Steam ID (e.g. STEAM_0:1:12345), resolved through stored mappings
        #[arg(long)]
        steam_id: Option<String>,

        /// Count finished zones but leave them out of the listing
        #[arg(long)]
        hide_completed: bool,

        /// Only include results ranked in the top 10
        #[arg(long)]
        top_times_only: bool,

        /// Zone kinds to include (map, course, bonus, trick)
        #[arg(long = "kind", value_delimiter = ',')]
        kinds: Vec<ZoneKind>,

        /// Tiers to include
        #[arg(long = "tier", value_delimiter = ',', value_parser = clap::value_parser!(u8).range(1..=6))]
        tiers: Vec<u8>,

        /// Classes to include (soldier, demoman)
        #[arg(long = "class", value_delimiter = ',')]
        classes: Vec<Class>,
    },

    /// Search the records service for players and maps by name
    Search { name: String },

    /// Write a default configuration file
    InitConfig {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Commands::InitConfig { force } = cli.command {
        if cli.config.exists() && !force {
            bail!(
                "{} already exists, pass --force to overwrite",
                cli.config.display()
            );
        }
        AppConfig::write_default(&cli.config)?;
        println!("Wrote default configuration to {}", cli.config.display());
        return Ok(());
    }

    let mut config = AppConfig::load(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    if let Some(data_dir) = cli.data_dir.clone() {
        config.data_dir = data_dir;
    }
    let log_level = cli.log_level.clone().unwrap_or_else(|| config.log_level.clone());

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(cli.json_logs.then(|| fmt::layer().json()))
        .with((!cli.json_logs).then(fmt::layer))
        .init();

    tracing::info!("Starting completion-fetcher v{}", env!("CARGO_PKG_VERSION"));

    let store: Arc<dyn Store> = if cli.ephemeral {
        tracing::info!("Using in-memory storage");
        Arc::new(MemoryStore::new())
    } else {
        tracing::info!("Using data directory {}", config.data_dir.display());
        Arc::new(JsonlStore::open(config.storage_config())?)
    };

    let fetcher = Fetcher::new(config.fetcher_config())?;
    let source: Arc<dyn RecordsSource> =
        Arc::new(RecordsClient::new(fetcher, &config.api.base_url));

    match cli.command {
        Commands::Run { interval } => {
            let mut scheduler_config = config.scheduler_config();
            if let Some(interval) = interval {
                scheduler_config.interval = parse_duration(&interval)
                    .with_context(|| format!("invalid --interval: {}", interval))?;
            }

            let scheduler = Arc::new(
                Scheduler::load(scheduler_config, source, store, config.pipeline()).await?,
            );

            let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
            let mut handle = tokio::spawn(scheduler.run_periodic(shutdown_rx));

            tokio::select! {
                finished = &mut handle => {
                    finished?.context("scheduler stopped")?;
                }
                signal = shutdown_signal() => {
                    signal?;
                    tracing::info!("Shutdown requested, finishing current iteration");
                    let _ = shutdown_tx.send(());
                    handle.await??;
                }
            }
        }

        Commands::Once => {
            let scheduler = Scheduler::load(
                config.scheduler_config(),
                source,
                store,
                config.pipeline(),
            )
            .await?;

            let state = scheduler.run_iteration(Utc::now()).await?;
            println!("{:?}", state);
        }

        Commands::UpdateMaps => {
            let scheduler = Scheduler::load(
                config.scheduler_config(),
                source,
                store,
                config.pipeline(),
            )
            .await?;

            let maps = scheduler.update_maps(Utc::now()).await?;
            println!("Catalog holds {} maps", maps);
        }

        Commands::RefreshPlayerMap { player_id, map_id } => {
            let scheduler = Scheduler::load(
                config.scheduler_config(),
                source,
                store,
                config.pipeline(),
            )
            .await?;

            let stored = scheduler
                .refresh_player_map(player_id, map_id, Utc::now())
                .await?;
            println!(
                "Stored {} results for player {} on map {}",
                stored, player_id, map_id
            );
        }

        Commands::Report {
            player_id,
            steam_id,
            hide_completed,
            top_times_only,
            kinds,
            tiers,
            classes,
        } => {
            let player_id = match (player_id, steam_id) {
                (Some(id), _) => id,
                (None, Some(steam_id)) => store
                    .get_player_by_steam_id(&steam_id)
                    .await?
                    .with_context(|| format!("no player known for {}", steam_id))?,
                (None, None) => bail!("either --player-id or --steam-id is required"),
            };

            let filter = ResultFilter {
                kinds,
                tiers,
                classes,
            };
            let mut results = store
                .get_player_class_zone_results(player_id, &filter)
                .await?;
            if top_times_only {
                filter_top_times(&mut results);
            }

            let report = aggregate_map_result_stats(results, hide_completed)?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }

        Commands::Search { name } => {
            let found = source.search_players_and_maps(&name).await?;

            for player in &found.players {
                println!("player {:>8}  {}  {}", player.id, player.steamid, player.name);
            }
            for map in &found.maps {
                println!("map    {:>8}  {}", map.id, map.name);
            }
        }

        // handled before the config is loaded
        Commands::InitConfig { .. } => {}
    }

    Ok(())
}

/// Resolves on Ctrl-C, and on SIGTERM or SIGQUIT where those exist.
#[cfg(unix)]
async fn shutdown_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = signal(SignalKind::terminate())?;
    let mut quit = signal(SignalKind::quit())?;

    tokio::select! {
        result = tokio::signal::ctrl_c() => result,
        _ = terminate.recv() => Ok(()),
        _ = quit.recv() => Ok(()),
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}
