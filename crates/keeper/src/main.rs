use std::time::Duration;

use clap::Parser;
use tokio::time;

use aegis_keeper::{KeeperConfig, KeeperResult, Rehearsal};

#[derive(Parser, Debug)]
#[command(name = "aegis-keeper")]
#[command(about = "Aegis allocation engine rehearsal and operations service")]
struct Args {
    /// Path to rehearsal configuration file
    #[arg(short, long, default_value = "aegis.toml")]
    config: String,

    /// Number of ticks to run; 0 runs until interrupted
    #[arg(short, long, default_value = "24")]
    ticks: u64,

    /// Wall-clock seconds between ticks
    #[arg(short, long, default_value = "1")]
    interval: u64,

    /// Replace the scripted oracle feed with a random score walk
    #[arg(long)]
    drift: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> KeeperResult<()> {
    let args = Args::parse();

    // Initialize logging
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(if args.verbose { "debug" } else { "info" }),
    )
    .init();

    log::info!("Starting Aegis keeper");
    log::info!("Config: {}", args.config);
    log::info!("Tick interval: {}s", args.interval);

    if args.drift {
        log::warn!("Running in drift mode - scripted feed replaced by a random score walk");
    }

    // Load configuration
    let config = KeeperConfig::load(&args.config)?;

    log::info!(
        "Loaded configuration for {} venues and {} depositors",
        config.venues.len(),
        config.depositors.len()
    );

    let mut rehearsal = Rehearsal::new(config, args.drift)?;

    log::info!("Rehearsal initialized successfully");

    // Start main tick loop
    let mut interval_timer = time::interval(Duration::from_secs(args.interval));
    let mut iteration = 0u64;

    loop {
        interval_timer.tick().await;
        iteration += 1;

        log::debug!("Starting keeper iteration {}", iteration);

        match rehearsal.run_tick() {
            Ok(actions) => {
                if actions > 0 {
                    log::info!("Iteration {}: {} engine actions", iteration, actions);
                } else {
                    log::debug!("Iteration {}: no engine actions due", iteration);
                }
            }
            Err(e) => {
                log::error!("Error in keeper iteration {}: {}", iteration, e);
                // Continue running even if individual iterations fail
            }
        }

        // Basic health metrics every 100 iterations
        if iteration % 100 == 0 {
            log::info!("Keeper health check - iteration {}", iteration);
            if let Err(e) = rehearsal.health_check() {
                log::warn!("Health check warning: {}", e);
            }
        }

        if args.ticks > 0 && iteration >= args.ticks {
            break;
        }
    }

    // Exit report: totals, allocation against target, shield history
    let summary = rehearsal.summary()?;
    log::info!(
        "Rehearsal complete after {} ticks: {} total assets ({} idle), {} shares outstanding",
        summary.stats.ticks,
        summary.total_assets,
        summary.idle,
        summary.total_shares
    );
    for venue in &summary.venues {
        log::info!(
            "  {}: target {} bps, actual {} bps, tracked {}, true balance {}, threat {:?}",
            venue.name,
            venue.target_weight_bps,
            venue.actual_weight_bps,
            venue.tracked,
            venue.true_balance,
            venue.threat_level
        );
    }
    for action in &summary.shield_actions {
        log::info!(
            "  shield: pulled {} from {} at {:?}: {}",
            action.amount_moved,
            action.venue,
            action.threat_level,
            action.reason
        );
    }
    match serde_json::to_string(&summary) {
        Ok(line) => println!("{}", line),
        Err(e) => log::error!("failed to serialize run summary: {}", e),
    }

    Ok(())
}
