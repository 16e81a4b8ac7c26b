use clap::{Parser, Subcommand};
use std::process::ExitCode;

use iss_spotter::predict::Observer;
use iss_spotter::{Config, Snapshot, Spotter};

#[derive(Parser)]
#[command(name = "iss-spotter")]
#[command(about = "Naked-eye ISS sighting predictor")]
struct Cli {
    /// YAML configuration file; defaults are used when omitted
    #[arg(short, long)]
    config: Option<String>,
    /// Observer location as "lat, lon", overriding the config file
    #[arg(long)]
    observer: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate the configuration and print the effective settings
    Check,
    /// Run one poll cycle and print the snapshot as JSON
    Poll,
    /// Poll every `poll_interval` until interrupted
    Watch,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let config = match load_config(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match cli.command {
        Commands::Check => check(&config),
        Commands::Poll => run(config, false),
        Commands::Watch => run(config, true),
    }
}

fn load_config(cli: &Cli) -> Result<Config, String> {
    let mut config = match &cli.config {
        Some(path) => Config::from_file(path).map_err(|e| format!("{}: {}", path, e))?,
        None => Config::default(),
    };
    if let Some(coordinates) = &cli.observer {
        config.observer = Observer::from_coordinates(coordinates)
            .ok_or_else(|| format!("invalid observer coordinates '{}'", coordinates))?;
    }
    config.validate().map_err(|e| e.to_string())?;
    Ok(config)
}

fn check(config: &Config) -> ExitCode {
    println!("Configuration is valid");
    println!(
        "  observer: {:.4}, {:.4}",
        config.observer.latitude, config.observer.longitude
    );
    println!("  target: {}", config.target);
    println!(
        "  elements: {} (cached at {}, ttl {} days)",
        config.tle_url,
        config.tle_cache_path.display(),
        config.tle_ttl_days
    );
    println!(
        "  roster: {} (craft {})",
        config.roster_url, config.roster_craft
    );
    println!(
        "  sightings: >= {}°, >= {} min, sun <= {}°, {} days ahead",
        config.min_elevation_deg,
        config.min_duration_minutes,
        config.darkness_threshold_deg,
        config.look_ahead_days
    );
    println!(
        "  poll every {}, grace {}",
        humantime::format_duration(config.poll_interval),
        humantime::format_duration(config.grace_period)
    );
    ExitCode::SUCCESS
}

fn run(config: Config, watch: bool) -> ExitCode {
    let mut spotter = match Spotter::initialize(config) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Failed to initialize: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Failed to start runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let available = runtime.block_on(async {
        if !watch {
            let snapshot = spotter.poll().await;
            print_snapshot(&snapshot);
            return snapshot.available;
        }

        let mut interval = tokio::time::interval(spotter.config().poll_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let snapshot = spotter.poll().await;
                    print_snapshot(&snapshot);
                }
                _ = tokio::signal::ctrl_c() => {
                    log::info!("Interrupted");
                    return true;
                }
            }
        }
    });

    // The blocking HTTP client must be dropped outside the runtime.
    drop(runtime);
    spotter.shutdown();

    if available {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn print_snapshot(snapshot: &Snapshot) {
    match serde_json::to_string_pretty(snapshot) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Failed to serialize snapshot: {}", e),
    }
}
