//! HERGuard CLI - offline drills and tooling for the HERGuard safety core.
//!
//! Runs the SOS controller end to end against simulated transports, lists
//! the nearest safe zones for a coordinate, and validates guardian files.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use herguard_core::audit::AuditStore;
use herguard_core::dispatch::{ChannelTransport, FlakyTransport, NotificationDispatcher, SimulatedTransport};
use herguard_core::guardians::GuardianRegistry;
use herguard_core::models::{Channel, Guardian, GuardianStatus, Relationship, ZoneCategory};
use herguard_core::sos::{CancelOutcome, FixedLocation, SosController, SosState};
use herguard_core::utils::{format_distance, truncate_string};
use herguard_core::zones::{bundled_zones, SafeZoneRegistry};
use herguard_core::{Config, GeoPoint};

// ============================================================================
// Constants
// ============================================================================

/// Default drill position: central Dhaka
const DEFAULT_LATITUDE: f64 = 23.8103;
const DEFAULT_LONGITUDE: f64 = 90.4125;

/// Column width for zone descriptions
const DESCRIPTION_WIDTH: usize = 48;

#[derive(Parser)]
#[command(name = "herguard")]
#[command(version)]
#[command(about = "HERGuard safety core - SOS drills, safe zones and guardians", long_about = None)]
struct Cli {
    /// Configuration file path (overrides HERGUARD_CONFIG)
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Also write logs to this file
    #[arg(long, value_name = "FILE", global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the safe zones nearest to a position
    Zones {
        #[arg(long, allow_hyphen_values = true, requires = "lon")]
        lat: Option<f64>,

        #[arg(long, allow_hyphen_values = true, requires = "lat")]
        lon: Option<f64>,

        /// Number of zones to show
        #[arg(short, default_value_t = 5)]
        k: usize,

        /// Only zones of this category (police, medical, public_space, ...)
        #[arg(long)]
        category: Option<ZoneCategory>,

        /// List every zone within this radius instead of the nearest k
        #[arg(long)]
        radius_km: Option<f64>,
    },

    /// Run an SOS episode end to end against simulated transports
    Drill {
        /// Countdown length in seconds (defaults to the configured value)
        #[arg(long)]
        countdown: Option<u64>,

        /// Cancel the countdown after this many seconds
        #[arg(long)]
        cancel_after: Option<u64>,

        /// Probability in [0, 1] that a simulated send fails
        #[arg(long, default_value_t = 0.0)]
        fail_rate: f64,

        /// Send a test alert instead of arming
        #[arg(long)]
        test: bool,

        #[arg(long, allow_hyphen_values = true, requires = "lon")]
        lat: Option<f64>,

        #[arg(long, allow_hyphen_values = true, requires = "lat")]
        lon: Option<f64>,
    },

    /// Validate and list a guardian file
    Guardians {
        file: PathBuf,
    },

    /// Show the configuration, or write the defaults with --init
    Config {
        #[arg(long)]
        init: bool,
    },
}

/// Initialize the tracing subscriber for logging.
///
/// The returned guard flushes the log file on drop and must live until exit.
fn init_tracing(log_file: Option<&Path>) -> Result<Option<WorkerGuard>> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let stderr_layer = fmt::layer().with_writer(io::stderr);

    let Some(path) = log_file else {
        tracing_subscriber::registry()
            .with(stderr_layer)
            .with(filter)
            .init();
        return Ok(None);
    };

    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let file_name = path
        .file_name()
        .ok_or_else(|| anyhow!("Invalid log file path: {}", path.display()))?;
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create log directory: {}", dir.display()))?;

    let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::never(dir, file_name));
    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(fmt::layer().with_ansi(false).with_writer(writer))
        .with(filter)
        .init();
    Ok(Some(guard))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let _log_guard = init_tracing(cli.log_file.as_deref())?;

    let config = match cli.config {
        // `config --init` may target a file that does not exist yet
        Some(ref path) if !path.exists() && matches!(cli.command, Commands::Config { .. }) => {
            Config::default()
        }
        Some(ref path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    match cli.command {
        Commands::Zones {
            lat,
            lon,
            k,
            category,
            radius_km,
        } => list_zones(&config, position(lat, lon)?, k, category, radius_km),
        Commands::Drill {
            countdown,
            cancel_after,
            fail_rate,
            test,
            lat,
            lon,
        } => {
            let drill = DrillOptions {
                countdown,
                cancel_after,
                fail_rate,
                test,
                origin: position(lat, lon)?,
            };
            run_drill(config, drill).await
        }
        Commands::Guardians { file } => list_guardians(&file),
        Commands::Config { init } => show_config(&config, cli.config.as_deref(), init),
    }
}

fn position(lat: Option<f64>, lon: Option<f64>) -> Result<GeoPoint> {
    let point = GeoPoint::new(
        lat.unwrap_or(DEFAULT_LATITUDE),
        lon.unwrap_or(DEFAULT_LONGITUDE),
    )?;
    Ok(point)
}

fn load_zones(config: &Config) -> Result<SafeZoneRegistry> {
    let registry = SafeZoneRegistry::new();
    match config.zones_file {
        Some(ref path) => {
            let count = registry.load_from_file(path)?;
            info!(count, path = %path.display(), "Loaded safe zone catalog");
        }
        None => registry.load(bundled_zones()?),
    }
    Ok(registry)
}

// ============================================================================
// Commands
// ============================================================================

fn list_zones(
    config: &Config,
    origin: GeoPoint,
    k: usize,
    category: Option<ZoneCategory>,
    radius_km: Option<f64>,
) -> Result<()> {
    let registry = load_zones(config)?;

    let mut suggestions = match (radius_km, category) {
        (Some(radius), _) => registry.within(&origin, radius),
        (None, Some(category)) => registry.nearest_in(&origin, k, &[category]),
        (None, None) => registry.nearest(&origin, k),
    };
    if let (Some(_), Some(category)) = (radius_km, category) {
        suggestions.retain(|s| s.zone.category == category);
    }

    if suggestions.is_empty() {
        println!("No safe zones found");
        return Ok(());
    }

    for (i, suggestion) in suggestions.iter().enumerate() {
        let zone = &suggestion.zone;
        println!(
            "{:>2}. {:<45} {:<18} {:>8}  {}",
            i + 1,
            zone.name,
            zone.kind_display(),
            format_distance(suggestion.distance_km),
            zone.emergency_number.as_deref().unwrap_or("-"),
        );
        if let Some(ref description) = zone.description {
            println!("    {}", truncate_string(description, DESCRIPTION_WIDTH));
        }
        println!("    {}", zone.location.directions_url());
    }
    Ok(())
}

struct DrillOptions {
    countdown: Option<u64>,
    cancel_after: Option<u64>,
    fail_rate: f64,
    test: bool,
    origin: GeoPoint,
}

/// Guardians used when no guardian file is configured
fn demo_guardians() -> Vec<Guardian> {
    let all = [Channel::Push, Channel::Sms, Channel::Voice];
    vec![
        Guardian::new("mom", "Mom", "+8801712345678", all, Relationship::Family),
        Guardian::new("best-friend", "Best Friend", "+8801812345678", [Channel::Push, Channel::Sms], Relationship::Friend),
        Guardian::new("husband", "Husband", "+8801912345678", [Channel::Sms, Channel::Voice], Relationship::Family),
    ]
    .into_iter()
    .map(|g| g.with_status(GuardianStatus::Active))
    .collect()
}

async fn run_drill(mut config: Config, drill: DrillOptions) -> Result<()> {
    if let Some(countdown) = drill.countdown {
        config.sos.countdown_secs = countdown;
    }
    config.validate()?;

    let zones = Arc::new(load_zones(&config)?);

    let guardians = Arc::new(GuardianRegistry::new());
    match config.guardians_file {
        Some(ref path) => {
            guardians.load_from_file(path)?;
        }
        None => {
            for guardian in demo_guardians() {
                guardians.add(guardian)?;
            }
        }
    }

    let transport: Arc<dyn ChannelTransport> = if drill.fail_rate > 0.0 {
        Arc::new(FlakyTransport::new(drill.fail_rate).with_latency(Duration::from_millis(200)))
    } else {
        Arc::new(SimulatedTransport::new().with_latency(Duration::from_millis(200)))
    };
    let mut dispatcher = NotificationDispatcher::new(config.dispatch.settings());
    for channel in [Channel::Push, Channel::Sms, Channel::Voice] {
        dispatcher = dispatcher.with_transport(channel, Arc::clone(&transport));
    }

    let mut builder = SosController::builder(config.sos.clone(), Arc::new(dispatcher))
        .zones(zones)
        .guardians(guardians)
        .location_provider(Arc::new(FixedLocation::new(drill.origin)));
    if config.audit_dir.is_some() {
        builder = builder.audit_store(AuditStore::new(config.audit_dir()?)?);
    }
    let controller = builder.build();

    if drill.test {
        let report = controller.test_alert().await?;
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let mut updates = controller.subscribe();
    let printer = tokio::spawn(async move {
        while updates.changed().await.is_ok() {
            let session = updates.borrow_and_update().clone();
            match session.state {
                SosState::Armed => {
                    println!("[armed] {}s remaining", session.remaining_secs.unwrap_or(0));
                }
                SosState::Resolved => {
                    println!("[resolved]");
                    break;
                }
                SosState::Idle => {
                    println!("[idle] {}", session.cancel_reason.unwrap_or_default());
                    break;
                }
                SosState::Dispatching => {
                    if session.alert.is_some() {
                        println!("[dispatching] alert created");
                    } else {
                        println!("[dispatching]");
                    }
                }
            }
        }
    });

    controller.arm()?;

    if let Some(after) = drill.cancel_after {
        tokio::time::sleep(Duration::from_secs(after)).await;
        match controller.cancel("drill cancelled") {
            Ok(CancelOutcome::Cancelled) => {
                let _ = printer.await;
                println!("Countdown cancelled, no alert sent");
                return Ok(());
            }
            Ok(CancelOutcome::NotArmed) => println!("Nothing to cancel"),
            Err(e) => println!("Cancel refused: {}", e),
        }
    }

    let report = controller
        .wait_resolved()
        .await
        .ok_or_else(|| anyhow!("Session ended without dispatching"))?;
    let _ = printer.await;

    if let Some(alert) = controller.current_state().alert {
        println!("\n{}\n", alert.message());
    }
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn list_guardians(file: &Path) -> Result<()> {
    let registry = GuardianRegistry::new();
    let count = registry.load_from_file(file)?;
    println!("{} guardian(s), {} active", count, registry.active_guardians().len());

    for guardian in registry.list() {
        let channels: Vec<String> = guardian.channels_by_priority().map(|c| c.to_string()).collect();
        println!(
            "  {:<20} {:<18} {:<8} {}",
            guardian.name,
            guardian.display_phone(),
            guardian.status.to_string(),
            channels.join(" > "),
        );
    }
    Ok(())
}

fn show_config(config: &Config, explicit_path: Option<&Path>, init: bool) -> Result<()> {
    let path = match explicit_path {
        Some(path) => path.to_path_buf(),
        None => Config::config_path()?,
    };

    if init {
        if path.exists() {
            println!("Config already exists at {}", path.display());
            return Ok(());
        }
        Config::default().save_to(&path)?;
        println!("Wrote default config to {}", path.display());
        return Ok(());
    }

    println!("# {}", path.display());
    println!("{}", serde_json::to_string_pretty(config)?);
    Ok(())
}
