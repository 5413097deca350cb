//! feederd: pet feeder command-and-control daemon.
//!
//! Wires the bus, scheduler, command router and peripheral services
//! together, runs them as tasks, and coordinates shutdown: a termination
//! signal cancels the long-running loops at their next suspension point,
//! peripheral tasks are aborted, and the bus is torn down last.

mod router;
mod telemetry;
mod water;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use feeder_bus::Bus;
use feeder_config::Settings;
use feeder_hw::{
    ClimateSensor, Feeder, MockClimateSensor, MockServo, MockWaterSensor, WaterLevelSensor,
};
use feeder_sched::{Job, JobStore, Scheduler};

use crate::router::CommandRouter;
use crate::telemetry::TelemetryService;
use crate::water::WaterLevelService;

#[derive(Parser)]
#[command(name = "feederd", about = "Pet feeder command-and-control daemon")]
struct Cli {
    /// Settings file (defaults to config/settings.local.toml, then
    /// config/settings.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the feeder daemon
    Run,
    /// Dispense one small portion and exit (bench test)
    Feed,
    /// Print the stored schedules
    Schedules,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let settings = feeder_config::load_settings(cli.config.as_deref())?;

    match cli.command {
        Commands::Run => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(run_daemon(settings))
        }
        Commands::Feed => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(async {
                let feeder = Feeder::new(build_servo(&settings));
                feeder.dispense_small().await
            })
        }
        Commands::Schedules => {
            let store = JobStore::new(&settings.schedule_path);
            let jobs: Vec<Job> = store.load()?;
            println!("{}", serde_json::to_string_pretty(&jobs)?);
            Ok(())
        }
    }
}

async fn run_daemon(settings: Settings) -> anyhow::Result<()> {
    info!("Starting feederd for device {}", settings.device.id);

    let bus = Arc::new(Bus::from_settings(&settings.bus));
    bus.start().await;

    let scheduler = Arc::new(Scheduler::new(JobStore::new(&settings.schedule_path)));
    scheduler.load().await.context("loading schedule store")?;

    let feeder = Arc::new(Feeder::new(build_servo(&settings)));
    let router = Arc::new(CommandRouter::new(
        bus.clone(),
        scheduler.clone(),
        feeder.clone(),
    ));
    let telemetry = TelemetryService::new(&settings, bus.clone(), build_climate(&settings));
    let water = WaterLevelService::new(&settings, bus.clone(), build_water(&settings));

    let cancel = CancellationToken::new();

    let sched_task = tokio::spawn({
        let scheduler = scheduler.clone();
        let router = router.clone();
        let cancel = cancel.clone();
        async move {
            scheduler
                .run(cancel, move |job: Job| {
                    let router = router.clone();
                    async move { router.on_fire(job).await }
                })
                .await;
        }
    });
    let router_task = tokio::spawn({
        let router = router.clone();
        let cancel = cancel.clone();
        async move { router.run(cancel).await }
    });
    let telemetry_task = tokio::spawn({
        let cancel = cancel.clone();
        async move { telemetry.run(cancel).await }
    });
    let water_task = tokio::spawn({
        let cancel = cancel.clone();
        async move { water.run(cancel).await }
    });

    wait_for_shutdown().await;
    info!("Shutdown signal received");
    cancel.cancel();

    // Peripheral services are best-effort; don't wait on their loops.
    telemetry_task.abort();
    water_task.abort();
    let _ = sched_task.await;
    let _ = router_task.await;

    bus.stop().await;
    info!("feederd stopped");
    Ok(())
}

fn build_servo(settings: &Settings) -> Arc<MockServo> {
    if !settings.device.mock_mode {
        warn!("No hardware servo driver in this build; using mock");
    }
    Arc::new(MockServo::new(settings.pins.servo_feed))
}

fn build_climate(settings: &Settings) -> Arc<dyn ClimateSensor> {
    if !settings.device.mock_mode {
        warn!("No hardware climate driver in this build; using mock");
    }
    Arc::new(MockClimateSensor)
}

fn build_water(settings: &Settings) -> Arc<dyn WaterLevelSensor> {
    let cfg = &settings.sensors.water_level;
    if !settings.device.mock_mode && cfg.enabled {
        warn!("No hardware ADC driver in this build; using mock");
    }
    Arc::new(MockWaterSensor::new(cfg.min_adc, cfg.max_adc))
}

#[cfg(unix)]
async fn wait_for_shutdown() {
    use tokio::signal::unix::{SignalKind, signal};

    match signal(SignalKind::terminate()) {
        Ok(mut term) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = term.recv() => {}
            }
        }
        Err(e) => {
            warn!("SIGTERM handler unavailable: {e}");
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown() {
    let _ = tokio::signal::ctrl_c().await;
}
