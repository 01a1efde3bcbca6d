// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/tracksense

//! TrackSense - Activity Tracking Engine
//!
//! Counts steps, jumps/dances and the loudest noise level, keeps them in a
//! durable store, and attributes activity to the songs that were playing.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use tracksense::core::{wait_until_started, EventPayload};
use tracksense::db::{keys, read_count};
use tracksense::recognition::{encode_wav, BufferCapture, FileCapture, RecognitionClient, SessionState};
use tracksense::sensors::SensorSimulator;
use tracksense::{
    build_info, AggregateView, Config, Database, EventBus, EventDetector, RecognitionSession, SharedStore,
    Tracker, TrackerError, TrackerStatus, VERSION,
};

/// TrackSense - Activity Tracking Engine
#[derive(Parser, Debug)]
#[command(name = "tracksense")]
#[command(author = "TrackSense Project")]
#[command(version = VERSION)]
#[command(about = "Step, movement and noise tracking with song-attributed activity")]
struct Args {
    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Enable trace-level logging
    #[arg(long)]
    trace: bool,

    /// Drive all trackers from simulated sensors
    #[arg(long)]
    demo: bool,

    /// Data directory (database location)
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Run the recognition proxy
    #[arg(long)]
    serve: bool,

    /// Proxy listen port
    #[arg(long)]
    port: Option<u16>,

    /// Print the stored counters and their total
    #[arg(long)]
    total: bool,

    /// Reset all activity counters to zero
    #[arg(long)]
    reset: bool,

    /// Identify the song in an audio file through the proxy
    #[arg(long, value_name = "FILE")]
    identify: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.trace {
        Level::TRACE
    } else if args.debug {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(args.debug)
        .with_line_number(args.debug)
        .with_ansi(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let build = build_info();
    info!("TrackSense v{} ({}/{})", build.version, build.os, build.target);
    debug!("Features: {:?}", build.features);

    // Load or create configuration
    let config_path = args.config.clone().unwrap_or_else(Config::default_path);
    let mut config = Config::load_or_create(&config_path)?;

    // Override with command line args
    if args.demo {
        config.demo_mode = true;
    }
    if let Some(data_dir) = args.data_dir.clone() {
        config.set_data_dir(data_dir);
    }
    if let Some(port) = args.port {
        config.proxy.port = port;
    }

    info!("Configuration loaded from {:?}", config_path);

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(run(args, config))
}

async fn run(args: Args, config: Config) -> Result<()> {
    if args.serve {
        return run_proxy(config).await;
    }
    if let Some(path) = args.identify {
        return identify_file(config, path).await;
    }

    let database = Arc::new(Database::open(&config.database)?);
    let stats = database.get_stats()?;
    debug!("Store holds {} keys ({} bytes)", stats.key_count, stats.size_bytes);
    let store: SharedStore = database;

    if args.reset {
        return reset_counters(store);
    }
    if args.total {
        println!("{} keys stored, {} bytes", stats.key_count, stats.size_bytes);
        return print_totals(store);
    }

    if !config.demo_mode {
        anyhow::bail!("No sensor backend on this platform. Use --demo to run with simulated sensors");
    }
    run_demo(config, store).await
}

fn print_totals(store: SharedStore) -> Result<()> {
    for key in keys::ACTIVITY_KEYS {
        println!("{:<20} {}", key, read_count(store.as_ref(), key)?);
    }
    let total = AggregateView::activity(store).recompute()?;
    println!("{:<20} {}", "total", total);
    Ok(())
}

fn reset_counters(store: SharedStore) -> Result<()> {
    match AggregateView::activity(store).reset_all() {
        Ok(total) => {
            info!("All counters reset (total {})", total);
            Ok(())
        }
        Err(TrackerError::PartialReset { remaining, cause, .. }) => {
            error!("Reset failed: {}", cause);
            anyhow::bail!("Not reset, retry: {}", remaining.join(", "))
        }
        Err(e) => Err(e.into()),
    }
}

async fn identify_file(config: Config, path: PathBuf) -> Result<()> {
    let store: SharedStore = Arc::new(Database::open(&config.database)?);
    let client = RecognitionClient::new(&config.recognition)?;
    let mut session = RecognitionSession::new(
        store,
        client,
        FileCapture::new(path),
        Duration::from_secs(config.recognition.reidentify_secs),
        Duration::ZERO,
        Arc::new(EventBus::default()),
    )?;

    let (_cancel_tx, mut cancel) = broadcast::channel(1);
    match session.identify(&mut cancel).await {
        SessionState::Recognized => {
            if let Some(song) = session.song() {
                println!("{}", song.display_title());
                println!("{}", song.artist_line());
                if let Some(album) = song.album_line() {
                    println!("{}", album);
                }
            }
        }
        _ => println!("{}", session.status()),
    }
    Ok(())
}

#[cfg(feature = "proxy")]
async fn run_proxy(config: Config) -> Result<()> {
    use tracksense::proxy::{ProxyServer, SignedVendor};

    let addr: SocketAddr = format!("{}:{}", config.proxy.bind_addr, config.proxy.port).parse()?;
    let vendor = SignedVendor::new(&config.proxy)?;
    let server = ProxyServer::new(Arc::new(vendor));

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let handle = tokio::spawn(async move { server.serve(addr, shutdown_rx).await });

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");
    let _ = shutdown_tx.send(());
    handle.await??;
    Ok(())
}

#[cfg(not(feature = "proxy"))]
async fn run_proxy(_config: Config) -> Result<()> {
    anyhow::bail!("Proxy feature not enabled. Build with --features proxy")
}

/// Run every tracker and the recognition session on simulated sensors
async fn run_demo(config: Config, store: SharedStore) -> Result<()> {
    let event_bus = Arc::new(EventBus::default());
    let (shutdown_tx, _) = broadcast::channel::<()>(4);

    let steps = Tracker::steps(
        store.clone(),
        Box::new(SensorSimulator::walking("sim-accel-steps", 60.0).with_gesture_probability(0.0)),
        &config.step,
        event_bus.clone(),
    )?;
    let movements = Tracker::movements(
        store.clone(),
        Box::new(SensorSimulator::walking("sim-accel-moves", 60.0).with_gesture_probability(0.01)),
        &config.gesture,
        event_bus.clone(),
    )?;
    let noise = Tracker::noise(
        store.clone(),
        Box::new(SensorSimulator::noise("sim-mic", &config.noise)),
        event_bus.clone(),
    )?;

    let mut startup = event_bus.subscribe_events();
    let steps = steps.spawn(shutdown_tx.subscribe());
    let movements = movements.spawn(shutdown_tx.subscribe());
    let noise = noise.spawn(shutdown_tx.subscribe());
    for name in ["steps", "movements", "noise"] {
        match wait_until_started(&mut startup, name).await {
            Some(TrackerStatus::Tracking) => {}
            Some(status) => warn!("{} not tracking: {}", name, status.message()),
            None => anyhow::bail!("Event bus closed during startup"),
        }
    }
    drop(startup);

    // Recognition with a synthetic recording; without a running proxy every
    // cycle ends in a status line and activity keeps accumulating
    let tone: Vec<f32> = (0..8000 * 2)
        .map(|i| (i as f32 * 440.0 * std::f32::consts::TAU / 8000.0).sin() * 0.3)
        .collect();
    let mut session = RecognitionSession::new(
        store.clone(),
        RecognitionClient::new(&config.recognition)?,
        BufferCapture::new(encode_wav(&tone, 8000)),
        Duration::from_secs(config.recognition.reidentify_secs),
        Duration::from_secs(config.recognition.recording_secs),
        event_bus.clone(),
    )?;
    let session_rx = shutdown_tx.subscribe();
    let session = tokio::spawn(async move { session.run(session_rx).await });

    // Totals follow the store's change feed
    let aggregate = AggregateView::activity(store.clone());
    let mut changes = aggregate.subscribe();
    let mut total_shutdown = shutdown_tx.subscribe();
    let total_bus = event_bus.clone();
    let totals = tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = total_shutdown.recv() => break,
                next = aggregate.next_total(&mut changes) => match next {
                    Ok(Some(total)) => total_bus.publish_total(total),
                    Ok(None) => break,
                    Err(e) => warn!("Total unavailable: {}", e),
                },
            }
        }
    });

    let mut events = event_bus.subscribe_events();
    let mut log_shutdown = shutdown_tx.subscribe();
    let printer = tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = log_shutdown.recv() => break,
                event = events.recv() => match event {
                    Ok(event) => match event.payload {
                        EventPayload::Activity { tracker, event, value } => {
                            info!("{}: {} ({})", tracker, event.kind.label(), value)
                        }
                        EventPayload::Level { tracker, max, .. } => info!("{}: new maximum {}", tracker, max),
                        EventPayload::Status { tracker, status } => info!("{}: {}", tracker, status.message()),
                        EventPayload::Total { total } => info!("Total movement: {}", total),
                        EventPayload::Recognition { message } if !message.is_empty() => info!("{}", message),
                        EventPayload::Recognition { .. } => {}
                    },
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => break,
                },
            }
        }
    });

    info!("TrackSense running on simulated sensors");
    info!("   Press Ctrl+C to shutdown");
    tokio::signal::ctrl_c().await?;

    info!("Shutdown signal received, stopping trackers...");
    let _ = shutdown_tx.send(());

    report(steps.await?);
    report(movements.await?);
    report(noise.await?);

    session.await?;
    totals.await?;
    printer.await?;

    info!("Total movement: {}", AggregateView::activity(store).recompute()?);
    info!("TrackSense shutdown complete");
    Ok(())
}

fn report<D: EventDetector>((tracker, status): (Tracker<D>, TrackerStatus)) {
    info!(
        "{} {} ({} = {})",
        tracker.name(),
        status.message(),
        tracker.accumulator().key(),
        tracker.accumulator().current_value()
    );
}
