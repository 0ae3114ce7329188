//! # Quake Drive
//!
//! Linear actuator drive controller over the simulated rig.
//!
//! Two execution contexts run side by side: the ingestion loop reads the
//! line protocol from stdin on the main thread, the dispatcher executes
//! motion on a worker thread. They share only the command channel, the
//! urgent slot and the stop flag.
//!
//! Startup order: handshake on stdin/stdout, then a homing run to
//! establish absolute position, then the command loop.

use clap::Parser;
use quake_common::config::DriveConfig;
use quake_drive::command::dispatcher::Dispatcher;
use quake_drive::context::DriveContext;
use quake_drive::hal::sim::SimRig;
use quake_drive::ingest::Ingestor;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{error, info, warn, Level};
use tracing_subscriber::EnvFilter;

/// Quake Drive — linear actuator drive controller
#[derive(Parser, Debug)]
#[command(name = "quake_drive")]
#[command(version)]
#[command(about = "Trapezoidal-profile stepper drive with homing and urgent preemption")]
struct Args {
    /// Path to the drive configuration TOML. Defaults apply when omitted.
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Back limit position of the simulated rig [steps].
    #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
    back_limit: i64,

    /// Front limit position of the simulated rig [steps].
    #[arg(long, default_value_t = 100_000)]
    front_limit: i64,

    /// Starting carriage position of the simulated rig [steps].
    #[arg(long, default_value_t = 1_000, allow_hyphen_values = true)]
    start_position: i64,

    /// Skip the stdin handshake and the startup homing run.
    #[arg(long)]
    skip_handshake: bool,

    /// Enable verbose logging (DEBUG level).
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format.
    #[arg(long)]
    json: bool,
}

fn main() {
    let args = Args::parse();
    setup_tracing(&args);

    info!("Quake Drive v{} starting...", env!("CARGO_PKG_VERSION"));

    if let Err(e) = run(&args) {
        error!("FATAL: {e}");
        process::exit(1);
    }

    info!("Quake Drive shutdown complete");
}

fn run(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let config = match &args.config {
        Some(path) => DriveConfig::load(path)?,
        None => DriveConfig::default(),
    };
    info!(
        "Config OK: floor={} Hz, max={} Hz, channel capacity={}",
        config.motor.min_start_speed_hz, config.motor.max_speed_hz, config.channel.capacity,
    );

    let ctx = DriveContext::new(&config);

    let rig = SimRig::new(args.back_limit, args.front_limit, args.start_position);
    info!(
        "Simulated rig: limits [{}, {}], carriage at {}",
        args.back_limit, args.front_limit, args.start_position,
    );
    {
        let hook_ctx = ctx.clone();
        rig.set_edge_hook(move |side| hook_ctx.monitor.on_limit_edge(side));
    }

    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let shutdown = shutdown.clone();
        let stop_ctx = ctx.clone();
        ctrlc::set_handler(move || {
            info!("Received shutdown signal");
            stop_ctx.stop_flag().set();
            shutdown.store(true, Ordering::SeqCst);
        })?;
    }

    let dispatcher_thread = {
        let ctx = ctx.clone();
        let driver = rig.driver();
        let switches = rig.switches();
        let shutdown = shutdown.clone();
        let config = config;
        std::thread::Builder::new()
            .name("dispatcher".into())
            .spawn(move || {
                let mut dispatcher = Dispatcher::new(ctx, driver, switches, &config);
                dispatcher.run(&shutdown);
            })?
    };

    // The reader moves onto the ingestor's pump thread.
    let stdout = std::io::stdout();
    let mut ingestor = Ingestor::new(
        ctx.clone(),
        std::io::BufReader::new(std::io::stdin()),
        stdout.lock(),
        &config.dispatcher,
    );

    if args.skip_handshake {
        warn!("Handshake and startup homing skipped");
    } else if ingestor.handshake(&shutdown)? {
        // Position is unknown at boot; home before accepting motion.
        ctx.urgent.post(quake_common::command::UrgentSignal::Reset);
    } else {
        shutdown.store(true, Ordering::SeqCst);
    }

    if !shutdown.load(Ordering::SeqCst) {
        ingestor.run(&shutdown)?;
    }

    // Unblock the dispatcher and wait for it.
    ctx.stop_flag().set();
    shutdown.store(true, Ordering::SeqCst);
    if dispatcher_thread.join().is_err() {
        error!("dispatcher thread panicked");
    }

    Ok(())
}

/// Setup tracing subscriber based on CLI arguments.
fn setup_tracing(args: &Args) {
    let level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    // stdout carries the line protocol; logs go to stderr.
    if args.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .compact()
            .init();
    }
}
