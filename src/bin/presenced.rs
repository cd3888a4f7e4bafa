//! presenced - zone occupancy daemon
//!
//! This daemon:
//! 1. Loads zones, broadcast endpoint and idle timeout from config/env
//! 2. Reads detection frames from a source (JSON-lines replay or stdin)
//! 3. Maps and classifies qualifying detections into zones
//! 4. Broadcasts debounced occupancy changes as OSC over UDP
//! 5. Shuts the tracker down cleanly on Ctrl-C or end of input

use anyhow::Result;
use clap::Parser;
use std::io::BufReader;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use zone_presence::{DetectionSource, PresenceConfig, PresencePipeline, ReplaySource};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Broadcast debounced zone occupancy from object detections"
)]
struct Args {
    /// Config file (JSON, or TOML with a .toml extension).
    #[arg(long, env = "PRESENCE_CONFIG")]
    config: Option<PathBuf>,

    /// JSON-lines detection replay; "-" reads stdin.
    #[arg(long, env = "PRESENCE_REPLAY", default_value = "-")]
    replay: String,

    /// Replay pacing in frames per second (0 = as fast as possible).
    #[arg(long, default_value_t = 10)]
    fps: u32,

    /// Override the broadcast destination (ip:port).
    #[arg(long)]
    broadcast_addr: Option<SocketAddr>,

    /// Keep running after the replay ends so the idle transition still fires.
    #[arg(long)]
    linger: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut cfg = PresenceConfig::load_from(args.config.as_deref())?;
    if let Some(addr) = args.broadcast_addr {
        cfg.broadcast.addr = addr;
    }

    let mut source = open_source(&args.replay, args.fps)?;
    let mut pipeline = PresencePipeline::from_config(&cfg)?;

    log::info!(
        "presenced running. broadcasting {} to {}",
        cfg.broadcast.address_pattern,
        cfg.broadcast.addr
    );
    log::info!(
        "zones={}, label={}, idle_timeout={}ms, model={}x{}, source={}",
        pipeline.zones().len(),
        pipeline.qualifying_label(),
        cfg.idle_timeout.as_millis(),
        cfg.model.width,
        cfg.model.height,
        source.name()
    );
    for (id, zone) in pipeline.zones().iter().enumerate() {
        log::debug!(
            "zone {}: x={} y={} w={} h={}",
            id,
            zone.x,
            zone.y,
            zone.width,
            zone.height
        );
    }

    let running = Arc::new(AtomicBool::new(true));
    let handler_flag = running.clone();
    ctrlc::set_handler(move || {
        handler_flag.store(false, Ordering::SeqCst);
    })
    .expect("error setting Ctrl-C handler");

    let mut last_health_log = Instant::now();
    while running.load(Ordering::SeqCst) {
        let Some(frame) = source.next_frame()? else {
            log::info!("detection source exhausted");
            break;
        };
        if let Err(e) = pipeline.process_frame(&frame) {
            log::warn!("frame rejected: {}", e);
        }

        if last_health_log.elapsed() >= Duration::from_secs(5) {
            let status = pipeline.status()?;
            log::info!(
                "occupancy={} frames={} broadcasts={} failed={} expiries={}",
                status.occupancy.wire_value(),
                status.frames,
                status.broadcasts,
                status.failed_broadcasts,
                status.expiries
            );
            last_health_log = Instant::now();
        }
    }

    if args.linger && running.load(Ordering::SeqCst) {
        log::info!("lingering until Ctrl-C");
        while running.load(Ordering::SeqCst) {
            std::thread::sleep(Duration::from_millis(100));
        }
    }

    log::info!("shutting down occupancy tracker");
    pipeline.shutdown()?;
    let status = pipeline.status()?;
    log::info!(
        "final occupancy={} broadcasts={} failed={}",
        status.occupancy.wire_value(),
        status.broadcasts,
        status.failed_broadcasts
    );
    Ok(())
}

fn open_source(replay: &str, fps: u32) -> Result<Box<dyn DetectionSource>> {
    if replay == "-" {
        let stdin = BufReader::new(std::io::stdin());
        return Ok(Box::new(ReplaySource::from_reader(Box::new(stdin), fps)));
    }
    Ok(Box::new(ReplaySource::open(&PathBuf::from(replay), fps)?))
}
