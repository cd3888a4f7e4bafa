//! Occupancy tracker runtime.
//!
//! Frame processing and the idle timer both mutate the same occupancy state.
//! Instead of sharing that state behind a lock, a single worker thread owns
//! the `OccupancyMachine` and consumes an event queue. The idle timer is the
//! queue's receive timeout, so a frame's "reset timer + compare zone" and an
//! expiry can never interleave.
//!
//! Callers only enqueue, so frame processing never waits on the network.

mod machine;

pub use machine::{Occupancy, OccupancyMachine};

use anyhow::{anyhow, Context, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::transport::Broadcast;

pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_millis(8000);

enum TrackerEvent {
    /// Zone ids hit by qualifying detections in one frame, in detection order,
    /// stamped with the instant the frame was submitted.
    Hits(Instant, Vec<usize>),
    Shutdown,
}

/// Point-in-time view of the tracker, for logs and tests.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TrackerStatus {
    pub occupancy: Occupancy,
    pub frames: u64,
    pub expiries: u64,
    pub broadcasts: u64,
    pub failed_broadcasts: u64,
}

#[derive(Default)]
struct Shared {
    shutdown: AtomicBool,
    status: Mutex<TrackerStatus>,
}

/// Handle to a running occupancy tracker.
///
/// Dropping the handle shuts the worker down.
pub struct OccupancyTracker {
    events: Option<mpsc::Sender<TrackerEvent>>,
    shared: Arc<Shared>,
    join: Option<JoinHandle<()>>,
    idle_timeout: Duration,
}

impl OccupancyTracker {
    /// Start the worker. The idle timer starts running immediately.
    pub fn spawn<B: Broadcast + 'static>(idle_timeout: Duration, broadcaster: B) -> Result<Self> {
        if idle_timeout.is_zero() {
            return Err(anyhow!("idle timeout must be greater than zero"));
        }

        let (tx, rx) = mpsc::channel();
        let shared = Arc::new(Shared::default());
        let worker_shared = shared.clone();
        let join = std::thread::Builder::new()
            .name("occupancy-tracker".to_string())
            .spawn(move || run_tracker(rx, idle_timeout, broadcaster, worker_shared))
            .context("spawn occupancy tracker thread")?;

        Ok(Self {
            events: Some(tx),
            shared,
            join: Some(join),
            idle_timeout,
        })
    }

    pub fn idle_timeout(&self) -> Duration {
        self.idle_timeout
    }

    /// Queue the zone hits of one frame.
    ///
    /// An empty frame means "no qualifying detection" and is a no-op: it
    /// neither refreshes the timer nor changes state.
    pub fn submit(&self, zones: Vec<usize>) -> Result<()> {
        if self.shared.shutdown.load(Ordering::SeqCst) {
            return Err(anyhow!("occupancy tracker is shut down"));
        }
        if zones.is_empty() {
            return Ok(());
        }
        let events = self
            .events
            .as_ref()
            .ok_or_else(|| anyhow!("occupancy tracker is shut down"))?;
        events
            .send(TrackerEvent::Hits(Instant::now(), zones))
            .map_err(|_| anyhow!("occupancy tracker worker has stopped"))
    }

    pub fn status(&self) -> Result<TrackerStatus> {
        let status = self
            .shared
            .status
            .lock()
            .map_err(|_| anyhow!("tracker status lock poisoned"))?;
        Ok(*status)
    }

    pub fn is_shut_down(&self) -> bool {
        self.shared.shutdown.load(Ordering::SeqCst)
    }

    /// Stop the timer and the worker. Safe to call more than once.
    ///
    /// A broadcast already in flight completes; none are started afterwards.
    pub fn shutdown(&mut self) -> Result<()> {
        self.shared.shutdown.store(true, Ordering::SeqCst);
        if let Some(events) = self.events.take() {
            let _ = events.send(TrackerEvent::Shutdown);
        }
        if let Some(join) = self.join.take() {
            join.join()
                .map_err(|_| anyhow!("occupancy tracker thread panicked"))?;
        }
        Ok(())
    }
}

impl Drop for OccupancyTracker {
    fn drop(&mut self) {
        if let Err(err) = self.shutdown() {
            log::error!("occupancy tracker shutdown failed: {}", err);
        }
    }
}

fn run_tracker<B: Broadcast>(
    events: mpsc::Receiver<TrackerEvent>,
    idle_timeout: Duration,
    broadcaster: B,
    shared: Arc<Shared>,
) {
    let mut machine = OccupancyMachine::new(idle_timeout, Instant::now());
    log::debug!(
        "occupancy tracker started (idle timeout {}ms, sink {})",
        idle_timeout.as_millis(),
        broadcaster.name()
    );

    loop {
        let wait = machine
            .deadline()
            .saturating_duration_since(Instant::now());
        let mut frames = 0;
        let transitions: Vec<Occupancy> = match events.recv_timeout(wait) {
            Ok(TrackerEvent::Hits(stamp, zones)) => {
                frames = 1;
                log::debug!("zone hits {:?}", zones);
                // A frame dequeued late must not swallow an expiry that was
                // already due when it was submitted.
                let expired = machine.on_tick(stamp);
                expired
                    .into_iter()
                    .chain(
                        zones
                            .into_iter()
                            .filter_map(|zone| machine.on_zone_hit(zone, stamp)),
                    )
                    .collect()
            }
            Err(RecvTimeoutError::Timeout) => {
                let expired = machine.on_tick(Instant::now());
                if expired.is_none() {
                    log::trace!("idle timer expired while idle");
                }
                expired.into_iter().collect()
            }
            Ok(TrackerEvent::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
        };

        if let Err(err) = record(&shared, |status| {
            status.occupancy = machine.occupancy();
            status.expiries = machine.expiries();
            status.frames += frames;
        }) {
            log::error!("occupancy tracker stopped: {}", err);
            return;
        }

        for occupancy in transitions {
            if shared.shutdown.load(Ordering::SeqCst) {
                break;
            }
            publish(&broadcaster, occupancy, &shared);
        }
    }

    log::debug!("occupancy tracker stopped");
}

// Send failures are logged and swallowed: the transition already happened and
// is not rolled back.
fn publish<B: Broadcast>(broadcaster: &B, occupancy: Occupancy, shared: &Shared) {
    let zone_id = occupancy.wire_value();
    let result = broadcaster.broadcast(zone_id);
    match &result {
        Ok(()) => log::info!("occupancy -> {} (sent via {})", zone_id, broadcaster.name()),
        Err(err) => log::warn!(
            "occupancy -> {} but broadcast via {} failed: {:#}",
            zone_id,
            broadcaster.name(),
            err
        ),
    }
    if let Err(err) = record(shared, |status| match result {
        Ok(()) => status.broadcasts += 1,
        Err(_) => status.failed_broadcasts += 1,
    }) {
        log::error!("broadcast of {} not recorded: {}", zone_id, err);
    }
}

fn record(shared: &Shared, update: impl FnOnce(&mut TrackerStatus)) -> Result<()> {
    let mut status = shared
        .status
        .lock()
        .map_err(|_| anyhow!("tracker status lock poisoned"))?;
    update(&mut status);
    Ok(())
}
