//! Transport layer for the occupancy signal.
//!
//! The tracker only knows the `Broadcast` trait. The production
//! implementation is a connectionless OSC-over-UDP sender; tests plug in
//! recording sinks.

pub mod osc;

use anyhow::Result;

pub use osc::{decode_occupancy, OccupancyMessage, OscBroadcaster, DEFAULT_ADDRESS_PATTERN};

/// Best-effort sink for occupancy changes.
///
/// Implementations deliver a single zone id (`-1` for idle) and report
/// success or failure. No retry, no acknowledgement.
pub trait Broadcast: Send {
    /// Sink identifier for logs.
    fn name(&self) -> &'static str;

    fn broadcast(&self, zone_id: i32) -> Result<()>;
}

impl<B: Broadcast + ?Sized> Broadcast for Box<B> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn broadcast(&self, zone_id: i32) -> Result<()> {
        (**self).broadcast(zone_id)
    }
}
