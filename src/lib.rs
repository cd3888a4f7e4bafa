//! Zone Presence
//!
//! Turns a per-frame stream of object detections into a debounced
//! "occupied zone" signal and broadcasts every change as a single OSC
//! datagram, for stage and lighting controllers.
//!
//! # Architecture
//!
//! ```text
//! DetectionSource -> CoordinateMapper -> ZoneSet -> OccupancyTracker -> Broadcast
//!                                                        ^
//!                                                   idle timer
//! ```
//!
//! The tracker behaves like a presence sensor:
//!
//! 1. **Edge-triggered**: a zone id is sent only when the occupied zone changes.
//! 2. **Debounced**: every qualifying detection inside a zone restarts the idle
//!    timer, so short gaps (occlusion, a dropped frame) never flicker to idle.
//! 3. **Idempotent idle**: `-1` is sent once on the occupied-to-idle edge, never
//!    again while already idle.
//! 4. **Best-effort delivery**: a failed send is logged and the transition
//!    stands.
//!
//! # Module Structure
//!
//! - `geometry`: rectangles and model-to-display mapping
//! - `zone`: ordered first-match zone classification
//! - `tracker`: occupancy state machine and its worker thread
//! - `transport`: the `Broadcast` seam and the OSC/UDP sender
//! - `detect`: detection frames and sources (JSON-lines replay)
//! - `pipeline`: glue from frames to the tracker
//! - `config`: file and environment configuration

pub mod config;
pub mod detect;
pub mod geometry;
pub mod pipeline;
pub mod tracker;
pub mod transport;
pub mod zone;

pub use config::{BroadcastSettings, ModelSettings, PresenceConfig};
pub use detect::{Detection, DetectionFrame, DetectionSource, ReplaySource};
pub use geometry::{CoordinateMapper, Point, Rect};
pub use pipeline::PresencePipeline;
pub use tracker::{Occupancy, OccupancyMachine, OccupancyTracker, TrackerStatus};
pub use transport::{decode_occupancy, Broadcast, OccupancyMessage, OscBroadcaster};
pub use zone::ZoneSet;
