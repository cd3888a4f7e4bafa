//! Frame pipeline: map, classify, track.

use anyhow::Result;

use crate::config::PresenceConfig;
use crate::detect::DetectionFrame;
use crate::geometry::CoordinateMapper;
use crate::tracker::{OccupancyTracker, TrackerStatus};
use crate::transport::{Broadcast, OscBroadcaster};
use crate::zone::ZoneSet;

/// Turns detection frames into occupancy broadcasts.
///
/// Zones, qualifying label and mapper are fixed at construction; changing
/// them means building a new pipeline.
pub struct PresencePipeline {
    mapper: CoordinateMapper,
    zones: ZoneSet,
    qualifying_label: String,
    tracker: OccupancyTracker,
}

impl PresencePipeline {
    /// Build a pipeline broadcasting OSC over UDP to the configured endpoint.
    pub fn from_config(cfg: &PresenceConfig) -> Result<Self> {
        let broadcaster =
            OscBroadcaster::new(cfg.broadcast.addr, cfg.broadcast.address_pattern.clone())
                .with_send_timeout(cfg.broadcast.send_timeout);
        Self::with_broadcaster(cfg, broadcaster)
    }

    pub fn with_broadcaster<B: Broadcast + 'static>(
        cfg: &PresenceConfig,
        broadcaster: B,
    ) -> Result<Self> {
        let mapper = CoordinateMapper::new(cfg.model.width, cfg.model.height)?;
        let tracker = OccupancyTracker::spawn(cfg.idle_timeout, broadcaster)?;
        Ok(Self {
            mapper,
            zones: ZoneSet::new(cfg.zones.clone()),
            qualifying_label: cfg.qualifying_label.clone(),
            tracker,
        })
    }

    pub fn zones(&self) -> &ZoneSet {
        &self.zones
    }

    pub fn qualifying_label(&self) -> &str {
        &self.qualifying_label
    }

    /// Zone ids hit by qualifying detections, in detection order.
    ///
    /// Detections with another label are dropped before mapping. Qualifying
    /// detections that land outside every zone are dropped as well; they do
    /// not count as a refresh.
    pub fn zone_hits(&self, frame: &DetectionFrame) -> Vec<usize> {
        frame
            .detections
            .iter()
            .filter(|detection| detection.label == self.qualifying_label)
            .filter_map(|detection| {
                let display = self.mapper.to_display(
                    &detection.bbox,
                    frame.display_width,
                    frame.display_height,
                );
                self.zones.classify(display.anchor())
            })
            .collect()
    }

    /// Classify one frame and hand the hits to the tracker.
    ///
    /// Returns the number of zone hits. Never blocks on the network.
    pub fn process_frame(&self, frame: &DetectionFrame) -> Result<usize> {
        let hits = self.zone_hits(frame);
        let count = hits.len();
        self.tracker.submit(hits)?;
        Ok(count)
    }

    pub fn status(&self) -> Result<TrackerStatus> {
        self.tracker.status()
    }

    pub fn shutdown(&mut self) -> Result<()> {
        self.tracker.shutdown()
    }
}
