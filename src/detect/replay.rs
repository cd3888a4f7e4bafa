//! JSON-lines detection replay.
//!
//! Each non-empty line is one `DetectionFrame`:
//!
//! ```text
//! {"display_width":1280,"display_height":720,"detections":[{"label":"person","bbox":{"x":10,"y":20,"width":50,"height":120}}]}
//! ```
//!
//! Lines starting with `#` are comments. Frames are paced to `target_fps`
//! so the idle timer sees realistic gaps; `0` disables pacing.

use anyhow::{anyhow, Context, Result};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::time::{Duration, Instant};

use crate::detect::result::DetectionFrame;
use crate::detect::source::DetectionSource;

pub struct ReplaySource {
    reader: Box<dyn BufRead + Send>,
    target_fps: u32,
    line_no: usize,
    frames: u64,
    last_frame_at: Option<Instant>,
}

impl ReplaySource {
    pub fn open(path: &Path, target_fps: u32) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("open detection replay {}", path.display()))?;
        Ok(Self::from_reader(Box::new(BufReader::new(file)), target_fps))
    }

    pub fn from_reader(reader: Box<dyn BufRead + Send>, target_fps: u32) -> Self {
        Self {
            reader,
            target_fps,
            line_no: 0,
            frames: 0,
            last_frame_at: None,
        }
    }

    pub fn frames_read(&self) -> u64 {
        self.frames
    }

    fn read_frame(&mut self) -> Result<Option<DetectionFrame>> {
        let mut line = String::new();
        loop {
            line.clear();
            let read = self
                .reader
                .read_line(&mut line)
                .context("read detection replay")?;
            if read == 0 {
                return Ok(None);
            }
            self.line_no += 1;
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let frame = serde_json::from_str(trimmed)
                .map_err(|e| anyhow!("invalid replay frame on line {}: {}", self.line_no, e))?;
            return Ok(Some(frame));
        }
    }

    fn pace(&mut self) {
        let interval = frame_interval(self.target_fps);
        if let Some(last) = self.last_frame_at {
            let elapsed = last.elapsed();
            if elapsed < interval {
                std::thread::sleep(interval - elapsed);
            }
        }
        self.last_frame_at = Some(Instant::now());
    }
}

impl DetectionSource for ReplaySource {
    fn name(&self) -> &'static str {
        "replay"
    }

    fn next_frame(&mut self) -> Result<Option<DetectionFrame>> {
        let Some(frame) = self.read_frame()? else {
            return Ok(None);
        };
        self.pace();
        self.frames += 1;
        Ok(Some(frame))
    }
}

fn frame_interval(target_fps: u32) -> Duration {
    if target_fps == 0 {
        Duration::from_millis(0)
    } else {
        Duration::from_millis((1000 / target_fps).max(1) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn source(text: &str) -> ReplaySource {
        ReplaySource::from_reader(Box::new(Cursor::new(text.as_bytes().to_vec())), 0)
    }

    #[test]
    fn reads_frames_and_skips_comments() -> Result<()> {
        let mut replay = source(
            r#"# recorded at the rehearsal
{"display_width":1280,"display_height":720,"detections":[{"label":"person","box":{"x":10,"y":20,"w":50,"h":120}}]}

{"display_width":1280,"display_height":720}
"#,
        );

        let first = replay.next_frame()?.expect("first frame");
        assert_eq!(first.detections.len(), 1);
        assert_eq!(first.detections[0].label, "person");
        assert_eq!(first.detections[0].bbox.height, 120.0);

        let second = replay.next_frame()?.expect("second frame");
        assert!(second.is_empty());

        assert!(replay.next_frame()?.is_none());
        assert_eq!(replay.frames_read(), 2);
        Ok(())
    }

    #[test]
    fn reports_line_number_of_bad_frame() {
        let mut replay = source("{\"display_width\":1,\"display_height\":1}\nnot json\n");
        assert!(replay.next_frame().is_ok());
        let err = replay.next_frame().unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn frame_interval_handles_zero_fps() {
        assert_eq!(frame_interval(0), Duration::ZERO);
        assert_eq!(frame_interval(10), Duration::from_millis(100));
        assert_eq!(frame_interval(5000), Duration::from_millis(1));
    }
}
