use std::collections::HashMap;

use anyhow::Result;
use log::Level::Warn;
use log::{debug, info};

use crate::log_or_err;
use crate::process::demux::DemuxedFrame;
use crate::structs::video::{FinalizedVideoStream, FrameNumberFormatBuilder};
use crate::utils::fraction::Fraction;

/// Largest frame number step, in either direction, that still continues a
/// stream.
pub const FRAME_JUMP_TOLERANCE: u32 = 30;

/// Estimates the sectors-per-frame ratio from frame end sectors.
///
/// Frame `i` (counting from zero) ends `d` sectors after the first frame,
/// so the true ratio `r` satisfies `d - 1 < i * r < d + 1`. Intersecting
/// those bounds over all frames converges on the ratio, and the simplest
/// fraction inside the final interval is reported.
#[derive(Debug, Clone)]
pub struct SectorsPerFrameEstimator {
    first_end: u32,
    frames: u64,
    lo: Fraction,
    hi: Option<Fraction>,
    consistent: bool,
}

impl SectorsPerFrameEstimator {
    pub fn new(first_end: u32) -> Self {
        Self {
            first_end,
            frames: 0,
            lo: Fraction::integer(0),
            hi: None,
            consistent: true,
        }
    }

    pub fn add(&mut self, end_sector: u32) {
        if !self.consistent {
            return;
        }
        let Some(distance) = end_sector.checked_sub(self.first_end) else {
            self.consistent = false;
            return;
        };

        self.frames += 1;
        let distance = distance as u64;

        if let Some(lo) = Fraction::new(distance.saturating_sub(1), self.frames) {
            self.lo = self.lo.max(lo);
        }
        if let Some(hi) = Fraction::new(distance + 1, self.frames) {
            self.hi = Some(self.hi.map_or(hi, |current| current.min(hi)));
        }

        if self.hi.is_some_and(|hi| self.lo >= hi) {
            self.consistent = false;
        }
    }

    /// `None` until a second frame arrives, or once frame ends contradict
    /// each other.
    pub fn estimate(&self) -> Option<Fraction> {
        if !self.consistent {
            return None;
        }
        Fraction::simplest_between(self.lo, self.hi?)
    }
}

#[derive(Debug)]
struct ActiveVideoStream {
    start_sector: u32,
    end_sector: u32,
    first_frame_end: u32,
    width: u16,
    height: u16,
    frame_count: u32,
    frame_numbers: FrameNumberFormatBuilder,
    estimator: SectorsPerFrameEstimator,
}

impl ActiveVideoStream {
    fn new(frame: &DemuxedFrame) -> Self {
        Self {
            start_sector: frame.start_sector,
            end_sector: frame.end_sector,
            first_frame_end: frame.end_sector,
            width: frame.width,
            height: frame.height,
            frame_count: 1,
            frame_numbers: FrameNumberFormatBuilder::new(frame.frame_number),
            estimator: SectorsPerFrameEstimator::new(frame.end_sector),
        }
    }

    fn breaks_on(&self, frame: &DemuxedFrame) -> Option<String> {
        if (frame.width, frame.height) != (self.width, self.height) {
            return Some(format!(
                "dimensions changed from {}x{} to {}x{}",
                self.width, self.height, frame.width, frame.height
            ));
        }

        let last = self.frame_numbers.last();
        if frame.frame_number.abs_diff(last) > FRAME_JUMP_TOLERANCE {
            return Some(format!(
                "frame number jumped from {last} to {}",
                frame.frame_number
            ));
        }
        None
    }
}

/// Groups demuxed frames into video streams, one active stream per channel.
#[derive(Debug)]
pub struct VideoStreamTracker {
    active: HashMap<u8, ActiveVideoStream>,
    finished: Vec<FinalizedVideoStream>,
    pub fail_level: log::Level,
}

impl Default for VideoStreamTracker {
    fn default() -> Self {
        Self {
            active: HashMap::new(),
            finished: Vec::new(),
            fail_level: log::Level::Error,
        }
    }
}

impl VideoStreamTracker {
    pub fn set_fail_level(&mut self, level: log::Level) {
        self.fail_level = level;
    }

    pub fn feed(&mut self, frame: &DemuxedFrame) -> Result<()> {
        let channel = frame.channel;

        let Some(active) = self.active.get_mut(&channel) else {
            debug!(
                "Sector {}: video stream on channel {channel} begins with frame {}",
                frame.start_sector, frame.frame_number
            );
            self.active.insert(channel, ActiveVideoStream::new(frame));
            return Ok(());
        };

        if let Some(reason) = active.breaks_on(frame) {
            info!(
                "Sector {}: video stream on channel {channel} ends, {reason}",
                frame.start_sector
            );
            self.finalize(channel);
            self.active.insert(channel, ActiveVideoStream::new(frame));
            return Ok(());
        }

        active.end_sector = frame.end_sector;
        active.frame_count += 1;
        active.estimator.add(frame.end_sector);
        let numbering = active
            .frame_numbers
            .add(frame.frame_number, channel, frame.start_sector);

        if let Err(error) = numbering {
            log_or_err!(self, Warn, error);
        }
        Ok(())
    }

    pub fn end_of_stream(&mut self, channel: u8) {
        self.finalize(channel);
    }

    pub fn end_of_disc(&mut self) {
        let mut channels = self.active.keys().copied().collect::<Vec<_>>();
        channels.sort_unstable();

        for channel in channels {
            self.finalize(channel);
        }
    }

    fn finalize(&mut self, channel: u8) {
        let Some(active) = self.active.remove(&channel) else {
            return;
        };
        if active.frame_count == 0 {
            return;
        }

        let sectors_per_frame = active.estimator.estimate().or_else(|| {
            debug!("Channel {channel}: sectors/frame falls back to the average");
            Fraction::new(
                (active.end_sector - active.start_sector + 1) as u64,
                active.frame_count as u64,
            )
        });
        let Some(sectors_per_frame) = sectors_per_frame else {
            return;
        };

        let stream = FinalizedVideoStream {
            start_sector: active.start_sector,
            end_sector: active.end_sector,
            channel,
            width: active.width,
            height: active.height,
            frame_count: active.frame_count,
            frame_format: active.frame_numbers.build(),
            sectors_per_frame,
            presentation_offset: active.first_frame_end - active.start_sector,
        };
        info!("Video stream {stream}");
        self.finished.push(stream);
    }

    pub fn take_finished(&mut self) -> Vec<FinalizedVideoStream> {
        std::mem::take(&mut self.finished)
    }

    pub fn active_streams(&self) -> usize {
        self.active.len()
    }
}
