use std::collections::HashMap;

use anyhow::Result;
use log::Level::Warn;
use log::trace;

use crate::log_or_err;
use crate::structs::sector::{VIDEO_CHUNK_PAYLOAD_SIZE, VideoSector, VideoSectorHeader};
use crate::utils::buffer_pool::BufferPool;
use crate::utils::errors::IndexError;

/// A fully assembled frame bitstream with the sectors it was read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DemuxedFrame {
    pub channel: u8,
    pub frame_number: u32,
    pub width: u16,
    pub height: u16,
    pub start_sector: u32,
    pub end_sector: u32,
    pub data: Vec<u8>,
}

impl AsRef<[u8]> for DemuxedFrame {
    fn as_ref(&self) -> &[u8] {
        &self.data
    }
}

#[derive(Debug)]
struct FrameAccumulator {
    header: VideoSectorHeader,
    buffer: Vec<u8>,
    received: Vec<bool>,
    received_bytes: usize,
    start_sector: u32,
    end_sector: u32,
}

impl FrameAccumulator {
    fn matches(&self, header: &VideoSectorHeader) -> bool {
        self.header.chunk_count == header.chunk_count
            && self.header.frame_size == header.frame_size
            && self.header.width == header.width
            && self.header.height == header.height
    }

    fn chunks_received(&self) -> usize {
        self.received.iter().filter(|&&r| r).count()
    }

    fn is_complete(&self) -> bool {
        self.received_bytes >= self.header.frame_size as usize
            || self.chunks_received() == self.received.len()
    }
}

/// Reassembles STR frames from their chunk sectors.
///
/// Each video channel owns at most one frame in progress. A chunk belonging
/// to another frame, or disagreeing with the frame being assembled, drops the
/// incomplete frame and starts over with that chunk. Chunks left over from
/// the frame a channel last completed are dropped.
#[derive(Debug)]
pub struct VideoFrameDemuxer {
    accumulators: HashMap<u8, FrameAccumulator>,
    completed: HashMap<u8, u32>,
    pool: BufferPool,
    discarded: usize,
    pub fail_level: log::Level,
}

impl Default for VideoFrameDemuxer {
    fn default() -> Self {
        Self {
            accumulators: HashMap::new(),
            completed: HashMap::new(),
            pool: BufferPool::default(),
            discarded: 0,
            fail_level: log::Level::Error,
        }
    }
}

impl VideoFrameDemuxer {
    pub fn set_fail_level(&mut self, level: log::Level) {
        self.fail_level = level;
    }

    /// Adds one chunk. Returns the frame it completes, if any.
    pub fn feed(&mut self, number: u32, channel: u8, sector: &VideoSector) -> Result<Option<DemuxedFrame>> {
        let header = &sector.header;
        if !header.is_valid() {
            log_or_err!(
                self,
                Warn,
                IndexError::InconsistentChunk {
                    frame: header.frame_number,
                    chunk: header.chunk_index,
                    sector: number,
                }
            );
            return Ok(None);
        }

        if !self.accumulators.contains_key(&channel)
            && self.completed.get(&channel) == Some(&header.frame_number)
        {
            trace!(
                "Sector {number}: late chunk {} of completed frame {} on channel {channel}",
                header.chunk_index, header.frame_number
            );
            return Ok(None);
        }

        if let Some(acc) = self.accumulators.get(&channel) {
            if acc.header.frame_number != header.frame_number {
                self.discard(channel)?;
            } else if !acc.matches(header) {
                let error = IndexError::InconsistentChunk {
                    frame: header.frame_number,
                    chunk: header.chunk_index,
                    sector: number,
                };
                self.drop_accumulator(channel);
                log_or_err!(self, Warn, error);
            }
        }

        let pool = &self.pool;
        let acc = self.accumulators.entry(channel).or_insert_with(|| {
            trace!(
                "Sector {number}: frame {} on channel {channel} begins, {} bytes in {} chunks",
                header.frame_number, header.frame_size, header.chunk_count
            );
            FrameAccumulator {
                header: *header,
                buffer: pool.acquire(header.frame_size as usize),
                received: vec![false; header.chunk_count as usize],
                received_bytes: 0,
                start_sector: number,
                end_sector: number,
            }
        });

        let index = header.chunk_index as usize;
        acc.end_sector = number;
        if acc.received[index] {
            trace!("Sector {number}: repeated chunk {index} of frame {}", header.frame_number);
        } else {
            // Chunks past the declared frame size carry nothing.
            let start = (index * VIDEO_CHUNK_PAYLOAD_SIZE).min(acc.buffer.len());
            let len = (acc.buffer.len() - start)
                .min(VIDEO_CHUNK_PAYLOAD_SIZE)
                .min(sector.payload.len());
            acc.buffer[start..start + len].copy_from_slice(&sector.payload[..len]);
            acc.received[index] = true;
            acc.received_bytes += len;
        }

        if !acc.is_complete() {
            return Ok(None);
        }

        let Some(acc) = self.accumulators.remove(&channel) else {
            return Ok(None);
        };
        self.completed.insert(channel, acc.header.frame_number);

        Ok(Some(DemuxedFrame {
            channel,
            frame_number: acc.header.frame_number,
            width: acc.header.width,
            height: acc.header.height,
            start_sector: acc.start_sector,
            end_sector: acc.end_sector,
            data: acc.buffer,
        }))
    }

    /// Drops the partial frame of `channel`, if any.
    pub fn end_of_stream(&mut self, channel: u8) -> Result<()> {
        self.completed.remove(&channel);
        if self.accumulators.contains_key(&channel) {
            self.discard(channel)?;
        }
        Ok(())
    }

    pub fn end_of_disc(&mut self) -> Result<()> {
        self.completed.clear();
        let mut channels = self.accumulators.keys().copied().collect::<Vec<_>>();
        channels.sort_unstable();

        for channel in channels {
            self.discard(channel)?;
        }
        Ok(())
    }

    /// Returns a consumed frame buffer for reuse.
    pub fn recycle(&self, frame: DemuxedFrame) {
        self.pool.release(frame.data);
    }

    pub fn discarded(&self) -> usize {
        self.discarded
    }

    fn drop_accumulator(&mut self, channel: u8) -> Option<FrameAccumulator> {
        let mut acc = self.accumulators.remove(&channel)?;
        self.discarded += 1;
        self.pool.release(std::mem::take(&mut acc.buffer));
        Some(acc)
    }

    fn discard(&mut self, channel: u8) -> Result<()> {
        let Some(acc) = self.drop_accumulator(channel) else {
            return Ok(());
        };

        log_or_err!(
            self,
            Warn,
            IndexError::IncompleteFrame {
                channel,
                frame: acc.header.frame_number,
                received: acc.received_bytes,
                expected: acc.header.frame_size as usize,
                start: acc.start_sector,
                end: acc.end_sector,
            }
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(
        frame_number: u32,
        chunk_index: u16,
        chunk_count: u16,
        frame_size: u32,
        fill: u8,
    ) -> VideoSector {
        VideoSector {
            header: VideoSectorHeader {
                chunk_index,
                chunk_count,
                frame_number,
                frame_size,
                width: 64,
                height: 32,
                frame_header: [0; 8],
            },
            payload: vec![fill; VIDEO_CHUNK_PAYLOAD_SIZE],
        }
    }

    #[test]
    fn frame_assembles_out_of_order() -> Result<()> {
        let mut demuxer = VideoFrameDemuxer::default();

        assert!(demuxer.feed(10, 0, &chunk(1, 1, 2, 3000, 0xBB))?.is_none());
        let frame = demuxer.feed(11, 0, &chunk(1, 0, 2, 3000, 0xAA))?.unwrap();

        assert_eq!(frame.frame_number, 1);
        assert_eq!((frame.start_sector, frame.end_sector), (10, 11));
        assert_eq!(frame.data.len(), 3000);
        assert!(frame.data[..2016].iter().all(|&b| b == 0xAA));
        assert!(frame.data[2016..].iter().all(|&b| b == 0xBB));
        Ok(())
    }

    #[test]
    fn frame_completes_on_declared_size() -> Result<()> {
        let mut demuxer = VideoFrameDemuxer::default();

        // Three chunks declared, but the frame fits in the first two.
        assert!(demuxer.feed(0, 0, &chunk(5, 0, 3, 4000, 1))?.is_none());
        let frame = demuxer.feed(1, 0, &chunk(5, 1, 3, 4000, 2))?.unwrap();
        assert_eq!(frame.data.len(), 4000);
        Ok(())
    }

    #[test]
    fn late_chunk_of_completed_frame_is_dropped() -> Result<()> {
        let mut demuxer = VideoFrameDemuxer::default();
        demuxer.set_fail_level(Warn);

        assert!(demuxer.feed(0, 0, &chunk(5, 0, 3, 4000, 1))?.is_none());
        assert!(demuxer.feed(1, 0, &chunk(5, 1, 3, 4000, 2))?.is_some());
        // Chunk 2 starts at byte 4032, past the 4000 byte frame.
        assert!(demuxer.feed(2, 0, &chunk(5, 2, 3, 4000, 3))?.is_none());
        assert_eq!(demuxer.discarded(), 0);

        assert!(demuxer.feed(3, 0, &chunk(6, 0, 1, 100, 4))?.is_some());
        assert_eq!(demuxer.discarded(), 0);
        Ok(())
    }

    #[test]
    fn chunk_past_frame_size_is_ignored() -> Result<()> {
        let mut demuxer = VideoFrameDemuxer::default();

        assert!(demuxer.feed(0, 0, &chunk(7, 2, 3, 4000, 9))?.is_none());
        assert!(demuxer.feed(1, 0, &chunk(7, 0, 3, 4000, 1))?.is_none());
        let frame = demuxer.feed(2, 0, &chunk(7, 1, 3, 4000, 2))?.unwrap();
        assert_eq!(frame.data.len(), 4000);
        assert!(frame.data[2016..].iter().all(|&b| b == 2));
        Ok(())
    }

    #[test]
    fn desync_discards_incomplete_frame() -> Result<()> {
        let mut demuxer = VideoFrameDemuxer::default();

        assert!(demuxer.feed(0, 0, &chunk(1, 0, 2, 4000, 1))?.is_none());
        // Frame 2 starts before frame 1 finished.
        assert!(demuxer.feed(1, 0, &chunk(2, 0, 2, 4000, 2))?.is_none());
        let frame = demuxer.feed(2, 0, &chunk(2, 1, 2, 4000, 2))?.unwrap();

        assert_eq!(frame.frame_number, 2);
        assert_eq!(frame.start_sector, 1);
        assert_eq!(demuxer.discarded(), 1);

        // Strict mode turns the discard into an error.
        demuxer.set_fail_level(Warn);
        demuxer.feed(3, 0, &chunk(3, 0, 2, 4000, 3))?;
        assert!(demuxer.feed(4, 0, &chunk(4, 0, 2, 4000, 4)).is_err());
        Ok(())
    }

    #[test]
    fn channels_are_independent() -> Result<()> {
        let mut demuxer = VideoFrameDemuxer::default();

        assert!(demuxer.feed(0, 0, &chunk(1, 0, 2, 4000, 1))?.is_none());
        assert!(demuxer.feed(1, 1, &chunk(9, 0, 1, 100, 7))?.is_some());
        assert!(demuxer.feed(2, 0, &chunk(1, 1, 2, 4000, 1))?.is_some());

        assert!(demuxer.feed(3, 0, &chunk(2, 0, 2, 4000, 1))?.is_none());
        demuxer.end_of_disc()?;
        assert_eq!(demuxer.discarded(), 1);
        Ok(())
    }
}
