use std::collections::VecDeque;

use anyhow::{Result, bail};
use log::debug;

use crate::process::audio::AudioStreamTracker;
use crate::process::demux::{DemuxedFrame, VideoFrameDemuxer};
use crate::process::video::VideoStreamTracker;
use crate::structs::audio::FinalizedAudioStream;
use crate::structs::sector::{Sector, SectorKind};
use crate::structs::video::FinalizedVideoStream;
use crate::utils::errors::IndexError;

/// Output of the indexing pass, in the order it became available.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexEvent {
    Audio(FinalizedAudioStream),
    Video(FinalizedVideoStream),
    /// A completed frame, only produced after [`Indexer::set_emit_frames`].
    Frame(DemuxedFrame),
}

/// Single forward pass over classified sectors.
///
/// Sectors are pushed in ascending order and routed to the audio tracker and
/// the video demuxer. Finished streams (and optionally frames) are then
/// pulled by iterating the indexer.
///
/// # Example
///
/// ```rust,no_run
/// use psxstr::process::index::{IndexEvent, Indexer};
/// use psxstr::structs::sector::Sector;
///
/// let mut indexer = Indexer::default();
/// let image = std::fs::read("disc.bin")?;
///
/// for (number, raw) in image.chunks_exact(2352).enumerate() {
///     let number = number as u32;
///     let sector = Sector::from_raw(number, raw).unwrap_or_else(|_| Sector::other(number, None));
///     indexer.push_sector(&sector)?;
///
///     for event in &mut indexer {
///         if let IndexEvent::Video(stream) = event {
///             println!("{stream}");
///         }
///     }
/// }
/// indexer.finish()?;
/// let remaining = indexer.collect::<Vec<_>>();
/// # Ok::<(), anyhow::Error>(())
/// ```
#[derive(Debug, Default)]
pub struct Indexer {
    audio: AudioStreamTracker,
    demuxer: VideoFrameDemuxer,
    video: VideoStreamTracker,
    events: VecDeque<IndexEvent>,
    last_sector: Option<u32>,
    emit_frames: bool,
    sectors: usize,
}

impl Indexer {
    /// Feeds one sector. Fails if sector numbers do not strictly increase.
    pub fn push_sector(&mut self, sector: &Sector) -> Result<()> {
        if let Some(previous) = self.last_sector {
            if sector.number <= previous {
                bail!(IndexError::OutOfOrderSector {
                    previous,
                    current: sector.number,
                });
            }
        }
        self.last_sector = Some(sector.number);
        self.sectors += 1;

        self.audio.feed(sector)?;

        match &sector.kind {
            SectorKind::Video(video) => {
                let channel = sector.channel();
                if let Some(frame) = self.demuxer.feed(sector.number, channel, video)? {
                    self.video.feed(&frame)?;
                    self.collect_finished();

                    if self.emit_frames {
                        self.events.push_back(IndexEvent::Frame(frame));
                    } else {
                        self.demuxer.recycle(frame);
                    }
                }

                if sector.end_of_file() {
                    debug!("Sector {}: end of file on video channel {channel}", sector.number);
                    self.demuxer.end_of_stream(channel)?;
                    self.video.end_of_stream(channel);
                }
            }
            SectorKind::Other if sector.end_of_file() => {
                let channel = sector.channel();
                self.demuxer.end_of_stream(channel)?;
                self.video.end_of_stream(channel);
            }
            _ => {}
        }

        self.collect_finished();
        Ok(())
    }

    /// Ends every stream still open at the end of the disc.
    pub fn finish(&mut self) -> Result<()> {
        self.audio.end_of_disc()?;
        self.demuxer.end_of_disc()?;
        self.video.end_of_disc();
        self.collect_finished();

        Ok(())
    }

    fn collect_finished(&mut self) {
        self.events
            .extend(self.audio.take_finished().into_iter().map(IndexEvent::Audio));
        self.events
            .extend(self.video.take_finished().into_iter().map(IndexEvent::Video));
    }

    /// Also yield every completed frame as [`IndexEvent::Frame`].
    pub fn set_emit_frames(&mut self, emit: bool) {
        self.emit_frames = emit;
    }

    /// Sets the failure level for discarded frames and frame numbering issues.
    ///
    /// - `log::Level::Error`: Only fail on Error level messages (default)
    /// - `log::Level::Warn`: Fail on Warning level and above (strict mode)
    pub fn set_fail_level(&mut self, level: log::Level) {
        self.demuxer.set_fail_level(level);
        self.video.set_fail_level(level);
    }

    pub fn sectors_indexed(&self) -> usize {
        self.sectors
    }

    pub fn frames_discarded(&self) -> usize {
        self.demuxer.discarded()
    }

    pub fn audio_sectors_discarded(&self) -> usize {
        self.audio.discarded()
    }
}

impl Iterator for Indexer {
    type Item = IndexEvent;

    fn next(&mut self) -> Option<Self::Item> {
        self.events.pop_front()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn video_chunk(number: u32, frame_number: u32, chunk_index: u16, submode: u8) -> Sector {
        use crate::structs::sector::{SubMode, VIDEO_CHUNK_PAYLOAD_SIZE, VideoSectorHeader};

        Sector::video(
            number,
            0,
            SubMode(submode),
            VideoSectorHeader {
                chunk_index,
                chunk_count: 2,
                frame_number,
                frame_size: 3000,
                width: 320,
                height: 240,
                frame_header: [0; 8],
            },
            vec![chunk_index as u8; VIDEO_CHUNK_PAYLOAD_SIZE],
        )
    }

    fn interleaved_disc() -> Vec<Sector> {
        use crate::structs::audio::AudioFormat;
        use crate::structs::sector::SubMode;

        let format = AudioFormat {
            file: 1,
            channel: 1,
            sample_rate: 37800,
            bits_per_sample: 4,
            stereo: true,
        };

        // Audio every 8th sector, two-chunk frames in the gaps.
        let mut sectors = Vec::new();
        let mut frame_number = 1;
        for number in 0..80u32 {
            if number % 8 == 0 {
                sectors.push(Sector::audio(number, format, SubMode::default(), false));
            } else if number % 8 == 1 || number % 8 == 5 {
                sectors.push(video_chunk(number, frame_number, 0, 0));
            } else if number % 8 == 2 || number % 8 == 6 {
                sectors.push(video_chunk(number, frame_number, 1, 0));
                frame_number += 1;
            } else {
                sectors.push(Sector::other(number, None));
            }
        }
        sectors
    }

    #[test]
    fn index_interleaved_streams() -> Result<()> {
        let mut indexer = Indexer::default();
        for sector in interleaved_disc() {
            indexer.push_sector(&sector)?;
        }
        assert_eq!(indexer.by_ref().count(), 0);

        indexer.finish()?;
        let events = indexer.by_ref().collect::<Vec<_>>();
        assert_eq!(events.len(), 2);

        let IndexEvent::Audio(audio) = &events[0] else {
            panic!("expected audio, got {:?}", events[0]);
        };
        assert_eq!((audio.start_sector, audio.end_sector), (0, 72));
        assert_eq!(audio.stride.get(), 8);

        let IndexEvent::Video(video) = &events[1] else {
            panic!("expected video, got {:?}", events[1]);
        };
        assert_eq!(video.frame_count, 20);
        assert_eq!((video.start_sector, video.end_sector), (1, 78));
        assert_eq!(video.sectors_per_frame.to_string(), "4/1");
        assert_eq!(video.presentation_offset, 1);
        assert_eq!(indexer.sectors_indexed(), 80);
        Ok(())
    }

    #[test]
    fn frames_are_emitted_on_request() -> Result<()> {
        let mut indexer = Indexer::default();
        indexer.set_emit_frames(true);

        for sector in interleaved_disc().iter().take(8) {
            indexer.push_sector(sector)?;
        }
        let frames = indexer
            .by_ref()
            .filter_map(|event| match event {
                IndexEvent::Frame(frame) => Some(frame),
                _ => None,
            })
            .collect::<Vec<_>>();

        assert_eq!(frames.len(), 2);
        assert_eq!((frames[1].start_sector, frames[1].end_sector), (5, 6));
        assert_eq!(frames[1].data[2016], 1);
        Ok(())
    }

    #[test]
    fn end_of_file_closes_video_stream() -> Result<()> {
        let mut indexer = Indexer::default();
        indexer.push_sector(&video_chunk(10, 1, 0, 0))?;
        indexer.push_sector(&video_chunk(11, 1, 1, 0))?;
        indexer.push_sector(&video_chunk(12, 2, 0, 0))?;
        indexer.push_sector(&video_chunk(13, 2, 1, 0x80))?;

        let events = indexer.by_ref().collect::<Vec<_>>();
        assert!(matches!(&events[..], [IndexEvent::Video(v)] if v.frame_count == 2));

        // An incomplete frame cut by the marker is dropped.
        indexer.push_sector(&video_chunk(20, 3, 0, 0x80))?;
        assert_eq!(indexer.frames_discarded(), 1);
        Ok(())
    }

    #[test]
    fn out_of_order_sector_is_rejected() -> Result<()> {
        let mut indexer = Indexer::default();
        indexer.push_sector(&Sector::other(5, None))?;

        let error = indexer.push_sector(&Sector::other(5, None)).unwrap_err();
        assert!(matches!(
            error.downcast_ref::<IndexError>(),
            Some(IndexError::OutOfOrderSector { previous: 5, current: 5 })
        ));
        Ok(())
    }
}
