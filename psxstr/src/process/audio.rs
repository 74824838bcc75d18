use std::collections::HashMap;

use anyhow::Result;
use log::{debug, info, trace};

use crate::structs::audio::{AudioFormat, FinalizedAudioStream, SectorStride};
use crate::structs::sector::{Sector, SectorKind, XaAudioSector};
use crate::utils::bitset::SectorBitSet;
use crate::utils::disc_speed::DiscSpeed;

#[derive(Debug, Clone)]
struct ActiveAudioStream {
    start_sector: u32,
    last_sector: u32,
    stride: SectorStride,
    audible: SectorBitSet,
    format: AudioFormat,
}

impl ActiveAudioStream {
    fn new(number: u32, audio: &XaAudioSector) -> Self {
        let mut audible = SectorBitSet::new();
        audible.set(0, !audio.silent);

        Self {
            start_sector: number,
            last_sector: number,
            stride: SectorStride::UNKNOWN,
            audible,
            format: audio.format,
        }
    }

    /// Checks whether `number` continues this stream. Returns the stride to
    /// lock when it does.
    fn accepts(&self, number: u32, audio: &XaAudioSector) -> Option<SectorStride> {
        if audio.format != self.format {
            return None;
        }

        // A sector behind the stream cannot continue it.
        let stride = number
            .checked_sub(self.last_sector)
            .and_then(|distance| i32::try_from(distance).ok())?;
        if self.stride.is_known() {
            return (stride == self.stride.get()).then_some(self.stride);
        }

        let speed = DiscSpeed::calculate(
            self.format.sample_rate,
            self.format.stereo,
            self.format.bits_per_sample,
            stride,
        );
        if stride == 1 || speed.is_some() {
            SectorStride::try_from(stride).ok()
        } else {
            None
        }
    }

    fn push(&mut self, number: u32, stride: SectorStride, silent: bool) {
        self.stride = stride;
        self.last_sector = number;

        let ordinal = (number - self.start_sector) / stride.get() as u32;
        self.audible.set(ordinal as usize, !silent);
    }
}

/// Groups XA audio sectors into streams.
///
/// One stream is active per (file, channel). A sector joins the active stream
/// when its format is identical and its distance from the previous sector
/// matches the stream's stride. The stride locks on the second sector, and
/// only to 1 or to a value for which the format plays back at a real disc
/// speed. Finished streams are collected until [`take_finished`] is called.
///
/// [`take_finished`]: AudioStreamTracker::take_finished
#[derive(Debug, Default)]
pub struct AudioStreamTracker {
    active: HashMap<(u8, u8), ActiveAudioStream>,
    finished: Vec<FinalizedAudioStream>,
    discarded: usize,
}

impl AudioStreamTracker {
    /// Routes one sector through the tracker, then finalizes every stream
    /// whose next sector is overdue.
    pub fn feed(&mut self, sector: &Sector) -> Result<()> {
        if let SectorKind::Audio(audio) = &sector.kind {
            self.feed_audio(sector.number, audio)?;
        }

        if let Some(subheader) = sector.subheader.filter(|sh| sh.submode.end_of_file()) {
            self.end_of_file_marker(subheader.file, subheader.channel)?;
        }

        self.sweep(sector.number)
    }

    fn feed_audio(&mut self, number: u32, audio: &XaAudioSector) -> Result<()> {
        let key = (audio.format.file, audio.format.channel);

        if let Some(active) = self.active.get_mut(&key) {
            if let Some(stride) = active.accepts(number, audio) {
                trace!("Sector {number}: continues audio stream {}", audio.format);
                active.push(number, stride, audio.silent);
                return Ok(());
            }

            info!(
                "Sector {number}: audio stream {} (stride {}) broken, starting a new one",
                active.format, active.stride
            );
            self.finalize(key)?;
        }

        debug!("Sector {number}: new audio stream {}", audio.format);
        self.active.insert(key, ActiveAudioStream::new(number, audio));

        Ok(())
    }

    /// Finalizes every stream with a locked stride that `current` has passed.
    pub fn sweep(&mut self, current: u32) -> Result<()> {
        let mut expired = self
            .active
            .iter()
            .filter(|(_, s)| {
                s.stride.is_known() && current as u64 > s.last_sector as u64 + s.stride.get() as u64
            })
            .map(|(key, _)| *key)
            .collect::<Vec<_>>();
        expired.sort_by_key(|key| self.active.get(key).map(|s| s.start_sector));

        for key in expired {
            self.finalize(key)?;
        }
        Ok(())
    }

    /// Ends the stream of (file, channel) immediately.
    pub fn end_of_file_marker(&mut self, file: u8, channel: u8) -> Result<()> {
        if self.active.contains_key(&(file, channel)) {
            debug!("End of file marker for audio file {file} channel {channel}");
            self.finalize((file, channel))?;
        }
        Ok(())
    }

    pub fn end_of_disc(&mut self) -> Result<()> {
        let mut keys = self.active.keys().copied().collect::<Vec<_>>();
        keys.sort_by_key(|key| self.active.get(key).map(|s| s.start_sector));

        for key in keys {
            self.finalize(key)?;
        }
        Ok(())
    }

    fn finalize(&mut self, key: (u8, u8)) -> Result<()> {
        let Some(active) = self.active.remove(&key) else {
            return Ok(());
        };

        if active.start_sector == active.last_sector && active.audible.is_empty() {
            debug!(
                "Discarding lone silent audio sector {} ({})",
                active.start_sector, active.format
            );
            self.discarded += 1;
            return Ok(());
        }

        let stream = FinalizedAudioStream::new(
            active.start_sector,
            active.last_sector,
            active.format,
            active.stride,
            active.audible,
        )?;
        info!(
            "Audio stream {}: sectors {}-{}, stride {}, disc speed {}",
            stream.format,
            stream.start_sector,
            stream.end_sector,
            stream.stride,
            DiscSpeed::to_field(stream.disc_speed)
        );
        self.finished.push(stream);

        Ok(())
    }

    pub fn take_finished(&mut self) -> Vec<FinalizedAudioStream> {
        std::mem::take(&mut self.finished)
    }

    pub fn active_streams(&self) -> usize {
        self.active.len()
    }

    pub fn discarded(&self) -> usize {
        self.discarded
    }
}
