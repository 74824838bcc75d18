use anyhow::{Context, Result, bail};
use psxstr::structs::audio::FinalizedAudioStream;
use psxstr::structs::video::FinalizedVideoStream;
use psxstr::utils::disc_speed::DiscSpeed;

use super::command::{Cli, InfoArgs};
use super::index::IndexEntry;
use crate::timestamp::{msf_str, time_str};

pub fn cmd_info(args: &InfoArgs, cli: &Cli) -> Result<()> {
    log::info!("Reading index: {}", args.index.display());

    let text = std::fs::read_to_string(&args.index)
        .with_context(|| format!("Cannot read index {}", args.index.display()))?;
    let entries = parse_index(&text, cli.strict)?;

    if entries.is_empty() {
        println!("The index lists no streams.");
        return Ok(());
    }

    println!();
    println!("PlayStation Stream Index");
    println!("========================");

    for entry in &entries {
        println!();
        match entry {
            IndexEntry::Audio(stream) => display_audio(stream),
            IndexEntry::Video(stream) => display_video(stream, disc_speed_near(stream, &entries)),
        }
    }
    println!();

    Ok(())
}

/// Loads records one by one so a bad record does not hide the rest.
pub fn parse_index(text: &str, strict: bool) -> Result<Vec<IndexEntry>> {
    let records: Vec<serde_yaml_ng::Value> = serde_yaml_ng::from_str(text)?;
    let mut entries = Vec::with_capacity(records.len());

    for (number, record) in records.into_iter().enumerate() {
        match serde_yaml_ng::from_value::<IndexEntry>(record) {
            Ok(entry) => entries.push(entry),
            Err(e) => {
                if strict {
                    bail!("Invalid index record {number}: {e}");
                }
                log::warn!("Skipping invalid index record {number}: {e}");
            }
        }
    }

    Ok(entries)
}

/// Disc speed of an audio stream interleaved with `video`, if any.
fn disc_speed_near(video: &FinalizedVideoStream, entries: &[IndexEntry]) -> Option<DiscSpeed> {
    entries.iter().find_map(|entry| match entry {
        IndexEntry::Audio(audio)
            if audio.start_sector <= video.end_sector && video.start_sector <= audio.end_sector =>
        {
            audio.disc_speed
        }
        _ => None,
    })
}

fn display_audio(stream: &FinalizedAudioStream) {
    let format = &stream.format;

    println!("XA audio                    file {} channel {}", format.file, format.channel);
    println!(
        "Sectors                     {}-{} ({} - {})",
        stream.start_sector,
        stream.end_sector,
        msf_str(stream.start_sector),
        msf_str(stream.end_sector)
    );
    println!(
        "Format                      {} Hz, {}-bit, {}",
        format.sample_rate,
        format.bits_per_sample,
        if format.stereo { "stereo" } else { "mono" }
    );
    if stream.stride.is_known() {
        println!("Sector stride               {}", stream.stride);
    } else {
        println!("Sector stride               unknown (single sector)");
    }
    println!("Disc speed                  {}", DiscSpeed::to_field(stream.disc_speed));
    println!("Duration                    {}", time_str(stream.duration_secs()));
    if stream.is_silent() {
        println!("Content                     silent");
    } else {
        println!(
            "Content                     {} of {} sectors audible",
            stream.audible_sectors.count(),
            stream.sector_count()
        );
    }
}

fn display_video(stream: &FinalizedVideoStream, speed: Option<DiscSpeed>) {
    let frames = &stream.frame_format;

    println!("STR video                   channel {}", stream.channel);
    println!(
        "Sectors                     {}-{} ({} - {})",
        stream.start_sector,
        stream.end_sector,
        msf_str(stream.start_sector),
        msf_str(stream.end_sector)
    );
    println!("Dimensions                  {}x{}", stream.width, stream.height);
    println!(
        "Frames                      {} ({} to {})",
        stream.frame_count,
        frames.label(frames.first),
        frames.label(frames.last)
    );
    println!("Sectors/frame               {}", stream.sectors_per_frame);
    println!(
        "Presentation offset         {} sectors",
        stream.presentation_offset
    );

    // Without interleaved audio the speed is unknown, show both.
    let speeds = match speed {
        Some(speed) => vec![speed],
        None => vec![DiscSpeed::Single, DiscSpeed::Double],
    };
    for speed in speeds {
        let label = format!("At {speed}");
        match (stream.frames_per_second(speed), stream.duration_secs(speed)) {
            (Some(fps), Some(duration)) => {
                println!("{label:<28}{fps:.3} fps, {}", time_str(duration))
            }
            _ => println!("{label:<28}unknown frame rate"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_records_are_skipped() -> anyhow::Result<()> {
        let text = r#"
- Type: Video
  Start sector: 10
  End sector: 109
  Channel: 0
  Width: 320
  Height: 240
  Frames: 10
  Frame digits: 2
  First frame: 1
  Last frame: 10
  Sectors/frame: 10/1
  Presentation offset: 9
- Type: Audio
  Start sector: 0
  End sector: 80
  File: 1
  Channel: 0
  Samples/sec: 44100
  Bits/sample: 4
  Stereo: true
  Sector stride: 8
  Disc speed: 2x
- Type: Subtitles
  Start sector: 0
"#;

        let entries = parse_index(text, false)?;
        assert_eq!(entries.len(), 1);
        let IndexEntry::Video(stream) = &entries[0] else {
            panic!("expected a video record");
        };
        assert_eq!(stream.frame_count, 10);
        assert_eq!(stream.frames_per_second(DiscSpeed::Double), Some(15.0));

        assert!(parse_index(text, true).is_err());
        Ok(())
    }
}
