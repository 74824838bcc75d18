use std::fs::File;
use std::io::{BufWriter, Write};

use anyhow::Result;
use indicatif::MultiProgress;
use psxstr::process::index::IndexEvent;
use psxstr::structs::audio::FinalizedAudioStream;
use psxstr::structs::video::FinalizedVideoStream;
use serde::{Deserialize, Serialize};

use super::command::{Cli, IndexArgs};
use super::progress::{create_progress_bar, finished_style};
use super::scan::Scanner;
use crate::input::DiscReader;

/// One record of an index file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "Type")]
pub enum IndexEntry {
    Audio(FinalizedAudioStream),
    Video(FinalizedVideoStream),
}

impl IndexEntry {
    pub fn from_event(event: IndexEvent) -> Option<Self> {
        match event {
            IndexEvent::Audio(stream) => Some(IndexEntry::Audio(stream)),
            IndexEvent::Video(stream) => Some(IndexEntry::Video(stream)),
            IndexEvent::Frame(_) => None,
        }
    }

    pub fn start_sector(&self) -> u32 {
        match self {
            IndexEntry::Audio(stream) => stream.start_sector,
            IndexEntry::Video(stream) => stream.start_sector,
        }
    }
}

pub fn cmd_index(args: &IndexArgs, cli: &Cli, multi: Option<&MultiProgress>) -> Result<()> {
    log::info!(
        "Indexing disc image: {} (strict mode: {})",
        args.input.display(),
        cli.strict
    );

    let total_sectors = DiscReader::image_sectors(&args.input);
    let pb = match multi {
        Some(multi) => Some(create_progress_bar(multi, total_sectors, "scanning sectors")?),
        None => None,
    };

    let mut reader = DiscReader::new(&args.input)?;
    if reader.is_pipe() {
        log::debug!("Reading sectors from stdin");
    }
    let mut scanner = Scanner::new(cli);
    let mut entries = Vec::new();

    reader.process_sectors(|number, raw| {
        scanner.push_raw(number, raw)?;
        entries.extend(scanner.indexer.by_ref().filter_map(IndexEntry::from_event));

        if let Some(ref pb) = pb {
            pb.inc(1);
            if number % 750 == 0 {
                pb.set_message(format!("{} streams found", entries.len()));
            }
        }
        Ok(true)
    })?;

    scanner.indexer.finish()?;
    entries.extend(scanner.indexer.by_ref().filter_map(IndexEntry::from_event));
    entries.sort_by_key(IndexEntry::start_sector);

    if let Some(ref pb) = pb {
        pb.set_style(finished_style(total_sectors.is_some()));
        pb.finish_with_message(format!("{} streams found", entries.len()));
    }

    let yaml = serde_yaml_ng::to_string(&entries)?;
    match &args.output {
        Some(path) => {
            log::info!("Writing index: {}", path.display());
            let mut writer = BufWriter::new(File::create(path)?);
            writer.write_all(yaml.as_bytes())?;
            writer.flush()?;
            print_summary(&scanner, &entries);
        }
        None => {
            // The index owns stdout, the summary goes to the log.
            print!("{yaml}");
            log::info!(
                "Indexed {} sectors: {} streams",
                scanner.indexer.sectors_indexed(),
                entries.len()
            );
        }
    }

    Ok(())
}

fn print_summary(scanner: &Scanner, entries: &[IndexEntry]) {
    let audio = entries
        .iter()
        .filter(|entry| matches!(entry, IndexEntry::Audio(_)))
        .count();

    println!();
    println!("Index Summary");
    println!("=============");
    println!();
    println!("Sectors scanned             {}", scanner.indexer.sectors_indexed());
    println!("Unreadable sectors          {}", scanner.unreadable());
    println!("Audio streams               {audio}");
    println!("Video streams               {}", entries.len() - audio);
    println!("Discarded frames            {}", scanner.indexer.frames_discarded());
    println!(
        "Discarded audio sectors     {}",
        scanner.indexer.audio_sectors_discarded()
    );
    println!();

    for entry in entries {
        match entry {
            IndexEntry::Audio(stream) => println!(
                "  Audio  sectors {}-{}  {}",
                stream.start_sector, stream.end_sector, stream.format
            ),
            IndexEntry::Video(stream) => println!("  Video  {stream}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_entries_are_tagged() -> anyhow::Result<()> {
        use psxstr::structs::audio::{AudioFormat, SectorStride};
        use psxstr::utils::bitset::SectorBitSet;

        let format = AudioFormat {
            file: 1,
            channel: 2,
            sample_rate: 37800,
            bits_per_sample: 4,
            stereo: true,
        };
        let stream = FinalizedAudioStream::new(
            16,
            136,
            format,
            SectorStride::try_from(8)?,
            SectorBitSet::default(),
        )?;
        let entries = vec![IndexEntry::Audio(stream)];

        let yaml = serde_yaml_ng::to_string(&entries)?;
        assert!(yaml.contains("Type: Audio"));
        assert!(yaml.contains("Sector stride: 8"));

        let parsed: Vec<IndexEntry> = serde_yaml_ng::from_str(&yaml)?;
        assert_eq!(parsed, entries);
        Ok(())
    }
}
