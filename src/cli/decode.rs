use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::thread;

use anyhow::Result;
use indicatif::{MultiProgress, ProgressBar};
use psxstr::process::decode::{DecodedFrame, Decoder};
use psxstr::process::index::IndexEvent;

use super::command::{Cli, DecodeArgs};
use super::progress::{create_progress_bar, finished_style};
use super::scan::Scanner;
use crate::input::DiscReader;

/// Counters reported by the decoder thread once the image is exhausted.
#[derive(Debug, Default)]
struct DecodeSummary {
    sectors: usize,
    unreadable: usize,
    frames_decoded: usize,
    frames_aborted: usize,
    frames_discarded: usize,
    video_streams: usize,
}

struct DecoderThreadConfig {
    input_path: PathBuf,
    channel: Option<u8>,
    tx: mpsc::Sender<Result<DecodedFrame>>,
    pb: Option<ProgressBar>,
    scanner: Scanner,
    decoder: Decoder,
}

fn spawn_decoder_thread(config: DecoderThreadConfig) -> thread::JoinHandle<Result<DecodeSummary>> {
    thread::spawn(move || -> Result<DecodeSummary> {
        let DecoderThreadConfig {
            input_path,
            channel,
            tx,
            pb,
            mut scanner,
            mut decoder,
        } = config;

        let mut video_streams = 0;
        let mut input_reader = DiscReader::new(&input_path)?;

        // Returns false once the receiver is gone or a frame failed in strict mode.
        let mut drain = |scanner: &mut Scanner, decoder: &mut Decoder| -> bool {
            for event in scanner.indexer.by_ref() {
                match event {
                    IndexEvent::Frame(frame) => {
                        if channel.is_some_and(|wanted| wanted != frame.channel) {
                            continue;
                        }
                        match decoder.decode_frame(&frame) {
                            Ok(Some(decoded)) => {
                                if tx.send(Ok(decoded)).is_err() {
                                    return false;
                                }
                            }
                            Ok(None) => {}
                            Err(e) => {
                                let _ = tx.send(Err(e));
                                return false;
                            }
                        }
                    }
                    IndexEvent::Video(stream) => {
                        video_streams += 1;
                        log::info!("Video stream finished: {stream}");
                    }
                    IndexEvent::Audio(stream) => {
                        log::debug!(
                            "Audio stream finished: sectors {}-{}, {}",
                            stream.start_sector,
                            stream.end_sector,
                            stream.format
                        );
                    }
                }
            }
            true
        };

        input_reader.process_sectors(|number, raw| {
            if let Some(ref pb) = pb {
                pb.set_position(number as u64 + 1);
            }

            if let Err(e) = scanner.push_raw(number, raw) {
                let _ = tx.send(Err(e));
                return Ok(false);
            }
            Ok(drain(&mut scanner, &mut decoder))
        })?;

        match scanner.indexer.finish() {
            Ok(()) => {
                drain(&mut scanner, &mut decoder);
            }
            Err(e) => {
                let _ = tx.send(Err(e));
            }
        }

        log::info!(
            "Processing complete: {} sectors, {} frames decoded",
            scanner.indexer.sectors_indexed(),
            decoder.frames_decoded()
        );

        Ok(DecodeSummary {
            sectors: scanner.indexer.sectors_indexed(),
            unreadable: scanner.unreadable(),
            frames_decoded: decoder.frames_decoded(),
            frames_aborted: decoder.frames_aborted(),
            frames_discarded: scanner.indexer.frames_discarded(),
            video_streams,
        })
    })
}

/// `ch00_f000123.mdec` style name of a frame dump.
fn frame_path(dir: &Path, frame: &DecodedFrame) -> PathBuf {
    dir.join(format!(
        "ch{:02}_f{:06}.mdec",
        frame.channel, frame.frame_number
    ))
}

fn write_frame(dir: &Path, frame: &DecodedFrame) -> Result<()> {
    let path = frame_path(dir, frame);
    log::trace!("Writing {}", path.display());

    let mut writer = BufWriter::new(File::create(path)?);
    writer.write_all(&frame.to_bytes())?;
    writer.flush()?;
    Ok(())
}

pub fn cmd_decode(args: &DecodeArgs, cli: &Cli, multi: Option<&MultiProgress>) -> Result<()> {
    macro_rules! pb_update {
        ($pb:expr, $method:ident($($args:expr),*)) => {
            if let Some(ref pb) = $pb {
                pb.$method($($args),*);
            }
        };
    }

    log::info!(
        "Decoding STR video: {} (strict mode: {}, variant: {:?})",
        args.input.display(),
        cli.strict,
        args.variant
    );

    if let Some(dir) = &args.output_path {
        log::info!("Output path specified: {}", dir.display());
        std::fs::create_dir_all(dir)?;
    }

    let total_sectors = DiscReader::image_sectors(&args.input);
    if total_sectors.is_none() {
        log::debug!("Image size unknown, progress shows a spinner");
    }

    let pb = match multi {
        Some(multi) => Some(create_progress_bar(multi, total_sectors, "initializing decoder")?),
        None => None,
    };

    let mut scanner = Scanner::new(cli);
    scanner.indexer.set_emit_frames(true);

    let mut decoder = Decoder::default();
    decoder.set_fail_level(cli.fail_level());
    decoder.set_variant(args.variant.to_variant());

    let (tx, rx) = mpsc::channel();
    let decode_thread = spawn_decoder_thread(DecoderThreadConfig {
        input_path: args.input.clone(),
        channel: args.channel,
        tx,
        pb: pb.clone(),
        scanner,
        decoder,
    });

    let start_time = std::time::Instant::now();
    let mut frames_received = 0u64;
    let mut codes_received = 0u64;

    while let Ok(result) = rx.recv() {
        match result {
            Ok(decoded) => {
                frames_received += 1;
                codes_received += decoded.codes.len() as u64;

                if let Some(dir) = &args.output_path {
                    write_frame(dir, &decoded)?;
                }

                if frames_received.is_multiple_of(30) {
                    let fps = frames_received as f64 / start_time.elapsed().as_secs_f64();
                    pb_update!(
                        pb,
                        set_message(format!("frames: {frames_received} | speed: {fps:.1} fps"))
                    );
                }
            }
            Err(e) => {
                pb_update!(pb, finish_with_message("decode failed"));
                return Err(e);
            }
        }
    }

    // Wait for decode thread to complete
    match decode_thread.join() {
        Ok(Ok(summary)) => {
            if let Some(ref pb) = pb {
                pb.set_style(finished_style(total_sectors.is_some()));
                pb.finish_with_message(format!(
                    "frames: {frames_received} | codes: {codes_received}"
                ));
            }

            log::info!(
                "Decoded {} frames from {} video streams ({} sectors, {} unreadable)",
                summary.frames_decoded,
                summary.video_streams,
                summary.sectors,
                summary.unreadable
            );
            if summary.frames_aborted > 0 || summary.frames_discarded > 0 {
                log::warn!(
                    "{} frames aborted while decoding, {} incomplete frames discarded",
                    summary.frames_aborted,
                    summary.frames_discarded
                );
            }
        }
        Ok(Err(e)) => {
            pb_update!(pb, finish_with_message("decode failed"));
            return Err(e);
        }
        Err(_) => {
            pb_update!(pb, finish_with_message("decode thread panicked"));
            return Err(anyhow::anyhow!("Decode thread panicked"));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_dump_names() {
        use psxstr::structs::frame::Variant;

        let frame = DecodedFrame {
            channel: 1,
            frame_number: 42,
            variant: Variant::StrV2,
            codes: Vec::new(),
        };
        assert_eq!(
            frame_path(Path::new("out"), &frame),
            Path::new("out").join("ch01_f000042.mdec")
        );
    }
}
