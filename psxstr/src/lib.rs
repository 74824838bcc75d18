#![doc = include_str!("../README.md")]
//!
//! ## Technical Overview
//!
//! Indexer and bitstream decoder for PlayStation disc media: interleaved XA
//! ADPCM audio and STR video stored in raw 2352-byte Mode 2 sectors.
//!
//! ### Disc Organization
//!
//! **Audio**: XA sectors of one (file, channel) pair repeat every 1 to 32
//! sectors. The stride and audio format determine the disc speed.
//! **Video**: each frame is split over chunk sectors of 2016 payload bytes,
//! all tagged with the frame number and dimensions.
//!
//! ### Frame Bitstream Variants
//!
//! - STRv2 (10-bit DC, shared quantization scale)
//! - STRv3 (variable-length differential DC)
//! - Lain (separate luma and chroma scales, byte-oriented escapes)
//! - FF7 (STRv2 coding under version 1)
//!
//! ## Quick Start
//!
//! Steps for processing a disc image:
//!
//! 1. Classify raw sectors using [`structs::sector::Sector::from_raw`]
//! 2. Index streams and collect frames using [`process::index::Indexer`]
//! 3. Decode frames to MDEC codes using [`process::decode::Decoder`]
//!
//! ```rust,no_run
//! use psxstr::process::{decode::Decoder, index::{IndexEvent, Indexer}};
//! use psxstr::structs::sector::{SECTOR_SIZE, Sector};
//!
//! let image = std::fs::read("disc.bin")?;
//! let mut indexer = Indexer::default();
//! let mut decoder = Decoder::default();
//! indexer.set_emit_frames(true);
//!
//! for (number, raw) in image.chunks_exact(SECTOR_SIZE).enumerate() {
//!     let sector = Sector::from_raw(number as u32, raw)?;
//!     indexer.push_sector(&sector)?;
//!
//!     for event in &mut indexer {
//!         match event {
//!             IndexEvent::Frame(frame) => {
//!                 // Corrupt frames are reported and yield `None`
//!                 if let Some(decoded) = decoder.decode_frame(&frame)? {
//!                     println!("Frame {}: {} codes", decoded.frame_number, decoded.codes.len());
//!                 }
//!             }
//!             IndexEvent::Audio(stream) => println!("Audio {}", stream.format),
//!             IndexEvent::Video(stream) => println!("Video {stream}"),
//!         }
//!     }
//! }
//! indexer.finish()?;
//! # Ok::<(), anyhow::Error>(())
//! ```

/// Processing of sector streams and frame bitstreams.
///
/// 1. **Indexing** ([`process::index`]): Routes sectors and yields finished streams.
///
/// 2. **Stream Tracking** ([`process::audio`], [`process::demux`], [`process::video`]):
///    Groups audio sectors, reassembles frames, groups frames into streams.
///
/// 3. **Decoding** ([`process::decode`], [`process::encode`]): Converts between
///    frame bitstreams and MDEC codes.
pub mod process;

/// Data structures representing disc and stream components.
///
/// - **Sectors** ([`structs::sector`]): Raw sector classification
/// - **Audio Streams** ([`structs::audio`]): XA formats and finalized audio records
/// - **Video Streams** ([`structs::video`]): Frame numbering and finalized video records
/// - **Frames** ([`structs::frame`]): Bitstream variants and headers
/// - **MDEC Codes** ([`structs::mdec`]): Decoder output
pub mod structs;

/// Utility functions and supporting infrastructure.
///
/// - **Bitstream I/O** ([`utils::bitstream_io`]): Bit-level reading/writing
/// - **Code Tables** ([`utils::vlc`]): AC and DC variable-length codes
/// - **Disc Speed** ([`utils::disc_speed`]): Stride to drive speed mapping
/// - **Error Handling** ([`utils::errors`]): Error types
/// - **Buffer Management** ([`utils::buffer_pool`]): Frame buffer reuse
pub mod utils;
