//! Data structures representing disc and stream components.
//!
//! Contains the classified sector model, the finalized audio and video stream
//! records persisted in index files, and the MDEC code produced by the frame
//! decoder.

pub mod audio;
pub mod frame;
pub mod mdec;
pub mod sector;
pub mod video;
