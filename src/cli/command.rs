use std::path::PathBuf;

use clap::{Args, Parser as ClapParser, Subcommand, ValueEnum};
use psxstr::structs::frame::Variant;

#[derive(Debug, ClapParser)]
#[command(
    name       = env!("CARGO_PKG_NAME"),
    version    = env!("CARGO_PKG_VERSION"),
    author     = env!("CARGO_PKG_AUTHORS"),
    about      = "Tools for indexing PlayStation XA audio and STR video streams",
    long_about = None,
)]
pub struct Cli {
    /// Set the log level
    #[arg(long, global = true, value_enum, default_value_t = LogLevel::Info)]
    pub loglevel: LogLevel,

    /// Treat warnings as fatal errors (fail on first warning).
    #[arg(long, global = true)]
    pub strict: bool,

    /// Log output format.
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Plain)]
    pub log_format: LogFormat,

    /// Show progress bars during operations.
    #[arg(long, global = true)]
    pub progress: bool,

    /// Choose an operation to perform.
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Fail level handed to the library processing structs.
    pub fn fail_level(&self) -> log::Level {
        if self.strict {
            log::Level::Warn
        } else {
            log::Level::Error
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Scan a raw disc image and write an index of its audio and video streams.
    Index(IndexArgs),

    /// Print the streams recorded in an index file.
    Info(InfoArgs),

    /// Decode the STR video frames of a raw disc image into MDEC codes.
    Decode(DecodeArgs),
}

#[derive(Debug, Args)]
pub struct IndexArgs {
    /// Raw 2352-byte sector image (use "-" for stdin).
    #[arg(value_name = "INPUT")]
    pub input: PathBuf,

    /// Write the index to this file instead of stdout.
    #[arg(long, value_name = "PATH")]
    pub output: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct InfoArgs {
    /// Index file written by the index command.
    #[arg(value_name = "INDEX")]
    pub index: PathBuf,
}

#[derive(Debug, Args)]
pub struct DecodeArgs {
    /// Raw 2352-byte sector image (use "-" for stdin).
    #[arg(value_name = "INPUT")]
    pub input: PathBuf,

    /// Only decode frames of this video channel.
    #[arg(long, value_name = "N")]
    pub channel: Option<u8>,

    /// Directory receiving one .mdec file per decoded frame.
    #[arg(long, value_name = "DIR")]
    pub output_path: Option<PathBuf>,

    /// Frame bitstream variant.
    #[arg(long, value_enum, default_value_t = VariantArg::Auto)]
    pub variant: VariantArg,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum LogLevel {
    /// Disable logging output.
    Off,
    /// No output except errors.
    Error,
    /// Show warnings and errors.
    Warn,
    /// Show info, warnings and errors (default).
    Info,
    /// Show debug, info, warnings and errors.
    Debug,
    /// Show all log messages including trace.
    Trace,
}

impl LogLevel {
    /// Convert LogLevel to log::LevelFilter
    pub fn to_level_filter(self) -> log::LevelFilter {
        match self {
            LogLevel::Off => log::LevelFilter::Off,
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum LogFormat {
    /// Colorized human-readable text.
    Plain,
    /// Structured JSON per log record.
    Json,
}

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq)]
pub enum VariantArg {
    /// Detect the variant from each frame header.
    Auto,
    /// STR version 2.
    V2,
    /// STR version 3.
    V3,
    /// Serial Experiments Lain.
    Lain,
    /// Final Fantasy VII.
    Ff7,
}

impl VariantArg {
    pub fn to_variant(self) -> Option<Variant> {
        match self {
            VariantArg::Auto => None,
            VariantArg::V2 => Some(Variant::StrV2),
            VariantArg::V3 => Some(Variant::StrV3),
            VariantArg::Lain => Some(Variant::Lain),
            VariantArg::Ff7 => Some(Variant::Ff7),
        }
    }
}
