#[macro_export]
macro_rules! log_or_err {
    ($state:expr, $level:expr, $err:expr $(,)?) => {{
        if $level <= $state.fail_level {
            return Err($err.into());
        } else {
            match $level {
                ::log::Level::Error => ::log::error!("{}", $err),
                ::log::Level::Warn => ::log::warn!("{}", $err),
                ::log::Level::Info => ::log::info!("{}", $err),
                ::log::Level::Debug => ::log::debug!("{}", $err),
                ::log::Level::Trace => ::log::trace!("{}", $err),
            }
        }
    }};
}

#[derive(thiserror::Error, Debug)]
pub enum SectorError {
    #[error("Raw sector must be 2352 bytes, got {0}")]
    InvalidLength(usize),

    #[error("Missing CD sync pattern at sector {0}")]
    MissingSyncPattern(u32),

    #[error("Unsupported sector mode {mode} at sector {sector}")]
    UnsupportedMode { sector: u32, mode: u8 },

    #[error("Subheader copies disagree at sector {0}")]
    SubheaderMismatch(u32),
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum HeaderError {
    #[error("Frame too short for a header: {0} bytes")]
    TooShort(usize),

    #[error("Invalid frame magic. Read {0:#06X}, expected 0x3800")]
    InvalidMagic(u16),

    #[error("Frame version {read} does not match {expected}")]
    VersionMismatch { read: u16, expected: u16 },

    #[error("Quantization scale must be between 1 and 63. Read {0}")]
    QuantizationScaleOutOfRange(u16),

    #[error("Declared code count is negative: {0}")]
    NegativeCodeCount(i16),

    #[error("No known bitstream variant accepts this frame header")]
    UnknownVariant,
}

#[derive(thiserror::Error, Debug)]
pub enum FrameError {
    #[error(
        "Coefficient position {position} exceeds 64 in macroblock {macroblock}, block {block}"
    )]
    CoefficientOverflow {
        macroblock: usize,
        block: usize,
        position: usize,
    },

    #[error("Unknown AC code {bits:#019b} in macroblock {macroblock}, block {block}")]
    UnknownAcCode {
        bits: u32,
        macroblock: usize,
        block: usize,
    },

    #[error("Unknown DC size code {bits:#011b} in macroblock {macroblock}, block {block}")]
    UnknownDcCode {
        bits: u32,
        macroblock: usize,
        block: usize,
    },

    #[error("DC value {value} outside the 10-bit range in macroblock {macroblock}, block {block}")]
    DcOutOfRange {
        value: i32,
        macroblock: usize,
        block: usize,
    },

    #[error("Unexpected end of bitstream in macroblock {macroblock}, block {block}")]
    EndOfInput { macroblock: usize, block: usize },

    #[error("Frame has zero width or height ({width}x{height})")]
    InvalidDimensions { width: u16, height: u16 },

    #[error(transparent)]
    Header(#[from] HeaderError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(thiserror::Error, Debug)]
pub enum DecodeError {
    #[error("Aborted frame {frame} on channel {channel} (sectors {start}-{end}): {source}")]
    AbortedFrame {
        frame: u32,
        channel: u8,
        start: u32,
        end: u32,
        source: FrameError,
    },
}

#[derive(thiserror::Error, Debug)]
pub enum EncodeError {
    #[error("Code sequence does not begin a block with a DC code at block {0}")]
    MissingDc(usize),

    #[error("Block {0} has no end-of-block code")]
    UnterminatedBlock(usize),

    #[error("Run of {0} zeros cannot be encoded (0..=63)")]
    RunOutOfRange(u8),

    #[error("AC level {level} cannot be encoded by {variant}")]
    LevelOutOfRange { level: i16, variant: &'static str },

    #[error("DC {value} is not reachable from {previous} in steps of 4")]
    UnreachableDc { value: i16, previous: i16 },

    #[error("DC differential {0} needs more than 8 size bits")]
    DcDifferentialTooLarge(i32),

    #[error("Quantization scale {0} outside 1..=63")]
    QuantizationScale(u8),

    #[error("Expected {expected} macroblocks worth of blocks, got {actual} blocks")]
    BlockCountMismatch { expected: usize, actual: usize },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(thiserror::Error, Debug)]
pub enum IndexError {
    #[error("Sector {current} arrived after sector {previous}; sectors must be fed in ascending order")]
    OutOfOrderSector { previous: u32, current: u32 },

    #[error("Duplicate frame number {frame} on channel {channel} at sector {sector}")]
    DuplicateFrameNumber { channel: u8, frame: u32, sector: u32 },

    #[error("Frame number {frame} on channel {channel} precedes {previous} at sector {sector}")]
    FrameNumberBackwards {
        channel: u8,
        frame: u32,
        previous: u32,
        sector: u32,
    },

    #[error("Discarding incomplete frame {frame} on channel {channel} ({received} of {expected} bytes, sectors {start}-{end})")]
    IncompleteFrame {
        channel: u8,
        frame: u32,
        received: usize,
        expected: usize,
        start: u32,
        end: u32,
    },

    #[error("Chunk {chunk} of frame {frame} at sector {sector} does not match the frame being assembled")]
    InconsistentChunk { frame: u32, chunk: u16, sector: u32 },
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum RecordError {
    #[error("Sector stride must be one of -1, 1, 2, 4, 8, 16, 32. Read {0}")]
    InvalidStride(i32),

    #[error("Disc speed must be \"1x\", \"2x\" or \"?\". Read {0:?}")]
    InvalidDiscSpeed(String),

    #[error("Disc speed {speed} is not possible with sector stride {stride}")]
    DiscSpeedMismatch { speed: String, stride: i32 },

    #[error("Samples/sec must be 18900 or 37800. Read {0}")]
    InvalidSampleRate(u32),

    #[error("Bits/sample must be 4 or 8. Read {0}")]
    InvalidBitsPerSample(u8),

    #[error("End sector {end} precedes start sector {start}")]
    InvalidSectorRange { start: u32, end: u32 },

    #[error("Invalid fraction {0:?}")]
    InvalidFraction(String),

    #[error("Invalid sector bit set {0:?}")]
    InvalidBitSet(String),

    #[error("Video dimensions must be non-zero. Read {width}x{height}")]
    InvalidDimensions { width: u16, height: u16 },

    #[error("Video stream must contain at least one frame")]
    NoFrames,

    #[error("Frame numbers run backwards: first {first}, last {last}")]
    InvalidFrameRange { first: u32, last: u32 },
}
