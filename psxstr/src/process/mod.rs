/// Single-pass indexing over classified sectors.
///
/// Provides the [`Indexer`](index::Indexer), which routes sectors to the audio
/// tracker and the video demuxer and yields [`IndexEvent`](index::IndexEvent)s.
pub mod index;

/// XA audio stream grouping by (file, channel) and sector stride.
///
/// Provides the [`AudioStreamTracker`](audio::AudioStreamTracker).
pub mod audio;

/// Frame reassembly from STR video chunk sectors.
///
/// Provides the [`VideoFrameDemuxer`](demux::VideoFrameDemuxer) and the
/// [`DemuxedFrame`](demux::DemuxedFrame) it produces.
pub mod demux;

/// Video stream grouping, frame numbering and frame rate estimation.
///
/// Provides the [`VideoStreamTracker`](video::VideoStreamTracker).
pub mod video;

/// Frame bitstream decoding to MDEC codes.
///
/// Provides the pull-based [`FrameDecoder`](decode::FrameDecoder) and the
/// frame-level [`Decoder`](decode::Decoder) that contains corrupt frames.
pub mod decode;

/// Frame bitstream encoding from MDEC codes.
///
/// Provides the [`FrameEncoder`](encode::FrameEncoder).
pub mod encode;
