//! Codec configuration and backend option translation.

use miniz_oxide::deflate::core::create_comp_flags_from_zip_params;

/// Framing around the raw DEFLATE bit stream.
///
/// Selection follows the zlib `windowBits` convention: raw uses the negative
/// window, zlib the positive window, gzip the window plus the gzip header
/// offset, and detect sniffs the input framing (zlib or gzip) from its first
/// two bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Wrap {
    /// Bare DEFLATE stream with no header or trailer.
    Raw,
    /// zlib framing: 2-byte header plus Adler-32 trailer.
    #[default]
    Zlib,
    /// gzip framing: 10-byte header plus CRC-32/size trailer.
    Gzip,
    /// Input-side autodetection between zlib and gzip.
    ///
    /// Only valid for decompression; compressing with `Detect` is rejected.
    Detect,
}

/// Speed/ratio tradeoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Level {
    /// Stored blocks only, no compression.
    None,
    /// The backend's balanced default.
    #[default]
    Default,
    /// Best ratio, slowest.
    Best,
}

impl Level {
    pub(crate) fn miniz_level(self) -> i32 {
        match self {
            Level::None => 0,
            Level::Default => 6,
            Level::Best => 9,
        }
    }

    pub(crate) fn to_flate2(self) -> flate2::Compression {
        match self {
            Level::None => flate2::Compression::none(),
            Level::Default => flate2::Compression::default(),
            Level::Best => flate2::Compression::best(),
        }
    }
}

/// Entropy-coder strategy.
///
/// Applied to raw and zlib streams. Gzip streams always use the default
/// strategy: their framing is owned by flate2, which does not expose the
/// strategy knob.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Strategy {
    /// General-purpose matching.
    #[default]
    Default,
    /// For data produced by a filter/predictor; favors shorter matches.
    Filtered,
    /// Huffman coding only, no string matching.
    HuffmanOnly,
    /// Run-length matching only.
    Rle,
}

impl Strategy {
    pub(crate) fn miniz_strategy(self) -> i32 {
        match self {
            Strategy::Default => 0,
            Strategy::Filtered => 1,
            Strategy::HuffmanOnly => 2,
            Strategy::Rle => 3,
        }
    }
}

/// Configuration for [`DeflateSink`](super::DeflateSink) and
/// [`InflateSource`](super::InflateSource).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CompressionOptions {
    /// Stream framing.
    pub wrap: Wrap,
    /// Compression level (ignored on decompression).
    pub level: Level,
    /// Entropy strategy (ignored on decompression).
    pub strategy: Strategy,
}

impl CompressionOptions {
    /// Options with the given framing and default level/strategy.
    pub fn with_wrap(wrap: Wrap) -> Self {
        Self {
            wrap,
            ..Self::default()
        }
    }

    /// Replaces the compression level.
    pub fn level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    /// Replaces the entropy strategy.
    pub fn strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Backend flags for a raw or zlib compression stream.
    ///
    /// `zlib_header` selects the positive window (zlib framing) versus the
    /// negative window (raw).
    pub(crate) fn stream_flags(&self, zlib_header: bool) -> u32 {
        let window_bits = if zlib_header { 15 } else { -15 };
        create_comp_flags_from_zip_params(
            self.level.miniz_level(),
            window_bits,
            self.strategy.miniz_strategy(),
        )
    }
}
