// src/config.rs
//
// Session configuration: the `options` object carried by a `create`.

use serde::Deserialize;

use crate::error::ConfigError;

pub const DEFAULT_SAMPLING_RATE: u32 = 44_100;
pub const DEFAULT_CHUNK_SIZE: usize = 2048;
pub const DEFAULT_QUANTUM: usize = 128;
pub const DEFAULT_SLOT_COUNT: usize = 2;
pub const DEFAULT_LOOP_MAX_COUNT: usize = 2;
pub const DEFAULT_FEED_OUT_SECONDS: u32 = 2;

/// Sampling rates accepted from an override string.
pub const SUPPORTED_SAMPLING_RATES: [u32; 4] = [44_100, 48_000, 88_200, 96_000];

/// Relay and playback configuration for one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(from = "RelayOptions")]
pub struct RelayConfig {
    /// Output sampling rate in Hz.
    pub sampling_rate: u32,

    /// Frames produced by one engine `play()` call.
    pub chunk_size: usize,

    /// Frames requested by the audio callback per invocation.
    pub quantum: usize,

    /// Number of ring slots shared between generation and playback.
    pub slot_count: usize,

    /// Loop count at which fade-out (or end of a non-looping track) is armed.
    pub loop_max_count: usize,

    /// Chunks generated after fade-out starts before the track ends.
    pub feed_out_remain: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            sampling_rate: DEFAULT_SAMPLING_RATE,
            chunk_size: DEFAULT_CHUNK_SIZE,
            quantum: DEFAULT_QUANTUM,
            slot_count: DEFAULT_SLOT_COUNT,
            loop_max_count: DEFAULT_LOOP_MAX_COUNT,
            feed_out_remain: feed_out_chunks(
                DEFAULT_SAMPLING_RATE,
                DEFAULT_CHUNK_SIZE,
                DEFAULT_FEED_OUT_SECONDS,
            ),
        }
    }
}

/// Wire shape of the `create` options object.
///
/// Omitted fields take their defaults; a missing `feedOutRemain` is derived
/// from the rate and chunk size actually given.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RelayOptions {
    sampling_rate: u32,
    chunk_size: usize,
    quantum: usize,
    slot_count: usize,
    loop_max_count: usize,
    feed_out_remain: Option<usize>,
}

impl Default for RelayOptions {
    fn default() -> Self {
        Self {
            sampling_rate: DEFAULT_SAMPLING_RATE,
            chunk_size: DEFAULT_CHUNK_SIZE,
            quantum: DEFAULT_QUANTUM,
            slot_count: DEFAULT_SLOT_COUNT,
            loop_max_count: DEFAULT_LOOP_MAX_COUNT,
            feed_out_remain: None,
        }
    }
}

impl From<RelayOptions> for RelayConfig {
    fn from(options: RelayOptions) -> Self {
        let feed_out_remain = options.feed_out_remain.unwrap_or_else(|| {
            feed_out_chunks(
                options.sampling_rate,
                options.chunk_size,
                DEFAULT_FEED_OUT_SECONDS,
            )
        });
        Self {
            sampling_rate: options.sampling_rate,
            chunk_size: options.chunk_size,
            quantum: options.quantum,
            slot_count: options.slot_count,
            loop_max_count: options.loop_max_count,
            feed_out_remain,
        }
    }
}

impl RelayConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sampling_rate(mut self, sampling_rate: u32) -> Self {
        self.sampling_rate = sampling_rate;
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn with_quantum(mut self, quantum: usize) -> Self {
        self.quantum = quantum;
        self
    }

    pub fn with_slot_count(mut self, slot_count: usize) -> Self {
        self.slot_count = slot_count;
        self
    }

    pub fn with_loop_max_count(mut self, loop_max_count: usize) -> Self {
        self.loop_max_count = loop_max_count;
        self
    }

    pub fn with_feed_out_remain(mut self, feed_out_remain: usize) -> Self {
        self.feed_out_remain = feed_out_remain;
        self
    }

    /// Derive `feed_out_remain` from a fade length in seconds.
    pub fn with_feed_out_seconds(mut self, seconds: u32) -> Self {
        self.feed_out_remain = feed_out_chunks(self.sampling_rate, self.chunk_size, seconds);
        self
    }

    /// Apply a `#s=<rate>` override (as found in a page location hash).
    ///
    /// Unknown or unsupported rates fall back to the default rate.
    pub fn with_sampling_rate_override(self, hash: &str) -> Self {
        let rate = parse_sampling_rate_override(hash).unwrap_or(DEFAULT_SAMPLING_RATE);
        self.with_sampling_rate(rate)
    }

    /// Quanta needed to drain one chunk.
    #[inline]
    pub fn quanta_per_chunk(&self) -> usize {
        self.chunk_size / self.quantum
    }

    /// Length of the fade-out window in seconds.
    pub fn feed_out_seconds(&self) -> f64 {
        (self.chunk_size * self.feed_out_remain) as f64 / self.sampling_rate as f64
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sampling_rate == 0 {
            return Err(ConfigError::InvalidSamplingRate(self.sampling_rate));
        }
        if self.chunk_size == 0 {
            return Err(ConfigError::InvalidChunkSize(self.chunk_size));
        }
        if self.quantum == 0 {
            return Err(ConfigError::InvalidQuantum(self.quantum));
        }
        if self.chunk_size % self.quantum != 0 {
            return Err(ConfigError::QuantumMismatch {
                chunk_size: self.chunk_size,
                quantum: self.quantum,
            });
        }
        if self.slot_count < 2 {
            return Err(ConfigError::InvalidSlotCount(self.slot_count));
        }
        Ok(())
    }
}

/// Chunks covering `seconds` of audio, at least one.
pub fn feed_out_chunks(sampling_rate: u32, chunk_size: usize, seconds: u32) -> usize {
    if chunk_size == 0 {
        return 1;
    }
    let frames = sampling_rate as usize * seconds as usize;
    frames.div_ceil(chunk_size).max(1)
}

/// Parse `#s=<rate>`, accepting only supported rates.
pub fn parse_sampling_rate_override(hash: &str) -> Option<u32> {
    let digits = hash.strip_prefix("#s=")?;
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    let rate: u32 = digits[..end].parse().ok()?;
    SUPPORTED_SAMPLING_RATES.contains(&rate).then_some(rate)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = RelayConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.quanta_per_chunk(), 16);
        // 44100 * 2 / 2048 = 43.07 -> 44 chunks
        assert_eq!(config.feed_out_remain, 44);
    }

    #[test]
    fn test_rejects_bad_chunk_sizes() {
        let config = RelayConfig::default().with_chunk_size(0);
        assert_eq!(config.validate(), Err(ConfigError::InvalidChunkSize(0)));

        let config = RelayConfig::default().with_chunk_size(1000);
        assert_eq!(
            config.validate(),
            Err(ConfigError::QuantumMismatch {
                chunk_size: 1000,
                quantum: 128
            })
        );

        let config = RelayConfig::default().with_slot_count(1);
        assert_eq!(config.validate(), Err(ConfigError::InvalidSlotCount(1)));
    }

    #[test]
    fn test_sampling_rate_override() {
        assert_eq!(parse_sampling_rate_override("#s=48000"), Some(48_000));
        assert_eq!(parse_sampling_rate_override("#s=96000&x=1"), Some(96_000));
        assert_eq!(parse_sampling_rate_override("#s=22050"), None);
        assert_eq!(parse_sampling_rate_override("#s=abc"), None);
        assert_eq!(parse_sampling_rate_override(""), None);

        let config = RelayConfig::default().with_sampling_rate_override("#s=12345");
        assert_eq!(config.sampling_rate, DEFAULT_SAMPLING_RATE);
    }

    #[test]
    fn test_deserialize_create_options() {
        let json = r#"{"samplingRate":48000,"chunkSize":768,"loopMaxCount":2,"feedOutRemain":3}"#;
        let config: RelayConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.sampling_rate, 48_000);
        assert_eq!(config.chunk_size, 768);
        assert_eq!(config.quantum, DEFAULT_QUANTUM);
        assert_eq!(config.feed_out_remain, 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_deserialize_derives_feed_out_from_given_rate() {
        let json = r#"{"samplingRate":48000,"chunkSize":768,"loopMaxCount":2}"#;
        let config: RelayConfig = serde_json::from_str(json).unwrap();
        // 48000 * 2 / 768 = 125 chunks
        assert_eq!(config.feed_out_remain, 125);
        assert!((config.feed_out_seconds() - 2.0).abs() < 1e-9);

        let config: RelayConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, RelayConfig::default());
    }

    #[test]
    fn test_feed_out_chunks_minimum() {
        assert_eq!(feed_out_chunks(44_100, 1 << 20, 2), 1);
        assert_eq!(feed_out_chunks(48_000, 768, 0), 1);
    }
}
