//! PCM16 frame encoding.
//!
//! The streaming transport sends fixed-size frames of signed 16-bit PCM.
//! [`FrameEncoder`] consumes the raw `f32` blocks produced by the capture
//! layer, converts them with symmetric scaling, and emits [`AudioFrame`]s of
//! exactly [`FRAME_SAMPLES`] samples.  Any sub-frame tail is carried over to
//! the next call, so no sample is ever dropped in steady state.
//!
//! Encoding never fails: out-of-range input is clamped to `[-1.0, 1.0]`.

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Samples per outbound frame (mono, 16 kHz — 32 ms of audio).
pub const FRAME_SAMPLES: usize = 512;

/// Sample rate every frame is encoded at, in Hz.
pub const FRAME_SAMPLE_RATE: u32 = 16_000;

// ---------------------------------------------------------------------------
// Sample conversion
// ---------------------------------------------------------------------------

/// Convert a single `f32` sample to signed 16-bit PCM.
///
/// The input is clamped to `[-1.0, 1.0]` and scaled symmetrically: negative
/// values by 32 768, positive values by 32 767, so both `-1.0` and `1.0` map
/// to the extreme representable values without overflow.
///
/// ```
/// use talkcoach::audio::encode_sample;
///
/// assert_eq!(encode_sample(-1.0), i16::MIN);
/// assert_eq!(encode_sample(1.0), i16::MAX);
/// assert_eq!(encode_sample(0.0), 0);
/// assert_eq!(encode_sample(2.5), i16::MAX); // clamped
/// ```
pub fn encode_sample(s: f32) -> i16 {
    let s = s.clamp(-1.0, 1.0);
    if s < 0.0 {
        (s * 32_768.0) as i16
    } else {
        (s * 32_767.0) as i16
    }
}

/// Inverse of [`encode_sample`]: recover an `f32` in `[-1.0, 1.0]`.
///
/// Round-trip error is bounded by one quantisation step (1/32768).
pub fn decode_sample(v: i16) -> f32 {
    if v < 0 {
        v as f32 / 32_768.0
    } else {
        v as f32 / 32_767.0
    }
}

// ---------------------------------------------------------------------------
// AudioFrame
// ---------------------------------------------------------------------------

/// One fixed-length frame of signed 16-bit PCM, mono, 16 kHz.
///
/// Frames are immutable once produced by the encoder.  Ownership moves to
/// the transport on send and the frame is discarded after transmission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioFrame {
    samples: Vec<i16>,
}

impl AudioFrame {
    /// Build a frame from exactly [`FRAME_SAMPLES`] samples.
    ///
    /// # Panics
    ///
    /// Panics when `samples.len() != FRAME_SAMPLES`.
    pub fn new(samples: Vec<i16>) -> Self {
        assert_eq!(samples.len(), FRAME_SAMPLES, "frame must be {FRAME_SAMPLES} samples");
        Self { samples }
    }

    /// The PCM samples (always exactly [`FRAME_SAMPLES`] long).
    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    /// Little-endian byte view for the wire (`FRAME_SAMPLES * 2` bytes).
    pub fn to_le_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.samples.len() * 2);
        for s in &self.samples {
            bytes.extend_from_slice(&s.to_le_bytes());
        }
        bytes
    }
}

// ---------------------------------------------------------------------------
// FrameEncoder
// ---------------------------------------------------------------------------

/// Converts raw `f32` sample blocks into [`AudioFrame`]s.
///
/// Stateless across frames except for the carried tail: when a call leaves
/// fewer than [`FRAME_SAMPLES`] samples, they are retained and prepended to
/// the next block.
///
/// # Example
///
/// ```
/// use talkcoach::audio::{FrameEncoder, FRAME_SAMPLES};
///
/// let mut enc = FrameEncoder::new();
/// let frames = enc.push(&vec![0.0_f32; 1034]);
/// assert_eq!(frames.len(), 2);         // 2 × 512 emitted
/// assert_eq!(enc.pending(), 10);       // 1034 − 1024 carried over
/// ```
#[derive(Debug, Default)]
pub struct FrameEncoder {
    tail: Vec<i16>,
}

impl FrameEncoder {
    pub fn new() -> Self {
        Self { tail: Vec::new() }
    }

    /// Encode `samples` and emit every complete frame.
    ///
    /// Output frame count is `(pending + samples.len()) / FRAME_SAMPLES`;
    /// the remainder stays buffered for the next call.
    pub fn push(&mut self, samples: &[f32]) -> Vec<AudioFrame> {
        self.tail.reserve(samples.len());
        for &s in samples {
            self.tail.push(encode_sample(s));
        }

        let mut frames = Vec::with_capacity(self.tail.len() / FRAME_SAMPLES);
        while self.tail.len() >= FRAME_SAMPLES {
            let rest = self.tail.split_off(FRAME_SAMPLES);
            let full = std::mem::replace(&mut self.tail, rest);
            frames.push(AudioFrame { samples: full });
        }
        frames
    }

    /// Emit the carried tail as a final frame, padded with silence.
    ///
    /// Returns `None` when no samples are pending.  Used at end of capture
    /// so the last partial block still reaches the service.
    pub fn flush(&mut self) -> Option<AudioFrame> {
        if self.tail.is_empty() {
            return None;
        }
        let mut samples = std::mem::take(&mut self.tail);
        samples.resize(FRAME_SAMPLES, 0);
        Some(AudioFrame { samples })
    }

    /// Number of samples currently carried between calls (< [`FRAME_SAMPLES`]).
    pub fn pending(&self) -> usize {
        self.tail.len()
    }

    /// Discard any carried tail (start of a new capture).
    pub fn reset(&mut self) {
        self.tail.clear();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
