//! Audio pipeline — microphone capture → downmix/resample → PCM16 framing.
//!
//! # Pipeline
//!
//! ```text
//! Microphone → cpal callback → downmix_to_mono → resample_to_16k
//!           → CaptureHandle (mpsc) → FrameEncoder → AudioFrame (512 × i16)
//! ```
//!
//! # Quick start
//!
//! ```rust,no_run
//! use talkcoach::audio::{CaptureSource, FrameEncoder, MicCapture};
//!
//! # async fn example() {
//! let mut handle = MicCapture::new().open().unwrap();
//! let mut encoder = FrameEncoder::new();
//!
//! while let Some(block) = handle.next_block().await {
//!     for frame in encoder.push(&block) {
//!         println!("frame of {} samples", frame.samples().len());
//!     }
//! }
//! # }
//! ```

pub mod capture;
pub mod encoder;
pub mod resample;

pub use capture::{AudioError, CaptureHandle, CaptureSource, MicCapture};
pub use encoder::{
    decode_sample, encode_sample, AudioFrame, FrameEncoder, FRAME_SAMPLES, FRAME_SAMPLE_RATE,
};
pub use resample::{downmix_to_mono, resample_to_16k};
