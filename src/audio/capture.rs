//! Microphone capture via `cpal`.
//!
//! [`MicCapture`] implements [`CaptureSource`], acquiring the default input
//! device and delivering **16 kHz mono `f32`** blocks through the returned
//! [`CaptureHandle`].  Downmix and resampling happen inside the cpal
//! callback, so downstream consumers never see the device's native format.
//!
//! `cpal::Stream` is not `Send` on every platform, so each `open()` spawns a
//! dedicated OS thread that owns the stream for its whole life.  The handle
//! talks to that thread only through channels: raw blocks flow out over a
//! bounded tokio mpsc channel (the callback uses `try_send` and drops blocks
//! when the consumer lags — realtime audio tolerates small loss better than
//! backpressure stalls), and [`CaptureHandle::close`] unparks the thread so
//! it drops the stream.
//!
//! Echo cancellation and noise suppression are left to the platform input
//! stack; cpal exposes no portable toggle for them.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::sync::mpsc as std_mpsc;
use thiserror::Error;
use tokio::sync::mpsc;

use super::{downmix_to_mono, resample_to_16k};

// ---------------------------------------------------------------------------
// AudioError
// ---------------------------------------------------------------------------

/// Errors that can occur while acquiring or running the input device.
#[derive(Debug, Clone, Error)]
pub enum AudioError {
    /// The platform refused access to the microphone.
    #[error("microphone access denied — check input permissions")]
    PermissionDenied,

    /// No usable input device exists (or it disappeared during setup).
    #[error("no audio input device available")]
    DeviceUnavailable,

    /// Any other backend failure (unsupported format, stream error, …).
    #[error("audio backend error: {0}")]
    Backend(String),
}

/// Best-effort classification of a cpal backend message.
///
/// cpal surfaces OS permission failures as backend-specific strings, so we
/// match on the description to keep `PermissionDenied` distinct from other
/// backend errors.
fn classify_backend(msg: String) -> AudioError {
    let lower = msg.to_lowercase();
    if lower.contains("permission") || lower.contains("denied") || lower.contains("not allowed") {
        AudioError::PermissionDenied
    } else {
        AudioError::Backend(msg)
    }
}

impl From<cpal::DefaultStreamConfigError> for AudioError {
    fn from(e: cpal::DefaultStreamConfigError) -> Self {
        match e {
            cpal::DefaultStreamConfigError::DeviceNotAvailable => AudioError::DeviceUnavailable,
            other => classify_backend(other.to_string()),
        }
    }
}

impl From<cpal::BuildStreamError> for AudioError {
    fn from(e: cpal::BuildStreamError) -> Self {
        match e {
            cpal::BuildStreamError::DeviceNotAvailable => AudioError::DeviceUnavailable,
            other => classify_backend(other.to_string()),
        }
    }
}

impl From<cpal::PlayStreamError> for AudioError {
    fn from(e: cpal::PlayStreamError) -> Self {
        match e {
            cpal::PlayStreamError::DeviceNotAvailable => AudioError::DeviceUnavailable,
            other => classify_backend(other.to_string()),
        }
    }
}

// ---------------------------------------------------------------------------
// CaptureHandle
// ---------------------------------------------------------------------------

/// Live handle to an open capture stream.
///
/// Yields 16 kHz mono blocks via [`next_block`](Self::next_block) until
/// closed.  The sample sequence is infinite while open and not restartable —
/// a fresh `open()` creates an independent stream.
///
/// [`close`](Self::close) is idempotent and also runs on drop, so the
/// microphone is always released.
pub struct CaptureHandle {
    blocks: mpsc::Receiver<Vec<f32>>,
    stop: Option<std_mpsc::Sender<()>>,
}

impl CaptureHandle {
    /// Assemble a handle from its parts.
    ///
    /// `stop` is signalled (once) on close; pass `None` for sources that
    /// need no teardown signal, e.g. test doubles feeding a channel.
    pub fn new(blocks: mpsc::Receiver<Vec<f32>>, stop: Option<std_mpsc::Sender<()>>) -> Self {
        Self { blocks, stop }
    }

    /// Await the next raw sample block.
    ///
    /// Returns `None` once the stream has been closed and all in-flight
    /// blocks have been drained.
    pub async fn next_block(&mut self) -> Option<Vec<f32>> {
        self.blocks.recv().await
    }

    /// Release the underlying device. Safe to call repeatedly; later calls
    /// are no-ops.
    pub fn close(&mut self) {
        if let Some(stop) = self.stop.take() {
            // The capture thread may already be gone; either way the stream
            // ends up dropped.
            let _ = stop.send(());
            self.blocks.close();
            log::debug!("capture handle closed");
        }
    }

    /// `true` once [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.stop.is_none()
    }
}

impl Drop for CaptureHandle {
    fn drop(&mut self) {
        self.close();
    }
}

// ---------------------------------------------------------------------------
// CaptureSource trait
// ---------------------------------------------------------------------------

/// Object-safe, thread-safe interface for audio sources.
///
/// The session controller only ever talks to this trait, which keeps the
/// pipeline unit-testable without microphone hardware.
pub trait CaptureSource: Send + Sync {
    /// Acquire the input device and start streaming.
    ///
    /// # Errors
    ///
    /// - [`AudioError::PermissionDenied`] — access to the microphone was
    ///   refused.
    /// - [`AudioError::DeviceUnavailable`] — no input device exists.
    /// - [`AudioError::Backend`] — any other platform failure.
    fn open(&self) -> Result<CaptureHandle, AudioError>;
}

// Compile-time assertion: Box<dyn CaptureSource> must be constructible.
const _: fn() = || {
    fn _assert_object_safe(_: Box<dyn CaptureSource>) {}
};

// ---------------------------------------------------------------------------
// MicCapture
// ---------------------------------------------------------------------------

/// Production [`CaptureSource`] backed by the system default input device.
pub struct MicCapture {
    /// Capacity of the block channel between the audio thread and the
    /// consumer.  64 blocks of device-buffer audio is several seconds.
    channel_capacity: usize,
}

impl MicCapture {
    pub fn new() -> Self {
        Self { channel_capacity: 64 }
    }
}

impl Default for MicCapture {
    fn default() -> Self {
        Self::new()
    }
}

impl CaptureSource for MicCapture {
    fn open(&self) -> Result<CaptureHandle, AudioError> {
        let (block_tx, block_rx) = mpsc::channel::<Vec<f32>>(self.channel_capacity);
        let (stop_tx, stop_rx) = std_mpsc::channel::<()>();
        let (ready_tx, ready_rx) = std_mpsc::channel::<Result<(), AudioError>>();

        std::thread::Builder::new()
            .name("mic-capture".into())
            .spawn(move || run_capture_thread(block_tx, stop_rx, ready_tx))
            .map_err(|e| AudioError::Backend(format!("failed to spawn capture thread: {e}")))?;

        // The thread reports setup success/failure before parking; this recv
        // completes as soon as the stream is playing (or setup failed).
        match ready_rx.recv() {
            Ok(Ok(())) => Ok(CaptureHandle::new(block_rx, Some(stop_tx))),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(AudioError::Backend("capture thread died during setup".into())),
        }
    }
}

/// Body of the dedicated capture thread: build the stream, report readiness,
/// then park until the handle signals close (or is dropped).
fn run_capture_thread(
    block_tx: mpsc::Sender<Vec<f32>>,
    stop_rx: std_mpsc::Receiver<()>,
    ready_tx: std_mpsc::Sender<Result<(), AudioError>>,
) {
    let result = (|| -> Result<cpal::Stream, AudioError> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or(AudioError::DeviceUnavailable)?;

        let supported = device.default_input_config()?;
        let channels = supported.channels();
        let sample_rate = supported.sample_rate().0;
        let config: cpal::StreamConfig = supported.into();

        log::info!("opening input device ({sample_rate} Hz, {channels} ch)");

        let stream = device.build_input_stream(
            &config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                let mono = downmix_to_mono(data, channels);
                let block = resample_to_16k(&mono, sample_rate);
                // Consumer lagging or gone — drop the block rather than
                // block the realtime callback.
                let _ = block_tx.try_send(block);
            },
            |err: cpal::StreamError| {
                log::error!("capture stream error: {err}");
            },
            None,
        )?;

        stream.play()?;
        Ok(stream)
    })();

    match result {
        Ok(stream) => {
            let _ = ready_tx.send(Ok(()));
            // Park until close() sends or the handle (and its sender) drops.
            let _ = stop_rx.recv();
            drop(stream);
            log::debug!("mic capture thread stopped");
        }
        Err(e) => {
            let _ = ready_tx.send(Err(e));
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn dummy_handle() -> (mpsc::Sender<Vec<f32>>, CaptureHandle) {
        let (tx, rx) = mpsc::channel(4);
        let (stop_tx, _stop_rx) = std_mpsc::channel();
        (tx, CaptureHandle::new(rx, Some(stop_tx)))
    }

    // ---- AudioError --------------------------------------------------------

    #[test]
    fn error_messages_name_the_cause() {
        assert!(AudioError::PermissionDenied.to_string().contains("denied"));
        assert!(AudioError::DeviceUnavailable.to_string().contains("input device"));
        assert!(AudioError::Backend("boom".into()).to_string().contains("boom"));
    }

    #[test]
    fn permission_strings_are_classified() {
        assert!(matches!(
            classify_backend("Operation not permitted: permission".into()),
            AudioError::PermissionDenied
        ));
        assert!(matches!(
            classify_backend("Access denied by user".into()),
            AudioError::PermissionDenied
        ));
        assert!(matches!(
            classify_backend("ALSA function error".into()),
            AudioError::Backend(_)
        ));
    }

    // ---- CaptureHandle -----------------------------------------------------

    #[tokio::test]
    async fn blocks_are_delivered_in_order() {
        let (tx, mut handle) = dummy_handle();
        tx.send(vec![0.1]).await.unwrap();
        tx.send(vec![0.2]).await.unwrap();
        drop(tx);

        assert_eq!(handle.next_block().await, Some(vec![0.1]));
        assert_eq!(handle.next_block().await, Some(vec![0.2]));
        assert_eq!(handle.next_block().await, None);
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let (_tx, mut handle) = dummy_handle();
        assert!(!handle.is_closed());

        handle.close();
        assert!(handle.is_closed());

        // Second and third close are no-ops, not panics.
        handle.close();
        handle.close();
        assert!(handle.is_closed());
    }

    #[tokio::test]
    async fn close_stops_block_delivery() {
        let (tx, mut handle) = dummy_handle();
        handle.close();

        // Senders observe the closed channel.
        assert!(tx.send(vec![0.0]).await.is_err());
        // Receiver drains to None.
        while handle.next_block().await.is_some() {}
    }

    #[test]
    fn mic_capture_is_a_trait_object() {
        let source: Box<dyn CaptureSource> = Box::new(MicCapture::new());
        drop(source);
    }

    /// `CaptureHandle` must be `Send` so the frame pump can own it inside a
    /// tokio task.
    #[test]
    fn capture_handle_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<CaptureHandle>();
    }
}
