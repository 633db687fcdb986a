//! Channel downmix and 16 kHz resampling.
//!
//! The streaming transport consumes **16 kHz mono** PCM, but capture devices
//! deliver whatever the hardware prefers (typically 44.1/48 kHz, often
//! stereo).  The capture layer runs every raw block through these two
//! conversions before it reaches the frame encoder:
//!
//! 1. [`downmix_to_mono`] — average interleaved channels into one.
//! 2. [`resample_to_16k`] — linear-interpolation resampling to 16 000 Hz.
//!
//! Linear interpolation is adequate for speech heading into a language
//! model; it keeps the hot path allocation-light and dependency-free.

// ---------------------------------------------------------------------------
// downmix_to_mono
// ---------------------------------------------------------------------------

/// Mix interleaved multi-channel audio down to mono by averaging channels.
///
/// Output length is `samples.len() / channels`.  Already-mono input is
/// returned as an owned copy without averaging; `channels == 0` yields an
/// empty vector.
///
/// ```
/// use talkcoach::audio::downmix_to_mono;
///
/// let stereo = [0.8_f32, 0.2, -0.4, -0.6]; // L R L R
/// let mono = downmix_to_mono(&stereo, 2);
/// assert_eq!(mono.len(), 2);
/// assert!((mono[0] - 0.5).abs() < 1e-6);
/// assert!((mono[1] + 0.5).abs() < 1e-6);
/// ```
pub fn downmix_to_mono(samples: &[f32], channels: u16) -> Vec<f32> {
    match channels {
        0 => Vec::new(),
        1 => samples.to_vec(),
        n => {
            let n = n as usize;
            samples
                .chunks_exact(n)
                .map(|frame| frame.iter().sum::<f32>() / n as f32)
                .collect()
        }
    }
}

// ---------------------------------------------------------------------------
// resample_to_16k
// ---------------------------------------------------------------------------

/// Resample mono `samples` from `source_rate` Hz to 16 000 Hz.
///
/// A no-op copy when the source is already 16 kHz.  Output length is
/// `ceil(samples.len() * 16_000 / source_rate)`.
pub fn resample_to_16k(samples: &[f32], source_rate: u32) -> Vec<f32> {
    const TARGET_RATE: u32 = 16_000;

    if source_rate == TARGET_RATE {
        return samples.to_vec();
    }
    if samples.is_empty() {
        return Vec::new();
    }

    let ratio = TARGET_RATE as f64 / source_rate as f64;
    let output_len = (samples.len() as f64 * ratio).ceil() as usize;
    let mut output = Vec::with_capacity(output_len);

    for i in 0..output_len {
        let src_pos = i as f64 / ratio;
        let idx = src_pos as usize;
        let frac = (src_pos - idx as f64) as f32;

        let sample = if idx + 1 < samples.len() {
            samples[idx] * (1.0 - frac) + samples[idx + 1] * frac
        } else if idx < samples.len() {
            samples[idx]
        } else {
            0.0
        };

        output.push(sample);
    }

    output
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    // ---- downmix_to_mono ---------------------------------------------------

    #[test]
    fn mono_passes_through() {
        let input = vec![0.3_f32, -0.3, 0.9];
        assert_eq!(downmix_to_mono(&input, 1), input);
    }

    #[test]
    fn stereo_averages_pairs() {
        let out = downmix_to_mono(&[1.0_f32, 0.0, -1.0, -1.0], 2);
        assert_eq!(out.len(), 2);
        assert!((out[0] - 0.5).abs() < 1e-6);
        assert!((out[1] + 1.0).abs() < 1e-6);
    }

    #[test]
    fn trailing_partial_frame_is_dropped() {
        // 5 samples at 2 channels → 2 full frames, 1 leftover ignored.
        let out = downmix_to_mono(&[0.2_f32; 5], 2);
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn zero_channels_yields_empty() {
        assert!(downmix_to_mono(&[1.0_f32], 0).is_empty());
    }

    // ---- resample_to_16k ---------------------------------------------------

    #[test]
    fn sixteen_khz_input_is_copied_unchanged() {
        let input: Vec<f32> = (0..320).map(|i| (i as f32 * 0.01).sin()).collect();
        assert_eq!(resample_to_16k(&input, 16_000), input);
    }

    #[test]
    fn empty_input_yields_empty() {
        assert!(resample_to_16k(&[], 48_000).is_empty());
    }

    #[test]
    fn downsample_48k_thirds_the_length() {
        // 48 kHz → 16 kHz: 30 ms = 1440 samples → 480 samples.
        let out = resample_to_16k(&vec![0.25_f32; 1440], 48_000);
        assert_eq!(out.len(), 480);
    }

    #[test]
    fn downsample_44100_close_to_ratio() {
        let out = resample_to_16k(&vec![0.0_f32; 44_100], 44_100);
        assert!(out.len().abs_diff(16_000) <= 1, "got {}", out.len());
    }

    #[test]
    fn upsample_8k_doubles_the_length() {
        let out = resample_to_16k(&vec![0.0_f32; 80], 8_000);
        assert_eq!(out.len(), 160);
    }

    #[test]
    fn dc_level_survives_resampling() {
        let out = resample_to_16k(&vec![0.7_f32; 960], 48_000);
        for &s in &out {
            assert!((s - 0.7).abs() < 1e-5, "amplitude drift: {s}");
        }
    }
}
