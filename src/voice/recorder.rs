//! Microphone capture and clip finalization
//!
//! One recording session at a time. Stopping a session trims leading and
//! trailing silence, rejects clips under the minimum length, caps the clip
//! at the maximum length, and packages the samples as base64-encoded
//! 16-bit PCM WAV for transport.

use std::sync::{Arc, Mutex};
use std::time::Instant;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleRate, Stream};

use crate::{Error, Result};

/// Sample rate for capture (16kHz is plenty for speech)
pub const SAMPLE_RATE: u32 = 16000;

/// Amplitude below which a sample counts as silence (fraction of full scale)
const SILENCE_THRESHOLD: f32 = 0.01;

/// Minimum usable clip length after trimming
const MIN_CLIP_SECS: f64 = 0.2;

/// Maximum clip length, measured from the start of the trimmed region
const MAX_CLIP_SECS: f64 = 12.0;

/// A finalized, transport-ready audio clip
#[derive(Debug, Clone)]
pub struct AudioClip {
    /// Base64-encoded RIFF/WAVE bytes (16-bit signed PCM, mono)
    pub wav_base64: String,
    /// Sample rate of the encoded audio
    pub sample_rate: u32,
    /// Clip duration after trimming and capping
    pub duration_ms: u64,
}

struct RecordingSession {
    stream: Stream,
    buffer: Arc<Mutex<Vec<f32>>>,
    sample_rate: u32,
    started: Instant,
}

/// Owns the single microphone capture session
#[derive(Default)]
pub struct Recorder {
    session: Option<RecordingSession>,
}

impl Recorder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a capture session is open
    #[must_use]
    pub const fn is_recording(&self) -> bool {
        self.session.is_some()
    }

    /// Open the capture device and start buffering samples
    ///
    /// A second `start` while a session is live is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `Error::Permission` when no input device is available or the
    /// stream cannot be opened.
    pub fn start(&mut self) -> Result<()> {
        if self.session.is_some() {
            tracing::debug!("recording session already open, ignoring start");
            return Ok(());
        }

        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| Error::Permission("no input device available".to_string()))?;

        let supported = device
            .supported_input_configs()
            .map_err(|e| Error::Permission(e.to_string()))?
            .find(|c| {
                c.channels() == 1
                    && c.min_sample_rate() <= SampleRate(SAMPLE_RATE)
                    && c.max_sample_rate() >= SampleRate(SAMPLE_RATE)
            })
            .ok_or_else(|| Error::Permission("no suitable capture config found".to_string()))?;

        let config = supported.with_sample_rate(SampleRate(SAMPLE_RATE)).config();

        let buffer = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&buffer);

        let stream = device
            .build_input_stream(
                &config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    if let Ok(mut buf) = sink.lock() {
                        buf.extend_from_slice(data);
                    }
                },
                |err| {
                    tracing::error!(error = %err, "recording stream error");
                },
                None,
            )
            .map_err(|e| Error::Permission(e.to_string()))?;

        stream.play().map_err(|e| Error::Permission(e.to_string()))?;

        tracing::debug!(
            device = device.name().unwrap_or_default(),
            sample_rate = SAMPLE_RATE,
            "recording started"
        );

        self.session = Some(RecordingSession {
            stream,
            buffer,
            sample_rate: SAMPLE_RATE,
            started: Instant::now(),
        });
        Ok(())
    }

    /// Close the session and finalize the buffered samples into a clip
    ///
    /// The device is released even when finalization fails.
    ///
    /// # Errors
    ///
    /// Returns `Error::NoAudio` when no session was open or the trimmed clip
    /// is below the minimum length; `Error::Audio` on encoding failure.
    pub fn stop(&mut self) -> Result<AudioClip> {
        let session = self.session.take().ok_or(Error::NoAudio)?;
        drop(session.stream);

        let samples = session
            .buffer
            .lock()
            .map(|buf| buf.clone())
            .unwrap_or_default();
        let elapsed = session.started.elapsed();
        tracing::debug!(
            samples = samples.len(),
            elapsed_ms = elapsed.as_millis() as u64,
            "recording stopped"
        );

        encode_clip(&samples, session.sample_rate)?.ok_or(Error::NoAudio)
    }

    /// Tear the session down without producing a clip
    pub fn cancel(&mut self) {
        if let Some(session) = self.session.take() {
            drop(session.stream);
            tracing::debug!("recording canceled");
        }
    }
}

/// Trim silence, enforce the length floor, and cap the clip
///
/// Returns `None` when the trimmed audio is shorter than the minimum.
#[must_use]
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn finalize_samples(samples: &[f32], sample_rate: u32) -> Option<Vec<f32>> {
    let mut start = 0;
    let mut end = samples.len();
    while start < end && samples[start].abs() < SILENCE_THRESHOLD {
        start += 1;
    }
    while end > start && samples[end - 1].abs() < SILENCE_THRESHOLD {
        end -= 1;
    }

    let trimmed = &samples[start..end];
    let min_len = (f64::from(sample_rate) * MIN_CLIP_SECS) as usize;
    if trimmed.len() < min_len {
        return None;
    }

    let max_len = (f64::from(sample_rate) * MAX_CLIP_SECS) as usize;
    Some(trimmed[..trimmed.len().min(max_len)].to_vec())
}

/// Encode f32 samples as 16-bit signed PCM in a RIFF/WAVE container
///
/// # Errors
///
/// Returns `Error::Audio` when WAV encoding fails.
pub fn encode_wav(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = std::io::Cursor::new(Vec::new());
    {
        let mut writer =
            hound::WavWriter::new(&mut cursor, spec).map_err(|e| Error::Audio(e.to_string()))?;
        for &sample in samples {
            #[allow(clippy::cast_possible_truncation)]
            let quantized = (sample * 32767.0).clamp(-32768.0, 32767.0) as i16;
            writer
                .write_sample(quantized)
                .map_err(|e| Error::Audio(e.to_string()))?;
        }
        writer.finalize().map_err(|e| Error::Audio(e.to_string()))?;
    }
    Ok(cursor.into_inner())
}

/// Finalize raw samples into a transport-ready clip
///
/// Returns `Ok(None)` when the audio is too short to be usable.
///
/// # Errors
///
/// Returns `Error::Audio` when WAV encoding fails.
#[allow(clippy::cast_possible_truncation)]
pub fn encode_clip(samples: &[f32], sample_rate: u32) -> Result<Option<AudioClip>> {
    let Some(finalized) = finalize_samples(samples, sample_rate) else {
        return Ok(None);
    };
    let duration_ms = (finalized.len() as u64 * 1000) / u64::from(sample_rate);
    let wav = encode_wav(&finalized, sample_rate)?;
    Ok(Some(AudioClip {
        wav_base64: BASE64.encode(wav),
        sample_rate,
        duration_ms,
    }))
}

impl AudioClip {
    /// Decode the clip back to raw WAV bytes
    ///
    /// # Errors
    ///
    /// Returns `Error::Audio` when the base64 payload is invalid.
    pub fn wav_bytes(&self) -> Result<Vec<u8>> {
        BASE64
            .decode(&self.wav_base64)
            .map_err(|e| Error::Audio(e.to_string()))
    }
}
