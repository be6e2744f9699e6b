//! Voice pipeline integration tests
//!
//! Tests clip finalization, WAV packaging, bundled clip lookup, and the
//! speech tier chain without requiring audio hardware.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use candy_voice::voice::recorder::{SAMPLE_RATE, encode_clip, encode_wav, finalize_samples};
use candy_voice::voice::speech::{SpeechOutput, SpeechTier, bundled_clip_path};
use candy_voice::{Error, Result};

/// Generate sine wave audio samples
fn generate_sine_samples(frequency: f32, duration_secs: f32, amplitude: f32) -> Vec<f32> {
    let num_samples = (SAMPLE_RATE as f32 * duration_secs) as usize;
    (0..num_samples)
        .map(|i| {
            let t = i as f32 / SAMPLE_RATE as f32;
            amplitude * (2.0 * std::f32::consts::PI * frequency * t).sin()
        })
        .collect()
}

#[test]
fn test_finalize_rejects_short_and_silent_clips() {
    let short = generate_sine_samples(440.0, 0.1, 0.5);
    assert!(finalize_samples(&short, SAMPLE_RATE).is_none());

    let silent = vec![0.005f32; SAMPLE_RATE as usize * 2];
    assert!(finalize_samples(&silent, SAMPLE_RATE).is_none());
}

#[test]
fn test_finalize_trims_and_caps() {
    let mut samples = vec![0.0f32; SAMPLE_RATE as usize];
    samples.extend(generate_sine_samples(440.0, 13.0, 0.5));
    samples.extend(vec![0.0f32; SAMPLE_RATE as usize]);

    let finalized = finalize_samples(&samples, SAMPLE_RATE).unwrap();
    assert!(finalized.len() <= SAMPLE_RATE as usize * 12);
    assert!(finalized[0].abs() >= 0.01);
}

#[test]
fn test_encoded_clip_is_valid_wav() {
    let samples = generate_sine_samples(440.0, 1.0, 0.5);
    let clip = encode_clip(&samples, SAMPLE_RATE).unwrap().unwrap();

    assert_eq!(clip.sample_rate, SAMPLE_RATE);
    assert!(clip.duration_ms >= 900 && clip.duration_ms <= 1000);

    let wav = clip.wav_bytes().unwrap();
    assert_eq!(&wav[0..4], b"RIFF");
    assert_eq!(&wav[8..12], b"WAVE");
}

#[test]
fn test_encode_wav_header_matches_rate() {
    let samples = generate_sine_samples(440.0, 0.5, 0.3);
    let wav = encode_wav(&samples, SAMPLE_RATE).unwrap();

    let reader = hound::WavReader::new(std::io::Cursor::new(&wav)).unwrap();
    let spec = reader.spec();
    assert_eq!(spec.sample_rate, SAMPLE_RATE);
    assert_eq!(spec.channels, 1);
    assert_eq!(spec.bits_per_sample, 16);
}

#[test]
fn test_bundled_clip_lookup() {
    let dir = std::env::temp_dir().join("candy-voice-clips");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("100.wav"), b"RIFF").unwrap();
    std::fs::write(dir.join("10000000000000000.wav"), b"RIFF").unwrap();

    assert!(bundled_clip_path("一百颗糖", &dir).is_some());
    assert!(bundled_clip_path("一亿亿颗糖", &dir).is_some());
    // No clip file for this level
    assert!(bundled_clip_path("十颗糖", &dir).is_none());
    // Not a canonical phrase
    assert!(bundled_clip_path("一百颗", &dir).is_none());
    assert!(bundled_clip_path("好呀～", &dir).is_none());
}

struct RecordingTier {
    name: &'static str,
    fail: bool,
    log: Arc<Mutex<Vec<&'static str>>>,
}

#[async_trait]
impl SpeechTier for RecordingTier {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn attempt(&self, _text: &str, _cancel: &CancellationToken) -> Result<()> {
        self.log.lock().unwrap().push(self.name);
        if self.fail {
            Err(Error::Tts("unavailable".to_string()))
        } else {
            Ok(())
        }
    }
}

#[tokio::test]
async fn test_speech_chain_stops_at_first_success() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut speech = SpeechOutput::new(vec![
        Box::new(RecordingTier { name: "bundled", fail: true, log: Arc::clone(&log) }),
        Box::new(RecordingTier { name: "remote", fail: false, log: Arc::clone(&log) }),
        Box::new(RecordingTier { name: "system", fail: false, log: Arc::clone(&log) }),
    ]);

    speech.speak("一万颗糖", false).await;
    assert_eq!(log.lock().unwrap().as_slice(), ["bundled", "remote"]);
}

#[tokio::test]
async fn test_speech_chain_exhaustion_is_silent() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut speech = SpeechOutput::new(vec![
        Box::new(RecordingTier { name: "bundled", fail: true, log: Arc::clone(&log) }),
        Box::new(RecordingTier { name: "system", fail: true, log: Arc::clone(&log) }),
    ]);

    // Every tier fails; the call still completes without panicking
    speech.speak("十颗糖", false).await;
    assert_eq!(log.lock().unwrap().as_slice(), ["bundled", "system"]);
}

/// Hands its cancellation token to the test, then blocks until canceled
struct BlockingTier {
    tx: tokio::sync::mpsc::UnboundedSender<CancellationToken>,
}

#[async_trait]
impl SpeechTier for BlockingTier {
    fn name(&self) -> &'static str {
        "blocking"
    }

    async fn attempt(&self, _text: &str, cancel: &CancellationToken) -> Result<()> {
        self.tx.send(cancel.clone()).ok();
        cancel.cancelled().await;
        Err(Error::Tts("interrupted".to_string()))
    }
}

#[tokio::test]
async fn test_cancel_interrupts_a_blocked_utterance() {
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let log = Arc::new(Mutex::new(Vec::new()));
    let speech = SpeechOutput::new(vec![
        Box::new(BlockingTier { tx }),
        Box::new(RecordingTier { name: "system", fail: false, log: Arc::clone(&log) }),
    ]);

    let handle = tokio::spawn(async move {
        let mut speech = speech;
        speech.speak("一万颗糖", false).await;
        speech
    });

    // The utterance is in flight, blocked inside the first tier
    let token = rx.recv().await.expect("tier started");
    assert!(!token.is_cancelled());

    token.cancel();
    handle.await.unwrap();

    // The canceled chain stops; the fallback tier never sounds
    assert!(log.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_cancel_marks_the_current_utterance_token() {
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let speech = SpeechOutput::new(vec![Box::new(BlockingTier { tx })]);

    let handle = tokio::spawn(async move {
        let mut speech = speech;
        speech.speak("十颗糖", false).await;
        speech.cancel();
        speech.speak("一百颗糖", false).await;
    });

    // First utterance: cancel it externally so the chain unblocks
    let first = rx.recv().await.expect("first utterance started");
    first.cancel();

    // Second utterance runs under a fresh, uncanceled token
    let second = rx.recv().await.expect("second utterance started");
    assert!(!second.is_cancelled());
    second.cancel();

    handle.await.unwrap();
}

#[tokio::test]
async fn test_muted_speech_skips_every_tier() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut speech = SpeechOutput::new(vec![Box::new(RecordingTier {
        name: "bundled",
        fail: false,
        log: Arc::clone(&log),
    })]);

    speech.speak("十颗糖", true).await;
    assert!(log.lock().unwrap().is_empty());
}
