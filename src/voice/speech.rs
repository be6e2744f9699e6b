//! Tiered speech output
//!
//! Every utterance walks an ordered list of tiers and stops at the first
//! one that produces sound: bundled clips for the canonical phrases, then
//! remote synthesis, then the on-device synthesizer. Exhausting every tier
//! is not an error, the turn just finishes silently.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::levels::LEVELS;
use crate::voice::playback::AudioPlayback;
use crate::voice::tts::RemoteTts;
use crate::{Error, Result};

/// One fallback tier in the speech chain
#[async_trait]
pub trait SpeechTier: Send + Sync {
    /// Tier name for logs
    fn name(&self) -> &'static str;

    /// Try to speak the phrase
    ///
    /// # Errors
    ///
    /// Returns an error when this tier cannot produce sound for the
    /// phrase; the next tier is tried.
    async fn attempt(&self, text: &str, cancel: &CancellationToken) -> Result<()>;
}

/// Map a phrase to its pre-generated clip, if one is bundled
///
/// Only the sixteen canonical count phrases have bundled clips, stored
/// as `{value}.wav` under the audio directory.
#[must_use]
pub fn bundled_clip_path(text: &str, audio_dir: &Path) -> Option<PathBuf> {
    let level = LEVELS
        .iter()
        .find(|level| text == format!("{}颗糖", level.cn))?;
    let path = audio_dir.join(format!("{}.wav", level.value));
    path.is_file().then_some(path)
}

/// Plays pre-generated clips for the canonical phrases
pub struct BundledClipTier {
    audio_dir: PathBuf,
    playback: Arc<AudioPlayback>,
}

impl BundledClipTier {
    #[must_use]
    pub const fn new(audio_dir: PathBuf, playback: Arc<AudioPlayback>) -> Self {
        Self { audio_dir, playback }
    }
}

#[async_trait]
impl SpeechTier for BundledClipTier {
    fn name(&self) -> &'static str {
        "bundled-clip"
    }

    async fn attempt(&self, text: &str, cancel: &CancellationToken) -> Result<()> {
        let path = bundled_clip_path(text, &self.audio_dir)
            .ok_or_else(|| Error::Tts(format!("no bundled clip for: {text}")))?;
        let wav = tokio::fs::read(&path).await?;
        self.playback.play_wav(&wav, cancel)
    }
}

/// Synthesizes remotely and plays the result
pub struct RemoteTtsTier {
    tts: RemoteTts,
    playback: Arc<AudioPlayback>,
}

impl RemoteTtsTier {
    #[must_use]
    pub const fn new(tts: RemoteTts, playback: Arc<AudioPlayback>) -> Self {
        Self { tts, playback }
    }
}

#[async_trait]
impl SpeechTier for RemoteTtsTier {
    fn name(&self) -> &'static str {
        "remote-tts"
    }

    async fn attempt(&self, text: &str, cancel: &CancellationToken) -> Result<()> {
        let wav = tokio::select! {
            () = cancel.cancelled() => return Ok(()),
            result = self.tts.synthesize(text) => result?,
        };
        self.playback.play_wav(&wav, cancel)
    }
}

/// Speaks through the operating system's synthesizer
pub struct SystemVoiceTier {
    program: PathBuf,
}

impl SystemVoiceTier {
    /// Find an installed synthesizer (`say`, `espeak-ng`, or `espeak`)
    #[must_use]
    pub fn locate() -> Option<Self> {
        ["say", "espeak-ng", "espeak"]
            .iter()
            .find_map(|name| which::which(name).ok())
            .map(|program| {
                tracing::debug!(program = %program.display(), "system voice found");
                Self { program }
            })
    }
}

#[async_trait]
impl SpeechTier for SystemVoiceTier {
    fn name(&self) -> &'static str {
        "system-voice"
    }

    async fn attempt(&self, text: &str, cancel: &CancellationToken) -> Result<()> {
        let mut child = tokio::process::Command::new(&self.program)
            .arg(text)
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::Tts(e.to_string()))?;

        tokio::select! {
            () = cancel.cancelled() => {
                child.kill().await.ok();
                Ok(())
            }
            status = child.wait() => {
                let status = status.map_err(|e| Error::Tts(e.to_string()))?;
                if status.success() {
                    Ok(())
                } else {
                    Err(Error::Tts(format!("system voice exited with {status}")))
                }
            }
        }
    }
}

/// Ordered speech chain with cancellation of the previous utterance
pub struct SpeechOutput {
    tiers: Vec<Box<dyn SpeechTier>>,
    current: CancellationToken,
}

impl SpeechOutput {
    #[must_use]
    pub fn new(tiers: Vec<Box<dyn SpeechTier>>) -> Self {
        Self {
            tiers,
            current: CancellationToken::new(),
        }
    }

    /// Cut off the utterance currently sounding, if any
    pub fn cancel(&mut self) {
        self.current.cancel();
    }

    /// Speak a phrase through the first tier that succeeds
    ///
    /// When muted the call short-circuits with no side effects, leaving a
    /// previous utterance sounding. Otherwise the previous utterance is
    /// canceled before the chain starts.
    pub async fn speak(&mut self, text: &str, muted: bool) {
        if muted {
            tracing::debug!(text = %text, "muted, skipping speech");
            return;
        }

        self.current.cancel();
        self.current = CancellationToken::new();

        let cancel = self.current.clone();
        for tier in &self.tiers {
            if cancel.is_cancelled() {
                return;
            }
            match tier.attempt(text, &cancel).await {
                Ok(()) => {
                    tracing::debug!(tier = tier.name(), text = %text, "spoke");
                    return;
                }
                Err(e) => {
                    tracing::debug!(tier = tier.name(), error = %e, "speech tier failed");
                }
            }
        }

        tracing::warn!(text = %text, "all speech tiers failed, staying silent");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FailTier {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl SpeechTier for FailTier {
        fn name(&self) -> &'static str {
            "fail"
        }

        async fn attempt(&self, _text: &str, _cancel: &CancellationToken) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(Error::Tts("nope".to_string()))
        }
    }

    struct CaptureTier {
        spoken: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl SpeechTier for CaptureTier {
        fn name(&self) -> &'static str {
            "capture"
        }

        async fn attempt(&self, text: &str, _cancel: &CancellationToken) -> Result<()> {
            self.spoken.lock().unwrap().push(text.to_string());
            Ok(())
        }
    }

    #[tokio::test]
    async fn first_successful_tier_stops_the_chain() {
        let spoken = Arc::new(Mutex::new(Vec::new()));
        let trailing = Arc::new(Mutex::new(Vec::new()));
        let mut speech = SpeechOutput::new(vec![
            Box::new(CaptureTier { spoken: Arc::clone(&spoken) }),
            Box::new(CaptureTier { spoken: Arc::clone(&trailing) }),
        ]);

        speech.speak("十颗糖", false).await;
        assert_eq!(spoken.lock().unwrap().as_slice(), ["十颗糖"]);
        assert!(trailing.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn failures_fall_through_to_the_next_tier() {
        let fails = Arc::new(Mutex::new(Vec::new()));
        let mut speech = SpeechOutput::new(vec![
            Box::new(FailTier { calls: AtomicUsize::new(0) }),
            Box::new(FailTier { calls: AtomicUsize::new(0) }),
            Box::new(CaptureTier { spoken: Arc::clone(&fails) }),
        ]);

        speech.speak("一百颗糖", false).await;
        assert_eq!(fails.lock().unwrap().as_slice(), ["一百颗糖"]);
    }

    #[tokio::test]
    async fn muted_output_stays_silent() {
        let spoken = Arc::new(Mutex::new(Vec::new()));
        let mut speech =
            SpeechOutput::new(vec![Box::new(CaptureTier { spoken: Arc::clone(&spoken) })]);

        speech.speak("十颗糖", true).await;
        assert!(spoken.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn exhausted_chain_is_not_an_error() {
        let mut speech =
            SpeechOutput::new(vec![Box::new(FailTier { calls: AtomicUsize::new(0) })]);
        speech.speak("十颗糖", false).await;
    }

    struct TokenCaptureTier {
        tokens: Arc<Mutex<Vec<CancellationToken>>>,
    }

    #[async_trait]
    impl SpeechTier for TokenCaptureTier {
        fn name(&self) -> &'static str {
            "token-capture"
        }

        async fn attempt(&self, _text: &str, cancel: &CancellationToken) -> Result<()> {
            self.tokens.lock().unwrap().push(cancel.clone());
            Ok(())
        }
    }

    #[tokio::test]
    async fn new_utterance_cancels_the_previous_token() {
        let tokens = Arc::new(Mutex::new(Vec::new()));
        let mut speech = SpeechOutput::new(vec![Box::new(TokenCaptureTier {
            tokens: Arc::clone(&tokens),
        })]);

        speech.speak("十颗糖", false).await;
        speech.speak("一百颗糖", false).await;

        let tokens = tokens.lock().unwrap();
        assert_eq!(tokens.len(), 2);
        assert!(tokens[0].is_cancelled());
        assert!(!tokens[1].is_cancelled());
    }

    #[tokio::test]
    async fn muted_call_leaves_the_previous_utterance_alone() {
        let tokens = Arc::new(Mutex::new(Vec::new()));
        let mut speech = SpeechOutput::new(vec![Box::new(TokenCaptureTier {
            tokens: Arc::clone(&tokens),
        })]);

        speech.speak("十颗糖", false).await;
        speech.speak("一百颗糖", true).await;

        let tokens = tokens.lock().unwrap();
        assert_eq!(tokens.len(), 1);
        assert!(!tokens[0].is_cancelled());
    }

    struct SelfCancelTier;

    #[async_trait]
    impl SpeechTier for SelfCancelTier {
        fn name(&self) -> &'static str {
            "self-cancel"
        }

        async fn attempt(&self, _text: &str, cancel: &CancellationToken) -> Result<()> {
            cancel.cancel();
            Err(Error::Tts("cut off".to_string()))
        }
    }

    #[tokio::test]
    async fn cancellation_mid_chain_skips_remaining_tiers() {
        let spoken = Arc::new(Mutex::new(Vec::new()));
        let mut speech = SpeechOutput::new(vec![
            Box::new(SelfCancelTier),
            Box::new(CaptureTier { spoken: Arc::clone(&spoken) }),
        ]);

        speech.speak("十颗糖", false).await;
        assert!(spoken.lock().unwrap().is_empty());
    }

    #[test]
    fn bundled_clip_matching_is_exact() {
        let dir = std::env::temp_dir().join("candy-clip-test");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("10000.wav"), b"RIFF").unwrap();

        assert!(bundled_clip_path("一万颗糖", &dir).is_some());
        assert!(bundled_clip_path("十颗糖", &dir).is_none());
        assert!(bundled_clip_path("一万颗", &dir).is_none());
        assert!(bundled_clip_path("好呀～", &dir).is_none());
    }
}
