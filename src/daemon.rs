//! Daemon runtime
//!
//! Wires the API server and the local voice loop together. The voice loop
//! owns the microphone and speakers and is driven by single-key commands
//! on stdin; the API server carries the same pipeline for the web client.

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};

use crate::api::ApiServer;
use crate::config::{Config, TtsProvider};
use crate::orchestrator::TurnOrchestrator;
use crate::state::TurnPhase;
use crate::voice::{
    AudioPlayback, BigModelAsr, BigModelResponder, BundledClipTier, RemoteTts, RemoteTtsTier,
    SpeechOutput, SpeechTier, SystemVoiceTier,
};
use crate::{Error, Result};

/// The gateway daemon
pub struct Daemon {
    config: Arc<Config>,
}

impl Daemon {
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    /// Run the daemon until shutdown
    ///
    /// With voice enabled, the API server runs in the background and the
    /// voice loop holds the foreground. Without voice, the API server is
    /// the whole daemon.
    ///
    /// # Errors
    ///
    /// Returns error if the server fails to start or the voice pipeline
    /// cannot be built.
    pub async fn run(self, voice_enabled: bool) -> Result<()> {
        let server = ApiServer::new(Arc::clone(&self.config));

        if !voice_enabled {
            tracing::info!("voice disabled, running API server only");
            return server.run().await;
        }

        let server_handle = server.spawn();
        let orchestrator = self.build_orchestrator()?;

        tokio::select! {
            result = run_voice_loop(orchestrator) => result,
            result = server_handle => match result {
                Ok(inner) => inner,
                Err(e) => Err(Error::Config(format!("API server task failed: {e}"))),
            },
        }
    }

    /// Build the local voice pipeline
    ///
    /// # Errors
    ///
    /// Returns error when the vendor credential is missing.
    pub fn build_orchestrator(&self) -> Result<TurnOrchestrator> {
        let transcriber = Arc::new(BigModelAsr::new(&self.config.bigmodel)?);
        let responder = Arc::new(BigModelResponder::new(&self.config.bigmodel)?);
        let speech = SpeechOutput::new(self.build_tiers());
        Ok(TurnOrchestrator::new(transcriber, responder, speech))
    }

    /// Assemble the speech tier chain from the provider selection
    fn build_tiers(&self) -> Vec<Box<dyn SpeechTier>> {
        let mut tiers: Vec<Box<dyn SpeechTier>> = Vec::new();

        let playback = match AudioPlayback::new() {
            Ok(playback) => Some(Arc::new(playback)),
            Err(e) => {
                tracing::warn!(error = %e, "no audio output, skipping playback tiers");
                None
            }
        };

        if let Some(playback) = &playback {
            tiers.push(Box::new(BundledClipTier::new(
                self.config.audio_dir.clone(),
                Arc::clone(playback),
            )));
        }

        let provider = self.config.tts.provider;
        if let Some(playback) = &playback {
            match provider {
                TtsProvider::ServerMediated => {
                    let endpoint = self.config.tts.server_endpoint.clone().unwrap_or_else(|| {
                        format!(
                            "http://{}:{}/api/tts",
                            self.config.host, self.config.port
                        )
                    });
                    let tts = RemoteTts::server(endpoint, &self.config.tts);
                    tiers.push(Box::new(RemoteTtsTier::new(tts, Arc::clone(playback))));
                }
                TtsProvider::DirectVendor => {
                    match RemoteTts::vendor(&self.config.bigmodel, &self.config.tts) {
                        Ok(tts) => {
                            tiers.push(Box::new(RemoteTtsTier::new(tts, Arc::clone(playback))));
                        }
                        Err(e) => {
                            tracing::warn!(error = %e, "remote TTS unavailable");
                        }
                    }
                }
                TtsProvider::BundledOnly | TtsProvider::OnDevice => {}
            }
        }

        if provider != TtsProvider::BundledOnly {
            if let Some(system) = SystemVoiceTier::locate() {
                tiers.push(Box::new(system));
            }
        }

        tracing::info!(provider = provider.name(), tiers = tiers.len(), "speech chain built");
        tiers
    }
}

/// Push-to-talk loop on stdin
///
/// An empty line toggles the mic (press, then release), `n`/`p` step the
/// level ladder, `r` repeats the current phrase, `m` toggles mute, and
/// `q` quits.
async fn run_voice_loop(mut orchestrator: TurnOrchestrator) -> Result<()> {
    println!("按回车开始/结束说话，n 下一级，p 上一级，r 重复，m 静音，q 退出");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines
        .next_line()
        .await
        .map_err(|e| Error::Config(format!("stdin read failed: {e}")))?
    {
        match line.trim() {
            "" => {
                if orchestrator.phase() == TurnPhase::Listening {
                    orchestrator.release_mic().await;
                } else {
                    orchestrator.press_mic().await;
                    if orchestrator.phase() == TurnPhase::Listening {
                        println!("正在听...再按回车结束");
                        continue;
                    }
                }
            }
            "n" => orchestrator.next_level().await,
            "p" => orchestrator.prev_level().await,
            "r" => orchestrator.repeat_current().await,
            "m" => orchestrator.toggle_mute().await,
            "q" => break,
            other => {
                tracing::debug!(input = other, "unknown command");
                continue;
            }
        }

        let state = orchestrator.state();
        let muted = if state.is_muted() { " [静音]" } else { "" };
        let badge = match state.current_unit() {
            "" => String::new(),
            unit => format!(" [{unit}]"),
        };
        if let Some(equation) = state.equation() {
            println!("{equation}{badge}{muted}");
        } else {
            println!("{}{badge}{muted}", state.current_phrase());
        }
    }

    tracing::info!("voice loop exiting");
    Ok(())
}
