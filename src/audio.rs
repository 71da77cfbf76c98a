//! Audio playback for timer completion sounds.

use crate::collaborators::SoundSink;
use rodio::source::{SineWave, Source, Zero};
use rodio::{OutputStream, OutputStreamHandle, Sink};
use std::time::Duration;
use thiserror::Error;

/// Rising C5-E5-G5 arpeggio: (frequency Hz, duration ms).
const COMPLETION_CUE: [(f32, u64); 3] = [(523.25, 150), (659.25, 150), (783.99, 300)];

const GAP_MS: u64 = 20;
const VOLUME: f32 = 0.3;

#[derive(Error, Debug)]
pub enum AudioError {
    #[error("Failed to initialize audio output: {0}")]
    Stream(#[from] rodio::StreamError),
    #[error("Failed to play audio: {0}")]
    Play(#[from] rodio::PlayError),
}

pub struct AudioPlayer {
    _stream: OutputStream,
    handle: OutputStreamHandle,
}

impl AudioPlayer {
    /// Creates a new audio player on the default output device.
    pub fn new() -> Result<Self, AudioError> {
        let (stream, handle) = OutputStream::try_default()?;
        Ok(Self {
            _stream: stream,
            handle,
        })
    }

    /// Queues the completion arpeggio and lets it play in the background.
    fn play_cue(&self) -> Result<(), AudioError> {
        let sink = Sink::try_new(&self.handle)?;

        for (freq, ms) in COMPLETION_CUE {
            let tone = SineWave::new(freq)
                .take_duration(Duration::from_millis(ms))
                .fade_in(Duration::from_millis(10))
                .amplify(VOLUME);
            sink.append(tone);
            sink.append(Zero::<f32>::new(1, 44100).take_duration(Duration::from_millis(GAP_MS)));
        }
        sink.detach();

        Ok(())
    }
}

impl SoundSink for AudioPlayer {
    fn play_completion_cue(&self) {
        if let Err(e) = self.play_cue() {
            tracing::warn!("failed to play completion cue: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audio_player_creation() {
        // Fails on machines without an audio device; that's fine in CI.
        match AudioPlayer::new() {
            Ok(player) => player.play_completion_cue(),
            Err(e) => println!("Audio player creation failed (expected on CI): {}", e),
        }
    }

    #[test]
    fn test_completion_cue_rises() {
        let freqs: Vec<f32> = COMPLETION_CUE.iter().map(|(f, _)| *f).collect();
        assert!(freqs.windows(2).all(|w| w[0] < w[1]));
    }
}
