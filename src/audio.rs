//! Speech playback.
//!
//! The speech call returns headerless 16-bit little-endian mono PCM. `AudioClip`
//! wraps it into a RIFF/WAVE buffer, and `AudioPlayer` hands that buffer to an
//! external player process, tracking at most one playback at a time.

use log::{ debug, info, warn };
use std::io::Write;
use thiserror::Error;
use tokio::process::{ Child, Command };

use crate::models::content::InlineData;

pub const DEFAULT_SAMPLE_RATE: u32 = 24_000;
pub const SPEECH_CHAR_LIMIT: usize = 400;
const BITS_PER_SAMPLE: u16 = 16;
const WAV_HEADER_LEN: usize = 44;

#[derive(Debug, Error)]
pub enum AudioError {
    #[error("unsupported audio format: {0}")]
    UnsupportedFormat(String),
    #[error("PCM payload has an odd number of bytes ({0})")]
    TruncatedSample(usize),
    #[error("audio player command is empty")]
    NoPlayer,
    #[error("audio I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// The leading part of `text` that is read aloud.
pub fn speech_excerpt(text: &str) -> String {
    text.chars().take(SPEECH_CHAR_LIMIT).collect()
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AudioClip {
    pub sample_rate: u32,
    pub channels: u16,
    pcm: Vec<u8>,
}

impl AudioClip {
    pub fn from_pcm(sample_rate: u32, channels: u16, pcm: Vec<u8>) -> Result<Self, AudioError> {
        if pcm.len() % 2 != 0 {
            return Err(AudioError::TruncatedSample(pcm.len()));
        }
        Ok(Self { sample_rate, channels, pcm })
    }

    /// Accepts `audio/L16` / `audio/pcm` payloads, e.g.
    /// `audio/L16;codec=pcm;rate=24000`.
    pub fn from_inline(inline: &InlineData) -> Result<Self, AudioError> {
        let mut params = inline.mime_type.split(';').map(str::trim);
        let essence = params.next().unwrap_or_default().to_ascii_lowercase();
        if essence != "audio/l16" && essence != "audio/pcm" {
            return Err(AudioError::UnsupportedFormat(inline.mime_type.clone()));
        }

        let mut sample_rate = DEFAULT_SAMPLE_RATE;
        let mut channels = 1;
        for param in params {
            match param.split_once('=') {
                Some(("rate", value)) => {
                    sample_rate = value.parse().unwrap_or(DEFAULT_SAMPLE_RATE);
                }
                Some(("channels", value)) => {
                    channels = value.parse().unwrap_or(1);
                }
                _ => {}
            }
        }
        Self::from_pcm(sample_rate, channels, inline.data.clone())
    }

    pub fn samples(&self) -> Vec<i16> {
        self.pcm
            .chunks_exact(2)
            .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
            .collect()
    }

    pub fn duration_secs(&self) -> f64 {
        let bytes_per_second = self.sample_rate as usize * self.channels as usize * 2;
        if bytes_per_second == 0 {
            return 0.0;
        }
        self.pcm.len() as f64 / bytes_per_second as f64
    }

    pub fn to_wav(&self) -> Vec<u8> {
        let data_len = self.pcm.len() as u32;
        let block_align = self.channels * (BITS_PER_SAMPLE / 8);
        let byte_rate = self.sample_rate * block_align as u32;

        let mut wav = Vec::with_capacity(WAV_HEADER_LEN + self.pcm.len());
        wav.extend_from_slice(b"RIFF");
        wav.extend_from_slice(&(36 + data_len).to_le_bytes());
        wav.extend_from_slice(b"WAVE");
        wav.extend_from_slice(b"fmt ");
        wav.extend_from_slice(&16u32.to_le_bytes());
        wav.extend_from_slice(&1u16.to_le_bytes()); // PCM
        wav.extend_from_slice(&self.channels.to_le_bytes());
        wav.extend_from_slice(&self.sample_rate.to_le_bytes());
        wav.extend_from_slice(&byte_rate.to_le_bytes());
        wav.extend_from_slice(&block_align.to_le_bytes());
        wav.extend_from_slice(&BITS_PER_SAMPLE.to_le_bytes());
        wav.extend_from_slice(b"data");
        wav.extend_from_slice(&data_len.to_le_bytes());
        wav.extend_from_slice(&self.pcm);
        wav
    }
}

struct Playback {
    child: Child,
    // Keeps the WAV alive until the player is done with it.
    _file: tempfile::NamedTempFile,
}

pub struct AudioPlayer {
    command: Vec<String>,
    current: Option<Playback>,
}

impl AudioPlayer {
    /// `command` is the player invocation; the WAV path is appended as the last argument.
    pub fn new(command: &str) -> Self {
        Self {
            command: command.split_whitespace().map(str::to_string).collect(),
            current: None,
        }
    }

    pub async fn play(&mut self, clip: &AudioClip) -> Result<(), AudioError> {
        self.stop().await;
        let (program, args) = self.command.split_first().ok_or(AudioError::NoPlayer)?;

        let mut file = tempfile::Builder::new().prefix("u-practice-").suffix(".wav").tempfile()?;
        file.write_all(&clip.to_wav())?;
        file.flush()?;

        let child = Command::new(program)
            .args(args)
            .arg(file.path())
            .kill_on_drop(true)
            .spawn()?;
        info!(
            "Playing {:.1}s of audio with '{}' ({})",
            clip.duration_secs(),
            program,
            file.path().display()
        );
        self.current = Some(Playback { child, _file: file });
        Ok(())
    }

    /// Kills and discards the current playback, if any.
    pub async fn stop(&mut self) {
        if let Some(mut playback) = self.current.take() {
            if let Err(e) = playback.child.kill().await {
                debug!("Audio player already gone: {}", e);
            }
        }
    }

    pub fn is_playing(&mut self) -> bool {
        let finished = match self.current.as_mut() {
            Some(playback) => !matches!(playback.child.try_wait(), Ok(None)),
            None => return false,
        };
        if finished {
            self.current = None;
        }
        !finished
    }

    /// Read-aloud button semantics: stops if playing, otherwise starts. Returns
    /// whether audio is now playing.
    pub async fn toggle(&mut self, clip: &AudioClip) -> Result<bool, AudioError> {
        if self.is_playing() {
            self.stop().await;
            return Ok(false);
        }
        self.play(clip).await?;
        Ok(true)
    }

    pub async fn wait(&mut self) -> Result<(), AudioError> {
        if let Some(mut playback) = self.current.take() {
            let status = playback.child.wait().await?;
            if !status.success() {
                warn!("Audio player exited with {}", status);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_rate_from_mime_type() {
        let inline = InlineData::new("audio/L16;codec=pcm;rate=16000", vec![0, 0, 1, 0]);
        let clip = AudioClip::from_inline(&inline).unwrap();
        assert_eq!(clip.sample_rate, 16000);
        assert_eq!(clip.channels, 1);
        assert_eq!(clip.samples(), vec![0, 1]);

        let default_rate = AudioClip::from_inline(&InlineData::new("audio/pcm", vec![])).unwrap();
        assert_eq!(default_rate.sample_rate, DEFAULT_SAMPLE_RATE);
    }

    #[test]
    fn rejects_other_formats_and_odd_payloads() {
        let mp3 = InlineData::new("audio/mpeg", vec![1, 2]);
        assert!(matches!(AudioClip::from_inline(&mp3), Err(AudioError::UnsupportedFormat(_))));

        let odd = InlineData::new("audio/L16;rate=24000", vec![1, 2, 3]);
        assert!(matches!(AudioClip::from_inline(&odd), Err(AudioError::TruncatedSample(3))));
    }

    #[test]
    fn wav_header_matches_payload() {
        let clip = AudioClip::from_pcm(24_000, 1, vec![0u8; 48_000]).unwrap();
        let wav = clip.to_wav();

        assert_eq!(wav.len(), WAV_HEADER_LEN + 48_000);
        assert_eq!(&wav[0..4], b"RIFF");
        assert_eq!(u32::from_le_bytes(wav[4..8].try_into().unwrap()), 36 + 48_000);
        assert_eq!(&wav[8..12], b"WAVE");
        assert_eq!(u32::from_le_bytes(wav[24..28].try_into().unwrap()), 24_000);
        assert_eq!(u32::from_le_bytes(wav[28..32].try_into().unwrap()), 48_000);
        assert_eq!(u32::from_le_bytes(wav[40..44].try_into().unwrap()), 48_000);
        assert!((clip.duration_secs() - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn excerpt_counts_characters() {
        let text = "é".repeat(500);
        assert_eq!(speech_excerpt(&text).chars().count(), SPEECH_CHAR_LIMIT);
        assert_eq!(speech_excerpt("short"), "short");
    }

    #[tokio::test]
    async fn empty_command_cannot_play() {
        let mut player = AudioPlayer::new("   ");
        let clip = AudioClip::from_pcm(24_000, 1, vec![0, 0]).unwrap();
        assert!(matches!(player.play(&clip).await, Err(AudioError::NoPlayer)));
        assert!(!player.is_playing());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn tracks_a_single_playback() {
        // `tail -f` runs until killed.
        let mut player = AudioPlayer::new("tail -f");
        let clip = AudioClip::from_pcm(24_000, 1, vec![0, 0]).unwrap();

        assert!(player.toggle(&clip).await.unwrap());
        assert!(player.is_playing());
        player.play(&clip).await.unwrap();
        assert!(player.is_playing());
        assert!(!player.toggle(&clip).await.unwrap());
        assert!(!player.is_playing());
    }
}
