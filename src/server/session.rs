use std::path::{Path, PathBuf};

use crate::chords::ChordTimeline;
use crate::protocol::SessionCipher;

/// Mutable state of one connection. Owned by its handler and dropped with it.
#[derive(Debug)]
pub struct ConnectionSession {
    cipher: SessionCipher,
    selected_file: Option<PathBuf>,
    tempo: Option<u32>,
    audio_processed: bool,
    timeline: Option<ChordTimeline>,
}

impl ConnectionSession {
    pub fn new(cipher: SessionCipher) -> Self {
        Self {
            cipher,
            selected_file: None,
            tempo: None,
            audio_processed: false,
            timeline: None,
        }
    }

    pub fn cipher(&self) -> &SessionCipher {
        &self.cipher
    }

    pub fn selected_file(&self) -> Option<&Path> {
        self.selected_file.as_deref()
    }

    pub fn tempo(&self) -> Option<u32> {
        self.tempo
    }

    pub fn audio_processed(&self) -> bool {
        self.audio_processed
    }

    pub fn timeline(&self) -> Option<&ChordTimeline> {
        self.timeline.as_ref()
    }

    /// Changing the file invalidates any earlier analysis.
    pub fn select_file(&mut self, path: PathBuf) {
        self.selected_file = Some(path);
        self.clear_analysis();
    }

    pub fn set_tempo(&mut self, bpm: u32) {
        self.tempo = Some(bpm);
        self.clear_analysis();
    }

    /// File and tempo, if both have been chosen.
    pub fn analysis_request(&self) -> Option<(PathBuf, u32)> {
        Some((self.selected_file.clone()?, self.tempo?))
    }

    pub fn record_analysis(&mut self, timeline: ChordTimeline) {
        self.audio_processed = true;
        self.timeline = Some(timeline);
    }

    fn clear_analysis(&mut self) {
        self.audio_processed = false;
        self.timeline = None;
    }
}
