use serde::{Deserialize, Serialize};

/// A chord starting at `start_secs`. On the wire it is the pair `[label, start]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "(String, f64)", into = "(String, f64)")]
pub struct ChordEvent {
    pub label: String,
    pub start_secs: f64,
}

impl ChordEvent {
    pub fn new(label: impl Into<String>, start_secs: f64) -> Self {
        Self {
            label: label.into(),
            start_secs,
        }
    }
}

impl From<(String, f64)> for ChordEvent {
    fn from((label, start_secs): (String, f64)) -> Self {
        Self { label, start_secs }
    }
}

impl From<ChordEvent> for (String, f64) {
    fn from(event: ChordEvent) -> Self {
        (event.label, event.start_secs)
    }
}

/// Chord changes in time order. Runs of the same label keep only their first event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChordTimeline {
    events: Vec<ChordEvent>,
}

impl ChordTimeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a timeline from one prediction per segment.
    pub fn from_predictions<I, S>(predictions: I) -> Self
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        let mut timeline = Self::new();
        for (label, start) in predictions {
            timeline.push(label, start);
        }
        timeline
    }

    /// Appends a prediction, returning false if it continues the current chord.
    pub fn push(&mut self, label: impl Into<String>, start_secs: f64) -> bool {
        let label = label.into();
        if let Some(last) = self.events.last() {
            if last.label == label {
                return false;
            }
            debug_assert!(start_secs > last.start_secs);
        }
        self.events.push(ChordEvent::new(label, start_secs));
        true
    }

    pub fn events(&self) -> &[ChordEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
