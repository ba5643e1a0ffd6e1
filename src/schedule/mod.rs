// Chord schedule types and compiler

pub mod compiler;

pub use compiler::{compile, MIN_DURATION_MS};

use serde::{Deserialize, Serialize};

use crate::midi::NoteInterval;

/// Notes pressed together as one gesture
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chord {
    pub start_ms: i64,
    /// Shared by every member note
    pub duration_ms: i64,
    /// Sorted by pitch
    pub notes: Vec<NoteInterval>,
}

impl Chord {
    pub fn pitches(&self) -> Vec<u8> {
        self.notes.iter().map(|n| n.pitch).collect()
    }

    pub fn end_ms(&self) -> i64 {
        self.start_ms + self.duration_ms
    }
}

/// Ordered chords with strictly increasing start times, the first at 0
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule {
    pub chords: Vec<Chord>,
}

impl Schedule {
    pub fn len(&self) -> usize {
        self.chords.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chords.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Chord> {
        self.chords.iter()
    }

    /// Every note in schedule order
    pub fn notes(&self) -> Vec<NoteInterval> {
        self.chords.iter().flat_map(|c| c.notes.iter().copied()).collect()
    }

    pub fn note_count(&self) -> usize {
        self.chords.iter().map(|c| c.notes.len()).sum()
    }

    /// When the last press is released
    pub fn total_duration_ms(&self) -> i64 {
        self.chords.iter().map(Chord::end_ms).max().unwrap_or(0)
    }
}
