// Song pre-processing
// Pitch rewrites run on raw events (before the key map filters pitches),
// timing rewrites run on decoded notes (before chord compilation)

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::midi::decoder::normalize;
use crate::midi::{NoteInterval, RawEvent};

/// Pitch classes of C#, D#, F#, G#, A#
const BLACK_KEY_CLASSES: [u8; 5] = [1, 3, 6, 8, 10];

/// What to do with notes the instrument may not have a key for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlackKeyPolicy {
    Keep,
    /// Move up a semitone onto the next white key
    Up,
    /// Move down a semitone onto the previous white key
    Down,
    Remove,
}

impl Default for BlackKeyPolicy {
    fn default() -> Self {
        Self::Keep
    }
}

/// Optional rewrites applied while loading a song. The default changes nothing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransformOptions {
    /// Semitones to shift every note by, clamped to the MIDI range
    #[serde(default)]
    pub transpose: i8,

    #[serde(default)]
    pub black_keys: BlackKeyPolicy,

    /// Keep only the highest note of notes sharing both start and end
    #[serde(default)]
    pub melody_only: bool,

    /// Longest stretch of silence kept between notes
    #[serde(default)]
    pub max_silence_ms: Option<i64>,

    /// Play only notes starting at or after this point (ms from the start of the file)
    #[serde(default)]
    pub from_ms: Option<i64>,

    /// Play only notes starting at or before this point (ms from the start of the file)
    #[serde(default)]
    pub to_ms: Option<i64>,
}

impl Default for TransformOptions {
    fn default() -> Self {
        Self {
            transpose: 0,
            black_keys: BlackKeyPolicy::default(),
            melody_only: false,
            max_silence_ms: None,
            from_ms: None,
            to_ms: None,
        }
    }
}

impl TransformOptions {
    pub fn is_identity(&self) -> bool {
        *self == Self::default()
    }
}

pub fn is_black_key(pitch: u8) -> bool {
    BLACK_KEY_CLASSES.contains(&(pitch % 12))
}

/// Rewrite the pitch of every note event; removed notes drop out of the stream
pub fn apply_to_events(events: Vec<RawEvent>, options: &TransformOptions) -> Vec<RawEvent> {
    if options.transpose == 0 && options.black_keys == BlackKeyPolicy::Keep {
        return events;
    }

    events
        .into_iter()
        .filter_map(|event| match event {
            RawEvent::NoteOn { tick, channel, pitch, velocity } => {
                map_pitch(pitch, options).map(|pitch| RawEvent::NoteOn { tick, channel, pitch, velocity })
            }
            RawEvent::NoteOff { tick, channel, pitch, velocity } => {
                map_pitch(pitch, options).map(|pitch| RawEvent::NoteOff { tick, channel, pitch, velocity })
            }
            other => Some(other),
        })
        .collect()
}

fn map_pitch(pitch: u8, options: &TransformOptions) -> Option<u8> {
    let pitch = (pitch as i16 + options.transpose as i16).clamp(0, 127) as u8;

    if !is_black_key(pitch) {
        return Some(pitch);
    }

    match options.black_keys {
        BlackKeyPolicy::Keep => Some(pitch),
        BlackKeyPolicy::Up => Some(if pitch < 127 { pitch + 1 } else { pitch }),
        BlackKeyPolicy::Down => Some(if pitch > 0 { pitch - 1 } else { pitch }),
        BlackKeyPolicy::Remove => None,
    }
}

/// Apply the timing rewrites to decoded notes and renormalise to 0.
///
/// Notes are expected in file time, as produced by `decode_file_time`, so the
/// window bounds line up with the file's own timeline.
pub fn apply_to_notes(mut notes: Vec<NoteInterval>, options: &TransformOptions) -> Vec<NoteInterval> {
    if options.melody_only {
        notes = keep_highest(notes);
    }

    if options.from_ms.is_some() || options.to_ms.is_some() {
        let from = options.from_ms.unwrap_or(i64::MIN);
        let to = options.to_ms.unwrap_or(i64::MAX);
        notes.retain(|n| n.start_ms >= from && n.start_ms <= to);
    }

    normalize(&mut notes);

    if let Some(max_silence) = options.max_silence_ms {
        shrink_silences(&mut notes, max_silence.max(0));
    }

    notes
}

fn keep_highest(notes: Vec<NoteInterval>) -> Vec<NoteInterval> {
    let mut groups: BTreeMap<(i64, i64), NoteInterval> = BTreeMap::new();
    for note in notes {
        let key = (note.start_ms, note.start_ms + note.duration_ms);
        groups
            .entry(key)
            .and_modify(|kept| {
                if note.pitch > kept.pitch {
                    *kept = note;
                }
            })
            .or_insert(note);
    }
    groups.into_values().collect()
}

/// Shorten every stretch where nothing sounds down to `max_silence_ms`.
/// Expects notes sorted by start.
fn shrink_silences(notes: &mut [NoteInterval], max_silence_ms: i64) {
    let Some(first) = notes.first() else {
        return;
    };

    let mut sounding_until = first.start_ms;
    let mut removed = 0i64;

    for note in notes.iter_mut() {
        let silence = note.start_ms - sounding_until;
        if silence > max_silence_ms {
            removed += silence - max_silence_ms;
        }
        sounding_until = sounding_until.max(note.start_ms + note.duration_ms);
        note.start_ms -= removed;
    }

    if removed > 0 {
        log::debug!("Removed {}ms of silence", removed);
    }
}
