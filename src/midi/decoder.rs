// Note on/off pairing
// Turns the merged event stream into closed note intervals in milliseconds

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::events::RawEvent;
use super::tempo::TempoMap;

/// A closed note: when it starts and how long it sounds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteInterval {
    pub pitch: u8,
    pub velocity: u8,
    pub start_ms: i64,
    pub duration_ms: i64,
}

/// Tunables for note pairing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodeOptions {
    /// Ticks cut from a note that is re-struck before its note-off
    pub release_gap_ticks: u64,
    /// Shortest note, measured as a tick length from the start of the file
    pub min_note_duration_ticks: u64,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            release_gap_ticks: 1,
            min_note_duration_ticks: 0,
        }
    }
}

/// A note still waiting for its note-off
struct OpenNote {
    start_tick: u64,
    velocity: u8,
}

/// Pair note-ons with note-offs.
///
/// Only pitches accepted by `is_supported` may open a note. Any pitch can
/// still close a note that is already open under the same `(channel, pitch)`
/// key. Notes left open at the end are closed at the last tick of the stream.
///
/// The result is shifted so the earliest note starts at 0 and is ordered by
/// `(start_ms, pitch)`.
pub fn decode<F>(
    events: &[RawEvent],
    tempo_map: &TempoMap,
    options: &DecodeOptions,
    is_supported: F,
) -> Vec<NoteInterval>
where
    F: Fn(u8) -> bool,
{
    let mut notes = decode_file_time(events, tempo_map, options, is_supported);
    normalize(&mut notes);
    notes
}

/// Same pairing as [`decode`], but starts stay in file time (ms since tick 0)
/// and the order is `(start_ms, pitch)` without shifting.
pub fn decode_file_time<F>(
    events: &[RawEvent],
    tempo_map: &TempoMap,
    options: &DecodeOptions,
    is_supported: F,
) -> Vec<NoteInterval>
where
    F: Fn(u8) -> bool,
{
    let min_duration_ms = tempo_map.tick_to_ms(options.min_note_duration_ticks).max(0);

    let close = |pitch: u8, open: OpenNote, end_tick: u64| -> NoteInterval {
        let start_ms = tempo_map.tick_to_ms(open.start_tick);
        let end_ms = tempo_map.tick_to_ms(end_tick);
        NoteInterval {
            pitch,
            velocity: open.velocity,
            start_ms,
            duration_ms: (end_ms - start_ms).max(min_duration_ms).max(0),
        }
    };

    // (channel, pitch) -> open note
    let mut active: HashMap<(u8, u8), OpenNote> = HashMap::new();
    let mut notes: Vec<NoteInterval> = Vec::new();
    let mut last_tick = 0u64;

    for event in events {
        last_tick = last_tick.max(event.tick());

        match *event {
            RawEvent::NoteOn { tick, channel, pitch, velocity } if velocity > 0 => {
                if let Some(previous) = active.remove(&(channel, pitch)) {
                    // re-strike: release slightly early so the key can be pressed again
                    let end_tick = tick
                        .saturating_sub(options.release_gap_ticks)
                        .max(previous.start_tick);
                    notes.push(close(pitch, previous, end_tick));
                }
                if is_supported(pitch) {
                    active.insert((channel, pitch), OpenNote { start_tick: tick, velocity });
                }
            }
            RawEvent::NoteOn { tick, channel, pitch, .. }
            | RawEvent::NoteOff { tick, channel, pitch, .. } => {
                if let Some(open) = active.remove(&(channel, pitch)) {
                    notes.push(close(pitch, open, tick));
                }
            }
            RawEvent::TempoChange { .. } | RawEvent::Other { .. } => {}
        }
    }

    let mut dangling: Vec<((u8, u8), OpenNote)> = active.into_iter().collect();
    if !dangling.is_empty() {
        log::debug!("Closing {} notes still held at end of file", dangling.len());
    }
    // HashMap order is arbitrary; keep output deterministic
    dangling.sort_by_key(|((channel, pitch), open)| (open.start_tick, *channel, *pitch));
    for ((_, pitch), open) in dangling {
        notes.push(close(pitch, open, last_tick));
    }

    notes.sort_by_key(|n| (n.start_ms, n.pitch));
    notes
}

/// Shift so the earliest start is 0, then order by `(start_ms, pitch)`.
pub fn normalize(notes: &mut [NoteInterval]) {
    if let Some(earliest) = notes.iter().map(|n| n.start_ms).min() {
        for note in notes.iter_mut() {
            note.start_ms -= earliest;
        }
    }
    notes.sort_by_key(|n| (n.start_ms, n.pitch));
}
