// Chord schedule compilation
// Groups notes that start together and fits each group before the next one

use std::collections::BTreeMap;

use crate::midi::NoteInterval;

use super::{Chord, Schedule};

/// Shortest press the actuator is asked to perform
pub const MIN_DURATION_MS: i64 = 1;

/// Compile note intervals into a dispatchable chord schedule.
///
/// Notes sharing a start become one chord. Each chord gets a single duration:
/// its longest note, shortened so it ends `preferred_gap_ms` before the next
/// chord (or exactly at it when the gap does not fit), and never shorter than
/// `min_duration_ms`. When even the floor does not fit, the next chord and
/// everything after it is pushed later by the same amount.
///
/// The last chord keeps its longest duration. Starts are renormalised so the
/// first chord is at 0.
pub fn compile(notes: &[NoteInterval], preferred_gap_ms: i64, min_duration_ms: i64) -> Schedule {
    let gap = preferred_gap_ms.max(0);
    let floor = min_duration_ms.max(0);

    let mut groups: BTreeMap<i64, Vec<NoteInterval>> = BTreeMap::new();
    for note in notes {
        groups.entry(note.start_ms).or_default().push(*note);
    }

    let mut starts: Vec<i64> = groups.keys().copied().collect();
    let members: Vec<Vec<NoteInterval>> = groups.into_values().collect();
    let mut durations: Vec<i64> = Vec::with_capacity(starts.len());

    for (i, chord_notes) in members.iter().enumerate() {
        let longest = chord_notes
            .iter()
            .map(|n| n.duration_ms)
            .max()
            .unwrap_or(0)
            .max(0);

        let mut assignable = assignable_duration(&starts, i, gap, longest);

        if assignable < floor && i + 1 < starts.len() {
            let shift = floor - (starts[i + 1] - starts[i]);
            if shift > 0 {
                log::debug!(
                    "Chord at {}ms too close to the next one, pushing the rest back {}ms",
                    starts[i],
                    shift
                );
                for start in &mut starts[i + 1..] {
                    *start += shift;
                }
            }
            assignable = assignable_duration(&starts, i, gap, longest);
        }

        durations.push(longest.min(assignable).max(floor));
    }

    let origin = starts.first().copied().unwrap_or(0);

    let chords = members
        .into_iter()
        .zip(starts)
        .zip(durations)
        .map(|((mut chord_notes, start), duration_ms)| {
            let start_ms = start - origin;
            chord_notes.sort_by_key(|n| n.pitch);
            // one finger per key
            chord_notes.dedup_by_key(|n| n.pitch);
            for note in &mut chord_notes {
                note.start_ms = start_ms;
                note.duration_ms = duration_ms;
            }
            Chord {
                start_ms,
                duration_ms,
                notes: chord_notes,
            }
        })
        .collect();

    Schedule { chords }
}

/// How long chord `i` may sound before running into chord `i + 1`
fn assignable_duration(starts: &[i64], i: usize, gap: i64, longest: i64) -> i64 {
    let start = starts[i];
    match starts.get(i + 1) {
        None => longest,
        Some(&next) => {
            let mut allowed_end = next - gap;
            if allowed_end <= start {
                allowed_end = next;
            }
            (allowed_end - start).max(0)
        }
    }
}
