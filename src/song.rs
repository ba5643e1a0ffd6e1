// Song loading pipeline: bytes -> events -> notes -> chord schedule

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::keymap::PitchLocator;
use crate::midi::{self, DecodeOptions, TempoMap};
use crate::schedule::{self, Schedule, MIN_DURATION_MS};
use crate::transform::{self, TransformOptions};

#[derive(Debug, thiserror::Error)]
pub enum SongError {
    #[error("Song source unavailable: {0}")]
    SourceUnavailable(#[from] std::io::Error),

    #[error("Failed to parse MIDI: {0}")]
    ParseFailed(String),
}

/// Everything that shapes how a file becomes a schedule
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SongOptions {
    pub decode: DecodeOptions,
    pub transform: TransformOptions,
}

/// Result of compiling one file
#[derive(Debug, Clone)]
pub struct CompiledSong {
    pub schedule: Schedule,
    pub ppq: u16,
    /// Gap kept between consecutive chords, from the release gap in ticks
    pub preferred_gap_ms: i64,
    /// Length of the file up to its last event
    pub file_length_ms: i64,
    /// Set when the file could not be parsed; the schedule is then empty
    pub parse_failure: Option<String>,
}

impl CompiledSong {
    fn failed(message: String) -> Self {
        Self {
            schedule: Schedule::default(),
            ppq: midi::DEFAULT_PPQ,
            preferred_gap_ms: 0,
            file_length_ms: 0,
            parse_failure: Some(message),
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.parse_failure.is_some()
    }

    /// Treat a parse failure as an error
    pub fn into_result(self) -> Result<Schedule, SongError> {
        match self.parse_failure {
            Some(message) => Err(SongError::ParseFailed(message)),
            None => Ok(self.schedule),
        }
    }
}

/// Read and compile a MIDI file.
///
/// Only a missing or unreadable file is an error. A malformed file yields an
/// empty schedule with `parse_failure` set.
pub fn load_song(
    path: &Path,
    options: &SongOptions,
    locator: &dyn PitchLocator,
) -> Result<CompiledSong, SongError> {
    let data = std::fs::read(path)?;
    log::info!("Loaded {} ({} bytes)", path.display(), data.len());
    Ok(compile_song(&data, options, locator))
}

/// Compile SMF bytes into a chord schedule
pub fn compile_song(data: &[u8], options: &SongOptions, locator: &dyn PitchLocator) -> CompiledSong {
    let parsed = match midi::read_events(data) {
        Ok(parsed) => parsed,
        Err(e) => {
            log::warn!("Failed to parse MIDI, nothing to play: {}", e);
            return CompiledSong::failed(e.to_string());
        }
    };

    let tempo_map = TempoMap::from_events(&parsed.events, parsed.ppq);
    let file_length_ms = tempo_map.tick_to_ms(parsed.last_tick());

    let events = transform::apply_to_events(parsed.events, &options.transform);
    // the window is chosen in file time, so normalisation waits for the transforms
    let notes = midi::decode_file_time(&events, &tempo_map, &options.decode, |p| locator.supports(p));
    let notes = transform::apply_to_notes(notes, &options.transform);

    let preferred_gap_ms = tempo_map.tick_to_ms(options.decode.release_gap_ticks);
    let schedule = schedule::compile(&notes, preferred_gap_ms, MIN_DURATION_MS);

    log::info!(
        "Compiled {} notes into {} chords ({}ms, ppq {}, gap {}ms)",
        schedule.note_count(),
        schedule.len(),
        schedule.total_duration_ms(),
        tempo_map.ppq(),
        preferred_gap_ms
    );

    CompiledSong {
        schedule,
        ppq: tempo_map.ppq(),
        preferred_gap_ms,
        file_length_ms,
        parse_failure: None,
    }
}
