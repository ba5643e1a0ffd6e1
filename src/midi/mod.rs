// MIDI file decoding: raw events, tempo map, note pairing

pub mod decoder;
pub mod events;
pub mod tempo;

pub use decoder::{decode, decode_file_time, DecodeOptions, NoteInterval};
pub use events::{read_events, MidiEvents, RawEvent, DEFAULT_PPQ};
pub use tempo::{TempoMap, TempoSegment, DEFAULT_MICROS_PER_QUARTER};
