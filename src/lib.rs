// Autotap - MIDI songs played as screen taps
// Main library entry point

pub mod config;
pub mod keymap;
pub mod midi;
pub mod playback;
pub mod schedule;
pub mod song;
pub mod transform;

pub use keymap::{KeyMap, PitchLocator, ScreenPoint};
pub use playback::{Actuator, Gesture, Player};
pub use schedule::{Chord, Schedule};
pub use song::{compile_song, load_song, CompiledSong, SongError, SongOptions};
