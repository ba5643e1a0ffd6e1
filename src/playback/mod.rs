// Schedule playback

pub mod actuator;
pub mod player;

pub use actuator::{Actuator, ActuatorError, Gesture, LogActuator, TouchPoint};
pub use player::{PlaybackError, PlaybackHandle, PlaybackOutcome, PlaybackReport, Player, ProgressCallback};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Current player status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackStatus {
    /// Ready to play
    Idle,
    /// Dispatching a schedule
    Playing,
    /// Stop requested, waiting for the run to notice
    Stopping,
}

/// Snapshot of the player, safe to read while a run is active
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackState {
    pub status: PlaybackStatus,
    pub run_id: Option<Uuid>,
    pub started_at: Option<DateTime<Utc>>,
    /// Start of the chord most recently reached
    pub position_ms: i64,
    pub chords_dispatched: usize,
    pub total_chords: usize,
}

impl PlaybackState {
    pub fn new() -> Self {
        Self {
            status: PlaybackStatus::Idle,
            run_id: None,
            started_at: None,
            position_ms: 0,
            chords_dispatched: 0,
            total_chords: 0,
        }
    }

    pub fn is_playing(&self) -> bool {
        self.status != PlaybackStatus::Idle
    }
}

impl Default for PlaybackState {
    fn default() -> Self {
        Self::new()
    }
}
