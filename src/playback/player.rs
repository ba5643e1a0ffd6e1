// Playback driver
// Walks a compiled schedule on its own thread and dispatches one gesture per chord

use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use chrono::Utc;
use crossbeam_channel::{Receiver, Sender};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use uuid::Uuid;

use crate::keymap::PitchLocator;
use crate::schedule::{Chord, Schedule};

use super::actuator::{Actuator, ActuatorError, Gesture, TouchPoint};
use super::{PlaybackState, PlaybackStatus};

/// Called with each chord's start time just before it is dispatched
pub type ProgressCallback = Arc<dyn Fn(i64) + Send + Sync>;

#[derive(Debug, thiserror::Error)]
pub enum PlaybackError {
    #[error("A song is already playing")]
    AlreadyPlaying,

    #[error("Failed to start playback thread: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("Playback thread panicked")]
    Panicked,
}

/// How a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackOutcome {
    Completed,
    Cancelled,
    /// The actuator reported it cannot inject touches; nothing after that
    /// point was dispatched
    CapabilityUnavailable,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackReport {
    pub run_id: Uuid,
    pub outcome: PlaybackOutcome,
    pub chords_dispatched: usize,
    /// Chords with no locatable pitch
    pub chords_skipped: usize,
    /// Chords the actuator refused
    pub chords_failed: usize,
    /// Pitches dropped because the key map has no point for them
    pub pitches_dropped: usize,
}

/// Handle to a running playback
pub struct PlaybackHandle {
    run_id: Uuid,
    thread: JoinHandle<PlaybackReport>,
}

impl PlaybackHandle {
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Block until the run ends
    pub fn wait(self) -> Result<PlaybackReport, PlaybackError> {
        self.thread.join().map_err(|_| PlaybackError::Panicked)
    }
}

/// Plays compiled schedules through an injected actuator and pitch locator.
///
/// At most one run is active at a time; `start` while playing is rejected.
pub struct Player {
    actuator: Arc<dyn Actuator>,
    locator: Arc<dyn PitchLocator>,
    state: Arc<RwLock<PlaybackState>>,
    // Some while a run is active
    stop_tx: Arc<Mutex<Option<Sender<()>>>>,
    progress_callback: Option<ProgressCallback>,
}

impl Player {
    pub fn new(actuator: Arc<dyn Actuator>, locator: Arc<dyn PitchLocator>) -> Self {
        Self {
            actuator,
            locator,
            state: Arc::new(RwLock::new(PlaybackState::new())),
            stop_tx: Arc::new(Mutex::new(None)),
            progress_callback: None,
        }
    }

    /// Set callback for progress updates
    pub fn set_progress_callback(&mut self, callback: ProgressCallback) {
        self.progress_callback = Some(callback);
    }

    pub fn state(&self) -> PlaybackState {
        self.state.read().clone()
    }

    pub fn is_playing(&self) -> bool {
        self.stop_tx.lock().is_some()
    }

    /// Start playing `schedule` on a background thread
    pub fn start(&self, schedule: Schedule) -> Result<PlaybackHandle, PlaybackError> {
        let mut slot = self.stop_tx.lock();
        if slot.is_some() {
            return Err(PlaybackError::AlreadyPlaying);
        }

        let run_id = Uuid::new_v4();
        let (stop_tx, stop_rx) = crossbeam_channel::bounded(1);

        {
            let mut state = self.state.write();
            *state = PlaybackState {
                status: PlaybackStatus::Playing,
                run_id: Some(run_id),
                started_at: Some(Utc::now()),
                position_ms: 0,
                chords_dispatched: 0,
                total_chords: schedule.len(),
            };
        }

        let run = Run {
            run_id,
            actuator: self.actuator.clone(),
            locator: self.locator.clone(),
            state: self.state.clone(),
            stop_rx,
            progress_callback: self.progress_callback.clone(),
        };
        let stop_slot = self.stop_tx.clone();
        let state = self.state.clone();

        let spawned = std::thread::Builder::new()
            .name("autotap-playback".to_string())
            .spawn(move || {
                let report = run.play(&schedule);

                // serialised with start/stop through the slot lock
                let mut slot = stop_slot.lock();
                state.write().status = PlaybackStatus::Idle;
                *slot = None;

                report
            });

        match spawned {
            Ok(thread) => {
                *slot = Some(stop_tx);
                log::info!("Started playback {} ({} chords)", run_id, self.state.read().total_chords);
                Ok(PlaybackHandle { run_id, thread })
            }
            Err(e) => {
                self.state.write().status = PlaybackStatus::Idle;
                Err(PlaybackError::Spawn(e))
            }
        }
    }

    /// Ask the active run to stop. Returns false when nothing is playing.
    ///
    /// The run notices at its next wait; gestures already dispatched are not
    /// taken back.
    pub fn stop(&self) -> bool {
        let slot = self.stop_tx.lock();
        match slot.as_ref() {
            Some(tx) => {
                let _ = tx.try_send(());
                self.state.write().status = PlaybackStatus::Stopping;
                log::info!("Stop requested");
                true
            }
            None => false,
        }
    }
}

/// Everything one playback thread needs
struct Run {
    run_id: Uuid,
    actuator: Arc<dyn Actuator>,
    locator: Arc<dyn PitchLocator>,
    state: Arc<RwLock<PlaybackState>>,
    stop_rx: Receiver<()>,
    progress_callback: Option<ProgressCallback>,
}

impl Run {
    fn play(&self, schedule: &Schedule) -> PlaybackReport {
        let mut report = PlaybackReport {
            run_id: self.run_id,
            outcome: PlaybackOutcome::Completed,
            chords_dispatched: 0,
            chords_skipped: 0,
            chords_failed: 0,
            pitches_dropped: 0,
        };

        // Deadlines are measured from the run start so dispatch time never
        // accumulates into drift.
        let started = Instant::now();

        for chord in schedule.iter() {
            let deadline = started + Duration::from_millis(chord.start_ms.max(0) as u64);
            if !self.wait_until(deadline) {
                report.outcome = PlaybackOutcome::Cancelled;
                break;
            }

            self.state.write().position_ms = chord.start_ms;
            if let Some(ref callback) = self.progress_callback {
                callback(chord.start_ms);
            }

            let (gesture, dropped) = self.build_gesture(chord);
            report.pitches_dropped += dropped;

            if gesture.points.is_empty() {
                log::debug!("Skipping chord at {}ms: no playable keys", chord.start_ms);
                report.chords_skipped += 1;
                continue;
            }

            match self.actuator.dispatch(&gesture) {
                Ok(()) => {
                    report.chords_dispatched += 1;
                    self.state.write().chords_dispatched += 1;
                }
                Err(ActuatorError::Unavailable) => {
                    log::warn!(
                        "Touch capability unavailable at {}ms, abandoning playback {}",
                        chord.start_ms,
                        self.run_id
                    );
                    report.outcome = PlaybackOutcome::CapabilityUnavailable;
                    break;
                }
                Err(e) => {
                    log::warn!("Chord at {}ms not dispatched: {}", chord.start_ms, e);
                    report.chords_failed += 1;
                }
            }
        }

        log::info!(
            "Playback {} finished: {:?}, {} dispatched, {} skipped, {} failed",
            self.run_id,
            report.outcome,
            report.chords_dispatched,
            report.chords_skipped,
            report.chords_failed
        );

        report
    }

    /// Sleep until `deadline`. Returns false if a stop arrived first.
    fn wait_until(&self, deadline: Instant) -> bool {
        let timeout = deadline.saturating_duration_since(Instant::now());
        crossbeam_channel::select! {
            recv(self.stop_rx) -> _ => false,
            default(timeout) => true,
        }
    }

    fn build_gesture(&self, chord: &Chord) -> (Gesture, usize) {
        let mut dropped = 0;
        let points = chord
            .notes
            .iter()
            .filter_map(|note| match self.locator.locate(note.pitch) {
                Some(point) => Some(TouchPoint {
                    x: point.x,
                    y: point.y,
                    duration_ms: note.duration_ms,
                }),
                None => {
                    dropped += 1;
                    None
                }
            })
            .collect();

        (Gesture { points }, dropped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keymap::{KeyMap, ScreenPoint};
    use crate::midi::NoteInterval;
    use crate::schedule::compile;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Records every gesture with the time it arrived
    #[derive(Default)]
    struct RecordingActuator {
        gestures: Mutex<Vec<(Instant, Gesture)>>,
        unavailable: AtomicBool,
    }

    impl Actuator for RecordingActuator {
        fn dispatch(&self, gesture: &Gesture) -> Result<(), ActuatorError> {
            if self.unavailable.load(Ordering::SeqCst) {
                return Err(ActuatorError::Unavailable);
            }
            self.gestures.lock().push((Instant::now(), gesture.clone()));
            Ok(())
        }
    }

    fn note(pitch: u8, start_ms: i64, duration_ms: i64) -> NoteInterval {
        NoteInterval { pitch, velocity: 100, start_ms, duration_ms }
    }

    fn player(actuator: Arc<RecordingActuator>) -> Player {
        let locator = KeyMap::default_layout().locator(None).unwrap();
        Player::new(actuator, Arc::new(locator))
    }

    #[test]
    fn dispatches_one_gesture_per_chord_in_order() {
        let actuator = Arc::new(RecordingActuator::default());
        let player = player(actuator.clone());
        let schedule = compile(&[note(60, 0, 10), note(64, 0, 10), note(62, 30, 10), note(65, 60, 5)], 1, 1);

        let started = Instant::now();
        let report = player.start(schedule).unwrap().wait().unwrap();

        assert_eq!(report.outcome, PlaybackOutcome::Completed);
        assert_eq!(report.chords_dispatched, 3);

        let gestures = actuator.gestures.lock();
        let sizes: Vec<usize> = gestures.iter().map(|(_, g)| g.points.len()).collect();
        assert_eq!(sizes, vec![2, 1, 1]);

        // C4 and E4 on the middle row, same duration
        assert_eq!(gestures[0].1.points[0], TouchPoint { x: 20.0, y: 65.0, duration_ms: 10 });
        assert_eq!(gestures[0].1.points[1].duration_ms, 10);

        // third chord cannot arrive before its start time
        assert!(gestures[2].0.duration_since(started) >= Duration::from_millis(60));
        assert!(!player.is_playing());
        assert_eq!(player.state().status, PlaybackStatus::Idle);
    }

    #[test]
    fn unknown_pitches_are_dropped_and_empty_chords_skipped() {
        let actuator = Arc::new(RecordingActuator::default());
        let player = player(actuator.clone());
        // 61 is a black key, 100 is off the keyboard
        let schedule = compile(&[note(60, 0, 5), note(61, 0, 5), note(100, 10, 5), note(62, 20, 5)], 1, 1);

        let report = player.start(schedule).unwrap().wait().unwrap();

        assert_eq!(report.chords_dispatched, 2);
        assert_eq!(report.chords_skipped, 1);
        assert_eq!(report.pitches_dropped, 2);
        assert_eq!(actuator.gestures.lock()[0].1.points.len(), 1);
    }

    #[test]
    fn second_start_is_rejected_while_playing() {
        let actuator = Arc::new(RecordingActuator::default());
        let player = player(actuator.clone());
        let long = compile(&[note(60, 0, 5), note(62, 10_000, 5)], 1, 1);

        let handle = player.start(long.clone()).unwrap();
        assert!(player.is_playing());
        assert!(matches!(player.start(long), Err(PlaybackError::AlreadyPlaying)));

        assert!(player.stop());
        handle.wait().unwrap();

        // idle again, a new run is accepted
        let short = compile(&[note(60, 0, 5)], 1, 1);
        let report = player.start(short).unwrap().wait().unwrap();
        assert_eq!(report.outcome, PlaybackOutcome::Completed);
    }

    #[test]
    fn stop_abandons_the_pending_wait() {
        let actuator = Arc::new(RecordingActuator::default());
        let player = player(actuator.clone());
        let schedule = compile(&[note(60, 0, 5), note(62, 10_000, 5), note(64, 20_000, 5)], 1, 1);

        let started = Instant::now();
        let handle = player.start(schedule).unwrap();
        while actuator.gestures.lock().is_empty() {
            std::thread::sleep(Duration::from_millis(1));
        }
        player.stop();
        let report = handle.wait().unwrap();

        assert_eq!(report.outcome, PlaybackOutcome::Cancelled);
        assert_eq!(report.chords_dispatched, 1);
        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(!player.stop());
    }

    #[test]
    fn missing_capability_ends_the_run() {
        let actuator = Arc::new(RecordingActuator::default());
        actuator.unavailable.store(true, Ordering::SeqCst);
        let player = player(actuator.clone());
        let schedule = compile(&[note(60, 0, 5), note(62, 10, 5)], 1, 1);

        let report = player.start(schedule).unwrap().wait().unwrap();

        assert_eq!(report.outcome, PlaybackOutcome::CapabilityUnavailable);
        assert_eq!(report.chords_dispatched, 0);
        assert!(!player.is_playing());
    }

    #[test]
    fn progress_reports_each_chord_start() {
        let actuator = Arc::new(RecordingActuator::default());
        let mut player = player(actuator);
        let seen: Arc<Mutex<Vec<i64>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        player.set_progress_callback(Arc::new(move |ms: i64| sink.lock().push(ms)));

        let schedule = compile(&[note(60, 0, 5), note(62, 15, 5), note(64, 30, 5)], 1, 1);
        player.start(schedule).unwrap().wait().unwrap();

        assert_eq!(*seen.lock(), vec![0, 15, 30]);
    }

    #[test]
    fn custom_locators_plug_in() {
        struct Everywhere;
        impl PitchLocator for Everywhere {
            fn locate(&self, pitch: u8) -> Option<ScreenPoint> {
                Some(ScreenPoint { x: pitch as f64, y: 1.0 })
            }
        }

        let actuator = Arc::new(RecordingActuator::default());
        let player = Player::new(actuator.clone(), Arc::new(Everywhere));
        player.start(compile(&[note(100, 0, 5)], 1, 1)).unwrap().wait().unwrap();

        assert_eq!(actuator.gestures.lock()[0].1.points[0].x, 100.0);
    }
}
