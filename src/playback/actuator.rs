// Gesture dispatch seam
// The real touch injector lives outside this crate; it plugs in through `Actuator`

use std::sync::atomic::{AtomicUsize, Ordering};

use serde::{Deserialize, Serialize};

/// One finger of a multi-point gesture
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TouchPoint {
    pub x: f64,
    pub y: f64,
    pub duration_ms: i64,
}

/// Points pressed simultaneously
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Gesture {
    pub points: Vec<TouchPoint>,
}

#[derive(Debug, thiserror::Error)]
pub enum ActuatorError {
    /// Nothing is connected that can inject touches
    #[error("Touch capability unavailable")]
    Unavailable,

    #[error("Gesture rejected: {0}")]
    Rejected(String),
}

/// Performs gestures on the device screen.
///
/// `dispatch` must hand the gesture off and return without waiting for it to
/// finish; the actuator owns the touch lifecycle from then on.
pub trait Actuator: Send + Sync {
    fn dispatch(&self, gesture: &Gesture) -> Result<(), ActuatorError>;
}

/// Dry-run actuator that only logs what it would press
#[derive(Debug, Default)]
pub struct LogActuator {
    dispatched: AtomicUsize,
}

impl LogActuator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dispatched(&self) -> usize {
        self.dispatched.load(Ordering::Relaxed)
    }
}

impl Actuator for LogActuator {
    fn dispatch(&self, gesture: &Gesture) -> Result<(), ActuatorError> {
        let n = self.dispatched.fetch_add(1, Ordering::Relaxed) + 1;
        let points: Vec<String> = gesture
            .points
            .iter()
            .map(|p| format!("({:.1}, {:.1})", p.x, p.y))
            .collect();
        log::info!(
            "[gesture {}] {} for chord duration {}ms",
            n,
            points.join(" "),
            // chord members share one duration
            gesture.points.first().map_or(0, |p| p.duration_ms)
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_actuator_counts_gestures() {
        let actuator = LogActuator::new();
        let chord = Gesture {
            points: vec![
                TouchPoint { x: 20.0, y: 65.0, duration_ms: 120 },
                TouchPoint { x: 40.0, y: 65.0, duration_ms: 120 },
            ],
        };

        assert!(actuator.dispatch(&chord).is_ok());
        assert!(actuator.dispatch(&Gesture { points: Vec::new() }).is_ok());
        assert_eq!(actuator.dispatched(), 2);
    }
}
