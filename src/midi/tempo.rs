// Tempo map and tick -> millisecond conversion

use super::events::{RawEvent, DEFAULT_PPQ};

/// Tempo used until the first tempo event (120 BPM)
pub const DEFAULT_MICROS_PER_QUARTER: u32 = 500_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TempoSegment {
    pub start_tick: u64,
    pub micros_per_quarter: u32,
}

/// Piecewise-constant tempo timeline of one file.
///
/// Always starts with a segment at tick 0. Conversion sums
/// `ticks * micros_per_quarter` over the segments exactly and divides by
/// `ppq * 1000` once at the end, so for a constant tempo the result is
/// precisely `tick * T / (P * 1000)` truncated.
#[derive(Debug, Clone)]
pub struct TempoMap {
    segments: Vec<TempoSegment>,
    ppq: u16,
}

impl TempoMap {
    /// Build the map from every `TempoChange` in the stream.
    ///
    /// Segments are stable-sorted by tick; when several tempo events share a
    /// tick the first one seen in the stream wins.
    pub fn from_events(events: &[RawEvent], ppq: u16) -> Self {
        let mut segments: Vec<TempoSegment> = events
            .iter()
            .filter_map(|e| match *e {
                RawEvent::TempoChange { tick, micros_per_quarter } => Some(TempoSegment {
                    start_tick: tick,
                    micros_per_quarter,
                }),
                _ => None,
            })
            .collect();

        segments.sort_by_key(|s| s.start_tick);
        segments.dedup_by_key(|s| s.start_tick);

        if segments.first().map_or(true, |s| s.start_tick != 0) {
            segments.insert(0, TempoSegment {
                start_tick: 0,
                micros_per_quarter: DEFAULT_MICROS_PER_QUARTER,
            });
        }

        Self {
            segments,
            ppq: if ppq == 0 { DEFAULT_PPQ } else { ppq },
        }
    }

    /// Map with a single tempo for the whole file
    pub fn constant(micros_per_quarter: u32, ppq: u16) -> Self {
        Self::from_events(
            &[RawEvent::TempoChange { tick: 0, micros_per_quarter }],
            ppq,
        )
    }

    pub fn ppq(&self) -> u16 {
        self.ppq
    }

    pub fn segments(&self) -> &[TempoSegment] {
        &self.segments
    }

    /// Milliseconds elapsed from the start of the file to `tick`
    pub fn tick_to_ms(&self, tick: u64) -> i64 {
        // in units of microseconds * ppq
        let mut scaled: u128 = 0;
        let mut last_tick = 0u64;
        let mut tempo = DEFAULT_MICROS_PER_QUARTER;

        for segment in &self.segments {
            if segment.start_tick >= tick {
                break;
            }
            scaled += (segment.start_tick - last_tick) as u128 * tempo as u128;
            last_tick = segment.start_tick;
            tempo = segment.micros_per_quarter;
        }

        scaled += (tick - last_tick) as u128 * tempo as u128;

        let ms = scaled / (self.ppq as u128 * 1000);
        i64::try_from(ms).unwrap_or(i64::MAX)
    }
}
