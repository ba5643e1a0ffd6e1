// Raw MIDI event extraction using midly
// Flattens every track of a Standard MIDI File into one tick-ordered stream

/// Resolution used when the header carries no metrical timing
pub const DEFAULT_PPQ: u16 = 480;

/// A single event from the merged track stream.
///
/// Only the kinds the decoder cares about are distinguished; everything else
/// is kept as `Other` so that it still counts towards the end-of-file tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawEvent {
    NoteOn { tick: u64, channel: u8, pitch: u8, velocity: u8 },
    NoteOff { tick: u64, channel: u8, pitch: u8, velocity: u8 },
    TempoChange { tick: u64, micros_per_quarter: u32 },
    Other { tick: u64 },
}

impl RawEvent {
    pub fn tick(&self) -> u64 {
        match *self {
            RawEvent::NoteOn { tick, .. }
            | RawEvent::NoteOff { tick, .. }
            | RawEvent::TempoChange { tick, .. }
            | RawEvent::Other { tick } => tick,
        }
    }
}

/// Events of a whole file plus its time resolution
#[derive(Debug, Clone)]
pub struct MidiEvents {
    pub events: Vec<RawEvent>,
    pub ppq: u16,
}

impl MidiEvents {
    /// Largest tick seen on any track, 0 for an empty file
    pub fn last_tick(&self) -> u64 {
        self.events.iter().map(RawEvent::tick).max().unwrap_or(0)
    }
}

/// Parse SMF bytes into a merged event stream.
///
/// Tracks are concatenated in file order and then stable-sorted by absolute
/// tick, so events sharing a tick keep their original file order.
pub fn read_events(data: &[u8]) -> Result<MidiEvents, midly::Error> {
    let smf = midly::Smf::parse(data)?;

    let mut ppq = DEFAULT_PPQ;
    if let midly::Timing::Metrical(tpb) = smf.header.timing {
        if tpb.as_int() > 0 {
            ppq = tpb.as_int();
        }
    }

    let mut events: Vec<RawEvent> = Vec::new();

    for track in &smf.tracks {
        let mut current_tick: u64 = 0;

        for event in track {
            current_tick += event.delta.as_int() as u64;
            events.push(convert_event(current_tick, &event.kind));
        }
    }

    events.sort_by_key(RawEvent::tick);

    log::debug!(
        "Read {} events from {} tracks (ppq {})",
        events.len(),
        smf.tracks.len(),
        ppq
    );

    Ok(MidiEvents { events, ppq })
}

fn convert_event(tick: u64, kind: &midly::TrackEventKind) -> RawEvent {
    match *kind {
        midly::TrackEventKind::Meta(midly::MetaMessage::Tempo(t)) => RawEvent::TempoChange {
            tick,
            micros_per_quarter: t.as_int(),
        },
        midly::TrackEventKind::Midi { channel, message } => {
            let channel = channel.as_int();
            match message {
                midly::MidiMessage::NoteOn { key, vel } => RawEvent::NoteOn {
                    tick,
                    channel,
                    pitch: key.as_int(),
                    velocity: vel.as_int(),
                },
                midly::MidiMessage::NoteOff { key, vel } => RawEvent::NoteOff {
                    tick,
                    channel,
                    pitch: key.as_int(),
                    velocity: vel.as_int(),
                },
                _ => RawEvent::Other { tick },
            }
        }
        _ => RawEvent::Other { tick },
    }
}
