// MIDI output from a recorded improvisation session.
//
// A Session accumulates the melody notes, chord voicings, and bass notes
// a performance produced, time-stamped in beats. write_midi renders it
// as a Standard MIDI File: melody, pad, and bass on separate tracks so
// the parts stay independently auditable.
//
// Uses the `midly` crate for MIDI writing. Output is SMF Format 1
// (multi-track).

use midly::{
    Format, Header, MidiMessage, Smf, Timing, Track, TrackEvent, TrackEventKind,
    num::{u4, u7, u15, u24, u28},
};
use std::path::Path;

/// Ticks per quarter note in MIDI output. One beat = one quarter note.
const TICKS_PER_QUARTER: u16 = 480;

/// One scheduled note on any track.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimedNote {
    /// Onset, in beats from the start of the session.
    pub beat: f64,
    pub pitch: u8,
    pub velocity: u8,
    pub duration_beats: f64,
}

/// A four-voice block chord held for a stretch of beats.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimedChord {
    pub beat: f64,
    pub pitches: [u8; 4],
    pub duration_beats: f64,
}

/// A recorded performance, ready to render.
#[derive(Debug, Clone, Default)]
pub struct Session {
    pub tempo_bpm: u16,
    pub melody: Vec<TimedNote>,
    pub chords: Vec<TimedChord>,
    pub bass: Vec<TimedNote>,
}

impl Session {
    pub fn new(tempo_bpm: u16) -> Self {
        Session {
            tempo_bpm: tempo_bpm.max(1),
            melody: Vec::new(),
            chords: Vec::new(),
            bass: Vec::new(),
        }
    }

    pub fn total_beats(&self) -> f64 {
        let end = |beat: f64, dur: f64| beat + dur;
        self.melody
            .iter()
            .map(|n| end(n.beat, n.duration_beats))
            .chain(self.chords.iter().map(|c| end(c.beat, c.duration_beats)))
            .chain(self.bass.iter().map(|n| end(n.beat, n.duration_beats)))
            .fold(0.0, f64::max)
    }
}

/// Render a session to MIDI and write it to a file.
pub fn write_midi(session: &Session, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let smf = session_to_smf(session);
    let mut buf = Vec::new();
    smf.write(&mut buf)?;
    std::fs::write(path, &buf)?;
    Ok(())
}

fn ticks(beat: f64) -> u32 {
    (beat * f64::from(TICKS_PER_QUARTER)).round().max(0.0) as u32
}

/// (absolute tick, is_note_on, pitch, velocity) — offs sort before ons
/// at the same tick so re-struck pitches do not cancel themselves.
type RawEvent = (u32, bool, u8, u8);

fn push_note(events: &mut Vec<RawEvent>, note: &TimedNote) {
    let on = ticks(note.beat);
    let off = ticks(note.beat + note.duration_beats).max(on + 1);
    events.push((on, true, note.pitch, note.velocity));
    events.push((off, false, note.pitch, 0));
}

fn events_to_track(mut events: Vec<RawEvent>, channel: u4, program: u8, name: &str) -> Track<'_> {
    events.sort_by_key(|&(tick, is_on, pitch, _)| (tick, is_on, pitch));

    let mut track: Track = Vec::new();
    track.push(TrackEvent {
        delta: u28::new(0),
        kind: TrackEventKind::Meta(midly::MetaMessage::TrackName(name.as_bytes())),
    });
    track.push(TrackEvent {
        delta: u28::new(0),
        kind: TrackEventKind::Midi {
            channel,
            message: MidiMessage::ProgramChange {
                program: u7::new(program),
            },
        },
    });

    let mut last_tick = 0u32;
    for (tick, is_on, pitch, velocity) in events {
        let delta = tick - last_tick;
        last_tick = tick;
        let message = if is_on {
            MidiMessage::NoteOn {
                key: u7::new(pitch),
                vel: u7::new(velocity),
            }
        } else {
            MidiMessage::NoteOff {
                key: u7::new(pitch),
                vel: u7::new(0),
            }
        };
        track.push(TrackEvent {
            delta: u28::new(delta),
            kind: TrackEventKind::Midi { channel, message },
        });
    }

    track.push(TrackEvent {
        delta: u28::new(0),
        kind: TrackEventKind::Meta(midly::MetaMessage::EndOfTrack),
    });
    track
}

/// Render a session to an in-memory SMF.
fn session_to_smf(session: &Session) -> Smf<'_> {
    let mut smf = Smf::new(Header::new(
        Format::Parallel,
        Timing::Metrical(u15::new(TICKS_PER_QUARTER)),
    ));

    // Track 0: tempo track
    let mut tempo_track: Track = Vec::new();
    let tempo_microseconds = 60_000_000 / u32::from(session.tempo_bpm);
    tempo_track.push(TrackEvent {
        delta: u28::new(0),
        kind: TrackEventKind::Meta(midly::MetaMessage::Tempo(u24::new(tempo_microseconds))),
    });
    tempo_track.push(TrackEvent {
        delta: u28::new(0),
        kind: TrackEventKind::Meta(midly::MetaMessage::EndOfTrack),
    });
    smf.tracks.push(tempo_track);

    // Melody: flute on channel 0
    let mut melody_events = Vec::new();
    for note in &session.melody {
        push_note(&mut melody_events, note);
    }
    smf.tracks
        .push(events_to_track(melody_events, u4::new(0), 73, "Melody"));

    // Chord pad: warm pad on channel 1, all four voices as one track
    let mut chord_events = Vec::new();
    for chord in &session.chords {
        for &pitch in &chord.pitches {
            push_note(
                &mut chord_events,
                &TimedNote {
                    beat: chord.beat,
                    pitch,
                    velocity: 56,
                    duration_beats: chord.duration_beats,
                },
            );
        }
    }
    smf.tracks
        .push(events_to_track(chord_events, u4::new(1), 89, "Pad"));

    // Bass: acoustic bass on channel 2
    let mut bass_events = Vec::new();
    for note in &session.bass {
        push_note(&mut bass_events, note);
    }
    smf.tracks
        .push(events_to_track(bass_events, u4::new(2), 32, "Bass"));

    smf
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_to_smf_basic() {
        let mut session = Session::new(96);
        session.melody.push(TimedNote {
            beat: 0.0,
            pitch: 64,
            velocity: 88,
            duration_beats: 1.0,
        });
        session.melody.push(TimedNote {
            beat: 1.0,
            pitch: 67,
            velocity: 80,
            duration_beats: 1.0,
        });
        session.chords.push(TimedChord {
            beat: 0.0,
            pitches: [36, 48, 55, 64],
            duration_beats: 4.0,
        });
        session.bass.push(TimedNote {
            beat: 0.0,
            pitch: 36,
            velocity: 72,
            duration_beats: 4.0,
        });

        let smf = session_to_smf(&session);
        // tempo + melody + pad + bass
        assert_eq!(smf.tracks.len(), 4);
        assert_eq!(session.total_beats(), 4.0);

        // Melody track: name + program + 2 on/off pairs + end of track
        assert_eq!(smf.tracks[1].len(), 2 + 4 + 1);
    }

    #[test]
    fn test_deltas_are_monotone() {
        let mut session = Session::new(120);
        for i in 0..8 {
            session.melody.push(TimedNote {
                beat: f64::from(i),
                pitch: 60 + i as u8,
                velocity: 80,
                duration_beats: 0.5,
            });
        }
        let smf = session_to_smf(&session);
        // Every delta is representable and nonnegative by construction;
        // the track round-trips through midly's writer.
        let mut buf = Vec::new();
        smf.write(&mut buf).expect("SMF should serialize");
        assert!(!buf.is_empty());
    }

    #[test]
    fn test_zero_duration_note_still_sounds() {
        let mut session = Session::new(90);
        session.melody.push(TimedNote {
            beat: 2.0,
            pitch: 72,
            velocity: 100,
            duration_beats: 0.0,
        });
        let smf = session_to_smf(&session);
        // The off event lands at least one tick after the on.
        assert_eq!(smf.tracks[1].len(), 2 + 2 + 1);
    }
}
