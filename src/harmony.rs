// Chord-progression state machine and diatonic chord building.
//
// The harmony engine advances on an externally driven bar clock,
// independent of per-note pitch decisions. A ProgressionPattern cycles
// through scale degrees; the chord changes only when the bar counter
// wraps. When the progression index returns to the tonic from a nonzero
// degree a cadence fires, and (optionally) every third completed cycle
// modulates the scale up a fourth or fifth and rebuilds all diatonic
// chords in place.
//
// Diatonic chords are built by stacking scale degrees (d, d+2, d+4), so
// each chord's quality is emergent from the scale's own intervals and
// every chord is a subset of its parent scale by construction. This also
// handles non-heptatonic scales: pentatonic modes get one chord per
// degree, and progression degrees wrap modulo the degree count.
//
// Cadence and modulation events fire synchronously to registered
// listeners inside the advance_bar call that triggers them.

use crate::pitch::{Scale, pitch_class_name};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Coarse triad quality, derived from the stacked-degree intervals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChordQuality {
    Major,
    Minor,
    Diminished,
    Augmented,
    Other,
}

impl ChordQuality {
    fn from_intervals(third: u8, fifth: u8) -> Self {
        match (third, fifth) {
            (4, 7) => ChordQuality::Major,
            (3, 7) => ChordQuality::Minor,
            (3, 6) => ChordQuality::Diminished,
            (4, 8) => ChordQuality::Augmented,
            _ => ChordQuality::Other,
        }
    }

    fn suffix(self) -> &'static str {
        match self {
            ChordQuality::Major => "",
            ChordQuality::Minor => "m",
            ChordQuality::Diminished => "dim",
            ChordQuality::Augmented => "aug",
            ChordQuality::Other => "*",
        }
    }
}

/// A chord: a root plus 3-4 pitch classes functioning as a harmonic unit.
/// Built from a scale degree, so always a subset of its parent scale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chord {
    /// Root pitch class (0-11).
    pub root: u8,
    /// The chord's pitch classes, root first.
    pub pitch_classes: Vec<u8>,
    /// Display name, e.g. "Am" or "Bdim".
    pub name: String,
    pub quality: ChordQuality,
}

impl Chord {
    /// Check whether a MIDI pitch's class belongs to this chord.
    pub fn contains(&self, pitch: u8) -> bool {
        self.pitch_classes.contains(&(pitch % 12))
    }
}

/// Build one triad per scale degree by stacking thirds (degree-wise).
pub fn diatonic_chords(scale: &Scale) -> Vec<Chord> {
    let n = scale.num_degrees();
    (0..n)
        .map(|degree| {
            let root = scale.degree_pc(degree);
            let third = scale.degree_pc(degree + 2);
            let fifth = scale.degree_pc(degree + 4);
            let third_iv = (third + 12 - root) % 12;
            let fifth_iv = (fifth + 12 - root) % 12;
            let quality = ChordQuality::from_intervals(third_iv, fifth_iv);
            Chord {
                root,
                pitch_classes: vec![root, third, fifth],
                name: format!("{}{}", pitch_class_name(root), quality.suffix()),
                quality,
            }
        })
        .collect()
}

/// A cyclic ordered sequence of scale-degree indices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressionPattern {
    pub degrees: Vec<usize>,
    pub name: String,
}

impl ProgressionPattern {
    pub fn new(degrees: Vec<usize>, name: &str) -> Self {
        ProgressionPattern {
            degrees,
            name: name.to_string(),
        }
    }

    /// I-V-vi-IV, the pop staple.
    pub fn pop() -> Self {
        ProgressionPattern::new(vec![0, 4, 5, 3], "I-V-vi-IV")
    }

    /// I-IV-V, the three-chord workhorse.
    pub fn three_chord() -> Self {
        ProgressionPattern::new(vec![0, 3, 4], "I-IV-V")
    }

    /// ii-V-I, the jazz turnaround.
    pub fn turnaround() -> Self {
        ProgressionPattern::new(vec![1, 4, 0], "ii-V-I")
    }

    /// I-vi-IV-V, the doo-wop changes.
    pub fn doo_wop() -> Self {
        ProgressionPattern::new(vec![0, 5, 3, 4], "I-vi-IV-V")
    }
}

/// Events emitted by the harmony engine during advance_bar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum HarmonyEvent {
    /// The progression wrapped back to the tonic from a nonzero degree.
    Cadence { cycle: u32 },
    /// The scale was transposed and all diatonic chords rebuilt.
    Modulation { old_root: u8, new_root: u8 },
}

/// The chord-progression state machine.
///
/// Owned by a single caller and advanced one bar at a time. Chord
/// references returned by the accessors are invalidated by modulation;
/// re-fetch after any advance_bar that reports a change.
pub struct HarmonyEngine {
    scale: Scale,
    diatonic: Vec<Chord>,
    progression: ProgressionPattern,
    progression_index: usize,
    bar_counter: u32,
    bars_per_chord: u32,
    cycle_count: u32,
    modulation_enabled: bool,
    listeners: Vec<Box<dyn FnMut(&HarmonyEvent)>>,
}

impl HarmonyEngine {
    /// Create an engine at bar 0, progression index 0.
    /// `bars_per_chord` of 0 is treated as 1.
    pub fn new(scale: Scale, progression: ProgressionPattern, bars_per_chord: u32) -> Self {
        let diatonic = diatonic_chords(&scale);
        HarmonyEngine {
            scale,
            diatonic,
            progression,
            progression_index: 0,
            bar_counter: 0,
            bars_per_chord: bars_per_chord.max(1),
            cycle_count: 0,
            modulation_enabled: false,
            listeners: Vec::new(),
        }
    }

    /// Enable or disable the every-third-cycle modulation.
    pub fn set_modulation(&mut self, enabled: bool) {
        self.modulation_enabled = enabled;
    }

    /// Register a listener for cadence/modulation events. Listeners are
    /// invoked synchronously inside advance_bar, in registration order.
    pub fn on_event(&mut self, listener: impl FnMut(&HarmonyEvent) + 'static) {
        self.listeners.push(Box::new(listener));
    }

    pub fn scale(&self) -> &Scale {
        &self.scale
    }

    /// Completed progression cycles so far.
    pub fn cycle_count(&self) -> u32 {
        self.cycle_count
    }

    /// The scale degree the progression currently sits on.
    pub fn current_degree(&self) -> usize {
        self.progression.degrees[self.progression_index] % self.scale.num_degrees()
    }

    /// The chord for the current progression position. Pure lookup.
    pub fn current_chord(&self) -> &Chord {
        &self.diatonic[self.current_degree()]
    }

    /// The chord the progression will move to next. Pure lookup.
    pub fn next_chord(&self) -> &Chord {
        let next_index = (self.progression_index + 1) % self.progression.degrees.len();
        let degree = self.progression.degrees[next_index] % self.scale.num_degrees();
        &self.diatonic[degree]
    }

    /// The current chord's root placed in the C2 octave, for a bass line.
    pub fn bass_root_pitch(&self) -> u8 {
        36 + self.current_chord().root % 12
    }

    /// Advance the external bar clock by one bar.
    ///
    /// Returns true exactly when the chord changed. Cadence and (if
    /// enabled) modulation events fire synchronously from here; the RNG
    /// is consumed only by the modulation's fourth-or-fifth coin flip.
    pub fn advance_bar(&mut self, rng: &mut impl Rng) -> bool {
        self.bar_counter += 1;
        if self.bar_counter < self.bars_per_chord {
            return false;
        }
        self.bar_counter = 0;

        let old_degree = self.current_degree();
        self.progression_index = (self.progression_index + 1) % self.progression.degrees.len();

        if self.progression_index == 0 && old_degree != 0 && self.current_degree() == 0 {
            self.cycle_count += 1;
            let cadence = HarmonyEvent::Cadence {
                cycle: self.cycle_count,
            };
            self.emit(&cadence);

            if self.modulation_enabled && self.cycle_count.is_multiple_of(3) {
                self.modulate(rng);
            }
        }

        true
    }

    /// Transpose the scale up a fourth or fifth (uniform choice) and
    /// rebuild the diatonic chords. One-way: previously fetched chord
    /// references are stale after this.
    fn modulate(&mut self, rng: &mut impl Rng) {
        let old_root = self.scale.root;
        let semitones = if rng.random_bool(0.5) { 5 } else { 7 };
        self.scale = self.scale.transposed(semitones);
        self.diatonic = diatonic_chords(&self.scale);
        let event = HarmonyEvent::Modulation {
            old_root,
            new_root: self.scale.root,
        };
        self.emit(&event);
    }

    fn emit(&mut self, event: &HarmonyEvent) {
        for listener in self.listeners.iter_mut() {
            listener(event);
        }
    }
}
