// Pitch space: root/mode dictionaries, scales, degree lookup, and snapping.
//
// A Scale is an immutable value: a root pitch class plus the ascending
// semitone intervals of its mode. Scales are built by name from a
// PitchDictionary and replaced wholesale when the root or mode changes —
// nothing downstream ever mutates one.
//
// This module provides:
// - Named root and mode tables (explicit values, not hidden singletons)
// - Scale construction with fail-fast errors for unknown names
// - Pitch-to-degree mapping and in-range pitch enumeration
// - Snapping arbitrary pitches to the nearest in-scale pitch
//
// Used by cost.rs for affinity terms, harmony.rs for diatonic chord
// building, and validate.rs for conformity checks and auto-correction.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// How far (in semitones) `Scale::snap` searches before giving up.
pub const SNAP_RADIUS: u8 = 6;

/// Configuration errors from scale construction. The only error class in
/// the engine — everything downstream returns documented fallbacks instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScaleError {
    UnknownRoot(String),
    UnknownMode(String),
}

impl fmt::Display for ScaleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScaleError::UnknownRoot(name) => write!(f, "unknown root note name: '{name}'"),
            ScaleError::UnknownMode(name) => write!(f, "unknown mode name: '{name}'"),
        }
    }
}

impl std::error::Error for ScaleError {}

/// A mode: ascending semitone intervals from the root. The first interval
/// is always 0, so the root is in the scale by construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModeSpec {
    pub intervals: Vec<u8>,
}

impl ModeSpec {
    pub fn new(intervals: &[u8]) -> Self {
        ModeSpec {
            intervals: intervals.to_vec(),
        }
    }
}

/// Named lookup tables for scale construction.
///
/// Owned by the caller and passed in explicitly so the engine can be
/// instantiated multiple times with different tables (e.g. for tests).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PitchDictionary {
    /// Note name (with enharmonic spellings) -> pitch class 0-11.
    pub roots: BTreeMap<String, u8>,
    /// Mode name -> interval pattern.
    pub modes: BTreeMap<String, ModeSpec>,
}

impl PitchDictionary {
    /// The standard western dictionary: 17 root spellings over 12 pitch
    /// classes, and the ten modes the engine supports.
    pub fn standard() -> Self {
        let roots: BTreeMap<String, u8> = [
            ("C", 0),
            ("C#", 1),
            ("Db", 1),
            ("D", 2),
            ("D#", 3),
            ("Eb", 3),
            ("E", 4),
            ("F", 5),
            ("F#", 6),
            ("Gb", 6),
            ("G", 7),
            ("G#", 8),
            ("Ab", 8),
            ("A", 9),
            ("A#", 10),
            ("Bb", 10),
            ("B", 11),
        ]
        .into_iter()
        .map(|(name, pc)| (name.to_string(), pc))
        .collect();

        let modes: BTreeMap<String, ModeSpec> = [
            ("major", ModeSpec::new(&[0, 2, 4, 5, 7, 9, 11])),
            ("minor", ModeSpec::new(&[0, 2, 3, 5, 7, 8, 10])),
            ("dorian", ModeSpec::new(&[0, 2, 3, 5, 7, 9, 10])),
            ("phrygian", ModeSpec::new(&[0, 1, 3, 5, 7, 8, 10])),
            ("lydian", ModeSpec::new(&[0, 2, 4, 6, 7, 9, 11])),
            ("mixolydian", ModeSpec::new(&[0, 2, 4, 5, 7, 9, 10])),
            ("harmonic minor", ModeSpec::new(&[0, 2, 3, 5, 7, 8, 11])),
            ("melodic minor", ModeSpec::new(&[0, 2, 3, 5, 7, 9, 11])),
            ("major pentatonic", ModeSpec::new(&[0, 2, 4, 7, 9])),
            ("minor pentatonic", ModeSpec::new(&[0, 3, 5, 7, 10])),
        ]
        .into_iter()
        .map(|(name, spec)| (name.to_string(), spec))
        .collect();

        PitchDictionary { roots, modes }
    }

    /// Build a scale from a root name and a mode name.
    ///
    /// Fails fast with `ScaleError` if either name is absent from the
    /// tables — never silently defaults.
    pub fn build_scale(&self, root_name: &str, mode_name: &str) -> Result<Scale, ScaleError> {
        let &root = self
            .roots
            .get(root_name)
            .ok_or_else(|| ScaleError::UnknownRoot(root_name.to_string()))?;
        let mode = self
            .modes
            .get(mode_name)
            .ok_or_else(|| ScaleError::UnknownMode(mode_name.to_string()))?;
        Ok(Scale {
            root,
            intervals: mode.intervals.clone(),
            mode_name: mode_name.to_string(),
        })
    }
}

/// A specific scale: a root pitch class plus its mode's interval pattern.
///
/// Immutable by convention — root or mode changes replace the whole value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scale {
    /// Pitch class of the root (0 = C ... 11 = B).
    pub root: u8,
    /// Ascending semitone intervals from the root. First entry is 0.
    pub intervals: Vec<u8>,
    /// Mode name, for display.
    pub mode_name: String,
}

impl Scale {
    /// Display name, e.g. "C major" or "A minor pentatonic".
    pub fn name(&self) -> String {
        format!("{} {}", pitch_class_name(self.root), self.mode_name)
    }

    /// Number of scale degrees (7 for diatonic modes, 5 for pentatonics).
    pub fn num_degrees(&self) -> usize {
        self.intervals.len()
    }

    /// The scale's pitch classes in degree order (root first).
    pub fn pitch_classes(&self) -> Vec<u8> {
        self.intervals.iter().map(|&iv| (self.root + iv) % 12).collect()
    }

    /// Pitch class of a given degree, wrapping past the top degree.
    pub fn degree_pc(&self, degree: usize) -> u8 {
        let iv = self.intervals[degree % self.intervals.len()];
        (self.root + iv) % 12
    }

    /// Check if a MIDI pitch belongs to this scale.
    pub fn contains(&self, pitch: u8) -> bool {
        self.degree_of(pitch).is_some()
    }

    /// Scale degree (0-based) of a pitch: its position among the scale's
    /// classes ordered by semitone distance from the root. None if the
    /// pitch is not in the scale.
    pub fn degree_of(&self, pitch: u8) -> Option<usize> {
        let pc = (pitch % 12 + 12 - self.root % 12) % 12;
        self.intervals.iter().position(|&iv| iv == pc)
    }

    /// All in-scale pitches in `[low, high]`, ascending and duplicate-free.
    /// The range is small (a few octaves), so this is recomputed on demand.
    pub fn pitches_in_range(&self, low: u8, high: u8) -> Vec<u8> {
        (low..=high).filter(|&p| self.contains(p)).collect()
    }

    /// Snap a pitch to the nearest in-scale pitch.
    ///
    /// Returns the input unchanged if it is already in scale. Otherwise
    /// searches outward up to `SNAP_RADIUS` semitones, checking the lower
    /// pitch before the higher one at each radius so ties break downward.
    /// If nothing is found within the radius the input is returned as-is.
    pub fn snap(&self, pitch: u8) -> u8 {
        if self.contains(pitch) {
            return pitch;
        }
        for offset in 1..=SNAP_RADIUS {
            if pitch >= offset && self.contains(pitch - offset) {
                return pitch - offset;
            }
            if pitch + offset <= 127 && self.contains(pitch + offset) {
                return pitch + offset;
            }
        }
        pitch
    }

    /// A copy of this scale transposed up by `semitones` (mod 12).
    /// Used by the harmony engine's modulation.
    pub fn transposed(&self, semitones: u8) -> Scale {
        Scale {
            root: (self.root + semitones) % 12,
            intervals: self.intervals.clone(),
            mode_name: self.mode_name.clone(),
        }
    }
}

/// Compact pitch-class name, sharp spellings.
pub fn pitch_class_name(pc: u8) -> &'static str {
    const NAMES: [&str; 12] = [
        "C", "C#", "D", "Eb", "E", "F", "F#", "G", "Ab", "A", "Bb", "B",
    ];
    NAMES[(pc % 12) as usize]
}

/// MIDI pitch name with octave, e.g. "C4" for 60.
pub fn pitch_name(pitch: u8) -> String {
    format!("{}{}", pitch_class_name(pitch % 12), (pitch / 12) as i16 - 1)
}
