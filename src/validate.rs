// Post-hoc melodic quality scoring and auto-correction.
//
// Scores a finished note sequence on four normalized sub-scores —
// scale conformity, chord tones on strong beats, average leap size,
// and dissonant-interval rate — combined with fixed weights into a
// single quality score. Sequences below the threshold are flagged for
// correction. auto_correct_melody repairs the two mechanical defects
// (out-of-scale notes, over-octave leaps) and is idempotent, so it is
// safe to run unconditionally.
//
// Strong beats are the even note indices; the caller passes notes in
// beat order. Scoring reads the sequence, never mutates it.

use crate::harmony::Chord;
use crate::pitch::Scale;
use serde::{Deserialize, Serialize};

/// Quality score below which a sequence is flagged for correction.
pub const CORRECTION_THRESHOLD: f64 = 0.35;

const W_SCALE: f64 = 0.3;
const W_CHORD: f64 = 0.3;
const W_LEAP: f64 = 0.2;
const W_DISSONANCE: f64 = 0.2;

/// The four sub-scores, their weighted combination, and the verdict.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MelodyReport {
    /// Fraction of notes whose pitch class is in the scale.
    pub scale_conformity: f64,
    /// Fraction of strong-beat notes (even indices) that are chord tones.
    pub chord_on_strong_beats: f64,
    /// Mean absolute interval in octaves, capped at 1.
    pub leap_penalty: f64,
    /// Fraction of consecutive intervals in the dissonant classes
    /// (1, 6, or 11 semitones mod 12).
    pub dissonance_rate: f64,
    /// Weighted combination of the four sub-scores.
    pub score: f64,
    pub needs_correction: bool,
}

/// Score a finished note sequence against a scale and its prevailing
/// chord. An empty sequence scores perfectly — there is nothing wrong
/// with it.
pub fn score_melody(notes: &[u8], scale: &Scale, chord: &Chord) -> MelodyReport {
    if notes.is_empty() {
        return MelodyReport {
            scale_conformity: 1.0,
            chord_on_strong_beats: 1.0,
            leap_penalty: 0.0,
            dissonance_rate: 0.0,
            score: W_SCALE + W_CHORD,
            needs_correction: false,
        };
    }

    let in_scale = notes.iter().filter(|&&p| scale.contains(p)).count();
    let scale_conformity = in_scale as f64 / notes.len() as f64;

    let strong: Vec<u8> = notes.iter().copied().step_by(2).collect();
    let chord_on_strong_beats =
        strong.iter().filter(|&&p| chord.contains(p)).count() as f64 / strong.len() as f64;

    let intervals: Vec<i32> = notes
        .windows(2)
        .map(|w| (i32::from(w[1]) - i32::from(w[0])).abs())
        .collect();

    let (leap_penalty, dissonance_rate) = if intervals.is_empty() {
        (0.0, 0.0)
    } else {
        let mean_leap = intervals.iter().sum::<i32>() as f64 / intervals.len() as f64;
        let dissonant = intervals
            .iter()
            .filter(|&&iv| matches!(iv % 12, 1 | 6 | 11))
            .count();
        (
            (mean_leap / 12.0).min(1.0),
            dissonant as f64 / intervals.len() as f64,
        )
    };

    let score = W_SCALE * scale_conformity + W_CHORD * chord_on_strong_beats
        - W_LEAP * leap_penalty
        - W_DISSONANCE * dissonance_rate;

    MelodyReport {
        scale_conformity,
        chord_on_strong_beats,
        leap_penalty,
        dissonance_rate,
        score,
        needs_correction: score < CORRECTION_THRESHOLD,
    }
}

/// Repair a note sequence: snap out-of-scale notes to the nearest scale
/// tone, then octave-shift any note more than an octave from its
/// (already corrected) predecessor until it sits within one.
///
/// Idempotent: corrected output passes through unchanged.
pub fn auto_correct_melody(notes: &[u8], scale: &Scale) -> Vec<u8> {
    let mut corrected = Vec::with_capacity(notes.len());
    for &note in notes {
        let mut p = i32::from(scale.snap(note));
        if let Some(&prev) = corrected.last() {
            let prev = i32::from(prev);
            while p - prev > 12 {
                p -= 12;
            }
            while prev - p > 12 {
                p += 12;
            }
        }
        corrected.push(p.clamp(0, 127) as u8);
    }
    corrected
}
