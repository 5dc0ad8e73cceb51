// Four-voice chord voicing with smooth voice leading.
//
// Given the previous voicing and the next chord, finds pitches for
// bass/tenor/alto/soprano that realize the chord while moving each voice
// as little as possible. The soprano is pinned to the melody pitch; the
// three lower voices are searched over a bounded candidate set: for each
// chord pitch class, the few octave placements inside the voice's range
// nearest to where the voice last sat. Candidate triples are enumerated
// in nearest-first order and the search stops after a fixed combination
// cap, so the cost is a handful of integer comparisons per chord change
// rather than an exhaustive search.
//
// Combination cost is total absolute motion across all four voices plus
// a flat penalty per crossed voice pair. A voicing must cover every
// pitch class of the chord (soprano included) to be eligible; among
// equal-cost voicings the one doubling the chord root wins.

use crate::harmony::Chord;

/// Inclusive MIDI ranges for bass, tenor, alto, soprano.
pub const VOICE_RANGES: [(u8, u8); 4] = [(36, 57), (43, 64), (50, 71), (57, 79)];

/// Hard cap on candidate combinations examined per solve.
pub const MAX_COMBINATIONS: usize = 50;

/// Octave placements kept per (voice, pitch class), nearest first.
const OCTAVE_CANDIDATES_PER_VOICE: usize = 3;

/// Flat cost added for each adjacent voice pair out of order.
pub const CROSSING_PENALTY: f64 = 10.0;

/// The persistent voicing state: where each voice currently sits,
/// bass to soprano.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoiceState {
    pub pitches: [u8; 4],
}

impl VoiceState {
    pub fn new(pitches: [u8; 4]) -> Self {
        VoiceState { pitches }
    }
}

impl Default for VoiceState {
    /// An open C voicing, comfortably inside every voice range.
    fn default() -> Self {
        VoiceState {
            pitches: [36, 48, 55, 64],
        }
    }
}

/// A solved voicing and its voice-leading cost. An infinite cost marks
/// the fallback taken when no eligible combination was found.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Voicing {
    pub pitches: [u8; 4],
    pub cost: f64,
}

/// Octave placements of `pc` inside `range`, nearest to `prev` first,
/// truncated to the per-voice candidate budget.
fn octave_candidates(pc: u8, range: (u8, u8), prev: u8) -> Vec<u8> {
    let mut placements: Vec<u8> = (range.0..=range.1).filter(|p| p % 12 == pc).collect();
    placements.sort_by_key(|&p| (i32::from(p) - i32::from(prev)).abs());
    placements.truncate(OCTAVE_CANDIDATES_PER_VOICE);
    placements
}

/// All candidates for one lower voice: every chord pitch class placed in
/// the voice's range, merged and ordered nearest-first so the cheapest
/// combinations are enumerated before the cap bites.
fn voice_candidates(chord: &Chord, range: (u8, u8), prev: u8) -> Vec<u8> {
    let mut candidates: Vec<u8> = chord
        .pitch_classes
        .iter()
        .flat_map(|&pc| octave_candidates(pc, range, prev))
        .collect();
    candidates.sort_by_key(|&p| (i32::from(p) - i32::from(prev)).abs());
    candidates.dedup();
    candidates
}

fn combination_cost(prev: &VoiceState, pitches: &[u8; 4]) -> f64 {
    let mut total = 0.0;
    for (new, old) in pitches.iter().zip(&prev.pitches) {
        total += f64::from((i32::from(*new) - i32::from(*old)).abs());
    }
    for pair in pitches.windows(2) {
        if pair[0] > pair[1] {
            total += CROSSING_PENALTY;
        }
    }
    total
}

fn covers_chord(chord: &Chord, pitches: &[u8; 4]) -> bool {
    chord
        .pitch_classes
        .iter()
        .all(|&pc| pitches.iter().any(|&p| p % 12 == pc))
}

/// Solve voice leading from `prev` into `chord`, with the soprano pinned
/// to `melody`.
///
/// Ties between equal-cost voicings go to the one with more root
/// doublings. If no eligible combination exists within the search
/// budget, the previous voicing is returned unchanged with an infinite
/// cost so the caller can tell a hold from a solution.
pub fn solve(prev: &VoiceState, chord: &Chord, melody: u8) -> Voicing {
    let bass = voice_candidates(chord, VOICE_RANGES[0], prev.pitches[0]);
    let tenor = voice_candidates(chord, VOICE_RANGES[1], prev.pitches[1]);
    let alto = voice_candidates(chord, VOICE_RANGES[2], prev.pitches[2]);

    let mut best: Option<(Voicing, usize)> = None;
    let mut examined = 0usize;

    'search: for &b in &bass {
        for &t in &tenor {
            for &a in &alto {
                if examined >= MAX_COMBINATIONS {
                    break 'search;
                }
                examined += 1;

                let pitches = [b, t, a, melody];
                if !covers_chord(chord, &pitches) {
                    continue;
                }
                let cost = combination_cost(prev, &pitches);
                let doubled_roots =
                    pitches.iter().filter(|&&p| p % 12 == chord.root).count();
                let better = match &best {
                    None => true,
                    Some((v, roots)) => {
                        cost < v.cost || (cost == v.cost && doubled_roots > *roots)
                    }
                };
                if better {
                    best = Some((Voicing { pitches, cost }, doubled_roots));
                }
            }
        }
    }

    best.map(|(v, _)| v).unwrap_or(Voicing {
        pitches: prev.pitches,
        cost: f64::INFINITY,
    })
}
