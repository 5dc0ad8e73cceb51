// Finite-horizon phrase optimization.
//
// Given a short window of future raw targets, finds the globally cheapest
// pitch sequence under the same cost function the per-beat selector uses,
// via dynamic programming over (time step, candidate) states. Because each
// cost call depends on the two preceding pitches, the recurrence threads
// the predecessor chain through the DP table.
//
// Work is O(H * N^2) cost evaluations with H <= ~8 and N ~ 20-40 — a few
// thousand pure arithmetic calls, comfortably inside a frame budget.

use crate::cost::{CostContext, CostWeights, cost};
use crate::harmony::Chord;
use crate::pitch::Scale;

/// Cost added at the final step to candidates that close the phrase on
/// neither the tonic nor a current chord tone. Applied only for horizons
/// of two or more steps — a one-note phrase has no closure to shape, which
/// keeps the H = 1 case identical to a single deterministic selection.
pub const END_OF_PHRASE_PENALTY: f64 = 4.0;

/// An optimized phrase: the chosen pitches and their total path cost.
/// Ephemeral — computed, consumed, discarded.
#[derive(Debug, Clone, PartialEq)]
pub struct PhraseResult {
    pub pitches: Vec<u8>,
    pub total_cost: f64,
}

impl PhraseResult {
    fn empty() -> Self {
        PhraseResult {
            pitches: Vec::new(),
            total_cost: 0.0,
        }
    }
}

/// Optimize a phrase over `raw_targets`, starting from the given pitch
/// history. Candidates are all in-scale pitches in `[low, high]`.
///
/// A zero horizon or an empty candidate set returns an empty result with
/// cost 0 — a normal transient, not an error.
#[allow(clippy::too_many_arguments)]
pub fn optimize_phrase(
    raw_targets: &[u8],
    p_prev: u8,
    p_prev_prev: u8,
    scale: &Scale,
    chord: &Chord,
    stability: f64,
    weights: &CostWeights,
    low: u8,
    high: u8,
) -> PhraseResult {
    let candidates = scale.pitches_in_range(low, high);
    let horizon = raw_targets.len();
    if horizon == 0 || candidates.is_empty() {
        return PhraseResult::empty();
    }
    let n = candidates.len();

    // dp[t][i]: cheapest cost of any path ending at candidate i on step t.
    // pred[t][i]: index j of the step t-1 candidate on that path.
    let mut dp = vec![vec![0.0f64; n]; horizon];
    let mut pred = vec![vec![0usize; n]; horizon];

    for (i, &p) in candidates.iter().enumerate() {
        let ctx = CostContext {
            p_raw: raw_targets[0],
            p_prev,
            p_prev_prev,
            scale,
            chord,
            stability,
        };
        dp[0][i] = cost(p, &ctx, weights);
    }

    for t in 1..horizon {
        for (i, &p) in candidates.iter().enumerate() {
            let mut best_cost = f64::INFINITY;
            let mut best_j = 0;
            for (j, &prev_candidate) in candidates.iter().enumerate() {
                // The predecessor's own predecessor: for t = 1 that is the
                // caller's history, afterwards it comes off the DP path.
                let prev_prev_pitch = if t == 1 {
                    p_prev
                } else {
                    candidates[pred[t - 1][j]]
                };
                let ctx = CostContext {
                    p_raw: raw_targets[t],
                    p_prev: prev_candidate,
                    p_prev_prev: prev_prev_pitch,
                    scale,
                    chord,
                    stability,
                };
                let total = dp[t - 1][j] + cost(p, &ctx, weights);
                if total < best_cost {
                    best_cost = total;
                    best_j = j;
                }
            }
            dp[t][i] = best_cost;
            pred[t][i] = best_j;
        }
    }

    // Phrase closure: push the final note toward the tonic or a chord tone.
    if horizon >= 2 {
        let tonic_pc = scale.root;
        for (i, &p) in candidates.iter().enumerate() {
            let is_tonic = p % 12 == tonic_pc;
            if !is_tonic && !chord.contains(p) {
                dp[horizon - 1][i] += END_OF_PHRASE_PENALTY;
            }
        }
    }

    // Global minimum at the final step, ties toward the lowest pitch
    // (candidates are ascending, so the first minimum wins).
    let mut best_i = 0;
    let mut best_cost = dp[horizon - 1][0];
    for (i, &c) in dp[horizon - 1].iter().enumerate().skip(1) {
        if c < best_cost {
            best_cost = c;
            best_i = i;
        }
    }

    // Backtrack through stored predecessors.
    let mut indices = vec![0usize; horizon];
    indices[horizon - 1] = best_i;
    for t in (1..horizon).rev() {
        indices[t - 1] = pred[t][indices[t]];
    }

    PhraseResult {
        pitches: indices.iter().map(|&i| candidates[i]).collect(),
        total_cost: best_cost,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::harmony::diatonic_chords;
    use crate::pitch::PitchDictionary;
    use crate::select::deterministic_select;

    fn setup() -> (Scale, Vec<Chord>) {
        let scale = PitchDictionary::standard().build_scale("C", "major").unwrap();
        let chords = diatonic_chords(&scale);
        (scale, chords)
    }

    #[test]
    fn test_zero_horizon_returns_empty() {
        let (scale, chords) = setup();
        let result = optimize_phrase(
            &[],
            60,
            60,
            &scale,
            &chords[0],
            0.5,
            &CostWeights::default(),
            48,
            84,
        );
        assert!(result.pitches.is_empty());
        assert_eq!(result.total_cost, 0.0);
    }

    #[test]
    fn test_empty_candidate_range_returns_empty() {
        let (scale, chords) = setup();
        // A range with no in-scale pitches: (61, 61) is C# only.
        let result = optimize_phrase(
            &[60, 62],
            60,
            60,
            &scale,
            &chords[0],
            0.5,
            &CostWeights::default(),
            61,
            61,
        );
        assert!(result.pitches.is_empty());
        assert_eq!(result.total_cost, 0.0);
    }

    #[test]
    fn test_horizon_one_matches_deterministic_select() {
        let (scale, chords) = setup();
        let weights = CostWeights::default();

        for (raw, prev, prev_prev, m) in [
            (64u8, 60u8, 60u8, 1.0),
            (70, 65, 62, 0.4),
            (55, 72, 71, 0.0),
        ] {
            let result = optimize_phrase(
                &[raw],
                prev,
                prev_prev,
                &scale,
                &chords[0],
                m,
                &weights,
                48,
                84,
            );
            let candidates = scale.pitches_in_range(48, 84);
            let ctx = CostContext {
                p_raw: raw,
                p_prev: prev,
                p_prev_prev: prev_prev,
                scale: &scale,
                chord: &chords[0],
                stability: m,
            };
            let direct = deterministic_select(&candidates, &ctx, &weights).unwrap();
            assert_eq!(result.pitches, vec![direct]);
            assert_eq!(result.total_cost, cost(direct, &ctx, &weights));
        }
    }

    #[test]
    fn test_phrase_follows_ascending_targets() {
        let (scale, chords) = setup();
        let result = optimize_phrase(
            &[60, 62, 64, 65, 67],
            60,
            60,
            &scale,
            &chords[0],
            0.7,
            &CostWeights::default(),
            48,
            84,
        );
        assert_eq!(result.pitches.len(), 5);
        // The phrase should trend upward with the targets.
        assert!(result.pitches.last().unwrap() > result.pitches.first().unwrap());
        // Every pitch is in scale by construction of the candidate set.
        for &p in &result.pitches {
            assert!(scale.contains(p));
        }
    }

    #[test]
    fn test_end_penalty_steers_closure() {
        let (scale, chords) = setup();
        // Targets sit on D (degree 1, neither tonic nor C-chord tone).
        // With the closure penalty the final note should land on the
        // tonic or a chord tone instead of paying the penalty.
        let result = optimize_phrase(
            &[62, 62, 62, 62],
            60,
            60,
            &scale,
            &chords[0],
            1.0,
            &CostWeights::default(),
            48,
            84,
        );
        let last = *result.pitches.last().unwrap();
        let closes_well = last % 12 == scale.root || chords[0].contains(last);
        assert!(closes_well, "phrase should close on tonic or chord tone, got {last}");
    }

    #[test]
    fn test_total_cost_matches_path_replay() {
        // Replaying the chosen path through the cost function (plus the
        // closure penalty if due) must reproduce total_cost exactly.
        let (scale, chords) = setup();
        let weights = CostWeights::default();
        let targets = [64u8, 66, 67, 69];
        let result = optimize_phrase(
            &targets, 62, 60, &scale, &chords[4], 0.6, &weights, 48, 84,
        );

        let mut replay = 0.0;
        let mut prev = 62u8;
        let mut prev_prev = 60u8;
        for (t, &p) in result.pitches.iter().enumerate() {
            let ctx = CostContext {
                p_raw: targets[t],
                p_prev: prev,
                p_prev_prev: prev_prev,
                scale: &scale,
                chord: &chords[4],
                stability: 0.6,
            };
            replay += cost(p, &ctx, &weights);
            prev_prev = prev;
            prev = p;
        }
        let last = *result.pitches.last().unwrap();
        if last % 12 != scale.root && !chords[4].contains(last) {
            replay += END_OF_PHRASE_PENALTY;
        }
        assert!((replay - result.total_cost).abs() < 1e-9);
    }
}
