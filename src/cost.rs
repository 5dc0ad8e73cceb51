// The per-candidate cost function J(p).
//
// Scores a candidate pitch against the current decision context as a
// weighted sum of six terms: raw-target fidelity, step size, leap penalty,
// tonic affinity, chord affinity, and repeat penalty. Every weight is a
// WeightCurve — a continuous, monotonic function of the melodic stability
// control m in [0, 1] — so a single scalar trades gestural fidelity
// against tonal correctness across all terms at once.
//
// The cost is nonnegative and deterministic: all randomness lives in
// select.rs, which turns these costs into a choice.

use crate::harmony::Chord;
use crate::pitch::Scale;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// A weight as a function of stability: linear interpolation between the
/// value at m = 0 and the value at m = 1. Continuous, and monotonic as
/// long as the endpoints are ordered.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeightCurve {
    pub at_zero: f64,
    pub at_one: f64,
}

impl WeightCurve {
    pub fn new(at_zero: f64, at_one: f64) -> Self {
        WeightCurve { at_zero, at_one }
    }

    /// Evaluate the curve at stability `m` (clamped to [0, 1]).
    pub fn at(&self, m: f64) -> f64 {
        let m = m.clamp(0.0, 1.0);
        self.at_zero + (self.at_one - self.at_zero) * m
    }
}

/// Weights for the six cost terms. Tunable parameters — explicit
/// configuration, not hidden policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostWeights {
    /// |p - p_raw|: how hard the melody tracks the raw gesture target.
    /// Falls as m rises — a stable melody cares less about the gesture.
    pub raw_fidelity: WeightCurve,
    /// |p - p_prev|: preference for small melodic steps. Rises with m.
    pub step_size: WeightCurve,
    /// Quadratic penalty beyond the leap limit. Rises with m.
    pub leap: WeightCurve,
    /// The leap limit L(m) itself, in semitones. Shrinks as m rises.
    pub leap_limit: WeightCurve,
    /// Scale-degree affinity (tonic/mediant/dominant preferred). Rises with m.
    pub tonic_affinity: WeightCurve,
    /// Chord-tone affinity. Rises with m.
    pub chord_affinity: WeightCurve,
    /// Penalty for repeating p_prev (or p_prev_prev). Rises with m.
    pub repeat: WeightCurve,
}

impl Default for CostWeights {
    fn default() -> Self {
        CostWeights {
            raw_fidelity: WeightCurve::new(1.0, 0.25),
            step_size: WeightCurve::new(0.1, 0.6),
            leap: WeightCurve::new(0.2, 0.8),
            leap_limit: WeightCurve::new(12.0, 5.0),
            tonic_affinity: WeightCurve::new(0.0, 2.0),
            chord_affinity: WeightCurve::new(0.0, 2.5),
            repeat: WeightCurve::new(0.0, 1.5),
        }
    }
}

impl CostWeights {
    /// Load weight overrides from a JSON file.
    pub fn load(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let data = std::fs::read_to_string(path)?;
        let weights: CostWeights = serde_json::from_str(&data)?;
        Ok(weights)
    }
}

/// The transient per-decision context. Recreated for every call; borrows
/// the scale and chord owned by the caller.
#[derive(Debug, Clone, Copy)]
pub struct CostContext<'a> {
    /// Raw target pitch from the input gesture, already clamped to range.
    pub p_raw: u8,
    /// The previously selected pitch.
    pub p_prev: u8,
    /// The pitch selected before that.
    pub p_prev_prev: u8,
    pub scale: &'a Scale,
    pub chord: &'a Chord,
    /// Melodic stability m in [0, 1].
    pub stability: f64,
}

/// Evaluate J(p) for one candidate pitch. Nonnegative for nonnegative
/// weight curves; deterministic.
pub fn cost(p: u8, ctx: &CostContext, weights: &CostWeights) -> f64 {
    let m = ctx.stability;
    let mut total = 0.0;

    // Raw fidelity
    let raw_dist = (p as f64 - ctx.p_raw as f64).abs();
    total += raw_dist * weights.raw_fidelity.at(m);

    // Step size
    let step = (p as f64 - ctx.p_prev as f64).abs();
    total += step * weights.step_size.at(m);

    // Leap penalty: quadratic beyond the stability-dependent limit
    let limit = weights.leap_limit.at(m);
    if step > limit {
        let excess = step - limit;
        total += excess * excess * weights.leap.at(m);
    }

    // Tonic affinity: stable degrees (tonic/mediant/dominant) are free,
    // the leading tone and out-of-scale pitches cost the most.
    let tonic_term = match ctx.scale.degree_of(p) {
        Some(0) | Some(2) | Some(4) => 0.0,
        Some(1) | Some(3) | Some(5) => 1.0,
        Some(_) => 2.0,
        None => 3.0,
    };
    total += tonic_term * weights.tonic_affinity.at(m);

    // Chord affinity: chord tone < scale tone < outside
    let chord_term = if ctx.chord.contains(p) {
        0.0
    } else if ctx.scale.contains(p) {
        1.0
    } else {
        3.0
    };
    total += chord_term * weights.chord_affinity.at(m);

    // Repeat penalty
    let repeat_term = if p == ctx.p_prev {
        1.0
    } else if p == ctx.p_prev_prev {
        0.5
    } else {
        0.0
    };
    total += repeat_term * weights.repeat.at(m);

    total
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::harmony::diatonic_chords;
    use crate::pitch::PitchDictionary;

    fn c_major_context<'a>(scale: &'a Scale, chord: &'a Chord, m: f64) -> CostContext<'a> {
        CostContext {
            p_raw: 64,
            p_prev: 60,
            p_prev_prev: 60,
            scale,
            chord,
            stability: m,
        }
    }

    #[test]
    fn test_weight_curve_interpolation() {
        let curve = WeightCurve::new(1.0, 0.25);
        assert_eq!(curve.at(0.0), 1.0);
        assert_eq!(curve.at(1.0), 0.25);
        assert_eq!(curve.at(0.5), 0.625);
        // Out-of-range m is clamped
        assert_eq!(curve.at(-2.0), 1.0);
        assert_eq!(curve.at(5.0), 0.25);
    }

    #[test]
    fn test_cost_nonnegative_and_deterministic() {
        let scale = PitchDictionary::standard().build_scale("C", "major").unwrap();
        let chords = diatonic_chords(&scale);
        let weights = CostWeights::default();

        for m in [0.0, 0.25, 0.5, 0.75, 1.0] {
            let ctx = c_major_context(&scale, &chords[0], m);
            for p in 48..=84u8 {
                let a = cost(p, &ctx, &weights);
                let b = cost(p, &ctx, &weights);
                assert!(a >= 0.0, "cost must be nonnegative, got {a} at p={p} m={m}");
                assert_eq!(a, b, "cost must be deterministic");
            }
        }
    }

    #[test]
    fn test_raw_target_wins_at_full_stability() {
        // C major, chord C, history at 60, raw target 64, m = 1.0:
        // E4 is the raw target, a chord tone, a stable degree, not a
        // leap and not a repeat — it should be the cheapest candidate.
        let scale = PitchDictionary::standard().build_scale("C", "major").unwrap();
        let chords = diatonic_chords(&scale);
        let ctx = c_major_context(&scale, &chords[0], 1.0);
        let weights = CostWeights::default();

        let candidates = scale.pitches_in_range(48, 84);
        let best = candidates
            .iter()
            .copied()
            .min_by(|&a, &b| {
                cost(a, &ctx, &weights)
                    .partial_cmp(&cost(b, &ctx, &weights))
                    .unwrap()
            })
            .unwrap();
        assert_eq!(best, 64);
    }

    #[test]
    fn test_leap_penalty_kicks_in_beyond_limit() {
        let scale = PitchDictionary::standard().build_scale("C", "major").unwrap();
        let chords = diatonic_chords(&scale);
        let weights = CostWeights::default();
        let ctx = c_major_context(&scale, &chords[0], 1.0);

        // At m=1 the limit is 5 semitones. An octave leap (12) pays a
        // quadratic penalty a fifth (7) does not fully pay.
        let limit = weights.leap_limit.at(1.0);
        assert_eq!(limit, 5.0);

        let small = cost(65, &ctx, &weights); // 5 up: at the limit
        let large = cost(72, &ctx, &weights); // 12 up: 7 over the limit
        assert!(large > small + 20.0, "octave leap should be heavily penalized");
    }

    #[test]
    fn test_repeat_penalized_at_high_stability() {
        let scale = PitchDictionary::standard().build_scale("C", "major").unwrap();
        let chords = diatonic_chords(&scale);
        let weights = CostWeights::default();

        // Same candidate, contexts differing only in p_prev_prev: echoing
        // the note from two steps ago costs exactly half a repeat unit.
        let echo_ctx = CostContext {
            p_raw: 64,
            p_prev: 60,
            p_prev_prev: 64,
            scale: &scale,
            chord: &chords[0],
            stability: 1.0,
        };
        let fresh_ctx = CostContext {
            p_prev_prev: 65,
            ..echo_ctx
        };
        let w = weights.repeat.at(1.0);
        let echo = cost(64, &echo_ctx, &weights);
        let fresh = cost(64, &fresh_ctx, &weights);
        assert!((echo - fresh - 0.5 * w).abs() < 1e-12);

        // Repeating p_prev outright costs a full unit more than moving on.
        let repeat_ctx = CostContext {
            p_raw: 60,
            ..fresh_ctx
        };
        let moved_ctx = CostContext {
            p_prev: 62,
            ..repeat_ctx
        };
        let repeated = cost(60, &repeat_ctx, &weights);
        let moved = cost(60, &moved_ctx, &weights);
        // The contexts differ in the step term too; isolate the repeat
        // unit by removing the step contribution.
        let step_diff = 2.0 * weights.step_size.at(1.0);
        assert!((repeated - (moved - step_diff) - w).abs() < 1e-12);
    }

    #[test]
    fn test_stability_zero_ignores_tonal_terms() {
        let scale = PitchDictionary::standard().build_scale("C", "major").unwrap();
        let chords = diatonic_chords(&scale);
        let weights = CostWeights::default();
        let ctx = c_major_context(&scale, &chords[0], 0.0);

        // At m=0 the tonal weights are all zero: an out-of-scale pitch at
        // the raw target beats an in-scale pitch far from it.
        let chromatic = cost(63, &ctx, &weights); // Eb, out of scale, 1 off target
        let diatonic = cost(72, &ctx, &weights); // C, in chord, 8 off target
        assert!(chromatic < diatonic);
    }
}
