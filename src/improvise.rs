// The improvisation facade.
//
// Owns the harmony engine, the pitch history, and the running voicing
// state, and exposes the per-beat / per-bar surface a host drives:
// decide_note() answers "which pitch" for one raw gesture target,
// plan_phrase() optimizes a short window of future targets at once, and
// advance_bar() ticks the bar clock and re-voices the accompaniment on
// chord changes. Everything is synchronous call-and-return; the caller
// supplies the RNG so runs are reproducible from a seed.

use crate::cost::{CostContext, CostWeights};
use crate::harmony::{Chord, HarmonyEngine, HarmonyEvent, ProgressionPattern};
use crate::phrase::{PhraseResult, optimize_phrase};
use crate::pitch::Scale;
use crate::select::{SelectorConfig, deterministic_select, softmax_select};
use crate::voicing::{VoiceState, Voicing, solve};
use rand::Rng;

/// One melody note handed to synthesis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoteEvent {
    pub pitch: u8,
    pub velocity: u8,
    pub duration_beats: f64,
}

/// Everything synthesis needs on a chord change: the new chord, the
/// solved four-voice voicing, and the bass root.
#[derive(Debug, Clone, PartialEq)]
pub struct ChordChange {
    pub chord: Chord,
    pub voicing: Voicing,
    pub bass_pitch: u8,
}

/// The top-level improviser: melody decisions over a harmony engine.
pub struct Improviser {
    harmony: HarmonyEngine,
    weights: CostWeights,
    selector: SelectorConfig,
    voices: VoiceState,
    p_prev: u8,
    p_prev_prev: u8,
    beat_index: u64,
    low: u8,
    high: u8,
    deterministic: bool,
}

impl Improviser {
    /// Build an improviser over the given scale and progression. Melody
    /// decisions start from a history seeded at the scale root's octave
    /// inside the default working range.
    pub fn new(scale: Scale, progression: ProgressionPattern, bars_per_chord: u32) -> Self {
        let start = 60 + scale.root;
        Improviser {
            harmony: HarmonyEngine::new(scale, progression, bars_per_chord),
            weights: CostWeights::default(),
            selector: SelectorConfig::default(),
            voices: VoiceState::default(),
            p_prev: start,
            p_prev_prev: start,
            beat_index: 0,
            low: 48,
            high: 84,
            deterministic: false,
        }
    }

    /// Use argmin selection instead of softmax sampling. For offline
    /// rendering and zero-variance output.
    pub fn set_deterministic(&mut self, deterministic: bool) {
        self.deterministic = deterministic;
    }

    /// Set the working MIDI range for melody candidates.
    pub fn set_range(&mut self, low: u8, high: u8) {
        self.low = low.min(high);
        self.high = high.max(low);
    }

    pub fn set_weights(&mut self, weights: CostWeights) {
        self.weights = weights;
    }

    pub fn set_modulation(&mut self, enabled: bool) {
        self.harmony.set_modulation(enabled);
    }

    /// Register a listener for cadence and modulation events.
    pub fn on_event(&mut self, listener: impl FnMut(&HarmonyEvent) + 'static) {
        self.harmony.on_event(listener);
    }

    pub fn scale(&self) -> &Scale {
        self.harmony.scale()
    }

    pub fn current_chord(&self) -> &Chord {
        self.harmony.current_chord()
    }

    pub fn last_pitch(&self) -> u8 {
        self.p_prev
    }

    /// Decide one melody pitch for a raw gesture target.
    ///
    /// The raw target is clamped to the working range first. An empty
    /// candidate set (degenerate range) falls back to the clamped raw
    /// pitch itself rather than failing.
    pub fn decide_note(&mut self, p_raw: u8, stability: f64, rng: &mut impl Rng) -> NoteEvent {
        let p_raw = p_raw.clamp(self.low, self.high);
        let candidates = self.harmony.scale().pitches_in_range(self.low, self.high);
        let ctx = CostContext {
            p_raw,
            p_prev: self.p_prev,
            p_prev_prev: self.p_prev_prev,
            scale: self.harmony.scale(),
            chord: self.harmony.current_chord(),
            stability,
        };
        let pitch = if self.deterministic {
            deterministic_select(&candidates, &ctx, &self.weights)
        } else {
            softmax_select(&candidates, &ctx, &self.weights, &self.selector, rng)
        }
        .unwrap_or(p_raw);

        let velocity = self.shape_velocity(stability);
        self.commit(pitch);

        NoteEvent {
            pitch,
            velocity,
            duration_beats: 1.0,
        }
    }

    /// Optimize a whole window of future raw targets at once and commit
    /// the result to the pitch history. Returns the chosen phrase; empty
    /// for a zero horizon.
    pub fn plan_phrase(&mut self, raw_targets: &[u8], stability: f64) -> PhraseResult {
        let result = optimize_phrase(
            raw_targets,
            self.p_prev,
            self.p_prev_prev,
            self.harmony.scale(),
            self.harmony.current_chord(),
            stability,
            &self.weights,
            self.low,
            self.high,
        );
        for &p in &result.pitches {
            self.commit(p);
        }
        result
    }

    /// Tick the bar clock. On a chord change, re-solve the four-voice
    /// voicing against the new chord (soprano pinned to the last melody
    /// pitch) and report what synthesis should play.
    pub fn advance_bar(&mut self, rng: &mut impl Rng) -> Option<ChordChange> {
        if !self.harmony.advance_bar(rng) {
            return None;
        }
        Some(self.voice_current_chord())
    }

    /// Solve and commit a voicing for the chord the engine currently sits
    /// on. advance_bar calls this on every chord change; hosts call it
    /// once at startup to voice the opening chord.
    pub fn voice_current_chord(&mut self) -> ChordChange {
        let chord = self.harmony.current_chord().clone();
        let voicing = solve(&self.voices, &chord, self.p_prev);
        if voicing.cost.is_finite() {
            self.voices = VoiceState::new(voicing.pitches);
        }
        ChordChange {
            bass_pitch: self.harmony.bass_root_pitch(),
            chord,
            voicing,
        }
    }

    fn commit(&mut self, pitch: u8) {
        self.p_prev_prev = self.p_prev;
        self.p_prev = pitch;
        self.beat_index += 1;
    }

    /// Louder when the gesture is stable, with a strong-beat accent.
    fn shape_velocity(&self, stability: f64) -> u8 {
        let base = 64.0 + 32.0 * stability.clamp(0.0, 1.0);
        let accent = if self.beat_index.is_multiple_of(2) { 12.0 } else { 0.0 };
        (base + accent).round().min(127.0) as u8
    }
}
