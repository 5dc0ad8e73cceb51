// Aeolus — adaptive melody and harmony engine.
//
// Turns a stream of raw gesture targets (a pitch-shaped control signal
// plus a stability scalar) into tonal melody, chords, and voice-led
// accompaniment. The host decides *when* a note happens; this crate
// decides *which* pitch, balancing fidelity to the gesture against
// melodic and harmonic well-formedness through a single cost function.
//
// Architecture:
// - pitch.rs: Scales, pitch classes, degree lookup, nearest-tone snapping
// - cost.rs: The per-candidate cost J(p), six weighted terms, all weights
//   continuous functions of the stability control
// - select.rs: Softmax sampling over costs + deterministic argmin
// - phrase.rs: Finite-horizon DP over a window of future targets
// - harmony.rs: Chord progression state machine, diatonic chord builder,
//   cadence/modulation events
// - voicing.rs: Four-voice chord voicing with bounded voice-leading search
// - validate.rs: Post-hoc melody scoring and idempotent auto-correction
// - improvise.rs: The facade a host drives beat by beat and bar by bar
// - midi.rs: Session recording to Standard MIDI File output
//
// Every operation is synchronous and single-threaded; the only
// randomness is softmax sampling and the modulation coin flip, both fed
// from a caller-supplied seedable RNG, so runs reproduce from a seed.

pub mod cost;
pub mod harmony;
pub mod improvise;
pub mod midi;
pub mod phrase;
pub mod pitch;
pub mod select;
pub mod validate;
pub mod voicing;
