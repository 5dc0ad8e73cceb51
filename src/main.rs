// Aeolus — demo improvisation session.
//
// Simulates a gesture stream (a random walk over raw target pitch and
// stability), improvises a melody over a chord progression, validates
// the result, and writes the session to MIDI.
//
// Usage:
//   cargo run -- [output.mid] [--bars N] [--bars-per-chord N] [--seed N]
//     [--root NAME] [--mode MODE] [--progression NAME] [--tempo BPM]
//     [--stability M] [--weights FILE] [--modulate] [--deterministic]
//
// Progressions: pop, three-chord, turnaround, doo-wop

use aeolus::cost::CostWeights;
use aeolus::harmony::{HarmonyEvent, ProgressionPattern};
use aeolus::improvise::{ChordChange, Improviser};
use aeolus::midi::{Session, TimedChord, TimedNote, write_midi};
use aeolus::pitch::{PitchDictionary, pitch_class_name, pitch_name};
use aeolus::validate::{auto_correct_melody, score_melody};
use rand::Rng;
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::path::Path;

const BEATS_PER_BAR: u32 = 4;

fn main() {
    let args: Vec<String> = std::env::args().collect();

    let output_path = args.get(1)
        .filter(|s| !s.starts_with("--"))
        .map(|s| s.as_str())
        .unwrap_or("session.mid");
    let bars: u32 = parse_flag(&args, "--bars").unwrap_or(16);
    let bars_per_chord: u32 = parse_flag(&args, "--bars-per-chord").unwrap_or(2);
    let seed: Option<u64> = parse_flag(&args, "--seed");
    let tempo: u16 = parse_flag(&args, "--tempo").unwrap_or(96);
    let root_name: String = parse_flag(&args, "--root").unwrap_or_else(|| "C".to_string());
    let mode_name: String = parse_flag(&args, "--mode").unwrap_or_else(|| "major".to_string());
    let progression_name: String =
        parse_flag(&args, "--progression").unwrap_or_else(|| "pop".to_string());
    let base_stability: f64 = parse_flag(&args, "--stability").unwrap_or(0.5);
    let weights_path: Option<String> = parse_flag(&args, "--weights");
    let modulate = has_flag(&args, "--modulate");
    let deterministic = has_flag(&args, "--deterministic");

    println!("=== Aeolus Improvisation Session ===");
    println!("Output: {}", output_path);
    println!("Key: {} {}", root_name, mode_name);
    println!("Progression: {}", progression_name);
    println!("Tempo: {} BPM, {} bars, chord every {} bar(s)", tempo, bars, bars_per_chord);
    if let Some(s) = seed {
        println!("Seed: {}", s);
    }
    println!();

    let mut rng = if let Some(s) = seed {
        StdRng::seed_from_u64(s)
    } else {
        StdRng::from_os_rng()
    };

    println!("[1/4] Building scale...");
    let scale = match PitchDictionary::standard().build_scale(&root_name, &mode_name) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("  {}", e);
            std::process::exit(1);
        }
    };
    println!("  {} ({} degrees)", scale.name(), scale.num_degrees());

    let mut improviser = Improviser::new(scale, parse_progression(&progression_name), bars_per_chord);
    improviser.set_deterministic(deterministic);
    improviser.set_modulation(modulate);
    improviser.on_event(|event| match event {
        HarmonyEvent::Cadence { cycle } => println!("  Cadence (cycle {})", cycle),
        HarmonyEvent::Modulation { old_root, new_root } => println!(
            "  Modulation: {} -> {}",
            pitch_class_name(*old_root),
            pitch_class_name(*new_root)
        ),
    });

    if let Some(path) = weights_path {
        match CostWeights::load(Path::new(&path)) {
            Ok(w) => {
                println!("  Loaded weights from {}.", path);
                improviser.set_weights(w);
            }
            Err(e) => println!("  Failed to load weights: {}. Using defaults.", e),
        }
    }

    println!("[2/4] Improvising {} bars...", bars);
    let mut session = Session::new(tempo);
    let chord_beats = f64::from(bars_per_chord * BEATS_PER_BAR);

    // Gesture simulation state: a drifting raw target and stability.
    let mut raw_target: f64 = 66.0;
    let mut stability = base_stability.clamp(0.0, 1.0);

    record_chord(&mut session, &improviser.voice_current_chord(), 0.0, chord_beats);

    for bar in 0..bars {
        for beat in 0..BEATS_PER_BAR {
            raw_target = (raw_target + rng.random_range(-4.0..=4.0)).clamp(48.0, 84.0);
            stability = (stability + rng.random_range(-0.08..=0.08)).clamp(0.0, 1.0);

            let note = improviser.decide_note(raw_target.round() as u8, stability, &mut rng);
            session.melody.push(TimedNote {
                beat: f64::from(bar * BEATS_PER_BAR + beat),
                pitch: note.pitch,
                velocity: note.velocity,
                duration_beats: note.duration_beats,
            });
        }

        if let Some(change) = improviser.advance_bar(&mut rng)
            && bar + 1 < bars
        {
            let onset = f64::from((bar + 1) * BEATS_PER_BAR);
            record_chord(&mut session, &change, onset, chord_beats);
            println!(
                "  Bar {:>3}: {} (bass {})",
                bar + 2,
                change.chord.name,
                pitch_name(change.bass_pitch)
            );
        }
    }

    println!("[3/4] Validating melody...");
    let melody: Vec<u8> = session.melody.iter().map(|n| n.pitch).collect();
    let scale = improviser.scale();
    let report = score_melody(&melody, scale, improviser.current_chord());
    println!(
        "  Scale conformity: {:.2}, chord on strong beats: {:.2}",
        report.scale_conformity, report.chord_on_strong_beats
    );
    println!(
        "  Leap penalty: {:.2}, dissonance rate: {:.2}",
        report.leap_penalty, report.dissonance_rate
    );
    println!("  Score: {:.2}", report.score);
    if report.needs_correction {
        println!("  Below threshold, auto-correcting...");
        let corrected = auto_correct_melody(&melody, scale);
        for (note, &pitch) in session.melody.iter_mut().zip(&corrected) {
            note.pitch = pitch;
        }
    }

    println!("[4/4] Writing MIDI to {}...", output_path);
    match write_midi(&session, Path::new(output_path)) {
        Ok(()) => {
            let duration_seconds = session.total_beats() * 60.0 / f64::from(tempo);
            println!("  Done! Duration: {:.0}s ({} bars)", duration_seconds, bars);
        }
        Err(e) => {
            eprintln!("  Error writing MIDI: {}", e);
            std::process::exit(1);
        }
    }

    println!();
    println!("Play with: timidity {} (or any MIDI player)", output_path);
}

fn record_chord(session: &mut Session, change: &ChordChange, beat: f64, duration_beats: f64) {
    session.chords.push(TimedChord {
        beat,
        pitches: change.voicing.pitches,
        duration_beats,
    });
    session.bass.push(TimedNote {
        beat,
        pitch: change.bass_pitch,
        velocity: 72,
        duration_beats,
    });
}

fn parse_progression(name: &str) -> ProgressionPattern {
    match name.to_lowercase().as_str() {
        "pop" => ProgressionPattern::pop(),
        "three-chord" => ProgressionPattern::three_chord(),
        "turnaround" => ProgressionPattern::turnaround(),
        "doo-wop" => ProgressionPattern::doo_wop(),
        _ => {
            eprintln!("Unknown progression '{}'. Using pop.", name);
            ProgressionPattern::pop()
        }
    }
}

fn parse_flag<T: std::str::FromStr>(args: &[String], flag: &str) -> Option<T> {
    args.iter().position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .and_then(|v| v.parse().ok())
}

fn has_flag(args: &[String], flag: &str) -> bool {
    args.iter().any(|a| a == flag)
}
