//! # Musical Tuning Module
//!
//! Note classification for a standard-tuned six-string guitar. Maps a detected
//! frequency to the nearest open-string note and derives a tighten/loosen hint
//! from the distance to that note's reference frequency.
//!
//! ## Features
//! - Fixed reference table for the six open strings (E2 to E4)
//! - Nearest-note lookup with deterministic tie-breaking
//! - Directional tuning hints with a 1 Hz in-tune tolerance
//! - Note name to reference frequency lookups

use once_cell::sync::Lazy;
use std::collections::BTreeMap;
use std::fmt;

/// A single target note: open-string name and reference frequency.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Note {
    /// Note name (e.g., "E2", "A2")
    pub name: &'static str,
    /// Reference frequency in Hz
    pub frequency: f32,
}

/// Reference frequencies for the six open strings of a standard-tuned guitar.
///
/// Declaration order is part of the contract: [`nearest_note`] resolves a
/// frequency exactly equidistant between two entries to the earlier one, so
/// reordering this table changes observable behavior.
pub const NOTES: [Note; 6] = [
    Note { name: "E2", frequency: 82.0 },
    Note { name: "A2", frequency: 110.0 },
    Note { name: "D3", frequency: 147.0 },
    Note { name: "G3", frequency: 196.0 },
    Note { name: "B3", frequency: 247.0 },
    Note { name: "E4", frequency: 330.0 },
];

/// Static map for quick note name to reference frequency lookups.
static NOTE_MAP: Lazy<BTreeMap<&'static str, f32>> =
    Lazy::new(|| NOTES.iter().map(|note| (note.name, note.frequency)).collect());

/// Looks up the reference frequency for a note name (e.g., "A2").
pub fn note_frequency(name: &str) -> Option<f32> {
    NOTE_MAP.get(name).copied()
}

/// Finds the note whose reference frequency is closest to `freq`.
///
/// Ties resolve to the note declared first in [`NOTES`]; `min_by` keeps the
/// first of equally-minimal elements, which makes the result stable across
/// repeated calls.
///
/// # Arguments
/// * `freq` - Input frequency in Hz
///
/// # Returns
/// * The closest [`Note`] from the reference table
pub fn nearest_note(freq: f32) -> &'static Note {
    NOTES
        .iter()
        .min_by(|a, b| {
            let diff_a = (a.frequency - freq).abs();
            let diff_b = (b.frequency - freq).abs();
            diff_a.partial_cmp(&diff_b).unwrap_or(std::cmp::Ordering::Equal)
        })
        .unwrap() // This is safe as NOTES is never empty.
}

/// Directional advice for bringing a string to pitch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TuningHint {
    /// Within 1 Hz of the reference frequency
    InTune,
    /// Measured frequency is above the reference; slacken the string
    Loosen,
    /// Measured frequency is below the reference; wind the string up
    Tighten,
}

impl fmt::Display for TuningHint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            TuningHint::InTune => "In tune",
            TuningHint::Loosen => "Loosen string",
            TuningHint::Tighten => "Tighten string",
        };
        f.write_str(text)
    }
}

/// Derives a tuning hint from the distance between `note` and `freq`.
///
/// A measured frequency within 1 Hz of the reference counts as in tune;
/// above the reference means the string is too tight, below means too slack.
///
/// # Arguments
/// * `note` - The target note, usually from [`nearest_note`]
/// * `freq` - Measured frequency in Hz
pub fn tuning_hint(note: &Note, freq: f32) -> TuningHint {
    let diff = note.frequency - freq;

    if diff.abs() < 1.0 {
        TuningHint::InTune
    } else if diff < 0.0 {
        TuningHint::Loosen
    } else if diff > 0.0 {
        TuningHint::Tighten
    } else {
        // Exact equality is already covered by the tolerance branch above;
        // kept as the in-tune fallback.
        TuningHint::InTune
    }
}

/// Classifies a frequency estimate into its nearest note and tuning hint.
pub fn note_and_hint(freq: f32) -> (&'static Note, TuningHint) {
    let note = nearest_note(freq);
    (note, tuning_hint(note, freq))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frequencies_near_a_reference_classify_to_that_note() {
        for note in &NOTES {
            for offset in [-0.5, 0.0, 0.5] {
                let found = nearest_note(note.frequency + offset);
                assert_eq!(found.name, note.name, "offset {offset}");
            }
        }
    }

    #[test]
    fn equidistant_frequency_resolves_to_the_earlier_note() {
        // 128.5 Hz is exactly halfway between A2 (110) and D3 (147).
        for _ in 0..10 {
            assert_eq!(nearest_note(128.5).name, "A2");
        }
    }

    #[test]
    fn hint_respects_the_one_hertz_tolerance() {
        let a2 = nearest_note(110.0);
        assert_eq!(tuning_hint(a2, 110.0), TuningHint::InTune);
        assert_eq!(tuning_hint(a2, 110.9), TuningHint::InTune);
        assert_eq!(tuning_hint(a2, 109.1), TuningHint::InTune);
        // At exactly 1 Hz off the tolerance no longer applies.
        assert_eq!(tuning_hint(a2, 111.0), TuningHint::Loosen);
        assert_eq!(tuning_hint(a2, 109.0), TuningHint::Tighten);
        assert_eq!(tuning_hint(a2, 150.0), TuningHint::Loosen);
        assert_eq!(tuning_hint(a2, 80.0), TuningHint::Tighten);
    }

    #[test]
    fn silence_classifies_as_lowest_string() {
        let (note, hint) = note_and_hint(0.0);
        assert_eq!(note.name, "E2");
        assert_eq!(hint, TuningHint::Tighten);
    }

    #[test]
    fn note_names_resolve_to_reference_frequencies() {
        assert_eq!(note_frequency("E2"), Some(82.0));
        assert_eq!(note_frequency("E4"), Some(330.0));
        assert_eq!(note_frequency("C9"), None);
    }

    #[test]
    fn hints_render_as_display_strings() {
        assert_eq!(TuningHint::InTune.to_string(), "In tune");
        assert_eq!(TuningHint::Loosen.to_string(), "Loosen string");
        assert_eq!(TuningHint::Tighten.to_string(), "Tighten string");
    }
}
