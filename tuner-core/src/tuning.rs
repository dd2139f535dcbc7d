//! # Guitar Tuning Module
//!
//! Reference pitches for a standard-tuned guitar, nearest-string matching and
//! the in-tune / sharp / flat classification.
//!
//! ## Features
//! - Ordered reference table (E2 A2 D3 G3 B3 E4) with stable tie-breaking
//! - Nearest-string lookup with absolute distance in Hz
//! - Tolerance based verdicts with the low-E second harmonic compensation
//! - Cent deviation and display label formatting

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::error::{Result, TunerError};

/// Name of the string whose fundamental is usually picked up at its second
/// harmonic.
pub const HALVING_NOTE: &str = "E2";

/// A single reference pitch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceNote {
    /// Note name (e.g., "E2", "A2")
    pub name: String,
    /// Frequency in Hz
    pub frequency: f64,
}

/// Standard guitar tuning in table order.
///
/// The order matters: on an exact tie between two strings the one listed
/// first wins.
static STANDARD_TUNING: Lazy<Vec<ReferenceNote>> = Lazy::new(|| {
    const STRINGS: [(&str, f64); 6] = [
        ("E2", 164.82),
        ("A2", 110.00),
        ("D3", 146.83),
        ("G3", 196.00),
        ("B3", 246.94),
        ("E4", 329.63),
    ];
    STRINGS
        .iter()
        .map(|&(name, frequency)| ReferenceNote {
            name: name.to_string(),
            frequency,
        })
        .collect()
});

/// Immutable, ordered mapping from note name to reference frequency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<ReferenceNote>", into = "Vec<ReferenceNote>")]
pub struct ReferenceTable {
    notes: Vec<ReferenceNote>,
}

impl ReferenceTable {
    /// Builds a table, checking that it is non-empty, that every frequency is
    /// finite and strictly positive, and that names and frequencies are
    /// pairwise distinct.
    pub fn new(notes: Vec<ReferenceNote>) -> Result<Self> {
        if notes.is_empty() {
            return Err(TunerError::InvalidReferenceTable(
                "table has no entries".to_string(),
            ));
        }
        for (i, note) in notes.iter().enumerate() {
            if !note.frequency.is_finite() || note.frequency <= 0.0 {
                return Err(TunerError::InvalidReferenceTable(format!(
                    "{} has non-positive frequency {}",
                    note.name, note.frequency
                )));
            }
            for other in &notes[..i] {
                if other.name == note.name {
                    return Err(TunerError::InvalidReferenceTable(format!(
                        "duplicate note name {}",
                        note.name
                    )));
                }
                if other.frequency == note.frequency {
                    return Err(TunerError::InvalidReferenceTable(format!(
                        "{} and {} share frequency {}",
                        other.name, note.name, note.frequency
                    )));
                }
            }
        }
        Ok(Self { notes })
    }

    /// The six strings of a standard-tuned guitar.
    pub fn standard() -> Self {
        Self {
            notes: STANDARD_TUNING.clone(),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &ReferenceNote> {
        self.notes.iter()
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    /// Looks up a note by name.
    pub fn get(&self, name: &str) -> Option<&ReferenceNote> {
        self.notes.iter().find(|note| note.name == name)
    }

    /// Finds the string closest to a given frequency.
    ///
    /// # Arguments
    /// * `freq` - Detected frequency in Hz
    ///
    /// # Returns
    /// * `Some((note, distance))` - Closest reference and `|freq - reference|`
    /// * `None` - The table is empty
    ///
    /// On an exact tie the note listed first in the table is returned.
    pub fn find_closest_string(&self, freq: f64) -> Option<(&ReferenceNote, f64)> {
        let mut closest: Option<(&ReferenceNote, f64)> = None;
        for note in &self.notes {
            let distance = (freq - note.frequency).abs();
            match closest {
                Some((_, best)) if distance >= best => {}
                _ => closest = Some((note, distance)),
            }
        }
        closest
    }
}

impl Default for ReferenceTable {
    fn default() -> Self {
        Self::standard()
    }
}

impl TryFrom<Vec<ReferenceNote>> for ReferenceTable {
    type Error = TunerError;

    fn try_from(notes: Vec<ReferenceNote>) -> Result<Self> {
        Self::new(notes)
    }
}

impl From<ReferenceTable> for Vec<ReferenceNote> {
    fn from(table: ReferenceTable) -> Self {
        table.notes
    }
}

/// Tuning state of a single string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verdict {
    /// Never matched since startup.
    #[default]
    Unknown,
    Tuned,
    /// Sharp.
    High,
    /// Flat.
    Low,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Unknown => "Unknown",
            Verdict::Tuned => "Tuned",
            Verdict::High => "High",
            Verdict::Low => "Low",
        }
    }
}

/// Outcome of classifying one detection against its matched string.
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub verdict: Verdict,
    /// Frequency to report, after the second harmonic compensation.
    pub reported_frequency: f64,
    /// Deviation of the reported frequency from the reference, in cents.
    pub cents_deviation: f64,
}

/// Classifies a detected frequency against its closest reference.
///
/// # Arguments
/// * `detected` - Dominant frequency in Hz
/// * `note` - Reference matched by [`ReferenceTable::find_closest_string`]
/// * `distance` - Matched distance in Hz
/// * `tolerance` - Half-width of the in-tune band in Hz (inclusive)
/// * `halving_note` - The one string whose reported frequency is halved
///
/// The verdict comes from `distance` and the sign of `detected - reference`.
/// When `note` is the halving note the reported frequency is `detected / 2`
/// in every branch.
pub fn classify(
    detected: f64,
    note: &ReferenceNote,
    distance: f64,
    tolerance: f64,
    halving_note: Option<&str>,
) -> Classification {
    let verdict = if distance <= tolerance {
        Verdict::Tuned
    } else if detected > note.frequency {
        Verdict::High
    } else {
        Verdict::Low
    };

    let reported_frequency = if halving_note == Some(note.name.as_str()) {
        detected / 2.0
    } else {
        detected
    };

    Classification {
        verdict,
        reported_frequency,
        cents_deviation: calculate_cents_deviation(reported_frequency, note.frequency),
    }
}

/// Calculates the deviation from a target frequency in cents.
///
/// Positive values are sharp, negative values flat; 100 cents make a
/// semitone.
pub fn calculate_cents_deviation(freq: f64, target_freq: f64) -> f64 {
    1200.0 * (freq / target_freq).log2()
}

/// Formats the label shown next to a string, e.g. `A2: Tuned (110.00 Hz)`.
pub fn format_label(name: &str, verdict: Verdict, frequency: Option<f64>) -> String {
    match (verdict, frequency) {
        (Verdict::Unknown, _) | (_, None) => format!("{}: {}", name, verdict.as_str()),
        (verdict, Some(freq)) => format!("{}: {} ({:.2} Hz)", name, verdict.as_str(), freq),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_table_keeps_insertion_order() {
        let table = ReferenceTable::standard();
        let names: Vec<&str> = table
            .iter()
            .map(|n| n.name.as_str())
            .collect();
        assert_eq!(names, ["E2", "A2", "D3", "G3", "B3", "E4"]);
    }

    #[test]
    fn every_reference_matches_itself() {
        let table = ReferenceTable::standard();
        for note in table.iter() {
            let (matched, distance) = table.find_closest_string(note.frequency).unwrap();
            assert_eq!(matched.name, note.name);
            assert_eq!(distance, 0.0);
        }
    }

    #[test]
    fn exact_tie_goes_to_first_note() {
        let table = ReferenceTable::new(vec![
            ReferenceNote { name: "X".into(), frequency: 100.0 },
            ReferenceNote { name: "Y".into(), frequency: 200.0 },
        ])
        .unwrap();
        let (matched, distance) = table.find_closest_string(150.0).unwrap();
        assert_eq!(matched.name, "X");
        assert_eq!(distance, 50.0);
    }

    #[test]
    fn rejects_duplicate_and_non_positive_entries() {
        let dup_freq = ReferenceTable::new(vec![
            ReferenceNote { name: "A".into(), frequency: 110.0 },
            ReferenceNote { name: "B".into(), frequency: 110.0 },
        ]);
        assert!(matches!(dup_freq, Err(TunerError::InvalidReferenceTable(_))));

        let dup_name = ReferenceTable::new(vec![
            ReferenceNote { name: "A".into(), frequency: 110.0 },
            ReferenceNote { name: "A".into(), frequency: 220.0 },
        ]);
        assert!(dup_name.is_err());

        let zero = ReferenceTable::new(vec![ReferenceNote { name: "A".into(), frequency: 0.0 }]);
        assert!(zero.is_err());
        assert!(ReferenceTable::new(Vec::new()).is_err());
    }

    #[test]
    fn tolerance_boundary_is_inclusive() {
        let table = ReferenceTable::standard();
        let a2 = table.get("A2").unwrap();

        let at_edge = classify(111.0, a2, 1.0, 1.0, Some(HALVING_NOTE));
        assert_eq!(at_edge.verdict, Verdict::Tuned);

        let sharp = classify(111.001, a2, 1.001, 1.0, Some(HALVING_NOTE));
        assert_eq!(sharp.verdict, Verdict::High);

        let flat = classify(108.999, a2, 1.001, 1.0, Some(HALVING_NOTE));
        assert_eq!(flat.verdict, Verdict::Low);
        assert_eq!(flat.reported_frequency, 108.999);
    }

    #[test]
    fn low_e_second_harmonic_is_halved() {
        let table = ReferenceTable::standard();
        let e2 = table.get("E2").unwrap();
        let detected = 2.0 * 164.82;
        let distance = (detected - e2.frequency).abs();

        // Only the reported frequency is halved. The verdict still comes from
        // the unhalved matcher distance, so a reading at twice the reference
        // is High while the label shows 164.82 Hz.
        let result = classify(detected, e2, distance, 1.0, Some(HALVING_NOTE));
        assert_eq!(result.verdict, Verdict::High);
        assert!((result.reported_frequency - 164.82).abs() < 1e-9);
        assert!(result.cents_deviation.abs() < 1e-6);
    }

    #[test]
    fn matched_low_e_is_tuned_and_reported_an_octave_down() {
        let table = ReferenceTable::standard();
        let detected = 164.9;
        let (e2, distance) = table.find_closest_string(detected).unwrap();
        assert_eq!(e2.name, "E2");

        let result = classify(detected, e2, distance, 1.0, Some(HALVING_NOTE));
        assert_eq!(result.verdict, Verdict::Tuned);
        assert!((result.reported_frequency - 82.45).abs() < 1e-9);
    }

    #[test]
    fn halving_applies_in_every_branch_but_only_once() {
        let table = ReferenceTable::standard();
        let e2 = table.get("E2").unwrap();

        let high = classify(170.0, e2, 5.18, 1.0, Some(HALVING_NOTE));
        assert_eq!(high.verdict, Verdict::High);
        assert_eq!(high.reported_frequency, 85.0);

        let low = classify(160.0, e2, 4.82, 1.0, Some(HALVING_NOTE));
        assert_eq!(low.verdict, Verdict::Low);
        assert_eq!(low.reported_frequency, 80.0);

        let untouched = classify(160.0, e2, 4.82, 1.0, None);
        assert_eq!(untouched.reported_frequency, 160.0);
    }

    #[test]
    fn cents_deviation_of_an_octave() {
        assert!((calculate_cents_deviation(220.0, 110.0) - 1200.0).abs() < 1e-9);
        assert!(calculate_cents_deviation(109.0, 110.0) < 0.0);
    }

    #[test]
    fn labels() {
        assert_eq!(format_label("E2", Verdict::Unknown, None), "E2: Unknown");
        assert_eq!(
            format_label("A2", Verdict::Tuned, Some(110.0)),
            "A2: Tuned (110.00 Hz)"
        );
        assert_eq!(
            format_label("G3", Verdict::Low, Some(195.456)),
            "G3: Low (195.46 Hz)"
        );
    }

    #[test]
    fn table_deserializes_with_validation() {
        let ok: ReferenceTable =
            serde_json::from_str(r#"[{"name":"A2","frequency":110.0}]"#).unwrap();
        assert_eq!(ok.len(), 1);

        let bad = serde_json::from_str::<ReferenceTable>(r#"[{"name":"A2","frequency":-1.0}]"#);
        assert!(bad.is_err());
    }
}
