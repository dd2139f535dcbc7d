//! # Tuner State Module
//!
//! The two pieces of state that outlive a single analysis cycle: the
//! running flag toggled by the display's Start/Stop control, and the board
//! holding the last verdict of every string.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::tuning::{ReferenceTable, Verdict, format_label};

/// Shared start/stop flag.
///
/// Cloning yields another handle to the same flag.
#[derive(Debug, Clone, Default)]
pub struct RunningFlag(Arc<AtomicBool>);

impl RunningFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_running(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn set(&self, running: bool) {
        self.0.store(running, Ordering::SeqCst);
    }
}

/// One verdict change, sent from the tuning loop to the display.
#[derive(Debug, Clone, PartialEq)]
pub struct VerdictUpdate {
    pub note: String,
    pub verdict: Verdict,
    /// Reported frequency in Hz (after the second harmonic compensation).
    pub frequency: Option<f64>,
    pub cents_deviation: Option<f64>,
    pub label: String,
}

/// What the display shows for one string.
#[derive(Debug, Clone, PartialEq)]
pub struct NoteStatus {
    pub note: String,
    pub verdict: Verdict,
    pub frequency: Option<f64>,
    pub cents_deviation: Option<f64>,
    pub label: String,
}

impl NoteStatus {
    fn unknown(note: &str) -> Self {
        Self {
            note: note.to_string(),
            verdict: Verdict::Unknown,
            frequency: None,
            cents_deviation: None,
            label: format_label(note, Verdict::Unknown, None),
        }
    }
}

/// Last known verdict per string, in reference table order.
///
/// Every string starts out `Unknown`. An entry only changes when a cycle
/// matches that string; there is no expiry.
#[derive(Debug, Clone, PartialEq)]
pub struct VerdictBoard {
    entries: Vec<NoteStatus>,
}

impl VerdictBoard {
    pub fn new(references: &ReferenceTable) -> Self {
        Self {
            entries: references
                .iter()
                .map(|note| NoteStatus::unknown(&note.name))
                .collect(),
        }
    }

    /// Applies an update. Returns `false` if the note is not on the board.
    pub fn apply(&mut self, update: &VerdictUpdate) -> bool {
        match self.entries.iter_mut().find(|e| e.note == update.note) {
            Some(entry) => {
                entry.verdict = update.verdict;
                entry.frequency = update.frequency;
                entry.cents_deviation = update.cents_deviation;
                entry.label = update.label.clone();
                true
            }
            None => false,
        }
    }

    pub fn get(&self, note: &str) -> Option<&NoteStatus> {
        self.entries.iter().find(|e| e.note == note)
    }

    pub fn iter(&self) -> impl Iterator<Item = &NoteStatus> {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn update(note: &str, verdict: Verdict, frequency: f64) -> VerdictUpdate {
        VerdictUpdate {
            note: note.to_string(),
            verdict,
            frequency: Some(frequency),
            cents_deviation: Some(0.0),
            label: format_label(note, verdict, Some(frequency)),
        }
    }

    #[test]
    fn flag_handles_share_state() {
        let flag = RunningFlag::new();
        let other = flag.clone();
        assert!(!flag.is_running());
        other.set(true);
        assert!(flag.is_running());
    }

    #[test]
    fn board_starts_unknown_in_table_order() {
        let board = VerdictBoard::new(&ReferenceTable::standard());
        let labels: Vec<&str> = board.iter().map(|e| e.label.as_str()).collect();
        assert_eq!(labels[0], "E2: Unknown");
        assert_eq!(labels.len(), 6);
        assert!(board.iter().all(|e| e.verdict == Verdict::Unknown));
    }

    #[test]
    fn only_the_matched_note_changes_and_holds() {
        let mut board = VerdictBoard::new(&ReferenceTable::standard());
        assert!(board.apply(&update("A2", Verdict::High, 113.0)));
        assert!(board.apply(&update("D3", Verdict::Tuned, 146.8)));

        let a2 = board.get("A2").unwrap();
        assert_eq!(a2.verdict, Verdict::High);
        assert_eq!(a2.label, "A2: High (113.00 Hz)");
        assert_eq!(board.get("E2").unwrap().verdict, Verdict::Unknown);

        assert!(board.apply(&update("A2", Verdict::Tuned, 110.0)));
        assert_eq!(board.get("A2").unwrap().verdict, Verdict::Tuned);
        assert_eq!(board.get("D3").unwrap().verdict, Verdict::Tuned);
    }

    #[test]
    fn unknown_note_is_ignored() {
        let mut board = VerdictBoard::new(&ReferenceTable::standard());
        let before = board.clone();
        assert!(!board.apply(&update("C4", Verdict::Tuned, 261.6)));
        assert_eq!(board, before);
    }
}
