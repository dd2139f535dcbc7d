// tuner-core/src/lib.rs

//! The core logic for the guitar tuner.
//! This crate is responsible for audio capture, the filter / window / FFT
//! signal chain, nearest-string matching and the tuning loop. It is
//! completely headless and contains no GUI code.

pub mod audio;
pub mod config;
pub mod error;
pub mod fft;
pub mod filter;
pub mod pipeline;
pub mod scheduler;
pub mod state;
pub mod tuning;
pub mod window;

pub use config::TunerConfig;
pub use error::{Result, TunerError};
pub use pipeline::{CycleOutcome, Detection, Pipeline};
pub use scheduler::TunerHandle;
pub use state::{RunningFlag, VerdictBoard, VerdictUpdate};
pub use tuning::{ReferenceTable, Verdict};
