//! # UI Module
//!
//! UI components for the Guitar Tuner window.

pub mod main_display;
