//! Tubeshift - fetch online videos and convert them for playback
//!
//! This library crate exposes the binary's wiring for integration testing.

pub mod config;
pub mod serve;
pub mod services;
pub mod sinks;
