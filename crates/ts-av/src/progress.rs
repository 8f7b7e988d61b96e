//! Parsing of ffmpeg's machine-readable `-progress` output.
//!
//! With `-progress pipe:2 -nostats` ffmpeg writes `key=value` blocks to
//! stderr, each terminated by a `progress=continue` or `progress=end` line.
//! Any other stderr line is a regular diagnostic.

use std::time::{Duration, Instant};

/// One classified stderr line.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressLine {
    /// Output position reached so far.
    Position(Duration),
    /// End of one report block; `true` once ffmpeg has finished.
    Block { finished: bool },
    /// Another `key=value` field of the report we do not use.
    Field,
    /// Not part of a progress report.
    Diagnostic,
}

/// Classify a single stderr line.
pub fn parse_line(line: &str) -> ProgressLine {
    let line = line.trim();
    let Some((key, value)) = line.split_once('=') else {
        return ProgressLine::Diagnostic;
    };
    // Diagnostics never look like a bare identifier followed by '='.
    if key.is_empty() || !key.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_') {
        return ProgressLine::Diagnostic;
    }
    match key {
        // Both fields are microseconds despite the name of the second.
        "out_time_us" | "out_time_ms" => value
            .parse::<i64>()
            .ok()
            .map(|us| ProgressLine::Position(Duration::from_micros(us.max(0) as u64)))
            .unwrap_or(ProgressLine::Field),
        "progress" => ProgressLine::Block {
            finished: value == "end",
        },
        _ => ProgressLine::Field,
    }
}

/// Turns progress lines into whole percentages of `duration`.
#[derive(Debug)]
pub struct ProgressTracker {
    duration: Option<Duration>,
    interval: Duration,
    position: Duration,
    last_emit: Option<Instant>,
}

impl ProgressTracker {
    /// `duration` is the source length; without it only completion can be
    /// reported. Intermediate updates are emitted at most once per
    /// `interval`.
    pub fn new(duration: Option<Duration>, interval: Duration) -> Self {
        Self {
            duration: duration.filter(|d| !d.is_zero()),
            interval,
            position: Duration::ZERO,
            last_emit: None,
        }
    }

    /// Feed one line; returns a percentage when one should be reported.
    pub fn observe(&mut self, line: &ProgressLine) -> Option<u8> {
        match line {
            ProgressLine::Position(pos) => {
                self.position = *pos;
                None
            }
            ProgressLine::Block { finished: true } => Some(100),
            ProgressLine::Block { finished: false } => {
                let duration = self.duration?;
                if self
                    .last_emit
                    .is_some_and(|at| at.elapsed() < self.interval)
                {
                    return None;
                }
                self.last_emit = Some(Instant::now());
                Some(percent_of(self.position, duration))
            }
            ProgressLine::Field | ProgressLine::Diagnostic => None,
        }
    }
}

/// `position / duration` as a whole percentage. Reaching 100 is reserved
/// for the end-of-run report.
fn percent_of(position: Duration, duration: Duration) -> u8 {
    let ratio = position.as_secs_f64() / duration.as_secs_f64();
    (ratio * 100.0).floor().clamp(0.0, 99.0) as u8
}
