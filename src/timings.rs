// src/timings.rs

//! Duration bookkeeping for tasks and layers.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// One recorded duration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimingEntry {
    pub label: String,
    pub duration: Duration,
}

/// Collects one duration per label.
///
/// Cloning yields another handle onto the same storage, so concurrently
/// running tasks can all record into a single collector.
#[derive(Debug, Clone, Default)]
pub struct TimingsCollector {
    timings: Arc<Mutex<HashMap<String, Duration>>>,
}

impl TimingsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `duration` under `label`, replacing any earlier entry.
    pub fn record(&self, label: impl Into<String>, duration: Duration) {
        let mut guard = self.timings.lock().unwrap_or_else(|p| p.into_inner());
        guard.insert(label.into(), duration);
    }

    pub fn get(&self, label: &str) -> Option<Duration> {
        let guard = self.timings.lock().unwrap_or_else(|p| p.into_inner());
        guard.get(label).copied()
    }

    pub fn is_empty(&self) -> bool {
        let guard = self.timings.lock().unwrap_or_else(|p| p.into_inner());
        guard.is_empty()
    }

    /// All entries, longest first. Equal durations are ordered by label.
    pub fn entries(&self) -> Vec<TimingEntry> {
        let guard = self.timings.lock().unwrap_or_else(|p| p.into_inner());
        let mut entries: Vec<TimingEntry> = guard
            .iter()
            .map(|(label, duration)| TimingEntry {
                label: label.clone(),
                duration: *duration,
            })
            .collect();
        entries.sort_by(|a, b| {
            b.duration
                .cmp(&a.duration)
                .then_with(|| a.label.cmp(&b.label))
        });
        entries
    }

    /// `"label: 1.23s"` lines, longest first.
    pub fn summary(&self) -> Vec<String> {
        self.entries()
            .into_iter()
            .map(|e| format!("{}: {:.2}s", e.label, e.duration.as_secs_f64()))
            .collect()
    }

    /// Summary with a heading, indented for console output. Empty when
    /// nothing was recorded.
    pub fn render(&self) -> Vec<String> {
        let summary = self.summary();
        if summary.is_empty() {
            return summary;
        }
        let mut lines = Vec::with_capacity(summary.len() + 1);
        lines.push("Task Timings:".to_string());
        lines.extend(summary.into_iter().map(|l| format!("  {l}")));
        lines
    }
}
