// src/console.rs

//! User-facing console output.
//!
//! This is separate from `tracing`: console lines are the progress report a
//! human operator reads on stdout, while `tracing` goes to stderr and carries
//! structured diagnostics. Every console line is also mirrored as a `debug`
//! event so that a captured log contains the full story.

use std::sync::{Arc, Mutex};

use tracing::debug;

#[derive(Debug, Clone)]
enum Sink {
    Stdout,
    Memory(Arc<Mutex<Vec<String>>>),
}

/// Leveled console sink shared by the scheduler, the execution context and
/// task bodies.
#[derive(Debug, Clone)]
pub struct Console {
    verbose: bool,
    sink: Sink,
}

impl Console {
    pub fn new(verbose: bool) -> Self {
        Self {
            verbose,
            sink: Sink::Stdout,
        }
    }

    /// Console that keeps every emitted line in memory instead of printing it.
    ///
    /// Returns the console together with the shared buffer it appends to.
    pub fn capturing(verbose: bool) -> (Self, Arc<Mutex<Vec<String>>>) {
        let lines = Arc::new(Mutex::new(Vec::new()));
        let console = Self {
            verbose,
            sink: Sink::Memory(Arc::clone(&lines)),
        };
        (console, lines)
    }

    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    /// Emit a message only in verbose mode.
    pub fn info(&self, message: impl AsRef<str>) {
        if self.verbose {
            self.emit(format!("[INFO] {}", message.as_ref()));
        }
    }

    /// Emit a message unconditionally.
    pub fn always(&self, message: impl AsRef<str>) {
        self.emit(message.as_ref().to_string());
    }

    fn emit(&self, line: String) {
        debug!(target: "provdag::console", "{}", line);
        match &self.sink {
            Sink::Stdout => println!("{line}"),
            Sink::Memory(lines) => {
                // A poisoned buffer only means another writer panicked; keep
                // appending so the remaining output is not lost.
                let mut guard = lines.lock().unwrap_or_else(|p| p.into_inner());
                guard.push(line);
            }
        }
    }
}

/// Quiet stdout console: only unconditional lines are printed.
impl Default for Console {
    fn default() -> Self {
        Self::new(false)
    }
}
