//! Process-wide interruption flag
//!
//! Worker loops and the commit prompt poll this flag between items; an
//! in-flight import is never aborted mid-file. Registering the actual OS
//! signal handlers is the binary's job, the library only consults the
//! flag.

use std::sync::atomic::{AtomicBool, Ordering};

pub struct InterruptFlag(AtomicBool);

impl InterruptFlag {
    pub const fn new() -> Self {
        Self(AtomicBool::new(false))
    }

    pub fn interrupt(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_interrupted(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

impl Default for InterruptFlag {
    fn default() -> Self {
        Self::new()
    }
}

/// The flag OS signal handlers flip.
pub static INTERRUPT: InterruptFlag = InterruptFlag::new();
