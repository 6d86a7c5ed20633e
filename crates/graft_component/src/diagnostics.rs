//! Rate-limited diagnostics.

use dashmap::DashSet;
use tracing::warn;

/// Emits a warning at most once per subject.
///
/// Shared between threads; used to report unknown component ids found in
/// tags or sync payloads without flooding the log.
#[derive(Debug, Default)]
pub struct WarnOnce {
    seen: DashSet<String>,
}

impl WarnOnce {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Logs `reason` for `subject` unless it was already reported.
    ///
    /// Returns `true` if a warning was emitted.
    pub fn warn(&self, subject: &str, reason: &str) -> bool {
        if self.seen.contains(subject) || !self.seen.insert(subject.to_owned()) {
            return false;
        }
        warn!(subject, reason, "skipping component data");
        true
    }

    /// Returns `true` if `subject` has already been reported.
    #[must_use]
    pub fn has_warned(&self, subject: &str) -> bool {
        self.seen.contains(subject)
    }

    /// Number of distinct subjects reported so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}
