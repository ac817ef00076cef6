//! Session-wide shared state and the status channel.
//!
//! Everything here is injected into workers by reference rather than held
//! in process globals, so several engine instances can coexist in one
//! process (test isolation depends on this).

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// Validated endpoints across all targets before every worker stops.
pub const MAX_VALIDATED_ENDPOINTS: usize = 3;

/// Validated-endpoint count at which the one-shot document refresh fires.
pub const UPDATE_TRIGGER_SIZE: usize = 1;

/// Message kinds surfaced through the status callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum StatusKind {
    /// A validated endpoint descriptor: `priority;addr;url;hiddenHost`.
    ProxyInfo = 0x0001,
    /// A short user-facing hint.
    ShowToast = 0x0002,
    /// The startup page became available.
    StartPage = 0x0003,
    /// Generic command channel (allow-list updates, analytics events).
    Command = 0x0004,
}

/// Consumer of engine status events: `(kind, numeric payload, text payload)`.
pub type StatusSink = Arc<dyn Fn(StatusKind, usize, &str) + Send + Sync>;

/// Shared state for one scan session.
///
/// The validated count only increases. Registration and the refresh gate
/// use two distinct locks so target registration is never serialized
/// behind a slow network fetch.
pub struct ScanState {
    validated: AtomicUsize,
    roster: Mutex<Vec<String>>,
    refresh_gate: tokio::sync::Mutex<()>,
    slow_hint_shown: AtomicBool,
    max_validated: usize,
    update_trigger: usize,
}

impl ScanState {
    pub fn new() -> Self {
        Self::with_limits(MAX_VALIDATED_ENDPOINTS, UPDATE_TRIGGER_SIZE)
    }

    pub fn with_limits(max_validated: usize, update_trigger: usize) -> Self {
        Self {
            validated: AtomicUsize::new(0),
            roster: Mutex::new(Vec::new()),
            refresh_gate: tokio::sync::Mutex::new(()),
            slow_hint_shown: AtomicBool::new(false),
            max_validated,
            update_trigger,
        }
    }

    /// Current count of validated endpoints across all targets.
    pub fn validated(&self) -> usize {
        self.validated.load(Ordering::Relaxed)
    }

    /// True once the session has validated enough endpoints; workers poll
    /// this once per candidate and wind down cooperatively.
    pub fn should_stop(&self) -> bool {
        self.validated() >= self.max_validated
    }

    /// Records one validated endpoint for `hidden_host` and returns whether
    /// the session-wide stop condition now holds.
    pub fn register(&self, hidden_host: &str) -> bool {
        let mut roster = self.roster.lock().unwrap_or_else(|e| e.into_inner());
        if !roster.iter().any(|h| h == hidden_host) {
            roster.push(hidden_host.to_string());
        }
        self.validated.fetch_add(1, Ordering::Relaxed);
        self.should_stop()
    }

    /// Distinct targets that produced at least one endpoint.
    pub fn registered_targets(&self) -> usize {
        self.roster.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Lock serializing the one-shot document refresh, separate from the
    /// registration lock.
    pub fn refresh_gate(&self) -> &tokio::sync::Mutex<()> {
        &self.refresh_gate
    }

    pub fn update_trigger(&self) -> usize {
        self.update_trigger
    }

    /// Latch for the one-time slow-result hint; true exactly once.
    pub fn first_slow_hint(&self) -> bool {
        !self.slow_hint_shown.swap(true, Ordering::Relaxed)
    }
}

impl Default for ScanState {
    fn default() -> Self {
        Self::new()
    }
}
