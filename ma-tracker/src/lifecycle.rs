//! Page teardown signals
//!
//! Browsers may report page exit through several overlapping callbacks
//! (`beforeunload`, `pagehide`, `visibilitychange`). They are folded into one
//! teardown event: whichever arrives first closes the session, later ones
//! only flush.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeardownSignal {
    BeforeUnload,
    PageHide,
    VisibilityHidden,
}

impl fmt::Display for TeardownSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TeardownSignal::BeforeUnload => "beforeunload",
            TeardownSignal::PageHide => "pagehide",
            TeardownSignal::VisibilityHidden => "visibility-hidden",
        };
        f.write_str(name)
    }
}

/// At-most-once latch for the `session_end` event
#[derive(Debug, Default)]
pub struct SessionCloser {
    closed: AtomicBool,
}

impl SessionCloser {
    pub fn new() -> Self {
        Self::default()
    }

    /// True for exactly one caller per page lifecycle
    pub fn claim(&self) -> bool {
        !self.closed.swap(true, Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}
