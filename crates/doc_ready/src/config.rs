//! Configuration settings for simulated host documents.
//!
//! Configuration can be loaded from environment variables or constructed
//! programmatically through the public fields.

use std::env;

use crate::{ReadyState, RegistrarKind};

/// Default capacity of the transition broadcast feed.
const DEFAULT_EVENT_CAPACITY: usize = 128;

/// Largest accepted feed capacity. The broadcast channel preallocates its
/// buffer and rejects capacities above `usize::MAX / 2` outright.
pub(crate) const MAX_EVENT_CAPACITY: usize = 4096;

/// Construction settings for a simulated host document.
#[derive(Copy, Clone, Debug)]
pub struct DocumentConfig {
    /// Readiness state the document starts in.
    pub initial_state: ReadyState,
    /// Registration mechanism the document advertises to dispatchers.
    pub capability: RegistrarKind,
    /// Capacity of the transition broadcast feed. Out-of-range values are
    /// clamped at document construction.
    pub event_capacity: usize,
}

impl DocumentConfig {
    /// Load configuration from environment variables.
    ///
    /// Reads the following environment variables:
    /// - `DOC_READY_INITIAL_STATE`: `loading`, `interactive` or `complete`
    ///   (default: `loading`)
    /// - `DOC_READY_CAPABILITY`: `content-loaded` or `state-change`
    ///   (default: `content-loaded`)
    /// - `DOC_READY_EVENT_CAPACITY`: transition feed capacity (default: 128)
    ///
    /// Unparseable values fall back to the defaults; out-of-range capacities
    /// are clamped.
    #[inline]
    #[must_use]
    pub fn from_env() -> Self {
        let initial_state = env::var("DOC_READY_INITIAL_STATE")
            .ok()
            .and_then(|val| val.parse::<ReadyState>().ok())
            .unwrap_or(ReadyState::Loading);
        let capability = env::var("DOC_READY_CAPABILITY")
            .ok()
            .and_then(|val| val.parse::<RegistrarKind>().ok())
            .unwrap_or(RegistrarKind::ContentLoaded);
        let event_capacity = env::var("DOC_READY_EVENT_CAPACITY")
            .ok()
            .and_then(|val| val.parse::<usize>().ok())
            .unwrap_or(DEFAULT_EVENT_CAPACITY)
            .clamp(1, MAX_EVENT_CAPACITY);
        Self {
            initial_state,
            capability,
            event_capacity,
        }
    }
}

impl Default for DocumentConfig {
    fn default() -> Self {
        Self {
            initial_state: ReadyState::Loading,
            capability: RegistrarKind::ContentLoaded,
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}
