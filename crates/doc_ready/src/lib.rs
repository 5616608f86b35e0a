//! Host-readiness dispatch for document-embedding environments.
//! This crate centralizes the readiness types and registration traits shared
//! between the dispatcher and host implementations, plus a driveable
//! in-process document for tests and embedders.

use std::fmt;
use std::str::FromStr;

use anyhow::{Error, anyhow};

/// Environment-driven construction settings for simulated documents.
pub mod config;
pub use config::DocumentConfig;

/// Deferred-invocation dispatch over the readiness signal.
pub mod dispatch;
pub use dispatch::ready;

/// In-process host document with a driveable loading life-cycle.
pub mod document;
pub use document::SimulatedDocument;

// ============================
// Readiness states and life-cycle events
// ============================

/// Loading stage of a host document, ordered by progress.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub enum ReadyState {
    /// The document is still being parsed.
    Loading,
    /// Parsing has finished; subresources may still be loading.
    Interactive,
    /// The document and all its subresources have finished loading.
    Complete,
}

impl ReadyState {
    /// Canonical lower-case name, as hosts report it.
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Loading => "loading",
            Self::Interactive => "interactive",
            Self::Complete => "complete",
        }
    }

    /// The stage that follows this one, or `None` once loading has completed.
    #[inline]
    #[must_use]
    pub const fn next_stage(self) -> Option<Self> {
        match self {
            Self::Loading => Some(Self::Interactive),
            Self::Interactive => Some(Self::Complete),
            Self::Complete => None,
        }
    }
}

impl fmt::Display for ReadyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReadyState {
    type Err = Error;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        match text {
            "loading" => Ok(Self::Loading),
            "interactive" => Ok(Self::Interactive),
            "complete" => Ok(Self::Complete),
            other => Err(anyhow!("unknown ready state: {other}")),
        }
    }
}

/// Life-cycle events a host can deliver through its one-shot subscription
/// mechanism.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum LifecycleEvent {
    /// The document's content has finished loading.
    ContentLoaded,
}

impl LifecycleEvent {
    /// Canonical host-side event name, used in logs and host bindings.
    #[inline]
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::ContentLoaded => "DOMContentLoaded",
        }
    }
}

/// One readiness transition, as observed on a document's transition feed.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct StateTransition {
    /// Stage the document left.
    pub from: ReadyState,
    /// Stage the document entered.
    pub to: ReadyState,
}

// ============================
// Registration capabilities
// ============================

/// Handler for a one-shot life-cycle event subscription.
pub type OnceHandler = Box<dyn FnOnce() + Send + 'static>;

/// Handler for the legacy state-change feed; called once per transition.
pub type ChangeHandler = Box<dyn FnMut() + Send + 'static>;

/// Which registration mechanism a host advertises.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum RegistrarKind {
    /// One-shot subscription to a named life-cycle event.
    ContentLoaded,
    /// Legacy notification on every readiness transition.
    StateChange,
}

impl RegistrarKind {
    /// Stable name used by configuration and logs.
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ContentLoaded => "content-loaded",
            Self::StateChange => "state-change",
        }
    }
}

impl fmt::Display for RegistrarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RegistrarKind {
    type Err = Error;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        match text {
            "content-loaded" => Ok(Self::ContentLoaded),
            "state-change" => Ok(Self::StateChange),
            other => Err(anyhow!("unknown registrar kind: {other}")),
        }
    }
}

/// Registers a handler for exactly one delivery of a named life-cycle event.
pub trait ContentLoadedRegistrar {
    /// Queue `handler` to run when `event` fires. Hosts deliver the event at
    /// most once per document life-cycle; handlers queued after it has fired
    /// are dropped.
    fn subscribe_once(&self, event: LifecycleEvent, handler: OnceHandler);
}

/// Registers a handler on the legacy per-transition notification feed.
pub trait StateChangeRegistrar {
    /// Attach `handler` so it runs on every subsequent readiness transition.
    /// There is no completion filter; handlers see intermediate stages too.
    fn subscribe_state_change(&self, handler: ChangeHandler);
}

/// The registration mechanism a host exposes, exactly one of the two.
#[derive(Copy, Clone)]
pub enum Registrar<'doc> {
    /// Host supports one-shot event subscription.
    ContentLoaded(&'doc dyn ContentLoadedRegistrar),
    /// Host only supports the legacy state-change feed.
    StateChange(&'doc dyn StateChangeRegistrar),
}

/// Read access onto the host environment a dispatcher runs against.
/// Kept small so hosts can be swapped (real bindings, simulated documents).
pub trait HostDocument {
    /// Current readiness state of the document.
    fn ready_state(&self) -> ReadyState;

    /// The registration mechanism this host exposes.
    fn registrar(&self) -> Registrar<'_>;
}
