//! In-process host document with a driveable loading life-cycle.
//!
//! [`SimulatedDocument`] stands in for a real host environment: embedders and
//! tests step its readiness state forward, and registered handlers see the
//! same delivery order a live document would produce.

use std::any::Any;
use std::mem;
use std::panic::{AssertUnwindSafe, catch_unwind, resume_unwind};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anyhow::{Result, anyhow};
use log::{info, trace, warn};
use tokio::sync::broadcast;
use tracing::info_span;

use crate::config::{DocumentConfig, MAX_EVENT_CAPACITY};
use crate::{
    ChangeHandler, ContentLoadedRegistrar, HostDocument, LifecycleEvent, OnceHandler, ReadyState,
    Registrar, RegistrarKind, StateChangeRegistrar, StateTransition,
};

/// Shared interior of a [`SimulatedDocument`]; what clones of a handle point at.
pub(crate) type SharedDocumentState = Arc<Mutex<DocumentState>>;

/// Mutable life-cycle state behind a document handle.
pub(crate) struct DocumentState {
    ready_state: ReadyState,
    content_loaded_fired: bool,
    once_handlers: Vec<OnceHandler>,
    change_handlers: Vec<ChangeHandler>,
}

/// Cloneable handle onto one simulated document.
///
/// Clones share readiness state, handler registries, and the transition feed.
/// The advertised registration capability is fixed at construction.
#[derive(Clone)]
pub struct SimulatedDocument {
    inner: SharedDocumentState,
    capability: RegistrarKind,
    transition_feed: broadcast::Sender<StateTransition>,
}

impl SimulatedDocument {
    /// Creates a document at the configured initial state, advertising the
    /// configured registration capability.
    ///
    /// A document constructed directly at [`ReadyState::Complete`] treats its
    /// content-loaded event as already delivered, so late one-shot
    /// registrations are dropped just as they are after a driven load.
    #[must_use]
    pub fn new(config: &DocumentConfig) -> Self {
        let (transition_feed, _receiver) =
            broadcast::channel(config.event_capacity.clamp(1, MAX_EVENT_CAPACITY));
        let state = DocumentState {
            ready_state: config.initial_state,
            content_loaded_fired: config.initial_state == ReadyState::Complete,
            once_handlers: Vec::new(),
            change_handlers: Vec::new(),
        };
        Self {
            inner: Arc::new(Mutex::new(state)),
            capability: config.capability,
            transition_feed,
        }
    }

    /// Steps the life-cycle one stage forward and returns the state the
    /// document ended up in. Advancing a complete document is a no-op.
    ///
    /// Each transition is pushed onto the transition feed first, then every
    /// state-change handler runs once, and on the transition into
    /// [`ReadyState::Complete`] the queued one-shot content-loaded handlers
    /// fire. Handlers run outside the registry lock and may re-enter the
    /// document; a state-change handler registered by a running handler sees
    /// subsequent transitions only.
    ///
    /// Handlers are isolated from each other the way a live host isolates
    /// event listeners: a panicking handler never stops its siblings from
    /// running, and every state-change handler stays registered for later
    /// transitions.
    ///
    /// # Errors
    ///
    /// Returns an error when the registry lock is poisoned.
    ///
    /// # Panics
    ///
    /// Re-raises the first handler panic of the round after the remaining
    /// handlers have run and the registry has been restored.
    pub fn advance(&self) -> Result<ReadyState> {
        let _span = info_span!("document.advance").entered();
        let (transition, mut change_handlers, once_handlers) = {
            let mut state = self.lock()?;
            let Some(next) = state.ready_state.next_stage() else {
                trace!("SimulatedDocument: advance ignored, already complete");
                return Ok(ReadyState::Complete);
            };
            let transition = StateTransition {
                from: state.ready_state,
                to: next,
            };
            state.ready_state = next;
            info!(
                "SimulatedDocument: readiness {} -> {}",
                transition.from, transition.to
            );
            drop(self.transition_feed.send(transition));
            let change_handlers = mem::take(&mut state.change_handlers);
            let once_handlers = if next == ReadyState::Complete && !state.content_loaded_fired {
                state.content_loaded_fired = true;
                info!(
                    "SimulatedDocument: dispatching {}",
                    LifecycleEvent::ContentLoaded.name()
                );
                mem::take(&mut state.once_handlers)
            } else {
                Vec::new()
            };
            (transition, change_handlers, once_handlers)
        };

        let mut first_panic: Option<Box<dyn Any + Send>> = None;
        for handler in &mut change_handlers {
            if let Err(payload) = catch_unwind(AssertUnwindSafe(handler)) {
                warn!(
                    "SimulatedDocument: state-change handler panicked at {}",
                    transition.to
                );
                first_panic.get_or_insert(payload);
            }
        }
        for handler in once_handlers {
            if let Err(payload) = catch_unwind(AssertUnwindSafe(handler)) {
                warn!(
                    "SimulatedDocument: {} handler panicked",
                    LifecycleEvent::ContentLoaded.name()
                );
                first_panic.get_or_insert(payload);
            }
        }

        let mut state = self.lock_recovered();
        let registered_during_dispatch = mem::take(&mut state.change_handlers);
        state.change_handlers = change_handlers;
        state.change_handlers.extend(registered_during_dispatch);
        // Unwinding with the registry guard held would poison the lock.
        drop(state);
        if let Some(payload) = first_panic {
            resume_unwind(payload);
        }
        Ok(transition.to)
    }

    /// Drives the life-cycle until the document reports
    /// [`ReadyState::Complete`].
    ///
    /// # Errors
    ///
    /// Returns an error when the registry lock is poisoned.
    pub fn finish(&self) -> Result<ReadyState> {
        let mut state = self.advance()?;
        while state != ReadyState::Complete {
            state = self.advance()?;
        }
        Ok(state)
    }

    /// Whether the one-shot content-loaded event has already been delivered.
    #[must_use]
    pub fn content_loaded_fired(&self) -> bool {
        self.lock_recovered().content_loaded_fired
    }

    /// Subscribes a passive observer to the transition feed.
    #[must_use]
    pub fn transitions(&self) -> broadcast::Receiver<StateTransition> {
        self.transition_feed.subscribe()
    }

    fn lock(&self) -> Result<MutexGuard<'_, DocumentState>> {
        self.inner.lock().map_err(|_| anyhow!("DocumentState poisoned"))
    }

    /// Poisoning only marks a panic mid-dispatch; the state itself stays
    /// consistent, so reads and registrations keep working.
    fn lock_recovered(&self) -> MutexGuard<'_, DocumentState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ContentLoadedRegistrar for SimulatedDocument {
    fn subscribe_once(&self, event: LifecycleEvent, handler: OnceHandler) {
        let mut state = self.lock_recovered();
        if state.content_loaded_fired {
            warn!(
                "SimulatedDocument: {} already fired, dropping one-shot handler",
                event.name()
            );
            return;
        }
        state.once_handlers.push(handler);
        trace!(
            "SimulatedDocument: one-shot handler queued for {}",
            event.name()
        );
    }
}

impl StateChangeRegistrar for SimulatedDocument {
    fn subscribe_state_change(&self, handler: ChangeHandler) {
        let mut state = self.lock_recovered();
        state.change_handlers.push(handler);
        trace!(
            "SimulatedDocument: state-change handler attached at {}",
            state.ready_state
        );
    }
}

impl HostDocument for SimulatedDocument {
    fn ready_state(&self) -> ReadyState {
        self.lock_recovered().ready_state
    }

    fn registrar(&self) -> Registrar<'_> {
        match self.capability {
            RegistrarKind::ContentLoaded => Registrar::ContentLoaded(self),
            RegistrarKind::StateChange => Registrar::StateChange(self),
        }
    }
}
