//! Deferred-invocation dispatch over a host document's readiness signal.

use log::trace;

use crate::{HostDocument, LifecycleEvent, ReadyState, Registrar};

/// Wraps `callback` so the returned invocable runs it once `document` has
/// finished loading.
///
/// Invoking the result queries the document's readiness state once. At
/// [`ReadyState::Complete`] the callback runs inline, on the caller's stack,
/// and any panic it raises surfaces at the invocation site. Otherwise the
/// callback is handed to whichever registration mechanism the document
/// exposes: a one-shot content-loaded subscription where available, or the
/// legacy state-change feed. The legacy feed notifies on every readiness
/// transition and the callback is attached to it unfiltered, so callbacks
/// deferred through that path may run more than once.
///
/// Wrapping alone does nothing; each call produces an independent invocable.
#[must_use = "wrapping has no effect until the returned invocable is called"]
pub fn ready<Doc, Callback>(document: Doc, mut callback: Callback) -> impl FnOnce()
where
    Doc: HostDocument,
    Callback: FnMut() + Send + 'static,
{
    move || {
        let state = document.ready_state();
        if state == ReadyState::Complete {
            trace!("ready: document already complete, running callback inline");
            callback();
            return;
        }
        match document.registrar() {
            Registrar::ContentLoaded(host) => {
                trace!(
                    "ready: deferring via one-shot {} at {state}",
                    LifecycleEvent::ContentLoaded.name()
                );
                host.subscribe_once(LifecycleEvent::ContentLoaded, Box::new(callback));
            }
            Registrar::StateChange(host) => {
                trace!("ready: deferring via state-change feed at {state}");
                host.subscribe_state_change(Box::new(callback));
            }
        }
    }
}
