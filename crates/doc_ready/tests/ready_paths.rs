//! End-to-end dispatch paths over a simulated host document.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use anyhow::Result;
use doc_ready::{DocumentConfig, ReadyState, RegistrarKind, SimulatedDocument, ready};

#[cfg(test)]
mod tests {
    use super::*;

    fn document_with(initial_state: ReadyState, capability: RegistrarKind) -> SimulatedDocument {
        let config = DocumentConfig {
            initial_state,
            capability,
            ..DocumentConfig::default()
        };
        SimulatedDocument::new(&config)
    }

    fn counting_callback(runs: &Arc<AtomicU32>) -> impl FnMut() + Send + 'static {
        let runs = Arc::clone(runs);
        move || {
            runs.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// A complete document runs the callback synchronously, before the
    /// invocable returns.
    #[test]
    fn complete_document_runs_callback_immediately() {
        let _ = env_logger::builder().is_test(true).try_init();
        let document = document_with(ReadyState::Complete, RegistrarKind::ContentLoaded);
        let runs = Arc::new(AtomicU32::new(0));

        ready(document, counting_callback(&runs))();

        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    /// The inline path does not depend on which registrar the host carries.
    #[test]
    fn complete_document_runs_inline_on_the_legacy_host_too() {
        let _ = env_logger::builder().is_test(true).try_init();
        let document = document_with(ReadyState::Complete, RegistrarKind::StateChange);
        let runs = Arc::new(AtomicU32::new(0));

        ready(document, counting_callback(&runs))();

        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    /// A loading document defers through the one-shot subscription: nothing
    /// runs until the load completes, then the callback runs exactly once.
    #[test]
    fn one_shot_path_fires_exactly_once_at_complete() -> Result<()> {
        let _ = env_logger::builder().is_test(true).try_init();
        let document = document_with(ReadyState::Loading, RegistrarKind::ContentLoaded);
        let runs = Arc::new(AtomicU32::new(0));

        ready(document.clone(), counting_callback(&runs))();
        assert_eq!(runs.load(Ordering::SeqCst), 0);

        assert_eq!(document.advance()?, ReadyState::Interactive);
        assert_eq!(runs.load(Ordering::SeqCst), 0);

        assert_eq!(document.advance()?, ReadyState::Complete);
        assert_eq!(runs.load(Ordering::SeqCst), 1);

        document.advance()?;
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        Ok(())
    }

    /// Wrappers invoked while the document is already interactive still catch
    /// the content-loaded event.
    #[test]
    fn one_shot_path_covers_interactive_documents() -> Result<()> {
        let _ = env_logger::builder().is_test(true).try_init();
        let document = document_with(ReadyState::Interactive, RegistrarKind::ContentLoaded);
        let runs = Arc::new(AtomicU32::new(0));

        ready(document.clone(), counting_callback(&runs))();
        assert_eq!(runs.load(Ordering::SeqCst), 0);

        assert_eq!(document.advance()?, ReadyState::Complete);
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        Ok(())
    }

    /// The legacy feed notifies on every transition, so a callback deferred
    /// from loading runs at interactive and again at complete.
    #[test]
    fn legacy_path_fires_on_every_transition() -> Result<()> {
        let _ = env_logger::builder().is_test(true).try_init();
        let document = document_with(ReadyState::Loading, RegistrarKind::StateChange);
        let runs = Arc::new(AtomicU32::new(0));

        ready(document.clone(), counting_callback(&runs))();
        assert_eq!(runs.load(Ordering::SeqCst), 0);

        document.advance()?;
        assert_eq!(runs.load(Ordering::SeqCst), 1);

        document.advance()?;
        assert_eq!(runs.load(Ordering::SeqCst), 2);

        document.advance()?;
        assert_eq!(runs.load(Ordering::SeqCst), 2);
        Ok(())
    }

    /// From interactive there is a single remaining transition, so the legacy
    /// path delivers exactly once.
    #[test]
    fn legacy_path_delivers_at_complete_from_interactive() -> Result<()> {
        let _ = env_logger::builder().is_test(true).try_init();
        let document = document_with(ReadyState::Interactive, RegistrarKind::StateChange);
        let runs = Arc::new(AtomicU32::new(0));

        ready(document.clone(), counting_callback(&runs))();
        assert_eq!(runs.load(Ordering::SeqCst), 0);

        document.finish()?;
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        Ok(())
    }

    /// Each wrapper defers independently; completing the load runs them all.
    #[test]
    fn wrappers_defer_independently() -> Result<()> {
        let _ = env_logger::builder().is_test(true).try_init();
        let document = document_with(ReadyState::Loading, RegistrarKind::ContentLoaded);
        let first_runs = Arc::new(AtomicU32::new(0));
        let second_runs = Arc::new(AtomicU32::new(0));

        ready(document.clone(), counting_callback(&first_runs))();
        ready(document.clone(), counting_callback(&second_runs))();
        assert_eq!(first_runs.load(Ordering::SeqCst), 0);
        assert_eq!(second_runs.load(Ordering::SeqCst), 0);

        document.finish()?;
        assert_eq!(first_runs.load(Ordering::SeqCst), 1);
        assert_eq!(second_runs.load(Ordering::SeqCst), 1);
        Ok(())
    }

    /// A panicking callback neither blocks nor unregisters its siblings on
    /// the legacy feed. The first panic of a round is re-raised once the
    /// round finishes.
    #[test]
    fn legacy_path_survives_a_panicking_callback() -> Result<()> {
        let _ = env_logger::builder().is_test(true).try_init();
        let document = document_with(ReadyState::Loading, RegistrarKind::StateChange);
        let runs = Arc::new(AtomicU32::new(0));

        ready(document.clone(), || panic!("loader failed"))();
        ready(document.clone(), counting_callback(&runs))();

        let first = catch_unwind(AssertUnwindSafe(|| document.advance())).err();
        assert_eq!(
            first.as_deref().and_then(|payload| payload.downcast_ref::<&str>()),
            Some(&"loader failed")
        );
        assert_eq!(runs.load(Ordering::SeqCst), 1);

        let second = catch_unwind(AssertUnwindSafe(|| document.advance())).err();
        assert_eq!(
            second.as_deref().and_then(|payload| payload.downcast_ref::<&str>()),
            Some(&"loader failed")
        );
        assert_eq!(runs.load(Ordering::SeqCst), 2);

        assert_eq!(document.advance()?, ReadyState::Complete);
        assert_eq!(runs.load(Ordering::SeqCst), 2);
        Ok(())
    }

    /// One-shot delivery reaches every queued callback even when an earlier
    /// one panics, and the event still counts as delivered.
    #[test]
    fn one_shot_path_survives_a_panicking_callback() -> Result<()> {
        let _ = env_logger::builder().is_test(true).try_init();
        let document = document_with(ReadyState::Interactive, RegistrarKind::ContentLoaded);
        let runs = Arc::new(AtomicU32::new(0));

        ready(document.clone(), || panic!("loader failed"))();
        ready(document.clone(), counting_callback(&runs))();

        let outcome = catch_unwind(AssertUnwindSafe(|| document.advance())).err();
        assert_eq!(
            outcome.as_deref().and_then(|payload| payload.downcast_ref::<&str>()),
            Some(&"loader failed")
        );
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert!(document.content_loaded_fired());

        assert_eq!(document.advance()?, ReadyState::Complete);
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        Ok(())
    }
}
