//! Observer trait for session events.
//!
//! Inject an [`Arc<dyn SessionObserver>`] into
//! [`crate::workbench::Workbench::with_observer`] to follow what the
//! workbench is doing: the CLI drives its spinner from these events, a
//! GUI front end would re-render on them.
//!
//! # Example
//!
//! ```rust
//! use stamp_extractor::{Phase, SessionObserver};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingObserver {
//!     resolved: AtomicUsize,
//! }
//!
//! impl SessionObserver for CountingObserver {
//!     fn on_phase_change(&self, _from: Phase, to: Phase) {
//!         if to == Phase::Resolved {
//!             self.resolved.fetch_add(1, Ordering::SeqCst);
//!         }
//!     }
//! }
//!
//! let observer: Arc<dyn SessionObserver> = Arc::new(CountingObserver {
//!     resolved: AtomicUsize::new(0),
//! });
//! observer.on_phase_change(Phase::Extracting, Phase::Resolved);
//! ```

use crate::session::{Phase, SessionError};
use std::sync::Arc;

/// Called by the workbench as requests start and complete.
///
/// Implementations must be `Send + Sync`; callbacks may arrive from any
/// runtime worker. Events are delivered after the session lock is released.
/// All methods default to no-ops.
pub trait SessionObserver: Send + Sync {
    /// The session moved between phases.
    fn on_phase_change(&self, from: Phase, to: Phase) {
        let _ = (from, to);
    }

    /// A request went out.
    ///
    /// # Arguments
    /// * `what`: `"page count"`, `"page image"` or `"extraction"`
    /// * `page`: 0-indexed page the request targets
    fn on_request(&self, what: &str, page: usize) {
        let _ = (what, page);
    }

    /// A page image is ready to show.
    fn on_page_ready(&self, page: usize, page_count: usize) {
        let _ = (page, page_count);
    }

    /// Detections for `page` were applied.
    fn on_detections(&self, page: usize, count: usize) {
        let _ = (page, count);
    }

    /// An error banner was set.
    fn on_error(&self, error: &SessionError) {
        let _ = error;
    }

    /// A late result for a superseded request was dropped.
    fn on_discarded(&self, what: &str, page: usize) {
        let _ = (what, page);
    }
}

/// Observer that ignores everything. The default for a new workbench.
pub struct NoopObserver;

impl SessionObserver for NoopObserver {}

/// Shared observer handle as stored by the workbench.
pub type Observer = Arc<dyn SessionObserver>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recording {
        events: Mutex<Vec<String>>,
    }

    impl SessionObserver for Recording {
        fn on_phase_change(&self, from: Phase, to: Phase) {
            self.events
                .lock()
                .unwrap()
                .push(format!("{from:?}->{to:?}"));
        }

        fn on_discarded(&self, what: &str, page: usize) {
            self.events
                .lock()
                .unwrap()
                .push(format!("discard {what} {page}"));
        }
    }

    #[test]
    fn noop_observer_does_not_panic() {
        let o = NoopObserver;
        o.on_phase_change(Phase::Idle, Phase::Loading);
        o.on_request("page count", 0);
        o.on_page_ready(0, 3);
        o.on_detections(0, 2);
        o.on_error(&SessionError {
            kind: ErrorKind::Extraction,
            message: "Extraction failed".into(),
            detail: "HTTP 500".into(),
        });
        o.on_discarded("extraction", 1);
    }

    #[test]
    fn overridden_methods_receive_events() {
        let rec = Recording::default();
        rec.on_phase_change(Phase::Rasterized, Phase::Extracting);
        rec.on_detections(0, 4); // default no-op
        rec.on_discarded("page image", 2);
        assert_eq!(
            *rec.events.lock().unwrap(),
            vec!["Rasterized->Extracting", "discard page image 2"]
        );
    }

    #[test]
    fn arc_dyn_observer_works() {
        let o: Observer = Arc::new(NoopObserver);
        o.on_request("extraction", 0);
    }
}
