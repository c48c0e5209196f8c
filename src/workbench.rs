//! Async driver that runs a [`Session`] against real services.
//!
//! The workbench owns the session behind a mutex, the page rasteriser and
//! the detection service. Each operation takes the lock only long enough to
//! start or complete a transition and never holds it across an `.await`,
//! so operations may run concurrently: a page change issued while an
//! extraction is in flight supersedes it, and the late extraction result is
//! dropped when it arrives.
//!
//! ```rust,no_run
//! use stamp_extractor::{ClientConfig, Document, Workbench};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ClientConfig::default();
//! let workbench = Workbench::from_config(&config)?;
//! workbench.open(Document::from_path("drawing.pdf")?).await?;
//! workbench.extract().await?;
//! let snapshot = workbench.snapshot();
//! println!("{} stamps", snapshot.detections.map(|d| d.len()).unwrap_or(0));
//! # Ok(())
//! # }
//! ```

use crate::api::{DetectionService, StampApiClient};
use crate::config::{ClientConfig, RasterStrategy};
use crate::detection::DetectionSet;
use crate::document::Document;
use crate::error::StampError;
use crate::geometry::{DisplayGeometry, PixelSize};
use crate::observer::{NoopObserver, Observer};
use crate::overlay::Overlay;
use crate::raster::{LocalRasterizer, PageRaster, PageRasterizer, RemoteRasterizer};
use crate::session::{Completion, Phase, Session, SessionError, Ticket};
use crate::thumbnail::{self, Thumbnail};
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

/// Result of a workbench operation.
///
/// `Err` carries the banner the session now shows; the session itself is
/// still usable.
pub type Outcome = Result<Completion, SessionError>;

/// Point-in-time copy of everything a front end renders.
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub phase: Phase,
    pub document: Option<String>,
    /// 0-indexed.
    pub page: usize,
    pub page_count: usize,
    pub raster: Option<PixelSize>,
    pub display: Option<DisplayGeometry>,
    pub detections: Option<DetectionSet>,
    pub overlays: Vec<Overlay>,
    pub thumbnails: Vec<Thumbnail>,
    pub error: Option<SessionError>,
    pub busy: bool,
}

enum Report {
    Pending,
    Error(SessionError),
    PageReady { page: usize, page_count: usize },
    Detections { page: usize, count: usize },
}

impl Report {
    fn of(session: &Session) -> Self {
        match session.phase() {
            Phase::Idle | Phase::Failed => match session.error() {
                Some(e) => Report::Error(e.clone()),
                None => Report::Pending,
            },
            Phase::Rasterized => Report::PageReady {
                page: session.current_page(),
                page_count: session.page_count(),
            },
            Phase::Resolved => Report::Detections {
                page: session.current_page(),
                count: session.detections().map(|d| d.len()).unwrap_or(0),
            },
            Phase::Loading | Phase::Extracting => Report::Pending,
        }
    }
}

/// Drives one session.
pub struct Workbench {
    session: Mutex<Session>,
    rasterizer: Arc<dyn PageRasterizer>,
    detector: Arc<dyn DetectionService>,
    observer: Observer,
}

impl Workbench {
    pub fn new(
        rasterizer: Arc<dyn PageRasterizer>,
        detector: Arc<dyn DetectionService>,
        thumbnails: bool,
    ) -> Self {
        Self {
            session: Mutex::new(Session::new(thumbnails)),
            rasterizer,
            detector,
            observer: Arc::new(NoopObserver),
        }
    }

    /// Build the service client and the rasteriser chosen by `config.strategy`.
    pub fn from_config(config: &ClientConfig) -> Result<Self, StampError> {
        let api = StampApiClient::new(config)?;
        let rasterizer: Arc<dyn PageRasterizer> = match config.strategy {
            RasterStrategy::Remote => Arc::new(RemoteRasterizer::new(api.clone())),
            RasterStrategy::Local => Arc::new(LocalRasterizer::from_config(config)),
        };
        info!(
            "Workbench: {} rasteriser, service at {}",
            rasterizer.name(),
            api.api_base()
        );
        Ok(Self::new(rasterizer, Arc::new(api), config.thumbnails))
    }

    pub fn with_observer(mut self, observer: Observer) -> Self {
        self.observer = observer;
        self
    }

    pub fn rasterizer_name(&self) -> &'static str {
        self.rasterizer.name()
    }

    // ── Operations ────────────────────────────────────────────────────────

    /// Validate an upload and open it.
    ///
    /// A non-PDF upload only sets the error banner; no request is sent and
    /// the current document stays.
    pub async fn upload(
        &self,
        name: &str,
        content_type: Option<&str>,
        bytes: impl Into<Arc<[u8]>>,
    ) -> Outcome {
        match Document::from_upload(name, content_type, bytes) {
            Ok(document) => self.open(document).await,
            Err(err) => Err(self.reject(&err)),
        }
    }

    /// Record a failed upload without touching the current document.
    pub fn reject(&self, err: &StampError) -> SessionError {
        self.transition(|s| s.reject_upload(err));
        let banner = SessionError::from(err);
        self.observer.on_error(&banner);
        banner
    }

    /// Open `document`: discover its page count, then show page 0.
    pub async fn open(&self, document: Document) -> Outcome {
        let ticket = self.transition(|s| s.open(document.clone()));

        self.observer.on_request("page count", 0);
        let count = self.rasterizer.page_count(&document).await;
        if self.apply("page count", ticket, |s| s.complete_info(ticket, count))?
            == Completion::Discarded
        {
            return Ok(Completion::Discarded);
        }

        self.load_page(document, ticket).await
    }

    /// Show the 0-indexed `page`, clamped to the document.
    pub async fn go_to_page(&self, page: usize) -> Outcome {
        let started = self.transition(|s| {
            let ticket = s.go_to_page(page)?;
            Ok::<_, StampError>(ticket.zip(s.document().cloned()))
        });
        match started.map_err(|e| SessionError::from(&e))? {
            Some((ticket, document)) => self.load_page(document, ticket).await,
            None => Ok(Completion::Unchanged),
        }
    }

    /// Move `delta` pages forward (or back, if negative).
    pub async fn step(&self, delta: isize) -> Outcome {
        let page = self.lock().current_page().saturating_add_signed(delta);
        self.go_to_page(page).await
    }

    /// Run detection on the current page.
    ///
    /// Thumbnails are cropped on the blocking pool, outside the session lock.
    pub async fn extract(&self) -> Outcome {
        let started = self.transition(|s| {
            let ticket = s.begin_extraction()?;
            let document = s.document().cloned().ok_or(StampError::NoDocument)?;
            let raster = s.thumbnails_enabled().then(|| s.raster().cloned()).flatten();
            Ok::<_, StampError>((ticket, document, raster))
        });
        let (ticket, document, raster) = started.map_err(|e| SessionError::from(&e))?;

        self.observer.on_request("extraction", ticket.page());
        let result = self.detector.extract(&document, ticket.page()).await;
        let thumbnails = match (&result, raster) {
            (Ok(set), Some(raster)) if set.page == ticket.page() => {
                self.crop_thumbnails(ticket, raster, set).await
            }
            _ => Vec::new(),
        };
        self.apply("extraction", ticket, |s| {
            s.complete_extraction(ticket, result, thumbnails)
        })
    }

    pub fn set_display(&self, display: DisplayGeometry) {
        self.transition(|s| s.set_display(display));
    }

    pub fn set_viewport_width(&self, width: f64) {
        self.transition(|s| s.set_viewport_width(width));
    }

    // ── Queries ───────────────────────────────────────────────────────────

    pub fn snapshot(&self) -> Snapshot {
        let s = self.lock();
        Snapshot {
            phase: s.phase(),
            document: s.document().map(|d| d.name().to_string()),
            page: s.current_page(),
            page_count: s.page_count(),
            raster: s.raster().map(|r| r.size()),
            display: s.display(),
            detections: s.detections().cloned(),
            overlays: s.overlays(),
            thumbnails: s.thumbnails().to_vec(),
            error: s.error().cloned(),
            busy: s.is_busy(),
        }
    }

    /// Borrow the session read-only.
    pub fn with_session<R>(&self, f: impl FnOnce(&Session) -> R) -> R {
        f(&self.lock())
    }

    // ── Internals ─────────────────────────────────────────────────────────

    async fn load_page(&self, document: Document, ticket: Ticket) -> Outcome {
        self.observer.on_request("page image", ticket.page());
        let raster = self.rasterizer.rasterize(&document, ticket.page()).await;
        self.apply("page image", ticket, |s| s.complete_raster(ticket, raster))
    }

    async fn crop_thumbnails(
        &self,
        ticket: Ticket,
        raster: PageRaster,
        set: &DetectionSet,
    ) -> Vec<Thumbnail> {
        if !self.lock().is_current(ticket) {
            return Vec::new();
        }
        let detections = set.detections.clone();
        tokio::task::spawn_blocking(move || thumbnail::for_raster(&raster, &detections))
            .await
            .unwrap_or_else(|e| {
                warn!("Thumbnail task panicked: {}", e);
                Vec::new()
            })
    }

    fn lock(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `f` under the lock and report any phase change after releasing it.
    fn transition<R>(&self, f: impl FnOnce(&mut Session) -> R) -> R {
        let (from, to, out) = {
            let mut s = self.lock();
            let from = s.phase();
            let out = f(&mut s);
            (from, s.phase(), out)
        };
        if from != to {
            debug!("Phase {:?} -> {:?}", from, to);
            self.observer.on_phase_change(from, to);
        }
        out
    }

    /// Feed a completion into the session and turn the new state into an
    /// [`Outcome`].
    fn apply(
        &self,
        what: &str,
        ticket: Ticket,
        f: impl FnOnce(&mut Session) -> Completion,
    ) -> Outcome {
        let (completion, report) = self.transition(|s| {
            let completion = f(s);
            let report = match completion {
                Completion::Applied => Report::of(s),
                _ => Report::Pending,
            };
            (completion, report)
        });

        if completion == Completion::Discarded {
            self.observer.on_discarded(what, ticket.page());
            return Ok(completion);
        }
        match report {
            Report::Error(e) => {
                self.observer.on_error(&e);
                Err(e)
            }
            Report::PageReady { page, page_count } => {
                self.observer.on_page_ready(page, page_count);
                Ok(completion)
            }
            Report::Detections { page, count } => {
                self.observer.on_detections(page, count);
                Ok(completion)
            }
            Report::Pending => Ok(completion),
        }
    }
}
