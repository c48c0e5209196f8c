//! Extraction session: the state machine behind one document view.
//!
//! ```text
//!            open                 raster ok            extract
//!   Idle ──────────▶ Loading ─────────────▶ Rasterized ───────▶ Extracting
//!    ▲                  │ ▲                     ▲                 │    │
//!    │  info/raster err │ │ go_to_page          │ go_to_page      │ok  │err
//!    └──────────────────┘ └─────────────────────┼──── Resolved ◀──┘    ▼
//!                                               └─────────────────── Failed
//! ```
//!
//! Every request the session starts is described by a [`Ticket`] carrying
//! the generation counter at the time it was issued and the page it
//! targets. Opening a document or changing page bumps the generation, so a
//! completion that arrives for an older ticket is recognised as stale and
//! dropped without touching state. At most one request is pending at a
//! time; while one is, the session reports itself busy and refuses to start
//! another extraction.
//!
//! The session does no I/O itself. [`crate::workbench::Workbench`] issues
//! the requests and feeds the results back through the `complete_*`
//! methods.

use crate::detection::DetectionSet;
use crate::document::Document;
use crate::error::{ErrorKind, StampError};
use crate::geometry::DisplayGeometry;
use crate::overlay::{self, Overlay};
use crate::raster::PageRaster;
use crate::thumbnail::Thumbnail;
use serde::Serialize;
use std::fmt;
use tracing::{debug, info, warn};

/// Where the session is in the extraction workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// No document, or the last one failed to load.
    Idle,
    /// Page count or page image is being fetched.
    Loading,
    /// A page image is shown and extraction can start.
    Rasterized,
    /// Waiting for the detection service.
    Extracting,
    /// Detections for the current page are available.
    Resolved,
    /// The last extraction or page load failed.
    Failed,
}

/// Identifies one issued request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket {
    generation: u64,
    page: usize,
}

impl Ticket {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// 0-indexed page the request targets.
    pub fn page(&self) -> usize {
        self.page
    }
}

/// Whether a completion changed the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    Applied,
    /// The ticket was superseded; the result was dropped.
    Discarded,
    /// Nothing was requested because the state already matched.
    Unchanged,
}

/// The error banner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionError {
    pub kind: ErrorKind,
    /// Short message for the user.
    pub message: String,
    /// Full error text, for logs and `--verbose` output.
    pub detail: String,
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.detail)
    }
}

impl std::error::Error for SessionError {}

impl From<&StampError> for SessionError {
    fn from(err: &StampError) -> Self {
        Self {
            kind: err.kind(),
            message: err.user_message(),
            detail: err.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pending {
    /// Page count, then the first page image.
    Document(Ticket),
    Page(Ticket),
    Extraction(Ticket),
}

impl Pending {
    fn ticket(&self) -> Ticket {
        match *self {
            Pending::Document(t) | Pending::Page(t) | Pending::Extraction(t) => t,
        }
    }
}

/// State of one document view.
#[derive(Debug)]
pub struct Session {
    phase: Phase,
    document: Option<Document>,
    page_count: usize,
    current_page: usize,
    raster: Option<PageRaster>,
    display: Option<DisplayGeometry>,
    viewport_width: Option<f64>,
    detections: Option<DetectionSet>,
    thumbnails: Vec<Thumbnail>,
    error: Option<SessionError>,
    generation: u64,
    pending: Option<Pending>,
    thumbnails_enabled: bool,
}

impl Default for Session {
    fn default() -> Self {
        Self::new(true)
    }
}

impl Session {
    pub fn new(thumbnails_enabled: bool) -> Self {
        Self {
            phase: Phase::Idle,
            document: None,
            page_count: 0,
            current_page: 0,
            raster: None,
            display: None,
            viewport_width: None,
            detections: None,
            thumbnails: Vec::new(),
            error: None,
            generation: 0,
            pending: None,
            thumbnails_enabled,
        }
    }

    // ── Transitions ───────────────────────────────────────────────────────

    /// Start loading a new document, superseding everything in flight.
    ///
    /// The returned ticket covers both the page-count request and the
    /// first page image.
    pub fn open(&mut self, document: Document) -> Ticket {
        info!("Opening '{}' ({} bytes)", document.name(), document.len());
        self.generation += 1;
        self.document = Some(document);
        self.page_count = 0;
        self.current_page = 0;
        self.clear_page();
        self.error = None;
        let ticket = self.ticket();
        self.pending = Some(Pending::Document(ticket));
        self.phase = Phase::Loading;
        ticket
    }

    /// Record an upload that never became a document (e.g. not a PDF).
    ///
    /// Only the error banner changes; whatever was loaded stays loaded.
    pub fn reject_upload(&mut self, err: &StampError) {
        warn!("Upload rejected: {}", err);
        self.error = Some(err.into());
    }

    /// Apply the page count of the document being opened.
    pub fn complete_info(&mut self, ticket: Ticket, result: Result<usize, StampError>) -> Completion {
        if self.pending != Some(Pending::Document(ticket)) || self.page_count > 0 {
            return self.discard(ticket, "page count");
        }
        match result {
            Ok(0) => {
                let err = StampError::InfoFetchFailed {
                    detail: "document has no pages".into(),
                };
                self.fail_document(&err);
            }
            Ok(total) => {
                debug!("Document has {} pages", total);
                self.page_count = total;
            }
            Err(err) => self.fail_document(&err),
        }
        Completion::Applied
    }

    /// Apply a page image, for either the first page of a new document or
    /// a page change.
    pub fn complete_raster(
        &mut self,
        ticket: Ticket,
        result: Result<PageRaster, StampError>,
    ) -> Completion {
        let pending = match self.pending {
            Some(p @ (Pending::Document(_) | Pending::Page(_))) if p.ticket() == ticket => p,
            _ => return self.discard(ticket, "page image"),
        };
        if matches!(pending, Pending::Document(_)) && self.page_count == 0 {
            return self.discard(ticket, "page image");
        }

        let result = result.and_then(|raster| {
            if raster.page == ticket.page {
                Ok(raster)
            } else {
                Err(StampError::RasterisationFailed {
                    page: ticket.page,
                    detail: format!("received image for page {}", raster.page),
                })
            }
        });

        match result {
            Ok(raster) => {
                info!(
                    "Page {} rasterised: {}x{} px",
                    ticket.page, raster.width, raster.height
                );
                self.display = self
                    .viewport_width
                    .map(|w| DisplayGeometry::fit_width(raster.size(), w));
                self.raster = Some(raster);
                self.pending = None;
                self.phase = Phase::Rasterized;
            }
            Err(err) => match pending {
                Pending::Document(_) => self.fail_document(&err),
                _ => {
                    warn!("{}", err);
                    self.pending = None;
                    self.error = Some((&err).into());
                    self.phase = Phase::Failed;
                }
            },
        }
        Completion::Applied
    }

    /// Move to `page` (0-indexed, clamped to the document).
    ///
    /// Returns the ticket for the new page image, or `None` when the page is
    /// already shown. Detections, thumbnails and the raster of the previous
    /// page are cleared in the same step, so nothing from the old page can
    /// be drawn over the new one.
    pub fn go_to_page(&mut self, page: usize) -> Result<Option<Ticket>, StampError> {
        if self.document.is_none() {
            return Err(StampError::NoDocument);
        }
        if self.page_count == 0 {
            return Err(StampError::Busy);
        }
        let page = page.min(self.page_count - 1);
        if page == self.current_page && self.raster.is_some() {
            return Ok(None);
        }
        if matches!(self.pending, Some(Pending::Document(_))) {
            return Err(StampError::Busy);
        }

        debug!("Page {} -> {}", self.current_page, page);
        self.generation += 1;
        self.current_page = page;
        self.clear_page();
        self.error = None;
        let ticket = self.ticket();
        self.pending = Some(Pending::Page(ticket));
        self.phase = Phase::Loading;
        Ok(Some(ticket))
    }

    /// Move by `delta` pages, saturating at the first and last page.
    pub fn step_page(&mut self, delta: isize) -> Result<Option<Ticket>, StampError> {
        let target = self.current_page.saturating_add_signed(delta);
        self.go_to_page(target)
    }

    /// Start detection on the current page.
    pub fn begin_extraction(&mut self) -> Result<Ticket, StampError> {
        if self.document.is_none() {
            return Err(StampError::NoDocument);
        }
        if self.pending.is_some() {
            return Err(StampError::Busy);
        }
        if self.raster.is_none() {
            return Err(StampError::PageNotLoaded {
                page: self.current_page,
            });
        }
        let ticket = self.ticket();
        self.pending = Some(Pending::Extraction(ticket));
        self.error = None;
        self.phase = Phase::Extracting;
        Ok(ticket)
    }

    /// Apply an extraction result.
    ///
    /// On success the detections replace the previous ones, together with
    /// `thumbnails` cropped from the current raster (ignored when thumbnails
    /// are disabled). A set for a page other than the ticket's is a failure.
    /// On failure the previous detections are cleared and the raster stays.
    pub fn complete_extraction(
        &mut self,
        ticket: Ticket,
        result: Result<DetectionSet, StampError>,
        thumbnails: Vec<Thumbnail>,
    ) -> Completion {
        if self.pending != Some(Pending::Extraction(ticket)) {
            return self.discard(ticket, "extraction");
        }
        self.pending = None;

        let result = result.and_then(|set| {
            if set.page == ticket.page {
                Ok(set)
            } else {
                Err(StampError::ExtractionFailed {
                    page: ticket.page,
                    detail: format!("received detections for page {}", set.page),
                })
            }
        });

        match result {
            Ok(set) => {
                info!("Page {}: {} stamp(s) detected", ticket.page, set.len());
                self.thumbnails = if self.thumbnails_enabled {
                    thumbnails
                } else {
                    Vec::new()
                };
                self.detections = Some(set);
                self.phase = Phase::Resolved;
            }
            Err(err) => {
                warn!("{}", err);
                self.detections = None;
                self.thumbnails.clear();
                self.error = Some((&err).into());
                self.phase = Phase::Failed;
            }
        }
        Completion::Applied
    }

    /// Record where the raster is drawn. Overlays follow immediately.
    pub fn set_display(&mut self, display: DisplayGeometry) {
        self.display = Some(display);
    }

    /// Fit future and current rasters to a viewport `width` wide.
    pub fn set_viewport_width(&mut self, width: f64) {
        self.viewport_width = Some(width);
        if let Some(raster) = &self.raster {
            self.display = Some(DisplayGeometry::fit_width(raster.size(), width));
        }
    }

    // ── Queries ───────────────────────────────────────────────────────────

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn document(&self) -> Option<&Document> {
        self.document.as_ref()
    }

    pub fn page_count(&self) -> usize {
        self.page_count
    }

    /// 0-indexed.
    pub fn current_page(&self) -> usize {
        self.current_page
    }

    pub fn raster(&self) -> Option<&PageRaster> {
        self.raster.as_ref()
    }

    pub fn display(&self) -> Option<DisplayGeometry> {
        self.display
    }

    pub fn detections(&self) -> Option<&DetectionSet> {
        self.detections.as_ref()
    }

    pub fn thumbnails_enabled(&self) -> bool {
        self.thumbnails_enabled
    }

    pub fn thumbnails(&self) -> &[Thumbnail] {
        &self.thumbnails
    }

    pub fn error(&self) -> Option<&SessionError> {
        self.error.as_ref()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// A request is in flight.
    pub fn is_busy(&self) -> bool {
        self.pending.is_some()
    }

    /// Whether `ticket` still refers to the current request.
    pub fn is_current(&self, ticket: Ticket) -> bool {
        self.pending.map(|p| p.ticket()) == Some(ticket)
    }

    pub fn can_extract(&self) -> bool {
        self.document.is_some() && self.raster.is_some() && !self.is_busy()
    }

    pub fn can_go_previous(&self) -> bool {
        self.page_count > 0 && self.current_page > 0 && !self.loading_document()
    }

    pub fn can_go_next(&self) -> bool {
        self.page_count > 0 && self.current_page + 1 < self.page_count && !self.loading_document()
    }

    /// Detections mapped onto the current display geometry.
    pub fn overlays(&self) -> Vec<Overlay> {
        match (&self.raster, &self.detections) {
            (Some(raster), Some(set)) => {
                overlay::map_detections(raster.size(), self.display, &set.detections)
            }
            _ => Vec::new(),
        }
    }

    // ── Internals ─────────────────────────────────────────────────────────

    fn ticket(&self) -> Ticket {
        Ticket {
            generation: self.generation,
            page: self.current_page,
        }
    }

    fn loading_document(&self) -> bool {
        matches!(self.pending, Some(Pending::Document(_)))
    }

    fn clear_page(&mut self) {
        self.raster = None;
        self.display = None;
        self.detections = None;
        self.thumbnails.clear();
    }

    fn fail_document(&mut self, err: &StampError) {
        warn!("{}", err);
        self.document = None;
        self.page_count = 0;
        self.current_page = 0;
        self.clear_page();
        self.pending = None;
        self.error = Some(err.into());
        self.phase = Phase::Idle;
    }

    fn discard(&self, ticket: Ticket, what: &str) -> Completion {
        debug!(
            "Discarding stale {} result (generation {}, page {}; now generation {}, page {})",
            what, ticket.generation, ticket.page, self.generation, self.current_page
        );
        Completion::Discarded
    }
}
