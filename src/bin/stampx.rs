//! CLI binary for stamp-extractor.
//!
//! A thin shim over the library's `Workbench`: opens a drawing, walks the
//! selected pages, runs extraction on each and prints or saves the results.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use stamp_extractor::raster::encode::EncodedImage;
use stamp_extractor::{
    annotate, map_detections, ClientConfig, DisplayGeometry, Document, Observer, PageSelection,
    Phase, RasterStrategy, ResultsPanel, SessionError, SessionObserver, StampError, Workbench,
};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

// ── Spinner observer ─────────────────────────────────────────────────────────

/// Terminal observer: a spinner showing the request in flight plus one log
/// line per page result.
struct CliObserver {
    bar: ProgressBar,
}

impl CliObserver {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.set_prefix("Opening");
        bar.set_message("reading document…");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl SessionObserver for CliObserver {
    fn on_phase_change(&self, _from: Phase, to: Phase) {
        let prefix = match to {
            Phase::Loading => "Loading",
            Phase::Extracting => "Extracting",
            _ => return,
        };
        self.bar.set_prefix(prefix);
    }

    fn on_request(&self, what: &str, page: usize) {
        self.bar.set_message(format!("{what} · page {}", page + 1));
    }

    fn on_page_ready(&self, page: usize, page_count: usize) {
        self.bar.set_message(format!("PAGE {} OF {page_count}", page + 1));
    }

    fn on_detections(&self, page: usize, count: usize) {
        self.bar.println(format!(
            "  {} Page {:>3}  {}",
            green("✓"),
            page + 1,
            dim(&format!("{count} stamp(s)")),
        ));
    }

    fn on_error(&self, error: &SessionError) {
        self.bar
            .println(format!("  {} {}", red("✗"), red(&error.message)));
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Extract stamps from the first page, results panel on stdout
  stampx drawing.pdf

  # All pages, raw JSON payloads (what the copy button copies)
  stampx --pages all --json drawing.pdf > stamps.json

  # Render locally with pdfium, save an annotated preview and thumbnails
  stampx --local --annotate preview.png --thumbnails stamps/ drawing.pdf

  # Preview fitted to a 900 px wide viewport
  stampx --display-width 900 --annotate preview.png drawing.pdf

  # Page count only
  stampx --inspect-only drawing.pdf

  # A different backend
  stampx --api-base http://10.0.0.5:8000 https://example.com/plans.pdf

ENVIRONMENT VARIABLES:
  STAMPX_API_BASE     Detection service base URL (default http://127.0.0.1:8000)
  STAMPX_LOCAL        Render pages locally with pdfium
  PDFIUM_LIB_PATH     Path to libpdfium for local rendering
  RUST_LOG            Overrides the log filter chosen by -v / -q
"#;

/// Find engineering stamps in PDF drawings.
#[derive(Parser, Debug)]
#[command(
    name = "stampx",
    version,
    about = "Find engineering stamps in PDF drawings",
    long_about = "Send a PDF drawing to a stamp-detection service, print the engineer name and \
license number read from every approval stamp, and optionally save the page with the detections \
drawn over it plus one cropped thumbnail per stamp.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local PDF file path or HTTP/HTTPS URL.
    input: String,

    /// Page selection (1-indexed): all, 5, 3-15, or 1,3,5,7.
    #[arg(long, env = "STAMPX_PAGES", default_value = "1")]
    pages: String,

    /// Render pages locally with pdfium instead of asking the service.
    #[arg(long, env = "STAMPX_LOCAL")]
    local: bool,

    /// Base URL of the detection service.
    #[arg(long, env = "STAMPX_API_BASE", default_value = stamp_extractor::config::DEFAULT_API_BASE)]
    api_base: String,

    /// Upscale factor for local rendering (0.25–8).
    #[arg(long, env = "STAMPX_SCALE", default_value_t = stamp_extractor::config::DEFAULT_RENDER_SCALE)]
    scale: f32,

    /// Fit the preview into a viewport this many pixels wide.
    #[arg(long, env = "STAMPX_DISPLAY_WIDTH")]
    display_width: Option<f64>,

    /// Write the page with detections drawn over it (PNG).
    #[arg(long, env = "STAMPX_ANNOTATE")]
    annotate: Option<PathBuf>,

    /// Write one cropped thumbnail per detection into this directory.
    #[arg(long, env = "STAMPX_THUMBNAILS")]
    thumbnails: Option<PathBuf>,

    /// Write the rasterised page as received.
    #[arg(long, env = "STAMPX_SAVE_PAGE")]
    save_page: Option<PathBuf>,

    /// Print the raw JSON payload(s) instead of the results panel.
    #[arg(long, env = "STAMPX_JSON")]
    json: bool,

    /// Print the page count only, no extraction.
    #[arg(long)]
    inspect_only: bool,

    /// Skip thumbnail cropping.
    #[arg(long, env = "STAMPX_NO_THUMBNAILS")]
    no_thumbnails: bool,

    /// PDF user password for encrypted documents (local rendering).
    #[arg(long, env = "STAMPX_PASSWORD")]
    password: Option<String>,

    /// Per-request timeout in seconds.
    #[arg(long, env = "STAMPX_TIMEOUT", default_value_t = 60)]
    timeout: u64,

    /// HTTP download timeout in seconds for URL inputs.
    #[arg(long, env = "STAMPX_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Disable the spinner.
    #[arg(long, env = "STAMPX_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "STAMPX_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "STAMPX_QUIET")]
    quiet: bool,
}

impl Cli {
    fn shows_progress(&self) -> bool {
        !self.quiet && !self.no_progress && !self.json
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner gives all the feedback that matters; INFO logs would
    // tear through it.
    let show_progress = cli.shows_progress();
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let config = build_config(&cli)?;
    let pages = parse_pages(&cli.pages)?;

    let observer = show_progress.then(CliObserver::new);
    let mut workbench = Workbench::from_config(&config).context("Failed to set up client")?;
    if let Some(ref o) = observer {
        workbench = workbench.with_observer(o.clone() as Observer);
    }
    if let Some(width) = cli.display_width {
        workbench.set_viewport_width(width);
    }

    let result = run(&cli, &config, &workbench, &pages).await;
    if let Some(o) = observer {
        o.finish();
    }
    result
}

async fn run(
    cli: &Cli,
    config: &ClientConfig,
    workbench: &Workbench,
    pages: &PageSelection,
) -> Result<()> {
    // ── Load document ────────────────────────────────────────────────────
    let document = match Document::resolve(&cli.input, config.download_timeout_secs).await {
        Ok(d) => d,
        Err(e) => {
            let banner = workbench.reject(&e);
            anyhow::bail!("{}", banner.detail);
        }
    };
    let name = document.name().to_string();
    workbench
        .open(document)
        .await
        .with_context(|| format!("Failed to load '{name}'"))?;
    let page_count = workbench.snapshot().page_count;

    // ── Inspect-only mode ────────────────────────────────────────────────
    if cli.inspect_only {
        if cli.json {
            let meta = serde_json::json!({ "file": name, "page_count": page_count });
            println!(
                "{}",
                serde_json::to_string_pretty(&meta).context("Failed to serialise metadata")?
            );
        } else {
            println!("File:   {name}");
            println!("Pages:  {page_count}");
        }
        return Ok(());
    }

    let indices = pages.to_indices(page_count);
    if indices.is_empty() {
        anyhow::bail!(
            "Page selection '{}' matches no page (document has {} pages)",
            cli.pages,
            page_count
        );
    }
    let multi = indices.len() > 1;

    // ── Extract ──────────────────────────────────────────────────────────
    let mut payloads = Vec::new();
    let mut failed = 0usize;
    for &page in &indices {
        if let Err(e) = workbench.go_to_page(page).await {
            report_failure(cli, page, &e);
            failed += 1;
            continue;
        }
        if let Some(ref path) = cli.save_page {
            save_page_image(workbench, &page_path(path, page, multi), cli.quiet)?;
        }
        if let Err(e) = workbench.extract().await {
            report_failure(cli, page, &e);
            failed += 1;
            continue;
        }

        if cli.json {
            if let Some(set) = workbench.snapshot().detections {
                payloads.push(set.raw);
            }
        } else if let Some(panel) = workbench.with_session(ResultsPanel::from_session) {
            if !cli.quiet {
                println!("{panel}\n");
            }
        }
        if let Some(ref path) = cli.annotate {
            save_annotated(workbench, &page_path(path, page, multi), cli.quiet)?;
        }
        if let Some(ref dir) = cli.thumbnails {
            save_thumbnails(workbench, dir, page, cli.quiet)?;
        }
    }

    if cli.json {
        let out = if multi {
            serde_json::Value::Array(payloads)
        } else {
            payloads.pop().unwrap_or(serde_json::Value::Null)
        };
        println!(
            "{}",
            serde_json::to_string_pretty(&out).context("Failed to serialise output")?
        );
    }

    if failed == indices.len() {
        anyhow::bail!("Extraction failed on every selected page");
    }
    if failed > 0 && !cli.quiet {
        eprintln!(
            "{} {}/{} pages extracted",
            red("⚠"),
            bold(&(indices.len() - failed).to_string()),
            indices.len()
        );
    }
    Ok(())
}

/// Map CLI args to `ClientConfig`.
fn build_config(cli: &Cli) -> Result<ClientConfig> {
    let mut builder = ClientConfig::builder()
        .api_base(cli.api_base.as_str())
        .strategy(if cli.local {
            RasterStrategy::Local
        } else {
            RasterStrategy::Remote
        })
        .render_scale(cli.scale)
        .request_timeout_secs(cli.timeout)
        .download_timeout_secs(cli.download_timeout)
        .thumbnails(!cli.no_thumbnails);
    if let Some(ref pwd) = cli.password {
        builder = builder.password(pwd.as_str());
    }
    builder.build().context("Invalid configuration")
}

fn report_failure(cli: &Cli, page: usize, error: &SessionError) {
    // The spinner already printed the banner.
    if cli.quiet || cli.shows_progress() {
        return;
    }
    eprintln!(
        "{} Page {}: {}",
        red("✗"),
        page + 1,
        if cli.verbose { &error.detail } else { &error.message }
    );
}

/// `out.png` → `out-p3.png` when several pages write to the same path.
fn page_path(base: &Path, page: usize, multi: bool) -> PathBuf {
    if !multi {
        return base.to_path_buf();
    }
    let stem = base
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "page".to_string());
    let file = match base.extension() {
        Some(ext) => format!("{stem}-p{}.{}", page + 1, ext.to_string_lossy()),
        None => format!("{stem}-p{}", page + 1),
    };
    base.with_file_name(file)
}

fn save_page_image(workbench: &Workbench, path: &Path, quiet: bool) -> Result<()> {
    let Some(image) = workbench.with_session(|s| s.raster().map(|r| r.image.clone())) else {
        return Ok(());
    };
    image.save(path)?;
    if !quiet {
        eprintln!("{} page image → {}", dim("·"), path.display());
    }
    Ok(())
}

fn save_annotated(workbench: &Workbench, path: &Path, quiet: bool) -> Result<()> {
    let state = workbench.with_session(|s| {
        Some((s.raster()?.clone(), s.detections()?.clone(), s.display()))
    });
    let Some((raster, set, display)) = state else {
        return Ok(());
    };
    let display = display.unwrap_or_else(|| DisplayGeometry::actual(raster.size()));
    let bitmap = raster
        .image
        .decode()
        .map_err(|e| StampError::Internal(format!("Cannot decode page image: {e}")))?;
    let overlays = map_detections(raster.size(), Some(display), &set.detections);
    let annotated = image::DynamicImage::ImageRgba8(annotate(&bitmap, display, &overlays));
    EncodedImage::png(&annotated)
        .map_err(|e| StampError::Internal(format!("Cannot encode annotated page: {e}")))?
        .save(path)?;
    if !quiet {
        eprintln!("{} annotated page → {}", dim("·"), path.display());
    }
    Ok(())
}

fn save_thumbnails(workbench: &Workbench, dir: &Path, page: usize, quiet: bool) -> Result<()> {
    let thumbnails = workbench.with_session(|s| s.thumbnails().to_vec());
    if thumbnails.is_empty() {
        return Ok(());
    }
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create thumbnail directory {:?}", dir))?;
    for thumb in &thumbnails {
        let path = dir.join(format!(
            "page{}-stamp{}.{}",
            page + 1,
            thumb.index + 1,
            thumb.image.extension()
        ));
        thumb.image.save(&path)?;
    }
    if !quiet {
        eprintln!(
            "{} {} thumbnail(s) → {}",
            dim("·"),
            thumbnails.len(),
            dir.display()
        );
    }
    Ok(())
}

/// Parse `--pages` string into `PageSelection`.
fn parse_pages(s: &str) -> Result<PageSelection> {
    let s = s.trim().to_lowercase();

    if s == "all" {
        return Ok(PageSelection::All);
    }

    // Range: "3-15"
    if let Some((start, end)) = s.split_once('-') {
        let start: usize = start
            .trim()
            .parse()
            .context("Invalid start page in range")?;
        let end: usize = end.trim().parse().context("Invalid end page in range")?;

        if start < 1 {
            anyhow::bail!("Pages are 1-indexed, minimum is 1 (got {})", start);
        }
        if start > end {
            anyhow::bail!(
                "Invalid page range '{}-{}': start must be <= end",
                start,
                end
            );
        }

        return Ok(PageSelection::Range(start, end));
    }

    // Set: "1,3,5,7"
    if s.contains(',') {
        let pages: Vec<usize> = s
            .split(',')
            .map(|p| {
                p.trim()
                    .parse::<usize>()
                    .context(format!("Invalid page number: '{}'", p.trim()))
            })
            .collect::<Result<Vec<_>>>()?;

        if let Some(&p) = pages.iter().find(|&&p| p < 1) {
            anyhow::bail!("Pages are 1-indexed, minimum is 1 (got {})", p);
        }

        return Ok(PageSelection::Set(pages));
    }

    // Single page: "5"
    let page: usize = s.parse().context("Invalid page number")?;
    if page < 1 {
        anyhow::bail!("Pages are 1-indexed, minimum is 1 (got {})", page);
    }

    Ok(PageSelection::Single(page))
}
