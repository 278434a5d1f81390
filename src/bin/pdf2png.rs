//! CLI binary for edgequake-pdf2png.
//!
//! A thin shim over the library crate: `convert` maps flags to a
//! `RasterConfig` and writes files, `browse` drives a `Viewer` from stdin.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use edgequake_pdf2png::config::{preset_index, MAX_DPI};
use edgequake_pdf2png::pipeline::input;
use edgequake_pdf2png::{
    convert_document, write_archive, write_named_archive, write_page, write_pages, Backend,
    ProgressCallback, RasterConfig, RenderCache, RenderProgressCallback, RenderedDocument, Viewer,
    DPI_PRESETS,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, BufReader};
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
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

fn human_bytes(n: usize) -> String {
    match n {
        n if n >= 1 << 20 => format!("{:.1} MB", n as f64 / (1 << 20) as f64),
        n if n >= 1 << 10 => format!("{:.0} KB", n as f64 / (1 << 10) as f64),
        n => format!("{n} B"),
    }
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Live progress bar with one log line per rendered page.
struct CliProgressCallback {
    bar: ProgressBar,
    last_tick: Mutex<Instant>,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Opening PDF…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            last_tick: Mutex::new(Instant::now()),
        })
    }

    fn page_elapsed(&self) -> Duration {
        match self.last_tick.lock() {
            Ok(mut last) => {
                let elapsed = last.elapsed();
                *last = Instant::now();
                elapsed
            }
            Err(_) => Duration::ZERO,
        }
    }
}

impl RenderProgressCallback for CliProgressCallback {
    fn on_render_start(&self, total_pages: usize) {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} pages  \
             ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ");
        self.bar.set_length(total_pages as u64);
        self.bar.set_style(style);
        self.bar.set_prefix("Rendering");
        self.page_elapsed();
    }

    fn on_page_rendered(&self, page: usize, total: usize, png_len: usize) {
        let elapsed = self.page_elapsed();
        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {:>8}  {}",
            green("✓"),
            page,
            total,
            dim(&human_bytes(png_len)),
            dim(&format!("{:.1}s", elapsed.as_secs_f64())),
        ));
        self.bar.inc(1);
    }

    fn on_render_complete(&self, _total_pages: usize) {
        self.bar.finish_and_clear();
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Every page as report_page_001.png … into ./out
  pdf2png convert report.pdf -o out

  # One page at 600 DPI
  pdf2png convert report.pdf --page 3 --dpi 600

  # All pages zipped into report_all_pages.zip
  pdf2png convert report.pdf --zip

  # Same, with entries named report_page_001.png … instead of page_001.png
  pdf2png convert report.pdf --zip --named-entries

  # Render with poppler's pdftoppm instead of pdfium
  pdf2png convert report.pdf --backend poppler

  # Page-by-page viewer
  pdf2png browse https://arxiv.org/pdf/1706.03762

ENVIRONMENT VARIABLES:
  OUTPUT_DPI              Default resolution (falls back to 300 if invalid)
  PDF2PNG_BACKEND         pdfium (default) or poppler
  PDF2PNG_CACHE_CAPACITY  Rendered documents kept in memory (default 5)
  PDFIUM_LIB_PATH         Path to libpdfium (file or directory)
  POPPLER_PATH            Path to pdftoppm (file or directory)
  RUST_LOG                Overrides the log filter
"#;

const BROWSE_HELP: &str = "\
  n          next page
  p          previous page
  g N        go to page N
  d DPI      change resolution (resets to page 1)
  d          show the current resolution and presets
  s          save the current page
  z          save all pages as a ZIP
  Z          save all pages as a ZIP with named entries
  i          cache statistics
  q          quit";

/// Rasterise PDF pages to PNG images.
#[derive(Parser, Debug)]
#[command(
    name = "pdf2png",
    version,
    about = "Rasterise PDF files and URLs to PNG images",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "PDF2PNG_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "PDF2PNG_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render a PDF and write PNG pages or a ZIP archive.
    Convert {
        #[command(flatten)]
        render: RenderArgs,

        /// Write only this page (1-based).
        #[arg(long)]
        page: Option<usize>,

        /// Write one ZIP archive instead of individual pages.
        #[arg(long, conflicts_with = "page")]
        zip: bool,

        /// Name ZIP entries `{name}_page_NNN.png` instead of `page_NNN.png`.
        #[arg(long, requires = "zip")]
        named_entries: bool,

        /// Print a JSON summary of the render on stdout.
        #[arg(long)]
        json: bool,

        /// Disable progress bar.
        #[arg(long, env = "PDF2PNG_NO_PROGRESS")]
        no_progress: bool,
    },
    /// Page through a PDF interactively.
    Browse {
        #[command(flatten)]
        render: RenderArgs,
    },
}

/// Options shared by every subcommand.
#[derive(Args, Debug)]
struct RenderArgs {
    /// Local PDF file path or HTTP/HTTPS URL.
    input: String,

    /// Directory for written files.
    #[arg(short, long, env = "PDF2PNG_OUTPUT", default_value = ".")]
    output: PathBuf,

    /// Rendering DPI. Defaults to OUTPUT_DPI, else 300.
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..=MAX_DPI as i64))]
    dpi: Option<u32>,

    /// Rendering engine.
    #[arg(long, value_enum)]
    backend: Option<BackendArg>,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "PDF2PNG_PASSWORD")]
    password: Option<String>,

    /// Cap on the longest edge of a page, in pixels (pdfium only).
    #[arg(long)]
    max_pixels: Option<u32>,

    /// Path to libpdfium, or the directory containing it.
    #[arg(long)]
    pdfium_lib: Option<PathBuf>,

    /// Path to pdftoppm, or the directory containing it.
    #[arg(long)]
    poppler_path: Option<PathBuf>,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "PDF2PNG_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum BackendArg {
    Pdfium,
    Poppler,
}

impl From<BackendArg> for Backend {
    fn from(v: BackendArg) -> Self {
        match v {
            BackendArg::Pdfium => Backend::Pdfium,
            BackendArg::Poppler => Backend::Poppler,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env is the normal case.
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar and the browse prompt own the terminal; keep library
    // INFO logs out of their way unless asked for.
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || shows_own_output(&cli.command) {
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

    match cli.command {
        Command::Convert {
            render,
            page,
            zip,
            named_entries,
            json,
            no_progress,
        } => {
            let show_progress = !cli.quiet && !no_progress && !json;
            let progress = show_progress.then(|| CliProgressCallback::new() as ProgressCallback);
            let config = build_config(&render, progress)?;
            let archive = zip.then_some(if named_entries {
                ArchiveNaming::Named
            } else {
                ArchiveNaming::Plain
            });
            run_convert(&render, &config, page, archive, json, cli.quiet).await
        }
        Command::Browse { render } => {
            let config = build_config(&render, None)?;
            run_browse(&render, &config).await
        }
    }
}

fn shows_own_output(command: &Command) -> bool {
    match command {
        Command::Convert {
            json, no_progress, ..
        } => !*json && !*no_progress,
        Command::Browse { .. } => true,
    }
}

/// Environment defaults, then CLI flags on top.
fn build_config(args: &RenderArgs, progress: Option<ProgressCallback>) -> Result<RasterConfig> {
    let env = RasterConfig::from_env();
    let mut builder = env
        .into_builder()
        .download_timeout_secs(args.download_timeout);

    if let Some(dpi) = args.dpi {
        builder = builder.dpi(dpi);
    }
    if let Some(backend) = args.backend {
        builder = builder.backend(backend.into());
    }
    if let Some(ref pw) = args.password {
        builder = builder.password(pw.clone());
    }
    if let Some(px) = args.max_pixels {
        builder = builder.max_rendered_pixels(px);
    }
    if let Some(ref path) = args.pdfium_lib {
        builder = builder.pdfium_library_path(path.clone());
    }
    if let Some(ref path) = args.poppler_path {
        builder = builder.poppler_path(path.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }
    builder.build().context("Invalid configuration")
}

/// Entry names inside a written ZIP.
#[derive(Clone, Copy, Debug)]
enum ArchiveNaming {
    /// The cached archive: `page_NNN.png`.
    Plain,
    /// `{base}_page_NNN.png`.
    Named,
}

async fn run_convert(
    args: &RenderArgs,
    config: &RasterConfig,
    page: Option<usize>,
    archive: Option<ArchiveNaming>,
    json: bool,
    quiet: bool,
) -> Result<()> {
    let start = Instant::now();
    let document = input::resolve_input(&args.input, config.download_timeout_secs)
        .await
        .with_context(|| format!("Failed to read {}", args.input))?;
    let cache = RenderCache::from_config(config);
    let conversion = convert_document(document, &cache, config.dpi)
        .await
        .context("Rendering failed")?;
    let base = conversion.base_name();
    let out = args.output.as_path();

    let written = if let Some(naming) = archive {
        vec![save_zip(&conversion.rendered, base, out, naming).await?]
    } else if let Some(ordinal) = page {
        vec![write_page(&conversion.rendered, ordinal, base, out).await?]
    } else {
        write_pages(&conversion.rendered, base, out).await?
    };

    if json {
        let summary =
            serde_json::to_string_pretty(&conversion.summary()).context("Failed to serialise summary")?;
        println!("{summary}");
    } else if !quiet {
        eprintln!(
            "{}  {} pages @ {} DPI  {}ms  →  {}",
            green("✔"),
            conversion.page_count(),
            config.dpi,
            start.elapsed().as_millis(),
            bold(&describe_written(&written, out)),
        );
    }
    Ok(())
}

fn describe_written(written: &[PathBuf], dir: &Path) -> String {
    match written {
        [one] => one.display().to_string(),
        many => format!("{} files in {}", many.len(), dir.display()),
    }
}

async fn run_browse(args: &RenderArgs, config: &RasterConfig) -> Result<()> {
    let document = input::resolve_input(&args.input, config.download_timeout_secs)
        .await
        .with_context(|| format!("Failed to read {}", args.input))?;
    let cache = RenderCache::from_config(config);
    let mut viewer = Viewer::new(config.dpi);
    viewer.open(document);

    eprintln!("{}", dim(BROWSE_HELP));
    refresh(&mut viewer, &cache).await;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        eprint!("{} ", cyan("›"));
        let Some(line) = lines.next_line().await.context("Failed to read stdin")? else {
            break;
        };
        let mut words = line.split_whitespace();
        let command = words.next().unwrap_or("");
        let arg = words.next();

        match command {
            "" => show_status(&viewer),
            "n" => {
                if viewer.next() {
                    show_status(&viewer);
                } else {
                    eprintln!("Already on the last page");
                }
            }
            "p" => {
                if viewer.previous() {
                    show_status(&viewer);
                } else {
                    eprintln!("Already on the first page");
                }
            }
            "g" => match arg.and_then(|a| a.parse::<usize>().ok()) {
                Some(n) if viewer.go_to(n) => show_status(&viewer),
                _ => eprintln!("Usage: g N with N in 1..={}", viewer.page_count()),
            },
            "d" if arg.is_none() => {
                eprintln!("{} DPI  presets: {}", viewer.dpi(), preset_menu(viewer.dpi()));
            }
            "d" => match arg.and_then(|a| a.parse::<u32>().ok()) {
                Some(dpi) if (1..=MAX_DPI).contains(&dpi) => {
                    viewer.set_dpi(dpi);
                    refresh(&mut viewer, &cache).await;
                }
                _ => eprintln!(
                    "Usage: d DPI with DPI in 1..={}  presets: {}",
                    MAX_DPI,
                    preset_menu(viewer.dpi())
                ),
            },
            "s" => {
                if let Err(e) = save_current(&viewer, &args.output).await {
                    eprintln!("{} {:#}", red("✗"), e);
                }
            }
            "z" | "Z" => {
                let naming = if command == "Z" {
                    ArchiveNaming::Named
                } else {
                    ArchiveNaming::Plain
                };
                if let Err(e) = save_archive(&viewer, &args.output, naming).await {
                    eprintln!("{} {:#}", red("✗"), e);
                }
            }
            "i" => {
                let stats = cache.stats();
                eprintln!(
                    "engine {}  cached {}/{}  hits {}  misses {}  renders {}  evictions {}  failures {}",
                    cache.renderer_name(),
                    cache.len().await,
                    cache.capacity(),
                    stats.hits,
                    stats.misses,
                    stats.renders,
                    stats.evictions,
                    stats.failures
                );
            }
            "q" => break,
            "h" | "?" => eprintln!("{BROWSE_HELP}"),
            other => eprintln!("Unknown command '{other}' (h for help)"),
        }
    }
    Ok(())
}

async fn refresh(viewer: &mut Viewer, cache: &RenderCache) {
    if let Some(request) = viewer.request() {
        if !cache.contains(&request).await {
            eprintln!("{}", dim(&format!("Rendering at {} DPI…", request.dpi)));
        }
    }
    match viewer.refresh(cache).await {
        Some(Ok(_)) => show_status(viewer),
        Some(Err(e)) => eprintln!("{} {}", red("✗"), e),
        None => eprintln!("No document open"),
    }
}

fn show_status(viewer: &Viewer) {
    match viewer.current_page() {
        Some(page) => println!(
            "Page {}/{}  {} DPI  {}×{} px  {}",
            page.ordinal,
            viewer.page_count(),
            viewer.dpi(),
            page.width,
            page.height,
            human_bytes(page.png.len())
        ),
        None => match viewer.last_error() {
            Some(e) => eprintln!("{} {}", red("✗"), e),
            None => eprintln!("Nothing rendered"),
        },
    }
}

async fn save_current(viewer: &Viewer, dir: &Path) -> Result<()> {
    let (Some(result), Some(document)) = (viewer.result(), viewer.document()) else {
        bail!("Nothing rendered to save");
    };
    let path = write_page(result, viewer.page_ordinal(), document.base_name(), dir).await?;
    eprintln!("{} {}", green("✔"), path.display());
    Ok(())
}

async fn save_archive(viewer: &Viewer, dir: &Path, naming: ArchiveNaming) -> Result<()> {
    let (Some(result), Some(document)) = (viewer.result(), viewer.document()) else {
        bail!("Nothing rendered to save");
    };
    let path = save_zip(result, document.base_name(), dir, naming).await?;
    eprintln!("{} {}", green("✔"), path.display());
    Ok(())
}

async fn save_zip(
    rendered: &RenderedDocument,
    base: &str,
    dir: &Path,
    naming: ArchiveNaming,
) -> Result<PathBuf> {
    let path = match naming {
        ArchiveNaming::Plain => write_archive(rendered, base, dir).await?,
        ArchiveNaming::Named => write_named_archive(rendered, base, dir).await?,
    };
    Ok(path)
}

/// `150  [300]  600`, with the active preset bracketed.
fn preset_menu(dpi: u32) -> String {
    let active = preset_index(dpi);
    DPI_PRESETS
        .iter()
        .enumerate()
        .map(|(i, p)| {
            if Some(i) == active {
                bold(&format!("[{p}]"))
            } else {
                p.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join("  ")
}
