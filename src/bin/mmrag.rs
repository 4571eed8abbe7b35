//! CLI binary for multimodal-rag-demo.
//!
//! A terminal stand-in for the demo page: collects the API key, PDF and
//! page range, runs Process once, then answers queries either one-shot
//! (`--query`) or interactively from stdin.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use multimodal_rag_demo::config::{validate_top_k, DEFAULT_ENDPOINT};
use multimodal_rag_demo::{
    Action, ActionProgressCallback, DemoConfig, HttpRagEngineFactory, PageRange, Presenter,
    ProcessRequest, ProgressCallback, SearchMode, SearchRequest, Session, Upload, TOP_K_MAX,
    TOP_K_MIN,
};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

// ── Busy indicator ───────────────────────────────────────────────────────────

/// Spinner shown while Process or Search runs. A new bar per action, since a
/// finished indicatif bar does not restart cleanly.
struct SpinnerCallback {
    bar: Mutex<Option<ProgressBar>>,
}

impl SpinnerCallback {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            bar: Mutex::new(None),
        })
    }

    fn clear(&self) {
        if let Ok(mut slot) = self.bar.lock() {
            if let Some(bar) = slot.take() {
                bar.finish_and_clear();
            }
        }
    }
}

impl ActionProgressCallback for SpinnerCallback {
    fn on_action_start(&self, action: Action) {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {msg}  {elapsed:.dim}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.set_message(action.busy_message());
        bar.enable_steady_tick(Duration::from_millis(80));
        if let Ok(mut slot) = self.bar.lock() {
            if let Some(old) = slot.replace(bar) {
                old.finish_and_clear();
            }
        }
    }

    fn on_action_complete(&self, _action: Action, _elapsed_ms: u64) {
        self.clear();
    }

    fn on_action_error(&self, _action: Action, _error: &str) {
        self.clear();
    }
}

const COMMANDS_HELP: &str = "\
  :mode raw|qa    switch between Raw Search and QA Search
  :k N            number of results to retrieve (1-10)
  :status         show the processed file and current settings
  :help           show this list
  :quit           leave";

const AFTER_HELP: &str = r#"EXAMPLES:
  # Process pages 1-11 and ask questions interactively
  mmrag report.pdf

  # One-shot raw retrieval of the top 5 records
  mmrag --start-page 3 --end-page 8 -k 5 --query "quarterly revenue" report.pdf

  # Question answering, saving retrieved images
  mmrag --mode qa --image-dir ./images --query "What does figure 2 show?" report.pdf

  # JSON output
  mmrag --json --query "net income" report.pdf > results.json

Without --query, queries are read from stdin; type :help there for commands.

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY   API key passed through to the RAG service
  MMRAG_ENDPOINT   RAG service base URL (default http://127.0.0.1:8000)
  MMRAG_MODE       raw or qa
  MMRAG_TOP_K      default number of results
  MMRAG_IMAGE_DIR  directory to save retrieved images into
  RUST_LOG         tracing filter, overrides -v / -q
"#;

/// Upload a PDF to a multimodal RAG service and query it.
#[derive(Parser, Debug)]
#[command(
    name = "mmrag",
    version,
    about = "Upload a PDF to a multimodal RAG service and query it",
    long_about = "Ingest a PDF (text, tables and images) into a multimodal RAG service, then \
query it with raw retrieval or question answering. Retrieved tables are shown as aligned \
rows and images can be saved to disk.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// PDF file to upload.
    pdf: PathBuf,

    /// API key passed through to the RAG service.
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// RAG service base URL.
    #[arg(long, env = "MMRAG_ENDPOINT", default_value = DEFAULT_ENDPOINT)]
    endpoint: String,

    /// First page to ingest (1-indexed).
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u64).range(1..))]
    start_page: u64,

    /// Last page to ingest. Default: start page + 10.
    #[arg(long)]
    end_page: Option<u64>,

    /// Search mode: raw or qa.
    #[arg(long, env = "MMRAG_MODE", value_enum, default_value = "raw")]
    mode: ModeArg,

    /// Number of results to retrieve (1-10).
    #[arg(short = 'k', long, env = "MMRAG_TOP_K", default_value_t = 3,
          value_parser = clap::value_parser!(u64).range(TOP_K_MIN as u64..=TOP_K_MAX as u64))]
    top_k: u64,

    /// Run a single query and exit instead of reading queries from stdin.
    #[arg(long)]
    query: Option<String>,

    /// Save retrieved images into this directory.
    #[arg(long, env = "MMRAG_IMAGE_DIR")]
    image_dir: Option<PathBuf>,

    /// Per-request timeout in seconds.
    #[arg(long, env = "MMRAG_TIMEOUT", default_value_t = 600)]
    timeout: u64,

    /// Print search results as JSON.
    #[arg(long)]
    json: bool,

    /// Disable the busy spinner.
    #[arg(long, env = "MMRAG_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long)]
    verbose: bool,

    /// Suppress everything except results and errors.
    #[arg(short, long)]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum ModeArg {
    Raw,
    Qa,
}

impl From<ModeArg> for SearchMode {
    fn from(v: ModeArg) -> Self {
        match v {
            ModeArg::Raw => SearchMode::Raw,
            ModeArg::Qa => SearchMode::Qa,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Keep library INFO logs out of the way of the spinner.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
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

    // ── Input gating ─────────────────────────────────────────────────────
    let api_key = match cli.api_key.as_deref().map(str::trim) {
        Some(k) if !k.is_empty() => k.to_string(),
        _ => {
            eprintln!(
                "{} Please enter your OpenAI API key to proceed (--api-key or OPENAI_API_KEY).",
                yellow("⚠")
            );
            return Ok(());
        }
    };

    let start = cli.start_page as usize;
    let range = match cli.end_page {
        Some(end) => PageRange::new(start, end as usize),
        None => PageRange::with_default_end(start),
    }
    .context("Invalid page range")?;

    // ── Session setup ────────────────────────────────────────────────────
    let spinner = if show_progress {
        Some(SpinnerCallback::new())
    } else {
        None
    };

    let mut builder = DemoConfig::builder()
        .endpoint(cli.endpoint.clone())
        .request_timeout_secs(cli.timeout)
        .default_top_k(cli.top_k as usize);
    if let Some(ref cb) = spinner {
        builder = builder.progress_callback(Arc::clone(cb) as ProgressCallback);
    }
    let config = builder.build().context("Invalid configuration")?;

    let factory = HttpRagEngineFactory::new(&config).context("Failed to set up RAG client")?;
    let mut session = Session::new(config);
    let presenter = Presenter::new(cli.image_dir.clone());

    // ── Process ──────────────────────────────────────────────────────────
    let upload = Upload::from_path(&cli.pdf)
        .await
        .context("Failed to read PDF")?;
    let request = ProcessRequest::new(api_key, upload, range)?;

    match session.process(&factory, request).await {
        Ok(report) => {
            if !cli.quiet {
                eprintln!(
                    "{} PDF processed successfully!  {}",
                    green("✔"),
                    dim(&format!(
                        "pages {}  {}ms",
                        report.page_range, report.elapsed_ms
                    ))
                );
            }
        }
        Err(e) => {
            eprintln!("{} Error processing PDF: {e}", red("✘"));
            std::process::exit(1);
        }
    }

    if !cli.quiet {
        if let Some(name) = session.processed_file() {
            eprintln!("Currently processed file: {}", bold(name));
        }
    }

    // ── Search ───────────────────────────────────────────────────────────
    let mut mode: SearchMode = cli.mode.into();
    let mut top_k = cli.top_k as usize;

    if let Some(ref query) = cli.query {
        if !run_search(&session, &presenter, query, top_k, mode, cli.json).await? {
            std::process::exit(1);
        }
        return Ok(());
    }

    if !cli.quiet {
        eprintln!(
            "{}",
            dim("Enter a query, or :help for commands. Ctrl-D to quit.")
        );
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        prompt(mode, top_k)?;
        let Some(line) = lines.next_line().await.context("Failed to read stdin")? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(cmd) = line.strip_prefix(':') {
            match handle_command(cmd, &mut mode, &mut top_k, &session) {
                CommandOutcome::Continue => continue,
                CommandOutcome::Quit => break,
            }
        }

        run_search(&session, &presenter, line, top_k, mode, cli.json).await?;
    }

    Ok(())
}

fn prompt(mode: SearchMode, top_k: usize) -> Result<()> {
    let mut err = io::stderr().lock();
    write!(err, "{} ", bold(&format!("[{} k={}]>", mode.label(), top_k)))?;
    err.flush()?;
    Ok(())
}

enum CommandOutcome {
    Continue,
    Quit,
}

fn handle_command(
    cmd: &str,
    mode: &mut SearchMode,
    top_k: &mut usize,
    session: &Session,
) -> CommandOutcome {
    let mut parts = cmd.split_whitespace();
    match (parts.next(), parts.next()) {
        (Some("q" | "quit" | "exit"), _) => return CommandOutcome::Quit,
        (Some("mode"), Some(m)) => match m.parse::<SearchMode>() {
            Ok(m) => *mode = m,
            Err(e) => eprintln!("{} {e}", red("✘")),
        },
        (Some("k"), Some(n)) => match n.parse::<usize>() {
            Ok(n) => match validate_top_k(n) {
                Ok(n) => *top_k = n,
                Err(e) => eprintln!("{} {e}", red("✘")),
            },
            Err(_) => eprintln!("{} ':k' expects a number, got '{n}'", red("✘")),
        },
        (Some("status"), _) => {
            eprintln!(
                "file: {}  mode: {}  k: {}",
                session.processed_file().unwrap_or("-"),
                mode.label(),
                top_k
            );
        }
        (Some("help"), _) => {
            eprintln!("{COMMANDS_HELP}");
        }
        _ => eprintln!("{} unknown command ':{cmd}' (try :help)", red("✘")),
    }
    CommandOutcome::Continue
}

/// Run one search and print it. Returns `false` when the search failed.
async fn run_search(
    session: &Session,
    presenter: &Presenter,
    query: &str,
    top_k: usize,
    mode: SearchMode,
    json: bool,
) -> Result<bool> {
    let request = match SearchRequest::new(query, top_k, mode) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("{} {e}", red("✘"));
            return Ok(false);
        }
    };

    let view = match session.search(&request).await {
        Ok(v) => v,
        Err(e) => {
            eprintln!("{} Error during search: {e}", red("✘"));
            return Ok(false);
        }
    };

    let out = if json {
        match serde_json::to_string_pretty(&view) {
            Ok(s) => s,
            Err(e) => {
                eprintln!("{} Error during search: {e}", red("✘"));
                return Ok(false);
            }
        }
    } else {
        presenter.format_view(&view)
    };

    let stdout = io::stdout();
    let mut handle = stdout.lock();
    handle
        .write_all(out.as_bytes())
        .context("Failed to write to stdout")?;
    if !out.ends_with('\n') {
        handle.write_all(b"\n").ok();
    }
    Ok(true)
}
