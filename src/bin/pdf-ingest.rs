//! CLI binary for pdf-ingest.
//!
//! Without a subcommand it shows the interactive task menu and loops until
//! the user exits. `pdf-ingest ingest` and `pdf-ingest debug-markdown` run a
//! single task and exit, non-zero when the task could not run.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use pdf_ingest::batch::{create_debugging_markdown, has_existing_markdown, ingest_pdfs, Collaborators};
use pdf_ingest::pipeline::chunk::TitleChunker;
use pdf_ingest::pipeline::partition::UnstructuredClient;
use pdf_ingest::pipeline::render::PdfiumEngine;
use pdf_ingest::pipeline::summarize::{VisionSummarizer, MODEL_ENV, PROVIDER_ENV};
use pdf_ingest::{
    BatchProgressCallback, BatchReport, NoopProgressCallback, OverwritePolicy, PartitionStrategy,
    PipelineConfig, Stage,
};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

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
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const SPINNER_TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// One bar per task, advanced once per finished document. Stage changes only
/// update the message; completions, skips and failures are printed above it.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new(task: &str) -> Self {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(SPINNER_TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix(task.to_string());
        bar.set_message("Scanning…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Self { bar }
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} documents  \
             ⏱ {elapsed_precise}  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(SPINNER_TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.reset_eta();
    }
}

impl BatchProgressCallback for CliProgressCallback {
    fn on_batch_start(&self, total_documents: usize) {
        self.activate_bar(total_documents);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Processing {total_documents} documents…"))
        ));
    }

    fn on_stage(&self, document: &str, stage: Stage) {
        self.bar.set_message(format!("{document}: {stage}"));
    }

    fn on_image_summarised(&self, document: &str, done: usize, total: usize) {
        self.bar
            .set_message(format!("{document}: image {done}/{total} described"));
    }

    fn on_image_skipped(&self, document: &str, element_id: &str) {
        self.bar.println(format!(
            "  {} {}  {}",
            yellow("!"),
            document,
            yellow(&format!("image {element_id} has no payload, left undescribed")),
        ));
    }

    fn on_document_skipped(&self, document: &str, stage: Stage) {
        self.bar.println(format!(
            "  {} {}  {}",
            dim("·"),
            document,
            dim(&format!("{stage} skipped, output exists")),
        ));
    }

    fn on_document_complete(&self, document: &str) {
        self.bar.println(format!("  {} {}", green("✓"), document));
        self.bar.inc(1);
    }

    fn on_document_error(&self, document: &str, error: &str) {
        // Keep long error chains on one line.
        let msg = if error.chars().count() > 100 {
            let cut: String = error.chars().take(99).collect();
            format!("{cut}\u{2026}")
        } else {
            error.to_string()
        };

        self.bar
            .println(format!("  {} {}  {}", red("✗"), document, red(&msg)));
        self.bar.inc(1);
    }

    fn on_batch_complete(&self, succeeded: usize, failed: usize) {
        self.bar.finish_and_clear();
        let total = succeeded + failed;

        if total == 0 {
            eprintln!("{} nothing to process", dim("·"));
        } else if failed == 0 {
            eprintln!(
                "{} {} documents processed successfully",
                green("✔"),
                bold(&succeeded.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} documents processed  ({} failed, see pdf_converter.log)",
                if failed == total { red("✘") } else { yellow("⚠") },
                bold(&succeeded.to_string()),
                total,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Interactive menu
  pdf-ingest --input-dir pdfs --output-dir out

  # Ingest without the menu
  pdf-ingest ingest --input-dir pdfs --output-dir out

  # Rebuild debug markdown from existing chunk files, replacing old output
  pdf-ingest debug-markdown --output-dir out --overwrite

  # Describe images with a local vision model
  pdf-ingest ingest --provider ollama --model llava

OUTPUT LAYOUT:
  <output-dir>/01_partitioned/<name>.json           partitioned elements
  <output-dir>/02_chunked/<name>.json               chunks by title
  <output-dir>/02_bounding_boxes/<name>-<p>-annotated.jpg
  <output-dir>/03_markdown/<name>.md                markdown from elements
  <output-dir>/04_markdown/<name>.md                collapsible debug markdown
  <output-dir>/05_output/<name>_output.json         flattened chunk export

ENVIRONMENT VARIABLES:
  UNSTRUCTURED_API_KEY    Partitioning API key (required for ingest)
  UNSTRUCTURED_URL        Partitioning endpoint
  OPENAI_API_KEY          OpenAI API key (image summaries)
  ANTHROPIC_API_KEY       Anthropic API key
  GEMINI_API_KEY          Google Gemini API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Override model ID
  PDFIUM_LIB_PATH         Path to libpdfium (file or directory)
  PDF_INGEST_LOG_FILE     Log file path (default: pdf_converter.log)

  Variables may also be placed in a .env file in the working directory.
"#;

/// Turn a directory of PDFs into paginated Markdown with annotated pages.
#[derive(Parser, Debug)]
#[command(
    name = "pdf-ingest",
    version,
    about = "Turn a directory of PDFs into paginated, navigable Markdown with annotated page imagery",
    long_about = "Partition PDFs with an Unstructured-compatible API, describe every image with a \
vision model, chunk by title, and rebuild each document as page-ordered Markdown plus one \
annotated JPEG per page.",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Directory containing the PDFs to ingest.
    #[arg(long, global = true, env = "PDF_INGEST_INPUT_DIR", default_value = "input")]
    input_dir: PathBuf,

    /// Root directory of the per-stage outputs.
    #[arg(long, global = true, env = "PDF_INGEST_OUTPUT_DIR", default_value = "output")]
    output_dir: PathBuf,

    /// Partitioning API key.
    #[arg(long, global = true, env = "UNSTRUCTURED_API_KEY", hide_env_values = true)]
    unstructured_api_key: Option<String>,

    /// Partitioning endpoint.
    #[arg(long, global = true, env = "UNSTRUCTURED_URL")]
    unstructured_url: Option<String>,

    /// Partitioning strategy.
    #[arg(long, global = true, env = "PDF_INGEST_STRATEGY", value_enum, default_value = "hi-res")]
    strategy: StrategyArg,

    /// Documents partitioned at once.
    #[arg(long, global = true, env = "PDF_INGEST_WORKERS", default_value_t = 3)]
    workers: usize,

    /// Soft upper bound on chunk length, in characters.
    #[arg(long, global = true, env = "PDF_INGEST_MAX_CHARACTERS", default_value_t = 1500)]
    max_characters: usize,

    /// Characters repeated between windows of a split element.
    #[arg(long, global = true, env = "PDF_INGEST_OVERLAP", default_value_t = 150)]
    overlap: usize,

    /// Vision model ID used for image summaries (default: gpt-4o).
    #[arg(long, global = true, env = MODEL_ENV)]
    model: Option<String>,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(long, global = true, env = PROVIDER_ENV)]
    provider: Option<String>,

    /// Retries per image on a failed summary call.
    #[arg(long, global = true, env = "PDF_INGEST_MAX_RETRIES", default_value_t = 0)]
    max_retries: u32,

    /// Path to a text file containing a custom image-summary prompt.
    #[arg(long, global = true, env = "PDF_INGEST_SYSTEM_PROMPT")]
    system_prompt: Option<PathBuf>,

    /// Polygon outline thickness (1–10).
    #[arg(long, global = true, env = "PDF_INGEST_LINE_THICKNESS", default_value_t = 2,
          value_parser = clap::value_parser!(u32).range(1..=10))]
    line_thickness: u32,

    /// TrueType font for the annotation legend.
    #[arg(long, global = true, env = "PDF_INGEST_LEGEND_FONT")]
    legend_font: Option<PathBuf>,

    /// Path to an existing libpdfium (file or directory).
    #[arg(long, global = true, env = "PDFIUM_LIB_PATH")]
    pdfium_lib_path: Option<PathBuf>,

    /// Replace existing markdown without asking.
    #[arg(long, global = true, env = "PDF_INGEST_OVERWRITE")]
    overwrite: bool,

    /// Disable progress bar.
    #[arg(long, global = true, env = "PDF_INGEST_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs on the console.
    #[arg(short, long, global = true, env = "PDF_INGEST_VERBOSE")]
    verbose: bool,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    /// Partition, enrich, chunk, export, render markdown and annotate every PDF.
    Ingest,
    /// Render collapsible debug markdown from existing chunk files.
    DebugMarkdown,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum StrategyArg {
    Fast,
    HiRes,
    Auto,
    OcrOnly,
}

impl From<StrategyArg> for PartitionStrategy {
    fn from(v: StrategyArg) -> Self {
        match v {
            StrategyArg::Fast => PartitionStrategy::Fast,
            StrategyArg::HiRes => PartitionStrategy::HiRes,
            StrategyArg::Auto => PartitionStrategy::Auto,
            StrategyArg::OcrOnly => PartitionStrategy::OcrOnly,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let _log_guard = init_tracing(cli.verbose);

    match cli.command {
        Some(command) => {
            let overwrite = if cli.overwrite {
                OverwritePolicy::Overwrite
            } else {
                OverwritePolicy::Skip
            };
            let report = run_task(&cli, command, overwrite).await?;
            print_fault_summary(&report);
            Ok(())
        }
        None => run_menu(&cli).await,
    }
}

// ── Logging setup ────────────────────────────────────────────────────────────

/// Console logging at `warn` (or `debug` with `--verbose`, or `RUST_LOG`),
/// plus an `info` file log. The returned guard flushes the file writer on drop.
fn init_tracing(verbose: bool) -> Option<WorkerGuard> {
    let default = if verbose { "debug" } else { "warn" };
    let console_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let console = fmt::layer()
        .with_writer(io::stderr)
        .with_target(false)
        .compact()
        .with_filter(console_filter);

    let path = std::env::var("PDF_INGEST_LOG_FILE").unwrap_or_else(|_| "pdf_converter.log".into());
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path);

    match file {
        Ok(file) => {
            let (writer, guard) = tracing_appender::non_blocking(file);
            let file_layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_filter(EnvFilter::new("info"));
            tracing_subscriber::registry()
                .with(console)
                .with(file_layer)
                .init();
            Some(guard)
        }
        Err(err) => {
            eprintln!("Failed to open log file {path}: {err}");
            tracing_subscriber::registry().with(console).init();
            None
        }
    }
}

// ── Tasks ────────────────────────────────────────────────────────────────────

fn build_config(cli: &Cli, overwrite: OverwritePolicy) -> Result<PipelineConfig> {
    let mut builder = PipelineConfig::builder()
        .input_dir(&cli.input_dir)
        .output_dir(&cli.output_dir)
        .strategy(cli.strategy.into())
        .partition_workers(cli.workers)
        .chunk_max_characters(cli.max_characters)
        .chunk_overlap(cli.overlap)
        .max_retries(cli.max_retries)
        .line_thickness(cli.line_thickness)
        .overwrite(overwrite);

    if let Some(ref key) = cli.unstructured_api_key {
        builder = builder.unstructured_api_key(key.as_str());
    }
    if let Some(ref url) = cli.unstructured_url {
        builder = builder.unstructured_url(url.as_str());
    }
    if let Some(ref model) = cli.model {
        builder = builder.model(model.as_str());
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider.as_str());
    }
    if let Some(ref path) = cli.system_prompt {
        let prompt = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read system prompt file: {}", path.display()))?;
        builder = builder.system_prompt(prompt);
    }
    if let Some(ref font) = cli.legend_font {
        builder = builder.legend_font(font);
    }
    if let Some(ref lib) = cli.pdfium_lib_path {
        builder = builder.pdfium_lib_path(lib);
    }

    Ok(builder.build()?)
}

async fn run_task(cli: &Cli, command: Command, overwrite: OverwritePolicy) -> Result<BatchReport> {
    let config = build_config(cli, overwrite)?;
    tracing::debug!(?config, ?command, "starting task");

    let progress: Box<dyn BatchProgressCallback> = if cli.no_progress {
        Box::new(NoopProgressCallback)
    } else {
        let label = match command {
            Command::Ingest => "Ingesting",
            Command::DebugMarkdown => "Debug markdown",
        };
        Box::new(CliProgressCallback::new(label))
    };

    let report = match command {
        Command::Ingest => {
            config.check_input_dir()?;
            let partitioner = UnstructuredClient::new(&config)?;
            let summarizer =
                VisionSummarizer::from_config(&config).context("Failed to set up image summaries")?;
            let chunker = TitleChunker::from_config(&config);
            let engine = PdfiumEngine::bind(config.pdfium_lib_path.as_deref(), config.max_rendered_pixels)
                .context("Failed to load the pdfium library")?;

            let collaborators = Collaborators {
                partitioner: &partitioner,
                summarizer: &summarizer,
                chunker: &chunker,
                rasterizers: Arc::new(engine),
            };
            ingest_pdfs(&config, collaborators, progress.as_ref()).await?
        }
        Command::DebugMarkdown => create_debugging_markdown(&config, progress.as_ref())?,
    };
    Ok(report)
}

fn print_fault_summary(report: &BatchReport) {
    let faults = report.total_faults();
    if faults > 0 {
        eprintln!(
            "{} {} element faults recovered with fallback rendering",
            dim("·"),
            faults
        );
    }
}

// ── Interactive menu ─────────────────────────────────────────────────────────

async fn run_menu(cli: &Cli) -> Result<()> {
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();

    loop {
        println!();
        println!("{}", bold("Choose a task:"));
        println!("  1. Ingest PDFs and create JSON & Annotations");
        println!("  2. Create Debugging Markdowns from partition JSONs");
        println!("  3. Exit");
        print!("{} ", cyan("›"));
        io::stdout().flush().context("Failed to flush stdout")?;

        let Some(line) = lines.next() else {
            return Ok(());
        };
        let command = match line.context("Failed to read from stdin")?.trim() {
            "1" => Command::Ingest,
            "2" => Command::DebugMarkdown,
            "3" => return Ok(()),
            other => {
                println!("{}", red(&format!("Invalid choice: {other:?}. Enter 1, 2 or 3.")));
                continue;
            }
        };

        let overwrite = match overwrite_policy(cli, &mut lines) {
            Ok(policy) => policy,
            Err(e) => {
                println!("{}", red(&format!("{e:#}")));
                continue;
            }
        };

        match run_task(cli, command, overwrite).await {
            Ok(report) => print_fault_summary(&report),
            Err(e) => println!("{}", red(&format!("{e:#}"))),
        }
    }
}

/// Ask before replacing markdown unless `--overwrite` settled it already.
fn overwrite_policy(
    cli: &Cli,
    lines: &mut impl Iterator<Item = io::Result<String>>,
) -> Result<OverwritePolicy> {
    if cli.overwrite {
        return Ok(OverwritePolicy::Overwrite);
    }
    let probe = build_config(cli, OverwritePolicy::Skip)?;
    if !has_existing_markdown(&probe) {
        return Ok(OverwritePolicy::Skip);
    }

    print!("Overwrite existing markdown files? [y/N] ");
    io::stdout().flush().context("Failed to flush stdout")?;
    let answer = match lines.next() {
        Some(line) => line.context("Failed to read from stdin")?,
        None => String::new(),
    };
    Ok(parse_yes(&answer))
}

fn parse_yes(answer: &str) -> OverwritePolicy {
    match answer.trim().to_ascii_lowercase().as_str() {
        "y" | "yes" => OverwritePolicy::Overwrite,
        _ => OverwritePolicy::Skip,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use std::ffi::OsStr;

    #[test]
    fn provider_flags_read_the_library_variables() {
        let cmd = Cli::command();
        let env_of = |id: &str| {
            cmd.get_arguments()
                .find(|a| a.get_id().as_str() == id)
                .and_then(|a| a.get_env())
                .map(OsStr::to_os_string)
        };
        assert_eq!(env_of("provider").as_deref(), Some(OsStr::new("EDGEQUAKE_LLM_PROVIDER")));
        assert_eq!(env_of("model").as_deref(), Some(OsStr::new(MODEL_ENV)));
        assert!(AFTER_HELP.contains(PROVIDER_ENV));
    }

    #[test]
    fn only_yes_overwrites() {
        assert_eq!(parse_yes("y"), OverwritePolicy::Overwrite);
        assert_eq!(parse_yes(" YES\n"), OverwritePolicy::Overwrite);
        assert_eq!(parse_yes(""), OverwritePolicy::Skip);
        assert_eq!(parse_yes("n"), OverwritePolicy::Skip);
    }

    #[test]
    fn flags_map_onto_config() {
        let cli = Cli::parse_from([
            "pdf-ingest",
            "ingest",
            "--input-dir",
            "pdfs",
            "--max-characters",
            "800",
            "--overlap",
            "80",
            "--strategy",
            "fast",
        ]);
        assert_eq!(cli.command, Some(Command::Ingest));
        let config = build_config(&cli, OverwritePolicy::Skip).unwrap();
        assert_eq!(config.input_dir, PathBuf::from("pdfs"));
        assert_eq!(config.chunk_max_characters, 800);
        assert_eq!(config.chunk_overlap, 80);
        assert_eq!(config.strategy, PartitionStrategy::Fast);
    }

    #[test]
    fn invalid_overlap_is_a_config_error() {
        let cli = Cli::parse_from(["pdf-ingest", "--max-characters", "100", "--overlap", "100"]);
        assert!(build_config(&cli, OverwritePolicy::Skip).is_err());
    }
}
