//! CLI binary for autonotes.
//!
//! A thin shim over the library crate that maps CLI flags to `NotesConfig`
//! and a `ProcessRequest`, then saves the download or prints the preview.

use anyhow::{bail, Context, Result};
use autonotes::pipeline::input::resolve_image;
use autonotes::request::preview_flag;
use autonotes::{
    CleanupOutcome, NotesConfig, OcrBackend, ProcessObserver, ProcessOutcome, ProcessRequest,
    Processor, RequestState,
};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}

// ── CLI observer using indicatif ─────────────────────────────────────────────

/// Terminal observer: a single spinner whose message follows the request
/// state, plus a log line per finished stage.
struct CliObserver {
    bar: ProgressBar,
    started: Instant,
}

impl CliObserver {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.set_prefix("autonotes");
        bar.set_message("Starting…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            started: Instant::now(),
        })
    }

    fn elapsed(&self) -> String {
        dim(&format!("{:.1}s", self.started.elapsed().as_secs_f64()))
    }
}

impl ProcessObserver for CliObserver {
    fn on_state(&self, state: RequestState) {
        let msg = match state {
            RequestState::Received => "Validating request…",
            RequestState::SourcingText => "Reading text…",
            RequestState::Formatting => "Formatting notes…",
            RequestState::GeneratingArtifact => "Writing document…",
            RequestState::Streaming => "Saving…",
            RequestState::PreviewReturn | RequestState::CleanedUp | RequestState::Failed => {
                self.bar.finish_and_clear();
                return;
            }
        };
        self.bar.set_message(msg);
    }

    fn on_text_sourced(&self, chars: usize, from_ocr: bool) {
        let source = if from_ocr { "OCR" } else { "markdown input" };
        self.bar.println(format!(
            "  {} Text from {}  {}  {}",
            green("✓"),
            source,
            dim(&format!("{chars:>6} chars")),
            self.elapsed()
        ));
    }

    fn on_formatted(&self, chars: usize) {
        self.bar.println(format!(
            "  {} Formatted        {}  {}",
            green("✓"),
            dim(&format!("{chars:>6} chars")),
            self.elapsed()
        ));
    }

    fn on_cleanup(&self, outcome: &CleanupOutcome) {
        if let CleanupOutcome::Failed(warning) = outcome {
            self.bar.println(format!("  {} {}", yellow("⚠"), warning));
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Photo of a whiteboard → notes.docx next to it
  autonotes board.jpg

  # Markdown output with an explicit name
  autonotes board.jpg --format md -o lecture-3.md

  # Preview the formatted markdown as JSON, write nothing
  autonotes board.jpg --preview

  # Reformat existing notes without OCR
  autonotes --markdown rough-notes.md --format docx

  # Handwriting: let a vision model do the OCR
  autonotes --ocr vision --model gpt-4.1-mini page.jpg

  # Image from a URL
  autonotes https://example.com/slides/week2.png

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  GEMINI_API_KEY          Google Gemini API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Override model ID

SETUP:
  1. Install tesseract (apt install tesseract-ocr / brew install tesseract)
  2. Set API key:     export OPENAI_API_KEY=sk-...
  3. Run:             autonotes board.jpg
"#;

/// Turn photos of lecture material into formatted notes.
#[derive(Parser, Debug)]
#[command(
    name = "autonotes",
    version,
    about = "Turn photos of lecture material into formatted Markdown or Word notes",
    long_about = "OCR an image of lecture material (slides, whiteboards, handwritten pages), \
format the text into Markdown notes with an LLM, and save it as .md or .docx. \
Supports OpenAI, Anthropic, Google Gemini, and any OpenAI-compatible endpoint (Ollama, vLLM, …).",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local image path or HTTP/HTTPS URL.
    input: Option<String>,

    /// Format this markdown file instead of OCR-ing an image.
    #[arg(long, value_name = "FILE")]
    markdown: Option<PathBuf>,

    /// Output format: docx or md.
    #[arg(short, long, env = "AUTONOTES_FORMAT", default_value = "docx")]
    format: String,

    /// Print the formatted markdown as JSON instead of writing a file.
    /// Also takes form-style values: --preview=yes, AUTONOTES_PREVIEW=1.
    #[arg(
        long,
        env = "AUTONOTES_PREVIEW",
        value_name = "BOOL",
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "true"
    )]
    preview: Option<String>,

    /// Where to save the document. Default: the generated name in the
    /// current directory, with `.formatted` added if that file exists.
    #[arg(short, long, env = "AUTONOTES_OUTPUT")]
    output: Option<PathBuf>,

    /// OCR engine.
    #[arg(long, env = "AUTONOTES_OCR", value_enum, default_value = "tesseract")]
    ocr: OcrArg,

    /// Tesseract language code(s), e.g. eng or eng+deu.
    #[arg(long, env = "AUTONOTES_LANG", default_value = "eng")]
    lang: String,

    /// Path to the tesseract executable.
    #[arg(long, env = "TESSERACT_CMD", default_value = "tesseract")]
    tesseract_cmd: PathBuf,

    /// LLM model ID (e.g. gpt-4.1-nano, gpt-4.1-mini, qwen3:0.6b).
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(long, env = "EDGEQUAKE_PROVIDER")]
    provider: Option<String>,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "AUTONOTES_TEMPERATURE", default_value_t = 0.1)]
    temperature: f32,

    /// Max LLM output tokens.
    #[arg(long, env = "AUTONOTES_MAX_TOKENS", default_value_t = 4096)]
    max_tokens: usize,

    /// Path to a text file containing a custom system prompt.
    #[arg(long, env = "AUTONOTES_SYSTEM_PROMPT")]
    system_prompt: Option<PathBuf>,

    /// LLM call timeout in seconds.
    #[arg(long, env = "AUTONOTES_API_TIMEOUT", default_value_t = 60)]
    api_timeout: u64,

    /// OCR timeout in seconds.
    #[arg(long, env = "AUTONOTES_OCR_TIMEOUT", default_value_t = 120)]
    ocr_timeout: u64,

    /// HTTP download timeout in seconds for URL inputs.
    #[arg(long, env = "AUTONOTES_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Directory for per-request temporary files.
    #[arg(long, env = "AUTONOTES_TEMP_DIR")]
    temp_dir: Option<PathBuf>,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "AUTONOTES_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "AUTONOTES_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Debug)]
enum OcrArg {
    Tesseract,
    Vision,
}

impl From<OcrArg> for OcrBackend {
    fn from(v: OcrArg) -> Self {
        match v {
            OcrArg::Tesseract => OcrBackend::Tesseract,
            OcrArg::Vision => OcrBackend::Vision,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner gives all the feedback that matters; library INFO logs
    // only show up when it is off.
    let show_progress = !cli.quiet && !cli.verbose;
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

    if cli.input.is_none() && cli.markdown.is_none() {
        bail!("Provide an image path/URL or --markdown FILE");
    }

    let observer: Option<Arc<dyn ProcessObserver>> = if show_progress {
        Some(CliObserver::new() as Arc<dyn ProcessObserver>)
    } else {
        None
    };

    let config = build_config(&cli, observer).await?;
    let request = build_request(&cli, &config).await?;
    let processor = Processor::from_config(config).context("Failed to set up the LLM provider")?;

    // ── Run ──────────────────────────────────────────────────────────────
    let start = Instant::now();
    let outcome = processor
        .process(request)
        .await
        .map_err(|e| anyhow::anyhow!(e.to_error_body().error))?;

    match outcome {
        ProcessOutcome::Preview(preview) => {
            let json =
                serde_json::to_string_pretty(&preview).context("Failed to serialise preview")?;
            println!("{json}");
        }
        ProcessOutcome::Download(download) => {
            let dest = cli
                .output
                .clone()
                .unwrap_or_else(|| default_destination(Path::new(""), &download.filename));
            let mime = download.mime_type;
            let written = download
                .save_to(&dest)
                .await
                .with_context(|| format!("Failed to save {}", dest.display()))?;

            if !cli.quiet {
                eprintln!(
                    "{}  {}  {}  {}ms  →  {}",
                    green("✔"),
                    dim(mime),
                    dim(&format!("{written} bytes")),
                    start.elapsed().as_millis(),
                    bold(&dest.display().to_string()),
                );
            }
        }
    }

    Ok(())
}

/// Map CLI args to `NotesConfig`.
async fn build_config(cli: &Cli, observer: Option<Arc<dyn ProcessObserver>>) -> Result<NotesConfig> {
    let mut builder = NotesConfig::builder()
        .temperature(cli.temperature)
        .max_tokens(cli.max_tokens)
        .api_timeout_secs(cli.api_timeout)
        .ocr_backend(cli.ocr.clone().into())
        .ocr_language(cli.lang.clone())
        .tesseract_cmd(cli.tesseract_cmd.clone())
        .ocr_timeout_secs(cli.ocr_timeout)
        .download_timeout_secs(cli.download_timeout);

    if let Some(ref path) = cli.system_prompt {
        let prompt = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read system prompt from {:?}", path))?;
        builder = builder.system_prompt(prompt);
    }
    if let Some(ref model) = cli.model {
        builder = builder.model(model.clone());
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider.clone());
    }
    if let Some(ref dir) = cli.temp_dir {
        builder = builder.temp_root(dir.clone());
    }
    if let Some(obs) = observer {
        builder = builder.observer(obs);
    }

    builder.build().context("Invalid configuration")
}

/// Map CLI args to a `ProcessRequest`, reading or downloading the inputs.
async fn build_request(cli: &Cli, config: &NotesConfig) -> Result<ProcessRequest> {
    let mut request = ProcessRequest::default()
        .output_format(cli.format.clone())
        .preview(cli.preview.as_deref().is_some_and(preview_flag));

    if let Some(ref input) = cli.input {
        let upload = resolve_image(input, config.download_timeout_secs, config.max_image_bytes)
            .await
            .with_context(|| format!("Failed to load image '{input}'"))?;
        request.image_bytes = Some(upload.bytes);
        request = request.filename(upload.filename);
    }

    if let Some(ref path) = cli.markdown {
        let markdown = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read markdown from {:?}", path))?;
        if request.filename.is_empty() {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            request = request.filename(name);
        }
        request = request.markdown_content(markdown);
    }

    Ok(request)
}

/// Default save path for a download: `filename` inside `dir`, unless that
/// file already exists (typically the `--markdown` input itself), in which
/// case `<stem>.formatted.<ext>`, then `<stem>.formatted-2.<ext>`, and so on.
fn default_destination(dir: &Path, filename: &str) -> PathBuf {
    let candidate = dir.join(filename);
    if !candidate.exists() {
        return candidate;
    }

    let name = Path::new(filename);
    let stem = name
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| filename.to_string());
    let ext = name
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();

    let mut n = 1u32;
    loop {
        let suffix = if n == 1 { String::new() } else { format!("-{n}") };
        let candidate = dir.join(format!("{stem}.formatted{suffix}{ext}"));
        if !candidate.exists() {
            return candidate;
        }
        n += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn fresh_name_is_used_as_is() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(
            default_destination(dir.path(), "board.docx"),
            dir.path().join("board.docx")
        );
    }

    #[test]
    fn markdown_input_is_never_the_default_destination() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("rough-notes.md"), "# draft").unwrap();

        let dest = default_destination(dir.path(), "rough-notes.md");
        assert_eq!(dest, dir.path().join("rough-notes.formatted.md"));
        assert_eq!(
            std::fs::read_to_string(dir.path().join("rough-notes.md")).unwrap(),
            "# draft"
        );
    }

    #[test]
    fn repeated_runs_count_up() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("week2.md"), "").unwrap();
        std::fs::write(dir.path().join("week2.formatted.md"), "").unwrap();

        assert_eq!(
            default_destination(dir.path(), "week2.md"),
            dir.path().join("week2.formatted-2.md")
        );
    }

    #[test]
    fn preview_accepts_bare_and_form_values() {
        let bare = Cli::try_parse_from(["autonotes", "board.jpg", "--preview"]).unwrap();
        assert!(bare.preview.as_deref().is_some_and(preview_flag));

        let off = Cli::try_parse_from(["autonotes", "--preview=no", "board.jpg"]).unwrap();
        assert!(!off.preview.as_deref().is_some_and(preview_flag));
        assert_eq!(off.input.as_deref(), Some("board.jpg"));
    }
}
