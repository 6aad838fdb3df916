//! CLI binary for scanreport.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `AnalysisConfig`, runs one analysis and writes the Word report.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use scanreport::pipeline::input::has_image_extension;
use scanreport::{
    write_document, AnalysisConfig, AnalysisProgressCallback, ImageAsset, ProgressCallback,
    RequestOrchestrator, ScanReportError, Session, DEFAULT_FILENAME,
};
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;
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

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Spinner shown while the request is out.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        Self::with_bar(ProgressBar::new_spinner())
    }

    fn with_bar(bar: ProgressBar) -> Arc<Self> {
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  {elapsed:.dim}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.set_prefix("Preparing");
        bar.set_message("Contacting the model…");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }

    /// Stop the spinner before an error is printed.
    fn abandon(&self) {
        if !self.bar.is_finished() {
            self.bar.finish_and_clear();
        }
    }
}

/// Clear `spinner` if `result` is an error, so the message is not drawn over it.
fn clear_on_err<T, E>(spinner: Option<&CliProgressCallback>, result: Result<T, E>) -> Result<T, E> {
    if let (Some(spinner), Err(_)) = (spinner, &result) {
        spinner.abandon();
    }
    result
}

impl AnalysisProgressCallback for CliProgressCallback {
    fn on_submit(&self, _fingerprint: &str, image_bytes: usize) {
        self.bar.set_prefix("Analyzing");
        self.bar.set_message(format!("{} KiB image", image_bytes.div_ceil(1024)));
    }

    fn on_cache_hit(&self, _fingerprint: &str) {
        self.bar.finish_and_clear();
        eprintln!("{} using cached analysis", green("✓"));
    }

    fn on_complete(&self, text_len: usize, duration_ms: u64) {
        self.bar.finish_and_clear();
        eprintln!(
            "{} report received  {}",
            green("✓"),
            dim(&format!("{text_len} chars, {:.1}s", duration_ms as f64 / 1000.0))
        );
    }

    fn on_error(&self, error: &str) {
        self.bar.finish_and_clear();
        let msg = if error.chars().count() > 120 {
            let cut: String = error.chars().take(119).collect();
            format!("{cut}\u{2026}")
        } else {
            error.to_string()
        };
        eprintln!("{} {}", red("✗"), red(&msg));
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Analyse a scan and write Medical_Report.docx
  scanreport ecg.png

  # Choose the output file
  scanreport chest_xray.jpg -o reports/xray.docx

  # Print the report only, no document
  scanreport ecg.png --no-export

  # Structured JSON (result + blocks) on stdout
  scanreport ecg.png --json --no-export

  # Use a different model and a longer timeout
  scanreport --model gemini-1.5-flash --timeout 120 ecg.png

ENVIRONMENT VARIABLES:
  GEMINI_API_KEY        API key (required)
  SCANREPORT_MODEL      Override model ID
  SCANREPORT_ENDPOINT   Override API base URL

The generated report is not a diagnosis. Always consult a qualified medical
professional.
"#;

/// Analyse medical scan images with a vision LLM and export a Word report.
#[derive(Parser, Debug)]
#[command(
    name = "scanreport",
    version,
    about = "Analyse medical scan images with a vision LLM and export a Word report",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// PNG or JPEG scan to analyse.
    image: PathBuf,

    /// Where to write the Word report.
    #[arg(short, long, env = "SCANREPORT_OUTPUT", default_value = DEFAULT_FILENAME)]
    output: PathBuf,

    /// API key for the generative API.
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Model ID (e.g. gemini-1.5-pro, gemini-1.5-flash).
    #[arg(long, env = "SCANREPORT_MODEL")]
    model: Option<String>,

    /// API base URL.
    #[arg(long, env = "SCANREPORT_ENDPOINT")]
    endpoint: Option<String>,

    /// Request timeout in seconds.
    #[arg(long, env = "SCANREPORT_TIMEOUT", default_value_t = 60)]
    timeout: u64,

    /// Sampling temperature (0.0–2.0).
    #[arg(long, env = "SCANREPORT_TEMPERATURE", default_value_t = 1.0)]
    temperature: f32,

    /// Max output tokens.
    #[arg(long, env = "SCANREPORT_MAX_TOKENS", default_value_t = 8192)]
    max_tokens: u32,

    /// Path to a text file with a custom system instruction.
    #[arg(long)]
    system_prompt: Option<PathBuf>,

    /// Path to a text file with a custom user prompt (`{date}` is filled in).
    #[arg(long)]
    prompt: Option<PathBuf>,

    /// Image width in the exported document, in inches.
    #[arg(long, default_value_t = 6.0)]
    image_width: f32,

    /// Strip an outer code fence and invisible characters from the reply
    /// before building the report.
    #[arg(long, env = "SCANREPORT_SANITIZE")]
    sanitize: bool,

    /// Output structured JSON instead of the text report.
    #[arg(long)]
    json: bool,

    /// Do not write the Word document.
    #[arg(long)]
    no_export: bool,

    /// Disable the spinner.
    #[arg(long, env = "SCANREPORT_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "SCANREPORT_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "SCANREPORT_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
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

    // ── Build config (fails fast without an API key) ─────────────────────
    let mut config = build_config(&cli).await?;

    // ── Capture image ────────────────────────────────────────────────────
    if !has_image_extension(&cli.image) && !cli.quiet {
        eprintln!(
            "{}",
            dim(&format!(
                "note: '{}' has no .png/.jpg extension; checking its contents",
                cli.image.display()
            ))
        );
    }
    let image = ImageAsset::from_path(&cli.image)
        .with_context(|| format!("Cannot use '{}'", cli.image.display()))?;

    // ── Analyse ──────────────────────────────────────────────────────────
    // The spinner only starts once everything local has succeeded.
    let spinner = show_progress.then(CliProgressCallback::new);
    if let Some(ref cb) = spinner {
        config.progress_callback = Some(cb.clone() as ProgressCallback);
    }

    let orchestrator = clear_on_err(spinner.as_deref(), RequestOrchestrator::new(config))
        .context("Failed to set up client")?;
    let mut session = Session::new(Arc::new(orchestrator));
    session.upload(image);

    let result = clear_on_err(spinner.as_deref(), session.analyze().await.cloned())
        .context("Analysis could not start")?;

    if cli.json {
        let blocks = session.report().map(|r| r.blocks().to_vec()).unwrap_or_default();
        let json = serde_json::json!({ "result": result, "blocks": blocks });
        println!(
            "{}",
            serde_json::to_string_pretty(&json).context("Failed to serialise output")?
        );
    }

    if let Some(message) = result.error_message() {
        // Already shown by the spinner callback.
        if !show_progress {
            eprintln!("{} {}", red("✗"), message);
        }
        return Ok(ExitCode::FAILURE);
    }

    if !cli.json {
        let text = session.render_text().context("Failed to render report")?;
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        handle
            .write_all(text.as_bytes())
            .context("Failed to write to stdout")?;
    }

    // ── Export ───────────────────────────────────────────────────────────
    if !cli.no_export {
        let doc = session.export_docx().context("Failed to build document")?;
        write_document(&cli.output, &doc.bytes)
            .with_context(|| format!("Failed to write {}", cli.output.display()))?;
        if !cli.quiet {
            eprintln!(
                "{} report written  →  {}",
                green("✔"),
                bold(&cli.output.display().to_string())
            );
        }
    }

    Ok(ExitCode::SUCCESS)
}

/// Map CLI args to `AnalysisConfig`. The progress callback is attached later.
async fn build_config(cli: &Cli) -> Result<AnalysisConfig> {
    let api_key = cli.api_key.clone().unwrap_or_default();
    if api_key.trim().is_empty() {
        return Err(ScanReportError::Configuration(
            "GEMINI_API_KEY is not set.\nExport it (export GEMINI_API_KEY=...) or pass --api-key.".into(),
        ))
        .context("Missing credentials");
    }

    let mut builder = AnalysisConfig::builder()
        .api_key(api_key)
        .api_timeout_secs(cli.timeout)
        .temperature(cli.temperature)
        .max_output_tokens(cli.max_tokens)
        .image_width_inches(cli.image_width)
        .sanitize_response(cli.sanitize);

    if let Some(ref model) = cli.model {
        builder = builder.model(model.clone());
    }
    if let Some(ref endpoint) = cli.endpoint {
        builder = builder.endpoint(endpoint.clone());
    }
    if let Some(ref path) = cli.system_prompt {
        let text = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read system prompt from {:?}", path))?;
        builder = builder.system_instruction(text);
    }
    if let Some(ref path) = cli.prompt {
        let text = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read prompt from {:?}", path))?;
        builder = builder.user_prompt(text);
    }
    builder.build().context("Invalid configuration")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hidden_spinner() -> Arc<CliProgressCallback> {
        CliProgressCallback::with_bar(ProgressBar::with_draw_target(None, ProgressDrawTarget::hidden()))
    }

    #[test]
    fn error_clears_spinner() {
        let spinner = hidden_spinner();
        let r: Result<(), &str> = clear_on_err(Some(spinner.as_ref()), Err("boom"));
        assert!(r.is_err());
        assert!(spinner.bar.is_finished());
    }

    #[test]
    fn success_keeps_spinner_running() {
        let spinner = hidden_spinner();
        let r: Result<u8, &str> = clear_on_err(Some(spinner.as_ref()), Ok(1));
        assert_eq!(r, Ok(1));
        assert!(!spinner.bar.is_finished());
        spinner.abandon();
        assert!(spinner.bar.is_finished());
    }

    #[tokio::test]
    async fn blank_api_key_fails_before_any_spinner() {
        let cli = Cli::try_parse_from(["scanreport", "--api-key", "", "scan.png"]).unwrap();
        let err = build_config(&cli).await.unwrap_err();
        assert!(format!("{err:#}").contains("GEMINI_API_KEY"), "got: {err:#}");
    }

    #[tokio::test]
    async fn sanitize_flag_reaches_config() {
        let cli = Cli::try_parse_from(["scanreport", "--api-key", "k", "--sanitize", "scan.png"]).unwrap();
        assert!(build_config(&cli).await.unwrap().sanitize_response);
    }
}
