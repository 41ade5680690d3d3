//! CLI binary for idea-capture.
//!
//! A thin shim over the library crate: `serve` runs the HTTP endpoint,
//! `analyze` runs one local analysis and prints the result.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use idea_capture::{
    server, AnalysisOutput, AnalysisProgressCallback, CaptureConfig, EmphasisRule, IdeaCapture,
    ParseTier, ProgressCallback, PromptTemplate, ProviderKind,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
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

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Spinner that follows the analysis through its stages.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  {elapsed:.dim}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.set_prefix("Preparing");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }
}

impl AnalysisProgressCallback for CliProgressCallback {
    fn on_ingest_start(&self) {
        self.bar.set_prefix("Reading");
        self.bar.set_message("Opening PDF…");
    }

    fn on_ingest_complete(&self, page_count: usize, body_chars: usize) {
        self.bar.println(format!(
            "  {} Read {} pages  {}",
            green("✓"),
            page_count,
            dim(&format!("{body_chars} chars")),
        ));
    }

    fn on_model_start(&self, provider: &str, prompt_chars: usize) {
        self.bar.set_prefix("Analysing");
        self.bar
            .set_message(format!("{provider}  {}", dim(&format!("prompt {prompt_chars} chars"))));
    }

    fn on_chunk(&self, response_chars: usize) {
        self.bar.set_message(format!("{response_chars} chars received"));
    }

    fn on_complete(&self, tier: ParseTier) {
        self.bar.finish_and_clear();
        match tier {
            ParseTier::Parsed => eprintln!("{} Analysis complete", green("✔")),
            ParseTier::ExtractedSubset => {
                eprintln!("{} Analysis complete (JSON recovered from surrounding text)", green("✔"))
            }
            ParseTier::Fallback => eprintln!(
                "{} Model output could not be parsed; showing placeholder record",
                yellow("⚠")
            ),
        }
    }

    fn on_error(&self, error: &str) {
        self.bar.finish_and_clear();
        let first_line = error.lines().next().unwrap_or(error);
        eprintln!("{} {}", red("✘"), red(first_line));
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Serve the HTTP endpoint on 0.0.0.0:8000
  idea-capture serve

  # Analyse a deck locally (Bedrock, default model)
  idea-capture analyze deck.pdf --notes "A subscription box for artisanal coffee"

  # Anthropic, highlights template, JSON output
  idea-capture --provider anthropic --template highlights analyze deck.pdf \
      --notes-file notes.txt --json

  # Any edgequake-llm provider
  idea-capture --provider gateway --gateway-provider openai --model gpt-4.1-mini \
      analyze deck.pdf --notes "..."

  # Call the service
  curl -F typed_input="Coffee subscriptions" -F file=@deck.pdf \
      http://localhost:8000/idea-capture

PROVIDERS:
  bedrock     AWS Bedrock, streamed   (default model apac.amazon.nova-micro-v1:0)
  anthropic   Anthropic Messages API  (default model claude-3-5-haiku-20241022)
  gateway     any edgequake-llm provider (openai, gemini, ollama, azure, …)

TEMPLATES:
  dynamic (default), deep-research, founder-lens, highlights

ENVIRONMENT VARIABLES:
  AWS_REGION                 Bedrock region (default ap-south-1)
  AWS_BEARER_TOKEN_BEDROCK   Bedrock API key
  AWS_ACCESS_KEY_ID          IAM credentials for SigV4 (with AWS_SECRET_ACCESS_KEY,
                             optional AWS_SESSION_TOKEN)
  BEDROCK_ENDPOINT           Override the Bedrock runtime endpoint
  ANTHROPIC_API_KEY          Anthropic API key
  ANTHROPIC_BASE_URL         Override the Anthropic API base URL
  EDGEQUAKE_LLM_PROVIDER     Gateway provider name
  PDFIUM_LIB_PATH            Path to libpdfium
  RUST_LOG                   Log filter (overrides --verbose / --quiet)

  A .env file in the working directory is loaded first.
"#;

/// Turn pitch-deck PDFs and founder notes into structured business analyses.
#[derive(Parser, Debug)]
#[command(
    name = "idea-capture",
    version,
    about = "Turn pitch-deck PDFs and founder notes into structured business analyses",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[command(flatten)]
    settings: ModelArgs,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "IDEA_CAPTURE_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "IDEA_CAPTURE_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve POST /idea-capture and GET /health.
    Serve {
        /// Address to bind.
        #[arg(long, env = "HOST", default_value = "0.0.0.0")]
        host: IpAddr,

        /// Port to bind.
        #[arg(long, env = "PORT", default_value_t = 8000)]
        port: u16,
    },

    /// Analyse one PDF locally and print the result.
    Analyze {
        /// Pitch-deck PDF.
        pdf: PathBuf,

        /// Founder notes.
        #[arg(long, conflicts_with = "notes_file", required_unless_present = "notes_file")]
        notes: Option<String>,

        /// Read founder notes from a file.
        #[arg(long)]
        notes_file: Option<PathBuf>,

        /// Print the full analysis output (record, tier, raw response, stats) as JSON.
        #[arg(long)]
        json: bool,

        /// Also print the raw model response.
        #[arg(long)]
        show_raw: bool,

        /// Disable the progress spinner.
        #[arg(long, env = "IDEA_CAPTURE_NO_PROGRESS")]
        no_progress: bool,
    },
}

#[derive(Args, Debug)]
struct ModelArgs {
    /// Model backend.
    #[arg(long, global = true, env = "IDEA_CAPTURE_PROVIDER", value_enum, default_value = "bedrock")]
    provider: ProviderArg,

    /// Model ID (defaults depend on the provider).
    #[arg(long, global = true, env = "IDEA_CAPTURE_MODEL")]
    model: Option<String>,

    /// edgequake-llm provider name for `--provider gateway` (openai, gemini, ollama, …).
    #[arg(long, global = true, env = "EDGEQUAKE_LLM_PROVIDER")]
    gateway_provider: Option<String>,

    /// Prompt template.
    #[arg(long, global = true, env = "IDEA_CAPTURE_TEMPLATE", value_enum, default_value = "dynamic")]
    template: TemplateArg,

    /// AWS region for Bedrock.
    #[arg(long, global = true, env = "AWS_REGION", default_value = idea_capture::config::DEFAULT_REGION)]
    region: String,

    /// Bedrock runtime endpoint (scheme + host).
    #[arg(long, global = true, env = "BEDROCK_ENDPOINT")]
    bedrock_endpoint: Option<String>,

    /// Anthropic API base URL.
    #[arg(long, global = true, env = "ANTHROPIC_BASE_URL")]
    anthropic_base_url: Option<String>,

    /// LLM temperature (0.0–1.0).
    #[arg(long, global = true, env = "IDEA_CAPTURE_TEMPERATURE", default_value_t = 0.4)]
    temperature: f32,

    /// Max tokens the model may generate.
    #[arg(long, global = true, env = "IDEA_CAPTURE_MAX_TOKENS", default_value_t = 1000)]
    max_tokens: usize,

    /// Model call timeout in seconds (0 disables).
    #[arg(long, global = true, env = "IDEA_CAPTURE_MODEL_TIMEOUT", default_value_t = 120)]
    model_timeout: u64,

    /// Pitch text is cut to this many characters.
    #[arg(long, global = true, env = "IDEA_CAPTURE_MAX_PITCH_CHARS", default_value_t = 4000)]
    max_pitch_chars: usize,

    /// Minimum font size (points) for a word to count as emphasized.
    #[arg(long, global = true, env = "IDEA_CAPTURE_EMPHASIS_MIN_SIZE", default_value_t = 16.0)]
    emphasis_min_size: f32,

    /// Font-name substring marking a word as emphasized.
    #[arg(long, global = true, env = "IDEA_CAPTURE_EMPHASIS_MARKER", default_value = "bold")]
    emphasis_marker: String,

    /// Directory uploads are staged in.
    #[arg(long, global = true, env = "IDEA_CAPTURE_UPLOAD_DIR")]
    upload_dir: Option<PathBuf>,

    /// Largest accepted upload in MiB.
    #[arg(long, global = true, env = "IDEA_CAPTURE_MAX_UPLOAD_MB", default_value_t = 25)]
    max_upload_mb: usize,

    /// Path to libpdfium.
    #[arg(long, global = true, env = "PDFIUM_LIB_PATH")]
    pdfium_lib: Option<PathBuf>,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum ProviderArg {
    Bedrock,
    Anthropic,
    Gateway,
}

impl From<ProviderArg> for ProviderKind {
    fn from(v: ProviderArg) -> Self {
        match v {
            ProviderArg::Bedrock => ProviderKind::Bedrock,
            ProviderArg::Anthropic => ProviderKind::Anthropic,
            ProviderArg::Gateway => ProviderKind::Gateway,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum TemplateArg {
    DeepResearch,
    Dynamic,
    FounderLens,
    Highlights,
}

impl From<TemplateArg> for PromptTemplate {
    fn from(v: TemplateArg) -> Self {
        match v {
            TemplateArg::DeepResearch => PromptTemplate::DeepResearch,
            TemplateArg::Dynamic => PromptTemplate::Dynamic,
            TemplateArg::FounderLens => PromptTemplate::FounderLens,
            TemplateArg::Highlights => PromptTemplate::Highlights,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // .env must be loaded before clap reads env-bound flags
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner gives all the feedback `analyze` needs; keep library INFO
    // logs out of its way unless asked for.
    let spinner = match cli.command {
        Command::Analyze {
            json, no_progress, ..
        } => !cli.quiet && !no_progress && !json,
        Command::Serve { .. } => false,
    };
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || spinner {
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
        Command::Serve { host, port } => {
            let config = build_config(&cli.settings, None)?;
            let capture = IdeaCapture::new(config).context("Failed to initialise the model backend")?;
            let addr = SocketAddr::new(host, port);
            if !cli.quiet {
                eprintln!(
                    "{} Serving idea capture on {}  {}",
                    cyan("◆"),
                    bold(&format!("http://{addr}")),
                    dim(&format!("backend: {}", capture.backend_name())),
                );
            }
            server::serve(Arc::new(capture), addr)
                .await
                .context("Server error")?;
        }
        Command::Analyze {
            ref pdf,
            ref notes,
            ref notes_file,
            json,
            show_raw,
            ..
        } => {
            let notes = read_notes(notes.as_deref(), notes_file.as_ref()).await?;
            let progress: Option<ProgressCallback> = if spinner {
                Some(CliProgressCallback::new() as Arc<dyn AnalysisProgressCallback>)
            } else {
                None
            };
            let config = build_config(&cli.settings, progress)?;
            let capture = IdeaCapture::new(config).context("Failed to initialise the model backend")?;

            let output = capture
                .analyze_file(&notes, pdf)
                .await
                .with_context(|| format!("Analysis of {} failed", pdf.display()))?;

            if json {
                let json =
                    serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
                println!("{json}");
            } else {
                print_report(&output);
                if show_raw {
                    println!("\n{}\n{}", bold("Raw model response"), output.raw_response);
                }
                if !cli.quiet {
                    eprintln!(
                        "   {} pages  /  {} chunks ({} skipped)  —  {}ms total",
                        dim(&output.stats.page_count.to_string()),
                        dim(&output.stats.chunks_received.to_string()),
                        output.stats.chunks_skipped,
                        output.stats.total_duration_ms,
                    );
                }
            }
        }
    }

    Ok(())
}

/// Notes from `--notes` or `--notes-file`; empty notes are refused.
async fn read_notes(inline: Option<&str>, file: Option<&PathBuf>) -> Result<String> {
    let notes = match (inline, file) {
        (Some(text), _) => text.to_string(),
        (None, Some(path)) => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read notes from {:?}", path))?,
        (None, None) => anyhow::bail!("Either --notes or --notes-file is required"),
    };
    if notes.trim().is_empty() {
        anyhow::bail!("Founder notes are empty");
    }
    Ok(notes)
}

/// Map CLI args to `CaptureConfig`.
fn build_config(args: &ModelArgs, progress: Option<ProgressCallback>) -> Result<CaptureConfig> {
    let mut builder = CaptureConfig::builder()
        .provider(args.provider.into())
        .template(args.template.into())
        .region(args.region.clone())
        .temperature(args.temperature)
        .max_tokens(args.max_tokens)
        .model_timeout_secs(args.model_timeout)
        .max_pitch_chars(args.max_pitch_chars)
        .emphasis(EmphasisRule {
            min_font_size: args.emphasis_min_size,
            font_marker: args.emphasis_marker.clone(),
        })
        .max_upload_bytes(args.max_upload_mb.saturating_mul(1024 * 1024));

    if let Some(ref model) = args.model {
        builder = builder.model(model.clone());
    }
    if let Some(ref name) = args.gateway_provider {
        builder = builder.gateway_provider(name.clone());
    }
    if let Some(ref endpoint) = args.bedrock_endpoint {
        builder = builder.bedrock_endpoint(endpoint.clone());
    }
    if let Some(ref url) = args.anthropic_base_url {
        builder = builder.anthropic_base_url(url.clone());
    }
    if let Some(ref dir) = args.upload_dir {
        builder = builder.upload_dir(dir.clone());
    }
    if let Some(ref lib) = args.pdfium_lib {
        builder = builder.pdfium_library(lib.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// Human-readable rendering of the record on stdout.
fn print_report(output: &AnalysisOutput) {
    let r = &output.record;
    println!("{}", bold(&r.title));
    if !r.description.is_empty() {
        println!("{}", r.description);
    }
    if !r.audience.is_empty() {
        println!("\n{} {}", cyan("Audience:"), r.audience);
    }
    print_list("Problem statements", &r.problem_statements);
    print_list("Burning problems", &r.burning_problems);
    print_list("Follow-up questions", &r.follow_up_questions);
    if !r.tags.is_empty() {
        println!("\n{} {}", cyan("Tags:"), r.tags.join(", "));
    }
}

fn print_list(heading: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }
    println!("\n{}", cyan(&format!("{heading}:")));
    for item in items {
        println!("  • {item}");
    }
}
