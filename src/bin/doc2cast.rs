//! CLI binary for edgequake-doc2cast.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `PipelineConfig` and prints results.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use edgequake_doc2cast::{
    segment, PipelineConfig, PodcastPipeline, PodcastRequest, ProgressCallback, SpeedHint,
    SynthesisProgressCallback,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers ──────────────────────────────────────────────────────

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

const SPINNER: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Renders a segment progress bar with one log line per segment.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    /// Spinner until `on_synthesis_start` reports the segment count.
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(SPINNER);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Extracting text and writing script…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self { bar })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} segments  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(SPINNER);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Voicing");
        self.bar.reset_eta();
    }
}

impl SynthesisProgressCallback for CliProgressCallback {
    fn on_synthesis_start(&self, total_segments: usize) {
        self.activate_bar(total_segments);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Synthesizing {total_segments} segments…"))
        ));
    }

    fn on_segment_start(&self, index: usize, _total: usize, speaker: &str) {
        self.bar.set_message(format!("segment {} ({speaker})", index + 1));
    }

    fn on_segment_complete(&self, index: usize, total: usize, audio_len: usize) {
        self.bar.println(format!(
            "  {} Segment {:>3}/{:<3}  {}",
            green("✓"),
            index + 1,
            total,
            dim(&format!("{:>7} bytes", audio_len)),
        ));
        self.bar.inc(1);
    }

    fn on_segment_skipped(&self, index: usize, total: usize, reason: &str) {
        let msg: String = if reason.chars().count() > 80 {
            reason.chars().take(79).chain(std::iter::once('…')).collect()
        } else {
            reason.to_string()
        };
        self.bar.println(format!(
            "  {} Segment {:>3}/{:<3}  {}",
            red("✗"),
            index + 1,
            total,
            red(&msg),
        ));
        self.bar.inc(1);
    }

    fn on_synthesis_complete(&self, total_segments: usize, synthesized: usize) {
        let skipped = total_segments.saturating_sub(synthesized);
        self.bar.finish_and_clear();
        if skipped == 0 {
            eprintln!(
                "{} {} segments voiced",
                green("✔"),
                bold(&synthesized.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} segments voiced  ({} skipped)",
                if synthesized == 0 { red("✘") } else { cyan("⚠") },
                bold(&synthesized.to_string()),
                total_segments,
                red(&skipped.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Print the text extracted from a deck (text layer, then OCR of images)
  doc2cast extract slides.pptx

  # Same, as JSON with content hash and extraction stats
  doc2cast extract --json paper.pdf

  # Generate a podcast at a faster pace
  doc2cast podcast lecture.pdf -o lecture.mp3 --speed fast

  # Multiple-choice quiz as JSON
  doc2cast quiz https://example.com/notes.pdf

  # Show how a script would be split between the two voices
  doc2cast segments script.txt

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  GEMINI_API_KEY          Google Gemini API key
  EDGEQUAKE_PROVIDER      Provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Model ID
  PDFIUM_LIB_PATH         Path to libpdfium (otherwise ./ then system paths)
  DOC2CAST_ARTIFACT_DIR   Artifact cache directory (default: ./artifacts)

VOICES:
  Host   StreamElements "Brian", fallback ResponsiveVoice "UK English Male"
  Guest  StreamElements "Amy",   fallback ResponsiveVoice "US English Female"
"#;

/// Turn PDF and PowerPoint documents into two-voice podcasts and quizzes.
#[derive(Parser, Debug)]
#[command(
    name = "doc2cast",
    version,
    about = "Turn PDF and PowerPoint documents into two-voice podcasts and quizzes",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[command(flatten)]
    global: GlobalArgs,
}

#[derive(Args, Debug)]
struct GlobalArgs {
    /// Directory for cached text, quizzes, scripts and audio.
    #[arg(long, global = true, env = "DOC2CAST_ARTIFACT_DIR", default_value = "artifacts")]
    artifact_dir: PathBuf,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(long, global = true, env = "EDGEQUAKE_PROVIDER")]
    provider: Option<String>,

    /// LLM model ID (e.g. gpt-4.1-nano, gpt-4.1-mini).
    #[arg(long, global = true, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// Path to the pdfium shared library.
    #[arg(long, global = true, env = "PDFIUM_LIB_PATH")]
    pdfium_lib: Option<PathBuf>,

    /// Skip OCR of embedded images.
    #[arg(long, global = true, env = "DOC2CAST_NO_OCR")]
    no_ocr: bool,

    /// Never call the fallback speech provider.
    #[arg(long, global = true, env = "DOC2CAST_NO_FALLBACK")]
    no_fallback: bool,

    /// Retries per LLM call.
    #[arg(long, global = true, env = "DOC2CAST_MAX_RETRIES", default_value_t = 3)]
    max_retries: u32,

    /// Per speech-provider call timeout in seconds.
    #[arg(long, global = true, env = "DOC2CAST_TTS_TIMEOUT", default_value_t = 15)]
    tts_timeout: u64,

    /// HTTP download timeout in seconds.
    #[arg(long, global = true, env = "DOC2CAST_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "DOC2CAST_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "DOC2CAST_QUIET")]
    quiet: bool,

    /// Disable the progress bar.
    #[arg(long, global = true, env = "DOC2CAST_NO_PROGRESS")]
    no_progress: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the text extracted from a document.
    Extract {
        /// Local PDF/PPTX path or HTTP/HTTPS URL.
        input: String,

        /// Print JSON (hash, preview, stats, text) instead of plain text.
        #[arg(long)]
        json: bool,
    },

    /// Print how a script splits into Host / Guest segments, as JSON.
    Segments {
        /// Script file, or `-` for stdin.
        script: String,
    },

    /// Print a freshly generated podcast script.
    Script {
        input: String,
    },

    /// Print a multiple-choice quiz as JSON.
    Quiz {
        input: String,
    },

    /// Generate the podcast audio and write it to a file.
    Podcast {
        input: String,

        /// Output mp3 path.
        #[arg(short, long)]
        output: PathBuf,

        /// slow, normal, fast, or a multiplier between 0.5 and 2.0.
        #[arg(long, default_value = "normal")]
        speed: SpeedHint,

        /// Cache label for this rendition.
        #[arg(long, default_value = "host")]
        voice: String,
    },
}

impl Command {
    fn shows_progress(&self) -> bool {
        matches!(self, Command::Podcast { .. })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let g = &cli.global;

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO logs while it is on screen.
    let show_progress = !g.quiet && !g.no_progress && cli.command.shows_progress();
    let filter = if g.verbose {
        "debug"
    } else if g.quiet || show_progress {
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

    // `segments` is pure text processing: no config, no providers.
    if let Command::Segments { script } = &cli.command {
        let text = read_script(script)?;
        let segments = segment(&text);
        println!(
            "{}",
            serde_json::to_string_pretty(&segments).context("Failed to serialise segments")?
        );
        return Ok(());
    }

    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new_dynamic() as Arc<dyn SynthesisProgressCallback>)
    } else {
        None
    };

    let config = build_config(g, progress_cb)?;
    let pipeline = PodcastPipeline::new(config).context("Failed to set up pipeline")?;

    match &cli.command {
        Command::Segments { .. } => unreachable!("handled above"),

        Command::Extract { input, json } => {
            let document = pipeline.load(input).await.context("Failed to load document")?;
            let ingested = pipeline
                .ingest(&document)
                .await
                .context("Text extraction failed")?;
            if *json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&ingested).context("Failed to serialise output")?
                );
            } else {
                write_stdout(&ingested.text)?;
            }
            if !g.quiet {
                eprintln!(
                    "{} {} chars  {}",
                    green("✔"),
                    ingested.text.chars().count(),
                    dim(if ingested.from_cache { "(cached)" } else { "" })
                );
            }
        }

        Command::Script { input } => {
            let document = pipeline.load(input).await.context("Failed to load document")?;
            let script = pipeline
                .script(&document)
                .await
                .context("Script generation failed")?;
            write_stdout(&script)?;
        }

        Command::Quiz { input } => {
            let document = pipeline.load(input).await.context("Failed to load document")?;
            let quiz = pipeline
                .quiz(&document)
                .await
                .context("Quiz generation failed")?;
            println!(
                "{}",
                serde_json::to_string_pretty(&quiz).context("Failed to serialise quiz")?
            );
        }

        Command::Podcast {
            input,
            output,
            speed,
            voice,
        } => {
            let document = pipeline.load(input).await.context("Failed to load document")?;
            let request = PodcastRequest::new(voice.clone(), *speed);
            let episode = pipeline
                .podcast_to_file(&document, &request, output)
                .await
                .context("Podcast generation failed")?;

            if !g.quiet {
                let detail = match &episode.stats {
                    Some(stats) => format!(
                        "{}/{} segments  {} primary / {} fallback  {}ms",
                        stats.synthesized,
                        stats.total_segments,
                        stats.primary_hits,
                        stats.fallback_hits,
                        stats.duration_ms
                    ),
                    None => "from cache".to_string(),
                };
                eprintln!(
                    "{}  {} bytes  {}  →  {}",
                    if episode.skipped.is_empty() { green("✔") } else { cyan("⚠") },
                    episode.audio.len(),
                    dim(&detail),
                    bold(&output.display().to_string()),
                );
            }
        }
    }

    Ok(())
}

/// Map CLI args to `PipelineConfig`.
fn build_config(g: &GlobalArgs, progress: Option<ProgressCallback>) -> Result<PipelineConfig> {
    let mut builder = PipelineConfig::builder()
        .artifact_dir(&g.artifact_dir)
        .ocr_enabled(!g.no_ocr)
        .tts_fallback_enabled(!g.no_fallback)
        .max_retries(g.max_retries)
        .tts_timeout_secs(g.tts_timeout)
        .download_timeout_secs(g.download_timeout);

    if let Some(ref provider) = g.provider {
        builder = builder.provider_name(provider);
    }
    if let Some(ref model) = g.model {
        builder = builder.model(model);
    }
    if let Some(ref path) = g.pdfium_lib {
        builder = builder.pdfium_lib_path(path);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

fn read_script(source: &str) -> Result<String> {
    if source == "-" {
        let mut buf = String::new();
        io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read script from stdin")?;
        Ok(buf)
    } else {
        std::fs::read_to_string(source).with_context(|| format!("Failed to read script {source:?}"))
    }
}

fn write_stdout(text: &str) -> Result<()> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    handle
        .write_all(text.as_bytes())
        .context("Failed to write to stdout")?;
    if !text.ends_with('\n') {
        handle.write_all(b"\n").ok();
    }
    Ok(())
}
