//! evstream-bridge: entry point.
//!
//! Reads a binary assistant event stream (a captured response body, or a
//! live one piped in on stdin) and writes the equivalent chat-completion
//! Server-Sent-Events stream to stdout.
//!
//! # Usage
//!
//! ```text
//! evstream-bridge [OPTIONS] [INPUT]
//!
//! Arguments:
//!   [INPUT]  Event-stream file to read [default: stdin]
//!
//! Options:
//!   -c, --config <PATH>             TOML config file
//!       --model <NAME>              Model name reported in message_start
//!       --input-tokens <N>          Input-token count reported in message_start
//!       --chunk-size <BYTES>        Bytes per backend read
//!       --channel-capacity <N>      Decoder → encoder queue depth
//!       --ping-interval <SECS>      Idle keepalive interval, 0 disables
//!       --aggregate                 Write one non-streaming JSON message
//!       --messages                  Write decoded frames as JSON lines
//! ```
//!
//! # Configuration precedence
//!
//! Defaults, then the `--config` file, then flags.  Every flag also reads an
//! environment variable; an explicit flag wins over its variable.
//!
//! | Variable                    | Flag                 |
//! |-----------------------------|----------------------|
//! | `EVSTREAM_CONFIG`           | `--config`           |
//! | `EVSTREAM_MODEL`            | `--model`            |
//! | `EVSTREAM_INPUT_TOKENS`     | `--input-tokens`     |
//! | `EVSTREAM_CHUNK_SIZE`       | `--chunk-size`       |
//! | `EVSTREAM_CHANNEL_CAPACITY` | `--channel-capacity` |
//! | `EVSTREAM_PING_INTERVAL`    | `--ping-interval`    |
//!
//! Logs go to stderr (level from `RUST_LOG`, default `info`) so stdout
//! carries only the translated stream.

use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio::io::AsyncRead;
use tracing::info;
use tracing_subscriber::EnvFilter;

use evstream_bridge::domain::BridgeConfig;
use evstream_bridge::infrastructure::{run_pipeline, OutputMode, PipelineSummary};

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Re-encodes a binary assistant event stream as chat-completion SSE.
#[derive(Debug, Parser)]
#[command(
    name = "evstream-bridge",
    about = "Binary event-stream to chat-completion SSE bridge",
    version
)]
struct Cli {
    /// Event-stream file to read.  Reads stdin when omitted.
    input: Option<PathBuf>,

    /// TOML config file.  Flags override its values.
    #[arg(short, long, env = "EVSTREAM_CONFIG")]
    config: Option<PathBuf>,

    /// Model name reported in `message_start`.
    #[arg(long, env = "EVSTREAM_MODEL")]
    model: Option<String>,

    /// Input-token count reported in `message_start`.
    #[arg(long, env = "EVSTREAM_INPUT_TOKENS")]
    input_tokens: Option<u32>,

    /// Bytes requested per read from the backend stream.
    #[arg(long, env = "EVSTREAM_CHUNK_SIZE", value_parser = clap::value_parser!(u64).range(1..))]
    chunk_size: Option<u64>,

    /// Depth of the decoder → encoder queue.
    #[arg(long, env = "EVSTREAM_CHANNEL_CAPACITY", value_parser = clap::value_parser!(u64).range(1..))]
    channel_capacity: Option<u64>,

    /// Idle keepalive ping interval in seconds.  0 disables pings.
    #[arg(long, env = "EVSTREAM_PING_INTERVAL")]
    ping_interval: Option<u64>,

    /// Write one non-streaming JSON message instead of SSE.
    #[arg(long, conflicts_with = "messages")]
    aggregate: bool,

    /// Write every decoded backend frame as a JSON line, untranslated.
    #[arg(long)]
    messages: bool,
}

impl Cli {
    /// Layers the config file (if any) and the flags over the defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be read or parsed, or if a
    /// size does not fit this platform's `usize`.
    fn into_config(&self) -> anyhow::Result<BridgeConfig> {
        let mut config = match &self.config {
            Some(path) => BridgeConfig::load(path)
                .with_context(|| format!("failed to load config from {}", path.display()))?,
            None => BridgeConfig::default(),
        };

        if let Some(model) = &self.model {
            config.model.clone_from(model);
        }
        if let Some(tokens) = self.input_tokens {
            config.input_tokens = tokens;
        }
        if let Some(size) = self.chunk_size {
            config.chunk_size = usize::try_from(size).context("--chunk-size is too large")?;
        }
        if let Some(capacity) = self.channel_capacity {
            config.channel_capacity =
                usize::try_from(capacity).context("--channel-capacity is too large")?;
        }
        if let Some(secs) = self.ping_interval {
            config.ping_interval = Duration::from_secs(secs);
        }
        Ok(config)
    }

    fn output_mode(&self) -> OutputMode {
        if self.aggregate {
            OutputMode::Aggregate
        } else if self.messages {
            OutputMode::Messages
        } else {
            OutputMode::Sse
        }
    }
}

// ── Interrupt handling ────────────────────────────────────────────────────────

/// How a run ended.
#[derive(Debug)]
enum RunOutcome {
    Finished(PipelineSummary),
    Interrupted,
}

/// Runs `pipeline` until it finishes or `interrupt` fires.
///
/// On interrupt the pipeline future is dropped, which closes the decoder's
/// channel and stops its worker.
async fn run_until_interrupted<P, S>(pipeline: P, interrupt: S) -> anyhow::Result<RunOutcome>
where
    P: Future<Output = anyhow::Result<PipelineSummary>>,
    S: Future<Output = std::io::Result<()>>,
{
    tokio::select! {
        result = pipeline => Ok(RunOutcome::Finished(result?)),
        signal = interrupt => {
            signal.context("failed to listen for Ctrl+C")?;
            Ok(RunOutcome::Interrupted)
        }
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── Logging setup ─────────────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = cli.into_config()?;
    let mode = cli.output_mode();

    let reader: Box<dyn AsyncRead + Unpin + Send> = match &cli.input {
        Some(path) => Box::new(
            tokio::fs::File::open(path)
                .await
                .with_context(|| format!("failed to open {}", path.display()))?,
        ),
        None => Box::new(tokio::io::stdin()),
    };

    info!(
        "evstream-bridge starting: input={}, mode={mode:?}, model={}",
        cli.input
            .as_deref()
            .map_or_else(|| "<stdin>".to_string(), |p| p.display().to_string()),
        config.model
    );

    // ── Pipeline ──────────────────────────────────────────────────────────────
    //
    // Ctrl+C abandons the stream; whatever was already written stays written.
    let pipeline = run_pipeline(reader, tokio::io::stdout(), &config, mode);
    match run_until_interrupted(pipeline, tokio::signal::ctrl_c()).await? {
        RunOutcome::Finished(summary) => {
            info!(
                "evstream-bridge finished: message={}, frames={}",
                summary.message_id, summary.decode.frames
            );
        }
        RunOutcome::Interrupted => {
            info!("received Ctrl+C; stopping");
            // A stdin read parked on the blocking pool would hold up runtime
            // shutdown until the next byte arrives.
            std::process::exit(130);
        }
    }

    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
