//! The bridge pipeline: backend bytes in, target-protocol output out.
//!
//! ```text
//! reader ──► [decoder task] ──mpsc──► classify ──► StreamSession ──► writer
//!                                                      ▲
//!                                  keepalive ticker ───┘ (ping when idle)
//! ```
//!
//! The decoder runs on its own task (see [`spawn_decoder`]); this function is
//! the consumer.  It owns the session, so no state is shared between tasks.

use anyhow::Context;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use evstream_core::protocol::{classify, DecodedMessage};

use crate::application::{format_events, ResponseAggregator, StreamSession};
use crate::domain::config::BridgeConfig;
use crate::domain::events::SseEvent;
use crate::infrastructure::stream_decoder::{spawn_decoder, DecodeReport, DecodeStats, StreamError};

/// What the pipeline writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputMode {
    /// Target-protocol SSE frames, flushed one by one.
    #[default]
    Sse,
    /// One non-streaming JSON message, written at the end.
    Aggregate,
    /// One JSON line per decoded backend frame, untranslated.
    Messages,
}

/// What happened during one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineSummary {
    /// The message id reported to the client.
    pub message_id: String,
    pub decode: DecodeStats,
    /// Target-protocol events produced, including pings.
    pub events: u64,
    pub pings: u64,
    pub output_tokens: u32,
}

enum Step {
    Message(DecodedMessage),
    Idle,
    Closed,
}

/// Runs the whole bridge over one backend stream.
///
/// Returns after end-of-input, once the closing events have been written.  A
/// read error from the backend is returned only after the client-facing
/// stream has been closed properly, so the client sees a short response and
/// never a broken one.
pub async fn run_pipeline<R, W>(
    reader: R,
    mut writer: W,
    config: &BridgeConfig,
    mode: OutputMode,
) -> anyhow::Result<PipelineSummary>
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin,
{
    let mut session = StreamSession::new(config);
    let (mut rx, worker) = spawn_decoder(
        reader,
        config.chunk_size,
        config.channel_capacity,
        session.id().to_string(),
    );
    let mut output = Output::new(mode, &session);

    // Pings only make sense on a live SSE stream.
    let mut ticker = match mode {
        OutputMode::Sse => config.keepalive().map(|period| {
            let mut t = interval_at(Instant::now() + period, period);
            t.set_missed_tick_behavior(MissedTickBehavior::Delay);
            t
        }),
        _ => None,
    };

    loop {
        let step = tokio::select! {
            biased;
            message = rx.recv() => match message {
                Some(message) => Step::Message(message),
                None => Step::Closed,
            },
            _ = tick(&mut ticker) => Step::Idle,
        };

        match step {
            Step::Message(message) => {
                if let Some(t) = ticker.as_mut() {
                    t.reset();
                }
                if mode == OutputMode::Messages {
                    output.write_message(&mut writer, &message).await?;
                    continue;
                }
                let events = session.handle(&classify(message));
                output.write_events(&mut writer, &events).await?;
            }
            Step::Idle => {
                if session.message_started() {
                    debug!("stream {}: idle, sending ping", session.id());
                    output.write_events(&mut writer, &[SseEvent::Ping]).await?;
                }
            }
            Step::Closed => break,
        }
    }

    let DecodeReport { stats: decode, error } =
        worker.await.context("stream decoder task failed")?;

    if mode != OutputMode::Messages {
        let closing = session.finish();
        output.write_events(&mut writer, &closing).await?;
    }
    output.finish(&mut writer).await?;

    match error {
        None => {}
        Some(StreamError::TruncatedFrame { buffered }) => {
            warn!(
                "stream {}: input ended inside a frame; {buffered} bytes discarded",
                session.id()
            );
        }
        Some(e @ StreamError::Read(_)) => {
            return Err(e).with_context(|| format!("stream {}: backend read failed", session.id()));
        }
    }

    let summary = PipelineSummary {
        message_id: session.id().to_string(),
        decode,
        events: output.events,
        pings: output.pings,
        output_tokens: session.output_tokens(),
    };
    info!(
        "stream {}: done ({} frames, {} skipped, {} events, {} output tokens)",
        summary.message_id,
        summary.decode.frames,
        summary.decode.skipped,
        summary.events,
        summary.output_tokens
    );
    Ok(summary)
}

/// Waits for the next keepalive tick, or forever when keepalive is off.
async fn tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(t) => {
            t.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

// ── Output sink ───────────────────────────────────────────────────────────────

struct Output {
    mode: OutputMode,
    aggregator: Option<ResponseAggregator>,
    events: u64,
    pings: u64,
}

impl Output {
    fn new(mode: OutputMode, session: &StreamSession) -> Self {
        let aggregator = (mode == OutputMode::Aggregate).then(|| {
            ResponseAggregator::new(session.id(), session.model(), session.input_tokens())
        });
        Self {
            mode,
            aggregator,
            events: 0,
            pings: 0,
        }
    }

    async fn write_events<W>(&mut self, writer: &mut W, events: &[SseEvent]) -> anyhow::Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        if events.is_empty() {
            return Ok(());
        }
        self.events += events.len() as u64;
        self.pings += events.iter().filter(|e| matches!(e, SseEvent::Ping)).count() as u64;

        if let Some(aggregator) = self.aggregator.as_mut() {
            aggregator.extend(events);
            return Ok(());
        }
        let text = format_events(events)?;
        writer
            .write_all(text.as_bytes())
            .await
            .context("failed to write SSE frame")?;
        writer.flush().await.context("failed to flush SSE frame")
    }

    async fn write_message<W>(&mut self, writer: &mut W, message: &DecodedMessage) -> anyhow::Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        let mut line = serde_json::to_vec(message).context("failed to serialize decoded frame")?;
        line.push(b'\n');
        writer
            .write_all(&line)
            .await
            .context("failed to write decoded frame")
    }

    async fn finish<W>(&mut self, writer: &mut W) -> anyhow::Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        if let Some(aggregator) = self.aggregator.take() {
            let mut body = serde_json::to_vec_pretty(&aggregator.into_message())
                .context("failed to serialize aggregated message")?;
            body.push(b'\n');
            writer
                .write_all(&body)
                .await
                .context("failed to write aggregated message")?;
        }
        debug!("output closed ({:?}, {} events)", self.mode, self.events);
        writer.flush().await.context("failed to flush output")
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
