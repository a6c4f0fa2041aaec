//! The backend read loop: bytes → decoded messages.
//!
//! The backend response body is a byte *stream*: one `read()` may return part
//! of a frame, or several frames at once.  [`StreamDecoder`] accumulates bytes
//! in a buffer and slices complete frames off its front with
//! [`extract_frame`], decoding each with [`decode_message`].
//!
//! # Error policy
//!
//! - A frame that fails to decode is logged and skipped; the stream goes on.
//! - A read error ends the stream and is returned to the caller.  Messages
//!   already published stay valid.
//! - Bytes left over at end-of-input that never formed a frame are reported
//!   as [`StreamError::TruncatedFrame`] after every complete frame has been
//!   published.
//!
//! # Worker model
//!
//! [`spawn_decoder`] runs the loop on its own tokio task and publishes into a
//! bounded channel.  When the channel is full, `send().await` parks the task,
//! so no further bytes are read until the consumer catches up.  Dropping the
//! receiver stops the worker, even while it is waiting on a read.

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use evstream_core::protocol::{
    decode_message, extract_frame, DecodedMessage, ProtocolError, PRELUDE_SIZE,
};

/// Bytes requested per read when no chunk size is configured.
pub const DEFAULT_CHUNK_SIZE: usize = 4096;

// ── Error type ────────────────────────────────────────────────────────────────

/// Errors that end a decoded stream.
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    /// Reading from the byte source failed.
    #[error("read from backend stream failed: {0}")]
    Read(#[from] std::io::Error),

    /// End-of-input was reached with an incomplete frame in the buffer.
    #[error("stream ended inside a frame ({buffered} bytes buffered)")]
    TruncatedFrame { buffered: usize },
}

/// Counters for one decoded stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecodeStats {
    pub bytes_read: u64,
    pub frames: u64,
    pub skipped: u64,
}

/// How a decoder worker ended.
///
/// The counters survive the error, so a stream that ends badly still reports
/// what it read.
#[derive(Debug)]
pub struct DecodeReport {
    pub stats: DecodeStats,
    /// `None` after a clean end-of-input, or when the consumer went away.
    pub error: Option<StreamError>,
}

/// Result of slicing one frame off the buffer.
#[derive(Debug)]
enum FrameOutcome {
    Message(DecodedMessage),
    Skip(ProtocolError),
}

// ── Decoder ───────────────────────────────────────────────────────────────────

/// Incremental decoder over an async byte source.
pub struct StreamDecoder<R> {
    reader: R,
    label: String,
    buf: Vec<u8>,
    chunk: Vec<u8>,
    eof: bool,
    stats: DecodeStats,
}

impl<R: AsyncRead + Unpin> StreamDecoder<R> {
    pub fn new(reader: R, label: impl Into<String>) -> Self {
        Self::with_chunk_size(reader, DEFAULT_CHUNK_SIZE, label)
    }

    /// A chunk size of zero is treated as one byte.
    pub fn with_chunk_size(reader: R, chunk_size: usize, label: impl Into<String>) -> Self {
        let chunk_size = chunk_size.max(1);
        Self {
            reader,
            label: label.into(),
            buf: Vec::with_capacity(chunk_size),
            chunk: vec![0u8; chunk_size],
            eof: false,
            stats: DecodeStats::default(),
        }
    }

    pub fn stats(&self) -> DecodeStats {
        self.stats
    }

    /// Bytes received but not yet consumed as part of a frame.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Returns the next decoded message, reading as needed.
    ///
    /// `Ok(None)` means the source is exhausted.  Frames that fail to decode
    /// are skipped without being returned.
    pub async fn next_message(&mut self) -> Result<Option<DecodedMessage>, StreamError> {
        loop {
            while let Some(outcome) = self.try_extract() {
                match outcome {
                    FrameOutcome::Message(message) => {
                        self.stats.frames += 1;
                        debug!(
                            "stream {}: decoded frame ({} bytes, {} headers)",
                            self.label,
                            message.total_length,
                            message.headers.len()
                        );
                        return Ok(Some(message));
                    }
                    FrameOutcome::Skip(e) => {
                        self.stats.skipped += 1;
                        warn!("stream {}: dropping undecodable frame: {e}", self.label);
                    }
                }
            }

            if self.eof {
                if self.buf.is_empty() {
                    return Ok(None);
                }
                let buffered = self.buf.len();
                self.buf.clear();
                return Err(StreamError::TruncatedFrame { buffered });
            }

            let n = self.reader.read(&mut self.chunk).await?;
            if n == 0 {
                debug!("stream {}: end of input", self.label);
                self.eof = true;
            } else {
                self.stats.bytes_read += n as u64;
                self.buf.extend_from_slice(&self.chunk[..n]);
            }
        }
    }

    /// Drains the source into `tx` until end-of-input, a read error, or the
    /// receiver going away.
    ///
    /// A pending read is abandoned as soon as the receiver is dropped; bytes
    /// only enter the buffer once a read completes, so nothing is lost.
    pub async fn run(mut self, tx: mpsc::Sender<DecodedMessage>) -> DecodeReport {
        let error = loop {
            let next = tokio::select! {
                next = self.next_message() => next,
                _ = tx.closed() => {
                    debug!("stream {}: consumer closed while reading; stopping reader", self.label);
                    break None;
                }
            };
            match next {
                Ok(Some(message)) => {
                    if tx.send(message).await.is_err() {
                        debug!("stream {}: consumer closed; stopping reader", self.label);
                        break None;
                    }
                }
                Ok(None) => {
                    debug!(
                        "stream {}: finished ({} frames, {} skipped, {} bytes)",
                        self.label, self.stats.frames, self.stats.skipped, self.stats.bytes_read
                    );
                    break None;
                }
                Err(e) => {
                    warn!("stream {}: {e}", self.label);
                    break Some(e);
                }
            }
        };
        DecodeReport {
            stats: self.stats,
            error,
        }
    }

    /// Slices one frame off the front of the buffer, if a complete one is
    /// present.  Waits for at least a full prelude before looking.
    fn try_extract(&mut self) -> Option<FrameOutcome> {
        if self.buf.len() < PRELUDE_SIZE {
            return None;
        }
        let (frame, _rest) = extract_frame(&self.buf)?;
        let consumed = frame.len();
        let outcome = match decode_message(frame) {
            Ok(message) => FrameOutcome::Message(message),
            Err(e) => FrameOutcome::Skip(e),
        };
        self.buf.drain(..consumed);
        Some(outcome)
    }
}

/// Spawns a decoder worker for `reader`.
///
/// Returns the receiving end of a channel of `capacity` messages and the
/// worker's handle, which resolves to the stream's statistics and the error
/// that ended it, if any.  A capacity of zero is treated as one.
pub fn spawn_decoder<R>(
    reader: R,
    chunk_size: usize,
    capacity: usize,
    label: impl Into<String>,
) -> (
    mpsc::Receiver<DecodedMessage>,
    JoinHandle<DecodeReport>,
)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let decoder = StreamDecoder::with_chunk_size(reader, chunk_size, label);
    let handle = tokio::spawn(decoder.run(tx));
    (rx, handle)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
