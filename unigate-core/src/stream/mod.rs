//! Streaming normalization
//!
//! One pure state machine turns raw provider frames into canonical
//! `StreamChunk`s; the async and blocking bindings are thin shells over it,
//! so both surfaces emit identical chunk sequences for identical input.
//! Degraded input never kills a live stream: empty frames become keep-alive
//! chunks and malformed frames become empty chunks.

use crate::protocol::types::{StreamChunk, Usage};
use crate::providers::adapter::ProviderConfig;
use crate::providers::GatewayResult;
use futures::stream::BoxStream;
use futures::{ready, Stream, StreamExt};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tracing::{debug, warn};

/// Sentinel frame signalling end of stream
const DONE_SENTINEL: &str = "[DONE]";

/// Lifecycle of a normalized stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    AwaitingFirstChunk,
    Streaming,
    Terminated,
}

/// Result of feeding one raw frame to the normalizer
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// A chunk to emit; the stream continues
    Chunk(StreamChunk),
    /// The terminal chunk; no further chunks follow
    Final(StreamChunk),
    /// Stream is over with nothing left to emit
    Done,
}

/// Pure frame-to-chunk state machine
///
/// Holds no I/O; both stream bindings drive it frame by frame.
pub struct ChunkNormalizer {
    state: StreamState,
    config: Arc<dyn ProviderConfig>,
    model: String,
    final_usage: Option<Usage>,
}

impl ChunkNormalizer {
    pub fn new(config: Arc<dyn ProviderConfig>, model: impl Into<String>) -> Self {
        Self {
            state: StreamState::AwaitingFirstChunk,
            config,
            model: model.into(),
            final_usage: None,
        }
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    /// Usage reported by the terminal chunk, if the provider sent one
    pub fn final_usage(&self) -> Option<&Usage> {
        self.final_usage.as_ref()
    }

    fn keep_alive(&self) -> StreamChunk {
        let mut chunk = StreamChunk::empty();
        chunk.model = self.model.clone();
        chunk
    }

    /// Feed one raw frame and get the event to surface.
    ///
    /// Total over its input: a frame never produces an error, only a chunk or
    /// termination. After termination every frame yields `Done`.
    pub fn feed(&mut self, raw: &str) -> StreamEvent {
        if self.state == StreamState::Terminated {
            return StreamEvent::Done;
        }

        let trimmed = raw.trim();

        // Keep-alive: emit a zero-content chunk without touching the state,
        // so idle-timeout layers above see liveness.
        if trimmed.is_empty() {
            return StreamEvent::Chunk(self.keep_alive());
        }

        if trimmed == DONE_SENTINEL {
            self.state = StreamState::Terminated;
            return StreamEvent::Done;
        }

        let chunk = match self.config.parse_stream_chunk(trimmed) {
            Some(chunk) => chunk,
            None => {
                if serde_json::from_str::<serde_json::Value>(trimmed).is_err() {
                    warn!(
                        provider = self.config.name(),
                        "malformed stream frame, emitting empty chunk"
                    );
                } else {
                    debug!(provider = self.config.name(), "frame carried no chunk");
                }
                if self.state == StreamState::AwaitingFirstChunk {
                    self.state = StreamState::Streaming;
                }
                return StreamEvent::Chunk(self.keep_alive());
            }
        };

        if self.state == StreamState::AwaitingFirstChunk {
            self.state = StreamState::Streaming;
        }

        if let Some(usage) = &chunk.usage {
            self.final_usage = Some(usage.clone());
        }

        if chunk.finish_reason.is_some() {
            self.state = StreamState::Terminated;
            StreamEvent::Final(chunk)
        } else {
            StreamEvent::Chunk(chunk)
        }
    }
}

/// Async binding: normalized chunks over an SSE frame stream
///
/// Fused after termination; dropping it cancels the transport read.
pub struct NormalizedStream {
    frames: BoxStream<'static, GatewayResult<String>>,
    normalizer: ChunkNormalizer,
    done: bool,
}

impl NormalizedStream {
    pub fn new(
        frames: BoxStream<'static, GatewayResult<String>>,
        normalizer: ChunkNormalizer,
    ) -> Self {
        Self {
            frames,
            normalizer,
            done: false,
        }
    }

    pub fn final_usage(&self) -> Option<&Usage> {
        self.normalizer.final_usage()
    }
}

impl Stream for NormalizedStream {
    type Item = GatewayResult<StreamChunk>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            if self.done {
                return Poll::Ready(None);
            }

            match ready!(self.frames.poll_next_unpin(cx)) {
                Some(Ok(frame)) => match self.normalizer.feed(&frame) {
                    StreamEvent::Chunk(chunk) => return Poll::Ready(Some(Ok(chunk))),
                    StreamEvent::Final(chunk) => {
                        self.done = true;
                        return Poll::Ready(Some(Ok(chunk)));
                    }
                    StreamEvent::Done => {
                        self.done = true;
                    }
                },
                Some(Err(e)) => {
                    self.done = true;
                    return Poll::Ready(Some(Err(e)));
                }
                None => {
                    self.done = true;
                }
            }
        }
    }
}

/// Blocking binding: normalized chunks over pre-collected frames
///
/// Same state machine as [`NormalizedStream`], fused after termination.
pub struct BlockingChunks<I> {
    frames: I,
    normalizer: ChunkNormalizer,
    done: bool,
}

impl<I: Iterator<Item = String>> BlockingChunks<I> {
    pub fn new(frames: I, normalizer: ChunkNormalizer) -> Self {
        Self {
            frames,
            normalizer,
            done: false,
        }
    }

    pub fn final_usage(&self) -> Option<&Usage> {
        self.normalizer.final_usage()
    }
}

impl<I: Iterator<Item = String>> Iterator for BlockingChunks<I> {
    type Item = StreamChunk;

    fn next(&mut self) -> Option<StreamChunk> {
        loop {
            if self.done {
                return None;
            }
            match self.frames.next() {
                Some(frame) => match self.normalizer.feed(&frame) {
                    StreamEvent::Chunk(chunk) => return Some(chunk),
                    StreamEvent::Final(chunk) => {
                        self.done = true;
                        return Some(chunk);
                    }
                    StreamEvent::Done => self.done = true,
                },
                None => self.done = true,
            }
        }
    }
}
