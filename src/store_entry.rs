use crate::error::{ServerError, ServerResult};
use crate::static_asset::ContentCompression;
use bytes::{Bytes, BytesMut};
use futures::Stream;
use futures::StreamExt;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

/// Size of the chunks a stream hands out
pub const CHUNK_SIZE: usize = 64 * 1024;

/// Consumption state of a body stream. Only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum BodyState {
    /// Nothing has been read or cancelled
    Fresh,
    /// Reading started or the stream was cancelled
    Disturbed,
    /// Drained to the end
    Consumed,
}

#[derive(Debug)]
struct StreamInner {
    state: BodyState,
    locked: bool,
    cancelled: bool,
    chunks: VecDeque<Bytes>,
}

impl StreamInner {
    fn advance(&mut self, to: BodyState) {
        self.state = self.state.max(to);
    }

    fn next_chunk(&mut self) -> Option<Bytes> {
        self.advance(BodyState::Disturbed);
        let chunk = self.chunks.pop_front();
        // A cancelled stream reports end-of-data but was never drained
        if chunk.is_none() && !self.cancelled {
            self.advance(BodyState::Consumed);
        }
        chunk
    }

    fn cancel(&mut self) {
        self.advance(BodyState::Disturbed);
        self.cancelled = true;
        self.chunks.clear();
    }
}

/// Handle to a readable byte stream. Clones share the same state.
#[derive(Debug, Clone)]
pub struct ByteStream {
    inner: Arc<Mutex<StreamInner>>,
}

impl ByteStream {
    /// Create a stream yielding `source` in chunks of at most [`CHUNK_SIZE`]
    pub fn from_bytes(source: Bytes) -> Self {
        let mut chunks = VecDeque::with_capacity(source.len() / CHUNK_SIZE + 1);
        let mut offset = 0;
        while offset < source.len() {
            let end = (offset + CHUNK_SIZE).min(source.len());
            chunks.push_back(source.slice(offset..end));
            offset = end;
        }

        Self {
            inner: Arc::new(Mutex::new(StreamInner {
                state: BodyState::Fresh,
                locked: false,
                cancelled: false,
                chunks,
            })),
        }
    }

    /// Current consumption state
    pub fn state(&self) -> BodyState {
        self.inner.lock().state
    }

    /// Whether a reader currently holds the stream
    pub fn is_locked(&self) -> bool {
        self.inner.lock().locked
    }

    /// Whether reading has started or the stream was cancelled
    pub fn is_disturbed(&self) -> bool {
        self.state() != BodyState::Fresh
    }

    /// Acquire the exclusive reader
    pub fn get_reader(&self) -> ServerResult<StreamReader> {
        let mut inner = self.inner.lock();
        if inner.locked {
            return Err(ServerError::LockedStream);
        }
        inner.locked = true;

        Ok(StreamReader {
            stream: self.clone(),
        })
    }

    /// Discard the remaining data without consuming it
    pub fn cancel(&self) -> ServerResult<()> {
        let mut inner = self.inner.lock();
        if inner.locked {
            return Err(ServerError::LockedStream);
        }
        inner.cancel();
        Ok(())
    }
}

/// Exclusive reader of a [`ByteStream`]. The lock is released on drop.
#[derive(Debug)]
pub struct StreamReader {
    stream: ByteStream,
}

impl StreamReader {
    /// Read the next chunk, or `None` once the stream is exhausted
    pub async fn read(&mut self) -> Option<Bytes> {
        self.stream.inner.lock().next_chunk()
    }

    /// Cancel the stream through this reader
    pub fn cancel(&mut self) {
        self.stream.inner.lock().cancel();
    }

    /// Give the lock back
    pub fn release_lock(self) {}
}

impl Stream for StreamReader {
    type Item = Bytes;

    fn poll_next(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Poll::Ready(self.stream.inner.lock().next_chunk())
    }
}

impl Drop for StreamReader {
    fn drop(&mut self) {
        self.stream.inner.lock().locked = false;
    }
}

/// A body-style view of embedded bytes together with their validators
#[derive(Debug)]
pub struct EmbeddedStoreEntry {
    body: ByteStream,
    content_encoding: Option<ContentCompression>,
    hash: String,
    size: u64,
}

impl EmbeddedStoreEntry {
    /// Wrap a buffer. `source` is shared, not copied.
    pub fn new(
        source: Bytes,
        content_encoding: Option<ContentCompression>,
        hash: &str,
        size: u64,
    ) -> Self {
        Self {
            body: ByteStream::from_bytes(source),
            content_encoding,
            hash: hash.to_string(),
            size,
        }
    }

    /// The body stream; always the same handle for this entry
    pub fn body(&self) -> &ByteStream {
        &self.body
    }

    /// Whether the body has been fully taken
    pub fn body_used(&self) -> bool {
        self.body.state() == BodyState::Consumed
    }

    /// Take the whole body as an owned buffer independent of the source bytes
    pub async fn array_buffer(&self) -> ServerResult<Bytes> {
        if self.body_used() {
            return Err(ServerError::AlreadyConsumed);
        }
        if self.body.is_locked() {
            return Err(ServerError::LockedStream);
        }
        if self.body.is_disturbed() {
            return Err(ServerError::DisturbedBody);
        }

        let mut reader = self.body.get_reader()?;
        reader.stream.inner.lock().advance(BodyState::Disturbed);

        let mut result = BytesMut::with_capacity(self.size as usize);
        while let Some(chunk) = reader.next().await {
            result.extend_from_slice(&chunk);
        }
        reader.stream.inner.lock().advance(BodyState::Consumed);
        reader.release_lock();

        Ok(result.freeze())
    }

    /// Encoding of the bytes, `None` for the identity encoding
    pub fn content_encoding(&self) -> Option<ContentCompression> {
        self.content_encoding
    }

    /// Content hash recorded at build time
    pub fn hash(&self) -> &str {
        &self.hash
    }

    /// Size in bytes recorded at build time
    pub fn size(&self) -> u64 {
        self.size
    }
}
