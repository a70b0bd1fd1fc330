//! Line-delimited JSON transport over an async byte stream
//!
//! Shared by the process and socket adapters: one reader task decoding lines
//! into messages, one writer task draining an unbounded outgoing queue.
//! Lines longer than the configured limit are skipped on both sides.

use bytes::BytesMut;
use futures::{SinkExt, StreamExt};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::codec::{Decoder, Encoder, FramedRead, FramedWrite, LinesCodec, LinesCodecError};
use tracing::{debug, warn};

use crate::error::Result;
use crate::ipc::channel::ChannelState;
use crate::ipc::protocol::Message;
use crate::utils::lock::lock;

/// Longest message line accepted by default (16 MiB)
pub const DEFAULT_MAX_MESSAGE_LENGTH: usize = 16 * 1024 * 1024;

/// [`LinesCodec`] that drops overlong lines and keeps decoding
pub(crate) struct BoundedLinesCodec {
    kind: &'static str,
    inner: LinesCodec,
}

impl BoundedLinesCodec {
    pub(crate) fn new(kind: &'static str, max_length: usize) -> Self {
        Self {
            kind,
            inner: LinesCodec::new_with_max_length(max_length),
        }
    }

    fn skipped(&self) {
        warn!(
            "{} channel skipped a line longer than {} bytes",
            self.kind,
            self.inner.max_length()
        );
    }
}

impl Decoder for BoundedLinesCodec {
    type Item = String;
    type Error = LinesCodecError;

    fn decode(&mut self, buf: &mut BytesMut) -> std::result::Result<Option<String>, LinesCodecError> {
        loop {
            match self.inner.decode(buf) {
                // The inner codec discards up to the next newline on the following call
                Err(LinesCodecError::MaxLineLengthExceeded) => self.skipped(),
                other => return other,
            }
        }
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> std::result::Result<Option<String>, LinesCodecError> {
        loop {
            match self.inner.decode_eof(buf) {
                Err(LinesCodecError::MaxLineLengthExceeded) => self.skipped(),
                other => return other,
            }
        }
    }
}

impl Encoder<String> for BoundedLinesCodec {
    type Error = LinesCodecError;

    fn encode(&mut self, line: String, buf: &mut BytesMut) -> std::result::Result<(), LinesCodecError> {
        self.inner.encode(line, buf)
    }
}

pub(crate) struct LineTransport {
    pub(crate) state: Arc<ChannelState>,
    max_length: usize,
    outgoing: Mutex<Option<mpsc::UnboundedSender<String>>>,
    reader: Mutex<Option<JoinHandle<()>>>,
}

impl LineTransport {
    /// Start the reader and writer tasks. Must be called within a Tokio runtime.
    pub(crate) fn spawn<R, W>(kind: &'static str, reader: R, writer: W, max_length: usize) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let state = Arc::new(ChannelState::new(kind));

        let (tx, mut rx) = mpsc::unbounded_channel::<String>();
        let writer_state = Arc::clone(&state);
        tokio::spawn(async move {
            let mut sink = FramedWrite::new(writer, BoundedLinesCodec::new(kind, max_length));
            while let Some(line) = rx.recv().await {
                if let Err(e) = sink.send(line).await {
                    warn!("{} channel write failed: {}", writer_state.kind(), e);
                    writer_state.mark_closed();
                    break;
                }
            }
            debug!("{} channel writer stopped", writer_state.kind());
        });

        let reader_state = Arc::clone(&state);
        let reader = tokio::spawn(async move {
            let mut lines = FramedRead::new(reader, BoundedLinesCodec::new(kind, max_length));
            while let Some(next) = lines.next().await {
                match next {
                    Ok(line) => {
                        if line.trim().is_empty() {
                            continue;
                        }
                        match Message::from_text(&line) {
                            Ok(msg) => reader_state.deliver(msg),
                            Err(e) => {
                                warn!("{} channel dropped malformed message: {}", reader_state.kind(), e)
                            }
                        }
                    }
                    Err(e) => {
                        warn!("{} channel read failed: {}", reader_state.kind(), e);
                        break;
                    }
                }
            }
            debug!("{} channel reached end of stream", reader_state.kind());
            reader_state.mark_closed();
        });

        Self {
            state,
            max_length,
            outgoing: Mutex::new(Some(tx)),
            reader: Mutex::new(Some(reader)),
        }
    }

    pub(crate) fn send(&self, msg: &Message) -> Result<bool> {
        self.state.ensure_live()?;
        if self.state.is_closed() {
            return Ok(false);
        }
        let text = msg.to_text()?;
        if text.len() > self.max_length {
            warn!(
                "{} channel refused message {} of {} bytes (limit {})",
                self.state.kind(),
                msg.id,
                text.len(),
                self.max_length
            );
            return Ok(false);
        }
        match lock(&self.outgoing).as_ref() {
            Some(tx) => Ok(tx.send(text).is_ok()),
            None => Ok(false),
        }
    }

    /// Stop reading and let the writer flush what is queued
    pub(crate) fn shutdown(&self) {
        if !self.state.begin_dispose() {
            return;
        }
        lock(&self.outgoing).take();
        if let Some(reader) = lock(&self.reader).take() {
            reader.abort();
        }
        self.state.mark_closed();
    }
}

impl Drop for LineTransport {
    fn drop(&mut self) {
        if let Some(reader) = lock(&self.reader).take() {
            reader.abort();
        }
    }
}
