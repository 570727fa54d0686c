//! Stream relay - moves process output from its channels to sinks
//!
//! Output arrives as a `ChunkStream` of tagged byte chunks. Every consumer
//! here follows the same shape: a producer task pulls the stream and forwards
//! chunks over a bounded channel, the caller's task drains the channel into
//! the sinks, and the producer is joined before the function returns.
//!
//! - `pipe` routes stdout/stderr chunks to their own sinks
//! - `DisplayRelay` merges both channels into one live feed, decoded to runes,
//!   with line breaks rewritten for CLI indentation
//! - `LineSplitter` turns chunks into lines for text scanners

use futures::stream::{self, BoxStream, StreamExt};
use std::io;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Capacity of the channel between a producer and its consumer
pub const RELAY_CHANNEL_CAPACITY: usize = 64;

const READ_BUF_SIZE: usize = 8 * 1024;

/// Output channel of a process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamKind {
    Stdout,
    Stderr,
}

/// A piece of output read from one channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub kind: StreamKind,
    pub bytes: Vec<u8>,
}

impl Chunk {
    pub fn stdout(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            kind: StreamKind::Stdout,
            bytes: bytes.into(),
        }
    }

    pub fn stderr(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            kind: StreamKind::Stderr,
            bytes: bytes.into(),
        }
    }
}

/// Live, ordered output of one process
pub type ChunkStream = BoxStream<'static, io::Result<Chunk>>;

// ============================================================================
// Producers
// ============================================================================

/// Merge a process's stdout and stderr readers into one stream
///
/// One reader task per channel feeds a shared bounded channel, so chunks come
/// out in arrival order. The stream ends once both readers hit end-of-file.
pub fn merge<O, E>(stdout: Option<O>, stderr: Option<E>) -> ChunkStream
where
    O: AsyncRead + Send + Unpin + 'static,
    E: AsyncRead + Send + Unpin + 'static,
{
    let (tx, rx) = mpsc::channel(RELAY_CHANNEL_CAPACITY);

    if let Some(reader) = stdout {
        tokio::spawn(read_channel(reader, StreamKind::Stdout, tx.clone()));
    }
    if let Some(reader) = stderr {
        tokio::spawn(read_channel(reader, StreamKind::Stderr, tx.clone()));
    }
    drop(tx);

    receiver_stream(rx)
}

/// Stream over an in-memory script of chunks
pub fn from_chunks(chunks: Vec<Chunk>) -> ChunkStream {
    stream::iter(chunks.into_iter().map(Ok)).boxed()
}

async fn read_channel<R>(mut reader: R, kind: StreamKind, tx: mpsc::Sender<io::Result<Chunk>>)
where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; READ_BUF_SIZE];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                let chunk = Chunk {
                    kind,
                    bytes: buf[..n].to_vec(),
                };
                if tx.send(Ok(chunk)).await.is_err() {
                    break;
                }
            }
            Err(e) => {
                let _ = tx.send(Err(e)).await;
                break;
            }
        }
    }
}

fn receiver_stream(rx: mpsc::Receiver<io::Result<Chunk>>) -> ChunkStream {
    stream::unfold(rx, |mut rx| async move { rx.recv().await.map(|item| (item, rx)) }).boxed()
}

/// Pull `output` on a dedicated task, forwarding into a bounded channel
fn spawn_forwarder(
    mut output: ChunkStream,
) -> (mpsc::Receiver<io::Result<Chunk>>, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(RELAY_CHANNEL_CAPACITY);
    let handle = tokio::spawn(async move {
        while let Some(item) = output.next().await {
            let failed = item.is_err();
            if tx.send(item).await.is_err() || failed {
                break;
            }
        }
    });
    (rx, handle)
}

/// Join the forwarder; with `abort` it is stopped first
///
/// A consumer that gave up must abort: the forwarder may be parked on a
/// stream that stays silent for as long as the process lives.
async fn join_forwarder(handle: JoinHandle<()>, abort: bool) -> io::Result<()> {
    if abort {
        handle.abort();
    }
    match handle.await {
        Ok(()) => Ok(()),
        Err(e) if e.is_cancelled() => Ok(()),
        Err(e) => Err(io::Error::other(format!("relay task failed: {}", e))),
    }
}

// ============================================================================
// Pipe
// ============================================================================

/// Relay every chunk to the sink of its channel until the stream ends
///
/// A channel without a sink is drained and discarded. Returns the number of
/// bytes read from the stream.
pub async fn pipe<O, E>(
    output: ChunkStream,
    mut stdout: Option<&mut O>,
    mut stderr: Option<&mut E>,
) -> io::Result<u64>
where
    O: AsyncWrite + Unpin + ?Sized,
    E: AsyncWrite + Unpin + ?Sized,
{
    let (mut rx, producer) = spawn_forwarder(output);

    let mut total = 0u64;
    let mut outcome = Ok(());
    let mut sink_failed = false;
    while let Some(item) = rx.recv().await {
        let chunk = match item {
            Ok(chunk) => chunk,
            Err(e) => {
                outcome = Err(e);
                break;
            }
        };
        total += chunk.bytes.len() as u64;

        let written = match chunk.kind {
            StreamKind::Stdout => match stdout.as_deref_mut() {
                Some(sink) => sink.write_all(&chunk.bytes).await,
                None => Ok(()),
            },
            StreamKind::Stderr => match stderr.as_deref_mut() {
                Some(sink) => sink.write_all(&chunk.bytes).await,
                None => Ok(()),
            },
        };
        if let Err(e) = written {
            outcome = Err(e);
            sink_failed = true;
            break;
        }
    }

    drop(rx);
    join_forwarder(producer, sink_failed).await?;
    outcome?;

    if let Some(sink) = stdout {
        sink.flush().await?;
    }
    if let Some(sink) = stderr {
        sink.flush().await?;
    }
    Ok(total)
}

// ============================================================================
// Display relay
// ============================================================================

/// Replacement text for hard line-break runes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineBreakStyle {
    newline: String,
    carriage_return: String,
}

impl LineBreakStyle {
    pub fn new(newline: impl Into<String>, carriage_return: impl Into<String>) -> Self {
        Self {
            newline: newline.into(),
            carriage_return: carriage_return.into(),
        }
    }

    /// Keep the break and follow it with `indent`
    pub fn indented(indent: &str) -> Self {
        Self::new(format!("\n{}", indent), format!("\r{}", indent))
    }

    /// Leave line breaks untouched
    pub fn verbatim() -> Self {
        Self::new("\n", "\r")
    }

    fn replacement(&self, rune: char) -> Option<&str> {
        match rune {
            '\n' => Some(&self.newline),
            '\r' => Some(&self.carriage_return),
            _ => None,
        }
    }
}

impl Default for LineBreakStyle {
    fn default() -> Self {
        Self::indented("   ")
    }
}

/// Incremental UTF-8 decoder that tolerates runes split across chunks
///
/// Invalid sequences decode to U+FFFD, one per malformed sequence.
#[derive(Debug, Default)]
pub struct RuneDecoder {
    pending: Vec<u8>,
}

impl RuneDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode `bytes`, appending complete runes to `out`
    pub fn push(&mut self, bytes: &[u8], out: &mut String) {
        self.pending.extend_from_slice(bytes);

        let mut consumed = 0;
        loop {
            let rest = &self.pending[consumed..];
            match std::str::from_utf8(rest) {
                Ok(text) => {
                    out.push_str(text);
                    consumed = self.pending.len();
                    break;
                }
                Err(e) => {
                    let valid = e.valid_up_to();
                    if let Ok(text) = std::str::from_utf8(&rest[..valid]) {
                        out.push_str(text);
                    }
                    consumed += valid;
                    match e.error_len() {
                        Some(bad) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            consumed += bad;
                        }
                        // truncated rune at the end; wait for more bytes
                        None => break,
                    }
                }
            }
        }

        self.pending.drain(..consumed);
    }

    /// Flush a dangling partial rune at end of stream
    pub fn finish(&mut self, out: &mut String) {
        if !self.pending.is_empty() {
            self.pending.clear();
            out.push(char::REPLACEMENT_CHARACTER);
        }
    }
}

/// Renders merged process output as one live display feed
#[derive(Debug, Clone, Default)]
pub struct DisplayRelay {
    style: LineBreakStyle,
}

impl DisplayRelay {
    pub fn new(style: LineBreakStyle) -> Self {
        Self { style }
    }

    pub fn style(&self) -> &LineBreakStyle {
        &self.style
    }

    /// Apply the line-break style to already decoded text
    pub fn render_text(&self, text: &str, out: &mut String) {
        for rune in text.chars() {
            match self.style.replacement(rune) {
                Some(replacement) => out.push_str(replacement),
                None => out.push(rune),
            }
        }
    }

    /// Relay both channels of `output` into `sink` until the stream ends
    pub async fn run<W>(&self, output: ChunkStream, sink: &mut W) -> io::Result<()>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        let (mut rx, producer) = spawn_forwarder(output);

        let mut decoder = RuneDecoder::new();
        let mut decoded = String::new();
        let mut rendered = String::new();
        let mut outcome = Ok(());
        let mut sink_failed = false;

        while let Some(item) = rx.recv().await {
            let chunk = match item {
                Ok(chunk) => chunk,
                Err(e) => {
                    outcome = Err(e);
                    break;
                }
            };

            decoded.clear();
            rendered.clear();
            decoder.push(&chunk.bytes, &mut decoded);
            self.render_text(&decoded, &mut rendered);

            if rendered.is_empty() {
                continue;
            }
            let written = match sink.write_all(rendered.as_bytes()).await {
                // live display: push each chunk out immediately
                Ok(()) => sink.flush().await,
                Err(e) => Err(e),
            };
            if let Err(e) = written {
                outcome = Err(e);
                sink_failed = true;
                break;
            }
        }

        drop(rx);
        join_forwarder(producer, sink_failed).await?;
        outcome?;

        decoded.clear();
        decoder.finish(&mut decoded);
        if !decoded.is_empty() {
            sink.write_all(decoded.as_bytes()).await?;
        }
        sink.flush().await
    }
}

// ============================================================================
// Line splitting
// ============================================================================

/// Splits a byte stream into text lines
///
/// Lines are split on `\n`; a trailing `\r` is dropped and invalid UTF-8 is
/// replaced.
#[derive(Debug, Default)]
pub struct LineSplitter {
    partial: Vec<u8>,
}

impl LineSplitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed bytes, returning every line completed by them
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        let mut lines = Vec::new();
        for &byte in bytes {
            if byte == b'\n' {
                lines.push(Self::take_line(&mut self.partial));
            } else {
                self.partial.push(byte);
            }
        }
        lines
    }

    /// The final unterminated line, if any
    pub fn finish(&mut self) -> Option<String> {
        if self.partial.is_empty() {
            None
        } else {
            Some(Self::take_line(&mut self.partial))
        }
    }

    fn take_line(partial: &mut Vec<u8>) -> String {
        if partial.last() == Some(&b'\r') {
            partial.pop();
        }
        let line = String::from_utf8_lossy(partial).into_owned();
        partial.clear();
        line
    }
}
