//! Scripted backend and sinks for unit tests

use crate::backend::{ExecBackend, ExecInspection, ExecRequest, ExecSession};
use crate::error::{ExecError, Result};
use crate::relay::{self, Chunk, ChunkStream};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use parking_lot::Mutex;
use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::task::{Context, Poll};
use tokio::io::AsyncWrite;

/// What the output stream does after the scripted chunks
#[derive(Debug, Clone)]
enum Tail {
    End,
    /// Never yields again, like a silent long-running process
    Pending,
    /// Fails with an I/O error
    Error(String),
}

/// Replays canned output and a fixed exit code, counting every call
pub struct ScriptedBackend {
    chunks: Vec<Chunk>,
    exit_code: Option<i64>,
    launch_error: Option<String>,
    tail: Tail,
    starts: AtomicUsize,
    inspects: AtomicUsize,
    cancels: AtomicUsize,
    requests: Mutex<Vec<ExecRequest>>,
}

impl ScriptedBackend {
    pub fn new(chunks: Vec<Chunk>, exit_code: i64) -> Self {
        Self {
            chunks,
            exit_code: Some(exit_code),
            launch_error: None,
            tail: Tail::End,
            starts: AtomicUsize::new(0),
            inspects: AtomicUsize::new(0),
            cancels: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Backend whose stdout is `text` and which exits 0
    pub fn stdout(text: &str) -> Self {
        Self::new(vec![Chunk::stdout(text)], 0)
    }

    pub fn failing_launch(message: &str) -> Self {
        let mut backend = Self::new(Vec::new(), 0);
        backend.launch_error = Some(message.to_string());
        backend
    }

    /// Output never ends
    pub fn hanging() -> Self {
        Self::stalled(Vec::new())
    }

    /// Emits `chunks`, then goes silent without closing
    pub fn stalled(chunks: Vec<Chunk>) -> Self {
        let mut backend = Self::new(chunks, 0);
        backend.tail = Tail::Pending;
        backend
    }

    /// Emits `chunks`, then fails the stream with `message`
    pub fn broken_stream(chunks: Vec<Chunk>, message: &str) -> Self {
        let mut backend = Self::new(chunks, 0);
        backend.tail = Tail::Error(message.to_string());
        backend
    }

    pub fn without_exit_code(mut self) -> Self {
        self.exit_code = None;
        self
    }

    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn inspects(&self) -> usize {
        self.inspects.load(Ordering::SeqCst)
    }

    pub fn cancels(&self) -> usize {
        self.cancels.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<ExecRequest> {
        self.requests.lock().last().cloned()
    }
}

#[async_trait]
impl ExecBackend for ScriptedBackend {
    async fn exec_start(&self, request: &ExecRequest) -> Result<ExecSession> {
        let n = self.starts.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().push(request.clone());

        if let Some(message) = &self.launch_error {
            return Err(ExecError::Launch(message.clone()));
        }

        let scripted = relay::from_chunks(self.chunks.clone());
        let output: ChunkStream = match &self.tail {
            Tail::End => scripted,
            Tail::Pending => scripted.chain(stream::pending()).boxed(),
            Tail::Error(message) => {
                let err = io::Error::new(io::ErrorKind::ConnectionReset, message.clone());
                scripted.chain(stream::iter(vec![Err(err)])).boxed()
            }
        };

        Ok(ExecSession {
            id: format!("scripted-{}", n),
            output,
        })
    }

    async fn exec_inspect(&self, _exec_id: &str) -> Result<ExecInspection> {
        self.inspects.fetch_add(1, Ordering::SeqCst);
        Ok(ExecInspection {
            exit_code: self.exit_code,
            running: self.exit_code.is_none(),
        })
    }

    async fn exec_cancel(&self, _exec_id: &str) -> Result<()> {
        self.cancels.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn is_available(&self) -> bool {
        true
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

/// Sink whose every write fails
pub struct FailingSink;

impl AsyncWrite for FailingSink {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        _buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Poll::Ready(Err(io::Error::new(io::ErrorKind::BrokenPipe, "sink gone")))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}
