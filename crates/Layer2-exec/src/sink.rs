//! Output sinks
//!
//! A sink is any `AsyncWrite`. `CaptureBuffer` is the in-memory sink the
//! runner allocates when the caller supplies none; `TeeWriter` forwards to a
//! caller sink while keeping a copy for error diagnostics.

use parking_lot::Mutex;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::io::AsyncWrite;

/// Boxed output sink owned by a `CommandSpec`
pub type Sink = Box<dyn AsyncWrite + Send + Unpin>;

/// Shared in-memory buffer; clones write to the same storage
#[derive(Debug, Clone, Default)]
pub struct CaptureBuffer {
    inner: Arc<Mutex<Vec<u8>>>,
}

impl CaptureBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Captured bytes as text (invalid UTF-8 is replaced)
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.inner.lock()).into_owned()
    }

    pub fn bytes(&self) -> Vec<u8> {
        self.inner.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    pub(crate) fn extend(&self, buf: &[u8]) {
        self.inner.lock().extend_from_slice(buf);
    }
}

impl AsyncWrite for CaptureBuffer {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        self.extend(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

/// Writes to `primary` and records every accepted byte in `capture`
pub struct TeeWriter {
    primary: Sink,
    capture: CaptureBuffer,
}

impl TeeWriter {
    pub fn new(primary: Sink, capture: CaptureBuffer) -> Self {
        Self { primary, capture }
    }
}

impl AsyncWrite for TeeWriter {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = &mut *self;
        match Pin::new(&mut this.primary).poll_write(cx, buf) {
            Poll::Ready(Ok(n)) => {
                // record only the prefix the primary accepted
                this.capture.extend(&buf[..n]);
                Poll::Ready(Ok(n))
            }
            other => other,
        }
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.primary).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.primary).poll_shutdown(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;

    #[tokio::test]
    async fn test_capture_buffer_clones_share_storage() {
        let buffer = CaptureBuffer::new();
        let mut writer = buffer.clone();

        writer.write_all(b"hello ").await.unwrap();
        writer.write_all(b"world").await.unwrap();

        assert_eq!(buffer.contents(), "hello world");
        assert_eq!(buffer.len(), 11);
    }

    #[tokio::test]
    async fn test_tee_writes_both() {
        let primary = CaptureBuffer::new();
        let capture = CaptureBuffer::new();
        let mut tee = TeeWriter::new(Box::new(primary.clone()), capture.clone());

        tee.write_all(b"diagnostic line\n").await.unwrap();
        tee.flush().await.unwrap();

        assert_eq!(primary.contents(), "diagnostic line\n");
        assert_eq!(capture.contents(), "diagnostic line\n");
    }

    #[test]
    fn test_lossy_contents() {
        let buffer = CaptureBuffer::new();
        buffer.extend(&[b'o', b'k', 0xff]);
        assert_eq!(buffer.contents(), "ok\u{FFFD}");
        assert_eq!(buffer.bytes(), vec![b'o', b'k', 0xff]);
    }
}
