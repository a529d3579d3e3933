//! An in-memory socket for driver tests: it hands back canned server lines and keeps what the
//! session wrote.
use std::{
    io::{self, Cursor, Read},
    pin::Pin,
    task::{Context, Poll},
};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

/// A socket reading from a fixed script and recording writes.
#[derive(Clone, Debug, Default)]
pub struct MockStream {
    script: Cursor<Vec<u8>>,
    output: Vec<u8>,
}

impl MockStream {
    /// A stream that is at EOF immediately.
    pub fn empty() -> MockStream {
        MockStream::default()
    }

    /// A stream that reads `script` and then reaches EOF.
    pub fn new(script: &[u8]) -> MockStream {
        MockStream {
            script: Cursor::new(script.to_vec()),
            output: vec![],
        }
    }

    /// A stream that reads the given lines, each ended by CRLF.
    pub fn from_lines(lines: &[&str]) -> MockStream {
        let script: String = lines.iter().map(|l| format!("{}\r\n", l)).collect();
        MockStream::new(script.as_bytes())
    }

    /// Everything written so far.
    pub fn written(&self) -> &[u8] {
        &self.output
    }

    /// Whether the whole script has been read.
    pub fn exhausted(&self) -> bool {
        self.script.position() as usize >= self.script.get_ref().len()
    }
}

impl AsyncRead for MockStream {
    fn poll_read(mut self: Pin<&mut Self>, _: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
        let n = self.script.read(buf.initialize_unfilled())?;
        buf.advance(n);
        Poll::Ready(Ok(()))
    }
}

impl AsyncWrite for MockStream {
    fn poll_write(mut self: Pin<&mut Self>, _: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        self.output.extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}
