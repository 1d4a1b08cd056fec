use std::io::{Result as IoResult};
use std::pin::{Pin};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio_native_tls::{TlsStream};

/// An `Io` implementation that wraps a secure or insecure transport into a
/// single type.
pub enum ClientIo<T> {
    /// Insecure transport
    Plain(T),
    /// Secure transport
    Secure(TlsStream<T>),
}

impl<T> ClientIo<T> {
    /// Take back the plain transport for a `STARTTLS` upgrade.
    ///
    /// Returns `None` when the transport is already secure.
    pub fn into_plain(self) -> Option<T> {
        match self {
            ClientIo::Plain(io) => Some(io),
            ClientIo::Secure(_) => None,
        }
    }

    pub fn is_secure(&self) -> bool {
        match *self {
            ClientIo::Plain(_) => false,
            ClientIo::Secure(_) => true,
        }
    }
}

impl<T> AsyncRead for ClientIo<T>
where T: AsyncRead + AsyncWrite + Unpin
{
    fn poll_read(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<IoResult<()>> {
        match self.get_mut() {
            ClientIo::Plain(stream) => Pin::new(stream).poll_read(cx, buf),
            ClientIo::Secure(stream) => Pin::new(stream).poll_read(cx, buf),
        }
    }
}

impl<T> AsyncWrite for ClientIo<T>
where T: AsyncRead + AsyncWrite + Unpin
{
    fn poll_write(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &[u8]) -> Poll<IoResult<usize>> {
        match self.get_mut() {
            ClientIo::Plain(stream) => Pin::new(stream).poll_write(cx, buf),
            ClientIo::Secure(stream) => Pin::new(stream).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<IoResult<()>> {
        match self.get_mut() {
            ClientIo::Plain(stream) => Pin::new(stream).poll_flush(cx),
            ClientIo::Secure(stream) => Pin::new(stream).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<IoResult<()>> {
        match self.get_mut() {
            ClientIo::Plain(stream) => Pin::new(stream).poll_shutdown(cx),
            ClientIo::Secure(stream) => Pin::new(stream).poll_shutdown(cx),
        }
    }
}

// `220 ` or `220-`: three digits and a separator.
const OPENING_LEN: usize = 4;

/// The first bytes a peer sent over a [`RecordedStream`].
///
/// Survives the stream, so it can be inspected after a failed TLS handshake
/// has consumed it.
#[derive(Clone, Debug, Default)]
pub struct Opening(Arc<Mutex<Vec<u8>>>);

impl Opening {
    /// Whether the peer opened with an SMTP reply rather than TLS records.
    pub fn is_smtp_reply(&self) -> bool {
        match self.0.lock() {
            Ok(head) => head.len() == OPENING_LEN
                && head[..3].iter().all(u8::is_ascii_digit)
                && matches!(head[3], b' ' | b'-'),
            Err(_) => false,
        }
    }

    fn record(&self, data: &[u8]) -> bool {
        match self.0.lock() {
            Ok(mut head) => {
                let wanted = (OPENING_LEN - head.len()).min(data.len());
                head.extend_from_slice(&data[..wanted]);
                head.len() == OPENING_LEN
            },
            Err(_) => true,
        }
    }
}

/// A stream that keeps a copy of the first bytes it reads.
pub struct RecordedStream<T> {
    inner: T,
    opening: Opening,
    complete: bool,
}

impl<T> RecordedStream<T> {
    pub fn new(inner: T) -> (Self, Opening) {
        let opening = Opening::default();
        let stream = RecordedStream {
            inner,
            opening: opening.clone(),
            complete: false,
        };
        (stream, opening)
    }
}

impl<T> AsyncRead for RecordedStream<T>
where T: AsyncRead + Unpin
{
    fn poll_read(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<IoResult<()>> {
        let this = self.get_mut();
        let before = buf.filled().len();
        let poll = Pin::new(&mut this.inner).poll_read(cx, buf);
        if !this.complete {
            if let Poll::Ready(Ok(())) = poll {
                let read = &buf.filled()[before..];
                if !read.is_empty() {
                    this.complete = this.opening.record(read);
                }
            }
        }
        poll
    }
}

impl<T> AsyncWrite for RecordedStream<T>
where T: AsyncWrite + Unpin
{
    fn poll_write(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &[u8]) -> Poll<IoResult<usize>> {
        Pin::new(&mut self.get_mut().inner).poll_write(cx, buf)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<IoResult<()>> {
        Pin::new(&mut self.get_mut().inner).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<IoResult<()>> {
        Pin::new(&mut self.get_mut().inner).poll_shutdown(cx)
    }
}
