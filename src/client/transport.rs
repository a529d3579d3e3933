//! Line transports over an async socket. `Transport` frames the socket into IRC lines, and
//! `Logged` also records every line it carries, for tests.
use std::{
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};

use futures_util::{ready, sink::Sink, stream::Stream};
use parking_lot::{RwLock, RwLockReadGuard};
use pin_project::pin_project;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::Framed;

use crate::error;
use crate::proto::line::LineCodec;

/// A socket framed into lines in the configured encoding.
#[pin_project]
pub struct Transport<T> {
    #[pin]
    inner: Framed<T, LineCodec>,
}

impl<T> Transport<T>
where
    T: AsyncRead + AsyncWrite,
{
    /// Frames `stream` with the codec of `encoding`.
    pub fn new(stream: T, encoding: &str) -> error::Result<Transport<T>> {
        let codec = LineCodec::new(encoding)?;
        Ok(Transport {
            inner: Framed::new(stream, codec),
        })
    }

    /// Gets the inner stream underlying the `Transport`.
    pub fn into_inner(self) -> Framed<T, LineCodec> {
        self.inner
    }
}

impl<T> Stream for Transport<T>
where
    T: AsyncRead + AsyncWrite,
{
    type Item = error::Result<String>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        match ready!(self.project().inner.poll_next(cx)) {
            Some(line) => Poll::Ready(Some(line.map_err(Into::into))),
            None => Poll::Ready(None),
        }
    }
}

impl<T> Sink<String> for Transport<T>
where
    T: AsyncRead + AsyncWrite,
{
    type Error = error::Error;

    fn poll_ready(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.project().inner.poll_ready(cx).map_err(Into::into)
    }

    fn start_send(self: Pin<&mut Self>, item: String) -> Result<(), Self::Error> {
        self.project().inner.start_send(item)?;
        Ok(())
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.project().inner.poll_flush(cx).map_err(Into::into)
    }

    fn poll_close(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.project().inner.poll_close(cx).map_err(Into::into)
    }
}

/// A view of the lines carried by a `Logged` transport.
#[derive(Clone, Debug, Default)]
pub struct LogView {
    sent: Arc<RwLock<Vec<String>>>,
    received: Arc<RwLock<Vec<String>>>,
}

impl LogView {
    /// Every line written, without its terminator.
    pub fn sent(&self) -> RwLockReadGuard<'_, Vec<String>> {
        self.sent.read()
    }

    /// Every line read.
    pub fn received(&self) -> RwLockReadGuard<'_, Vec<String>> {
        self.received.read()
    }
}

/// A `Transport` that records every line. This clones each line.
#[pin_project]
pub struct Logged<T> {
    #[pin]
    inner: Transport<T>,
    view: LogView,
}

impl<T> Logged<T>
where
    T: AsyncRead + AsyncWrite,
{
    /// Wraps the given `Transport` in logging.
    pub fn wrap(inner: Transport<T>) -> Logged<T> {
        Logged {
            inner,
            view: LogView::default(),
        }
    }

    /// Gets a view of the logging for this transport.
    pub fn view(&self) -> LogView {
        self.view.clone()
    }
}

impl<T> Stream for Logged<T>
where
    T: AsyncRead + AsyncWrite,
{
    type Item = error::Result<String>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.project();
        match ready!(this.inner.poll_next(cx)) {
            Some(Ok(line)) => {
                this.view.received.write().push(line.clone());
                Poll::Ready(Some(Ok(line)))
            }
            other => Poll::Ready(other),
        }
    }
}

impl<T> Sink<String> for Logged<T>
where
    T: AsyncRead + AsyncWrite,
{
    type Error = error::Error;

    fn poll_ready(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.project().inner.poll_ready(cx)
    }

    fn start_send(self: Pin<&mut Self>, item: String) -> Result<(), Self::Error> {
        let this = self.project();
        this.view.sent.write().push(item.clone());
        this.inner.start_send(item)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.project().inner.poll_flush(cx)
    }

    fn poll_close(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.project().inner.poll_close(cx)
    }
}
