//! Lazy event stream over a response body

use crate::decoder::StreamDecoder;
use crate::events::StreamEvent;
use crmai_common::Result;
use futures::stream::BoxStream;
use futures_util::Stream;
use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll};

/// Raw response body delivered in transport-sized pieces
pub type ByteStream = BoxStream<'static, Result<Vec<u8>>>;

/// Decodes a byte stream into [`StreamEvent`]s.
///
/// Finite and not restartable: it ends after the first End or Error event,
/// after a transport error, or on closure of the body (which yields an
/// implicit End).
pub struct EventStream<S = ByteStream> {
    inner: S,
    decoder: StreamDecoder,
    pending: VecDeque<StreamEvent>,
    inner_closed: bool,
    done: bool,
}

impl<S> EventStream<S>
where
    S: Stream<Item = Result<Vec<u8>>> + Unpin,
{
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            decoder: StreamDecoder::new(),
            pending: VecDeque::new(),
            inner_closed: false,
            done: false,
        }
    }

    /// Text of all chunks decoded so far
    pub fn accumulated(&self) -> &str {
        self.decoder.accumulated()
    }

    pub fn decoder(&self) -> &StreamDecoder {
        &self.decoder
    }
}

impl<S> Stream for EventStream<S>
where
    S: Stream<Item = Result<Vec<u8>>> + Unpin,
{
    type Item = Result<StreamEvent>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        loop {
            if let Some(event) = this.pending.pop_front() {
                if event.is_terminal() {
                    this.done = true;
                    this.pending.clear();
                }
                return Poll::Ready(Some(Ok(event)));
            }
            if this.done || this.inner_closed {
                return Poll::Ready(None);
            }

            match Pin::new(&mut this.inner).poll_next(cx) {
                Poll::Pending => return Poll::Pending,
                Poll::Ready(Some(Ok(bytes))) => {
                    this.pending.extend(this.decoder.feed(&bytes));
                }
                Poll::Ready(Some(Err(e))) => {
                    this.done = true;
                    return Poll::Ready(Some(Err(e)));
                }
                Poll::Ready(None) => {
                    this.inner_closed = true;
                    this.pending.extend(this.decoder.finish());
                }
            }
        }
    }
}
