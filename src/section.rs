use crate::state::{ReaderState, StreamingStage};
use bytes::{Bytes, BytesMut};
use futures_util::stream::{Stream, TryStreamExt};
use http::header::{self, HeaderMap};
use spin::Mutex;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

/// One boundary-delimited part of a multipart body.
///
/// Holds the part's headers and a bounded view of the shared body stream,
/// positioned at the part's content. Content is consumed in chunks via
/// [`chunk`](Section::chunk) or the [`Stream`] implementation; whatever is
/// left unread is drained when the `Section` is dropped, since the next
/// section cannot be produced before this one's bytes are off the stream.
pub struct Section {
    state: Arc<Mutex<ReaderState>>,
    headers: HeaderMap,
    done: bool,
    idx: usize,
}

impl Section {
    pub(crate) fn new(state: Arc<Mutex<ReaderState>>, headers: HeaderMap, idx: usize) -> Self {
        Section {
            state,
            headers,
            done: false,
            idx,
        }
    }

    /// The raw headers of this section.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// The section's `Content-Type` header, parsed.
    pub fn content_type(&self) -> Option<mime::Mime> {
        self.headers
            .get(header::CONTENT_TYPE)
            .and_then(|val| val.to_str().ok())
            .and_then(|val| val.parse::<mime::Mime>().ok())
    }

    /// Zero-based position of this section within the body.
    pub fn index(&self) -> usize {
        self.idx
    }

    /// Yields the next chunk of section content, or `None` at the section's
    /// end boundary.
    pub async fn chunk(&mut self) -> crate::Result<Option<Bytes>> {
        self.try_next().await
    }

    /// Reads the whole section content into one buffer.
    ///
    /// Intended for small sections; the upload pipeline itself never calls
    /// this on file content.
    pub async fn bytes(mut self) -> crate::Result<Bytes> {
        let mut buf = BytesMut::new();

        while let Some(bytes) = self.chunk().await? {
            buf.extend_from_slice(&bytes);
        }

        Ok(buf.freeze())
    }
}

impl Stream for Section {
    type Item = crate::Result<Bytes>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context) -> Poll<Option<Self::Item>> {
        if self.done {
            return Poll::Ready(None);
        }

        let mut guard = self.state.lock();
        let state = &mut *guard;

        if let Err(err) = state.buffer.poll_stream(cx) {
            return Poll::Ready(Some(Err(err)));
        }

        match state.buffer.read_section_data(&state.boundary) {
            Ok(Some((true, bytes))) => {
                drop(guard);

                self.done = true;

                Poll::Ready(Some(Ok(bytes)))
            }
            Ok(Some((false, bytes))) => Poll::Ready(Some(Ok(bytes))),
            Ok(None) => Poll::Pending,
            Err(err) => Poll::Ready(Some(Err(err))),
        }
    }
}

impl Drop for Section {
    fn drop(&mut self) {
        let mut guard = self.state.lock();
        let state = &mut *guard;

        if self.done {
            state.stage = StreamingStage::ReadingBoundary;
        } else {
            state.stage = StreamingStage::DrainingPrevSectionData;
        }

        state.is_prev_section_consumed = true;

        if let Some(waker) = state.next_section_waker.take() {
            waker.wake();
        }
    }
}
