use crate::buffer::{SectionByteStream, StreamBuffer};
use crate::constants;
use crate::helpers;
use crate::section::Section;
use crate::state::{ReaderState, StreamingStage};
use bytes::Bytes;
use futures_util::stream::{Stream, TryStreamExt};
use spin::Mutex;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::io::AsyncRead;
use tokio_util::io::ReaderStream;

/// Reads a `multipart/form-data` body as a sequence of [`Section`]s.
///
/// The body is parsed lazily in a single forward pass: at most one [`Section`]
/// is live at a time because all sections share the one underlying byte
/// stream. Dropping an unconsumed [`Section`] discards (drains) its remaining
/// bytes before the next one is produced, so avoid leaking the type.
///
/// # Examples
///
/// ```
/// use intake::SectionReader;
/// use bytes::Bytes;
/// use std::convert::Infallible;
/// use futures_util::stream::once;
///
/// # async fn run() {
/// let data = "--X-BOUNDARY\r\ncontent-disposition: form-data; name=\"file\"; filename=\"a.txt\"\r\n\r\nabcd\r\n--X-BOUNDARY--\r\n";
/// let stream = once(async move { Result::<Bytes, Infallible>::Ok(Bytes::from(data)) });
/// let mut reader = SectionReader::new(stream, "X-BOUNDARY");
///
/// while let Some(section) = reader.next_section().await.unwrap() {
///     println!("section: {:?}", section.bytes().await);
/// }
/// # }
/// # tokio::runtime::Runtime::new().unwrap().block_on(run());
/// ```
pub struct SectionReader {
    state: Arc<Mutex<ReaderState>>,
}

impl SectionReader {
    /// Constructs a `SectionReader` from a stream of body chunks and the
    /// boundary token taken from the `Content-Type` header.
    pub fn new<S, O, E, B>(stream: S, boundary: B) -> SectionReader
    where
        S: Stream<Item = Result<O, E>> + Send + 'static,
        O: Into<Bytes> + 'static,
        E: Into<Box<dyn std::error::Error + Send + Sync>> + 'static,
        B: Into<String>,
    {
        let stream = stream
            .map_ok(|b| b.into())
            .map_err(|err| crate::Error::StreamReadFailed(err.into()));
        let stream: SectionByteStream = Box::pin(stream);

        let state = ReaderState {
            buffer: StreamBuffer::new(stream),
            boundary: boundary.into(),
            stage: StreamingStage::ReadingBoundary,
            is_prev_section_consumed: true,
            next_section_waker: None,
            next_section_idx: 0,
        };

        SectionReader {
            state: Arc::new(Mutex::new(state)),
        }
    }

    /// Constructs a `SectionReader` from an [`AsyncRead`] and the boundary.
    pub fn with_reader<R, B>(reader: R, boundary: B) -> SectionReader
    where
        R: AsyncRead + Send + 'static,
        B: Into<String>,
    {
        SectionReader::new(ReaderStream::new(reader), boundary)
    }

    /// Yields the next [`Section`], or `None` once the terminating boundary
    /// has been reached.
    pub async fn next_section(&mut self) -> crate::Result<Option<Section>> {
        self.try_next().await
    }
}

impl Stream for SectionReader {
    type Item = crate::Result<Section>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context) -> Poll<Option<Self::Item>> {
        let mut guard = self.state.lock();
        let state = &mut *guard;

        if state.stage == StreamingStage::Eof {
            return Poll::Ready(None);
        }

        if !state.is_prev_section_consumed {
            state.next_section_waker = Some(cx.waker().clone());
            return Poll::Pending;
        }

        if let Err(err) = state.buffer.poll_stream(cx) {
            return Poll::Ready(Some(Err(err)));
        }

        if state.stage == StreamingStage::DrainingPrevSectionData {
            match state.buffer.read_section_data(&state.boundary) {
                Ok(Some((true, _))) => state.stage = StreamingStage::ReadingBoundary,
                Ok(Some((false, _))) | Ok(None) => return Poll::Pending,
                Err(err) => return Poll::Ready(Some(Err(err))),
            }
        }

        if state.stage == StreamingStage::ReadingBoundary {
            let boundary_deriv_len = constants::BOUNDARY_EXT.len() + state.boundary.len() + 2;

            let boundary_bytes = match state.buffer.read_exact(boundary_deriv_len) {
                Some(bytes) => bytes,
                None => {
                    return if state.buffer.eof {
                        Poll::Ready(Some(Err(crate::Error::IncompleteStream)))
                    } else {
                        Poll::Pending
                    };
                }
            };

            let final_delim = format!(
                "{}{}{}",
                constants::BOUNDARY_EXT,
                state.boundary,
                constants::BOUNDARY_EXT
            );
            let section_delim = format!("{}{}{}", constants::BOUNDARY_EXT, state.boundary, constants::CRLF);

            if boundary_bytes[..] == *final_delim.as_bytes() {
                state.stage = StreamingStage::Eof;
                return Poll::Ready(None);
            }

            if boundary_bytes[..] != *section_delim.as_bytes() {
                return Poll::Ready(Some(Err(crate::Error::IncompleteStream)));
            }

            state.stage = StreamingStage::ReadingSectionHeaders;
        }

        if state.stage == StreamingStage::ReadingSectionHeaders {
            let header_bytes = match state.buffer.read_until(constants::CRLF_CRLF.as_bytes()) {
                Some(bytes) => bytes,
                None => {
                    return if state.buffer.eof {
                        Poll::Ready(Some(Err(crate::Error::IncompleteHeaders)))
                    } else {
                        Poll::Pending
                    };
                }
            };

            let mut header_slots = [httparse::EMPTY_HEADER; constants::MAX_HEADERS];

            let headers = match httparse::parse_headers(&header_bytes, &mut header_slots) {
                Ok(httparse::Status::Complete((_, raw_headers))) => {
                    match helpers::raw_headers_to_header_map(raw_headers) {
                        Ok(headers) => headers,
                        Err(err) => return Poll::Ready(Some(Err(err))),
                    }
                }
                Ok(httparse::Status::Partial) => return Poll::Ready(Some(Err(crate::Error::IncompleteHeaders))),
                Err(err) => return Poll::Ready(Some(Err(crate::Error::ReadHeaderFailed(err)))),
            };

            state.stage = StreamingStage::ReadingSectionData;
            state.is_prev_section_consumed = false;

            let section_idx = state.next_section_idx;
            state.next_section_idx += 1;

            drop(guard);

            return Poll::Ready(Some(Ok(Section::new(Arc::clone(&self.state), headers, section_idx))));
        }

        state.next_section_waker = Some(cx.waker().clone());
        Poll::Pending
    }
}
