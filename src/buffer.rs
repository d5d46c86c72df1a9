use crate::constants;
use bytes::{Bytes, BytesMut};
use futures_util::stream::Stream;
use memchr::memmem;
use std::pin::Pin;
use std::task::{Context, Poll};

pub(crate) type SectionByteStream = Pin<Box<dyn Stream<Item = crate::Result<Bytes>> + Send>>;

pub(crate) struct StreamBuffer {
    pub(crate) eof: bool,
    pub(crate) buf: BytesMut,
    pub(crate) stream: SectionByteStream,
}

impl StreamBuffer {
    pub fn new(stream: SectionByteStream) -> Self {
        StreamBuffer {
            eof: false,
            buf: BytesMut::new(),
            stream,
        }
    }

    pub fn poll_stream(&mut self, cx: &mut Context) -> crate::Result<()> {
        if self.eof {
            return Ok(());
        }

        loop {
            match self.stream.as_mut().poll_next(cx) {
                Poll::Ready(Some(Ok(data))) => self.buf.extend_from_slice(&data),
                Poll::Ready(Some(Err(err))) => return Err(err),
                Poll::Ready(None) => {
                    self.eof = true;
                    return Ok(());
                }
                Poll::Pending => return Ok(()),
            }
        }
    }

    pub fn read_exact(&mut self, size: usize) -> Option<Bytes> {
        if size <= self.buf.len() {
            Some(self.buf.split_to(size).freeze())
        } else {
            None
        }
    }

    pub fn read_until(&mut self, pattern: &[u8]) -> Option<Bytes> {
        memmem::find(&self.buf, pattern).map(|idx| self.buf.split_to(idx + pattern.len()).freeze())
    }

    /// Reads section content up to the next boundary delimiter.
    ///
    /// Returns `(true, bytes)` once the delimiter is reached, `(false, bytes)`
    /// for an intermediate chunk and `None` when more data is needed.
    pub fn read_section_data(&mut self, boundary: &str) -> crate::Result<Option<(bool, Bytes)>> {
        if self.buf.is_empty() {
            return if self.eof {
                Err(crate::Error::IncompleteStream)
            } else {
                Ok(None)
            };
        }

        let delimiter = format!("{}{}{}", constants::CRLF, constants::BOUNDARY_EXT, boundary);

        match memmem::find(&self.buf, delimiter.as_bytes()) {
            Some(idx) => {
                let bytes = self.buf.split_to(idx).freeze();

                // Discard the CRLF that preceded the delimiter; the leading
                // `--boundary` stays in the buffer for the boundary stage.
                let _ = self.buf.split_to(constants::CRLF.len());

                Ok(Some((true, bytes)))
            }
            None => {
                if self.eof {
                    return Err(crate::Error::IncompleteStream);
                }

                // A delimiter prefix may be forming at the tail of the buffer;
                // hold those bytes back until the rest of it arrives.
                let hold_back = delimiter.len() - 1;
                if self.buf.len() > hold_back {
                    let emit = self.buf.len() - hold_back;
                    Ok(Some((false, self.buf.split_to(emit).freeze())))
                } else {
                    Ok(None)
                }
            }
        }
    }
}
