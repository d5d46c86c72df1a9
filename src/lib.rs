//! Streaming `multipart/form-data` upload ingestion.
//!
//! An upload request is parsed lazily into boundary-delimited sections, each
//! section is classified by its `content-disposition` header, and accepted
//! file content is validated against a [`ValidationPolicy`] while it streams
//! into a [`StorageSink`] — a file is never held in memory as a whole. The
//! batch commits atomically: one invalid section rejects the request and
//! nothing stays in storage. A client-side [`ProgressChannel`] reports send
//! progress for a submission.
//!
//! # Examples
//!
//! ```
//! use intake::{MemorySink, SectionReader, UploadOrchestrator, ValidationPolicy, ValidationOutcome};
//! use bytes::Bytes;
//! use std::convert::Infallible;
//! use futures_util::stream::once;
//!
//! # async fn run() {
//! let data = "--X-BOUNDARY\r\ncontent-disposition: form-data; name=\"f\"; filename=\"a.txt\"\r\n\r\nhello\r\n--X-BOUNDARY--\r\n";
//! let stream = once(async move { Result::<Bytes, Infallible>::Ok(Bytes::from(data)) });
//! let reader = SectionReader::new(stream, "X-BOUNDARY");
//!
//! let policy = ValidationPolicy::new();
//! let sink = MemorySink::new();
//!
//! match UploadOrchestrator::new(&policy, &sink).ingest(reader).await {
//!     ValidationOutcome::Completed(files) => println!("stored {} file(s)", files.len()),
//!     ValidationOutcome::Rejected(errors) => println!("rejected: {:?}", errors),
//! }
//! # }
//! # tokio::runtime::Runtime::new().unwrap().block_on(run());
//! ```

pub use client::{encode_multipart, FilePart, UploadClient};
pub use disposition::{ContentDisposition, SectionKind};
pub use error::Error;
pub use orchestrator::{FieldErrors, UploadOrchestrator, ValidationOutcome, ERROR_FIELD_KEY};
pub use policy::ValidationPolicy;
pub use progress::{ProgressChannel, ProgressEvent, ProgressObserver, TrackedStream, TransferStatus};
pub use reader::SectionReader;
pub use section::Section;
pub use service::UploadService;
pub use storage::{DiskSink, MemorySink, SinkWriter, StorageKey, StorageSink, StoredFile};
pub use writer::store_section;

mod buffer;
mod client;
mod constants;
mod disposition;
mod error;
mod helpers;
mod orchestrator;
mod policy;
mod progress;
mod reader;
mod section;
mod service;
mod state;
mod storage;
mod writer;

/// A `Result` type often returned from methods that can have `intake` errors.
pub type Result<T> = std::result::Result<T, Error>;

/// Parses the `Content-Type` header to extract the boundary value.
pub fn parse_boundary<T: AsRef<str>>(content_type: T) -> crate::Result<String> {
    let m: mime::Mime = content_type.as_ref().parse().map_err(Error::DecodeContentType)?;

    if !(m.type_() == mime::MULTIPART_FORM_DATA.type_() && m.subtype() == mime::MULTIPART_FORM_DATA.subtype()) {
        return Err(Error::NotMultipart);
    }

    m.get_param(mime::BOUNDARY)
        .map(|name| name.as_str().to_owned())
        .ok_or(Error::NoBoundary)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_boundary() {
        let content_type = "multipart/form-data; boundary=ABCDEFG";
        assert_eq!(parse_boundary(content_type), Ok("ABCDEFG".to_owned()));

        let content_type = "multipart/form-data; boundary=------ABCDEFG";
        assert_eq!(parse_boundary(content_type), Ok("------ABCDEFG".to_owned()));

        let content_type = "multipart/form-data";
        assert_eq!(parse_boundary(content_type), Err(Error::NoBoundary));

        let content_type = "boundary=------ABCDEFG";
        assert!(parse_boundary(content_type).is_err());

        let content_type = "text/plain";
        assert!(parse_boundary(content_type).is_err());

        let content_type = "text/plain; boundary=------ABCDEFG";
        assert_eq!(parse_boundary(content_type), Err(Error::NotMultipart));
    }
}
