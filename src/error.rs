use std::fmt::{self, Debug, Display, Formatter};

use derive_more::Display;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A set of errors that can occur while parsing a multipart stream, validating
/// its sections and copying them to storage.
#[derive(Display)]
#[non_exhaustive]
pub enum Error {
    /// The `Content-Type` header does not declare `multipart/form-data`.
    #[display(fmt = "Content-Type is not multipart/form-data")]
    NotMultipart,

    /// Failed to convert the `Content-Type` to [`mime::Mime`] type.
    #[display(fmt = "failed to parse Content-Type: {}", _0)]
    DecodeContentType(mime::FromStrError),

    /// No boundary found in the `Content-Type` header.
    #[display(fmt = "multipart boundary not found in Content-Type")]
    NoBoundary,

    /// The multipart stream ended before its terminating boundary.
    #[display(fmt = "incomplete multipart stream")]
    IncompleteStream,

    /// Couldn't read the section headers completely.
    #[display(fmt = "failed to read complete section headers")]
    IncompleteHeaders,

    /// Failed to parse the section headers.
    #[display(fmt = "failed to read section headers: {}", _0)]
    ReadHeaderFailed(httparse::Error),

    /// Failed to decode a raw section header name to
    /// [`HeaderName`](http::header::HeaderName) type.
    #[display(fmt = "failed to decode section header name: {:?} {}", name, cause)]
    DecodeHeaderName { name: String, cause: BoxError },

    /// Failed to decode a raw section header value to
    /// [`HeaderValue`](http::header::HeaderValue) type.
    #[display(fmt = "failed to decode section header value: {}", cause)]
    DecodeHeaderValue { value: Vec<u8>, cause: BoxError },

    /// Reading from the request body stream failed.
    #[display(fmt = "stream read failed: {}", _0)]
    StreamReadFailed(BoxError),

    /// A section carried no parseable `content-disposition` header.
    #[display(fmt = "section is missing a content-disposition header")]
    MissingDisposition,

    /// A plain form field arrived on the file-only upload endpoint.
    #[display(
        fmt = "unexpected form field '{}' in a file-only upload",
        "field_name.as_deref().unwrap_or(\"<unknown>\")"
    )]
    NonFileField { field_name: Option<String> },

    /// The declared file name carries an extension outside the allowed set.
    /// `file_name` holds the HTML-escaped display name.
    #[display(fmt = "file '{}' has a disallowed extension", file_name)]
    DisallowedExtension { file_name: String },

    /// The section content exceeded the size ceiling.
    /// `file_name` holds the HTML-escaped display name.
    #[display(fmt = "file '{}' exceeded the size limit of {} bytes", file_name, limit)]
    SizeLimitExceeded { limit: u64, file_name: String },

    /// The storage sink failed while an accepted file was being written.
    #[display(fmt = "storage write failed: {}", _0)]
    StorageWriteFailure(BoxError),

    /// The request finished without a single file section.
    #[display(fmt = "request contained no file sections")]
    EmptyBatch,

    /// Submitting the upload request failed on the client side.
    #[display(fmt = "upload transport failed: {}", _0)]
    TransportFailed(BoxError),
}

impl Debug for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(self, f)
    }
}

impl std::error::Error for Error {}

impl PartialEq for Error {
    fn eq(&self, other: &Self) -> bool {
        self.to_string().eq(&other.to_string())
    }
}

impl Eq for Error {}
