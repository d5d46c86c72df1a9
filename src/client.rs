use crate::constants;
use crate::progress::{ProgressChannel, TrackedStream, TransferStatus};
use bytes::{Bytes, BytesMut};
use futures_util::stream;
use reqwest::header::CONTENT_TYPE;
use spin::Mutex;
use std::io;
use std::sync::Arc;
use uuid::Uuid;

const CLIENT_CHUNK_SIZE: usize = 64 * 1024;

/// One file to submit: the form field it is attached to, its declared name
/// and content type, and the content itself.
#[derive(Debug, Clone)]
pub struct FilePart {
    pub field_name: String,
    pub file_name: String,
    pub content_type: String,
    pub data: Bytes,
}

/// Frames `parts` as a `multipart/form-data` body under `boundary`.
pub fn encode_multipart(boundary: &str, parts: &[FilePart]) -> Bytes {
    let mut body = BytesMut::new();

    for part in parts {
        body.extend_from_slice(constants::BOUNDARY_EXT.as_bytes());
        body.extend_from_slice(boundary.as_bytes());
        body.extend_from_slice(constants::CRLF.as_bytes());
        body.extend_from_slice(
            format!(
                "content-disposition: form-data; name=\"{}\"; filename=\"{}\"{}",
                part.field_name, part.file_name, constants::CRLF
            )
            .as_bytes(),
        );
        body.extend_from_slice(format!("content-type: {}{}", part.content_type, constants::CRLF).as_bytes());
        body.extend_from_slice(constants::CRLF.as_bytes());
        body.extend_from_slice(&part.data);
        body.extend_from_slice(constants::CRLF.as_bytes());
    }

    body.extend_from_slice(constants::BOUNDARY_EXT.as_bytes());
    body.extend_from_slice(boundary.as_bytes());
    body.extend_from_slice(constants::BOUNDARY_EXT.as_bytes());
    body.extend_from_slice(constants::CRLF.as_bytes());

    body.freeze()
}

/// Submits upload batches to an ingestion endpoint, reporting send progress
/// through a [`ProgressChannel`].
pub struct UploadClient {
    http: reqwest::Client,
    endpoint: String,
}

impl UploadClient {
    pub fn new<E: Into<String>>(endpoint: E) -> UploadClient {
        UploadClient {
            http: reqwest::Client::new(),
            endpoint: endpoint.into(),
        }
    }

    /// Sends `parts` as one multipart request.
    ///
    /// The body goes out in bounded chunks through a [`TrackedStream`], so
    /// the channel observes every chunk the transport pulls; the terminal
    /// `{status, body}` is surfaced through the channel as well and returned.
    pub async fn submit(
        &self,
        parts: &[FilePart],
        channel: Arc<Mutex<ProgressChannel>>,
    ) -> crate::Result<TransferStatus> {
        let boundary = format!("----intake-{}", Uuid::new_v4().simple());
        let body = encode_multipart(&boundary, parts);

        channel.lock().set_total(body.len() as u64);

        let mut rest = body;
        let mut chunks: Vec<Result<Bytes, io::Error>> = Vec::new();
        while !rest.is_empty() {
            let take = rest.len().min(CLIENT_CHUNK_SIZE);
            chunks.push(Ok(rest.split_to(take)));
        }

        let tracked = TrackedStream::new(stream::iter(chunks), Arc::clone(&channel));

        let response = self
            .http
            .post(&self.endpoint)
            .header(CONTENT_TYPE, format!("multipart/form-data; boundary={}", boundary))
            .body(reqwest::Body::wrap_stream(tracked))
            .send()
            .await
            .map_err(|err| crate::Error::TransportFailed(err.into()))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|err| crate::Error::TransportFailed(err.into()))?;

        let outcome = TransferStatus { status, body };
        channel.lock().complete(outcome.clone());

        Ok(outcome)
    }
}
