use crate::orchestrator::{FieldErrors, UploadOrchestrator, ValidationOutcome, ERROR_FIELD_KEY};
use crate::policy::ValidationPolicy;
use crate::reader::SectionReader;
use crate::storage::StorageSink;
use bytes::Bytes;
use futures_util::stream::StreamExt;
use http_body_util::{BodyStream, Full};
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::{Method, Request, Response, StatusCode};
use std::convert::Infallible;
use std::io;
use std::sync::Arc;
use tokio::net::TcpListener;

/// The HTTP front door: `POST /api/UploadData`.
///
/// The handler consumes the raw request body as a stream — nothing buffers
/// the body into a form collection ahead of the section reader. A full
/// success answers `201 Created` with a short acknowledgement; any validation
/// failure answers `400` with a field-keyed JSON error payload.
pub struct UploadService {
    policy: ValidationPolicy,
    sink: Arc<dyn StorageSink>,
}

impl UploadService {
    pub fn new(policy: ValidationPolicy, sink: Arc<dyn StorageSink>) -> UploadService {
        UploadService { policy, sink }
    }

    pub async fn handle<B>(&self, req: Request<B>) -> Response<Full<Bytes>>
    where
        B: http_body::Body + Send + 'static,
        B::Data: Into<Bytes> + Send + 'static,
        B::Error: Into<Box<dyn std::error::Error + Send + Sync>> + Send + 'static,
    {
        if req.method() != Method::POST || req.uri().path() != "/api/UploadData" {
            return text_response(StatusCode::NOT_FOUND, "not found");
        }

        let boundary = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|ct| ct.to_str().ok())
            .and_then(|ct| crate::parse_boundary(ct).ok());

        let boundary = match boundary {
            Some(boundary) => boundary,
            None => {
                return json_response(
                    StatusCode::BAD_REQUEST,
                    &single_error("the request could not be processed as a multipart upload"),
                );
            }
        };

        let body_stream = BodyStream::new(req.into_body())
            .filter_map(|result| async move { result.map(|frame| frame.into_data().ok()).transpose() });

        let reader = SectionReader::new(body_stream, boundary);
        let orchestrator = UploadOrchestrator::new(&self.policy, self.sink.as_ref());

        match orchestrator.ingest(reader).await {
            ValidationOutcome::Completed(files) => {
                text_response(StatusCode::CREATED, format!("{} file(s) uploaded", files.len()))
            }
            ValidationOutcome::Rejected(errors) => json_response(StatusCode::BAD_REQUEST, &errors),
        }
    }

    /// Accept loop: one spawned connection task per client, requests handled
    /// sequentially within a connection.
    pub async fn serve(self: Arc<Self>, listener: TcpListener) -> io::Result<()> {
        loop {
            let (socket, remote_addr) = listener.accept().await?;
            let socket = hyper_util::rt::TokioIo::new(socket);
            let service = Arc::clone(&self);

            tokio::spawn(async move {
                let handler = hyper::service::service_fn(move |req| {
                    let service = Arc::clone(&service);
                    async move { Ok::<_, Infallible>(service.handle(req).await) }
                });

                if let Err(err) = hyper::server::conn::http1::Builder::new()
                    .serve_connection(socket, handler)
                    .await
                {
                    log::error!("connection error from {}: {}", remote_addr, err);
                }
            });
        }
    }
}

fn single_error(message: &str) -> FieldErrors {
    let mut errors = FieldErrors::new();
    errors.insert(ERROR_FIELD_KEY.to_owned(), vec![message.to_owned()]);
    errors
}

fn text_response<T: Into<Bytes>>(status: StatusCode, body: T) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::from(body.into()));
    *response.status_mut() = status;
    response
}

fn json_response(status: StatusCode, errors: &FieldErrors) -> Response<Full<Bytes>> {
    let payload = serde_json::to_vec(errors).unwrap_or_else(|_| b"{}".to_vec());
    let mut response = text_response(status, payload);
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}
