use crate::disposition::{escape_html, ContentDisposition, SectionKind};
use crate::policy::ValidationPolicy;
use crate::reader::SectionReader;
use crate::storage::{StorageSink, StoredFile};
use crate::writer::store_section;
use std::collections::BTreeMap;

/// The field key every upload error is reported under.
pub const ERROR_FIELD_KEY: &str = "File";

/// Field-keyed validation error messages, in the shape the HTTP layer
/// serializes as the 400 payload.
pub type FieldErrors = BTreeMap<String, Vec<String>>;

/// The aggregate result of one upload request.
///
/// The request succeeds or fails as a whole: a single invalid section rejects
/// the batch and nothing is committed to storage.
#[derive(Debug)]
pub enum ValidationOutcome {
    Completed(Vec<StoredFile>),
    Rejected(FieldErrors),
}

/// Drives a [`SectionReader`] through a whole request: classify each section,
/// stream accepted files to the sink, aggregate failures.
///
/// This endpoint is file-only; a plain form field is itself a validation
/// error. After the first error the remaining sections are still drained so
/// the connection reaches a clean end, but nothing further is written.
/// Accepted files stay staged until every section has validated, then the
/// whole batch is committed.
pub struct UploadOrchestrator<'a> {
    policy: &'a ValidationPolicy,
    sink: &'a dyn StorageSink,
}

impl<'a> UploadOrchestrator<'a> {
    pub fn new(policy: &'a ValidationPolicy, sink: &'a dyn StorageSink) -> UploadOrchestrator<'a> {
        UploadOrchestrator { policy, sink }
    }

    pub async fn ingest(&self, mut reader: SectionReader) -> ValidationOutcome {
        let mut stored: Vec<StoredFile> = Vec::new();
        let mut errors = FieldErrors::new();

        loop {
            let section = match reader.next_section().await {
                Ok(Some(section)) => section,
                Ok(None) => break,
                Err(err) => {
                    record(&mut errors, &err);
                    break;
                }
            };

            if !errors.is_empty() {
                // Already rejected; dropping the section drains its bytes.
                drop(section);
                continue;
            }

            let mut section = section;
            let disposition = match ContentDisposition::classify(section.headers()) {
                Ok(disposition) => disposition,
                Err(err) => {
                    record(&mut errors, &err);
                    continue;
                }
            };

            match disposition.kind() {
                SectionKind::Field => {
                    record(
                        &mut errors,
                        &crate::Error::NonFileField {
                            field_name: disposition.field_name().map(escape_html),
                        },
                    );
                }
                SectionKind::File => {
                    match store_section(&mut section, &disposition, self.policy, self.sink).await {
                        Ok(file) => stored.push(file),
                        Err(err) => record(&mut errors, &err),
                    }
                }
            }
        }

        if errors.is_empty() && stored.is_empty() {
            record(&mut errors, &crate::Error::EmptyBatch);
        }

        if !errors.is_empty() {
            self.abort_staged(&stored).await;
            return ValidationOutcome::Rejected(errors);
        }

        let mut committed = Vec::with_capacity(stored.len());
        let mut commit_error = None;

        for file in stored {
            if commit_error.is_some() {
                self.abort_staged(std::slice::from_ref(&file)).await;
                continue;
            }

            match self.sink.commit(&file.key).await {
                Ok(()) => {
                    log::info!(
                        "stored upload '{}' in {} as {}",
                        file.display_name,
                        self.policy.storage_root_path().display(),
                        file.key
                    );
                    committed.push(file);
                }
                Err(err) => commit_error = Some(crate::Error::StorageWriteFailure(err.into())),
            }
        }

        if let Some(err) = commit_error {
            record(&mut errors, &err);
            return ValidationOutcome::Rejected(errors);
        }

        ValidationOutcome::Completed(committed)
    }

    async fn abort_staged(&self, staged: &[StoredFile]) {
        for file in staged {
            if let Err(err) = self.sink.abort(&file.key).await {
                log::warn!("failed to abort staged upload {}: {}", file.key, err);
            }
        }
    }
}

fn record(errors: &mut FieldErrors, err: &crate::Error) {
    errors
        .entry(ERROR_FIELD_KEY.to_owned())
        .or_default()
        .push(err.to_string());
}
