use crate::disposition::{escape_html, ContentDisposition};
use crate::policy::ValidationPolicy;
use crate::section::Section;
use crate::storage::{StorageKey, StorageSink, StoredFile};
use tokio::io::AsyncWriteExt;

/// Validates a file section against `policy` while copying it to `sink`.
///
/// The extension check runs once, before any byte is written. Content is then
/// forwarded chunk by chunk under a freshly generated opaque key; a running
/// byte count aborts the copy before the sink receives more than the policy's
/// ceiling. The file never resides in memory as a whole.
///
/// On any failure the staged artifact is aborted and the section's remaining
/// bytes are left for the reader to drain.
pub async fn store_section(
    section: &mut Section,
    disposition: &ContentDisposition,
    policy: &ValidationPolicy,
    sink: &dyn StorageSink,
) -> crate::Result<StoredFile> {
    let file_name = match disposition.file_name() {
        Some(name) => name.to_owned(),
        None => {
            return Err(crate::Error::NonFileField {
                field_name: disposition.field_name().map(escape_html),
            })
        }
    };
    let display_name = escape_html(&file_name);

    if !policy.allows(&file_name) {
        return Err(crate::Error::DisallowedExtension {
            file_name: display_name,
        });
    }

    let key = StorageKey::generate();
    let mut writer = sink
        .create(&key)
        .await
        .map_err(|err| crate::Error::StorageWriteFailure(err.into()))?;

    let limit = policy.max_file_size_bytes();
    let mut written: u64 = 0;

    loop {
        let chunk = match section.chunk().await {
            Ok(Some(chunk)) => chunk,
            Ok(None) => break,
            Err(err) => {
                drop(writer);
                let _ = sink.abort(&key).await;
                return Err(err);
            }
        };

        if written + chunk.len() as u64 > limit {
            drop(writer);
            let _ = sink.abort(&key).await;
            return Err(crate::Error::SizeLimitExceeded {
                limit,
                file_name: display_name,
            });
        }

        if let Err(err) = writer.write_all(&chunk).await {
            drop(writer);
            let _ = sink.abort(&key).await;
            return Err(crate::Error::StorageWriteFailure(err.into()));
        }

        written += chunk.len() as u64;
    }

    if let Err(err) = writer.shutdown().await {
        drop(writer);
        let _ = sink.abort(&key).await;
        return Err(crate::Error::StorageWriteFailure(err.into()));
    }

    Ok(StoredFile {
        key,
        display_name,
        length: written,
    })
}
