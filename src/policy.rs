use std::collections::HashSet;
use std::env;
use std::path::{Path, PathBuf};

/// Per-request upload validation policy: the allowed file extensions, the
/// per-file size ceiling and the destination namespace.
///
/// Immutable for the lifetime of a request; construct once at startup and
/// share. Extensions are matched case-insensitively against the declared file
/// name's suffix.
#[derive(Debug, Clone)]
pub struct ValidationPolicy {
    allowed_extensions: HashSet<String>,
    max_file_size_bytes: u64,
    storage_root: PathBuf,
}

impl ValidationPolicy {
    pub fn new() -> ValidationPolicy {
        ValidationPolicy::default()
    }

    /// Replaces the allowed extension set.
    pub fn allowed_extensions<I, E>(mut self, extensions: I) -> ValidationPolicy
    where
        I: IntoIterator<Item = E>,
        E: AsRef<str>,
    {
        self.allowed_extensions = extensions
            .into_iter()
            .map(|ext| normalize_extension(ext.as_ref()))
            .filter(|ext| !ext.is_empty())
            .collect();
        self
    }

    /// Adds one extension to the allowed set.
    pub fn allow_extension<E: AsRef<str>>(mut self, extension: E) -> ValidationPolicy {
        let ext = normalize_extension(extension.as_ref());
        if !ext.is_empty() {
            self.allowed_extensions.insert(ext);
        }
        self
    }

    /// Sets the per-file size ceiling in bytes.
    pub fn max_file_size(mut self, limit: u64) -> ValidationPolicy {
        self.max_file_size_bytes = limit;
        self
    }

    /// Sets the destination namespace handed to the storage sink.
    pub fn storage_root<P: Into<PathBuf>>(mut self, root: P) -> ValidationPolicy {
        self.storage_root = root.into();
        self
    }

    /// Builds a policy from `UPLOAD_ALLOWED_EXTENSIONS` (comma-separated),
    /// `UPLOAD_MAX_FILE_SIZE_BYTES` and `UPLOAD_STORAGE_ROOT`, falling back to
    /// the defaults for anything unset.
    pub fn from_env() -> ValidationPolicy {
        let mut policy = ValidationPolicy::default();

        if let Ok(raw) = env::var("UPLOAD_ALLOWED_EXTENSIONS") {
            policy = policy.allowed_extensions(raw.split(','));
        }

        if let Some(limit) = env::var("UPLOAD_MAX_FILE_SIZE_BYTES")
            .ok()
            .and_then(|val| val.parse().ok())
        {
            policy = policy.max_file_size(limit);
        }

        if let Ok(root) = env::var("UPLOAD_STORAGE_ROOT") {
            policy = policy.storage_root(root);
        }

        policy
    }

    /// Whether the declared file name carries an allowed extension.
    pub fn allows(&self, file_name: &str) -> bool {
        match file_name.rfind('.') {
            Some(idx) if idx + 1 < file_name.len() => {
                let ext = file_name[idx..].to_ascii_lowercase();
                self.allowed_extensions.contains(&ext)
            }
            _ => false,
        }
    }

    pub fn max_file_size_bytes(&self) -> u64 {
        self.max_file_size_bytes
    }

    pub fn storage_root_path(&self) -> &Path {
        &self.storage_root
    }
}

impl Default for ValidationPolicy {
    fn default() -> Self {
        ValidationPolicy {
            allowed_extensions: [".rar", ".7zip", ".txt"].iter().map(|ext| (*ext).to_owned()).collect(),
            max_file_size_bytes: 100_000,
            storage_root: PathBuf::from("storage"),
        }
    }
}

fn normalize_extension(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == "." {
        return String::new();
    }

    let mut ext = trimmed.to_ascii_lowercase();
    if !ext.starts_with('.') {
        ext.insert(0, '.');
    }
    ext
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allows_is_case_insensitive() {
        let policy = ValidationPolicy::new();

        assert!(policy.allows("notes.txt"));
        assert!(policy.allows("NOTES.TXT"));
        assert!(policy.allows("archive.7zip"));
        assert!(!policy.allows("setup.exe"));
    }

    #[test]
    fn test_allows_requires_a_suffix() {
        let policy = ValidationPolicy::new();

        assert!(!policy.allows("README"));
        assert!(!policy.allows("trailing."));
    }

    #[test]
    fn test_extension_normalization() {
        let policy = ValidationPolicy::new().allowed_extensions(["TXT", ".Rar", "  .pdf "]);

        assert!(policy.allows("a.txt"));
        assert!(policy.allows("b.rar"));
        assert!(policy.allows("c.PDF"));
        assert!(!policy.allows("d.7zip"));
    }
}
