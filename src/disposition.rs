use crate::constants;
use http::header::{self, HeaderMap};

/// Whether a section carries file content or a plain form value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionKind {
    File,
    Field,
}

/// The parsed `content-disposition` header of a section.
///
/// The declared file name is attacker-controlled display text. It never names
/// anything in storage; [`display_file_name`](ContentDisposition::display_file_name)
/// is the only form that may be echoed back to a browser or written to logs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentDisposition {
    kind: SectionKind,
    field_name: Option<String>,
    file_name: Option<String>,
}

impl ContentDisposition {
    /// Parses the `content-disposition` header out of a section's headers.
    ///
    /// A section without a parseable `form-data` disposition is a protocol
    /// violation and yields [`Error::MissingDisposition`](crate::Error::MissingDisposition).
    /// The section is a [`SectionKind::File`] exactly when a `filename`
    /// attribute is present.
    pub fn classify(headers: &HeaderMap) -> crate::Result<ContentDisposition> {
        let raw = headers
            .get(header::CONTENT_DISPOSITION)
            .and_then(|val| val.to_str().ok())
            .ok_or(crate::Error::MissingDisposition)?;

        if !raw.trim_start().to_ascii_lowercase().starts_with("form-data") {
            return Err(crate::Error::MissingDisposition);
        }

        let field_name = constants::DISPOSITION_FIELD_NAME_RE
            .captures(raw)
            .and_then(|cap| cap.get(1))
            .map(|m| m.as_str().to_owned());

        let file_name = constants::DISPOSITION_FILE_NAME_RE
            .captures(raw)
            .and_then(|cap| cap.get(1))
            .map(|m| m.as_str().to_owned());

        let kind = if file_name.is_some() {
            SectionKind::File
        } else {
            SectionKind::Field
        };

        Ok(ContentDisposition {
            kind,
            field_name,
            file_name,
        })
    }

    pub fn kind(&self) -> SectionKind {
        self.kind
    }

    pub fn field_name(&self) -> Option<&str> {
        self.field_name.as_deref()
    }

    /// The declared file name, verbatim. Untrusted; never use it as a path
    /// component or echo it unescaped.
    pub fn file_name(&self) -> Option<&str> {
        self.file_name.as_deref()
    }

    /// The declared file name, HTML-escaped for acknowledgements and logs.
    pub fn display_file_name(&self) -> Option<String> {
        self.file_name.as_deref().map(escape_html)
    }
}

pub(crate) fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());

    for ch in raw.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            _ => escaped.push(ch),
        }
    }

    escaped
}
