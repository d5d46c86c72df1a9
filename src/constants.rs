use lazy_static::lazy_static;
use regex::Regex;

pub(crate) const MAX_HEADERS: usize = 32;
pub(crate) const BOUNDARY_EXT: &str = "--";
pub(crate) const CRLF: &str = "\r\n";
pub(crate) const CRLF_CRLF: &str = "\r\n\r\n";

lazy_static! {
    pub(crate) static ref DISPOSITION_FIELD_NAME_RE: Regex = Regex::new(r#"name="([^"]+)""#).unwrap();
    pub(crate) static ref DISPOSITION_FILE_NAME_RE: Regex = Regex::new(r#"filename="([^"]+)""#).unwrap();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disposition_field_name_re() {
        let val = r#"form-data; name="my_field""#;
        let name = DISPOSITION_FIELD_NAME_RE.captures(val).unwrap();
        assert_eq!(name.get(1).unwrap().as_str(), "my_field");

        let val = r#"form-data; name="my field"; filename="file abc.txt""#;
        let name = DISPOSITION_FIELD_NAME_RE.captures(val).unwrap();
        assert_eq!(name.get(1).unwrap().as_str(), "my field");

        let val = "form-data; name=\"你好\"; filename=\"file abc.txt\"";
        let name = DISPOSITION_FIELD_NAME_RE.captures(val).unwrap();
        assert_eq!(name.get(1).unwrap().as_str(), "你好");
    }

    #[test]
    fn test_disposition_file_name_re() {
        let val = r#"form-data; name="my_field"; filename="file_name.txt""#;
        let file_name = DISPOSITION_FILE_NAME_RE.captures(val).unwrap();
        assert_eq!(file_name.get(1).unwrap().as_str(), "file_name.txt");

        let val = r#"form-data; name="my_field"; filename="file name.txt""#;
        let file_name = DISPOSITION_FILE_NAME_RE.captures(val).unwrap();
        assert_eq!(file_name.get(1).unwrap().as_str(), "file name.txt");

        let val = "form-data; filename=\"কখগ-你好.txt\"";
        let file_name = DISPOSITION_FILE_NAME_RE.captures(val).unwrap();
        assert_eq!(file_name.get(1).unwrap().as_str(), "কখগ-你好.txt");
    }
}
