use bytes::Bytes;
use futures_util::stream;
use intake::{ContentDisposition, SectionKind, SectionReader};

#[tokio::test]
async fn test_section_reader_basic() {
    let data = "--X-BOUNDARY\r\nContent-Disposition: form-data; name=\"My Field\"\r\n\r\nabcd\r\n--X-BOUNDARY\r\nContent-Disposition: form-data; name=\"File Field\"; filename=\"a-text-file.txt\"\r\nContent-Type: text/plain\r\n\r\nHello world\nHello\r\nWorld\rAgain\r\n--X-BOUNDARY--\r\n";
    let stream = stream::iter(
        data.chars()
            .map(|ch| ch.to_string())
            .map(|part| intake::Result::Ok(Bytes::copy_from_slice(part.as_bytes()))),
    );

    let mut reader = SectionReader::new(stream, "X-BOUNDARY");

    let section = reader.next_section().await.unwrap().unwrap();
    assert_eq!(section.index(), 0);
    let disposition = ContentDisposition::classify(section.headers()).unwrap();
    assert_eq!(disposition.kind(), SectionKind::Field);
    assert_eq!(disposition.field_name(), Some("My Field"));
    assert_eq!(disposition.file_name(), None);
    assert_eq!(section.bytes().await.unwrap(), Bytes::from_static(b"abcd"));

    let section = reader.next_section().await.unwrap().unwrap();
    assert_eq!(section.index(), 1);
    assert_eq!(section.content_type(), Some(mime::TEXT_PLAIN));
    let disposition = ContentDisposition::classify(section.headers()).unwrap();
    assert_eq!(disposition.kind(), SectionKind::File);
    assert_eq!(disposition.field_name(), Some("File Field"));
    assert_eq!(disposition.file_name(), Some("a-text-file.txt"));
    assert_eq!(
        section.bytes().await.unwrap(),
        Bytes::from_static(b"Hello world\nHello\r\nWorld\rAgain")
    );

    assert!(reader.next_section().await.unwrap().is_none());
}

#[tokio::test]
async fn test_section_reader_empty_body() {
    let data = "--X-BOUNDARY--\r\n";
    let stream = stream::iter(
        data.chars()
            .map(|ch| ch.to_string())
            .map(|part| intake::Result::Ok(Bytes::copy_from_slice(part.as_bytes()))),
    );

    let mut reader = SectionReader::new(stream, "X-BOUNDARY");

    assert!(reader.next_section().await.unwrap().is_none());
    assert!(reader.next_section().await.unwrap().is_none());
}

#[tokio::test]
async fn test_skipped_section_is_drained() {
    let data = "--X-BOUNDARY\r\nContent-Disposition: form-data; name=\"skipped\"; filename=\"skip.txt\"\r\n\r\nunread content\r\n--X-BOUNDARY\r\nContent-Disposition: form-data; name=\"kept\"; filename=\"keep.txt\"\r\n\r\nkept content\r\n--X-BOUNDARY--\r\n";
    let stream = stream::iter(
        data.chars()
            .map(|ch| ch.to_string())
            .map(|part| intake::Result::Ok(Bytes::copy_from_slice(part.as_bytes()))),
    );

    let mut reader = SectionReader::new(stream, "X-BOUNDARY");

    // Drop the first section without reading its content.
    let section = reader.next_section().await.unwrap().unwrap();
    drop(section);

    let section = reader.next_section().await.unwrap().unwrap();
    let disposition = ContentDisposition::classify(section.headers()).unwrap();
    assert_eq!(disposition.file_name(), Some("keep.txt"));
    assert_eq!(section.bytes().await.unwrap(), Bytes::from_static(b"kept content"));

    assert!(reader.next_section().await.unwrap().is_none());
}

#[tokio::test]
async fn test_unterminated_body_is_an_error() {
    let data = "--X-BOUNDARY\r\nContent-Disposition: form-data; name=\"f\"; filename=\"a.txt\"\r\n\r\ntruncated conten";
    let stream = stream::iter(
        data.chars()
            .map(|ch| ch.to_string())
            .map(|part| intake::Result::Ok(Bytes::copy_from_slice(part.as_bytes()))),
    );

    let mut reader = SectionReader::new(stream, "X-BOUNDARY");

    let section = reader.next_section().await.unwrap().unwrap();
    assert_eq!(section.bytes().await, Err(intake::Error::IncompleteStream));
}

#[tokio::test]
async fn test_non_multipart_prefix_is_an_error() {
    let data = "this is not a multipart body at all";
    let stream = stream::iter(
        data.chars()
            .map(|ch| ch.to_string())
            .map(|part| intake::Result::Ok(Bytes::copy_from_slice(part.as_bytes()))),
    );

    let mut reader = SectionReader::new(stream, "X-BOUNDARY");

    match reader.next_section().await {
        Err(err) => assert_eq!(err, intake::Error::IncompleteStream),
        Ok(_) => panic!("expected a malformed body error"),
    }
}

#[tokio::test]
async fn test_with_reader_constructor() {
    let data = "--X-BOUNDARY\r\nContent-Disposition: form-data; name=\"f\"; filename=\"a.txt\"\r\n\r\nabcd\r\n--X-BOUNDARY--\r\n";

    let mut reader = SectionReader::with_reader(data.as_bytes(), "X-BOUNDARY");

    let section = reader.next_section().await.unwrap().unwrap();
    assert_eq!(section.bytes().await.unwrap(), Bytes::from_static(b"abcd"));
    assert!(reader.next_section().await.unwrap().is_none());
}
