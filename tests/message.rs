use std::fs;
use mail_parser::{Address, MessageParser, MimeHeaders};
use tokio_sendmail::message::{Attachment, Message, XLSX_MIME};
use tokio_sendmail::Error;

fn base() -> Message {
    Message::new()
        .set_from("a@x.com")
        .set_to(vec!["b@x.com"])
        .set_subject("hi")
        .set_text("hello")
}

fn first_address(address: Option<&Address>) -> Option<String> {
    address.and_then(|address| address.first())
        .and_then(|addr| addr.address())
        .map(str::to_string)
}

fn lines(message: &Message) -> Vec<String> {
    String::from_utf8(message.build()).unwrap()
        .split("\r\n")
        .map(str::to_string)
        .collect()
}

#[test]
fn text_only_message_is_a_single_part() {
    let bytes = base().build();
    let text = String::from_utf8(bytes.clone()).unwrap();
    assert_eq!(text.matches("Content-Type:").count(), 1);
    assert!(text.contains("Content-Type: text/plain; charset=utf-8\r\n"));
    assert!(!text.contains("multipart"));
    assert!(text.ends_with("\r\n\r\nhello"));

    let parsed = MessageParser::default().parse(&bytes).unwrap();
    assert_eq!(parsed.subject(), Some("hi"));
    assert_eq!(parsed.body_text(0).as_deref(), Some("hello"));
    assert_eq!(parsed.attachment_count(), 0);
}

#[test]
fn xlsx_attachment_round_trips() {
    let content: Vec<u8> = (0..=255u8).cycle().take(1000).collect();
    let message = base().attach(Attachment::from_bytes("/tmp/out/report.xlsx", content.clone()));
    let bytes = message.build();
    let text = String::from_utf8(bytes.clone()).unwrap();
    assert!(text.contains(&format!("Content-Type: multipart/mixed; boundary=\"{}\"", message.boundary())));
    assert!(text.contains(&format!("Content-Type: {}\r\nContent-Transfer-Encoding: base64\r\n", XLSX_MIME)));
    assert!(text.contains("Content-Disposition: attachment; filename=\"report.xlsx\"\r\n"));

    let parsed = MessageParser::default().parse(&bytes).unwrap();
    assert_eq!(parsed.body_text(0).as_deref(), Some("hello"));
    let attachment = parsed.attachment(0).unwrap();
    assert_eq!(attachment.attachment_name(), Some("report.xlsx"));
    assert_eq!(attachment.contents(), &content[..]);
}

#[test]
fn round_trips_headers_and_parts() {
    let message = Message::new()
        .set_from("a@x.com")
        .set_to(vec!["b@x.com"])
        .set_cc(vec!["c@x.com"])
        .set_subject("Привет, мир")
        .set_text("plain\nbody")
        .set_html("<p>rich body</p>")
        .attach(Attachment::from_bytes("notes.txt", b"some notes".to_vec()))
        .attach(Attachment::from_bytes("pixel.png", b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR".to_vec()));

    let bytes = message.build();
    let parsed = MessageParser::default().parse(&bytes).unwrap();
    assert_eq!(parsed.subject(), Some("Привет, мир"));
    assert_eq!(first_address(parsed.from()), Some("a@x.com".to_string()));
    assert_eq!(first_address(parsed.to()), Some("b@x.com".to_string()));
    assert_eq!(first_address(parsed.cc()), Some("c@x.com".to_string()));
    assert_eq!(parsed.body_text(0).unwrap().replace("\r\n", "\n"), "plain\nbody");
    assert!(parsed.body_html(0).unwrap().contains("<p>rich body</p>"));

    assert_eq!(parsed.attachment_count(), 2);
    let png = parsed.attachment(1).unwrap();
    assert_eq!(png.attachment_name(), Some("pixel.png"));
    assert_eq!(png.content_type().map(|ct| ct.subtype()), Some(Some("png")));
}

#[test]
fn boundary_delimits_every_part() {
    let message = base()
        .attach(Attachment::from_bytes("a.bin", vec![0; 10]))
        .attach(Attachment::from_bytes("b.bin", vec![1; 10]))
        .attach(Attachment::from_bytes("c.bin", vec![2; 10]));
    let delimiter = format!("--{}", message.boundary());
    let lines = lines(&message);
    let delimiters: Vec<&String> = lines.iter().filter(|line| line.starts_with(&delimiter)).collect();
    assert_eq!(delimiters.len(), 3 + 2);
    assert_eq!(delimiters.last().unwrap().as_str(), format!("{}--", delimiter));
    assert!(delimiters[..4].iter().all(|line| **line == delimiter));
}

#[test]
fn build_is_repeatable() {
    let message = base()
        .set_html("<b>hi</b>")
        .attach(Attachment::from_bytes("a.pdf", b"%PDF-1.4".to_vec()));
    assert_eq!(message.build(), message.build());
}

#[test]
fn address_setters_replace() {
    let message = base()
        .set_to(vec!["x@x.com", "y@x.com"])
        .set_to(vec!["z@x.com"])
        .set_cc(vec!["c@x.com"])
        .set_cc(Vec::<String>::new());
    assert_eq!(message.to(), &["z@x.com".to_string()]);
    assert!(message.cc().is_empty());
    assert_eq!(message.recipients().collect::<Vec<_>>(), vec!["z@x.com"]);

    let text = String::from_utf8(message.build()).unwrap();
    assert!(text.contains("To: z@x.com\r\n"));
    assert!(!text.contains("Cc:"));
}

#[test]
fn empty_xlsx_file_keeps_spreadsheet_type() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("empty.xlsx");
    fs::write(&path, b"").unwrap();
    let attachment = Attachment::load(&path).unwrap();
    assert_eq!(attachment.filename, "empty.xlsx");
    assert_eq!(attachment.mime, XLSX_MIME);
    assert!(attachment.content.is_empty());
}

#[test]
fn strict_loading_stops_at_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let notes = dir.path().join("notes.txt");
    fs::write(&notes, "hello there").unwrap();
    let missing = dir.path().join("gone.pdf");

    match base().add_attachments(vec![&notes, &missing]) {
        Err(Error::Io { path, .. }) => assert_eq!(path, missing),
        Err(err) => panic!("expected I/O error, got {}", err),
        Ok(_) => panic!("expected I/O error"),
    }

    let message = base().add_attachments_lenient(vec![&missing, &notes]);
    assert_eq!(message.attachments().len(), 1);
    assert_eq!(message.attachments()[0].filename, "notes.txt");
    assert_eq!(message.attachments()[0].mime, "text/plain; charset=utf-8");
}

#[test]
fn attaches_from_readers() {
    let message = base().attach_reader(&b"%PDF-1.5 body"[..], "invoice.pdf").unwrap();
    assert_eq!(message.attachments()[0].mime, "application/pdf");
    assert_eq!(message.attachments()[0].content, b"%PDF-1.5 body".to_vec());
}
