//! Composing messages.
//!
//! A [`Message`] collects addresses, a subject, a text and/or HTML body and
//! attachments through consuming setters, and serializes them to MIME with
//! [`Message::build`]:
//!
//! ```
//! use tokio_sendmail::message::{Attachment, Message};
//!
//! let message = Message::new()
//!     .set_from("a@example.test")
//!     .set_to(vec!["b@example.test"])
//!     .set_subject("report")
//!     .set_text("see attached")
//!     .attach(Attachment::from_bytes("report.xlsx", vec![1, 2, 3]));
//!
//! let bytes = message.build();
//! assert!(bytes.starts_with(b"From: a@example.test\r\n"));
//! ```
//!
//! The date and the multipart boundaries are fixed when the message is
//! created, so building twice yields the same bytes.

pub mod attachment;
pub mod sniff;

use std::io::{Read};
use std::path::{Path};
use base64::{Engine};
use base64::engine::general_purpose::{STANDARD as BASE64};
use chrono::{DateTime, FixedOffset, Local};
use crate::error::{Result};
use rand::{RngCore};

pub use self::attachment::{Attachment, XLSX_MIME};
pub use self::sniff::{ContentSniffer, MagicSniffer};

/// `Date` header layout, e.g. `Mon, 02 Jan 2006 15:04:05 -0700`.
pub const DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S %z";

const TEXT_PLAIN: &str = "text/plain; charset=utf-8";
const TEXT_HTML: &str = "text/html; charset=utf-8";

const BASE64_LINE: usize = 76;

// 45 bytes encode to 60 characters, keeping each encoded word under 75.
const ENCODED_WORD_BYTES: usize = 45;

/// A mail message under construction.
#[derive(Clone, Debug)]
pub struct Message {
    from: String,
    to: Vec<String>,
    cc: Vec<String>,
    bcc: Vec<String>,
    subject: String,
    text: String,
    html: Option<String>,
    attachments: Vec<Attachment>,
    date: DateTime<FixedOffset>,
    boundary: String,
    alternative_boundary: String,
}

impl Default for Message {
    fn default() -> Self {
        Self::new()
    }
}

impl Message {
    /// An empty message, with boundaries drawn from the thread RNG.
    pub fn new() -> Self {
        Self::with_rng(&mut rand::rng())
    }

    /// An empty message, with boundaries drawn from `rng`.
    pub fn with_rng<R: RngCore + ?Sized>(rng: &mut R) -> Self {
        Message {
            from: String::new(),
            to: Vec::new(),
            cc: Vec::new(),
            bcc: Vec::new(),
            subject: String::new(),
            text: String::new(),
            html: None,
            attachments: Vec::new(),
            date: Local::now().into(),
            boundary: boundary(rng),
            alternative_boundary: boundary(rng),
        }
    }

    pub fn set_from<S: Into<String>>(mut self, from: S) -> Self {
        self.from = from.into();
        self
    }

    /// Replace the `To` addresses.
    pub fn set_to<I, S>(mut self, addresses: I) -> Self
    where I: IntoIterator<Item = S>, S: Into<String>
    {
        self.to = addresses.into_iter().map(Into::into).collect();
        self
    }

    /// Replace the `Cc` addresses.
    pub fn set_cc<I, S>(mut self, addresses: I) -> Self
    where I: IntoIterator<Item = S>, S: Into<String>
    {
        self.cc = addresses.into_iter().map(Into::into).collect();
        self
    }

    /// Replace the `Bcc` addresses.
    pub fn set_bcc<I, S>(mut self, addresses: I) -> Self
    where I: IntoIterator<Item = S>, S: Into<String>
    {
        self.bcc = addresses.into_iter().map(Into::into).collect();
        self
    }

    pub fn set_subject<S: Into<String>>(mut self, subject: S) -> Self {
        self.subject = subject.into();
        self
    }

    pub fn set_text<S: Into<String>>(mut self, text: S) -> Self {
        self.text = text.into();
        self
    }

    pub fn set_html<S: Into<String>>(mut self, html: S) -> Self {
        self.html = Some(html.into());
        self
    }

    /// Override the `Date` header, which defaults to the creation time.
    pub fn set_date(mut self, date: DateTime<FixedOffset>) -> Self {
        self.date = date;
        self
    }

    pub fn attach(mut self, attachment: Attachment) -> Self {
        self.attachments.push(attachment);
        self
    }

    /// Attach everything `reader` yields under the name `filename`.
    pub fn attach_reader<R: Read>(self, reader: R, filename: &str) -> Result<Self> {
        let attachment = Attachment::from_reader(reader, filename)?;
        Ok(self.attach(attachment))
    }

    /// Attach files from disk, failing on the first one that can't be read.
    pub fn add_attachments<I>(mut self, paths: I) -> Result<Self>
    where I: IntoIterator, I::Item: AsRef<Path>
    {
        for path in paths {
            self.attachments.push(Attachment::load(path)?);
        }
        Ok(self)
    }

    /// Attach files from disk, logging and skipping those that can't be read.
    pub fn add_attachments_lenient<I>(mut self, paths: I) -> Self
    where I: IntoIterator, I::Item: AsRef<Path>
    {
        for path in paths {
            match Attachment::load(path) {
                Ok(attachment) => self.attachments.push(attachment),
                Err(err) => warn!("skipping attachment: {}", err),
            }
        }
        self
    }

    pub fn from(&self) -> &str {
        &self.from
    }

    pub fn to(&self) -> &[String] {
        &self.to
    }

    pub fn cc(&self) -> &[String] {
        &self.cc
    }

    pub fn bcc(&self) -> &[String] {
        &self.bcc
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn html(&self) -> Option<&str> {
        self.html.as_deref()
    }

    pub fn attachments(&self) -> &[Attachment] {
        &self.attachments
    }

    pub fn date(&self) -> &DateTime<FixedOffset> {
        &self.date
    }

    /// The `multipart/mixed` boundary token.
    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    /// Envelope recipients: `To`, then `Cc`, then `Bcc`.
    pub fn recipients(&self) -> impl Iterator<Item = &str> + '_ {
        self.to.iter()
            .chain(&self.cc)
            .chain(&self.bcc)
            .map(String::as_str)
    }

    /// Serialize to MIME.
    pub fn build(&self) -> Vec<u8> {
        let mut out = String::new();

        header(&mut out, "From", &self.from);
        if !self.to.is_empty() {
            header(&mut out, "To", &self.to.join(";"));
        }
        if !self.cc.is_empty() {
            header(&mut out, "Cc", &self.cc.join(";"));
        }
        if !self.bcc.is_empty() {
            header(&mut out, "Bcc", &self.bcc.join(";"));
        }
        header(&mut out, "Subject", &encode_header(&self.subject));
        header(&mut out, "MIME-Version", "1.0");
        header(&mut out, "Date", &self.date.format(DATE_FORMAT).to_string());

        if self.attachments.is_empty() {
            self.write_body(&mut out);
            return out.into_bytes();
        }

        header(&mut out, "Content-Type", &format!("multipart/mixed; boundary=\"{}\"", self.boundary));
        out.push_str("\r\n");
        out.push_str(&format!("--{}\r\n", self.boundary));
        self.write_body(&mut out);

        for attachment in &self.attachments {
            out.push_str(&format!("\r\n--{}\r\n", self.boundary));
            header(&mut out, "Content-Type", &attachment.mime);
            header(&mut out, "Content-Transfer-Encoding", "base64");
            header(&mut out, "MIME-Version", "1.0");
            header(&mut out, "Content-Disposition",
                   &format!("attachment; filename=\"{}\"", encode_filename(&attachment.filename)));
            out.push_str("\r\n");
            write_base64(&mut out, &attachment.content);
        }
        out.push_str(&format!("\r\n--{}--\r\n", self.boundary));

        out.into_bytes()
    }

    // The body's `Content-Type` and `MIME-Version` lines, a blank line and
    // the content.
    fn write_body(&self, out: &mut String) {
        match self.html {
            Some(ref html) if !self.text.is_empty() => {
                let boundary = &self.alternative_boundary;
                header(out, "Content-Type", &format!("multipart/alternative; boundary=\"{}\"", boundary));
                header(out, "MIME-Version", "1.0");
                out.push_str(&format!("\r\n--{}\r\n", boundary));
                write_part(out, TEXT_PLAIN, &self.text);
                out.push_str(&format!("\r\n--{}\r\n", boundary));
                write_part(out, TEXT_HTML, html);
                out.push_str(&format!("\r\n--{}--", boundary));
            },
            Some(ref html) => write_part(out, TEXT_HTML, html),
            None => write_part(out, TEXT_PLAIN, &self.text),
        }
    }
}

fn boundary<R: RngCore + ?Sized>(rng: &mut R) -> String {
    let mut buf = [0u8; 16];
    rng.fill_bytes(&mut buf);
    hex::encode(buf)
}

fn header(out: &mut String, name: &str, value: &str) {
    out.push_str(name);
    out.push_str(": ");
    out.push_str(value);
    out.push_str("\r\n");
}

fn write_part(out: &mut String, content_type: &str, body: &str) {
    header(out, "Content-Type", content_type);
    header(out, "MIME-Version", "1.0");
    out.push_str("\r\n");
    push_crlf(out, body);
}

// Copy `text`, turning bare LF into CRLF.
fn push_crlf(out: &mut String, text: &str) {
    let mut prev = '\0';
    for c in text.chars() {
        if c == '\n' && prev != '\r' {
            out.push('\r');
        }
        out.push(c);
        prev = c;
    }
}

fn write_base64(out: &mut String, content: &[u8]) {
    let encoded = BASE64.encode(content);
    let mut rest = encoded.as_str();
    while rest.len() > BASE64_LINE {
        let (line, tail) = rest.split_at(BASE64_LINE);
        out.push_str(line);
        out.push_str("\r\n");
        rest = tail;
    }
    out.push_str(rest);
}

/// Encode a header value as RFC 2047 `B` words if it isn't plain ASCII.
///
/// Line breaks are dropped, so the value can't start a new header.
pub fn encode_header(value: &str) -> String {
    encoded_words(value).join("\r\n ")
}

// The value of a quoted `filename` parameter. Words stay on one line since
// folding inside a quoted string is not portable.
fn encode_filename(name: &str) -> String {
    encoded_words(name).join(" ")
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
}

fn encoded_words(value: &str) -> Vec<String> {
    let value: String = value.chars().filter(|c| !matches!(c, '\r' | '\n')).collect();
    if value.is_ascii() {
        return vec![value];
    }

    let mut words = Vec::new();
    let mut start = 0;
    let mut end = 0;
    for (index, c) in value.char_indices() {
        if index + c.len_utf8() - start > ENCODED_WORD_BYTES {
            words.push(&value[start..end]);
            start = end;
        }
        end = index + c.len_utf8();
    }
    words.push(&value[start..end]);

    words.iter()
        .map(|word| format!("=?utf-8?B?{}?=", BASE64.encode(word)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{SeedableRng};
    use rand::rngs::{StdRng};

    fn message() -> Message {
        let date = DateTime::parse_from_rfc2822("Mon, 02 Jan 2006 15:04:05 -0700").unwrap();
        Message::with_rng(&mut StdRng::seed_from_u64(7))
            .set_from("a@x.com")
            .set_to(vec!["b@x.com"])
            .set_subject("hi")
            .set_text("hello")
            .set_date(date)
    }

    fn built(message: &Message) -> String {
        String::from_utf8(message.build()).unwrap()
    }

    #[test]
    fn writes_headers_in_order() {
        let message = message()
            .set_to(vec!["b@x.com", "c@x.com"])
            .set_cc(vec!["d@x.com"])
            .set_bcc(vec!["e@x.com"]);
        let text = built(&message);
        let names: Vec<&str> = text.lines()
            .take_while(|line| !line.is_empty())
            .map(|line| line.split(':').next().unwrap())
            .collect();
        assert_eq!(names, vec!["From", "To", "Cc", "Bcc", "Subject", "MIME-Version", "Date",
                               "Content-Type", "MIME-Version"]);
        assert!(text.contains("To: b@x.com;c@x.com\r\n"));
        assert!(text.contains("Date: Mon, 02 Jan 2006 15:04:05 -0700\r\n"));
    }

    #[test]
    fn plain_message_has_no_multipart() {
        let text = built(&message());
        assert_eq!(text, "From: a@x.com\r\n\
                          To: b@x.com\r\n\
                          Subject: hi\r\n\
                          MIME-Version: 1.0\r\n\
                          Date: Mon, 02 Jan 2006 15:04:05 -0700\r\n\
                          Content-Type: text/plain; charset=utf-8\r\n\
                          MIME-Version: 1.0\r\n\
                          \r\n\
                          hello");
    }

    #[test]
    fn omits_empty_address_headers() {
        let text = built(&Message::new());
        assert!(text.starts_with("From: \r\nSubject: \r\n"));
        assert!(!text.contains("To:"));
        assert!(text.ends_with("Content-Type: text/plain; charset=utf-8\r\nMIME-Version: 1.0\r\n\r\n"));
    }

    #[test]
    fn boundaries_come_from_the_rng() {
        let a = Message::with_rng(&mut StdRng::seed_from_u64(1));
        let b = Message::with_rng(&mut StdRng::seed_from_u64(1));
        assert_eq!(a.boundary(), b.boundary());
        assert_eq!(a.boundary().len(), 32);
        assert!(a.boundary().chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a.boundary, a.alternative_boundary);
    }

    #[test]
    fn wraps_base64() {
        let mut out = String::new();
        write_base64(&mut out, &[0u8; 120]);
        let lines: Vec<&str> = out.split("\r\n").collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0].len(), 76);
        assert_eq!(lines[2].len(), 160 - 152);
    }

    #[test]
    fn normalizes_line_endings() {
        let mut out = String::new();
        push_crlf(&mut out, "a\nb\r\nc\n");
        assert_eq!(out, "a\r\nb\r\nc\r\n");
    }

    #[test]
    fn encodes_non_ascii_subjects() {
        assert_eq!(encode_header("hi"), "hi");
        assert_eq!(encode_header("héllo"), "=?utf-8?B?aMOpbGxv?=");

        let long = "ж".repeat(40);
        let encoded = encode_header(&long);
        let words: Vec<&str> = encoded.split("\r\n ").collect();
        assert_eq!(words.len(), 2);
        assert!(words.iter().all(|word| word.len() <= 75));
    }

    #[test]
    fn subject_cannot_add_headers() {
        let text = built(&message().set_subject("hi\r\nBcc: evil@x.com"));
        assert!(text.contains("Subject: hiBcc: evil@x.com\r\n"));
        assert!(!text.contains("\r\nBcc:"));
        assert_eq!(encode_header("жи\nв"), encode_header("жив"));
    }

    #[test]
    fn quotes_attachment_names() {
        let message = message()
            .attach(Attachment::from_bytes("say \"hi\".txt", b"x".to_vec()))
            .attach(Attachment::from_bytes("отчёт.pdf", b"%PDF-1.4".to_vec()));
        let text = built(&message);
        assert!(text.contains("Content-Disposition: attachment; filename=\"say \\\"hi\\\".txt\"\r\n"));
        assert!(text.contains(&format!("Content-Disposition: attachment; filename=\"=?utf-8?B?{}?=\"\r\n",
                                       BASE64.encode("отчёт.pdf"))));
    }

    #[test]
    fn lists_recipients_in_envelope_order() {
        let message = message().set_cc(vec!["c@x.com"]).set_bcc(vec!["d@x.com"]);
        assert_eq!(message.recipients().collect::<Vec<_>>(), vec!["b@x.com", "c@x.com", "d@x.com"]);
    }
}
