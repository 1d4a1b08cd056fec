use std::fs;
use std::io::{Read};
use std::path::{Path};
use crate::error::{Error, Result};
use crate::message::sniff::{detect_content_type, ContentSniffer, MagicSniffer};

/// Type forced for any file named `*.xlsx`, whatever its content.
pub const XLSX_MIME: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// A file attached to a message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Attachment {
    /// Base name, without any directory part
    pub filename: String,
    pub mime: String,
    pub content: Vec<u8>,
}

impl Attachment {
    /// Read a file from disk.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::load_with(path, &MagicSniffer)
    }

    /// Read a file from disk, detecting its type with `sniffer`.
    pub fn load_with<P: AsRef<Path>>(path: P, sniffer: &dyn ContentSniffer) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read(path).map_err(|err| Error::io(path, err))?;
        Ok(Self::from_bytes_with(basename(path), content, sniffer))
    }

    /// Drain a reader. `filename` names the attachment and is reported in
    /// read errors.
    pub fn from_reader<R: Read>(mut reader: R, filename: &str) -> Result<Self> {
        let mut content = Vec::new();
        reader.read_to_end(&mut content).map_err(|err| Error::io(filename, err))?;
        Ok(Self::from_bytes(filename, content))
    }

    pub fn from_bytes<S: AsRef<str>>(filename: S, content: Vec<u8>) -> Self {
        Self::from_bytes_with(filename, content, &MagicSniffer)
    }

    pub fn from_bytes_with<S: AsRef<str>>(filename: S, content: Vec<u8>, sniffer: &dyn ContentSniffer) -> Self {
        let filename = basename(Path::new(filename.as_ref()));
        Attachment {
            mime: content_type(&filename, &content, sniffer),
            filename,
            content,
        }
    }
}

/// Resolve the MIME type of an attachment.
///
/// A `.xlsx` name wins over the content; otherwise the sniffer is asked,
/// and [`detect_content_type`] decides when it finds no signature.
pub fn content_type(filename: &str, content: &[u8], sniffer: &dyn ContentSniffer) -> String {
    if filename.to_ascii_lowercase().ends_with(".xlsx") {
        return XLSX_MIME.to_string();
    }

    match sniffer.sniff(content) {
        (mime, true) => mime,
        (_, false) => detect_content_type(content).to_string(),
    }
}

fn basename(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}
