use std::io::{Error as IoError, ErrorKind as IoErrorKind};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use nom::{Err as NomErr};
use crate::request::{Request};
use crate::response::{Response};
use tokio_util::codec::{Decoder, Encoder};

/// A frame written by the client.
#[derive(Debug)]
pub enum ClientFrame {
    /// A command line
    Request(Request),
    /// A chunk of message content following an accepted `DATA`
    Body(Bytes),
    /// End of message content, writes the `.` terminator
    EndOfBody,
}

impl From<Request> for ClientFrame {
    fn from(request: Request) -> Self {
        ClientFrame::Request(request)
    }
}

// Where the encoder is relative to a line start inside message content.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Escape {
    Mid,
    Cr,
    LineStart,
}

/// The codec used to encode client requests and decode server responses
#[derive(Debug)]
pub struct ClientCodec {
    escape: Escape,
}

impl Default for ClientCodec {
    fn default() -> Self {
        // Message content starts at the beginning of a line.
        ClientCodec { escape: Escape::LineStart }
    }
}

impl ClientCodec {
    pub fn new() -> Self {
        ClientCodec::default()
    }
}

impl Encoder<ClientFrame> for ClientCodec {
    type Error = IoError;

    fn encode(&mut self, frame: ClientFrame, buf: &mut BytesMut) -> Result<(), IoError> {
        match frame {
            ClientFrame::Request(request) => {
                match request {
                    Request::Auth { .. } => debug!("C: AUTH <credentials omitted>"),
                    ref request => debug!("C: {}", request),
                }
                buf.put_slice(request.to_string().as_bytes());
                buf.put_slice(b"\r\n");
            },
            ClientFrame::Body(chunk) => {
                debug!("C: <{} bytes of message content>", chunk.len());
                // Escape lines starting with a '.'
                let mut start = 0;
                for (idx, byte) in chunk.iter().enumerate() {
                    if self.escape == Escape::LineStart && *byte == b'.' {
                        buf.put_slice(&chunk[start..idx]);
                        buf.put_slice(b".");
                        start = idx;
                    }
                    self.escape = match (*byte, self.escape) {
                        (b'\r', _) => Escape::Cr,
                        (b'\n', Escape::Cr) => Escape::LineStart,
                        _ => Escape::Mid,
                    };
                }
                buf.put_slice(&chunk[start..]);
            },
            ClientFrame::EndOfBody => {
                debug!("C: .");
                match self.escape {
                    Escape::Mid => buf.put_slice(b"\r\n.\r\n"),
                    Escape::Cr => buf.put_slice(b"\n.\r\n"),
                    Escape::LineStart => buf.put_slice(b".\r\n"),
                }
                self.escape = Escape::LineStart;
            },
        }
        Ok(())
    }
}

impl Decoder for ClientCodec {
    type Item = Response;
    type Error = IoError;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<Response>, IoError> {
        let (consumed, response) = match Response::parse(buf.as_ref()) {
            Ok((rest, response)) => (buf.len() - rest.len(), response),
            Err(NomErr::Incomplete(_)) => return Ok(None),
            Err(_) => return Err(IoError::new(IoErrorKind::InvalidData, "malformed response")),
        };

        // Drain parsed data.
        buf.advance(consumed);
        debug!("S: {}", response);
        Ok(Some(response))
    }
}
