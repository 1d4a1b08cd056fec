//! SMTP commands sent by the client.

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::net::{Ipv4Addr, Ipv6Addr};

/// The identifier a client sends with `EHLO` / `HELO`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ClientId {
    /// A fully qualified domain name
    Domain(String),
    /// An IPv4 address literal
    Ipv4(Ipv4Addr),
    /// An IPv6 address literal
    Ipv6(Ipv6Addr),
}

impl Default for ClientId {
    fn default() -> Self {
        ClientId::Domain("localhost".to_string())
    }
}

impl Display for ClientId {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        match *self {
            ClientId::Domain(ref domain) => f.write_str(domain),
            ClientId::Ipv4(ref addr) => write!(f, "[{}]", addr),
            ClientId::Ipv6(ref addr) => write!(f, "[IPv6:{}]", addr),
        }
    }
}

/// A client command.
///
/// The `Display` implementation renders the command line without the
/// trailing CRLF; the codec appends it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Request {
    Ehlo(ClientId),
    Helo(ClientId),
    StartTls,
    /// `AUTH <method> [initial]`, or a bare continuation line when
    /// `method` is `None`.
    Auth {
        method: Option<String>,
        data: Option<String>,
    },
    Mail {
        from: String,
    },
    Rcpt {
        to: String,
    },
    Data,
    Rset,
    Noop,
    Quit,
}

impl Request {
    /// The command verb, used in logs and errors.
    pub fn verb(&self) -> &'static str {
        match *self {
            Request::Ehlo(_) => "EHLO",
            Request::Helo(_) => "HELO",
            Request::StartTls => "STARTTLS",
            Request::Auth { .. } => "AUTH",
            Request::Mail { .. } => "MAIL FROM",
            Request::Rcpt { .. } => "RCPT TO",
            Request::Data => "DATA",
            Request::Rset => "RSET",
            Request::Noop => "NOOP",
            Request::Quit => "QUIT",
        }
    }
}

impl Display for Request {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        match *self {
            Request::Ehlo(ref id) => write!(f, "EHLO {}", id),
            Request::Helo(ref id) => write!(f, "HELO {}", id),
            Request::StartTls => f.write_str("STARTTLS"),
            Request::Auth { ref method, ref data } => {
                match (method, data) {
                    (Some(method), Some(data)) => write!(f, "AUTH {} {}", method, data),
                    (Some(method), None) => write!(f, "AUTH {}", method),
                    (None, Some(data)) => f.write_str(data),
                    (None, None) => Ok(()),
                }
            },
            Request::Mail { ref from } => write!(f, "MAIL FROM:<{}>", from),
            Request::Rcpt { ref to } => write!(f, "RCPT TO:<{}>", to),
            Request::Data => f.write_str("DATA"),
            Request::Rset => f.write_str("RSET"),
            Request::Noop => f.write_str("NOOP"),
            Request::Quit => f.write_str("QUIT"),
        }
    }
}
