use std::io::{Error as IoError, ErrorKind as IoErrorKind};
use crate::client::{exchange, receive, ClientCodec, ClientIo, ClientTransport};
use crate::error::{Error, Result};
use crate::request::{ClientId, Request};
use crate::response::{Response};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::{Framed};

/// Service extensions advertised in the `EHLO` reply.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Extensions {
    /// The server's self-reported name, first line of the reply
    pub server: String,
    /// One entry per extension line, e.g. `AUTH LOGIN PLAIN`
    pub keywords: Vec<String>,
}

impl Extensions {
    /// Read extensions from a positive `EHLO` reply.
    pub fn from_ehlo(response: &Response) -> Self {
        let mut lines = response.text.iter();
        Extensions {
            server: lines.next().cloned().unwrap_or_default(),
            keywords: lines.cloned().collect(),
        }
    }

    /// Whether the keyword was advertised, e.g. `STARTTLS` or `AUTH`.
    pub fn supports(&self, keyword: &str) -> bool {
        self.keywords.iter()
            .filter_map(|line| keyword_of(line))
            .any(|name| name.eq_ignore_ascii_case(keyword))
    }

    /// Mechanisms listed on the `AUTH` line(s).
    pub fn auth_mechanisms(&self) -> Vec<&str> {
        self.keywords.iter()
            .filter(|line| keyword_of(line).map_or(false, |name| name.eq_ignore_ascii_case("AUTH")))
            // Old servers announce `AUTH=LOGIN PLAIN`.
            .flat_map(|line| line[4..].split(|c: char| c == ' ' || c == '='))
            .filter(|mechanism| !mechanism.is_empty())
            .collect()
    }

    pub fn supports_auth(&self, mechanism: &str) -> bool {
        self.auth_mechanisms().iter().any(|name| name.eq_ignore_ascii_case(mechanism))
    }
}

fn keyword_of(line: &str) -> Option<&str> {
    line.split(|c: char| c == ' ' || c == '=').next().filter(|name| !name.is_empty())
}

/// Frame the connection and say hello.
///
/// With `await_greeting` the server's opening reply is read first; it is
/// skipped after `STARTTLS`, where the server does not send a new one.
pub async fn handshake<T>(io: ClientIo<T>, id: &ClientId, await_greeting: bool)
    -> Result<(Extensions, ClientTransport<T>)>
where T: AsyncRead + AsyncWrite + Unpin
{
    // Start codec.
    let mut transport = Framed::new(io, ClientCodec::new());

    if await_greeting {
        let greeting = receive(&mut transport).await.map_err(Error::Connect)?;
        if !greeting.is_completion() {
            return Err(Error::Connect(IoError::new(
                IoErrorKind::ConnectionRefused, format!("relay refused the session: {}", greeting))));
        }
        info!("connected: {}", greeting);
    }

    let response = exchange(&mut transport, Request::Ehlo(id.clone())).await
        .map_err(Error::Connect)?;
    if response.is_completion() {
        return Ok((Extensions::from_ehlo(&response), transport));
    }

    // Plain SMTP servers only know HELO, and advertise nothing.
    debug!("EHLO rejected, trying HELO");
    let response = exchange(&mut transport, Request::Helo(id.clone())).await
        .map_err(Error::Connect)?;
    if !response.is_completion() {
        return Err(Error::UnsupportedServer(format!("EHLO or HELO ({})", response)));
    }
    Ok((Extensions::default(), transport))
}
