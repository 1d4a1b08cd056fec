//! The SMTP client implementation.
//!
//! A [`Session`] owns one connection to a relay. [`Session::connect`]
//! performs the TLS negotiation (immediate, `STARTTLS`, or both in turn),
//! the `EHLO` handshake and authentication, after which the session accepts
//! mail transactions: `mail`, `rcpt`, `data`, `reset` and finally `quit`.
//!
//! Commands and replies travel over a [tokio-util] `Framed` transport using
//! [`ClientCodec`], which also performs dot-stuffing of message content.
//!
//!  [tokio-util]: https://docs.rs/tokio-util/
//!
//! # Example
//!
//! ```no_run
//! use tokio_sendmail::client::{ClientAuth, ClientParams, ClientSecurity, ClientTlsParams,
//!                              Session, TlsVerification};
//! use tokio_sendmail::request::{ClientId};
//!
//! # async fn run() -> tokio_sendmail::Result<()> {
//! let tls = ClientTlsParams::new("smtp.example.test", TlsVerification::Verify)?;
//! let params = ClientParams {
//!     id: ClientId::default(),
//!     security: ClientSecurity::Auto(tls),
//!     auth: Some(ClientAuth::new("john", "secret")),
//! };
//!
//! let mut session = Session::connect("smtp.example.test:465", &params).await?;
//! session.mail("john@example.test").await?;
//! session.rcpt("alice@example.test").await?;
//! session.data("Subject: hi\r\n\r\nhello\r\n").await?;
//! session.quit().await?;
//! # Ok(())
//! # }
//! ```

mod codec;
mod io;
mod handshake;
mod auth;
mod session;

use std::io::{Error as IoError, ErrorKind as IoErrorKind, Result as IoResult};
use futures::{SinkExt, StreamExt};
use crate::error::{Error, Result};
use crate::mailbody::{MailBody};
use crate::request::{ClientId, Request};
use crate::response::{Response};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_native_tls::{TlsConnector};
use tokio_util::codec::{Framed};

pub type ClientTransport<T> = Framed<ClientIo<T>, ClientCodec>;

pub use self::auth::{Authenticator, ClientAuth, LoginStep, Mechanism};
pub use self::codec::{ClientCodec, ClientFrame};
pub use self::handshake::{Extensions};
pub use self::io::{ClientIo, Opening, RecordedStream};
pub use self::session::{Session, SessionState};

/// Certificate validation policy for TLS connections.
///
/// There is no default: callers state which one they want.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TlsVerification {
    /// Validate the certificate chain and the host name
    Verify,
    /// Accept any certificate, e.g. for self-signed relays
    SkipChainValidation,
}

/// Parameters to use for secure clients
pub struct ClientTlsParams {
    /// A connector from `tokio-native-tls`
    pub connector: TlsConnector,
    /// The domain to send during the TLS handshake
    pub sni_domain: String,
}

impl ClientTlsParams {
    /// Build a native connector honouring the given verification policy.
    pub fn new<S: Into<String>>(sni_domain: S, verification: TlsVerification) -> Result<Self> {
        let mut builder = native_tls::TlsConnector::builder();
        if verification == TlsVerification::SkipChainValidation {
            warn!("TLS certificate verification disabled");
            builder
                .danger_accept_invalid_certs(true)
                .danger_accept_invalid_hostnames(true);
        }
        let connector = builder.build().map_err(tls_error)?;
        Ok(ClientTlsParams {
            connector: connector.into(),
            sni_domain: sni_domain.into(),
        })
    }
}


/// How to apply TLS to a client connection
pub enum ClientSecurity {
    /// Insecure connection
    None,
    /// Use `STARTTLS`, allow rejection
    Optional(ClientTlsParams),
    /// Use `STARTTLS`, fail on rejection
    Required(ClientTlsParams),
    /// Use TLS without negotation
    Immediate(ClientTlsParams),
    /// Try TLS without negotiation, fall back to plaintext with optional
    /// `STARTTLS` when the handshake fails
    Auto(ClientTlsParams),
}

/// A `ClientSecurity` without its TLS parameters, as chosen on a builder.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TlsMode {
    Plaintext,
    Opportunistic,
    StartTls,
    Implicit,
    #[default]
    Auto,
}

impl ClientSecurity {
    pub fn with_mode(mode: TlsMode, params: ClientTlsParams) -> Self {
        match mode {
            TlsMode::Plaintext => ClientSecurity::None,
            TlsMode::Opportunistic => ClientSecurity::Optional(params),
            TlsMode::StartTls => ClientSecurity::Required(params),
            TlsMode::Implicit => ClientSecurity::Immediate(params),
            TlsMode::Auto => ClientSecurity::Auto(params),
        }
    }
}


/// Parameters to use during the client handshake
pub struct ClientParams {
    /// Client identifier, the parameter to `EHLO`
    pub id: ClientId,
    /// Whether to use a secure connection, and how
    pub security: ClientSecurity,
    /// Authentication data, `None` to skip `AUTH`
    pub auth: Option<ClientAuth>,
}

impl ClientParams {
    /// Parameters for a plaintext connection to a trusted relay.
    pub fn insecure(id: ClientId, auth: Option<ClientAuth>) -> Self {
        ClientParams {
            security: ClientSecurity::None,
            id, auth,
        }
    }
}


/// What a sender needs to reach and log in to its relay.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
pub struct Credentials {
    /// Login name for `AUTH`; empty to skip authentication
    pub login: String,
    pub password: String,
    /// Sender address, stamped as `From` on every dispatched message
    pub email: String,
    /// Relay address as `host:port`
    pub server: String,
}

impl Credentials {
    pub fn new<S: Into<String>>(login: S, password: S, email: S, server: S) -> Self {
        Credentials {
            login: login.into(),
            password: password.into(),
            email: email.into(),
            server: server.into(),
        }
    }

    /// Authentication data, or `None` for an empty login.
    pub fn client_auth(&self) -> Option<ClientAuth> {
        if self.login.is_empty() {
            None
        } else {
            Some(ClientAuth::new(self.login.as_str(), self.password.as_str()))
        }
    }
}


/// Split a relay address into host and port.
///
/// IPv6 hosts are written in brackets, e.g. `[::1]:25`.
pub fn split_host_port(server: &str) -> Result<(String, u16)> {
    let (host, port) = server.rsplit_once(':')
        .ok_or_else(|| Error::Address(server.to_string()))?;
    let port = port.parse::<u16>()
        .map_err(|_| Error::Address(server.to_string()))?;
    let host = host.strip_prefix('[')
        .and_then(|host| host.strip_suffix(']'))
        .unwrap_or(host);
    if host.is_empty() || (host.contains(':') && !server.starts_with('[')) {
        return Err(Error::Address(server.to_string()));
    }
    Ok((host.to_string(), port))
}

fn tls_error(err: native_tls::Error) -> Error {
    Error::Connect(IoError::new(IoErrorKind::Other, err))
}

// Send a command and wait for its reply.
async fn exchange<T>(transport: &mut ClientTransport<T>, request: Request) -> IoResult<Response>
where T: AsyncRead + AsyncWrite + Unpin
{
    transport.send(ClientFrame::Request(request)).await?;
    receive(transport).await
}

async fn receive<T>(transport: &mut ClientTransport<T>) -> IoResult<Response>
where T: AsyncRead + AsyncWrite + Unpin
{
    match transport.next().await {
        Some(response) => response,
        None => Err(IoError::new(IoErrorKind::UnexpectedEof, "connection closed by server")),
    }
}

// Write message content and its terminator, then wait for the final reply.
async fn transfer<T>(transport: &mut ClientTransport<T>, body: MailBody) -> IoResult<Response>
where T: AsyncRead + AsyncWrite + Unpin
{
    transport.feed(ClientFrame::Body(body)).await?;
    transport.send(ClientFrame::EndOfBody).await?;
    receive(transport).await
}
