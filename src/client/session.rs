use std::io::{Error as IoError};
use futures::{SinkExt};
use crate::client::{exchange, split_host_port, tls_error, transfer};
use crate::client::{ClientFrame, ClientIo, ClientParams, ClientSecurity, ClientTlsParams, ClientTransport,
                    RecordedStream};
use crate::client::auth::{authenticate, Mechanism};
use crate::client::handshake::{handshake, Extensions};
use crate::error::{Error, Result};
use crate::mailbody::{IntoMailBody};
use crate::request::{Request};
use crate::response::{Response};
use tokio::net::{TcpStream};
use tokio_native_tls::{TlsStream};

type Stream = RecordedStream<TcpStream>;
type Transport = ClientTransport<Stream>;

/// Where a session is in the mail transaction cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    /// Connected and authenticated, no transaction open
    Ready,
    /// `MAIL FROM` accepted, counting accepted recipients
    Transacting { accepted: usize },
    /// `QUIT` sent, connection dropped, or a transport error occurred
    Closed,
}

/// An authenticated connection to a relay.
///
/// Commands are strictly sequential, so every operation takes `&mut self`.
/// Run one session per connection to send in parallel.
pub struct Session {
    transport: Option<Transport>,
    state: SessionState,
    extensions: Extensions,
    mechanism: Option<Mechanism>,
    secure: bool,
}

impl Session {
    /// Connect to `server` (`host:port`), negotiate TLS and authenticate.
    pub async fn connect(server: &str, params: &ClientParams) -> Result<Session> {
        let (host, port) = split_host_port(server)?;

        let (transport, extensions, implicit_tls) = match params.security {
            ClientSecurity::None => {
                Self::connect_plain(&host, port, params, None, false).await?
            },
            ClientSecurity::Optional(ref tls) => {
                Self::connect_plain(&host, port, params, Some(tls), false).await?
            },
            ClientSecurity::Required(ref tls) => {
                Self::connect_plain(&host, port, params, Some(tls), true).await?
            },
            ClientSecurity::Immediate(ref tls) => {
                let stream = Self::open_tls(&host, port, tls).await?;
                Self::connect_immediate_tls(stream, params).await?
            },
            ClientSecurity::Auto(ref tls) => {
                match Self::try_tls(&host, port, tls).await? {
                    Some(stream) => Self::connect_immediate_tls(stream, params).await?,
                    None => Self::connect_plain(&host, port, params, Some(tls), false).await?,
                }
            },
        };

        let mut session = Session {
            secure: transport.get_ref().is_secure(),
            transport: Some(transport),
            state: SessionState::Ready,
            extensions,
            mechanism: None,
        };

        if let Some(ref auth) = params.auth {
            let mechanism = Mechanism::select(&session.extensions, implicit_tls)?;
            if let Some(ref mut transport) = session.transport {
                authenticate(transport, auth, mechanism).await?;
            }
            session.mechanism = Some(mechanism);
        }

        Ok(session)
    }

    async fn open_tls(host: &str, port: u16, tls: &ClientTlsParams) -> Result<TlsStream<Stream>> {
        let tcp = TcpStream::connect((host, port)).await.map_err(Error::Connect)?;
        let (stream, _) = RecordedStream::new(tcp);
        tls.connector.connect(&tls.sni_domain, stream).await.map_err(tls_error)
    }

    // `None` when the relay can't be reached or answered the handshake with
    // an SMTP greeting; the caller then retries in plaintext. Any other
    // handshake failure, e.g. a rejected certificate, is final.
    async fn try_tls(host: &str, port: u16, tls: &ClientTlsParams) -> Result<Option<TlsStream<Stream>>> {
        let tcp = match TcpStream::connect((host, port)).await {
            Ok(tcp) => tcp,
            Err(err) => {
                warn!("direct TLS to {}:{} failed ({}), retrying in plaintext", host, port, err);
                return Ok(None);
            },
        };
        let (stream, opening) = RecordedStream::new(tcp);
        match tls.connector.connect(&tls.sni_domain, stream).await {
            Ok(stream) => Ok(Some(stream)),
            Err(err) if opening.is_smtp_reply() => {
                warn!("{}:{} answered direct TLS in plaintext ({}), retrying", host, port, err);
                Ok(None)
            },
            Err(err) => Err(tls_error(err)),
        }
    }

    async fn connect_immediate_tls(stream: TlsStream<Stream>, params: &ClientParams)
        -> Result<(Transport, Extensions, bool)>
    {
        let (extensions, transport) = handshake(ClientIo::Secure(stream), &params.id, true).await?;
        Ok((transport, extensions, true))
    }

    async fn connect_plain(host: &str, port: u16, params: &ClientParams,
                           tls: Option<&ClientTlsParams>, is_required: bool)
        -> Result<(Transport, Extensions, bool)>
    {
        let tcp = TcpStream::connect((host, port)).await.map_err(Error::Connect)?;
        let (stream, _) = RecordedStream::new(tcp);
        let (extensions, mut transport) = handshake(ClientIo::Plain(stream), &params.id, true).await?;

        let tls = match tls {
            Some(tls) => tls,
            None => return Ok((transport, extensions, false)),
        };

        if !extensions.supports("STARTTLS") {
            if is_required {
                return Err(Error::UnsupportedServer("STARTTLS".to_string()));
            }
            warn!("relay does not offer STARTTLS, continuing in plaintext");
            return Ok((transport, extensions, false));
        }

        let response = exchange(&mut transport, Request::StartTls).await.map_err(Error::Connect)?;
        if !response.is_completion() {
            if is_required {
                return Err(Error::UnsupportedServer(format!("STARTTLS ({})", response)));
            }
            warn!("relay refused STARTTLS ({}), continuing in plaintext", response);
            return Ok((transport, extensions, false));
        }

        // Get the inner `Io` back, then start TLS on it.
        let io = transport.into_inner().into_plain()
            .ok_or_else(|| Error::Protocol("STARTTLS on a secure transport".to_string()))?;
        let stream = tls.connector.connect(&tls.sni_domain, io).await.map_err(tls_error)?;
        info!("STARTTLS upgrade with {} complete", tls.sni_domain);

        // Re-do the handshake.
        let (extensions, transport) = handshake(ClientIo::Secure(stream), &params.id, false).await?;
        Ok((transport, extensions, false))
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Extensions from the last `EHLO`.
    pub fn extensions(&self) -> &Extensions {
        &self.extensions
    }

    /// The mechanism used to authenticate, if any.
    pub fn mechanism(&self) -> Option<Mechanism> {
        self.mechanism
    }

    /// Whether the connection is encrypted, from the start or via `STARTTLS`.
    pub fn is_secure(&self) -> bool {
        self.secure
    }

    /// Recipients accepted in the open transaction.
    pub fn accepted_recipients(&self) -> usize {
        match self.state {
            SessionState::Transacting { accepted } => accepted,
            _ => 0,
        }
    }

    /// Start a transaction with `MAIL FROM`.
    pub async fn mail(&mut self, from: &str) -> Result<Response> {
        match self.state {
            SessionState::Closed => return Err(Error::ClosedSession),
            SessionState::Transacting { .. } => return Err(Error::OutOfSequence("MAIL FROM")),
            SessionState::Ready => {},
        }

        let response = self.command(Request::Mail { from: from.to_string() }).await?;
        if !response.is_completion() {
            return Err(Error::Envelope {
                address: from.to_string(),
                response,
            });
        }
        self.state = SessionState::Transacting { accepted: 0 };
        Ok(response)
    }

    /// Add one envelope recipient with `RCPT TO`.
    pub async fn rcpt(&mut self, to: &str) -> Result<Response> {
        let accepted = match self.state {
            SessionState::Closed => return Err(Error::ClosedSession),
            SessionState::Ready => return Err(Error::OutOfSequence("RCPT TO")),
            SessionState::Transacting { accepted } => accepted,
        };

        let response = self.command(Request::Rcpt { to: to.to_string() }).await?;
        if !response.is_completion() {
            return Err(Error::Envelope {
                address: to.to_string(),
                response,
            });
        }
        self.state = SessionState::Transacting { accepted: accepted + 1 };
        Ok(response)
    }

    /// Send the message content.
    ///
    /// On rejection the transaction stays open; call `reset` before the
    /// next `mail`.
    pub async fn data<B: IntoMailBody>(&mut self, body: B) -> Result<Response> {
        match self.state {
            SessionState::Closed => return Err(Error::ClosedSession),
            SessionState::Ready => return Err(Error::OutOfSequence("DATA")),
            SessionState::Transacting { accepted: 0 } => return Err(Error::NoRecipients),
            SessionState::Transacting { .. } => {},
        }

        let response = self.command(Request::Data).await?;
        if !response.is_intermediate() {
            return Err(Error::Data(response));
        }

        let body = body.into_mail_body();
        let response = match self.transport {
            Some(ref mut transport) => transfer(transport, body).await,
            None => return Err(Error::ClosedSession),
        };
        let response = response.map_err(|err| self.fail(err))?;
        if !response.is_completion() {
            return Err(Error::Data(response));
        }
        self.state = SessionState::Ready;
        Ok(response)
    }

    /// Abort the open transaction with `RSET`.
    pub async fn reset(&mut self) -> Result<Response> {
        if self.state == SessionState::Closed {
            return Err(Error::ClosedSession);
        }
        let response = self.command(Request::Rset).await?;
        if !response.is_completion() {
            return Err(Error::Protocol(format!("RSET refused: {}", response)));
        }
        self.state = SessionState::Ready;
        Ok(response)
    }

    /// Keep the connection alive with `NOOP`.
    pub async fn noop(&mut self) -> Result<Response> {
        if self.state == SessionState::Closed {
            return Err(Error::ClosedSession);
        }
        self.command(Request::Noop).await
    }

    /// Say goodbye with `QUIT` and close the connection.
    pub async fn quit(&mut self) -> Result<()> {
        let mut transport = match self.transport.take() {
            Some(transport) => transport,
            None => return Err(Error::ClosedSession),
        };
        self.state = SessionState::Closed;

        match exchange(&mut transport, Request::Quit).await {
            Ok(response) => debug!("session closed: {}", response),
            Err(err) => debug!("error during QUIT: {}", err),
        }
        let _ = SinkExt::<ClientFrame>::close(&mut transport).await;
        Ok(())
    }

    /// Drop the connection without `QUIT`.
    pub fn close(&mut self) -> Result<()> {
        if self.transport.take().is_none() {
            return Err(Error::ClosedSession);
        }
        self.state = SessionState::Closed;
        debug!("session dropped");
        Ok(())
    }

    /// Leave the relay in a known state before giving up on the session:
    /// `RSET` an open transaction, then `QUIT`.
    pub async fn abort(&mut self) -> Result<()> {
        if let SessionState::Transacting { .. } = self.state {
            if let Err(err) = self.reset().await {
                warn!("RSET before QUIT failed: {}", err);
            }
        }
        self.quit().await
    }

    async fn command(&mut self, request: Request) -> Result<Response> {
        let result = match self.transport {
            Some(ref mut transport) => exchange(transport, request).await,
            None => return Err(Error::ClosedSession),
        };
        result.map_err(|err| self.fail(err))
    }

    // The connection is unusable after an I/O error.
    fn fail(&mut self, err: IoError) -> Error {
        warn!("closing session after transport error: {}", err);
        self.transport = None;
        self.state = SessionState::Closed;
        Error::Transport(err)
    }
}
