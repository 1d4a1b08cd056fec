use std::fmt::{Debug, Formatter, Result as FmtResult};
use base64::{Engine};
use base64::engine::general_purpose::{STANDARD as BASE64};
use crate::client::{exchange, ClientTransport, Extensions};
use crate::error::{Error, Result};
use crate::request::{Request};
use tokio::io::{AsyncRead, AsyncWrite};

/// Client authentication options
#[derive(Clone, PartialEq, Eq)]
pub struct ClientAuth {
    /// Client username or login
    pub username: String,
    /// Client password
    pub password: String,
}

impl ClientAuth {
    /// Instantiate client authentication parameters
    pub fn new<S>(username: S, password: S) -> Self
    where S: Into<String>
    {
        ClientAuth {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl Debug for ClientAuth {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        f.debug_struct("ClientAuth")
            .field("username", &self.username)
            .field("password", &"<omitted>")
            .finish()
    }
}

/// A SASL mechanism the client can perform.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mechanism {
    Plain,
    Login,
}

impl Mechanism {
    pub fn name(&self) -> &'static str {
        match *self {
            Mechanism::Plain => "PLAIN",
            Mechanism::Login => "LOGIN",
        }
    }

    /// Pick a mechanism from what the server advertised.
    ///
    /// Over implicit TLS the server must advertise `AUTH` and `PLAIN` is
    /// used. Otherwise `LOGIN` is preferred when offered.
    pub fn select(extensions: &Extensions, implicit_tls: bool) -> Result<Mechanism> {
        if implicit_tls {
            if !extensions.supports("AUTH") {
                return Err(Error::UnsupportedServer("AUTH".to_string()));
            }
            return Ok(Mechanism::Plain);
        }
        if extensions.supports_auth("LOGIN") {
            Ok(Mechanism::Login)
        } else {
            Ok(Mechanism::Plain)
        }
    }
}

/// The prompt an `AUTH LOGIN` exchange waits for next.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoginStep {
    Username,
    Password,
    Done,
}

/// The client side of one authentication exchange.
///
/// Challenges and responses are raw bytes; base64 is handled by the caller.
pub enum Authenticator<'a> {
    /// Credentials go in the initial response, no challenge is expected.
    Plain { auth: &'a ClientAuth },
    /// Answers the `Username:` and `Password:` prompts in turn.
    Login { auth: &'a ClientAuth, step: LoginStep },
}

impl<'a> Authenticator<'a> {
    pub fn new(mechanism: Mechanism, auth: &'a ClientAuth) -> Self {
        match mechanism {
            Mechanism::Plain => Authenticator::Plain { auth },
            Mechanism::Login => Authenticator::Login { auth, step: LoginStep::Username },
        }
    }

    pub fn mechanism(&self) -> Mechanism {
        match *self {
            Authenticator::Plain { .. } => Mechanism::Plain,
            Authenticator::Login { .. } => Mechanism::Login,
        }
    }

    /// Data to send along with the `AUTH` command.
    pub fn initial_response(&self) -> Option<Vec<u8>> {
        match *self {
            Authenticator::Plain { auth } => Some(plain_message(auth)),
            Authenticator::Login { .. } => None,
        }
    }

    /// Answer a server challenge.
    pub fn respond(&mut self, challenge: &[u8]) -> Result<Vec<u8>> {
        match *self {
            // An empty challenge asks for the initial response again.
            Authenticator::Plain { auth } if challenge.is_empty() => Ok(plain_message(auth)),
            Authenticator::Plain { .. } => Err(unexpected(challenge)),
            Authenticator::Login { auth, ref mut step } => {
                let expected = match *step {
                    LoginStep::Username => "Username:",
                    LoginStep::Password => "Password:",
                    LoginStep::Done => return Err(unexpected(challenge)),
                };
                if !challenge.eq_ignore_ascii_case(expected.as_bytes()) {
                    return Err(unexpected(challenge));
                }
                let (answer, next) = match *step {
                    LoginStep::Username => (&auth.username, LoginStep::Password),
                    _ => (&auth.password, LoginStep::Done),
                };
                *step = next;
                Ok(answer.as_bytes().to_vec())
            },
        }
    }
}

// authzid is left empty, the server derives it from authcid.
fn plain_message(auth: &ClientAuth) -> Vec<u8> {
    format!("\0{}\0{}", auth.username, auth.password).into_bytes()
}

fn unexpected(challenge: &[u8]) -> Error {
    Error::Protocol(format!("unexpected server challenge '{}'", String::from_utf8_lossy(challenge)))
}

/// Run the `AUTH` exchange to completion.
pub async fn authenticate<T>(transport: &mut ClientTransport<T>, auth: &ClientAuth, mechanism: Mechanism)
    -> Result<()>
where T: AsyncRead + AsyncWrite + Unpin
{
    let mut authenticator = Authenticator::new(mechanism, auth);
    let request = Request::Auth {
        method: Some(mechanism.name().to_string()),
        data: authenticator.initial_response().map(|data| BASE64.encode(data)),
    };
    let mut response = exchange(transport, request).await.map_err(Error::Connect)?;

    loop {
        if response.is_completion() {
            info!("authenticated as {} using {}", auth.username, mechanism.name());
            return Ok(());
        }
        if !response.is_intermediate() {
            return Err(Error::Auth(response));
        }

        let answer = BASE64.decode(response.first_line().trim())
            .map_err(|_| unexpected(response.first_line().as_bytes()))
            .and_then(|challenge| authenticator.respond(&challenge));
        let answer = match answer {
            Ok(answer) => answer,
            Err(err) => {
                // Cancel the exchange so the session is left in a known state.
                let cancel = Request::Auth { method: None, data: Some("*".to_string()) };
                let _ = exchange(transport, cancel).await;
                return Err(err);
            },
        };

        let request = Request::Auth { method: None, data: Some(BASE64.encode(answer)) };
        response = exchange(transport, request).await.map_err(Error::Connect)?;
    }
}
