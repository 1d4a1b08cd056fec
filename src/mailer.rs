use std::collections::{VecDeque};
use std::time::{Duration};
use crate::client::{split_host_port, ClientParams, ClientSecurity, ClientTlsParams, Credentials,
                    Session, TlsMode, TlsVerification};
use crate::error::{Error, Result};
use crate::message::{Message};
use crate::request::{ClientId};
use crate::sender::{sendmail, RecipientPolicy};
use tokio::time::{timeout};
use tokio_native_tls::{TlsConnector};

/// Delivers queued messages through one session.
///
/// A `Mailer` is created using a `MailerBuilder`. Every message added is
/// stamped with the sender address from the credentials.
pub struct Mailer {
    session: Session,
    credentials: Credentials,
    queue: VecDeque<Message>,
    policy: RecipientPolicy,
}

impl Mailer {
    /// Alias for `MailerBuilder::new(credentials)`.
    pub fn builder(credentials: Credentials) -> MailerBuilder {
        MailerBuilder::new(credentials)
    }

    /// Alias for `MailerBuilder::new(credentials).connect()`.
    pub async fn connect(credentials: Credentials) -> Result<Self> {
        MailerBuilder::new(credentials).connect().await
    }

    /// Queue messages, overwriting their `From`.
    pub fn add<I>(&mut self, messages: I)
    where I: IntoIterator<Item = Message>
    {
        for message in messages {
            self.queue.push_back(message.set_from(self.credentials.email.as_str()));
        }
    }

    /// Number of messages not yet attempted.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Messages not yet attempted, in sending order.
    pub fn queued(&self) -> impl Iterator<Item = &Message> {
        self.queue.iter()
    }

    /// Send every queued message in order.
    ///
    /// Each message leaves the queue just before its transaction starts.
    /// The first failure stops the batch and is returned; messages after it
    /// stay queued. Returns the number of messages sent.
    pub async fn send_all(&mut self) -> Result<usize> {
        let mut sent = 0;
        while let Some(message) = self.queue.pop_front() {
            debug!("sending message {:?} ({} left)", message.subject(), self.queue.len());
            sendmail(&mut self.session, &message, self.policy).await?;
            sent += 1;
        }
        Ok(sent)
    }

    /// `send_all` with a deadline. On expiry the session is closed and
    /// `Error::Timeout` returned.
    pub async fn send_all_within(&mut self, limit: Duration) -> Result<usize> {
        let result = timeout(limit, self.send_all()).await;
        match result {
            Ok(result) => result,
            Err(_) => {
                warn!("sending did not finish within {:?}, closing session", limit);
                let _ = self.session.close();
                Err(Error::Timeout)
            },
        }
    }

    /// Close the session gracefully.
    pub async fn quit(&mut self) -> Result<()> {
        self.session.quit().await
    }

    /// Reset any open transaction, then quit.
    pub async fn abort(&mut self) -> Result<()> {
        self.session.abort().await
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }
}


/// Builder for a `Mailer` instance.
pub struct MailerBuilder {
    credentials: Credentials,
    client_id: ClientId,
    tls_mode: TlsMode,
    tls_verification: TlsVerification,
    tls_connector: Option<TlsConnector>,
    recipient_policy: RecipientPolicy,
}

impl MailerBuilder {
    /// Create a builder.
    pub fn new(credentials: Credentials) -> Self {
        MailerBuilder {
            credentials,
            client_id: ClientId::default(),
            tls_mode: TlsMode::default(),
            tls_verification: TlsVerification::Verify,
            tls_connector: None,
            recipient_policy: RecipientPolicy::default(),
        }
    }

    /// Set the `EHLO` identifier to send.
    ///
    /// By default, this is `localhost`.
    pub fn set_client_id(mut self, client_id: ClientId) -> Self {
        self.client_id = client_id;
        self
    }

    /// Choose how TLS is applied.
    ///
    /// By default, direct TLS is tried first with a fallback to plaintext
    /// and `STARTTLS`.
    pub fn set_security(mut self, tls_mode: TlsMode) -> Self {
        self.tls_mode = tls_mode;
        self
    }

    /// Choose whether certificates are validated.
    ///
    /// By default, they are.
    pub fn set_tls_verification(mut self, verification: TlsVerification) -> Self {
        self.tls_verification = verification;
        self
    }

    /// Use the given connector instead of a native one built from the
    /// verification setting.
    pub fn set_tls_connector(mut self, tls_connector: TlsConnector) -> Self {
        self.tls_connector = Some(tls_connector);
        self
    }

    /// Choose what happens when a recipient is rejected.
    ///
    /// By default, the message fails.
    pub fn set_recipient_policy(mut self, policy: RecipientPolicy) -> Self {
        self.recipient_policy = policy;
        self
    }

    /// Connect, authenticate and transform this builder into a `Mailer`.
    pub async fn connect(self) -> Result<Mailer> {
        let (host, _) = split_host_port(&self.credentials.server)?;
        let security = match self.tls_mode {
            TlsMode::Plaintext => ClientSecurity::None,
            mode => {
                let tls = match self.tls_connector {
                    Some(connector) => ClientTlsParams { connector, sni_domain: host },
                    None => ClientTlsParams::new(host, self.tls_verification)?,
                };
                ClientSecurity::with_mode(mode, tls)
            },
        };
        let params = ClientParams {
            id: self.client_id,
            security,
            auth: self.credentials.client_auth(),
        };

        let session = Session::connect(&self.credentials.server, &params).await?;
        info!("ready to send as {} through {}", self.credentials.email, self.credentials.server);
        Ok(Mailer {
            session,
            credentials: self.credentials,
            queue: VecDeque::new(),
            policy: self.recipient_policy,
        })
    }
}
