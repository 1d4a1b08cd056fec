use crate::client::{Session};
use crate::error::{Error, Result};
use crate::message::{Message};
use crate::response::{Response};

/// What to do when the relay rejects one of a message's recipients.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RecipientPolicy {
    /// Reset the transaction and fail the message
    #[default]
    AbortOnRejection,
    /// Log the rejection and deliver to the recipients that were accepted
    SkipRejected,
}

/// Send one message: `MAIL FROM`, a `RCPT TO` per recipient, then `DATA`.
///
/// On failure the transaction is reset, so the session is ready for the
/// next message unless the error was fatal.
pub async fn sendmail(session: &mut Session, message: &Message, policy: RecipientPolicy)
    -> Result<Response>
{
    session.mail(message.from()).await?;

    for recipient in message.recipients() {
        match session.rcpt(recipient).await {
            Ok(_) => {},
            Err(err @ Error::Envelope { .. }) if policy == RecipientPolicy::SkipRejected => {
                warn!("skipping recipient: {}", err);
            },
            Err(err) => return Err(recover(session, err).await),
        }
    }

    let accepted = session.accepted_recipients();
    if accepted == 0 {
        return Err(recover(session, Error::NoRecipients).await);
    }

    match session.data(message).await {
        Ok(response) => {
            info!("message to {} recipient(s) accepted: {}", accepted, response);
            Ok(response)
        },
        Err(err) => Err(recover(session, err).await),
    }
}

// Return the session to `Ready` after a failed transaction.
async fn recover(session: &mut Session, err: Error) -> Error {
    if err.is_fatal() {
        return err;
    }
    if let Err(reset) = session.reset().await {
        warn!("RSET after failed transaction: {}", reset);
    }
    err
}
