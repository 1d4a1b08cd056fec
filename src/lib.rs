//! Compose mail with attachments and deliver it through an SMTP relay, on
//! [Tokio].
//!
//! The toplevel module exports a basic interface to send mail, through the
//! `Mailer` type: connect with `Credentials`, queue `Message`s, then send
//! them all over one authenticated session. The relay may be reachable over
//! implicit TLS or plaintext upgraded with `STARTTLS`; both are tried.
//!
//! Messages are built with the [message module](message/). A lower-level
//! session is available in [the client module](client/).
//!
//!  [Tokio]: https://tokio.rs/
//!
//! # Example
//!
//! ```no_run
//! use tokio_sendmail::{Credentials, Mailer, Message};
//!
//! #[tokio::main]
//! async fn main() -> tokio_sendmail::Result<()> {
//!     let credentials = Credentials::new("john", "secret", "john@example.test", "smtp.example.test:465");
//!     let mut mailer = Mailer::connect(credentials).await?;
//!
//!     let message = Message::new()
//!         .set_to(vec!["alice@example.test"])
//!         .set_subject("Quarterly report")
//!         .set_text("Numbers attached.")
//!         .add_attachments(vec!["report.xlsx"])?;
//!     mailer.add(vec![message]);
//!
//!     mailer.send_all().await?;
//!     mailer.quit().await
//! }
//! ```

#[macro_use]
extern crate log;

pub mod error;
pub mod mailbody;
pub mod message;
pub mod client;
pub mod request;
pub mod response;
pub mod sender;
pub mod mailer;

pub use crate::error::{Error, Result};
pub use crate::mailbody::{MailBody, IntoMailBody};
pub use crate::message::{Attachment, Message};
pub use crate::client::{ClientParams, ClientAuth, ClientSecurity, ClientTlsParams, Credentials,
                        Session, TlsMode, TlsVerification};
pub use crate::sender::{sendmail, RecipientPolicy};
pub use crate::mailer::{Mailer, MailerBuilder};
