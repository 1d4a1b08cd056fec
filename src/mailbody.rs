use bytes::{Bytes};
use crate::message::{Message};

/// Message content as handed to `DATA`.
pub type MailBody = Bytes;

/// A trait for objects that can be converted to a `MailBody`.
///
/// When sending mail using `Session::data`, any object that implements this
/// trait can be passed as the body.
pub trait IntoMailBody {
    /// Converts this object to a `MailBody`.
    fn into_mail_body(self) -> MailBody;
}

impl IntoMailBody for MailBody {
    fn into_mail_body(self) -> MailBody {
        self
    }
}

impl IntoMailBody for Vec<u8> {
    fn into_mail_body(self) -> MailBody {
        self.into()
    }
}

impl IntoMailBody for String {
    fn into_mail_body(self) -> MailBody {
        self.into_bytes().into()
    }
}

impl<'a> IntoMailBody for &'a str {
    fn into_mail_body(self) -> MailBody {
        Bytes::copy_from_slice(self.as_bytes())
    }
}

impl<'a> IntoMailBody for &'a Message {
    fn into_mail_body(self) -> MailBody {
        self.build().into()
    }
}
