//! SMTP replies sent by the server, and their parser.

use std::fmt::{Display, Formatter, Result as FmtResult};
use nom::{IResult};
use nom::bytes::streaming::{tag, take_until, take_while_m_n};
use nom::character::streaming::{one_of};
use nom::combinator::{map_res, opt};

/// First digit of a reply code.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Severity {
    PositiveCompletion,
    PositiveIntermediate,
    TransientNegativeCompletion,
    PermanentNegativeCompletion,
}

impl Severity {
    /// Whether the command succeeded, or is waiting for more input.
    pub fn is_positive(&self) -> bool {
        match *self {
            Severity::PositiveCompletion | Severity::PositiveIntermediate => true,
            _ => false,
        }
    }
}

/// Second digit of a reply code.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Category {
    Syntax,
    Information,
    Connections,
    Unspecified3,
    Unspecified4,
    MailSystem,
}

/// A three digit reply code.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ResponseCode {
    pub severity: Severity,
    pub category: Category,
    pub detail: u8,
}

impl ResponseCode {
    fn from_digits(digits: &[u8]) -> Result<Self, &'static str> {
        let severity = match digits[0] {
            b'2' => Severity::PositiveCompletion,
            b'3' => Severity::PositiveIntermediate,
            b'4' => Severity::TransientNegativeCompletion,
            b'5' => Severity::PermanentNegativeCompletion,
            _ => return Err("invalid severity digit"),
        };
        let category = match digits[1] {
            b'0' => Category::Syntax,
            b'1' => Category::Information,
            b'2' => Category::Connections,
            b'3' => Category::Unspecified3,
            b'4' => Category::Unspecified4,
            b'5' => Category::MailSystem,
            _ => return Err("invalid category digit"),
        };
        Ok(ResponseCode {
            severity,
            category,
            detail: digits[2] - b'0',
        })
    }

    /// The code as a number, e.g. `250`.
    pub fn value(&self) -> u16 {
        let severity = match self.severity {
            Severity::PositiveCompletion => 2,
            Severity::PositiveIntermediate => 3,
            Severity::TransientNegativeCompletion => 4,
            Severity::PermanentNegativeCompletion => 5,
        };
        let category = match self.category {
            Category::Syntax => 0,
            Category::Information => 1,
            Category::Connections => 2,
            Category::Unspecified3 => 3,
            Category::Unspecified4 => 4,
            Category::MailSystem => 5,
        };
        severity * 100 + category * 10 + u16::from(self.detail)
    }
}

impl Display for ResponseCode {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        write!(f, "{}", self.value())
    }
}

/// A complete, possibly multi-line, server reply.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Response {
    pub code: ResponseCode,
    /// Text of each line, without code and separator.
    pub text: Vec<String>,
}

impl Response {
    /// Parse one reply from the start of `input`.
    ///
    /// Returns `Incomplete` until the final line has been received.
    pub fn parse(input: &[u8]) -> IResult<&[u8], Response> {
        let mut input = input;
        let mut text = Vec::new();
        loop {
            let (rest, (code, more, line)) = reply_line(input)?;
            text.push(String::from_utf8_lossy(line).into_owned());
            input = rest;
            if !more {
                return Ok((input, Response { code, text }));
            }
        }
    }

    /// Whether the reply is a `2xx` completion.
    pub fn is_completion(&self) -> bool {
        self.code.severity == Severity::PositiveCompletion
    }

    /// Whether the reply is a `3xx` continuation.
    pub fn is_intermediate(&self) -> bool {
        self.code.severity == Severity::PositiveIntermediate
    }

    /// First line of text, which carries the challenge of a `334` reply.
    pub fn first_line(&self) -> &str {
        self.text.first().map(String::as_str).unwrap_or("")
    }
}

impl Display for Response {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        write!(f, "{} {}", self.code, self.text.join(" "))
    }
}

fn reply_code(input: &[u8]) -> IResult<&[u8], ResponseCode> {
    map_res(take_while_m_n(3, 3, |b: u8| b.is_ascii_digit()), ResponseCode::from_digits)(input)
}

// Yields the code, whether another line follows, and the line text.
fn reply_line(input: &[u8]) -> IResult<&[u8], (ResponseCode, bool, &[u8])> {
    let (input, code) = reply_code(input)?;
    let (input, separator) = opt(one_of(" -"))(input)?;
    let (input, line) = take_until("\r\n")(input)?;
    let (input, _) = tag("\r\n")(input)?;
    Ok((input, (code, separator == Some('-'), line)))
}
