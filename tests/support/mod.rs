#![allow(dead_code)]

//! A scripted SMTP relay on a loopback port.

use std::net::{SocketAddr};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener};
use tokio::task::{JoinHandle};
use tokio_native_tls::{TlsAcceptor};

pub const GREETING: &str = "220 relay.test ESMTP ready\r\n";
pub const LOGIN_USERNAME: &str = "334 VXNlcm5hbWU6\r\n";
pub const LOGIN_PASSWORD: &str = "334 UGFzc3dvcmQ6\r\n";

/// One step of the relay's side of the conversation.
pub enum Step {
    /// Write a reply without reading, e.g. the greeting
    Send(&'static str),
    /// Read a command line that must start with the prefix, then reply
    Expect(&'static str, &'static str),
    /// Read message content up to the lone `.`, then reply
    Content(&'static str),
    /// Read `STARTTLS`, agree, and continue over TLS
    StartTls,
    /// Read and discard until the client hangs up
    AwaitHangup,
}

/// What the relay saw.
#[derive(Debug, Default)]
pub struct Transcript {
    /// Command lines, without CRLF
    pub commands: Vec<String>,
    /// Message content with dot-stuffing undone
    pub messages: Vec<Vec<u8>>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mode {
    Plain,
    GreetFirstConnection,
    ImplicitTls,
}

trait Stream: AsyncRead + AsyncWrite + Unpin + Send {}

impl<S: AsyncRead + AsyncWrite + Unpin + Send> Stream for S {}

type Connection = BufReader<Box<dyn Stream>>;

pub struct Relay {
    addr: SocketAddr,
    task: JoinHandle<Transcript>,
}

impl Relay {
    pub async fn start(script: Vec<Step>) -> Relay {
        Self::spawn(script, Mode::Plain).await
    }

    /// The first connection gets a plaintext greeting whatever it sends, so
    /// a client attempting direct TLS fails its handshake and must reconnect.
    pub async fn start_behind_greeting(script: Vec<Step>) -> Relay {
        Self::spawn(script, Mode::GreetFirstConnection).await
    }

    /// Speak TLS from the first byte. Connections that fail the handshake
    /// are dropped and the next one is awaited.
    pub async fn start_tls(script: Vec<Step>) -> Relay {
        Self::spawn(script, Mode::ImplicitTls).await
    }

    async fn spawn(script: Vec<Step>, mode: Mode) -> Relay {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let task = tokio::spawn(serve(listener, script, mode));
        Relay { addr, task }
    }

    pub fn address(&self) -> String {
        self.addr.to_string()
    }

    /// Wait for the script to run out or the client to hang up.
    pub async fn finish(self) -> Transcript {
        self.task.await.expect("relay script failed")
    }
}

/// A self-signed identity for `localhost`.
pub fn acceptor() -> TlsAcceptor {
    let identity = native_tls::Identity::from_pkcs8(include_bytes!("localhost.crt"),
                                                    include_bytes!("localhost.key")).unwrap();
    native_tls::TlsAcceptor::new(identity).unwrap().into()
}

async fn accept(listener: &TcpListener, mode: Mode) -> Connection {
    if mode == Mode::GreetFirstConnection {
        let (mut socket, _) = listener.accept().await.unwrap();
        let _ = socket.write_all(GREETING.as_bytes()).await;
        let mut discard = Vec::new();
        let _ = socket.read_to_end(&mut discard).await;
    }

    loop {
        let (socket, _) = listener.accept().await.unwrap();
        if mode != Mode::ImplicitTls {
            let stream: Box<dyn Stream> = Box::new(socket);
            return BufReader::new(stream);
        }
        match acceptor().accept(socket).await {
            Ok(stream) => {
                let stream: Box<dyn Stream> = Box::new(stream);
                return BufReader::new(stream);
            },
            Err(err) => eprintln!("relay: TLS handshake failed: {}", err),
        }
    }
}

async fn reply(conn: &mut Connection, reply: &str) {
    let stream = conn.get_mut();
    stream.write_all(reply.as_bytes()).await.unwrap();
    stream.flush().await.unwrap();
}

async fn serve(listener: TcpListener, script: Vec<Step>, mode: Mode) -> Transcript {
    let mut conn = accept(&listener, mode).await;
    let mut transcript = Transcript::default();

    for step in script {
        match step {
            Step::Send(text) => {
                reply(&mut conn, text).await;
            },
            Step::Expect(prefix, text) => {
                match read_command(&mut conn).await {
                    Some(line) => {
                        assert!(line.starts_with(prefix), "expected {:?}, got {:?}", prefix, line);
                        transcript.commands.push(line);
                    },
                    None => break,
                }
                reply(&mut conn, text).await;
            },
            Step::Content(text) => {
                let mut content = Vec::new();
                loop {
                    let mut line = Vec::new();
                    if conn.read_until(b'\n', &mut line).await.unwrap_or(0) == 0 {
                        panic!("client hung up during message content");
                    }
                    if line == b".\r\n" {
                        break;
                    }
                    let unstuffed = if line.starts_with(b"..") { &line[1..] } else { &line[..] };
                    content.extend_from_slice(unstuffed);
                }
                transcript.messages.push(content);
                reply(&mut conn, text).await;
            },
            Step::StartTls => {
                match read_command(&mut conn).await {
                    Some(line) => {
                        assert_eq!(line, "STARTTLS");
                        transcript.commands.push(line);
                    },
                    None => break,
                }
                reply(&mut conn, "220 2.0.0 ready to start TLS\r\n").await;
                let plain = conn.into_inner();
                let secure: Box<dyn Stream> = Box::new(acceptor().accept(plain).await.unwrap());
                conn = BufReader::new(secure);
            },
            Step::AwaitHangup => {
                let mut discard = Vec::new();
                let _ = conn.read_to_end(&mut discard).await;
            },
        }
    }

    transcript
}

// A command line without CRLF, or `None` once the client hung up.
async fn read_command(conn: &mut Connection) -> Option<String> {
    let mut line = String::new();
    if conn.read_line(&mut line).await.unwrap_or(0) == 0 {
        return None;
    }
    Some(line.trim_end_matches("\r\n").to_string())
}

/// The greeting and an `EHLO` reply advertising `extensions`.
pub fn hello(extensions: &'static [&'static str]) -> Vec<Step> {
    vec![Step::Send(GREETING), ehlo(extensions)]
}

/// An `EHLO` reply advertising `extensions`.
pub fn ehlo(extensions: &'static [&'static str]) -> Step {
    Step::Expect("EHLO ", ehlo_reply(extensions))
}

fn ehlo_reply(extensions: &'static [&'static str]) -> &'static str {
    let mut reply = String::from("250");
    reply.push(if extensions.is_empty() { ' ' } else { '-' });
    reply.push_str("relay.test greets you\r\n");
    for (index, extension) in extensions.iter().enumerate() {
        let separator = if index + 1 == extensions.len() { ' ' } else { '-' };
        reply.push_str(&format!("250{}{}\r\n", separator, extension));
    }
    Box::leak(reply.into_boxed_str())
}

/// `hello(extensions)` followed by `steps`.
pub fn conversation(extensions: &'static [&'static str], steps: Vec<Step>) -> Vec<Step> {
    let mut script = hello(extensions);
    script.extend(steps);
    script
}
