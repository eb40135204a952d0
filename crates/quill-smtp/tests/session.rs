//! Integration tests for the SMTP session.
//!
//! These tests drive a [`Session`] against a scripted mock server. Every line
//! the client writes must match the next expected line, and a reply only
//! becomes readable once every line before it in the script was written, so
//! the tests also pin down the order of reads and writes.

#![allow(clippy::unwrap_used, clippy::similar_names)]

use std::collections::VecDeque;
use std::io;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Duration;

use chrono::{NaiveDate, NaiveDateTime};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

use quill_smtp::{
    Attachment, Boundary, Connection, Error, OutgoingMessage, Session, SessionState, SmtpConfig,
};

const READ_TIMEOUT: Duration = Duration::from_secs(1);

/// One step of the server script.
#[derive(Debug)]
enum Step {
    /// The client must write exactly this line.
    Expect(String),
    /// The client must write a line starting with this text.
    ExpectPrefix(String),
    /// The server sends these bytes.
    Reply(Vec<u8>),
    /// The connection breaks; every later write fails.
    Disconnect,
}

/// What happened on the wire, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Event {
    Wrote(String),
    Read(String),
}

#[derive(Debug, Default)]
struct ServerState {
    script: VecDeque<Step>,
    partial: Vec<u8>,
    events: Vec<Event>,
    broken: bool,
}

/// Test-side view of the mock server.
#[derive(Clone)]
struct Transcript(Arc<Mutex<ServerState>>);

impl Transcript {
    fn events(&self) -> Vec<Event> {
        self.0.lock().unwrap().events.clone()
    }

    fn written(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                Event::Wrote(line) => Some(line),
                Event::Read(_) => None,
            })
            .collect()
    }

    fn assert_finished(&self) {
        let state = self.0.lock().unwrap();
        assert!(
            state.script.is_empty(),
            "unfinished script: {:?}",
            state.script
        );
    }
}

/// Mock stream that plays a scripted SMTP server.
struct MockStream(Arc<Mutex<ServerState>>);

impl AsyncRead for MockStream {
    fn poll_read(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let mut state = self.0.lock().unwrap();
        let data = match state.script.front_mut() {
            // End of script reads as a closed connection.
            None => return Poll::Ready(Ok(())),
            Some(Step::Reply(data)) => data,
            // The server waits for the client; the read timeout wakes us.
            Some(_) => return Poll::Pending,
        };

        let n = data.len().min(buf.remaining());
        let chunk: Vec<u8> = data.drain(..n).collect();
        if data.is_empty() {
            state.script.pop_front();
        }
        buf.put_slice(&chunk);
        state
            .events
            .push(Event::Read(String::from_utf8_lossy(&chunk).into_owned()));

        Poll::Ready(Ok(()))
    }
}

impl AsyncWrite for MockStream {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let mut state = self.0.lock().unwrap();
        if state.broken || matches!(state.script.front(), Some(Step::Disconnect)) {
            state.broken = true;
            return Poll::Ready(Err(io::ErrorKind::BrokenPipe.into()));
        }

        state.partial.extend_from_slice(buf);
        while let Some(pos) = state.partial.windows(2).position(|w| w == b"\r\n") {
            let raw: Vec<u8> = state.partial.drain(..pos + 2).collect();
            let line = String::from_utf8_lossy(&raw[..pos]).into_owned();

            match state.script.pop_front() {
                Some(Step::Expect(expected)) => assert_eq!(line, expected),
                Some(Step::ExpectPrefix(prefix)) => assert!(
                    line.starts_with(&prefix),
                    "expected line starting with {prefix:?}, got {line:?}"
                ),
                other => panic!("unexpected write {line:?}, next step was {other:?}"),
            }
            state.events.push(Event::Wrote(line));
        }

        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

/// Builds a server script.
#[derive(Default)]
struct Script(VecDeque<Step>);

impl Script {
    fn greeting() -> Self {
        Self::default().reply("220 mx.example.com ESMTP\r\n")
    }

    fn expect(mut self, line: &str) -> Self {
        self.0.push_back(Step::Expect(line.to_string()));
        self
    }

    fn expect_lines(mut self, lines: &[&str]) -> Self {
        for line in lines {
            self = self.expect(line);
        }
        self
    }

    fn expect_prefix(mut self, prefix: &str) -> Self {
        self.0.push_back(Step::ExpectPrefix(prefix.to_string()));
        self
    }

    fn reply(mut self, text: &str) -> Self {
        self.0.push_back(Step::Reply(text.as_bytes().to_vec()));
        self
    }

    fn disconnect(mut self) -> Self {
        self.0.push_back(Step::Disconnect);
        self
    }

    /// EHLO exchange advertising `extensions`.
    fn ehlo(self, extensions: &[&str]) -> Self {
        let mut reply = String::from("250");
        reply.push(if extensions.is_empty() { ' ' } else { '-' });
        reply.push_str("mx.example.com\r\n");
        for (i, ext) in extensions.iter().enumerate() {
            let sep = if i + 1 == extensions.len() { ' ' } else { '-' };
            reply.push_str(&format!("250{sep}{ext}\r\n"));
        }
        self.expect("EHLO localhost").reply(&reply)
    }
}

fn config() -> SmtpConfig {
    SmtpConfig::new("mx.example.com")
}

fn boundary() -> Boundary {
    Boundary::from_token("BOUNDARY01").unwrap()
}

fn date() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 2)
        .unwrap()
        .and_hms_opt(3, 4, 5)
        .unwrap()
}

async fn start(script: Script, config: &SmtpConfig) -> (Session<MockStream>, Transcript) {
    let state = Arc::new(Mutex::new(ServerState {
        script: script.0,
        ..ServerState::default()
    }));
    let connection = Connection::establish(MockStream(Arc::clone(&state)), READ_TIMEOUT)
        .await
        .unwrap();
    let session = Session::new(connection, config).with_boundary(boundary());
    (session, Transcript(state))
}

/// Negotiates and declares `alice@example.com` without a password.
async fn ready(session: &mut Session<MockStream>) {
    session.negotiate().await.unwrap();
    session
        .authenticate("alice@example.com", None)
        .await
        .unwrap();
}

fn recipients(session: &Session<MockStream>) -> Vec<&str> {
    session
        .envelope()
        .recipients
        .iter()
        .map(|addr| addr.as_str())
        .collect()
}

fn is_rcpt(event: &Event) -> bool {
    matches!(event, Event::Wrote(line) if line.starts_with("RCPT TO"))
}

#[tokio::test(start_paused = true)]
async fn test_minimal_message_transcript() {
    let script = Script::greeting()
        .ehlo(&[])
        .expect("MAIL FROM: <alice@example.com>")
        .reply("250 OK\r\n")
        .expect("RCPT TO: <bob@example.com>")
        .reply("250 OK\r\n")
        .expect("DATA")
        .reply("354 End data with <CR><LF>.<CR><LF>\r\n")
        .expect_lines(&[
            "DATE: 02 Jan 24 03:04:05",
            "FROM: <alice@example.com>",
            "TO: <bob@example.com>",
            "SUBJECT: =?utf-8?B?aGk=?=",
            "MIME-Version: 1.0",
            "Content-Type: multipart/mixed; boundary=BOUNDARY01; charset=utf-8",
            "",
            "--BOUNDARY01",
            "Content-Type: text/plain; charset=utf-8",
            "Content-Transfer-Encoding: base64",
            "",
            "aGVsbG8=",
            "--BOUNDARY01--",
            ".",
        ])
        .reply("250 2.0.0 Ok: queued as 12345\r\n")
        .expect("QUIT")
        .reply("221 2.0.0 Bye\r\n");
    let (mut session, transcript) = start(script, &config()).await;
    assert_eq!(session.state(), SessionState::Connected);

    let caps = session.negotiate().await.unwrap();
    assert!(!caps.pipelining && !caps.eight_bit_mime && !caps.dsn);
    assert_eq!(session.state(), SessionState::Greeted);

    session
        .authenticate("alice@example.com", None)
        .await
        .unwrap();
    assert_eq!(session.state(), SessionState::Authenticated);

    session.declare_sender().await.unwrap();
    assert_eq!(session.state(), SessionState::EnvelopeSender);

    let reply = session.declare_recipient("bob@example.com").await.unwrap();
    assert_eq!(reply.unwrap().code.as_u16(), 250);
    assert_eq!(session.state(), SessionState::EnvelopeRecipients);

    session.begin_data().await.unwrap();
    assert_eq!(session.state(), SessionState::DataPhase);

    session.emit_headers("hi", date()).await.unwrap();
    session.emit_text_part("hello").await.unwrap();
    let accepted = session.end_data().await.unwrap();
    assert_eq!(accepted.code.as_u16(), 250);
    assert_eq!(session.state(), SessionState::MessageSent);

    let bye = session.quit().await.unwrap();
    assert_eq!(bye.unwrap().code.as_u16(), 221);
    assert_eq!(session.state(), SessionState::Terminated);

    transcript.assert_finished();
}

#[tokio::test(start_paused = true)]
async fn test_pipelined_recipients_are_written_before_any_reply_is_read() {
    let script = Script::greeting()
        .ehlo(&["PIPELINING", "8BITMIME"])
        .expect("MAIL FROM: <alice@example.com> BODY=8BITMIME")
        .reply("250 OK\r\n")
        .expect("RCPT TO: <bob@example.com>")
        .expect("RCPT TO: <carol@example.com>")
        .expect("RCPT TO: <dave@example.com>")
        .reply("250 OK\r\n250 OK\r\n250 OK\r\n")
        .expect("DATA")
        .reply("354 go ahead\r\n")
        .expect("QUIT")
        .reply("221 bye\r\n");
    let (mut session, transcript) = start(script, &config()).await;
    ready(&mut session).await;
    session.declare_sender().await.unwrap();

    for rcpt in ["bob@example.com", "carol@example.com", "dave@example.com"] {
        assert!(session.declare_recipient(rcpt).await.unwrap().is_none());
    }
    assert_eq!(session.envelope().recipients.len(), 3);
    session.begin_data().await.unwrap();
    session.quit().await.unwrap();

    let events = transcript.events();
    let first = events.iter().position(is_rcpt).unwrap();
    assert!(matches!(
        &events[first..first + 5],
        [
            Event::Wrote(_),
            Event::Wrote(_),
            Event::Wrote(_),
            Event::Read(_),
            Event::Wrote(data),
        ] if data == "DATA"
    ));
    transcript.assert_finished();
}

#[tokio::test(start_paused = true)]
async fn test_sequential_recipients_read_each_reply() {
    let script = Script::greeting()
        .ehlo(&["SIZE 10240000"])
        .expect("MAIL FROM: <alice@example.com>")
        .reply("250 OK\r\n")
        .expect("RCPT TO: <bob@example.com>")
        .reply("250 2.1.5 bob\r\n")
        .expect("RCPT TO: <carol@example.com>")
        .reply("251 2.1.5 carol forwarded\r\n");
    let (mut session, transcript) = start(script, &config()).await;
    ready(&mut session).await;
    session.declare_sender().await.unwrap();

    let bob = session.declare_recipient("bob@example.com").await.unwrap();
    let carol = session.declare_recipient("carol@example.com").await.unwrap();
    assert_eq!(bob.unwrap().code.as_u16(), 250);
    assert_eq!(carol.unwrap().code.as_u16(), 251);

    let events = transcript.events();
    let first = events.iter().position(is_rcpt).unwrap();
    assert!(matches!(
        &events[first..],
        [
            Event::Wrote(_),
            Event::Read(_),
            Event::Wrote(_),
            Event::Read(_)
        ]
    ));
    transcript.assert_finished();
}

#[tokio::test(start_paused = true)]
async fn test_auth_login_success() {
    let script = Script::greeting()
        .ehlo(&["AUTH LOGIN PLAIN"])
        .expect("AUTH LOGIN")
        .reply("334 VXNlcm5hbWU6\r\n")
        .expect("YWxpY2VAZXhhbXBsZS5jb20=")
        .reply("334 UGFzc3dvcmQ6\r\n")
        .expect("c2VjcmV0")
        .reply("235 2.7.0 Authentication successful\r\n");
    let (mut session, transcript) = start(script, &config()).await;
    session.negotiate().await.unwrap();

    session
        .authenticate("Alice alice@example.com", Some("secret"))
        .await
        .unwrap();

    assert_eq!(session.state(), SessionState::Authenticated);
    let sender = session.envelope().sender.as_ref().unwrap();
    assert_eq!(sender.name.as_deref(), Some("Alice"));
    assert_eq!(sender.address.as_str(), "alice@example.com");
    transcript.assert_finished();
}

#[tokio::test(start_paused = true)]
async fn test_auth_login_rejected() {
    let script = Script::greeting()
        .ehlo(&[])
        .expect("AUTH LOGIN")
        .reply("334 VXNlcm5hbWU6\r\n")
        .expect("YWxpY2VAZXhhbXBsZS5jb20=")
        .reply("334 UGFzc3dvcmQ6\r\n")
        .expect("d3Jvbmc=")
        .reply("535 5.7.8 Authentication credentials invalid\r\n")
        .expect("QUIT")
        .reply("221 bye\r\n");
    let (mut session, transcript) = start(script, &config()).await;
    session.negotiate().await.unwrap();

    let err = session
        .authenticate("alice@example.com", Some("wrong"))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::AuthFailed { code: 535, .. }));
    assert!(err.is_auth_failure());
    assert_eq!(session.state(), SessionState::Greeted);
    assert!(session.envelope().sender.is_none());

    session.quit().await.unwrap();
    transcript.assert_finished();
}

#[tokio::test(start_paused = true)]
async fn test_auth_login_not_offered() {
    let script = Script::greeting()
        .ehlo(&[])
        .expect("AUTH LOGIN")
        .reply("504 5.5.4 Unrecognized authentication type\r\n");
    let (mut session, _transcript) = start(script, &config()).await;
    session.negotiate().await.unwrap();

    let err = session
        .authenticate("alice@example.com", Some("secret"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::AuthFailed { code: 504, .. }));
}

#[tokio::test(start_paused = true)]
async fn test_dsn_parameters_in_debug_mode() {
    let mut config = config();
    config.debug = true;
    let script = Script::greeting()
        .ehlo(&["8BITMIME", "DSN"])
        .expect("MAIL FROM: <alice@example.com> BODY=8BITMIME RET=HDRS ENVID=BOUNDARY01")
        .reply("250 OK\r\n")
        .expect("RCPT TO: <bob@example.com> NOTIFY=SUCCESS,FAILURE ORCPT=rfc822;bob@example.com")
        .reply("250 OK\r\n");
    let (mut session, transcript) = start(script, &config).await;
    ready(&mut session).await;

    session.declare_sender().await.unwrap();
    session.declare_recipient("bob@example.com").await.unwrap();
    transcript.assert_finished();
}

#[tokio::test(start_paused = true)]
async fn test_dsn_parameters_omitted_without_debug() {
    let script = Script::greeting()
        .ehlo(&["DSN"])
        .expect("MAIL FROM: <alice@example.com>")
        .reply("250 OK\r\n")
        .expect("RCPT TO: <bob@example.com>")
        .reply("250 OK\r\n");
    let (mut session, transcript) = start(script, &config()).await;
    ready(&mut session).await;
    assert!(session.capabilities().dsn);

    session.declare_sender().await.unwrap();
    session.declare_recipient("bob@example.com").await.unwrap();
    transcript.assert_finished();
}

#[tokio::test(start_paused = true)]
async fn test_pipelined_rejection_stops_before_data() {
    let script = Script::greeting()
        .ehlo(&["PIPELINING"])
        .expect("MAIL FROM: <alice@example.com>")
        .reply("250 OK\r\n")
        .expect("RCPT TO: <bob@example.com>")
        .expect("RCPT TO: <nobody@example.com>")
        .reply("250 OK\r\n550 5.1.1 User unknown\r\n")
        .expect("QUIT")
        .reply("221 bye\r\n");
    let (mut session, transcript) = start(script, &config()).await;
    ready(&mut session).await;
    session.declare_sender().await.unwrap();
    session.declare_recipient("bob@example.com").await.unwrap();
    session.declare_recipient("nobody@example.com").await.unwrap();

    let err = session.begin_data().await.unwrap_err();
    assert_eq!(err.reply_code(), Some(550));
    assert!(err.is_permanent());
    assert_eq!(session.state(), SessionState::EnvelopeRecipients);

    assert_eq!(recipients(&session), vec!["bob@example.com"]);

    session.quit().await.unwrap();
    assert!(!transcript.written().contains(&"DATA".to_string()));
    transcript.assert_finished();
}

#[tokio::test(start_paused = true)]
async fn test_rejected_pipelined_recipient_is_left_out_of_message() {
    let script = Script::greeting()
        .ehlo(&["PIPELINING"])
        .expect("MAIL FROM: <alice@example.com>")
        .reply("250 OK\r\n")
        .expect("RCPT TO: <bob@example.com>")
        .expect("RCPT TO: <nobody@example.com>")
        .reply("250 OK\r\n550 5.1.1 User unknown\r\n")
        .expect("DATA")
        .reply("354 go ahead\r\n")
        .expect_lines(&[
            "DATE: 02 Jan 24 03:04:05",
            "FROM: <alice@example.com>",
            "TO: <bob@example.com>",
            "SUBJECT: =?utf-8?B?aGk=?=",
            "MIME-Version: 1.0",
            "Content-Type: multipart/mixed; boundary=BOUNDARY01; charset=utf-8",
            "",
        ]);
    let (mut session, transcript) = start(script, &config()).await;
    ready(&mut session).await;
    session.declare_sender().await.unwrap();
    session.declare_recipient("bob@example.com").await.unwrap();
    session.declare_recipient("nobody@example.com").await.unwrap();
    assert!(session.envelope().recipients.is_empty());

    let err = session.begin_data().await.unwrap_err();
    assert_eq!(err.reply_code(), Some(550));

    // The replies were consumed; retrying goes ahead with the accepted
    // recipient only.
    session.begin_data().await.unwrap();
    assert_eq!(session.state(), SessionState::DataPhase);
    session.emit_headers("hi", date()).await.unwrap();

    assert_eq!(recipients(&session), vec!["bob@example.com"]);
    transcript.assert_finished();
}

#[tokio::test(start_paused = true)]
async fn test_all_pipelined_recipients_rejected() {
    let script = Script::greeting()
        .ehlo(&["PIPELINING"])
        .expect("MAIL FROM: <alice@example.com>")
        .reply("250 OK\r\n")
        .expect("RCPT TO: <nobody@example.com>")
        .expect("RCPT TO: <ghost@example.com>")
        .reply("550 5.1.1 User unknown\r\n550 5.1.1 User unknown\r\n")
        .expect("QUIT")
        .reply("221 bye\r\n");
    let (mut session, transcript) = start(script, &config()).await;
    ready(&mut session).await;
    session.declare_sender().await.unwrap();
    session.declare_recipient("nobody@example.com").await.unwrap();
    session.declare_recipient("ghost@example.com").await.unwrap();

    let err = session.begin_data().await.unwrap_err();
    assert_eq!(err.reply_code(), Some(550));
    assert!(session.envelope().recipients.is_empty());
    assert_eq!(session.state(), SessionState::EnvelopeSender);

    let err = session.begin_data().await.unwrap_err();
    assert!(matches!(err, Error::InvalidState(_)));

    session.quit().await.unwrap();
    assert!(!transcript.written().contains(&"DATA".to_string()));
    transcript.assert_finished();
}

#[tokio::test(start_paused = true)]
async fn test_missing_pipelined_reply_is_protocol_error() {
    let script = Script::greeting()
        .ehlo(&["PIPELINING"])
        .expect("MAIL FROM: <alice@example.com>")
        .reply("250 OK\r\n")
        .expect("RCPT TO: <bob@example.com>")
        .expect("RCPT TO: <carol@example.com>")
        .reply("250 OK\r\n")
        .expect("QUIT")
        .reply("221 bye\r\n");
    let (mut session, transcript) = start(script, &config()).await;
    ready(&mut session).await;
    session.declare_sender().await.unwrap();
    session.declare_recipient("bob@example.com").await.unwrap();
    session.declare_recipient("carol@example.com").await.unwrap();

    let err = session.drain_pipelined().await.unwrap_err();
    assert!(matches!(err, Error::Protocol(_)));
    assert_eq!(recipients(&session), vec!["bob@example.com"]);
    assert_eq!(session.state(), SessionState::EnvelopeRecipients);

    session.quit().await.unwrap();
    transcript.assert_finished();
}

#[tokio::test(start_paused = true)]
async fn test_sequential_rejection_keeps_envelope() {
    let script = Script::greeting()
        .ehlo(&[])
        .expect("MAIL FROM: <alice@example.com>")
        .reply("250 OK\r\n")
        .expect("RCPT TO: <nobody@example.com>")
        .reply("450 4.2.1 Mailbox busy\r\n");
    let (mut session, _transcript) = start(script, &config()).await;
    ready(&mut session).await;
    session.declare_sender().await.unwrap();

    let err = session
        .declare_recipient("nobody@example.com")
        .await
        .unwrap_err();
    assert!(err.is_transient());
    assert!(session.envelope().recipients.is_empty());
    assert_eq!(session.state(), SessionState::EnvelopeSender);
}

#[tokio::test(start_paused = true)]
async fn test_invalid_recipient_is_never_sent() {
    let script = Script::greeting()
        .ehlo(&[])
        .expect("MAIL FROM: <alice@example.com>")
        .reply("250 OK\r\n");
    let (mut session, transcript) = start(script, &config()).await;
    ready(&mut session).await;
    session.declare_sender().await.unwrap();

    for bad in ["bob", "bob@", "@example.com", "b o b@example.com", "a@b@c"] {
        let err = session.declare_recipient(bad).await.unwrap_err();
        assert!(matches!(err, Error::InvalidAddress(_)), "{bad}");
    }

    assert!(session.envelope().recipients.is_empty());
    assert!(!transcript.events().iter().any(is_rcpt));
    transcript.assert_finished();
}

#[tokio::test(start_paused = true)]
async fn test_out_of_order_operations_are_rejected() {
    let (mut session, transcript) = start(Script::greeting(), &config()).await;

    assert!(matches!(
        session.declare_sender().await,
        Err(Error::InvalidState(_))
    ));
    assert!(matches!(
        session.authenticate("alice@example.com", None).await,
        Err(Error::InvalidState(_))
    ));
    assert!(matches!(
        session.begin_data().await,
        Err(Error::InvalidState(_))
    ));
    assert!(matches!(
        session.emit_text_part("hello").await,
        Err(Error::InvalidState(_))
    ));

    assert_eq!(session.state(), SessionState::Connected);
    assert!(transcript.written().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_everything_fails_after_quit() {
    let script = Script::greeting().expect("QUIT").reply("221 bye\r\n");
    let (mut session, transcript) = start(script, &config()).await;

    session.quit().await.unwrap();
    assert_eq!(session.state(), SessionState::Terminated);

    assert!(matches!(session.quit().await, Err(Error::InvalidState(_))));
    assert!(matches!(
        session.negotiate().await,
        Err(Error::InvalidState(_))
    ));
    assert!(matches!(
        session.end_data().await,
        Err(Error::InvalidState(_))
    ));
    assert_eq!(transcript.written(), vec!["QUIT".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn test_quit_without_reply() {
    let script = Script::greeting().expect("QUIT");
    let (mut session, transcript) = start(script, &config()).await;

    assert!(session.quit().await.unwrap().is_none());
    assert_eq!(session.state(), SessionState::Terminated);
    transcript.assert_finished();
}

#[tokio::test(start_paused = true)]
async fn test_broken_connection_terminates_session() {
    let script = Script::greeting().ehlo(&[]).disconnect();
    let (mut session, _transcript) = start(script, &config()).await;
    ready(&mut session).await;

    let err = session.declare_sender().await.unwrap_err();
    assert!(err.is_connection_failure());
    assert_eq!(session.state(), SessionState::Terminated);
    assert!(matches!(session.quit().await, Err(Error::InvalidState(_))));
}

#[tokio::test(start_paused = true)]
async fn test_rejected_message() {
    let script = Script::greeting()
        .ehlo(&[])
        .expect("MAIL FROM: <alice@example.com>")
        .reply("250 OK\r\n")
        .expect("RCPT TO: <bob@example.com>")
        .reply("250 OK\r\n")
        .expect("DATA")
        .reply("354 go ahead\r\n")
        .expect("--BOUNDARY01--")
        .expect(".")
        .reply("554 5.7.1 Message rejected as spam\r\n");
    let (mut session, transcript) = start(script, &config()).await;
    ready(&mut session).await;
    session.declare_sender().await.unwrap();
    session.declare_recipient("bob@example.com").await.unwrap();
    session.begin_data().await.unwrap();

    let err = session.end_data().await.unwrap_err();
    assert_eq!(err.reply_code(), Some(554));
    assert_eq!(session.state(), SessionState::DataPhase);
    transcript.assert_finished();
}

#[tokio::test(start_paused = true)]
async fn test_data_without_reply_continues() {
    let script = Script::greeting()
        .ehlo(&[])
        .expect("MAIL FROM: <alice@example.com>")
        .reply("250 OK\r\n")
        .expect("RCPT TO: <bob@example.com>")
        .reply("250 OK\r\n")
        .expect("DATA")
        .expect("--BOUNDARY01--")
        .expect(".");
    let (mut session, transcript) = start(script, &config()).await;
    ready(&mut session).await;
    session.declare_sender().await.unwrap();
    session.declare_recipient("bob@example.com").await.unwrap();

    session.begin_data().await.unwrap();
    assert_eq!(session.state(), SessionState::DataPhase);

    // The server hangs up instead of accepting the message.
    let err = session.end_data().await.unwrap_err();
    assert!(matches!(err, Error::Protocol(_)));
    assert_eq!(session.state(), SessionState::DataPhase);
    transcript.assert_finished();
}

#[tokio::test(start_paused = true)]
async fn test_transmit_with_attachment() {
    let mut script = Script::greeting()
        .ehlo(&["PIPELINING"])
        .expect("MAIL FROM: <alice@example.com>")
        .reply("250 OK\r\n")
        .expect("RCPT TO: <bob@example.com>")
        .reply("250 OK\r\n")
        .expect("DATA")
        .reply("354 go ahead\r\n")
        .expect_prefix("DATE: ")
        .expect_lines(&[
            "FROM: =?utf-8?B?QWxpY2U=?= <alice@example.com>",
            "TO: <bob@example.com>",
            "SUBJECT: =?utf-8?B?cmVwb3J0?=",
            "MIME-Version: 1.0",
            "Content-Type: multipart/mixed; boundary=BOUNDARY01; charset=utf-8",
            "",
            "--BOUNDARY01",
            "Content-Type: application/octet-stream; name=\"blob.bin\";",
            "Content-Transfer-Encoding: base64",
            "Content-Disposition: attachment; filename=\"blob.bin\";",
            "",
        ]);
    // 1200 bytes encode to 1600 characters: a full line and a partial one.
    script = script
        .expect(&"Wlpa".repeat(250))
        .expect(&"Wlpa".repeat(150))
        .expect("--BOUNDARY01--")
        .expect(".")
        .reply("250 queued\r\n");
    let (mut session, transcript) = start(script, &config()).await;
    session.negotiate().await.unwrap();
    session
        .authenticate("Alice alice@example.com", None)
        .await
        .unwrap();

    let message = OutgoingMessage::new("report")
        .to("bob@example.com")
        .attach(Attachment::new("blob.bin", vec![0x5a; 1200]));
    let reply = session.transmit(&message).await.unwrap();

    assert_eq!(reply.code.as_u16(), 250);
    assert_eq!(session.state(), SessionState::MessageSent);
    transcript.assert_finished();
}

#[tokio::test(start_paused = true)]
async fn test_transmit_requires_recipients() {
    let script = Script::greeting().ehlo(&[]);
    let (mut session, transcript) = start(script, &config()).await;
    ready(&mut session).await;

    let message = OutgoingMessage::new("empty").text("hello");
    let err = session.transmit(&message).await.unwrap_err();
    assert!(matches!(err, Error::InvalidAddress(_)));
    assert_eq!(session.state(), SessionState::Authenticated);
    transcript.assert_finished();
}
