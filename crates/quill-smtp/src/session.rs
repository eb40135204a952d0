//! SMTP session state machine.
//!
//! A [`Session`] drives one message through the server:
//!
//! ```text
//! Connected ── negotiate() ──→ Greeted ── authenticate() ──→ Authenticated
//!     ── declare_sender() ──→ EnvelopeSender ── declare_recipient() ──→ EnvelopeRecipients
//!     ── begin_data() ──→ DataPhase ── end_data() ──→ MessageSent
//!
//! any state ── quit() ──→ Terminated
//! ```
//!
//! Operations issued in the wrong state fail with
//! [`Error::InvalidState`] without touching the wire. A connection-level
//! failure moves the session straight to `Terminated`.

use crate::command::Command;
use crate::config::SmtpConfig;
use crate::connection::{Connection, SmtpStream};
use crate::error::{Error, Result};
use crate::types::{Address, Capabilities, Envelope, Mailbox, Reply, ReplyBlock, ReplyCode};
use chrono::{Local, NaiveDateTime};
use quill_mime::encoding::encode_base64;
use quill_mime::{Attachment, Boundary, MessageBuilder, MessageHeader};
use std::collections::VecDeque;
use std::fmt;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, info, warn};

/// Where a session is in the protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Greeting received, EHLO not yet sent.
    Connected,
    /// Capabilities negotiated.
    Greeted,
    /// Sender known; credentials accepted or not required.
    Authenticated,
    /// MAIL FROM accepted.
    EnvelopeSender,
    /// At least one RCPT TO issued.
    EnvelopeRecipients,
    /// DATA accepted; message lines are being written.
    DataPhase,
    /// Message accepted by the server.
    MessageSent,
    /// QUIT sent or connection lost; nothing further is possible.
    Terminated,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Connected => "connected",
            Self::Greeted => "greeted",
            Self::Authenticated => "authenticated",
            Self::EnvelopeSender => "sender declared",
            Self::EnvelopeRecipients => "recipients declared",
            Self::DataPhase => "data phase",
            Self::MessageSent => "message sent",
            Self::Terminated => "terminated",
        };
        f.write_str(name)
    }
}

/// A message to transmit with [`Session::transmit`].
#[derive(Debug, Clone, Default)]
pub struct OutgoingMessage {
    /// Recipient addresses.
    pub recipients: Vec<String>,
    /// Subject line.
    pub subject: String,
    /// Plain text body.
    pub text: Option<String>,
    /// File attachments.
    pub attachments: Vec<Attachment>,
}

impl OutgoingMessage {
    /// Creates a new outgoing message.
    #[must_use]
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            ..Self::default()
        }
    }

    /// Adds a recipient.
    #[must_use]
    pub fn to(mut self, recipient: impl Into<String>) -> Self {
        self.recipients.push(recipient.into());
        self
    }

    /// Sets the plain text body.
    #[must_use]
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Adds an attachment.
    #[must_use]
    pub fn attach(mut self, attachment: Attachment) -> Self {
        self.attachments.push(attachment);
        self
    }

    /// Returns true if there is neither a body nor an attachment.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.text.as_deref().is_none_or(str::is_empty) && self.attachments.is_empty()
    }
}

/// One SMTP session over a single connection.
#[derive(Debug)]
pub struct Session<S = SmtpStream> {
    connection: Connection<S>,
    client_id: String,
    debug: bool,
    state: SessionState,
    capabilities: Capabilities,
    envelope: Envelope,
    boundary: Boundary,
    /// Pipelined recipients whose RCPT TO reply has not been read yet.
    pending_recipients: VecDeque<Address>,
}

impl Session<SmtpStream> {
    /// Connects to the configured server and starts a session.
    ///
    /// # Errors
    ///
    /// Returns an error if no connection could be established.
    pub async fn connect(config: &SmtpConfig) -> Result<Self> {
        let connection = Connection::open(config).await?;
        Ok(Self::new(connection, config))
    }
}

impl<S> Session<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Starts a session on an established connection.
    #[must_use]
    pub fn new(connection: Connection<S>, config: &SmtpConfig) -> Self {
        Self {
            connection,
            client_id: config.client_id.clone(),
            debug: config.debug,
            state: SessionState::Connected,
            capabilities: Capabilities::default(),
            envelope: Envelope::default(),
            boundary: Boundary::generate(),
            pending_recipients: VecDeque::new(),
        }
    }

    /// Replaces the generated boundary token.
    #[must_use]
    pub fn with_boundary(mut self, boundary: Boundary) -> Self {
        self.boundary = boundary;
        self
    }

    /// Returns the current state.
    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// Returns the negotiated capabilities.
    #[must_use]
    pub const fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    /// Returns the envelope declared so far.
    #[must_use]
    pub const fn envelope(&self) -> &Envelope {
        &self.envelope
    }

    /// Returns the MIME boundary token of this session.
    #[must_use]
    pub const fn boundary(&self) -> &Boundary {
        &self.boundary
    }

    /// Returns the server greeting.
    #[must_use]
    pub const fn greeting(&self) -> &ReplyBlock {
        self.connection.greeting()
    }

    /// Sends EHLO and records which extensions the server advertises.
    ///
    /// # Errors
    ///
    /// Returns an error if EHLO is rejected or the connection fails.
    pub async fn negotiate(&mut self) -> Result<Capabilities> {
        self.expect_state("EHLO", &[SessionState::Connected])?;

        let cmd = Command::Ehlo {
            hostname: self.client_id.clone(),
        };
        let block = self.request(&cmd).await?;

        match block.last_reply() {
            Ok(reply) if !reply.is_success() => return Err(reply.into_error()),
            Ok(_) => {}
            Err(e) => warn!(error = %e, "Unreadable EHLO reply, assuming no extensions"),
        }

        self.capabilities = Capabilities::from_ehlo(&block);
        self.state = SessionState::Greeted;
        info!(capabilities = ?self.capabilities, "Capabilities negotiated");
        Ok(self.capabilities)
    }

    /// Resolves the sender and, given a password, logs in with AUTH LOGIN.
    ///
    /// `sender` has the form `[Display Name ]local@domain`; its address part
    /// becomes the envelope sender and the LOGIN user name. Without a
    /// password no command is sent.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidAddress`] if `sender` does not parse, and
    /// [`Error::AuthFailed`] if the server does not accept the credentials.
    /// The session stays `Greeted` after an authentication failure.
    pub async fn authenticate(&mut self, sender: &str, password: Option<&str>) -> Result<()> {
        self.expect_state("AUTH", &[SessionState::Greeted])?;

        let mailbox = Mailbox::parse(sender)?;
        match password {
            Some(password) => {
                self.auth_login(mailbox.address.as_str(), password).await?;
                info!(user = %mailbox.address, "Authenticated");
            }
            None => debug!("No password supplied, skipping authentication"),
        }

        self.envelope.sender = Some(mailbox);
        self.state = SessionState::Authenticated;
        Ok(())
    }

    async fn auth_login(&mut self, username: &str, password: &str) -> Result<()> {
        let steps = [
            (Command::AuthLogin, ReplyCode::AUTH_CONTINUE),
            (
                Command::AuthResponse(encode_base64(username.as_bytes())),
                ReplyCode::AUTH_CONTINUE,
            ),
            (
                Command::AuthResponse(encode_base64(password.as_bytes())),
                ReplyCode::AUTH_SUCCESS,
            ),
        ];

        for (cmd, expected) in &steps {
            let reply = self.request(cmd).await?.last_reply()?;
            if reply.code != *expected {
                return Err(Error::auth_failed(reply.code.as_u16(), reply.message_text()));
            }
        }

        Ok(())
    }

    /// Sends MAIL FROM for the envelope sender.
    ///
    /// Appends `BODY=8BITMIME` when the server supports it, and
    /// `RET=HDRS ENVID=<boundary>` when DSN is supported in debug mode.
    ///
    /// # Errors
    ///
    /// Returns an error if the server rejects the sender.
    pub async fn declare_sender(&mut self) -> Result<Reply> {
        self.expect_state("MAIL FROM", &[SessionState::Authenticated])?;

        let from = self
            .envelope
            .sender_address()
            .cloned()
            .ok_or_else(|| Error::InvalidState("sender not set".into()))?;
        let cmd = Command::MailFrom {
            from,
            body: self.capabilities.body_parameter(),
            envid: self
                .dsn_requested()
                .then(|| self.boundary.as_str().to_string()),
        };

        let reply = self.request(&cmd).await?.last_reply()?;
        if !reply.is_success() {
            return Err(reply.into_error());
        }

        self.state = SessionState::EnvelopeSender;
        Ok(reply)
    }

    /// Sends RCPT TO for one recipient.
    ///
    /// With PIPELINING the command is written without waiting and `None` is
    /// returned; its reply is checked by [`Session::drain_pipelined`] before
    /// DATA, and the recipient joins the envelope only once accepted.
    /// Otherwise the reply is read and returned.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidAddress`] before anything is sent if `addr` is
    /// not a valid address, or an error if the server rejects it.
    pub async fn declare_recipient(&mut self, addr: &str) -> Result<Option<Reply>> {
        self.expect_state(
            "RCPT TO",
            &[SessionState::EnvelopeSender, SessionState::EnvelopeRecipients],
        )?;

        let to = Address::new(addr.trim())?;
        let cmd = Command::RcptTo {
            to: to.clone(),
            notify: self.dsn_requested(),
        };

        if self.capabilities.pipelining {
            self.send_command(&cmd).await?;
            self.pending_recipients.push_back(to);
            self.state = SessionState::EnvelopeRecipients;
            return Ok(None);
        }

        let reply = self.request(&cmd).await?.last_reply()?;
        if !reply.is_success() {
            return Err(reply.into_error());
        }

        self.envelope.recipients.push(to);
        self.state = SessionState::EnvelopeRecipients;
        Ok(Some(reply))
    }

    /// Reads the replies to every pipelined RCPT TO written so far.
    ///
    /// Each reply settles the oldest pending recipient: accepted ones join
    /// the envelope, rejected ones are dropped. Recipients still unanswered
    /// when the server goes quiet stay pending for the next call. If every
    /// recipient was rejected the session falls back to `EnvelopeSender`.
    ///
    /// # Errors
    ///
    /// Returns the first non-2xx reply as [`Error::SmtpError`], or
    /// [`Error::Protocol`] if the server goes quiet before answering every
    /// command.
    pub async fn drain_pipelined(&mut self) -> Result<Vec<Reply>> {
        let expected = self.pending_recipients.len();
        let mut replies = Vec::with_capacity(expected);
        let mut rejected = None;

        while !self.pending_recipients.is_empty() {
            let block = self.read_block().await?;
            if block.is_empty() {
                self.settle_rejected();
                return Err(Error::Protocol(format!(
                    "received {} of {expected} pipelined replies",
                    replies.len()
                )));
            }

            for reply in block.replies()? {
                match self.pending_recipients.pop_front() {
                    Some(to) if reply.is_success() => self.envelope.recipients.push(to),
                    Some(to) => {
                        warn!(recipient = %to, code = %reply.code, "Recipient rejected");
                        if rejected.is_none() {
                            rejected = Some(reply.clone());
                        }
                    }
                    None => warn!(
                        expected,
                        received = replies.len() + 1,
                        "More replies than pipelined commands"
                    ),
                }
                replies.push(reply);
            }
        }

        self.settle_rejected();
        match rejected {
            Some(reply) => Err(reply.into_error()),
            None => Ok(replies),
        }
    }

    /// Steps back to `EnvelopeSender` when no recipient is accepted or
    /// still awaiting its reply.
    fn settle_rejected(&mut self) {
        if self.state == SessionState::EnvelopeRecipients
            && self.envelope.recipients.is_empty()
            && self.pending_recipients.is_empty()
        {
            self.state = SessionState::EnvelopeSender;
        }
    }

    /// Sends DATA, after draining any pipelined replies.
    ///
    /// # Errors
    ///
    /// Returns an error if a recipient or DATA itself is rejected.
    pub async fn begin_data(&mut self) -> Result<()> {
        self.expect_state("DATA", &[SessionState::EnvelopeRecipients])?;

        if !self.pending_recipients.is_empty() {
            self.drain_pipelined().await?;
        }

        let block = self.request(&Command::Data).await?;
        match block.last_reply() {
            Ok(reply) if reply.is_intermediate() => {}
            Ok(reply) => return Err(reply.into_error()),
            Err(_) if block.is_empty() => {
                warn!("No reply to DATA within the read timeout, continuing");
            }
            Err(e) => return Err(e),
        }

        self.state = SessionState::DataPhase;
        Ok(())
    }

    /// Writes the message headers.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub async fn emit_headers(&mut self, subject: &str, date: NaiveDateTime) -> Result<()> {
        self.expect_state("headers", &[SessionState::DataPhase])?;

        let sender = self
            .envelope
            .sender
            .as_ref()
            .ok_or_else(|| Error::InvalidState("sender not set".into()))?;
        let from_atom = sender.name_atom();
        let header = MessageHeader {
            date,
            from: sender.address.as_str(),
            from_atom: from_atom.as_deref(),
            to: self.envelope.recipients.iter().map(Address::as_str).collect(),
            subject,
        };
        let lines = MessageBuilder::new(&self.boundary).header_lines(&header);

        self.send_lines(&lines).await
    }

    /// Writes a `text/plain` part.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub async fn emit_text_part(&mut self, text: &str) -> Result<()> {
        self.expect_state("text part", &[SessionState::DataPhase])?;
        let lines = MessageBuilder::new(&self.boundary).text_part_lines(text);
        self.send_lines(&lines).await
    }

    /// Writes an attachment part.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub async fn emit_file_part(&mut self, attachment: &Attachment) -> Result<()> {
        self.expect_state("file part", &[SessionState::DataPhase])?;
        debug!(
            filename = %attachment.filename,
            size = attachment.data.len(),
            "Attaching file"
        );
        let lines = MessageBuilder::new(&self.boundary).file_part_lines(attachment);
        self.send_lines(&lines).await
    }

    /// Closes the last MIME part and ends the message with `.`.
    ///
    /// # Errors
    ///
    /// Returns an error unless the server answers 250.
    pub async fn end_data(&mut self) -> Result<Reply> {
        self.expect_state("end of data", &[SessionState::DataPhase])?;

        let closing = MessageBuilder::new(&self.boundary).closing_line();
        self.send_line(&closing).await?;

        let reply = self.request(&Command::EndOfData).await?.last_reply()?;
        if reply.code != ReplyCode::OK {
            return Err(reply.into_error());
        }

        info!(reply = %reply.message_text(), "Message accepted");
        self.state = SessionState::MessageSent;
        Ok(reply)
    }

    /// Sends QUIT and terminates the session.
    ///
    /// Valid from every state except `Terminated`. The session is
    /// terminated even if QUIT cannot be written.
    ///
    /// # Errors
    ///
    /// Returns an error if the session was already terminated or the
    /// connection fails.
    pub async fn quit(&mut self) -> Result<Option<Reply>> {
        if self.state == SessionState::Terminated {
            return Err(Error::InvalidState("QUIT in terminated session".into()));
        }
        self.state = SessionState::Terminated;

        let block = self.connection.request(&Command::Quit).await?;
        Ok(block.last_reply().ok())
    }

    /// Runs one complete mail transaction for an authenticated session.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidAddress`] if there are no recipients or one is
    /// invalid, or the first error any step reports.
    pub async fn transmit(&mut self, message: &OutgoingMessage) -> Result<Reply> {
        if message.recipients.is_empty() {
            return Err(Error::InvalidAddress("No recipients specified".into()));
        }

        self.declare_sender().await?;
        for recipient in &message.recipients {
            self.declare_recipient(recipient).await?;
        }

        self.begin_data().await?;
        self.emit_headers(&message.subject, Local::now().naive_local())
            .await?;
        if let Some(text) = message.text.as_deref() {
            self.emit_text_part(text).await?;
        }
        for attachment in &message.attachments {
            self.emit_file_part(attachment).await?;
        }
        self.end_data().await
    }

    const fn dsn_requested(&self) -> bool {
        self.debug && self.capabilities.dsn
    }

    fn expect_state(&self, operation: &str, allowed: &[SessionState]) -> Result<()> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(Error::InvalidState(format!(
                "{operation} not allowed while {}",
                self.state
            )))
        }
    }

    /// Terminates the session when the connection itself has failed.
    fn track<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(e) = &result
            && e.is_connection_failure()
        {
            warn!(error = %e, "Connection lost, terminating session");
            self.state = SessionState::Terminated;
        }
        result
    }

    async fn request(&mut self, cmd: &Command) -> Result<ReplyBlock> {
        let result = self.connection.request(cmd).await;
        self.track(result)
    }

    async fn send_command(&mut self, cmd: &Command) -> Result<()> {
        let result = self.connection.send_command(cmd).await;
        self.track(result)
    }

    async fn send_line(&mut self, line: &str) -> Result<()> {
        let result = self.connection.send_line(line).await;
        self.track(result)
    }

    async fn send_lines(&mut self, lines: &[String]) -> Result<()> {
        for line in lines {
            self.send_line(line).await?;
        }
        Ok(())
    }

    async fn read_block(&mut self) -> Result<ReplyBlock> {
        let result = self.connection.read_block().await;
        self.track(result)
    }
}
