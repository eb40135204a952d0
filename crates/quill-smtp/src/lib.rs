//! # quill-smtp
//!
//! A small SMTP client that sends one `multipart/mixed` message per session.
//!
//! ## Features
//!
//! - **Implicit TLS** on port 465, falling back to plain TCP on port 25 when
//!   the secure connect times out
//! - **Capability negotiation** for PIPELINING, 8BITMIME and DSN
//! - **AUTH LOGIN** with Base64 encoded credentials
//! - **Optimistic pipelining** of RCPT TO, with every reply checked before DATA
//! - **Runtime session states** that reject out-of-order operations
//!
//! ## Quick Start
//!
//! ```ignore
//! use quill_smtp::{OutgoingMessage, Session, SmtpConfig};
//!
//! #[tokio::main]
//! async fn main() -> quill_smtp::Result<()> {
//!     let config = SmtpConfig::new("smtp.example.com");
//!     let mut session = Session::connect(&config).await?;
//!
//!     session.negotiate().await?;
//!     session
//!         .authenticate("Alice alice@example.com", Some("secret"))
//!         .await?;
//!
//!     let message = OutgoingMessage::new("Hello")
//!         .to("bob@example.com")
//!         .text("Hello, World!");
//!     session.transmit(&message).await?;
//!
//!     session.quit().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Reply framing
//!
//! The server's replies are read until the connection has been quiet for
//! [`SmtpConfig::read_timeout_ms`]. See [`connection`] for the details.
//!
//! ## Modules
//!
//! - [`command`]: SMTP command formatting
//! - [`connection`]: Streams and the line-based connection
//! - [`parser`]: Reply parser
//! - [`session`]: The session state machine
//! - [`types`]: Core SMTP types (addresses, capabilities, replies)

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod command;
mod config;
pub mod connection;
mod error;
pub mod parser;
pub mod session;
pub mod types;

pub use config::{Security, SmtpConfig};
pub use connection::{Connection, SmtpStream};
pub use error::{Error, Result};
pub use session::{OutgoingMessage, Session, SessionState};
pub use types::{Address, Capabilities, Envelope, Mailbox, Reply, ReplyBlock, ReplyCode};

pub use quill_mime::{Attachment, Boundary};
