//! # quill-mime
//!
//! MIME encoding and `multipart/mixed` message generation for the quill
//! mail sender.
//!
//! ## Features
//!
//! - **Base64**: standard alphabet with `=` padding, as receiving servers
//!   expect for `Content-Transfer-Encoding: base64`
//! - **RFC 2047**: `=?utf-8?B?...?=` encoded words for subjects and
//!   display names
//! - **Boundaries**: random alphanumeric boundary tokens
//! - **Message lines**: headers, text parts, and chunked attachment parts
//!   produced as individual lines ready to be written during `DATA`
//!
//! ## Quick Start
//!
//! ```ignore
//! use quill_mime::{Attachment, Boundary, MessageBuilder, MessageHeader};
//!
//! let boundary = Boundary::generate();
//! let builder = MessageBuilder::new(&boundary);
//!
//! let header = MessageHeader {
//!     date: chrono::Local::now().naive_local(),
//!     from: "alice@example.com",
//!     from_atom: Some("=?utf-8?B?QWxpY2U=?="),
//!     to: vec!["bob@example.com"],
//!     subject: "Hello",
//! };
//!
//! let mut lines = builder.header_lines(&header);
//! lines.extend(builder.text_part_lines("Hi Bob!"));
//! lines.extend(builder.file_part_lines(&Attachment::new("notes.txt", b"...".to_vec())));
//! lines.push(builder.closing_line());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod boundary;
mod builder;
mod error;

pub mod encoding;

pub use boundary::Boundary;
pub use builder::{ATTACHMENT_LINE_LENGTH, Attachment, MessageBuilder, MessageHeader};
pub use error::{Error, Result};
