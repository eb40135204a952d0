//! Core SMTP types.

mod address;
mod capabilities;
mod envelope;
mod reply;

pub use address::{Address, Mailbox};
pub use capabilities::Capabilities;
pub use envelope::Envelope;
pub use reply::{Reply, ReplyBlock, ReplyCode};
