//! SMTP envelope.

use super::{Address, Mailbox};

/// Envelope sender and recipients, filled in as the session declares them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Envelope {
    /// Sender, set once authentication (or its skip) has resolved it.
    pub sender: Option<Mailbox>,
    /// Recipients in declaration order.
    pub recipients: Vec<Address>,
}

impl Envelope {
    /// Returns the bare sender address, if the sender is known.
    #[must_use]
    pub fn sender_address(&self) -> Option<&Address> {
        self.sender.as_ref().map(|mailbox| &mailbox.address)
    }
}
