//! SMTP command builder.

use crate::types::Address;
use std::fmt;

/// SMTP command.
///
/// Formats to the command line without its CRLF terminator; the connection
/// appends that when writing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// EHLO - Extended greeting
    Ehlo {
        /// Client identifier
        hostname: String,
    },
    /// AUTH LOGIN - Begin LOGIN authentication
    AuthLogin,
    /// Base64 answer to an AUTH LOGIN challenge
    AuthResponse(String),
    /// MAIL FROM - Start mail transaction
    MailFrom {
        /// Sender address
        from: Address,
        /// BODY parameter (8BITMIME)
        body: Option<&'static str>,
        /// DSN envelope identifier; adds `RET=HDRS ENVID=<id>`
        envid: Option<String>,
    },
    /// RCPT TO - Add recipient
    RcptTo {
        /// Recipient address
        to: Address,
        /// Request success and failure notifications for this recipient
        notify: bool,
    },
    /// DATA - Begin message data
    Data,
    /// End of message data
    EndOfData,
    /// QUIT - Close connection
    Quit,
}

impl Command {
    /// Returns true if the command carries credentials and must not be logged.
    #[must_use]
    pub const fn is_sensitive(&self) -> bool {
        matches!(self, Self::AuthResponse(_))
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ehlo { hostname } => write!(f, "EHLO {hostname}"),
            Self::AuthLogin => f.write_str("AUTH LOGIN"),
            Self::AuthResponse(encoded) => f.write_str(encoded),
            Self::MailFrom { from, body, envid } => {
                write!(f, "MAIL FROM: <{from}>")?;
                if let Some(body) = body {
                    write!(f, " {body}")?;
                }
                if let Some(envid) = envid {
                    write!(f, " RET=HDRS ENVID={envid}")?;
                }
                Ok(())
            }
            Self::RcptTo { to, notify } => {
                write!(f, "RCPT TO: <{to}>")?;
                if *notify {
                    write!(f, " NOTIFY=SUCCESS,FAILURE ORCPT=rfc822;{to}")?;
                }
                Ok(())
            }
            Self::Data => f.write_str("DATA"),
            Self::EndOfData => f.write_str("."),
            Self::Quit => f.write_str("QUIT"),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn addr(s: &str) -> Address {
        Address::new(s).unwrap()
    }

    #[test]
    fn test_ehlo_command() {
        let cmd = Command::Ehlo {
            hostname: "client.example.com".to_string(),
        };
        assert_eq!(cmd.to_string(), "EHLO client.example.com");
    }

    #[test]
    fn test_auth_commands() {
        assert_eq!(Command::AuthLogin.to_string(), "AUTH LOGIN");
        let cmd = Command::AuthResponse("c2VjcmV0".to_string());
        assert_eq!(cmd.to_string(), "c2VjcmV0");
        assert!(cmd.is_sensitive());
        assert!(!Command::AuthLogin.is_sensitive());
    }

    #[test]
    fn test_mail_from_simple() {
        let cmd = Command::MailFrom {
            from: addr("sender@example.com"),
            body: None,
            envid: None,
        };
        assert_eq!(cmd.to_string(), "MAIL FROM: <sender@example.com>");
    }

    #[test]
    fn test_mail_from_with_params() {
        let cmd = Command::MailFrom {
            from: addr("sender@example.com"),
            body: Some("BODY=8BITMIME"),
            envid: Some("Xy12abCD90".to_string()),
        };
        assert_eq!(
            cmd.to_string(),
            "MAIL FROM: <sender@example.com> BODY=8BITMIME RET=HDRS ENVID=Xy12abCD90"
        );
    }

    #[test]
    fn test_rcpt_to_command() {
        let cmd = Command::RcptTo {
            to: addr("recipient@example.com"),
            notify: false,
        };
        assert_eq!(cmd.to_string(), "RCPT TO: <recipient@example.com>");
    }

    #[test]
    fn test_rcpt_to_with_dsn() {
        let cmd = Command::RcptTo {
            to: addr("recipient@example.com"),
            notify: true,
        };
        assert_eq!(
            cmd.to_string(),
            "RCPT TO: <recipient@example.com> NOTIFY=SUCCESS,FAILURE ORCPT=rfc822;recipient@example.com"
        );
    }

    #[test]
    fn test_simple_commands() {
        assert_eq!(Command::Data.to_string(), "DATA");
        assert_eq!(Command::EndOfData.to_string(), ".");
        assert_eq!(Command::Quit.to_string(), "QUIT");
    }
}
