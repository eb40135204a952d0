//! Settings file handling.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use quill_smtp::SmtpConfig;
use serde::{Deserialize, Serialize};

/// Default number of login attempts before giving up.
const DEFAULT_MAX_AUTH_ATTEMPTS: u32 = 3;

/// Everything `quill` reads from its JSON settings file.
///
/// Connection settings sit at the top level of the file next to the
/// settings only the command-line client uses:
///
/// ```json
/// {
///   "host": "smtp.example.com",
///   "read_timeout_ms": 2000,
///   "signature": "Sent from my terminal"
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// SMTP connection and session settings.
    #[serde(flatten)]
    pub smtp: SmtpConfig,
    /// Text appended below the message body.
    pub signature: Option<String>,
    /// How often a rejected login is retried with new credentials.
    pub max_auth_attempts: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            smtp: SmtpConfig::default(),
            signature: None,
            max_auth_attempts: DEFAULT_MAX_AUTH_ATTEMPTS,
        }
    }
}

impl Settings {
    /// Returns `<config dir>/quill/config.json`.
    #[must_use]
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("quill")
            .join("config.json")
    }

    /// Loads settings from `path`, or from the default location if that
    /// file exists.
    ///
    /// An explicitly given file must exist; a missing default file yields
    /// the default settings.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::from_file(path);
        }

        let path = Self::default_path();
        if path.exists() {
            Self::from_file(&path)
        } else {
            Ok(Self::default())
        }
    }

    fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read settings file {}", path.display()))?;
        let settings = serde_json::from_str(&contents)
            .with_context(|| format!("invalid settings file {}", path.display()))?;
        tracing::debug!(path = %path.display(), "Settings loaded");
        Ok(settings)
    }

    /// Appends the configured signature to a non-empty body.
    #[must_use]
    pub fn sign(&self, body: String) -> String {
        match &self.signature {
            Some(signature) if !body.is_empty() => format!("{body}\n\n-----\n{signature}"),
            _ => body,
        }
    }
}
