//! Interactive terminal prompts.

use anyhow::{Result, bail};
use quill_smtp::{Address, Mailbox};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

/// Reads answers from `input` after writing questions to `output`.
pub struct Prompter<R, W> {
    input: R,
    output: W,
}

impl<R, W> Prompter<R, W>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub const fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    /// Writes `text` on its own line.
    pub async fn say(&mut self, text: &str) -> Result<()> {
        self.output.write_all(text.as_bytes()).await?;
        self.output.write_all(b"\n").await?;
        self.output.flush().await?;
        Ok(())
    }

    /// Writes `label` and reads one line.
    ///
    /// Fails when the input is closed.
    pub async fn ask(&mut self, label: &str) -> Result<String> {
        self.output.write_all(label.as_bytes()).await?;
        self.output.flush().await?;
        match self.read_line().await? {
            Some(line) => Ok(line),
            None => bail!("input closed"),
        }
    }

    /// Asks for a sender of the form `[Display Name ]local@domain` until one
    /// parses.
    pub async fn sender(&mut self, label: &str) -> Result<String> {
        let mut answer = self.ask(label).await?;
        while let Err(e) = Mailbox::parse(&answer) {
            self.say(&e.to_string()).await?;
            answer = self.ask(label).await?;
        }
        Ok(answer)
    }

    /// Asks for space-separated recipients, re-asking for each invalid one.
    pub async fn recipients(&mut self) -> Result<Vec<String>> {
        let mut answer = self.ask("To (separated by spaces): ").await?;
        while answer.trim().is_empty() {
            answer = self.ask("To (separated by spaces): ").await?;
        }

        let mut recipients = Vec::new();
        for candidate in answer.split_whitespace() {
            let mut addr = candidate.to_string();
            while Address::new(&addr).is_err() {
                addr = self
                    .ask(&format!("{addr} is not a valid address, enter again: "))
                    .await?
                    .trim()
                    .to_string();
            }
            recipients.push(addr);
        }
        Ok(recipients)
    }

    /// Reads lines until an empty line or the end of input.
    pub async fn lines_until_blank(&mut self) -> Result<Vec<String>> {
        let mut lines = Vec::new();
        while let Some(line) = self.read_line().await? {
            if line.is_empty() {
                break;
            }
            lines.push(line);
        }
        Ok(lines)
    }

    async fn read_line(&mut self) -> Result<Option<String>> {
        let mut line = String::new();
        if self.input.read_line(&mut line).await? == 0 {
            return Ok(None);
        }
        let len = line.trim_end_matches(['\r', '\n']).len();
        line.truncate(len);
        Ok(Some(line))
    }
}
