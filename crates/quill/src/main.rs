//! `quill` - compose and send an e-mail from the terminal.
//!
//! Connects to the given SMTP server, asks for the sender, recipients,
//! subject, body and attachments, and sends the result as one
//! `multipart/mixed` message.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod attachments;
mod prompt;
mod settings;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result, bail};
use clap::Parser;
use quill_smtp::{OutgoingMessage, Reply, Security, Session, SessionState};
use tokio::io::{AsyncBufRead, AsyncRead, AsyncWrite, BufReader};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use prompt::Prompter;
use settings::Settings;

/// Exit status after Ctrl-C.
const INTERRUPTED: u8 = 130;

/// Compose and send an e-mail from the terminal
#[derive(Parser, Debug)]
#[command(name = "quill")]
#[command(about = "Compose and send an e-mail from the terminal", long_about = None)]
#[command(version)]
struct Cli {
    /// Host name of the SMTP server
    host: Option<String>,

    /// Do not log in; only ask for the sender address
    #[arg(short = 'n', long)]
    no_login: bool,

    /// Log every command and reply, and request delivery status notifications
    #[arg(short, long)]
    debug: bool,

    /// Connect over plain TCP only
    #[arg(long)]
    plain: bool,

    /// Path to the JSON settings file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Password for AUTH LOGIN (asked for when absent)
    #[arg(long, env = "QUILL_PASSWORD", hide_env_values = true)]
    password: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.debug);

    tokio::select! {
        result = run(cli) => match result {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                eprintln!("Error: {e:#}");
                ExitCode::FAILURE
            }
        },
        _ = tokio::signal::ctrl_c() => {
            eprintln!("\nConnection terminated");
            // A pending stdin read would keep the runtime from shutting down.
            std::process::exit(i32::from(INTERRUPTED));
        }
    }
}

fn init_logging(debug: bool) {
    let default = if debug {
        "quill=debug,quill_smtp=debug"
    } else {
        "quill=info,quill_smtp=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    let mut settings = Settings::load(cli.config.as_deref())?;
    if let Some(host) = cli.host {
        settings.smtp.host = host;
    }
    if cli.debug {
        settings.smtp.debug = true;
    }
    if cli.plain {
        settings.smtp.security = Security::None;
    }
    if settings.smtp.host.is_empty() {
        bail!("no SMTP host given on the command line or in the settings file");
    }

    let mut prompter = Prompter::new(BufReader::new(tokio::io::stdin()), tokio::io::stdout());

    let mut session = if cli.no_login {
        let mut session = connect(&settings).await?;
        let sender = prompter.sender("From: ").await?;
        if let Err(e) = session.authenticate(&sender, None).await {
            abandon(&mut session).await;
            return Err(e.into());
        }
        session
    } else {
        login(&settings, &mut prompter, cli.password.as_deref()).await?
    };

    let message = match compose(&settings, &mut prompter).await {
        Ok(message) => message,
        Err(e) => {
            abandon(&mut session).await;
            return Err(e);
        }
    };
    if message.is_empty() {
        prompter.say("Nothing to send").await?;
        session.quit().await?;
        return Ok(());
    }

    let reply = deliver(&mut session, &message).await?;
    info!(reply = %reply.message_text(), "Sent");
    prompter.say("Message sent").await?;

    if let Err(e) = session.quit().await {
        warn!(error = %e, "QUIT failed");
    }
    Ok(())
}

async fn connect(settings: &Settings) -> Result<Session> {
    let mut session = Session::connect(&settings.smtp)
        .await
        .with_context(|| format!("cannot connect to {}", settings.smtp.host))?;
    session.negotiate().await.context("EHLO was rejected")?;
    Ok(session)
}

/// Connects and logs in, starting over on a fresh connection after each
/// rejected login.
async fn login<R, W>(
    settings: &Settings,
    prompter: &mut Prompter<R, W>,
    password: Option<&str>,
) -> Result<Session>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    // A password from the command line will not get any better on retry.
    let attempts = if password.is_some() {
        1
    } else {
        settings.max_auth_attempts.max(1)
    };

    for attempt in 1..=attempts {
        let mut session = connect(settings).await?;
        let sender = prompter.sender("E-mail: ").await?;
        let password = match password {
            Some(password) => password.to_string(),
            None => prompter.ask("Password: ").await?,
        };

        match session.authenticate(&sender, Some(&password)).await {
            Ok(()) => return Ok(session),
            Err(e) if e.is_auth_failure() => {
                warn!(attempt, attempts, error = %e, "Login rejected");
                prompter.say(&format!("Login failed: {e}")).await?;
                abandon(&mut session).await;
            }
            Err(e) => {
                abandon(&mut session).await;
                return Err(e).context("login failed");
            }
        }
    }

    bail!("login failed {attempts} times")
}

/// Transmits `message`, sending QUIT if any step fails.
async fn deliver<S>(session: &mut Session<S>, message: &OutgoingMessage) -> Result<Reply>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    match session.transmit(message).await {
        Ok(reply) => Ok(reply),
        Err(e) => {
            abandon(session).await;
            Err(e).context("message was not sent")
        }
    }
}

/// Sends QUIT after a failure, unless the connection is already gone.
async fn abandon<S>(session: &mut Session<S>)
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    if session.state() == SessionState::Terminated {
        return;
    }
    if let Err(e) = session.quit().await {
        warn!(error = %e, "QUIT failed");
    }
}

async fn compose<R, W>(settings: &Settings, prompter: &mut Prompter<R, W>) -> Result<OutgoingMessage>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let recipients = prompter.recipients().await?;
    let subject = prompter.ask("Subject: ").await?;

    prompter
        .say("Enter the message, then an empty line to continue")
        .await?;
    let body: String = prompter
        .lines_until_blank()
        .await?
        .into_iter()
        .map(|line| line + "\n")
        .collect();

    prompter
        .say("Enter files or folders to attach, then an empty line to send")
        .await?;
    let paths: Vec<PathBuf> = prompter
        .lines_until_blank()
        .await?
        .into_iter()
        .map(PathBuf::from)
        .collect();
    let files = attachments::expand(&paths).await?;

    let mut message = OutgoingMessage::new(subject);
    message.recipients = recipients;
    if !body.is_empty() {
        message.text = Some(settings.sign(body));
    }
    message.attachments = attachments::load(&files).await?;
    Ok(message)
}
