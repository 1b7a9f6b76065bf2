//! Mail tools and the mailbox backend they run against.
//!
//! The tools only see the [`Mailbox`] trait. [`LocalMailbox`] keeps the
//! inbox and sent folder in a JSON file so the agent can be exercised
//! without a hosted mail account.

use super::{int_arg_or, str_arg};
use crate::types::{Arguments, ParamType, ToolDescriptor};
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Default number of messages `show_unread_emails` lists.
pub const DEFAULT_MAX_EMAILS: i64 = 5;

/// Display width for subject and sender lines.
const MAX_FIELD_CHARS: usize = 60;
const MAX_NAME_CHARS: usize = 30;

/// One stored mail message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MailMessage {
    pub id: String,
    pub from: String,
    pub to: String,
    pub subject: String,
    pub date: String,
    #[serde(default)]
    pub snippet: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub unread: bool,
}

/// Backend the mail tools operate on.
#[async_trait]
pub trait Mailbox: Send + Sync {
    /// Up to `limit` unread messages, oldest first.
    async fn unread(&self, limit: usize) -> Result<Vec<MailMessage>>;

    /// Send a message; returns the new message id.
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<String>;

    /// Mark a message as read. `Ok(false)` if no message has that id.
    async fn mark_read(&self, id: &str) -> Result<bool>;
}

// ---------------------------------------------------------------------------
// Tool definitions
// ---------------------------------------------------------------------------

pub fn definitions() -> Vec<ToolDescriptor> {
    vec![
        ToolDescriptor::new("show_unread_emails", "Retrieve and display unread emails").optional(
            "max_emails",
            ParamType::Integer,
            Some(json!(DEFAULT_MAX_EMAILS)),
            "Maximum number of emails to retrieve (default: 5)",
        ),
        ToolDescriptor::new("send_gmail", "Send an email")
            .required("recipient", ParamType::String, "Email address of the recipient")
            .required("subject", ParamType::String, "Subject of the email")
            .required("message", ParamType::String, "Body content of the email"),
        ToolDescriptor::new("mark_email_as_read", "Mark a specific email as read").required(
            "email_id",
            ParamType::String,
            "The ID of the email to mark as read",
        ),
    ]
}

/// Execute a mail tool. `None` means the name is not a mail tool.
pub async fn execute(
    mailbox: &dyn Mailbox,
    name: &str,
    args: &Arguments,
) -> Option<Result<String>> {
    let result = match name {
        "show_unread_emails" => show_unread_emails(mailbox, args).await,
        "send_gmail" => send_gmail(mailbox, args).await,
        "mark_email_as_read" => mark_email_as_read(mailbox, args).await,
        _ => return None,
    };
    Some(result)
}

async fn show_unread_emails(mailbox: &dyn Mailbox, args: &Arguments) -> Result<String> {
    let max = int_arg_or(args, "max_emails", DEFAULT_MAX_EMAILS)?;
    let limit = usize::try_from(max).context("max_emails must not be negative")?;

    let messages = mailbox.unread(limit).await?;
    if messages.is_empty() {
        return Ok("📭 No unread emails found in your inbox.".into());
    }

    let blocks: Vec<String> = messages
        .iter()
        .enumerate()
        .map(|(i, msg)| render_message(i + 1, msg))
        .collect();
    Ok(format!(
        "📬 Found {} unread emails:\n{}",
        messages.len(),
        blocks.join("\n")
    ))
}

async fn send_gmail(mailbox: &dyn Mailbox, args: &Arguments) -> Result<String> {
    let recipient = str_arg(args, "recipient")?.trim();
    let subject = str_arg(args, "subject")?;
    let message = str_arg(args, "message")?;

    if !recipient.contains('@') {
        bail!("invalid recipient address: {:?}", recipient);
    }

    let id = mailbox.send(recipient, subject, message).await?;
    debug!("Sent message {} to {}", id, recipient);
    Ok(format!("Email sent successfully to {}", recipient))
}

async fn mark_email_as_read(mailbox: &dyn Mailbox, args: &Arguments) -> Result<String> {
    let id = str_arg(args, "email_id")?.trim();
    if !mailbox.mark_read(id).await? {
        bail!("no email with id {}", id);
    }
    Ok(format!("Email {} marked as read", id))
}

fn render_message(index: usize, msg: &MailMessage) -> String {
    format!(
        "\n┏━━━━━━━━━━━━━━━━━━━━━ EMAIL {index} ━━━━━━━━━━━━━━━━━━━━━┓\n\
         ┃ From:    {from}\n\
         ┃ Subject: {subject}\n\
         ┃ Date:    {date}\n\
         ┃ ID:      {id}\n\
         ┣━━━━━━━━━━━━━━━━━━━ PREVIEW ━━━━━━━━━━━━━━━━━━━┫\n\
         {snippet}\n\
         ┗━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━┛\n",
        from = shorten_sender(&msg.from),
        subject = truncate_chars(&msg.subject, MAX_FIELD_CHARS),
        date = msg.date,
        id = msg.id,
        snippet = msg.snippet,
    )
}

/// `Very Long Display Name <addr@host>` keeps the address and trims the name.
fn shorten_sender(sender: &str) -> String {
    if sender.chars().count() <= MAX_FIELD_CHARS {
        return sender.to_string();
    }
    match sender.split_once('<') {
        Some((name, addr)) => format!("{}<{}", truncate_chars(name, MAX_NAME_CHARS), addr),
        None => truncate_chars(sender, MAX_FIELD_CHARS),
    }
}

fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let kept: String = text.chars().take(max.saturating_sub(3)).collect();
    format!("{}...", kept)
}

// ---------------------------------------------------------------------------
// File-backed mailbox
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Serialize, Deserialize)]
struct MailboxFile {
    #[serde(default)]
    inbox: Vec<MailMessage>,
    #[serde(default)]
    sent: Vec<MailMessage>,
}

/// Mailbox persisted as a JSON document (`{"inbox": [...], "sent": [...]}`).
pub struct LocalMailbox {
    address: String,
    path: Option<PathBuf>,
    folders: Mutex<MailboxFile>,
}

impl LocalMailbox {
    /// Open the mailbox at `path`. A missing file is an empty mailbox.
    pub fn open(path: &Path, address: &str) -> Result<Self> {
        let folders = if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read mailbox {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse mailbox {}", path.display()))?
        } else {
            MailboxFile::default()
        };
        info!(
            "Opened mailbox {} ({} messages)",
            path.display(),
            folders.inbox.len()
        );
        Ok(Self {
            address: address.to_string(),
            path: Some(path.to_path_buf()),
            folders: Mutex::new(folders),
        })
    }

    /// A mailbox that lives only in memory.
    pub fn in_memory(address: &str, inbox: Vec<MailMessage>) -> Self {
        Self {
            address: address.to_string(),
            path: None,
            folders: Mutex::new(MailboxFile {
                inbox,
                sent: Vec::new(),
            }),
        }
    }

    /// Messages sent through this mailbox so far.
    pub async fn sent(&self) -> Vec<MailMessage> {
        self.folders.lock().await.sent.clone()
    }

    async fn persist(&self, folders: &MailboxFile) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let contents = serde_json::to_string_pretty(folders)?;
        tokio::fs::write(path, contents)
            .await
            .with_context(|| format!("Failed to write mailbox {}", path.display()))?;
        Ok(())
    }
}

#[async_trait]
impl Mailbox for LocalMailbox {
    async fn unread(&self, limit: usize) -> Result<Vec<MailMessage>> {
        let folders = self.folders.lock().await;
        Ok(folders
            .inbox
            .iter()
            .filter(|m| m.unread)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<String> {
        let mut folders = self.folders.lock().await;
        let id = ulid::Ulid::new().to_string().to_lowercase();
        folders.sent.push(MailMessage {
            id: id.clone(),
            from: self.address.clone(),
            to: to.to_string(),
            subject: subject.to_string(),
            date: Utc::now().to_rfc2822(),
            snippet: truncate_chars(body, 100),
            body: body.to_string(),
            unread: false,
        });
        self.persist(&folders).await?;
        Ok(id)
    }

    async fn mark_read(&self, id: &str) -> Result<bool> {
        let mut folders = self.folders.lock().await;
        let Some(msg) = folders.inbox.iter_mut().find(|m| m.id == id) else {
            return Ok(false);
        };
        msg.unread = false;
        self.persist(&folders).await?;
        Ok(true)
    }
}
