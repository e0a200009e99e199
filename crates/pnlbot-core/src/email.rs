//! CSV reports delivered by email.
//!
//! The mailbox is searched by subject; the most recent match is parsed and its
//! first non-empty CSV-shaped body part is extracted together with the
//! message timestamps. [`fetch_if_new`] uses the state store so that a report
//! is only handed out once.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::{Mutex, PoisonError};

use mailparse::{MailHeaderMap, ParsedMail};
use serde::Serialize;
use thiserror::Error;

use crate::csv_table::{CsvError, CsvOptions, CsvTable};
use crate::state::{StateError, StateStore};
use crate::UtcDateTime;

#[derive(Debug, Error)]
pub enum EmailError {
    #[error("No email found with subject: {subject}")]
    NotFound { subject: String },

    #[error("email with subject '{subject}' has no non-empty body part")]
    EmptyMessage { subject: String },

    #[error("malformed email: {0}")]
    Parse(#[from] mailparse::MailParseError),

    #[error(transparent)]
    Csv(#[from] CsvError),

    #[error(transparent)]
    State(#[from] StateError),

    #[error("failed to read mailbox {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

type MailboxFuture<'a> =
    Pin<Box<dyn Future<Output = Result<Option<Vec<u8>>, EmailError>> + Send + 'a>>;

/// Subject search over a mailbox; the IMAP session itself lives outside this crate.
pub trait Mailbox: Send + Sync {
    /// Raw RFC822 bytes of the most recent message whose subject contains
    /// `subject` (case-insensitive).
    fn latest_by_subject<'a>(&'a self, subject: &'a str) -> MailboxFuture<'a>;
}

/// Messages held in memory; later pushes count as more recent.
#[derive(Debug, Default)]
pub struct MemoryMailbox {
    messages: Mutex<Vec<Vec<u8>>>,
}

impl MemoryMailbox {
    pub fn push(&self, raw: impl Into<Vec<u8>>) {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(raw.into());
    }
}

impl Mailbox for MemoryMailbox {
    fn latest_by_subject<'a>(&'a self, subject: &'a str) -> MailboxFuture<'a> {
        Box::pin(async move {
            let messages = self
                .messages
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone();
            Ok(messages
                .into_iter()
                .rev()
                .find(|raw| subject_matches(raw, subject)))
        })
    }
}

/// Directory of `.eml` files; the most recent match is chosen by `Date` header.
#[derive(Debug, Clone)]
pub struct EmlDirMailbox {
    dir: PathBuf,
}

impl EmlDirMailbox {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl Mailbox for EmlDirMailbox {
    fn latest_by_subject<'a>(&'a self, subject: &'a str) -> MailboxFuture<'a> {
        Box::pin(async move {
            let io_error = |source| EmailError::Io {
                path: self.dir.clone(),
                source,
            };

            let mut entries = tokio::fs::read_dir(&self.dir).await.map_err(io_error)?;
            let mut paths = Vec::new();
            while let Some(entry) = entries.next_entry().await.map_err(io_error)? {
                let path = entry.path();
                if path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("eml")) {
                    paths.push(path);
                }
            }
            paths.sort();

            let mut latest: Option<(Option<UtcDateTime>, Vec<u8>)> = None;
            for path in paths {
                let raw = tokio::fs::read(&path).await.map_err(|source| EmailError::Io {
                    path: path.clone(),
                    source,
                })?;
                if !subject_matches(&raw, subject) {
                    continue;
                }

                let date = header_date(&raw);
                let newer = match &latest {
                    None => true,
                    Some((current, _)) => date >= *current,
                };
                if newer {
                    latest = Some((date, raw));
                }
            }

            tracing::debug!(dir = %self.dir.display(), subject, found = latest.is_some(), "searched eml directory");
            Ok(latest.map(|(_, raw)| raw))
        })
    }
}

fn subject_matches(raw: &[u8], subject: &str) -> bool {
    let Ok((headers, _)) = mailparse::parse_headers(raw) else {
        return false;
    };
    headers
        .get_first_value("Subject")
        .is_some_and(|value| value.to_lowercase().contains(&subject.to_lowercase()))
}

fn header_date(raw: &[u8]) -> Option<UtcDateTime> {
    let (headers, _) = mailparse::parse_headers(raw).ok()?;
    headers.get_first_value("Date").and_then(|value| parse_mail_date(&value))
}

fn parse_mail_date(value: &str) -> Option<UtcDateTime> {
    let seconds = mailparse::dateparse(value.trim()).ok()?;
    UtcDateTime::from_unix_seconds(seconds).ok()
}

/// CSV-shaped body part of a report email.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmailCsv {
    pub subject: Option<String>,
    pub filename: Option<String>,
    /// `Date` header.
    pub date: Option<UtcDateTime>,
    /// Latest timestamp among the `Received` headers.
    pub received: Option<UtcDateTime>,
    pub content: String,
}

impl EmailCsv {
    /// Parse a raw message and pick the first non-empty `text/csv` part,
    /// or failing that the first non-empty leaf part.
    pub fn from_raw(raw: &[u8]) -> Result<Self, EmailError> {
        let mail = mailparse::parse_mail(raw)?;
        let subject = mail.headers.get_first_value("Subject");

        let mut leaves = Vec::new();
        collect_leaves(&mail, &mut leaves);

        let mut fallback: Option<(&ParsedMail<'_>, String)> = None;
        let mut selected: Option<(&ParsedMail<'_>, String)> = None;
        for part in leaves {
            let body = part.get_body()?;
            if body.trim().is_empty() {
                continue;
            }
            if is_csv_part(part) {
                selected = Some((part, body));
                break;
            }
            if fallback.is_none() {
                fallback = Some((part, body));
            }
        }

        let Some((part, content)) = selected.or(fallback) else {
            return Err(EmailError::EmptyMessage {
                subject: subject.unwrap_or_default(),
            });
        };

        let received = mail
            .headers
            .get_all_values("Received")
            .iter()
            .filter_map(|value| value.rsplit_once(';').map(|(_, date)| date.to_string()))
            .filter_map(|date| parse_mail_date(&date))
            .max();

        Ok(Self {
            filename: attachment_name(part),
            date: mail
                .headers
                .get_first_value("Date")
                .and_then(|value| parse_mail_date(&value)),
            received,
            subject,
            content,
        })
    }

    /// `Received` when present, `Date` otherwise.
    pub fn timestamp(&self) -> Option<UtcDateTime> {
        self.received.or(self.date)
    }

    pub fn table(&self, options: CsvOptions) -> Result<CsvTable, EmailError> {
        Ok(CsvTable::parse(&self.content, options)?)
    }
}

fn collect_leaves<'a>(mail: &'a ParsedMail<'a>, leaves: &mut Vec<&'a ParsedMail<'a>>) {
    if mail.subparts.is_empty() {
        leaves.push(mail);
        return;
    }
    for part in &mail.subparts {
        collect_leaves(part, leaves);
    }
}

fn attachment_name(part: &ParsedMail<'_>) -> Option<String> {
    part.get_content_disposition()
        .params
        .get("filename")
        .or_else(|| part.ctype.params.get("name"))
        .cloned()
}

fn is_csv_part(part: &ParsedMail<'_>) -> bool {
    let mimetype = part.ctype.mimetype.to_ascii_lowercase();
    if matches!(
        mimetype.as_str(),
        "text/csv" | "application/csv" | "text/comma-separated-values"
    ) {
        return true;
    }
    attachment_name(part).is_some_and(|name| name.to_ascii_lowercase().ends_with(".csv"))
}

/// CSV of the most recent email matching `subject`.
pub async fn latest_csv(mailbox: &dyn Mailbox, subject: &str) -> Result<EmailCsv, EmailError> {
    let raw = mailbox
        .latest_by_subject(subject)
        .await?
        .ok_or_else(|| EmailError::NotFound {
            subject: subject.to_string(),
        })?;
    EmailCsv::from_raw(&raw)
}

/// Like [`latest_csv`], but `None` when the email is not newer than the last
/// one handed out for `subject`. A returned email is marked as seen.
///
/// Emails without any timestamp are always returned and never marked.
pub async fn fetch_if_new(
    mailbox: &dyn Mailbox,
    state: &dyn StateStore,
    subject: &str,
) -> Result<Option<EmailCsv>, EmailError> {
    let email = latest_csv(mailbox, subject).await?;
    let Some(timestamp) = email.timestamp() else {
        tracing::warn!(subject, "email carries no timestamp; skipping last-seen check");
        return Ok(Some(email));
    };

    if let Some(last_seen) = state.last_seen(subject)? {
        if timestamp <= last_seen {
            tracing::info!(subject, %last_seen, "no new email since last run");
            return Ok(None);
        }
    }

    state.mark_seen(subject, timestamp)?;
    tracing::info!(subject, %timestamp, "new email");
    Ok(Some(email))
}
