/*
 * config.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * This file is part of Postino, an embeddable mail submission and retrieval engine.
 *
 * Postino is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * Postino is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with Postino.  If not, see <http://www.gnu.org/licenses/>.
 */

//! Session configuration: plain data consumed by the engines, immutable for
//! the duration of one send/read call.

use std::path::PathBuf;
use std::time::Duration;

/// How the connection is secured. Negotiation happens in `net`, beneath the
/// engine boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Security {
    None,
    StartTls,
    ImplicitTls,
}

/// Default idle timeout for one response wait.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(10);

/// Default cap on a body part's in-memory text accumulator, in bytes.
pub const DEFAULT_MESSAGE_BUFFER_CAP: usize = 200;

/// Default attachment download ceiling, in bytes.
pub const DEFAULT_ATTACHMENT_SIZE_LIMIT: usize = 1024 * 1024;

/// Default cap on the number of search results retained.
pub const DEFAULT_SEARCH_LIMIT: usize = 20;

/// SMTP submission session parameters.
#[derive(Debug, Clone)]
pub struct SmtpSessionConfig {
    pub host: String,
    pub port: u16,
    pub login: String,
    pub password: String,
    pub security: Security,
    pub idle_timeout: Duration,
}

impl SmtpSessionConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            login: String::new(),
            password: String::new(),
            security: Security::StartTls,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
        }
    }
}

/// Send-side attachment payload source.
#[derive(Debug, Clone)]
pub enum AttachmentSource {
    /// Owned in-memory blob.
    Memory(Vec<u8>),
    /// Path into the storage collaborator's filesystem.
    File(PathBuf),
}

/// One attachment to transmit. Index within the message is its position in
/// `OutgoingMessage::attachments`.
#[derive(Debug, Clone)]
pub struct AttachmentToSend {
    pub filename: String,
    pub mime_type: String,
    pub source: AttachmentSource,
}

impl AttachmentToSend {
    pub fn from_memory(
        filename: impl Into<String>,
        mime_type: impl Into<String>,
        data: Vec<u8>,
    ) -> Self {
        Self {
            filename: filename.into(),
            mime_type: mime_type.into(),
            source: AttachmentSource::Memory(data),
        }
    }

    pub fn from_file(
        filename: impl Into<String>,
        mime_type: impl Into<String>,
        path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            filename: filename.into(),
            mime_type: mime_type.into(),
            source: AttachmentSource::File(path.into()),
        }
    }
}

/// Message composition surface for submission.
#[derive(Debug, Clone)]
pub struct OutgoingMessage {
    pub from_name: String,
    pub from_address: String,
    pub to: Vec<String>,
    pub cc: Vec<String>,
    pub bcc: Vec<String>,
    pub subject: String,
    pub body: String,
    pub html: bool,
    /// Only 1 (high), 3 (normal) and 5 (low) produce a priority header block.
    pub priority: Option<u8>,
    pub attachments: Vec<AttachmentToSend>,
}

impl OutgoingMessage {
    pub fn new(from_address: impl Into<String>) -> Self {
        Self {
            from_name: String::new(),
            from_address: from_address.into(),
            to: Vec::new(),
            cc: Vec::new(),
            bcc: Vec::new(),
            subject: String::new(),
            body: String::new(),
            html: false,
            priority: None,
            attachments: Vec::new(),
        }
    }

    /// All envelope recipients, in RCPT TO order: To, then Cc, then Bcc.
    pub fn recipients(&self) -> impl Iterator<Item = &str> {
        self.to
            .iter()
            .chain(self.cc.iter())
            .chain(self.bcc.iter())
            .map(String::as_str)
    }
}

/// IMAP retrieval session parameters.
#[derive(Debug, Clone)]
pub struct ImapSessionConfig {
    pub host: String,
    pub port: u16,
    pub login: String,
    pub password: String,
    pub security: Security,
    pub idle_timeout: Duration,
    /// Mailbox to EXAMINE.
    pub folder: String,
    /// IMAP SEARCH criteria, e.g. `"UID SEARCH UNSEEN"`. Empty means
    /// "fetch the most recent message".
    pub search_criteria: String,
    /// Explicit UID to fetch. Mutually exclusive with `search_criteria`;
    /// bypasses LIST and SEARCH entirely.
    pub fetch_uid: Option<u32>,
    /// Directory for downloaded attachments; no downloads when unset.
    pub save_path: Option<PathBuf>,
    /// Cap on each part's in-memory text accumulator, in bytes.
    pub message_buffer_cap: usize,
    /// Attachments declared larger than this are skipped, not downloaded.
    pub attachment_size_limit: usize,
    /// Cap on retained search results.
    pub search_limit: usize,
    /// Keep the numerically largest ids, sorted descending.
    pub recent_sort: bool,
    /// Fetch header fields only; no MIME traversal, no bodies.
    pub header_only: bool,
    /// Fetch text/plain body parts.
    pub fetch_text: bool,
    /// Fetch text/html body parts.
    pub fetch_html: bool,
    /// Download attachment parts to storage.
    pub download_attachments: bool,
    /// Emit 5%-granularity Download progress events.
    pub download_report: bool,
}

impl ImapSessionConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            login: String::new(),
            password: String::new(),
            security: Security::ImplicitTls,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            folder: "INBOX".to_string(),
            search_criteria: String::new(),
            fetch_uid: None,
            save_path: None,
            message_buffer_cap: DEFAULT_MESSAGE_BUFFER_CAP,
            attachment_size_limit: DEFAULT_ATTACHMENT_SIZE_LIMIT,
            search_limit: DEFAULT_SEARCH_LIMIT,
            recent_sort: true,
            header_only: false,
            fetch_text: true,
            fetch_html: false,
            download_attachments: true,
            download_report: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recipients_preserve_rcpt_order() {
        let mut msg = OutgoingMessage::new("a@example.org");
        msg.to.push("to@example.org".to_string());
        msg.cc.push("cc@example.org".to_string());
        msg.bcc.push("bcc@example.org".to_string());
        let all: Vec<&str> = msg.recipients().collect();
        assert_eq!(all, ["to@example.org", "cc@example.org", "bcc@example.org"]);
    }

    #[test]
    fn imap_defaults() {
        let c = ImapSessionConfig::new("imap.example.org", 993);
        assert_eq!(c.folder, "INBOX");
        assert_eq!(c.search_limit, 20);
        assert!(c.recent_sort);
        assert_eq!(c.message_buffer_cap, 200);
        assert_eq!(c.attachment_size_limit, 1024 * 1024);
    }
}
