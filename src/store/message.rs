/*
 * message.rs
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

//! Retrieved message and body part types, populated incrementally by the
//! IMAP engine.

/// Inline/body content versus attachment content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Disposition {
    #[default]
    None,
    Attachment,
}

/// One MIME part of a retrieved message. Created lazily the first time a
/// MIME sub-fetch reports its path; never removed within the message's
/// lifetime.
#[derive(Debug, Clone, Default)]
pub struct BodyPart {
    /// Dotted-integer address within the MIME tree, e.g. "1.2".
    pub path: String,
    pub content_type: String,
    pub charset: String,
    pub name: String,
    pub transfer_encoding: String,
    pub disposition: Disposition,
    pub filename: String,
    /// Size declared by the server in the part header.
    pub declared_size: usize,
    /// Bytes actually decoded and delivered.
    pub downloaded_size: usize,
    pub creation_date: String,
    pub modification_date: String,
    pub description: String,
    /// Decoded text, bounded by the configured buffer cap.
    pub text: String,
    pub error: bool,
    pub error_reason: String,
    /// Set once when streaming to storage begins, so the sink is not reopened.
    pub sink_opened: bool,
}

impl BodyPart {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    pub fn is_multipart(&self) -> bool {
        let lower = self.content_type.to_ascii_lowercase();
        lower.starts_with("multipart/")
    }

    pub fn is_attachment(&self) -> bool {
        self.disposition == Disposition::Attachment
    }

    /// Sticky per-part failure. Success later does not clear it.
    pub fn set_error(&mut self, reason: impl Into<String>) {
        self.error = true;
        self.error_reason = reason.into();
    }

    /// Append decoded text, honoring the accumulator cap in bytes.
    pub fn push_text(&mut self, text: &str, cap: usize) {
        let room = cap.saturating_sub(self.text.len());
        if room == 0 {
            return;
        }
        if text.len() <= room {
            self.text.push_str(text);
        } else {
            let mut end = room;
            while end > 0 && !text.is_char_boundary(end) {
                end -= 1;
            }
            self.text.push_str(&text[..end]);
        }
    }
}

/// One retrieved or searched message. Header fields arrive from the header
/// FETCH; parts from the MIME traversal.
#[derive(Debug, Clone, Default)]
pub struct MailboxMessage {
    /// UID or sequence number, per `uid_addressed`.
    pub id: u32,
    pub uid_addressed: bool,
    pub date: String,
    pub subject: String,
    pub subject_charset: String,
    pub from: String,
    pub from_charset: String,
    pub to: String,
    pub to_charset: String,
    pub cc: String,
    pub cc_charset: String,
    pub message_id: String,
    pub accept_language: String,
    pub content_language: String,
    /// Parts whose disposition resolved to attachment. Monotonic.
    pub attachment_count: usize,
    /// Sum of declared attachment sizes. Monotonic.
    pub total_attach_size: usize,
    /// Bytes actually downloaded (plus skipped declared sizes rolled in at
    /// the end so sibling percentages stay consistent).
    pub downloaded_bytes: usize,
    pub parts: Vec<BodyPart>,
    pub error: bool,
    pub error_reason: String,
}

impl MailboxMessage {
    pub fn new(id: u32, uid_addressed: bool) -> Self {
        Self {
            id,
            uid_addressed,
            ..Self::default()
        }
    }

    /// Part at `path`, created on first sight.
    pub fn part_mut(&mut self, path: &str) -> &mut BodyPart {
        let i = match self.parts.iter().position(|p| p.path == path) {
            Some(i) => i,
            None => {
                self.parts.push(BodyPart::new(path));
                self.parts.len() - 1
            }
        };
        &mut self.parts[i]
    }

    pub fn part(&self, path: &str) -> Option<&BodyPart> {
        self.parts.iter().find(|p| p.path == path)
    }

    /// Sticky per-message failure. Success later does not clear it.
    pub fn set_error(&mut self, reason: impl Into<String>) {
        self.error = true;
        self.error_reason = reason.into();
    }

    /// Explicit once-per-fetch-attempt reset, before any sub-fetch runs.
    pub fn reset_error(&mut self) {
        self.error = false;
        self.error_reason.clear();
        for part in &mut self.parts {
            part.error = false;
            part.error_reason.clear();
        }
    }
}
