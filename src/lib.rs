/*
 * lib.rs
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

//! Embeddable SMTP submission and IMAP retrieval engine. Callers supply a
//! configuration, a result store, a storage backend for attachments and a
//! status reporter; the engines drive one protocol session end to end.

pub mod config;
pub mod error;
pub mod mime;
pub mod net;
pub mod protocol;
pub mod report;
pub mod storage;
pub mod store;

pub use config::{
    AttachmentSource, AttachmentToSend, ImapSessionConfig, OutgoingMessage, Security,
    SmtpSessionConfig,
};
pub use error::{ErrorKind, MailError};
pub use protocol::imap::{read_mail, read_mail_session};
pub use protocol::smtp::{send_mail, send_session};
pub use report::{NullReporter, Phase, Reporter, StatusEvent};
pub use storage::{FsStorage, MemStorage, Storage};
pub use store::{BodyPart, Disposition, Mailbox, MailboxMessage, SearchResult};
