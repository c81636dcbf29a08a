/*
 * mod.rs
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

//! In-memory result store for an IMAP session: selected-folder state plus
//! the retrieved messages.

mod folder;
mod message;
mod search;

pub use folder::{FlagInfo, FolderInfo};
pub use message::{BodyPart, Disposition, MailboxMessage};
pub use search::SearchResult;

/// Root of the result store. Mutated only by the IMAP engine during a
/// session; cleared only by an explicit reset.
#[derive(Debug, Clone, Default)]
pub struct Mailbox {
    pub folders: FolderInfo,
    pub flags: FlagInfo,
    /// EXISTS count from EXAMINE.
    pub total_messages: u32,
    /// UIDNEXT from EXAMINE.
    pub next_uid: u32,
    /// Whether ids address by UID rather than sequence number.
    pub uid_addressed: bool,
    pub messages: Vec<MailboxMessage>,
}

impl Mailbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn available_messages(&self) -> usize {
        self.messages.len()
    }

    /// Drop all session results.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
