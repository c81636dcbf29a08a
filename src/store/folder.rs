/*
 * folder.rs
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

//! Folder and flag name lists, scoped to the currently selected mailbox.

/// Folder names reported by LIST.
#[derive(Debug, Clone, Default)]
pub struct FolderInfo {
    pub names: Vec<String>,
}

impl FolderInfo {
    pub fn push(&mut self, name: impl Into<String>) {
        self.names.push(name.into());
    }
}

/// Flag names reported by EXAMINE/SELECT for the selected folder.
#[derive(Debug, Clone, Default)]
pub struct FlagInfo {
    pub names: Vec<String>,
}

impl FlagInfo {
    pub fn push(&mut self, name: impl Into<String>) {
        self.names.push(name.into());
    }
}
