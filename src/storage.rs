/*
 * storage.rs
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

//! Storage collaborator: the IMAP engine streams attachment bytes through
//! this boundary and never inspects filesystem error causes beyond
//! "unavailable".

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tokio::io::AsyncWriteExt;

use crate::error::{ErrorKind, MailError};

/// Append-oriented byte sink with lazy file creation.
pub trait Storage {
    type Handle;

    async fn ensure_directory(&mut self, path: &Path) -> Result<(), MailError>;
    async fn open_for_append(&mut self, path: &Path) -> Result<Self::Handle, MailError>;
    async fn write(&mut self, handle: &mut Self::Handle, data: &[u8]) -> Result<(), MailError>;
    async fn close(&mut self, handle: Self::Handle) -> Result<(), MailError>;
    async fn exists(&mut self, path: &Path) -> bool;
}

fn storage_err(e: std::io::Error) -> MailError {
    MailError::new(ErrorKind::StorageUnavailable, e.to_string())
}

/// Storage backed by the local filesystem via tokio::fs.
pub struct FsStorage;

impl Storage for FsStorage {
    type Handle = tokio::fs::File;

    async fn ensure_directory(&mut self, path: &Path) -> Result<(), MailError> {
        tokio::fs::create_dir_all(path).await.map_err(storage_err)
    }

    async fn open_for_append(&mut self, path: &Path) -> Result<Self::Handle, MailError> {
        tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await
            .map_err(storage_err)
    }

    async fn write(&mut self, handle: &mut Self::Handle, data: &[u8]) -> Result<(), MailError> {
        handle.write_all(data).await.map_err(storage_err)
    }

    async fn close(&mut self, mut handle: Self::Handle) -> Result<(), MailError> {
        handle.flush().await.map_err(storage_err)
    }

    async fn exists(&mut self, path: &Path) -> bool {
        tokio::fs::try_exists(path).await.unwrap_or(false)
    }
}

/// In-memory storage for tests and diskless hosts.
#[derive(Default)]
pub struct MemStorage {
    files: HashMap<PathBuf, Vec<u8>>,
    directories: Vec<PathBuf>,
    /// When set, every operation fails with StorageUnavailable.
    pub unavailable: bool,
}

impl MemStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn file(&self, path: impl AsRef<Path>) -> Option<&[u8]> {
        self.files.get(path.as_ref()).map(Vec::as_slice)
    }

    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    fn check(&self) -> Result<(), MailError> {
        if self.unavailable {
            Err(MailError::of(ErrorKind::StorageUnavailable))
        } else {
            Ok(())
        }
    }
}

impl Storage for MemStorage {
    type Handle = PathBuf;

    async fn ensure_directory(&mut self, path: &Path) -> Result<(), MailError> {
        self.check()?;
        if !self.directories.iter().any(|d| d == path) {
            self.directories.push(path.to_path_buf());
        }
        Ok(())
    }

    async fn open_for_append(&mut self, path: &Path) -> Result<Self::Handle, MailError> {
        self.check()?;
        self.files.entry(path.to_path_buf()).or_default();
        Ok(path.to_path_buf())
    }

    async fn write(&mut self, handle: &mut Self::Handle, data: &[u8]) -> Result<(), MailError> {
        self.check()?;
        match self.files.get_mut(handle.as_path()) {
            Some(buf) => {
                buf.extend_from_slice(data);
                Ok(())
            }
            None => Err(MailError::of(ErrorKind::StorageUnavailable)),
        }
    }

    async fn close(&mut self, _handle: Self::Handle) -> Result<(), MailError> {
        self.check()
    }

    async fn exists(&mut self, path: &Path) -> bool {
        self.files.contains_key(path) || self.directories.iter().any(|d| d == path)
    }
}
