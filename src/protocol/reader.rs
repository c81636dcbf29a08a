/*
 * reader.rs
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

//! Response line reading shared by both engines: byte-stream to trimmed
//! lines, literal-length capture, idle-timeout classification.

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::time::timeout;

use crate::error::{ErrorKind, MailError};
use crate::mime::literal_length;
use crate::net::Transport;

/// One protocol line, trimmed of CR/LF and surrounding whitespace. When the
/// raw line ends in `{N}`, `literal` carries the declared length of the
/// literal block that follows.
#[derive(Debug, Clone)]
pub struct Line {
    pub text: String,
    pub literal: Option<usize>,
}

/// Classify an expired idle timeout. Link state wins; an in-flight download
/// is the next most specific; otherwise the server just went silent.
pub fn timeout_error(link_up: bool, download_pending: bool) -> MailError {
    if !link_up {
        MailError::of(ErrorKind::TransportUnavailable)
    } else if download_pending {
        MailError::of(ErrorKind::AttachmentTimeout)
    } else {
        MailError::new(ErrorKind::ProtocolResponseInvalid, "no server response")
    }
}

/// Read one `\n`-terminated line, byte at a time, bounded by the idle
/// timeout per byte.
pub async fn read_line<T>(stream: &mut T, idle: Duration) -> Result<Line, MailError>
where
    T: Transport + ?Sized,
{
    let mut raw: Vec<u8> = Vec::with_capacity(128);
    let mut byte = [0u8; 1];
    loop {
        let n = match timeout(idle, stream.read(&mut byte)).await {
            Ok(result) => result?,
            Err(_) => return Err(timeout_error(stream.is_connected(), false)),
        };
        if n == 0 {
            return Err(MailError::new(
                ErrorKind::TransportUnavailable,
                "connection closed by server",
            ));
        }
        if byte[0] == b'\n' {
            break;
        }
        raw.push(byte[0]);
    }
    let text = String::from_utf8_lossy(&raw);
    let literal = literal_length(&text);
    Ok(Line {
        text: text.trim().to_string(),
        literal,
    })
}

/// Read the next chunk of a literal block, up to `buf.len()` bytes and never
/// past `remaining`. Returns the byte count; the caller loops and may await
/// storage writes between chunks. `download_pending` selects the timeout
/// reason.
pub async fn read_literal_chunk<T>(
    stream: &mut T,
    remaining: usize,
    buf: &mut [u8],
    idle: Duration,
    download_pending: bool,
) -> Result<usize, MailError>
where
    T: Transport + ?Sized,
{
    if remaining == 0 || buf.is_empty() {
        return Ok(0);
    }
    let want = remaining.min(buf.len());
    let n = match timeout(idle, stream.read(&mut buf[..want])).await {
        Ok(result) => result?,
        Err(_) => return Err(timeout_error(stream.is_connected(), download_pending)),
    };
    if n == 0 {
        return Err(MailError::new(
            ErrorKind::TransportUnavailable,
            "connection closed during literal",
        ));
    }
    Ok(n)
}

/// Write one command line with CRLF and flush.
pub async fn write_line<T>(stream: &mut T, line: &str) -> Result<(), MailError>
where
    T: Transport + ?Sized,
{
    stream.write_all(line.as_bytes()).await?;
    stream.write_all(b"\r\n").await?;
    stream.flush().await?;
    Ok(())
}
