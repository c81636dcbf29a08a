/*
 * client.rs
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

//! IMAP session sequencing and response parsing. One command is in flight
//! at a time; each waits for its tagged completion line before the next
//! is issued. Structural failures abort the session; per-message and
//! per-part failures stick to the item and the loop moves on.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use log::{debug, warn};
use tokio::io::AsyncWriteExt;

use crate::config::{ImapSessionConfig, Security};
use crate::error::{ErrorKind, MailError};
use crate::mime::{self, base64, part_header};
use crate::net::{self, Transport};
use crate::protocol::reader::{read_line, read_literal_chunk, write_line};
use crate::report::{Phase, Reporter, StatusEvent};
use crate::store::{BodyPart, Mailbox, MailboxMessage, SearchResult};

/// Chunk size for literal reads; bounds per-read memory.
const LITERAL_CHUNK: usize = 512;

static TAG_COUNTER: AtomicU32 = AtomicU32::new(1);

fn next_tag() -> String {
    let n = TAG_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("A{:04}", n % 10000)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ImapStatus {
    Ok,
    No,
    Bad,
}

/// One parsed response line.
#[derive(Debug, Clone)]
struct ImapLine {
    text: String,
    tag: Option<String>,
    untagged: bool,
    status: Option<ImapStatus>,
    literal: Option<usize>,
}

fn parse_line(text: String, literal: Option<usize>) -> ImapLine {
    let untagged = text.starts_with('*');
    let tag = if untagged {
        None
    } else {
        text.split_whitespace().next().map(str::to_string)
    };
    let after_tag = match text.split_once(' ') {
        Some((_, rest)) => rest,
        None => "",
    };
    let status = if after_tag.starts_with("OK") {
        Some(ImapStatus::Ok)
    } else if after_tag.starts_with("NO") {
        Some(ImapStatus::No)
    } else if after_tag.starts_with("BAD") {
        Some(ImapStatus::Bad)
    } else {
        None
    };
    ImapLine {
        text,
        tag,
        untagged,
        status,
        literal,
    }
}

/// Issue one command and drain its response, handing untagged lines to the
/// callback. Literal blocks are read whole (bounded by their declared size)
/// and appended to the preceding line's callback as a second argument.
/// A tagged NO/BAD becomes CommandRejected after the drain completes.
async fn command<T, F>(
    stream: &mut T,
    idle: Duration,
    cmd: &str,
    redacted: Option<&str>,
    mut on_untagged: F,
) -> Result<(), MailError>
where
    T: Transport + ?Sized,
    F: FnMut(&ImapLine),
{
    let tag = next_tag();
    debug!("imap -> {} {}", tag, redacted.unwrap_or(cmd));
    write_line(stream, &format!("{} {}", tag, cmd)).await?;
    loop {
        let raw = read_line(stream, idle).await?;
        let line = parse_line(raw.text, raw.literal);
        debug!("imap <- {}", line.text);
        if let Some(size) = line.literal {
            // command callers that expect literals use fetch helpers; here
            // we just drain the block to keep the stream consistent
            drain_literal(stream, idle, size).await?;
        }
        if line.tag.as_deref() == Some(tag.as_str()) {
            return match line.status {
                Some(ImapStatus::Ok) => Ok(()),
                _ => Err(MailError::new(ErrorKind::CommandRejected, line.text)),
            };
        }
        if line.untagged {
            on_untagged(&line);
        }
    }
}

async fn drain_literal<T>(stream: &mut T, idle: Duration, size: usize) -> Result<(), MailError>
where
    T: Transport + ?Sized,
{
    let mut remaining = size;
    let mut buf = [0u8; LITERAL_CHUNK];
    while remaining > 0 {
        let n = read_literal_chunk(stream, remaining, &mut buf, idle, false).await?;
        remaining -= n;
    }
    Ok(())
}

/// FETCH variant that returns the literal block, or None when the server
/// answered NO/BAD (a missing part, not a session error).
async fn fetch_literal<T>(
    stream: &mut T,
    idle: Duration,
    cmd: &str,
) -> Result<Option<Vec<u8>>, MailError>
where
    T: Transport + ?Sized,
{
    let tag = next_tag();
    debug!("imap -> {} {}", tag, cmd);
    write_line(stream, &format!("{} {}", tag, cmd)).await?;
    let mut body: Option<Vec<u8>> = None;
    let mut rejected = false;
    loop {
        let raw = read_line(stream, idle).await?;
        let line = parse_line(raw.text, raw.literal);
        debug!("imap <- {}", line.text);
        if let Some(size) = line.literal {
            let mut collected = Vec::with_capacity(size.min(64 * 1024));
            let mut remaining = size;
            let mut buf = [0u8; LITERAL_CHUNK];
            while remaining > 0 {
                let n = read_literal_chunk(stream, remaining, &mut buf, idle, false).await?;
                collected.extend_from_slice(&buf[..n]);
                remaining -= n;
            }
            body = Some(collected);
            continue;
        }
        if line.tag.as_deref() == Some(tag.as_str()) {
            if line.status != Some(ImapStatus::Ok) {
                rejected = true;
            }
            break;
        }
    }
    if rejected {
        return Ok(None);
    }
    Ok(body)
}

fn dotted(path: &[u32]) -> String {
    path.iter()
        .map(u32::to_string)
        .collect::<Vec<_>>()
        .join(".")
}

/// `* LIST (\Flags) "/" name` -> name, unquoting when needed.
fn parse_list_name(text: &str) -> Option<String> {
    let rest = text.strip_prefix("* LIST ")?;
    let after_flags = match rest.find(')') {
        Some(i) => rest.get(i + 1..)?.trim_start(),
        None => rest,
    };
    // skip the hierarchy delimiter token
    let name_part = if let Some(stripped) = after_flags.strip_prefix('"') {
        let close = stripped.find('"')?;
        stripped.get(close + 1..)?.trim_start()
    } else {
        match after_flags.split_once(' ') {
            Some((_, rest)) => rest.trim_start(),
            None => return None,
        }
    };
    let name = if let Some(stripped) = name_part.strip_prefix('"') {
        let close = stripped.find('"')?;
        stripped.get(..close)?
    } else {
        name_part
    };
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

/// EXAMINE untagged lines: FLAGS, EXISTS, UIDNEXT.
fn parse_examine_line(text: &str, mailbox: &mut Mailbox, new_flags: &mut Vec<String>) {
    if let Some(rest) = text.strip_prefix("* FLAGS (") {
        if let Some(end) = rest.find(')') {
            if let Some(inner) = rest.get(..end) {
                for flag in inner.split_whitespace() {
                    new_flags.push(flag.to_string());
                    mailbox.flags.push(flag);
                }
            }
        }
    } else if text.ends_with(" EXISTS") {
        let mut words = text.split_whitespace();
        let _star = words.next();
        if let Some(n) = words.next().and_then(|w| w.parse().ok()) {
            mailbox.total_messages = n;
        }
    } else if let Some(at) = text.find("[UIDNEXT ") {
        let rest = &text[at + "[UIDNEXT ".len()..];
        if let Some(end) = rest.find(']') {
            if let Ok(n) = rest[..end].parse() {
                mailbox.next_uid = n;
            }
        }
    }
}

/// Split the configured criteria into (uid addressing, SEARCH argument
/// string): the bare SEARCH keyword is dropped, a leading UID switches the
/// whole session to UID addressing.
fn build_search(criteria: &str) -> (bool, String) {
    let mut uid = false;
    let mut terms: Vec<&str> = Vec::new();
    for (i, token) in criteria.split_whitespace().enumerate() {
        if i == 0 && token.eq_ignore_ascii_case("UID") {
            uid = true;
            continue;
        }
        if token.eq_ignore_ascii_case("SEARCH") {
            continue;
        }
        terms.push(token);
    }
    (uid, terms.join(" "))
}

/// `* SEARCH 4 8 15` id tokens, ignoring the keywords themselves.
fn parse_search_line(text: &str, result: &mut SearchResult) {
    for token in text.split_whitespace() {
        if token == "*" || token.eq_ignore_ascii_case("SEARCH") || token.eq_ignore_ascii_case("UID")
        {
            continue;
        }
        if let Ok(id) = token.parse() {
            result.push(id);
        }
    }
}

/// Header field slots recognized in the HEADER.FIELDS fetch.
#[derive(Clone, Copy, PartialEq, Eq)]
enum HeaderSlot {
    From,
    To,
    Cc,
    Subject,
    Date,
    MessageId,
    AcceptLanguage,
    ContentLanguage,
    None,
}

/// Parse the fetched header text into the message, appending soft-wrapped
/// continuation lines to the last seen field. The four textual fields get
/// RFC 2047 charset capture and decoding.
fn parse_header_text(text: &str, msg: &mut MailboxMessage) {
    let mut slot = HeaderSlot::None;
    let mut raw: [String; 8] = Default::default();

    for line in text.lines() {
        let trimmed = line.trim_end();
        if trimmed.trim().is_empty() {
            slot = HeaderSlot::None;
            continue;
        }
        let lower = trimmed.trim_start().to_ascii_lowercase();
        let (new_slot, value) = if let Some(v) = strip_field(trimmed, &lower, "from:") {
            (HeaderSlot::From, v)
        } else if let Some(v) = strip_field(trimmed, &lower, "to:") {
            (HeaderSlot::To, v)
        } else if let Some(v) = strip_field(trimmed, &lower, "cc:") {
            (HeaderSlot::Cc, v)
        } else if let Some(v) = strip_field(trimmed, &lower, "subject:") {
            (HeaderSlot::Subject, v)
        } else if let Some(v) = strip_field(trimmed, &lower, "date:") {
            (HeaderSlot::Date, v)
        } else if let Some(v) = strip_field(trimmed, &lower, "message-id:") {
            (HeaderSlot::MessageId, v)
        } else if let Some(v) = strip_field(trimmed, &lower, "accept-language:") {
            (HeaderSlot::AcceptLanguage, v)
        } else if let Some(v) = strip_field(trimmed, &lower, "content-language:") {
            (HeaderSlot::ContentLanguage, v)
        } else {
            // continuation of the previous field
            if slot == HeaderSlot::None {
                continue;
            }
            (slot, trimmed.trim())
        };
        let i = new_slot as usize;
        if !raw[i].is_empty() {
            raw[i].push(' ');
        }
        raw[i].push_str(value);
        slot = new_slot;
    }

    let charset_of = |v: &str| {
        mime::encoded_word_charset(v)
            .unwrap_or("")
            .to_string()
    };
    msg.from_charset = charset_of(&raw[HeaderSlot::From as usize]);
    msg.from = mime::decode_encoded_words(&raw[HeaderSlot::From as usize]);
    msg.to_charset = charset_of(&raw[HeaderSlot::To as usize]);
    msg.to = mime::decode_encoded_words(&raw[HeaderSlot::To as usize]);
    msg.cc_charset = charset_of(&raw[HeaderSlot::Cc as usize]);
    msg.cc = mime::decode_encoded_words(&raw[HeaderSlot::Cc as usize]);
    msg.subject_charset = charset_of(&raw[HeaderSlot::Subject as usize]);
    msg.subject = mime::decode_encoded_words(&raw[HeaderSlot::Subject as usize]);
    msg.date = raw[HeaderSlot::Date as usize].clone();
    msg.message_id = raw[HeaderSlot::MessageId as usize].clone();
    msg.accept_language = raw[HeaderSlot::AcceptLanguage as usize].clone();
    msg.content_language = raw[HeaderSlot::ContentLanguage as usize].clone();
}

fn strip_field<'a>(line: &'a str, lower: &str, name: &str) -> Option<&'a str> {
    if !lower.starts_with(name) {
        return None;
    }
    let start = line.len() - line.trim_start().len();
    line.get(start + name.len()..).map(str::trim)
}

/// Estimated decoded size of a literal that carries line-wrapped base64:
/// strip CRLF overhead at the customary 76-column server wrap, then apply
/// the 4-to-3 ratio.
fn estimate_decoded_size(literal_len: usize) -> usize {
    let overhead = (literal_len / 78) * 2;
    base64::decoded_size_estimate(literal_len.saturating_sub(overhead), 0)
}

const HEADER_FIELDS: &str =
    "BODY.PEEK[HEADER.FIELDS (SUBJECT FROM TO CC DATE MESSAGE-ID ACCEPT-LANGUAGE CONTENT-LANGUAGE)]";

fn fetch_prefix(uid_mode: bool) -> &'static str {
    if uid_mode {
        "UID FETCH"
    } else {
        "FETCH"
    }
}

/// Pre-order MIME traversal: probe `path.MIME`, descend into multiparts,
/// advance across leaves, pop on a missing part.
async fn discover_parts<T, R>(
    stream: &mut T,
    config: &ImapSessionConfig,
    uid_mode: bool,
    msg: &mut MailboxMessage,
    reporter: &mut R,
) -> Result<(), MailError>
where
    T: Transport + ?Sized,
    R: Reporter + ?Sized,
{
    let mut path: Vec<u32> = vec![1];
    loop {
        let path_str = dotted(&path);
        let cmd = format!(
            "{} {} BODY.PEEK[{}.MIME]",
            fetch_prefix(uid_mode),
            msg.id,
            path_str
        );
        let header = fetch_literal(stream, config.idle_timeout, &cmd).await?;
        let mut probe = BodyPart::new(path_str.clone());
        let mut updates = Vec::new();
        if let Some(bytes) = &header {
            let text = String::from_utf8_lossy(bytes);
            for line in text.lines() {
                updates.push(part_header::apply_header_line(line, &mut probe));
            }
        }
        if probe.content_type.is_empty() {
            // no part here: pop back to the parent and try its next sibling
            if path.len() == 1 {
                break;
            }
            path.pop();
            if let Some(last) = path.last_mut() {
                *last += 1;
            }
            continue;
        }
        let multipart = probe.is_multipart();
        for update in &updates {
            if update.became_attachment {
                msg.attachment_count += 1;
                reporter.status(StatusEvent::ok(
                    Phase::Attachment,
                    format!(
                        "{} ({})",
                        if probe.filename.is_empty() {
                            probe.name.as_str()
                        } else {
                            probe.filename.as_str()
                        },
                        probe.content_type
                    ),
                ));
            }
            if let Some(size) = update.declared_size {
                msg.total_attach_size += size;
            }
        }
        *msg.part_mut(&path_str) = probe;
        if multipart {
            path.push(1);
        } else if let Some(last) = path.last_mut() {
            *last += 1;
        }
    }
    Ok(())
}

/// Should this part's text be fetched into the accumulator?
fn is_selected_body(part: &BodyPart, config: &ImapSessionConfig) -> bool {
    if part.is_attachment() {
        return false;
    }
    let lower = part.content_type.to_ascii_lowercase();
    (lower.starts_with("text/plain") && config.fetch_text)
        || (lower.starts_with("text/html") && config.fetch_html)
}

/// Streamed fetch of one part's content. Text parts accumulate decoded
/// bytes up to the buffer cap; attachment parts stream decoded bytes to
/// storage, reporting 5%-granularity progress.
async fn fetch_part_content<T, St, R>(
    stream: &mut T,
    storage: &mut St,
    config: &ImapSessionConfig,
    uid_mode: bool,
    msg_id: u32,
    part: &mut BodyPart,
    total_expected: usize,
    downloaded_so_far: usize,
    save_dir: Option<&PathBuf>,
    reporter: &mut R,
) -> Result<usize, MailError>
where
    T: Transport + ?Sized,
    St: crate::storage::Storage,
    R: Reporter + ?Sized,
{
    let tag = next_tag();
    let cmd = format!(
        "{} {} BODY.PEEK[{}]",
        fetch_prefix(uid_mode),
        msg_id,
        part.path
    );
    debug!("imap -> {} {}", tag, cmd);
    write_line(stream, &format!("{} {}", tag, cmd)).await?;

    let is_attachment = part.is_attachment();
    let base64_encoded = part.transfer_encoding == "base64";
    let mut handle: Option<St::Handle> = None;
    let mut delivered = 0usize;
    let mut last_percent = 0usize;
    let idle = config.idle_timeout;

    let mut rejected = false;
    loop {
        let raw = read_line(stream, idle).await?;
        let line = parse_line(raw.text, raw.literal);
        if let Some(size) = line.literal {
            let estimated = if part.declared_size > 0 {
                part.declared_size
            } else {
                estimate_decoded_size(size)
            };
            let total = if total_expected > 0 {
                total_expected
            } else {
                estimated
            };
            let mut remaining = size;
            let mut chunk = [0u8; LITERAL_CHUNK];
            let mut line_buf: Vec<u8> = Vec::new();
            while remaining > 0 {
                let n = read_literal_chunk(stream, remaining, &mut chunk, idle, is_attachment)
                    .await?;
                remaining -= n;
                let mut decoded: Vec<u8> = Vec::new();
                if base64_encoded {
                    line_buf.extend_from_slice(&chunk[..n]);
                    while let Some(pos) = line_buf.iter().position(|&b| b == b'\n') {
                        let fragment: Vec<u8> = line_buf.drain(..=pos).collect();
                        if let Some(bytes) = base64::decode_fragment(&fragment) {
                            decoded.extend_from_slice(&bytes);
                        }
                    }
                    if remaining == 0 {
                        if let Some(bytes) = base64::decode_fragment(&line_buf) {
                            decoded.extend_from_slice(&bytes);
                        }
                        line_buf.clear();
                    }
                } else {
                    decoded.extend_from_slice(&chunk[..n]);
                }
                if decoded.is_empty() {
                    continue;
                }
                delivered += decoded.len();
                part.downloaded_size += decoded.len();
                if is_attachment {
                    if let Some(dir) = save_dir {
                        if handle.is_none() && !part.sink_opened {
                            storage.ensure_directory(dir).await?;
                            let filename = if part.filename.is_empty() {
                                &part.name
                            } else {
                                &part.filename
                            };
                            let file_path = dir.join(filename);
                            handle = Some(storage.open_for_append(&file_path).await?);
                            part.sink_opened = true;
                        }
                        if let Some(h) = handle.as_mut() {
                            storage.write(h, &decoded).await?;
                        }
                    }
                    if config.download_report && total > 0 {
                        let percent =
                            ((downloaded_so_far + delivered) * 100 / total).min(100);
                        if percent / 5 > last_percent / 5 {
                            last_percent = percent;
                            reporter.status(StatusEvent::ok(
                                Phase::Download,
                                format!("{} {}%", part.filename, percent),
                            ));
                        }
                    }
                } else {
                    let text = String::from_utf8_lossy(&decoded);
                    part.push_text(&text, config.message_buffer_cap);
                }
            }
            continue;
        }
        if line.tag.as_deref() == Some(tag.as_str()) {
            if line.status != Some(ImapStatus::Ok) {
                rejected = true;
            }
            break;
        }
    }

    if let Some(h) = handle.take() {
        storage.close(h).await?;
    }
    if rejected {
        part.set_error(ErrorKind::CommandRejected.reason());
    }
    Ok(delivered)
}

/// Retrieve one message: headers, then (unless header-only) the MIME tree
/// and selected contents. Per-part failures are recorded and the message
/// continues; a timeout mid-download fails the whole message.
async fn fetch_message<T, St, R>(
    stream: &mut T,
    storage: &mut St,
    config: &ImapSessionConfig,
    uid_mode: bool,
    msg: &mut MailboxMessage,
    reporter: &mut R,
) -> Result<(), MailError>
where
    T: Transport + ?Sized,
    St: crate::storage::Storage,
    R: Reporter + ?Sized,
{
    msg.reset_error();

    let cmd = format!("{} {} {}", fetch_prefix(uid_mode), msg.id, HEADER_FIELDS);
    let header = fetch_literal(stream, config.idle_timeout, &cmd).await?;
    match header {
        Some(bytes) => {
            parse_header_text(&String::from_utf8_lossy(&bytes), msg);
            reporter.status(StatusEvent::ok(Phase::Header, format!("message {}", msg.id)));
        }
        None => {
            msg.set_error(ErrorKind::CommandRejected.reason());
            reporter.status(StatusEvent::failed(
                Phase::Header,
                format!("message {}: header fetch rejected", msg.id),
            ));
            return Ok(());
        }
    }

    if config.header_only {
        return Ok(());
    }

    discover_parts(stream, config, uid_mode, msg, reporter).await?;

    let save_dir = config
        .save_path
        .as_ref()
        .map(|base| base.join(msg.id.to_string()));
    let part_count = msg.parts.len();
    let mut downloaded = 0usize;

    for i in 0..part_count {
        let is_last = i + 1 == part_count;
        let mut part = std::mem::take(&mut msg.parts[i]);
        let outcome = if part.is_attachment() {
            if !config.download_attachments || save_dir.is_none() {
                Ok(0)
            } else if part.declared_size > config.attachment_size_limit {
                // over the ceiling: never opened, but the declared size still
                // rolls into the total when this is the last part, so sibling
                // percentages stay consistent
                reporter.status(StatusEvent::ok(
                    Phase::Download,
                    format!("{} skipped (size limit)", part.filename),
                ));
                if is_last {
                    msg.downloaded_bytes += part.declared_size;
                }
                Ok(0)
            } else {
                fetch_part_content(
                    stream,
                    storage,
                    config,
                    uid_mode,
                    msg.id,
                    &mut part,
                    msg.total_attach_size,
                    downloaded,
                    save_dir.as_ref(),
                    reporter,
                )
                .await
            }
        } else if is_selected_body(&part, config) {
            let r = fetch_part_content(
                stream,
                storage,
                config,
                uid_mode,
                msg.id,
                &mut part,
                0,
                0,
                None,
                reporter,
            )
            .await;
            if r.is_ok() {
                reporter.status(StatusEvent::ok(
                    Phase::Body,
                    format!("message {} part {}", msg.id, part.path),
                ));
            }
            r
        } else {
            Ok(0)
        };
        match outcome {
            Ok(n) => {
                if part.is_attachment() {
                    downloaded += n;
                    msg.downloaded_bytes += n;
                }
                msg.parts[i] = part;
            }
            Err(e) => {
                part.set_error(e.to_string());
                msg.parts[i] = part;
                msg.set_error(e.to_string());
                warn!("message {} part fetch failed: {}", msg.id, e);
                if e.kind == ErrorKind::TransportUnavailable {
                    return Err(e);
                }
                // timeouts and storage faults fail this message only
                return Ok(());
            }
        }
    }
    Ok(())
}

/// Run a full retrieval session over an established stream, populating the
/// mailbox. LOGOUT is attempted whenever the transport is still usable.
pub async fn read_mail_session<T, St, R>(
    stream: &mut T,
    config: &ImapSessionConfig,
    mailbox: &mut Mailbox,
    storage: &mut St,
    reporter: &mut R,
) -> Result<(), MailError>
where
    T: Transport + ?Sized,
    St: crate::storage::Storage,
    R: Reporter + ?Sized,
{
    let idle = config.idle_timeout;

    // greeting
    let greeting = read_line(stream, idle).await?;
    if !greeting.text.starts_with("* OK") {
        return Err(MailError::new(ErrorKind::ConnectFailed, greeting.text));
    }
    reporter.status(StatusEvent::ok(Phase::Connect, "server ready"));

    command(
        stream,
        idle,
        &format!("LOGIN {} {}", config.login, config.password),
        Some("LOGIN <redacted>"),
        |_| {},
    )
    .await
    .map_err(|e| match e.kind {
        ErrorKind::CommandRejected => MailError::new(ErrorKind::CredentialsRejected, e.message),
        _ => e,
    })?;
    reporter.status(StatusEvent::ok(Phase::Login, "logged in"));

    // LIST is skipped entirely when an explicit fetch id is configured
    if config.fetch_uid.is_none() {
        let mut names: Vec<String> = Vec::new();
        command(stream, idle, "LIST \"\" \"*\"", None, |line| {
            if let Some(name) = parse_list_name(&line.text) {
                names.push(name);
            }
        })
        .await?;
        for name in names {
            reporter.status(StatusEvent::ok(Phase::List, name.clone()));
            mailbox.folders.push(name);
        }
    }

    let mut new_flags: Vec<String> = Vec::new();
    {
        let mailbox_ref = &mut *mailbox;
        let flags_ref = &mut new_flags;
        command(
            stream,
            idle,
            &format!("EXAMINE \"{}\"", config.folder),
            None,
            |line| parse_examine_line(&line.text, mailbox_ref, flags_ref),
        )
        .await?;
    }
    for flag in new_flags {
        reporter.status(StatusEvent::ok(Phase::Select, flag));
    }
    reporter.status(StatusEvent::ok(
        Phase::Select,
        format!(
            "{} selected, {} messages",
            config.folder, mailbox.total_messages
        ),
    ));

    // addressing mode and target ids
    let mut ids: Vec<u32> = Vec::new();
    let uid_mode;
    if let Some(uid) = config.fetch_uid {
        uid_mode = true;
        ids.push(uid);
    } else if !config.search_criteria.is_empty() {
        let (uid, terms) = build_search(&config.search_criteria);
        uid_mode = uid;
        let mut result = SearchResult::new(config.search_limit, config.recent_sort);
        let search_cmd = if uid {
            format!("UID SEARCH {}", terms)
        } else {
            format!("SEARCH {}", terms)
        };
        {
            let result_ref = &mut result;
            command(stream, idle, &search_cmd, None, |line| {
                if line.text.starts_with("* SEARCH") {
                    parse_search_line(&line.text, result_ref);
                }
            })
            .await?;
        }
        result.finalize();
        reporter.status(StatusEvent::ok(
            Phase::Search,
            format!("{} message(s) matched", result.len()),
        ));
        ids.extend_from_slice(result.ids());
    } else {
        // no criteria: just the most recent message by sequence number
        uid_mode = false;
        if mailbox.total_messages > 0 {
            ids.push(mailbox.total_messages);
        }
    }
    mailbox.uid_addressed = uid_mode;

    for id in ids {
        let mut msg = MailboxMessage::new(id, uid_mode);
        match fetch_message(stream, storage, config, uid_mode, &mut msg, reporter).await {
            Ok(()) => {
                mailbox.messages.push(msg);
            }
            Err(e) => {
                // transport gone: keep what we have and abort the session
                msg.set_error(e.to_string());
                mailbox.messages.push(msg);
                return Err(e);
            }
        }
    }

    command(stream, idle, "LOGOUT", None, |_| {}).await?;
    reporter.status(StatusEvent::ok(Phase::Logout, "logged out"));
    Ok(())
}

fn connect_error(e: std::io::Error) -> MailError {
    MailError::new(ErrorKind::ConnectFailed, e.to_string())
}

/// Connect per the configured security mode and run one retrieval session.
pub async fn read_mail<St, R>(
    config: &ImapSessionConfig,
    mailbox: &mut Mailbox,
    storage: &mut St,
    reporter: &mut R,
) -> Result<(), MailError>
where
    St: crate::storage::Storage,
    R: Reporter + ?Sized,
{
    match config.security {
        Security::ImplicitTls => {
            let mut stream = net::connect_implicit_tls(&config.host, config.port)
                .await
                .map_err(connect_error)?;
            let result = read_mail_session(&mut stream, config, mailbox, storage, reporter).await;
            let _ = stream.shutdown().await;
            result
        }
        Security::None | Security::StartTls => {
            // IMAP STARTTLS is not negotiated by this engine; plaintext
            // sessions run as-is
            let mut stream = net::connect_plain(&config.host, config.port)
                .await
                .map_err(connect_error)?;
            let result = read_mail_session(&mut stream, config, mailbox, storage, reporter).await;
            let _ = stream.shutdown().await;
            result
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_parsing() {
        let line = parse_line("A0001 OK LOGIN completed".to_string(), None);
        assert_eq!(line.tag.as_deref(), Some("A0001"));
        assert_eq!(line.status, Some(ImapStatus::Ok));
        assert!(!line.untagged);

        let line = parse_line("* 12 EXISTS".to_string(), None);
        assert!(line.untagged);
        assert_eq!(line.status, None);

        let line = parse_line("A0002 NO LOGIN failed".to_string(), None);
        assert_eq!(line.status, Some(ImapStatus::No));

        let line = parse_line("A0003 BAD could not parse command".to_string(), None);
        assert_eq!(line.status, Some(ImapStatus::Bad));
    }

    #[test]
    fn search_command_construction() {
        let (uid, terms) = build_search("UID SEARCH UNSEEN SINCE 1-Jan-2026");
        assert!(uid);
        assert_eq!(terms, "UNSEEN SINCE 1-Jan-2026");

        let (uid, terms) = build_search("SEARCH ALL");
        assert!(!uid);
        assert_eq!(terms, "ALL");

        let (uid, terms) = build_search("FROM \"anna\"");
        assert!(!uid);
        assert_eq!(terms, "FROM \"anna\"");
    }

    #[test]
    fn search_line_ids() {
        let mut r = SearchResult::new(10, false);
        parse_search_line("* SEARCH 4 8 15 16", &mut r);
        r.finalize();
        assert_eq!(r.ids(), &[4, 8, 15, 16]);
    }

    #[test]
    fn list_name_extraction() {
        assert_eq!(
            parse_list_name("* LIST (\\HasNoChildren) \"/\" \"INBOX\""),
            Some("INBOX".to_string())
        );
        assert_eq!(
            parse_list_name("* LIST (\\Noselect) \"/\" Archive/2026"),
            Some("Archive/2026".to_string())
        );
        assert_eq!(parse_list_name("* STATUS whatever"), None);
    }

    #[test]
    fn examine_lines() {
        let mut mailbox = Mailbox::new();
        let mut flags = Vec::new();
        parse_examine_line("* FLAGS (\\Seen \\Answered \\Deleted)", &mut mailbox, &mut flags);
        parse_examine_line("* 25 EXISTS", &mut mailbox, &mut flags);
        parse_examine_line("* OK [UIDNEXT 4392] Predicted next UID", &mut mailbox, &mut flags);
        assert_eq!(flags, ["\\Seen", "\\Answered", "\\Deleted"]);
        assert_eq!(mailbox.total_messages, 25);
        assert_eq!(mailbox.next_uid, 4392);
    }

    #[test]
    fn header_text_with_continuation_and_charset() {
        let text = "Subject: =?UTF-8?B?SGVsbG8=?=\r\n world\r\nFrom: Anna <anna@example.org>\r\nDate: Mon, 5 Jan 2026 10:00:00 +0000\r\nMessage-Id: <x@y>\r\n\r\n";
        let mut msg = MailboxMessage::new(1, true);
        parse_header_text(text, &mut msg);
        assert_eq!(msg.subject, "Hello world");
        assert_eq!(msg.subject_charset, "UTF-8");
        assert_eq!(msg.from, "Anna <anna@example.org>");
        assert_eq!(msg.from_charset, "");
        assert_eq!(msg.date, "Mon, 5 Jan 2026 10:00:00 +0000");
        assert_eq!(msg.message_id, "<x@y>");
    }

    #[test]
    fn decoded_size_estimation_strips_line_overhead() {
        // 780 literal bytes at 76+CRLF columns: 10 lines of overhead
        let est = estimate_decoded_size(780);
        assert_eq!(est, (780 - 20) / 4 * 3);
    }
}
