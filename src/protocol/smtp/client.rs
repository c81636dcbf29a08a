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

//! SMTP submission sequencing. The dialect is fixed: 220 greeting, EHLO,
//! AUTH LOGIN, MAIL FROM, RCPT TO per recipient, DATA, multipart body with
//! base64 attachments, terminating dot.

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use log::debug;
use tokio::io::AsyncWriteExt;

use crate::config::{AttachmentSource, OutgoingMessage, Security, SmtpSessionConfig};
use crate::error::{ErrorKind, MailError};
use crate::mime::base64;
use crate::net::{self, Transport};
use crate::protocol::reader::{read_line, write_line};
use crate::report::{Phase, Reporter, StatusEvent};

/// Parsed SMTP response (code + lines).
struct SmtpResponse {
    code: u16,
    lines: Vec<String>,
}

impl SmtpResponse {
    fn message(&self) -> &str {
        self.lines.last().map(|s| s.as_str()).unwrap_or("")
    }
}

/// Read one SMTP response, following `250-` continuation lines until the
/// final `250 ` form.
async fn read_response<T>(stream: &mut T, idle: Duration) -> Result<SmtpResponse, MailError>
where
    T: Transport + ?Sized,
{
    let mut lines = Vec::new();
    loop {
        let line = read_line(stream, idle).await?;
        let text = line.text;
        if let Some(prefix) = text.get(..3) {
            let code: u16 = prefix.parse().unwrap_or(0);
            let continuation = text.as_bytes().get(3) == Some(&b'-');
            let rest = text.get(4..).map(str::trim).unwrap_or("");
            lines.push(rest.to_string());
            debug!("smtp <- {}", text);
            if !continuation {
                return Ok(SmtpResponse { code, lines });
            }
        }
    }
}

/// Gate on the required code; a mismatch becomes the state-specific kind.
async fn expect<T>(
    stream: &mut T,
    idle: Duration,
    code: u16,
    kind: ErrorKind,
) -> Result<SmtpResponse, MailError>
where
    T: Transport + ?Sized,
{
    let resp = read_response(stream, idle).await?;
    if resp.code == code {
        Ok(resp)
    } else {
        Err(MailError::new(
            kind,
            format!("expected {}, got {} {}", code, resp.code, resp.message()),
        ))
    }
}

async fn command<T>(stream: &mut T, line: &str) -> Result<(), MailError>
where
    T: Transport + ?Sized,
{
    debug!("smtp -> {}", line);
    write_line(stream, line).await
}

static BOUNDARY_COUNTER: AtomicU32 = AtomicU32::new(1);

fn next_boundary() -> String {
    let n = BOUNDARY_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("=_postino_{:08x}", n)
}

/// Prefix a leading dot per RFC 5321 so a body line cannot terminate DATA.
fn dot_stuff(line: &str) -> String {
    if line.starts_with('.') {
        format!(".{}", line)
    } else {
        line.to_string()
    }
}

fn priority_block(priority: u8) -> Option<String> {
    let word = match priority {
        1 => "High",
        3 => "Normal",
        5 => "Low",
        _ => return None,
    };
    Some(format!(
        "X-Priority: {}\r\nX-MSMail-Priority: {}\r\nImportance: {}\r\n",
        priority, word, word
    ))
}

fn message_headers(msg: &OutgoingMessage, boundary: &str) -> String {
    let mut headers = String::new();
    if msg.from_name.is_empty() {
        headers.push_str(&format!("From: <{}>\r\n", msg.from_address));
    } else {
        headers.push_str(&format!(
            "From: \"{}\" <{}>\r\n",
            msg.from_name, msg.from_address
        ));
    }
    if !msg.to.is_empty() {
        headers.push_str(&format!("To: {}\r\n", msg.to.join(",")));
    }
    if !msg.cc.is_empty() {
        headers.push_str(&format!("Cc: {}\r\n", msg.cc.join(",")));
    }
    headers.push_str(&format!("Subject: {}\r\n", msg.subject));
    headers.push_str(&format!("Date: {}\r\n", chrono::Utc::now().to_rfc2822()));
    if let Some(block) = msg.priority.and_then(priority_block) {
        headers.push_str(&block);
    }
    headers.push_str("MIME-Version: 1.0\r\n");
    headers.push_str(&format!(
        "Content-Type: multipart/mixed; boundary=\"{}\"\r\n",
        boundary
    ));
    headers
}

fn attachment_headers(filename: &str, mime_type: &str, boundary: &str) -> String {
    format!(
        "--{}\r\nContent-Type: {}; Name=\"{}\"\r\nContent-Disposition: attachment; filename=\"{}\"\r\nContent-Transfer-Encoding: base64\r\n\r\n",
        boundary, mime_type, filename, filename
    )
}

/// Run the full submission dialogue over an established stream. The stream
/// must already be secured (or deliberately plaintext); STARTTLS negotiation
/// lives in `send_mail`.
pub async fn send_session<T, R>(
    stream: &mut T,
    config: &SmtpSessionConfig,
    msg: &OutgoingMessage,
    reporter: &mut R,
) -> Result<(), MailError>
where
    T: Transport + ?Sized,
    R: Reporter + ?Sized,
{
    let idle = config.idle_timeout;
    expect(stream, idle, 220, ErrorKind::ConnectFailed).await?;
    reporter.status(StatusEvent::ok(Phase::Connect, "server ready"));
    submit(stream, config, msg, reporter).await
}

/// EHLO onward: used directly after an implicit-TLS/plain greeting and
/// re-entered after a STARTTLS upgrade.
async fn submit<T, R>(
    stream: &mut T,
    config: &SmtpSessionConfig,
    msg: &OutgoingMessage,
    reporter: &mut R,
) -> Result<(), MailError>
where
    T: Transport + ?Sized,
    R: Reporter + ?Sized,
{
    let idle = config.idle_timeout;

    command(stream, "EHLO localhost").await?;
    expect(stream, idle, 250, ErrorKind::IdentificationRejected).await?;
    reporter.status(StatusEvent::ok(Phase::Identify, "identified"));

    if !config.login.is_empty() {
        command(stream, "AUTH LOGIN").await?;
        expect(stream, idle, 334, ErrorKind::AuthMechanismRejected).await?;
        debug!("smtp -> <login redacted>");
        write_line(stream, &base64::encode(config.login.as_bytes())).await?;
        expect(stream, idle, 334, ErrorKind::CredentialsRejected).await?;
        debug!("smtp -> <password redacted>");
        write_line(stream, &base64::encode(config.password.as_bytes())).await?;
        expect(stream, idle, 235, ErrorKind::CredentialsRejected).await?;
        reporter.status(StatusEvent::ok(Phase::Authenticate, "authenticated"));
    }

    command(stream, &format!("MAIL FROM:<{}>", msg.from_address)).await?;
    expect(stream, idle, 250, ErrorKind::SenderRejected).await?;

    for rcpt in msg.recipients() {
        command(stream, &format!("RCPT TO:<{}>", rcpt)).await?;
        expect(stream, idle, 250, ErrorKind::RecipientRejected).await?;
    }

    command(stream, "DATA").await?;
    expect(stream, idle, 354, ErrorKind::SendBodyFailed).await?;

    let boundary = next_boundary();
    stream
        .write_all(message_headers(msg, &boundary).as_bytes())
        .await?;
    stream.write_all(b"\r\n").await?;
    reporter.status(StatusEvent::ok(Phase::Header, "headers sent"));

    // text part
    stream.write_all(format!("--{}\r\n", boundary).as_bytes()).await?;
    let text_type = if msg.html { "text/html" } else { "text/plain" };
    stream
        .write_all(format!("Content-Type: {}; charset=\"UTF-8\"\r\n\r\n", text_type).as_bytes())
        .await?;
    for line in msg.body.split('\n') {
        let line = line.strip_suffix('\r').unwrap_or(line);
        stream.write_all(dot_stuff(line).as_bytes()).await?;
        stream.write_all(b"\r\n").await?;
    }
    stream.write_all(b"\r\n").await?;
    reporter.status(StatusEvent::ok(Phase::Body, "body sent"));

    for attachment in &msg.attachments {
        reporter.status(StatusEvent::ok(Phase::Attachment, attachment.filename.clone()));
        stream
            .write_all(
                attachment_headers(&attachment.filename, &attachment.mime_type, &boundary)
                    .as_bytes(),
            )
            .await?;
        match &attachment.source {
            AttachmentSource::Memory(data) => {
                let mut src = data.as_slice();
                base64::encode_stream(&mut src, stream).await?;
            }
            AttachmentSource::File(path) => {
                let mut file = tokio::fs::File::open(path)
                    .await
                    .map_err(|e| MailError::new(ErrorKind::StorageUnavailable, e.to_string()))?;
                base64::encode_stream(&mut file, stream).await?;
            }
        }
    }

    stream
        .write_all(format!("--{}--\r\n", boundary).as_bytes())
        .await?;
    stream.write_all(b".\r\n").await?;
    stream.flush().await?;
    expect(stream, idle, 250, ErrorKind::SendBodyFailed).await?;
    reporter.status(StatusEvent::ok(Phase::Finalize, "message accepted"));

    command(stream, "QUIT").await?;
    Ok(())
}

fn connect_error(e: std::io::Error) -> MailError {
    MailError::new(ErrorKind::ConnectFailed, e.to_string())
}

/// Connect per the configured security mode and run one submission.
pub async fn send_mail<R>(
    config: &SmtpSessionConfig,
    msg: &OutgoingMessage,
    reporter: &mut R,
) -> Result<(), MailError>
where
    R: Reporter + ?Sized,
{
    match config.security {
        Security::ImplicitTls => {
            let mut stream = net::connect_implicit_tls(&config.host, config.port)
                .await
                .map_err(connect_error)?;
            let result = send_session(&mut stream, config, msg, reporter).await;
            let _ = stream.shutdown().await;
            result
        }
        Security::None => {
            let mut stream = net::connect_plain(&config.host, config.port)
                .await
                .map_err(connect_error)?;
            let result = send_session(&mut stream, config, msg, reporter).await;
            let _ = stream.shutdown().await;
            result
        }
        Security::StartTls => {
            let mut plain = net::connect_plain(&config.host, config.port)
                .await
                .map_err(connect_error)?;
            let idle = config.idle_timeout;
            expect(&mut plain, idle, 220, ErrorKind::ConnectFailed).await?;
            reporter.status(StatusEvent::ok(Phase::Connect, "server ready"));
            command(&mut plain, "EHLO localhost").await?;
            expect(&mut plain, idle, 250, ErrorKind::IdentificationRejected).await?;
            command(&mut plain, "STARTTLS").await?;
            expect(&mut plain, idle, 220, ErrorKind::ConnectFailed).await?;
            let mut tls = plain
                .upgrade_to_tls(&config.host)
                .await
                .map_err(connect_error)?;
            let result = submit(&mut tls, config, msg, reporter).await;
            let _ = tls.shutdown().await;
            result
        }
    }
}
