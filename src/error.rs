/*
 * error.rs
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

//! Session error taxonomy shared by the SMTP and IMAP engines.

use std::fmt;
use std::io;

/// What went wrong, at protocol granularity. Oversized attachments are a
/// skip policy, not an error, and have no kind here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The network link itself is down.
    TransportUnavailable,
    /// TCP/TLS connect or server greeting failed.
    ConnectFailed,
    /// Unexpected status code or line at a structural step, or a silent server.
    ProtocolResponseInvalid,
    /// HELO/EHLO rejected.
    IdentificationRejected,
    /// AUTH LOGIN not accepted as a mechanism.
    AuthMechanismRejected,
    /// Username or password rejected.
    CredentialsRejected,
    /// MAIL FROM rejected.
    SenderRejected,
    /// One of the RCPT TO recipients rejected.
    RecipientRejected,
    /// DATA or the message body/terminator rejected.
    SendBodyFailed,
    /// IMAP tagged NO/BAD response.
    CommandRejected,
    /// Storage mount/open failure.
    StorageUnavailable,
    /// Idle timeout expired while an attachment download was pending.
    AttachmentTimeout,
}

impl ErrorKind {
    /// Canonical human-readable reason for this kind.
    pub fn reason(self) -> &'static str {
        match self {
            ErrorKind::TransportUnavailable => "network link lost",
            ErrorKind::ConnectFailed => "unable to connect to server",
            ErrorKind::ProtocolResponseInvalid => "no valid server response",
            ErrorKind::IdentificationRejected => "identification failed",
            ErrorKind::AuthMechanismRejected => "authentication is not supported",
            ErrorKind::CredentialsRejected => "login account is not valid",
            ErrorKind::SenderRejected => "sender address rejected",
            ErrorKind::RecipientRejected => "some of the recipients rejected",
            ErrorKind::SendBodyFailed => "sending message body failed",
            ErrorKind::CommandRejected => "command rejected by server",
            ErrorKind::StorageUnavailable => "storage is not available",
            ErrorKind::AttachmentTimeout => "connection timeout",
        }
    }
}

/// Error carried out of a session call: a kind plus a free-text detail.
#[derive(Debug, Clone)]
pub struct MailError {
    pub kind: ErrorKind,
    pub message: String,
}

impl MailError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Error with the kind's canonical reason as its message.
    pub fn of(kind: ErrorKind) -> Self {
        Self::new(kind, kind.reason())
    }
}

impl fmt::Display for MailError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.message == self.kind.reason() {
            write!(f, "{}", self.message)
        } else {
            write!(f, "{}: {}", self.kind.reason(), self.message)
        }
    }
}

impl std::error::Error for MailError {}

impl From<io::Error> for MailError {
    fn from(e: io::Error) -> Self {
        let kind = match e.kind() {
            io::ErrorKind::ConnectionRefused | io::ErrorKind::TimedOut => ErrorKind::ConnectFailed,
            io::ErrorKind::NotConnected
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::UnexpectedEof => ErrorKind::TransportUnavailable,
            _ => ErrorKind::ProtocolResponseInvalid,
        };
        Self::new(kind, e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reason_matches_kind() {
        assert_eq!(
            ErrorKind::CredentialsRejected.reason(),
            "login account is not valid"
        );
        assert_eq!(ErrorKind::AttachmentTimeout.reason(), "connection timeout");
    }

    #[test]
    fn display_avoids_duplicating_canonical_reason() {
        let e = MailError::of(ErrorKind::SenderRejected);
        assert_eq!(e.to_string(), "sender address rejected");
        let e = MailError::new(ErrorKind::CommandRejected, "A0002 NO LOGIN failed");
        assert_eq!(
            e.to_string(),
            "command rejected by server: A0002 NO LOGIN failed"
        );
    }

    #[test]
    fn io_error_maps_to_transport_kinds() {
        let e: MailError = io::Error::new(io::ErrorKind::BrokenPipe, "pipe").into();
        assert_eq!(e.kind, ErrorKind::TransportUnavailable);
        let e: MailError = io::Error::new(io::ErrorKind::ConnectionRefused, "refused").into();
        assert_eq!(e.kind, ErrorKind::ConnectFailed);
    }
}
