/*
 * smtp_session.rs
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

//! Scripted submission dialogues over an in-process duplex transport.

use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream};

use postino::{
    send_session, AttachmentToSend, ErrorKind, OutgoingMessage, Phase, Reporter,
    SmtpSessionConfig, StatusEvent,
};

#[derive(Default)]
struct RecordingReporter {
    events: Vec<StatusEvent>,
}

impl Reporter for RecordingReporter {
    fn status(&mut self, event: StatusEvent) {
        self.events.push(event);
    }
}

impl RecordingReporter {
    fn phases(&self) -> Vec<Phase> {
        self.events.iter().map(|e| e.phase).collect()
    }
}

fn config() -> SmtpSessionConfig {
    let mut c = SmtpSessionConfig::new("mail.example.org", 587);
    c.login = "anna".to_string();
    c.password = "secret".to_string();
    c.idle_timeout = Duration::from_secs(2);
    c
}

async fn read_cmd(s: &mut BufReader<DuplexStream>) -> String {
    let mut line = String::new();
    s.read_line(&mut line).await.unwrap();
    line.trim_end().to_string()
}

async fn reply(s: &mut BufReader<DuplexStream>, text: &str) {
    s.get_mut().write_all(text.as_bytes()).await.unwrap();
}

/// Drive the LOGIN exchange: two 334 challenges, then 235.
async fn accept_auth(s: &mut BufReader<DuplexStream>) {
    let cmd = read_cmd(s).await;
    assert_eq!(cmd, "AUTH LOGIN");
    reply(s, "334 VXNlcm5hbWU6\r\n").await;
    let user = read_cmd(s).await;
    assert_eq!(user, "YW5uYQ==");
    reply(s, "334 UGFzc3dvcmQ6\r\n").await;
    let _pass = read_cmd(s).await;
    reply(s, "235 2.7.0 accepted\r\n").await;
}

/// Collect the DATA payload up to (excluding) the terminating dot.
async fn collect_data(s: &mut BufReader<DuplexStream>) -> String {
    let mut payload = String::new();
    loop {
        let line = read_cmd(s).await;
        if line == "." {
            return payload;
        }
        payload.push_str(&line);
        payload.push('\n');
    }
}

#[tokio::test]
async fn full_submission_with_attachment_and_priority() {
    let _ = env_logger::builder().is_test(true).try_init();
    let (mut client, server) = tokio::io::duplex(64 * 1024);

    let server_task = tokio::spawn(async move {
        let mut s = BufReader::new(server);
        reply(&mut s, "220 mail.example.org ESMTP\r\n").await;
        assert!(read_cmd(&mut s).await.starts_with("EHLO"));
        reply(&mut s, "250-mail.example.org\r\n250 AUTH LOGIN\r\n").await;
        accept_auth(&mut s).await;
        assert_eq!(read_cmd(&mut s).await, "MAIL FROM:<anna@example.org>");
        reply(&mut s, "250 ok\r\n").await;
        assert_eq!(read_cmd(&mut s).await, "RCPT TO:<bob@example.org>");
        reply(&mut s, "250 ok\r\n").await;
        assert_eq!(read_cmd(&mut s).await, "DATA");
        reply(&mut s, "354 go ahead\r\n").await;
        let payload = collect_data(&mut s).await;
        reply(&mut s, "250 2.0.0 queued\r\n").await;
        assert_eq!(read_cmd(&mut s).await, "QUIT");
        payload
    });

    let mut msg = OutgoingMessage::new("anna@example.org");
    msg.from_name = "Anna".to_string();
    msg.to.push("bob@example.org".to_string());
    msg.subject = "quarterly report".to_string();
    msg.body = "see attached\n.hidden line\n".to_string();
    msg.priority = Some(1);
    msg.attachments.push(AttachmentToSend::from_memory(
        "report.bin",
        "application/octet-stream",
        b"ABCDEF".to_vec(),
    ));

    let mut reporter = RecordingReporter::default();
    send_session(&mut client, &config(), &msg, &mut reporter)
        .await
        .unwrap();

    let payload = server_task.await.unwrap();
    assert!(payload.contains("From: \"Anna\" <anna@example.org>"));
    assert!(payload.contains("To: bob@example.org"));
    assert!(payload.contains("Subject: quarterly report"));
    assert!(payload.contains("X-Priority: 1"));
    assert!(payload.contains("X-MSMail-Priority: High"));
    // dot stuffing kept the body line from terminating DATA
    assert!(payload.contains("..hidden line"));
    // base64 of "ABCDEF"
    assert!(payload.contains("QUJDREVG"));
    assert!(payload.contains("Content-Disposition: attachment; filename=\"report.bin\""));
    assert!(payload.contains("--\n") || payload.ends_with("--"));

    let phases = reporter.phases();
    assert!(phases.contains(&Phase::Connect));
    assert!(phases.contains(&Phase::Identify));
    assert!(phases.contains(&Phase::Authenticate));
    assert!(phases.contains(&Phase::Attachment));
    assert!(phases.contains(&Phase::Finalize));
}

#[tokio::test]
async fn auth_is_skipped_without_credentials() {
    let (mut client, server) = tokio::io::duplex(16 * 1024);

    let server_task = tokio::spawn(async move {
        let mut s = BufReader::new(server);
        reply(&mut s, "220 relay ready\r\n").await;
        assert!(read_cmd(&mut s).await.starts_with("EHLO"));
        reply(&mut s, "250 relay\r\n").await;
        // straight to the envelope, no AUTH
        assert_eq!(read_cmd(&mut s).await, "MAIL FROM:<a@example.org>");
        reply(&mut s, "250 ok\r\n").await;
        assert_eq!(read_cmd(&mut s).await, "RCPT TO:<b@example.org>");
        reply(&mut s, "250 ok\r\n").await;
        assert_eq!(read_cmd(&mut s).await, "DATA");
        reply(&mut s, "354 go\r\n").await;
        let _ = collect_data(&mut s).await;
        reply(&mut s, "250 queued\r\n").await;
        assert_eq!(read_cmd(&mut s).await, "QUIT");
    });

    let mut c = config();
    c.login.clear();
    c.password.clear();
    let mut msg = OutgoingMessage::new("a@example.org");
    msg.to.push("b@example.org".to_string());
    msg.body = "hi".to_string();

    let mut reporter = RecordingReporter::default();
    send_session(&mut client, &c, &msg, &mut reporter)
        .await
        .unwrap();
    server_task.await.unwrap();

    assert!(!reporter.phases().contains(&Phase::Authenticate));
}

#[tokio::test]
async fn rejected_recipient_reports_recipient_kind() {
    let (mut client, server) = tokio::io::duplex(16 * 1024);

    tokio::spawn(async move {
        let mut s = BufReader::new(server);
        reply(&mut s, "220 ready\r\n").await;
        let _ = read_cmd(&mut s).await;
        reply(&mut s, "250 ok\r\n").await;
        accept_auth(&mut s).await;
        let _ = read_cmd(&mut s).await;
        reply(&mut s, "250 ok\r\n").await;
        let _ = read_cmd(&mut s).await;
        reply(&mut s, "550 5.1.1 no such user\r\n").await;
    });

    let mut msg = OutgoingMessage::new("anna@example.org");
    msg.to.push("nobody@example.org".to_string());

    let mut reporter = RecordingReporter::default();
    let err = send_session(&mut client, &config(), &msg, &mut reporter)
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::RecipientRejected);
    assert!(err.message.contains("550"));
}

#[tokio::test]
async fn rejection_after_body_is_send_body_failed() {
    let (mut client, server) = tokio::io::duplex(16 * 1024);

    tokio::spawn(async move {
        let mut s = BufReader::new(server);
        reply(&mut s, "220 ready\r\n").await;
        let _ = read_cmd(&mut s).await;
        reply(&mut s, "250 ok\r\n").await;
        accept_auth(&mut s).await;
        let _ = read_cmd(&mut s).await;
        reply(&mut s, "250 ok\r\n").await;
        let _ = read_cmd(&mut s).await;
        reply(&mut s, "250 ok\r\n").await;
        assert_eq!(read_cmd(&mut s).await, "DATA");
        reply(&mut s, "354 go\r\n").await;
        let _ = collect_data(&mut s).await;
        reply(&mut s, "554 5.7.1 message rejected\r\n").await;
    });

    let mut msg = OutgoingMessage::new("anna@example.org");
    msg.to.push("bob@example.org".to_string());
    msg.body = "hello".to_string();

    let mut reporter = RecordingReporter::default();
    let err = send_session(&mut client, &config(), &msg, &mut reporter)
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::SendBodyFailed);
}

#[tokio::test]
async fn bad_credentials_report_credentials_kind() {
    let (mut client, server) = tokio::io::duplex(16 * 1024);

    tokio::spawn(async move {
        let mut s = BufReader::new(server);
        reply(&mut s, "220 ready\r\n").await;
        let _ = read_cmd(&mut s).await;
        reply(&mut s, "250 ok\r\n").await;
        assert_eq!(read_cmd(&mut s).await, "AUTH LOGIN");
        reply(&mut s, "334 VXNlcm5hbWU6\r\n").await;
        let _ = read_cmd(&mut s).await;
        reply(&mut s, "334 UGFzc3dvcmQ6\r\n").await;
        let _ = read_cmd(&mut s).await;
        reply(&mut s, "535 5.7.8 authentication failed\r\n").await;
    });

    let msg = OutgoingMessage::new("anna@example.org");
    let mut reporter = RecordingReporter::default();
    let err = send_session(&mut client, &config(), &msg, &mut reporter)
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::CredentialsRejected);
}
