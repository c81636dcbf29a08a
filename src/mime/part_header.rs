/*
 * part_header.rs
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

//! Incremental parser for one MIME part's header block, fed line by line
//! out of BODY.PEEK[n.MIME] fetch responses.

use crate::store::{BodyPart, Disposition};

/// Counter-relevant facts discovered on one header line. The caller rolls
/// these into the owning message's totals, so each is reported exactly once
/// per part.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PartHeaderUpdate {
    pub became_attachment: bool,
    pub declared_size: Option<usize>,
}

/// Declared byte length of the next literal block: the last `{digits}`
/// sequence on the line.
pub fn literal_length(line: &str) -> Option<usize> {
    let open = line.rfind('{')?;
    let rest = line.get(open + 1..)?;
    let close = rest.find('}')?;
    let digits = rest.get(..close)?;
    if digits.is_empty() {
        return None;
    }
    digits.parse().ok()
}

/// Value of `key=` on the line, quoted or bare. Bare values end at ';',
/// '"' or whitespace. Everything is bounds-checked slicing; a truncated
/// line yields None rather than a partial value.
fn param_value<'a>(line: &'a str, lower: &str, key: &str) -> Option<&'a str> {
    let at = lower.find(key)?;
    let start = at + key.len();
    let rest = line.get(start..)?;
    if let Some(quoted) = rest.strip_prefix('"') {
        let end = quoted.find('"')?;
        quoted.get(..end)
    } else {
        let end = rest
            .find(|c: char| c == ';' || c == '"' || c.is_whitespace())
            .unwrap_or(rest.len());
        let value = rest.get(..end)?;
        if value.is_empty() {
            None
        } else {
            Some(value)
        }
    }
}

/// Value of a `Header-Name:` line, up to the first ';'.
fn field_value<'a>(line: &'a str, lower: &str, name: &str) -> Option<&'a str> {
    if !lower.starts_with(name) {
        return None;
    }
    let rest = line.get(name.len()..)?;
    let end = rest.find(';').unwrap_or(rest.len());
    Some(rest.get(..end)?.trim())
}

/// Apply one header line to the part being assembled. Recognition is
/// case-insensitive and tolerant of parameters folded onto later lines.
pub fn apply_header_line(line: &str, part: &mut BodyPart) -> PartHeaderUpdate {
    let line = line.trim();
    let lower = line.to_ascii_lowercase();
    let mut update = PartHeaderUpdate::default();

    if let Some(value) = field_value(line, &lower, "content-type:") {
        if part.content_type.is_empty() {
            part.content_type = value.to_string();
        }
    }
    if let Some(value) = field_value(line, &lower, "content-transfer-encoding:") {
        part.transfer_encoding = value.to_ascii_lowercase();
    }
    if let Some(value) = field_value(line, &lower, "content-description:") {
        part.description = value.to_string();
    }
    if let Some(value) = field_value(line, &lower, "content-disposition:") {
        if value.eq_ignore_ascii_case("attachment") && part.disposition != Disposition::Attachment {
            part.disposition = Disposition::Attachment;
            update.became_attachment = true;
        }
    }

    if let Some(value) = param_value(line, &lower, "charset=") {
        if part.charset.is_empty() {
            part.charset = value.to_string();
        }
    }
    if let Some(at) = lower.find("name=") {
        // skip the name= inside filename=; get() keeps the lookbehind safe
        // when a multibyte character straddles the boundary
        if lower.get(at.saturating_sub(4)..at) != Some("file") {
            if let Some(value) = param_value(&line[at..], &lower[at..], "name=") {
                if part.name.is_empty() {
                    part.name = value.to_string();
                }
            }
        }
    }

    if part.disposition == Disposition::Attachment {
        if let Some(value) = param_value(line, &lower, "filename=") {
            if part.filename.is_empty() {
                part.filename = value.to_string();
            }
        }
        if let Some(value) = param_value(line, &lower, "size=") {
            if part.declared_size == 0 {
                if let Ok(n) = value.parse::<usize>() {
                    part.declared_size = n;
                    update.declared_size = Some(n);
                }
            }
        }
        if let Some(value) = param_value(line, &lower, "creation-date=") {
            if part.creation_date.is_empty() {
                part.creation_date = value.to_string();
            }
        }
        if let Some(value) = param_value(line, &lower, "modification-date=") {
            if part.modification_date.is_empty() {
                part.modification_date = value.to_string();
            }
        }
    }

    update
}

#[cfg(test)]
mod tests {
    use super::*;

    fn part() -> BodyPart {
        BodyPart::new("1")
    }

    #[test]
    fn content_type_with_charset_and_name() {
        let mut p = part();
        apply_header_line(
            "Content-Type: text/plain; charset=\"utf-8\"; name=\"note.txt\"",
            &mut p,
        );
        assert_eq!(p.content_type, "text/plain");
        assert_eq!(p.charset, "utf-8");
        assert_eq!(p.name, "note.txt");
    }

    #[test]
    fn folded_parameters_on_later_lines() {
        let mut p = part();
        apply_header_line("Content-Type: text/html;", &mut p);
        apply_header_line("\tcharset=iso-8859-1", &mut p);
        assert_eq!(p.content_type, "text/html");
        assert_eq!(p.charset, "iso-8859-1");
    }

    #[test]
    fn disposition_reports_attachment_once() {
        let mut p = part();
        let u = apply_header_line("Content-Disposition: attachment; filename=\"a.bin\"", &mut p);
        assert!(u.became_attachment);
        assert_eq!(p.filename, "a.bin");
        let u = apply_header_line("Content-Disposition: attachment", &mut p);
        assert!(!u.became_attachment);
    }

    #[test]
    fn size_reported_once_and_only_for_attachments() {
        let mut p = part();
        let u = apply_header_line("\tsize=2048", &mut p);
        assert_eq!(u.declared_size, None);

        apply_header_line("Content-Disposition: attachment", &mut p);
        let u = apply_header_line("\tsize=2048; creation-date=\"2026-01-02\"", &mut p);
        assert_eq!(u.declared_size, Some(2048));
        assert_eq!(p.declared_size, 2048);
        assert_eq!(p.creation_date, "2026-01-02");
        let u = apply_header_line("\tsize=4096", &mut p);
        assert_eq!(u.declared_size, None);
        assert_eq!(p.declared_size, 2048);
    }

    #[test]
    fn multibyte_bytes_before_name_do_not_panic() {
        // a multibyte character straddling the lookbehind window must not
        // split a char boundary
        let mut p = part();
        apply_header_line("Content-Type: x; \u{e9}xyzname=v", &mut p);
        assert_eq!(p.name, "v");

        let mut p = part();
        apply_header_line("Content-Type: x; caf\u{e9}-filename=skip.bin", &mut p);
        assert_eq!(p.name, "");
    }

    #[test]
    fn transfer_encoding_lowercased() {
        let mut p = part();
        apply_header_line("Content-Transfer-Encoding: BASE64", &mut p);
        assert_eq!(p.transfer_encoding, "base64");
    }

    #[test]
    fn literal_length_capture() {
        assert_eq!(
            literal_length("* 4 FETCH (UID 20 BODY[1.2] {3456}"),
            Some(3456)
        );
        assert_eq!(literal_length("A0003 OK FETCH completed"), None);
        assert_eq!(literal_length("weird {} empty"), None);
        assert_eq!(literal_length("{12} then {34}"), Some(34));
    }
}
