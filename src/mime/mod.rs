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

//! MIME building blocks: base64 codec, RFC 2047 header decoding, and the
//! per-part header parser used during IMAP MIME traversal.

pub mod base64;
pub mod part_header;
pub mod rfc2047;

pub use part_header::{apply_header_line, literal_length, PartHeaderUpdate};
pub use rfc2047::{decode_encoded_words, encoded_word_charset};
