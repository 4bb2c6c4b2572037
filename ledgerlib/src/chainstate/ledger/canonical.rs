// Copyright (C) 2013-2020 Blockstack PBC, a public benefit corporation
// Copyright (C) 2020-2024 Stacks Open Internet Foundation
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.

//! Canonical block encoding.
//!
//! A block hash commits to a textual rendering of the block's records: each record becomes
//! an 8-tuple of strings, and the list of tuples is rendered the way the ledger's historical
//! node software printed a list of string tuples.  Reproducing the hash means reproducing
//! that text byte for byte, quoting rules included.

use std::fmt::Write;

use ledger_common::util::fixed::DecimalError;
use ledger_common::util::hash::Sha224Sum;
use rusqlite::types::Value;
use sha2::{Digest, Sha224};

use crate::chainstate::ledger::{value_to_decimal, LedgerValue, TransactionRecord};

pub const ADDRESS_CHARS: usize = 56;
pub const SIGNATURE_CHARS: usize = 684;
pub const PUBLIC_KEY_CHARS: usize = 1068;
pub const TIMESTAMP_PLACES: u32 = 2;
pub const AMOUNT_PLACES: u32 = 8;

/// First `n` characters (not bytes) of `s`
pub fn truncate_chars(s: &str, n: usize) -> &str {
    match s.char_indices().nth(n) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Shortest round-trip rendering of a float, with exponent notation outside [1e-4, 1e16)
fn float_str(f: f64) -> String {
    if f.is_nan() {
        return "nan".to_string();
    }
    if f.is_infinite() {
        return if f > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    if f == 0.0 {
        return if f.is_sign_negative() { "-0.0" } else { "0.0" }.to_string();
    }
    let sci = format!("{:e}", f);
    let (mantissa, exp) = match sci.split_once('e') {
        Some((m, e)) => (m, e.parse::<i32>().unwrap_or(0)),
        None => (sci.as_str(), 0),
    };
    if (-4..16).contains(&exp) {
        let fixed = format!("{}", f);
        if fixed.contains('.') {
            fixed
        } else {
            format!("{}.0", fixed)
        }
    } else {
        let sign = if exp < 0 { '-' } else { '+' };
        format!("{}e{}{:02}", mantissa, sign, exp.abs())
    }
}

/// Characters the historical renderer printed verbatim inside a quoted literal
fn is_printable(c: char) -> bool {
    let cp = c as u32;
    if cp < 0x20 || cp == 0x7f {
        return false;
    }
    if cp < 0x7f {
        return true;
    }
    !matches!(cp,
        0x80..=0xa0
        | 0xad
        | 0x600..=0x605
        | 0x61c
        | 0x6dd
        | 0x70f
        | 0x1680
        | 0x180e
        | 0x2000..=0x200f
        | 0x2028..=0x202f
        | 0x205f..=0x2064
        | 0x2066..=0x206f
        | 0x3000
        | 0xd800..=0xdfff
        | 0xe000..=0xf8ff
        | 0xfeff
        | 0xfff9..=0xfffb
        | 0xfffe..=0xffff
        | 0xe0001
        | 0xe0020..=0xe007f
        | 0xf0000..=0x10ffff
    )
}

/// Quoted string literal: single quotes unless the text holds a single quote and no double quote
pub fn write_quoted(out: &mut String, s: &str) {
    let quote = if s.contains('\'') && !s.contains('"') {
        '"'
    } else {
        '\''
    };
    out.push(quote);
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\t' => out.push_str("\\t"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c if is_printable(c) => out.push(c),
            c => {
                let cp = c as u32;
                let _ = if cp < 0x100 {
                    write!(out, "\\x{:02x}", cp)
                } else if cp < 0x10000 {
                    write!(out, "\\u{:04x}", cp)
                } else {
                    write!(out, "\\U{:08x}", cp)
                };
            }
        }
    }
    out.push(quote);
}

fn bytes_str(b: &[u8]) -> String {
    let quote = if b.contains(&b'\'') && !b.contains(&b'"') {
        b'"'
    } else {
        b'\''
    };
    let mut out = String::with_capacity(b.len() + 3);
    out.push('b');
    out.push(quote as char);
    for &byte in b {
        match byte {
            b'\\' => out.push_str("\\\\"),
            b'\t' => out.push_str("\\t"),
            b'\n' => out.push_str("\\n"),
            b'\r' => out.push_str("\\r"),
            c if c == quote => {
                out.push('\\');
                out.push(c as char);
            }
            0x20..=0x7e => out.push(byte as char),
            _ => {
                let _ = write!(out, "\\x{:02x}", byte);
            }
        }
    }
    out.push(quote as char);
    out
}

/// Textual value of a stored column, as the historical node rendered it before slicing
pub fn py_str(value: &LedgerValue) -> String {
    match value {
        Value::Null => "None".to_string(),
        Value::Integer(i) => i.to_string(),
        Value::Real(f) => float_str(*f),
        Value::Text(s) => s.clone(),
        Value::Blob(b) => bytes_str(b),
    }
}

/// A numeric column quantized half-even to `places` fraction digits and rendered with exactly
/// that many digits.  Reals are rounded once, directly from their binary value.
pub fn quantized_str(value: &LedgerValue, places: u32) -> Result<String, DecimalError> {
    match value {
        Value::Real(f) if f.is_finite() => Ok(format!("{:.*}", places as usize, f)),
        Value::Integer(i) => {
            if places == 0 {
                Ok(i.to_string())
            } else {
                Ok(format!("{}.{}", i, "0".repeat(places as usize)))
            }
        }
        other => Ok(value_to_decimal(other)?.to_string_places(places)),
    }
}

/// The canonical 8-tuple for one record
pub fn canonical_fields(record: &TransactionRecord) -> Result<[String; 8], DecimalError> {
    Ok([
        quantized_str(&record.timestamp, TIMESTAMP_PLACES)?,
        truncate_chars(&record.address, ADDRESS_CHARS).to_string(),
        truncate_chars(&record.recipient, ADDRESS_CHARS).to_string(),
        quantized_str(&record.amount, AMOUNT_PLACES)?,
        truncate_chars(&record.signature, SIGNATURE_CHARS).to_string(),
        truncate_chars(&record.public_key, PUBLIC_KEY_CHARS).to_string(),
        record.operation.clone(),
        record.openfield.clone(),
    ])
}

/// Render a block's records as a list of quoted tuples
pub fn serialize_records(records: &[TransactionRecord]) -> Result<String, DecimalError> {
    let mut out = String::from("[");
    for (i, record) in records.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        out.push('(');
        for (j, field) in canonical_fields(record)?.iter().enumerate() {
            if j > 0 {
                out.push_str(", ");
            }
            write_quoted(&mut out, field);
        }
        out.push(')');
    }
    out.push(']');
    Ok(out)
}

/// Recompute a block hash from its records and the previous block's stored hash
pub fn block_hash(
    records: &[TransactionRecord],
    prev_block_hash: &str,
) -> Result<Sha224Sum, DecimalError> {
    let serialized = serialize_records(records)?;
    let mut hasher = Sha224::new();
    hasher.update(serialized.as_bytes());
    hasher.update(prev_block_hash.as_bytes());
    Ok(Sha224Sum::from_hasher(hasher))
}
