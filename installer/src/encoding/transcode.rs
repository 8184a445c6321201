//! Legacy 8-bit text to UTF-8.
//!
//! Pre-UTF-8 shops stored config text as ISO-8859-15 (Latin-9), which differs from Latin-1 in
//! eight code points. Every byte maps to exactly one character, so the conversion cannot fail.

use super::serialized::{MapKey, Scalar, Value};

fn latin9_char(b: u8) -> char {
    match b {
        0xA4 => '\u{20AC}', // €
        0xA6 => '\u{0160}', // Š
        0xA8 => '\u{0161}', // š
        0xB4 => '\u{017D}', // Ž
        0xB8 => '\u{017E}', // ž
        0xBC => '\u{0152}', // Œ
        0xBD => '\u{0153}', // œ
        0xBE => '\u{0178}', // Ÿ
        other => char::from(other),
    }
}

pub fn latin9_to_utf8(input: &[u8]) -> String {
    input.iter().map(|&b| latin9_char(b)).collect()
}

/// Transcode every string leaf and string map key; structure and non-string leaves are kept.
pub fn transcode_value(value: Value) -> Value {
    match value {
        Value::Scalar(Scalar::Str(bytes)) => Value::str(latin9_to_utf8(&bytes)),
        Value::Scalar(other) => Value::Scalar(other),
        Value::Sequence(items) => Value::Sequence(items.into_iter().map(transcode_value).collect()),
        Value::Map(entries) => Value::Map(
            entries
                .into_iter()
                .map(|(key, v)| (transcode_key(key), transcode_value(v)))
                .collect(),
        ),
    }
}

fn transcode_key(key: MapKey) -> MapKey {
    match key {
        MapKey::Str(bytes) => MapKey::str(latin9_to_utf8(&bytes)),
        int => int,
    }
}
