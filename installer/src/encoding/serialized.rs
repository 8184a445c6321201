//! Serialized composite config values.
//!
//! The shop stores `arr`/`aarr` config values in PHP's `serialize()` format:
//!
//! - `N;` null, `b:1;` bool, `i:42;` int, `d:0.5;` float
//! - `s:<byte length>:"<bytes>";` string
//! - `a:<count>:{<key><value>...}` ordered array with `i:` or `s:` keys
//!
//! Strings are kept as raw bytes: legacy rows hold 8-bit text that is not valid UTF-8, and string
//! lengths are byte counts, so they must be recomputed whenever a leaf changes.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Vec<u8>),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MapKey {
    Int(i64),
    Str(Vec<u8>),
}

/// Tagged value tree. Arrays keyed exactly `0..n` in order decode to `Sequence`; every other
/// array decodes to `Map`, which keeps insertion order.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Scalar(Scalar),
    Sequence(Vec<Value>),
    Map(Vec<(MapKey, Value)>),
}

impl Value {
    pub fn str(bytes: impl Into<Vec<u8>>) -> Self {
        Value::Scalar(Scalar::Str(bytes.into()))
    }

    pub fn int(v: i64) -> Self {
        Value::Scalar(Scalar::Int(v))
    }

    pub fn bool(v: bool) -> Self {
        Value::Scalar(Scalar::Bool(v))
    }
}

impl MapKey {
    pub fn str(bytes: impl Into<Vec<u8>>) -> Self {
        MapKey::Str(bytes.into())
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum SerializedError {
    #[error("malformed serialized value at byte {offset}: {reason}")]
    Malformed { offset: usize, reason: &'static str },

    #[error("unexpected trailing data at byte {offset}")]
    TrailingData { offset: usize },
}

pub fn serialize(value: &Value) -> Vec<u8> {
    let mut out = Vec::new();
    write_value(&mut out, value);
    out
}

fn write_value(out: &mut Vec<u8>, value: &Value) {
    match value {
        Value::Scalar(scalar) => write_scalar(out, scalar),
        Value::Sequence(items) => {
            out.extend_from_slice(format!("a:{}:{{", items.len()).as_bytes());
            for (idx, item) in items.iter().enumerate() {
                out.extend_from_slice(format!("i:{};", idx).as_bytes());
                write_value(out, item);
            }
            out.push(b'}');
        }
        Value::Map(entries) => {
            out.extend_from_slice(format!("a:{}:{{", entries.len()).as_bytes());
            for (key, item) in entries {
                match key {
                    MapKey::Int(i) => out.extend_from_slice(format!("i:{};", i).as_bytes()),
                    MapKey::Str(s) => write_str(out, s),
                }
                write_value(out, item);
            }
            out.push(b'}');
        }
    }
}

fn write_scalar(out: &mut Vec<u8>, scalar: &Scalar) {
    match scalar {
        Scalar::Null => out.extend_from_slice(b"N;"),
        Scalar::Bool(b) => out.extend_from_slice(if *b { b"b:1;" } else { b"b:0;" }),
        Scalar::Int(i) => out.extend_from_slice(format!("i:{};", i).as_bytes()),
        Scalar::Float(f) => {
            let text = if f.is_nan() {
                "NAN".to_string()
            } else if f.is_infinite() {
                if *f > 0.0 { "INF" } else { "-INF" }.to_string()
            } else {
                f.to_string()
            };
            out.extend_from_slice(format!("d:{};", text).as_bytes());
        }
        Scalar::Str(s) => write_str(out, s),
    }
}

fn write_str(out: &mut Vec<u8>, s: &[u8]) {
    out.extend_from_slice(format!("s:{}:\"", s.len()).as_bytes());
    out.extend_from_slice(s);
    out.extend_from_slice(b"\";");
}

/// Deepest array nesting accepted by `deserialize`.
pub const MAX_NESTING: usize = 64;

pub fn deserialize(input: &[u8]) -> Result<Value, SerializedError> {
    let mut parser = Parser {
        input,
        pos: 0,
        depth: 0,
    };
    let value = parser.value()?;
    if parser.pos != input.len() {
        return Err(SerializedError::TrailingData { offset: parser.pos });
    }
    Ok(value)
}

struct Parser<'a> {
    input: &'a [u8],
    pos: usize,
    depth: usize,
}

impl<'a> Parser<'a> {
    fn fail<T>(&self, reason: &'static str) -> Result<T, SerializedError> {
        Err(SerializedError::Malformed {
            offset: self.pos,
            reason,
        })
    }

    fn next_byte(&mut self) -> Result<u8, SerializedError> {
        match self.input.get(self.pos) {
            Some(&b) => {
                self.pos += 1;
                Ok(b)
            }
            None => self.fail("unexpected end of input"),
        }
    }

    fn expect(&mut self, wanted: u8, reason: &'static str) -> Result<(), SerializedError> {
        if self.input.get(self.pos) == Some(&wanted) {
            self.pos += 1;
            Ok(())
        } else {
            self.fail(reason)
        }
    }

    /// Bytes up to (not including) `terminator`; consumes the terminator.
    fn until(&mut self, terminator: u8) -> Result<&'a str, SerializedError> {
        let start = self.pos;
        let Some(len) = self.input[start..].iter().position(|&b| b == terminator) else {
            return self.fail("missing terminator");
        };
        self.pos = start + len + 1;
        std::str::from_utf8(&self.input[start..start + len]).map_err(|_| {
            SerializedError::Malformed {
                offset: start,
                reason: "non-ASCII number",
            }
        })
    }

    fn integer(&mut self, terminator: u8) -> Result<i64, SerializedError> {
        let start = self.pos;
        let text = self.until(terminator)?;
        text.parse::<i64>().map_err(|_| SerializedError::Malformed {
            offset: start,
            reason: "invalid integer",
        })
    }

    fn length(&mut self) -> Result<usize, SerializedError> {
        let start = self.pos;
        let n = self.integer(b':')?;
        usize::try_from(n).map_err(|_| SerializedError::Malformed {
            offset: start,
            reason: "negative length",
        })
    }

    fn string_body(&mut self) -> Result<Vec<u8>, SerializedError> {
        self.expect(b':', "expected ':' after string tag")?;
        let len = self.length()?;
        self.expect(b'"', "expected opening quote")?;
        let end = self.pos + len;
        if end > self.input.len() {
            return self.fail("string length exceeds input");
        }
        let bytes = self.input[self.pos..end].to_vec();
        self.pos = end;
        self.expect(b'"', "expected closing quote")?;
        self.expect(b';', "expected ';' after string")?;
        Ok(bytes)
    }

    fn value(&mut self) -> Result<Value, SerializedError> {
        match self.next_byte()? {
            b'N' => {
                self.expect(b';', "expected ';' after null")?;
                Ok(Value::Scalar(Scalar::Null))
            }
            b'b' => {
                self.expect(b':', "expected ':' after bool tag")?;
                match self.integer(b';')? {
                    0 => Ok(Value::bool(false)),
                    1 => Ok(Value::bool(true)),
                    _ => self.fail("bool must be 0 or 1"),
                }
            }
            b'i' => {
                self.expect(b':', "expected ':' after int tag")?;
                Ok(Value::int(self.integer(b';')?))
            }
            b'd' => {
                self.expect(b':', "expected ':' after float tag")?;
                let start = self.pos;
                let text = self.until(b';')?;
                let f = match text {
                    "NAN" => f64::NAN,
                    "INF" => f64::INFINITY,
                    "-INF" => f64::NEG_INFINITY,
                    other => other.parse::<f64>().map_err(|_| SerializedError::Malformed {
                        offset: start,
                        reason: "invalid float",
                    })?,
                };
                Ok(Value::Scalar(Scalar::Float(f)))
            }
            b's' => Ok(Value::Scalar(Scalar::Str(self.string_body()?))),
            b'a' => self.array(),
            _ => {
                self.pos -= 1;
                self.fail("unsupported type tag")
            }
        }
    }

    fn array(&mut self) -> Result<Value, SerializedError> {
        if self.depth >= MAX_NESTING {
            return self.fail("arrays nested too deeply");
        }
        self.depth += 1;
        let result = self.array_body();
        self.depth -= 1;
        result
    }

    fn array_body(&mut self) -> Result<Value, SerializedError> {
        self.expect(b':', "expected ':' after array tag")?;
        let count = self.length()?;
        self.expect(b'{', "expected '{'")?;

        let mut entries: Vec<(MapKey, Value)> = Vec::with_capacity(count.min(1024));
        for _ in 0..count {
            let key = match self.next_byte()? {
                b'i' => {
                    self.expect(b':', "expected ':' after int key")?;
                    MapKey::Int(self.integer(b';')?)
                }
                b's' => MapKey::Str(self.string_body()?),
                _ => {
                    self.pos -= 1;
                    return self.fail("array key must be int or string");
                }
            };
            let value = self.value()?;
            entries.push((key, value));
        }
        self.expect(b'}', "expected '}'")?;

        let is_sequence = entries
            .iter()
            .enumerate()
            .all(|(idx, (key, _))| *key == MapKey::Int(idx as i64));
        if is_sequence {
            Ok(Value::Sequence(entries.into_iter().map(|(_, v)| v).collect()))
        } else {
            Ok(Value::Map(entries))
        }
    }
}
