//! Closed, self-delimiting text encoding for theory argument rows.
//!
//! | value  | encoding                              |
//! |--------|---------------------------------------|
//! | null   | `n`                                   |
//! | bool   | `b0` / `b1`                           |
//! | int    | `i<decimal>;`                         |
//! | float  | `f<16 hex digits of the IEEE-754 bits>` |
//! | string | `s<byte length>:<utf-8>`              |
//! | enum   | `e<len>:<type><len>:<variant>`        |
//! | array  | `a<count>[<items>]`                   |
//!
//! A row is encoded as an array. Decoding only ever produces values of this
//! closed set; objects are rejected when encoding.
use crate::error::SerializationError;
use crate::metadata::ArgValue;

/// Version of this encoding, carried in every case record.
pub const ARG_SIGNATURE_VERSION: u32 = 1;

const MAX_DECODE_DEPTH: usize = 32;

type Result<T> = std::result::Result<T, SerializationError>;

pub fn encode_row(values: &[ArgValue]) -> Result<String> {
    let mut out = String::new();
    encode_array(&mut out, values)?;
    Ok(out)
}

pub fn encode_string(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 4);
    write_length_prefixed(&mut out, 's', value);
    out
}

fn encode_array(out: &mut String, values: &[ArgValue]) -> Result<()> {
    out.push('a');
    out.push_str(&values.len().to_string());
    out.push('[');
    for value in values {
        encode_value(out, value)?;
    }
    out.push(']');
    Ok(())
}

fn encode_value(out: &mut String, value: &ArgValue) -> Result<()> {
    match value {
        ArgValue::Null => out.push('n'),
        ArgValue::Bool(b) => out.push_str(if *b { "b1" } else { "b0" }),
        ArgValue::Int(i) => {
            out.push('i');
            out.push_str(&i.to_string());
            out.push(';');
        }
        ArgValue::Float(f) => {
            out.push('f');
            out.push_str(&format!("{:016x}", f.to_bits()));
        }
        ArgValue::String(s) => write_length_prefixed(out, 's', s),
        ArgValue::Enum { type_name, variant } => {
            write_length_prefixed(out, 'e', type_name);
            out.push_str(&variant.len().to_string());
            out.push(':');
            out.push_str(variant);
        }
        ArgValue::Array(items) => encode_array(out, items)?,
        ArgValue::Object { type_name, .. } => {
            return Err(SerializationError::unsupported(type_name));
        }
    }
    Ok(())
}

fn write_length_prefixed(out: &mut String, tag: char, value: &str) {
    out.push(tag);
    out.push_str(&value.len().to_string());
    out.push(':');
    out.push_str(value);
}

/// Decodes a complete row; trailing input is an error.
pub fn decode_row(text: &str) -> Result<Vec<ArgValue>> {
    let (values, consumed) = decode_row_prefix(text)?;
    if consumed != text.len() {
        return Err(SerializationError::malformed_payload(
            consumed,
            "trailing data after row",
        ));
    }
    Ok(values)
}

/// Decodes a row at the start of `text`, returning it with the number of
/// bytes consumed.
pub fn decode_row_prefix(text: &str) -> Result<(Vec<ArgValue>, usize)> {
    let mut decoder = Decoder::new(text);
    match decoder.value(0)? {
        ArgValue::Array(values) => Ok((values, decoder.pos)),
        other => Err(SerializationError::malformed_payload(
            0,
            format!("expected row array, found {}", other.type_name()),
        )),
    }
}

pub fn decode_string(text: &str) -> Result<String> {
    let mut decoder = Decoder::new(text);
    let value = decoder.value(0)?;
    if decoder.pos != text.len() {
        return Err(SerializationError::malformed_payload(
            decoder.pos,
            "trailing data after string",
        ));
    }
    match value {
        ArgValue::String(s) => Ok(s),
        other => Err(SerializationError::malformed_payload(
            0,
            format!("expected string, found {}", other.type_name()),
        )),
    }
}

struct Decoder<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Decoder<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn error(&self, message: impl Into<String>) -> SerializationError {
        SerializationError::malformed_payload(self.pos, message)
    }

    fn next_byte(&mut self) -> Result<u8> {
        let byte = *self
            .input
            .as_bytes()
            .get(self.pos)
            .ok_or_else(|| self.error("unexpected end of payload"))?;
        self.pos += 1;
        Ok(byte)
    }

    fn expect(&mut self, expected: u8) -> Result<()> {
        let found = self.next_byte()?;
        if found != expected {
            self.pos -= 1;
            return Err(self.error(format!(
                "expected '{}', found '{}'",
                expected as char, found as char
            )));
        }
        Ok(())
    }

    fn take_until(&mut self, terminator: u8) -> Result<&'a str> {
        let rest = &self.input.as_bytes()[self.pos..];
        let len = rest
            .iter()
            .position(|&b| b == terminator)
            .ok_or_else(|| self.error(format!("missing '{}'", terminator as char)))?;
        let text = self
            .input
            .get(self.pos..self.pos + len)
            .ok_or_else(|| self.error("invalid utf-8 boundary"))?;
        self.pos += len + 1;
        Ok(text)
    }

    fn take(&mut self, len: usize) -> Result<&'a str> {
        let end = self
            .pos
            .checked_add(len)
            .ok_or_else(|| self.error("length overflow"))?;
        let text = self
            .input
            .get(self.pos..end)
            .ok_or_else(|| self.error("length exceeds payload"))?;
        self.pos = end;
        Ok(text)
    }

    fn length(&mut self, terminator: u8) -> Result<usize> {
        let digits = self.take_until(terminator)?;
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(self.error(format!("invalid length '{digits}'")));
        }
        digits
            .parse()
            .map_err(|_| self.error(format!("invalid length '{digits}'")))
    }

    fn length_prefixed(&mut self) -> Result<&'a str> {
        let len = self.length(b':')?;
        self.take(len)
    }

    fn value(&mut self, depth: usize) -> Result<ArgValue> {
        if depth > MAX_DECODE_DEPTH {
            return Err(self.error("nesting too deep"));
        }
        match self.next_byte()? {
            b'n' => Ok(ArgValue::Null),
            b'b' => match self.next_byte()? {
                b'0' => Ok(ArgValue::Bool(false)),
                b'1' => Ok(ArgValue::Bool(true)),
                _ => Err(self.error("invalid bool")),
            },
            b'i' => {
                let digits = self.take_until(b';')?;
                digits
                    .parse()
                    .map(ArgValue::Int)
                    .map_err(|_| self.error(format!("invalid int '{digits}'")))
            }
            b'f' => {
                let digits = self.take(16)?;
                u64::from_str_radix(digits, 16)
                    .map(|bits| ArgValue::Float(f64::from_bits(bits)))
                    .map_err(|_| self.error(format!("invalid float bits '{digits}'")))
            }
            b's' => Ok(ArgValue::String(self.length_prefixed()?.to_string())),
            b'e' => {
                let type_name = self.length_prefixed()?.to_string();
                let variant = self.length_prefixed()?.to_string();
                Ok(ArgValue::Enum { type_name, variant })
            }
            b'a' => {
                let count = self.length(b'[')?;
                let mut items = Vec::new();
                for _ in 0..count {
                    items.push(self.value(depth + 1)?);
                }
                self.expect(b']')?;
                Ok(ArgValue::Array(items))
            }
            other => {
                self.pos -= 1;
                Err(self.error(format!("unknown tag '{}'", other as char)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_encode_scalars() {
        let row = vec![
            ArgValue::Int(42),
            ArgValue::Bool(true),
            ArgValue::Null,
            ArgValue::string("a:b"),
        ];
        assert_eq!(encode_row(&row).unwrap(), "a4[i42;b1ns3:a:b]");
    }

    #[test]
    fn test_round_trip_mixed_row() {
        let row = vec![
            ArgValue::Float(-0.1),
            ArgValue::Float(f64::NAN),
            ArgValue::enum_variant("Tests.Color", "Red"),
            ArgValue::from(vec!["x", "yé"]),
            ArgValue::Int(i64::MIN),
        ];
        let decoded = decode_row(&encode_row(&row).unwrap()).unwrap();
        assert_eq!(decoded.len(), row.len());
        assert_eq!(decoded[0], ArgValue::Float(-0.1));
        assert!(matches!(decoded[1], ArgValue::Float(f) if f.is_nan()));
        assert_eq!(&decoded[2..], &row[2..]);
    }

    #[test]
    fn test_object_is_unsupported() {
        let row = vec![ArgValue::Array(vec![ArgValue::object("Tests.Widget")])];
        assert_eq!(
            encode_row(&row),
            Err(SerializationError::unsupported("Tests.Widget"))
        );
    }

    #[test]
    fn test_decode_rejects_truncated_string() {
        assert!(decode_row("a1[s10:abc]").is_err());
    }

    #[test]
    fn test_decode_rejects_trailing_data() {
        assert!(decode_row("a0[]x").is_err());
    }

    #[test]
    fn test_decode_rejects_unknown_tag() {
        assert!(decode_row("a1[z]").is_err());
    }

    #[test]
    fn test_decode_rejects_deep_nesting() {
        let text = format!("{}{}", "a1[".repeat(64), "]".repeat(64));
        assert!(decode_row(&text).is_err());
    }

    #[test]
    fn test_decode_row_prefix_reports_consumed() {
        let (values, consumed) = decode_row_prefix("a1[i7;]!s4:slow").unwrap();
        assert_eq!(values, vec![ArgValue::Int(7)]);
        assert_eq!(consumed, 7);
    }

    #[test]
    fn test_string_round_trip() {
        assert_eq!(decode_string(&encode_string("flaky: see #12")).unwrap(), "flaky: see #12");
    }
}
