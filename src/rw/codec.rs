//! `read`/`write`/`width`/`zero_value` implementations for [`Rw`](super::Rw).
// (c) 2025 Ross Younger

use std::collections::BTreeMap;

use super::{FieldKey, Rw, Value};
use crate::error::{ProtocolError, ReadError, Result};
use crate::transport::ByteStream;

fn bytes_to_u64(bytes: &[u8]) -> u64 {
    let mut buf = [0u8; 8];
    buf[8 - bytes.len()..].copy_from_slice(bytes);
    u64::from_be_bytes(buf)
}

fn u64_to_bytes(value: u64, width: u8) -> Vec<u8> {
    let full = value.to_be_bytes();
    full[8 - width as usize..].to_vec()
}

fn expect_uint(value: &Value, combinator: &'static str) -> Result<u64> {
    match value {
        Value::UInt(v) => Ok(*v),
        _ => Err(ProtocolError::ValueShape { combinator }.into()),
    }
}

fn value_to_pairs(value: &Value) -> Result<Vec<(Value, Value)>> {
    match value {
        Value::Pairs(pairs) => Ok(pairs.clone()),
        Value::Map(map) => Ok(map
            .iter()
            .map(|(k, v)| (Value::Str(k.clone()), v.clone()))
            .collect()),
        _ => Err(ProtocolError::ValueShape { combinator: "headers" }.into()),
    }
}

impl Rw {
    /// Reads one value of this shape from `stream`.
    pub fn read(&self, stream: &mut dyn ByteStream) -> Result<Value> {
        match self {
            Rw::None => Ok(Value::None),
            Rw::Number(width) => {
                let bytes = stream.read(*width as usize)?;
                if bytes.len() != *width as usize {
                    return Err(ReadError::ShortRead {
                        needed: *width as usize,
                        got: bytes.len(),
                    }
                    .into());
                }
                Ok(Value::UInt(bytes_to_u64(&bytes)))
            }
            Rw::Constant(inner, value) => {
                let _ = inner.read(stream)?;
                Ok((**value).clone())
            }
            Rw::LenPrefixedString { len_rw, is_binary } => {
                let len = expect_uint(&len_rw.read(stream)?, "len_prefixed_string")? as usize;
                let bytes = stream.read(len)?;
                if bytes.len() != len {
                    return Err(ReadError::ShortRead {
                        needed: len,
                        got: bytes.len(),
                    }
                    .into());
                }
                if *is_binary {
                    Ok(Value::Bytes(bytes))
                } else {
                    Ok(Value::Str(String::from_utf8(bytes).map_err(ReadError::from)?))
                }
            }
            Rw::Chain(children) => {
                let mut values = Vec::with_capacity(children.len());
                for child in children {
                    values.push(child.read(stream)?);
                }
                Ok(Value::Tuple(values))
            }
            Rw::Dictionary(fields) => {
                let mut map = BTreeMap::new();
                for (key, rw) in fields {
                    let value = rw.read(stream)?;
                    if let FieldKey::Named(name) = key {
                        let _ = map.insert((*name).to_string(), value);
                    }
                }
                Ok(Value::Map(map))
            }
            Rw::Headers {
                len_rw,
                key_rw,
                value_rw,
            } => {
                let count = expect_uint(&len_rw.read(stream)?, "headers")?;
                let mut pairs = Vec::with_capacity(count as usize);
                for _ in 0..count {
                    let key = key_rw.read(stream)?;
                    let value = value_rw.read(stream)?;
                    pairs.push((key, value));
                }
                Ok(Value::Pairs(pairs))
            }
            Rw::Switch { tag_rw, cases } => {
                let tag = expect_uint(&tag_rw.read(stream)?, "switch")?;
                let payload = match cases.get(&tag) {
                    Some(case) => case.read(stream)?,
                    None => Value::None,
                };
                Ok(Value::Tagged(tag, Box::new(payload)))
            }
            Rw::Delegating(inner) => inner.read(stream),
        }
    }

    /// Writes `value` to `stream` in this shape.
    pub fn write(&self, value: &Value, stream: &mut dyn ByteStream) -> Result<()> {
        match self {
            Rw::None => Ok(()),
            Rw::Number(width) => {
                let v = expect_uint(value, "number")?;
                let max = if *width >= 8 {
                    u64::MAX
                } else {
                    (1u64 << (8 * u32::from(*width))) - 1
                };
                if v > max {
                    return Err(ProtocolError::IntegerOverflow { value: v, width: *width }.into());
                }
                stream.write(&u64_to_bytes(v, *width))?;
                Ok(())
            }
            Rw::Constant(inner, const_value) => inner.write(const_value, stream),
            Rw::LenPrefixedString { len_rw, is_binary } => {
                let bytes: Vec<u8> = match (value, is_binary) {
                    (Value::Bytes(b), true) => b.clone(),
                    (Value::Str(s), false) => s.as_bytes().to_vec(),
                    _ => {
                        return Err(ProtocolError::ValueShape {
                            combinator: "len_prefixed_string",
                        }
                        .into())
                    }
                };
                len_rw.write(&Value::UInt(bytes.len() as u64), stream)?;
                stream.write(&bytes)?;
                Ok(())
            }
            Rw::Chain(children) => {
                let values = match value {
                    Value::Tuple(v) => v,
                    _ => return Err(ProtocolError::ValueShape { combinator: "chain" }.into()),
                };
                if values.len() != children.len() {
                    return Err(ProtocolError::ArityMismatch {
                        expected: children.len(),
                        got: values.len(),
                    }
                    .into());
                }
                for (child, v) in children.iter().zip(values.iter()) {
                    child.write(v, stream)?;
                }
                Ok(())
            }
            Rw::Dictionary(fields) => {
                let map = match value {
                    Value::Map(m) => Some(m),
                    _ => None,
                };
                for (key, rw) in fields {
                    let v = match key {
                        FieldKey::Named(name) => map
                            .and_then(|m| m.get(*name))
                            .cloned()
                            .unwrap_or_else(|| rw.zero_value()),
                        FieldKey::Skip => rw.zero_value(),
                    };
                    rw.write(&v, stream)?;
                }
                Ok(())
            }
            Rw::Headers {
                len_rw,
                key_rw,
                value_rw,
            } => {
                let pairs = value_to_pairs(value)?;
                len_rw.write(&Value::UInt(pairs.len() as u64), stream)?;
                for (k, v) in &pairs {
                    key_rw.write(k, stream)?;
                    value_rw.write(v, stream)?;
                }
                Ok(())
            }
            Rw::Switch { tag_rw, cases } => {
                let (tag, payload) = match value {
                    Value::Tagged(tag, payload) => (*tag, payload.as_ref()),
                    _ => return Err(ProtocolError::ValueShape { combinator: "switch" }.into()),
                };
                tag_rw.write(&Value::UInt(tag), stream)?;
                if let Some(case) = cases.get(&tag) {
                    case.write(payload, stream)?;
                }
                Ok(())
            }
            Rw::Delegating(inner) => inner.write(value, stream),
        }
    }

    /// The fixed, value-independent byte contribution of this combinator. See the
    /// module documentation for what this does and does not promise.
    #[must_use]
    pub fn width(&self) -> usize {
        match self {
            Rw::None => 0,
            Rw::Number(width) => *width as usize,
            Rw::Constant(inner, _) | Rw::Delegating(inner) => inner.width(),
            Rw::LenPrefixedString { len_rw, .. } | Rw::Headers { len_rw, .. } => len_rw.width(),
            Rw::Chain(children) => children.iter().map(Rw::width).sum(),
            Rw::Dictionary(fields) => fields.iter().map(|(_, rw)| rw.width()).sum(),
            Rw::Switch { tag_rw, .. } => tag_rw.width(),
        }
    }

    /// The value this combinator produces when asked to write "nothing in particular":
    /// zero for numbers, empty for strings/collections, the fixed payload for
    /// [`Rw::Constant`]. Used to fill in [`FieldKey::Skip`] positions and absent
    /// dictionary fields on write.
    #[must_use]
    pub fn zero_value(&self) -> Value {
        match self {
            Rw::None => Value::None,
            Rw::Number(_) => Value::UInt(0),
            Rw::Constant(_, value) => (**value).clone(),
            Rw::LenPrefixedString { is_binary: true, .. } => Value::Bytes(Vec::new()),
            Rw::LenPrefixedString { is_binary: false, .. } => Value::Str(String::new()),
            Rw::Chain(children) => Value::Tuple(children.iter().map(Rw::zero_value).collect()),
            Rw::Dictionary(_) => Value::Map(BTreeMap::new()),
            Rw::Headers { .. } => Value::Pairs(Vec::new()),
            Rw::Switch { .. } => Value::Tagged(0, Box::new(Value::None)),
            Rw::Delegating(inner) => inner.zero_value(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::transport::MemoryStream;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    // S1: number(w) round-trips a big-endian unsigned integer for each supported width.
    #[rstest]
    #[case(1u8, 0xabu64, vec![0xab])]
    #[case(2, 0x1234, vec![0x12, 0x34])]
    #[case(4, 0xdead_beef, vec![0xde, 0xad, 0xbe, 0xef])]
    #[case(8, 0x0102_0304_0506_0708, vec![1, 2, 3, 4, 5, 6, 7, 8])]
    fn s1_number_round_trip(#[case] width: u8, #[case] value: u64, #[case] wire: Vec<u8>) {
        let rw = Rw::number(width);
        let mut out = MemoryStream::new();
        rw.write(&Value::UInt(value), &mut out).unwrap();
        assert_eq!(out.into_vec(), wire);

        let mut input = MemoryStream::from_bytes(wire);
        assert_eq!(rw.read(&mut input).unwrap(), Value::UInt(value));
    }

    #[test]
    fn number_write_rejects_overflow() {
        let rw = Rw::number(1);
        let mut out = MemoryStream::new();
        let err = rw.write(&Value::UInt(256), &mut out).unwrap_err();
        assert!(matches!(
            err,
            crate::error::Error::Protocol(ProtocolError::IntegerOverflow { value: 256, width: 1 })
        ));
    }

    // S2: len_prefixed_string splits into a length prefix and a payload of that length.
    #[test]
    fn s2_len_prefixed_string_round_trip() {
        let rw = Rw::len_prefixed_string(Rw::number(2), false);
        let mut out = MemoryStream::new();
        rw.write(&Value::Str("hello".to_string()), &mut out).unwrap();
        let wire = out.into_vec();
        assert_eq!(wire, vec![0, 5, b'h', b'e', b'l', b'l', b'o']);

        let mut input = MemoryStream::from_bytes(wire);
        assert_eq!(
            rw.read(&mut input).unwrap(),
            Value::Str("hello".to_string())
        );
    }

    #[test]
    fn len_prefixed_string_binary_keeps_raw_bytes() {
        let rw = Rw::len_prefixed_string(Rw::number(1), true);
        let mut out = MemoryStream::new();
        rw.write(&Value::Bytes(vec![0xff, 0x00, 0x7f]), &mut out).unwrap();
        assert_eq!(out.into_vec(), vec![3, 0xff, 0x00, 0x7f]);
    }

    #[test]
    fn len_prefixed_string_rejects_invalid_utf8() {
        let rw = Rw::len_prefixed_string(Rw::number(1), false);
        let mut input = MemoryStream::from_bytes(vec![2, 0xff, 0xfe]);
        let err = rw.read(&mut input).unwrap_err();
        assert!(matches!(
            err,
            crate::error::Error::Read(ReadError::InvalidUtf8(_))
        ));
    }

    // S3: chain concatenates children in order, both ways.
    #[test]
    fn s3_chain_round_trip() {
        let rw = Rw::chain(vec![Rw::number(1), Rw::number(2)]);
        let value = Value::Tuple(vec![Value::UInt(7), Value::UInt(300)]);
        let mut out = MemoryStream::new();
        rw.write(&value, &mut out).unwrap();
        assert_eq!(out.into_vec(), vec![7, 1, 44]);

        let mut input = MemoryStream::from_bytes(vec![7, 1, 44]);
        assert_eq!(rw.read(&mut input).unwrap(), value);
    }

    #[test]
    fn chain_rejects_arity_mismatch() {
        let rw = Rw::chain(vec![Rw::number(1), Rw::number(1)]);
        let mut out = MemoryStream::new();
        let err = rw.write(&Value::Tuple(vec![Value::UInt(1)]), &mut out).unwrap_err();
        assert!(matches!(
            err,
            crate::error::Error::Protocol(ProtocolError::ArityMismatch {
                expected: 2,
                got: 1
            })
        ));
    }

    // S4: dictionary with a SKIP field omits it from the decoded map, and replays its
    // zero value on write regardless of what (if anything) is supplied for it.
    #[test]
    fn s4_dictionary_skip_field() {
        let rw = Rw::dictionary(vec![
            (FieldKey::Named("a"), Rw::number(1)),
            (FieldKey::Skip, Rw::number(1)),
            (FieldKey::Named("b"), Rw::number(1)),
        ]);
        let mut input = MemoryStream::from_bytes(vec![1, 0xff, 2]);
        let decoded = rw.read(&mut input).unwrap();
        assert_eq!(
            decoded,
            Value::map([("a", Value::UInt(1)), ("b", Value::UInt(2))])
        );

        let mut out = MemoryStream::new();
        rw.write(&decoded, &mut out).unwrap();
        assert_eq!(out.into_vec(), vec![1, 0, 2]);
    }

    // S5/S6: headers is a count followed by that many key/value pairs; duplicate keys
    // survive the round trip because Value::Pairs is ordered, not deduplicated.
    #[test]
    fn s5_headers_round_trip_with_duplicate_keys() {
        let rw = Rw::headers(
            Rw::number(1),
            Rw::len_prefixed_string(Rw::number(1), false),
            Rw::len_prefixed_string(Rw::number(1), false),
        );
        let value = Value::Pairs(vec![
            (Value::Str("k".into()), Value::Str("v1".into())),
            (Value::Str("k".into()), Value::Str("v2".into())),
        ]);
        let mut out = MemoryStream::new();
        rw.write(&value, &mut out).unwrap();
        let wire = out.into_vec();

        let mut input = MemoryStream::from_bytes(wire);
        assert_eq!(rw.read(&mut input).unwrap(), value);
    }

    // S6/P5: switch reads the tag, then dispatches to the matching case; an unknown
    // tag consumes no further bytes but writing one still emits the tag.
    #[test]
    fn s6_switch_known_tag_dispatches_payload() {
        let rw = Rw::switch(
            Rw::number(1),
            BTreeMap::from([(1, Rw::number(2)), (2, Rw::number(1))]),
        );
        let value = Value::Tagged(1, Box::new(Value::UInt(0x0102)));
        let mut out = MemoryStream::new();
        rw.write(&value, &mut out).unwrap();
        assert_eq!(out.into_vec(), vec![1, 1, 2]);

        let mut input = MemoryStream::from_bytes(vec![1, 1, 2]);
        assert_eq!(rw.read(&mut input).unwrap(), value);
    }

    #[test]
    fn p5_switch_unknown_tag_reads_tag_only() {
        let rw = Rw::switch(Rw::number(1), BTreeMap::from([(1, Rw::number(4))]));
        let mut input = MemoryStream::from_bytes(vec![9, 0xaa, 0xbb, 0xcc, 0xdd]);
        let decoded = rw.read(&mut input).unwrap();
        assert_eq!(decoded, Value::Tagged(9, Box::new(Value::None)));
        // only the 1-byte tag was consumed
        assert_eq!(input.remaining(), 4);
    }

    #[test]
    fn p5_switch_write_unknown_tag_still_emits_tag() {
        let rw = Rw::switch(Rw::number(1), BTreeMap::from([(1, Rw::number(4))]));
        let mut out = MemoryStream::new();
        rw.write(&Value::Tagged(9, Box::new(Value::None)), &mut out).unwrap();
        assert_eq!(out.into_vec(), vec![9]);
    }

    // P1: width is independent of the value actually written.
    #[test]
    fn p1_width_is_value_independent() {
        let rw = Rw::chain(vec![
            Rw::number(2),
            Rw::len_prefixed_string(Rw::number(2), false),
        ]);
        assert_eq!(rw.width(), 4);
    }

    // P2: reading what was just written returns the original value, for every
    // combinator shape exercised above (chain/number/string/headers/switch).
    #[test]
    fn p2_read_after_write_is_identity_for_nested_shapes() {
        let rw = Rw::dictionary(vec![
            (FieldKey::Named("flags"), Rw::number(1)),
            (
                FieldKey::Named("name"),
                Rw::len_prefixed_string(Rw::number(2), false),
            ),
            (
                FieldKey::Named("tagged"),
                Rw::switch(Rw::number(1), BTreeMap::from([(1, Rw::number(1))])),
            ),
        ]);
        let value = Value::map([
            ("flags", Value::UInt(3)),
            ("name", Value::Str("svc".into())),
            ("tagged", Value::Tagged(1, Box::new(Value::UInt(9)))),
        ]);
        let mut out = MemoryStream::new();
        rw.write(&value, &mut out).unwrap();
        let mut input = MemoryStream::from_bytes(out.into_vec());
        assert_eq!(rw.read(&mut input).unwrap(), value);
    }

    // P4: constant always round-trips its fixed value, regardless of what is supplied.
    #[test]
    fn p4_constant_ignores_supplied_value() {
        let rw = Rw::constant(Rw::number(1), Value::UInt(0));
        let mut out = MemoryStream::new();
        rw.write(&Value::UInt(200), &mut out).unwrap();
        assert_eq!(out.into_vec(), vec![0]);

        let mut input = MemoryStream::from_bytes(vec![0]);
        assert_eq!(rw.read(&mut input).unwrap(), Value::UInt(0));
    }
}
