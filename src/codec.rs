use crate::error::IngestError;
use crate::model::Representation;

const TAG_TEXT: u8 = 0;
const TAG_BOOLEAN: u8 = 1;
const TAG_FLOAT: u8 = 2;
const TAG_INTEGER: u8 = 3;

/// Typed view of a decoded vector.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedVector {
    Text(Vec<String>),
    Boolean(Vec<bool>),
    Float(Vec<f64>),
    Integer(Vec<i32>),
}

impl DecodedVector {
    pub fn len(&self) -> usize {
        match self {
            DecodedVector::Text(v) => v.len(),
            DecodedVector::Boolean(v) => v.len(),
            DecodedVector::Float(v) => v.len(),
            DecodedVector::Integer(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn tag_for(representation: Representation) -> Result<u8, IngestError> {
    match representation {
        Representation::Text => Ok(TAG_TEXT),
        Representation::Boolean => Ok(TAG_BOOLEAN),
        Representation::Float => Ok(TAG_FLOAT),
        Representation::Integer => Ok(TAG_INTEGER),
        other => Err(IngestError::UnsupportedRepresentation(other.to_string())),
    }
}

/// Missing-value markers are expected in real matrices; numeric parse
/// failures substitute a sentinel instead of aborting the merge.
fn parse_float(raw: &str) -> f64 {
    raw.trim().parse::<f64>().unwrap_or(f64::NAN)
}

fn parse_integer(raw: &str) -> i32 {
    raw.trim().parse::<i32>().unwrap_or(0)
}

fn parse_boolean(raw: &str) -> bool {
    raw.trim().eq_ignore_ascii_case("true")
}

/// Serializes one textual value sequence to the representation-tagged binary
/// layout: tag byte, big-endian u32 count, then elements (text length-prefixed
/// UTF-8, boolean one byte, float 8-byte BE, integer 4-byte BE).
pub fn encode<S: AsRef<str>>(
    values: &[S],
    representation: Representation,
) -> Result<Vec<u8>, IngestError> {
    let tag = tag_for(representation)?;
    let mut out = Vec::with_capacity(5 + values.len() * 8);
    out.push(tag);
    out.extend_from_slice(&(values.len() as u32).to_be_bytes());

    for value in values {
        let raw = value.as_ref();
        match representation {
            Representation::Text => {
                let bytes = raw.as_bytes();
                out.extend_from_slice(&(bytes.len() as u32).to_be_bytes());
                out.extend_from_slice(bytes);
            }
            Representation::Boolean => out.push(parse_boolean(raw) as u8),
            Representation::Float => out.extend_from_slice(&parse_float(raw).to_be_bytes()),
            Representation::Integer => out.extend_from_slice(&parse_integer(raw).to_be_bytes()),
            _ => unreachable!("rejected by tag_for"),
        }
    }
    Ok(out)
}

pub fn decode(bytes: &[u8], representation: Representation) -> Result<DecodedVector, IngestError> {
    let expected_tag = tag_for(representation)?;
    let mut cursor = Cursor { bytes, offset: 0 };

    let tag = cursor.take(1)?[0];
    if tag != expected_tag {
        return Err(IngestError::CorruptVector(format!(
            "tag {tag} does not match representation {representation}"
        )));
    }
    let count = u32::from_be_bytes(cursor.take(4)?.try_into().unwrap()) as usize;

    let decoded = match representation {
        Representation::Text => {
            let mut values = Vec::with_capacity(count);
            for _ in 0..count {
                let len = u32::from_be_bytes(cursor.take(4)?.try_into().unwrap()) as usize;
                let raw = cursor.take(len)?;
                let text = std::str::from_utf8(raw)
                    .map_err(|err| IngestError::CorruptVector(err.to_string()))?;
                values.push(text.to_string());
            }
            DecodedVector::Text(values)
        }
        Representation::Boolean => {
            let mut values = Vec::with_capacity(count);
            for _ in 0..count {
                values.push(cursor.take(1)?[0] != 0);
            }
            DecodedVector::Boolean(values)
        }
        Representation::Float => {
            let mut values = Vec::with_capacity(count);
            for _ in 0..count {
                values.push(f64::from_be_bytes(cursor.take(8)?.try_into().unwrap()));
            }
            DecodedVector::Float(values)
        }
        Representation::Integer => {
            let mut values = Vec::with_capacity(count);
            for _ in 0..count {
                values.push(i32::from_be_bytes(cursor.take(4)?.try_into().unwrap()));
            }
            DecodedVector::Integer(values)
        }
        _ => unreachable!("rejected by tag_for"),
    };

    if cursor.offset != bytes.len() {
        return Err(IngestError::CorruptVector(format!(
            "{} trailing bytes",
            bytes.len() - cursor.offset
        )));
    }
    Ok(decoded)
}

struct Cursor<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> Cursor<'a> {
    fn take(&mut self, len: usize) -> Result<&'a [u8], IngestError> {
        let end = self.offset.checked_add(len).filter(|end| *end <= self.bytes.len());
        let Some(end) = end else {
            return Err(IngestError::CorruptVector("truncated vector".to_string()));
        };
        let slice = &self.bytes[self.offset..end];
        self.offset = end;
        Ok(slice)
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn text_round_trip() {
        let values = ["alpha", "", "beta gamma"];
        let bytes = encode(&values, Representation::Text).unwrap();
        let decoded = decode(&bytes, Representation::Text).unwrap();
        assert_eq!(
            decoded,
            DecodedVector::Text(values.iter().map(|s| s.to_string()).collect())
        );
    }

    #[test]
    fn boolean_round_trip() {
        let bytes = encode(&["true", "FALSE", "True", "maybe"], Representation::Boolean).unwrap();
        let decoded = decode(&bytes, Representation::Boolean).unwrap();
        assert_eq!(decoded, DecodedVector::Boolean(vec![true, false, true, false]));
    }

    #[test]
    fn float_parse_failure_yields_nan() {
        let bytes = encode(&["1.5", "null", "-2.25"], Representation::Float).unwrap();
        let DecodedVector::Float(values) = decode(&bytes, Representation::Float).unwrap() else {
            panic!("wrong representation");
        };
        assert_eq!(values[0], 1.5);
        assert!(values[1].is_nan());
        assert_eq!(values[2], -2.25);
    }

    #[test]
    fn integer_parse_failure_yields_zero() {
        let bytes = encode(&["7", "n/a", "-3"], Representation::Integer).unwrap();
        let decoded = decode(&bytes, Representation::Integer).unwrap();
        assert_eq!(decoded, DecodedVector::Integer(vec![7, 0, -3]));
    }

    #[test]
    fn sentinel_substitution_is_deterministic() {
        let first = encode(&["oops"], Representation::Integer).unwrap();
        let second = encode(&["oops"], Representation::Integer).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn unsupported_representation_is_fatal() {
        let err = encode(&["1"], Representation::Long).unwrap_err();
        assert_matches!(err, IngestError::UnsupportedRepresentation(_));
    }

    #[test]
    fn tag_mismatch_is_detected() {
        let bytes = encode(&["1.0"], Representation::Float).unwrap();
        let err = decode(&bytes, Representation::Integer).unwrap_err();
        assert_matches!(err, IngestError::CorruptVector(_));
    }

    #[test]
    fn truncated_vector_is_detected() {
        let bytes = encode(&["1.0", "2.0"], Representation::Float).unwrap();
        let err = decode(&bytes[..bytes.len() - 3], Representation::Float).unwrap_err();
        assert_matches!(err, IngestError::CorruptVector(_));
    }
}
