use ae_ingest::codec::{DecodedVector, decode, encode};
use ae_ingest::model::Representation;
use assert_matches::assert_matches;

#[test]
fn round_trip_text() {
    let values = ["wild type", "", "mutant:with:colons"];
    let bytes = encode(&values, Representation::Text).unwrap();
    let decoded = decode(&bytes, Representation::Text).unwrap();
    assert_eq!(
        decoded,
        DecodedVector::Text(values.iter().map(|s| s.to_string()).collect())
    );
}

#[test]
fn round_trip_boolean() {
    let bytes = encode(&["TRUE", "false", "1", ""], Representation::Boolean).unwrap();
    let decoded = decode(&bytes, Representation::Boolean).unwrap();
    assert_eq!(
        decoded,
        DecodedVector::Boolean(vec![true, false, false, false])
    );
}

#[test]
fn round_trip_float_preserves_parsable_values() {
    let bytes = encode(&["1.5", "-0.25", "3e2"], Representation::Float).unwrap();
    let decoded = decode(&bytes, Representation::Float).unwrap();
    assert_eq!(decoded, DecodedVector::Float(vec![1.5, -0.25, 300.0]));
}

#[test]
fn unparsable_floats_become_nan_every_time() {
    for _ in 0..3 {
        let bytes = encode(&["n/a"], Representation::Float).unwrap();
        let DecodedVector::Float(values) = decode(&bytes, Representation::Float).unwrap() else {
            panic!("wrong representation");
        };
        assert!(values[0].is_nan());
    }
}

#[test]
fn unparsable_integers_become_zero_every_time() {
    for _ in 0..3 {
        let bytes = encode(&["", "4", "x"], Representation::Integer).unwrap();
        let decoded = decode(&bytes, Representation::Integer).unwrap();
        assert_eq!(decoded, DecodedVector::Integer(vec![0, 4, 0]));
    }
}

#[test]
fn undeclared_representations_are_rejected() {
    let err = encode(&["a"], Representation::Char).unwrap_err();
    assert_matches!(err, ae_ingest::error::IngestError::UnsupportedRepresentation(_));
}

#[test]
fn empty_vectors_round_trip() {
    let none: [&str; 0] = [];
    for representation in [
        Representation::Text,
        Representation::Boolean,
        Representation::Float,
        Representation::Integer,
    ] {
        let bytes = encode(&none, representation).unwrap();
        assert_eq!(decode(&bytes, representation).unwrap().len(), 0);
    }
}
