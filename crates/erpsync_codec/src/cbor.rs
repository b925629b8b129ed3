//! CBOR encoding of journal records.

use crate::error::{CodecError, CodecResult};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Encodes a serde value to CBOR bytes.
///
/// # Errors
///
/// Returns [`CodecError::Encode`] if serialization fails.
pub fn to_cbor<T: Serialize>(value: &T) -> CodecResult<Vec<u8>> {
    let mut buf = Vec::new();
    ciborium::ser::into_writer(value, &mut buf)
        .map_err(|e| CodecError::Encode(e.to_string()))?;
    Ok(buf)
}

/// Decodes CBOR bytes into a serde value.
///
/// # Errors
///
/// Returns [`CodecError::Decode`] if the bytes are not valid CBOR
/// for `T`.
pub fn from_cbor<T: DeserializeOwned>(bytes: &[u8]) -> CodecResult<T> {
    ciborium::de::from_reader(bytes).map_err(|e| CodecError::Decode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Row {
        id: u64,
        model: String,
        remote_id: Option<i64>,
    }

    #[test]
    fn struct_with_optional_field() {
        let row = Row {
            id: 7,
            model: "res.partner".into(),
            remote_id: None,
        };
        let decoded: Row = from_cbor(&to_cbor(&row).unwrap()).unwrap();
        assert_eq!(decoded, row);
    }

    #[test]
    fn garbage_is_a_decoding_error() {
        let result: CodecResult<Row> = from_cbor(&[0xFF, 0x00, 0x13]);
        assert!(matches!(result, Err(CodecError::Decode(_))));
    }
}
