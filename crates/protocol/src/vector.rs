use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::error::{EngineError, Result};

/// Encodes a float32 vector as base64 over its little-endian byte
/// representation, the on-disk form stored in `embeddings.vector_blob`.
#[must_use]
pub fn encode_embedding(vector: &[f32]) -> String {
    let mut bytes = Vec::with_capacity(vector.len() * 4);
    for v in vector {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    STANDARD.encode(bytes)
}

/// Inverse of [`encode_embedding`]. Errors if the decoded byte length isn't a
/// multiple of 4.
pub fn decode_embedding(encoded: &str) -> Result<Vec<f32>> {
    let bytes = STANDARD
        .decode(encoded)
        .map_err(|e| EngineError::Other(format!("invalid base64 embedding: {e}")))?;
    if bytes.len() % 4 != 0 {
        return Err(EngineError::Other(format!(
            "embedding byte length {} is not a multiple of 4",
            bytes.len()
        )));
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn embedding_round_trips_through_base64() {
        let original = vec![0.0_f32, -1.5, 3.25, f32::MAX, f32::MIN_POSITIVE];
        let encoded = encode_embedding(&original);
        let decoded = decode_embedding(&encoded).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn empty_vector_round_trips() {
        let encoded = encode_embedding(&[]);
        assert_eq!(decode_embedding(&encoded).unwrap(), Vec::<f32>::new());
    }

    #[test]
    fn malformed_base64_is_rejected() {
        assert!(decode_embedding("not valid base64!!").is_err());
    }

    #[test]
    fn truncated_byte_length_is_rejected() {
        // "AAA=" decodes to 2 bytes, not a multiple of 4.
        assert!(decode_embedding("AAA=").is_err());
    }
}
