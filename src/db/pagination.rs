//! Continuation tokens
//!
//! A token is the base64 encoding of the JSON-serialized last evaluated key.
//! Callers only ever carry it back; nothing interprets it.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};

use crate::db::repositories::RepositoryError;
use crate::db::store::Record;

/// Encode the store's last evaluated key. No key means no further pages.
pub fn encode(last_key: Option<&Record>) -> Result<Option<String>, RepositoryError> {
    let Some(key) = last_key else {
        return Ok(None);
    };

    let json = serde_json::to_vec(key).map_err(|e| RepositoryError::Serialization(e.to_string()))?;
    Ok(Some(BASE64.encode(json)))
}

/// Decode a token back into an exclusive start key.
///
/// Absent or empty tokens mean "start from the beginning".
pub fn decode(token: Option<&str>) -> Result<Option<Record>, RepositoryError> {
    let Some(token) = token.filter(|t| !t.is_empty()) else {
        return Ok(None);
    };

    let bytes = BASE64
        .decode(token)
        .map_err(|e| RepositoryError::InvalidToken(e.to_string()))?;
    let key = serde_json::from_slice::<Record>(&bytes)
        .map_err(|e| RepositoryError::InvalidToken(e.to_string()))?;

    Ok(Some(key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_absent_key_has_no_token() {
        assert_eq!(encode(None).unwrap(), None);
        assert_eq!(decode(None).unwrap(), None);
        assert_eq!(decode(Some("")).unwrap(), None);
    }

    #[test]
    fn test_round_trip_preserves_key() {
        let key = json!({
            "pk": "flight",
            "id": "5f0c2a64-8a53-4c43-9d2b-0f6c1f0ad1b1",
            "gsi1pk": "Amsterdam#London",
            "gsi1sk": "2024-06-01T10:00:00.000Z",
        })
        .as_object()
        .cloned()
        .unwrap();

        let token = encode(Some(&key)).unwrap().unwrap();
        assert_eq!(decode(Some(&token)).unwrap(), Some(key));
    }

    #[test]
    fn test_round_trip_nested_and_numeric_keys() {
        let key = json!({"pk": "counter", "seq": 42, "ratio": 0.5, "tags": ["a", "b"], "meta": {"x": null}})
            .as_object()
            .cloned()
            .unwrap();

        let token = encode(Some(&key)).unwrap();
        assert_eq!(decode(token.as_deref()).unwrap(), Some(key));
    }

    #[test]
    fn test_token_is_base64_json() {
        let key = json!({"pk": "flight", "id": "1"}).as_object().cloned().unwrap();
        let token = encode(Some(&key)).unwrap().unwrap();
        let raw = BASE64.decode(token).unwrap();
        assert_eq!(
            serde_json::from_slice::<serde_json::Value>(&raw).unwrap(),
            json!({"pk": "flight", "id": "1"})
        );
    }

    #[test]
    fn test_invalid_tokens_are_rejected() {
        assert!(matches!(
            decode(Some("not base64!")),
            Err(RepositoryError::InvalidToken(_))
        ));

        let not_an_object = BASE64.encode("[1,2,3]");
        assert!(matches!(
            decode(Some(&not_an_object)),
            Err(RepositoryError::InvalidToken(_))
        ));
    }
}
