// src/utils/serialization.rs
//! Serialization utilities for wallet records and HTTP payloads.

use serde::{Deserialize, Serialize};

/// Serializes a value to a pretty-printed JSON byte vector.
///
/// Wallet records are written in this form so they stay readable and
/// diffable on disk, like the files the Fabric SDK produces.
pub fn serialize_pretty<T: Serialize>(data: &T) -> Result<Vec<u8>, serde_json::Error> {
    serde_json::to_vec_pretty(data)
}

/// Deserializes a value from JSON bytes.
pub fn deserialize<'a, T: Deserialize<'a>>(data: &'a [u8]) -> Result<T, serde_json::Error> {
    serde_json::from_slice(data)
}

/// Renders a chaincode result for display.
///
/// Chaincode returns raw bytes; every contract on this network answers
/// with UTF-8 JSON or plain text, so invalid sequences are replaced rather
/// than rejected.
pub fn payload_to_string(payload: &[u8]) -> String {
    String::from_utf8_lossy(payload).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_to_string_is_lossy() {
        assert_eq!(payload_to_string(b"[]"), "[]");
        assert_eq!(payload_to_string(&[0x61, 0xff, 0x62]), "a\u{fffd}b");
    }
}
