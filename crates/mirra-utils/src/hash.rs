/// Hashes a byte slice with blake3 and returns the hex digest.
///
/// # Example
///
/// ```
/// use mirra_utils::hash::hash_bytes;
///
/// let digest = hash_bytes(b"{}");
/// assert_eq!(digest.len(), 64);
/// ```
pub fn hash_bytes(bytes: &[u8]) -> String {
    blake3::hash(bytes).to_hex().to_string()
}

/// Builds a strong HTTP entity tag for a serialized payload.
///
/// The tag is the quoted blake3 digest of `body`, so two byte-identical
/// payloads always share a tag and any byte change produces a new one.
pub fn content_etag(body: &[u8]) -> String {
    format!("\"{}\"", hash_bytes(body))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_is_stable() {
        assert_eq!(hash_bytes(b"mirra"), hash_bytes(b"mirra"));
        assert_ne!(hash_bytes(b"mirra"), hash_bytes(b"mirra "));
    }

    #[test]
    fn test_content_etag_is_quoted() {
        let etag = content_etag(b"{\"name\":\"a\"}");
        assert!(etag.starts_with('"'));
        assert!(etag.ends_with('"'));
        assert_eq!(etag.len(), 66);
    }
}
