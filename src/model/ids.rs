//! Deterministic identifier generation.
//!
//! Every scanner that reports the "same" logical unit must arrive at the same
//! id, otherwise the merge step cannot deduplicate it. Ids are the first 16 hex
//! characters of the SHA-256 of the `:`-joined parts.

use sha2::{Digest, Sha256};
use thiserror::Error;

/// Length of a short id in hex characters.
pub const ID_LENGTH: usize = 16;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IdError {
    #[error("at least one component required to generate an id")]
    NoParts,
    #[error("input must not be blank")]
    Blank,
}

/// Generate a short deterministic id from one or more parts.
pub fn generate(parts: &[&str]) -> Result<String, IdError> {
    if parts.is_empty() {
        return Err(IdError::NoParts);
    }
    generate_from_str(&parts.join(":"))
}

/// Generate a short deterministic id from a single string.
pub fn generate_from_str(input: &str) -> Result<String, IdError> {
    let full = full_hash(input)?;
    Ok(full[..ID_LENGTH].to_string())
}

/// Full 64-character SHA-256 hex digest of the input.
pub fn full_hash(input: &str) -> Result<String, IdError> {
    if input.trim().is_empty() {
        return Err(IdError::Blank);
    }
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    Ok(format!("{:x}", hasher.finalize()))
}

/// Id for a component of the given kind and name.
///
/// `kind` is a fixed non-blank tag, so this never fails.
pub fn component_id(kind: &str, name: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("{}:{}", kind, name).as_bytes());
    format!("{:x}", hasher.finalize())[..ID_LENGTH].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_is_deterministic() {
        let a = generate(&["user-service", "v1", "api"]).unwrap();
        let b = generate(&["user-service", "v1", "api"]).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), ID_LENGTH);
    }

    #[test]
    fn test_different_inputs_differ() {
        let a = generate(&["user-service"]).unwrap();
        let b = generate(&["order-service"]).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_rejects_empty_and_blank() {
        assert_eq!(generate(&[]), Err(IdError::NoParts));
        assert_eq!(generate_from_str("  \t"), Err(IdError::Blank));
        assert_eq!(full_hash(""), Err(IdError::Blank));
    }

    #[test]
    fn test_full_hash_shape() {
        let hash = full_hash("test-input").unwrap();
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert!(hash.starts_with(&generate_from_str("test-input").unwrap()));
    }

    #[test]
    fn test_component_id_matches_generate() {
        assert_eq!(
            component_id("service", "orders"),
            generate(&["service", "orders"]).unwrap()
        );
    }
}
