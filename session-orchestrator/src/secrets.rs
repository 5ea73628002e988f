//! Identifier and access token generation.

use rand::prelude::*;
use uuid::Uuid;

const TOKEN_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ\
                               abcdefghijklmnopqrstuvwxyz\
                               0123456789-_";

/// Generate a URL-safe access token of exactly `length` characters.
///
/// Uses the thread-local CSPRNG. Callers are responsible for flooring
/// `length` (see [`crate::config::Settings::effective_token_length`]).
pub fn generate_access_token(length: usize) -> String {
    let mut rng = rand::rng();
    (0..length)
        .map(|_| {
            let idx = rng.random_range(0..TOKEN_CHARSET.len());
            TOKEN_CHARSET[idx] as char
        })
        .collect()
}

/// Short random workspace id: the first 12 hex digits of a v4 UUID.
pub fn generate_workspace_id() -> String {
    let mut id = Uuid::new_v4().simple().to_string();
    id.truncate(12);
    id
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_length_and_alphabet() {
        let token = generate_access_token(24);
        assert_eq!(token.len(), 24);
        assert!(token
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_'));
    }

    #[test]
    fn test_tokens_differ() {
        assert_ne!(generate_access_token(24), generate_access_token(24));
    }

    #[test]
    fn test_workspace_id_shape() {
        let id = generate_workspace_id();
        assert_eq!(id.len(), 12);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
        crate::validation::validate_workspace_id(&id).unwrap();
    }
}
