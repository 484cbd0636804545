//! OAuth client credential generation.

use std::fmt;

use rand::Rng;
use rand::distr::Alphanumeric;

/// Length of generated client identifiers and secrets.
pub const SECRET_LENGTH: usize = 64;

/// Source of random alphanumeric strings.
pub trait SecretGenerator {
    /// Produces a fresh secret.
    fn generate(&self) -> String;
}

/// Thread-local CSPRNG backed generator of `[A-Za-z0-9]` strings.
#[derive(Clone, Copy, Debug)]
pub struct AlphanumericSecrets {
    length: usize,
}

impl AlphanumericSecrets {
    /// Creates a generator producing strings of `length` characters.
    #[must_use]
    pub const fn new(length: usize) -> Self {
        Self { length }
    }
}

impl Default for AlphanumericSecrets {
    fn default() -> Self {
        Self::new(SECRET_LENGTH)
    }
}

impl SecretGenerator for AlphanumericSecrets {
    fn generate(&self) -> String {
        rand::rng()
            .sample_iter(&Alphanumeric)
            .take(self.length)
            .map(char::from)
            .collect()
    }
}

/// OAuth client id and secret registered on one instance.
#[derive(Clone, Eq, PartialEq)]
pub struct CredentialPair {
    client_id: String,
    client_secret: String,
}

impl CredentialPair {
    /// Wraps an existing id and secret.
    #[must_use]
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }

    /// Draws a new id and a new secret from `generator`.
    #[must_use]
    pub fn generate<G: SecretGenerator + ?Sized>(generator: &G) -> Self {
        let client_id = generator.generate();
        let client_secret = generator.generate();
        Self {
            client_id,
            client_secret,
        }
    }

    /// Client identifier.
    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Client secret.
    #[must_use]
    pub fn client_secret(&self) -> &str {
        &self.client_secret
    }
}

impl fmt::Debug for CredentialPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialPair")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn generated_secrets_are_long_alphanumeric_strings() {
        let pair = CredentialPair::generate(&AlphanumericSecrets::default());

        for value in [pair.client_id(), pair.client_secret()] {
            assert_eq!(value.len(), SECRET_LENGTH);
            assert!(value.chars().all(|ch| ch.is_ascii_alphanumeric()));
        }
    }

    #[rstest]
    fn id_and_secret_are_drawn_independently() {
        let generator = AlphanumericSecrets::default();
        let first = CredentialPair::generate(&generator);
        let second = CredentialPair::generate(&generator);

        assert_ne!(first.client_id(), first.client_secret());
        assert_ne!(first, second);
    }

    #[rstest]
    fn debug_output_redacts_the_secret() {
        let pair = CredentialPair::new("visible", "hidden");

        let rendered = format!("{pair:?}");

        assert!(rendered.contains("visible"));
        assert!(!rendered.contains("hidden"));
    }
}
