//! Ownership tokens

use std::fmt;

use rand::RngCore;

/// Random bytes per generated token (160 bits).
const TOKEN_BYTES: usize = 20;

/// Opaque value proving which instance holds a lock.
///
/// Generated tokens are hex-encoded so they survive any store that only
/// accepts text values.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Token(String);

impl Token {
    /// Generate a fresh token from the thread-local CSPRNG.
    pub fn generate() -> Self {
        let mut buf = [0u8; TOKEN_BYTES];
        rand::rng().fill_bytes(&mut buf);
        Self(const_hex::encode(buf))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// Only a prefix, so full tokens do not end up in debug logs.
impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix: String = self.0.chars().take(8).collect();
        write!(f, "Token({}..)", prefix)
    }
}

impl From<String> for Token {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for Token {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl AsRef<str> for Token {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
