//! Zeroize-on-drop handling for the portal password

use std::fmt;

use zeroize::{Zeroize, ZeroizeOnDrop};

/// A string whose memory is zeroed when dropped
///
/// Used for the portal password so it does not linger in memory after the
/// handshake. Deliberately implements neither `Display` nor a revealing
/// `Debug`, so it cannot end up in logs by accident.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: String) -> Self {
        Self(value)
    }

    /// Exposes the secret; callers must not log or persist the result
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<String> for Secret {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<&str> for Secret {
    fn from(value: &str) -> Self {
        Self::new(value.to_string())
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Secret")
            .field("len", &self.0.len())
            .field("content", &"[REDACTED]")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_never_reveals_the_value() {
        let secret = Secret::from("hunter2");
        let output = format!("{secret:?}");
        assert!(!output.contains("hunter2"));
        assert!(output.contains("[REDACTED]"));
    }

    #[test]
    fn value_is_accessible_until_drop() {
        let secret = Secret::from("hunter2");
        assert_eq!(secret.as_str(), "hunter2");
        assert!(!secret.is_empty());
        assert!(Secret::from("").is_empty());
    }
}
