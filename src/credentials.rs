//! Login credentials
//!
//! Either literal or generated per run. A generated username is a pure
//! function of a prefix, a timestamp and a salt, so parallel tests never
//! collide on the same account.

use chrono::{DateTime, Utc};
use rand::distributions::Alphanumeric;
use rand::Rng;
use std::fmt;

/// Length of the random salt appended to generated usernames
const SALT_LEN: usize = 6;

/// Username and secret for an authenticate sequence
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    username: String,
    secret: String,
}

impl Credentials {
    pub fn new<U: Into<String>, S: Into<String>>(username: U, secret: S) -> Self {
        Self {
            username: username.into(),
            secret: secret.into(),
        }
    }

    /// Credentials with a username unique to this call
    pub fn unique<S: Into<String>>(prefix: &str, secret: S) -> Self {
        let salt: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(SALT_LEN)
            .map(char::from)
            .collect();
        Self::new(unique_username(prefix, Utc::now(), &salt.to_lowercase()), secret)
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn secret(&self) -> &str {
        &self.secret
    }

    /// Both parts are non-empty
    pub fn is_complete(&self) -> bool {
        !self.username.is_empty() && !self.secret.is_empty()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// `<prefix>_<millis since epoch>_<salt>`
pub fn unique_username(prefix: &str, now: DateTime<Utc>, salt: &str) -> String {
    format!("{}_{}_{}", prefix, now.timestamp_millis(), salt)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_unique_username_is_pure() {
        let at = Utc.timestamp_millis_opt(1_700_000_000_123).unwrap();
        assert_eq!(unique_username("testuser", at, "ab12cd"), "testuser_1700000000123_ab12cd");
        assert_eq!(
            unique_username("testuser", at, "ab12cd"),
            unique_username("testuser", at, "ab12cd")
        );
    }

    #[test]
    fn test_generated_usernames_differ() {
        let a = Credentials::unique("testuser", "Password123");
        let b = Credentials::unique("testuser", "Password123");
        assert_ne!(a.username(), b.username());
        assert!(a.username().starts_with("testuser_"));
    }

    #[test]
    fn test_debug_redacts_secret() {
        let credentials = Credentials::new("standard_user", "secret_sauce");
        let printed = format!("{:?}", credentials);
        assert!(printed.contains("standard_user"));
        assert!(!printed.contains("secret_sauce"));
    }

    #[test]
    fn test_incomplete_credentials() {
        assert!(!Credentials::new("", "x").is_complete());
        assert!(!Credentials::new("x", "").is_complete());
        assert!(Credentials::new("x", "y").is_complete());
    }
}
