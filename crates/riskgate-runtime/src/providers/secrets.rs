//! Secure handling of the oracle API key.
//!
//! A local llamafile usually runs without authentication, but a completion
//! endpoint behind a gateway may require a bearer key. The key is wrapped
//! in [`ApiCredential`] as soon as it is read and is only exposed when the
//! `Authorization` header is built.
//!
//! ```ignore
//! let cred = ApiCredential::resolve(config.oracle.api_key.as_ref(), ORACLE_API_KEY_ENV);
//! if let Some(cred) = &cred {
//!     request = request.bearer_auth(cred.expose());
//! }
//! ```

use secrecy::{ExposeSecret, SecretString};
use std::fmt;

use super::ProviderError;

/// Environment variable consulted when the config file has no key.
pub const ORACLE_API_KEY_ENV: &str = "RISKGATE_ORACLE_API_KEY";

/// Where a credential was loaded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    /// Loaded from the runtime config file
    Config,
    /// Loaded from environment variable
    Environment,
    /// Provided programmatically
    Programmatic,
}

impl fmt::Display for CredentialSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialSource::Config => write!(f, "config"),
            CredentialSource::Environment => write!(f, "environment"),
            CredentialSource::Programmatic => write!(f, "programmatic"),
        }
    }
}

/// A securely-stored API credential.
///
/// `Debug` and `Display` show `[REDACTED]`; the value is zeroed on drop.
pub struct ApiCredential {
    value: SecretString,
    source: CredentialSource,
}

impl ApiCredential {
    /// Wrap a key supplied in code.
    pub fn new(value: impl Into<String>) -> Self {
        Self::with_source(SecretString::from(value.into()), CredentialSource::Programmatic)
    }

    fn with_source(value: SecretString, source: CredentialSource) -> Self {
        Self { value, source }
    }

    /// Load a required credential from an environment variable.
    pub fn from_env(env_var: &str) -> Result<Self, ProviderError> {
        std::env::var(env_var)
            .map(|v| Self::with_source(SecretString::from(v), CredentialSource::Environment))
            .map_err(|_| {
                ProviderError::NotConfigured(format!(
                    "oracle API key not set: configure '{}' environment variable",
                    env_var
                ))
            })
    }

    /// Pick the configured key, else the environment variable, else none.
    ///
    /// Empty values count as absent.
    pub fn resolve(configured: Option<&SecretString>, env_var: &str) -> Option<Self> {
        if let Some(value) = configured.filter(|v| !v.expose_secret().is_empty()) {
            let value = SecretString::from(value.expose_secret().to_string());
            return Some(Self::with_source(value, CredentialSource::Config));
        }
        Self::from_env(env_var).ok().filter(|cred| !cred.is_empty())
    }

    /// Expose the credential value. Call only where the header is set.
    pub fn expose(&self) -> &str {
        self.value.expose_secret()
    }

    pub fn is_empty(&self) -> bool {
        self.value.expose_secret().is_empty()
    }

    pub fn source(&self) -> CredentialSource {
        self.source
    }
}

impl fmt::Debug for ApiCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiCredential")
            .field("value", &"[REDACTED]")
            .field("source", &self.source)
            .finish()
    }
}

impl fmt::Display for ApiCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "oracle API key from {} [REDACTED]", self.source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credential_redacted_in_debug_and_display() {
        let secret = "sk-super-secret-key-12345";
        let cred = ApiCredential::new(secret);

        let debug = format!("{:?}", cred);
        assert!(!debug.contains(secret), "Secret exposed in Debug!");
        assert!(debug.contains("[REDACTED]"));

        let display = format!("{}", cred);
        assert!(!display.contains(secret), "Secret exposed in Display!");
        assert!(display.contains("programmatic"));
    }

    #[test]
    fn test_credential_expose() {
        let cred = ApiCredential::new("key-1");
        assert_eq!(cred.expose(), "key-1");
        assert_eq!(cred.source(), CredentialSource::Programmatic);
    }

    #[test]
    fn test_resolve_prefers_config() {
        std::env::set_var("RISKGATE_TEST_KEY_PRIORITY", "env-key");
        let configured = SecretString::from("config-key".to_string());

        let cred = ApiCredential::resolve(Some(&configured), "RISKGATE_TEST_KEY_PRIORITY").unwrap();
        assert_eq!(cred.expose(), "config-key");
        assert_eq!(cred.source(), CredentialSource::Config);

        std::env::remove_var("RISKGATE_TEST_KEY_PRIORITY");
    }

    #[test]
    fn test_resolve_falls_back_to_env() {
        std::env::set_var("RISKGATE_TEST_KEY_FALLBACK", "env-key");
        let empty = SecretString::from(String::new());

        let cred = ApiCredential::resolve(Some(&empty), "RISKGATE_TEST_KEY_FALLBACK").unwrap();
        assert_eq!(cred.expose(), "env-key");
        assert_eq!(cred.source(), CredentialSource::Environment);

        std::env::remove_var("RISKGATE_TEST_KEY_FALLBACK");
    }

    #[test]
    fn test_resolve_absent() {
        assert!(ApiCredential::resolve(None, "RISKGATE_TEST_KEY_NONEXISTENT").is_none());
        let err = ApiCredential::from_env("RISKGATE_TEST_KEY_NONEXISTENT").unwrap_err();
        assert!(err.to_string().contains("RISKGATE_TEST_KEY_NONEXISTENT"));
    }
}
