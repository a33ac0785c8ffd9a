//! Shared utility functions for provider adapters.

use cs_domain::error::{Error, Result};

/// Convert a [`reqwest::Error`] into the domain [`Error`] type.
///
/// Timeout errors map to [`Error::Timeout`]; everything else maps to
/// [`Error::Http`].
pub(crate) fn from_reqwest(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Timeout(e.to_string())
    } else {
        Error::Http(e.to_string())
    }
}

/// Read an API key from the named environment variable.
///
/// Empty values count as unset so a blank `.env` entry does not produce
/// confusing 401s from the provider.
pub fn resolve_api_key(env_var: &str) -> Result<String> {
    match std::env::var(env_var) {
        Ok(v) if !v.trim().is_empty() => Ok(v.trim().to_string()),
        _ => Err(Error::Auth(format!(
            "environment variable '{env_var}' not set or empty"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_env_var_is_auth_error() {
        let err = resolve_api_key("CS_TEST_DEFINITELY_UNSET_KEY").unwrap_err();
        assert!(matches!(err, Error::Auth(_)));
    }
}
