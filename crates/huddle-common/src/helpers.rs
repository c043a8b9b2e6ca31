//! Environment helpers used by configuration loaders.

use std::str::FromStr;

/// Reads a non-empty, trimmed string.
pub fn env_string(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Parses a variable into `T`. Missing variables yield `Ok(None)`; malformed
/// ones yield a configuration error naming the variable.
pub fn env_parse<T>(name: &str) -> crate::Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env_string(name) {
        Some(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|e| crate::Error::config(format!("{name}={raw:?}: {e}"))),
        None => Ok(None),
    }
}
