//! Immutable snapshot of the process environment
//!
//! Providers read credentials from a snapshot taken once at startup instead of
//! calling `std::env::var` directly. The snapshot is cheap to clone and can be
//! built from a literal map in tests (mutating the real environment is
//! `unsafe` in edition 2024).

use std::collections::HashMap;
use std::sync::Arc;

/// Read-only view over environment variables
#[derive(Debug, Clone, Default)]
pub struct EnvSnapshot {
    vars: Arc<HashMap<String, String>>,
}

impl EnvSnapshot {
    /// Capture the current process environment
    #[must_use]
    pub fn capture() -> Self {
        Self::from_vars(std::env::vars())
    }

    /// Build a snapshot from explicit pairs
    pub fn from_vars<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: Arc::new(
                vars.into_iter()
                    .map(|(k, v)| (k.into(), v.into()))
                    .collect(),
            ),
        }
    }

    /// Get a variable, treating empty or whitespace-only values as unset
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.trim().is_empty())
    }

    /// Get a variable as an owned string
    #[must_use]
    pub fn get_owned(&self, key: &str) -> Option<String> {
        self.get(key).map(str::to_string)
    }

    /// Whether the variable is set to a non-empty value
    #[must_use]
    pub fn is_set(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Parse a boolean flag.
    ///
    /// Returns `true` for `1`, `true`, `yes` or `on` (case-insensitive).
    #[must_use]
    pub fn flag(&self, key: &str) -> bool {
        self.get(key).is_some_and(|v| {
            let v = v.trim();
            v == "1"
                || v.eq_ignore_ascii_case("true")
                || v.eq_ignore_ascii_case("yes")
                || v.eq_ignore_ascii_case("on")
        })
    }

    /// First set variable among `keys`
    #[must_use]
    pub fn first_of(&self, keys: &[&str]) -> Option<&str> {
        keys.iter().find_map(|key| self.get(key))
    }
}
