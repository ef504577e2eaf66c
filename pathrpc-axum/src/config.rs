//! Dispatcher configuration - set once at startup, read by every request.

use crate::cors::CorsConfig;
use crate::limits::MessageLimits;

/// Environment variable selecting production mode (`production`).
pub const ENV_MODE: &str = "PATHRPC_ENV";
/// Environment variable holding the path prefix routes are mounted under.
pub const ENV_PREFIX: &str = "PATHRPC_PREFIX";

/// Server-wide settings of a [`Dispatcher`](crate::Dispatcher).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DispatcherConfig {
    /// Path prefix stripped before matching, e.g. `/api`. Empty for none.
    pub prefix: String,
    pub cors: CorsConfig,
    pub limits: MessageLimits,
    /// Hide the message of unhandled errors.
    pub production: bool,
}

impl DispatcherConfig {
    /// Defaults overridden by `PATHRPC_ENV` and `PATHRPC_PREFIX`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`from_env`](Self::from_env) with a custom variable source.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(mode) = lookup(ENV_MODE) {
            config.production = mode.trim().eq_ignore_ascii_case("production");
        }
        if let Some(prefix) = lookup(ENV_PREFIX) {
            config.prefix = normalize_prefix(&prefix);
        }
        config
    }
}

/// `api/` and `/api/` both become `/api`; `/` becomes empty.
pub(crate) fn normalize_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim().trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{trimmed}")
    }
}
