//! Request body size limits.
//!
//! Bodies are read into memory before decoding, so every route is subject to
//! a maximum body size. The default is 4 MiB.

use crate::error::HttpError;

/// Default maximum request body size (4 MiB).
pub const DEFAULT_MAX_BODY_SIZE: usize = 4 * 1024 * 1024;

/// Limits applied to incoming requests.
///
/// ```rust
/// use pathrpc_axum::MessageLimits;
///
/// let limits = MessageLimits::default();
/// let limits = MessageLimits::new(16 * 1024 * 1024);
/// let limits = MessageLimits::unlimited();
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MessageLimits {
    /// `None` means unlimited.
    max_body_size: Option<usize>,
}

impl Default for MessageLimits {
    fn default() -> Self {
        Self {
            max_body_size: Some(DEFAULT_MAX_BODY_SIZE),
        }
    }
}

impl MessageLimits {
    pub fn new(max_body_size: usize) -> Self {
        Self {
            max_body_size: Some(max_body_size),
        }
    }

    /// No maximum. Only use this behind a proxy that enforces its own limit.
    pub fn unlimited() -> Self {
        Self {
            max_body_size: None,
        }
    }

    pub fn max_body_size(&self) -> Option<usize> {
        self.max_body_size
    }

    /// Reject a body of `size` bytes with 413 when it exceeds the limit.
    pub fn check_size(&self, size: usize) -> Result<(), HttpError> {
        match self.max_body_size {
            Some(max) if size > max => Err(self.too_large(size)),
            _ => Ok(()),
        }
    }

    pub(crate) fn too_large(&self, size: usize) -> HttpError {
        let max = self.max_body_size.unwrap_or(usize::MAX);
        HttpError::payload_too_large(format!(
            "request body size {size} bytes exceeds maximum allowed size of {max} bytes"
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn test_default_limits() {
        let limits = MessageLimits::default();
        assert_eq!(limits.max_body_size(), Some(DEFAULT_MAX_BODY_SIZE));
    }

    #[test]
    fn test_custom_limits() {
        assert_eq!(MessageLimits::new(1024).max_body_size(), Some(1024));
        assert_eq!(MessageLimits::unlimited().max_body_size(), None);
    }

    #[test]
    fn test_check_size_within_limit() {
        let limits = MessageLimits::new(1024);
        assert!(limits.check_size(512).is_ok());
        assert!(limits.check_size(1024).is_ok());
    }

    #[test]
    fn test_check_size_exceeds_limit() {
        let err = MessageLimits::new(1024).check_size(1025).unwrap_err();
        assert_eq!(err.status(), StatusCode::PAYLOAD_TOO_LARGE);
        let message = err.message().unwrap();
        assert!(message.contains("1025"));
        assert!(message.contains("1024"));
    }

    #[test]
    fn test_check_size_unlimited() {
        assert!(MessageLimits::unlimited().check_size(usize::MAX).is_ok());
    }
}
