use std::fmt;

use crate::context::ContextId;

/// Which readiness phase ran out of time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutCode {
    /// The embedded handle never navigated away from its blank placeholder
    WindowTimeout,
    /// The document never became interactive (or never sent its handshake)
    DocumentTimeout,
}

impl TimeoutCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeoutCode::WindowTimeout => "EWINDOWTIMEOUT",
            TimeoutCode::DocumentTimeout => "ETIMEOUT",
        }
    }
}

impl fmt::Display for TimeoutCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors surfaced by views, the readiness detector and sync relays
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ViewError {
    #[error("invalid dimension format: {input:?}")]
    Parse { input: String },

    #[error("view {0} has no embedded document, mount it first")]
    NotMounted(ContextId),

    #[error("view {context}: {code} after {elapsed_ms}ms")]
    Timeout {
        context: ContextId,
        code: TimeoutCode,
        elapsed_ms: u64,
    },

    #[error("view {0}: poll cancelled")]
    PollCancelled(ContextId),
}

impl ViewError {
    pub fn parse(input: impl Into<String>) -> Self {
        Self::Parse {
            input: input.into(),
        }
    }

    /// Cancellation is expected during teardown and must be treated as a no-op
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::PollCancelled(_))
    }

    /// Timeouts leave the view usable; remounting retries detection
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

pub type ViewResult<T> = std::result::Result<T, ViewError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_codes_render_legacy_names() {
        let err = ViewError::Timeout {
            context: ContextId::new(3),
            code: TimeoutCode::WindowTimeout,
            elapsed_ms: 30_000,
        };
        assert_eq!(err.to_string(), "view v3: EWINDOWTIMEOUT after 30000ms");
        assert!(err.is_recoverable());
        assert!(!err.is_cancelled());
    }

    #[test]
    fn test_cancelled_is_not_recoverable() {
        let err = ViewError::PollCancelled(ContextId::new(1));
        assert!(err.is_cancelled());
        assert!(!err.is_recoverable());
    }
}
