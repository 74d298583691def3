//! Error taxonomy shared by every AniVault engine component.
//!
//! `spec.md` §7 names kinds, not type names; `EngineError` collapses them
//! into one enum because the engine core is a single cohesive library. Each
//! variant carries an [`ErrorContext`] so callers never have to reproduce
//! the operation/subject by hand when logging or surfacing a failure.

use std::fmt;

use thiserror::Error;

/// Structured context attached to every [`EngineError`].
///
/// Credential values must never be placed in `subject` or bubbled up
/// through `source` — callers are responsible for scrubbing secrets before
/// constructing a context.
#[derive(Debug, Default, Clone)]
pub struct ErrorContext {
    /// Name of the operation that failed, e.g. `"cache.put"` or `"organizer.plan"`.
    pub operation: &'static str,
    /// Path, key, plan ID, or other subject identifier involved, if any.
    pub subject: Option<String>,
}

impl ErrorContext {
    pub fn new(operation: &'static str) -> Self {
        Self {
            operation,
            subject: None,
        }
    }

    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.subject {
            Some(subject) => write!(f, "{} ({subject})", self.operation),
            None => write!(f, "{}", self.operation),
        }
    }
}

/// The rate-limit runtime's current state, used by [`EngineError::Blocked`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockedState {
    Sleep,
    CacheOnly,
}

impl fmt::Display for BlockedState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockedState::Sleep => write!(f, "sleep"),
            BlockedState::CacheOnly => write!(f, "cache_only"),
        }
    }
}

/// The complete AniVault engine error taxonomy (`spec.md` §7).
#[derive(Debug, Error)]
pub enum EngineError {
    /// Bad input: a path doesn't exist, an argument is out of range.
    #[error("validation failed for {context}: {message}")]
    Validation {
        context: ErrorContext,
        message: String,
    },

    /// Requested entity absent: cache miss when required, unknown plan ID.
    #[error("not found for {context}: {message}")]
    NotFound {
        context: ErrorContext,
        message: String,
    },

    /// Credential leak in a cache payload, or a destination collision under `skip`.
    #[error("policy violation for {context}: {message}")]
    PolicyViolation {
        context: ErrorContext,
        message: String,
    },

    /// The rate-limit runtime is in `Sleep` or `CacheOnly`.
    #[error("blocked ({state}) for {context}, retry after {eta_secs}s")]
    Blocked {
        context: ErrorContext,
        state: BlockedState,
        /// Seconds until the runtime is expected to accept traffic again.
        eta_secs: u64,
    },

    /// A non-429 4xx response from TMDB.
    #[error("upstream error {status} for {context}: {body}")]
    UpstreamError {
        context: ErrorContext,
        status: u16,
        body: String,
    },

    /// A 429 / 5xx / network error, recoverable internally by the rate-limit
    /// runtime. Should never escape the runtime unless retries are exhausted,
    /// at which point it becomes [`EngineError::UpstreamError`].
    #[error("retryable upstream failure for {context}: {message}")]
    UpstreamRetryable {
        context: ErrorContext,
        message: String,
    },

    /// Cache or journal I/O failure.
    #[error("storage failure for {context}: {message}")]
    StorageFailure {
        context: ErrorContext,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
        message: String,
    },

    /// Deadline or user abort.
    #[error("cancelled: {context}")]
    Cancellation { context: ErrorContext },
}

impl EngineError {
    /// Maps each error kind to the exit code documented in `spec.md` §6/§7.
    pub fn exit_code(&self) -> i32 {
        match self {
            EngineError::Validation { .. } => 64,
            EngineError::NotFound { .. } => 66,
            EngineError::PolicyViolation { .. } => 65,
            EngineError::Blocked { .. } => 0,
            EngineError::UpstreamError { .. } => 69,
            EngineError::UpstreamRetryable { .. } => 69,
            EngineError::StorageFailure { .. } => 74,
            EngineError::Cancellation { .. } => 0,
        }
    }

    pub fn validation(context: ErrorContext, message: impl Into<String>) -> Self {
        EngineError::Validation {
            context,
            message: message.into(),
        }
    }

    pub fn not_found(context: ErrorContext, message: impl Into<String>) -> Self {
        EngineError::NotFound {
            context,
            message: message.into(),
        }
    }

    pub fn policy_violation(context: ErrorContext, message: impl Into<String>) -> Self {
        EngineError::PolicyViolation {
            context,
            message: message.into(),
        }
    }

    pub fn storage_failure(
        context: ErrorContext,
        message: impl Into<String>,
        source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
    ) -> Self {
        EngineError::StorageFailure {
            context,
            source,
            message: message.into(),
        }
    }
}

/// Convenience alias used throughout the engine.
pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_match_spec() {
        let ctx = ErrorContext::new("test");
        assert_eq!(
            EngineError::Validation {
                context: ctx.clone(),
                message: "x".into()
            }
            .exit_code(),
            64
        );
        assert_eq!(
            EngineError::NotFound {
                context: ctx.clone(),
                message: "x".into()
            }
            .exit_code(),
            66
        );
        assert_eq!(
            EngineError::PolicyViolation {
                context: ctx.clone(),
                message: "x".into()
            }
            .exit_code(),
            65
        );
        assert_eq!(
            EngineError::Blocked {
                context: ctx.clone(),
                state: BlockedState::Sleep,
                eta_secs: 10
            }
            .exit_code(),
            0
        );
    }
}
