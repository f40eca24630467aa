//! Acquisition error classification.
//!
//! Upstream failures are matched against a fixed marker table. Anything that
//! matches is treated as a transient block and retried with backoff; the rest
//! is generic and skipped.

use std::fmt;

/// Upstream condition recognized as a transient block.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BlockingMarker {
    SignInChallenge,
    TemporaryBlock,
    RateLimited,
    Forbidden,
    Unavailable,
}

/// Lower-case substrings per marker. Checked in table order.
pub const BLOCKING_PATTERNS: &[(BlockingMarker, &[&str])] = &[
    (
        BlockingMarker::SignInChallenge,
        &["sign in to confirm", "sign in"],
    ),
    (BlockingMarker::TemporaryBlock, &["blocked"]),
    (
        BlockingMarker::RateLimited,
        &["429", "too many requests"],
    ),
    (BlockingMarker::Forbidden, &["403", "forbidden"]),
    (
        BlockingMarker::Unavailable,
        &["video unavailable", "while getting info from url", "unavailable"],
    ),
];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorClass {
    Blocking(BlockingMarker),
    Generic,
}

impl ErrorClass {
    pub fn is_blocking(&self) -> bool {
        matches!(self, ErrorClass::Blocking(_))
    }
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorClass::Blocking(marker) => write!(f, "blocking:{marker:?}"),
            ErrorClass::Generic => f.write_str("generic"),
        }
    }
}

/// Classify an error message against [`BLOCKING_PATTERNS`].
pub fn classify(message: &str) -> ErrorClass {
    let lowered = message.to_ascii_lowercase();
    BLOCKING_PATTERNS
        .iter()
        .find(|(_, patterns)| patterns.iter().any(|p| lowered.contains(p)))
        .map(|(marker, _)| ErrorClass::Blocking(*marker))
        .unwrap_or(ErrorClass::Generic)
}
