use thiserror::Error;

/// Errors surfaced while lowering an AAG file into a [`crate::TransitionSystem`].
///
/// Fatal: a caller that sees one of these has no `TransitionSystem` to work
/// with and should abort the run.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("malformed aag header: {0}")]
    MalformedHeader(String),

    #[error("unexpected line at index {line}: {content:?}")]
    UnexpectedLine { line: usize, content: String },

    #[error("literal {literal} references an undefined gate, input or latch")]
    UndefinedReference { literal: u64 },

    #[error("constraint, fairness or justice properties are not supported")]
    UnsupportedPropertyClass,

    #[error("io error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Errors returned by the underlying SMT backend.
///
/// These are propagated up as an `Unknown` verdict rather than aborting,
/// since `unknown` is a legitimate (if unhelpful) SMT answer.
#[derive(Debug, Error)]
pub enum SolverError {
    #[error("solver returned unknown: {reason}")]
    Unknown { reason: String },

    #[error("solver backend error: {0}")]
    Backend(String),
}

/// Internal consistency violations. These indicate a bug in this crate, not
/// a problem with the input circuit or the SMT backend, and are not
/// recoverable.
#[derive(Debug, Error)]
pub enum InvariantViolation {
    #[error("cube cache version inconsistency: cache_version {cache_version} > literal_version {literal_version}")]
    CubeCacheCorrupted {
        cache_version: u64,
        literal_version: u64,
    },

    #[error("frame monotonicity violated between frame {lower} and frame {upper}")]
    FrameMonotonicityViolated { lower: usize, upper: usize },

    #[error("literal at index {index} is not of the expected `var == const` shape")]
    NotAnEqualityLiteral { index: usize },
}
