//! The engine's single typed failure surface.

use crate::record::Record;

/// Every way a [`crate::graph::Graph`] run can fail.
///
/// An `EngineError` is both the value `run` returns on failure and the
/// value carried as the `Err` arm of a stream's `Item` when the failure is
/// only discovered mid-stream (a callback failing, a sort hitting a type
/// mismatch). Once a stream has yielded one `Err`, it is considered
/// poisoned and must yield `None` afterwards.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// A `run` invocation lacks a binding for a referenced source label.
    #[error("source `{0}` is not bound")]
    UnboundSource(String),

    /// A sort key comparison encountered two values of incompatible tags.
    #[error("cannot compare {left} with {right} while sorting")]
    TypeMismatch {
        /// Tag name of the left-hand value.
        left: &'static str,
        /// Tag name of the right-hand value.
        right: &'static str,
    },

    /// A reduce or join key field was absent from a record under a strict key policy.
    #[error("operator `{operator}` requires field `{field}`, which is missing")]
    MissingKey {
        /// The field name that was required.
        field: String,
        /// The operator that required it (`"reduce"`, `"join"`, ...).
        operator: &'static str,
    },

    /// A join strategy did not name one of the five known strategies.
    ///
    /// Unreachable from the typed `JoinStrategy` builder API; exists for
    /// join specifications constructed from deserialized plan data.
    #[error("unknown join strategy `{0}`")]
    BadStrategy(String),

    /// A user-supplied callback raised an error.
    #[error("{operator} callback failed on {record:?}: {source}")]
    CallbackFailure {
        /// The operator that invoked the callback (`"map"`, `"fold"`, `"reduce"`).
        operator: &'static str,
        /// The record being processed when the callback failed.
        record: Box<Record>,
        /// The underlying error the callback raised.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A builder- or run-time constraint violation: an empty key list, a
    /// source bound twice, and similar malformed specifications.
    #[error("invalid operator specification: {0}")]
    InvalidSpec(String),
}

/// The error type a user callback (mapper, folder, reducer) returns.
///
/// Kept distinct from [`EngineError`] so a callback's own error type does
/// not need to know about the engine; the operator kernel that invokes the
/// callback wraps any `Err` into [`EngineError::CallbackFailure`].
pub type CallbackError = Box<dyn std::error::Error + Send + Sync>;
