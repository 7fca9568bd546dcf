//! The stream abstraction: a single-use, pull-based sequence of records.
//!
//! A stream is not a bespoke trait. It is exactly `Iterator<Item =
//! Result<Record, EngineError>>`: that gives every operator kernel access
//! to the whole standard iterator-adaptor toolbox (and `itertools`) for
//! free, and gives a failure discovered mid-stream the identical shape —
//! `Result<Record, EngineError>` — as a failure discovered at `run` time.

use crate::error::EngineError;
use crate::record::Record;

/// A boxed, type-erased record stream.
///
/// Operator specifications are stored as trait objects in [`crate::graph::Graph`]
/// so that a pipeline can be built up at run time from a dynamic list, so
/// the streams flowing between them are boxed too rather than stacked as
/// nested generic adaptor types.
pub type BoxStream<'a> = Box<dyn Iterator<Item = Result<Record, EngineError>> + 'a>;

/// Boxes any iterator of records as a [`BoxStream`].
pub fn boxed<'a, I>(iter: I) -> BoxStream<'a>
where
    I: Iterator<Item = Result<Record, EngineError>> + 'a,
{
    Box::new(iter)
}
