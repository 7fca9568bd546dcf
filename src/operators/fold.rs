//! Strict left-fold to a single terminal record.

use crate::error::{CallbackError, EngineError};
use crate::record::Record;
use crate::stream::BoxStream;
use crate::value::Value;

/// The callback a `fold` step invokes once per input record, threading an
/// accumulator `Value` (typically a record-shaped [`Value::Map`]) through
/// the whole stream.
pub trait Folder {
    /// Combines the running state with one more record.
    fn call(&self, state: Value, record: Record) -> Result<Value, CallbackError>;
}

impl<F> Folder for F
where
    F: Fn(Value, Record) -> Result<Value, CallbackError>,
{
    fn call(&self, state: Value, record: Record) -> Result<Value, CallbackError> {
        self(state, record)
    }
}

/// Runs `input` to completion and returns a single-record stream holding
/// the final state (or the untouched initial state if `input` was empty).
///
/// This is the one kernel that cannot be lazy in its output even though it
/// is lazy in how it consumes its input: nothing can be said about the
/// terminal state until the last input record has been folded in.
pub fn fold(mut input: BoxStream<'_>, folder: &dyn Folder, initial: Value) -> Result<BoxStream<'static>, EngineError> {
    let mut state = initial;
    loop {
        match input.next() {
            None => break,
            Some(Err(e)) => return Err(e),
            Some(Ok(record)) => {
                state = folder.call(state, record.clone()).map_err(|source| EngineError::CallbackFailure {
                    operator: "fold",
                    record: Box::new(record),
                    source,
                })?;
            }
        }
    }
    let record = value_as_record(state);
    Ok(Box::new(std::iter::once(Ok(record))))
}

/// Folders produce a terminal [`Value`], but a stream yields [`Record`]s.
/// A record-shaped [`Value::Map`] unwraps directly; any other terminal
/// value is wrapped under a single `"value"` field so `fold` always
/// produces exactly one well-formed record regardless of what shape of
/// state the caller chose to accumulate.
fn value_as_record(value: Value) -> Record {
    match value {
        Value::Map(fields) => fields.into_iter().collect(),
        other => {
            let mut record = Record::new();
            record.insert("value", other);
            record
        }
    }
}
