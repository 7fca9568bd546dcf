//! Grouped reduction over a stream sorted by the reduce key.

use std::cell::RefCell;
use std::iter::Peekable;
use std::rc::Rc;

use crate::error::{CallbackError, EngineError};
use crate::field::FieldName;
use crate::record::Record;
use crate::stream::BoxStream;
use crate::value::Value;

/// The callback a `reduce` step invokes once per maximal run of records
/// sharing the same key.
///
/// Receives a [`GroupStream`] bounded to that run and returns a lazy
/// sequence of output records, which the engine forwards before moving on
/// to the next group.
pub trait Reducer {
    /// Reduces one group to zero or more output records.
    fn call(&self, group: GroupStream) -> Result<Box<dyn Iterator<Item = Record>>, CallbackError>;
}

impl<F> Reducer for F
where
    F: Fn(GroupStream) -> Result<Box<dyn Iterator<Item = Record>>, CallbackError>,
{
    fn call(&self, group: GroupStream) -> Result<Box<dyn Iterator<Item = Record>>, CallbackError> {
        self(group)
    }
}

/// Extracts the composite reduce key, honoring `strict`: a field absent
/// under a strict policy is [`EngineError::MissingKey`] rather than null.
fn reduce_key(record: &Record, keys: &[FieldName], strict: bool) -> Result<Vec<Value>, EngineError> {
    keys.iter()
        .map(|field| match record.get(field) {
            Some(value) => Ok(value.clone()),
            None if strict => Err(EngineError::MissingKey { field: field.to_string(), operator: "reduce" }),
            None => Ok(Value::Null),
        })
        .collect()
}

struct ReduceCore {
    input: Peekable<BoxStream<'static>>,
    strict_keys: bool,
    /// `true` while the group currently being handed to the callback has
    /// not yet reached its boundary (a differing key, an error, or the end
    /// of input).
    group_open: bool,
    /// An error discovered while advancing past a group boundary, surfaced
    /// by [`ReduceStream`] on its next poll.
    pending_error: Option<EngineError>,
}

impl ReduceCore {
    /// Yields the next record of the open group if the peeked record still
    /// matches `key`; otherwise closes the group (recording any error) and
    /// returns `None`.
    fn pull_if_matches(&mut self, keys: &[FieldName], key: &[Value]) -> Option<Record> {
        if !self.group_open {
            return None;
        }
        let strict = self.strict_keys;
        match self.input.peek() {
            Some(Ok(record)) => match reduce_key(record, keys, strict) {
                Ok(k) if k == key => match self.input.next() {
                    Some(Ok(record)) => Some(record),
                    _ => unreachable!("peek just confirmed Ok"),
                },
                Ok(_) => {
                    self.group_open = false;
                    None
                }
                Err(e) => {
                    self.input.next();
                    self.pending_error = Some(e);
                    self.group_open = false;
                    None
                }
            },
            Some(Err(_)) => {
                let Some(Err(e)) = self.input.next() else { unreachable!("peek just confirmed Err") };
                self.pending_error = Some(e);
                self.group_open = false;
                None
            }
            None => {
                self.group_open = false;
                None
            }
        }
    }
}

/// The bounded sub-stream a [`Reducer`] callback consumes: one maximal run
/// of records sharing a key.
///
/// Its lifetime is tied to the group boundary, not to the callback: once
/// the next record in the underlying stream has a different key (or the
/// stream ends, or errors), every further call to `next` returns `None`,
/// even if the callback kept this value around past the point where
/// [`ReduceStream`] moved on. A `GroupStream` the callback does not fully
/// drain does not desynchronize the parent stream — [`ReduceStream`] drains
/// any remainder itself before opening the next group.
pub struct GroupStream {
    core: Rc<RefCell<ReduceCore>>,
    keys: Rc<Vec<FieldName>>,
    key: Vec<Value>,
}

impl Iterator for GroupStream {
    type Item = Record;

    fn next(&mut self) -> Option<Record> {
        self.core.borrow_mut().pull_if_matches(&self.keys, &self.key)
    }
}

/// Wraps a stream sorted by `keys` into one output record stream, invoking
/// `reducer` once per maximal equal-key run.
pub struct ReduceStream {
    core: Rc<RefCell<ReduceCore>>,
    keys: Rc<Vec<FieldName>>,
    reducer: Rc<dyn Reducer>,
    current_output: Option<Box<dyn Iterator<Item = Record>>>,
    done: bool,
}

impl ReduceStream {
    /// Builds a reduce step over `input`, grouping by `keys`.
    pub fn new(input: BoxStream<'static>, keys: Vec<FieldName>, reducer: Rc<dyn Reducer>, strict_keys: bool) -> Self {
        ReduceStream {
            core: Rc::new(RefCell::new(ReduceCore { input: input.peekable(), strict_keys, group_open: false, pending_error: None })),
            keys: Rc::new(keys),
            reducer,
            current_output: None,
            done: false,
        }
    }

    fn finish_current_group(&mut self) -> Option<EngineError> {
        self.current_output = None;
        let mut core = self.core.borrow_mut();
        if core.group_open {
            let keys = Rc::clone(&self.keys);
            let strict = core.strict_keys;
            // Re-derive the key from whichever record is still pending at
            // the front of the group, if any; if the group is already
            // empty there is nothing left to drain.
            match core.input.peek() {
                Some(Ok(record)) => match reduce_key(record, &keys, strict) {
                    Ok(key) => while core.pull_if_matches(&keys, &key).is_some() {},
                    Err(e) => {
                        core.input.next();
                        core.pending_error = Some(e);
                        core.group_open = false;
                    }
                },
                _ => core.group_open = false,
            }
        }
        core.pending_error.take()
    }
}

impl Iterator for ReduceStream {
    type Item = Result<Record, EngineError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        loop {
            if let Some(out) = &mut self.current_output {
                if let Some(record) = out.next() {
                    return Some(Ok(record));
                }
                if let Some(e) = self.finish_current_group() {
                    self.done = true;
                    return Some(Err(e));
                }
            }

            let mut core = self.core.borrow_mut();
            let strict = core.strict_keys;
            let (key, snapshot) = match core.input.peek() {
                None => {
                    self.done = true;
                    return None;
                }
                Some(Err(_)) => {
                    let Some(Err(e)) = core.input.next() else { unreachable!() };
                    self.done = true;
                    return Some(Err(e));
                }
                Some(Ok(record)) => match reduce_key(record, &self.keys, strict) {
                    Ok(key) => (key, record.clone()),
                    Err(e) => {
                        self.done = true;
                        return Some(Err(e));
                    }
                },
            };
            core.group_open = true;
            drop(core);

            let group = GroupStream { core: Rc::clone(&self.core), keys: Rc::clone(&self.keys), key };
            match self.reducer.call(group) {
                Ok(out) => self.current_output = Some(out),
                Err(source) => {
                    self.finish_current_group();
                    self.done = true;
                    return Some(Err(EngineError::CallbackFailure { operator: "reduce", record: Box::new(snapshot), source }));
                }
            }
        }
    }
}
