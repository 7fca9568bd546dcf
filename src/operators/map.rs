//! One-to-many, order-preserving transformation of a stream.

use crate::error::{CallbackError, EngineError};
use crate::record::Record;
use crate::stream::BoxStream;

/// The callback a `map` step invokes once per input record.
///
/// Returns a lazy sequence of zero or more output records; the engine
/// drains that sequence fully, in order, before pulling the next input
/// record, which is what keeps `map` at constant additional memory beyond
/// whatever the callback's own returned iterator holds.
pub trait Mapper {
    /// Transforms one record into zero or more output records.
    fn call(&self, record: &Record) -> Result<Box<dyn Iterator<Item = Record>>, CallbackError>;
}

impl<F> Mapper for F
where
    F: Fn(&Record) -> Result<Box<dyn Iterator<Item = Record>>, CallbackError>,
{
    fn call(&self, record: &Record) -> Result<Box<dyn Iterator<Item = Record>>, CallbackError> {
        self(record)
    }
}

/// Wraps `input` with a [`Mapper`], concatenating its per-record outputs in input order.
pub struct MapStream<'a> {
    input: BoxStream<'a>,
    mapper: std::rc::Rc<dyn Mapper + 'a>,
    current: Option<Box<dyn Iterator<Item = Record>>>,
    poisoned: bool,
}

impl<'a> MapStream<'a> {
    /// Builds a map step over `input`.
    pub fn new(input: BoxStream<'a>, mapper: std::rc::Rc<dyn Mapper + 'a>) -> Self {
        MapStream { input, mapper, current: None, poisoned: false }
    }
}

impl<'a> Iterator for MapStream<'a> {
    type Item = Result<Record, EngineError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.poisoned {
            return None;
        }
        loop {
            if let Some(current) = &mut self.current {
                if let Some(record) = current.next() {
                    return Some(Ok(record));
                }
                self.current = None;
            }

            match self.input.next()? {
                Err(e) => {
                    self.poisoned = true;
                    return Some(Err(e));
                }
                Ok(record) => match self.mapper.call(&record) {
                    Ok(out) => self.current = Some(out),
                    Err(source) => {
                        self.poisoned = true;
                        return Some(Err(EngineError::CallbackFailure {
                            operator: "map",
                            record: Box::new(record),
                            source,
                        }));
                    }
                },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record;
    use crate::value::Value;
    use std::rc::Rc;

    fn ok_box(records: Vec<Record>) -> Result<Box<dyn Iterator<Item = Record>>, CallbackError> {
        Ok(Box::new(records.into_iter()))
    }

    #[test]
    fn identity_mapper_preserves_the_stream() {
        let input: BoxStream = Box::new(
            vec![record! {"x" => Value::Int(1)}, record! {"x" => Value::Int(2)}]
                .into_iter()
                .map(Ok),
        );
        let mapper: Rc<dyn Mapper> = Rc::new(|r: &Record| ok_box(vec![r.clone()]));
        let out: Vec<_> = MapStream::new(input, mapper).map(|r| r.unwrap()).collect();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].get("x"), Some(&Value::Int(1)));
    }

    #[test]
    fn one_to_many_concatenates_in_order() {
        let input: BoxStream = Box::new(vec![record! {"n" => Value::Int(2)}].into_iter().map(Ok));
        let mapper: Rc<dyn Mapper> = Rc::new(|r: &Record| {
            let n = match r.get("n") {
                Some(Value::Int(n)) => *n,
                _ => 0,
            };
            ok_box((0..n).map(|i| record! {"i" => Value::Int(i)}).collect())
        });
        let out: Vec<_> = MapStream::new(input, mapper).map(|r| r.unwrap()).collect();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].get("i"), Some(&Value::Int(0)));
        assert_eq!(out[1].get("i"), Some(&Value::Int(1)));
    }

    #[test]
    fn callback_failure_poisons_the_stream() {
        let input: BoxStream = Box::new(
            vec![record! {"x" => Value::Int(1)}, record! {"x" => Value::Int(2)}]
                .into_iter()
                .map(Ok),
        );
        let mapper: Rc<dyn Mapper> = Rc::new(|_: &Record| Err("boom".into()));
        let mut stream = MapStream::new(input, mapper);
        assert!(matches!(stream.next(), Some(Err(EngineError::CallbackFailure { .. }))));
        assert!(stream.next().is_none());
    }
}
