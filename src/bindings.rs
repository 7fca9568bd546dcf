//! Source bindings and the transparent tee that lets the same named source
//! be opened more than once within a single [`crate::graph::Graph::run`].

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::rc::{Rc, Weak};

use crate::error::EngineError;
use crate::record::Record;
use crate::stream::BoxStream;

enum Terminal {
    Done,
    /// The upstream iterator produced an error. Only the consumer that
    /// actually triggered the pull sees the original `EngineError`; any
    /// other consumer that reaches the same position afterwards sees this
    /// reconstructed, string-carrying stand-in instead, since `EngineError`
    /// is not `Clone` (it can carry an arbitrary boxed callback error).
    Errored(String),
}

struct TeeBuffer {
    /// `buffer[i]` holds the record at absolute position `base + i`.
    buffer: VecDeque<Record>,
    base: usize,
    source: Option<BoxStream<'static>>,
    terminal: Option<Terminal>,
    /// Positions of every live cursor, so the buffer can drop records every
    /// cursor has already passed. Entries whose `Weak` no longer upgrades
    /// belong to a dropped cursor and are pruned lazily.
    cursors: Vec<Weak<Cell<usize>>>,
}

impl TeeBuffer {
    fn new(source: BoxStream<'static>) -> Self {
        TeeBuffer {
            buffer: VecDeque::new(),
            base: 0,
            source: Some(source),
            terminal: None,
            cursors: Vec::new(),
        }
    }

    fn register_cursor(&mut self) -> Rc<Cell<usize>> {
        let pos = Rc::new(Cell::new(self.base));
        self.cursors.push(Rc::downgrade(&pos));
        pos
    }

    /// Drops buffered records every live cursor has already consumed.
    fn reclaim(&mut self) {
        self.cursors.retain(|w| w.strong_count() > 0);
        let min = self
            .cursors
            .iter()
            .filter_map(|w| w.upgrade())
            .map(|c| c.get())
            .min();
        if let Some(min) = min {
            while self.base < min && !self.buffer.is_empty() {
                self.buffer.pop_front();
                self.base += 1;
            }
        }
    }

    /// Ensures `buffer` holds an item at absolute position `pos`, pulling
    /// from `source` if needed. Returns the outcome at that position.
    fn fill_to(&mut self, pos: usize) -> Option<Result<Record, EngineError>> {
        loop {
            let idx = pos.checked_sub(self.base);
            if let Some(idx) = idx {
                if idx < self.buffer.len() {
                    return Some(Ok(self.buffer[idx].clone()));
                }
            }
            if let Some(terminal) = &self.terminal {
                return match terminal {
                    Terminal::Done => None,
                    Terminal::Errored(msg) => {
                        Some(Err(EngineError::InvalidSpec(format!("teed source failed: {msg}"))))
                    }
                };
            }
            let source = self.source.as_mut().expect("source present while not yet terminal");
            match source.next() {
                Some(Ok(record)) => self.buffer.push_back(record),
                Some(Err(e)) => {
                    let message = e.to_string();
                    self.terminal = Some(Terminal::Errored(message));
                    self.source = None;
                    return Some(Err(e));
                }
                None => {
                    self.terminal = Some(Terminal::Done);
                    self.source = None;
                }
            }
        }
    }
}

/// One consumer's view over a teed source: an ordinary record stream that
/// happens to share its backing buffer with any sibling cursor opened on
/// the same label.
pub struct TeeCursor {
    shared: Rc<RefCell<TeeBuffer>>,
    position: Rc<Cell<usize>>,
}

impl Iterator for TeeCursor {
    type Item = Result<Record, EngineError>;

    fn next(&mut self) -> Option<Self::Item> {
        let pos = self.position.get();
        let mut shared = self.shared.borrow_mut();
        let item = shared.fill_to(pos);
        if item.is_some() {
            self.position.set(pos + 1);
        }
        shared.reclaim();
        item
    }
}

enum Source {
    /// Not yet opened by anyone.
    Unopened(BoxStream<'static>),
    /// Opened at least once; further opens fan out from the shared buffer.
    Teed(Rc<RefCell<TeeBuffer>>),
    /// Transient placeholder used only while promoting `Unopened` to `Teed`.
    Empty,
}

/// A named association between source labels and caller-supplied record
/// iterators, scoped to one [`crate::graph::Graph::run`] call.
///
/// Binding the same label twice is rejected at `bind` time. Opening the
/// same label twice (which only a join over a shared source name can
/// trigger) is handled transparently: the first [`Bindings::open`] call
/// takes ownership of the raw iterator, and every later call for that label
/// gets an independent [`TeeCursor`] over a shared, self-trimming buffer.
#[derive(Default)]
pub struct Bindings {
    sources: HashMap<String, Source>,
}

impl Bindings {
    /// An empty set of bindings.
    pub fn new() -> Self {
        Bindings { sources: HashMap::new() }
    }

    /// Binds `label` to a stream of already-fallible records.
    ///
    /// Returns [`EngineError::InvalidSpec`] if `label` is already bound.
    pub fn bind_stream(
        &mut self,
        label: impl Into<String>,
        stream: impl Iterator<Item = Result<Record, EngineError>> + 'static,
    ) -> Result<(), EngineError> {
        let label = label.into();
        if self.sources.contains_key(&label) {
            return Err(EngineError::InvalidSpec(format!("source `{label}` is bound more than once")));
        }
        self.sources.insert(label, Source::Unopened(crate::stream::boxed(stream)));
        Ok(())
    }

    /// Binds `label` to a plain iterator of records that cannot itself fail.
    pub fn bind<I>(&mut self, label: impl Into<String>, records: I) -> Result<(), EngineError>
    where
        I: IntoIterator<Item = Record>,
        I::IntoIter: 'static,
    {
        self.bind_stream(label, records.into_iter().map(Ok))
    }

    /// Opens `label`, returning a stream over its records.
    ///
    /// The first open of a label within this `Bindings` hands back the raw
    /// bound iterator directly; every subsequent open tees it.
    pub fn open(&mut self, label: &str) -> Result<BoxStream<'static>, EngineError> {
        let source = self.sources.get_mut(label).ok_or_else(|| EngineError::UnboundSource(label.to_string()))?;
        if let Source::Unopened(_) = source {
            let Source::Unopened(stream) = std::mem::replace(source, Source::Empty) else {
                unreachable!()
            };
            *source = Source::Teed(Rc::new(RefCell::new(TeeBuffer::new(stream))));
        }
        let Source::Teed(shared) = source else {
            unreachable!("promoted to Teed above")
        };
        let position = shared.borrow_mut().register_cursor();
        Ok(Box::new(TeeCursor { shared: Rc::clone(shared), position }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record;
    use crate::value::Value;

    #[test]
    fn single_open_drains_in_order() {
        let mut bindings = Bindings::new();
        bindings.bind("rows", vec![record! {"x" => Value::Int(1)}, record! {"x" => Value::Int(2)}]).unwrap();
        let out: Vec<_> = bindings.open("rows").unwrap().map(|r| r.unwrap()).collect();
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn unbound_source_is_an_error() {
        let mut bindings = Bindings::new();
        assert!(matches!(bindings.open("missing"), Err(EngineError::UnboundSource(_))));
    }

    #[test]
    fn duplicate_bind_is_rejected() {
        let mut bindings = Bindings::new();
        bindings.bind("rows", vec![]).unwrap();
        assert!(matches!(bindings.bind("rows", vec![]), Err(EngineError::InvalidSpec(_))));
    }

    #[test]
    fn two_opens_of_the_same_label_see_the_same_sequence_at_independent_paces() {
        let mut bindings = Bindings::new();
        bindings
            .bind("rows", vec![record! {"x" => Value::Int(1)}, record! {"x" => Value::Int(2)}, record! {"x" => Value::Int(3)}])
            .unwrap();
        let mut first = bindings.open("rows").unwrap();
        assert_eq!(first.next().unwrap().unwrap().get("x"), Some(&Value::Int(1)));

        let second: Vec<_> = bindings.open("rows").unwrap().map(|r| r.unwrap()).collect();
        assert_eq!(second.len(), 3);
        assert_eq!(second[0].get("x"), Some(&Value::Int(1)));

        let rest: Vec<_> = first.map(|r| r.unwrap()).collect();
        assert_eq!(rest.len(), 2);
    }
}
