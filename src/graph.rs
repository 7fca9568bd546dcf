//! Query plans: a tree of operator nodes that can be run repeatedly against
//! different bindings.

use std::rc::Rc;

use crate::bindings::Bindings;
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::field::{FieldName, Keys};
use crate::operators::{self, Folder, JoinStrategy, MapStream, Mapper, ReduceStream, Reducer};
use crate::record::Record;
use crate::stream::BoxStream;
use crate::value::Value;

/// A data-flow plan: a DAG of operator nodes rooted at a single output.
///
/// `Graph` is built up by chaining the builder methods below, starting from
/// [`Graph::source`]. Every recursive field is an `Rc`, so cloning a `Graph`
/// — including implicitly, by capturing one as a Join operand — is a
/// constant-time refcount bump rather than a deep copy of the plan tree.
/// `Graph` holds no open streams and borrows nothing from a particular run,
/// so the same value can be [`Graph::run`] more than once, against the same
/// or different [`Bindings`], and is guaranteed to produce the same output
/// for the same bindings every time.
#[derive(Clone)]
pub enum Graph {
    /// Reads a named, externally bound source of records.
    Source(String),
    /// Applies a [`Mapper`] to every record of its input.
    Map(Rc<Graph>, Rc<dyn Mapper>),
    /// Stably sorts its input by a composite key.
    Sort(Rc<Graph>, Vec<FieldName>),
    /// Folds its input to a single terminal record.
    Fold(Rc<Graph>, Rc<dyn Folder>, Value),
    /// Groups its input (which must already be sorted by `keys`) and
    /// applies a [`Reducer`] to each group.
    Reduce(Rc<Graph>, Vec<FieldName>, Rc<dyn Reducer>),
    /// Joins two sub-plans on a pair of key fields.
    Join(Rc<Graph>, Rc<Graph>, FieldName, FieldName, JoinStrategy),
}

impl Graph {
    /// Starts a plan by reading the named source.
    pub fn source(name: impl Into<String>) -> Self {
        Graph::Source(name.into())
    }

    /// Applies `mapper` to every record, in place of this plan.
    pub fn map(self, mapper: impl Mapper + 'static) -> Self {
        Graph::Map(Rc::new(self), Rc::new(mapper))
    }

    /// Stably sorts by `keys`.
    ///
    /// Returns [`EngineError::InvalidSpec`] if `keys` is empty: a sort with
    /// no key fields has no defined order to establish.
    pub fn sort(self, keys: impl Into<Keys>) -> Result<Self, EngineError> {
        let keys = keys.into().0;
        if keys.is_empty() {
            return Err(EngineError::InvalidSpec("sort requires at least one key field".into()));
        }
        Ok(Graph::Sort(Rc::new(self), keys))
    }

    /// Folds to one terminal record, starting from `initial`.
    pub fn fold(self, folder: impl Folder + 'static, initial: Value) -> Self {
        Graph::Fold(Rc::new(self), Rc::new(folder), initial)
    }

    /// Groups contiguous runs sharing `keys` and reduces each with `reducer`.
    ///
    /// Returns [`EngineError::InvalidSpec`] if `keys` is empty, for the same
    /// reason `sort` does.
    pub fn reduce(self, keys: impl Into<Keys>, reducer: impl Reducer + 'static) -> Result<Self, EngineError> {
        let keys = keys.into().0;
        if keys.is_empty() {
            return Err(EngineError::InvalidSpec("reduce requires at least one key field".into()));
        }
        Ok(Graph::Reduce(Rc::new(self), keys, Rc::new(reducer)))
    }

    /// Joins this plan (the left side) against `other` (the right side).
    pub fn join(self, other: Graph, left_key: impl Into<FieldName>, right_key: impl Into<FieldName>, strategy: JoinStrategy) -> Self {
        Graph::Join(Rc::new(self), Rc::new(other), left_key.into(), right_key.into(), strategy)
    }

    /// Runs the plan to completion against `bindings`, using
    /// [`EngineConfig::default`], and collects every output record.
    pub fn run(&self, bindings: Bindings) -> Result<Vec<Record>, EngineError> {
        self.run_with_config(bindings, EngineConfig::default())
    }

    /// Like [`Graph::run`], with an explicit [`EngineConfig`].
    pub fn run_with_config(&self, bindings: Bindings, config: EngineConfig) -> Result<Vec<Record>, EngineError> {
        self.run_stream_with_config(bindings, config)?.collect()
    }

    /// Runs the plan and returns the output as a lazy stream instead of
    /// collecting it, using [`EngineConfig::default`].
    pub fn run_stream(&self, bindings: Bindings) -> Result<BoxStream<'static>, EngineError> {
        self.run_stream_with_config(bindings, EngineConfig::default())
    }

    /// Like [`Graph::run_stream`], with an explicit [`EngineConfig`].
    pub fn run_stream_with_config(&self, bindings: Bindings, config: EngineConfig) -> Result<BoxStream<'static>, EngineError> {
        let mut bindings = bindings;
        self.render(&mut bindings, &config)
    }

    fn render(&self, bindings: &mut Bindings, config: &EngineConfig) -> Result<BoxStream<'static>, EngineError> {
        match self {
            Graph::Source(label) => {
                let _span = tracing::debug_span!("source", label = %label).entered();
                bindings.open(label)
            }
            Graph::Map(input, mapper) => {
                let _span = tracing::debug_span!("map").entered();
                let input = input.render(bindings, config)?;
                Ok(Box::new(MapStream::new(input, Rc::clone(mapper))))
            }
            Graph::Sort(input, keys) => {
                let _span = tracing::debug_span!("sort", keys = ?keys).entered();
                let input = input.render(bindings, config)?;
                operators::sort(input, keys.clone(), config.sort_spill_threshold)
            }
            Graph::Fold(input, folder, initial) => {
                let _span = tracing::debug_span!("fold").entered();
                let input = input.render(bindings, config)?;
                operators::fold(input, folder.as_ref(), initial.clone())
            }
            Graph::Reduce(input, keys, reducer) => {
                let _span = tracing::debug_span!("reduce", keys = ?keys).entered();
                let input = input.render(bindings, config)?;
                Ok(Box::new(ReduceStream::new(input, keys.clone(), Rc::clone(reducer), config.strict_keys)))
            }
            Graph::Join(left, right, left_key, right_key, strategy) => {
                let _span = tracing::debug_span!("join", strategy = ?strategy).entered();
                let left = left.render(bindings, config)?;
                let right = right.render(bindings, config)?;
                operators::join(left, right, left_key.clone(), right_key.clone(), *strategy, config.strict_keys, config.join_size_warning_threshold)
            }
        }
    }
}
