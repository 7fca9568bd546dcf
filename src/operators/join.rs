//! Hash join over two record streams.

use std::collections::{HashMap, VecDeque};

use crate::error::EngineError;
use crate::field::FieldName;
use crate::record::Record;
use crate::stream::BoxStream;
use crate::value::Value;

/// Which rows a join keeps when one side has no matching counterpart.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JoinStrategy {
    /// Only rows with a match on both sides.
    Inner,
    /// Every left row; unmatched ones carry only their own fields.
    Left,
    /// Every right row; unmatched ones carry only their own fields.
    Right,
    /// Every row from both sides.
    Full,
    /// Every combination of left and right rows; no key comparison at all.
    Cross,
}

impl JoinStrategy {
    fn keeps_unmatched_right(self) -> bool {
        matches!(self, JoinStrategy::Right | JoinStrategy::Full)
    }

    fn keeps_unmatched_left(self) -> bool {
        matches!(self, JoinStrategy::Left | JoinStrategy::Full)
    }
}

enum Phase {
    Streaming,
    UnmatchedRight,
    Done,
}

/// Joins `left` against `right` on `left_key` / `right_key`.
///
/// The right side is fully materialized into an index keyed by
/// [`Value::structural_eq`] (a `HashMap` over [`Value`]'s derived `Eq`/`Hash`,
/// which is structural, not the coercing order [`Value::compare`] defines);
/// the left side stays a single pull-based pass over it. A join key that is
/// absent from a record — or present as [`Value::Null`] — never matches
/// anything, including another null key on the other side; under
/// `strict_keys` an absent key field is [`EngineError::MissingKey`] instead.
///
/// [`JoinStrategy::Cross`] skips the index and keying entirely: every left
/// row is paired with every right row.
pub fn join(
    left: BoxStream<'static>,
    right: BoxStream<'static>,
    left_key: FieldName,
    right_key: FieldName,
    strategy: JoinStrategy,
    strict_keys: bool,
    size_warning_threshold: usize,
) -> Result<BoxStream<'static>, EngineError> {
    let mut right_rows = Vec::new();
    let mut index: HashMap<Value, Vec<usize>> = HashMap::new();
    for item in right {
        let record = item?;
        if strategy != JoinStrategy::Cross {
            let key = read_key(&record, &right_key, "join", strict_keys)?;
            if !key.is_null() {
                index.entry(key).or_default().push(right_rows.len());
            }
        }
        right_rows.push(record);
    }
    if right_rows.len() > size_warning_threshold {
        tracing::warn!(
            right_rows = right_rows.len(),
            threshold = size_warning_threshold,
            "join materialized a right side larger than the size warning threshold"
        );
    }

    let right_matched = vec![false; right_rows.len()];
    Ok(Box::new(JoinStream {
        left,
        right_rows,
        right_matched,
        index,
        left_key,
        strategy,
        strict_keys,
        pending: VecDeque::new(),
        unmatched_right_idx: 0,
        phase: Phase::Streaming,
    }))
}

fn read_key(record: &Record, field: &FieldName, operator: &'static str, strict: bool) -> Result<Value, EngineError> {
    match record.get(field) {
        Some(value) => Ok(value.clone()),
        None if strict => Err(EngineError::MissingKey { field: field.to_string(), operator }),
        None => Ok(Value::Null),
    }
}

struct JoinStream {
    left: BoxStream<'static>,
    right_rows: Vec<Record>,
    right_matched: Vec<bool>,
    index: HashMap<Value, Vec<usize>>,
    left_key: FieldName,
    strategy: JoinStrategy,
    strict_keys: bool,
    pending: VecDeque<Record>,
    unmatched_right_idx: usize,
    phase: Phase,
}

impl JoinStream {
    fn process_left_row(&mut self, left_row: Record) -> Result<(), EngineError> {
        if self.strategy == JoinStrategy::Cross {
            for right_row in &self.right_rows {
                self.pending.push_back(Record::merge_with_collision_suffixes(&left_row, right_row));
            }
            return Ok(());
        }

        let key = read_key(&left_row, &self.left_key, "join", self.strict_keys)?;
        let matches = if key.is_null() { &[][..] } else { self.index.get(&key).map(Vec::as_slice).unwrap_or(&[][..]) };

        if matches.is_empty() {
            if self.strategy.keeps_unmatched_left() {
                self.pending.push_back(left_row);
            }
            return Ok(());
        }

        for &idx in matches {
            self.right_matched[idx] = true;
            self.pending.push_back(Record::merge_with_collision_suffixes(&left_row, &self.right_rows[idx]));
        }
        Ok(())
    }
}

impl Iterator for JoinStream {
    type Item = Result<Record, EngineError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(record) = self.pending.pop_front() {
                return Some(Ok(record));
            }
            match self.phase {
                Phase::Done => return None,
                Phase::UnmatchedRight => {
                    while self.unmatched_right_idx < self.right_rows.len() {
                        let idx = self.unmatched_right_idx;
                        self.unmatched_right_idx += 1;
                        if !self.right_matched[idx] {
                            return Some(Ok(self.right_rows[idx].clone()));
                        }
                    }
                    self.phase = Phase::Done;
                }
                Phase::Streaming => match self.left.next() {
                    None => {
                        self.phase = if self.strategy.keeps_unmatched_right() { Phase::UnmatchedRight } else { Phase::Done };
                    }
                    Some(Err(e)) => {
                        self.phase = Phase::Done;
                        return Some(Err(e));
                    }
                    Some(Ok(left_row)) => {
                        if let Err(e) = self.process_left_row(left_row) {
                            self.phase = Phase::Done;
                            return Some(Err(e));
                        }
                    }
                },
            }
        }
    }
}
