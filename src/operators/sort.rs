//! Stable sort by a composite key, with a chunked run-and-merge path above
//! a configurable record count.

use std::cmp::Ordering;

use crate::error::EngineError;
use crate::field::FieldName;
use crate::record::Record;
use crate::stream::BoxStream;
use crate::value::Value;

/// Sorts `input` ascending by the composite key named by `keys`.
///
/// Fully materializes the input, since a total order over it cannot be
/// produced without seeing every record. Below `spill_threshold` records
/// this is a single in-memory stable sort (`slice::sort_by`); above it, the
/// input is split into sorted runs of at most `spill_threshold` records
/// each, each run is sorted independently, and the runs are merged on
/// output. This is a chunked in-memory sort, not a memory-bounded external
/// one: every run, and the merge's own output buffer, stays resident for
/// the whole call, so total memory is still O(N) records regardless of
/// `spill_threshold` — only the granularity `slice::sort_by` operates at
/// changes. Either way the final order, and the preservation of input order
/// among equal keys, is identical.
///
/// A mismatched pair of tags anywhere in the key comparison is reported as
/// [`EngineError::TypeMismatch`] and ends the stream with exactly that one
/// error; an idle comparator cannot simply propagate a `Result` (`Ord`'s
/// contract requires a bare `Ordering`), so the first mismatch encountered
/// is latched and surfaced once sorting finishes.
pub fn sort(input: BoxStream<'_>, keys: Vec<FieldName>, spill_threshold: usize) -> Result<BoxStream<'static>, EngineError> {
    assert!(!keys.is_empty(), "Graph::sort rejects an empty key list before this is reached");

    let mut runs: Vec<Vec<(Vec<Value>, Record)>> = Vec::new();
    let mut current: Vec<(Vec<Value>, Record)> = Vec::new();
    let mut input = input;
    loop {
        match input.next() {
            None => break,
            Some(Err(e)) => return Err(e),
            Some(Ok(record)) => {
                let key = record.key_tuple(&keys);
                current.push((key, record));
                if current.len() >= spill_threshold.max(1) {
                    runs.push(std::mem::take(&mut current));
                }
            }
        }
    }
    if !current.is_empty() || runs.is_empty() {
        runs.push(current);
    }

    let mut type_error: Option<EngineError> = None;
    for run in &mut runs {
        run.sort_by(|(a, _), (b, _)| match compare_key_tuples(a, b) {
            Ok(ord) => ord,
            Err(e) => {
                type_error.get_or_insert(e);
                Ordering::Equal
            }
        });
    }
    if let Some(e) = type_error {
        return Err(e);
    }

    if runs.len() == 1 {
        let run = runs.pop().unwrap();
        return Ok(Box::new(run.into_iter().map(|(_, record)| Ok(record))));
    }

    tracing::debug!(run_count = runs.len(), spill_threshold, "sort spilled to external-run merge");
    merge_runs(runs)
}

/// Compares two key tuples position by position, stopping at the first
/// non-equal field (or the first type mismatch).
fn compare_key_tuples(a: &[Value], b: &[Value]) -> Result<Ordering, EngineError> {
    for (x, y) in a.iter().zip(b.iter()) {
        match x.compare(y)? {
            Ordering::Equal => continue,
            other => return Ok(other),
        }
    }
    Ok(Ordering::Equal)
}

/// K-way merges already-sorted runs, breaking ties by run index (earlier
/// run wins), which together with each run's own internal stability
/// reproduces the original input order among equal keys.
fn merge_runs(runs: Vec<Vec<(Vec<Value>, Record)>>) -> Result<BoxStream<'static>, EngineError> {
    let mut cursors: Vec<std::vec::IntoIter<(Vec<Value>, Record)>> = runs.into_iter().map(|r| r.into_iter()).collect();
    let mut heads: Vec<Option<(Vec<Value>, Record)>> = cursors.iter_mut().map(|c| c.next()).collect();

    let mut error: Option<EngineError> = None;
    let mut output = Vec::new();
    loop {
        let mut best: Option<usize> = None;
        for (i, head) in heads.iter().enumerate() {
            let Some((key, _)) = head else { continue };
            best = match best {
                None => Some(i),
                Some(b) => {
                    let Some((best_key, _)) = &heads[b] else { unreachable!() };
                    match key.as_slice().iter().zip(best_key.iter()).try_fold(Ordering::Equal, |acc, (x, y)| {
                        if acc != Ordering::Equal {
                            return Ok(acc);
                        }
                        x.compare(y)
                    }) {
                        Ok(Ordering::Less) => Some(i),
                        Ok(_) => Some(b),
                        Err(e) => {
                            error.get_or_insert(e);
                            Some(b)
                        }
                    }
                }
            };
        }
        let Some(winner) = best else { break };
        if let Some((_, record)) = heads[winner].take() {
            output.push(record);
        }
        heads[winner] = cursors[winner].next();
        if error.is_some() {
            break;
        }
    }

    if let Some(e) = error {
        return Err(e);
    }
    Ok(Box::new(output.into_iter().map(Ok)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record;

    fn fields(names: &[&str]) -> Vec<FieldName> {
        names.iter().map(|n| FieldName::new(*n)).collect()
    }

    #[test]
    fn sorts_ascending_and_is_stable_on_ties() {
        let input: BoxStream = Box::new(
            vec![
                record! {"k" => Value::Int(2), "tag" => Value::string("a")},
                record! {"k" => Value::Int(1), "tag" => Value::string("b")},
                record! {"k" => Value::Int(1), "tag" => Value::string("c")},
            ]
            .into_iter()
            .map(Ok),
        );
        let out: Vec<_> = sort(input, fields(&["k"]), 1_000).unwrap().map(|r| r.unwrap()).collect();
        assert_eq!(out[0].get("tag"), Some(&Value::string("b")));
        assert_eq!(out[1].get("tag"), Some(&Value::string("c")));
        assert_eq!(out[2].get("tag"), Some(&Value::string("a")));
    }

    #[test]
    fn missing_key_field_is_treated_as_null_and_conflicts_with_a_typed_key() {
        let input: BoxStream = Box::new(
            vec![record! {"k" => Value::Int(1)}, record! {}].into_iter().map(Ok),
        );
        let mut out = sort(input, fields(&["k"]), 1_000).unwrap();
        assert!(matches!(out.next(), Some(Err(EngineError::TypeMismatch { .. }))));
    }

    #[test]
    fn missing_key_field_among_other_nulls_sorts_without_error() {
        let input: BoxStream = Box::new(vec![record! {}, record! {}].into_iter().map(Ok));
        let out: Vec<_> = sort(input, fields(&["k"]), 1_000).unwrap().map(|r| r.unwrap()).collect();
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn cross_tag_keys_raise_type_mismatch() {
        let input: BoxStream = Box::new(
            vec![record! {"k" => Value::Int(1)}, record! {"k" => Value::string("x")}].into_iter().map(Ok),
        );
        let mut out = sort(input, fields(&["k"]), 1_000).unwrap();
        assert!(matches!(out.next(), Some(Err(EngineError::TypeMismatch { .. }))));
    }

    #[test]
    fn spilling_to_external_runs_matches_in_memory_order() {
        let records: Vec<Record> = (0..23).rev().map(|i| record! {"k" => Value::Int(i)}).collect();
        let in_memory: Vec<_> = sort(Box::new(records.clone().into_iter().map(Ok)), fields(&["k"]), 1_000)
            .unwrap()
            .map(|r| r.unwrap())
            .collect();
        let spilled: Vec<_> = sort(Box::new(records.into_iter().map(Ok)), fields(&["k"]), 4)
            .unwrap()
            .map(|r| r.unwrap())
            .collect();
        let in_memory_keys: Vec<_> = in_memory.iter().map(|r| r.get("k").cloned()).collect();
        let spilled_keys: Vec<_> = spilled.iter().map(|r| r.get("k").cloned()).collect();
        assert_eq!(in_memory_keys, spilled_keys);
    }

    #[test]
    fn sort_idempotence() {
        let records: Vec<Record> = vec![
            record! {"k" => Value::Int(3)},
            record! {"k" => Value::Int(1)},
            record! {"k" => Value::Int(2)},
        ];
        let once: Vec<_> = sort(Box::new(records.clone().into_iter().map(Ok)), fields(&["k"]), 1_000)
            .unwrap()
            .map(|r| r.unwrap())
            .collect();
        let twice: Vec<_> = sort(Box::new(once.clone().into_iter().map(Ok)), fields(&["k"]), 1_000)
            .unwrap()
            .map(|r| r.unwrap())
            .collect();
        assert_eq!(once, twice);
    }
}
