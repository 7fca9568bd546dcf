//! Concrete end-to-end scenarios run against a whole [`Graph`].

use tableflow::error::CallbackError;
use tableflow::operators::GroupStream;
use tableflow::{record, Bindings, EngineConfig, EngineError, FieldName, Graph, JoinStrategy, Record, Value};

fn split_into_words(record: &Record) -> Result<Box<dyn Iterator<Item = Record>>, CallbackError> {
    let text = match record.get("text") {
        Some(Value::String(s)) => s.clone(),
        _ => String::new(),
    };
    let words: Vec<Record> = text.split_whitespace().map(|w| record! {"word" => Value::string(w)}).collect();
    Ok(Box::new(words.into_iter()))
}

fn count_group(group: GroupStream) -> Result<Box<dyn Iterator<Item = Record>>, CallbackError> {
    let mut count = 0i64;
    let mut word = None;
    for record in group {
        count += 1;
        if word.is_none() {
            word = record.get("word").cloned();
        }
    }
    let mut out = Record::new();
    if let Some(word) = word {
        out.insert("word", word);
    }
    out.insert("count", Value::Int(count));
    Ok(Box::new(std::iter::once(out)))
}

#[test]
fn word_count() {
    let plan = Graph::source("docs")
        .map(split_into_words)
        .sort(vec![FieldName::new("word")])
        .unwrap()
        .reduce(vec![FieldName::new("word")], count_group)
        .unwrap();

    let mut bindings = Bindings::new();
    bindings
        .bind(
            "docs",
            vec![
                record! {"doc_id" => Value::Int(1), "text" => Value::string("a b a")},
                record! {"doc_id" => Value::Int(2), "text" => Value::string("b c")},
            ],
        )
        .unwrap();

    let out = plan.run(bindings).unwrap();
    assert_eq!(out.len(), 3);
    assert_eq!(out[0].get("word"), Some(&Value::string("a")));
    assert_eq!(out[0].get("count"), Some(&Value::Int(2)));
    assert_eq!(out[1].get("word"), Some(&Value::string("b")));
    assert_eq!(out[1].get("count"), Some(&Value::Int(2)));
    assert_eq!(out[2].get("word"), Some(&Value::string("c")));
    assert_eq!(out[2].get("count"), Some(&Value::Int(1)));
}

#[test]
fn fold_sum() {
    let sum = |state: Value, record: Record| -> Result<Value, CallbackError> {
        let Value::Int(total) = state else { unreachable!() };
        let added = match record.get("x") {
            Some(Value::Int(n)) => *n,
            _ => 0,
        };
        Ok(Value::Int(total + added))
    };
    let plan = Graph::source("rows").fold(sum, Value::Int(0));

    let mut bindings = Bindings::new();
    bindings.bind("rows", vec![record! {"x" => Value::Int(1)}, record! {"x" => Value::Int(2)}, record! {"x" => Value::Int(3)}]).unwrap();

    let out = plan.run(bindings).unwrap();
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].get("value"), Some(&Value::Int(6)));
}

#[test]
fn inner_join_with_collision() {
    let left = Graph::source("left");
    let right = Graph::source("right");
    let plan = left.join(right, "id", "id", JoinStrategy::Inner);

    let mut bindings = Bindings::new();
    bindings.bind("left", vec![record! {"id" => Value::Int(1), "mail" => Value::string("a")}, record! {"id" => Value::Int(2), "mail" => Value::string("b")}]).unwrap();
    bindings.bind("right", vec![record! {"id" => Value::Int(1), "msg" => Value::string("x")}, record! {"id" => Value::Int(3), "msg" => Value::string("y")}]).unwrap();

    let out = plan.run(bindings).unwrap();
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].get("id_left"), Some(&Value::Int(1)));
    assert_eq!(out[0].get("id_right"), Some(&Value::Int(1)));
    assert_eq!(out[0].get("mail"), Some(&Value::string("a")));
    assert_eq!(out[0].get("msg"), Some(&Value::string("x")));
}

#[test]
fn left_join_keeps_unmatched_left_rows_with_no_right_side_fields_at_all() {
    let left = Graph::source("left");
    let right = Graph::source("right");
    let plan = left.join(right, "id", "id", JoinStrategy::Left);

    let mut bindings = Bindings::new();
    bindings.bind("left", vec![record! {"id" => Value::Int(1), "mail" => Value::string("a")}, record! {"id" => Value::Int(2), "mail" => Value::string("b")}]).unwrap();
    bindings.bind("right", vec![record! {"id" => Value::Int(1), "msg" => Value::string("x")}, record! {"id" => Value::Int(3), "msg" => Value::string("y")}]).unwrap();

    let out = plan.run(bindings).unwrap();
    assert_eq!(out.len(), 2);
    let unmatched = &out[1];
    assert_eq!(unmatched.get("id"), Some(&Value::Int(2)));
    assert_eq!(unmatched.get("mail"), Some(&Value::string("b")));
    assert_eq!(unmatched.get("id_left"), None);
    assert_eq!(unmatched.get("msg"), None);
}

#[test]
fn right_and_full_join_emit_unmatched_right_rows() {
    let mut bindings = Bindings::new();
    bindings.bind("left", vec![record! {"id" => Value::Int(1)}]).unwrap();
    bindings.bind("right", vec![record! {"id" => Value::Int(1)}, record! {"id" => Value::Int(9)}]).unwrap();
    let right_plan = Graph::source("left").join(Graph::source("right"), "id", "id", JoinStrategy::Right);
    let right_out = right_plan.run(bindings).unwrap();
    assert_eq!(right_out.len(), 2);
    assert_eq!(right_out[1].get("id"), Some(&Value::Int(9)));

    let mut bindings = Bindings::new();
    bindings.bind("left", vec![record! {"id" => Value::Int(1)}, record! {"id" => Value::Int(7)}]).unwrap();
    bindings.bind("right", vec![record! {"id" => Value::Int(1)}, record! {"id" => Value::Int(9)}]).unwrap();
    let full_plan = Graph::source("left").join(Graph::source("right"), "id", "id", JoinStrategy::Full);
    let full_out = full_plan.run(bindings).unwrap();
    assert_eq!(full_out.len(), 3);
}

#[test]
fn cross_product_is_left_major_then_right_major() {
    let plan = Graph::source("left").join(Graph::source("right"), "a", "b", JoinStrategy::Cross);

    let mut bindings = Bindings::new();
    bindings.bind("left", vec![record! {"a" => Value::Int(1)}, record! {"a" => Value::Int(2)}]).unwrap();
    bindings.bind("right", vec![record! {"b" => Value::Int(10)}, record! {"b" => Value::Int(20)}]).unwrap();

    let out = plan.run(bindings).unwrap();
    assert_eq!(out.len(), 4);
    assert_eq!(out[0].get("a"), Some(&Value::Int(1)));
    assert_eq!(out[0].get("b"), Some(&Value::Int(10)));
    assert_eq!(out[1].get("a"), Some(&Value::Int(1)));
    assert_eq!(out[1].get("b"), Some(&Value::Int(20)));
    assert_eq!(out[2].get("a"), Some(&Value::Int(2)));
    assert_eq!(out[3].get("a"), Some(&Value::Int(2)));
}

#[test]
fn the_reducer_sees_contiguous_groups_even_when_the_source_is_out_of_order() {
    let plan = Graph::source("docs")
        .map(split_into_words)
        .sort(vec![FieldName::new("word")])
        .unwrap()
        .reduce(vec![FieldName::new("word")], count_group)
        .unwrap();

    let mut bindings = Bindings::new();
    bindings
        .bind(
            "docs",
            vec![
                record! {"text" => Value::string("c a b")},
                record! {"text" => Value::string("a b c")},
            ],
        )
        .unwrap();

    let out = plan.run(bindings).unwrap();
    assert_eq!(out.len(), 3);
    for record in &out {
        assert_eq!(record.get("count"), Some(&Value::Int(2)));
    }
}

#[test]
fn a_cross_tag_sort_key_error_surfaces_as_a_stream_item_not_a_panic() {
    let plan = Graph::source("rows").sort(vec![FieldName::new("k")]).unwrap();
    let mut bindings = Bindings::new();
    bindings.bind("rows", vec![record! {"k" => Value::Int(1)}, record! {"k" => Value::string("x")}]).unwrap();

    let mut stream = plan.run_stream(bindings).unwrap();
    assert!(matches!(stream.next(), Some(Err(EngineError::TypeMismatch { .. }))));
    assert!(stream.next().is_none());
}

#[test]
fn an_unbound_source_is_reported_at_run() {
    let plan = Graph::source("docs");
    let err = plan.run(Bindings::new()).unwrap_err();
    assert!(matches!(err, EngineError::UnboundSource(label) if label == "docs"));
}

#[test]
fn binding_the_same_label_twice_is_an_invalid_spec() {
    let mut bindings = Bindings::new();
    bindings.bind("docs", vec![record! {}]).unwrap();
    let err = bindings.bind("docs", vec![record! {}]).unwrap_err();
    assert!(matches!(err, EngineError::InvalidSpec(_)));
}

#[test]
fn spilling_to_external_runs_produces_the_same_order_as_an_in_memory_sort() {
    let records: Vec<Record> = (0..50).rev().map(|i| record! {"k" => Value::Int(i)}).collect();

    let plan = Graph::source("rows").sort(vec![FieldName::new("k")]).unwrap();

    let mut in_memory_bindings = Bindings::new();
    in_memory_bindings.bind("rows", records.clone()).unwrap();
    let in_memory = plan.run_with_config(in_memory_bindings, EngineConfig::default()).unwrap();

    let mut spilled_bindings = Bindings::new();
    spilled_bindings.bind("rows", records).unwrap();
    let spilled = plan.run_with_config(spilled_bindings, EngineConfig { sort_spill_threshold: 8, ..EngineConfig::default() }).unwrap();

    let in_memory_keys: Vec<_> = in_memory.iter().map(|r| r.get("k").cloned()).collect();
    let spilled_keys: Vec<_> = spilled.iter().map(|r| r.get("k").cloned()).collect();
    assert_eq!(in_memory_keys, spilled_keys);
}
