//! In-process document collection.
//!
//! Evaluates the filter and pipeline subset the query helpers need, so they
//! can run without a database server.

use std::cmp::Ordering;
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};

use async_trait::async_trait;
use mongodb::bson::{Bson, Document};

use crate::documents::DocumentCollection;
use crate::error::{Error, Result};

// == Memory Collection ==
/// A named `Vec<Document>` queried with Mongo-style filters and pipelines.
///
/// Supported filter operators: equality (array fields match on any element),
/// `$eq $ne $gt $gte $lt $lte $in`, `$and`, `$or`, `$nor`. Supported stages:
/// `$match $project $sort $limit`. Anything else fails with
/// [`Error::Query`].
#[derive(Debug)]
pub struct MemoryCollection {
    name: String,
    documents: Vec<Document>,
    queries: AtomicUsize,
}

impl MemoryCollection {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_documents(name, Vec::new())
    }

    pub fn with_documents(name: impl Into<String>, documents: Vec<Document>) -> Self {
        Self {
            name: name.into(),
            documents,
            queries: AtomicUsize::new(0),
        }
    }

    pub fn insert(&mut self, document: Document) {
        self.documents.push(document);
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Number of `find`/`aggregate` calls that reached this collection.
    pub fn queries(&self) -> usize {
        self.queries.load(AtomicOrdering::SeqCst)
    }
}

#[async_trait]
impl DocumentCollection for MemoryCollection {
    async fn aggregate(&self, pipeline: Vec<Document>) -> Result<Vec<Document>> {
        self.queries.fetch_add(1, AtomicOrdering::SeqCst);

        let mut docs = self.documents.clone();
        for stage in &pipeline {
            docs = apply_stage(docs, stage)?;
        }
        Ok(docs)
    }

    async fn find(&self, filter: Document) -> Result<Vec<Document>> {
        self.queries.fetch_add(1, AtomicOrdering::SeqCst);

        let mut found = Vec::new();
        for doc in &self.documents {
            if matches_filter(doc, &filter)? {
                found.push(doc.clone());
            }
        }
        Ok(found)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

// == Pipeline Stages ==
fn apply_stage(docs: Vec<Document>, stage: &Document) -> Result<Vec<Document>> {
    let Some((op, spec)) = stage.iter().next() else {
        return Err(Error::Query("empty pipeline stage".to_string()));
    };

    match (op.as_str(), spec) {
        ("$match", Bson::Document(filter)) => {
            let mut kept = Vec::with_capacity(docs.len());
            for doc in docs {
                if matches_filter(&doc, filter)? {
                    kept.push(doc);
                }
            }
            Ok(kept)
        }
        ("$project", Bson::Document(spec)) => docs.iter().map(|doc| project(doc, spec)).collect(),
        ("$sort", Bson::Document(spec)) => sort(docs, spec),
        ("$limit", limit) => {
            let limit = as_f64(limit)
                .filter(|n| *n >= 1.0 && n.fract() == 0.0)
                .ok_or_else(|| Error::Query("$limit expects a positive integer".to_string()))?;
            let mut docs = docs;
            docs.truncate(limit as usize);
            Ok(docs)
        }
        (op, _) => Err(Error::Query(format!("unsupported pipeline stage {}", op))),
    }
}

fn project(doc: &Document, spec: &Document) -> Result<Document> {
    let mut out = Document::new();

    let keep_id = !matches!(spec.get("_id").and_then(projection_flag), Some(false));
    if keep_id {
        if let Some(id) = doc.get("_id") {
            out.insert("_id", id.clone());
        }
    }

    for (field, expr) in spec {
        match projection_flag(expr) {
            Some(_) if field == "_id" => {}
            Some(true) => {
                let segments: Vec<&str> = field.split('.').collect();
                if let Some((first, rest)) = segments.split_first() {
                    if let Some(value) = doc.get(*first).and_then(|v| include_path(v, rest)) {
                        merge_field(&mut out, first, value);
                    }
                }
            }
            Some(false) => {
                return Err(Error::Query(format!(
                    "exclusion of '{}' is not supported in $project",
                    field
                )))
            }
            None => {
                if let Some(value) = evaluate(doc, expr)? {
                    out.insert(field.clone(), value);
                }
            }
        }
    }
    Ok(out)
}

/// Keeps only `rest` of `value`, preserving the nesting (and arrays of
/// subdocuments) along the way.
fn include_path(value: &Bson, rest: &[&str]) -> Option<Bson> {
    let Some((next, tail)) = rest.split_first() else {
        return Some(value.clone());
    };

    match value {
        Bson::Document(inner) => {
            let kept = include_path(inner.get(*next)?, tail)?;
            let mut out = Document::new();
            out.insert(*next, kept);
            Some(Bson::Document(out))
        }
        Bson::Array(items) => Some(Bson::Array(
            items
                .iter()
                .filter(|item| matches!(item, Bson::Document(_)))
                .filter_map(|item| include_path(item, rest))
                .collect(),
        )),
        _ => None,
    }
}

/// Inserts `value` at `key`, merging with an existing subdocument so that
/// `"a.b": 1, "a.c": 1` yield one `a` document.
fn merge_field(out: &mut Document, key: &str, value: Bson) {
    match value {
        Bson::Document(incoming) => {
            if let Some(Bson::Document(existing)) = out.get_mut(key) {
                for (k, v) in incoming {
                    merge_field(existing, &k, v);
                }
                return;
            }
            out.insert(key, Bson::Document(incoming));
        }
        value => {
            out.insert(key, value);
        }
    }
}

fn sort(mut docs: Vec<Document>, spec: &Document) -> Result<Vec<Document>> {
    let mut keys = Vec::with_capacity(spec.len());
    for (field, direction) in spec {
        let direction = match as_f64(direction) {
            Some(d) if d == 1.0 => 1,
            Some(d) if d == -1.0 => -1,
            _ => {
                return Err(Error::Query(format!(
                    "$sort direction for '{}' must be 1 or -1",
                    field
                )))
            }
        };
        keys.push((field.as_str(), direction));
    }

    docs.sort_by(|a, b| {
        for (field, direction) in &keys {
            let ordering = compare_values(
                resolve_path(a, field).as_ref(),
                resolve_path(b, field).as_ref(),
            );
            let ordering = if *direction < 0 { ordering.reverse() } else { ordering };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    });
    Ok(docs)
}

// == Expressions ==
fn evaluate(doc: &Document, expr: &Bson) -> Result<Option<Bson>> {
    match expr {
        Bson::String(s) if s.starts_with('$') => Ok(resolve_path(doc, &s[1..])),
        Bson::Document(inner) => {
            let mut entries = inner.iter();
            match (entries.next(), entries.next()) {
                (Some((op, arg)), None) if op.starts_with('$') => evaluate_operator(doc, op, arg),
                _ => {
                    let mut out = Document::new();
                    for (field, value) in inner {
                        if let Some(value) = evaluate(doc, value)? {
                            out.insert(field.clone(), value);
                        }
                    }
                    Ok(Some(Bson::Document(out)))
                }
            }
        }
        other => Ok(Some(other.clone())),
    }
}

fn evaluate_operator(doc: &Document, op: &str, arg: &Bson) -> Result<Option<Bson>> {
    if op == "$literal" {
        return Ok(Some(arg.clone()));
    }

    let operand = evaluate(doc, arg)?;

    if op == "$size" {
        return match operand {
            Some(Bson::Array(items)) => Ok(Some(Bson::Int32(items.len() as i32))),
            _ => Err(Error::Query("$size requires an array".to_string())),
        };
    }

    let numbers: Vec<Bson> = match operand {
        Some(Bson::Array(items)) => items.into_iter().filter(|b| as_f64(b).is_some()).collect(),
        Some(value) if as_f64(&value).is_some() => vec![value],
        _ => Vec::new(),
    };

    let result = match op {
        "$avg" => {
            if numbers.is_empty() {
                Bson::Null
            } else {
                let total: f64 = numbers.iter().filter_map(as_f64).sum();
                Bson::Double(total / numbers.len() as f64)
            }
        }
        "$sum" => {
            if numbers.iter().all(|b| matches!(b, Bson::Int32(_) | Bson::Int64(_))) {
                let total: i64 = numbers
                    .iter()
                    .filter_map(|b| match b {
                        Bson::Int32(n) => Some(i64::from(*n)),
                        Bson::Int64(n) => Some(*n),
                        _ => None,
                    })
                    .sum();
                Bson::Int64(total)
            } else {
                Bson::Double(numbers.iter().filter_map(as_f64).sum())
            }
        }
        "$min" => extreme(numbers, Ordering::Less),
        "$max" => extreme(numbers, Ordering::Greater),
        other => {
            return Err(Error::Query(format!(
                "unsupported expression operator {}",
                other
            )))
        }
    };
    Ok(Some(result))
}

fn extreme(numbers: Vec<Bson>, wanted: Ordering) -> Bson {
    numbers
        .into_iter()
        .reduce(|best, next| {
            if compare_values(Some(&next), Some(&best)) == wanted {
                next
            } else {
                best
            }
        })
        .unwrap_or(Bson::Null)
}

// == Filters ==
fn matches_filter(doc: &Document, filter: &Document) -> Result<bool> {
    for (key, condition) in filter {
        let matched = match key.as_str() {
            "$and" => {
                let mut all = true;
                for clause in clauses(key, condition)? {
                    all &= matches_filter(doc, clause)?;
                }
                all
            }
            "$or" => {
                let mut any = false;
                for clause in clauses(key, condition)? {
                    any |= matches_filter(doc, clause)?;
                }
                any
            }
            "$nor" => {
                let mut none = true;
                for clause in clauses(key, condition)? {
                    none &= !matches_filter(doc, clause)?;
                }
                none
            }
            other if other.starts_with('$') => {
                return Err(Error::Query(format!(
                    "unsupported top-level filter operator {}",
                    other
                )))
            }
            field => matches_condition(&candidates(doc, field), condition)?,
        };
        if !matched {
            return Ok(false);
        }
    }
    Ok(true)
}

fn clauses<'a>(op: &str, condition: &'a Bson) -> Result<Vec<&'a Document>> {
    let Bson::Array(items) = condition else {
        return Err(Error::Query(format!("{} expects an array", op)));
    };
    items
        .iter()
        .map(|item| match item {
            Bson::Document(clause) => Ok(clause),
            _ => Err(Error::Query(format!("{} clauses must be documents", op))),
        })
        .collect()
}

/// Values a field condition is tested against: the field itself plus, for
/// arrays, each element.
fn candidates(doc: &Document, field: &str) -> Vec<Bson> {
    match resolve_path(doc, field) {
        Some(Bson::Array(items)) => {
            let mut values = items.clone();
            values.push(Bson::Array(items));
            values
        }
        Some(value) => vec![value],
        None => Vec::new(),
    }
}

fn matches_condition(candidates: &[Bson], condition: &Bson) -> Result<bool> {
    let operators = match condition {
        Bson::Document(ops) if ops.keys().next().is_some_and(|k| k.starts_with('$')) => ops,
        _ => return Ok(equals_any(candidates, condition)),
    };

    for (op, arg) in operators {
        let matched = match op.as_str() {
            "$eq" => equals_any(candidates, arg),
            "$ne" => !equals_any(candidates, arg),
            "$gt" => compares_any(candidates, arg, |o| o == Ordering::Greater),
            "$gte" => compares_any(candidates, arg, |o| o != Ordering::Less),
            "$lt" => compares_any(candidates, arg, |o| o == Ordering::Less),
            "$lte" => compares_any(candidates, arg, |o| o != Ordering::Greater),
            "$in" => {
                let Bson::Array(options) = arg else {
                    return Err(Error::Query("$in expects an array".to_string()));
                };
                options.iter().any(|option| equals_any(candidates, option))
            }
            other => {
                return Err(Error::Query(format!(
                    "unsupported filter operator {}",
                    other
                )))
            }
        };
        if !matched {
            return Ok(false);
        }
    }
    Ok(true)
}

fn equals_any(candidates: &[Bson], expected: &Bson) -> bool {
    if candidates.is_empty() {
        return matches!(expected, Bson::Null);
    }
    candidates.iter().any(|value| values_equal(value, expected))
}

fn compares_any(candidates: &[Bson], bound: &Bson, accept: impl Fn(Ordering) -> bool) -> bool {
    candidates
        .iter()
        .filter(|value| same_kind(value, bound))
        .any(|value| accept(compare_values(Some(value), Some(bound))))
}

// == Value Helpers ==
fn resolve_path(doc: &Document, path: &str) -> Option<Bson> {
    let segments: Vec<&str> = path.split('.').collect();
    let (first, rest) = segments.split_first()?;
    resolve_in(doc.get(*first)?, rest)
}

fn resolve_in(value: &Bson, rest: &[&str]) -> Option<Bson> {
    let Some((next, tail)) = rest.split_first() else {
        return Some(value.clone());
    };

    match value {
        Bson::Document(inner) => resolve_in(inner.get(*next)?, tail),
        Bson::Array(items) => Some(Bson::Array(
            items
                .iter()
                .filter(|item| matches!(item, Bson::Document(_)))
                .filter_map(|item| resolve_in(item, rest))
                .collect(),
        )),
        _ => None,
    }
}

fn projection_flag(value: &Bson) -> Option<bool> {
    match value {
        Bson::Boolean(flag) => Some(*flag),
        other => as_f64(other).map(|n| n != 0.0),
    }
}

fn as_f64(value: &Bson) -> Option<f64> {
    match value {
        Bson::Int32(n) => Some(f64::from(*n)),
        Bson::Int64(n) => Some(*n as f64),
        Bson::Double(n) => Some(*n),
        _ => None,
    }
}

fn values_equal(a: &Bson, b: &Bson) -> bool {
    match (as_f64(a), as_f64(b)) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

fn same_kind(a: &Bson, b: &Bson) -> bool {
    type_rank(Some(a)) == type_rank(Some(b))
}

/// Cross-type sort order: missing/null, numbers, strings, documents,
/// arrays, booleans, everything else.
fn type_rank(value: Option<&Bson>) -> u8 {
    match value {
        None | Some(Bson::Null) => 0,
        Some(Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_)) => 1,
        Some(Bson::String(_)) => 2,
        Some(Bson::Document(_)) => 3,
        Some(Bson::Array(_)) => 4,
        Some(Bson::Boolean(_)) => 5,
        Some(_) => 6,
    }
}

fn compare_values(a: Option<&Bson>, b: Option<&Bson>) -> Ordering {
    let by_rank = type_rank(a).cmp(&type_rank(b));
    if by_rank != Ordering::Equal {
        return by_rank;
    }

    match (a, b) {
        (Some(x), Some(y)) => match (as_f64(x), as_f64(y), x, y) {
            (Some(m), Some(n), _, _) => m.partial_cmp(&n).unwrap_or(Ordering::Equal),
            (_, _, Bson::String(s), Bson::String(t)) => s.cmp(t),
            (_, _, Bson::Boolean(s), Bson::Boolean(t)) => s.cmp(t),
            _ => Ordering::Equal,
        },
        _ => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::doc;

    fn inventory() -> MemoryCollection {
        MemoryCollection::with_documents(
            "inventory",
            vec![
                doc! { "_id": 1, "item": "journal", "qty": 25, "tags": ["blank", "red"], "size": { "h": 14 } },
                doc! { "_id": 2, "item": "notebook", "qty": 50, "tags": ["red"], "size": { "h": 8.5 } },
                doc! { "_id": 3, "item": "paper", "qty": 100, "tags": [], "size": { "h": 8.5 } },
                doc! { "_id": 4, "item": "planner", "qty": 75 },
            ],
        )
    }

    fn ids(docs: &[Document]) -> Vec<i32> {
        docs.iter().map(|d| d.get_i32("_id").unwrap()).collect()
    }

    #[tokio::test]
    async fn test_find_equality_and_array_membership() {
        let coll = inventory();

        assert_eq!(ids(&coll.find(doc! { "item": "paper" }).await.unwrap()), vec![3]);
        assert_eq!(ids(&coll.find(doc! { "tags": "red" }).await.unwrap()), vec![1, 2]);
        assert_eq!(ids(&coll.find(doc! { "tags": ["red"] }).await.unwrap()), vec![2]);
        assert_eq!(ids(&coll.find(doc! { "size.h": 8.5 }).await.unwrap()), vec![2, 3]);
    }

    #[tokio::test]
    async fn test_find_numeric_equality_across_types() {
        let coll = inventory();

        let found = coll.find(doc! { "qty": 50.0 }).await.unwrap();
        assert_eq!(ids(&found), vec![2]);

        let found = coll.find(doc! { "size.h": 14_i64 }).await.unwrap();
        assert_eq!(ids(&found), vec![1]);
    }

    #[tokio::test]
    async fn test_find_comparison_operators() {
        let coll = inventory();

        let found = coll.find(doc! { "qty": { "$gte": 50, "$lt": 100 } }).await.unwrap();
        assert_eq!(ids(&found), vec![2, 4]);

        let found = coll.find(doc! { "item": { "$in": ["paper", "planner"] } }).await.unwrap();
        assert_eq!(ids(&found), vec![3, 4]);

        let found = coll.find(doc! { "tags": { "$ne": "red" } }).await.unwrap();
        assert_eq!(ids(&found), vec![3, 4]);
    }

    #[tokio::test]
    async fn test_find_missing_field_matches_null() {
        let coll = inventory();

        let found = coll.find(doc! { "tags": Bson::Null }).await.unwrap();
        assert_eq!(ids(&found), vec![4]);
    }

    #[tokio::test]
    async fn test_find_logical_combinators() {
        let coll = inventory();

        let found = coll
            .find(doc! { "$or": [ { "qty": { "$lt": 30 } }, { "item": "planner" } ] })
            .await
            .unwrap();
        assert_eq!(ids(&found), vec![1, 4]);

        let found = coll
            .find(doc! { "$and": [ { "tags": "red" }, { "qty": { "$gt": 30 } } ] })
            .await
            .unwrap();
        assert_eq!(ids(&found), vec![2]);
    }

    #[tokio::test]
    async fn test_unsupported_operator_is_query_error() {
        let coll = inventory();

        let result = coll.find(doc! { "qty": { "$mod": [4, 0] } }).await;
        assert!(matches!(result, Err(Error::Query(_))));

        let result = coll.aggregate(vec![doc! { "$group": { "_id": "$item" } }]).await;
        assert!(matches!(result, Err(Error::Query(_))));
    }

    #[tokio::test]
    async fn test_pipeline_match_sort_limit() {
        let coll = inventory();

        let pipeline = vec![
            doc! { "$match": { "qty": { "$gt": 20 } } },
            doc! { "$sort": { "qty": -1 } },
            doc! { "$limit": 2 },
        ];
        let docs = coll.aggregate(pipeline).await.unwrap();

        assert_eq!(ids(&docs), vec![3, 4]);
        assert_eq!(coll.queries(), 1);
    }

    #[tokio::test]
    async fn test_sort_puts_missing_first_ascending() {
        let coll = inventory();

        let docs = coll
            .aggregate(vec![doc! { "$sort": { "size.h": 1, "_id": -1 } }])
            .await
            .unwrap();

        assert_eq!(ids(&docs), vec![4, 3, 2, 1]);
    }

    #[tokio::test]
    async fn test_project_inclusion_and_accumulators() {
        let coll = MemoryCollection::with_documents(
            "students",
            vec![doc! { "_id": 7, "name": "Ada", "topics": [ { "score": 4 }, { "score": 8 } ] }],
        );

        let docs = coll
            .aggregate(vec![doc! { "$project": {
                "_id": 0,
                "name": 1,
                "avg": { "$avg": "$topics.score" },
                "sum": { "$sum": "$topics.score" },
                "min": { "$min": "$topics.score" },
                "max": { "$max": "$topics.score" },
                "n": { "$size": "$topics" },
                "label": { "$literal": "$name" }
            }}])
            .await
            .unwrap();

        let doc = &docs[0];
        assert!(!doc.contains_key("_id"));
        assert_eq!(doc.get_str("name").unwrap(), "Ada");
        assert_eq!(doc.get_f64("avg").unwrap(), 6.0);
        assert_eq!(doc.get_i64("sum").unwrap(), 12);
        assert_eq!(doc.get_i32("min").unwrap(), 4);
        assert_eq!(doc.get_i32("max").unwrap(), 8);
        assert_eq!(doc.get_i32("n").unwrap(), 2);
        assert_eq!(doc.get_str("label").unwrap(), "$name");
    }

    #[tokio::test]
    async fn test_project_dotted_inclusion_nests() {
        let coll = MemoryCollection::with_documents(
            "inventory",
            vec![doc! {
                "_id": 1,
                "size": { "h": 14, "w": 21, "uom": "cm" },
                "stock": [ { "qty": 5, "wh": "A" }, { "qty": 15, "wh": "B" } ]
            }],
        );

        let docs = coll
            .aggregate(vec![doc! { "$project": {
                "size.h": 1,
                "size.uom": 1,
                "stock.qty": 1
            }}])
            .await
            .unwrap();

        assert_eq!(
            docs[0],
            doc! {
                "_id": 1,
                "size": { "h": 14, "uom": "cm" },
                "stock": [ { "qty": 5 }, { "qty": 15 } ]
            }
        );
    }

    #[tokio::test]
    async fn test_limit_requires_positive_integer() {
        let coll = inventory();

        for limit in [Bson::Double(2.5), Bson::Int32(0), Bson::Int32(-1), Bson::String("2".into())] {
            let result = coll.aggregate(vec![doc! { "$limit": limit }]).await;
            assert!(matches!(result, Err(Error::Query(_))));
        }

        let docs = coll.aggregate(vec![doc! { "$limit": 2.0 }]).await.unwrap();
        assert_eq!(ids(&docs), vec![1, 2]);
    }

    #[tokio::test]
    async fn test_nor_and_unknown_top_level_operator() {
        let coll = inventory();

        let found = coll
            .find(doc! { "$nor": [ { "tags": "red" }, { "qty": 100 } ] })
            .await
            .unwrap();
        assert_eq!(ids(&found), vec![4]);

        let result = coll.find(doc! { "$where": "this.qty > 1" }).await;
        assert!(matches!(result, Err(Error::Query(_))));
    }

    #[tokio::test]
    async fn test_avg_of_missing_path_is_null() {
        let coll = MemoryCollection::with_documents("students", vec![doc! { "_id": 1, "name": "Bob" }]);

        let docs = coll
            .aggregate(vec![doc! { "$project": { "avg": { "$avg": "$topics.score" } } }])
            .await
            .unwrap();

        assert_eq!(docs[0].get("avg"), Some(&Bson::Null));
    }

    #[tokio::test]
    async fn test_insert_and_len() {
        let mut coll = MemoryCollection::new("things");
        assert!(coll.is_empty());

        coll.insert(doc! { "_id": 1 });

        assert_eq!(coll.len(), 1);
        assert_eq!(coll.name(), "things");
    }
}
