//! Documents Module
//!
//! Thin query helpers over a document collection. Execution is delegated to
//! the collection backend; these functions only validate arguments and
//! materialise results.
//!
//! # Backends
//! - [`MongoCollection`] - a MongoDB collection
//! - [`MemoryCollection`] - in-process evaluator for a subset of the query language

mod memory;
mod mongo;

use async_trait::async_trait;
use mongodb::bson::{doc, Bson, Document};
use tracing::debug;

use crate::error::{Error, Result};

pub use memory::MemoryCollection;
pub use mongo::{MongoCollection, Namespace};

// == Document Collection ==
/// A queryable collection of documents.
#[async_trait]
pub trait DocumentCollection: Send + Sync {
    /// Runs an aggregation pipeline and collects every resulting document.
    async fn aggregate(&self, pipeline: Vec<Document>) -> Result<Vec<Document>>;

    /// Runs a filter query and collects every matching document.
    async fn find(&self, filter: Document) -> Result<Vec<Document>>;

    /// Collection name for logs.
    fn name(&self) -> &str;
}

// == Queries ==
/// Runs `pipeline` against `collection` and returns the documents in the
/// order the pipeline produces.
///
/// Stages are passed through to the backend. Only a stage that is not a
/// single `$operator` document is refused here; an empty pipeline returns
/// every document.
pub async fn aggregate_and_sort<C>(collection: &C, pipeline: Vec<Document>) -> Result<Vec<Document>>
where
    C: DocumentCollection + ?Sized,
{
    validate_pipeline(&pipeline)?;
    let stages = pipeline.len();
    let docs = collection.aggregate(pipeline).await?;
    debug!(collection = collection.name(), stages, results = docs.len(), "aggregate");
    Ok(docs)
}

/// Returns every document in `collection` matching `filter`.
///
/// An empty filter matches everything. Operators are left to the backend;
/// only `$and`/`$or`/`$nor` clauses that are not arrays of documents are
/// refused here.
pub async fn find_matching<C>(collection: &C, filter: Document) -> Result<Vec<Document>>
where
    C: DocumentCollection + ?Sized,
{
    validate_filter(&filter)?;
    let docs = collection.find(filter).await?;
    debug!(collection = collection.name(), results = docs.len(), "find");
    Ok(docs)
}

/// Students with their average topic score, best first.
///
/// Each result carries `_id`, `name` and `averageScore`.
pub async fn top_students<C>(collection: &C) -> Result<Vec<Document>>
where
    C: DocumentCollection + ?Sized,
{
    let pipeline = vec![
        doc! {
            "$project": {
                "name": "$name",
                "averageScore": { "$avg": "$topics.score" }
            }
        },
        doc! { "$sort": { "averageScore": -1 } },
    ];
    aggregate_and_sort(collection, pipeline).await
}

/// Schools whose `topics` include `topic`.
pub async fn schools_by_topic<C>(collection: &C, topic: &str) -> Result<Vec<Document>>
where
    C: DocumentCollection + ?Sized,
{
    if topic.is_empty() {
        return Err(Error::InvalidArgument("topic cannot be empty".to_string()));
    }
    find_matching(collection, doc! { "topics": topic }).await
}

// == Validation ==
fn validate_pipeline(pipeline: &[Document]) -> Result<()> {
    for (index, stage) in pipeline.iter().enumerate() {
        let mut keys = stage.keys();
        match (keys.next(), keys.next()) {
            (Some(op), None) if op.starts_with('$') => {}
            _ => {
                return Err(Error::InvalidArgument(format!(
                    "pipeline stage {} must be a single $operator document",
                    index
                )))
            }
        }
    }
    Ok(())
}

fn validate_filter(filter: &Document) -> Result<()> {
    for (key, value) in filter {
        if !matches!(key.as_str(), "$and" | "$or" | "$nor") {
            continue;
        }

        let Bson::Array(clauses) = value else {
            return Err(Error::InvalidArgument(format!("{} expects an array", key)));
        };
        for clause in clauses {
            let Bson::Document(clause) = clause else {
                return Err(Error::InvalidArgument(format!(
                    "{} clauses must be documents",
                    key
                )));
            };
            validate_filter(clause)?;
        }
    }
    Ok(())
}
