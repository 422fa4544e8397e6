//! MongoDB-backed collection.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::bson::Document;
use mongodb::{Client, Collection};
use tracing::info;

use crate::documents::DocumentCollection;
use crate::error::{Error, Result};

// == Namespace ==
/// A `<database>.<collection>` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Namespace {
    pub database: String,
    pub collection: String,
}

impl FromStr for Namespace {
    type Err = Error;

    /// Splits on the first dot; collection names may contain further dots.
    fn from_str(s: &str) -> Result<Self> {
        match s.split_once('.') {
            Some((database, collection)) if !database.is_empty() && !collection.is_empty() => {
                if database.contains(['/', '\\', ' ', '"', '$']) {
                    return Err(Error::InvalidArgument(format!(
                        "invalid database name in namespace '{}'",
                        s
                    )));
                }
                Ok(Self {
                    database: database.to_string(),
                    collection: collection.to_string(),
                })
            }
            _ => Err(Error::InvalidArgument(format!(
                "namespace '{}' must look like <database>.<collection>",
                s
            ))),
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.database, self.collection)
    }
}

// == Mongo Collection ==
/// A MongoDB collection of raw documents.
#[derive(Debug, Clone)]
pub struct MongoCollection {
    inner: Collection<Document>,
    namespace: Namespace,
}

impl MongoCollection {
    /// Wraps an already-open collection handle.
    pub fn new(inner: Collection<Document>) -> Self {
        let namespace = Namespace {
            database: inner.namespace().db,
            collection: inner.name().to_string(),
        };
        Self { inner, namespace }
    }

    /// Opens `namespace` on the server at `uri`.
    ///
    /// The namespace is parsed before any connection is attempted.
    pub async fn connect(uri: &str, namespace: &str) -> Result<Self> {
        let namespace: Namespace = namespace.parse()?;
        let client = Client::with_uri_str(uri).await?;
        let inner = client
            .database(&namespace.database)
            .collection::<Document>(&namespace.collection);

        info!("Opened MongoDB collection {}", namespace);
        Ok(Self { inner, namespace })
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }
}

#[async_trait]
impl DocumentCollection for MongoCollection {
    async fn aggregate(&self, pipeline: Vec<Document>) -> Result<Vec<Document>> {
        let cursor = self.inner.aggregate(pipeline).await?;
        let docs: Vec<Document> = cursor.try_collect().await?;
        Ok(docs)
    }

    async fn find(&self, filter: Document) -> Result<Vec<Document>> {
        let cursor = self.inner.find(filter).await?;
        let docs: Vec<Document> = cursor.try_collect().await?;
        Ok(docs)
    }

    fn name(&self) -> &str {
        &self.namespace.collection
    }
}
