//! Attribute-indexed record store.
//!
//! The guide only talks to storage through the [`GuideStore`] trait: schema
//! declaration, filtered queries, metadata scalars and inverted index term
//! enumeration. The write half (`insert`, `update`, `delete`, `set_metadata`)
//! is used by the update mechanism in [`crate::sources`].

mod sqlite;
pub mod terms;
mod types;

pub use sqlite::SqliteGuideStore;
pub use types::*;

use async_trait::async_trait;

/// Trait for attribute-indexed record storage.
#[async_trait]
pub trait GuideStore: Send + Sync {
    /// Register an inverted term index. Idempotent.
    async fn declare_inverted_index(&self, index: &InvertedIndexDef) -> Result<(), StoreError>;

    /// Register (or extend) the attribute schema of a record type. Idempotent.
    ///
    /// Every inverted index referenced by the schema must already be declared.
    async fn declare_schema(&self, schema: &RecordSchema) -> Result<(), StoreError>;

    /// Run a filtered read. Rows come back in ascending id order.
    async fn query(&self, query: &Query) -> Result<Vec<Row>, StoreError>;

    /// Count the records matching a query (the limit is ignored).
    async fn count(&self, query: &Query) -> Result<u64, StoreError>;

    /// Insert a record, returning its new identifier.
    async fn insert(
        &self,
        record_type: &str,
        parent: Option<ParentRef>,
        attrs: Attributes,
    ) -> Result<i64, StoreError>;

    /// Merge attributes into an existing record. A `Null` value removes the attribute.
    async fn update(&self, record_type: &str, id: i64, attrs: Attributes)
        -> Result<(), StoreError>;

    /// Delete every record matching the query, returning how many were removed.
    async fn delete(&self, query: &Query) -> Result<u64, StoreError>;

    /// Read a metadata scalar, falling back to `default` if unset.
    async fn get_metadata(&self, key: &str, default: AttrValue) -> Result<AttrValue, StoreError>;

    async fn set_metadata(&self, key: &str, value: AttrValue) -> Result<(), StoreError>;

    /// List the terms of an inverted index.
    ///
    /// With `associated`, only terms co-occurring on records that carry all of
    /// the associated terms are returned (the associated terms themselves are
    /// excluded). With `prefix`, only terms starting with it are returned.
    async fn index_terms(
        &self,
        index: &str,
        associated: Option<&[String]>,
        prefix: Option<&str>,
    ) -> Result<Vec<String>, StoreError>;
}
