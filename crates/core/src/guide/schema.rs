//! Channel and program record schemas.

use crate::store::{AttrDef, AttrKind, GuideStore, InvertedIndexDef, RecordSchema, StoreError};

pub const CHANNEL_TYPE: &str = "channel";
pub const PROGRAM_TYPE: &str = "program";
pub const KEYWORDS_INDEX: &str = "keywords";
pub const GENRES_INDEX: &str = "genres";

pub fn channel_schema() -> RecordSchema {
    RecordSchema::new(CHANNEL_TYPE)
        .attr(AttrDef::simple("tuner_id", AttrKind::List))
        .attr(AttrDef::searchable("name", AttrKind::Text))
        .attr(AttrDef::searchable("long_name", AttrKind::Text))
}

pub fn program_schema() -> RecordSchema {
    RecordSchema::new(PROGRAM_TYPE)
        .attr(AttrDef::searchable("title", AttrKind::Text).indexed(KEYWORDS_INDEX))
        .attr(AttrDef::searchable("desc", AttrKind::Text).indexed(KEYWORDS_INDEX))
        // UTC seconds
        .attr(AttrDef::searchable("start", AttrKind::Int))
        .attr(AttrDef::searchable("stop", AttrKind::Int))
        .attr(AttrDef::simple("episode", AttrKind::Text))
        .attr(AttrDef::simple("subtitle", AttrKind::Text).indexed(KEYWORDS_INDEX))
        .attr(AttrDef::simple("genres", AttrKind::List).indexed(GENRES_INDEX))
        .attr(AttrDef::searchable("category", AttrKind::Text))
        // Original air date, UTC seconds
        .attr(AttrDef::searchable("date", AttrKind::Int))
        .attr(AttrDef::searchable("year", AttrKind::Int))
        .attr(AttrDef::searchable("rating", AttrKind::Text))
        .attr(AttrDef::simple("advisories", AttrKind::List))
        // Out of 4.0
        .attr(AttrDef::searchable("score", AttrKind::Float))
        .attr(AttrDef::searchable("flags", AttrKind::Int))
        // [type, name, role] triples
        .attr(AttrDef::simple("credits", AttrKind::List))
        .range_index("start", "stop")
}

/// Declare the inverted indices and record types the guide relies on.
pub async fn register_schema(store: &dyn GuideStore) -> Result<(), StoreError> {
    store
        .declare_inverted_index(&InvertedIndexDef::new(KEYWORDS_INDEX, 2, 30))
        .await?;
    store
        .declare_inverted_index(&InvertedIndexDef::new(GENRES_INDEX, 3, 30))
        .await?;
    store.declare_schema(&channel_schema()).await?;
    store.declare_schema(&program_schema()).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SqliteGuideStore;

    #[test]
    fn test_program_schema_searchable_attrs() {
        let schema = program_schema();
        let searchable: Vec<&str> = schema.searchable_attrs().map(|a| a.name.as_str()).collect();
        assert_eq!(
            searchable,
            vec!["title", "desc", "start", "stop", "category", "date", "year", "rating", "score", "flags"]
        );
        assert_eq!(
            schema.get("subtitle").and_then(|a| a.inverted_index.as_deref()),
            Some(KEYWORDS_INDEX)
        );
        assert_eq!(schema.range_indices, vec![("start".to_string(), "stop".to_string())]);
    }

    #[tokio::test]
    async fn test_register_schema_twice() {
        let store = SqliteGuideStore::in_memory().unwrap();
        register_schema(&store).await.unwrap();
        register_schema(&store).await.unwrap();
    }
}
