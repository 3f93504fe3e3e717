//! Types for the attribute store: values, rows, queries and schema declarations.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A single attribute value as held by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(untagged)]
pub enum AttrValue {
    #[default]
    Null,
    Int(i64),
    Float(f64),
    Text(String),
    List(Vec<AttrValue>),
}

impl AttrValue {
    pub fn is_null(&self) -> bool {
        matches!(self, AttrValue::Null)
    }

    /// Integer view of the value. Floats are truncated and numeric text is parsed.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            AttrValue::Int(v) => Some(*v),
            AttrValue::Float(v) => Some(*v as i64),
            AttrValue::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttrValue::Int(v) => Some(*v as f64),
            AttrValue::Float(v) => Some(*v),
            AttrValue::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttrValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[AttrValue]> {
        match self {
            AttrValue::List(items) => Some(items),
            _ => None,
        }
    }
}

impl From<i64> for AttrValue {
    fn from(v: i64) -> Self {
        AttrValue::Int(v)
    }
}

impl From<i32> for AttrValue {
    fn from(v: i32) -> Self {
        AttrValue::Int(v as i64)
    }
}

impl From<u32> for AttrValue {
    fn from(v: u32) -> Self {
        AttrValue::Int(v as i64)
    }
}

impl From<u64> for AttrValue {
    fn from(v: u64) -> Self {
        AttrValue::Int(v as i64)
    }
}

impl From<f64> for AttrValue {
    fn from(v: f64) -> Self {
        AttrValue::Float(v)
    }
}

impl From<&str> for AttrValue {
    fn from(v: &str) -> Self {
        AttrValue::Text(v.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(v: String) -> Self {
        AttrValue::Text(v)
    }
}

impl<T: Into<AttrValue>> From<Vec<T>> for AttrValue {
    fn from(items: Vec<T>) -> Self {
        AttrValue::List(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<AttrValue>> From<Option<T>> for AttrValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(AttrValue::Null)
    }
}

/// Attribute map of a record.
pub type Attributes = BTreeMap<String, AttrValue>;

/// Reference to a record of another type (the parent relation).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ParentRef {
    pub record_type: String,
    pub id: i64,
}

impl ParentRef {
    pub fn new(record_type: impl Into<String>, id: i64) -> Self {
        Self {
            record_type: record_type.into(),
            id,
        }
    }
}

/// A raw record as returned by [`GuideStore::query`](super::GuideStore::query).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Row {
    /// Store identifier, unique per record type.
    pub id: i64,
    pub record_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<ParentRef>,
    pub attrs: Attributes,
}

impl Row {
    /// Attribute value, treating explicit nulls as absent.
    pub fn get(&self, name: &str) -> Option<&AttrValue> {
        self.attrs.get(name).filter(|v| !v.is_null())
    }

    pub fn parent_id(&self) -> Option<i64> {
        self.parent.as_ref().map(|p| p.id)
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(AttrValue::as_str)
    }

    pub fn get_i64(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(AttrValue::as_i64)
    }

    pub fn get_f64(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(AttrValue::as_f64)
    }

    /// Text items of a list attribute. Non-text items are skipped.
    pub fn get_strings(&self, name: &str) -> Vec<String> {
        self.get(name)
            .and_then(AttrValue::as_list)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| item.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Values of the given attributes, in the given order.
    pub fn project(&self, names: &[String]) -> Vec<Option<AttrValue>> {
        names.iter().map(|name| self.get(name).cloned()).collect()
    }
}

/// Comparison operator for [`Filter::Cmp`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CmpOp {
    Lt,
    Le,
    Gt,
    Ge,
    Ne,
}

impl CmpOp {
    pub fn as_sql(&self) -> &'static str {
        match self {
            CmpOp::Lt => "<",
            CmpOp::Le => "<=",
            CmpOp::Gt => ">",
            CmpOp::Ge => ">=",
            CmpOp::Ne => "!=",
        }
    }
}

/// Constraint on a single searchable attribute.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Equality. `Eq(Null)` matches records where the attribute is unset.
    Eq(AttrValue),
    /// Set membership. An empty set matches nothing.
    In(Vec<AttrValue>),
    /// Inclusive range.
    Range(AttrValue, AttrValue),
    /// Ordering or inequality against a value.
    Cmp(CmpOp, AttrValue),
}

impl Filter {
    pub fn eq(v: impl Into<AttrValue>) -> Self {
        Filter::Eq(v.into())
    }

    pub fn one_of<T: Into<AttrValue>>(values: impl IntoIterator<Item = T>) -> Self {
        Filter::In(values.into_iter().map(Into::into).collect())
    }

    pub fn range(lo: impl Into<AttrValue>, hi: impl Into<AttrValue>) -> Self {
        Filter::Range(lo.into(), hi.into())
    }

    pub fn lt(v: impl Into<AttrValue>) -> Self {
        Filter::Cmp(CmpOp::Lt, v.into())
    }

    pub fn le(v: impl Into<AttrValue>) -> Self {
        Filter::Cmp(CmpOp::Le, v.into())
    }

    pub fn gt(v: impl Into<AttrValue>) -> Self {
        Filter::Cmp(CmpOp::Gt, v.into())
    }

    pub fn ge(v: impl Into<AttrValue>) -> Self {
        Filter::Cmp(CmpOp::Ge, v.into())
    }

    pub fn ne(v: impl Into<AttrValue>) -> Self {
        Filter::Cmp(CmpOp::Ne, v.into())
    }
}

/// Constraint joining records to their parent.
#[derive(Debug, Clone, PartialEq)]
pub enum ParentFilter {
    One(ParentRef),
    /// Any of the listed parents. An empty list matches nothing.
    Any(Vec<ParentRef>),
}

/// A structured query against one record type.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub record_type: String,
    pub parent: Option<ParentFilter>,
    /// Attribute filters, all of which must hold.
    pub attrs: BTreeMap<String, Filter>,
    /// Inverted index name -> terms; every term must be present.
    pub terms: BTreeMap<String, Vec<String>>,
    pub limit: Option<u32>,
}

impl Query {
    pub fn new(record_type: impl Into<String>) -> Self {
        Self {
            record_type: record_type.into(),
            parent: None,
            attrs: BTreeMap::new(),
            terms: BTreeMap::new(),
            limit: None,
        }
    }

    pub fn parent(mut self, parent: ParentFilter) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn filter(mut self, attr: impl Into<String>, filter: Filter) -> Self {
        self.attrs.insert(attr.into(), filter);
        self
    }

    pub fn terms(mut self, index: impl Into<String>, terms: Vec<String>) -> Self {
        self.terms.insert(index.into(), terms);
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Storage type of an attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttrKind {
    Int,
    Float,
    Text,
    List,
}

/// Declaration of a single attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttrDef {
    pub name: String,
    pub kind: AttrKind,
    /// Usable in equality/range/comparison filters.
    pub searchable: bool,
    /// Name of the inverted index fed by this attribute.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inverted_index: Option<String>,
}

impl AttrDef {
    /// Attribute stored with the record but not filterable.
    pub fn simple(name: impl Into<String>, kind: AttrKind) -> Self {
        Self {
            name: name.into(),
            kind,
            searchable: false,
            inverted_index: None,
        }
    }

    pub fn searchable(name: impl Into<String>, kind: AttrKind) -> Self {
        Self {
            name: name.into(),
            kind,
            searchable: true,
            inverted_index: None,
        }
    }

    /// Feed this attribute into the named inverted index.
    pub fn indexed(mut self, index: impl Into<String>) -> Self {
        self.inverted_index = Some(index.into());
        self
    }
}

/// Declaration of a record type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordSchema {
    pub record_type: String,
    pub attrs: Vec<AttrDef>,
    /// Composite indices over pairs of searchable attributes.
    pub range_indices: Vec<(String, String)>,
}

impl RecordSchema {
    pub fn new(record_type: impl Into<String>) -> Self {
        Self {
            record_type: record_type.into(),
            attrs: Vec::new(),
            range_indices: Vec::new(),
        }
    }

    pub fn attr(mut self, def: AttrDef) -> Self {
        self.attrs.push(def);
        self
    }

    pub fn range_index(mut self, first: impl Into<String>, second: impl Into<String>) -> Self {
        self.range_indices.push((first.into(), second.into()));
        self
    }

    pub fn get(&self, name: &str) -> Option<&AttrDef> {
        self.attrs.iter().find(|a| a.name == name)
    }

    pub fn searchable_attrs(&self) -> impl Iterator<Item = &AttrDef> {
        self.attrs.iter().filter(|a| a.searchable)
    }
}

/// Declaration of an inverted term index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvertedIndexDef {
    pub name: String,
    /// Minimum term length in characters.
    pub min: usize,
    /// Maximum term length in characters.
    pub max: usize,
}

impl InvertedIndexDef {
    pub fn new(name: impl Into<String>, min: usize, max: usize) -> Self {
        Self {
            name: name.into(),
            min,
            max,
        }
    }
}

/// Errors for store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Unknown record type: {0}")]
    UnknownRecordType(String),

    #[error("Unknown attribute '{attr}' for record type '{record_type}'")]
    UnknownAttribute { record_type: String, attr: String },

    #[error("Attribute '{attr}' of '{record_type}' is not searchable")]
    NotSearchable { record_type: String, attr: String },

    #[error("Unknown inverted index: {0}")]
    UnknownIndex(String),

    #[error("Invalid name: {0}")]
    InvalidName(String),

    #[error("Invalid filter: {0}")]
    InvalidFilter(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attr_value_untagged_serialization() {
        let value = AttrValue::List(vec![
            AttrValue::Text("actor".to_string()),
            AttrValue::Int(3),
            AttrValue::Null,
        ]);
        let json = serde_json::to_string(&value).unwrap();
        assert_eq!(json, r#"["actor",3,null]"#);

        let parsed: AttrValue = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, value);
    }

    #[test]
    fn test_attr_value_float_stays_float() {
        let parsed: AttrValue = serde_json::from_str("3.5").unwrap();
        assert_eq!(parsed, AttrValue::Float(3.5));
        let parsed: AttrValue = serde_json::from_str("7").unwrap();
        assert_eq!(parsed, AttrValue::Int(7));
    }

    #[test]
    fn test_attr_value_numeric_views() {
        assert_eq!(AttrValue::Float(12.9).as_i64(), Some(12));
        assert_eq!(AttrValue::Text(" 42 ".to_string()).as_i64(), Some(42));
        assert_eq!(AttrValue::Text("abc".to_string()).as_i64(), None);
        assert_eq!(AttrValue::Int(2).as_f64(), Some(2.0));
    }

    #[test]
    fn test_option_conversion() {
        let none: Option<i64> = None;
        assert_eq!(AttrValue::from(none), AttrValue::Null);
        assert_eq!(AttrValue::from(Some("x")), AttrValue::Text("x".to_string()));
    }

    #[test]
    fn test_row_accessors() {
        let mut attrs = Attributes::new();
        attrs.insert("title".to_string(), "News".into());
        attrs.insert("start".to_string(), 1000i64.into());
        attrs.insert("genres".to_string(), vec!["Drama", "Crime"].into());
        attrs.insert("subtitle".to_string(), AttrValue::Null);
        let row = Row {
            id: 1,
            record_type: "program".to_string(),
            parent: Some(ParentRef::new("channel", 7)),
            attrs,
        };

        assert_eq!(row.get_str("title"), Some("News"));
        assert_eq!(row.get_i64("start"), Some(1000));
        assert_eq!(row.get_strings("genres"), vec!["Drama", "Crime"]);
        assert!(row.get("subtitle").is_none());
        assert_eq!(row.parent_id(), Some(7));
        assert_eq!(
            row.project(&["start".to_string(), "missing".to_string()]),
            vec![Some(AttrValue::Int(1000)), None]
        );
    }

    #[test]
    fn test_query_builder() {
        let query = Query::new("program")
            .parent(ParentFilter::One(ParentRef::new("channel", 1)))
            .filter("year", Filter::ge(2000))
            .terms("keywords", vec!["news".to_string()])
            .limit(10);

        assert_eq!(query.record_type, "program");
        assert_eq!(query.attrs.get("year"), Some(&Filter::Cmp(CmpOp::Ge, AttrValue::Int(2000))));
        assert_eq!(query.terms.get("keywords").map(Vec::len), Some(1));
        assert_eq!(query.limit, Some(10));
    }

    #[test]
    fn test_record_schema_lookup() {
        let schema = RecordSchema::new("channel")
            .attr(AttrDef::simple("tuner_id", AttrKind::List))
            .attr(AttrDef::searchable("name", AttrKind::Text));

        assert!(schema.get("name").unwrap().searchable);
        assert!(!schema.get("tuner_id").unwrap().searchable);
        assert_eq!(schema.searchable_attrs().count(), 1);
    }
}
