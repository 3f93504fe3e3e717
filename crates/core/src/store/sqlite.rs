//! SQLite-backed attribute store implementation.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::types::Value as SqlValue;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Transaction};

use super::terms::{normalize_query_terms, term_frequencies};
use super::{
    AttrKind, AttrValue, Attributes, Filter, GuideStore, InvertedIndexDef, ParentFilter,
    ParentRef, Query, RecordSchema, Row, StoreError,
};

/// Column names every object table carries.
const RESERVED_COLUMNS: &[&str] = &["id", "parent_type", "parent_id", "attrs"];

/// SQLite-backed attribute store.
///
/// Each record type lives in its own `objects_<type>` table with one typed
/// column per searchable attribute and a JSON `attrs` column holding the full
/// attribute map. Work runs on tokio's blocking pool.
pub struct SqliteGuideStore {
    inner: Arc<Mutex<Inner>>,
}

struct Inner {
    conn: Connection,
    schemas: HashMap<String, RecordSchema>,
    indices: HashMap<String, InvertedIndexDef>,
}

impl SqliteGuideStore {
    /// Open (or create) a database file, creating its parent directory if needed.
    pub fn new(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.is_dir() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    StoreError::Database(format!(
                        "failed to create directory {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }
        let conn = Connection::open(path).map_err(db_err)?;
        Self::from_connection(conn)
    }

    /// Create an in-memory store (useful for testing).
    pub fn in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().map_err(db_err)?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS meta (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            "#,
        )
        .map_err(db_err)?;

        Ok(Self {
            inner: Arc::new(Mutex::new(Inner {
                conn,
                schemas: HashMap::new(),
                indices: HashMap::new(),
            })),
        })
    }

    async fn run<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut Inner) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || {
            let mut guard = inner
                .lock()
                .map_err(|_| StoreError::Internal("store lock poisoned".to_string()))?;
            f(&mut *guard)
        })
        .await
        .map_err(|e| StoreError::Internal(e.to_string()))?
    }
}

fn db_err(e: rusqlite::Error) -> StoreError {
    StoreError::Database(e.to_string())
}

fn validate_name(name: &str) -> Result<(), StoreError> {
    let mut chars = name.chars();
    let valid_first = chars
        .next()
        .map(|c| c.is_ascii_lowercase() || c == '_')
        .unwrap_or(false);
    if valid_first
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
    {
        Ok(())
    } else {
        Err(StoreError::InvalidName(name.to_string()))
    }
}

fn table_name(record_type: &str) -> String {
    format!("\"objects_{}\"", record_type)
}

fn terms_table(index: &str) -> String {
    format!("\"ivtidx_{}_terms\"", index)
}

fn terms_map_table(index: &str) -> String {
    format!("\"ivtidx_{}_terms_map\"", index)
}

fn column_type(kind: AttrKind) -> &'static str {
    match kind {
        AttrKind::Int => "INTEGER",
        AttrKind::Float => "REAL",
        AttrKind::Text | AttrKind::List => "TEXT",
    }
}

/// Value written into a searchable column.
fn column_value(value: Option<&AttrValue>) -> Result<SqlValue, StoreError> {
    Ok(match value {
        None | Some(AttrValue::Null) => SqlValue::Null,
        Some(AttrValue::Int(v)) => SqlValue::Integer(*v),
        Some(AttrValue::Float(v)) => SqlValue::Real(*v),
        Some(AttrValue::Text(s)) => SqlValue::Text(s.clone()),
        Some(list @ AttrValue::List(_)) => SqlValue::Text(
            serde_json::to_string(list).map_err(|e| StoreError::Internal(e.to_string()))?,
        ),
    })
}

/// Value bound as a filter operand.
fn filter_value(attr: &str, value: &AttrValue) -> Result<SqlValue, StoreError> {
    match value {
        AttrValue::Int(v) => Ok(SqlValue::Integer(*v)),
        AttrValue::Float(v) => Ok(SqlValue::Real(*v)),
        AttrValue::Text(s) => Ok(SqlValue::Text(s.clone())),
        AttrValue::Null => Err(StoreError::InvalidFilter(format!(
            "null operand for '{}' is only valid in an equality filter",
            attr
        ))),
        AttrValue::List(_) => Err(StoreError::InvalidFilter(format!(
            "list operand for '{}' cannot be compared",
            attr
        ))),
    }
}

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

fn escape_like(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

impl Inner {
    fn schema(&self, record_type: &str) -> Result<&RecordSchema, StoreError> {
        self.schemas
            .get(record_type)
            .ok_or_else(|| StoreError::UnknownRecordType(record_type.to_string()))
    }

    fn declare_inverted_index(&mut self, index: InvertedIndexDef) -> Result<(), StoreError> {
        validate_name(&index.name)?;
        if index.min == 0 || index.min > index.max {
            return Err(StoreError::InvalidName(format!(
                "index '{}' has invalid term bounds {}..{}",
                index.name, index.min, index.max
            )));
        }

        self.conn
            .execute_batch(&format!(
                r#"
                CREATE TABLE IF NOT EXISTS {terms} (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    term TEXT NOT NULL UNIQUE,
                    count INTEGER NOT NULL DEFAULT 0
                );

                CREATE TABLE IF NOT EXISTS {map} (
                    term_id INTEGER NOT NULL,
                    object_type TEXT NOT NULL,
                    object_id INTEGER NOT NULL,
                    frequency INTEGER NOT NULL,
                    PRIMARY KEY (term_id, object_type, object_id)
                );

                CREATE INDEX IF NOT EXISTS "idx_ivtidx_{name}_object" ON {map}(object_type, object_id);
                "#,
                terms = terms_table(&index.name),
                map = terms_map_table(&index.name),
                name = index.name,
            ))
            .map_err(db_err)?;

        self.indices.insert(index.name.clone(), index);
        Ok(())
    }

    fn declare_schema(&mut self, schema: RecordSchema) -> Result<(), StoreError> {
        validate_name(&schema.record_type)?;
        for attr in &schema.attrs {
            validate_name(&attr.name)?;
            if RESERVED_COLUMNS.contains(&attr.name.as_str()) {
                return Err(StoreError::InvalidName(attr.name.clone()));
            }
            if let Some(ref index) = attr.inverted_index {
                if !self.indices.contains_key(index) {
                    return Err(StoreError::UnknownIndex(index.clone()));
                }
            }
        }
        for (first, second) in &schema.range_indices {
            for name in [first, second] {
                match schema.get(name) {
                    Some(def) if def.searchable => {}
                    Some(_) => {
                        return Err(StoreError::NotSearchable {
                            record_type: schema.record_type.clone(),
                            attr: name.clone(),
                        })
                    }
                    None => {
                        return Err(StoreError::UnknownAttribute {
                            record_type: schema.record_type.clone(),
                            attr: name.clone(),
                        })
                    }
                }
            }
        }

        let table = table_name(&schema.record_type);
        let columns: Vec<String> = schema
            .searchable_attrs()
            .map(|a| format!("\"{}\" {}", a.name, column_type(a.kind)))
            .collect();
        let extra_columns = if columns.is_empty() {
            String::new()
        } else {
            format!("{},", columns.join(", "))
        };

        self.conn
            .execute_batch(&format!(
                r#"
                CREATE TABLE IF NOT EXISTS {table} (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    parent_type TEXT,
                    parent_id INTEGER,
                    {extra_columns}
                    attrs TEXT NOT NULL
                );

                CREATE INDEX IF NOT EXISTS "idx_{t}_parent" ON {table}(parent_type, parent_id);
                "#,
                t = schema.record_type,
            ))
            .map_err(db_err)?;

        // Migration: add columns for attributes that became searchable since the table was created
        let existing: BTreeSet<String> = {
            let mut stmt = self
                .conn
                .prepare(&format!("PRAGMA table_info({})", table))
                .map_err(db_err)?;
            let rows = stmt
                .query_map([], |row| row.get::<_, String>(1))
                .map_err(db_err)?;
            let mut names = BTreeSet::new();
            for row in rows {
                names.insert(row.map_err(db_err)?);
            }
            names
        };
        for attr in schema.searchable_attrs() {
            if !existing.contains(&attr.name) {
                self.conn
                    .execute(
                        &format!(
                            "ALTER TABLE {} ADD COLUMN \"{}\" {}",
                            table,
                            attr.name,
                            column_type(attr.kind)
                        ),
                        [],
                    )
                    .map_err(db_err)?;
            }
        }

        for attr in schema.searchable_attrs() {
            self.conn
                .execute(
                    &format!(
                        "CREATE INDEX IF NOT EXISTS \"idx_{t}_{a}\" ON {table}(\"{a}\")",
                        t = schema.record_type,
                        a = attr.name,
                    ),
                    [],
                )
                .map_err(db_err)?;
        }
        for (first, second) in &schema.range_indices {
            self.conn
                .execute(
                    &format!(
                        "CREATE INDEX IF NOT EXISTS \"idx_{t}_{a}_{b}\" ON {table}(\"{a}\", \"{b}\")",
                        t = schema.record_type,
                        a = first,
                        b = second,
                    ),
                    [],
                )
                .map_err(db_err)?;
        }

        self.schemas.insert(schema.record_type.clone(), schema);
        Ok(())
    }

    /// Build the WHERE clause and bound values for a query.
    fn build_where(&self, query: &Query) -> Result<(String, Vec<SqlValue>), StoreError> {
        let schema = self.schema(&query.record_type)?;
        let mut conditions: Vec<String> = Vec::new();
        let mut values: Vec<SqlValue> = Vec::new();

        match &query.parent {
            None => {}
            Some(ParentFilter::One(parent)) => {
                conditions.push("(parent_type = ? AND parent_id = ?)".to_string());
                values.push(SqlValue::Text(parent.record_type.clone()));
                values.push(SqlValue::Integer(parent.id));
            }
            Some(ParentFilter::Any(parents)) if parents.is_empty() => {
                conditions.push("0".to_string());
            }
            Some(ParentFilter::Any(parents)) => {
                let parts: Vec<&str> = parents
                    .iter()
                    .map(|parent| {
                        values.push(SqlValue::Text(parent.record_type.clone()));
                        values.push(SqlValue::Integer(parent.id));
                        "(parent_type = ? AND parent_id = ?)"
                    })
                    .collect();
                conditions.push(format!("({})", parts.join(" OR ")));
            }
        }

        for (name, filter) in &query.attrs {
            let def = schema.get(name).ok_or_else(|| StoreError::UnknownAttribute {
                record_type: query.record_type.clone(),
                attr: name.clone(),
            })?;
            if !def.searchable {
                return Err(StoreError::NotSearchable {
                    record_type: query.record_type.clone(),
                    attr: name.clone(),
                });
            }

            let column = format!("\"{}\"", name);
            match filter {
                Filter::Eq(AttrValue::Null) => conditions.push(format!("{} IS NULL", column)),
                Filter::Eq(value) => {
                    conditions.push(format!("{} = ?", column));
                    values.push(filter_value(name, value)?);
                }
                Filter::In(items) if items.is_empty() => conditions.push("0".to_string()),
                Filter::In(items) => {
                    conditions.push(format!("{} IN ({})", column, placeholders(items.len())));
                    for item in items {
                        values.push(filter_value(name, item)?);
                    }
                }
                Filter::Range(lo, hi) => {
                    conditions.push(format!("{} BETWEEN ? AND ?", column));
                    values.push(filter_value(name, lo)?);
                    values.push(filter_value(name, hi)?);
                }
                Filter::Cmp(op, value) => {
                    conditions.push(format!("{} {} ?", column, op.as_sql()));
                    values.push(filter_value(name, value)?);
                }
            }
        }

        for (index, terms) in &query.terms {
            let def = self
                .indices
                .get(index)
                .ok_or_else(|| StoreError::UnknownIndex(index.clone()))?;
            let normalized = normalize_query_terms(terms, def.min, def.max);
            if normalized.is_empty() {
                // Nothing indexable was asked for, so nothing can match
                conditions.push("0".to_string());
                continue;
            }
            for term in normalized {
                conditions.push(format!(
                    "id IN (SELECT m.object_id FROM {map} m JOIN {terms} t ON t.id = m.term_id \
                     WHERE t.term = ? AND m.object_type = ?)",
                    map = terms_map_table(index),
                    terms = terms_table(index),
                ));
                values.push(SqlValue::Text(term));
                values.push(SqlValue::Text(query.record_type.clone()));
            }
        }

        let clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };
        Ok((clause, values))
    }

    fn query(&self, query: &Query) -> Result<Vec<Row>, StoreError> {
        let (clause, values) = self.build_where(query)?;
        let mut sql = format!(
            "SELECT id, parent_type, parent_id, attrs FROM {} {} ORDER BY id",
            table_name(&query.record_type),
            clause
        );
        if let Some(limit) = query.limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        }

        let mut stmt = self.conn.prepare(&sql).map_err(db_err)?;
        let raw = stmt
            .query_map(params_from_iter(values.iter()), |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, Option<String>>(1)?,
                    row.get::<_, Option<i64>>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })
            .map_err(db_err)?;

        let mut rows = Vec::new();
        for item in raw {
            let (id, parent_type, parent_id, attrs_json) = item.map_err(db_err)?;
            let attrs: Attributes = serde_json::from_str(&attrs_json).map_err(|e| {
                StoreError::Internal(format!(
                    "corrupt attributes for {} {}: {}",
                    query.record_type, id, e
                ))
            })?;
            let parent = match (parent_type, parent_id) {
                (Some(record_type), Some(id)) => Some(ParentRef { record_type, id }),
                _ => None,
            };
            rows.push(Row {
                id,
                record_type: query.record_type.clone(),
                parent,
                attrs,
            });
        }
        Ok(rows)
    }

    fn count(&self, query: &Query) -> Result<u64, StoreError> {
        let (clause, values) = self.build_where(query)?;
        let sql = format!(
            "SELECT COUNT(*) FROM {} {}",
            table_name(&query.record_type),
            clause
        );
        let count: i64 = self
            .conn
            .query_row(&sql, params_from_iter(values.iter()), |row| row.get(0))
            .map_err(db_err)?;
        Ok(count as u64)
    }

    fn check_attrs(schema: &RecordSchema, attrs: &Attributes) -> Result<(), StoreError> {
        for name in attrs.keys() {
            if schema.get(name).is_none() {
                return Err(StoreError::UnknownAttribute {
                    record_type: schema.record_type.clone(),
                    attr: name.clone(),
                });
            }
        }
        Ok(())
    }

    fn insert(
        &mut self,
        record_type: &str,
        parent: Option<ParentRef>,
        attrs: Attributes,
    ) -> Result<i64, StoreError> {
        let Inner {
            conn,
            schemas,
            indices,
        } = self;
        let schema = schemas
            .get(record_type)
            .ok_or_else(|| StoreError::UnknownRecordType(record_type.to_string()))?;
        Self::check_attrs(schema, &attrs)?;

        let mut columns = vec!["parent_type".to_string(), "parent_id".to_string()];
        let mut values = vec![
            parent
                .as_ref()
                .map(|p| SqlValue::Text(p.record_type.clone()))
                .unwrap_or(SqlValue::Null),
            parent
                .as_ref()
                .map(|p| SqlValue::Integer(p.id))
                .unwrap_or(SqlValue::Null),
        ];
        for attr in schema.searchable_attrs() {
            columns.push(format!("\"{}\"", attr.name));
            values.push(column_value(attrs.get(&attr.name))?);
        }
        columns.push("attrs".to_string());
        values.push(SqlValue::Text(
            serde_json::to_string(&attrs).map_err(|e| StoreError::Internal(e.to_string()))?,
        ));

        let tx = conn.transaction().map_err(db_err)?;
        tx.execute(
            &format!(
                "INSERT INTO {} ({}) VALUES ({})",
                table_name(record_type),
                columns.join(", "),
                placeholders(values.len())
            ),
            params_from_iter(values.iter()),
        )
        .map_err(db_err)?;
        let id = tx.last_insert_rowid();

        index_object(&tx, schema, indices, id, &attrs)?;
        tx.commit().map_err(db_err)?;
        Ok(id)
    }

    fn update(&mut self, record_type: &str, id: i64, attrs: Attributes) -> Result<(), StoreError> {
        let Inner {
            conn,
            schemas,
            indices,
        } = self;
        let schema = schemas
            .get(record_type)
            .ok_or_else(|| StoreError::UnknownRecordType(record_type.to_string()))?;
        Self::check_attrs(schema, &attrs)?;

        let tx = conn.transaction().map_err(db_err)?;
        let current: Option<String> = tx
            .query_row(
                &format!("SELECT attrs FROM {} WHERE id = ?", table_name(record_type)),
                params![id],
                |row| row.get(0),
            )
            .optional()
            .map_err(db_err)?;
        let current = current.ok_or_else(|| StoreError::NotFound(format!("{} {}", record_type, id)))?;
        let mut merged: Attributes = serde_json::from_str(&current)
            .map_err(|e| StoreError::Internal(format!("corrupt attributes: {}", e)))?;
        for (name, value) in attrs {
            if value.is_null() {
                merged.remove(&name);
            } else {
                merged.insert(name, value);
            }
        }

        let mut assignments = Vec::new();
        let mut values = Vec::new();
        for attr in schema.searchable_attrs() {
            assignments.push(format!("\"{}\" = ?", attr.name));
            values.push(column_value(merged.get(&attr.name))?);
        }
        assignments.push("attrs = ?".to_string());
        values.push(SqlValue::Text(
            serde_json::to_string(&merged).map_err(|e| StoreError::Internal(e.to_string()))?,
        ));
        values.push(SqlValue::Integer(id));

        tx.execute(
            &format!(
                "UPDATE {} SET {} WHERE id = ?",
                table_name(record_type),
                assignments.join(", ")
            ),
            params_from_iter(values.iter()),
        )
        .map_err(db_err)?;

        unindex_object(&tx, schema, id)?;
        index_object(&tx, schema, indices, id, &merged)?;
        tx.commit().map_err(db_err)?;
        Ok(())
    }

    fn delete(&mut self, query: &Query) -> Result<u64, StoreError> {
        let ids: Vec<i64> = self
            .query(query)?
            .into_iter()
            .map(|row| row.id)
            .collect();
        if ids.is_empty() {
            return Ok(0);
        }

        let Inner { conn, schemas, .. } = self;
        let schema = schemas
            .get(&query.record_type)
            .ok_or_else(|| StoreError::UnknownRecordType(query.record_type.clone()))?;

        let tx = conn.transaction().map_err(db_err)?;
        for id in &ids {
            unindex_object(&tx, schema, *id)?;
            tx.execute(
                &format!("DELETE FROM {} WHERE id = ?", table_name(&query.record_type)),
                params![id],
            )
            .map_err(db_err)?;
        }
        tx.commit().map_err(db_err)?;
        Ok(ids.len() as u64)
    }

    fn get_metadata(&self, key: &str) -> Result<Option<AttrValue>, StoreError> {
        let raw: Option<String> = self
            .conn
            .query_row("SELECT value FROM meta WHERE key = ?", params![key], |row| {
                row.get(0)
            })
            .optional()
            .map_err(db_err)?;
        raw.map(|s| {
            serde_json::from_str(&s)
                .map_err(|e| StoreError::Internal(format!("corrupt metadata '{}': {}", key, e)))
        })
        .transpose()
    }

    fn set_metadata(&self, key: &str, value: &AttrValue) -> Result<(), StoreError> {
        let json = serde_json::to_string(value).map_err(|e| StoreError::Internal(e.to_string()))?;
        self.conn
            .execute(
                "INSERT INTO meta (key, value) VALUES (?, ?)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                params![key, json],
            )
            .map_err(db_err)?;
        Ok(())
    }

    fn index_terms(
        &self,
        index: &str,
        associated: Option<&[String]>,
        prefix: Option<&str>,
    ) -> Result<Vec<String>, StoreError> {
        let def = self
            .indices
            .get(index)
            .ok_or_else(|| StoreError::UnknownIndex(index.to_string()))?;
        let terms = terms_table(index);
        let map = terms_map_table(index);

        let mut values: Vec<SqlValue> = Vec::new();
        let (mut sql, term_column) = match associated {
            None => (format!("SELECT term FROM {} WHERE count > 0", terms), "term"),
            Some(associated) => {
                let normalized = normalize_query_terms(associated, def.min, def.max);
                if normalized.is_empty() {
                    return Ok(Vec::new());
                }
                let marks = placeholders(normalized.len());
                let sql = format!(
                    "SELECT DISTINCT t.term FROM {map} m JOIN {terms} t ON t.id = m.term_id \
                     WHERE (m.object_type, m.object_id) IN ( \
                         SELECT m2.object_type, m2.object_id FROM {map} m2 \
                         JOIN {terms} t2 ON t2.id = m2.term_id \
                         WHERE t2.term IN ({marks}) \
                         GROUP BY m2.object_type, m2.object_id \
                         HAVING COUNT(DISTINCT t2.term) = ?) \
                     AND t.term NOT IN ({marks})",
                );
                values.extend(normalized.iter().cloned().map(SqlValue::Text));
                values.push(SqlValue::Integer(normalized.len() as i64));
                values.extend(normalized.into_iter().map(SqlValue::Text));
                (sql, "t.term")
            }
        };

        if let Some(prefix) = prefix.filter(|p| !p.is_empty()) {
            sql.push_str(&format!(" AND {} LIKE ? ESCAPE '\\'", term_column));
            values.push(SqlValue::Text(format!(
                "{}%",
                escape_like(&prefix.to_lowercase())
            )));
        }
        sql.push_str(&format!(" ORDER BY {}", term_column));

        let mut stmt = self.conn.prepare(&sql).map_err(db_err)?;
        let rows = stmt
            .query_map(params_from_iter(values.iter()), |row| row.get::<_, String>(0))
            .map_err(db_err)?;

        let mut result = Vec::new();
        for row in rows {
            result.push(row.map_err(db_err)?);
        }
        Ok(result)
    }
}

/// Add an object's terms to every inverted index its schema feeds.
fn index_object(
    tx: &Transaction<'_>,
    schema: &RecordSchema,
    indices: &HashMap<String, InvertedIndexDef>,
    id: i64,
    attrs: &Attributes,
) -> Result<(), StoreError> {
    let mut per_index: BTreeMap<&str, BTreeMap<String, u32>> = BTreeMap::new();
    for attr in &schema.attrs {
        let Some(ref index) = attr.inverted_index else {
            continue;
        };
        let def = indices
            .get(index)
            .ok_or_else(|| StoreError::UnknownIndex(index.clone()))?;
        let entry = per_index.entry(index.as_str()).or_default();
        if let Some(value) = attrs.get(&attr.name) {
            term_frequencies(value, def.min, def.max, entry);
        }
    }

    for (index, terms) in per_index {
        let terms_t = terms_table(index);
        let map_t = terms_map_table(index);
        for (term, frequency) in terms {
            tx.execute(
                &format!(
                    "INSERT INTO {} (term, count) VALUES (?, 0) ON CONFLICT(term) DO NOTHING",
                    terms_t
                ),
                params![&term],
            )
            .map_err(db_err)?;
            tx.execute(
                &format!("UPDATE {} SET count = count + 1 WHERE term = ?", terms_t),
                params![&term],
            )
            .map_err(db_err)?;
            let term_id: i64 = tx
                .query_row(
                    &format!("SELECT id FROM {} WHERE term = ?", terms_t),
                    params![&term],
                    |row| row.get(0),
                )
                .map_err(db_err)?;
            tx.execute(
                &format!(
                    "INSERT INTO {} (term_id, object_type, object_id, frequency) VALUES (?, ?, ?, ?)",
                    map_t
                ),
                params![term_id, &schema.record_type, id, frequency],
            )
            .map_err(db_err)?;
        }
    }
    Ok(())
}

/// Remove an object from every inverted index its schema feeds.
fn unindex_object(tx: &Transaction<'_>, schema: &RecordSchema, id: i64) -> Result<(), StoreError> {
    let index_names: BTreeSet<&str> = schema
        .attrs
        .iter()
        .filter_map(|a| a.inverted_index.as_deref())
        .collect();

    for index in index_names {
        let terms_t = terms_table(index);
        let map_t = terms_map_table(index);
        tx.execute(
            &format!(
                "UPDATE {terms_t} SET count = count - 1 WHERE id IN \
                 (SELECT term_id FROM {map_t} WHERE object_type = ? AND object_id = ?)"
            ),
            params![&schema.record_type, id],
        )
        .map_err(db_err)?;
        tx.execute(
            &format!("DELETE FROM {map_t} WHERE object_type = ? AND object_id = ?"),
            params![&schema.record_type, id],
        )
        .map_err(db_err)?;
        tx.execute(&format!("DELETE FROM {terms_t} WHERE count <= 0"), [])
            .map_err(db_err)?;
    }
    Ok(())
}

#[async_trait]
impl GuideStore for SqliteGuideStore {
    async fn declare_inverted_index(&self, index: &InvertedIndexDef) -> Result<(), StoreError> {
        let index = index.clone();
        self.run(move |inner| inner.declare_inverted_index(index))
            .await
    }

    async fn declare_schema(&self, schema: &RecordSchema) -> Result<(), StoreError> {
        let schema = schema.clone();
        self.run(move |inner| inner.declare_schema(schema)).await
    }

    async fn query(&self, query: &Query) -> Result<Vec<Row>, StoreError> {
        let query = query.clone();
        self.run(move |inner| inner.query(&query)).await
    }

    async fn count(&self, query: &Query) -> Result<u64, StoreError> {
        let query = query.clone();
        self.run(move |inner| inner.count(&query)).await
    }

    async fn insert(
        &self,
        record_type: &str,
        parent: Option<ParentRef>,
        attrs: Attributes,
    ) -> Result<i64, StoreError> {
        let record_type = record_type.to_string();
        self.run(move |inner| inner.insert(&record_type, parent, attrs))
            .await
    }

    async fn update(
        &self,
        record_type: &str,
        id: i64,
        attrs: Attributes,
    ) -> Result<(), StoreError> {
        let record_type = record_type.to_string();
        self.run(move |inner| inner.update(&record_type, id, attrs))
            .await
    }

    async fn delete(&self, query: &Query) -> Result<u64, StoreError> {
        let query = query.clone();
        self.run(move |inner| inner.delete(&query)).await
    }

    async fn get_metadata(&self, key: &str, default: AttrValue) -> Result<AttrValue, StoreError> {
        let key = key.to_string();
        let value = self.run(move |inner| inner.get_metadata(&key)).await?;
        Ok(value.unwrap_or(default))
    }

    async fn set_metadata(&self, key: &str, value: AttrValue) -> Result<(), StoreError> {
        let key = key.to_string();
        self.run(move |inner| inner.set_metadata(&key, &value)).await
    }

    async fn index_terms(
        &self,
        index: &str,
        associated: Option<&[String]>,
        prefix: Option<&str>,
    ) -> Result<Vec<String>, StoreError> {
        let index = index.to_string();
        let associated = associated.map(<[String]>::to_vec);
        let prefix = prefix.map(str::to_string);
        self.run(move |inner| inner.index_terms(&index, associated.as_deref(), prefix.as_deref()))
            .await
    }
}
