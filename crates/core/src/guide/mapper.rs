//! Mapping of program rows into results, with per-row hook annotations.

use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use super::cache::ChannelCache;
use super::program::FromProgramRow;
use crate::metrics;
use crate::store::{AttrValue, Row};

/// Per-row annotations written by program-retrieved hooks.
pub type ProgramExtras = serde_json::Map<String, serde_json::Value>;

/// Callback run once for every program row a search retrieves.
///
/// Hooks may add keys to the row's extras map; they see a fresh empty map
/// for each row. Closures with the matching signature implement this trait.
pub trait ProgramRetrieved: Send + Sync {
    fn on_program_retrieved(&self, row: &Row, extras: &mut ProgramExtras);
}

impl<F> ProgramRetrieved for F
where
    F: Fn(&Row, &mut ProgramExtras) + Send + Sync,
{
    fn on_program_retrieved(&self, row: &Row, extras: &mut ProgramExtras) {
        self(row, extras)
    }
}

/// An untyped search result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RawProgram {
    pub row: Row,
    #[serde(skip_serializing_if = "serde_json::Map::is_empty")]
    pub extras: ProgramExtras,
    /// Values of the requested attributes, in request order.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub projection: Option<Vec<Option<AttrValue>>>,
}

/// Run every hook on every row, in row order.
///
/// Returns `None` without touching the rows when no hook is registered.
pub fn collect_extras(
    rows: &[Row],
    hooks: &[Arc<dyn ProgramRetrieved>],
) -> Option<Vec<ProgramExtras>> {
    if hooks.is_empty() {
        return None;
    }

    let extras = rows
        .iter()
        .map(|row| {
            let mut extras = ProgramExtras::new();
            for hook in hooks {
                hook.on_program_retrieved(row, &mut extras);
            }
            extras
        })
        .collect();
    Some(extras)
}

/// Wrap rows as raw results, projecting the requested attributes if any.
pub fn rows_to_raw(
    rows: Vec<Row>,
    extras: Option<Vec<ProgramExtras>>,
    attrs: Option<&[String]>,
) -> Vec<RawProgram> {
    let mut extras = extras.map(Vec::into_iter);
    rows.into_iter()
        .map(|row| {
            let projection = attrs.map(|names| row.project(names));
            RawProgram {
                extras: extras
                    .as_mut()
                    .and_then(Iterator::next)
                    .unwrap_or_default(),
                projection,
                row,
            }
        })
        .collect()
}

/// Join rows to their cached channels and build typed results.
///
/// Rows whose parent channel is not in the snapshot are dropped.
pub fn rows_to_programs<T: FromProgramRow>(
    cache: &ChannelCache,
    rows: Vec<Row>,
    extras: Option<Vec<ProgramExtras>>,
) -> Vec<T> {
    let mut extras = extras.map(Vec::into_iter);
    let mut results = Vec::with_capacity(rows.len());

    for row in rows {
        let row_extras = extras
            .as_mut()
            .and_then(Iterator::next)
            .unwrap_or_default();
        let channel = row.parent_id().and_then(|id| cache.get_by_db_id(id));
        match channel {
            Some(channel) => results.push(T::from_row(channel, &row, row_extras)),
            None => {
                debug!(
                    program_id = row.id,
                    parent_id = ?row.parent_id(),
                    "Dropping program with unknown channel"
                );
                metrics::ROWS_DROPPED.inc();
            }
        }
    }

    results
}
