//! Typed program results.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::channel::Channel;
use super::mapper::ProgramExtras;
use crate::store::{AttrValue, Row};

/// Content flags bitmask stored in the program `flags` attribute.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProgramFlags(pub u32);

impl ProgramFlags {
    pub const NONE: ProgramFlags = ProgramFlags(0);
    pub const CLOSED_CAPTION: ProgramFlags = ProgramFlags(1 << 0);
    pub const HDTV: ProgramFlags = ProgramFlags(1 << 1);
    pub const NEW: ProgramFlags = ProgramFlags(1 << 2);
    pub const DOLBY: ProgramFlags = ProgramFlags(1 << 3);
    pub const LIVE: ProgramFlags = ProgramFlags(1 << 4);
    pub const PREMIERE: ProgramFlags = ProgramFlags(1 << 5);

    pub fn bits(self) -> u32 {
        self.0
    }

    pub fn contains(self, other: ProgramFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl std::ops::BitOr for ProgramFlags {
    type Output = ProgramFlags;

    fn bitor(self, rhs: ProgramFlags) -> ProgramFlags {
        ProgramFlags(self.0 | rhs.0)
    }
}

impl std::ops::BitOrAssign for ProgramFlags {
    fn bitor_assign(&mut self, rhs: ProgramFlags) {
        self.0 |= rhs.0;
    }
}

/// A credit entry: who did what, and optionally in which role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credit {
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

impl Credit {
    pub fn new(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            name: name.into(),
            role: None,
        }
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }

    /// Stored form: `[type, name, role]`.
    pub fn to_attr(&self) -> AttrValue {
        AttrValue::List(vec![
            self.kind.as_str().into(),
            self.name.as_str().into(),
            self.role.clone().into(),
        ])
    }

    /// Parse the stored form. Entries without a type and name are rejected.
    pub fn from_attr(value: &AttrValue) -> Option<Self> {
        let items = value.as_list()?;
        let kind = items.first()?.as_str()?.to_string();
        let name = items.get(1)?.as_str()?.to_string();
        let role = items.get(2).and_then(AttrValue::as_str).map(str::to_string);
        Some(Self { kind, name, role })
    }
}

/// Construction of a typed search result from a program row.
///
/// Implement this to have [`Guide::search_as`](super::Guide::search_as)
/// produce a custom type instead of [`Program`].
pub trait FromProgramRow: Sized {
    fn from_row(channel: Arc<Channel>, row: &Row, extras: ProgramExtras) -> Self;
}

/// A scheduled program on a channel.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Program {
    pub db_id: i64,
    pub channel: Arc<Channel>,
    pub title: String,
    pub desc: String,
    /// Start time, UTC seconds.
    pub start: i64,
    /// Stop time, UTC seconds.
    pub stop: i64,
    pub episode: Option<String>,
    pub subtitle: Option<String>,
    pub genres: Vec<String>,
    pub category: Option<String>,
    /// Original air date, UTC seconds.
    pub date: Option<i64>,
    pub year: Option<i64>,
    /// Critical rating out of 4.0.
    pub score: Option<f64>,
    pub rating: Option<String>,
    pub advisories: Vec<String>,
    pub flags: ProgramFlags,
    pub credits: Vec<Credit>,
    /// Annotations added by program-retrieved hooks.
    #[serde(skip_serializing_if = "serde_json::Map::is_empty")]
    pub extras: ProgramExtras,
}

impl FromProgramRow for Program {
    fn from_row(channel: Arc<Channel>, row: &Row, extras: ProgramExtras) -> Self {
        let credits = row
            .get("credits")
            .and_then(AttrValue::as_list)
            .map(|items| items.iter().filter_map(Credit::from_attr).collect())
            .unwrap_or_default();

        Self {
            db_id: row.id,
            channel,
            title: row.get_str("title").unwrap_or_default().to_string(),
            desc: row.get_str("desc").unwrap_or_default().to_string(),
            start: row.get_i64("start").unwrap_or(0),
            stop: row.get_i64("stop").unwrap_or(0),
            episode: row.get_str("episode").map(str::to_string),
            subtitle: row.get_str("subtitle").map(str::to_string),
            genres: row.get_strings("genres"),
            category: row.get_str("category").map(str::to_string),
            date: row.get_i64("date"),
            year: row.get_i64("year"),
            score: row.get_f64("score"),
            rating: row.get_str("rating").map(str::to_string),
            advisories: row.get_strings("advisories"),
            flags: ProgramFlags(row.get_i64("flags").unwrap_or(0) as u32),
            credits,
            extras,
        }
    }
}

impl Program {
    pub fn start_time(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.start, 0)
    }

    pub fn stop_time(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.stop, 0)
    }

    pub fn duration(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.stop - self.start)
    }

    /// Whether the program airs at the given instant (start inclusive, stop exclusive).
    pub fn is_airing_at(&self, ts: i64) -> bool {
        self.start <= ts && ts < self.stop
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} on {}", self.title, self.channel.name)?;
        if let Some(start) = self.start_time() {
            write!(f, " at {}", start.format("%Y-%m-%d %H:%M"))?;
        }
        Ok(())
    }
}
