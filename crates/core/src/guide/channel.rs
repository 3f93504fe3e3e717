//! Channel type and ordering.

use std::cmp::Ordering;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::store::{AttrValue, Row};

/// A television channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    /// Store identifier. `None` for detached channels built by callers.
    pub db_id: Option<i64>,
    /// Tuner identifiers mapped to this channel, in declaration order.
    pub tuner_ids: Vec<String>,
    pub name: String,
    pub long_name: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChannelError {
    #[error("need at least one of tuner id, name or long name to create a channel")]
    MissingFields,
}

impl Channel {
    /// Build a channel from a stored `channel` row.
    ///
    /// Numeric tuner ids are converted to their decimal text.
    pub fn from_row(row: &Row) -> Self {
        let tuner_ids = row
            .get("tuner_id")
            .and_then(AttrValue::as_list)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| match item {
                        AttrValue::Text(s) => Some(s.clone()),
                        AttrValue::Int(v) => Some(v.to_string()),
                        _ => None,
                    })
                    .collect()
            })
            .unwrap_or_default();

        Self {
            db_id: Some(row.id),
            tuner_ids,
            name: row.get_str("name").unwrap_or_default().to_string(),
            long_name: row.get_str("long_name").unwrap_or_default().to_string(),
        }
    }

    /// Build a channel that is not backed by the store.
    ///
    /// Empty strings count as missing. The name falls back to the first tuner
    /// id, then to the long name; the long name falls back to the name.
    pub fn detached(
        tuner_ids: Vec<String>,
        name: Option<&str>,
        long_name: Option<&str>,
    ) -> Result<Self, ChannelError> {
        let name = name.filter(|s| !s.is_empty());
        let long_name = long_name.filter(|s| !s.is_empty());
        if tuner_ids.is_empty() && name.is_none() && long_name.is_none() {
            return Err(ChannelError::MissingFields);
        }

        let name = match name {
            Some(name) => name.to_string(),
            None => match tuner_ids.first() {
                Some(first) => first.clone(),
                None => long_name.unwrap_or_default().to_string(),
            },
        };
        let long_name = long_name
            .map(str::to_string)
            .unwrap_or_else(|| name.clone());

        Ok(Self {
            db_id: None,
            tuner_ids,
            name,
            long_name,
        })
    }

    pub fn is_detached(&self) -> bool {
        self.db_id.is_none()
    }

    /// First tuner id that parses as an integer, or 0 if none does.
    pub fn sort_number(&self) -> i64 {
        self.tuner_ids
            .iter()
            .find_map(|t| t.trim().parse::<i64>().ok())
            .unwrap_or(0)
    }
}

/// Ordering used for channel listings.
///
/// Channels without tuner ids come first. Otherwise channels compare by
/// [`Channel::sort_number`].
pub fn compare_channels(a: &Channel, b: &Channel) -> Ordering {
    match (a.tuner_ids.is_empty(), b.tuner_ids.is_empty()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => a.sort_number().cmp(&b.sort_number()),
    }
}

/// Sort by name, then stable-sort by [`compare_channels`] so ties stay in name order.
pub fn sort_channels(channels: &mut [Arc<Channel>]) {
    channels.sort_by(|a, b| a.name.cmp(&b.name));
    channels.sort_by(|a, b| compare_channels(a, b));
}
