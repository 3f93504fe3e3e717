//! Channel cache snapshots.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde::Serialize;
use tracing::warn;

use super::channel::{sort_channels, Channel};
use crate::metrics;
use crate::store::{AttrValue, GuideStore, Query, Row, StoreError};

/// Metadata key for the longest program duration ever stored, in seconds.
pub const MAX_PROGRAM_LENGTH_KEY: &str = "max_program_length";
/// Metadata key for the total number of stored programs.
pub const NUM_PROGRAMS_KEY: &str = "num_programs";

/// A tuner id listed by a channel after another channel already claimed it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TunerCollision {
    pub tuner_id: String,
    /// Channel whose claim was rejected.
    pub channel: String,
    /// Channel that keeps the tuner id.
    pub claimed_by: String,
}

/// Immutable view of all channels plus the guide metadata, built by one sync.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChannelCache {
    by_name: HashMap<String, Arc<Channel>>,
    by_db_id: BTreeMap<i64, Arc<Channel>>,
    by_tuner_id: HashMap<String, Arc<Channel>>,
    max_program_length: i64,
    num_programs: u64,
    collisions: Vec<TunerCollision>,
}

impl ChannelCache {
    /// Build a snapshot from channel rows in store order.
    ///
    /// A later row with an already seen name takes over the name mapping.
    /// Tuner ids are first-claim-wins: later claims are recorded as collisions.
    pub fn build(rows: &[Row], max_program_length: i64, num_programs: u64) -> Self {
        let mut cache = Self {
            max_program_length,
            num_programs,
            ..Self::default()
        };

        for row in rows {
            let channel = Arc::new(Channel::from_row(row));
            cache.by_name.insert(channel.name.clone(), Arc::clone(&channel));
            cache.by_db_id.insert(row.id, Arc::clone(&channel));

            for tuner_id in &channel.tuner_ids {
                match cache.by_tuner_id.get(tuner_id) {
                    Some(existing) => {
                        warn!(
                            channel = %channel.name,
                            tuner_id = %tuner_id,
                            claimed_by = %existing.name,
                            "Tuner id already claimed by another channel"
                        );
                        metrics::TUNER_COLLISIONS.inc();
                        cache.collisions.push(TunerCollision {
                            tuner_id: tuner_id.clone(),
                            channel: channel.name.clone(),
                            claimed_by: existing.name.clone(),
                        });
                    }
                    None => {
                        cache
                            .by_tuner_id
                            .insert(tuner_id.clone(), Arc::clone(&channel));
                    }
                }
            }
        }

        cache
    }

    /// Read the metadata scalars and every channel row from the store.
    pub async fn load(store: &dyn GuideStore) -> Result<Self, StoreError> {
        let max_program_length = store
            .get_metadata(MAX_PROGRAM_LENGTH_KEY, AttrValue::Int(0))
            .await?
            .as_i64()
            .unwrap_or(0);
        let num_programs = store
            .get_metadata(NUM_PROGRAMS_KEY, AttrValue::Int(0))
            .await?
            .as_i64()
            .unwrap_or(0)
            .max(0) as u64;
        let rows = store.query(&Query::new("channel")).await?;

        Ok(Self::build(&rows, max_program_length, num_programs))
    }

    pub fn get_by_name(&self, name: &str) -> Option<Arc<Channel>> {
        self.by_name.get(name).cloned()
    }

    pub fn get_by_db_id(&self, id: i64) -> Option<Arc<Channel>> {
        self.by_db_id.get(&id).cloned()
    }

    pub fn get_by_tuner_id(&self, tuner_id: &str) -> Option<Arc<Channel>> {
        self.by_tuner_id.get(tuner_id).cloned()
    }

    /// One channel per name, either in store order or in listing order.
    pub fn channels(&self, sorted: bool) -> Vec<Arc<Channel>> {
        let mut channels: Vec<Arc<Channel>> = self
            .by_db_id
            .values()
            .filter(|c| {
                self.by_name
                    .get(&c.name)
                    .map(|named| Arc::ptr_eq(named, *c))
                    .unwrap_or(false)
            })
            .cloned()
            .collect();
        if sorted {
            sort_channels(&mut channels);
        }
        channels
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    pub fn max_program_length(&self) -> i64 {
        self.max_program_length
    }

    pub fn num_programs(&self) -> u64 {
        self.num_programs
    }

    pub fn collisions(&self) -> &[TunerCollision] {
        &self.collisions
    }
}
