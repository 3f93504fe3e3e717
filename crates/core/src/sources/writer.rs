//! Writes channels and programs through the store during an update.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{UpdateError, UpdateSummary};
use crate::guide::cache::{MAX_PROGRAM_LENGTH_KEY, NUM_PROGRAMS_KEY};
use crate::guide::schema::{CHANNEL_TYPE, PROGRAM_TYPE};
use crate::guide::{Channel, Credit, ProgramFlags};
use crate::store::{AttrValue, Attributes, Filter, GuideStore, ParentFilter, ParentRef, Query};

/// A program as delivered by a source.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProgramData {
    pub title: String,
    #[serde(default)]
    pub desc: String,
    /// UTC seconds.
    pub start: i64,
    /// UTC seconds.
    pub stop: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub episode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,
    #[serde(default)]
    pub genres: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<String>,
    #[serde(default)]
    pub advisories: Vec<String>,
    #[serde(default)]
    pub flags: ProgramFlags,
    #[serde(default)]
    pub credits: Vec<Credit>,
}

impl ProgramData {
    pub fn new(title: impl Into<String>, start: i64, stop: i64) -> Self {
        Self {
            title: title.into(),
            start,
            stop,
            ..Self::default()
        }
    }

    /// Stored attribute map. Unset optional fields are left out.
    pub fn to_attributes(&self) -> Attributes {
        let mut attrs = Attributes::new();
        attrs.insert("title".to_string(), self.title.as_str().into());
        attrs.insert("desc".to_string(), self.desc.as_str().into());
        attrs.insert("start".to_string(), self.start.into());
        attrs.insert("stop".to_string(), self.stop.into());
        attrs.insert("flags".to_string(), self.flags.bits().into());

        let optional = [
            ("episode", self.episode.clone().map(AttrValue::from)),
            ("subtitle", self.subtitle.clone().map(AttrValue::from)),
            ("category", self.category.clone().map(AttrValue::from)),
            ("date", self.date.map(AttrValue::from)),
            ("year", self.year.map(AttrValue::from)),
            ("score", self.score.map(AttrValue::from)),
            ("rating", self.rating.clone().map(AttrValue::from)),
        ];
        for (name, value) in optional {
            if let Some(value) = value {
                attrs.insert(name.to_string(), value);
            }
        }

        if !self.genres.is_empty() {
            attrs.insert("genres".to_string(), self.genres.clone().into());
        }
        if !self.advisories.is_empty() {
            attrs.insert("advisories".to_string(), self.advisories.clone().into());
        }
        if !self.credits.is_empty() {
            attrs.insert(
                "credits".to_string(),
                AttrValue::List(self.credits.iter().map(Credit::to_attr).collect()),
            );
        }
        attrs
    }
}

/// Accumulates one update's writes and maintains the guide metadata.
pub struct GuideWriter<'a> {
    store: &'a dyn GuideStore,
    /// Existing and newly added channels, by name.
    channels: HashMap<String, Channel>,
    /// Persisted `max_program_length`, raised before any longer program is stored.
    max_program_length: i64,
    summary: UpdateSummary,
}

impl<'a> GuideWriter<'a> {
    /// Start an update, preloading the stored channels.
    pub async fn new(store: &'a dyn GuideStore) -> Result<GuideWriter<'a>, UpdateError> {
        let rows = store.query(&Query::new(CHANNEL_TYPE)).await?;
        let channels = rows
            .iter()
            .map(Channel::from_row)
            .map(|c| (c.name.clone(), c))
            .collect();
        let max_program_length = store
            .get_metadata(MAX_PROGRAM_LENGTH_KEY, AttrValue::Int(0))
            .await?
            .as_i64()
            .unwrap_or(0);

        Ok(Self {
            store,
            channels,
            max_program_length,
            summary: UpdateSummary::default(),
        })
    }

    /// Add a channel, or merge tuner ids into the stored channel with the same name.
    ///
    /// Returns the channel's store id.
    pub async fn add_channel(
        &mut self,
        tuner_ids: &[String],
        name: &str,
        long_name: &str,
    ) -> Result<i64, UpdateError> {
        if let Some(existing) = self.channels.get_mut(name) {
            let id = existing.db_id.ok_or_else(|| {
                UpdateError::Parse(format!("channel '{}' has no store id", name))
            })?;
            let missing: Vec<String> = tuner_ids
                .iter()
                .filter(|t| !existing.tuner_ids.contains(*t))
                .cloned()
                .collect();
            if !missing.is_empty() {
                existing.tuner_ids.extend(missing);
                let mut attrs = Attributes::new();
                attrs.insert("tuner_id".to_string(), existing.tuner_ids.clone().into());
                self.store.update(CHANNEL_TYPE, id, attrs).await?;
                self.summary.channels_updated += 1;
                debug!(channel = %name, tuner_ids = ?existing.tuner_ids, "Merged tuner ids");
            }
            return Ok(id);
        }

        let long_name = if long_name.is_empty() { name } else { long_name };
        let mut attrs = Attributes::new();
        attrs.insert("tuner_id".to_string(), tuner_ids.to_vec().into());
        attrs.insert("name".to_string(), name.into());
        attrs.insert("long_name".to_string(), long_name.into());
        let id = self.store.insert(CHANNEL_TYPE, None, attrs).await?;

        self.channels.insert(
            name.to_string(),
            Channel {
                db_id: Some(id),
                tuner_ids: tuner_ids.to_vec(),
                name: name.to_string(),
                long_name: long_name.to_string(),
            },
        );
        self.summary.channels_added += 1;
        Ok(id)
    }

    /// Add a program to a channel, replacing stored programs it overlaps.
    ///
    /// Programs that do not end after they start are skipped and `None` is returned.
    /// The stored `max_program_length` is raised before a longer program is
    /// inserted, so it covers every stored program even if the update fails later.
    pub async fn add_program(
        &mut self,
        channel_id: i64,
        program: &ProgramData,
    ) -> Result<Option<i64>, UpdateError> {
        if program.stop <= program.start {
            warn!(
                title = %program.title,
                start = program.start,
                stop = program.stop,
                "Skipping program that does not end after it starts"
            );
            self.summary.programs_skipped += 1;
            return Ok(None);
        }

        let overlapping = Query::new(PROGRAM_TYPE)
            .parent(ParentFilter::One(ParentRef::new(CHANNEL_TYPE, channel_id)))
            .filter("start", Filter::lt(program.stop))
            .filter("stop", Filter::gt(program.start));
        let replaced = self.store.delete(&overlapping).await?;
        self.summary.programs_replaced += replaced;

        let length = program.stop.saturating_sub(program.start);
        if length > self.max_program_length {
            self.store
                .set_metadata(MAX_PROGRAM_LENGTH_KEY, AttrValue::Int(length))
                .await?;
            self.max_program_length = length;
        }

        let id = self
            .store
            .insert(
                PROGRAM_TYPE,
                Some(ParentRef::new(CHANNEL_TYPE, channel_id)),
                program.to_attributes(),
            )
            .await?;
        self.summary.programs_added += 1;
        Ok(Some(id))
    }

    /// Recount stored programs and persist the count.
    pub async fn record_program_count(&mut self) -> Result<u64, UpdateError> {
        let num_programs = self.store.count(&Query::new(PROGRAM_TYPE)).await?;
        self.store
            .set_metadata(NUM_PROGRAMS_KEY, AttrValue::from(num_programs))
            .await?;
        self.summary.num_programs = num_programs;
        Ok(num_programs)
    }

    /// Expire old programs and write the guide metadata.
    ///
    /// `max_program_length` never shrinks; `num_programs` is recounted.
    pub async fn finish(mut self, expire_before: Option<i64>) -> Result<UpdateSummary, UpdateError> {
        if let Some(cutoff) = expire_before {
            let expired = Query::new(PROGRAM_TYPE).filter("stop", Filter::lt(cutoff));
            self.summary.programs_expired = self.store.delete(&expired).await?;
        }

        self.record_program_count().await?;
        self.summary.max_program_length = self.max_program_length;
        Ok(self.summary)
    }
}
