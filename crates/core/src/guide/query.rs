//! Translation of program searches into store queries.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Local, NaiveDateTime, TimeZone};
use serde::{Deserialize, Serialize};

use super::channel::Channel;
use super::error::GuideError;
use crate::store::{AttrValue, Filter, ParentFilter, ParentRef, Query};

/// Conversion of a time value to UTC seconds since the epoch.
pub trait IntoTimestamp {
    fn into_timestamp(self) -> i64;
}

impl IntoTimestamp for i64 {
    fn into_timestamp(self) -> i64 {
        self
    }
}

impl IntoTimestamp for i32 {
    fn into_timestamp(self) -> i64 {
        self as i64
    }
}

impl<Tz: TimeZone> IntoTimestamp for DateTime<Tz> {
    fn into_timestamp(self) -> i64 {
        self.timestamp()
    }
}

/// Naive datetimes are taken to be local time.
impl IntoTimestamp for NaiveDateTime {
    fn into_timestamp(self) -> i64 {
        match Local.from_local_datetime(&self).earliest() {
            Some(local) => local.timestamp(),
            // Skipped by a DST transition; read it as UTC rather than fail
            None => self.and_utc().timestamp(),
        }
    }
}

/// A point in time or a time range, in UTC seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeSpec {
    At(i64),
    /// A `stop` of 0 means the range has no end.
    Range { start: i64, stop: i64 },
}

impl TimeSpec {
    pub fn at(t: impl IntoTimestamp) -> Self {
        TimeSpec::At(t.into_timestamp())
    }

    pub fn range(start: impl IntoTimestamp, stop: impl IntoTimestamp) -> Self {
        TimeSpec::Range {
            start: start.into_timestamp(),
            stop: stop.into_timestamp(),
        }
    }

    /// Everything from `start` on.
    pub fn since(start: impl IntoTimestamp) -> Self {
        TimeSpec::Range {
            start: start.into_timestamp(),
            stop: 0,
        }
    }
}

/// Channels a search is restricted to.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelSelector {
    Single(Channel),
    Many(Vec<Channel>),
}

/// Program attributes a search can filter on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgramAttr {
    Title,
    Desc,
    Start,
    Stop,
    Genres,
    Date,
    Year,
    Score,
    Keywords,
    Category,
    Rating,
    Flags,
}

impl ProgramAttr {
    pub const ALL: [ProgramAttr; 12] = [
        ProgramAttr::Title,
        ProgramAttr::Desc,
        ProgramAttr::Start,
        ProgramAttr::Stop,
        ProgramAttr::Genres,
        ProgramAttr::Date,
        ProgramAttr::Year,
        ProgramAttr::Score,
        ProgramAttr::Keywords,
        ProgramAttr::Category,
        ProgramAttr::Rating,
        ProgramAttr::Flags,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProgramAttr::Title => "title",
            ProgramAttr::Desc => "desc",
            ProgramAttr::Start => "start",
            ProgramAttr::Stop => "stop",
            ProgramAttr::Genres => "genres",
            ProgramAttr::Date => "date",
            ProgramAttr::Year => "year",
            ProgramAttr::Score => "score",
            ProgramAttr::Keywords => "keywords",
            ProgramAttr::Category => "category",
            ProgramAttr::Rating => "rating",
            ProgramAttr::Flags => "flags",
        }
    }

    /// Name of the inverted index this attribute searches, if it is term-based.
    pub fn inverted_index(&self) -> Option<&'static str> {
        match self {
            ProgramAttr::Keywords => Some("keywords"),
            ProgramAttr::Genres => Some("genres"),
            _ => None,
        }
    }
}

impl fmt::Display for ProgramAttr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProgramAttr {
    type Err = GuideError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ProgramAttr::ALL
            .iter()
            .copied()
            .find(|attr| attr.as_str() == s)
            .ok_or_else(|| GuideError::InvalidFilter(format!("unknown program attribute: {}", s)))
    }
}

/// Parameters of a program search.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchRequest {
    pub channel: Option<ChannelSelector>,
    pub time: Option<TimeSpec>,
    pub filters: BTreeMap<ProgramAttr, Filter>,
    /// Attributes to project in raw results.
    pub attrs: Option<Vec<String>>,
    pub limit: Option<u32>,
}

impl SearchRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn channel(mut self, channel: Channel) -> Self {
        self.channel = Some(ChannelSelector::Single(channel));
        self
    }

    pub fn channels(mut self, channels: Vec<Channel>) -> Self {
        self.channel = Some(ChannelSelector::Many(channels));
        self
    }

    pub fn at(mut self, t: impl IntoTimestamp) -> Self {
        self.time = Some(TimeSpec::at(t));
        self
    }

    pub fn range(mut self, start: impl IntoTimestamp, stop: impl IntoTimestamp) -> Self {
        self.time = Some(TimeSpec::range(start, stop));
        self
    }

    pub fn time(mut self, time: TimeSpec) -> Self {
        self.time = Some(time);
        self
    }

    pub fn filter(mut self, attr: ProgramAttr, filter: Filter) -> Self {
        self.filters.insert(attr, filter);
        self
    }

    pub fn keywords<S: Into<String>>(self, terms: impl IntoIterator<Item = S>) -> Self {
        self.terms(ProgramAttr::Keywords, terms)
    }

    pub fn genres<S: Into<String>>(self, terms: impl IntoIterator<Item = S>) -> Self {
        self.terms(ProgramAttr::Genres, terms)
    }

    fn terms<S: Into<String>>(self, attr: ProgramAttr, terms: impl IntoIterator<Item = S>) -> Self {
        let values = terms
            .into_iter()
            .map(|t| AttrValue::Text(t.into()))
            .collect();
        self.filter(attr, Filter::In(values))
    }

    pub fn attrs<S: Into<String>>(mut self, attrs: impl IntoIterator<Item = S>) -> Self {
        self.attrs = Some(attrs.into_iter().map(Into::into).collect());
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }
}

fn parent_ref(channel: &Channel) -> Option<ParentRef> {
    channel.db_id.map(|id| ParentRef::new("channel", id))
}

fn filter_terms(attr: ProgramAttr, filter: &Filter) -> Result<Vec<String>, GuideError> {
    fn text_items(attr: ProgramAttr, items: &[AttrValue]) -> Result<Vec<String>, GuideError> {
        items
            .iter()
            .map(|item| {
                item.as_str().map(str::to_string).ok_or_else(|| {
                    GuideError::InvalidFilter(format!("{} terms must be text", attr))
                })
            })
            .collect()
    }

    match filter {
        Filter::Eq(AttrValue::Text(s)) => Ok(vec![s.clone()]),
        Filter::Eq(AttrValue::List(items)) | Filter::In(items) => text_items(attr, items),
        _ => Err(GuideError::InvalidFilter(format!(
            "{} only supports equality or membership filters",
            attr
        ))),
    }
}

/// Build the store query for a search.
///
/// Time points and ranges are narrowed by one second at each end, so a
/// program ending exactly when another starts is not matched by both. The
/// start bound is widened by `max_program_length` to catch programs that
/// started earlier and are still airing.
pub fn translate(request: &SearchRequest, max_program_length: i64) -> Result<Query, GuideError> {
    let mut query = Query::new("program");

    match &request.channel {
        None => {}
        Some(ChannelSelector::Single(channel)) => {
            query.parent = Some(match parent_ref(channel) {
                Some(parent) => ParentFilter::One(parent),
                None => ParentFilter::Any(Vec::new()),
            });
        }
        Some(ChannelSelector::Many(channels)) => {
            query.parent = Some(ParentFilter::Any(
                channels.iter().filter_map(parent_ref).collect(),
            ));
        }
    }

    for (attr, filter) in &request.filters {
        match attr.inverted_index() {
            Some(index) => {
                query.terms.insert(index.to_string(), filter_terms(*attr, filter)?);
            }
            None => {
                query.attrs.insert(attr.as_str().to_string(), filter.clone());
            }
        }
    }

    if let Some(time) = request.time {
        let (start, stop) = match time {
            TimeSpec::At(t) => (t.saturating_add(1), t.saturating_add(1)),
            TimeSpec::Range { start, stop } => (start.saturating_add(1), stop.saturating_sub(1)),
        };
        let earliest_start = start.saturating_sub(max_program_length);

        if stop > 0 {
            query
                .attrs
                .insert("start".to_string(), Filter::range(earliest_start, stop));
        } else {
            query
                .attrs
                .insert("start".to_string(), Filter::ge(earliest_start));
        }
        query.attrs.insert("stop".to_string(), Filter::ge(start));
    }

    if let Some(limit) = request.limit {
        query.limit = Some(limit);
    }

    Ok(query)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};

    fn channel(db_id: Option<i64>) -> Channel {
        Channel {
            db_id,
            tuner_ids: vec![],
            name: "X".to_string(),
            long_name: "X".to_string(),
        }
    }

    #[test]
    fn test_at_pushes_boundary_in() {
        let query = translate(&SearchRequest::new().at(2000), 1000).unwrap();
        assert_eq!(query.record_type, "program");
        assert_eq!(query.attrs.get("start"), Some(&Filter::range(1001, 2001)));
        assert_eq!(query.attrs.get("stop"), Some(&Filter::ge(2001)));
    }

    #[test]
    fn test_bounded_range() {
        let query = translate(&SearchRequest::new().range(1000, 5000), 600).unwrap();
        assert_eq!(query.attrs.get("start"), Some(&Filter::range(401, 4999)));
        assert_eq!(query.attrs.get("stop"), Some(&Filter::ge(1001)));
    }

    #[test]
    fn test_unbounded_range() {
        let query = translate(&SearchRequest::new().time(TimeSpec::since(1000)), 600).unwrap();
        assert_eq!(query.attrs.get("start"), Some(&Filter::ge(401)));
        assert_eq!(query.attrs.get("stop"), Some(&Filter::ge(1001)));
    }

    #[test]
    fn test_extreme_times_saturate() {
        let query = translate(&SearchRequest::new().at(i64::MAX), 0).unwrap();
        assert_eq!(query.attrs.get("start"), Some(&Filter::range(i64::MAX, i64::MAX)));
        assert_eq!(query.attrs.get("stop"), Some(&Filter::ge(i64::MAX)));

        let query = translate(&SearchRequest::new().range(i64::MIN + 1, 0), 10).unwrap();
        assert_eq!(query.attrs.get("start"), Some(&Filter::ge(i64::MIN)));
        assert_eq!(query.attrs.get("stop"), Some(&Filter::ge(i64::MIN + 2)));

        let query = translate(&SearchRequest::new().range(0, i64::MIN), 10).unwrap();
        assert_eq!(query.attrs.get("start"), Some(&Filter::ge(-9)));
    }

    #[test]
    fn test_time_overrides_caller_start_filter() {
        let request = SearchRequest::new()
            .filter(ProgramAttr::Start, Filter::eq(5))
            .filter(ProgramAttr::Stop, Filter::eq(6))
            .at(100);
        let query = translate(&request, 0).unwrap();
        assert_eq!(query.attrs.get("start"), Some(&Filter::range(101, 101)));
        assert_eq!(query.attrs.get("stop"), Some(&Filter::ge(101)));
    }

    #[test]
    fn test_without_time_filters_pass_through() {
        let request = SearchRequest::new()
            .filter(ProgramAttr::Start, Filter::gt(5))
            .filter(ProgramAttr::Year, Filter::range(1990, 1999))
            .filter(ProgramAttr::Rating, Filter::eq("TV-G"))
            .limit(20);
        let query = translate(&request, 0).unwrap();
        assert_eq!(query.attrs.get("start"), Some(&Filter::gt(5)));
        assert_eq!(query.attrs.get("year"), Some(&Filter::range(1990, 1999)));
        assert_eq!(query.attrs.get("rating"), Some(&Filter::eq("TV-G")));
        assert_eq!(query.limit, Some(20));
        assert!(query.terms.is_empty());
    }

    #[test]
    fn test_single_channel_becomes_parent_filter() {
        let query = translate(&SearchRequest::new().channel(channel(Some(4))), 0).unwrap();
        assert_eq!(
            query.parent,
            Some(ParentFilter::One(ParentRef::new("channel", 4)))
        );
    }

    #[test]
    fn test_many_channels_skip_detached() {
        let request = SearchRequest::new().channels(vec![channel(Some(1)), channel(None), channel(Some(3))]);
        let query = translate(&request, 0).unwrap();
        assert_eq!(
            query.parent,
            Some(ParentFilter::Any(vec![
                ParentRef::new("channel", 1),
                ParentRef::new("channel", 3),
            ]))
        );
    }

    #[test]
    fn test_detached_channel_matches_nothing() {
        let query = translate(&SearchRequest::new().channel(channel(None)), 0).unwrap();
        assert_eq!(query.parent, Some(ParentFilter::Any(vec![])));
    }

    #[test]
    fn test_keywords_and_genres_become_term_filters() {
        let request = SearchRequest::new()
            .keywords(["evening news"])
            .filter(ProgramAttr::Genres, Filter::eq("Drama"));
        let query = translate(&request, 0).unwrap();
        assert_eq!(
            query.terms.get("keywords"),
            Some(&vec!["evening news".to_string()])
        );
        assert_eq!(query.terms.get("genres"), Some(&vec!["Drama".to_string()]));
        assert!(query.attrs.is_empty());
    }

    #[test]
    fn test_comparison_on_keywords_is_rejected() {
        let request = SearchRequest::new().filter(ProgramAttr::Keywords, Filter::gt("a"));
        assert!(matches!(
            translate(&request, 0),
            Err(GuideError::InvalidFilter(_))
        ));

        let request = SearchRequest::new().filter(ProgramAttr::Genres, Filter::one_of([1, 2]));
        assert!(matches!(
            translate(&request, 0),
            Err(GuideError::InvalidFilter(_))
        ));
    }

    #[test]
    fn test_program_attr_parse() {
        assert_eq!("year".parse::<ProgramAttr>().unwrap(), ProgramAttr::Year);
        for attr in ProgramAttr::ALL {
            assert_eq!(attr.as_str().parse::<ProgramAttr>().unwrap(), attr);
        }
        assert!("episode".parse::<ProgramAttr>().is_err());
    }

    #[test]
    fn test_timestamp_conversions() {
        let utc = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        assert_eq!(TimeSpec::at(utc), TimeSpec::At(utc.timestamp()));

        let naive = NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        let expected = Local.from_local_datetime(&naive).earliest().unwrap().timestamp();
        assert_eq!(naive.into_timestamp(), expected);
    }
}
