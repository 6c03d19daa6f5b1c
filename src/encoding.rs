use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};
use serde::Serialize;

use crate::record::MatchRecord;

pub const MISSING_CODE: i32 = -1;

/// Integer codes for one categorical column.
///
/// Codes are assigned over the sorted set of distinct values, so the same value
/// gets the same code no matter which order the rows arrived in. Missing and
/// unseen values map to [`MISSING_CODE`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategoryCodes {
    codes: BTreeMap<String, i32>,
}

impl CategoryCodes {
    pub fn fit<'a, I>(values: I) -> Self
    where
        I: IntoIterator<Item = Option<&'a str>>,
    {
        let mut codes = BTreeMap::new();
        for value in values.into_iter().flatten() {
            let value = value.trim();
            if !value.is_empty() {
                codes.entry(value.to_string()).or_insert(0);
            }
        }
        // BTreeMap iterates in key order; number the keys in that order.
        for (idx, code) in codes.values_mut().enumerate() {
            *code = idx as i32;
        }
        Self { codes }
    }

    pub fn code(&self, value: Option<&str>) -> i32 {
        value
            .map(str::trim)
            .and_then(|v| self.codes.get(v).copied())
            .unwrap_or(MISSING_CODE)
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EncodedFeatures {
    pub venue_code: i32,
    pub opponent_code: i32,
    pub formation_code: i32,
    pub opp_formation_code: i32,
    pub referee_code: i32,
    pub hour: i32,
    pub day_code: i32,
}

#[derive(Debug, Clone)]
pub struct EncodedRecord {
    pub record: MatchRecord,
    pub encoded: EncodedFeatures,
}

#[derive(Debug, Clone, Default)]
pub struct FeatureEncoder {
    venue: CategoryCodes,
    opponent: CategoryCodes,
    formation: CategoryCodes,
    opp_formation: CategoryCodes,
    referee: CategoryCodes,
}

impl FeatureEncoder {
    pub fn fit(records: &[MatchRecord]) -> Self {
        Self {
            venue: CategoryCodes::fit(records.iter().map(|r| r.venue.as_deref())),
            opponent: CategoryCodes::fit(records.iter().map(|r| Some(r.opponent.as_str()))),
            formation: CategoryCodes::fit(records.iter().map(|r| r.formation.as_deref())),
            opp_formation: CategoryCodes::fit(records.iter().map(|r| r.opp_formation.as_deref())),
            referee: CategoryCodes::fit(records.iter().map(|r| r.referee.as_deref())),
        }
    }

    pub fn encode(&self, record: &MatchRecord) -> EncodedFeatures {
        EncodedFeatures {
            venue_code: self.venue.code(record.venue.as_deref()),
            opponent_code: self.opponent.code(Some(&record.opponent)),
            formation_code: self.formation.code(record.formation.as_deref()),
            opp_formation_code: self.opp_formation.code(record.opp_formation.as_deref()),
            referee_code: self.referee.code(record.referee.as_deref()),
            hour: record
                .kickoff
                .as_deref()
                .and_then(parse_hour)
                .map(|h| h as i32)
                .unwrap_or(MISSING_CODE),
            day_code: day_code(record.date) as i32,
        }
    }

    pub fn encode_all(&self, records: Vec<MatchRecord>) -> Vec<EncodedRecord> {
        records
            .into_iter()
            .map(|record| EncodedRecord {
                encoded: self.encode(&record),
                record,
            })
            .collect()
    }

    pub fn venue_codes(&self) -> &CategoryCodes {
        &self.venue
    }

    pub fn opponent_codes(&self) -> &CategoryCodes {
        &self.opponent
    }
}

/// Leading hour of a `HH:MM` kick-off time.
pub fn parse_hour(raw: &str) -> Option<u32> {
    let hour = raw.trim().split(':').next()?.trim();
    let hour = hour.parse::<u32>().ok()?;
    (hour < 24).then_some(hour)
}

/// Weekday with Monday = 0.
pub fn day_code(date: NaiveDate) -> u32 {
    date.weekday().num_days_from_monday()
}
