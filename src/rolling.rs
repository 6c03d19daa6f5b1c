//! Per-team trailing form features.
//!
//! Each team's history is sorted by date and every match gets, for each tracked
//! metric, the mean over the team's previous `window` matches. The current match
//! never contributes to its own features. Matches without a full window of
//! defined values are dropped rather than padded.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use rayon::prelude::*;
use serde::Serialize;
use tracing::debug;

use crate::encoding::{EncodedFeatures, EncodedRecord};
use crate::error::PipelineError;
use crate::record::{MatchRecord, Metric};

pub const DEFAULT_WINDOW: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RollingFeatureSet {
    values: Vec<(Metric, f64)>,
}

impl RollingFeatureSet {
    pub fn get(&self, metric: Metric) -> Option<f64> {
        self.values
            .iter()
            .find(|(m, _)| *m == metric)
            .map(|(_, v)| *v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Metric, f64)> + '_ {
        self.values.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct AugmentedRecord {
    pub record: MatchRecord,
    pub encoded: EncodedFeatures,
    pub rolling: RollingFeatureSet,
}

impl AugmentedRecord {
    pub fn date(&self) -> NaiveDate {
        self.record.date
    }

    pub fn team(&self) -> &str {
        &self.record.team
    }
}

/// Computes rolling form features for every team and returns the surviving
/// rows sorted by date.
///
/// Rows of one team that share a date keep their input order. Across teams,
/// same-date rows come out in team-name order.
pub fn compute_rolling_features(
    records: Vec<EncodedRecord>,
    metrics: &[Metric],
    window: usize,
) -> Result<Vec<AugmentedRecord>, PipelineError> {
    if window == 0 {
        return Err(PipelineError::InvalidConfig(
            "rolling window must be at least 1".to_string(),
        ));
    }
    if metrics.is_empty() {
        return Err(PipelineError::InvalidConfig(
            "no tracked metrics for rolling features".to_string(),
        ));
    }

    let partitions = partition_by_team(records);
    let teams = partitions.len();

    let rolled: Vec<Vec<AugmentedRecord>> = partitions
        .into_iter()
        .collect::<Vec<_>>()
        .into_par_iter()
        .map(|(team, rows)| {
            let input = rows.len();
            let out = roll_partition(rows, metrics, window);
            debug!(team = %team, input, kept = out.len(), "rolled team history");
            out
        })
        .collect();

    let mut merged: Vec<AugmentedRecord> = rolled.into_iter().flatten().collect();
    merged.sort_by_key(|r| r.record.date);
    debug!(teams, rows = merged.len(), window, "rolling features merged");
    Ok(merged)
}

fn partition_by_team(records: Vec<EncodedRecord>) -> BTreeMap<String, Vec<EncodedRecord>> {
    let mut partitions: BTreeMap<String, Vec<EncodedRecord>> = BTreeMap::new();
    for row in records {
        partitions
            .entry(row.record.team.clone())
            .or_default()
            .push(row);
    }
    partitions
}

fn roll_partition(
    mut rows: Vec<EncodedRecord>,
    metrics: &[Metric],
    window: usize,
) -> Vec<AugmentedRecord> {
    if rows.len() <= window {
        return Vec::new();
    }
    // Stable: same-date rows stay in input order.
    rows.sort_by_key(|r| r.record.date);

    let features: Vec<Option<RollingFeatureSet>> = (0..rows.len())
        .map(|idx| {
            if idx < window {
                return None;
            }
            let history = &rows[idx - window..idx];
            let mut values = Vec::with_capacity(metrics.len());
            for metric in metrics {
                let mean = window_mean(history.iter().map(|r| r.record.metric(*metric)))?;
                values.push((*metric, mean));
            }
            Some(RollingFeatureSet { values })
        })
        .collect();

    rows.into_iter()
        .zip(features)
        .filter_map(|(row, rolling)| {
            Some(AugmentedRecord {
                rolling: rolling?,
                record: row.record,
                encoded: row.encoded,
            })
        })
        .collect()
}

/// Mean of a window, or `None` if any value in it is missing.
fn window_mean(values: impl Iterator<Item = Option<f64>>) -> Option<f64> {
    let mut sum = 0.0_f64;
    let mut n = 0usize;
    for value in values {
        let v = value.filter(|v| v.is_finite())?;
        sum += v;
        n += 1;
    }
    if n == 0 {
        return None;
    }
    Some(sum / n as f64)
}
