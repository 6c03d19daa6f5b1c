use std::fmt;

use crate::error::PipelineError;
use crate::record::Metric;
use crate::rolling::AugmentedRecord;

/// Predictors known not to leak the current match's outcome.
pub const DEFAULT_SAFE_PREDICTORS: [&str; 15] = [
    "venue_code",
    "opponent_code",
    "hour",
    "day_code",
    "formation_code",
    "opp_formation_code",
    "GF_rolling",
    "GA_rolling",
    "Sh_rolling",
    "SoT_rolling",
    "Dist_rolling",
    "FK_rolling",
    "PK_rolling",
    "PKatt_rolling",
    "referee_code",
];

// Columns describing the match being predicted.
const OUTCOME_COLUMNS: [&str; 3] = ["result", "target", "points"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Feature {
    VenueCode,
    OpponentCode,
    Hour,
    DayCode,
    FormationCode,
    OppFormationCode,
    RefereeCode,
    Rolling(Metric),
}

impl Feature {
    pub fn parse(name: &str) -> Result<Self, PipelineError> {
        let trimmed = name.trim();
        let feature = match trimmed {
            "venue_code" => Feature::VenueCode,
            "opponent_code" | "opponent_codes" => Feature::OpponentCode,
            "hour" => Feature::Hour,
            "day_code" => Feature::DayCode,
            "formation_code" => Feature::FormationCode,
            "opp_formation_code" => Feature::OppFormationCode,
            "referee_code" => Feature::RefereeCode,
            other => {
                if let Some(column) = other.strip_suffix("_rolling")
                    && let Some(metric) = Metric::from_column(column)
                {
                    Feature::Rolling(metric)
                } else if Metric::from_column(other).is_some()
                    || OUTCOME_COLUMNS
                        .iter()
                        .any(|c| c.eq_ignore_ascii_case(other))
                {
                    return Err(PipelineError::LeakingFeature(other.to_string()));
                } else {
                    return Err(PipelineError::UnknownFeature(other.to_string()));
                }
            }
        };
        Ok(feature)
    }

    pub fn name(&self) -> String {
        match self {
            Feature::VenueCode => "venue_code".to_string(),
            Feature::OpponentCode => "opponent_code".to_string(),
            Feature::Hour => "hour".to_string(),
            Feature::DayCode => "day_code".to_string(),
            Feature::FormationCode => "formation_code".to_string(),
            Feature::OppFormationCode => "opp_formation_code".to_string(),
            Feature::RefereeCode => "referee_code".to_string(),
            Feature::Rolling(metric) => metric.rolling_name(),
        }
    }

    pub fn value(&self, row: &AugmentedRecord) -> Option<f64> {
        let enc = &row.encoded;
        match self {
            Feature::VenueCode => Some(enc.venue_code as f64),
            Feature::OpponentCode => Some(enc.opponent_code as f64),
            Feature::Hour => Some(enc.hour as f64),
            Feature::DayCode => Some(enc.day_code as f64),
            Feature::FormationCode => Some(enc.formation_code as f64),
            Feature::OppFormationCode => Some(enc.opp_formation_code as f64),
            Feature::RefereeCode => Some(enc.referee_code as f64),
            Feature::Rolling(metric) => row.rolling.get(*metric),
        }
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

/// Resolves configured predictor names, rejecting anything that is unknown or
/// describes the match being predicted. Rolling features must be among the
/// tracked metrics.
pub fn resolve_predictors(
    names: &[String],
    tracked: &[Metric],
) -> Result<Vec<Feature>, PipelineError> {
    if names.is_empty() {
        return Err(PipelineError::InvalidConfig(
            "no safe predictors configured".to_string(),
        ));
    }
    let mut out: Vec<Feature> = Vec::with_capacity(names.len());
    for name in names {
        let feature = Feature::parse(name)?;
        if let Feature::Rolling(metric) = feature
            && !tracked.contains(&metric)
        {
            return Err(PipelineError::InvalidConfig(format!(
                "predictor `{name}` needs untracked metric {metric}"
            )));
        }
        if out.contains(&feature) {
            return Err(PipelineError::InvalidConfig(format!(
                "predictor `{name}` listed twice"
            )));
        }
        out.push(feature);
    }
    Ok(out)
}

/// Row-major predictor matrix, one row per record in the given order.
pub fn feature_matrix(
    rows: &[AugmentedRecord],
    features: &[Feature],
) -> Result<Vec<Vec<f64>>, PipelineError> {
    rows.iter()
        .map(|row| {
            features
                .iter()
                .map(|feature| {
                    feature
                        .value(row)
                        .ok_or_else(|| PipelineError::MissingFeatureValue {
                            feature: feature.name(),
                            team: row.record.team.clone(),
                            date: row.record.date,
                        })
                })
                .collect()
        })
        .collect()
}

pub fn targets(rows: &[AugmentedRecord]) -> Vec<u8> {
    rows.iter().map(|row| row.record.target()).collect()
}

pub fn default_safe_predictors() -> Vec<String> {
    DEFAULT_SAFE_PREDICTORS
        .iter()
        .map(|s| s.to_string())
        .collect()
}
