use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Numeric per-match performance columns that feed the rolling form features.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Metric {
    #[serde(rename = "GF")]
    GoalsFor,
    #[serde(rename = "GA")]
    GoalsAgainst,
    #[serde(rename = "xG")]
    ExpectedGoals,
    #[serde(rename = "Sh")]
    Shots,
    #[serde(rename = "SoT")]
    ShotsOnTarget,
    #[serde(rename = "Dist")]
    ShotDistance,
    #[serde(rename = "FK")]
    FreeKicks,
    #[serde(rename = "PK")]
    PenaltyKicks,
    #[serde(rename = "PKatt")]
    PenaltyAttempts,
}

impl Metric {
    pub const ALL: [Metric; 9] = [
        Metric::GoalsFor,
        Metric::GoalsAgainst,
        Metric::ExpectedGoals,
        Metric::Shots,
        Metric::ShotsOnTarget,
        Metric::ShotDistance,
        Metric::FreeKicks,
        Metric::PenaltyKicks,
        Metric::PenaltyAttempts,
    ];

    pub fn column(self) -> &'static str {
        match self {
            Metric::GoalsFor => "GF",
            Metric::GoalsAgainst => "GA",
            Metric::ExpectedGoals => "xG",
            Metric::Shots => "Sh",
            Metric::ShotsOnTarget => "SoT",
            Metric::ShotDistance => "Dist",
            Metric::FreeKicks => "FK",
            Metric::PenaltyKicks => "PK",
            Metric::PenaltyAttempts => "PKatt",
        }
    }

    pub fn rolling_name(self) -> String {
        format!("{}_rolling", self.column())
    }

    pub fn from_column(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        Metric::ALL
            .into_iter()
            .find(|m| m.column().eq_ignore_ascii_case(raw))
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MatchResult {
    Win,
    Draw,
    Loss,
}

impl MatchResult {
    pub fn from_label(raw: &str) -> Option<Self> {
        match raw.trim() {
            "W" | "w" => Some(MatchResult::Win),
            "D" | "d" => Some(MatchResult::Draw),
            "L" | "l" => Some(MatchResult::Loss),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            MatchResult::Win => "W",
            MatchResult::Draw => "D",
            MatchResult::Loss => "L",
        }
    }

    /// Ordinal points target: 3 for a win, 1 for a draw, 0 for a loss.
    pub fn target(self) -> u8 {
        match self {
            MatchResult::Win => 3,
            MatchResult::Draw => 1,
            MatchResult::Loss => 0,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricValues([Option<f64>; 9]);

impl MetricValues {
    pub fn get(&self, metric: Metric) -> Option<f64> {
        self.0[metric.index()]
    }

    /// Non-finite values are stored as missing.
    pub fn set(&mut self, metric: Metric, value: Option<f64>) {
        self.0[metric.index()] = value.filter(|v| v.is_finite());
    }
}

/// One team's view of one match. `row_id` is the position in the source, used
/// to keep ties on the same date in input order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchRecord {
    pub row_id: usize,
    pub team: String,
    pub date: NaiveDate,
    pub kickoff: Option<String>,
    pub opponent: String,
    pub venue: Option<String>,
    pub formation: Option<String>,
    pub opp_formation: Option<String>,
    pub referee: Option<String>,
    pub result: MatchResult,
    pub metrics: MetricValues,
}

impl MatchRecord {
    pub fn new(
        row_id: usize,
        team: impl Into<String>,
        date: NaiveDate,
        opponent: impl Into<String>,
        result: MatchResult,
    ) -> Self {
        Self {
            row_id,
            team: team.into(),
            date,
            kickoff: None,
            opponent: opponent.into(),
            venue: None,
            formation: None,
            opp_formation: None,
            referee: None,
            result,
            metrics: MetricValues::default(),
        }
    }

    pub fn with_metric(mut self, metric: Metric, value: f64) -> Self {
        self.metrics.set(metric, Some(value));
        self
    }

    pub fn metric(&self, metric: Metric) -> Option<f64> {
        self.metrics.get(metric)
    }

    pub fn target(&self) -> u8 {
        self.result.target()
    }
}
