use chrono::NaiveDate;
use serde::Serialize;
use tracing::{info, info_span};

use crate::config::PipelineConfig;
use crate::encoding::FeatureEncoder;
use crate::error::PipelineError;
use crate::evaluate::{self, Evaluation};
use crate::features::{self, Feature};
use crate::forest::{Classifier, RandomForest};
use crate::record::MatchRecord;
use crate::rolling::{self, AugmentedRecord};
use crate::split::{self, Split};

#[derive(Debug, Clone, Serialize)]
pub struct PredictionRow {
    pub team: String,
    pub opponent: String,
    pub date: NaiveDate,
    pub actual: u8,
    pub predicted: u8,
}

#[derive(Debug, Clone, Serialize)]
pub struct BacktestReport {
    pub cutoff: NaiveDate,
    pub window: usize,
    pub predictors: Vec<String>,
    pub records_in: usize,
    pub augmented: usize,
    pub train_size: usize,
    pub eval_size: usize,
    pub train_range: Option<(NaiveDate, NaiveDate)>,
    pub eval_range: Option<(NaiveDate, NaiveDate)>,
    pub evaluation: Evaluation,
    pub predictions: Vec<PredictionRow>,
}

/// Encodes categoricals and computes rolling form features. Output is sorted by
/// date and holds only rows with a complete window.
pub fn augment(
    records: Vec<MatchRecord>,
    cfg: &PipelineConfig,
) -> Result<Vec<AugmentedRecord>, PipelineError> {
    if records.is_empty() {
        return Err(PipelineError::NoRecords);
    }
    let encoder = FeatureEncoder::fit(&records);
    let encoded = encoder.encode_all(records);
    rolling::compute_rolling_features(encoded, &cfg.tracked, cfg.window)
}

/// Full backtest with the default random forest.
pub fn run_backtest(
    records: Vec<MatchRecord>,
    cfg: &PipelineConfig,
) -> Result<BacktestReport, PipelineError> {
    let mut model = RandomForest::new(cfg.forest);
    run_backtest_with(records, cfg, &mut model)
}

pub fn run_backtest_with<C: Classifier>(
    records: Vec<MatchRecord>,
    cfg: &PipelineConfig,
    model: &mut C,
) -> Result<BacktestReport, PipelineError> {
    let _span = info_span!("backtest", cutoff = %cfg.cutoff, window = cfg.window).entered();
    cfg.validate()?;
    let predictors = features::resolve_predictors(&cfg.safe_predictors, &cfg.tracked)?;

    let records_in = records.len();
    let augmented = augment(records, cfg)?;
    info!(
        records_in,
        augmented = augmented.len(),
        dropped = records_in - augmented.len(),
        "rolling features ready"
    );

    let split = split::chronological_split(&augmented, cfg.cutoff)?;
    info!(
        train = split.train.len(),
        eval = split.eval.len(),
        "chronological split"
    );

    let (evaluation, predictions) = fit_and_evaluate(&split, &predictors, model)?;
    info!(
        accuracy = evaluation.accuracy,
        precision = evaluation.weighted_precision,
        "evaluation complete"
    );

    Ok(BacktestReport {
        cutoff: cfg.cutoff,
        window: cfg.window,
        predictors: predictors.iter().map(Feature::name).collect(),
        records_in,
        augmented: augmented.len(),
        train_size: split.train.len(),
        eval_size: split.eval.len(),
        train_range: split.train_range(),
        eval_range: split.eval_range(),
        evaluation,
        predictions,
    })
}

fn fit_and_evaluate<C: Classifier>(
    split: &Split<'_>,
    predictors: &[Feature],
    model: &mut C,
) -> Result<(Evaluation, Vec<PredictionRow>), PipelineError> {
    let train_x = features::feature_matrix(split.train, predictors)?;
    let train_y = features::targets(split.train);
    model.fit(&train_x, &train_y)?;

    let eval_x = features::feature_matrix(split.eval, predictors)?;
    let actual = features::targets(split.eval);
    let predicted = model.predict(&eval_x)?;
    let evaluation = evaluate::evaluate(&actual, &predicted)?;

    let predictions = split
        .eval
        .iter()
        .zip(actual.iter().zip(&predicted))
        .map(|(row, (a, p))| PredictionRow {
            team: row.record.team.clone(),
            opponent: row.record.opponent.clone(),
            date: row.record.date,
            actual: *a,
            predicted: *p,
        })
        .collect();
    Ok((evaluation, predictions))
}
