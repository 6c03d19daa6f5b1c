use chrono::NaiveDate;
use thiserror::Error;

use crate::rolling::AugmentedRecord;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SplitError {
    #[error("no rows dated before cutoff {cutoff} (earliest row {earliest:?})")]
    EmptyTrain {
        cutoff: NaiveDate,
        earliest: Option<NaiveDate>,
    },

    #[error("no rows dated on or after cutoff {cutoff} (latest row {latest:?})")]
    EmptyEval {
        cutoff: NaiveDate,
        latest: Option<NaiveDate>,
    },

    #[error("rows are not sorted by date (row {index} goes back in time)")]
    Unsorted { index: usize },
}

/// Borrowed train/eval view over a date-sorted slice.
#[derive(Debug, Clone, Copy)]
pub struct Split<'a> {
    pub cutoff: NaiveDate,
    pub train: &'a [AugmentedRecord],
    pub eval: &'a [AugmentedRecord],
}

impl Split<'_> {
    pub fn len(&self) -> usize {
        self.train.len() + self.eval.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn train_range(&self) -> Option<(NaiveDate, NaiveDate)> {
        date_range(self.train)
    }

    pub fn eval_range(&self) -> Option<(NaiveDate, NaiveDate)> {
        date_range(self.eval)
    }
}

/// Splits rows into `train` (date < cutoff) and `eval` (date >= cutoff).
///
/// A row dated exactly on the cutoff belongs to `eval`. Both sides must be
/// non-empty.
pub fn chronological_split(
    records: &[AugmentedRecord],
    cutoff: NaiveDate,
) -> Result<Split<'_>, SplitError> {
    if let Some(index) = records
        .windows(2)
        .position(|pair| pair[1].date() < pair[0].date())
    {
        return Err(SplitError::Unsorted { index: index + 1 });
    }

    let boundary = records.partition_point(|r| r.date() < cutoff);
    let (train, eval) = records.split_at(boundary);

    if train.is_empty() {
        return Err(SplitError::EmptyTrain {
            cutoff,
            earliest: records.first().map(AugmentedRecord::date),
        });
    }
    if eval.is_empty() {
        return Err(SplitError::EmptyEval {
            cutoff,
            latest: records.last().map(AugmentedRecord::date),
        });
    }

    Ok(Split {
        cutoff,
        train,
        eval,
    })
}

fn date_range(rows: &[AugmentedRecord]) -> Option<(NaiveDate, NaiveDate)> {
    Some((rows.first()?.date(), rows.last()?.date()))
}
