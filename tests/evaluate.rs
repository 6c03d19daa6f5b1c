use matchform::error::PipelineError;
use matchform::evaluate::{ConfusionMatrix, evaluate};

#[test]
fn single_miss_shows_up_off_diagonal() {
    let actual = [3, 3, 0, 1];
    let predicted = [3, 0, 0, 1];
    let eval = evaluate(&actual, &predicted).expect("evaluation should succeed");

    assert!((eval.accuracy - 0.75).abs() < 1e-12);
    assert_eq!(eval.samples, 4);
    assert_eq!(eval.confusion.labels, vec![0, 1, 3]);
    assert_eq!(eval.confusion.off_diagonal(), vec![(3, 0, 1)]);
    assert_eq!(eval.confusion.get(3, 3), 1);
    assert_eq!(eval.confusion.get(0, 0), 1);
    assert_eq!(eval.confusion.get(1, 1), 1);
    assert_eq!(eval.confusion.total(), 4);
}

#[test]
fn precision_is_weighted_by_actual_support() {
    let eval = evaluate(&[3, 3, 0, 1], &[3, 0, 0, 1]).expect("evaluation should succeed");
    // class 0: 1/2, class 1: 1/1, class 3: 1/1; supports 1, 1, 2.
    assert!((eval.weighted_precision - 0.875).abs() < 1e-12);

    let zero = eval
        .per_class
        .iter()
        .find(|c| c.label == 0)
        .expect("class 0 present");
    assert!((zero.precision - 0.5).abs() < 1e-12);
    assert_eq!(zero.support, 1);
    assert_eq!(zero.predicted, 2);
}

#[test]
fn never_predicted_class_has_zero_precision() {
    let eval = evaluate(&[0, 1, 3, 3], &[3, 3, 3, 3]).expect("evaluation should succeed");
    assert!((eval.accuracy - 0.5).abs() < 1e-12);
    // Only class 3 is predicted: precision 2/4 with support 2.
    assert!((eval.weighted_precision - 0.25).abs() < 1e-12);
    let one = eval.per_class.iter().find(|c| c.label == 1).expect("class 1");
    assert_eq!(one.precision, 0.0);
    assert_eq!(one.predicted, 0);
}

#[test]
fn mismatched_lengths_are_an_error() {
    let err = evaluate(&[3, 1], &[3]).expect_err("lengths differ");
    assert!(matches!(
        err,
        PipelineError::LabelMismatch {
            actual: 2,
            predicted: 1
        }
    ));
}

#[test]
fn empty_labels_are_an_error() {
    let err = evaluate(&[], &[]).expect_err("nothing to evaluate");
    assert!(matches!(err, PipelineError::EmptyEvaluation));
}

#[test]
fn confusion_matrix_renders_as_crosstab() {
    let matrix =
        ConfusionMatrix::from_labels(&[3, 3, 0, 1], &[3, 0, 0, 1]).expect("same lengths");
    let text = matrix.to_string();
    let lines: Vec<&str> = text.lines().collect();

    assert_eq!(lines.len(), 5);
    assert!(lines[0].starts_with("predicted"));
    assert_eq!(lines[1], "actual");
    let row3: Vec<&str> = lines[4].split_whitespace().collect();
    assert_eq!(row3, vec!["3", "1", "0", "1"]);
}

#[test]
fn confusion_matrix_rejects_unequal_label_lists() {
    let err = ConfusionMatrix::from_labels(&[3, 1, 0], &[3, 1]).expect_err("lengths differ");
    assert!(matches!(
        err,
        PipelineError::LabelMismatch {
            actual: 3,
            predicted: 2
        }
    ));
}
