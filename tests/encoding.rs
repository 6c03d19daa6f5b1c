use chrono::NaiveDate;

use matchform::encoding::{CategoryCodes, FeatureEncoder, MISSING_CODE, day_code};
use matchform::record::{MatchRecord, MatchResult};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[test]
fn codes_follow_sorted_values_not_row_order() {
    let forward = CategoryCodes::fit([Some("Orsato"), Some("Guida"), Some("Mariani")]);
    let reversed = CategoryCodes::fit([Some("Mariani"), Some("Guida"), Some("Orsato")]);

    assert_eq!(forward, reversed);
    assert_eq!(forward.code(Some("Guida")), 0);
    assert_eq!(forward.code(Some("Mariani")), 1);
    assert_eq!(forward.code(Some("Orsato")), 2);
    assert_eq!(forward.len(), 3);
}

#[test]
fn missing_and_unseen_values_get_the_missing_code() {
    let codes = CategoryCodes::fit([Some("Home"), None, Some(" "), Some("Away")]);
    assert_eq!(codes.len(), 2);
    assert_eq!(codes.code(None), MISSING_CODE);
    assert_eq!(codes.code(Some("Neutral")), MISSING_CODE);
    assert_eq!(codes.code(Some(" Home ")), 1);
}

#[test]
fn weekday_code_starts_on_monday() {
    assert_eq!(day_code(date(2024, 6, 3)), 0);
    assert_eq!(day_code(date(2024, 6, 8)), 5);
    assert_eq!(day_code(date(2024, 6, 9)), 6);
}

#[test]
fn encoder_fills_every_column() {
    let mut home = MatchRecord::new(0, "Torino", date(2024, 5, 11), "Bologna", MatchResult::Draw);
    home.venue = Some("Home".to_string());
    home.kickoff = Some("18:00".to_string());
    home.formation = Some("3-4-2-1".to_string());
    home.opp_formation = Some("4-2-3-1".to_string());
    home.referee = Some("Marco Guida".to_string());

    let mut away = MatchRecord::new(1, "Bologna", date(2024, 5, 11), "Torino", MatchResult::Draw);
    away.venue = Some("Away".to_string());

    let records = vec![home.clone(), away.clone()];
    let encoder = FeatureEncoder::fit(&records);
    assert_eq!(encoder.venue_codes().len(), 2);
    assert_eq!(encoder.opponent_codes().len(), 2);

    let enc = encoder.encode(&home);
    assert_eq!(enc.venue_code, 1);
    assert_eq!(enc.opponent_code, 0);
    assert_eq!(enc.formation_code, 0);
    assert_eq!(enc.opp_formation_code, 0);
    assert_eq!(enc.referee_code, 0);
    assert_eq!(enc.hour, 18);
    assert_eq!(enc.day_code, 5);

    let enc = encoder.encode(&away);
    assert_eq!(enc.venue_code, 0);
    assert_eq!(enc.opponent_code, 1);
    assert_eq!(enc.formation_code, MISSING_CODE);
    assert_eq!(enc.hour, MISSING_CODE);
}
