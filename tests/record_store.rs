use std::fs;
use std::path::PathBuf;

use chrono::NaiveDate;
use rusqlite::Connection;

use matchform::record::{MatchResult, Metric};
use matchform::record_store::{self, SkipReason, read_csv};

fn read_fixture(name: &str) -> String {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests");
    path.push("fixtures");
    path.push(name);
    fs::read_to_string(path).expect("fixture file should be readable")
}

const SMALL_CSV: &str = "\
,Date,Time,Venue,Result,GF,GA,Opponent,xG,Sh,SoT,Dist,FK,PK,PKatt,Formation,Opp Formation,Referee,Team
0,2023-08-19,18:30,Away,W,3,1,Frosinone,1.9,14,6,16.2,0,0,0,4-3-3,3-5-2,Marco Guida,Napoli
1,2023-08-19,20:45,Home,D,1,1,Bologna,,11,3,,1,0,0,4-2-3-1,4-3-3,,Milan
2,19/08/2023,20:45,Home,W,2,0,Lecce,1.1,9,4,18.0,0,0,0,4-3-3,4-4-2,Daniele Orsato,Roma
3,2023-08-20,18:30,Away,X,0,0,Inter,0.4,5,1,20.0,0,0,0,4-4-2,3-5-2,Daniele Orsato,Monza
4,2023-08-20,20:45,Home,L,0,2,Torino,n/a,7,2,17.5,0,0,0,3-4-1-2,3-4-2-1,Maurizio Mariani,
";

#[test]
fn csv_rows_parse_and_bad_rows_are_skipped() {
    let report = read_csv(SMALL_CSV.as_bytes()).expect("csv should parse");

    assert_eq!(report.records.len(), 2);
    assert_eq!(report.skipped.len(), 3);
    assert_eq!(report.skipped[0].line, 4);
    assert!(matches!(report.skipped[0].reason, SkipReason::BadDate(_)));
    assert_eq!(report.skipped[1].reason, SkipReason::BadResult("X".to_string()));
    assert_eq!(report.skipped[2].reason, SkipReason::MissingTeam);

    let napoli = &report.records[0];
    assert_eq!(napoli.team, "Napoli");
    assert_eq!(napoli.date, NaiveDate::from_ymd_opt(2023, 8, 19).unwrap());
    assert_eq!(napoli.result, MatchResult::Win);
    assert_eq!(napoli.kickoff.as_deref(), Some("18:30"));
    assert_eq!(napoli.metric(Metric::ExpectedGoals), Some(1.9));
    assert_eq!(napoli.metric(Metric::ShotDistance), Some(16.2));

    let milan = &report.records[1];
    assert_eq!(milan.row_id, 1);
    assert_eq!(milan.metric(Metric::ExpectedGoals), None);
    assert_eq!(milan.metric(Metric::ShotDistance), None);
    assert_eq!(milan.referee, None);
}

#[test]
fn csv_without_team_column_is_rejected() {
    let raw = "Date,Result,Opponent\n2023-08-19,W,Lecce\n";
    let err = read_csv(raw.as_bytes()).expect_err("Team column is required");
    assert!(err.to_string().contains("Team"));
}

#[test]
fn fixture_csv_loads() {
    let raw = read_fixture("matches_small.csv");
    let report = read_csv(raw.as_bytes()).expect("fixture should parse");

    assert_eq!(report.records.len(), 56);
    assert_eq!(report.skipped.len(), 1);
    let teams: std::collections::BTreeSet<&str> =
        report.records.iter().map(|r| r.team.as_str()).collect();
    assert_eq!(teams.len(), 4);
}

#[test]
fn sqlite_store_round_trips_in_date_order() {
    let report = read_csv(SMALL_CSV.as_bytes()).expect("csv should parse");
    let mut conn = Connection::open_in_memory().expect("in-memory db");
    record_store::init_schema(&conn).expect("schema");

    // Insert Milan before Napoli to check the load ordering.
    let mut records = report.records.clone();
    records.reverse();
    let written = record_store::upsert_records(&mut conn, &records).expect("upsert");
    assert_eq!(written, 2);

    // Upserting again refreshes rather than duplicates.
    record_store::upsert_records(&mut conn, &records).expect("second upsert");

    let loaded = record_store::load_records(&conn).expect("load");
    assert!(loaded.skipped.is_empty());
    assert_eq!(loaded.records.len(), 2);
    assert_eq!(loaded.records[0].team, "Milan");
    assert_eq!(loaded.records[0].row_id, 0);
    assert_eq!(loaded.records[1].team, "Napoli");
    assert_eq!(loaded.records[1].metric(Metric::ExpectedGoals), Some(1.9));
    assert_eq!(loaded.records[1].referee.as_deref(), Some("Marco Guida"));
    assert_eq!(loaded.records[0].metric(Metric::ExpectedGoals), None);
}

#[test]
fn sqlite_rows_with_bad_dates_are_skipped() {
    let conn = Connection::open_in_memory().expect("in-memory db");
    record_store::init_schema(&conn).expect("schema");
    conn.execute(
        "INSERT INTO match_rows (team, match_date, opponent, result, updated_at)
         VALUES ('Genoa', '2023-13-45', 'Lazio', 'W', 'now'),
                ('Genoa', '2023-09-01', 'Lazio', 'D', 'now')",
        [],
    )
    .expect("insert");

    let loaded = record_store::load_records(&conn).expect("load");
    assert_eq!(loaded.records.len(), 1);
    assert_eq!(loaded.records[0].result, MatchResult::Draw);
    assert!(matches!(loaded.skipped[0].reason, SkipReason::BadDate(_)));
}

#[test]
fn undecodable_row_is_skipped_and_the_rest_load() {
    let mut raw = b"Date,Time,Venue,Result,Opponent,Referee,Team\n\
2024-01-06,15:00,Home,W,Empoli,Marco Guida,Torino\n\
2024-01-13,18:00,Away,L,Napoli,"
        .to_vec();
    raw.extend_from_slice(&[0xff, 0xfe]);
    raw.extend_from_slice(b",Torino\n2024-01-20,20:45,Home,D,Lecce,Daniele Orsato,Torino\n");

    let report = read_csv(raw.as_slice()).expect("bad bytes in one row are not fatal");

    assert_eq!(report.records.len(), 2);
    assert_eq!(report.records[1].opponent, "Lecce");
    assert_eq!(report.records[1].row_id, 1);
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].line, 3);
    assert!(matches!(report.skipped[0].reason, SkipReason::Undecodable(_)));
}
