use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use chrono::{NaiveDate, Utc};
use rusqlite::{Connection, Row, params};
use serde::Deserialize;
use tracing::{info, warn};

use crate::config::{DATE_FORMAT, app_cache_dir};
use crate::record::{MatchRecord, MatchResult, Metric, MetricValues};

const REQUIRED_COLUMNS: [&str; 4] = ["Date", "Team", "Opponent", "Result"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    MissingTeam,
    BadDate(String),
    BadResult(String),
    /// The row could not be decoded at all (bad UTF-8, broken quoting).
    Undecodable(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedRow {
    /// 1-based line in the source, header included.
    pub line: u64,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, Default)]
pub struct LoadReport {
    pub records: Vec<MatchRecord>,
    pub skipped: Vec<SkippedRow>,
}

/// Where match rows come from.
#[derive(Debug, Clone)]
pub enum RecordSource {
    Csv(PathBuf),
    Sqlite(PathBuf),
}

impl RecordSource {
    pub fn load(&self) -> Result<LoadReport> {
        match self {
            RecordSource::Csv(path) => load_csv(path),
            RecordSource::Sqlite(path) => {
                let conn = open_db(path)?;
                load_records(&conn)
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct CsvRow {
    #[serde(rename = "Date", default)]
    date: Option<String>,
    #[serde(rename = "Time", default)]
    time: Option<String>,
    #[serde(rename = "Venue", default)]
    venue: Option<String>,
    #[serde(rename = "Result", default)]
    result: Option<String>,
    #[serde(rename = "GF", default)]
    gf: Option<String>,
    #[serde(rename = "GA", default)]
    ga: Option<String>,
    #[serde(rename = "Opponent", default)]
    opponent: Option<String>,
    #[serde(rename = "xG", default)]
    xg: Option<String>,
    #[serde(rename = "Sh", default)]
    sh: Option<String>,
    #[serde(rename = "SoT", default)]
    sot: Option<String>,
    #[serde(rename = "Dist", default)]
    dist: Option<String>,
    #[serde(rename = "FK", default)]
    fk: Option<String>,
    #[serde(rename = "PK", default)]
    pk: Option<String>,
    #[serde(rename = "PKatt", default)]
    pkatt: Option<String>,
    #[serde(rename = "Formation", default)]
    formation: Option<String>,
    #[serde(rename = "Opp Formation", default)]
    opp_formation: Option<String>,
    #[serde(rename = "Referee", default)]
    referee: Option<String>,
    #[serde(rename = "Team", default)]
    team: Option<String>,
}

impl CsvRow {
    fn metric_raw(&self, metric: Metric) -> Option<&str> {
        match metric {
            Metric::GoalsFor => self.gf.as_deref(),
            Metric::GoalsAgainst => self.ga.as_deref(),
            Metric::ExpectedGoals => self.xg.as_deref(),
            Metric::Shots => self.sh.as_deref(),
            Metric::ShotsOnTarget => self.sot.as_deref(),
            Metric::ShotDistance => self.dist.as_deref(),
            Metric::FreeKicks => self.fk.as_deref(),
            Metric::PenaltyKicks => self.pk.as_deref(),
            Metric::PenaltyAttempts => self.pkatt.as_deref(),
        }
    }
}

pub fn load_csv(path: &Path) -> Result<LoadReport> {
    let file = File::open(path).with_context(|| format!("open csv {}", path.display()))?;
    let report = read_csv(file).with_context(|| format!("read csv {}", path.display()))?;
    info!(
        path = %path.display(),
        records = report.records.len(),
        skipped = report.skipped.len(),
        "loaded match csv"
    );
    Ok(report)
}

/// Parses match rows from CSV. Rows with an unusable date, team or result are
/// reported in [`LoadReport::skipped`]; unparseable metrics become missing.
pub fn read_csv<R: Read>(reader: R) -> Result<LoadReport> {
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = rdr.headers().context("read csv header")?.clone();
    let missing: Vec<&str> = REQUIRED_COLUMNS
        .iter()
        .copied()
        .filter(|col| !headers.iter().any(|h| h == *col))
        .collect();
    if !missing.is_empty() {
        return Err(anyhow!("csv is missing required columns: {}", missing.join(", ")));
    }

    let mut report = LoadReport::default();
    for (idx, row) in rdr.deserialize::<CsvRow>().enumerate() {
        // Header is line 1.
        let line = idx as u64 + 2;
        let row = match row {
            Ok(row) => row,
            Err(err) if matches!(err.kind(), csv::ErrorKind::Io(_)) => {
                return Err(err).with_context(|| format!("read csv line {line}"));
            }
            Err(err) => {
                let line = err.position().map_or(line, |pos| pos.line());
                warn!(line, error = %err, "skipping undecodable match row");
                report.skipped.push(SkippedRow {
                    line,
                    reason: SkipReason::Undecodable(err.to_string()),
                });
                continue;
            }
        };
        match record_from_csv(row, report.records.len()) {
            Ok(record) => report.records.push(record),
            Err(reason) => {
                warn!(line, reason = ?reason, "skipping match row");
                report.skipped.push(SkippedRow { line, reason });
            }
        }
    }
    Ok(report)
}

fn record_from_csv(row: CsvRow, row_id: usize) -> Result<MatchRecord, SkipReason> {
    let team = non_empty(row.team.as_deref()).ok_or(SkipReason::MissingTeam)?;
    let raw_date = row.date.as_deref().unwrap_or_default();
    let date = NaiveDate::parse_from_str(raw_date.trim(), DATE_FORMAT)
        .map_err(|_| SkipReason::BadDate(raw_date.to_string()))?;
    let raw_result = row.result.as_deref().unwrap_or_default();
    let result = MatchResult::from_label(raw_result)
        .ok_or_else(|| SkipReason::BadResult(raw_result.to_string()))?;

    let mut metrics = MetricValues::default();
    for metric in Metric::ALL {
        metrics.set(metric, row.metric_raw(metric).and_then(parse_number));
    }

    Ok(MatchRecord {
        row_id,
        team: team.to_string(),
        date,
        kickoff: non_empty(row.time.as_deref()).map(str::to_string),
        opponent: non_empty(row.opponent.as_deref())
            .unwrap_or_default()
            .to_string(),
        venue: non_empty(row.venue.as_deref()).map(str::to_string),
        formation: non_empty(row.formation.as_deref()).map(str::to_string),
        opp_formation: non_empty(row.opp_formation.as_deref()).map(str::to_string),
        referee: non_empty(row.referee.as_deref()).map(str::to_string),
        result,
        metrics,
    })
}

fn non_empty(raw: Option<&str>) -> Option<&str> {
    raw.map(str::trim).filter(|s| !s.is_empty())
}

fn parse_number(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

pub fn default_db_path() -> Option<PathBuf> {
    app_cache_dir().map(|dir| dir.join("matches.sqlite"))
}

pub fn open_db(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).ok();
    }
    let conn =
        Connection::open(path).with_context(|| format!("open sqlite db {}", path.display()))?;
    init_schema(&conn)?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS match_rows (
            row_id INTEGER PRIMARY KEY AUTOINCREMENT,
            team TEXT NOT NULL,
            match_date TEXT NOT NULL,
            kickoff TEXT NULL,
            opponent TEXT NOT NULL,
            venue TEXT NULL,
            formation TEXT NULL,
            opp_formation TEXT NULL,
            referee TEXT NULL,
            result TEXT NOT NULL,
            gf REAL NULL,
            ga REAL NULL,
            xg REAL NULL,
            sh REAL NULL,
            sot REAL NULL,
            dist REAL NULL,
            fk REAL NULL,
            pk REAL NULL,
            pkatt REAL NULL,
            updated_at TEXT NOT NULL,
            UNIQUE(team, match_date, opponent)
        );
        CREATE INDEX IF NOT EXISTS idx_match_rows_date ON match_rows(match_date);
        CREATE INDEX IF NOT EXISTS idx_match_rows_team ON match_rows(team);
        "#,
    )
    .context("create sqlite schema")?;
    Ok(())
}

/// Inserts or refreshes rows keyed by (team, date, opponent). Returns the number
/// of rows written.
pub fn upsert_records(conn: &mut Connection, records: &[MatchRecord]) -> Result<usize> {
    let tx = conn.transaction().context("begin upsert transaction")?;
    let updated_at = Utc::now().to_rfc3339();
    for m in records {
        tx.execute(
            r#"
            INSERT INTO match_rows (
                team, match_date, kickoff, opponent, venue, formation, opp_formation,
                referee, result, gf, ga, xg, sh, sot, dist, fk, pk, pkatt, updated_at
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5, ?6, ?7,
                ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19
            )
            ON CONFLICT(team, match_date, opponent) DO UPDATE SET
                kickoff = excluded.kickoff,
                venue = excluded.venue,
                formation = excluded.formation,
                opp_formation = excluded.opp_formation,
                referee = excluded.referee,
                result = excluded.result,
                gf = excluded.gf,
                ga = excluded.ga,
                xg = excluded.xg,
                sh = excluded.sh,
                sot = excluded.sot,
                dist = excluded.dist,
                fk = excluded.fk,
                pk = excluded.pk,
                pkatt = excluded.pkatt,
                updated_at = excluded.updated_at
            "#,
            params![
                m.team,
                m.date.format(DATE_FORMAT).to_string(),
                m.kickoff,
                m.opponent,
                m.venue,
                m.formation,
                m.opp_formation,
                m.referee,
                m.result.label(),
                m.metric(Metric::GoalsFor),
                m.metric(Metric::GoalsAgainst),
                m.metric(Metric::ExpectedGoals),
                m.metric(Metric::Shots),
                m.metric(Metric::ShotsOnTarget),
                m.metric(Metric::ShotDistance),
                m.metric(Metric::FreeKicks),
                m.metric(Metric::PenaltyKicks),
                m.metric(Metric::PenaltyAttempts),
                updated_at,
            ],
        )
        .with_context(|| format!("upsert {} {}", m.team, m.date))?;
    }
    tx.commit().context("commit upsert transaction")?;
    Ok(records.len())
}

struct StoredRow {
    id: i64,
    team: String,
    match_date: String,
    kickoff: Option<String>,
    opponent: String,
    venue: Option<String>,
    formation: Option<String>,
    opp_formation: Option<String>,
    referee: Option<String>,
    result: String,
    metrics: [Option<f64>; 9],
}

fn stored_row(row: &Row<'_>) -> rusqlite::Result<StoredRow> {
    let mut metrics = [None; 9];
    for (slot, col) in metrics.iter_mut().zip(10usize..) {
        *slot = row.get::<_, Option<f64>>(col)?;
    }
    Ok(StoredRow {
        id: row.get(0)?,
        team: row.get(1)?,
        match_date: row.get(2)?,
        kickoff: row.get(3)?,
        opponent: row.get(4)?,
        venue: row.get(5)?,
        formation: row.get(6)?,
        opp_formation: row.get(7)?,
        referee: row.get(8)?,
        result: row.get(9)?,
        metrics,
    })
}

/// Loads every stored row ordered by date, then insertion order.
pub fn load_records(conn: &Connection) -> Result<LoadReport> {
    let mut stmt = conn
        .prepare(
            r#"
            SELECT
                row_id, team, match_date, kickoff, opponent, venue, formation,
                opp_formation, referee, result, gf, ga, xg, sh, sot, dist, fk, pk, pkatt
            FROM match_rows
            ORDER BY match_date ASC, row_id ASC
            "#,
        )
        .context("prepare load match rows")?;
    let rows = stmt
        .query_map([], stored_row)
        .context("query match rows")?;

    let mut report = LoadReport::default();
    for row in rows {
        let row = row.context("decode match row")?;
        let line = row.id as u64;
        let date = match NaiveDate::parse_from_str(&row.match_date, DATE_FORMAT) {
            Ok(date) => date,
            Err(_) => {
                warn!(row_id = row.id, date = %row.match_date, "skipping stored row");
                report.skipped.push(SkippedRow {
                    line,
                    reason: SkipReason::BadDate(row.match_date),
                });
                continue;
            }
        };
        let Some(result) = MatchResult::from_label(&row.result) else {
            warn!(row_id = row.id, result = %row.result, "skipping stored row");
            report.skipped.push(SkippedRow {
                line,
                reason: SkipReason::BadResult(row.result),
            });
            continue;
        };
        let mut metrics = MetricValues::default();
        for (metric, value) in Metric::ALL.into_iter().zip(row.metrics) {
            metrics.set(metric, value);
        }
        report.records.push(MatchRecord {
            row_id: report.records.len(),
            team: row.team,
            date,
            kickoff: row.kickoff,
            opponent: row.opponent,
            venue: row.venue,
            formation: row.formation,
            opp_formation: row.opp_formation,
            referee: row.referee,
            result,
            metrics,
        });
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::parse_number;

    #[test]
    fn parse_number_rejects_junk() {
        assert_eq!(parse_number(" 1.5 "), Some(1.5));
        assert_eq!(parse_number("17"), Some(17.0));
        assert_eq!(parse_number(""), None);
        assert_eq!(parse_number("n/a"), None);
        assert_eq!(parse_number("NaN"), None);
    }
}
