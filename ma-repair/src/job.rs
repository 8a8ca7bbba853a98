//! Empty `utm_content` backfill
//!
//! Selects attribution records whose stored `utm_content` is empty or absent
//! while the session's entry URL carries a non-empty `utm_content`, decodes
//! that value with the collector's rules and merges it into the stored
//! mapping. Each record is handled independently: a failure is counted and
//! the batch continues.

use crate::error::{RepairError, Result};
use ma_common::db::AttributionRecord;
use ma_common::fully_decode;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use sqlx::SqlitePool;
use tracing::{debug, info, warn};

/// Successes always logged before switching to every n-th
const LOG_FIRST: usize = 5;

static UTM_CONTENT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[?&]utm_content=([^&#]*)").expect("utm_content pattern is valid"));

// Invalid JSON is selected (and later counted as a failure) instead of
// aborting the query in json_extract. An empty URL value (followed by `&`,
// `#` or the end of the URL) never matches, so repaired and unrecoverable
// rows alike drop out of later runs.
const SELECT_CANDIDATES: &str = r#"
    SELECT
        us.id,
        us.session_id,
        us.utm_params,
        s.entry_url,
        us.entry_timestamp
    FROM utm_sessions us
    JOIN sessions s ON us.session_id = s.session_id
    WHERE CASE
            WHEN json_valid(us.utm_params)
                THEN COALESCE(json_extract(us.utm_params, '$.utm_content'), '') = ''
            ELSE 1
          END
      AND s.entry_url LIKE '%utm_content=%'
      AND s.entry_url NOT LIKE '%utm_content=&%'
      AND s.entry_url NOT LIKE '%utm_content='
      AND s.entry_url NOT LIKE '%utm_content=#%'
    ORDER BY us.entry_timestamp DESC
"#;

const UPDATE_PARAMS: &str =
    "UPDATE utm_sessions SET utm_params = ? WHERE id = ? AND utm_params IS ?";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepairOptions {
    /// Compute the report without writing
    pub dry_run: bool,
    pub log_every: usize,
}

impl Default for RepairOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            log_every: 50,
        }
    }
}

/// Counts for one run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RepairReport {
    pub selected: usize,
    pub succeeded: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Per-record result other than failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordOutcome {
    /// Corrected value written (or would be, in a dry run)
    Repaired(String),
    /// No value derivable from the entry URL
    Skipped,
}

/// Raw `utm_content` of `url`, bare `%` normalized and fully decoded
///
/// `None` when the parameter is missing or its value is empty before or
/// after decoding.
pub fn extract_utm_content(url: &str) -> Option<String> {
    let raw = UTM_CONTENT_RE.captures(url)?.get(1)?.as_str();
    if raw.is_empty() {
        return None;
    }
    let decoded = fully_decode(raw);
    if decoded.is_empty() {
        None
    } else {
        Some(decoded)
    }
}

/// Records matching the empty-content predicate, newest entry first
pub async fn select_candidates(pool: &SqlitePool) -> Result<Vec<AttributionRecord>> {
    let records = sqlx::query_as::<_, AttributionRecord>(SELECT_CANDIDATES)
        .fetch_all(pool)
        .await?;
    Ok(records)
}

/// Repair one selected record
///
/// The write only applies while `utm_params` still holds the value read at
/// selection; otherwise the record is reported as a conflict.
pub async fn repair_record(
    pool: &SqlitePool,
    record: &AttributionRecord,
    dry_run: bool,
) -> Result<RecordOutcome> {
    let Some(content) = record.entry_url.as_deref().and_then(extract_utm_content) else {
        return Ok(RecordOutcome::Skipped);
    };

    let params = record
        .params_with_content(&content)
        .map_err(|e| RepairError::MalformedRecord {
            id: record.id,
            reason: e.to_string(),
        })?;

    if dry_run {
        return Ok(RecordOutcome::Repaired(content));
    }

    let updated = Value::Object(params).to_string();
    let result = sqlx::query(UPDATE_PARAMS)
        .bind(&updated)
        .bind(record.id)
        .bind(&record.utm_params)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(RepairError::Conflict { id: record.id });
    }
    Ok(RecordOutcome::Repaired(content))
}

/// Select once, then repair every candidate
///
/// Only a failed selection is returned as an error; per-record failures are
/// counted in the report.
pub async fn run_repair(pool: &SqlitePool, options: &RepairOptions) -> Result<RepairReport> {
    let records = select_candidates(pool).await?;
    let mut report = RepairReport {
        selected: records.len(),
        ..RepairReport::default()
    };
    info!("Records to repair: {}", report.selected);

    if records.is_empty() {
        info!("Nothing to repair");
        return Ok(report);
    }
    if options.dry_run {
        info!("Dry run: no records will be written");
    }

    let log_every = options.log_every.max(1);
    for record in &records {
        match repair_record(pool, record, options.dry_run).await {
            Ok(RecordOutcome::Repaired(content)) => {
                report.succeeded += 1;
                if report.succeeded <= LOG_FIRST || report.succeeded % log_every == 0 {
                    info!(
                        "[{}] Record {}: \"{}\"",
                        report.succeeded,
                        record.id,
                        content.chars().take(50).collect::<String>()
                    );
                }
            }
            Ok(RecordOutcome::Skipped) => {
                report.skipped += 1;
                debug!("Record {}: no decodable utm_content in entry URL", record.id);
            }
            Err(e) => {
                report.failed += 1;
                warn!("Repair failed for record {}: {}", record.id, e);
            }
        }
    }

    info!(
        "Repair complete: {} succeeded, {} skipped, {} failed",
        report.succeeded, report.skipped, report.failed
    );
    Ok(report)
}
