//! Rating submission and per-professor rating tallies.
//!
//! A student holds at most one rating per professor. Submissions are a single
//! upsert keyed on (rater, professor), so resubmitting replaces all three
//! scores at once and concurrent submissions cannot produce two rows.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, instrument};
use ts_rs::TS;

use super::faculty::FacultyTables;
use super::models::RatingRecord;
use super::service::{DataError, DataService, Filter, decode_rows, encode_row};

pub const MIN_SCORE: u8 = 1;
pub const MAX_SCORE: u8 = 5;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RatingError {
    #[error("{category} must be between {MIN_SCORE} and {MAX_SCORE}, got {value}")]
    OutOfRange { category: &'static str, value: u8 },
}

/// The three category scores of one rating, each validated to `[1, 5]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct RatingScores {
    pub personality: u8,
    pub teaching_method: u8,
    pub responsibility: u8,
}

impl RatingScores {
    pub fn new(personality: u8, teaching_method: u8, responsibility: u8) -> Result<Self, RatingError> {
        let check = |category: &'static str, value: u8| {
            if (MIN_SCORE..=MAX_SCORE).contains(&value) {
                Ok(value)
            } else {
                Err(RatingError::OutOfRange { category, value })
            }
        };
        Ok(Self {
            personality: check("personality", personality)?,
            teaching_method: check("teaching method", teaching_method)?,
            responsibility: check("responsibility", responsibility)?,
        })
    }

    /// Re-run range validation, for values deserialized from untrusted input.
    pub fn validated(self) -> Result<Self, RatingError> {
        Self::new(self.personality, self.teaching_method, self.responsibility)
    }

    fn record(self, professor_id: i64) -> RatingRecord {
        RatingRecord {
            profesor_id: professor_id,
            personalidad: self.personality,
            metodo_ensenanza: self.teaching_method,
            responsabilidad: self.responsibility,
        }
    }
}

impl From<RatingRecord> for RatingScores {
    fn from(r: RatingRecord) -> Self {
        Self {
            personality: r.personalidad,
            teaching_method: r.metodo_ensenanza,
            responsibility: r.responsabilidad,
        }
    }
}

/// Create or replace the caller's rating of a professor.
#[instrument(skip(service, tables), fields(faculty = %tables.faculty))]
pub async fn submit_rating(
    service: &dyn DataService,
    tables: &FacultyTables,
    rater: &str,
    professor_id: i64,
    scores: RatingScores,
) -> Result<(), DataError> {
    let t = &tables.ratings;
    let mut row = encode_row(t.table, &scores.record(professor_id))?;
    row.insert(tables.rater_field.to_owned(), Value::from(rater));
    t.stamp(&mut row);

    service.upsert(t.table, row, &tables.rating_key()).await?;
    debug!("Rating stored");
    Ok(())
}

/// The caller's existing rating of a professor, if any.
pub async fn get_rating(
    service: &dyn DataService,
    tables: &FacultyTables,
    rater: &str,
    professor_id: i64,
) -> Result<Option<RatingScores>, DataError> {
    let t = &tables.ratings;
    let rows = service
        .select(
            t.table,
            &["profesor_id", "personalidad", "metodo_ensenanza", "responsabilidad"],
            &t.filters([
                Filter::eq(tables.rater_field, rater),
                Filter::eq("profesor_id", professor_id),
            ]),
        )
        .await?;
    let records: Vec<RatingRecord> = decode_rows(t.table, rows)?;
    Ok(records.into_iter().next().map(RatingScores::from))
}

/// Count rating rows per professor for the given ids.
///
/// Every requested id is present in the result; professors without ratings map to 0.
pub async fn count_ratings(
    service: &dyn DataService,
    tables: &FacultyTables,
    professor_ids: &[i64],
) -> Result<HashMap<i64, u32>, DataError> {
    let mut counts: HashMap<i64, u32> = professor_ids.iter().map(|id| (*id, 0)).collect();
    if professor_ids.is_empty() {
        return Ok(counts);
    }

    let t = &tables.ratings;
    let rows = service
        .select(
            t.table,
            &["profesor_id"],
            &t.filters([Filter::any_of("profesor_id", professor_ids.iter().copied())]),
        )
        .await?;

    for row in rows {
        if let Some(id) = row.get("profesor_id").and_then(Value::as_i64) {
            *counts.entry(id).or_default() += 1;
        }
    }
    Ok(counts)
}
