//! Presentation strings for ranking rows.

use serde::Serialize;
use ts_rs::TS;

use crate::data::ranking::DisplayRow;

/// Shown for a missing score. Never conflated with `0.0`.
pub const NO_DATA: &str = "N/A";

/// Shown in place of a rank for unranked fallback rows.
pub const RANK_PLACEHOLDER: &str = "—";

/// Format a score truncated (not rounded) to one decimal place.
///
/// ```
/// use rankprof::display::format_score;
///
/// assert_eq!(format_score(Some(8.58)), "8.5");
/// assert_eq!(format_score(Some(0.0)), "0.0");
/// assert_eq!(format_score(None), "N/A");
/// ```
pub fn format_score(score: Option<f64>) -> String {
    match score {
        Some(value) if value.is_finite() => {
            // Nudge past representation error so 2.3 does not truncate to 2.2.
            let truncated = ((value * 10.0) + 1e-9).trunc() / 10.0;
            format!("{truncated:.1}")
        }
        _ => NO_DATA.to_owned(),
    }
}

pub fn rating_count_label(count: u32) -> String {
    if count == 1 {
        "1 rating".to_owned()
    } else {
        format!("{count} ratings")
    }
}

pub fn format_rank(rank: Option<u32>) -> String {
    rank.map_or_else(|| RANK_PLACEHOLDER.to_owned(), |r| r.to_string())
}

/// A [`DisplayRow`] with every value rendered for display.
#[derive(Debug, Clone, PartialEq, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct FormattedRow {
    #[ts(type = "number")]
    pub professor_id: i64,
    pub rank: String,
    pub name: String,
    pub personality: String,
    pub method: String,
    pub responsibility: String,
    pub weighted: String,
    pub rating_count: u32,
    pub rating_label: String,
}

impl From<&DisplayRow> for FormattedRow {
    fn from(row: &DisplayRow) -> Self {
        Self {
            professor_id: row.professor_id,
            rank: format_rank(row.rank_position),
            name: row.display_name.clone(),
            personality: format_score(row.personality_avg),
            method: format_score(row.method_avg),
            responsibility: format_score(row.responsibility_avg),
            weighted: format_score(row.weighted_score),
            rating_count: row.rating_count,
            rating_label: rating_count_label(row.rating_count),
        }
    }
}
