//! Ranking aggregation pipeline.
//!
//! Joins a faculty's aggregate score rows with professor names and live rating
//! tallies, orders them by weighted score, and produces display rows. Two
//! modes exist: `All` ranks every scored professor, `Qualified` ranks only
//! professors with enough ratings and falls back to a plain name search of the
//! full directory when a search matches nobody in the qualified subset.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, error, instrument};
use ts_rs::TS;

use super::faculty::{Faculty, FacultyTables, SchemaLayout};
use super::models::{RankedRecord, ScoreRecord};
use super::names::fold_for_search;
use super::professors::list_professors;
use super::ratings::count_ratings;
use super::service::{DataError, DataService, Filter, decode_rows};
use crate::utils::log_if_slow;

/// Display name used when a score row has no matching professor.
pub const PROFESSOR_NOT_FOUND: &str = "Professor not found";

/// Minimum rating count for a professor to appear in the qualified ranking.
pub const QUALIFICATION_THRESHOLD: u32 = 5;

const SCORE_COLUMNS: &[&str] = &[
    "profesor_id",
    "promedio_personalidad",
    "promedio_metodo",
    "promedio_responsabilidad",
    "puntaje_ponderado",
    "posicion",
    "posicion_calificados",
];

const SLOW_PIPELINE: Duration = Duration::from_millis(750);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum RankingMode {
    #[default]
    All,
    Qualified,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum SortDirection {
    Asc,
    /// Highest weighted score first.
    #[default]
    Desc,
}

/// Everything one pipeline invocation needs to know. Built once per request
/// and never mutated while the pipeline runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankingQuery {
    pub faculty: Faculty,
    pub mode: RankingMode,
    pub sort: SortDirection,
    pub search: String,
}

impl RankingQuery {
    pub fn new(faculty: Faculty) -> Self {
        Self {
            faculty,
            mode: RankingMode::default(),
            sort: SortDirection::default(),
            search: String::new(),
        }
    }

    pub fn mode(mut self, mode: RankingMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn sort(mut self, sort: SortDirection) -> Self {
        self.sort = sort;
        self
    }

    pub fn search(mut self, search: impl Into<String>) -> Self {
        self.search = search.into();
        self
    }
}

/// One ranked professor, ready for presentation.
#[derive(Debug, Clone, PartialEq, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct DisplayRow {
    #[ts(type = "number")]
    pub professor_id: i64,
    /// `None` for rows produced by the qualified-mode search fallback.
    pub rank_position: Option<u32>,
    pub personality_avg: Option<f64>,
    pub method_avg: Option<f64>,
    pub responsibility_avg: Option<f64>,
    pub weighted_score: Option<f64>,
    pub rating_count: u32,
    pub display_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct RankingView {
    pub rows: Vec<DisplayRow>,
    pub total: usize,
}

impl RankingView {
    fn from_rows(rows: Vec<DisplayRow>) -> Self {
        Self {
            total: rows.len(),
            rows,
        }
    }
}

/// Order two optional weighted scores. Missing scores sort after every
/// present score regardless of direction.
fn compare_scores(a: Option<f64>, b: Option<f64>, sort: SortDirection) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => match sort {
            SortDirection::Asc => a.total_cmp(&b),
            SortDirection::Desc => b.total_cmp(&a),
        },
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Stable sort by weighted score; ties keep fetch order.
pub fn sort_scores(scores: &mut [ScoreRecord], sort: SortDirection) {
    scores.sort_by(|a, b| compare_scores(a.puntaje_ponderado, b.puntaje_ponderado, sort));
}

/// Case- and accent-insensitive substring match. Blank needles match everything.
pub fn matches_search(name: &str, search: &str) -> bool {
    let needle = search.trim();
    needle.is_empty() || fold_for_search(name).contains(&fold_for_search(needle))
}

fn display_row(
    score: Option<&ScoreRecord>,
    professor_id: i64,
    rank_position: Option<u32>,
    rating_count: u32,
    display_name: String,
) -> DisplayRow {
    DisplayRow {
        professor_id,
        rank_position,
        personality_avg: score.and_then(|s| s.promedio_personalidad),
        method_avg: score.and_then(|s| s.promedio_metodo),
        responsibility_avg: score.and_then(|s| s.promedio_responsabilidad),
        weighted_score: score.and_then(|s| s.puntaje_ponderado),
        rating_count,
        display_name,
    }
}

fn position(index: usize) -> u32 {
    u32::try_from(index + 1).unwrap_or(u32::MAX)
}

async fn fetch_scores(
    service: &dyn DataService,
    tables: &FacultyTables,
) -> Result<Vec<ScoreRecord>, DataError> {
    let t = &tables.scores;
    let rows = service
        .select(t.table, SCORE_COLUMNS, &t.filters([]))
        .await?;
    decode_rows(t.table, rows)
}

async fn fetch_names(
    service: &dyn DataService,
    tables: &FacultyTables,
) -> Result<Vec<(i64, String)>, DataError> {
    Ok(list_professors(service, tables)
        .await?
        .into_iter()
        .map(|p| (p.id, p.nombre_apellido))
        .collect())
}

/// Stored qualified positions from the faculty's ranked table, where one exists.
async fn fetch_ranked_positions(
    service: &dyn DataService,
    tables: &FacultyTables,
    ids: &[i64],
) -> Result<HashMap<i64, u32>, DataError> {
    let Some(t) = &tables.ranked else {
        return Ok(HashMap::new());
    };
    if ids.is_empty() {
        return Ok(HashMap::new());
    }
    let rows = service
        .select(
            t.table,
            &["profesor_id", "posicion_calificados"],
            &t.filters([Filter::any_of("profesor_id", ids.iter().copied())]),
        )
        .await?;
    let ranked: Vec<RankedRecord> = decode_rows(t.table, rows)?;
    Ok(ranked
        .into_iter()
        .filter_map(|r| r.posicion_calificados.map(|p| (r.profesor_id, p)))
        .collect())
}

/// Build the ranking view for one query.
///
/// Any fetch failure aborts the whole invocation; partial views are never returned.
#[instrument(skip(service, query), fields(faculty = %query.faculty, mode = ?query.mode, sort = ?query.sort))]
pub async fn build_ranking_view(
    service: &dyn DataService,
    layout: SchemaLayout,
    query: &RankingQuery,
    qualification_threshold: u32,
) -> Result<RankingView, DataError> {
    let start = Instant::now();
    let tables = FacultyTables::resolve(query.faculty, layout);

    let view = match query.mode {
        RankingMode::All => rank_all(service, &tables, query).await?,
        RankingMode::Qualified => {
            rank_qualified(service, &tables, query, qualification_threshold).await?
        }
    };

    log_if_slow(start, SLOW_PIPELINE, "ranking pipeline");
    debug!(total = view.total, "Ranking built");
    Ok(view)
}

async fn rank_all(
    service: &dyn DataService,
    tables: &FacultyTables,
    query: &RankingQuery,
) -> Result<RankingView, DataError> {
    let mut scores = fetch_scores(service, tables).await?;
    sort_scores(&mut scores, query.sort);

    let names: HashMap<i64, String> = fetch_names(service, tables).await?.into_iter().collect();
    let ids: Vec<i64> = scores.iter().map(|s| s.profesor_id).collect();
    let counts = count_ratings(service, tables, &ids).await?;

    let rows = scores
        .iter()
        .enumerate()
        .map(|(index, score)| {
            let name = names
                .get(&score.profesor_id)
                .cloned()
                .unwrap_or_else(|| PROFESSOR_NOT_FOUND.to_owned());
            display_row(
                Some(score),
                score.profesor_id,
                Some(score.posicion.unwrap_or_else(|| position(index))),
                counts.get(&score.profesor_id).copied().unwrap_or(0),
                name,
            )
        })
        .filter(|row| matches_search(&row.display_name, &query.search))
        .collect();

    Ok(RankingView::from_rows(rows))
}

async fn rank_qualified(
    service: &dyn DataService,
    tables: &FacultyTables,
    query: &RankingQuery,
    threshold: u32,
) -> Result<RankingView, DataError> {
    let scores = fetch_scores(service, tables).await?;
    let ids: Vec<i64> = scores.iter().map(|s| s.profesor_id).collect();
    let counts = count_ratings(service, tables, &ids).await?;

    let count_of = |id: i64| counts.get(&id).copied().unwrap_or(0);
    let mut qualified: Vec<&ScoreRecord> = scores
        .iter()
        .filter(|s| count_of(s.profesor_id) >= threshold)
        .collect();
    qualified.sort_by(|a, b| compare_scores(a.puntaje_ponderado, b.puntaje_ponderado, query.sort));

    let directory = fetch_names(service, tables).await?;
    let names: HashMap<i64, &str> = directory.iter().map(|(id, n)| (*id, n.as_str())).collect();

    let qualified_ids: Vec<i64> = qualified.iter().map(|s| s.profesor_id).collect();
    let stored = fetch_ranked_positions(service, tables, &qualified_ids).await?;

    let rows: Vec<DisplayRow> = qualified
        .iter()
        .enumerate()
        .map(|(index, score)| {
            let rank = score
                .posicion_calificados
                .or_else(|| stored.get(&score.profesor_id).copied())
                .unwrap_or_else(|| position(index));
            let name = names
                .get(&score.profesor_id)
                .map_or_else(|| PROFESSOR_NOT_FOUND.to_owned(), |n| (*n).to_owned());
            display_row(
                Some(score),
                score.profesor_id,
                Some(rank),
                count_of(score.profesor_id),
                name,
            )
        })
        .filter(|row| matches_search(&row.display_name, &query.search))
        .collect();

    if !rows.is_empty() || query.search.trim().is_empty() {
        return Ok(RankingView::from_rows(rows));
    }

    // Nobody qualified matches the search: look through the whole directory
    // so the student still finds the professor, unranked.
    let matched: Vec<(i64, &str)> = directory
        .iter()
        .filter(|(_, name)| matches_search(name, &query.search))
        .map(|(id, name)| (*id, name.as_str()))
        .collect();
    debug!(matches = matched.len(), "Qualified search empty, falling back to directory");

    let by_id: HashMap<i64, &ScoreRecord> = scores.iter().map(|s| (s.profesor_id, s)).collect();
    let missing: Vec<i64> = matched
        .iter()
        .map(|(id, _)| *id)
        .filter(|id| !counts.contains_key(id))
        .collect();
    let extra_counts = count_ratings(service, tables, &missing).await?;

    let rows = matched
        .into_iter()
        .map(|(id, name)| {
            let count = counts
                .get(&id)
                .or_else(|| extra_counts.get(&id))
                .copied()
                .unwrap_or(0);
            display_row(by_id.get(&id).copied(), id, None, count, name.to_owned())
        })
        .collect();

    Ok(RankingView::from_rows(rows))
}

/// Run the pipeline for the presentation layer: failures are logged and
/// rendered as an empty view.
pub async fn load_ranking(
    service: &dyn DataService,
    layout: SchemaLayout,
    query: &RankingQuery,
    qualification_threshold: u32,
) -> RankingView {
    match build_ranking_view(service, layout, query, qualification_threshold).await {
        Ok(view) => view,
        Err(e) => {
            error!(error = %e, faculty = %query.faculty, "Failed to load ranking");
            RankingView::default()
        }
    }
}
