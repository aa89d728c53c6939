//! Faculty enum and faculty-to-table resolution.
//!
//! Each faculty's data is either partitioned into its own table family (the
//! legacy layout still used by the hosted backend) or stored in shared tables
//! carrying a `facultad` discriminator (the unified layout created by this
//! crate's migrations). Callers never branch on layout: they ask for a
//! [`TableRef`] and apply its scope filter.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use super::service::{Filter, Row};

/// Column holding the faculty discriminator in the unified layout and in the
/// shared comments table.
pub const FACULTY_COLUMN: &str = "facultad";

/// Academic division used as the partition key for all professor data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum Faculty {
    Ingenieria,
    Derecho,
    Comercial,
    Medicina,
    Enfermeria,
}

impl Faculty {
    pub const ALL: [Faculty; 5] = [
        Faculty::Ingenieria,
        Faculty::Derecho,
        Faculty::Comercial,
        Faculty::Medicina,
        Faculty::Enfermeria,
    ];

    /// Stored string form, as persisted in `profiles.facultad`.
    pub fn as_str(self) -> &'static str {
        match self {
            Faculty::Ingenieria => "ingenieria",
            Faculty::Derecho => "derecho",
            Faculty::Comercial => "comercial",
            Faculty::Medicina => "medicina",
            Faculty::Enfermeria => "enfermeria",
        }
    }

    /// Parse a stored faculty string. Unknown values return `None`, which
    /// callers treat as "feature not available for this faculty".
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        Self::ALL
            .into_iter()
            .find(|f| f.as_str().eq_ignore_ascii_case(s))
    }

    /// Human-readable faculty name.
    pub fn label(self) -> &'static str {
        match self {
            Faculty::Ingenieria => "Ingeniería",
            Faculty::Derecho => "Derecho",
            Faculty::Comercial => "Ciencias Empresariales",
            Faculty::Medicina => "Medicina",
            Faculty::Enfermeria => "Enfermería",
        }
    }
}

impl std::fmt::Display for Faculty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Physical layout of the backing tables.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaLayout {
    /// One table family per faculty (`profesores_derecho`, `calificaciones_med`, ...).
    Legacy,
    /// Shared tables with a `facultad` column.
    #[default]
    Unified,
}

/// A table plus the equality filter that scopes it to one faculty.
#[derive(Debug, Clone, PartialEq)]
pub struct TableRef {
    pub table: &'static str,
    pub scope: Option<Filter>,
}

impl TableRef {
    fn bare(table: &'static str) -> Self {
        Self { table, scope: None }
    }

    fn scoped(table: &'static str, faculty: Faculty) -> Self {
        Self {
            table,
            scope: Some(Filter::eq(FACULTY_COLUMN, faculty.as_str())),
        }
    }

    /// Prepend the scope filter (if any) to caller-supplied filters.
    pub fn filters(&self, extra: impl IntoIterator<Item = Filter>) -> Vec<Filter> {
        self.scope.iter().cloned().chain(extra).collect()
    }

    /// Stamp the scope column onto a row that is about to be written.
    pub fn stamp(&self, row: &mut Row) {
        if let Some(Filter::Eq(column, value)) = &self.scope {
            row.insert(column.clone(), value.clone());
        }
    }

    /// Conflict key for upserts: the scope column (if any) followed by `key`.
    pub fn conflict_key(&self, key: &[&'static str]) -> Vec<&'static str> {
        let mut columns = Vec::with_capacity(key.len() + 1);
        if self.scope.is_some() {
            columns.push(FACULTY_COLUMN);
        }
        columns.extend_from_slice(key);
        columns
    }
}

/// Every table the core touches for one faculty.
#[derive(Debug, Clone, PartialEq)]
pub struct FacultyTables {
    pub faculty: Faculty,
    pub professors: TableRef,
    pub scores: TableRef,
    pub ratings: TableRef,
    /// Optional source of stored qualified-rank positions.
    pub ranked: Option<TableRef>,
    pub comments: TableRef,
    /// Column naming the rater in the ratings table.
    pub rater_field: &'static str,
}

/// Shared user-to-faculty table, keyed by user id.
pub const PROFILES_TABLE: &str = "profiles";

impl FacultyTables {
    pub fn resolve(faculty: Faculty, layout: SchemaLayout) -> Self {
        match layout {
            SchemaLayout::Legacy => Self::legacy(faculty),
            SchemaLayout::Unified => Self::unified(faculty),
        }
    }

    /// Upsert key for the ratings table: one rating per rater and professor.
    pub fn rating_key(&self) -> Vec<&'static str> {
        self.ratings.conflict_key(&[self.rater_field, "profesor_id"])
    }

    fn legacy(faculty: Faculty) -> Self {
        let (professors, scores, ratings) = match faculty {
            Faculty::Ingenieria => ("profesores", "profesor_promedios", "calificaciones"),
            Faculty::Derecho => (
                "profesores_derecho",
                "profesores_promedios_derecho",
                "calificaciones_derecho",
            ),
            Faculty::Comercial => (
                "profesores_comercial",
                "profesores_promedios_comercial",
                "calificaciones_comercial",
            ),
            Faculty::Medicina => (
                "profesores_med",
                "profesores_promedios_med",
                "calificaciones_med",
            ),
            Faculty::Enfermeria => (
                "profesores_enf",
                "profesores_promedios_enf",
                "calificaciones_enf",
            ),
        };

        // Medicine and nursing were added later and name the rater column differently.
        let rater_field = match faculty {
            Faculty::Medicina | Faculty::Enfermeria => "user_id",
            _ => "usuario_id",
        };

        let ranked = match faculty {
            Faculty::Ingenieria => Some(TableRef::bare("profesores_ranked")),
            _ => None,
        };

        Self {
            faculty,
            professors: TableRef::bare(professors),
            scores: TableRef::bare(scores),
            ratings: TableRef::bare(ratings),
            ranked,
            // The comments table was always shared and discriminated by column.
            comments: TableRef::scoped("comentarios_ing", faculty),
            rater_field,
        }
    }

    fn unified(faculty: Faculty) -> Self {
        Self {
            faculty,
            professors: TableRef::scoped("professors", faculty),
            scores: TableRef::scoped("professor_scores", faculty),
            ratings: TableRef::scoped("ratings", faculty),
            ranked: None,
            comments: TableRef::scoped("comments", faculty),
            rater_field: "usuario_id",
        }
    }
}

/// Unique keys that legacy-layout upserts conflict on, as `(table, columns)`.
///
/// The hosted rating tables were created without them.
pub fn legacy_unique_keys() -> Vec<(&'static str, Vec<&'static str>)> {
    Faculty::ALL
        .into_iter()
        .map(|faculty| {
            let tables = FacultyTables::resolve(faculty, SchemaLayout::Legacy);
            (tables.ratings.table, tables.rating_key())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_round_trips_every_faculty() {
        for faculty in Faculty::ALL {
            assert_eq!(Faculty::parse(faculty.as_str()), Some(faculty));
        }
        assert_eq!(Faculty::parse(" Derecho "), Some(Faculty::Derecho));
        assert_eq!(Faculty::parse("arquitectura"), None);
        assert_eq!(Faculty::parse(""), None);
    }

    #[test]
    fn legacy_tables_match_observed_families() {
        let t = FacultyTables::resolve(Faculty::Ingenieria, SchemaLayout::Legacy);
        assert_eq!(t.professors.table, "profesores");
        assert_eq!(t.scores.table, "profesor_promedios");
        assert_eq!(t.ratings.table, "calificaciones");
        assert_eq!(t.rater_field, "usuario_id");
        assert!(t.professors.scope.is_none());
        assert_eq!(t.ranked.map(|r| r.table), Some("profesores_ranked"));

        let t = FacultyTables::resolve(Faculty::Medicina, SchemaLayout::Legacy);
        assert_eq!(t.professors.table, "profesores_med");
        assert_eq!(t.ratings.table, "calificaciones_med");
        assert_eq!(t.rater_field, "user_id");
        assert!(t.ranked.is_none());

        let t = FacultyTables::resolve(Faculty::Enfermeria, SchemaLayout::Legacy);
        assert_eq!(t.rater_field, "user_id");
        assert_eq!(t.comments.table, "comentarios_ing");
        assert_eq!(
            t.comments.scope,
            Some(Filter::eq(FACULTY_COLUMN, "enfermeria"))
        );
    }

    #[test]
    fn unified_tables_scope_by_column() {
        for faculty in Faculty::ALL {
            let t = FacultyTables::resolve(faculty, SchemaLayout::Unified);
            assert_eq!(t.professors.table, "professors");
            assert_eq!(t.rater_field, "usuario_id");
            assert_eq!(
                t.ratings.scope,
                Some(Filter::eq(FACULTY_COLUMN, faculty.as_str()))
            );
        }
    }

    #[test]
    fn conflict_key_includes_scope_column() {
        let unified = FacultyTables::resolve(Faculty::Derecho, SchemaLayout::Unified);
        assert_eq!(
            unified.ratings.conflict_key(&["usuario_id", "profesor_id"]),
            vec!["facultad", "usuario_id", "profesor_id"]
        );
        let legacy = FacultyTables::resolve(Faculty::Derecho, SchemaLayout::Legacy);
        assert_eq!(
            legacy.ratings.conflict_key(&["usuario_id", "profesor_id"]),
            vec!["usuario_id", "profesor_id"]
        );
    }

    #[test]
    fn stamp_writes_scope_column() {
        let t = FacultyTables::resolve(Faculty::Comercial, SchemaLayout::Unified);
        let mut row = Row::new();
        t.professors.stamp(&mut row);
        assert_eq!(row.get(FACULTY_COLUMN), Some(&"comercial".into()));

        let legacy = FacultyTables::resolve(Faculty::Comercial, SchemaLayout::Legacy);
        let mut row = Row::new();
        legacy.professors.stamp(&mut row);
        assert!(row.is_empty());
    }

    #[test]
    fn legacy_rating_tables_get_a_rater_professor_key() {
        let keys = legacy_unique_keys();
        assert_eq!(keys.len(), Faculty::ALL.len());
        assert!(keys.contains(&("calificaciones", vec!["usuario_id", "profesor_id"])));
        assert!(keys.contains(&("calificaciones_derecho", vec!["usuario_id", "profesor_id"])));
        assert!(keys.contains(&("calificaciones_enf", vec!["user_id", "profesor_id"])));
        for faculty in Faculty::ALL {
            let t = FacultyTables::resolve(faculty, SchemaLayout::Legacy);
            assert!(keys.contains(&(t.ratings.table, t.rating_key())));
        }
    }
}
