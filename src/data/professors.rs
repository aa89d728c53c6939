//! Professor directory: listing, search and registration.

use serde_json::Value;
use tracing::{info, instrument};

use super::faculty::FacultyTables;
use super::models::ProfessorRecord;
use super::names::{NameError, SimilarName, find_similar};
use super::service::{DataError, DataService, Filter, Row, decode_rows};

pub const NAME_COLUMN: &str = "nombre_apellido";

#[derive(Debug, thiserror::Error)]
pub enum RegisterError {
    #[error(transparent)]
    InvalidName(#[from] NameError),
    #[error("a professor with a similar name already exists")]
    Duplicate { similar: Vec<SimilarName> },
    #[error(transparent)]
    Data(#[from] DataError),
}

/// All professors of a faculty, in backend order.
pub async fn list_professors(
    service: &dyn DataService,
    tables: &FacultyTables,
) -> Result<Vec<ProfessorRecord>, DataError> {
    let t = &tables.professors;
    let rows = service
        .select(t.table, &["id", NAME_COLUMN], &t.filters([]))
        .await?;
    decode_rows(t.table, rows)
}

/// Professors whose name contains `text`, case-insensitively. Blank text lists everyone.
pub async fn search_professors(
    service: &dyn DataService,
    tables: &FacultyTables,
    text: &str,
) -> Result<Vec<ProfessorRecord>, DataError> {
    let text = text.trim();
    if text.is_empty() {
        return list_professors(service, tables).await;
    }
    let t = &tables.professors;
    let rows = service
        .select(
            t.table,
            &["id", NAME_COLUMN],
            &t.filters([Filter::contains(NAME_COLUMN, text)]),
        )
        .await?;
    decode_rows(t.table, rows)
}

/// A single professor of the faculty, if the id exists there.
pub async fn get_professor(
    service: &dyn DataService,
    tables: &FacultyTables,
    id: i64,
) -> Result<Option<ProfessorRecord>, DataError> {
    let t = &tables.professors;
    let rows = service
        .select(t.table, &["id", NAME_COLUMN], &t.filters([Filter::eq("id", id)]))
        .await?;
    let found: Vec<ProfessorRecord> = decode_rows(t.table, rows)?;
    Ok(found.into_iter().next())
}

/// Register a professor unless a near-duplicate already exists in the same faculty.
///
/// Returns the trimmed name that was stored.
#[instrument(skip(service, tables), fields(faculty = %tables.faculty))]
pub async fn register_professor(
    service: &dyn DataService,
    tables: &FacultyTables,
    name: &str,
    threshold: usize,
) -> Result<String, RegisterError> {
    // Validate before touching the backend.
    let name = super::names::validate_name(name)?;

    let existing: Vec<String> = list_professors(service, tables)
        .await?
        .into_iter()
        .map(|p| p.nombre_apellido)
        .collect();

    let similar = find_similar(name, &existing, threshold)?;
    if !similar.is_empty() {
        info!(
            candidate = name,
            closest = %similar[0].name,
            distance = similar[0].distance,
            "Rejected near-duplicate professor"
        );
        return Err(RegisterError::Duplicate { similar });
    }

    let t = &tables.professors;
    let mut row = Row::new();
    row.insert(NAME_COLUMN.to_owned(), Value::from(name));
    t.stamp(&mut row);
    service.insert(t.table, row).await?;

    info!(name, "Registered professor");
    Ok(name.to_owned())
}
