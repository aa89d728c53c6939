//! Free-text professor comments, visible only after moderation.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tracing::{info, instrument};
use ts_rs::TS;

use super::faculty::FacultyTables;
use super::models::CommentRecord;
use super::service::{DataError, DataService, Filter, Row, decode_rows};

/// Longest accepted comment, in characters.
pub const MAX_COMMENT_LEN: usize = 1000;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommentError {
    #[error("comment text is required")]
    Empty,
    #[error("comment exceeds {MAX_COMMENT_LEN} characters")]
    TooLong,
}

/// An approved comment as shown to students. The author is never exposed.
#[derive(Debug, Clone, PartialEq, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct PublicComment {
    #[ts(type = "number")]
    pub id: i64,
    pub text: String,
    pub created_at: Option<DateTime<Utc>>,
}

pub fn validate_comment(text: &str) -> Result<&str, CommentError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(CommentError::Empty);
    }
    if text.chars().count() > MAX_COMMENT_LEN {
        return Err(CommentError::TooLong);
    }
    Ok(text)
}

/// Store a comment pending moderation.
#[instrument(skip(service, tables, text), fields(faculty = %tables.faculty))]
pub async fn submit_comment(
    service: &dyn DataService,
    tables: &FacultyTables,
    author: &str,
    professor_id: i64,
    text: &str,
) -> Result<(), SubmitCommentError> {
    let text = validate_comment(text)?;

    let t = &tables.comments;
    let mut row = Row::new();
    row.insert("profesor_id".to_owned(), Value::from(professor_id));
    row.insert("usuario_id".to_owned(), Value::from(author));
    row.insert("comentario".to_owned(), Value::from(text));
    row.insert("aprobado".to_owned(), Value::Bool(false));
    row.insert("created_at".to_owned(), Value::from(Utc::now().to_rfc3339()));
    t.stamp(&mut row);
    service.insert(t.table, row).await?;

    info!(professor_id, "Comment queued for moderation");
    Ok(())
}

#[derive(Debug, thiserror::Error)]
pub enum SubmitCommentError {
    #[error(transparent)]
    Invalid(#[from] CommentError),
    #[error(transparent)]
    Data(#[from] DataError),
}

/// Approved comments for one professor, oldest first.
pub async fn list_approved_comments(
    service: &dyn DataService,
    tables: &FacultyTables,
    professor_id: i64,
) -> Result<Vec<PublicComment>, DataError> {
    let t = &tables.comments;
    let rows = service
        .select(
            t.table,
            &["id", "profesor_id", "comentario", "aprobado", "created_at"],
            &t.filters([
                Filter::eq("profesor_id", professor_id),
                Filter::eq("aprobado", true),
            ]),
        )
        .await?;

    let mut records: Vec<CommentRecord> = decode_rows(t.table, rows)?;
    // The filter already asked for approved rows; re-check so a backend that
    // ignores it can never leak an unmoderated comment.
    records.retain(|c| c.aprobado);
    records.sort_by_key(|c| (c.created_at, c.id));

    Ok(records
        .into_iter()
        .map(|c| PublicComment {
            id: c.id,
            text: c.comentario,
            created_at: c.created_at,
        })
        .collect())
}
