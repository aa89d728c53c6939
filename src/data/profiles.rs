//! User profiles: the faculty a student belongs to, and the institutional
//! email check that gates access.

use serde_json::Value;
use tracing::{info, instrument};

use super::faculty::{FACULTY_COLUMN, Faculty, PROFILES_TABLE};
use super::models::ProfileRecord;
use super::service::{DataError, DataService, Filter, Row, decode_rows};

pub const DEFAULT_INSTITUTIONAL_DOMAIN: &str = "alumnos.ucn.cl";

#[derive(Debug, thiserror::Error)]
pub enum ProfileError {
    #[error("faculty is already set to {current} and cannot be changed")]
    FacultyLocked { current: String },
    #[error(transparent)]
    Data(#[from] DataError),
}

/// A user's profile, if one has been created.
pub async fn get_profile(
    service: &dyn DataService,
    user_id: &str,
) -> Result<Option<ProfileRecord>, DataError> {
    let rows = service
        .select(PROFILES_TABLE, &["id", "facultad"], &[Filter::eq("id", user_id)])
        .await?;
    let profiles: Vec<ProfileRecord> = decode_rows(PROFILES_TABLE, rows)?;
    Ok(profiles.into_iter().next())
}

/// The faculty recorded for a user. Unknown stored values resolve to `None`.
pub async fn user_faculty(
    service: &dyn DataService,
    user_id: &str,
) -> Result<Option<Faculty>, DataError> {
    Ok(get_profile(service, user_id)
        .await?
        .and_then(|p| p.facultad)
        .and_then(|f| Faculty::parse(&f)))
}

/// Record the user's faculty, creating the profile on first use.
///
/// Once a faculty is stored it is fixed unless `allow_change` is set; setting
/// the same faculty again is always accepted. The locked path never reads
/// before writing: it inserts the profile if absent, fills a null faculty in
/// place, then reads back whatever won.
#[instrument(skip(service))]
pub async fn set_faculty(
    service: &dyn DataService,
    user_id: &str,
    faculty: Faculty,
    allow_change: bool,
) -> Result<ProfileRecord, ProfileError> {
    let mut row = Row::new();
    row.insert("id".to_owned(), Value::from(user_id));
    row.insert(FACULTY_COLUMN.to_owned(), Value::from(faculty.as_str()));

    if allow_change {
        service.upsert(PROFILES_TABLE, row, &["id"]).await?;
    } else if !service
        .insert_if_absent(PROFILES_TABLE, row.clone(), &["id"])
        .await?
    {
        // Profiles created upstream start without a faculty.
        row.remove("id");
        service
            .update(
                PROFILES_TABLE,
                row,
                &[Filter::eq("id", user_id), Filter::is_null(FACULTY_COLUMN)],
            )
            .await?;

        match get_profile(service, user_id).await?.and_then(|p| p.facultad) {
            Some(current) if Faculty::parse(&current) != Some(faculty) => {
                return Err(ProfileError::FacultyLocked { current });
            }
            _ => {}
        }
    }

    info!(faculty = %faculty, "Profile faculty set");
    Ok(ProfileRecord {
        id: user_id.to_owned(),
        facultad: Some(faculty.as_str().to_owned()),
    })
}

/// Whether `email` belongs to the institutional `domain`.
///
/// The comparison is case-insensitive and requires a non-empty local part.
pub fn is_institutional_email(email: &str, domain: &str) -> bool {
    let Some((local, host)) = email.trim().rsplit_once('@') else {
        return false;
    };
    !local.is_empty() && !domain.is_empty() && host.eq_ignore_ascii_case(domain.trim())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::memory::MemoryService;

    #[test]
    fn institutional_email() {
        let d = DEFAULT_INSTITUTIONAL_DOMAIN;
        assert!(is_institutional_email("ana.soto@alumnos.ucn.cl", d));
        assert!(is_institutional_email("  Ana@ALUMNOS.UCN.CL ", d));
        assert!(!is_institutional_email("@alumnos.ucn.cl", d));
        assert!(!is_institutional_email("ana@gmail.com", d));
        assert!(!is_institutional_email("ana@evil-alumnos.ucn.cl", d));
        assert!(!is_institutional_email("ana@alumnos.ucn.cl.evil.com", d));
        assert!(!is_institutional_email("no-at-sign", d));
    }

    #[tokio::test]
    async fn missing_profile_is_none() {
        let svc = MemoryService::new();
        assert!(get_profile(&svc, "u1").await.unwrap().is_none());
        assert!(user_faculty(&svc, "u1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn first_faculty_selection_creates_profile() {
        let svc = MemoryService::new();
        set_faculty(&svc, "u1", Faculty::Derecho, false).await.unwrap();
        assert_eq!(user_faculty(&svc, "u1").await.unwrap(), Some(Faculty::Derecho));
        assert_eq!(svc.len(PROFILES_TABLE).await, 1);
    }

    #[tokio::test]
    async fn faculty_is_locked_by_default() {
        let svc = MemoryService::new();
        set_faculty(&svc, "u1", Faculty::Derecho, false).await.unwrap();
        // Re-selecting the same faculty is fine.
        set_faculty(&svc, "u1", Faculty::Derecho, false).await.unwrap();

        let err = set_faculty(&svc, "u1", Faculty::Medicina, false)
            .await
            .unwrap_err();
        assert!(matches!(err, ProfileError::FacultyLocked { ref current } if current == "derecho"));
        assert_eq!(user_faculty(&svc, "u1").await.unwrap(), Some(Faculty::Derecho));
    }

    #[tokio::test]
    async fn faculty_change_when_allowed() {
        let svc = MemoryService::new();
        set_faculty(&svc, "u1", Faculty::Derecho, true).await.unwrap();
        set_faculty(&svc, "u1", Faculty::Medicina, true).await.unwrap();
        assert_eq!(user_faculty(&svc, "u1").await.unwrap(), Some(Faculty::Medicina));
        assert_eq!(svc.len(PROFILES_TABLE).await, 1);
    }

    #[tokio::test]
    async fn upstream_profile_without_faculty_is_filled_once() {
        let svc = MemoryService::new();
        let mut row = Row::new();
        row.insert("id".into(), "u1".into());
        row.insert("facultad".into(), Value::Null);
        svc.insert(PROFILES_TABLE, row).await.unwrap();

        set_faculty(&svc, "u1", Faculty::Enfermeria, false).await.unwrap();
        assert!(set_faculty(&svc, "u1", Faculty::Derecho, false).await.is_err());
        assert_eq!(user_faculty(&svc, "u1").await.unwrap(), Some(Faculty::Enfermeria));
        assert_eq!(svc.len(PROFILES_TABLE).await, 1);
    }

    /// Delays every read so concurrent writers interleave between read and write.
    struct SlowReads(MemoryService);

    #[async_trait::async_trait]
    impl DataService for SlowReads {
        async fn select(&self, table: &str, columns: &[&str], filters: &[Filter]) -> Result<Vec<Row>, DataError> {
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            self.0.select(table, columns, filters).await
        }

        async fn insert(&self, table: &str, row: Row) -> Result<(), DataError> {
            self.0.insert(table, row).await
        }

        async fn update(&self, table: &str, patch: Row, filters: &[Filter]) -> Result<u64, DataError> {
            self.0.update(table, patch, filters).await
        }

        async fn upsert(&self, table: &str, row: Row, key: &[&str]) -> Result<(), DataError> {
            self.0.upsert(table, row, key).await
        }

        async fn insert_if_absent(&self, table: &str, row: Row, key: &[&str]) -> Result<bool, DataError> {
            self.0.insert_if_absent(table, row, key).await
        }
    }

    #[tokio::test]
    async fn concurrent_first_selections_have_one_winner() {
        let svc = SlowReads(MemoryService::new());
        let (law, medicine) = tokio::join!(
            set_faculty(&svc, "u1", Faculty::Derecho, false),
            set_faculty(&svc, "u1", Faculty::Medicina, false),
        );

        let winner = match (&law, &medicine) {
            (Ok(_), Err(ProfileError::FacultyLocked { .. })) => Faculty::Derecho,
            (Err(ProfileError::FacultyLocked { .. }), Ok(_)) => Faculty::Medicina,
            other => panic!("expected exactly one selection to win, got {other:?}"),
        };
        assert_eq!(user_faculty(&svc, "u1").await.unwrap(), Some(winner));
    }

    #[tokio::test]
    async fn unknown_stored_faculty_disables_features() {
        let svc = MemoryService::new();
        let mut row = Row::new();
        row.insert("id".into(), "u1".into());
        row.insert("facultad".into(), "arquitectura".into());
        svc.insert(PROFILES_TABLE, row).await.unwrap();
        assert_eq!(user_faculty(&svc, "u1").await.unwrap(), None);
    }
}
