//! Row shapes read from and written to the data service.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Professor identity row. Extra columns (e.g. `facultad`) are ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfessorRecord {
    pub id: i64,
    pub nombre_apellido: String,
}

/// Per-professor aggregate row, recomputed by the data service.
///
/// Every value may be missing; a missing average is "no data", never zero.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct ScoreRecord {
    pub profesor_id: i64,
    #[serde(default)]
    pub promedio_personalidad: Option<f64>,
    #[serde(default)]
    pub promedio_metodo: Option<f64>,
    #[serde(default)]
    pub promedio_responsabilidad: Option<f64>,
    #[serde(default)]
    pub puntaje_ponderado: Option<f64>,
    /// Stored overall rank position, when the backend precomputes one.
    #[serde(default)]
    pub posicion: Option<u32>,
    /// Stored rank among qualified professors.
    #[serde(default)]
    pub posicion_calificados: Option<u32>,
}

/// Row of a faculty's ranked table (stored qualified positions).
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RankedRecord {
    pub profesor_id: i64,
    #[serde(default)]
    pub posicion_calificados: Option<u32>,
}

/// Rating scores as stored. The rater column name differs per faculty and is
/// read separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatingRecord {
    pub profesor_id: i64,
    pub personalidad: u8,
    pub metodo_ensenanza: u8,
    pub responsabilidad: u8,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CommentRecord {
    pub id: i64,
    pub profesor_id: i64,
    pub comentario: String,
    #[serde(default)]
    pub aprobado: bool,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileRecord {
    pub id: String,
    pub facultad: Option<String>,
}
