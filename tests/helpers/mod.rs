//! Shared fixtures for integration tests: an in-memory data service seeded
//! through the same table references the pipeline reads from.

#![allow(dead_code)]

use rankprof::data::faculty::{Faculty, FacultyTables, SchemaLayout};
use rankprof::data::memory::MemoryService;
use rankprof::data::service::{DataService, Row};
use serde_json::{Value, json};

pub struct Seed {
    pub service: MemoryService,
    pub tables: FacultyTables,
    pub layout: SchemaLayout,
}

fn object(value: Value) -> Row {
    match value {
        Value::Object(map) => map,
        other => panic!("expected an object, got {other}"),
    }
}

impl Seed {
    pub fn new(faculty: Faculty, layout: SchemaLayout) -> Self {
        Self {
            service: MemoryService::new(),
            tables: FacultyTables::resolve(faculty, layout),
            layout,
        }
    }

    pub async fn professor(&self, id: i64, name: &str) -> &Self {
        let mut row = object(json!({ "id": id, "nombre_apellido": name }));
        self.tables.professors.stamp(&mut row);
        self.service
            .insert(self.tables.professors.table, row)
            .await
            .unwrap();
        self
    }

    /// Score row with the same value for every category average.
    pub async fn score(&self, id: i64, weighted: Option<f64>) -> &Self {
        let average = weighted.map(|w| w / 2.0);
        self.score_row(json!({
            "profesor_id": id,
            "promedio_personalidad": average,
            "promedio_metodo": average,
            "promedio_responsabilidad": average,
            "puntaje_ponderado": weighted,
        }))
        .await
    }

    pub async fn score_row(&self, value: Value) -> &Self {
        let mut row = object(value);
        self.tables.scores.stamp(&mut row);
        self.service.insert(self.tables.scores.table, row).await.unwrap();
        self
    }

    /// `count` ratings from distinct raters.
    pub async fn ratings(&self, id: i64, count: u32) -> &Self {
        for n in 0..count {
            let mut row = object(json!({
                "profesor_id": id,
                "personalidad": 4,
                "metodo_ensenanza": 4,
                "responsabilidad": 4,
            }));
            row.insert(
                self.tables.rater_field.to_owned(),
                Value::from(format!("seed-rater-{n}")),
            );
            self.tables.ratings.stamp(&mut row);
            self.service
                .insert(self.tables.ratings.table, row)
                .await
                .unwrap();
        }
        self
    }

    /// Professor, score and ratings in one call.
    pub async fn ranked(&self, id: i64, name: &str, weighted: f64, count: u32) -> &Self {
        self.professor(id, name).await;
        self.score(id, Some(weighted)).await;
        self.ratings(id, count).await
    }
}
