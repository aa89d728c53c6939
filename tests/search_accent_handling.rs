//! Tests that text search handles accented/diacritic characters correctly.
//!
//! Students typing on keyboards without dead keys should be able to search
//! "Jose Nunez" and find "José Núñez".

mod helpers;

use helpers::Seed;
use rankprof::data::faculty::{Faculty, SchemaLayout};
use rankprof::data::names::fold_for_search;
use rankprof::data::ranking::{RankingMode, RankingQuery, build_ranking_view, matches_search};

async fn names_for(seed: &Seed, query: RankingQuery) -> Vec<String> {
    build_ranking_view(&seed.service, seed.layout, &query, 5)
        .await
        .unwrap()
        .rows
        .into_iter()
        .map(|r| r.display_name)
        .collect()
}

async fn seeded() -> Seed {
    let seed = Seed::new(Faculty::Derecho, SchemaLayout::Unified);
    seed.ranked(1, "José Núñez", 8.0, 6).await;
    seed.ranked(2, "María Ángeles Peña", 7.0, 6).await;
    seed.ranked(3, "Pedro Gomez", 6.0, 6).await;
    seed
}

#[test]
fn folding_strips_common_spanish_marks() {
    assert_eq!(fold_for_search("Ñandú"), "nandu");
    assert_eq!(fold_for_search("ÁÉÍÓÚ"), "aeiou");
    assert_eq!(fold_for_search("Müller"), "muller");
}

#[test]
fn match_is_symmetric_in_accents() {
    assert!(matches_search("José Núñez", "jose nunez"));
    assert!(matches_search("Jose Nunez", "José Núñez"));
    assert!(!matches_search("José Núñez", "josefa"));
}

#[tokio::test]
async fn unaccented_search_finds_accented_name() {
    let seed = seeded().await;
    let found = names_for(&seed, RankingQuery::new(Faculty::Derecho).search("jose nunez")).await;
    assert_eq!(found, vec!["José Núñez"]);
}

#[tokio::test]
async fn accented_search_finds_accented_name() {
    let seed = seeded().await;
    let found = names_for(&seed, RankingQuery::new(Faculty::Derecho).search("Peña")).await;
    assert_eq!(found, vec!["María Ángeles Peña"]);
}

#[tokio::test]
async fn uppercase_unaccented_search_in_qualified_mode() {
    let seed = seeded().await;
    let query = RankingQuery::new(Faculty::Derecho)
        .mode(RankingMode::Qualified)
        .search("ANGELES");
    let found = names_for(&seed, query).await;
    assert_eq!(found, vec!["María Ángeles Peña"]);
}

#[tokio::test]
async fn whitespace_search_returns_everyone() {
    let seed = seeded().await;
    let found = names_for(&seed, RankingQuery::new(Faculty::Derecho).search("   ")).await;
    assert_eq!(found.len(), 3);
}
