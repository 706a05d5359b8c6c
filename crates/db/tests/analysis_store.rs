//! `PgJobStore` against a real database.

use assert_matches::assert_matches;
use researcher_core::analysis::{
    Analysis, AnalysisStatus, NewAnalysis, PARAM_RESEARCH_DATA,
};
use researcher_db::{JobStore, PgJobStore, StoreError};
use serde_json::json;
use sqlx::PgPool;

fn new_analysis(topic: &str, owner_id: Option<i64>) -> NewAnalysis {
    NewAnalysis {
        owner_id,
        ..NewAnalysis::from_topic(topic)
    }
}

#[sqlx::test(migrations = "./migrations")]
async fn create_and_get_round_trip_parameters(pool: PgPool) {
    let store = PgJobStore::new(pool);
    let mut input = new_analysis("battery recycling", Some(7));
    input.description = Some("EU market".into());
    input.parameters.insert(
        "focus_areas".into(),
        json!(["regulation", "key players"]),
    );
    input.parameters.insert("depth".into(), json!({"sources": 12}));

    let created = store.create(input).await.unwrap();
    assert_eq!(created.status, AnalysisStatus::Pending);
    assert_eq!(created.progress, 0.0);
    assert_eq!(created.title, "battery recycling");
    assert_eq!(created.owner_id, Some(7));

    let read = store.get(created.id).await.unwrap().expect("row exists");
    assert_eq!(read.topic, "battery recycling");
    assert_eq!(read.description.as_deref(), Some("EU market"));
    assert_eq!(read.parameters["focus_areas"], json!(["regulation", "key players"]));
    assert_eq!(read.parameters["depth"]["sources"], 12);
}

#[sqlx::test(migrations = "./migrations")]
async fn get_missing_id_is_none(pool: PgPool) {
    let store = PgJobStore::new(pool);
    assert!(store.get(4242).await.unwrap().is_none());
}

#[sqlx::test(migrations = "./migrations")]
async fn put_persists_transition_and_results(pool: PgPool) {
    let store = PgJobStore::new(pool);
    let mut analysis = store.create(new_analysis("offshore wind", None)).await.unwrap();

    analysis.advance(AnalysisStatus::Researching).unwrap();
    analysis
        .append_parameter(PARAM_RESEARCH_DATA, json!("turbine notes"))
        .unwrap();
    analysis.advance(AnalysisStatus::Analyzing).unwrap();
    store.put(&analysis).await.unwrap();

    let read = store.get(analysis.id).await.unwrap().unwrap();
    assert_eq!(read.status, AnalysisStatus::Analyzing);
    assert_eq!(read.progress, 0.5);
    assert_eq!(read.parameters[PARAM_RESEARCH_DATA], "turbine notes");
    assert!(read.updated_at >= read.created_at);
}

#[sqlx::test(migrations = "./migrations")]
async fn put_missing_id_is_not_found(pool: PgPool) {
    let store = PgJobStore::new(pool);
    let ghost = Analysis::from_new(9999, NewAnalysis::from_topic("ghost"), chrono::Utc::now());
    assert_matches!(store.put(&ghost).await, Err(StoreError::NotFound(9999)));
}

#[sqlx::test(migrations = "./migrations")]
async fn list_is_newest_first_with_owner_filter_and_paging(pool: PgPool) {
    let store = PgJobStore::new(pool);
    let first = store.create(new_analysis("one", Some(1))).await.unwrap();
    let second = store.create(new_analysis("two", Some(2))).await.unwrap();
    let third = store.create(new_analysis("three", Some(1))).await.unwrap();

    let ids = |rows: Vec<Analysis>| rows.into_iter().map(|a| a.id).collect::<Vec<_>>();

    let all = store.list(None, None, None).await.unwrap();
    assert_eq!(ids(all), vec![third.id, second.id, first.id]);

    let owned = store.list(Some(1), None, None).await.unwrap();
    assert_eq!(ids(owned), vec![third.id, first.id]);

    let page = store.list(None, Some(1), Some(1)).await.unwrap();
    assert_eq!(ids(page), vec![second.id]);
}

#[sqlx::test(migrations = "./migrations")]
async fn delete_removes_row_once(pool: PgPool) {
    let store = PgJobStore::new(pool);
    let analysis = store.create(new_analysis("tidal", None)).await.unwrap();

    assert!(store.delete(analysis.id).await.unwrap());
    assert!(store.get(analysis.id).await.unwrap().is_none());
    assert!(!store.delete(analysis.id).await.unwrap());
}
