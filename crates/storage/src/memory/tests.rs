//! Unit tests for the memory backend.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use flagdeck_core::{ExperimentStatus, MetricType, Permissions, Role};

use super::*;

fn created_at(offset_minutes: i64) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2026-01-05T10:00:00Z")
        .unwrap()
        .with_timezone(&Utc)
        + Duration::minutes(offset_minutes)
}

fn make_experiment(id: &str, org: &str, tracking_key: &str, offset: i64) -> Experiment {
    Experiment {
        id: id.to_string(),
        organization: org.to_string(),
        project: None,
        name: format!("Experiment {}", id),
        tracking_key: tracking_key.to_string(),
        hypothesis: String::new(),
        description: String::new(),
        tags: vec![],
        owner: "u_owner".to_string(),
        datasource: "ds_1".to_string(),
        exposure_query_id: "q1".to_string(),
        hash_attribute: "id".to_string(),
        status: ExperimentStatus::Draft,
        archived: false,
        date_created: created_at(offset),
        date_updated: created_at(offset),
    }
}

fn make_metric(id: &str, org: &str, archived: bool, offset: i64) -> Metric {
    Metric {
        id: id.to_string(),
        organization: org.to_string(),
        name: format!("Metric {}", id),
        description: String::new(),
        datasource: "ds_1".to_string(),
        metric_type: MetricType::Count,
        owner: String::new(),
        tags: vec![],
        projects: vec![],
        archived,
        date_created: created_at(offset),
        date_updated: created_at(offset),
    }
}

fn ctx() -> RequestContext {
    RequestContext::new("u_1", "org_1", Permissions::new(Role::Admin))
}

fn rename_key(key: &str) -> ExperimentChanges {
    ExperimentChanges {
        tracking_key: Some(key.to_string()),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_lookups_are_scoped_to_organization() {
    let store = MemoryStore::new();
    store
        .insert_experiment(make_experiment("exp_1", "org_1", "checkout", 0))
        .await
        .unwrap();

    assert!(store.get_experiment("org_1", "exp_1").await.unwrap().is_some());
    assert!(store.get_experiment("org_2", "exp_1").await.unwrap().is_none());
    assert!(store
        .get_experiment_by_tracking_key("org_2", "checkout")
        .await
        .unwrap()
        .is_none());
    assert_eq!(
        store
            .get_experiment_by_tracking_key("org_1", "checkout")
            .await
            .unwrap()
            .map(|e| e.id),
        Some("exp_1".to_string())
    );
}

#[tokio::test]
async fn test_same_tracking_key_allowed_across_organizations() {
    let store = MemoryStore::new();
    store
        .insert_experiment(make_experiment("exp_1", "org_1", "checkout", 0))
        .await
        .unwrap();
    store
        .insert_experiment(make_experiment("exp_2", "org_2", "checkout", 0))
        .await
        .unwrap();

    let err = store
        .insert_experiment(make_experiment("exp_3", "org_1", "checkout", 0))
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::Conflict { field: "tracking_key", .. }));
}

#[tokio::test]
async fn test_update_applies_changes_and_refreshes_date() {
    let store = MemoryStore::new();
    let exp = make_experiment("exp_1", "org_1", "checkout", 0);
    store.insert_experiment(exp.clone()).await.unwrap();

    let changes = ExperimentChanges {
        archived: Some(true),
        ..Default::default()
    };
    let updated = store.update_experiment(&ctx(), &exp, &changes).await.unwrap().unwrap();
    assert!(updated.archived);
    assert!(updated.date_updated > exp.date_updated);
    assert_eq!(updated.date_created, exp.date_created);

    let stored = store.get_experiment("org_1", "exp_1").await.unwrap().unwrap();
    assert_eq!(stored, updated);
}

#[tokio::test]
async fn test_update_missing_experiment_returns_none() {
    let store = MemoryStore::new();
    let exp = make_experiment("exp_1", "org_1", "checkout", 0);
    let res = store.update_experiment(&ctx(), &exp, &rename_key("x")).await.unwrap();
    assert!(res.is_none());
}

#[tokio::test]
async fn test_update_rejects_taken_tracking_key() {
    let store = MemoryStore::new();
    let a = make_experiment("exp_1", "org_1", "a", 0);
    store.insert_experiment(a.clone()).await.unwrap();
    store
        .insert_experiment(make_experiment("exp_2", "org_1", "b", 1))
        .await
        .unwrap();

    let err = store.update_experiment(&ctx(), &a, &rename_key("b")).await.unwrap_err();
    assert!(matches!(err, StorageError::Conflict { field: "tracking_key", ref value } if value == "b"));

    // Keeping its own key is not a conflict.
    assert!(store.update_experiment(&ctx(), &a, &rename_key("a")).await.unwrap().is_some());
}

#[tokio::test]
async fn test_concurrent_renames_to_same_key_admit_one() {
    let store = Arc::new(MemoryStore::new());
    let a = make_experiment("exp_1", "org_1", "a", 0);
    let b = make_experiment("exp_2", "org_1", "b", 1);
    store.insert_experiment(a.clone()).await.unwrap();
    store.insert_experiment(b.clone()).await.unwrap();

    let s1 = store.clone();
    let s2 = store.clone();
    let t1 = tokio::spawn(async move { s1.update_experiment(&ctx(), &a, &rename_key("shared")).await });
    let t2 = tokio::spawn(async move { s2.update_experiment(&ctx(), &b, &rename_key("shared")).await });
    let results = [t1.await.unwrap(), t2.await.unwrap()];

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    let holders = store
        .list_experiments("org_1", &ExperimentFilter::default())
        .await
        .unwrap()
        .into_iter()
        .filter(|e| e.tracking_key == "shared")
        .count();
    assert_eq!(holders, 1);
}

#[tokio::test]
async fn test_list_experiments_orders_and_filters() {
    let store = MemoryStore::new();
    let mut late = make_experiment("exp_a", "org_1", "late", 10);
    late.project = Some("prj_1".into());
    store.insert_experiment(late).await.unwrap();
    store
        .insert_experiment(make_experiment("exp_b", "org_1", "early", 0))
        .await
        .unwrap();

    let all = store
        .list_experiments("org_1", &ExperimentFilter::default())
        .await
        .unwrap();
    let ids: Vec<_> = all.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(ids, vec!["exp_b", "exp_a"]);

    let filter = ExperimentFilter {
        project: Some("prj_1".into()),
        ..Default::default()
    };
    let scoped = store.list_experiments("org_1", &filter).await.unwrap();
    assert_eq!(scoped.len(), 1);
    assert_eq!(scoped[0].id, "exp_a");
}

#[tokio::test]
async fn test_metric_archived_visibility_and_delete() {
    let store = MemoryStore::new();
    store.insert_metric(make_metric("met_1", "org_1", false, 0)).await.unwrap();
    store.insert_metric(make_metric("met_2", "org_1", true, 1)).await.unwrap();

    assert!(store.get_metric("org_1", "met_2", false).await.unwrap().is_none());
    assert!(store.get_metric("org_1", "met_2", true).await.unwrap().is_some());

    let visible = store.list_metrics("org_1", &MetricFilter::default()).await.unwrap();
    assert_eq!(visible.len(), 1);

    assert!(!store.delete_metric("org_2", "met_1").await.unwrap());
    assert!(store.delete_metric("org_1", "met_1").await.unwrap());
    assert!(!store.delete_metric("org_1", "met_1").await.unwrap());
    assert!(store.get_metric("org_1", "met_1", true).await.unwrap().is_none());
}

#[tokio::test]
async fn test_duplicate_ids_conflict() {
    let store = MemoryStore::new();
    store.insert_metric(make_metric("met_1", "org_1", false, 0)).await.unwrap();
    let err = store
        .insert_metric(make_metric("met_1", "org_1", false, 0))
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::Conflict { field: "id", .. }));
}

#[tokio::test]
async fn test_snapshot_survives_reopen() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("flagdeck.json");

    {
        let store = MemoryStore::open(Some(path.clone())).unwrap();
        let exp = make_experiment("exp_1", "org_1", "checkout", 0);
        store.insert_experiment(exp.clone()).await.unwrap();
        store.insert_metric(make_metric("met_1", "org_1", false, 0)).await.unwrap();
        store.update_experiment(&ctx(), &exp, &rename_key("checkout-v2")).await.unwrap();
        store.delete_metric("org_1", "met_1").await.unwrap();
    }

    let reopened = MemoryStore::open(Some(path)).unwrap();
    let exp = reopened.get_experiment("org_1", "exp_1").await.unwrap().unwrap();
    assert_eq!(exp.tracking_key, "checkout-v2");
    assert!(reopened.snapshot().await.metrics.is_empty());
}

#[tokio::test]
async fn test_failed_snapshot_write_leaves_tables_unchanged() {
    let tmp = tempfile::tempdir().unwrap();
    let data_dir = tmp.path().join("data");
    let store = MemoryStore::open(Some(data_dir.join("flagdeck.json"))).unwrap();
    let exp = make_experiment("exp_1", "org_1", "checkout", 0);
    store.insert_experiment(exp.clone()).await.unwrap();
    store.insert_metric(make_metric("met_1", "org_1", false, 0)).await.unwrap();
    store.insert_metric(make_metric("met_2", "org_1", false, 1)).await.unwrap();

    // A regular file where the snapshot directory should be makes every save fail.
    std::fs::remove_dir_all(&data_dir).unwrap();
    std::fs::write(&data_dir, "not a directory").unwrap();

    let archive = ExperimentChanges {
        archived: Some(true),
        ..Default::default()
    };
    assert!(matches!(
        store.update_experiment(&ctx(), &exp, &archive).await,
        Err(StorageError::Io(_))
    ));
    let stored = store.get_experiment("org_1", "exp_1").await.unwrap().unwrap();
    assert!(!stored.archived);
    assert_eq!(stored, exp);

    assert!(store
        .insert_experiment(make_experiment("exp_2", "org_1", "pricing", 1))
        .await
        .is_err());
    assert!(store.get_experiment("org_1", "exp_2").await.unwrap().is_none());

    assert!(store.delete_metric("org_1", "met_1").await.is_err());
    let ids: Vec<String> = store.snapshot().await.metrics.into_iter().map(|m| m.id).collect();
    assert_eq!(ids, vec!["met_1", "met_2"]);

    assert!(store
        .insert_datasource(serde_json::from_value(serde_json::json!({"id": "ds_1", "organization": "org_1"})).unwrap())
        .await
        .is_err());
    assert!(store.get_datasource("org_1", "ds_1").await.unwrap().is_none());
}
