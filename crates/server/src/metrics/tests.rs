//! Workflow tests for metric CRUD.

use std::sync::Arc;

use flagdeck_core::{
    AuditPolicy, ErrorKind, EventKind, FlagdeckError, MetricType, Permissions, PostMetricPayload,
    RequestContext, Role,
};
use flagdeck_storage::MetricStore;

use crate::api::ListParams;
use crate::test_support::{ctx, harness, metric, DenyAll};

use super::{create_metric, delete_metric, get_metric, list_metrics, DeleteMetricResponse};

fn payload(name: &str, datasource: &str) -> PostMetricPayload {
    PostMetricPayload {
        name: name.to_string(),
        description: String::new(),
        datasource_id: datasource.to_string(),
        metric_type: MetricType::Count,
        owner: String::new(),
        tags: vec![],
        projects: vec![],
    }
}

#[tokio::test]
async fn test_delete_metric_of_other_organization_is_not_found() {
    let h = harness().await;
    h.store.insert_metric(metric("met_m", "org_2")).await.unwrap();

    let err = delete_metric(&h.state, &ctx(Role::Admin), "met_m").await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(h.store.metric_deletes(), 0);
    assert!(h.store.get_metric("org_2", "met_m", true).await.unwrap().is_some());
}

#[tokio::test]
async fn test_delete_metric_returns_empty_object() {
    let h = harness().await;
    h.store.insert_metric(metric("met_1", "org_1")).await.unwrap();

    let res = delete_metric(&h.state, &ctx(Role::Admin), "met_1").await.unwrap();

    assert_eq!(serde_json::to_value(&res).unwrap(), serde_json::json!({}));
    assert_eq!(res, DeleteMetricResponse {});
    assert!(h.store.get_metric("org_1", "met_1", true).await.unwrap().is_none());
    // Default policy does not audit metric deletes.
    assert!(h.events().is_empty());
}

#[tokio::test]
async fn test_delete_archived_metric_depends_on_config() {
    let mut h = harness().await;
    let mut archived = metric("met_old", "org_1");
    archived.archived = true;
    h.store.insert_metric(archived).await.unwrap();

    let err = delete_metric(&h.state, &ctx(Role::Admin), "met_old").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    h.state.include_archived_metrics = true;
    assert!(delete_metric(&h.state, &ctx(Role::Admin), "met_old").await.is_ok());
}

#[tokio::test]
async fn test_delete_requires_manage_metrics() {
    let h = harness().await;
    h.store.insert_metric(metric("met_1", "org_1")).await.unwrap();

    let err = delete_metric(&h.state, &ctx(Role::Engineer), "met_1").await.unwrap_err();
    assert!(matches!(err, FlagdeckError::PermissionDenied));
    assert_eq!(h.store.metric_deletes(), 0);
}

#[tokio::test]
async fn test_delete_audited_when_policy_says_so() {
    let mut h = harness().await;
    h.state.audit_policy = AuditPolicy::all();
    h.store.insert_metric(metric("met_1", "org_1")).await.unwrap();

    delete_metric(&h.state, &ctx(Role::Admin), "met_1").await.unwrap();

    assert_eq!(h.events(), vec![EventKind::MetricDelete]);
    let details: serde_json::Value = serde_json::from_str(&h.audit.records()[0].details).unwrap();
    assert_eq!(details["pre"]["id"], "met_1");
}

#[tokio::test]
async fn test_create_metric_assigns_id_and_scopes_to_org() {
    let h = harness().await;

    let res = create_metric(&h.state, &ctx(Role::Analyst), payload("Orders", "ds_1"))
        .await
        .unwrap();

    assert!(res.metric.id.starts_with("met_"));
    assert_eq!(res.metric.datasource_id, "ds_1");
    let stored = h.store.get_metric("org_1", &res.metric.id, false).await.unwrap().unwrap();
    assert_eq!(stored.organization, "org_1");
    assert!(h.events().is_empty());
}

#[tokio::test]
async fn test_create_metric_validation() {
    let h = harness().await;

    let err = create_metric(&h.state, &ctx(Role::Admin), payload("", "ds_1")).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let err = create_metric(&h.state, &ctx(Role::Admin), payload("Orders", "ds_other"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert!(err.to_string().contains("ds_other"));
}

#[tokio::test]
async fn test_create_metric_checks_every_project() {
    let h = harness().await;
    let perms = Permissions::new(Role::Analyst).with_project_role("prj_b", Role::ReadOnly);
    let ctx = RequestContext::new("u_1", "org_1", perms);
    let mut body = payload("Orders", "ds_1");
    body.projects = vec!["prj_a".into(), "prj_b".into()];

    let err = create_metric(&h.state, &ctx, body).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PermissionDenied);
}

#[tokio::test]
async fn test_create_metric_audited_when_policy_says_so() {
    let mut h = harness().await;
    h.state.audit_policy = AuditPolicy::all();

    create_metric(&h.state, &ctx(Role::Admin), payload("Orders", "ds_1"))
        .await
        .unwrap();
    assert_eq!(h.events(), vec![EventKind::MetricCreate]);
}

#[tokio::test]
async fn test_list_metrics_pages_and_hides_archived() {
    let h = harness().await;
    for i in 0..12 {
        let mut m = metric(&format!("met_{:02}", i), "org_1");
        m.date_created += chrono::Duration::minutes(i);
        m.archived = i == 11;
        h.store.insert_metric(m).await.unwrap();
    }
    h.store.insert_metric(metric("met_foreign", "org_2")).await.unwrap();

    let first = list_metrics(&h.state, &ctx(Role::ReadOnly), &ListParams::default())
        .await
        .unwrap();
    assert_eq!(first.page.total, 11);
    assert_eq!(first.page.count, 10);
    assert!(first.page.has_more);
    assert_eq!(first.page.next_offset, Some(10));
    assert_eq!(first.metrics[0].id, "met_00");

    let params = ListParams {
        offset: Some(10),
        ..Default::default()
    };
    let second = list_metrics(&h.state, &ctx(Role::ReadOnly), &params).await.unwrap();
    assert_eq!(second.metrics.len(), 1);
    assert_eq!(second.metrics[0].id, "met_10");
    assert!(!second.page.has_more);
}

#[tokio::test]
async fn test_get_metric_not_found_outside_org() {
    let h = harness().await;
    h.store.insert_metric(metric("met_x", "org_2")).await.unwrap();

    let err = get_metric(&h.state, &ctx(Role::Admin), "met_x").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_deny_all_blocks_create() {
    let mut h = harness().await;
    h.state.permissions = Arc::new(DenyAll);
    let err = create_metric(&h.state, &ctx(Role::Admin), payload("Orders", "ds_1"))
        .await
        .unwrap_err();
    assert!(matches!(err, FlagdeckError::PermissionDenied));
}
