//! Integration tests for batch execution.
//!
//! Tests the complete flow: RequestMeta → Orchestrator → resolvers →
//! BatchResponse, including authorization, rendering and throttling.

use quorum_event::{MutationKind, SubscriptionFilter, Topic};
use quorum_runtime::bus::{LocalBus, NotificationBus};
use quorum_runtime::orchestrator::ErrorKind;
use quorum_runtime::store;
use quorum_runtime::testing::Fixture;
use quorum_runtime::{OperationBatch, OperationCall, RequestMeta};
use quorum_types::{Identity, Role};
use serde_json::json;
use std::sync::Arc;

fn single(name: &str, args: serde_json::Value) -> OperationBatch {
    OperationBatch::single(OperationCall::new(name, args))
}

// =============================================================================
// Partial Failure
// =============================================================================

#[tokio::test]
async fn failures_stay_with_their_operation() {
    let fx = Fixture::new().await;
    let orchestrator = fx.orchestrator();

    let batch = OperationBatch::new()
        .with(OperationCall::new("me", json!({})))
        .with(OperationCall::new("survey", json!({})).alias("noId"))
        .with(OperationCall::new("launchRocket", json!({})));
    let response = orchestrator.execute(Fixture::meta(Some(&fx.analyst)), batch).await;

    assert_eq!(response.get("me").unwrap()["email"], json!("analyst@acme.io"));
    assert!(response.get("noId").is_none());
    assert!(response.get("launchRocket").is_none());
    assert_eq!(response.errors.len(), 2);

    let no_id = response.errors_for("noId").next().unwrap();
    assert_eq!(no_id.code, ErrorKind::Validation);
    assert_eq!(no_id.field.as_deref(), Some("id"));
    let unknown = response.errors_for("launchRocket").next().unwrap();
    assert_eq!(unknown.code, ErrorKind::Validation);
    assert_eq!(unknown.http_status, 400);
}

#[tokio::test]
async fn duplicate_alias_rejects_the_batch() {
    let fx = Fixture::new().await;
    let batch = OperationBatch::new()
        .with(OperationCall::new("me", json!({})).alias("x"))
        .with(OperationCall::new("tenants", json!({})).alias("x"));
    let response = fx.orchestrator().execute(Fixture::meta(Some(&fx.system)), batch).await;

    assert!(response.data.is_empty());
    assert_eq!(response.errors.len(), 1);
    assert_eq!(response.errors[0].code, ErrorKind::Validation);
    assert_eq!(response.errors[0].field.as_deref(), Some("alias"));
}

// =============================================================================
// Authorization
// =============================================================================

#[tokio::test]
async fn anonymous_callers_are_unauthenticated() {
    let fx = Fixture::new().await;
    let response = fx
        .orchestrator()
        .execute(RequestMeta::new(), single("survey", json!({ "id": fx.survey.id })))
        .await;

    let err = response.errors_for("survey").next().unwrap();
    assert_eq!(err.code, ErrorKind::Unauthenticated);
    assert_eq!(err.http_status, 401);
}

#[tokio::test]
async fn unknown_token_runs_anonymously() {
    let fx = Fixture::new().await;
    let meta = RequestMeta::new().with_authorization("Bearer not-a-real-token");
    let response = fx.orchestrator().execute(meta, single("me", json!({}))).await;

    assert_eq!(response.errors_for("me").next().unwrap().code, ErrorKind::Unauthenticated);
}

#[tokio::test]
async fn lower_roles_are_forbidden() {
    let fx = Fixture::new().await;
    let args = json!({ "title": "Viewer's survey" });
    let response = fx
        .orchestrator()
        .execute(Fixture::meta(Some(&fx.viewer)), single("createSurvey", args))
        .await;

    let err = response.errors_for("createSurvey").next().unwrap();
    assert_eq!(err.code, ErrorKind::Forbidden);
    assert_eq!(err.http_status, 403);
}

#[tokio::test]
async fn other_tenants_look_like_missing_data() {
    let fx = Fixture::new().await;
    let orchestrator = fx.orchestrator();

    let by_id = orchestrator
        .execute(Fixture::meta(Some(&fx.outsider)), single("survey", json!({ "id": fx.survey.id })))
        .await;
    let err = by_id.errors_for("survey").next().unwrap();
    assert_eq!(err.code, ErrorKind::NotFound);
    assert!(!err.message.contains(&fx.tenant.id.uuid().to_string()));

    let by_tenant = orchestrator
        .execute(
            Fixture::meta(Some(&fx.outsider)),
            single("surveys", json!({ "tenantId": fx.tenant.id })),
        )
        .await;
    let err = by_tenant.errors_for("surveys").next().unwrap();
    assert_eq!(err.code, ErrorKind::NotFound);
    assert_eq!(err.message, "tenant not found");
}

#[tokio::test]
async fn system_admin_reads_any_tenant() {
    let fx = Fixture::new().await;
    let response = fx
        .orchestrator()
        .execute(
            Fixture::meta(Some(&fx.system)),
            OperationBatch::new()
                .with(OperationCall::new("survey", json!({ "id": fx.survey.id })))
                .with(OperationCall::new("surveys", json!({ "tenantId": fx.tenant.id })))
                .with(OperationCall::new("tenants", json!({}))),
        )
        .await;

    assert!(response.is_ok(), "{:?}", response.errors);
    assert_eq!(response.get("surveys").unwrap().as_array().unwrap().len(), 2);
    assert_eq!(response.get("tenants").unwrap().as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn guarded_nested_field_fails_alone() {
    let fx = Fixture::new().await;
    let args = json!({ "id": fx.survey.id, "include": ["questions", "stats"] });
    let response = fx
        .orchestrator()
        .execute(Fixture::meta(Some(&fx.viewer)), single("survey", args))
        .await;

    let survey = response.get("survey").unwrap();
    assert_eq!(survey["questions"].as_array().unwrap().len(), 3);
    assert!(survey["stats"].is_null());
    let err = response.errors_for("survey").next().unwrap();
    assert_eq!(err.code, ErrorKind::Forbidden);
    assert_eq!(err.path, vec!["survey".to_string(), "stats".to_string()]);
}

#[tokio::test]
async fn grants_cannot_reach_a_higher_tier() {
    let fx = Fixture::new().await;
    let owner = Identity::new("owner@acme.io", Role::SystemAdmin, Some(fx.tenant.id));
    store::insert(fx.store.as_ref(), owner.clone()).await.unwrap();
    let orchestrator = fx.orchestrator();
    let grant = |id| single("grantPermission", json!({ "id": id, "permission": "survey:read" }));

    let upward = orchestrator
        .execute(Fixture::meta(Some(&fx.admin)), grant(owner.id))
        .await;
    assert_eq!(upward.errors_for("grantPermission").next().map(|e| e.code), Some(ErrorKind::Forbidden));

    let downward = orchestrator
        .execute(Fixture::meta(Some(&fx.admin)), grant(fx.viewer.id))
        .await;
    assert!(downward.is_ok(), "{:?}", downward.errors);
}

// =============================================================================
// Pagination
// =============================================================================

#[tokio::test]
async fn oversized_limit_is_clamped_and_far_offset_is_empty() {
    let fx = Fixture::new().await;
    let orchestrator = fx.orchestrator();
    let meta = || Fixture::meta(Some(&fx.analyst));

    let clamped = orchestrator
        .execute(meta(), single("surveys", json!({ "limit": 10_000 })))
        .await;
    assert!(clamped.is_ok(), "{:?}", clamped.errors);
    assert_eq!(clamped.get("surveys").unwrap().as_array().unwrap().len(), 2);

    let past_end = orchestrator
        .execute(meta(), single("surveys", json!({ "offset": 50 })))
        .await;
    assert!(past_end.is_ok());
    assert_eq!(past_end.data["surveys"], json!([]));
}

// =============================================================================
// Rate Limiting
// =============================================================================

#[tokio::test]
async fn batches_are_charged_per_operation() {
    let mut config = quorum_runtime::config::QuorumConfig::default();
    config.rate_limit.enabled = true;
    config.rate_limit.capacity = 3.0;
    config.rate_limit.refill_per_sec = 0.001;
    let fx = Fixture::with_config(config).await;
    let orchestrator = fx.orchestrator();
    let two = || {
        OperationBatch::new()
            .with(OperationCall::new("me", json!({})).alias("a"))
            .with(OperationCall::new("me", json!({})).alias("b"))
    };

    let first = orchestrator.execute(Fixture::meta(Some(&fx.user)), two()).await;
    assert!(first.is_ok());

    let second = orchestrator.execute(Fixture::meta(Some(&fx.user)), two()).await;
    assert!(second.get("a").is_none() && second.get("b").is_none());
    assert_eq!(second.errors.len(), 2);
    assert!(second.errors.iter().all(|e| e.code == ErrorKind::RateLimited && e.http_status == 429));

    // Buckets are per caller.
    let other = orchestrator.execute(Fixture::meta(Some(&fx.viewer)), two()).await;
    assert!(other.is_ok());
}

#[tokio::test]
async fn rotating_unknown_tokens_share_their_address_bucket() {
    let mut config = quorum_runtime::config::QuorumConfig::default();
    config.rate_limit.enabled = true;
    config.rate_limit.capacity = 1.0;
    config.rate_limit.refill_per_sec = 0.001;
    let fx = Fixture::with_config(config).await;
    let orchestrator = fx.orchestrator();
    let ip: std::net::IpAddr = "203.0.113.7".parse().unwrap();

    let mut admitted = 0;
    for i in 0..5 {
        let meta = RequestMeta::new().with_bearer(format!("junk-{i}")).with_client_ip(ip);
        let response = orchestrator.execute(meta, single("me", json!({}))).await;
        if response.errors.iter().all(|e| e.code != ErrorKind::RateLimited) {
            admitted += 1;
        }
    }
    assert_eq!(admitted, 1);

    // A resolved caller behind the same address has its own bucket.
    let known = Fixture::meta(Some(&fx.user)).with_client_ip(ip);
    assert!(orchestrator.execute(known, single("me", json!({}))).await.is_ok());
}

#[tokio::test]
async fn rate_keys_follow_the_resolved_caller() {
    let fx = Fixture::new().await;
    let contexts = fx.contexts();
    let ip: std::net::IpAddr = "198.51.100.4".parse().unwrap();

    let known = contexts.build(Fixture::meta(Some(&fx.user)).with_client_ip(ip)).await;
    assert_eq!(known.rate_key(), fx.user.id.to_string());
    assert!(known.rate_key().starts_with("identity:"));

    let junk = contexts.build(RequestMeta::new().with_bearer("junk").with_client_ip(ip)).await;
    assert_eq!(junk.rate_key(), "ip:198.51.100.4");

    let nowhere = contexts.build(RequestMeta::new().with_bearer("junk")).await;
    assert_eq!(nowhere.rate_key(), "anonymous");
}

// =============================================================================
// Notifications
// =============================================================================

#[tokio::test]
async fn mutations_reach_tenant_subscribers_only() {
    let fx = Fixture::new().await;
    let bus: Arc<dyn NotificationBus> = Arc::new(LocalBus::new(16));
    let orchestrator = fx.orchestrator().with_bus(bus);

    let mut ours = orchestrator
        .subscribe(Fixture::meta(Some(&fx.analyst)), SubscriptionFilter::new().topic(Topic::Survey))
        .await
        .expect("should subscribe within the home tenant");
    let mut theirs = orchestrator
        .subscribe(Fixture::meta(Some(&fx.outsider)), SubscriptionFilter::new())
        .await
        .expect("should subscribe within the other tenant");

    let args = json!({ "id": fx.draft.id, "title": "Roadmap input 2027" });
    let response = orchestrator
        .execute(Fixture::meta(Some(&fx.admin)), single("updateSurvey", args))
        .await;
    assert!(response.is_ok(), "{:?}", response.errors);

    let event = ours.recv().await.expect("should receive the update");
    assert_eq!(event.kind, MutationKind::Updated);
    assert_eq!(event.entity_id, fx.draft.id.uuid());
    assert_eq!(event.actor, Some(fx.admin.id));
    assert!(theirs.try_recv().is_none());
}

#[tokio::test]
async fn subscribing_to_a_foreign_tenant_is_refused() {
    let fx = Fixture::new().await;
    let orchestrator = fx.orchestrator().with_bus(Arc::new(LocalBus::new(16)));

    let err = orchestrator
        .subscribe(
            Fixture::meta(Some(&fx.outsider)),
            SubscriptionFilter::new().tenant(fx.tenant.id),
        )
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorKind::Validation);
    assert_eq!(err.field.as_deref(), Some("filter"));

    let anonymous = orchestrator
        .subscribe(RequestMeta::new(), SubscriptionFilter::new())
        .await
        .unwrap_err();
    assert_eq!(anonymous.code, ErrorKind::Unauthenticated);
}
