//! Integration tests for session, response and credential lifecycles.
//!
//! Each step is its own request, the way a client would drive them.

use chrono::{Duration, Utc};
use quorum_runtime::orchestrator::{ErrorKind, Orchestrator};
use quorum_runtime::services::NewCredential;
use quorum_runtime::store;
use quorum_runtime::testing::Fixture;
use quorum_runtime::{BatchResponse, OperationBatch, OperationCall, RequestMeta};
use quorum_types::{Identity, Permission, Session, SessionStatus};
use serde_json::{json, Value};

async fn call(orchestrator: &Orchestrator, meta: RequestMeta, name: &str, args: Value) -> BatchResponse {
    orchestrator
        .execute(meta, OperationBatch::single(OperationCall::new(name, args)))
        .await
}

async fn call_as(orchestrator: &Orchestrator, who: Option<&Identity>, name: &str, args: Value) -> BatchResponse {
    call(orchestrator, Fixture::meta(who), name, args).await
}

fn error_kind(response: &BatchResponse, key: &str) -> Option<ErrorKind> {
    response.errors_for(key).next().map(|e| e.code)
}

fn answers(fx: &Fixture) -> Vec<(Value, Value)> {
    vec![
        (json!(fx.questions[0].id), json!({ "type": "text", "value": "Smooth checkout" })),
        (json!(fx.questions[1].id), json!({ "type": "choice", "value": "green" })),
        (json!(fx.questions[2].id), json!({ "type": "rating", "value": 4 })),
    ]
}

// =============================================================================
// Sessions and Responses
// =============================================================================

#[tokio::test]
async fn respondent_completes_a_survey() {
    let fx = Fixture::new().await;
    let orchestrator = fx.orchestrator();
    let user = Some(&fx.user);

    let started = call_as(&orchestrator, user, "startSession", json!({ "surveyId": fx.survey.id })).await;
    assert!(started.is_ok(), "{:?}", started.errors);
    let session = started.get("startSession").unwrap();
    assert_eq!(session["status"], json!("NOT_STARTED"));
    assert_eq!(session["totalQuestions"], json!(3));
    let session_id = session["id"].clone();

    let mut statuses = Vec::new();
    for (question, payload) in answers(&fx) {
        let args = json!({ "sessionId": session_id, "questionId": question, "payload": payload });
        let submitted = call_as(&orchestrator, user, "submitResponse", args).await;
        assert!(submitted.is_ok(), "{:?}", submitted.errors);
        let data = submitted.get("submitResponse").unwrap();
        statuses.push((data["session"]["status"].clone(), data["session"]["answered"].clone()));
    }
    assert_eq!(
        statuses,
        vec![
            (json!("IN_PROGRESS"), json!(1)),
            (json!("IN_PROGRESS"), json!(2)),
            (json!("COMPLETED"), json!(3)),
        ]
    );

    // Completed sessions take no more answers.
    let (question, payload) = answers(&fx).remove(0);
    let late = call_as(
        &orchestrator,
        user,
        "submitResponse",
        json!({ "sessionId": session_id, "questionId": question, "payload": payload }),
    )
    .await;
    assert_eq!(error_kind(&late, "submitResponse"), Some(ErrorKind::Conflict));

    let listed = call_as(&orchestrator, Some(&fx.analyst), "responses", json!({ "sessionId": session_id })).await;
    assert_eq!(listed.get("responses").unwrap().as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn answers_are_validated_and_not_repeated() {
    let fx = Fixture::new().await;
    let orchestrator = fx.orchestrator();
    let user = Some(&fx.user);
    let started = call_as(&orchestrator, user, "startSession", json!({ "surveyId": fx.survey.id })).await;
    let session_id = started.get("startSession").unwrap()["id"].clone();
    let submit = |question: &Value, payload: Value| {
        json!({ "sessionId": session_id, "questionId": question, "payload": payload })
    };
    let choice = json!(fx.questions[1].id);

    let bad = call_as(&orchestrator, user, "submitResponse", submit(&choice, json!({ "type": "choice", "value": "purple" }))).await;
    assert_eq!(error_kind(&bad, "submitResponse"), Some(ErrorKind::Validation));

    let wrong_kind = call_as(&orchestrator, user, "submitResponse", submit(&choice, json!({ "type": "rating", "value": 3 }))).await;
    assert_eq!(error_kind(&wrong_kind, "submitResponse"), Some(ErrorKind::Validation));

    let ok = call_as(&orchestrator, user, "submitResponse", submit(&choice, json!({ "type": "choice", "value": "red" }))).await;
    assert!(ok.is_ok(), "{:?}", ok.errors);
    let again = call_as(&orchestrator, user, "submitResponse", submit(&choice, json!({ "type": "choice", "value": "blue" }))).await;
    assert_eq!(error_kind(&again, "submitResponse"), Some(ErrorKind::Conflict));

    // Editing is the way to change an answer.
    let response_id = ok.get("submitResponse").unwrap()["response"]["id"].clone();
    let edited = call_as(
        &orchestrator,
        user,
        "editResponse",
        json!({ "id": response_id, "payload": { "type": "choice", "value": "blue" } }),
    )
    .await;
    assert!(edited.is_ok(), "{:?}", edited.errors);
    let edited = edited.get("editResponse").unwrap();
    assert_eq!(edited["payload"]["value"], json!("blue"));
    assert_eq!(edited["editCount"], json!(1));
}

#[tokio::test]
async fn progress_never_moves_backwards() {
    let fx = Fixture::new().await;
    let ctx = fx.context(Some(&fx.user)).await;
    let sessions = &ctx.services.sessions;

    let session = sessions.start(fx.survey.id, Some(fx.user.id)).await.unwrap();
    let session = sessions.record_progress(session.id, 2).await.unwrap();
    assert_eq!((session.answered, session.status), (2, SessionStatus::InProgress));

    let session = sessions.record_progress(session.id, 1).await.unwrap();
    assert_eq!(session.answered, 2);
    assert_eq!(session.progress_percent(), 66);

    let session = sessions.record_progress(session.id, 7).await.unwrap();
    assert_eq!(session.answered, 3);
    assert_eq!(session.status, SessionStatus::Completed);
    assert!(sessions.record_progress(session.id, 3).await.is_err());
}

#[tokio::test]
async fn sessions_belong_to_their_respondent() {
    let fx = Fixture::new().await;
    let orchestrator = fx.orchestrator();
    let started = call_as(&orchestrator, Some(&fx.user), "startSession", json!({ "surveyId": fx.survey.id })).await;
    let session_id = started.get("startSession").unwrap()["id"].clone();
    let (question, payload) = answers(&fx).remove(0);
    let args = json!({ "sessionId": session_id, "questionId": question, "payload": payload });

    let colleague = call_as(&orchestrator, Some(&fx.analyst), "submitResponse", args.clone()).await;
    assert_eq!(error_kind(&colleague, "submitResponse"), Some(ErrorKind::NotFound));

    let stranger = call_as(&orchestrator, Some(&fx.outsider), "submitResponse", args.clone()).await;
    assert_eq!(error_kind(&stranger, "submitResponse"), Some(ErrorKind::NotFound));

    let anonymous = call_as(&orchestrator, None, "submitResponse", args).await;
    assert_eq!(error_kind(&anonymous, "submitResponse"), Some(ErrorKind::Unauthenticated));
}

#[tokio::test]
async fn anonymous_respondents_need_an_open_survey_that_allows_them() {
    let fx = Fixture::new().await;
    let orchestrator = fx.orchestrator();

    let started = call_as(&orchestrator, None, "startSession", json!({ "surveyId": fx.survey.id })).await;
    assert!(started.is_ok(), "{:?}", started.errors);
    let session = started.get("startSession").unwrap();
    assert!(session["identityId"].is_null());

    let (question, payload) = answers(&fx).remove(0);
    let args = json!({ "sessionId": session["id"], "questionId": question, "payload": payload });
    let submitted = call_as(&orchestrator, None, "submitResponse", args).await;
    assert!(submitted.is_ok(), "{:?}", submitted.errors);

    let draft = call_as(&orchestrator, None, "startSession", json!({ "surveyId": fx.draft.id })).await;
    assert_eq!(error_kind(&draft, "startSession"), Some(ErrorKind::Conflict));
}

#[tokio::test]
async fn stale_sessions_expire() {
    let fx = Fixture::new().await;
    let mut stale = Session::new(fx.survey.id, fx.tenant.id, Some(fx.user.id), 3);
    stale.last_activity_at = Utc::now() - Duration::hours(2);
    store::insert(fx.store.as_ref(), stale.clone()).await.unwrap();
    let fresh = Session::new(fx.survey.id, fx.tenant.id, Some(fx.user.id), 3);
    store::insert(fx.store.as_ref(), fresh.clone()).await.unwrap();
    let orchestrator = fx.orchestrator();

    let denied = call_as(&orchestrator, Some(&fx.admin), "expireSessions", json!({})).await;
    assert_eq!(error_kind(&denied, "expireSessions"), Some(ErrorKind::Forbidden));

    let swept = call_as(&orchestrator, Some(&fx.system), "expireSessions", Value::Null).await;
    assert!(swept.is_ok(), "{:?}", swept.errors);
    let data = swept.get("expireSessions").unwrap();
    assert_eq!(data["expired"], json!(1));
    assert_eq!(data["sessionIds"], json!([stale.id]));

    let read = call_as(&orchestrator, Some(&fx.user), "session", json!({ "id": fresh.id })).await;
    assert_eq!(read.get("session").unwrap()["status"], json!("NOT_STARTED"));
}

#[tokio::test]
async fn reading_a_stale_session_expires_it() {
    let fx = Fixture::new().await;
    let mut stale = Session::new(fx.survey.id, fx.tenant.id, Some(fx.user.id), 3);
    stale.last_activity_at = Utc::now() - Duration::hours(2);
    store::insert(fx.store.as_ref(), stale.clone()).await.unwrap();

    let read = call_as(&fx.orchestrator(), Some(&fx.user), "session", json!({ "id": stale.id })).await;
    assert_eq!(read.get("session").unwrap()["status"], json!("EXPIRED"));
}

#[tokio::test]
async fn foreign_readers_cannot_expire_a_session() {
    let fx = Fixture::new().await;
    let mut stale = Session::new(fx.survey.id, fx.tenant.id, Some(fx.user.id), 3);
    stale.last_activity_at = Utc::now() - Duration::hours(2);
    store::insert(fx.store.as_ref(), stale.clone()).await.unwrap();
    let orchestrator = fx.orchestrator();

    let foreign = call_as(&orchestrator, Some(&fx.outsider), "session", json!({ "id": stale.id })).await;
    assert_eq!(error_kind(&foreign, "session"), Some(ErrorKind::NotFound));

    let stored = store::get::<Session>(fx.store.as_ref(), stale.id).await.unwrap().unwrap();
    assert_eq!(stored.status, SessionStatus::NotStarted);
}

// =============================================================================
// Credentials
// =============================================================================

#[tokio::test]
async fn api_keys_are_scoped_and_revocable() {
    let fx = Fixture::new().await;
    let orchestrator = fx.orchestrator();
    let admin = Some(&fx.admin);

    let issued = call_as(
        &orchestrator,
        admin,
        "issueCredential",
        json!({ "name": "ci", "permissions": ["survey:read"] }),
    )
    .await;
    assert!(issued.is_ok(), "{:?}", issued.errors);
    let issued = issued.get("issueCredential").unwrap();
    let key = issued["key"].as_str().unwrap().to_string();
    let credential_id = issued["credential"]["id"].clone();
    assert!(key.starts_with("qk_"));
    assert!(issued["credential"].get("keyHash").is_none());

    let with_key = || RequestMeta::new().with_authorization(&format!("Bearer {key}"));
    let read = call(&orchestrator, with_key(), "survey", json!({ "id": fx.survey.id })).await;
    assert!(read.is_ok(), "{:?}", read.errors);
    let write = call(&orchestrator, with_key(), "createSurvey", json!({ "title": "via key" })).await;
    assert_eq!(error_kind(&write, "createSurvey"), Some(ErrorKind::Forbidden));

    let first = call_as(&orchestrator, admin, "revokeCredential", json!({ "id": credential_id })).await;
    assert_eq!(first.get("revokeCredential").unwrap()["changed"], json!(true));
    let second = call_as(&orchestrator, admin, "revokeCredential", json!({ "id": credential_id })).await;
    assert_eq!(second.get("revokeCredential").unwrap()["changed"], json!(false));
    assert_eq!(second.get("revokeCredential").unwrap()["credential"]["revoked"], json!(true));

    let after = call(&orchestrator, with_key(), "survey", json!({ "id": fx.survey.id })).await;
    assert_eq!(error_kind(&after, "survey"), Some(ErrorKind::Unauthenticated));
}

#[tokio::test]
async fn key_use_shows_in_the_tenant_listing_of_the_same_request() {
    let fx = Fixture::new().await;
    let ctx = fx.context(Some(&fx.admin)).await;
    let credentials = &ctx.services.credentials;
    let input = NewCredential {
        name: "ci".into(),
        permissions: [Permission::SurveyRead].into_iter().collect(),
    };
    let issued = credentials.issue(fx.admin.id, fx.tenant.id, input).await.unwrap();

    let before = credentials.list_by_tenant(fx.tenant.id).await;
    assert_eq!(before[0].usage_count, 0);

    let used = credentials.authenticate(&issued.key).await.unwrap().unwrap();
    assert_eq!(used.credential.usage_count, 1);

    let after = credentials.list_by_tenant(fx.tenant.id).await;
    let listed = after.iter().find(|c| c.id == issued.credential.id).unwrap();
    assert_eq!(listed.usage_count, 1);
}

#[tokio::test]
async fn keys_cannot_exceed_their_issuer() {
    let fx = Fixture::new().await;
    let response = call_as(
        &fx.orchestrator(),
        Some(&fx.admin),
        "issueCredential",
        json!({ "name": "too much", "permissions": ["survey:read", "tenant:create"] }),
    )
    .await;
    let err = response.errors_for("issueCredential").next().unwrap();
    assert_eq!(err.code, ErrorKind::Forbidden);
    assert!(err.message.contains("tenant:create"), "{}", err.message);
}
