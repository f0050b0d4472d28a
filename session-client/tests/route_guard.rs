use common_auth::AllowedRoleSet;
use httpmock::prelude::*;
use session_client::{AccessToken, AuthState, DeniedReason, RenderAction};

mod support;
use support::{issue_token, refresh_body, Harness};

#[tokio::test]
async fn valid_token_is_decided_without_refresh() {
    let server = MockServer::start_async().await;
    let refresh = server
        .mock_async(|when, then| {
            when.method(POST).path("/auth/refresh");
            then.status(500);
        })
        .await;

    let harness = Harness::signed_in(&server, &issue_token("student", 600));
    let mut guard = harness.session.guard(AllowedRoleSet::any());
    assert_eq!(guard.state(), AuthState::Loading);
    assert_eq!(guard.evaluate().await, AuthState::Allowed);
    assert_eq!(guard.render(harness.session.config()), RenderAction::Render);

    let teacher = Harness::signed_in(&server, &issue_token("teacher", 600));
    let mut guard = teacher.session.guard(AllowedRoleSet::new(["teacher"]));
    assert_eq!(guard.evaluate().await, AuthState::Allowed);

    assert_eq!(refresh.hits_async().await, 0);
}

#[tokio::test]
async fn role_outside_the_set_is_sent_home() {
    let server = MockServer::start_async().await;
    let refresh = server
        .mock_async(|when, then| {
            when.method(POST).path("/auth/refresh");
            then.status(500);
        })
        .await;

    let harness = Harness::signed_in(&server, &issue_token("guest", 600));
    let mut guard = harness
        .session
        .guard(AllowedRoleSet::new(["student", "teacher"]));

    assert_eq!(
        guard.evaluate().await,
        AuthState::Denied(DeniedReason::Forbidden)
    );
    assert_eq!(
        guard.render(harness.session.config()),
        RenderAction::Redirect("/".into())
    );
    assert_eq!(refresh.hits_async().await, 0);
    assert!(harness.token().is_some());
    assert_eq!(
        harness.session.metrics().guard_decision_count("forbidden"),
        1
    );
}

#[tokio::test]
async fn expired_token_is_refreshed_then_checked() {
    let server = MockServer::start_async().await;
    let fresh = issue_token("student", 600);
    let refresh = server
        .mock_async(|when, then| {
            when.method(POST).path("/auth/refresh");
            then.status(200).body(refresh_body(&fresh));
        })
        .await;

    let harness = Harness::signed_in(&server, &issue_token("student", -60));
    let mut guard = harness.session.guard(AllowedRoleSet::any());

    assert_eq!(guard.evaluate().await, AuthState::Allowed);
    assert_eq!(harness.token(), Some(fresh));

    // Same inputs: the decision is reused.
    assert_eq!(guard.evaluate().await, AuthState::Allowed);
    assert_eq!(refresh.hits_async().await, 1);
}

#[tokio::test]
async fn refreshed_role_is_still_checked() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/auth/refresh");
            then.status(200).body(refresh_body(&issue_token("guest", 600)));
        })
        .await;

    let harness = Harness::new(&server);
    let mut guard = harness.session.guard(AllowedRoleSet::new(["admin", "staff"]));
    assert_eq!(
        guard.evaluate().await,
        AuthState::Denied(DeniedReason::Forbidden)
    );
}

#[tokio::test]
async fn missing_token_with_failed_refresh_goes_to_login() {
    let server = MockServer::start_async().await;
    let refresh = server
        .mock_async(|when, then| {
            when.method(POST).path("/auth/refresh");
            then.status(401);
        })
        .await;

    let harness = Harness::new(&server);
    let mut guard = harness.session.guard(AllowedRoleSet::any());

    assert_eq!(
        guard.evaluate().await,
        AuthState::Denied(DeniedReason::Unauthenticated)
    );
    assert_eq!(
        guard.render(harness.session.config()),
        RenderAction::Redirect("/login".into())
    );
    assert_eq!(harness.token(), None);

    // Nothing changed, so no second refresh.
    guard.evaluate().await;
    assert_eq!(refresh.hits_async().await, 1);
}

#[tokio::test]
async fn unreadable_refreshed_token_clears_the_session() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/auth/refresh");
            then.status(200).body(refresh_body("not-a-token"));
        })
        .await;

    let harness = Harness::new(&server);
    let mut guard = harness.session.guard(AllowedRoleSet::any());
    assert_eq!(
        guard.evaluate().await,
        AuthState::Denied(DeniedReason::Unauthenticated)
    );
    assert_eq!(harness.token(), None);
}

#[tokio::test]
async fn token_changes_invalidate_the_decision() {
    let server = MockServer::start_async().await;
    let refresh = server
        .mock_async(|when, then| {
            when.method(POST).path("/auth/refresh");
            then.status(401);
        })
        .await;

    let harness = Harness::signed_in(&server, &issue_token("student", 600));
    let mut guard = harness.session.guard(AllowedRoleSet::new(["student"]));
    assert_eq!(guard.evaluate().await, AuthState::Allowed);

    harness
        .session
        .store()
        .set(AccessToken::new(issue_token("guest", 600)))
        .expect("swap token");
    assert_eq!(guard.state(), AuthState::Loading);
    assert_eq!(
        guard.next_change().await,
        AuthState::Denied(DeniedReason::Forbidden)
    );

    harness.session.store().clear().expect("clear");
    assert_eq!(guard.state(), AuthState::Loading);
    assert_eq!(
        guard.evaluate().await,
        AuthState::Denied(DeniedReason::Unauthenticated)
    );
    assert_eq!(refresh.hits_async().await, 1);
}

#[tokio::test]
async fn changing_the_role_set_re_evaluates() {
    let server = MockServer::start_async().await;
    let harness = Harness::signed_in(&server, &issue_token("staff", 600));
    let mut guard = harness.session.guard(AllowedRoleSet::new(["admin", "staff"]));
    assert_eq!(guard.evaluate().await, AuthState::Allowed);

    guard.set_allowed_roles(AllowedRoleSet::new(["admin"]));
    assert_eq!(guard.state(), AuthState::Loading);
    assert_eq!(
        guard.evaluate().await,
        AuthState::Denied(DeniedReason::Forbidden)
    );
}

#[tokio::test]
async fn refreshed_token_already_past_expiry_still_renders() {
    let server = MockServer::start_async().await;
    let skewed = issue_token("student", -5);
    let refresh = server
        .mock_async(|when, then| {
            when.method(POST).path("/auth/refresh");
            then.status(200).body(refresh_body(&skewed));
        })
        .await;

    let harness = Harness::new(&server);
    let mut guard = harness.session.guard(AllowedRoleSet::any());

    assert_eq!(guard.evaluate().await, AuthState::Allowed);
    assert_eq!(guard.state(), AuthState::Allowed);
    assert_eq!(guard.render(harness.session.config()), RenderAction::Render);
    assert_eq!(guard.evaluate().await, AuthState::Allowed);
    assert_eq!(refresh.hits_async().await, 1);
    assert_eq!(harness.token(), Some(skewed));
}
