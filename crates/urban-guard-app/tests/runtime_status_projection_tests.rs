//! Integration tests for dashboard projection over a live client.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{FakeIdentityService, Scripted, ScriptedClassifier, detection_json, jpeg};
use urban_guard_app::UrbanGuardClient;
use urban_guard_auth::MemoryTokenStorage;
use urban_guard_ui::{EMPTY_RESULT_TEXT, ResultTone, SUBMIT_LABEL, UiAuthState};

fn client(classifier: &Arc<ScriptedClassifier>) -> UrbanGuardClient {
    UrbanGuardClient::with_transports(
        Arc::new(FakeIdentityService::with_account_a()),
        classifier.clone(),
        Arc::new(MemoryTokenStorage::default()),
        Duration::from_secs(5),
    )
}

#[tokio::test]
async fn runtime_status_projection_tests_reflects_session_and_upload_state() {
    let classifier = Arc::new(ScriptedClassifier::new([Scripted::ok(detection_json(
        "authorized",
        0.875,
        "Signage appears authorized",
    ))]));
    let client = client(&classifier);

    let checking = client.dashboard();
    assert_eq!(checking.auth, UiAuthState::Checking);
    assert!(!checking.show_auth_buttons);

    client.auth().initialize().await;
    let signed_out = client.dashboard();
    assert_eq!(signed_out.auth, UiAuthState::SignedOut);
    assert!(signed_out.show_auth_buttons);
    assert!(!signed_out.show_submit);
    assert_eq!(signed_out.status_text, EMPTY_RESULT_TEXT);

    client.auth().sign_in("a@b.com", "x").await.expect("sign-in");
    client.uploads().choose_file(jpeg("sign.jpg", 64)).await;
    let ready = client.dashboard();
    assert_eq!(ready.greeting.as_deref(), Some("Welcome, a"));
    assert_eq!(ready.file_name.as_deref(), Some("sign.jpg"));
    assert!(ready.submit_enabled);
    assert_eq!(ready.submit_label, SUBMIT_LABEL);

    client.uploads().submit().await.expect("classification");
    let done = client.dashboard();
    let panel = done.result.expect("result panel");
    assert_eq!(panel.heading, "Authorized");
    assert_eq!(panel.tone, ResultTone::Positive);
    assert_eq!(panel.confidence_label, "87.5%");
}

#[tokio::test]
async fn runtime_status_projection_tests_uploads_carry_the_session_credential() {
    let classifier = Arc::new(ScriptedClassifier::new([
        Scripted::ok(detection_json("authorized", 0.9, "ok")),
        Scripted::ok(detection_json("authorized", 0.9, "ok")),
    ]));
    let client = client(&classifier);
    client.auth().initialize().await;

    client.auth().sign_in("a@b.com", "x").await.expect("sign-in");
    client.uploads().choose_file(jpeg("sign.jpg", 16)).await;
    client.uploads().submit().await.expect("first submission");

    client.sign_out();
    client.uploads().choose_file(jpeg("sign.jpg", 16)).await;
    client.uploads().submit().await.expect("second submission");

    let seen = classifier.seen_credentials.lock().expect("credentials lock").clone();
    assert_eq!(seen, vec![Some("t1".to_string()), None]);
}

#[tokio::test]
async fn runtime_status_projection_tests_sign_out_discards_previous_upload() {
    let classifier = Arc::new(ScriptedClassifier::new([Scripted::ok(detection_json(
        "unauthorized",
        0.7,
        "Signage appears unauthorized",
    ))]));
    let client = client(&classifier);
    client.auth().sign_in("a@b.com", "x").await.expect("sign-in");
    client.uploads().choose_file(jpeg("sign.jpg", 16)).await;
    client.uploads().submit().await.expect("classification");

    client.sign_out();

    let view = client.dashboard();
    assert_eq!(view.auth, UiAuthState::SignedOut);
    assert!(view.file_name.is_none());
    assert!(view.result.is_none());
    assert!(view.greeting.is_none());
}
