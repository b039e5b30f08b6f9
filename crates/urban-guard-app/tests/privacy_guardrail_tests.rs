//! Integration tests for secret handling in debug output.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{FakeIdentityService, ScriptedClassifier, jpeg};
use urban_guard_app::UrbanGuardClient;
use urban_guard_auth::{MemoryTokenStorage, SignInForm};
use urban_guard_core::CredentialSource;

#[tokio::test]
async fn privacy_guardrail_tests_avoid_token_leakage_in_debug_output() {
    let service = Arc::new(FakeIdentityService::default());
    service.add_account("a@b.com", "x", "very-secret-token", common::identity_a());
    let client = UrbanGuardClient::with_transports(
        service,
        Arc::new(ScriptedClassifier::default()),
        Arc::new(MemoryTokenStorage::default()),
        Duration::from_secs(5),
    );
    client.auth().sign_in("a@b.com", "x").await.expect("sign-in");

    let credential = client
        .auth()
        .session()
        .current_credential()
        .expect("credential installed");
    assert!(!format!("{credential:?}").contains("very-secret-token"));
    assert!(!format!("{client:?}").contains("very-secret-token"));
}

#[test]
fn privacy_guardrail_tests_avoid_password_leakage_in_logs() {
    let form = SignInForm {
        username: "a@b.com".to_string(),
        password: "hunter2".to_string(),
    };
    assert!(!format!("{form:?}").contains("hunter2"));
}

#[test]
fn privacy_guardrail_tests_image_debug_omits_bytes() {
    let image = jpeg("sign.jpg", 4096);
    let rendered = format!("{image:?}");
    assert!(rendered.contains("sign.jpg"));
    assert!(rendered.len() < 200);
}
