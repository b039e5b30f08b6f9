//! Shared fakes and fixtures for app integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::Notify;
use urban_guard_auth::{AuthResponse, IdentityTransport, SignInForm, SignUpRequest};
use urban_guard_core::{Credential, Identity, ImageFile, TransportError, TransportFuture};
use urban_guard_upload::ClassifierTransport;

/// Identity used by most fixtures.
pub fn identity_a() -> Identity {
    Identity {
        id: 1,
        username: "a".to_string(),
        email: "a@b.com".to_string(),
    }
}

/// JPEG-typed blob of `size` bytes.
pub fn jpeg(name: &str, size: usize) -> ImageFile {
    let mut bytes = vec![0u8; size];
    if size >= 3 {
        bytes[..3].copy_from_slice(&[0xFF, 0xD8, 0xFF]);
    }
    ImageFile::new(name, "image/jpeg", bytes)
}

/// Non-image blob.
pub fn pdf(name: &str) -> ImageFile {
    ImageFile::new(name, "application/pdf", b"%PDF-1.7".to_vec())
}

/// Yields to other tasks until `condition` holds.
pub async fn wait_until(condition: impl Fn() -> bool) {
    while !condition() {
        tokio::task::yield_now().await;
    }
}

/// Detection response body.
pub fn detection_json(prediction: &str, confidence: f64, message: &str) -> String {
    serde_json::json!({
        "prediction": prediction,
        "confidence": confidence,
        "message": message,
    })
    .to_string()
}

struct Account {
    email: String,
    password: String,
    token: String,
    identity: Identity,
    revoked: bool,
}

/// In-memory identity service.
#[derive(Default)]
pub struct FakeIdentityService {
    accounts: Mutex<Vec<Account>>,
    sign_in_gate: Mutex<Option<Arc<Notify>>>,
    identity_gate: Mutex<Option<Arc<Notify>>>,
    pub sign_in_calls: AtomicUsize,
    pub identity_calls: AtomicUsize,
}

impl FakeIdentityService {
    /// Service knowing account `a@b.com` / `x` with token `t1`.
    pub fn with_account_a() -> Self {
        let service = Self::default();
        service.add_account("a@b.com", "x", "t1", identity_a());
        service
    }

    pub fn add_account(&self, email: &str, password: &str, token: &str, identity: Identity) {
        self.accounts.lock().expect("accounts lock").push(Account {
            email: email.to_string(),
            password: password.to_string(),
            token: token.to_string(),
            identity,
            revoked: false,
        });
    }

    /// Makes `token` fail identity checks from now on.
    pub fn revoke(&self, token: &str) {
        for account in self.accounts.lock().expect("accounts lock").iter_mut() {
            if account.token == token {
                account.revoked = true;
            }
        }
    }

    /// Holds every later sign-in response until the returned handle is
    /// notified.
    pub fn gate_sign_in(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.sign_in_gate.lock().expect("gate lock") = Some(Arc::clone(&gate));
        gate
    }

    /// Holds every later identity check until the returned handle is
    /// notified.
    pub fn gate_identity(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.identity_gate.lock().expect("gate lock") = Some(Arc::clone(&gate));
        gate
    }

    pub fn sign_in_count(&self) -> usize {
        self.sign_in_calls.load(Ordering::SeqCst)
    }

    pub fn identity_count(&self) -> usize {
        self.identity_calls.load(Ordering::SeqCst)
    }

    fn rejected(status: u16, reason: &str) -> TransportError {
        TransportError::Status {
            status,
            reason: reason.to_string(),
        }
    }
}

impl IdentityTransport for FakeIdentityService {
    fn sign_up<'a>(&'a self, request: &'a SignUpRequest) -> TransportFuture<'a, AuthResponse> {
        Box::pin(async move {
            let mut accounts = self.accounts.lock().expect("accounts lock");
            if accounts.iter().any(|account| account.email == request.email) {
                return Err(Self::rejected(400, "Email already registered"));
            }

            let identity = Identity {
                id: accounts.len() as i64 + 1,
                username: request.username.clone(),
                email: request.email.clone(),
            };
            let token = format!("token-{}", request.username);
            accounts.push(Account {
                email: request.email.clone(),
                password: request.password.clone(),
                token: token.clone(),
                identity: identity.clone(),
                revoked: false,
            });

            Ok(AuthResponse {
                access_token: token,
                token_type: Some("bearer".to_string()),
                user: identity,
            })
        })
    }

    fn sign_in<'a>(&'a self, form: &'a SignInForm) -> TransportFuture<'a, AuthResponse> {
        Box::pin(async move {
            self.sign_in_calls.fetch_add(1, Ordering::SeqCst);
            let gate = self.sign_in_gate.lock().expect("gate lock").clone();
            if let Some(gate) = gate {
                gate.notified().await;
            }

            let accounts = self.accounts.lock().expect("accounts lock");
            accounts
                .iter()
                .find(|account| account.email == form.username && account.password == form.password)
                .map(|account| AuthResponse {
                    access_token: account.token.clone(),
                    token_type: Some("bearer".to_string()),
                    user: account.identity.clone(),
                })
                .ok_or_else(|| Self::rejected(401, "Incorrect email or password"))
        })
    }

    fn current_identity<'a>(
        &'a self,
        credential: &'a Credential,
    ) -> TransportFuture<'a, Identity> {
        Box::pin(async move {
            self.identity_calls.fetch_add(1, Ordering::SeqCst);
            let gate = self.identity_gate.lock().expect("gate lock").clone();
            if let Some(gate) = gate {
                gate.notified().await;
            }

            let accounts = self.accounts.lock().expect("accounts lock");
            accounts
                .iter()
                .find(|account| account.token == credential.as_str() && !account.revoked)
                .map(|account| account.identity.clone())
                .ok_or_else(|| Self::rejected(401, "Could not validate credentials"))
        })
    }
}

/// One scripted classifier reply.
pub struct Scripted {
    gate: Option<Arc<Notify>>,
    reply: Option<Result<String, TransportError>>,
}

impl Scripted {
    pub fn ok(body: String) -> Self {
        Self {
            gate: None,
            reply: Some(Ok(body)),
        }
    }

    pub fn err(error: TransportError) -> Self {
        Self {
            gate: None,
            reply: Some(Err(error)),
        }
    }

    /// Reply that waits for `gate` before resolving.
    pub fn gated(gate: Arc<Notify>, body: String) -> Self {
        Self {
            gate: Some(gate),
            reply: Some(Ok(body)),
        }
    }

    /// Reply that never resolves.
    pub fn hang() -> Self {
        Self {
            gate: None,
            reply: None,
        }
    }
}

/// Classifier replaying scripted replies in call order.
#[derive(Default)]
pub struct ScriptedClassifier {
    script: Mutex<VecDeque<Scripted>>,
    pub calls: AtomicUsize,
    pub seen_credentials: Mutex<Vec<Option<String>>>,
}

impl ScriptedClassifier {
    pub fn new(replies: impl IntoIterator<Item = Scripted>) -> Self {
        Self {
            script: Mutex::new(replies.into_iter().collect()),
            ..Self::default()
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ClassifierTransport for ScriptedClassifier {
    fn classify<'a>(
        &'a self,
        _image: &'a ImageFile,
        credential: Option<&'a Credential>,
    ) -> TransportFuture<'a, String> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen_credentials
                .lock()
                .expect("credentials lock")
                .push(credential.map(|credential| credential.as_str().to_string()));
            let next = self.script.lock().expect("script lock").pop_front();
            let Some(scripted) = next else {
                return Err(TransportError::Unreachable("no scripted reply".to_string()));
            };

            if let Some(gate) = scripted.gate {
                gate.notified().await;
            }
            match scripted.reply {
                Some(reply) => reply,
                None => std::future::pending().await,
            }
        })
    }
}
