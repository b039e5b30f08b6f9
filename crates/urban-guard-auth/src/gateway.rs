//! Auth gateway: sign-up, sign-in, sign-out, and startup restoration.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};
use urban_guard_core::{Credential, Identity, Session, TransportFuture};

use crate::session::{AuthTicket, CheckTicket, InstallError, SessionStore};
use crate::storage::TokenStorage;
use crate::{AuthError, AuthResponse, BootstrapError, IdentityTransport, SignInForm, SignUpRequest};

/// Upper bound for one identity-service call.
pub const DEFAULT_AUTH_TIMEOUT: Duration = Duration::from_secs(30);

/// Auth client that drives the session store from identity-service calls.
#[derive(Clone)]
pub struct AuthGateway {
    transport: Arc<dyn IdentityTransport>,
    session: SessionStore,
    timeout: Duration,
}

impl AuthGateway {
    /// Creates a gateway owning a fresh session store backed by `storage`.
    pub fn new(transport: Arc<dyn IdentityTransport>, storage: Arc<dyn TokenStorage>) -> Self {
        Self {
            transport,
            session: SessionStore::new(storage),
            timeout: DEFAULT_AUTH_TIMEOUT,
        }
    }

    /// Overrides the per-call timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Returns the session store driven by this gateway.
    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    /// Restores the persisted session, once per process.
    ///
    /// Never fails: an absent, unreadable, expired, or unverifiable token
    /// ends in the signed-out state with the stored token removed. Later
    /// calls return the current snapshot without contacting the service.
    pub async fn initialize(&self) -> Session {
        let Some(ticket) = self.session.begin_bootstrap() else {
            return self.session.snapshot();
        };

        match self.session.load_stored() {
            Ok(None) => {
                self.session.reset_after_failed_check(ticket, None);
                info!(stage = "bootstrap", action = "no_token", "starting signed out");
            }
            Ok(Some(credential)) => {
                if let Err(error) = self.resolve_identity(ticket, credential).await {
                    warn!(stage = "bootstrap", action = "restore_failed", %error, "returned to signed-out state");
                }
            }
            Err(error) => {
                self.session.reset_after_failed_check(ticket, None);
                warn!(stage = "bootstrap", action = "read_token", %error, "stored token unreadable");
            }
        }

        self.session.snapshot()
    }

    /// Fetches the identity behind the installed (or stored) credential.
    ///
    /// # Errors
    /// Returns [`BootstrapError`] on any failure; the installed credential,
    /// the stored token, and the identity are all cleared before returning.
    /// When a sign-out, a successful sign-in, or a newer check superseded
    /// this call, only the stored token is removed, and only while it still
    /// equals the rejected one.
    pub async fn fetch_current_identity(&self) -> Result<Identity, BootstrapError> {
        let (ticket, installed) = self.session.begin_refresh();
        let credential = match installed {
            Some(credential) => credential,
            None => match self.session.load_stored() {
                Ok(Some(credential)) => credential,
                Ok(None) => {
                    self.session.reset_after_failed_check(ticket, None);
                    return Err(BootstrapError::NoStoredCredential);
                }
                Err(error) => {
                    self.session.reset_after_failed_check(ticket, None);
                    return Err(BootstrapError::Storage(error));
                }
            },
        };

        self.resolve_identity(ticket, credential).await
    }

    /// Registers a new account and signs it in.
    ///
    /// # Errors
    /// Returns [`AuthError::EmptyCredential`] for blank fields without a
    /// network call, and the transport, contract, timeout, storage, or
    /// supersession error otherwise. The session is left untouched on error.
    pub async fn sign_up(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<Identity, AuthError> {
        if username.trim().is_empty() || email.trim().is_empty() || password.is_empty() {
            return Err(AuthError::EmptyCredential);
        }

        let request = SignUpRequest {
            username: username.trim().to_string(),
            email: email.trim().to_string(),
            password: password.to_string(),
        };

        let ticket = self.session.begin_auth();
        info!(stage = "auth", action = "sign_up_attempt", username_len = request.username.len());
        let outcome = self.bounded_auth(self.transport.sign_up(&request)).await;
        self.complete_auth(ticket, outcome, "sign_up")
    }

    /// Signs in with email and password.
    ///
    /// # Errors
    /// Same as [`AuthGateway::sign_up`].
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Identity, AuthError> {
        if email.trim().is_empty() || password.is_empty() {
            return Err(AuthError::EmptyCredential);
        }

        let form = SignInForm {
            username: email.trim().to_string(),
            password: password.to_string(),
        };

        let ticket = self.session.begin_auth();
        info!(stage = "auth", action = "sign_in_attempt", email_len = form.username.len());
        let outcome = self.bounded_auth(self.transport.sign_in(&form)).await;
        self.complete_auth(ticket, outcome, "sign_in")
    }

    /// Ends the session. Synchronous, infallible, idempotent.
    pub fn sign_out(&self) {
        self.session.sign_out();
        info!(stage = "auth", action = "sign_out", "signed out");
    }

    async fn resolve_identity(
        &self,
        ticket: CheckTicket,
        credential: Credential,
    ) -> Result<Identity, BootstrapError> {
        let outcome = match tokio::time::timeout(
            self.timeout,
            self.transport.current_identity(&credential),
        )
        .await
        {
            Ok(result) => result.map_err(BootstrapError::from),
            Err(_) => Err(BootstrapError::Timeout(self.timeout)),
        };

        match outcome {
            Ok(identity) => match self.session.install_checked(ticket, credential, identity.clone()) {
                Ok(()) => {
                    info!(stage = "bootstrap", action = "restored", user_id = identity.id);
                    Ok(identity)
                }
                Err(InstallError::Superseded) => Err(BootstrapError::Superseded),
                Err(InstallError::Storage(error)) => Err(BootstrapError::Storage(error)),
            },
            Err(error) => {
                if self.session.reset_after_failed_check(ticket, Some(&credential)) {
                    Err(error)
                } else {
                    Err(BootstrapError::Superseded)
                }
            }
        }
    }

    async fn bounded_auth(
        &self,
        call: TransportFuture<'_, AuthResponse>,
    ) -> Result<AuthResponse, AuthError> {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result.map_err(AuthError::from),
            Err(_) => Err(AuthError::Timeout(self.timeout)),
        }
    }

    fn complete_auth(
        &self,
        ticket: AuthTicket,
        outcome: Result<AuthResponse, AuthError>,
        action: &'static str,
    ) -> Result<Identity, AuthError> {
        let accepted = outcome.and_then(accept_auth_response);
        let result = match accepted {
            Ok((credential, identity)) => {
                match self.session.install_auth(ticket, credential, identity.clone()) {
                    Ok(()) => Ok(identity),
                    Err(InstallError::Superseded) => Err(AuthError::Superseded),
                    Err(InstallError::Storage(error)) => Err(AuthError::Storage(error)),
                }
            }
            Err(error) => {
                if self.session.settle_auth(ticket) {
                    Err(error)
                } else {
                    Err(AuthError::Superseded)
                }
            }
        };

        match &result {
            Ok(identity) => info!(stage = "auth", action, user_id = identity.id, "session established"),
            Err(error) => warn!(stage = "auth", action, %error, "auth request failed"),
        }
        result
    }
}

impl std::fmt::Debug for AuthGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthGateway")
            .field("session", &self.session)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

fn accept_auth_response(response: AuthResponse) -> Result<(Credential, Identity), AuthError> {
    if let Some(token_type) = response.token_type.as_deref()
        && !token_type.trim().eq_ignore_ascii_case("bearer")
    {
        return Err(AuthError::InvalidResponse(format!(
            "unsupported token type '{token_type}'"
        )));
    }

    let credential = Credential::new(response.access_token).map_err(|_| {
        AuthError::InvalidResponse("response missing access token".to_string())
    })?;
    Ok((credential, response.user))
}

