#![warn(missing_docs)]
//! # urban-guard-app
//!
//! ## Purpose
//! Wires configuration, HTTP transports, session, and upload workflow into
//! one client for `urban-guard`.
//!
//! ## Responsibilities
//! - Read [`ClientConfig`] from the environment.
//! - Build reqwest transports that attach credentials per request.
//! - Own the [`AuthGateway`] and the [`UploadController`] for one user
//!   session and tear the upload state down on sign-out.
//! - Project both into a [`DashboardView`].
//! - Initialise tracing and redact secrets in free-form log text.
//!
//! ## Data flow
//! Env -> [`ClientConfig`] -> [`UrbanGuardClient::from_config`] ->
//! bootstrap -> sign-in -> select/submit -> dashboard projection.
//!
//! ## Ownership and lifetimes
//! The client owns both controllers. The upload controller reads credentials
//! through a cloned [`SessionStore`](urban_guard_auth::SessionStore) handle
//! and never writes session state.
//!
//! ## Error model
//! Subsystem failures are wrapped in [`AppError`] for callers that want a
//! single error type.
//!
//! ## Security and privacy notes
//! - Tokens are attached per request, never stored in shared client config.
//! - Error bodies pass through [`redact_sensitive`] before being logged.

mod config;
mod http;
mod logging;

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use urban_guard_auth::{AuthError, AuthGateway, IdentityTransport, TokenStorage};
use urban_guard_ui::DashboardView;
use urban_guard_upload::{ClassificationError, ClassifierTransport, UploadController};

pub use config::{
    API_URL_VAR, ClientConfig, ConfigError, DATA_DIR_VAR, DEFAULT_API_URL, DEFAULT_LOG_FILTER,
    DEFAULT_TIMEOUT_SECS, LOG_VAR, TIMEOUT_VAR,
};
pub use http::{HttpClassifierTransport, HttpIdentityTransport};
pub use logging::{LoggingError, init_tracing, redact_sensitive};

/// Build-time application version loaded from root `VERSION` file.
pub const APP_VERSION: &str = env!("URBAN_GUARD_VERSION");

/// Returns the app version sourced from root `VERSION`.
pub fn app_version() -> &'static str {
    APP_VERSION
}

/// Session and upload workflow for one client process.
#[derive(Debug, Clone)]
pub struct UrbanGuardClient {
    auth: AuthGateway,
    uploads: UploadController,
}

impl UrbanGuardClient {
    /// Builds HTTP transports and file token storage from `config`.
    ///
    /// # Errors
    /// Returns [`AppError::HttpClient`] when the HTTP client cannot be built.
    pub fn from_config(config: &ClientConfig) -> Result<Self, AppError> {
        // Whole-call bounds live in the gateway and the upload controller.
        let client = reqwest::Client::builder()
            .connect_timeout(config.request_timeout)
            .user_agent(format!("urban-guard/{APP_VERSION}"))
            .build()
            .map_err(AppError::HttpClient)?;

        Ok(Self::with_transports(
            Arc::new(HttpIdentityTransport::new(
                client.clone(),
                config.api_base.clone(),
            )),
            Arc::new(HttpClassifierTransport::new(client, config.api_base.clone())),
            Arc::new(config.token_storage()),
            config.request_timeout,
        ))
    }

    /// Builds a client over arbitrary transports and storage.
    pub fn with_transports(
        identity: Arc<dyn IdentityTransport>,
        classifier: Arc<dyn ClassifierTransport>,
        storage: Arc<dyn TokenStorage>,
        timeout: Duration,
    ) -> Self {
        let auth = AuthGateway::new(identity, storage).with_timeout(timeout);
        let uploads =
            UploadController::with_timeout(classifier, Arc::new(auth.session().clone()), timeout);
        Self { auth, uploads }
    }

    /// Auth gateway and session store.
    pub fn auth(&self) -> &AuthGateway {
        &self.auth
    }

    /// Upload workflow.
    pub fn uploads(&self) -> &UploadController {
        &self.uploads
    }

    /// Signs out and discards the upload state of the previous user.
    pub fn sign_out(&self) {
        self.auth.sign_out();
        self.uploads.clear();
    }

    /// Projects current session and upload state.
    pub fn dashboard(&self) -> DashboardView {
        DashboardView::project(
            APP_VERSION,
            &self.auth.session().snapshot(),
            &self.uploads.snapshot(),
        )
    }
}

/// App integration error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// Configuration error.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    /// HTTP client construction failed.
    #[error("http client error: {0}")]
    HttpClient(reqwest::Error),
    /// Logging could not be initialised.
    #[error("logging error: {0}")]
    Logging(#[from] LoggingError),
    /// Auth subsystem error.
    #[error("auth error: {0}")]
    Auth(#[from] AuthError),
    /// Classification error.
    #[error("classification error: {0}")]
    Classification(#[from] ClassificationError),
}
