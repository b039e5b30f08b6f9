#![warn(missing_docs)]
//! # urban-guard-auth
//!
//! ## Purpose
//! Implements the session store and the auth gateway for `urban-guard`.
//!
//! ## Responsibilities
//! - Persist the bearer token under a fixed storage key.
//! - Restore a session at startup through `GET /users/me`.
//! - Execute sign-up, sign-in, and sign-out through an injectable transport.
//! - Publish session snapshots to subscribers.
//!
//! ## Data flow
//! UI collects credentials -> [`AuthGateway::sign_in`] sends a form through
//! [`IdentityTransport`] -> receives [`AuthResponse`] -> [`SessionStore`]
//! persists the token and installs token + identity in one step -> observers
//! receive a new [`Session`](urban_guard_core::Session).
//!
//! ## Ownership and lifetimes
//! The session store owns identity and credential for the process lifetime.
//! Other components read the credential through
//! [`CredentialSource`](urban_guard_core::CredentialSource) and never mutate
//! it.
//!
//! ## Error model
//! Explicit user actions return [`AuthError`]. Startup restoration failures
//! are [`BootstrapError`] values that are recovered locally by returning to
//! the signed-out state.
//!
//! ## Security and privacy notes
//! This crate does not log credentials, passwords, or token values.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use urban_guard_auth::{MemoryTokenStorage, SessionStore};
//!
//! let store = SessionStore::new(Arc::new(MemoryTokenStorage::default()));
//! assert!(store.snapshot().loading);
//! store.sign_out();
//! assert!(!store.snapshot().loading);
//! assert!(!store.snapshot().is_authenticated());
//! ```

mod gateway;
mod session;
mod storage;

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use urban_guard_core::{Credential, Identity, TransportError, TransportFuture};

pub use gateway::{AuthGateway, DEFAULT_AUTH_TIMEOUT};
pub use session::SessionStore;
pub use storage::{FileTokenStorage, MemoryTokenStorage, StorageError, TokenStorage};

/// Sign-up endpoint path.
pub const SIGN_UP_PATH: &str = "/auth/signup";
/// Sign-in endpoint path.
pub const SIGN_IN_PATH: &str = "/auth/signin";
/// Current-identity endpoint path.
pub const CURRENT_USER_PATH: &str = "/users/me";

/// Structured sign-up payload.
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct SignUpRequest {
    /// Requested display name.
    pub username: String,
    /// Account email.
    pub email: String,
    /// Account password.
    pub password: String,
}

impl fmt::Debug for SignUpRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignUpRequest")
            .field("username", &self.username)
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Form-encoded sign-in payload.
///
/// The identity service reads the email from the `username` form field.
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct SignInForm {
    /// Account email sent under the `username` field name.
    pub username: String,
    /// Account password.
    pub password: String,
}

impl fmt::Debug for SignInForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignInForm")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Response returned by sign-up and sign-in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthResponse {
    /// Bearer token for protected calls.
    pub access_token: String,
    /// Token scheme, `bearer` when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
    /// Signed-in identity.
    pub user: Identity,
}

/// Abstract transport to the identity service.
///
/// Implementations attach the credential passed to each call; no default
/// authorization state is shared between calls.
pub trait IdentityTransport: Send + Sync {
    /// Sends `POST /auth/signup` with a JSON body.
    fn sign_up<'a>(&'a self, request: &'a SignUpRequest) -> TransportFuture<'a, AuthResponse>;

    /// Sends `POST /auth/signin` with a form-encoded body.
    fn sign_in<'a>(&'a self, form: &'a SignInForm) -> TransportFuture<'a, AuthResponse>;

    /// Sends `GET /users/me` authorized with `credential`.
    fn current_identity<'a>(&'a self, credential: &'a Credential)
    -> TransportFuture<'a, Identity>;
}

/// Errors returned by explicit sign-up/sign-in actions.
#[derive(Debug, Error)]
pub enum AuthError {
    /// A required field was blank.
    #[error("email and password must be non-empty")]
    EmptyCredential,
    /// Service rejected the credentials.
    #[error("credentials rejected ({status}): {reason}")]
    Rejected {
        /// HTTP status code.
        status: u16,
        /// Server-provided reason.
        reason: String,
    },
    /// Service rejected the payload shape.
    #[error("validation failed: {0}")]
    Validation(String),
    /// Service could not be reached.
    #[error("auth transport failure: {0}")]
    Transport(String),
    /// Response payload violated auth contract expectations.
    #[error("invalid auth response: {0}")]
    InvalidResponse(String),
    /// No response within the configured bound.
    #[error("auth request timed out after {0:?}")]
    Timeout(Duration),
    /// Token could not be persisted.
    #[error("token storage failure: {0}")]
    Storage(#[from] StorageError),
    /// A newer auth action or sign-out replaced this one.
    #[error("auth request superseded by a newer session change")]
    Superseded,
}

impl From<TransportError> for AuthError {
    fn from(error: TransportError) -> Self {
        match error {
            TransportError::Unreachable(reason) => AuthError::Transport(reason),
            TransportError::Status { status: 422, reason } => AuthError::Validation(reason),
            TransportError::Status { status, reason } => AuthError::Rejected { status, reason },
            TransportError::Decode(reason) => AuthError::InvalidResponse(reason),
        }
    }
}

/// Reasons a stored session could not be restored.
#[derive(Debug, Error)]
pub enum BootstrapError {
    /// No token was stored.
    #[error("no stored credential")]
    NoStoredCredential,
    /// Stored token was rejected (expired or revoked).
    #[error("stored credential rejected ({status}): {reason}")]
    Rejected {
        /// HTTP status code.
        status: u16,
        /// Server-provided reason.
        reason: String,
    },
    /// Service could not be reached.
    #[error("identity service unreachable: {0}")]
    Transport(String),
    /// Identity payload could not be decoded.
    #[error("invalid identity response: {0}")]
    InvalidResponse(String),
    /// No response within the configured bound.
    #[error("identity request timed out after {0:?}")]
    Timeout(Duration),
    /// Stored token could not be read.
    #[error("token storage failure: {0}")]
    Storage(#[from] StorageError),
    /// A newer auth action or sign-out replaced this one.
    #[error("identity request superseded by a newer session change")]
    Superseded,
}

impl From<TransportError> for BootstrapError {
    fn from(error: TransportError) -> Self {
        match error {
            TransportError::Unreachable(reason) => BootstrapError::Transport(reason),
            TransportError::Status { status, reason } => BootstrapError::Rejected { status, reason },
            TransportError::Decode(reason) => BootstrapError::InvalidResponse(reason),
        }
    }
}
