#![warn(missing_docs)]
//! # urban-guard-core
//!
//! ## Purpose
//! Defines the pure data model shared across the `urban-guard` workspace.
//!
//! ## Responsibilities
//! - Represent identities, bearer credentials, and derived session snapshots.
//! - Represent image files picked for classification and their previews.
//! - Represent classification outcomes and their percentage display form.
//! - Provide the transport error vocabulary used by every remote call.
//!
//! ## Data flow
//! The auth layer produces [`Identity`] + [`Credential`] pairs and publishes
//! [`Session`] snapshots. The upload layer takes an [`ImageFile`], reads the
//! current credential through [`CredentialSource`], and stores the returned
//! [`DetectionResult`].
//!
//! ## Ownership and lifetimes
//! All values own their buffers (`String`, `Vec<u8>`) so snapshots can cross
//! task boundaries without borrowing from network buffers or UI state.
//!
//! ## Error model
//! Construction and parsing failures return [`CoreError`]. Remote call
//! failures are described by [`TransportError`].
//!
//! ## Security and privacy notes
//! [`Credential`] never prints its token through `Debug`, and [`ImageFile`]
//! prints only its byte length.
//!
//! ## Example
//! ```rust
//! use urban_guard_core::{format_confidence_percent, parse_confidence_percent};
//!
//! let label = format_confidence_percent(0.873);
//! assert_eq!(label, "87.3%");
//! assert_eq!(format_confidence_percent(parse_confidence_percent(&label).unwrap()), label);
//! ```

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

/// Fixed storage key under which the bearer token is persisted.
pub const TOKEN_STORAGE_KEY: &str = "token";

/// Media type family accepted for classification uploads.
pub const IMAGE_MEDIA_PREFIX: &str = "image/";

/// Boxed future returned by remote transports.
///
/// Boxing keeps transport traits object-safe so callers can hold
/// `Arc<dyn ...>` implementations.
pub type TransportFuture<'a, T> =
    Pin<Box<dyn Future<Output = Result<T, TransportError>> + Send + 'a>>;

/// User profile returned by the identity service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Server-assigned account id.
    pub id: i64,
    /// Display name chosen at sign-up.
    pub username: String,
    /// Account email, also used as the sign-in name.
    pub email: String,
}

/// Opaque bearer token identifying an authenticated session.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Wraps a bearer token.
    ///
    /// # Errors
    /// Returns [`CoreError::EmptyCredential`] when the token is blank.
    pub fn new(token: impl Into<String>) -> Result<Self, CoreError> {
        let token = token.into();
        let trimmed = token.trim();
        if trimmed.is_empty() {
            return Err(CoreError::EmptyCredential);
        }

        Ok(Self(trimmed.to_string()))
    }

    /// Returns raw token text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the `Authorization` header value for this token.
    pub fn bearer_header_value(&self) -> String {
        format!("Bearer {}", self.0)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Credential").field(&"<redacted>").finish()
    }
}

/// Read-only access to the credential currently installed in a session.
///
/// Outbound calls attach the credential per request through this trait
/// instead of mutating shared client configuration.
pub trait CredentialSource: Send + Sync {
    /// Returns the installed credential, if any.
    fn current_credential(&self) -> Option<Credential>;
}

/// Credential source for callers that never authenticate.
#[derive(Debug, Clone, Copy, Default)]
pub struct Anonymous;

impl CredentialSource for Anonymous {
    fn current_credential(&self) -> Option<Credential> {
        None
    }
}

/// Derived session view published to observers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// Signed-in identity, if any.
    pub identity: Option<Identity>,
    /// `true` during bootstrap and in-flight sign-in/sign-up calls.
    pub loading: bool,
}

impl Session {
    /// Snapshot at process start, before the stored credential is checked.
    pub fn bootstrapping() -> Self {
        Self {
            identity: None,
            loading: true,
        }
    }

    /// Settled signed-out snapshot.
    pub fn signed_out() -> Self {
        Self {
            identity: None,
            loading: false,
        }
    }

    /// Returns `true` when an identity is present.
    pub fn is_authenticated(&self) -> bool {
        self.identity.is_some()
    }

    /// Returns the signed-in username.
    pub fn username(&self) -> Option<&str> {
        self.identity.as_ref().map(|identity| identity.username.as_str())
    }
}

/// Validated base URL shared by the identity and classification services.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiBase(Url);

impl ApiBase {
    /// Parses and validates a service base URL.
    ///
    /// # Errors
    /// Returns [`CoreError::InvalidBaseUrl`] when the URL does not parse, is
    /// not `http`/`https`, or carries a query or fragment.
    pub fn parse(raw: &str) -> Result<Self, CoreError> {
        let url = Url::parse(raw.trim())
            .map_err(|error| CoreError::InvalidBaseUrl(format!("invalid url: {error}")))?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(CoreError::InvalidBaseUrl(
                "base url must use http or https".to_string(),
            ));
        }

        if url.query().is_some() || url.fragment().is_some() {
            return Err(CoreError::InvalidBaseUrl(
                "base url must not carry a query or fragment".to_string(),
            ));
        }

        Ok(Self(url))
    }

    /// Joins an endpoint path onto the base, keeping any base path prefix.
    pub fn endpoint(&self, path: &str) -> Url {
        let mut url = self.0.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty();
            segments.extend(path.split('/').filter(|segment| !segment.is_empty()));
        }
        url
    }

    /// Returns the underlying URL.
    pub fn as_url(&self) -> &Url {
        &self.0
    }
}

impl fmt::Display for ApiBase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0.as_str())
    }
}

/// Image file chosen for classification.
#[derive(Clone, PartialEq, Eq)]
pub struct ImageFile {
    /// Original file name.
    pub name: String,
    /// Declared media type, for example `image/jpeg`.
    pub mime_type: String,
    /// Raw file bytes.
    pub bytes: Vec<u8>,
}

impl ImageFile {
    /// Creates a file blob with its declared media type.
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            bytes,
        }
    }

    /// Returns `true` when the declared media type is in the `image/` family.
    pub fn is_image(&self) -> bool {
        is_image_media_type(&self.mime_type)
    }

    /// Returns byte length.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Returns `true` when the file has no bytes.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Encodes the file as a `data:` URI for preview display.
    pub fn preview_data_uri(&self) -> String {
        encode_data_uri(&self.mime_type, &self.bytes)
    }
}

impl fmt::Debug for ImageFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageFile")
            .field("name", &self.name)
            .field("mime_type", &self.mime_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Returns `true` when `mime_type` starts with `image/` (case-insensitive).
pub fn is_image_media_type(mime_type: &str) -> bool {
    let mime_type = mime_type.trim();
    mime_type
        .get(..IMAGE_MEDIA_PREFIX.len())
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case(IMAGE_MEDIA_PREFIX))
}

/// Encodes bytes as a base64 `data:` URI.
pub fn encode_data_uri(mime_type: &str, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", mime_type.trim(), STANDARD.encode(bytes))
}

/// Signage classification label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Prediction {
    /// Signage looks properly authorized.
    Authorized,
    /// Signage looks unauthorized or non-compliant.
    Unauthorized,
}

impl Prediction {
    /// Wire label of the prediction.
    pub fn as_str(self) -> &'static str {
        match self {
            Prediction::Authorized => "authorized",
            Prediction::Unauthorized => "unauthorized",
        }
    }
}

impl fmt::Display for Prediction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classification outcome returned by the remote signage classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionResult {
    /// Predicted label.
    pub prediction: Prediction,
    /// Confidence in [0.0, 1.0].
    pub confidence: f64,
    /// Human-readable explanation from the service.
    pub message: String,
}

impl DetectionResult {
    /// Confidence formatted for display, for example `87.3%`.
    pub fn confidence_label(&self) -> String {
        format_confidence_percent(self.confidence)
    }
}

/// Formats a [0, 1] confidence as a one-decimal percentage.
pub fn format_confidence_percent(confidence: f64) -> String {
    format!("{:.1}%", confidence * 100.0)
}

/// Decodes a percentage label produced by [`format_confidence_percent`].
///
/// # Errors
/// Returns [`CoreError::InvalidConfidence`] when the label is not a number in
/// `0..=100` optionally followed by `%`.
pub fn parse_confidence_percent(label: &str) -> Result<f64, CoreError> {
    let trimmed = label.trim();
    let digits = trimmed.strip_suffix('%').unwrap_or(trimmed).trim_end();
    let percent: f64 = digits
        .parse()
        .map_err(|_| CoreError::InvalidConfidence(trimmed.to_string()))?;

    if !percent.is_finite() || !(0.0..=100.0).contains(&percent) {
        return Err(CoreError::InvalidConfidence(trimmed.to_string()));
    }

    Ok(percent / 100.0)
}

/// Failure of a remote call, independent of which service was called.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Request never produced a response (DNS, connect, TLS, reset).
    #[error("service unreachable: {0}")]
    Unreachable(String),
    /// Service answered with a non-success status.
    #[error("service responded with status {status}: {reason}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Reason extracted from the error body.
        reason: String,
    },
    /// Response body could not be decoded.
    #[error("undecodable response: {0}")]
    Decode(String),
}

impl TransportError {
    /// Returns `true` when repeating the same request could succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            TransportError::Unreachable(_) => true,
            TransportError::Status { status, .. } => {
                *status >= 500 || *status == 408 || *status == 429
            }
            TransportError::Decode(_) => false,
        }
    }
}

/// Error type for core model validation.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Credential token was blank.
    #[error("credential token is empty")]
    EmptyCredential,
    /// Base URL violated service requirements.
    #[error("invalid base url: {0}")]
    InvalidBaseUrl(String),
    /// Confidence label could not be decoded.
    #[error("invalid confidence label: {0}")]
    InvalidConfidence(String),
}

#[cfg(test)]
mod tests {
    //! Unit tests for core model helpers.

    use super::*;

    #[test]
    fn confidence_label_round_trips_display_value() {
        for confidence in [0.0, 0.05, 0.5, 0.873, 0.92, 0.9999, 1.0] {
            let label = format_confidence_percent(confidence);
            let decoded = parse_confidence_percent(&label).expect("label should decode");
            assert_eq!(format_confidence_percent(decoded), label);
        }
        assert_eq!(format_confidence_percent(0.873), "87.3%");
        assert!(parse_confidence_percent("140%").is_err());
        assert!(parse_confidence_percent("high").is_err());
    }

    #[test]
    fn image_media_type_filter_is_prefix_based() {
        assert!(is_image_media_type("image/jpeg"));
        assert!(is_image_media_type("IMAGE/PNG"));
        assert!(!is_image_media_type("application/pdf"));
        assert!(!is_image_media_type("imag"));
        assert!(!is_image_media_type(""));
    }

    #[test]
    fn credential_debug_hides_token() {
        let credential = Credential::new(" secret-token ").expect("token should be valid");
        assert_eq!(credential.as_str(), "secret-token");
        assert_eq!(credential.bearer_header_value(), "Bearer secret-token");
        assert!(!format!("{credential:?}").contains("secret"));
        assert!(Credential::new("   ").is_err());
    }

    #[test]
    fn api_base_keeps_path_prefix() {
        let base = ApiBase::parse("https://example.test/api/").expect("base should parse");
        assert_eq!(
            base.endpoint("/auth/signin").as_str(),
            "https://example.test/api/auth/signin"
        );

        let root = ApiBase::parse("http://localhost:8000").expect("base should parse");
        assert_eq!(
            root.endpoint("users/me").as_str(),
            "http://localhost:8000/users/me"
        );

        assert!(ApiBase::parse("ftp://example.test").is_err());
        assert!(ApiBase::parse("https://example.test/?debug=1").is_err());
    }

    #[test]
    fn preview_is_base64_data_uri() {
        let file = ImageFile::new("sign.png", "image/png", vec![0x89, b'P', b'N', b'G']);
        assert_eq!(file.preview_data_uri(), "data:image/png;base64,iVBORw==");
    }

    #[test]
    fn prediction_uses_lowercase_wire_labels() {
        let parsed: Prediction =
            serde_json::from_str("\"unauthorized\"").expect("label should parse");
        assert_eq!(parsed, Prediction::Unauthorized);
        assert_eq!(Prediction::Authorized.to_string(), "authorized");
    }

    #[test]
    fn transient_statuses_are_detected() {
        assert!(TransportError::Unreachable("reset".to_string()).is_transient());
        assert!(
            TransportError::Status {
                status: 503,
                reason: "busy".to_string()
            }
            .is_transient()
        );
        assert!(
            !TransportError::Status {
                status: 401,
                reason: "nope".to_string()
            }
            .is_transient()
        );
    }
}
