#![warn(missing_docs)]
//! # urban-guard-upload
//!
//! ## Purpose
//! Drives one image-classification request: intake, validation, preview,
//! submission, and result/error capture.
//!
//! ## Responsibilities
//! - Filter picked or dropped files to the `image/` media family.
//! - Derive a `data:` URI preview off the async executor.
//! - Submit the selected image through an injectable [`ClassifierTransport`].
//! - Fence completions by request id so late responses never overwrite
//!   newer state.
//! - Classify failures as retriable or permanent for the presentation layer.
//!
//! ## Data flow
//! Picker/drop -> [`UploadController::select_file`] -> preview task ->
//! [`UploadController::submit`] -> transport -> response parsing ->
//! [`UploadState`] published to subscribers.
//!
//! ## Ownership and lifetimes
//! The controller owns the selected bytes behind an `Arc` so an in-flight
//! submission and a newer selection never share mutable state. Published
//! [`UploadState`] snapshots carry only a summary of the file.
//!
//! ## Error model
//! Unsupported files are reported as [`SelectionOutcome::Ignored`], never as
//! errors. Submission failures are recorded in [`UploadState::error`] and
//! returned as [`ClassificationError`]. The controller never retries.
//!
//! ## Security and privacy notes
//! Image bytes and credentials are never logged; logs carry the SHA-256
//! fingerprint and byte length only.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info, warn};
use urban_guard_analysis_contract::{AnalysisContractError, parse_detection_response};
use urban_guard_core::{
    Credential, CredentialSource, DetectionResult, ImageFile, TransportError, TransportFuture,
};

/// Classification endpoint path.
pub const DETECT_PATH: &str = "/detect-signage";

/// Multipart field carrying the image.
pub const IMAGE_FIELD: &str = "file";

/// Upper bound for one classification call.
pub const DEFAULT_CLASSIFY_TIMEOUT: Duration = Duration::from_secs(30);

/// Abstract transport to the classification service.
pub trait ClassifierTransport: Send + Sync {
    /// Sends `image` as a single-part multipart body and returns the raw
    /// response text. `credential` is attached as a bearer token when given.
    fn classify<'a>(
        &'a self,
        image: &'a ImageFile,
        credential: Option<&'a Credential>,
    ) -> TransportFuture<'a, String>;
}

/// Where a selection came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionSource {
    /// Explicit file chooser.
    Picker,
    /// Drag-and-drop.
    Drop,
}

/// Display-safe summary of the selected file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedImage {
    /// Original file name.
    pub name: String,
    /// Declared media type.
    pub mime_type: String,
    /// File size in bytes.
    pub size_bytes: usize,
    /// Hex SHA-256 of the file bytes.
    pub fingerprint: String,
}

impl SelectedImage {
    fn describe(file: &ImageFile) -> Self {
        Self {
            name: file.name.clone(),
            mime_type: file.mime_type.clone(),
            size_bytes: file.len(),
            fingerprint: image_fingerprint(file),
        }
    }
}

/// Whether resubmitting the same image could succeed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// Network, timeout, or transient server condition.
    Retriable,
    /// The service will keep refusing this request.
    Permanent,
}

/// Failure recorded in [`UploadState`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFailure {
    /// Retry hint for the presentation layer.
    pub class: FailureClass,
    /// Human-readable failure text.
    pub message: String,
}

impl From<&ClassificationError> for UploadFailure {
    fn from(error: &ClassificationError) -> Self {
        Self {
            class: classify_failure(error),
            message: error.to_string(),
        }
    }
}

/// Observable state of the upload workflow.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct UploadState {
    /// Currently selected file.
    pub selected_file: Option<SelectedImage>,
    /// `data:` URI preview once derived.
    pub preview_data_uri: Option<String>,
    /// `true` while a submission is in flight.
    pub pending: bool,
    /// Last applied classification result.
    pub result: Option<DetectionResult>,
    /// Last submission failure.
    pub error: Option<UploadFailure>,
}

impl UploadState {
    /// Returns `true` when a submission would be sent.
    pub fn can_submit(&self) -> bool {
        self.selected_file.is_some() && !self.pending
    }
}

/// Reasons a selection was ignored.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UploadValidationError {
    /// Declared media type is outside the `image/` family.
    #[error("unsupported media type '{0}'")]
    UnsupportedMediaType(String),
    /// A drop carried no files.
    #[error("no file dropped")]
    NoFileDropped,
}

/// Result of a selection attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionOutcome {
    /// File replaced the previous selection.
    Accepted(SelectedImage),
    /// Selection left unchanged.
    Ignored(UploadValidationError),
}

/// Result of a submission that did not fail.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    /// Result stored in state.
    Applied(DetectionResult),
    /// Nothing selected; nothing sent.
    NoFileSelected,
    /// Another submission is in flight; nothing sent.
    AlreadyPending,
    /// Response arrived after a newer selection, `abandon`, or `clear`, and
    /// was dropped.
    Discarded,
}

/// Classification request failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClassificationError {
    /// Service could not be reached.
    #[error("classification service unreachable: {0}")]
    Transport(String),
    /// Service answered with a non-success status.
    #[error("classification failed with status {status}: {reason}")]
    Server {
        /// HTTP status code.
        status: u16,
        /// Server-provided reason.
        reason: String,
    },
    /// Response body violated the detection contract.
    #[error("malformed classification response: {0}")]
    Malformed(String),
    /// Classifier reported it could not process the image.
    #[error("analysis failed: {0}")]
    ServiceReported(String),
    /// No response within the configured bound.
    #[error("classification timed out after {0:?}")]
    Timeout(Duration),
}

impl From<TransportError> for ClassificationError {
    fn from(error: TransportError) -> Self {
        match error {
            TransportError::Unreachable(reason) => ClassificationError::Transport(reason),
            TransportError::Status { status, reason } => {
                ClassificationError::Server { status, reason }
            }
            TransportError::Decode(reason) => ClassificationError::Malformed(reason),
        }
    }
}

impl From<AnalysisContractError> for ClassificationError {
    fn from(error: AnalysisContractError) -> Self {
        match error {
            AnalysisContractError::ServiceReported(message) => {
                ClassificationError::ServiceReported(message)
            }
            other => ClassificationError::Malformed(other.to_string()),
        }
    }
}

/// Classifies a submission failure for retry hints.
pub fn classify_failure(error: &ClassificationError) -> FailureClass {
    match error {
        ClassificationError::Transport(_) | ClassificationError::Timeout(_) => {
            FailureClass::Retriable
        }
        ClassificationError::Server { status, reason } => {
            let transient = TransportError::Status {
                status: *status,
                reason: reason.clone(),
            }
            .is_transient();
            if transient {
                FailureClass::Retriable
            } else {
                FailureClass::Permanent
            }
        }
        ClassificationError::Malformed(_) | ClassificationError::ServiceReported(_) => {
            FailureClass::Permanent
        }
    }
}

/// Hex SHA-256 of the image bytes.
pub fn image_fingerprint(image: &ImageFile) -> String {
    hex::encode(Sha256::digest(&image.bytes))
}

struct Inner {
    view: UploadState,
    file: Option<Arc<ImageFile>>,
    selection: u64,
    next_request: u64,
    in_flight: Option<u64>,
}

struct Shared {
    inner: Mutex<Inner>,
    transport: Arc<dyn ClassifierTransport>,
    credentials: Arc<dyn CredentialSource>,
    publisher: watch::Sender<UploadState>,
    timeout: Duration,
}

/// Single-writer owner of one [`UploadState`].
///
/// Cloning yields another handle to the same state.
#[derive(Clone)]
pub struct UploadController {
    shared: Arc<Shared>,
}

impl UploadController {
    /// Creates an idle controller.
    pub fn new(
        transport: Arc<dyn ClassifierTransport>,
        credentials: Arc<dyn CredentialSource>,
    ) -> Self {
        Self::with_timeout(transport, credentials, DEFAULT_CLASSIFY_TIMEOUT)
    }

    /// Creates an idle controller with a custom per-call timeout.
    pub fn with_timeout(
        transport: Arc<dyn ClassifierTransport>,
        credentials: Arc<dyn CredentialSource>,
        timeout: Duration,
    ) -> Self {
        let (publisher, _) = watch::channel(UploadState::default());
        Self {
            shared: Arc::new(Shared {
                inner: Mutex::new(Inner {
                    view: UploadState::default(),
                    file: None,
                    selection: 0,
                    next_request: 0,
                    in_flight: None,
                }),
                transport,
                credentials,
                publisher,
                timeout,
            }),
        }
    }

    /// Returns the current state snapshot.
    pub fn snapshot(&self) -> UploadState {
        self.lock().view.clone()
    }

    /// Subscribes to state snapshots.
    pub fn subscribe(&self) -> watch::Receiver<UploadState> {
        self.shared.publisher.subscribe()
    }

    /// Selects a file from the file chooser.
    pub async fn choose_file(&self, file: ImageFile) -> SelectionOutcome {
        self.select_file(file, SelectionSource::Picker).await
    }

    /// Selects the first file of a drag-and-drop.
    pub async fn drop_files(&self, files: Vec<ImageFile>) -> SelectionOutcome {
        match files.into_iter().next() {
            Some(file) => self.select_file(file, SelectionSource::Drop).await,
            None => SelectionOutcome::Ignored(UploadValidationError::NoFileDropped),
        }
    }

    /// Replaces the selection with `file` when it is an image.
    ///
    /// Non-image files leave the state untouched. Accepting a file clears
    /// the previous selection, result and error at once and supersedes any
    /// in-flight submission. The fingerprint and preview are derived on the
    /// blocking pool; if a newer selection or a clear lands meanwhile, this
    /// file is not installed.
    pub async fn select_file(&self, file: ImageFile, source: SelectionSource) -> SelectionOutcome {
        if !file.is_image() {
            debug!(stage = "upload", action = "select_ignored", ?source, mime = %file.mime_type);
            return SelectionOutcome::Ignored(UploadValidationError::UnsupportedMediaType(
                file.mime_type,
            ));
        }

        let file = Arc::new(file);
        let selection = {
            let mut inner = self.lock();
            inner.selection += 1;
            inner.in_flight = None;
            inner.file = None;
            inner.view = UploadState::default();
            self.publish(&inner);
            inner.selection
        };

        let hashed = Arc::clone(&file);
        let (summary, preview) = match tokio::task::spawn_blocking(move || {
            (SelectedImage::describe(&hashed), hashed.preview_data_uri())
        })
        .await
        {
            Ok((summary, preview)) => (summary, Some(preview)),
            Err(error) => {
                warn!(stage = "upload", action = "preview", %error, "preview derivation failed");
                (SelectedImage::describe(&file), None)
            }
        };
        info!(
            stage = "upload",
            action = "select",
            ?source,
            size_bytes = summary.size_bytes,
            fingerprint = %summary.fingerprint
        );

        let mut inner = self.lock();
        if inner.selection == selection {
            inner.file = Some(file);
            inner.view = UploadState {
                selected_file: Some(summary.clone()),
                preview_data_uri: preview,
                ..UploadState::default()
            };
            self.publish(&inner);
        } else {
            debug!(stage = "upload", action = "select_superseded", "newer selection installed first");
        }
        drop(inner);

        SelectionOutcome::Accepted(summary)
    }

    /// Sends the selected image for classification.
    ///
    /// # Errors
    /// Returns [`ClassificationError`] when the call fails; the same failure
    /// is recorded in [`UploadState::error`] and `pending` is cleared.
    pub async fn submit(&self) -> Result<SubmitOutcome, ClassificationError> {
        let (request_id, file) = {
            let mut inner = self.lock();
            let Some(file) = inner.file.clone() else {
                return Ok(SubmitOutcome::NoFileSelected);
            };
            if inner.view.pending {
                debug!(stage = "upload", action = "submit_ignored", "submission already pending");
                return Ok(SubmitOutcome::AlreadyPending);
            }

            inner.next_request += 1;
            let request_id = inner.next_request;
            inner.in_flight = Some(request_id);
            inner.view.pending = true;
            inner.view.result = None;
            inner.view.error = None;
            self.publish(&inner);
            (request_id, file)
        };

        let credential = self.shared.credentials.current_credential();
        info!(
            stage = "upload",
            action = "submit",
            request_id,
            size_bytes = file.len(),
            authorized = credential.is_some()
        );

        let outcome = match tokio::time::timeout(
            self.shared.timeout,
            self.shared.transport.classify(&file, credential.as_ref()),
        )
        .await
        {
            Ok(Ok(raw)) => parse_detection_response(&raw).map_err(ClassificationError::from),
            Ok(Err(error)) => Err(ClassificationError::from(error)),
            Err(_) => Err(ClassificationError::Timeout(self.shared.timeout)),
        };

        let mut inner = self.lock();
        if inner.in_flight != Some(request_id) {
            debug!(stage = "upload", action = "discard", request_id, "stale response dropped");
            return Ok(SubmitOutcome::Discarded);
        }

        inner.in_flight = None;
        inner.view.pending = false;
        match outcome {
            Ok(result) => {
                inner.view.result = Some(result.clone());
                self.publish(&inner);
                info!(
                    stage = "upload",
                    action = "result",
                    request_id,
                    prediction = %result.prediction,
                    confidence = result.confidence
                );
                Ok(SubmitOutcome::Applied(result))
            }
            Err(error) => {
                inner.view.error = Some(UploadFailure::from(&error));
                self.publish(&inner);
                warn!(stage = "upload", action = "failed", request_id, %error, "analysis failed");
                Err(error)
            }
        }
    }

    /// Drops interest in the in-flight submission, if any.
    ///
    /// The selection is kept; a late response is discarded.
    pub fn abandon(&self) {
        let mut inner = self.lock();
        if inner.in_flight.take().is_some() {
            inner.view.pending = false;
            self.publish(&inner);
            debug!(stage = "upload", action = "abandon", "in-flight submission abandoned");
        }
    }

    /// Resets to the idle state with nothing selected.
    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.selection += 1;
        inner.in_flight = None;
        inner.file = None;
        inner.view = UploadState::default();
        self.publish(&inner);
    }

    fn publish(&self, inner: &Inner) {
        self.shared.publisher.send_replace(inner.view.clone());
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.shared
            .inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for UploadController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.lock();
        f.debug_struct("UploadController")
            .field("selected_file", &inner.view.selected_file)
            .field("pending", &inner.view.pending)
            .field("timeout", &self.shared.timeout)
            .finish_non_exhaustive()
    }
}
