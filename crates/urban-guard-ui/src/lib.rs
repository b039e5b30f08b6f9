#![warn(missing_docs)]
//! # urban-guard-ui
//!
//! ## Purpose
//! Defines the UI-facing projection of session and upload state.
//!
//! ## Responsibilities
//! - Derive header state (greeting, sign-in button) from the session.
//! - Derive the submit button label and enabled flag from the upload state.
//! - Render detection results into display-ready labels and bar widths.
//!
//! ## Data flow
//! Session and upload snapshots -> [`DashboardView::project`] -> rendered by
//! whatever shell hosts the client.
//!
//! ## Ownership and lifetimes
//! `DashboardView` owns every string so a shell can keep it across frames
//! without borrowing controller state.
//!
//! ## Error model
//! This crate favors explicit state over recoverable errors. Failures are
//! already folded into [`UploadState::error`] before projection.
//!
//! ## Security and privacy notes
//! The projection excludes credentials and raw image bytes; the preview is
//! the only image-derived value it carries.

use urban_guard_core::{DetectionResult, Prediction, Session};
use urban_guard_upload::{FailureClass, UploadState};

/// Submit button label while idle.
pub const SUBMIT_LABEL: &str = "Analyze Signage";
/// Submit button label while a request is in flight.
pub const PENDING_LABEL: &str = "Analyzing...";
/// Placeholder shown before any result exists.
pub const EMPTY_RESULT_TEXT: &str = "Upload an image to see detection results";

/// UI-auth state projection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiAuthState {
    /// Stored session or sign-in call still resolving.
    Checking,
    /// No session.
    SignedOut,
    /// Valid session.
    SignedIn,
}

impl UiAuthState {
    /// Projects a session snapshot.
    pub fn from_session(session: &Session) -> Self {
        if session.is_authenticated() {
            UiAuthState::SignedIn
        } else if session.loading {
            UiAuthState::Checking
        } else {
            UiAuthState::SignedOut
        }
    }
}

/// Color family of the result badge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultTone {
    /// Authorized signage.
    Positive,
    /// Unauthorized signage.
    Negative,
}

/// Display-ready detection result.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultPanel {
    /// Capitalized prediction, for example `Unauthorized`.
    pub heading: String,
    /// Badge tone.
    pub tone: ResultTone,
    /// Percentage label, for example `92.0%`.
    pub confidence_label: String,
    /// Progress bar fill in `0.0..=100.0`.
    pub bar_width_percent: f64,
    /// Explanation from the classifier.
    pub message: String,
}

impl ResultPanel {
    /// Builds the panel for one result.
    pub fn from_result(result: &DetectionResult) -> Self {
        let tone = match result.prediction {
            Prediction::Authorized => ResultTone::Positive,
            Prediction::Unauthorized => ResultTone::Negative,
        };

        Self {
            heading: capitalize(result.prediction.as_str()),
            tone,
            confidence_label: result.confidence_label(),
            bar_width_percent: (result.confidence * 100.0).clamp(0.0, 100.0),
            message: result.message.clone(),
        }
    }
}

/// Aggregate dashboard view.
#[derive(Debug, Clone, PartialEq)]
pub struct DashboardView {
    /// App version string.
    pub version: String,
    /// Current auth status.
    pub auth: UiAuthState,
    /// `Welcome, <username>` when signed in.
    pub greeting: Option<String>,
    /// Whether the header offers sign-in.
    pub show_auth_buttons: bool,
    /// Selected file name.
    pub file_name: Option<String>,
    /// Preview `data:` URI.
    pub preview_data_uri: Option<String>,
    /// Whether the submit button is shown.
    pub show_submit: bool,
    /// Whether the submit button accepts clicks.
    pub submit_enabled: bool,
    /// Submit button label.
    pub submit_label: String,
    /// Result panel, once a result exists.
    pub result: Option<ResultPanel>,
    /// Status line below the result area.
    pub status_text: String,
}

impl DashboardView {
    /// Projects session and upload snapshots.
    pub fn project(version: impl Into<String>, session: &Session, upload: &UploadState) -> Self {
        let auth = UiAuthState::from_session(session);
        let status_text = if upload.pending {
            PENDING_LABEL.to_string()
        } else if let Some(error) = &upload.error {
            match error.class {
                FailureClass::Retriable => {
                    format!("Analysis failed: {}. Please try again.", error.message)
                }
                FailureClass::Permanent => format!("Analysis failed: {}", error.message),
            }
        } else if upload.result.is_some() {
            "Signage Classification".to_string()
        } else {
            EMPTY_RESULT_TEXT.to_string()
        };

        Self {
            version: version.into(),
            auth,
            greeting: session
                .username()
                .map(|username| format!("Welcome, {username}")),
            show_auth_buttons: auth == UiAuthState::SignedOut,
            file_name: upload.selected_file.as_ref().map(|file| file.name.clone()),
            preview_data_uri: upload.preview_data_uri.clone(),
            show_submit: upload.selected_file.is_some(),
            submit_enabled: upload.can_submit(),
            submit_label: if upload.pending {
                PENDING_LABEL.to_string()
            } else {
                SUBMIT_LABEL.to_string()
            },
            result: upload.result.as_ref().map(ResultPanel::from_result),
            status_text,
        }
    }
}

fn capitalize(label: &str) -> String {
    let mut chars = label.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for dashboard projection.

    use super::*;
    use urban_guard_core::Identity;
    use urban_guard_upload::{SelectedImage, UploadFailure};

    fn signed_in() -> Session {
        Session {
            identity: Some(Identity {
                id: 1,
                username: "a".to_string(),
                email: "a@b.com".to_string(),
            }),
            loading: false,
        }
    }

    fn selected() -> SelectedImage {
        SelectedImage {
            name: "sign.jpg".to_string(),
            mime_type: "image/jpeg".to_string(),
            size_bytes: 10,
            fingerprint: "00".to_string(),
        }
    }

    #[test]
    fn header_reflects_session() {
        let view = DashboardView::project("0.1.0", &signed_in(), &UploadState::default());
        assert_eq!(view.greeting.as_deref(), Some("Welcome, a"));
        assert!(!view.show_auth_buttons);

        let view = DashboardView::project("0.1.0", &Session::bootstrapping(), &UploadState::default());
        assert_eq!(view.auth, UiAuthState::Checking);
        assert!(!view.show_auth_buttons);

        let view = DashboardView::project("0.1.0", &Session::signed_out(), &UploadState::default());
        assert!(view.show_auth_buttons);
        assert_eq!(view.status_text, EMPTY_RESULT_TEXT);
    }

    #[test]
    fn submit_button_tracks_pending() {
        let mut upload = UploadState {
            selected_file: Some(selected()),
            ..UploadState::default()
        };
        let view = DashboardView::project("0.1.0", &signed_in(), &upload);
        assert!(view.show_submit && view.submit_enabled);
        assert_eq!(view.submit_label, SUBMIT_LABEL);

        upload.pending = true;
        let view = DashboardView::project("0.1.0", &signed_in(), &upload);
        assert!(!view.submit_enabled);
        assert_eq!(view.submit_label, PENDING_LABEL);
    }

    #[test]
    fn result_panel_renders_confidence() {
        let upload = UploadState {
            selected_file: Some(selected()),
            result: Some(DetectionResult {
                prediction: Prediction::Unauthorized,
                confidence: 0.873,
                message: "review".to_string(),
            }),
            ..UploadState::default()
        };
        let panel = DashboardView::project("0.1.0", &signed_in(), &upload)
            .result
            .expect("result panel should exist");
        assert_eq!(panel.heading, "Unauthorized");
        assert_eq!(panel.tone, ResultTone::Negative);
        assert_eq!(panel.confidence_label, "87.3%");
        assert!((panel.bar_width_percent - 87.3).abs() < 1e-9);
    }

    #[test]
    fn retriable_failure_suggests_retry() {
        let upload = UploadState {
            selected_file: Some(selected()),
            error: Some(UploadFailure {
                class: FailureClass::Retriable,
                message: "classification service unreachable: refused".to_string(),
            }),
            ..UploadState::default()
        };
        let view = DashboardView::project("0.1.0", &signed_in(), &upload);
        assert!(view.status_text.starts_with("Analysis failed"));
        assert!(view.status_text.ends_with("Please try again."));
        assert!(view.submit_enabled);
    }
}
