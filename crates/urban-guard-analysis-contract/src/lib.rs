#![warn(missing_docs)]
//! # urban-guard-analysis-contract
//!
//! ## Purpose
//! Defines the classification service response schema and the error body
//! shape shared by the remote services.
//!
//! ## Responsibilities
//! - Parse `POST /detect-signage` payloads into [`DetectionResult`].
//! - Reject service-reported failures and out-of-range confidences.
//! - Extract human-readable reasons from `{"detail": ...}` error bodies.
//!
//! ## Data flow
//! Raw JSON response -> [`parse_detection_response`] -> upload controller
//! state -> UI projection.
//!
//! ## Ownership and lifetimes
//! Parsed values are owned structs to avoid borrowing from transient network
//! buffers.
//!
//! ## Error model
//! Invalid JSON, unknown labels, and contract violations return
//! [`AnalysisContractError`].
//!
//! ## Security and privacy notes
//! This crate processes only model outputs and error text; it does not touch
//! authentication secrets or image bytes.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use urban_guard_core::{DetectionResult, Prediction};

/// Label the classifier emits when it failed to process the image.
pub const SERVICE_ERROR_LABEL: &str = "error";

/// Wire form of a classification response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionResponse {
    /// `authorized`, `unauthorized`, or `error`.
    pub prediction: String,
    /// Confidence in [0.0, 1.0].
    pub confidence: f64,
    /// Explanation text.
    #[serde(default)]
    pub message: String,
    /// Unthresholded model output, when the service reports it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_probability: Option<f64>,
}

/// Parses raw JSON into a validated detection result.
///
/// # Errors
/// Returns [`AnalysisContractError::Decode`] for invalid JSON.
/// Returns [`AnalysisContractError::ServiceReported`] when the classifier
/// answered with its `error` label.
/// Returns [`AnalysisContractError::InvalidContract`] for unknown labels or a
/// confidence outside [0, 1].
pub fn parse_detection_response(raw: &str) -> Result<DetectionResult, AnalysisContractError> {
    let parsed: DetectionResponse =
        serde_json::from_str(raw).map_err(AnalysisContractError::Decode)?;
    detection_from_wire(parsed)
}

/// Validates an already-decoded response.
///
/// # Errors
/// Same as [`parse_detection_response`] minus JSON decoding.
pub fn detection_from_wire(
    response: DetectionResponse,
) -> Result<DetectionResult, AnalysisContractError> {
    let label = response.prediction.trim().to_ascii_lowercase();
    let prediction = match label.as_str() {
        "authorized" => Prediction::Authorized,
        "unauthorized" => Prediction::Unauthorized,
        SERVICE_ERROR_LABEL => {
            return Err(AnalysisContractError::ServiceReported(response.message));
        }
        other => {
            return Err(AnalysisContractError::InvalidContract(format!(
                "unknown prediction label '{other}'"
            )));
        }
    };

    if !response.confidence.is_finite() || !(0.0..=1.0).contains(&response.confidence) {
        return Err(AnalysisContractError::InvalidContract(format!(
            "confidence {} outside [0, 1]",
            response.confidence
        )));
    }

    Ok(DetectionResult {
        prediction,
        confidence: response.confidence,
        message: response.message,
    })
}

/// Extracts a readable reason from a service error body.
///
/// Accepts `{"detail": "text"}` and validation lists shaped like
/// `{"detail": [{"msg": "text"}, ...]}`. Returns `None` when the body carries
/// neither.
pub fn service_error_reason(raw: &str) -> Option<String> {
    let value: Value = serde_json::from_str(raw).ok()?;
    match value.get("detail")? {
        Value::String(text) if !text.trim().is_empty() => Some(text.trim().to_string()),
        Value::Array(items) => {
            let messages: Vec<&str> = items
                .iter()
                .filter_map(|item| item.get("msg").and_then(Value::as_str))
                .collect();
            if messages.is_empty() {
                None
            } else {
                Some(messages.join("; "))
            }
        }
        _ => None,
    }
}

/// Analysis contract errors.
#[derive(Debug, Error)]
pub enum AnalysisContractError {
    /// JSON decode failure.
    #[error("detection decode failure: {0}")]
    Decode(#[from] serde_json::Error),
    /// Classifier reported that it could not process the image.
    #[error("classifier reported an error: {0}")]
    ServiceReported(String),
    /// Parsed payload violates contract invariants.
    #[error("detection contract violation: {0}")]
    InvalidContract(String),
}
