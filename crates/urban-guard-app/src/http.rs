//! reqwest-backed transports for the identity and classification services.

use reqwest::multipart::{Form, Part};
use reqwest::header::AUTHORIZATION;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use tracing::debug;
use urban_guard_analysis_contract::service_error_reason;
use urban_guard_auth::{
    AuthResponse, CURRENT_USER_PATH, IdentityTransport, SIGN_IN_PATH, SIGN_UP_PATH, SignInForm,
    SignUpRequest,
};
use urban_guard_core::{ApiBase, Credential, Identity, ImageFile, TransportError, TransportFuture};
use urban_guard_upload::{ClassifierTransport, DETECT_PATH, IMAGE_FIELD};

use crate::logging::redact_sensitive;

/// Identity service over HTTP.
#[derive(Debug, Clone)]
pub struct HttpIdentityTransport {
    client: Client,
    base: ApiBase,
}

impl HttpIdentityTransport {
    /// Creates a transport sharing `client`.
    pub fn new(client: Client, base: ApiBase) -> Self {
        Self { client, base }
    }
}

impl IdentityTransport for HttpIdentityTransport {
    fn sign_up<'a>(&'a self, request: &'a SignUpRequest) -> TransportFuture<'a, AuthResponse> {
        Box::pin(async move {
            let response = self
                .client
                .post(self.base.endpoint(SIGN_UP_PATH))
                .json(request)
                .send()
                .await
                .map_err(unreachable)?;
            decode_json(response).await
        })
    }

    fn sign_in<'a>(&'a self, form: &'a SignInForm) -> TransportFuture<'a, AuthResponse> {
        Box::pin(async move {
            let response = self
                .client
                .post(self.base.endpoint(SIGN_IN_PATH))
                .form(form)
                .send()
                .await
                .map_err(unreachable)?;
            decode_json(response).await
        })
    }

    fn current_identity<'a>(
        &'a self,
        credential: &'a Credential,
    ) -> TransportFuture<'a, Identity> {
        Box::pin(async move {
            let response = self
                .client
                .get(self.base.endpoint(CURRENT_USER_PATH))
                .header(AUTHORIZATION, credential.bearer_header_value())
                .send()
                .await
                .map_err(unreachable)?;
            decode_json(response).await
        })
    }
}

/// Classification service over HTTP.
#[derive(Debug, Clone)]
pub struct HttpClassifierTransport {
    client: Client,
    base: ApiBase,
}

impl HttpClassifierTransport {
    /// Creates a transport sharing `client`.
    pub fn new(client: Client, base: ApiBase) -> Self {
        Self { client, base }
    }
}

impl ClassifierTransport for HttpClassifierTransport {
    fn classify<'a>(
        &'a self,
        image: &'a ImageFile,
        credential: Option<&'a Credential>,
    ) -> TransportFuture<'a, String> {
        Box::pin(async move {
            let file_part = || Part::bytes(image.bytes.clone()).file_name(image.name.clone());
            // An unparsable declared type still uploads, as octet-stream.
            let part = file_part()
                .mime_str(image.mime_type.trim())
                .unwrap_or_else(|_| file_part());

            let mut request = self
                .client
                .post(self.base.endpoint(DETECT_PATH))
                .multipart(Form::new().part(IMAGE_FIELD, part));
            if let Some(credential) = credential {
                request = request.header(AUTHORIZATION, credential.bearer_header_value());
            }

            let response = request.send().await.map_err(unreachable)?;
            success_body(response).await
        })
    }
}

fn unreachable(error: reqwest::Error) -> TransportError {
    TransportError::Unreachable(error.to_string())
}

async fn decode_json<T: DeserializeOwned>(response: Response) -> Result<T, TransportError> {
    let body = success_body(response).await?;
    serde_json::from_str(&body).map_err(|error| TransportError::Decode(error.to_string()))
}

async fn success_body(response: Response) -> Result<String, TransportError> {
    let status = response.status();
    let url_path = response.url().path().to_string();
    let body = response.text().await.map_err(unreachable)?;
    if status.is_success() {
        return Ok(body);
    }

    debug!(
        stage = "http",
        action = "error_status",
        path = %url_path,
        status = status.as_u16(),
        body = %redact_sensitive(&body)
    );
    let reason = service_error_reason(&body).unwrap_or_else(|| {
        status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string()
    });
    Err(TransportError::Status {
        status: status.as_u16(),
        reason,
    })
}
