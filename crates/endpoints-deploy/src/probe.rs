// crates/endpoints-deploy/src/probe.rs
// ============================================================================
// Module: Echo Probe
// Description: Authenticated round-trip check against the echo endpoint.
// Purpose: Validate that the deployed service returns the posted message.
// Dependencies: reqwest, serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! The probe sends `POST /echo?key=<api key>` with a JSON body
//! `{"message": ...}` and an explicit `content-type: application/json`
//! header. The response must be HTTP 200 and a JSON object whose `message`
//! equals the input byte for byte.
//! Transport errors strip the request URL so the API key never reaches logs.

// ============================================================================
// SECTION: Imports
// ============================================================================

use reqwest::Client;
use reqwest::Url;
use reqwest::header::CONTENT_TYPE;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Echo endpoint path.
pub const ECHO_PATH: &str = "/echo";
/// Query parameter carrying the API key.
pub const API_KEY_PARAM: &str = "key";
/// Field echoed by the service.
pub const MESSAGE_FIELD: &str = "message";

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Probe failures.
#[derive(Debug, Error)]
pub enum ProbeError {
    /// The request could not be sent or the body could not be read.
    #[error("echo endpoint unreachable: {0}")]
    Unreachable(reqwest::Error),
    /// The request body could not be encoded.
    #[error("failed to encode echo request: {0}")]
    Encode(serde_json::Error),
    /// The probe URL could not be built from the base URL.
    #[error("invalid probe url: {0}")]
    InvalidUrl(String),
    /// The response did not match the request.
    #[error("echo assertion failed on `{field}`: expected {expected}, got {actual}")]
    AssertionFailed {
        /// Field that mismatched (`status`, `body` or `message`).
        field: &'static str,
        /// Expected value, rendered as JSON.
        expected: String,
        /// Actual value, rendered as JSON.
        actual: String,
    },
}

// ============================================================================
// SECTION: Types
// ============================================================================

/// Request body for the echo endpoint.
#[derive(Debug, Serialize)]
struct EchoRequest<'a> {
    /// Text to echo.
    message: &'a str,
}

/// Raw probe response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EchoResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response body text.
    pub body: String,
}

// ============================================================================
// SECTION: Probe
// ============================================================================

/// Echo endpoint probe bound to a deployed service.
#[derive(Debug, Clone)]
pub struct EchoProbe {
    /// Shared HTTP client owned by the harness.
    client: Client,
    /// Service base URL.
    base_url: Url,
    /// Endpoints API key.
    api_key: String,
}

impl EchoProbe {
    /// Creates a probe.
    #[must_use]
    pub fn new(client: Client, base_url: Url, api_key: impl Into<String>) -> Self {
        Self {
            client,
            base_url,
            api_key: api_key.into(),
        }
    }

    /// Returns the service base URL.
    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Builds `<base>/echo?key=<api key>`.
    ///
    /// # Errors
    ///
    /// Returns [`ProbeError::InvalidUrl`] when the base URL cannot be joined.
    pub fn echo_url(&self) -> Result<Url, ProbeError> {
        let mut url =
            self.base_url.join(ECHO_PATH).map_err(|err| ProbeError::InvalidUrl(err.to_string()))?;
        url.query_pairs_mut().append_pair(API_KEY_PARAM, &self.api_key);
        Ok(url)
    }

    /// Posts `message` and returns the raw response.
    ///
    /// # Errors
    ///
    /// Returns [`ProbeError::Unreachable`] on transport failures.
    pub async fn send_echo(&self, message: &str) -> Result<EchoResponse, ProbeError> {
        let body = serde_json::to_string(&EchoRequest {
            message,
        })
        .map_err(ProbeError::Encode)?;
        let response = self
            .client
            .post(self.echo_url()?)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|err| ProbeError::Unreachable(err.without_url()))?;
        let status = response.status().as_u16();
        let body =
            response.text().await.map_err(|err| ProbeError::Unreachable(err.without_url()))?;
        Ok(EchoResponse {
            status,
            body,
        })
    }

    /// Posts `message` and asserts the echo round trip.
    ///
    /// # Errors
    ///
    /// Returns [`ProbeError::Unreachable`] on transport failures and
    /// [`ProbeError::AssertionFailed`] on any mismatch.
    pub async fn assert_echo(&self, message: &str) -> Result<(), ProbeError> {
        let response = self.send_echo(message).await?;
        check_echo(message, &response)
    }
}

// ============================================================================
// SECTION: Assertions
// ============================================================================

/// Checks status, JSON shape and the echoed message.
///
/// # Errors
///
/// Returns [`ProbeError::AssertionFailed`] naming the first mismatched field.
pub fn check_echo(message: &str, response: &EchoResponse) -> Result<(), ProbeError> {
    if response.status != 200 {
        return Err(ProbeError::AssertionFailed {
            field: "status",
            expected: "200".to_string(),
            actual: response.status.to_string(),
        });
    }
    let json: Value =
        serde_json::from_str(&response.body).map_err(|_| ProbeError::AssertionFailed {
            field: "body",
            expected: "a JSON document".to_string(),
            actual: Value::String(response.body.clone()).to_string(),
        })?;
    let Some(echoed) = json.get(MESSAGE_FIELD) else {
        return Err(ProbeError::AssertionFailed {
            field: "message",
            expected: Value::String(message.to_string()).to_string(),
            actual: "<missing>".to_string(),
        });
    };
    if echoed.as_str() != Some(message) {
        return Err(ProbeError::AssertionFailed {
            field: "message",
            expected: Value::String(message.to_string()).to_string(),
            actual: echoed.to_string(),
        });
    }
    Ok(())
}

// ============================================================================
// SECTION: Tests
// ============================================================================
