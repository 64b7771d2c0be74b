//! Error types for the SendParcel client.
//!
//! # Design
//! Transport failures and application failures are separate tiers. A
//! transport failure means no response was obtained at all. An application
//! failure means the API answered with a non-200 status or a body that is
//! not JSON; those carry the same `LastError` record the client keeps, so
//! callers can inspect the failure from either place.

use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::action::Action;

/// No response could be obtained from the remote host.
#[derive(Debug, Error)]
#[error("request to {url} failed: {source}")]
pub struct TransportError {
    pub url: String,
    #[source]
    source: Box<dyn std::error::Error + Send + Sync>,
}

impl TransportError {
    pub fn new(
        url: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self {
            url: url.into(),
            source: source.into(),
        }
    }
}

/// What was sent in a failed call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequestRecord {
    pub url: String,
    pub data: Map<String, Value>,
}

/// What came back in a failed call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResponseRecord {
    pub http_code: u16,
    pub body: String,
}

/// Diagnostic record of the most recent failed call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LastError {
    #[serde(serialize_with = "serialize_action")]
    pub function: Action,
    pub request: RequestRecord,
    pub response: ResponseRecord,
}

impl LastError {
    /// Method name of the failed action, e.g. `getPostcodeDetails`.
    pub fn function_name(&self) -> &'static str {
        self.function.method_name()
    }
}

fn serialize_action<S: serde::Serializer>(action: &Action, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(action.method_name())
}

/// Errors returned by `SendParcelClient` endpoint methods.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The API answered with a status other than 200.
    #[error("{} returned HTTP {}: {}", .0.function, .0.response.http_code, .0.response.body)]
    HttpStatus(Box<LastError>),

    /// The API answered 200 but the body is not valid JSON.
    #[error("{} returned a body that is not JSON: {source}", .record.function)]
    InvalidJson {
        record: Box<LastError>,
        #[source]
        source: serde_json::Error,
    },

    /// The caller's payload could not be serialized.
    #[error("payload could not be serialized: {0}")]
    Payload(#[source] serde_json::Error),

    /// The caller's payload serialized to something other than a JSON object.
    #[error("payload must serialize to a JSON object")]
    PayloadNotObject,
}

impl ApiError {
    /// True for failures the API itself reported (bad status or body).
    pub fn is_application(&self) -> bool {
        matches!(self, ApiError::HttpStatus(_) | ApiError::InvalidJson { .. })
    }

    pub fn last_error(&self) -> Option<&LastError> {
        match self {
            ApiError::HttpStatus(record) => Some(record),
            ApiError::InvalidJson { record, .. } => Some(record),
            _ => None,
        }
    }
}

/// Maps application failures to `None`, for callers that want
/// "null on failure" and read `SendParcelClient::last_error` afterwards.
pub trait ApiResultExt<T> {
    fn nullable(self) -> Result<Option<T>, ApiError>;
}

impl<T> ApiResultExt<T> for Result<T, ApiError> {
    fn nullable(self) -> Result<Option<T>, ApiError> {
        match self {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.is_application() => Ok(None),
            Err(e) => Err(e),
        }
    }
}
