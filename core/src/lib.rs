//! Blocking client for the SendParcel (Pos Laju) shipping API.
//!
//! # Overview
//! One method per remote endpoint. Every call is a form-encoded POST to
//! `{base_url}{action}` carrying the account's `api_key`, and the reply is
//! decoded as JSON (or returned raw, for consignment note downloads).
//!
//! # Design
//! - `SendParcelClient` keeps only its `ClientConfig` and the record of the
//!   most recent failure (`last_error`).
//! - The network sits behind the `Transport` trait. `UreqTransport` (feature
//!   `ureq`, on by default) is the blocking implementation; tests use stubs.
//! - Transport failures and application failures are separate `ApiError`
//!   variants. `ApiResultExt::nullable` folds the latter into `None` for
//!   callers that prefer "null on failure".

pub mod action;
pub mod client;
pub mod config;
pub mod error;
pub mod form;
pub mod http;

pub use action::{snake_case, Action};
pub use client::SendParcelClient;
pub use config::{ClientConfig, Environment, DEMO_URL, LIVE_URL};
pub use error::{ApiError, ApiResultExt, LastError, RequestRecord, ResponseRecord, TransportError};
pub use http::{HttpRequest, HttpResponse, Transport};
#[cfg(feature = "ureq")]
pub use http::UreqTransport;
