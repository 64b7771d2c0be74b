//! HTTP transport seam for the client.
//!
//! # Design
//! Requests and responses are plain data. `SendParcelClient` builds an
//! `HttpRequest`, hands it to a `Transport`, and interprets the
//! `HttpResponse` it gets back. The default transport is a blocking ureq
//! agent; tests plug in an in-memory stub instead.

use std::time::Duration;

use crate::error::TransportError;

/// A form POST described as plain data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
    /// When false, neither the peer certificate nor the host name is checked.
    pub verify_tls: bool,
    pub timeout: Option<Duration>,
}

impl HttpRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Status code and raw body returned by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Body as text, with invalid UTF-8 replaced.
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Executes a single POST round-trip.
///
/// Implementations must return non-2xx responses as `Ok`; only failures to
/// obtain a response at all (DNS, connect, TLS, timeout) are errors.
pub trait Transport {
    fn post(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn post(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        (**self).post(request)
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn post(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        (**self).post(request)
    }
}

#[cfg(feature = "ureq")]
pub use self::ureq_transport::UreqTransport;

#[cfg(feature = "ureq")]
mod ureq_transport {
    use ureq::config::IpFamily;
    use ureq::tls::TlsConfig;
    use ureq::Agent;

    use super::{HttpRequest, HttpResponse, Transport};
    use crate::error::TransportError;

    /// Blocking transport over ureq.
    ///
    /// An agent is configured per request from the request's TLS and timeout
    /// settings and dropped when the call returns. Name resolution is
    /// restricted to IPv4. Redirects are not followed, so a 3xx reaches the
    /// client as-is, and response bodies are read without a size limit.
    #[derive(Debug, Clone, Default)]
    pub struct UreqTransport {
        _private: (),
    }

    impl UreqTransport {
        pub fn new() -> Self {
            Self::default()
        }

        fn agent(request: &HttpRequest) -> Agent {
            Agent::config_builder()
                .http_status_as_error(false)
                .max_redirects(0)
                .max_redirects_will_error(false)
                .ip_family(IpFamily::Ipv4Only)
                .tls_config(
                    TlsConfig::builder()
                        .disable_verification(!request.verify_tls)
                        .build(),
                )
                .timeout_global(request.timeout)
                .build()
                .new_agent()
        }
    }

    impl Transport for UreqTransport {
        fn post(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
            let agent = Self::agent(request);

            let mut builder = agent.post(&request.url);
            for (name, value) in &request.headers {
                builder = builder.header(name.as_str(), value.as_str());
            }

            let mut response = builder
                .send(request.body.as_bytes())
                .map_err(|e| TransportError::new(&request.url, e))?;

            let status = response.status().as_u16();
            let body = response
                .body_mut()
                .with_config()
                .limit(u64::MAX)
                .read_to_vec()
                .map_err(|e| TransportError::new(&request.url, e))?;

            Ok(HttpResponse { status, body })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_lookup_ignores_case() {
        let req = HttpRequest {
            url: "http://localhost/apiv1/me".to_string(),
            headers: vec![("Content-Type".to_string(), "text/plain".to_string())],
            body: String::new(),
            verify_tls: true,
            timeout: None,
        };
        assert_eq!(req.header("content-type"), Some("text/plain"));
        assert_eq!(req.header("accept"), None);
    }

    #[test]
    fn body_text_replaces_invalid_utf8() {
        let resp = HttpResponse::new(200, vec![b'o', b'k', 0xff]);
        assert_eq!(resp.body_text(), "ok\u{fffd}");
    }
}
