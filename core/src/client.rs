//! Blocking client for the SendParcel API.
//!
//! # Design
//! Every endpoint method is a thin wrapper that picks an `Action`, shapes the
//! payload, and funnels through `execute_action` (JSON) or `execute_raw`
//! (document downloads). The client's only state between calls is its
//! configuration and the single-slot `last_error`.
//!
//! Configuration toggles and calls both take `&mut self`, so a client cannot
//! be reconfigured halfway through a request. Give each session its own
//! client, or wrap one in a `Mutex`, to share it across threads.

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, error};

use crate::action::Action;
use crate::config::{ClientConfig, Environment};
use crate::error::{ApiError, LastError, RequestRecord, ResponseRecord};
use crate::form;
use crate::http::{HttpRequest, HttpResponse, Transport};

#[derive(Debug)]
pub struct SendParcelClient<T> {
    config: ClientConfig,
    transport: T,
    last_error: Option<LastError>,
}

#[cfg(feature = "ureq")]
impl SendParcelClient<crate::http::UreqTransport> {
    /// Client for the live deployment. Performs no I/O.
    pub fn new(api_key: impl Into<String>, api_secret: impl Into<String>) -> Self {
        Self::from_config(ClientConfig::new(api_key, api_secret))
    }

    pub fn from_config(config: ClientConfig) -> Self {
        Self::with_transport(config, crate::http::UreqTransport::new())
    }
}

impl<T: Transport> SendParcelClient<T> {
    pub fn with_transport(config: ClientConfig, transport: T) -> Self {
        Self {
            config,
            transport,
            last_error: None,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Switch between the demo and live deployments.
    pub fn use_demo(&mut self, flag: bool) {
        let environment = if flag { Environment::Demo } else { Environment::Live };
        self.config.base_url = environment.base_url().to_string();
    }

    /// Turn certificate verification on or off. Off is insecure.
    pub fn use_ssl(&mut self, flag: bool) {
        self.config.verify_tls = flag;
    }

    pub fn url(&self) -> &str {
        &self.config.base_url
    }

    /// Record of the most recent call, if it failed.
    pub fn last_error(&self) -> Option<&LastError> {
        self.last_error.as_ref()
    }

    /// Call `action` and decode the JSON reply.
    ///
    /// A status other than 200, or a body that is not JSON, is recorded in
    /// `last_error`, logged, and returned as an application error.
    pub fn execute_action(
        &mut self,
        action: Action,
        payload: Map<String, Value>,
    ) -> Result<Value, ApiError> {
        let (request, response) = self.send(action, payload)?;

        match serde_json::from_slice::<Value>(&response.body) {
            Ok(value) if response.status == 200 => Ok(value),
            Err(source) if response.status == 200 => Err(ApiError::InvalidJson {
                record: self.record_failure(action, request, &response),
                source,
            }),
            _ => Err(ApiError::HttpStatus(
                self.record_failure(action, request, &response),
            )),
        }
    }

    /// Call `action` and return the body untouched, whatever the status.
    pub fn execute_raw(
        &mut self,
        action: Action,
        payload: Map<String, Value>,
    ) -> Result<Vec<u8>, ApiError> {
        let (_, response) = self.send(action, payload)?;
        Ok(response.body)
    }

    fn send(
        &mut self,
        action: Action,
        payload: Map<String, Value>,
    ) -> Result<(RequestRecord, HttpResponse), ApiError> {
        self.last_error = None;

        let url = format!("{}{}", self.config.base_url, action.remote_name());

        // A caller-supplied api_key replaces the stored one.
        let mut data = Map::new();
        data.insert("api_key".to_string(), Value::String(self.config.api_key.clone()));
        data.extend(payload);

        let request = HttpRequest {
            url: url.clone(),
            headers: vec![("content-type".to_string(), form::CONTENT_TYPE.to_string())],
            body: form::encode(&data),
            verify_tls: self.config.verify_tls,
            timeout: self.config.timeout,
        };

        debug!(%action, %url, verify_tls = request.verify_tls, "sending request");
        let response = self.transport.post(&request)?;
        debug!(%action, status = response.status, bytes = response.body.len(), "received response");

        Ok((RequestRecord { url, data }, response))
    }

    fn record_failure(
        &mut self,
        action: Action,
        request: RequestRecord,
        response: &HttpResponse,
    ) -> Box<LastError> {
        let record = LastError {
            function: action,
            request,
            response: ResponseRecord {
                http_code: response.status,
                body: response.body_text(),
            },
        };

        error!(
            function = %record.function,
            url = %record.request.url,
            data = %logged_data(&record.request.data),
            http_code = record.response.http_code,
            body = %record.response.body,
            "SendParcel request failed"
        );

        self.last_error = Some(record.clone());
        Box::new(record)
    }

    // -----------------------------------------------------------------------
    // Endpoints
    // -----------------------------------------------------------------------

    /// Account details for the configured API key.
    pub fn me(&mut self) -> Result<Value, ApiError> {
        self.execute_action(Action::Me, Map::new())
    }

    pub fn get_postcode_details(&mut self, postcode: &str) -> Result<Value, ApiError> {
        self.execute_action(Action::GetPostcodeDetails, single("postcode", postcode))
    }

    pub fn check_price<P: Serialize + ?Sized>(&mut self, data: &P) -> Result<Value, ApiError> {
        let payload = to_payload(data)?;
        self.execute_action(Action::CheckPrice, payload)
    }

    pub fn get_parcel_sizes(&mut self) -> Result<Value, ApiError> {
        self.execute_action(Action::GetParcelSizes, Map::new())
    }

    pub fn get_content_types(&mut self) -> Result<Value, ApiError> {
        self.execute_action(Action::GetContentTypes, Map::new())
    }

    /// Adds a shipment to the cart. The reply carries its shipment key.
    pub fn create_shipment<P: Serialize + ?Sized>(&mut self, data: &P) -> Result<Value, ApiError> {
        let payload = to_payload(data)?;
        self.execute_action(Action::CreateShipment, payload)
    }

    pub fn get_cart_items(&mut self) -> Result<Value, ApiError> {
        self.execute_action(Action::GetCartItems, Map::new())
    }

    /// Pays for the given cart shipments.
    pub fn checkout<S: AsRef<str>>(&mut self, shipment_keys: &[S]) -> Result<Value, ApiError> {
        self.execute_action(Action::Checkout, single("shipment_keys", keys(shipment_keys)))
    }

    pub fn get_shipment_statuses(&mut self) -> Result<Value, ApiError> {
        self.execute_action(Action::GetShipmentStatuses, Map::new())
    }

    pub fn get_shipments<S: AsRef<str>>(&mut self, shipment_keys: &[S]) -> Result<Value, ApiError> {
        self.execute_action(Action::GetShipments, single("shipment_keys", keys(shipment_keys)))
    }

    /// One page of shipment history; `None` fetches the first page.
    pub fn get_shipment_history(&mut self, page: Option<u32>) -> Result<Value, ApiError> {
        let page = page.unwrap_or(1);
        self.execute_action(Action::GetShipmentHistory, single("page", page))
    }

    /// Consignment note document (usually a PDF).
    ///
    /// The body is returned as-is whatever the status code, and `last_error`
    /// is never populated by this call.
    pub fn get_consignment_note<P: Serialize + ?Sized>(
        &mut self,
        data: &P,
    ) -> Result<Vec<u8>, ApiError> {
        let payload = to_payload(data)?;
        self.execute_raw(Action::GetConsignmentNote, payload)
    }

    pub fn check_price_bulk<P: Serialize + ?Sized>(&mut self, data: &P) -> Result<Value, ApiError> {
        let payload = to_payload(data)?;
        self.execute_action(Action::CheckPriceBulk, payload)
    }

    pub fn create_bulk_awb<P: Serialize + ?Sized>(&mut self, data: &P) -> Result<Value, ApiError> {
        let payload = to_payload(data)?;
        self.execute_action(Action::CreateBulkAwb, payload)
    }

    pub fn get_bulk_tracking_no(
        &mut self,
        integration_order_id: impl Into<Value>,
    ) -> Result<Value, ApiError> {
        self.execute_action(
            Action::GetBulkTrackingNo,
            single("integration_order_id", integration_order_id),
        )
    }
}

fn single(key: &str, value: impl Into<Value>) -> Map<String, Value> {
    let mut map = Map::new();
    map.insert(key.to_string(), value.into());
    map
}

fn keys<S: AsRef<str>>(shipment_keys: &[S]) -> Value {
    Value::Array(
        shipment_keys
            .iter()
            .map(|k| Value::String(k.as_ref().to_string()))
            .collect(),
    )
}

/// Request data as JSON for the log, with the credential masked.
fn logged_data(data: &Map<String, Value>) -> String {
    let mut masked = data.clone();
    if let Some(key) = masked.get_mut("api_key") {
        *key = Value::String("<redacted>".to_string());
    }
    serde_json::to_string(&masked).unwrap_or_default()
}

fn to_payload<P: Serialize + ?Sized>(data: &P) -> Result<Map<String, Value>, ApiError> {
    match serde_json::to_value(data).map_err(ApiError::Payload)? {
        Value::Object(map) => Ok(map),
        _ => Err(ApiError::PayloadNotObject),
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::time::Duration;

    use serde_json::json;

    use super::*;
    use crate::config::{DEMO_URL, LIVE_URL};
    use crate::error::{ApiResultExt, TransportError};

    /// Replays queued responses and records every request it sees. An empty
    /// queue behaves like a refused connection.
    #[derive(Default)]
    struct StubTransport {
        replies: RefCell<VecDeque<HttpResponse>>,
        seen: RefCell<Vec<HttpRequest>>,
    }

    impl StubTransport {
        fn reply(self, status: u16, body: &str) -> Self {
            self.replies
                .borrow_mut()
                .push_back(HttpResponse::new(status, body.as_bytes()));
            self
        }

        fn last_request(&self) -> HttpRequest {
            self.seen.borrow().last().cloned().expect("no request sent")
        }
    }

    impl Transport for StubTransport {
        fn post(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
            self.seen.borrow_mut().push(request.clone());
            self.replies
                .borrow_mut()
                .pop_front()
                .ok_or_else(|| TransportError::new(&request.url, "connection refused"))
        }
    }

    fn client(stub: &StubTransport) -> SendParcelClient<&StubTransport> {
        SendParcelClient::with_transport(ClientConfig::new("k1", "s1"), stub)
    }

    #[test]
    fn defaults_to_live_url() {
        let stub = StubTransport::default();
        let client = client(&stub);
        assert_eq!(client.url(), LIVE_URL);
        assert!(client.last_error().is_none());
        assert!(stub.seen.borrow().is_empty(), "construction must not call out");
    }

    #[test]
    fn use_demo_toggles_base_url() {
        let stub = StubTransport::default();
        let mut client = client(&stub);
        client.use_demo(true);
        assert_eq!(client.url(), DEMO_URL);
        client.use_demo(false);
        assert_eq!(client.url(), LIVE_URL);
    }

    #[test]
    fn postcode_lookup_decodes_json() {
        let stub = StubTransport::default().reply(200, r#"{"state":"WP"}"#);
        let mut client = client(&stub);

        let value = client.get_postcode_details("50000").unwrap();
        assert_eq!(value, json!({"state": "WP"}));
        assert!(client.last_error().is_none());

        let req = stub.last_request();
        assert_eq!(req.url, format!("{LIVE_URL}get_postcode_details"));
        assert_eq!(req.body, "api_key=k1&postcode=50000");
        assert_eq!(req.header("content-type"), Some(form::CONTENT_TYPE));
        assert!(req.verify_tls);
    }

    #[test]
    fn not_found_is_recorded_in_last_error() {
        let stub = StubTransport::default().reply(404, "Not Found");
        let mut client = client(&stub);

        let err = client.me().unwrap_err();
        assert!(matches!(err, ApiError::HttpStatus(_)));

        let last = client.last_error().expect("last_error set");
        assert_eq!(last.function, Action::Me);
        assert_eq!(last.function_name(), "me");
        assert_eq!(last.response.http_code, 404);
        assert_eq!(last.response.body, "Not Found");
        assert_eq!(last.request.url, format!("{LIVE_URL}me"));
        assert_eq!(last.request.data, single("api_key", "k1"));
        assert_eq!(err.last_error(), Some(last));
    }

    #[test]
    fn server_error_with_json_body_still_fails() {
        let stub = StubTransport::default().reply(500, r#"{"message":"down"}"#);
        let mut client = client(&stub);

        assert!(client.get_parcel_sizes().nullable().unwrap().is_none());
        let last = client.last_error().unwrap();
        assert_eq!(last.response.http_code, 500);
        assert_eq!(last.response.body, r#"{"message":"down"}"#);
    }

    #[test]
    fn invalid_json_on_200_is_recorded() {
        let stub = StubTransport::default().reply(200, "not json");
        let mut client = client(&stub);

        let err = client.get_content_types().unwrap_err();
        assert!(matches!(err, ApiError::InvalidJson { .. }));
        let last = client.last_error().unwrap();
        assert_eq!(last.function, Action::GetContentTypes);
        assert_eq!(last.response.http_code, 200);
        assert_eq!(last.response.body, "not json");
    }

    #[test]
    fn next_successful_call_clears_last_error() {
        let stub = StubTransport::default()
            .reply(500, "boom")
            .reply(200, r#"{"status":"ok"}"#);
        let mut client = client(&stub);

        assert!(client.get_cart_items().is_err());
        assert!(client.last_error().is_some());
        assert_eq!(client.get_cart_items().unwrap(), json!({"status": "ok"}));
        assert!(client.last_error().is_none());
    }

    #[test]
    fn consignment_note_returns_raw_body_on_any_status() {
        let stub = StubTransport::default()
            .reply(200, "%PDF-1.4")
            .reply(500, "not json at all");
        let mut client = client(&stub);

        let note = client.get_consignment_note(&json!({"shipment_key": "abc"})).unwrap();
        assert_eq!(note, b"%PDF-1.4");
        assert!(client.last_error().is_none());

        let note = client.get_consignment_note(&json!({"shipment_key": "abc"})).unwrap();
        assert_eq!(note, b"not json at all");
        assert!(client.last_error().is_none());
        assert_eq!(
            stub.last_request().url,
            format!("{LIVE_URL}get_consignment_note")
        );
    }

    #[test]
    fn raw_call_clears_previous_error() {
        let stub = StubTransport::default()
            .reply(404, "Not Found")
            .reply(404, "Not Found");
        let mut client = client(&stub);

        assert!(client.me().is_err());
        assert!(client.last_error().is_some());
        client.get_consignment_note(&json!({})).unwrap();
        assert!(client.last_error().is_none());
    }

    #[test]
    fn caller_api_key_overrides_stored_key() {
        let stub = StubTransport::default().reply(200, "{}");
        let mut client = client(&stub);

        client
            .check_price(&json!({"api_key": "override", "weight": 2}))
            .unwrap();
        assert_eq!(stub.last_request().body, "api_key=override&weight=2");
    }

    #[test]
    fn transport_failure_is_distinct_and_not_recorded() {
        let stub = StubTransport::default().reply(404, "Not Found");
        let mut client = client(&stub);
        assert!(client.me().is_err());

        // The queue is now empty, so the stub refuses the connection.
        let err = client.me().unwrap_err();
        assert!(matches!(err, ApiError::Transport(_)));
        assert!(!err.is_application());
        assert!(client.last_error().is_none());
        assert!(matches!(client.me().nullable(), Err(ApiError::Transport(_))));
    }

    #[test]
    fn use_ssl_and_timeout_reach_the_transport() {
        let stub = StubTransport::default().reply(200, "{}");
        let config = ClientConfig::new("k1", "s1").with_timeout(Duration::from_secs(3));
        let mut client = SendParcelClient::with_transport(config, &stub);
        client.use_ssl(false);

        client.get_shipment_statuses().unwrap();
        let req = stub.last_request();
        assert!(!req.verify_tls);
        assert_eq!(req.timeout, Some(Duration::from_secs(3)));
    }

    #[test]
    fn shipment_keys_are_bracket_encoded() {
        let stub = StubTransport::default().reply(200, "{}").reply(200, "{}");
        let mut client = client(&stub);

        client.checkout(&["EP123", "EP456"]).unwrap();
        assert_eq!(
            stub.last_request().body,
            "api_key=k1&shipment_keys%5B0%5D=EP123&shipment_keys%5B1%5D=EP456"
        );

        let owned = vec!["EP789".to_string()];
        client.get_shipments(&owned).unwrap();
        assert_eq!(stub.last_request().body, "api_key=k1&shipment_keys%5B0%5D=EP789");
    }

    #[test]
    fn shipment_history_defaults_to_first_page() {
        let stub = StubTransport::default().reply(200, "[]").reply(200, "[]");
        let mut client = client(&stub);

        client.get_shipment_history(None).unwrap();
        assert_eq!(stub.last_request().body, "api_key=k1&page=1");
        client.get_shipment_history(Some(3)).unwrap();
        assert_eq!(stub.last_request().body, "api_key=k1&page=3");
    }

    #[test]
    fn typed_payloads_are_accepted() {
        #[derive(Serialize)]
        struct Order<'a> {
            integration_order_id: &'a str,
            weight: f64,
        }

        let stub = StubTransport::default().reply(200, "{}");
        let mut client = client(&stub);
        client
            .create_bulk_awb(&Order {
                integration_order_id: "ORD-1",
                weight: 0.5,
            })
            .unwrap();
        assert_eq!(
            stub.last_request().body,
            "api_key=k1&integration_order_id=ORD-1&weight=0.5"
        );
    }

    #[test]
    fn non_object_payload_is_rejected_before_sending() {
        let stub = StubTransport::default().reply(404, "Not Found");
        let mut client = client(&stub);
        assert!(client.me().is_err());

        let err = client.check_price(&["not", "a", "map"]).unwrap_err();
        assert!(matches!(err, ApiError::PayloadNotObject));
        assert_eq!(stub.seen.borrow().len(), 1);
        // No call was executed, so the previous record stands.
        assert!(client.last_error().is_some());
    }

    #[test]
    fn secret_is_never_transmitted() {
        let stub = StubTransport::default().reply(200, "{}");
        let mut client = client(&stub);
        client.me().unwrap();
        assert_eq!(client.config().api_secret, "s1");
        assert!(!stub.last_request().body.contains("s1"));
    }

    #[test]
    fn logged_data_masks_key_but_record_keeps_it() {
        let stub = StubTransport::default().reply(401, "Invalid API key");
        let mut client = client(&stub);
        assert!(client.me().is_err());

        let last = client.last_error().unwrap();
        assert_eq!(last.request.data["api_key"], "k1");

        let logged = logged_data(&last.request.data);
        assert_eq!(logged, r#"{"api_key":"<redacted>"}"#);
        assert!(!logged.contains("k1"));
    }

    #[test]
    fn boxed_transport_can_drive_a_client() {
        let stub = StubTransport::default().reply(200, r#"{"state":"PNG"}"#);
        let transport: Box<dyn Transport> = Box::new(stub);
        let mut client = SendParcelClient::with_transport(ClientConfig::new("k1", "s1"), transport);

        assert_eq!(
            client.get_postcode_details("10050").unwrap(),
            json!({"state": "PNG"})
        );
        assert!(client.last_error().is_none());
    }
}
