//! In-memory stand-in for the SendParcel API.
//!
//! Every action is a form POST to `/apiv1/{action}`. Requests must carry the
//! configured `api_key`. Shipments live in memory: `create_shipment` adds to
//! the cart, `checkout` assigns tracking numbers, and paid shipments can then
//! be listed, paged through, and downloaded as consignment notes.

use std::{collections::HashMap, sync::Arc};

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Form, Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::RwLock};
use uuid::Uuid;

pub const HISTORY_PAGE_SIZE: usize = 10;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Shipment {
    pub shipment_key: String,
    pub receiver_postcode: Option<String>,
    pub weight: Option<String>,
    pub tracking_no: Option<String>,
}

#[derive(Default)]
struct Store {
    cart: Vec<Shipment>,
    paid: Vec<Shipment>,
    bulk_orders: HashMap<String, String>,
    issued: u64,
}

impl Store {
    fn next_tracking_no(&mut self) -> String {
        self.issued += 1;
        format!("EP{:09}MY", self.issued)
    }
}

#[derive(Clone)]
struct AppState {
    api_key: Arc<str>,
    store: Arc<RwLock<Store>>,
}

type Fields = Vec<(String, String)>;

pub fn app(api_key: &str) -> Router {
    let state = AppState {
        api_key: Arc::from(api_key),
        store: Arc::new(RwLock::new(Store::default())),
    };
    Router::new()
        .route("/apiv1/{action}", post(dispatch))
        .with_state(state)
}

pub async fn run(listener: TcpListener, api_key: &str) -> Result<(), std::io::Error> {
    axum::serve(listener, app(api_key)).await
}

async fn dispatch(
    State(state): State<AppState>,
    Path(action): Path<String>,
    Form(fields): Form<Fields>,
) -> Response {
    tracing::info!(%action, fields = fields.len(), "request");

    if field(&fields, "api_key") != Some(&*state.api_key) {
        return (StatusCode::UNAUTHORIZED, "Invalid API key").into_response();
    }

    match action.as_str() {
        "me" => success(json!({
            "name": "Mock Merchant",
            "email": "merchant@example.test",
            "credit_balance": "100.00",
        })),
        "get_parcel_sizes" => success(json!([
            {"code": "flyers_s", "name": "Flyers S", "max_weight": "0.5"},
            {"code": "flyers_m", "name": "Flyers M", "max_weight": "1"},
            {"code": "box", "name": "Own Packaging", "max_weight": "30"},
        ])),
        "get_content_types" => success(json!(["document", "merchandise", "sample"])),
        "get_shipment_statuses" => success(json!([
            {"code": "pending", "name": "Pending"},
            {"code": "paid", "name": "Paid"},
            {"code": "delivered", "name": "Delivered"},
        ])),
        "get_postcode_details" => postcode_details(&fields),
        "check_price" => match field(&fields, "weight").and_then(parse_weight) {
            Some(weight) => success(json!({"price": price(weight)})),
            None => bad_request("weight is required"),
        },
        "check_price_bulk" => check_price_bulk(&fields),
        "create_shipment" => create_shipment(&state, &fields).await,
        "get_cart_items" => {
            let store = state.store.read().await;
            success(json!(store.cart))
        }
        "checkout" => checkout(&state, &fields).await,
        "get_shipments" => {
            let keys = indexed(&fields, "shipment_keys");
            let store = state.store.read().await;
            let found: Vec<&Shipment> = store
                .paid
                .iter()
                .filter(|s| keys.contains(&s.shipment_key.as_str()))
                .collect();
            success(json!(found))
        }
        "get_shipment_history" => shipment_history(&state, &fields).await,
        "get_consignment_note" => consignment_note(&state, &fields).await,
        "create_bulk_awb" => create_bulk_awb(&state, &fields).await,
        "get_bulk_tracking_no" => {
            let store = state.store.read().await;
            match field(&fields, "integration_order_id").and_then(|id| store.bulk_orders.get(id)) {
                Some(tracking_no) => success(json!({"tracking_no": tracking_no})),
                None => not_found(),
            }
        }
        _ => not_found(),
    }
}

fn postcode_details(fields: &Fields) -> Response {
    let details = match field(fields, "postcode") {
        Some("50000") => json!({"postcode": "50000", "city": "Kuala Lumpur", "state": "WP"}),
        Some("10050") => json!({"postcode": "10050", "city": "George Town", "state": "PNG"}),
        Some(_) => return not_found(),
        None => return bad_request("postcode is required"),
    };
    success(details)
}

fn check_price_bulk(fields: &Fields) -> Response {
    let prices: Option<Vec<Value>> = fields
        .iter()
        .filter(|(k, _)| k.ends_with("[weight]"))
        .map(|(_, v)| parse_weight(v).map(|w| json!({"price": price(w)})))
        .collect();
    match prices {
        Some(prices) if !prices.is_empty() => success(json!(prices)),
        _ => bad_request("items[n][weight] is required"),
    }
}

async fn create_shipment(state: &AppState, fields: &Fields) -> Response {
    let shipment = Shipment {
        shipment_key: Uuid::new_v4().to_string(),
        receiver_postcode: field(fields, "receiver_postcode").map(str::to_string),
        weight: field(fields, "weight").map(str::to_string),
        tracking_no: None,
    };
    let key = shipment.shipment_key.clone();
    state.store.write().await.cart.push(shipment);
    success(json!({"shipment_key": key}))
}

async fn checkout(state: &AppState, fields: &Fields) -> Response {
    let keys = indexed(fields, "shipment_keys");
    if keys.is_empty() {
        return bad_request("shipment_keys is required");
    }

    let mut store = state.store.write().await;
    let (selected, remaining): (Vec<_>, Vec<_>) = std::mem::take(&mut store.cart)
        .into_iter()
        .partition(|s| keys.contains(&s.shipment_key.as_str()));
    store.cart = remaining;

    let mut checked_out = Vec::with_capacity(selected.len());
    for mut shipment in selected {
        shipment.tracking_no = Some(store.next_tracking_no());
        checked_out.push(shipment.clone());
        store.paid.push(shipment);
    }
    success(json!(checked_out))
}

async fn shipment_history(state: &AppState, fields: &Fields) -> Response {
    let page = match field(fields, "page").map(str::parse::<usize>) {
        Some(Ok(page)) if page >= 1 => page,
        None => 1,
        _ => return bad_request("page must be a positive integer"),
    };
    let store = state.store.read().await;
    let items: Vec<&Shipment> = store
        .paid
        .iter()
        .skip((page - 1) * HISTORY_PAGE_SIZE)
        .take(HISTORY_PAGE_SIZE)
        .collect();
    success(json!({"page": page, "total": store.paid.len(), "items": items}))
}

async fn consignment_note(state: &AppState, fields: &Fields) -> Response {
    let store = state.store.read().await;
    let shipment = field(fields, "shipment_key")
        .and_then(|key| store.paid.iter().find(|s| s.shipment_key == key));
    match shipment {
        Some(shipment) => {
            let tracking_no = shipment.tracking_no.as_deref().unwrap_or_default();
            let pdf = format!("%PDF-1.4\n% consignment note {tracking_no}\n%%EOF\n");
            ([(header::CONTENT_TYPE, "application/pdf")], pdf).into_response()
        }
        None => not_found(),
    }
}

async fn create_bulk_awb(state: &AppState, fields: &Fields) -> Response {
    let Some(order_id) = field(fields, "integration_order_id") else {
        return bad_request("integration_order_id is required");
    };
    let mut store = state.store.write().await;
    let tracking_no = store.next_tracking_no();
    store
        .bulk_orders
        .insert(order_id.to_string(), tracking_no.clone());
    success(json!({"integration_order_id": order_id, "tracking_no": tracking_no}))
}

fn field<'a>(fields: &'a Fields, name: &str) -> Option<&'a str> {
    fields
        .iter()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.as_str())
}

/// Values of `prefix[0]`, `prefix[1]`, ... in submission order.
fn indexed<'a>(fields: &'a Fields, prefix: &str) -> Vec<&'a str> {
    fields
        .iter()
        .filter(|(k, _)| {
            k.strip_prefix(prefix)
                .and_then(|rest| rest.strip_prefix('['))
                .and_then(|rest| rest.strip_suffix(']'))
                .is_some_and(|index| index.parse::<usize>().is_ok())
        })
        .map(|(_, v)| v.as_str())
        .collect()
}

fn parse_weight(raw: &str) -> Option<f64> {
    raw.parse::<f64>().ok().filter(|w| *w > 0.0)
}

/// RM6.00 for the first kilogram, RM2.00 for each started kilogram after.
fn price(weight: f64) -> String {
    let extra = (weight.ceil() - 1.0).max(0.0);
    format!("{:.2}", 6.0 + 2.0 * extra)
}

fn success(data: Value) -> Response {
    Json(json!({"status": "success", "data": data})).into_response()
}

fn bad_request(message: &str) -> Response {
    (
        StatusCode::UNPROCESSABLE_ENTITY,
        Json(json!({"status": "error", "message": message})),
    )
        .into_response()
}

fn not_found() -> Response {
    (StatusCode::NOT_FOUND, "Not Found").into_response()
}
