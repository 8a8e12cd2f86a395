//! In-process stand-in for the classifieds API.
//!
//! Reproduces the contract the suite relies on (routes, validation, 400/404
//! error envelopes, array-wrapped lookups) so the regression tests and the
//! normalizer can be exercised without the public deployment. The create
//! response shape is selectable to cover every variant the normalizer handles.

use std::{
    collections::BTreeMap,
    net::SocketAddr,
    sync::Arc,
    thread::{self, JoinHandle},
};

use anyhow::{Context, Result};
use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, State},
    http::{
        HeaderMap, HeaderName, StatusCode,
        header::{ACCEPT, CONTENT_TYPE},
    },
    routing::{get, post},
};
use chrono::Utc;
use clap::ValueEnum;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::sync::oneshot;
use tracing::{error, info};
use uuid::Uuid;

use crate::config::ApiConfig;
use crate::model::{Item, Statistics};

/// Prefix of the status string the service answers a create call with.
pub const CREATED_MESSAGE: &str = "Сохранили объявление";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum CreateShape {
    /// `{"status": "Сохранили объявление - <id>"}`
    #[default]
    Status,
    /// The created record as an object.
    Record,
    /// The created record wrapped in a one-element array.
    Listed,
}

#[derive(Clone)]
pub struct StubState {
    inner: Arc<StubInner>,
}

struct StubInner {
    shape: CreateShape,
    items: RwLock<Vec<Item>>,
    hits: Mutex<BTreeMap<&'static str, usize>>,
}

impl StubState {
    pub fn new(shape: CreateShape) -> Self {
        Self {
            inner: Arc::new(StubInner {
                shape,
                items: RwLock::new(Vec::new()),
                hits: Mutex::new(BTreeMap::new()),
            }),
        }
    }

    pub fn shape(&self) -> CreateShape {
        self.inner.shape
    }

    /// Requests served so far by `route` (`create`, `get_item`, `seller_items`, `statistic`).
    pub fn hits(&self, route: &str) -> usize {
        self.inner.hits.lock().get(route).copied().unwrap_or_default()
    }

    pub fn item_count(&self) -> usize {
        self.inner.items.read().len()
    }

    fn hit(&self, route: &'static str) {
        *self.inner.hits.lock().entry(route).or_default() += 1;
    }

    fn find(&self, id: &str) -> Option<Item> {
        self.inner
            .items
            .read()
            .iter()
            .find(|item| item.id == id)
            .cloned()
    }
}

pub fn router(state: StubState) -> Router {
    Router::new()
        .route("/api/{version}/item", post(create_item))
        .route("/api/{version}/item/{id}", get(get_item))
        .route("/api/{version}/statistic/{id}", get(get_statistic))
        .route("/api/{version}/{seller_id}/item", get(seller_items))
        .with_state(state)
}

type Reply = (StatusCode, Json<Value>);

async fn create_item(State(state): State<StubState>, headers: HeaderMap, body: Bytes) -> Reply {
    state.hit("create");
    if !header_mentions(&headers, CONTENT_TYPE, &[JSON_MEDIA_TYPE]) {
        return failure(
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
            "Content-Type must be application/json".into(),
        );
    }
    if !header_mentions(&headers, ACCEPT, &[JSON_MEDIA_TYPE, "*/*"]) {
        return failure(
            StatusCode::NOT_ACCEPTABLE,
            "Accept must allow application/json".into(),
        );
    }
    let payload: Value = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(err) => return failure(StatusCode::BAD_REQUEST, format!("invalid JSON: {err}")),
    };
    let (seller_id, name, price, statistics) = match validate(&payload) {
        Ok(fields) => fields,
        Err(message) => return failure(StatusCode::BAD_REQUEST, message),
    };

    let item = Item {
        id: Uuid::new_v4().to_string(),
        seller_id,
        name,
        price,
        statistics,
        created_at: Utc::now().to_rfc3339(),
    };
    info!(id = %item.id, seller_id, "stub stored item");
    state.inner.items.write().push(item.clone());

    let body = match state.shape() {
        CreateShape::Status => json!({"status": format!("{CREATED_MESSAGE} - {}", item.id)}),
        CreateShape::Record => json!(item),
        CreateShape::Listed => json!([item]),
    };
    (StatusCode::OK, Json(body))
}

async fn get_item(
    State(state): State<StubState>,
    Path((_version, id)): Path<(String, String)>,
) -> Reply {
    state.hit("get_item");
    match lookup(&state, &id) {
        Ok(item) => (StatusCode::OK, Json(json!([item]))),
        Err(reply) => reply,
    }
}

async fn get_statistic(
    State(state): State<StubState>,
    Path((_version, id)): Path<(String, String)>,
) -> Reply {
    state.hit("statistic");
    match lookup(&state, &id) {
        Ok(item) => (StatusCode::OK, Json(json!([item.statistics]))),
        Err(reply) => reply,
    }
}

async fn seller_items(
    State(state): State<StubState>,
    Path((_version, seller)): Path<(String, String)>,
) -> Reply {
    state.hit("seller_items");
    let Ok(seller_id) = seller.parse::<i64>() else {
        return failure(
            StatusCode::BAD_REQUEST,
            format!("invalid sellerID: {seller}"),
        );
    };
    let items: Vec<Item> = state
        .inner
        .items
        .read()
        .iter()
        .filter(|item| item.seller_id == seller_id)
        .cloned()
        .collect();
    (StatusCode::OK, Json(json!(items)))
}

/// Malformed ids answer 400, well-formed unknown ids 404.
fn lookup(state: &StubState, id: &str) -> Result<Item, Reply> {
    if Uuid::parse_str(id).is_err() {
        return Err(failure(
            StatusCode::BAD_REQUEST,
            format!("item id is not a UUID: {id}"),
        ));
    }
    state
        .find(id)
        .ok_or_else(|| failure(StatusCode::NOT_FOUND, format!("item {id} not found")))
}

/// Required fields must be present, correctly typed and non-zero.
fn validate(payload: &Value) -> Result<(i64, String, i64, Statistics), String> {
    let seller_id = required_int(payload, "sellerID")?;
    let name = payload
        .get("name")
        .and_then(Value::as_str)
        .filter(|name| !name.is_empty())
        .ok_or_else(|| "field name is required".to_string())?
        .to_string();
    let price = required_int(payload, "price")?;
    let stats = payload
        .get("statistics")
        .filter(|stats| stats.is_object())
        .ok_or_else(|| "field statistics is required".to_string())?;
    let statistics = Statistics {
        likes: required_int(stats, "likes")?,
        view_count: required_int(stats, "viewCount")?,
        contacts: required_int(stats, "contacts")?,
    };
    Ok((seller_id, name, price, statistics))
}

fn required_int(value: &Value, field: &str) -> Result<i64, String> {
    value
        .get(field)
        .and_then(Value::as_i64)
        .filter(|n| *n != 0)
        .ok_or_else(|| format!("field {field} is required"))
}

const JSON_MEDIA_TYPE: &str = "application/json";

fn header_mentions(headers: &HeaderMap, name: HeaderName, accepted: &[&str]) -> bool {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| accepted.iter().any(|media| value.contains(media)))
}

fn failure(status: StatusCode, message: String) -> Reply {
    (
        status,
        Json(json!({
            "result": {"message": message, "messages": {}},
            "status": status.as_u16().to_string(),
        })),
    )
}

/// Stub bound to an ephemeral localhost port, served from its own runtime
/// thread. Dropping it stops the server.
pub struct StubServer {
    addr: SocketAddr,
    state: StubState,
    shutdown: Option<oneshot::Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl StubServer {
    pub fn start(shape: CreateShape) -> Result<Self> {
        let listener = std::net::TcpListener::bind("127.0.0.1:0")
            .context("failed to bind stub listener")?;
        listener
            .set_nonblocking(true)
            .context("failed to make stub listener non-blocking")?;
        let addr = listener
            .local_addr()
            .context("failed to read stub listener address")?;

        let state = StubState::new(shape);
        let app = router(state.clone());
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()
            .context("failed to build stub runtime")?;
        let (tx, rx) = oneshot::channel::<()>();

        let thread = thread::Builder::new()
            .name("classifieds-stub".into())
            .spawn(move || {
                runtime.block_on(async move {
                    let listener = match tokio::net::TcpListener::from_std(listener) {
                        Ok(listener) => listener,
                        Err(err) => {
                            error!(?err, "stub listener unusable");
                            return;
                        }
                    };
                    let shutdown = async {
                        let _ = rx.await;
                    };
                    if let Err(err) = axum::serve(listener, app)
                        .with_graceful_shutdown(shutdown)
                        .await
                    {
                        error!(?err, "stub server stopped");
                    }
                });
            })
            .context("failed to spawn stub server thread")?;

        info!(%addr, ?shape, "stub API listening");
        Ok(Self {
            addr,
            state,
            shutdown: Some(tx),
            thread: Some(thread),
        })
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn api_config(&self) -> ApiConfig {
        ApiConfig::with_base_url(self.base_url())
    }

    pub fn state(&self) -> &StubState {
        &self.state
    }
}

impl Drop for StubServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}
