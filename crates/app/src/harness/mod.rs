use anyhow::{Context, Result, bail};
use serde_json::Value;
use tracing::info;

use crate::client::ApiClient;
use crate::config::{SellerRange, load_config};
use crate::fixtures::unique_seller_id;

pub mod stub;
pub use stub::{CreateShape, StubServer, StubState};

/// Set to `1` (or `true`) to also run the regression tests against the
/// configured deployment. Those runs leave items behind: the API has no delete.
pub const LIVE_ENV_VAR: &str = "CLASSIFIEDS_LIVE";

pub fn live_api_enabled() -> bool {
    matches!(
        std::env::var(LIVE_ENV_VAR).as_deref(),
        Ok("1") | Ok("true")
    )
}

/// Install a test-friendly subscriber once; later calls are no-ops.
pub fn init_test_tracing() {
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "warn".into());
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_test_writer()
        .try_init();
}

/// Run `check` against every target from [`Target::all`], tagging failures
/// with the target name.
pub fn for_each_target(mut check: impl FnMut(&Target) -> Result<()>) -> Result<()> {
    for target in Target::all()? {
        check(&target).with_context(|| format!("target {}", target.name()))?;
    }
    Ok(())
}

/// A deployment the regression tests run against: either a private stub or
/// the configured remote API.
pub struct Target {
    name: String,
    client: ApiClient,
    sellers: SellerRange,
    stub: Option<StubServer>,
}

impl Target {
    pub fn stub(shape: CreateShape) -> Result<Self> {
        let server = StubServer::start(shape)?;
        Ok(Self {
            name: format!("stub-{shape:?}").to_lowercase(),
            client: ApiClient::new(&server.api_config()),
            sellers: SellerRange::default(),
            stub: Some(server),
        })
    }

    pub fn live() -> Result<Self> {
        let config = load_config(None)?;
        info!(base_url = %config.api.base_url, "targeting live deployment");
        Ok(Self {
            name: "live".into(),
            client: ApiClient::new(&config.api),
            sellers: config.sellers,
            stub: None,
        })
    }

    /// The default stub, plus the live deployment when [`LIVE_ENV_VAR`] is set.
    pub fn all() -> Result<Vec<Self>> {
        init_test_tracing();
        let mut targets = vec![Self::stub(CreateShape::default())?];
        if live_api_enabled() {
            targets.push(Self::live()?);
        } else {
            eprintln!("live deployment skipped: set {LIVE_ENV_VAR}=1 to include it");
        }
        Ok(targets)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    pub fn stub_state(&self) -> Option<&StubState> {
        self.stub.as_ref().map(StubServer::state)
    }

    pub fn seller_id(&self) -> i64 {
        unique_seller_id(&self.sellers)
    }

    /// Create an item and resolve it to its record, failing when the record
    /// cannot be identified (no `id`).
    pub fn created_item(&self, payload: &Value) -> Result<Value> {
        let normalized = self
            .client
            .create_and_normalize(payload)
            .with_context(|| format!("[{}] failed to create item", self.name))?;
        let item = normalized.into_value();
        if item.get("id").is_none() {
            bail!("[{}] response doesn't contain 'id': {item}", self.name);
        }
        Ok(item)
    }
}
