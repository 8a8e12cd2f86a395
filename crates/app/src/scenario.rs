use std::{fs::OpenOptions, io::Write, path::PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{info, warn};

use crate::client::{ApiClient, ApiResponse};
use crate::error::is_not_found_tolerant;
use crate::fixtures::sample_payload;
use crate::model::{Item, NewItem};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub step: String,
    pub status: Option<u16>,
    pub ok: bool,
    pub detail: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SmokeReport {
    pub observations: Vec<Observation>,
}

impl SmokeReport {
    pub fn passed(&self) -> bool {
        !self.observations.is_empty() && self.observations.iter().all(|o| o.ok)
    }

    pub fn failures(&self) -> impl Iterator<Item = &Observation> {
        self.observations.iter().filter(|o| !o.ok)
    }
}

/// End-to-end pass over every endpoint: create, resolve the record, read it
/// back by id, read its statistics, find it in the seller listing, and check
/// that an unknown id is refused.
pub struct SmokeRun<'a> {
    client: &'a ApiClient,
    seller_id: i64,
    observations: Option<PathBuf>,
}

impl<'a> SmokeRun<'a> {
    pub fn new(client: &'a ApiClient, seller_id: i64) -> Self {
        Self {
            client,
            seller_id,
            observations: None,
        }
    }

    /// Append each observation as a JSON line to `path`.
    pub fn record_to(mut self, path: impl Into<PathBuf>) -> Self {
        self.observations = Some(path.into());
        self
    }

    pub fn run(&self) -> Result<SmokeReport> {
        let mut report = SmokeReport::default();
        let expected = NewItem::sample(self.seller_id);

        let normalized = match self.client.create_and_normalize(&sample_payload(self.seller_id)) {
            Ok(normalized) => normalized,
            Err(err) => {
                self.push(&mut report, "create", err.status(), false, err.to_string())?;
                return Ok(report);
            }
        };
        let id = normalized
            .item()
            .and_then(|item| item.get("id"))
            .and_then(Value::as_str)
            .map(str::to_owned);
        let Some(id) = id else {
            let detail = format!("could not resolve created item: {}", normalized.into_value());
            self.push(&mut report, "create", Some(200), false, detail)?;
            return Ok(report);
        };
        self.push(&mut report, "create", Some(200), true, format!("id {id}"))?;

        let step = self.check(self.client.get_item(&id), |body| {
            let item = first(body).and_then(|v| Item::from_value(v).ok());
            match item {
                Some(item) if item.id == id && item.matches(&expected) => Ok(()),
                Some(item) => Err(format!("record differs from request: {item:?}")),
                None => Err(format!("no item record in {body}")),
            }
        });
        self.push_step(&mut report, "get_item", step)?;

        let step = self.check(self.client.statistic(&id), |body| {
            let stats = first(body).cloned().unwrap_or(Value::Null);
            if stats == json!(expected.statistics) {
                Ok(())
            } else {
                Err(format!("statistics differ: {stats}"))
            }
        });
        self.push_step(&mut report, "statistic", step)?;

        let seller = self.seller_id.to_string();
        let step = self.check(self.client.seller_items(&seller), |body| {
            let items = body.as_array().ok_or_else(|| format!("not an array: {body}"))?;
            if !items.iter().any(|item| item["id"] == id.as_str()) {
                return Err(format!("item {id} missing from seller listing"));
            }
            if let Some(stray) = items.iter().find(|item| item["sellerId"] != self.seller_id) {
                return Err(format!("listing contains another seller's item: {stray}"));
            }
            Ok(())
        });
        self.push_step(&mut report, "seller_items", step)?;

        let step = match self.client.get_item("nonexistent-id-12345") {
            Ok(response) if is_not_found_tolerant(response.status) => {
                (Some(response.status), true, "unknown id refused".to_string())
            }
            Ok(response) => (
                Some(response.status),
                false,
                format!("unexpected answer for unknown id: {}", response.text),
            ),
            Err(err) => (None, false, err.to_string()),
        };
        self.push_step(&mut report, "unknown_item", step)?;

        Ok(report)
    }

    /// Require a 200 with a JSON body and apply `verify` to it.
    fn check(
        &self,
        response: Result<ApiResponse, crate::error::ApiError>,
        verify: impl FnOnce(&Value) -> Result<(), String>,
    ) -> (Option<u16>, bool, String) {
        let response = match response {
            Ok(response) => response,
            Err(err) => return (None, false, err.to_string()),
        };
        let status = Some(response.status);
        if !response.is_success() {
            return (status, false, format!("HTTP {}: {}", response.status, response.text));
        }
        match response.json() {
            Ok(body) => match verify(&body) {
                Ok(()) => (status, true, "ok".into()),
                Err(detail) => (status, false, detail),
            },
            Err(err) => (status, false, err.to_string()),
        }
    }

    fn push_step(
        &self,
        report: &mut SmokeReport,
        step: &str,
        (status, ok, detail): (Option<u16>, bool, String),
    ) -> Result<()> {
        self.push(report, step, status, ok, detail)
    }

    fn push(
        &self,
        report: &mut SmokeReport,
        step: &str,
        status: Option<u16>,
        ok: bool,
        detail: String,
    ) -> Result<()> {
        if ok {
            info!(step, ?status, %detail, "smoke step passed");
        } else {
            warn!(step, ?status, %detail, "smoke step failed");
        }
        let observation = Observation {
            step: step.to_string(),
            status,
            ok,
            detail,
        };
        self.record(&observation)?;
        report.observations.push(observation);
        Ok(())
    }

    fn record(&self, observation: &Observation) -> Result<()> {
        let Some(path) = &self.observations else {
            return Ok(());
        };
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("failed to open {}", path.display()))?;
        writeln!(file, "{}", serde_json::to_string(observation)?)
            .with_context(|| format!("failed to write {}", path.display()))?;
        Ok(())
    }
}

fn first(body: &Value) -> Option<&Value> {
    body.as_array().and_then(|items| items.first())
}
