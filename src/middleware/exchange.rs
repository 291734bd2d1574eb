//! Propagates newly created rows to other tables or external endpoints, per data_exchange contract.
//! Runs last in after-create so it only sees committed, validated rows. Push failures are logged
//! and never undo the create.

use crate::config::{CmsConfig, ExchangeContract, ExchangeTarget, TableInfo};
use crate::error::AppError;
use crate::middleware::{
    DatabaseRequestInterceptor, Operation, Phase, RequestContext, GROUPS_COLUMN, OWNER_COLUMN, PERMISSION_COLUMN,
    REFERENCE_ID_COLUMN,
};
use crate::permission::Actor;
use crate::registry::RegistryCell;
use crate::util::in_array_index;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::time::Duration;

/// Columns the target manages for itself; never carried over from the source row.
const SYSTEM_COLUMNS: [&str; 7] = [
    REFERENCE_ID_COLUMN,
    "id",
    "created_at",
    "updated_at",
    PERMISSION_COLUMN,
    OWNER_COLUMN,
    GROUPS_COLUMN,
];

pub struct ExchangeMiddleware {
    contracts: Vec<ExchangeContract>,
    registry: RegistryCell,
    client: reqwest::Client,
    timeout: Duration,
}

impl ExchangeMiddleware {
    /// Table contracts whose target can lead back to their own source table are dropped,
    /// so a create never propagates in a loop.
    pub fn new(config: &CmsConfig, registry: RegistryCell) -> Self {
        let all = &config.exchanges;
        let contracts = all
            .iter()
            .filter(|c| match &c.target {
                ExchangeTarget::Table { name } if reaches(all, name, &c.source_table) => {
                    tracing::warn!(
                        exchange = %c.name,
                        source = %c.source_table,
                        target = %name,
                        "exchange would loop back to its source table, ignoring"
                    );
                    false
                }
                _ => true,
            })
            .cloned()
            .collect();
        ExchangeMiddleware {
            contracts,
            registry,
            client: reqwest::Client::new(),
            timeout: config.exchange_timeout,
        }
    }

    pub fn contracts(&self) -> &[ExchangeContract] {
        &self.contracts
    }

    /// Rename attributes per contract, leaving out system columns.
    fn payload(contract: &ExchangeContract, row: &Value) -> Map<String, Value> {
        let mut out = Map::new();
        if let Some(obj) = row.as_object() {
            for (k, v) in obj {
                if in_array_index(&k.as_str(), &SYSTEM_COLUMNS).is_some() {
                    continue;
                }
                let key = contract.attributes.get(k).cloned().unwrap_or_else(|| k.clone());
                out.insert(key, v.clone());
            }
        }
        out
    }

    async fn push(&self, contract: &ExchangeContract, payload: Map<String, Value>) -> Result<(), AppError> {
        match &contract.target {
            ExchangeTarget::Table { name } => {
                let registry = self
                    .registry
                    .get()
                    .ok_or_else(|| AppError::Exchange("resource registry not published yet".into()))?;
                let target = registry
                    .get(name)
                    .ok_or_else(|| AppError::Exchange(format!("unknown target table {}", name)))?;
                target
                    .create(&Actor::system(), fit_to_table(target.table(), payload))
                    .await?;
            }
            ExchangeTarget::Webhook { url, headers } => {
                let mut request = self.client.post(url).timeout(self.timeout).json(&payload);
                for (k, v) in headers {
                    request = request.header(k.as_str(), v.as_str());
                }
                request
                    .send()
                    .await
                    .and_then(reqwest::Response::error_for_status)
                    .map_err(|e| AppError::Exchange(e.to_string()))?;
            }
        }
        Ok(())
    }
}

/// Keep only the attributes `table` exposes through the API.
fn fit_to_table(table: &TableInfo, mut payload: Map<String, Value>) -> Value {
    payload.retain(|k, _| table.column(k).is_some_and(|c| c.include_in_api));
    Value::Object(payload)
}

/// True when following table contracts from `from` arrives at `to`.
fn reaches<'a>(contracts: &'a [ExchangeContract], from: &'a str, to: &str) -> bool {
    let mut stack = vec![from];
    let mut seen: Vec<&str> = Vec::new();
    while let Some(table) = stack.pop() {
        if table == to {
            return true;
        }
        if in_array_index(&table, &seen).is_some() {
            continue;
        }
        seen.push(table);
        for c in contracts.iter().filter(|c| c.source_table == table) {
            if let ExchangeTarget::Table { name } = &c.target {
                stack.push(name);
            }
        }
    }
    false
}

#[async_trait]
impl DatabaseRequestInterceptor for ExchangeMiddleware {
    fn name(&self) -> &'static str {
        "exchange_middleware"
    }

    async fn intercept(&self, ctx: &RequestContext<'_>, rows: Vec<Value>) -> Result<Vec<Value>, AppError> {
        if ctx.phase != Phase::After || ctx.operation != Operation::Create {
            return Ok(rows);
        }
        for contract in self.contracts.iter().filter(|c| c.source_table == ctx.table.table_name) {
            for row in &rows {
                if let Err(e) = self.push(contract, Self::payload(contract, row)).await {
                    tracing::warn!(exchange = %contract.name, error = %e, "exchange push failed");
                }
            }
        }
        Ok(rows)
    }
}
