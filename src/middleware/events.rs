//! Lifecycle event handlers: stamp identity on create, guard immutable columns on update,
//! and publish a `ResourceEvent` once an operation has completed.

use crate::error::AppError;
use crate::middleware::{DatabaseRequestInterceptor, Operation, Phase, RequestContext, OWNER_COLUMN, REFERENCE_ID_COLUMN};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::broadcast;

const EVENT_CAPACITY: usize = 1024;

/// Columns a client may never change after creation.
const IMMUTABLE_COLUMNS: [&str; 2] = [REFERENCE_ID_COLUMN, "created_at"];

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ResourceEvent {
    pub table: String,
    pub operation: Operation,
    pub reference_id: Option<String>,
    pub actor: Option<String>,
}

/// Fan-out of completed operations to in-process subscribers. Events sent with no subscriber are dropped.
#[derive(Clone, Debug)]
pub struct EventBus {
    tx: broadcast::Sender<ResourceEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        EventBus::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CAPACITY);
        EventBus { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ResourceEvent> {
        self.tx.subscribe()
    }

    pub fn publish(&self, event: ResourceEvent) {
        let _ = self.tx.send(event);
    }
}

#[derive(Clone, Debug)]
pub struct EventHandler {
    operation: Operation,
    bus: EventBus,
}

impl EventHandler {
    pub fn new_find_one(bus: EventBus) -> Self {
        EventHandler {
            operation: Operation::FindOne,
            bus,
        }
    }

    pub fn new_create(bus: EventBus) -> Self {
        EventHandler {
            operation: Operation::Create,
            bus,
        }
    }

    pub fn new_update(bus: EventBus) -> Self {
        EventHandler {
            operation: Operation::Update,
            bus,
        }
    }

    pub fn new_delete(bus: EventBus) -> Self {
        EventHandler {
            operation: Operation::Delete,
            bus,
        }
    }

    fn before(&self, ctx: &RequestContext<'_>, mut rows: Vec<Value>) -> Vec<Value> {
        match self.operation {
            Operation::Create => {
                for row in rows.iter_mut().filter_map(Value::as_object_mut) {
                    if ctx.table.has_column(REFERENCE_ID_COLUMN) && !row.contains_key(REFERENCE_ID_COLUMN) {
                        row.insert(
                            REFERENCE_ID_COLUMN.into(),
                            Value::String(uuid::Uuid::new_v4().to_string()),
                        );
                    }
                    if let Some(owner) = &ctx.actor.reference_id {
                        if ctx.table.has_column(OWNER_COLUMN) && !row.contains_key(OWNER_COLUMN) {
                            row.insert(OWNER_COLUMN.into(), Value::String(owner.clone()));
                        }
                    }
                }
            }
            Operation::Update => {
                for row in rows.iter_mut().filter_map(Value::as_object_mut) {
                    for col in IMMUTABLE_COLUMNS {
                        row.remove(col);
                    }
                    if !ctx.actor.is_admin {
                        row.remove(OWNER_COLUMN);
                    }
                }
            }
            _ => {}
        }
        rows
    }

    fn after(&self, ctx: &RequestContext<'_>, rows: &[Value]) {
        let reference_ids: Vec<Option<String>> = if rows.is_empty() {
            vec![ctx
                .existing
                .and_then(|r| r.get(REFERENCE_ID_COLUMN))
                .and_then(Value::as_str)
                .map(String::from)]
        } else {
            rows.iter()
                .map(|r| r.get(REFERENCE_ID_COLUMN).and_then(Value::as_str).map(String::from))
                .collect()
        };
        for reference_id in reference_ids {
            self.bus.publish(ResourceEvent {
                table: ctx.table.table_name.clone(),
                operation: self.operation,
                reference_id,
                actor: ctx.actor.reference_id.clone(),
            });
        }
    }
}

#[async_trait]
impl DatabaseRequestInterceptor for EventHandler {
    fn name(&self) -> &'static str {
        match self.operation {
            Operation::FindAll => "find_all_event_handler",
            Operation::FindOne => "find_one_event_handler",
            Operation::Create => "create_event_handler",
            Operation::Update => "update_event_handler",
            Operation::Delete => "delete_event_handler",
        }
    }

    async fn intercept(&self, ctx: &RequestContext<'_>, rows: Vec<Value>) -> Result<Vec<Value>, AppError> {
        match ctx.phase {
            Phase::Before => Ok(self.before(ctx, rows)),
            Phase::After => {
                self.after(ctx, &rows);
                Ok(rows)
            }
        }
    }
}
