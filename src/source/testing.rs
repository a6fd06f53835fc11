//! Test doubles for the database collaborators

use super::{EngineProvider, QueryEngine, WarehouseConnection, WarehouseConnector};
use crate::error::BoxError;
use crate::table::Table;
use async_trait::async_trait;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub fn sample_table() -> Table {
    Table::new(
        vec!["trade_id".to_string(), "desk".to_string(), "notional".to_string()],
        vec![
            vec![json!(1), json!("rates"), json!(1000000.5)],
            vec![json!(2), json!("fx"), json!(250000)],
        ],
    )
    .unwrap()
}

#[derive(Default)]
pub struct FakeWarehouse {
    table: Table,
    unreachable: bool,
    fail_query: bool,
    fail_close: bool,
    connect_delay: Option<Duration>,
    queries: Arc<Mutex<Vec<String>>>,
    pub connects: Arc<AtomicUsize>,
    pub closes: Arc<AtomicUsize>,
}

impl FakeWarehouse {
    pub fn returning(table: Table) -> Self {
        Self {
            table,
            ..Self::default()
        }
    }

    pub fn unreachable() -> Self {
        Self {
            unreachable: true,
            ..Self::default()
        }
    }

    pub fn failing_query(mut self) -> Self {
        self.fail_query = true;
        self
    }

    pub fn failing_close(mut self) -> Self {
        self.fail_close = true;
        self
    }

    pub fn with_connect_delay(mut self, delay: Duration) -> Self {
        self.connect_delay = Some(delay);
        self
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl WarehouseConnector for FakeWarehouse {
    async fn connect(&self) -> Result<Box<dyn WarehouseConnection>, BoxError> {
        if let Some(delay) = self.connect_delay {
            tokio::time::sleep(delay).await;
        }
        if self.unreachable {
            return Err("could not connect to server: Connection refused".into());
        }
        self.connects.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeConnection {
            table: self.table.clone(),
            fail_query: self.fail_query,
            fail_close: self.fail_close,
            queries: self.queries.clone(),
            closes: self.closes.clone(),
        }))
    }
}

struct FakeConnection {
    table: Table,
    fail_query: bool,
    fail_close: bool,
    queries: Arc<Mutex<Vec<String>>>,
    closes: Arc<AtomicUsize>,
}

#[async_trait]
impl WarehouseConnection for FakeConnection {
    async fn query(&mut self, sql: &str) -> Result<Table, BoxError> {
        self.queries.lock().unwrap().push(sql.to_string());
        match self.fail_query {
            true => Err("query failed: relation does not exist".into()),
            false => Ok(self.table.clone()),
        }
    }

    async fn close(self: Box<Self>) -> Result<(), BoxError> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        match self.fail_close {
            true => Err("close failed: connection reset".into()),
            false => Ok(()),
        }
    }
}

/// Engine provider that knows a fixed set of DSNs
pub struct FakeEngines {
    dsn: String,
    table: Table,
    pub resolved: AtomicUsize,
}

impl FakeEngines {
    pub fn new(dsn: &str, table: Table) -> Self {
        Self {
            dsn: dsn.to_string(),
            table,
            resolved: AtomicUsize::new(0),
        }
    }
}

impl EngineProvider for FakeEngines {
    fn engine(&self, dsn: &str) -> Result<Arc<dyn QueryEngine>, BoxError> {
        self.resolved.fetch_add(1, Ordering::SeqCst);
        if dsn != self.dsn {
            return Err(format!("data source name '{}' not found", dsn).into());
        }
        Ok(Arc::new(FakeEngine(self.table.clone())))
    }
}

pub struct FakeEngine(pub Table);

#[async_trait]
impl QueryEngine for FakeEngine {
    async fn query(&self, sql: &str) -> Result<Table, BoxError> {
        if sql.trim().is_empty() {
            return Err("syntax error at end of input".into());
        }
        Ok(self.0.clone())
    }
}
