//! Client seam between the harness and the wire-protocol library.
//!
//! Phases only talk to these traits. `mysql.rs` implements them on top of
//! `mysql_async`; tests substitute scripted in-memory servers.

use anyhow::Result;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

use crate::config::{PoolConfig, Target};

/// A named query expected to return exactly one row of scalar columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScalarQuery {
    pub label: String,
    pub sql: String,
}

impl ScalarQuery {
    pub fn new(label: impl Into<String>, sql: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            sql: sql.into(),
        }
    }
}

/// Column values of a single result row, rendered as text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScalarRow {
    pub columns: Vec<String>,
}

impl ScalarRow {
    pub fn new(columns: Vec<String>) -> Self {
        Self { columns }
    }
}

impl fmt::Display for ScalarRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.columns.join(", "))
    }
}

/// Opens sessions and pools against a Target Server.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Open one dedicated connection. Implementations may connect lazily;
    /// callers confirm liveness with [`Session::ping`].
    async fn open(&self, target: &Target) -> Result<Box<dyn Session>>;

    /// Create a pool handle shared by concurrent callers.
    async fn open_pool(&self, target: &Target, limits: &PoolConfig) -> Result<Arc<dyn SharedPool>>;
}

/// A single dedicated connection.
#[async_trait]
pub trait Session: Send {
    /// Explicit round-trip to the server.
    async fn ping(&mut self) -> Result<()>;

    /// Run `sql` and scan exactly one row.
    async fn query_row(&mut self, sql: &str) -> Result<ScalarRow>;

    /// Server-assigned connection id, when known.
    fn connection_id(&self) -> Option<u32>;

    /// Release the connection.
    async fn close(self: Box<Self>) -> Result<()>;
}

/// A pool of physical connections; checkout/checkin is the pool's business.
#[async_trait]
pub trait SharedPool: Send + Sync {
    async fn query_row(&self, sql: &str) -> Result<ScalarRow>;

    async fn close(&self) -> Result<()>;
}
