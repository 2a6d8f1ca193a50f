//! `mysql_async` implementation of the client seam.

use anyhow::{Context, Result};
use async_trait::async_trait;
use mysql_async::prelude::*;
use mysql_async::{Conn, Opts, OptsBuilder, Pool, PoolConstraints, PoolOpts, Row, Value};
use std::sync::Arc;

use crate::client::{Connector, ScalarRow, Session, SharedPool};
use crate::config::{PoolConfig, Target};

/// Connector backed by the MySQL client protocol.
#[derive(Debug, Default, Clone, Copy)]
pub struct MySqlConnector;

impl MySqlConnector {
    pub fn new() -> Self {
        Self
    }
}

fn target_opts(target: &Target) -> OptsBuilder {
    OptsBuilder::from_opts(Opts::default())
        .ip_or_hostname(target.endpoint.host.clone())
        .tcp_port(target.endpoint.port)
        .user(Some(target.credential.username.clone()))
        .pass(Some(target.credential.password.clone()))
        .db_name(target.database.clone())
}

/// Map the pool tuning onto `mysql_async` pool options.
///
/// `mysql_async` expresses idle retention as the lower bound of its pool
/// constraints and refuses `min > max`, so an idle bound above the open bound
/// is clamped rather than treated as an error.
fn pool_opts(limits: &PoolConfig) -> Result<PoolOpts> {
    let max_open = limits.max_open_connections.max(1);
    let mut max_idle = limits.max_idle_connections;
    if max_idle > max_open {
        tracing::warn!(
            max_idle,
            max_open,
            "max idle connections exceeds max open connections; clamping idle bound"
        );
        max_idle = max_open;
    }

    let constraints = PoolConstraints::new(max_idle, max_open).with_context(|| {
        format!(
            "Failed to configure pool constraints (idle={}, open={})",
            max_idle, max_open
        )
    })?;

    Ok(PoolOpts::default()
        .with_constraints(constraints)
        .with_abs_conn_ttl(Some(limits.max_connection_lifetime)))
}

#[async_trait]
impl Connector for MySqlConnector {
    async fn open(&self, target: &Target) -> Result<Box<dyn Session>> {
        tracing::debug!(endpoint = %target.endpoint, user = %target.credential.username, "opening connection");
        let conn = Conn::new(target_opts(target))
            .await
            .with_context(|| format!("Failed to connect to {}", target.endpoint))?;
        Ok(Box::new(MySqlSession { conn }))
    }

    async fn open_pool(&self, target: &Target, limits: &PoolConfig) -> Result<Arc<dyn SharedPool>> {
        let opts = target_opts(target).pool_opts(pool_opts(limits)?);
        tracing::debug!(
            endpoint = %target.endpoint,
            max_open = limits.max_open_connections,
            max_idle = limits.max_idle_connections,
            max_lifetime = ?limits.max_connection_lifetime,
            "creating connection pool"
        );
        // Pool::new does not touch the network; connections are made on first checkout.
        Ok(Arc::new(MySqlPool {
            pool: Pool::new(opts),
        }))
    }
}

struct MySqlSession {
    conn: Conn,
}

#[async_trait]
impl Session for MySqlSession {
    async fn ping(&mut self) -> Result<()> {
        self.conn.ping().await?;
        Ok(())
    }

    async fn query_row(&mut self, sql: &str) -> Result<ScalarRow> {
        tracing::debug!(sql, "running query");
        let row: Option<Row> = self
            .conn
            .query_first(sql)
            .await
            .with_context(|| format!("Query failed: {}", sql))?;
        scan_row(sql, row)
    }

    fn connection_id(&self) -> Option<u32> {
        Some(self.conn.id())
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.conn
            .disconnect()
            .await
            .context("Failed to close connection")?;
        Ok(())
    }
}

struct MySqlPool {
    pool: Pool,
}

#[async_trait]
impl SharedPool for MySqlPool {
    async fn query_row(&self, sql: &str) -> Result<ScalarRow> {
        // The checked-out connection goes back to the pool when dropped.
        let mut conn = self
            .pool
            .get_conn()
            .await
            .context("Failed to get pooled connection")?;
        tracing::debug!(sql, connection_id = conn.id(), "running pooled query");
        let row: Option<Row> = conn
            .query_first(sql)
            .await
            .with_context(|| format!("Query failed: {}", sql))?;
        scan_row(sql, row)
    }

    async fn close(&self) -> Result<()> {
        self.pool
            .clone()
            .disconnect()
            .await
            .context("Failed to close connection pool")?;
        Ok(())
    }
}

fn scan_row(sql: &str, row: Option<Row>) -> Result<ScalarRow> {
    let row = row.with_context(|| format!("No rows returned by: {}", sql))?;
    let columns = (0..row.len())
        .filter_map(|idx| row.as_ref(idx).cloned())
        .map(render_value)
        .collect::<Vec<_>>();
    if columns.is_empty() {
        anyhow::bail!("No columns returned by: {}", sql);
    }
    Ok(ScalarRow::new(columns))
}

/// Text form of a column value as a client would print it.
fn render_value(value: Value) -> String {
    match value {
        Value::NULL => "NULL".to_string(),
        Value::Bytes(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Value::Int(i) => i.to_string(),
        Value::UInt(u) => u.to_string(),
        Value::Float(f) => f.to_string(),
        Value::Double(d) => d.to_string(),
        Value::Date(year, month, day, hour, min, sec, micro) => {
            if hour == 0 && min == 0 && sec == 0 && micro == 0 {
                format!("{:04}-{:02}-{:02}", year, month, day)
            } else if micro == 0 {
                format!(
                    "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
                    year, month, day, hour, min, sec
                )
            } else {
                format!(
                    "{:04}-{:02}-{:02} {:02}:{:02}:{:02}.{:06}",
                    year, month, day, hour, min, sec, micro
                )
            }
        }
        Value::Time(negative, days, hours, mins, secs, micros) => {
            let sign = if negative { "-" } else { "" };
            let total_hours = u64::from(days) * 24 + u64::from(hours);
            if micros == 0 {
                format!("{}{:02}:{:02}:{:02}", sign, total_hours, mins, secs)
            } else {
                format!(
                    "{}{:02}:{:02}:{:02}.{:06}",
                    sign, total_hours, mins, secs, micros
                )
            }
        }
    }
}
