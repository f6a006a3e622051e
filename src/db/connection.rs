//! A single Postgres connection, plus an in-memory SQLite stand-in for tests.
use anyhow::{Context, Result, anyhow};
use derive_builder::Builder;
use sqlx::postgres::{PgConnectOptions, PgConnection};
use sqlx::{ConnectOptions, Connection as _};
use tracing::info;

use crate::config::{CONNECT_TIMEOUT, MAX_BIND_PARAMS};

/// Connection settings collected from the command line
#[derive(Debug, Clone, Builder)]
pub struct ConnectArgs {
    #[builder(setter(into))]
    host: String,
    port: u16,
    #[builder(setter(into))]
    user: String,
    #[builder(setter(into, strip_option), default)]
    password: Option<String>,
    #[builder(setter(into))]
    database: String,
}

impl ConnectArgs {
    pub fn connect_options(&self) -> PgConnectOptions {
        let options = PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.user)
            .database(&self.database);

        match &self.password {
            Some(password) => options.password(password),
            None => options,
        }
    }
}

/// Connection that can be either Postgres or SQLite
pub enum Connection {
    Postgres(PgConnection),
    #[cfg(test)]
    Sqlite(sqlx::SqliteConnection),
}

impl Connection {
    pub async fn connect(options: &PgConnectOptions) -> Result<Self> {
        info!(
            host = options.get_host(),
            port = options.get_port(),
            database = options.get_database().unwrap_or_default(),
            "connecting to Postgres"
        );

        let conn = tokio::time::timeout(CONNECT_TIMEOUT, options.connect())
            .await
            .map_err(|_| {
                anyhow!(
                    "Timed out connecting to Postgres after {} seconds",
                    CONNECT_TIMEOUT.as_secs()
                )
            })?
            .context("Failed to connect to Postgres")?;

        Ok(Connection::Postgres(conn))
    }

    /// Create an in-memory SQLite connection for testing
    #[cfg(test)]
    pub async fn sqlite_in_memory() -> Result<Self, sqlx::Error> {
        let conn = sqlx::SqliteConnection::connect("sqlite::memory:").await?;
        Ok(Connection::Sqlite(conn))
    }

    /// Check if this connection is using PostgreSQL (returns false for SQLite)
    pub fn is_postgres(&self) -> bool {
        matches!(self, Connection::Postgres(_))
    }

    /// Most bind parameters a single statement may carry
    pub fn max_bind_params(&self) -> usize {
        match self {
            Connection::Postgres(_) => MAX_BIND_PARAMS,
            #[cfg(test)]
            Connection::Sqlite(_) => 32_766,
        }
    }

    /// Run DDL statements in one transaction
    pub async fn execute_all(&mut self, statements: &[String]) -> Result<(), sqlx::Error> {
        match self {
            Connection::Postgres(conn) => {
                let mut tx = conn.begin().await?;
                for sql in statements {
                    sqlx::query(sql).execute(&mut *tx).await?;
                }
                tx.commit().await
            }
            #[cfg(test)]
            Connection::Sqlite(conn) => {
                let mut tx = conn.begin().await?;
                for sql in statements {
                    sqlx::query(sql).execute(&mut *tx).await?;
                }
                tx.commit().await
            }
        }
    }
}
