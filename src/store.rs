//! System table DDL and the key/namespace configuration store.
//! All system tables live in the schema named by `CmsConfig::world_schema`.

use crate::config::CmsConfig;
use crate::error::AppError;
use async_trait::async_trait;
use sqlx::ConnectOptions;
use sqlx::PgPool;
use std::str::FromStr;

/// Create the world schema if missing, then the world, _config and data_exchange tables.
pub async fn ensure_sys_tables(pool: &PgPool, config: &CmsConfig) -> Result<(), AppError> {
    sqlx::query(&format!("CREATE SCHEMA IF NOT EXISTS {}", config.world_schema))
        .execute(pool)
        .await?;

    let world_ddl = format!(
        r#"
        CREATE TABLE IF NOT EXISTS {} (
            table_name TEXT PRIMARY KEY,
            permission BIGINT NOT NULL DEFAULT 0,
            default_permission BIGINT NOT NULL DEFAULT 0,
            world_schema_json TEXT NOT NULL,
            is_top_level BOOLEAN NOT NULL DEFAULT TRUE,
            is_hidden BOOLEAN NOT NULL DEFAULT FALSE,
            is_state_tracking_enabled BOOLEAN NOT NULL DEFAULT FALSE,
            default_order TEXT,
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
        config.qualified("world")
    );
    sqlx::query(&world_ddl).execute(pool).await?;

    let config_ddl = format!(
        r#"
        CREATE TABLE IF NOT EXISTS {} (
            name TEXT NOT NULL,
            namespace TEXT NOT NULL,
            value TEXT NOT NULL,
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            PRIMARY KEY (name, namespace)
        )
        "#,
        config.qualified("_config")
    );
    sqlx::query(&config_ddl).execute(pool).await?;

    let exchange_ddl = format!(
        r#"
        CREATE TABLE IF NOT EXISTS {} (
            name TEXT PRIMARY KEY,
            payload JSONB NOT NULL,
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
        config.qualified("data_exchange")
    );
    sqlx::query(&exchange_ddl).execute(pool).await?;

    Ok(())
}

/// String values keyed by (key, namespace).
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// Returns `AppError::NotFound` when no value is stored.
    async fn get(&self, key: &str, namespace: &str) -> Result<String, AppError>;

    async fn set(&self, key: &str, value: &str, namespace: &str) -> Result<(), AppError>;
}

/// `ConfigStore` backed by the _config table.
#[derive(Clone)]
pub struct PgConfigStore {
    pool: PgPool,
    table: String,
}

impl PgConfigStore {
    pub fn new(pool: PgPool, config: &CmsConfig) -> Self {
        PgConfigStore {
            pool,
            table: config.qualified("_config"),
        }
    }
}

#[async_trait]
impl ConfigStore for PgConfigStore {
    async fn get(&self, key: &str, namespace: &str) -> Result<String, AppError> {
        let sql = format!("SELECT value FROM {} WHERE name = $1 AND namespace = $2", self.table);
        let row: Option<(String,)> = sqlx::query_as(&sql)
            .bind(key)
            .bind(namespace)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|(v,)| v)
            .ok_or_else(|| AppError::NotFound(format!("config {} / {}", namespace, key)))
    }

    async fn set(&self, key: &str, value: &str, namespace: &str) -> Result<(), AppError> {
        let sql = format!(
            r#"
            INSERT INTO {} (name, namespace, value, updated_at)
            VALUES ($1, $2, $3, NOW())
            ON CONFLICT (name, namespace)
            DO UPDATE SET value = $3, updated_at = NOW()
            "#,
            self.table
        );
        sqlx::query(&sql)
            .bind(key)
            .bind(namespace)
            .bind(value)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

/// Ensure the database in `database_url` exists; create it if not. Connects to the
/// default `postgres` database to run CREATE DATABASE. Call before creating the main pool.
pub async fn ensure_database_exists(database_url: &str) -> Result<(), AppError> {
    let (admin_url, db_name) = parse_db_name_from_url(database_url)?;
    if db_name.is_empty() || db_name == "postgres" {
        return Ok(());
    }
    let opts = sqlx::postgres::PgConnectOptions::from_str(&admin_url)
        .map_err(|e| AppError::BadRequest(format!("invalid DATABASE_URL: {}", e)))?;
    let mut conn: sqlx::PgConnection = opts.connect().await.map_err(AppError::Db)?;
    let exists: (bool,) = sqlx::query_as("SELECT EXISTS(SELECT 1 FROM pg_database WHERE datname = $1)")
        .bind(&db_name)
        .fetch_one(&mut conn)
        .await
        .map_err(AppError::Db)?;
    if !exists.0 {
        tracing::info!(database = %db_name, "creating database");
        sqlx::query(&format!("CREATE DATABASE {}", quote_ident(&db_name)))
            .execute(&mut conn)
            .await
            .map_err(AppError::Db)?;
    }
    Ok(())
}

fn parse_db_name_from_url(url: &str) -> Result<(String, String), AppError> {
    let path_start = url.rfind('/').ok_or_else(|| AppError::BadRequest("DATABASE_URL: no path".into()))? + 1;
    let path_and_query = url.get(path_start..).unwrap_or("");
    let db_name = path_and_query.split('?').next().unwrap_or("").trim();
    let base = url.get(..path_start).unwrap_or(url);
    let admin_url = format!("{}postgres", base);
    Ok((admin_url, db_name.to_string()))
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_database_name_from_url() {
        let (admin, db) = parse_db_name_from_url("postgres://u:p@localhost:5432/world?sslmode=disable").unwrap();
        assert_eq!(admin, "postgres://u:p@localhost:5432/postgres");
        assert_eq!(db, "world");
    }

    #[test]
    fn url_without_path_is_rejected() {
        assert!(parse_db_name_from_url("localhost").is_err());
    }

    #[test]
    fn quotes_identifiers() {
        assert_eq!(quote_ident(r#"we"ird"#), r#""we""ird""#);
    }
}
