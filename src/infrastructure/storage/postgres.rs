//! Postgres dependency store backed by `sqlx`

use async_trait::async_trait;
use sqlx::error::ErrorKind;
use sqlx::postgres::{PgConnectOptions, PgConnection};
use sqlx::{Connection, Executor};
use tracing::{debug, info};

use super::traits::{StoreConnection, StoreConnector};
use crate::application::errors::StoreError;
use crate::config::DatabaseConfig;
use crate::domain::{ComponentId, DependencyRecord, DependencyType};

// dm_componentdeps is keyed by (compid, deptype, packagename)
const DELETE_GENERATION: &str = "DELETE FROM dm_componentdeps WHERE compid = $1 AND deptype = $2";

const DELETE_COMPONENT: &str = "DELETE FROM dm_componentdeps WHERE compid = $1";

const INSERT_RECORD: &str = "INSERT INTO dm_componentdeps \
    (compid, packagename, packageversion, deptype, name, url, summary) \
    VALUES ($1, $2, $3, $4, $5, $6, $7)";

impl From<sqlx::Error> for StoreError {
    fn from(error: sqlx::Error) -> Self {
        match &error {
            sqlx::Error::Database(db_error) => match db_error.kind() {
                ErrorKind::UniqueViolation
                | ErrorKind::ForeignKeyViolation
                | ErrorKind::NotNullViolation
                | ErrorKind::CheckViolation => StoreError::Integrity {
                    message: db_error.message().to_string(),
                },
                _ => StoreError::Query {
                    message: db_error.message().to_string(),
                },
            },
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::Protocol(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed => StoreError::Connection {
                message: error.to_string(),
            },
            _ => StoreError::Query {
                message: error.to_string(),
            },
        }
    }
}

/// Opens plain Postgres connections from the database configuration
#[derive(Debug, Clone)]
pub struct PostgresConnector {
    options: PgConnectOptions,
}

impl PostgresConnector {
    pub fn new(config: &DatabaseConfig) -> Self {
        info!(
            host = %config.host,
            port = config.port,
            database = %config.name,
            user = %config.user,
            "Configuring Postgres dependency store"
        );

        let options = PgConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .username(&config.user)
            .password(&config.password)
            .database(&config.name)
            .application_name("deppkg");

        Self { options }
    }
}

#[async_trait]
impl StoreConnector for PostgresConnector {
    type Connection = PostgresConnection;

    async fn connect(&self) -> Result<PostgresConnection, StoreError> {
        let conn = PgConnection::connect_with(&self.options).await?;
        debug!("Opened Postgres connection");
        Ok(PostgresConnection { conn })
    }

    fn backend(&self) -> &'static str {
        "postgres"
    }
}

/// A single Postgres session; transactions are driven with explicit statements
pub struct PostgresConnection {
    conn: PgConnection,
}

#[async_trait]
impl StoreConnection for PostgresConnection {
    async fn begin(&mut self) -> Result<(), StoreError> {
        (&mut self.conn).execute("BEGIN").await?;
        Ok(())
    }

    async fn delete_generation(
        &mut self,
        component_id: ComponentId,
        dependency_type: Option<DependencyType>,
    ) -> Result<u64, StoreError> {
        let result = match dependency_type {
            Some(kind) => {
                sqlx::query(DELETE_GENERATION)
                    .bind(component_id.value())
                    .bind(kind.as_str())
                    .execute(&mut self.conn)
                    .await?
            }
            None => {
                sqlx::query(DELETE_COMPONENT)
                    .bind(component_id.value())
                    .execute(&mut self.conn)
                    .await?
            }
        };

        Ok(result.rows_affected())
    }

    async fn insert_record(&mut self, record: &DependencyRecord) -> Result<(), StoreError> {
        sqlx::query(INSERT_RECORD)
            .bind(record.component_id().value())
            .bind(record.package_name())
            .bind(record.package_version())
            .bind(record.dependency_type().as_str())
            .bind(record.reference_name())
            .bind(record.reference_url())
            .bind(record.summary())
            .execute(&mut self.conn)
            .await?;

        Ok(())
    }

    async fn commit(&mut self) -> Result<(), StoreError> {
        (&mut self.conn).execute("COMMIT").await?;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), StoreError> {
        (&mut self.conn).execute("ROLLBACK").await?;
        Ok(())
    }

    async fn is_healthy(&mut self) -> bool {
        self.conn.ping().await.is_ok()
    }
}
