use crate::config::DatabaseConfig;
use crate::error::AppResult;
use migration::{Migrator, MigratorTrait};
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use std::sync::Arc;
use std::time::Duration;

/// Shared by every service; the connection itself is not `Clone` under the `mock` feature.
pub type DbPool = Arc<DatabaseConnection>;

pub async fn create_pool(config: &DatabaseConfig) -> AppResult<DbPool> {
    let mut options = ConnectOptions::new(config.url.clone());
    options
        .max_connections(config.max_connections)
        .connect_timeout(Duration::from_secs(10))
        .sqlx_logging(false);

    let pool = Database::connect(options).await?;
    Ok(Arc::new(pool))
}

pub async fn run_migrations(pool: &DbPool) -> AppResult<()> {
    Migrator::up(pool.as_ref(), None).await?;
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use sea_orm::Transaction;

    /// Hands back the mock log once every service holding the pool is gone.
    pub(crate) fn into_log(pool: DbPool) -> Vec<Transaction> {
        match Arc::try_unwrap(pool) {
            Ok(db) => db.into_transaction_log(),
            Err(_) => panic!("pool is still shared"),
        }
    }

    /// SQL of the logged statements with Debug quote escaping undone.
    pub(crate) fn logged_sql(log: &[Transaction]) -> String {
        format!("{log:?}").replace("\\\"", "\"")
    }
}
