//! Database repository implementations
//!
//! Per-aggregate SeaORM repositories + unified RepositoryProvider.

pub mod booking_repository;
pub mod repository_provider;
pub mod subscription_repository;
pub mod swap_transaction_repository;

pub use repository_provider::SeaOrmRepositoryProvider;

use sea_orm::{DbErr, SqlErr};

use crate::shared::errors::{DomainError, InfraError};

pub(crate) fn db_err(e: DbErr) -> DomainError {
    InfraError::Database(e).into()
}

/// Whether the store rejected a write because of a unique index.
pub(crate) fn is_unique_violation(e: &DbErr) -> bool {
    matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}

pub(crate) fn corrupt_column(entity: &str, column: &str, value: &str) -> DomainError {
    DomainError::Storage(format!("{} has unknown {} '{}'", entity, column, value))
}

#[cfg(test)]
pub(crate) mod test_support {
    use sea_orm::{ConnectOptions, Database, DatabaseConnection};
    use sea_orm_migration::MigratorTrait;

    use crate::infrastructure::database::migrator::Migrator;

    /// Fresh in-memory SQLite database with all migrations applied.
    ///
    /// A single connection, since every `sqlite::memory:` connection
    /// opens its own empty database.
    pub async fn test_db() -> DatabaseConnection {
        let mut opts = ConnectOptions::new("sqlite::memory:");
        opts.max_connections(1).min_connections(1).sqlx_logging(false);
        let db = Database::connect(opts).await.unwrap();
        Migrator::up(&db, None).await.unwrap();
        db
    }
}
