use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("Not found: {entity} with {field}={value}")]
    NotFound {
        entity: &'static str,
        field: &'static str,
        value: String,
    },

    #[error("Validation: {0}")]
    Validation(String),

    #[error("Invalid state transition for {entity}: {from} -> {to}")]
    InvalidStateTransition {
        entity: &'static str,
        from: String,
        to: String,
    },

    #[error("Transaction {0} is already completed")]
    AlreadyCompleted(i32),

    #[error("Driver {0} already has a pending booking")]
    DriverHasPendingBooking(String),

    #[error("User {0} already has an active subscription")]
    AlreadyHasActiveSubscription(String),

    #[error("Booking {0} already has a swap transaction")]
    DuplicateTransaction(i32),

    #[error("No active subscription for user {0}")]
    NoActiveSubscription(String),

    #[error("Subscription {0} has no remaining swaps")]
    QuotaExhausted(i32),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl DomainError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            field: "id",
            value: id.to_string(),
        }
    }

    /// Whether this error is likely transient (e.g. DB connection lost)
    /// and the operation may succeed if retried.
    pub fn is_transient(&self) -> bool {
        matches!(self, DomainError::Storage(_))
    }

    /// Stable machine-readable kind, used in API payloads and metrics labels.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::Validation(_) => "validation_error",
            Self::InvalidStateTransition { .. } => "invalid_state_transition",
            Self::AlreadyCompleted(_) => "already_completed",
            Self::DriverHasPendingBooking(_) => "driver_has_pending_booking",
            Self::AlreadyHasActiveSubscription(_) => "already_has_active_subscription",
            Self::DuplicateTransaction(_) => "duplicate_transaction",
            Self::NoActiveSubscription(_) => "no_active_subscription",
            Self::QuotaExhausted(_) => "quota_exhausted",
            Self::Storage(_) => "storage_error",
        }
    }
}

#[derive(Debug, Error)]
pub enum InfraError {
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<InfraError> for DomainError {
    fn from(e: InfraError) -> Self {
        DomainError::Storage(e.to_string())
    }
}

/// Process-level failure, e.g. while starting the server.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Infra(#[from] InfraError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<sea_orm::DbErr> for AppError {
    fn from(e: sea_orm::DbErr) -> Self {
        AppError::Infra(InfraError::Database(e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_storage_errors_are_transient() {
        assert!(DomainError::Storage("connection reset".into()).is_transient());
        assert!(!DomainError::QuotaExhausted(1).is_transient());
        assert!(!DomainError::not_found("Booking", 7).is_transient());
    }

    #[test]
    fn not_found_message_names_entity() {
        let err = DomainError::not_found("Booking", 7);
        assert_eq!(err.to_string(), "Not found: Booking with id=7");
        assert_eq!(err.kind(), "not_found");
    }

    #[test]
    fn infra_error_becomes_storage_error() {
        let infra = InfraError::Config("bad url".into());
        let domain: DomainError = infra.into();
        assert!(matches!(domain, DomainError::Storage(_)));
    }

    #[test]
    fn startup_errors_keep_their_source() {
        let err: AppError = sea_orm::DbErr::Custom("locked".into()).into();
        assert!(matches!(err, AppError::Infra(InfraError::Database(_))));
        assert!(err.to_string().contains("locked"));
    }
}
