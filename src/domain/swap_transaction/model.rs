//! Battery swap transaction domain entity

use chrono::{DateTime, Duration, Utc};

use crate::domain::DomainResult;
use crate::shared::errors::DomainError;

/// Default age after which a PENDING transaction is reported as stuck.
pub const DEFAULT_STUCK_THRESHOLD_MINUTES: i64 = 120;

/// Swap transaction status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SwapTransactionStatus {
    /// Physical swap reported, awaiting verification
    Pending,
    /// Swap verified (terminal)
    Success,
    /// Swap rejected or aborted (terminal)
    Failed,
}

impl SwapTransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Success => "SUCCESS",
            Self::Failed => "FAILED",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "PENDING" => Some(Self::Pending),
            "SUCCESS" => Some(Self::Success),
            "FAILED" => Some(Self::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }

    pub fn transition(self, to: SwapTransactionStatus) -> DomainResult<SwapTransactionStatus> {
        use SwapTransactionStatus::*;
        match (self, to) {
            (Pending, Success) | (Pending, Failed) => Ok(to),
            _ => Err(DomainError::InvalidStateTransition {
                entity: "SwapTransaction",
                from: self.as_str().to_string(),
                to: to.as_str().to_string(),
            }),
        }
    }
}

impl std::fmt::Display for SwapTransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Input for recording a physical swap
#[derive(Debug, Clone)]
pub struct NewSwapTransaction {
    pub booking_id: i32,
    pub station_id: String,
    pub driver_id: String,
    pub old_battery_id: String,
    pub new_battery_id: String,
    /// Amount in the smallest currency unit
    pub amount: i64,
    pub payment_method: String,
}

impl NewSwapTransaction {
    pub fn validate(&self) -> DomainResult<()> {
        if self.amount <= 0 {
            return Err(DomainError::Validation("amount must be positive".into()));
        }
        for (name, value) in [
            ("station_id", &self.station_id),
            ("driver_id", &self.driver_id),
            ("old_battery_id", &self.old_battery_id),
            ("new_battery_id", &self.new_battery_id),
            ("payment_method", &self.payment_method),
        ] {
            if value.trim().is_empty() {
                return Err(DomainError::Validation(format!("{} is required", name)));
            }
        }
        if self.old_battery_id == self.new_battery_id {
            return Err(DomainError::Validation(
                "old_battery_id and new_battery_id must differ".into(),
            ));
        }
        Ok(())
    }
}

/// Record of a physical battery exchange, 1:1 with a booking
#[derive(Debug, Clone, PartialEq)]
pub struct SwapTransaction {
    pub id: i32,
    pub booking_id: i32,
    pub station_id: String,
    pub driver_id: String,
    pub old_battery_id: String,
    pub new_battery_id: String,
    pub amount: i64,
    pub payment_method: String,
    /// Subscription to draw a quota unit from on success (package-paid bookings)
    pub subscription_id: Option<i32>,
    pub status: SwapTransactionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SwapTransaction {
    pub fn new(input: NewSwapTransaction, subscription_id: Option<i32>, now: DateTime<Utc>) -> Self {
        Self {
            id: 0,
            booking_id: input.booking_id,
            station_id: input.station_id,
            driver_id: input.driver_id,
            old_battery_id: input.old_battery_id,
            new_battery_id: input.new_battery_id,
            amount: input.amount,
            payment_method: input.payment_method,
            subscription_id,
            status: SwapTransactionStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn succeed(&mut self, now: DateTime<Utc>) -> DomainResult<()> {
        self.status = self.status.transition(SwapTransactionStatus::Success)?;
        self.updated_at = now;
        Ok(())
    }

    pub fn fail(&mut self, now: DateTime<Utc>) -> DomainResult<()> {
        self.status = self.status.transition(SwapTransactionStatus::Failed)?;
        self.updated_at = now;
        Ok(())
    }

    /// Amount can only change before the swap is settled.
    pub fn adjust_amount(&mut self, amount: i64, now: DateTime<Utc>) -> DomainResult<()> {
        if amount <= 0 {
            return Err(DomainError::Validation("amount must be positive".into()));
        }
        if self.status != SwapTransactionStatus::Pending {
            return Err(DomainError::InvalidStateTransition {
                entity: "SwapTransaction",
                from: self.status.as_str().to_string(),
                to: "AMOUNT_ADJUSTED".to_string(),
            });
        }
        self.amount = amount;
        self.updated_at = now;
        Ok(())
    }

    pub fn is_stuck(&self, now: DateTime<Utc>, threshold: Duration) -> bool {
        self.status == SwapTransactionStatus::Pending && self.created_at < now - threshold
    }

    pub fn involves_battery(&self, battery_id: &str) -> bool {
        self.old_battery_id == battery_id || self.new_battery_id == battery_id
    }
}

/// Scope for `calculate_total_amount`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AmountScope {
    Driver(String),
    Station(String),
}

impl AmountScope {
    pub fn matches(&self, tx: &SwapTransaction) -> bool {
        match self {
            Self::Driver(id) => &tx.driver_id == id,
            Self::Station(id) => &tx.station_id == id,
        }
    }
}

// ── Tests ──────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_input() -> NewSwapTransaction {
        NewSwapTransaction {
            booking_id: 1,
            station_id: "station-1".into(),
            driver_id: "driver-1".into(),
            old_battery_id: "BAT-OLD".into(),
            new_battery_id: "BAT-NEW".into(),
            amount: 25_000,
            payment_method: "CARD".into(),
        }
    }

    fn sample_tx() -> SwapTransaction {
        SwapTransaction::new(sample_input(), None, Utc::now())
    }

    #[test]
    fn new_transaction_is_pending() {
        let tx = sample_tx();
        assert_eq!(tx.status, SwapTransactionStatus::Pending);
        assert_eq!(tx.amount, 25_000);
    }

    #[test]
    fn terminal_states_never_move() {
        use SwapTransactionStatus::*;
        for from in [Success, Failed] {
            for to in [Pending, Success, Failed] {
                assert!(from.transition(to).is_err());
            }
        }
        assert_eq!(Pending.transition(Success), Ok(Success));
        assert_eq!(Pending.transition(Failed), Ok(Failed));
        assert!(Pending.transition(Pending).is_err());
    }

    #[test]
    fn amount_frozen_after_success() {
        let mut tx = sample_tx();
        tx.adjust_amount(30_000, Utc::now()).unwrap();
        tx.succeed(Utc::now()).unwrap();
        let err = tx.adjust_amount(1, Utc::now()).unwrap_err();
        assert!(matches!(err, DomainError::InvalidStateTransition { .. }));
        assert_eq!(tx.amount, 30_000);
    }

    #[test]
    fn validation_rejects_bad_input() {
        let mut input = sample_input();
        input.amount = 0;
        assert!(input.validate().is_err());

        let mut input = sample_input();
        input.new_battery_id = input.old_battery_id.clone();
        assert!(input.validate().is_err());

        let mut input = sample_input();
        input.station_id = "  ".into();
        assert!(input.validate().is_err());

        assert!(sample_input().validate().is_ok());
    }

    #[test]
    fn stuck_detection_uses_threshold() {
        let t0 = Utc::now();
        let tx = SwapTransaction::new(sample_input(), None, t0);
        let threshold = Duration::hours(2);
        assert!(tx.is_stuck(t0 + Duration::hours(3), threshold));
        assert!(!tx.is_stuck(t0 + Duration::hours(1), threshold));
    }

    #[test]
    fn battery_history_matches_either_side() {
        let tx = sample_tx();
        assert!(tx.involves_battery("BAT-OLD"));
        assert!(tx.involves_battery("BAT-NEW"));
        assert!(!tx.involves_battery("BAT-OTHER"));
    }
}
