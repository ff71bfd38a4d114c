//! Booking domain entity

use chrono::{DateTime, Duration, Utc};

use crate::domain::DomainResult;
use crate::shared::errors::DomainError;

/// How long ahead a confirmed booking counts as "upcoming".
pub const UPCOMING_WINDOW_HOURS: i64 = 24;

/// Booking status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BookingStatus {
    /// Created by the driver, awaiting confirmation
    Pending,
    /// Confirmed by the station
    Confirm,
    /// Swap performed and booking closed (terminal)
    Success,
    /// Cancelled by driver, operator or reconciliation (terminal)
    Cancel,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Confirm => "CONFIRM",
            Self::Success => "SUCCESS",
            Self::Cancel => "CANCEL",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "PENDING" => Some(Self::Pending),
            "CONFIRM" => Some(Self::Confirm),
            "SUCCESS" => Some(Self::Success),
            "CANCEL" => Some(Self::Cancel),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Cancel)
    }

    /// Transition table. Every status change goes through here.
    pub fn transition(self, to: BookingStatus) -> DomainResult<BookingStatus> {
        use BookingStatus::*;
        match (self, to) {
            (Pending, Confirm) | (Pending, Cancel) | (Confirm, Success) | (Confirm, Cancel) => {
                Ok(to)
            }
            _ => Err(DomainError::InvalidStateTransition {
                entity: "Booking",
                from: self.as_str().to_string(),
                to: to.as_str().to_string(),
            }),
        }
    }
}

impl std::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How the swap is paid for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentType {
    PerSwap,
    Package,
}

impl PaymentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PerSwap => "PER_SWAP",
            Self::Package => "PACKAGE",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "PER_SWAP" => Some(Self::PerSwap),
            "PACKAGE" => Some(Self::Package),
            _ => None,
        }
    }
}

impl std::fmt::Display for PaymentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Input for creating a booking
#[derive(Debug, Clone)]
pub struct NewBooking {
    pub driver_id: String,
    pub station_id: String,
    pub battery_model_id: String,
    pub scheduled_time: DateTime<Utc>,
    pub payment_type: PaymentType,
    /// Subscription id; required iff `payment_type` is `Package`
    pub package_id: Option<i32>,
    pub notes: Option<String>,
}

impl NewBooking {
    pub fn validate(&self) -> DomainResult<()> {
        if self.driver_id.trim().is_empty() {
            return Err(DomainError::Validation("driver_id is required".into()));
        }
        if self.station_id.trim().is_empty() {
            return Err(DomainError::Validation("station_id is required".into()));
        }
        if self.battery_model_id.trim().is_empty() {
            return Err(DomainError::Validation("battery_model_id is required".into()));
        }
        match (self.payment_type, self.package_id) {
            (PaymentType::Package, None) => Err(DomainError::Validation(
                "package_id is required for PACKAGE payment".into(),
            )),
            (PaymentType::PerSwap, Some(_)) => Err(DomainError::Validation(
                "package_id must be empty for PER_SWAP payment".into(),
            )),
            _ => Ok(()),
        }
    }
}

/// A driver's reservation of a swap slot
#[derive(Debug, Clone, PartialEq)]
pub struct Booking {
    /// Store-assigned id (0 until persisted)
    pub id: i32,
    pub driver_id: String,
    pub station_id: String,
    pub battery_model_id: String,
    pub booking_time: DateTime<Utc>,
    pub scheduled_time: DateTime<Utc>,
    pub payment_type: PaymentType,
    pub package_id: Option<i32>,
    pub payment_id: Option<String>,
    pub is_paid: bool,
    pub notes: Option<String>,
    pub status: BookingStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    pub fn new(input: NewBooking, now: DateTime<Utc>) -> Self {
        Self {
            id: 0,
            driver_id: input.driver_id,
            station_id: input.station_id,
            battery_model_id: input.battery_model_id,
            booking_time: now,
            scheduled_time: input.scheduled_time,
            payment_type: input.payment_type,
            package_id: input.package_id,
            payment_id: None,
            is_paid: false,
            notes: input.notes,
            status: BookingStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn confirm(&mut self, now: DateTime<Utc>) -> DomainResult<()> {
        self.status = self.status.transition(BookingStatus::Confirm)?;
        self.updated_at = now;
        Ok(())
    }

    /// Cancel and append the reason to the notes
    pub fn cancel(&mut self, reason: &str, now: DateTime<Utc>) -> DomainResult<()> {
        self.status = self.status.transition(BookingStatus::Cancel)?;
        let reason = reason.trim();
        if !reason.is_empty() {
            self.notes = Some(match self.notes.take() {
                Some(existing) if !existing.is_empty() => {
                    format!("{}\nCancelled: {}", existing, reason)
                }
                _ => format!("Cancelled: {}", reason),
            });
        }
        self.updated_at = now;
        Ok(())
    }

    pub fn complete(&mut self, payment_id: impl Into<String>, now: DateTime<Utc>) -> DomainResult<()> {
        self.status = self.status.transition(BookingStatus::Success)?;
        self.payment_id = Some(payment_id.into());
        self.updated_at = now;
        Ok(())
    }

    /// Mark as paid. Returns whether anything changed.
    pub fn mark_paid(&mut self, now: DateTime<Utc>) -> bool {
        if self.is_paid {
            return false;
        }
        self.is_paid = true;
        self.updated_at = now;
        true
    }

    pub fn uses_package(&self) -> bool {
        self.payment_type == PaymentType::Package
    }

    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        matches!(self.status, BookingStatus::Pending | BookingStatus::Confirm)
            && self.scheduled_time < now
    }

    pub fn is_upcoming(&self, now: DateTime<Utc>) -> bool {
        self.status == BookingStatus::Confirm
            && self.scheduled_time >= now
            && self.scheduled_time <= now + Duration::hours(UPCOMING_WINDOW_HOURS)
    }
}

/// Search criteria, all optional and AND-combined
#[derive(Debug, Clone, Default)]
pub struct BookingFilter {
    pub driver_id: Option<String>,
    pub station_id: Option<String>,
    pub status: Option<BookingStatus>,
    pub from_time: Option<DateTime<Utc>>,
    pub to_time: Option<DateTime<Utc>>,
}

impl BookingFilter {
    pub fn matches(&self, b: &Booking) -> bool {
        self.driver_id.as_deref().map_or(true, |d| b.driver_id == d)
            && self.station_id.as_deref().map_or(true, |s| b.station_id == s)
            && self.status.map_or(true, |s| b.status == s)
            && self.from_time.map_or(true, |t| b.scheduled_time >= t)
            && self.to_time.map_or(true, |t| b.scheduled_time <= t)
    }
}

// ── Tests ──────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [BookingStatus; 4] = [
        BookingStatus::Pending,
        BookingStatus::Confirm,
        BookingStatus::Success,
        BookingStatus::Cancel,
    ];

    fn sample_booking() -> Booking {
        Booking::new(
            NewBooking {
                driver_id: "driver-1".into(),
                station_id: "station-1".into(),
                battery_model_id: "BM-48V".into(),
                scheduled_time: Utc::now() + Duration::hours(2),
                payment_type: PaymentType::PerSwap,
                package_id: None,
                notes: None,
            },
            Utc::now(),
        )
    }

    #[test]
    fn new_booking_is_pending_and_unpaid() {
        let b = sample_booking();
        assert_eq!(b.status, BookingStatus::Pending);
        assert!(!b.is_paid);
        assert!(b.payment_id.is_none());
    }

    #[test]
    fn allowed_transitions() {
        use BookingStatus::*;
        assert_eq!(Pending.transition(Confirm), Ok(Confirm));
        assert_eq!(Pending.transition(Cancel), Ok(Cancel));
        assert_eq!(Confirm.transition(Success), Ok(Success));
        assert_eq!(Confirm.transition(Cancel), Ok(Cancel));
        assert!(Pending.transition(Success).is_err());
        assert!(Confirm.transition(Pending).is_err());
    }

    #[test]
    fn terminal_states_never_move() {
        for from in ALL.iter().filter(|s| s.is_terminal()) {
            for to in ALL {
                assert!(
                    from.transition(to).is_err(),
                    "{} -> {} must be rejected",
                    from,
                    to
                );
            }
        }
    }

    #[test]
    fn cancel_appends_reason() {
        let mut b = sample_booking();
        b.notes = Some("bring ID".into());
        b.cancel("driver request", Utc::now()).unwrap();
        assert_eq!(b.status, BookingStatus::Cancel);
        assert_eq!(b.notes.as_deref(), Some("bring ID\nCancelled: driver request"));
    }

    #[test]
    fn complete_requires_confirm() {
        let mut b = sample_booking();
        assert!(b.complete("42", Utc::now()).is_err());
        b.confirm(Utc::now()).unwrap();
        b.complete("42", Utc::now()).unwrap();
        assert_eq!(b.status, BookingStatus::Success);
        assert_eq!(b.payment_id.as_deref(), Some("42"));
        assert!(!b.is_paid);
    }

    #[test]
    fn mark_paid_is_idempotent() {
        let mut b = sample_booking();
        assert!(b.mark_paid(Utc::now()));
        assert!(!b.mark_paid(Utc::now()));
        assert!(b.is_paid);
    }

    #[test]
    fn package_payment_requires_package_id() {
        let mut input = NewBooking {
            driver_id: "d".into(),
            station_id: "s".into(),
            battery_model_id: "m".into(),
            scheduled_time: Utc::now(),
            payment_type: PaymentType::Package,
            package_id: None,
            notes: None,
        };
        assert!(matches!(input.validate(), Err(DomainError::Validation(_))));
        input.package_id = Some(3);
        assert!(input.validate().is_ok());
        input.payment_type = PaymentType::PerSwap;
        assert!(input.validate().is_err());
    }

    #[test]
    fn overdue_and_upcoming_views() {
        let now = Utc::now();
        let mut b = sample_booking();
        b.scheduled_time = now + Duration::hours(3);
        assert!(!b.is_upcoming(now), "pending bookings are not upcoming");
        b.confirm(now).unwrap();
        assert!(b.is_upcoming(now));
        b.scheduled_time = now + Duration::hours(25);
        assert!(!b.is_upcoming(now));
        b.scheduled_time = now - Duration::minutes(1);
        assert!(b.is_overdue(now));
        b.cancel("late", now).unwrap();
        assert!(!b.is_overdue(now));
    }

    #[test]
    fn status_parsing() {
        for status in ALL {
            assert_eq!(BookingStatus::from_str(status.as_str()), Some(status));
        }
        assert_eq!(BookingStatus::from_str("confirm"), Some(BookingStatus::Confirm));
        assert_eq!(BookingStatus::from_str("DONE"), None);
        assert_eq!(PaymentType::from_str("package"), Some(PaymentType::Package));
    }
}
