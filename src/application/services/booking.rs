//! Booking lifecycle
//!
//! Every status change is a compare-and-set against the status the booking
//! was loaded with, so two concurrent transitions cannot both win.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::info;

use super::subscription::SubscriptionService;
use crate::domain::booking::{Booking, BookingFilter, BookingStatus, NewBooking, UPCOMING_WINDOW_HOURS};
use crate::domain::events::{BookingCancelledEvent, BookingEvent, Committed, Event};
use crate::domain::{DomainError, DomainResult, RepositoryProvider};
use crate::shared::{PaginatedResult, PaginationParams};

pub struct BookingService {
    repos: Arc<dyn RepositoryProvider>,
    subscriptions: Arc<SubscriptionService>,
}

impl BookingService {
    pub fn new(repos: Arc<dyn RepositoryProvider>, subscriptions: Arc<SubscriptionService>) -> Self {
        Self {
            repos,
            subscriptions,
        }
    }

    pub async fn create(&self, input: NewBooking) -> DomainResult<Committed<Booking>> {
        input.validate()?;
        let now = Utc::now();

        if self
            .repos
            .bookings()
            .find_pending_for_driver(&input.driver_id)
            .await?
            .is_some()
        {
            return Err(DomainError::DriverHasPendingBooking(input.driver_id));
        }

        if let Some(subscription_id) = input.package_id {
            self.subscriptions
                .ensure_quota_available(&input.driver_id, subscription_id, now)
                .await?;
        }

        let booking = self.repos.bookings().insert(Booking::new(input, now)).await?;

        metrics::counter!("bookings_created_total", "payment_type" => booking.payment_type.as_str())
            .increment(1);
        info!(
            booking_id = booking.id,
            driver_id = %booking.driver_id,
            station_id = %booking.station_id,
            payment_type = %booking.payment_type,
            scheduled_time = %booking.scheduled_time,
            "📅 Booking created"
        );

        let event = Event::BookingCreated(BookingEvent::from_booking(&booking));
        Ok(Committed::new(booking).with_event(event))
    }

    pub async fn get(&self, id: i32) -> DomainResult<Booking> {
        self.repos
            .bookings()
            .find_by_id(id)
            .await?
            .ok_or_else(|| DomainError::not_found("Booking", id))
    }

    pub async fn confirm(&self, id: i32) -> DomainResult<Committed<Booking>> {
        let mut booking = self.get(id).await?;
        let expected = booking.status;
        booking.confirm(Utc::now())?;
        self.persist_transition(&booking, expected).await?;

        info!(booking_id = id, driver_id = %booking.driver_id, "✅ Booking confirmed");
        let event = Event::BookingConfirmed(BookingEvent::from_booking(&booking));
        Ok(Committed::new(booking).with_event(event))
    }

    pub async fn cancel(&self, id: i32, reason: &str) -> DomainResult<Committed<Booking>> {
        let booking = self.get(id).await?;
        self.cancel_loaded(booking, reason, Utc::now()).await
    }

    /// Cancel a booking already read from the store.
    pub(crate) async fn cancel_loaded(
        &self,
        mut booking: Booking,
        reason: &str,
        now: DateTime<Utc>,
    ) -> DomainResult<Committed<Booking>> {
        let expected = booking.status;
        booking.cancel(reason, now)?;
        self.persist_transition(&booking, expected).await?;

        info!(
            booking_id = booking.id,
            driver_id = %booking.driver_id,
            previous_status = %expected,
            reason,
            "Booking cancelled"
        );
        let event = Event::BookingCancelled(BookingCancelledEvent {
            booking_id: booking.id,
            driver_id: booking.driver_id.clone(),
            station_id: booking.station_id.clone(),
            previous_status: expected.as_str().to_string(),
            reason: reason.to_string(),
            timestamp: now,
        });
        Ok(Committed::new(booking).with_event(event))
    }

    /// Close a confirmed booking. Payment state is untouched.
    pub async fn complete(&self, id: i32, payment_id: &str) -> DomainResult<Committed<Booking>> {
        if payment_id.trim().is_empty() {
            return Err(DomainError::Validation("payment_id is required".into()));
        }
        let mut booking = self.get(id).await?;
        let expected = booking.status;
        booking.complete(payment_id, Utc::now())?;
        self.persist_transition(&booking, expected).await?;

        info!(booking_id = id, payment_id, "🏁 Booking completed");
        let event = Event::BookingCompleted(BookingEvent::from_booking(&booking));
        Ok(Committed::new(booking).with_event(event))
    }

    /// Idempotent; the paid event fires only on the first call.
    pub async fn confirm_payment(&self, id: i32) -> DomainResult<Committed<Booking>> {
        let changed = self.repos.bookings().mark_paid(id, Utc::now()).await?;
        let booking = self.get(id).await?;

        if !changed {
            return Ok(Committed::new(booking));
        }
        info!(booking_id = id, driver_id = %booking.driver_id, "💳 Booking payment confirmed");
        let event = Event::BookingPaid(BookingEvent::from_booking(&booking));
        Ok(Committed::new(booking).with_event(event))
    }

    pub async fn search(
        &self,
        filter: &BookingFilter,
        pagination: PaginationParams,
    ) -> DomainResult<PaginatedResult<Booking>> {
        let (items, total) = self.repos.bookings().search(filter, pagination).await?;
        Ok(PaginatedResult::new(items, total, pagination.page, pagination.limit))
    }

    pub async fn upcoming(&self, now: DateTime<Utc>) -> DomainResult<Vec<Booking>> {
        self.repos
            .bookings()
            .find_upcoming(now, now + Duration::hours(UPCOMING_WINDOW_HOURS))
            .await
    }

    pub async fn overdue(&self, now: DateTime<Utc>, limit: u64) -> DomainResult<Vec<Booking>> {
        self.repos.bookings().find_overdue(now, limit).await
    }

    /// Operator delete. Ignores the state machine.
    pub async fn delete(&self, id: i32) -> DomainResult<Committed<()>> {
        let booking = self.get(id).await?;
        if !self.repos.bookings().delete(id).await? {
            return Err(DomainError::not_found("Booking", id));
        }
        info!(booking_id = id, status = %booking.status, "🗑️ Booking deleted");
        let mut event = BookingEvent::from_booking(&booking);
        event.timestamp = Utc::now();
        Ok(Committed::new(()).with_event(Event::BookingDeleted(event)))
    }

    async fn persist_transition(&self, booking: &Booking, expected: BookingStatus) -> DomainResult<()> {
        if self
            .repos
            .bookings()
            .update_if_status(booking, expected)
            .await?
        {
            metrics::counter!("booking_transitions_total", "to" => booking.status.as_str())
                .increment(1);
            return Ok(());
        }
        // Someone else moved the booking between our read and write.
        Err(match self.repos.bookings().find_by_id(booking.id).await? {
            Some(current) => DomainError::InvalidStateTransition {
                entity: "Booking",
                from: current.status.as_str().to_string(),
                to: booking.status.as_str().to_string(),
            },
            None => DomainError::not_found("Booking", booking.id),
        })
    }
}
