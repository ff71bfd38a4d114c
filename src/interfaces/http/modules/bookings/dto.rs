//! Booking DTOs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::domain::booking::{Booking, NewBooking, PaymentType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentTypeDto {
    PerSwap,
    Package,
}

impl From<PaymentTypeDto> for PaymentType {
    fn from(p: PaymentTypeDto) -> Self {
        match p {
            PaymentTypeDto::PerSwap => PaymentType::PerSwap,
            PaymentTypeDto::Package => PaymentType::Package,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct BookingDto {
    pub id: i32,
    pub driver_id: String,
    pub station_id: String,
    pub battery_model_id: String,
    pub booking_time: String,
    pub scheduled_time: String,
    /// PER_SWAP or PACKAGE
    pub payment_type: String,
    /// Subscription drawn on for PACKAGE bookings
    pub package_id: Option<i32>,
    pub payment_id: Option<String>,
    pub is_paid: bool,
    pub notes: Option<String>,
    /// PENDING, CONFIRM, SUCCESS, CANCEL
    pub status: String,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Booking> for BookingDto {
    fn from(b: Booking) -> Self {
        Self {
            id: b.id,
            driver_id: b.driver_id,
            station_id: b.station_id,
            battery_model_id: b.battery_model_id,
            booking_time: b.booking_time.to_rfc3339(),
            scheduled_time: b.scheduled_time.to_rfc3339(),
            payment_type: b.payment_type.as_str().to_string(),
            package_id: b.package_id,
            payment_id: b.payment_id,
            is_paid: b.is_paid,
            notes: b.notes,
            status: b.status.as_str().to_string(),
            created_at: b.created_at.to_rfc3339(),
            updated_at: b.updated_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateBookingRequest {
    #[validate(length(min = 1, max = 64))]
    pub driver_id: String,
    #[validate(length(min = 1, max = 64))]
    pub station_id: String,
    #[validate(length(min = 1, max = 64))]
    pub battery_model_id: String,
    pub scheduled_time: DateTime<Utc>,
    pub payment_type: PaymentTypeDto,
    pub package_id: Option<i32>,
    #[validate(length(max = 500))]
    pub notes: Option<String>,
}

impl From<CreateBookingRequest> for NewBooking {
    fn from(r: CreateBookingRequest) -> Self {
        NewBooking {
            driver_id: r.driver_id,
            station_id: r.station_id,
            battery_model_id: r.battery_model_id,
            scheduled_time: r.scheduled_time,
            payment_type: r.payment_type.into(),
            package_id: r.package_id,
            notes: r.notes,
        }
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CancelBookingRequest {
    #[validate(length(min = 1, max = 255))]
    pub reason: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CompleteBookingRequest {
    #[validate(length(min = 1, max = 128))]
    pub payment_id: String,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct BookingSearchParams {
    pub driver_id: Option<String>,
    pub station_id: Option<String>,
    /// PENDING, CONFIRM, SUCCESS or CANCEL
    pub status: Option<String>,
    /// Scheduled at or after (RFC 3339)
    pub from: Option<DateTime<Utc>>,
    /// Scheduled at or before (RFC 3339)
    pub to: Option<DateTime<Utc>>,
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_limit")]
    pub limit: u32,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct OverdueParams {
    /// Max bookings returned (default 100)
    pub limit: Option<u64>,
}

fn default_page() -> u32 {
    1
}

fn default_limit() -> u32 {
    50
}
