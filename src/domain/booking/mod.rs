//! Booking aggregate
//!
//! Contains the Booking entity, its transition table, and repository interface.

pub mod model;
pub mod repository;

pub use model::{Booking, BookingFilter, BookingStatus, NewBooking, PaymentType, UPCOMING_WINDOW_HOURS};
pub use repository::BookingRepository;
