//! Application services

mod booking;
mod reconciliation;
mod subscription;
mod swap_transaction;

pub use booking::BookingService;
pub use reconciliation::{
    start_reconciliation_tasks, OverdueBookingReport, ReconciliationJobs, StuckTransactionReport,
    UsedSwapMismatch, UsedSwapReport,
};
pub use subscription::SubscriptionService;
pub use swap_transaction::{ProcessedTransaction, SwapTransactionService};
