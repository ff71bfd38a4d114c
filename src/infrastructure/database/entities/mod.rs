//! Database entities module

pub mod booking;
pub mod package_plan;
pub mod subscription;
pub mod swap_transaction;

pub use booking::Entity as Booking;
pub use package_plan::Entity as PackagePlan;
pub use subscription::Entity as Subscription;
pub use swap_transaction::Entity as SwapTransaction;
