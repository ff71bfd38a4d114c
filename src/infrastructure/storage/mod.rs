//! Non-database storage backends

mod memory;

pub use memory::{
    InMemoryBookingRepository, InMemoryRepositoryProvider, InMemorySubscriptionRepository,
    InMemorySwapTransactionRepository,
};
