//! Swap transaction aggregate

pub mod model;
pub mod repository;

pub use model::{
    AmountScope, NewSwapTransaction, SwapTransaction, SwapTransactionStatus,
    DEFAULT_STUCK_THRESHOLD_MINUTES,
};
pub use repository::SwapTransactionRepository;
