//! Re-export public algorithms.

pub mod boundary;
pub mod communicator;
pub mod distribute;
pub mod exchange;
pub mod plan_check;
pub mod wire;

pub use boundary::{BoundaryClassification, RecvEntry, SendEntry, classify};
pub use distribute::distribute_ownership;
pub use exchange::{ExchangeOptions, ExchangeReport, Exchanger};
pub use plan_check::verify_exchange_plan;
