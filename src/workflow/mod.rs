pub mod fetch_protocol;
pub mod unit_ctx;

pub use fetch_protocol::{FetchOutcome, FetchProtocol};
pub use unit_ctx::UnitCtx;
