//! Core types, validation, and admission control for the analytics pipeline.

pub mod error;
pub mod event;
pub mod rate_limit;
pub mod session;

pub use error::{Error, Result};
pub use event::*;
pub use rate_limit::{RateLimitConfig, RateLimiter, SharedRateLimiter};
pub use session::SessionIdGenerator;
