//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Selection (per candidate id):
//!     → rate_limit.rs (skip while a 429/402 cooldown is active)
//!     → circuit_breaker.rs (skip while Open, grant one Half-Open probe)
//!
//! Outcome reported (per call):
//!     → classify.rs (rate signal or health signal?)
//!     → rate signal: rate_limit.rs cooldown
//!     → health signal: circuit_breaker.rs failure/success
//! ```
//!
//! # Design Decisions
//! - All state lives in the shared store, read fresh on every operation
//! - Circuit updates for one id are serialized through lock.rs
//! - Rate limiting is advisory and last-write-wins (no locking)
//! - Rate signals never count as circuit failures

pub mod circuit_breaker;
pub mod classify;
pub mod lock;
pub mod rate_limit;

pub use circuit_breaker::{Admission, CircuitBreaker, CircuitRecord, CircuitState};
pub use classify::{classify, classify_message, FailureClass};
pub use lock::KeyedLock;
pub use rate_limit::{RateLimitRecord, RateLimiter};
