//! Provider resilience and adaptive selection for multi-provider code review.

pub mod clock;
pub mod config;
pub mod error;
pub mod health;
pub mod observability;
pub mod providers;
pub mod resilience;
pub mod selection;
pub mod storage;

pub use config::schema::RouterConfig;
pub use health::ReliabilityTracker;
pub use providers::{ProviderDirectory, ProviderHandle, ProviderId};
pub use resilience::{CircuitBreaker, RateLimiter};
pub use selection::{FeedbackRouter, Registry};
