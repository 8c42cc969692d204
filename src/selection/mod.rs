//! Provider selection.
//!
//! # Data Flow
//! ```text
//! SelectionConfig
//!     → registry.rs (resolve, discover, filter, availability, fallback)
//!     → strategy.rs (random sample | exploit/explore split)
//!     → Vec<ProviderHandle>
//!
//! review outcome
//!     → feedback.rs (classify)
//!     → RateLimiter | ReliabilityTracker → CircuitBreaker
//! ```
//!
//! # Design Decisions
//! - Availability is read fresh from the store on every selection
//! - The discovery cache is owned by the registry instance, not global

pub mod discovery;
pub mod feedback;
pub mod filter;
pub mod registry;
pub mod strategy;

pub use discovery::{DiscoveryCache, ModelDiscovery, OpenRouterDiscovery};
pub use feedback::FeedbackRouter;
pub use registry::Registry;
