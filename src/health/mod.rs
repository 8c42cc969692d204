//! Provider health subsystem.
//!
//! # Data Flow
//! ```text
//! Caller reports an outcome:
//!     → tracker.rs record_result
//!         → append OutcomeEvent (types.rs) to the persisted log
//!         → CircuitBreaker success/failure
//!         → interval elapsed? score.rs aggregate → ReliabilityStats
//!
//! Selection asks for scores:
//!     → tracker.rs reliability_score / rank_providers
//!     → neutral 0.5 until min_attempts outcomes exist
//! ```
//!
//! # Design Decisions
//! - Stats are derived from the log, never edited directly
//! - Aggregation is periodic, not per event
//! - Unknown providers score neutral so exploration can reach them

pub mod score;
pub mod tracker;
pub mod types;

pub use score::NEUTRAL_SCORE;
pub use tracker::ReliabilityTracker;
pub use types::{FalsePositiveEvent, OutcomeEvent, ReliabilityData, ReliabilityStats};
