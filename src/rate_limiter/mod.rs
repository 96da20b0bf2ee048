//! # Rate Limiter Subsystem
//!
//! Admission control for outbound requests: three engines, one registry.
//!
//! ```text
//!     ┌──────────────────────────────────────────────────┐
//!     │               RateLimiterRegistry                │
//!     │  named configs · scoped instances · statistics   │
//!     └───────┬──────────────┬──────────────┬────────────┘
//!             │              │              │
//!             ▼              ▼              ▼
//!       TokenBucket    SlidingWindow   AdaptiveLimiter
//!       lazy refill    exact counts    AIMD feedback
//! ```
//!
//! The engines are usable standalone; the registry adds naming, per-scope
//! instantiation, fail-open dispatch, aggregate counters, and optional
//! write-only audit persistence.

pub mod adaptive;
pub mod audit;
pub mod bucket;
pub mod config;
pub mod registry;
pub mod window;

pub use adaptive::AdaptiveLimiter;
pub use audit::AuditStore;
pub use bucket::{TokenBucket, Verdict};
pub use config::{RateLimitConfig, Scope, Strategy};
pub use registry::{Limiter, RateLimitState, RateLimiterRegistry, RegistryStatistics};
pub use window::SlidingWindow;
