//! Rate limiting primitives and their composition.

mod bucket;
mod limiter;
mod multi;
mod rate;
mod rules;

pub use bucket::TokenBucket;
pub use limiter::RateLimiter;
pub use multi::MultiLimiter;
pub use rate::{Rate, TimeWindow};
pub use rules::{build_group, LimitsConfig, RateLimitRule};
