//! Rate limiter trait shared by single and composite limiters.

use async_trait::async_trait;
use std::sync::Arc;

use super::rate::Rate;
use crate::context::Context;
use crate::error::Result;

/// Capability every limiter exposes.
///
/// This trait abstracts over both the `TokenBucket` and the `MultiLimiter`
/// so composites can contain other composites without special-casing.
#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Block until the limiter grants one event, or until `ctx` fires.
    async fn wait(&self, ctx: &Context) -> Result<()>;

    /// The rate this limiter enforces. For composites, the most restrictive.
    fn limit(&self) -> Rate;
}

#[async_trait]
impl<L: RateLimiter + ?Sized> RateLimiter for Arc<L> {
    async fn wait(&self, ctx: &Context) -> Result<()> {
        (**self).wait(ctx).await
    }

    fn limit(&self) -> Rate {
        (**self).limit()
    }
}
