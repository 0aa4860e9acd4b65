//! Composite limiter enforcing every member limit at once.

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace};

use super::limiter::RateLimiter;
use super::rate::Rate;
use crate::context::Context;
use crate::error::{LimiterError, Result};

/// A limiter built from other limiters.
///
/// A wait succeeds only once every member has granted it. Members are kept
/// sorted by their limit, most restrictive first, so a caller blocks on the
/// tightest constraint before spending tokens on looser ones. Nested
/// composites are ordinary members and are never flattened.
///
/// Tokens already spent on earlier members are not returned when a later
/// member fails; refill makes up for it.
pub struct MultiLimiter {
    members: Vec<Arc<dyn RateLimiter>>,
}

impl MultiLimiter {
    /// Compose `members` into one limiter.
    ///
    /// Members with equal limits keep the order they were given in.
    pub fn new<I>(members: I) -> Result<Self>
    where
        I: IntoIterator<Item = Arc<dyn RateLimiter>>,
    {
        let mut members: Vec<Arc<dyn RateLimiter>> = members.into_iter().collect();

        if members.is_empty() {
            return Err(LimiterError::Config(
                "a multi limiter needs at least one member".to_string(),
            ));
        }

        members.sort_by(|a, b| a.limit().total_cmp(&b.limit()));

        debug!(
            members = members.len(),
            limit = %members[0].limit(),
            "Creating multi limiter"
        );

        Ok(Self { members })
    }

    /// Number of direct members.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Always false; construction rejects empty member lists.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Member limits in wait order.
    pub fn limits(&self) -> Vec<Rate> {
        self.members.iter().map(|member| member.limit()).collect()
    }
}

impl fmt::Debug for MultiLimiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MultiLimiter")
            .field("limits", &self.limits())
            .finish()
    }
}

#[async_trait]
impl RateLimiter for MultiLimiter {
    async fn wait(&self, ctx: &Context) -> Result<()> {
        for (index, member) in self.members.iter().enumerate() {
            if let Err(err) = member.wait(ctx).await {
                debug!(
                    member = index,
                    limit = %member.limit(),
                    error = %err,
                    "Member wait failed"
                );
                return Err(err);
            }
        }

        trace!(members = self.members.len(), "All members granted");
        Ok(())
    }

    fn limit(&self) -> Rate {
        self.members[0].limit()
    }
}
