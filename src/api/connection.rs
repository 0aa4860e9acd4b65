//! API connection implementation.

use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, instrument};

use crate::context::Context;
use crate::error::Result;
use crate::ratelimit::{build_group, LimitsConfig, MultiLimiter, Rate, RateLimiter};

/// Endpoints exposed by an [`ApiConnection`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    /// Read a file from disk
    ReadFile,
    /// Resolve a domain name to an address
    ResolveAddress,
}

impl Endpoint {
    pub const ALL: [Endpoint; 2] = [Endpoint::ReadFile, Endpoint::ResolveAddress];
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::ReadFile => write!(f, "ReadFile"),
            Endpoint::ResolveAddress => write!(f, "ResolveAddress"),
        }
    }
}

/// A connection owning its limit groups.
///
/// The `api` group is shared by every endpoint, so a request to any endpoint
/// is charged against it. Endpoint limiters are composed once when the
/// connection is opened.
pub struct ApiConnection {
    api: Arc<MultiLimiter>,
    disk: Arc<MultiLimiter>,
    network: Arc<MultiLimiter>,
    read_file: MultiLimiter,
    resolve_address: MultiLimiter,
}

impl ApiConnection {
    /// Open a connection with the given limit groups.
    pub fn open(limits: &LimitsConfig) -> Result<Self> {
        let api = Arc::new(build_group("api", &limits.api)?);
        let disk = Arc::new(build_group("disk", &limits.disk)?);
        let network = Arc::new(build_group("network", &limits.network)?);

        let read_file = MultiLimiter::new([
            api.clone() as Arc<dyn RateLimiter>,
            disk.clone() as Arc<dyn RateLimiter>,
        ])?;
        let resolve_address = MultiLimiter::new([
            api.clone() as Arc<dyn RateLimiter>,
            network.clone() as Arc<dyn RateLimiter>,
        ])?;

        info!(
            api = %api.limit(),
            disk = %disk.limit(),
            network = %network.limit(),
            "API connection opened"
        );

        Ok(Self {
            api,
            disk,
            network,
            read_file,
            resolve_address,
        })
    }

    /// Read a file, waiting for both the api and disk limits.
    #[instrument(skip(self, ctx))]
    pub async fn read_file(&self, ctx: &Context) -> Result<()> {
        self.read_file.wait(ctx).await?;
        debug!("Reading file");
        Ok(())
    }

    /// Resolve an address, waiting for both the api and network limits.
    #[instrument(skip(self, ctx))]
    pub async fn resolve_address(&self, ctx: &Context) -> Result<()> {
        self.resolve_address.wait(ctx).await?;
        debug!("Resolving address");
        Ok(())
    }

    /// Dispatch a call to `endpoint`.
    pub async fn call(&self, endpoint: Endpoint, ctx: &Context) -> Result<()> {
        match endpoint {
            Endpoint::ReadFile => self.read_file(ctx).await,
            Endpoint::ResolveAddress => self.resolve_address(ctx).await,
        }
    }

    /// Effective (most restrictive) rate of an endpoint.
    pub fn endpoint_limit(&self, endpoint: Endpoint) -> Rate {
        match endpoint {
            Endpoint::ReadFile => self.read_file.limit(),
            Endpoint::ResolveAddress => self.resolve_address.limit(),
        }
    }

    pub fn api_limit(&self) -> &Arc<MultiLimiter> {
        &self.api
    }

    pub fn disk_limit(&self) -> &Arc<MultiLimiter> {
        &self.disk
    }

    pub fn network_limit(&self) -> &Arc<MultiLimiter> {
        &self.network
    }
}
