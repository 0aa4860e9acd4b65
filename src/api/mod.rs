//! API connection whose endpoints are guarded by composite limiters.

mod connection;

pub use connection::{ApiConnection, Endpoint};
