pub mod auth;
pub mod metrics;
pub mod rate_limit;

pub use auth::AuthenticatedUser;
pub use metrics::metrics_middleware;
pub use rate_limit::EndpointRateLimiter;
