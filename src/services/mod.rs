pub mod credits;
pub mod image_generator;
pub mod metrics;
pub mod rate_limiter;
pub mod redis;
pub mod transcriber;

pub use self::redis::RedisService;
pub use credits::CreditService;
pub use image_generator::{GeneratedVariation, GenerationRequest, ImageGenerator};
pub use metrics::MetricsService;
pub use rate_limiter::{RateLimitResult, RateLimiter};
pub use transcriber::{Transcriber, TranscriptionSource, Transcript};
