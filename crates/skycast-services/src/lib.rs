pub mod advisor;
pub mod retry;

pub use advisor::{
    build_weather_context, AdviceRequest, AdvisorClient, AdvisorError, DEFAULT_ADVICE_QUERY,
};
pub use retry::{with_retry, RetryConfig, RetryDecision, RetryError};
